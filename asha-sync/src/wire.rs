//! REST API wire shapes
//!
//! The API speaks snake_case and uses a few different field names than the
//! store (`scheme_name`, `created_at`, `enrollment_date`,
//! `next_checkup_date`). Response structs are lenient: absent lists and
//! flags fall back to defaults.

use serde::{Deserialize, Serialize};

use crate::entities::{
    Alert, AlertKind, AlertSeverity, AlertStatus, AnemiaStatus, BeneficiaryProfile, Child,
    ChildUpdate, DailyLog, EconomicStatus, Enrollment, EnrollmentStatus, Flow, Gender, GeoPoint,
    HealthLog, Mood, PregnancyStage, ProfileUpdate, RiskLevel, Role, Scheme, SchemeCategory,
    SchemeProvider, SchemeStatus, SchemeUpdate, TargetAudience, User, UserType,
};

#[derive(Debug, Clone, Deserialize)]
pub struct WireUser {
    pub id: String,
    #[serde(default, alias = "full_name")]
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl From<WireUser> for User {
    fn from(w: WireUser) -> Self {
        User {
            id: w.id,
            name: w.name,
            role: w.role,
            avatar: w.avatar,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireBeneficiary {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub user_type: Option<UserType>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub blood_group: Option<String>,
    #[serde(default)]
    pub last_period_date: Option<String>,
    #[serde(default)]
    pub pregnancy_stage: Option<PregnancyStage>,
    #[serde(default)]
    pub pregnancy_week: Option<u32>,
    #[serde(default)]
    pub edd: Option<String>,
    #[serde(default)]
    pub anemia_status: Option<AnemiaStatus>,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
    #[serde(default)]
    pub economic_status: Option<EconomicStatus>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub gps_coords: Option<GeoPoint>,
    #[serde(default)]
    pub linked_asha_id: Option<String>,
    #[serde(default)]
    pub next_checkup_date: Option<String>,
    #[serde(default)]
    pub medical_history: Option<String>,
    #[serde(default)]
    pub current_medications: Option<String>,
    #[serde(default)]
    pub complications: Option<String>,
}

impl From<WireBeneficiary> for BeneficiaryProfile {
    fn from(w: WireBeneficiary) -> Self {
        BeneficiaryProfile {
            id: w.id,
            user_id: w.user_id.unwrap_or_default(),
            name: w.name,
            user_type: w.user_type.unwrap_or_default(),
            age: w.age,
            height: w.height,
            weight: w.weight,
            blood_group: w.blood_group,
            pregnancy_stage: w.pregnancy_stage,
            pregnancy_week: w.pregnancy_week,
            last_period_date: w.last_period_date,
            edd: w.edd,
            anemia_status: w.anemia_status,
            risk_level: w.risk_level,
            gps_coords: w.gps_coords,
            address: w.address,
            linked_asha_id: w.linked_asha_id,
            next_checkup: w.next_checkup_date,
            economic_status: w.economic_status,
            medical_history: w.medical_history,
            current_medications: w.current_medications,
            complications: w.complications,
        }
    }
}

/// Body of `POST /beneficiaries/` for a self-registered beneficiary
#[derive(Debug, Clone, Serialize)]
pub struct WireProfileCreate<'a> {
    pub name: &'a str,
    pub risk_level: RiskLevel,
    pub user_type: UserType,
}

impl<'a> WireProfileCreate<'a> {
    pub fn new(name: &'a str) -> Self {
        Self {
            name,
            risk_level: RiskLevel::Low,
            user_type: UserType::Girl,
        }
    }
}

/// Body of `PUT /beneficiaries/{id}`; unset fields are omitted
#[derive(Debug, Clone, Default, Serialize)]
pub struct WireProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_type: Option<UserType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_period_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pregnancy_stage: Option<PregnancyStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pregnancy_week: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anemia_status: Option<AnemiaStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub economic_status: Option<EconomicStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_coords: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_asha_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_checkup_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medical_history: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_medications: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complications: Option<String>,
}

impl From<&ProfileUpdate> for WireProfileUpdate {
    fn from(u: &ProfileUpdate) -> Self {
        Self {
            name: u.name.clone(),
            user_type: u.user_type,
            age: u.age,
            height: u.height,
            weight: u.weight,
            blood_group: u.blood_group.clone(),
            last_period_date: u.last_period_date.clone(),
            pregnancy_stage: u.pregnancy_stage,
            pregnancy_week: u.pregnancy_week,
            edd: u.edd.clone(),
            anemia_status: u.anemia_status,
            risk_level: u.risk_level,
            economic_status: u.economic_status,
            address: u.address.clone(),
            gps_coords: u.gps_coords,
            linked_asha_id: u.linked_asha_id.clone(),
            next_checkup_date: u.next_checkup.clone(),
            medical_history: u.medical_history.clone(),
            current_medications: u.current_medications.clone(),
            complications: u.complications.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireChild {
    pub id: String,
    pub beneficiary_id: String,
    pub name: String,
    #[serde(default)]
    pub dob: String,
    pub gender: Gender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_group: Option<String>,
    #[serde(default)]
    pub vaccinations: Vec<String>,
}

impl From<WireChild> for Child {
    fn from(w: WireChild) -> Self {
        Child {
            id: w.id,
            beneficiary_id: w.beneficiary_id,
            name: w.name,
            dob: w.dob,
            gender: w.gender,
            blood_group: w.blood_group,
            vaccinations: w.vaccinations,
        }
    }
}

impl From<&Child> for WireChild {
    fn from(c: &Child) -> Self {
        Self {
            id: c.id.clone(),
            beneficiary_id: c.beneficiary_id.clone(),
            name: c.name.clone(),
            dob: c.dob.clone(),
            gender: c.gender,
            blood_group: c.blood_group.clone(),
            vaccinations: c.vaccinations.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WireChildUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vaccinations: Option<Vec<String>>,
}

impl From<&ChildUpdate> for WireChildUpdate {
    fn from(u: &ChildUpdate) -> Self {
        Self {
            name: u.name.clone(),
            dob: u.dob.clone(),
            gender: u.gender,
            blood_group: u.blood_group.clone(),
            vaccinations: u.vaccinations.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireHealthLog {
    pub id: String,
    pub beneficiary_id: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub bp_systolic: Option<u32>,
    #[serde(default)]
    pub bp_diastolic: Option<u32>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub is_emergency: Option<bool>,
}

impl From<WireHealthLog> for HealthLog {
    fn from(w: WireHealthLog) -> Self {
        HealthLog {
            id: w.id,
            beneficiary_id: w.beneficiary_id,
            date: w.date,
            bp_systolic: w.bp_systolic.unwrap_or_default(),
            bp_diastolic: w.bp_diastolic.unwrap_or_default(),
            symptoms: w.symptoms,
            mood: w.mood.unwrap_or_default(),
            is_emergency: w.is_emergency.unwrap_or(false),
        }
    }
}

/// Body of `POST /health-logs/`. The client id rides along so a replay of
/// an already-stored log can be answered with 409.
#[derive(Debug, Clone, Serialize)]
pub struct WireHealthLogCreate<'a> {
    pub id: &'a str,
    pub beneficiary_id: &'a str,
    pub bp_systolic: u32,
    pub bp_diastolic: u32,
    pub symptoms: &'a [String],
    pub mood: &'a str,
    pub is_emergency: bool,
}

impl<'a> From<&'a HealthLog> for WireHealthLogCreate<'a> {
    fn from(log: &'a HealthLog) -> Self {
        Self {
            id: &log.id,
            beneficiary_id: &log.beneficiary_id,
            bp_systolic: log.bp_systolic,
            bp_diastolic: log.bp_diastolic,
            symptoms: &log.symptoms,
            mood: &log.mood,
            is_emergency: log.is_emergency,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireDailyLog {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub date: String,
    #[serde(default)]
    pub mood: Option<Mood>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub flow: Option<Flow>,
}

impl From<WireDailyLog> for DailyLog {
    fn from(w: WireDailyLog) -> Self {
        DailyLog {
            id: w.id,
            user_id: w.user_id,
            date: w.date,
            symptoms: w.symptoms,
            mood: w.mood.unwrap_or(Mood::Neutral),
            notes: w.notes.unwrap_or_default(),
            flow: w.flow,
        }
    }
}

/// Body of `POST /daily-logs/`; the server upserts by date for the caller
#[derive(Debug, Clone, Serialize)]
pub struct WireDailyLogCreate<'a> {
    pub id: &'a str,
    pub date: &'a str,
    pub mood: Mood,
    pub symptoms: &'a [String],
    pub notes: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow: Option<Flow>,
}

impl<'a> From<&'a DailyLog> for WireDailyLogCreate<'a> {
    fn from(log: &'a DailyLog) -> Self {
        Self {
            id: &log.id,
            date: &log.date,
            mood: log.mood,
            symptoms: &log.symptoms,
            notes: &log.notes,
            flow: log.flow,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireAlert {
    pub id: String,
    pub beneficiary_id: String,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub resolved_at: Option<String>,
    #[serde(default)]
    pub resolved_by: Option<String>,
    #[serde(default)]
    pub triggered_by: Option<String>,
    #[serde(default)]
    pub resolution_notes: Option<String>,
}

impl From<WireAlert> for Alert {
    fn from(w: WireAlert) -> Self {
        Alert {
            id: w.id,
            beneficiary_id: w.beneficiary_id,
            severity: w.severity,
            status: w.status,
            timestamp: w.created_at,
            kind: w.kind,
            reason: w.reason,
            resolved_at: w.resolved_at,
            resolved_by: w.resolved_by,
            triggered_by: w.triggered_by,
            resolution_notes: w.resolution_notes,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireScheme {
    pub id: String,
    pub scheme_name: String,
    pub provider: SchemeProvider,
    #[serde(default)]
    pub category: Option<SchemeCategory>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub hero_image: Option<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub eligibility_criteria: Vec<String>,
    #[serde(default)]
    pub target_audience: Option<serde_json::Value>,
    pub status: SchemeStatus,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub enrolled_count: Option<u32>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub microsite_config: Option<serde_json::Value>,
}

impl From<WireScheme> for Scheme {
    fn from(w: WireScheme) -> Self {
        // Audience filters are free-form on the server; unknown shapes
        // degrade to "everyone".
        let target_audience = w
            .target_audience
            .and_then(|v| serde_json::from_value::<TargetAudience>(v).ok())
            .unwrap_or_default();

        Scheme {
            id: w.id,
            title: w.scheme_name,
            provider: w.provider,
            description: w.description.unwrap_or_default(),
            hero_image: w.hero_image.unwrap_or_default(),
            benefits: w.benefits,
            eligibility_criteria: w.eligibility_criteria,
            target_audience,
            status: w.status,
            budget: w.budget.unwrap_or_default(),
            enrolled_count: w.enrolled_count.unwrap_or_default(),
            start_date: w.start_date.unwrap_or_default(),
            end_date: w.end_date,
            category: w.category,
            microsite_config: w.microsite_config,
        }
    }
}

/// Body of `POST /schemes/` and `PUT /schemes/{id}`; unset fields omitted
#[derive(Debug, Clone, Default, Serialize)]
pub struct WireSchemeWrite {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<SchemeProvider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<SchemeCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hero_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benefits: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eligibility_criteria: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<TargetAudience>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SchemeStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub microsite_config: Option<serde_json::Value>,
}

impl From<&Scheme> for WireSchemeWrite {
    fn from(s: &Scheme) -> Self {
        Self {
            id: Some(s.id.clone()),
            scheme_name: Some(s.title.clone()),
            provider: Some(s.provider),
            category: s.category,
            description: Some(s.description.clone()),
            hero_image: Some(s.hero_image.clone()),
            benefits: Some(s.benefits.clone()),
            eligibility_criteria: Some(s.eligibility_criteria.clone()),
            target_audience: Some(s.target_audience.clone()),
            status: Some(s.status),
            budget: Some(s.budget),
            start_date: Some(s.start_date.clone()),
            end_date: s.end_date.clone(),
            microsite_config: s.microsite_config.clone(),
        }
    }
}

impl From<&SchemeUpdate> for WireSchemeWrite {
    fn from(u: &SchemeUpdate) -> Self {
        Self {
            id: None,
            scheme_name: u.title.clone(),
            provider: u.provider,
            category: u.category,
            description: u.description.clone(),
            hero_image: u.hero_image.clone(),
            benefits: u.benefits.clone(),
            eligibility_criteria: u.eligibility_criteria.clone(),
            target_audience: u.target_audience.clone(),
            status: u.status,
            budget: u.budget,
            start_date: u.start_date.clone(),
            end_date: u.end_date.clone(),
            microsite_config: u.microsite_config.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireEnrollment {
    pub id: String,
    pub scheme_id: String,
    pub beneficiary_id: String,
    pub status: EnrollmentStatus,
    #[serde(default)]
    pub enrolled_by: Option<String>,
    #[serde(default)]
    pub enrollment_date: Option<String>,
}

impl From<WireEnrollment> for Enrollment {
    fn from(w: WireEnrollment) -> Self {
        Enrollment {
            id: w.id,
            scheme_id: w.scheme_id,
            beneficiary_id: w.beneficiary_id,
            status: w.status,
            enrolled_by: w.enrolled_by.unwrap_or_default(),
            date: w.enrollment_date.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WireEnrollmentCreate<'a> {
    pub scheme_id: &'a str,
    pub beneficiary_id: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_beneficiary_maps_next_checkup_date() {
        let wire: WireBeneficiary = serde_json::from_value(json!({
            "id": "b1",
            "user_id": "u1",
            "name": "Sunita",
            "user_type": "pregnant",
            "pregnancy_stage": "trimester_3",
            "next_checkup_date": "2024-06-01",
            "gps_coords": { "lat": 25.6, "lng": 85.1 }
        }))
        .unwrap();

        let profile = BeneficiaryProfile::from(wire);
        assert_eq!(profile.user_id, "u1");
        assert_eq!(profile.user_type, UserType::Pregnant);
        assert_eq!(profile.next_checkup.as_deref(), Some("2024-06-01"));
        assert_eq!(profile.pregnancy_stage, Some(PregnancyStage::Trimester3));
    }

    #[test]
    fn test_profile_update_body_omits_unset_fields() {
        let update = ProfileUpdate {
            next_checkup: Some("2024-07-01".into()),
            risk_level: Some(RiskLevel::High),
            ..Default::default()
        };
        let body = serde_json::to_value(WireProfileUpdate::from(&update)).unwrap();
        assert_eq!(
            body,
            json!({ "next_checkup_date": "2024-07-01", "risk_level": "high" })
        );
    }

    #[test]
    fn test_scheme_title_and_counts() {
        let wire: WireScheme = serde_json::from_value(json!({
            "id": "s1",
            "scheme_name": "Janani Suraksha Yojana",
            "provider": "Govt",
            "status": "active",
            "enrolled_count": 12,
            "target_audience": "all"
        }))
        .unwrap();

        let scheme = Scheme::from(wire);
        assert_eq!(scheme.title, "Janani Suraksha Yojana");
        assert_eq!(scheme.enrolled_count, 12);
        assert_eq!(scheme.target_audience, TargetAudience::default());

        let update = SchemeUpdate {
            title: Some("JSY".into()),
            ..Default::default()
        };
        let body = serde_json::to_value(WireSchemeWrite::from(&update)).unwrap();
        assert_eq!(body, json!({ "scheme_name": "JSY" }));
    }

    #[test]
    fn test_alert_timestamp_from_created_at() {
        let wire: WireAlert = serde_json::from_value(json!({
            "id": "a1",
            "beneficiary_id": "b1",
            "type": "health_risk",
            "severity": "high",
            "status": "open",
            "created_at": "2024-05-01T08:00:00Z"
        }))
        .unwrap();
        let alert = Alert::from(wire);
        assert_eq!(alert.timestamp, "2024-05-01T08:00:00Z");
        assert_eq!(alert.kind, AlertKind::HealthRisk);
    }

    #[test]
    fn test_enrollment_date_field() {
        let wire: WireEnrollment = serde_json::from_value(json!({
            "id": "e1",
            "scheme_id": "s1",
            "beneficiary_id": "b1",
            "status": "active",
            "enrolled_by": "asha-1",
            "enrollment_date": "2024-05-02"
        }))
        .unwrap();
        let enrollment = Enrollment::from(wire);
        assert_eq!(enrollment.date, "2024-05-02");
        assert_eq!(enrollment.enrolled_by, "asha-1");
    }
}
