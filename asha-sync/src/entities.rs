//! Domain records held by the entity store
//!
//! Field names serialize in camelCase, which is the layout of the persisted
//! state record. The remote API uses snake_case; translation lives in
//! [`crate::wire`].

use serde::{Deserialize, Serialize};

/// Any record kept in a keyed collection of the store.
pub trait Entity: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;
}

macro_rules! impl_entity {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Entity for $ty {
                fn id(&self) -> &str {
                    &self.id
                }
            }
        )*
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Beneficiary,
    AshaWorker,
    Partner,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Hi,
    Bho,
    Pa,
    Mr,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    #[default]
    Girl,
    Pregnant,
    Mother,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PregnancyStage {
    #[serde(rename = "trimester_1")]
    Trimester1,
    #[serde(rename = "trimester_2")]
    Trimester2,
    #[serde(rename = "trimester_3")]
    Trimester3,
    Postpartum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnemiaStatus {
    Normal,
    Mild,
    Moderate,
    Severe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EconomicStatus {
    Bpl,
    Apl,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Beneficiary profile (girl, pregnant woman or mother)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeneficiaryProfile {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub user_type: UserType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    /// Height in cm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Weight in kg
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pregnancy_stage: Option<PregnancyStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pregnancy_week: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_period_date: Option<String>,
    /// Expected delivery date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anemia_status: Option<AnemiaStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    #[serde(default, rename = "gps_coords", skip_serializing_if = "Option::is_none")]
    pub gps_coords: Option<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_asha_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_checkup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub economic_status: Option<EconomicStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_history: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_medications: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complications: Option<String>,
}

/// Partial update of a beneficiary profile. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<UserType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pregnancy_stage: Option<PregnancyStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pregnancy_week: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_period_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anemia_status: Option<AnemiaStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    #[serde(default, rename = "gps_coords", skip_serializing_if = "Option::is_none")]
    pub gps_coords: Option<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_asha_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_checkup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub economic_status: Option<EconomicStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_history: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_medications: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complications: Option<String>,
}

fn merge<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *target = v.clone();
    }
}

fn merge_opt<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        target.clone_from(value);
    }
}

impl ProfileUpdate {
    pub fn apply_to(&self, profile: &mut BeneficiaryProfile) {
        merge(&mut profile.name, &self.name);
        merge(&mut profile.user_type, &self.user_type);
        merge_opt(&mut profile.age, &self.age);
        merge_opt(&mut profile.height, &self.height);
        merge_opt(&mut profile.weight, &self.weight);
        merge_opt(&mut profile.blood_group, &self.blood_group);
        merge_opt(&mut profile.pregnancy_stage, &self.pregnancy_stage);
        merge_opt(&mut profile.pregnancy_week, &self.pregnancy_week);
        merge_opt(&mut profile.last_period_date, &self.last_period_date);
        merge_opt(&mut profile.edd, &self.edd);
        merge_opt(&mut profile.anemia_status, &self.anemia_status);
        merge_opt(&mut profile.risk_level, &self.risk_level);
        merge_opt(&mut profile.gps_coords, &self.gps_coords);
        merge_opt(&mut profile.address, &self.address);
        merge_opt(&mut profile.linked_asha_id, &self.linked_asha_id);
        merge_opt(&mut profile.next_checkup, &self.next_checkup);
        merge_opt(&mut profile.economic_status, &self.economic_status);
        merge_opt(&mut profile.medical_history, &self.medical_history);
        merge_opt(&mut profile.current_medications, &self.current_medications);
        merge_opt(&mut profile.complications, &self.complications);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Child {
    pub id: String,
    pub beneficiary_id: String,
    pub name: String,
    /// YYYY-MM-DD
    pub dob: String,
    pub gender: Gender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_group: Option<String>,
    /// Names of vaccines already administered
    #[serde(default)]
    pub vaccinations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildDraft {
    pub beneficiary_id: String,
    pub name: String,
    pub dob: String,
    pub gender: Gender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_group: Option<String>,
    #[serde(default)]
    pub vaccinations: Vec<String>,
}

impl ChildDraft {
    pub fn with_id(self, id: String) -> Child {
        Child {
            id,
            beneficiary_id: self.beneficiary_id,
            name: self.name,
            dob: self.dob,
            gender: self.gender,
            blood_group: self.blood_group,
            vaccinations: self.vaccinations,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vaccinations: Option<Vec<String>>,
}

impl ChildUpdate {
    pub fn apply_to(&self, child: &mut Child) {
        merge(&mut child.name, &self.name);
        merge(&mut child.dob, &self.dob);
        merge(&mut child.gender, &self.gender);
        merge_opt(&mut child.blood_group, &self.blood_group);
        merge(&mut child.vaccinations, &self.vaccinations);
    }
}

/// Vitals recorded during a health worker visit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthLog {
    pub id: String,
    pub beneficiary_id: String,
    pub date: String,
    pub bp_systolic: u32,
    pub bp_diastolic: u32,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub mood: String,
    #[serde(default)]
    pub is_emergency: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthLogDraft {
    pub beneficiary_id: String,
    pub date: String,
    pub bp_systolic: u32,
    pub bp_diastolic: u32,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub mood: String,
    #[serde(default)]
    pub is_emergency: bool,
}

impl HealthLogDraft {
    pub fn with_id(self, id: String) -> HealthLog {
        HealthLog {
            id,
            beneficiary_id: self.beneficiary_id,
            date: self.date,
            bp_systolic: self.bp_systolic,
            bp_diastolic: self.bp_diastolic,
            symptoms: self.symptoms,
            mood: self.mood,
            is_emergency: self.is_emergency,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mood {
    Happy,
    Neutral,
    Sad,
    Tired,
    Anxious,
    Pain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Flow {
    Light,
    Medium,
    Heavy,
}

/// Self-reported daily entry from the cycle tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyLog {
    pub id: String,
    pub user_id: String,
    /// YYYY-MM-DD
    pub date: String,
    #[serde(default)]
    pub symptoms: Vec<String>,
    pub mood: Mood,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<Flow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyLogDraft {
    pub user_id: String,
    pub date: String,
    #[serde(default)]
    pub symptoms: Vec<String>,
    pub mood: Mood,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<Flow>,
}

impl DailyLogDraft {
    pub fn with_id(self, id: String) -> DailyLog {
        DailyLog {
            id,
            user_id: self.user_id,
            date: self.date,
            symptoms: self.symptoms,
            mood: self.mood,
            notes: self.notes,
            flow: self.flow,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Open,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Sos,
    HealthRisk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub beneficiary_id: String,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_notes: Option<String>,
}

impl Alert {
    /// A freshly raised, unresolved SOS alert.
    pub fn sos(id: String, beneficiary_id: String, timestamp: String) -> Self {
        Self {
            id,
            beneficiary_id,
            severity: AlertSeverity::Critical,
            status: AlertStatus::Open,
            timestamp,
            kind: AlertKind::Sos,
            reason: None,
            resolved_at: None,
            resolved_by: None,
            triggered_by: None,
            resolution_notes: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemeProvider {
    Govt,
    #[serde(rename = "NGO")]
    Ngo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemeStatus {
    Active,
    Draft,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemeCategory {
    Financial,
    Nutrition,
    Health,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetAudience {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pregnancy_stage: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub economic_status: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_types: Option<Vec<UserType>>,
}

/// Government or NGO programme that beneficiaries can be enrolled in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scheme {
    pub id: String,
    pub title: String,
    pub provider: SchemeProvider,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub hero_image: String,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub eligibility_criteria: Vec<String>,
    #[serde(default)]
    pub target_audience: TargetAudience,
    pub status: SchemeStatus,
    #[serde(default)]
    pub budget: f64,
    #[serde(default)]
    pub enrolled_count: u32,
    #[serde(default)]
    pub start_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<SchemeCategory>,
    /// Campaign microsite layout, opaque to the sync engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub microsite_config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemeDraft {
    pub title: String,
    pub provider: SchemeProvider,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub hero_image: String,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub eligibility_criteria: Vec<String>,
    #[serde(default)]
    pub target_audience: TargetAudience,
    pub status: SchemeStatus,
    #[serde(default)]
    pub budget: f64,
    #[serde(default)]
    pub start_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<SchemeCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub microsite_config: Option<serde_json::Value>,
}

impl SchemeDraft {
    pub fn with_id(self, id: String) -> Scheme {
        Scheme {
            id,
            title: self.title,
            provider: self.provider,
            description: self.description,
            hero_image: self.hero_image,
            benefits: self.benefits,
            eligibility_criteria: self.eligibility_criteria,
            target_audience: self.target_audience,
            status: self.status,
            budget: self.budget,
            enrolled_count: 0,
            start_date: self.start_date,
            end_date: self.end_date,
            category: self.category,
            microsite_config: self.microsite_config,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemeUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<SchemeProvider>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hero_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benefits: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eligibility_criteria: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<TargetAudience>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SchemeStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<SchemeCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub microsite_config: Option<serde_json::Value>,
}

impl SchemeUpdate {
    pub fn apply_to(&self, scheme: &mut Scheme) {
        merge(&mut scheme.title, &self.title);
        merge(&mut scheme.provider, &self.provider);
        merge(&mut scheme.description, &self.description);
        merge(&mut scheme.hero_image, &self.hero_image);
        merge(&mut scheme.benefits, &self.benefits);
        merge(&mut scheme.eligibility_criteria, &self.eligibility_criteria);
        merge(&mut scheme.target_audience, &self.target_audience);
        merge(&mut scheme.status, &self.status);
        merge(&mut scheme.budget, &self.budget);
        merge(&mut scheme.start_date, &self.start_date);
        merge_opt(&mut scheme.end_date, &self.end_date);
        merge_opt(&mut scheme.category, &self.category);
        merge_opt(&mut scheme.microsite_config, &self.microsite_config);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: String,
    pub scheme_id: String,
    pub beneficiary_id: String,
    pub status: EnrollmentStatus,
    #[serde(default)]
    pub enrolled_by: String,
    #[serde(default)]
    pub date: String,
}

impl_entity!(
    BeneficiaryProfile,
    Child,
    HealthLog,
    DailyLog,
    Alert,
    Scheme,
    Enrollment,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_update_only_touches_set_fields() {
        let mut profile = BeneficiaryProfile {
            id: "b1".to_string(),
            name: "Sunita".to_string(),
            age: Some(24),
            address: Some("Ward 4".to_string()),
            ..Default::default()
        };

        let update = ProfileUpdate {
            risk_level: Some(RiskLevel::High),
            pregnancy_week: Some(28),
            ..Default::default()
        };
        update.apply_to(&mut profile);

        assert_eq!(profile.name, "Sunita");
        assert_eq!(profile.age, Some(24));
        assert_eq!(profile.address.as_deref(), Some("Ward 4"));
        assert_eq!(profile.risk_level, Some(RiskLevel::High));
        assert_eq!(profile.pregnancy_week, Some(28));
    }

    #[test]
    fn test_alert_serializes_kind_as_type() {
        let alert = Alert::sos("a1".into(), "b1".into(), "2024-05-01T10:00:00Z".into());
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["type"], "sos");
        assert_eq!(json["severity"], "critical");
        assert_eq!(json["beneficiaryId"], "b1");
    }

    #[test]
    fn test_scheme_provider_ngo_spelling() {
        let json = serde_json::to_string(&SchemeProvider::Ngo).unwrap();
        assert_eq!(json, "\"NGO\"");
        let stage: PregnancyStage = serde_json::from_str("\"trimester_2\"").unwrap();
        assert_eq!(stage, PregnancyStage::Trimester2);
    }
}
