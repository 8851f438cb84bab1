//! Durable sync queue
//!
//! Provides:
//! - Strongly typed queued operations, one variant per operation kind
//! - The persisted item layout (`id`, `type`, `payload`, `timestamp`, `retryCount`)
//! - The retry ceiling decision and dead-letter records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::entities::{
    Alert, AlertStatus, Child, ChildUpdate, DailyLog, Enrollment, HealthLog, ProfileUpdate,
    Scheme, SchemeUpdate,
};
use crate::gateway::{GatewayResult, RemoteGateway};
use crate::reconcile::ReconcileReport;
use crate::store::EntityStore;

/// Operation kind in the sync queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    AddHealthLog,
    AddDailyLog,
    UpdateProfile,
    TriggerSos,
    EnrollScheme,
    AddChild,
    UpdateChild,
    AddScheme,
    UpdateScheme,
    ResolveAlert,
    DeleteBeneficiary,
    DeleteScheme,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::AddHealthLog => "ADD_HEALTH_LOG",
            OperationKind::AddDailyLog => "ADD_DAILY_LOG",
            OperationKind::UpdateProfile => "UPDATE_PROFILE",
            OperationKind::TriggerSos => "TRIGGER_SOS",
            OperationKind::EnrollScheme => "ENROLL_SCHEME",
            OperationKind::AddChild => "ADD_CHILD",
            OperationKind::UpdateChild => "UPDATE_CHILD",
            OperationKind::AddScheme => "ADD_SCHEME",
            OperationKind::UpdateScheme => "UPDATE_SCHEME",
            OperationKind::ResolveAlert => "RESOLVE_ALERT",
            OperationKind::DeleteBeneficiary => "DELETE_BENEFICIARY",
            OperationKind::DeleteScheme => "DELETE_SCHEME",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdatePayload {
    pub id: String,
    pub updates: ProfileUpdate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildUpdatePayload {
    pub id: String,
    pub updates: ChildUpdate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemeUpdatePayload {
    pub scheme_id: String,
    pub scheme_updates: SchemeUpdate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SosPayload {
    /// Local id of the optimistic alert
    pub id: String,
    pub beneficiary_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveAlertPayload {
    pub alert_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePayload {
    pub id: String,
}

/// A remote call waiting to be replayed
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    AddHealthLog(HealthLog),
    AddDailyLog(DailyLog),
    UpdateProfile(ProfileUpdatePayload),
    TriggerSos(SosPayload),
    EnrollScheme(Enrollment),
    AddChild(Child),
    UpdateChild(ChildUpdatePayload),
    AddScheme(Scheme),
    UpdateScheme(SchemeUpdatePayload),
    ResolveAlert(ResolveAlertPayload),
    DeleteBeneficiary(DeletePayload),
    DeleteScheme(DeletePayload),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::AddHealthLog(_) => OperationKind::AddHealthLog,
            Operation::AddDailyLog(_) => OperationKind::AddDailyLog,
            Operation::UpdateProfile(_) => OperationKind::UpdateProfile,
            Operation::TriggerSos(_) => OperationKind::TriggerSos,
            Operation::EnrollScheme(_) => OperationKind::EnrollScheme,
            Operation::AddChild(_) => OperationKind::AddChild,
            Operation::UpdateChild(_) => OperationKind::UpdateChild,
            Operation::AddScheme(_) => OperationKind::AddScheme,
            Operation::UpdateScheme(_) => OperationKind::UpdateScheme,
            Operation::ResolveAlert(_) => OperationKind::ResolveAlert,
            Operation::DeleteBeneficiary(_) => OperationKind::DeleteBeneficiary,
            Operation::DeleteScheme(_) => OperationKind::DeleteScheme,
        }
    }

    /// Id of the entity the operation targets, for diagnostics.
    pub fn entity_id(&self) -> &str {
        match self {
            Operation::AddHealthLog(log) => &log.id,
            Operation::AddDailyLog(log) => &log.id,
            Operation::UpdateProfile(p) => &p.id,
            Operation::TriggerSos(p) => &p.id,
            Operation::EnrollScheme(e) => &e.id,
            Operation::AddChild(c) => &c.id,
            Operation::UpdateChild(p) => &p.id,
            Operation::AddScheme(s) => &s.id,
            Operation::UpdateScheme(p) => &p.scheme_id,
            Operation::ResolveAlert(p) => &p.alert_id,
            Operation::DeleteBeneficiary(p) | Operation::DeleteScheme(p) => &p.id,
        }
    }

    /// Invoke the gateway call this operation maps to.
    pub async fn send(&self, gateway: &dyn RemoteGateway) -> GatewayResult<()> {
        match self {
            Operation::AddHealthLog(log) => gateway.create_health_log(log).await,
            Operation::AddDailyLog(log) => gateway.create_daily_log(log).await,
            Operation::UpdateProfile(p) => gateway.update_profile(&p.id, &p.updates).await,
            Operation::TriggerSos(p) => gateway.trigger_sos(&p.beneficiary_id).await,
            Operation::EnrollScheme(e) => {
                gateway.enroll(&e.scheme_id, &e.beneficiary_id).await
            }
            Operation::AddChild(c) => gateway.create_child(c).await,
            Operation::UpdateChild(p) => gateway.update_child(&p.id, &p.updates).await,
            Operation::AddScheme(s) => gateway.create_scheme(s).await,
            Operation::UpdateScheme(p) => {
                gateway.update_scheme(&p.scheme_id, &p.scheme_updates).await
            }
            Operation::ResolveAlert(p) => {
                gateway.resolve_alert(&p.alert_id, p.notes.as_deref()).await
            }
            Operation::DeleteBeneficiary(p) => gateway.delete_beneficiary(&p.id).await,
            Operation::DeleteScheme(p) => gateway.delete_scheme(&p.id).await,
        }
    }

    /// Re-apply the local effect of a still-unsent operation on top of
    /// server data. Applying twice leaves the store as applying once.
    pub fn apply_local(&self, store: &mut EntityStore, queued_at: &str) {
        match self {
            Operation::AddHealthLog(log) => {
                store.health_logs.upsert(log.clone());
            }
            Operation::AddDailyLog(log) => {
                store
                    .daily_logs
                    .retain(|l| l.id == log.id || !(l.user_id == log.user_id && l.date == log.date));
                store.daily_logs.upsert(log.clone());
            }
            Operation::UpdateProfile(p) => {
                store.beneficiaries.update(&p.id, |profile| p.updates.apply_to(profile));
            }
            Operation::TriggerSos(p) => {
                if !store.alerts.contains(&p.id) {
                    store.alerts.upsert_front(Alert::sos(
                        p.id.clone(),
                        p.beneficiary_id.clone(),
                        queued_at.to_string(),
                    ));
                }
            }
            Operation::EnrollScheme(e) => {
                let enrolled = store
                    .enrollments
                    .find(|existing| existing.scheme_id == e.scheme_id && existing.beneficiary_id == e.beneficiary_id)
                    .is_some();
                if !enrolled {
                    store.schemes.update(&e.scheme_id, |scheme| {
                        scheme.enrolled_count = scheme.enrolled_count.saturating_add(1);
                    });
                    store.enrollments.upsert(e.clone());
                }
            }
            Operation::AddChild(c) => {
                store.children.upsert(c.clone());
            }
            Operation::UpdateChild(p) => {
                store.children.update(&p.id, |child| p.updates.apply_to(child));
            }
            Operation::AddScheme(scheme) => {
                store.schemes.upsert(scheme.clone());
            }
            Operation::UpdateScheme(p) => {
                store
                    .schemes
                    .update(&p.scheme_id, |scheme| p.scheme_updates.apply_to(scheme));
            }
            Operation::ResolveAlert(p) => {
                store.alerts.update(&p.alert_id, |alert| {
                    alert.status = AlertStatus::Resolved;
                    if alert.resolved_at.is_none() {
                        alert.resolved_at = Some(queued_at.to_string());
                    }
                    if p.notes.is_some() {
                        alert.resolution_notes = p.notes.clone();
                    }
                });
            }
            Operation::DeleteBeneficiary(p) => {
                store.remove_beneficiary_cascade(&p.id);
            }
            Operation::DeleteScheme(p) => {
                store.schemes.remove(&p.id);
            }
        }
    }

    fn payload_value(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Operation::AddHealthLog(v) => serde_json::to_value(v),
            Operation::AddDailyLog(v) => serde_json::to_value(v),
            Operation::UpdateProfile(v) => serde_json::to_value(v),
            Operation::TriggerSos(v) => serde_json::to_value(v),
            Operation::EnrollScheme(v) => serde_json::to_value(v),
            Operation::AddChild(v) => serde_json::to_value(v),
            Operation::UpdateChild(v) => serde_json::to_value(v),
            Operation::AddScheme(v) => serde_json::to_value(v),
            Operation::UpdateScheme(v) => serde_json::to_value(v),
            Operation::ResolveAlert(v) => serde_json::to_value(v),
            Operation::DeleteBeneficiary(v) | Operation::DeleteScheme(v) => serde_json::to_value(v),
        }
    }

    fn from_parts(kind: OperationKind, payload: serde_json::Value) -> serde_json::Result<Self> {
        use serde_json::from_value;

        Ok(match kind {
            OperationKind::AddHealthLog => Operation::AddHealthLog(from_value(payload)?),
            OperationKind::AddDailyLog => Operation::AddDailyLog(from_value(payload)?),
            OperationKind::UpdateProfile => Operation::UpdateProfile(from_value(payload)?),
            OperationKind::TriggerSos => Operation::TriggerSos(from_value(payload)?),
            OperationKind::EnrollScheme => Operation::EnrollScheme(from_value(payload)?),
            OperationKind::AddChild => Operation::AddChild(from_value(payload)?),
            OperationKind::UpdateChild => Operation::UpdateChild(from_value(payload)?),
            OperationKind::AddScheme => Operation::AddScheme(from_value(payload)?),
            OperationKind::UpdateScheme => Operation::UpdateScheme(from_value(payload)?),
            OperationKind::ResolveAlert => Operation::ResolveAlert(from_value(payload)?),
            OperationKind::DeleteBeneficiary => Operation::DeleteBeneficiary(from_value(payload)?),
            OperationKind::DeleteScheme => Operation::DeleteScheme(from_value(payload)?),
        })
    }
}

/// Sync queue entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawQueueItem", into = "RawQueueItem")]
pub struct SyncQueueItem {
    /// Unique queue entry ID
    pub id: Uuid,

    /// Operation to replay
    pub operation: Operation,

    /// Epoch milliseconds when the item was queued
    pub timestamp: i64,

    /// Number of failed replay attempts
    pub retry_count: u32,
}

impl SyncQueueItem {
    pub fn new(operation: Operation) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation,
            timestamp: Utc::now().timestamp_millis(),
            retry_count: 0,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.operation.kind()
    }

    /// Re-apply this pending operation's local effect to `store`
    pub fn reapply(&self, store: &mut EntityStore) {
        let queued_at = DateTime::<Utc>::from_timestamp_millis(self.timestamp)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        self.operation.apply_local(store, &queued_at);
    }

    /// Same item after one more failed attempt
    pub fn retried(mut self) -> Self {
        self.retry_count = self.retry_count.saturating_add(1);
        self
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQueueItem {
    id: Uuid,
    #[serde(rename = "type")]
    kind: OperationKind,
    payload: serde_json::Value,
    timestamp: i64,
    #[serde(default)]
    retry_count: u32,
}

impl TryFrom<RawQueueItem> for SyncQueueItem {
    type Error = String;

    fn try_from(raw: RawQueueItem) -> Result<Self, Self::Error> {
        let operation = Operation::from_parts(raw.kind, raw.payload)
            .map_err(|e| format!("Invalid {} payload: {}", raw.kind, e))?;
        Ok(Self {
            id: raw.id,
            operation,
            timestamp: raw.timestamp,
            retry_count: raw.retry_count,
        })
    }
}

impl From<SyncQueueItem> for RawQueueItem {
    fn from(item: SyncQueueItem) -> Self {
        let kind = item.operation.kind();
        // Payload types are plain data; serialization cannot fail.
        let payload = item
            .operation
            .payload_value()
            .unwrap_or(serde_json::Value::Null);
        Self {
            id: item.id,
            kind,
            payload,
            timestamp: item.timestamp,
            retry_count: item.retry_count,
        }
    }
}

/// Operation abandoned after exhausting its retries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub item: SyncQueueItem,
    /// Redacted description of the last failure
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Epoch milliseconds
    pub dropped_at: i64,
}

/// Summary of one replay pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayReport {
    pub attempted: usize,
    pub confirmed: usize,
    /// Items the server already had
    pub conflicts: usize,
    pub retained: usize,
    pub dead_lettered: usize,
    /// Forced reconciliation run after the pass, if any item cleared
    pub reconciled: Option<ReconcileReport>,
}

impl ReplayReport {
    pub fn cleared(&self) -> usize {
        self.confirmed + self.conflicts
    }
}

/// What happens to an item after one replay attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayDisposition {
    /// Remote accepted it
    Confirmed,
    /// Remote already had it (409)
    AlreadyApplied,
    /// Keep for the next pass
    Retain(SyncQueueItem),
    /// Retries exhausted
    DeadLetter(DeadLetter),
}

/// Decide the fate of a replayed item.
///
/// Network failures are retried without limit. Application failures are
/// dead-lettered on the `max_retries`-th failed replay.
pub fn disposition(
    item: SyncQueueItem,
    result: &GatewayResult<()>,
    max_retries: u32,
    redact: impl Fn(&str) -> String,
) -> ReplayDisposition {
    let error = match result {
        Ok(()) => return ReplayDisposition::Confirmed,
        Err(e) if e.is_conflict() => return ReplayDisposition::AlreadyApplied,
        Err(e) => e,
    };

    if error.is_network() {
        return ReplayDisposition::Retain(item.retried());
    }

    let retried = item.retried();
    if retried.retry_count >= max_retries {
        ReplayDisposition::DeadLetter(DeadLetter {
            reason: redact(&error.to_string()),
            status: error.status(),
            dropped_at: Utc::now().timestamp_millis(),
            item: retried,
        })
    } else {
        ReplayDisposition::Retain(retried)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::HealthLog;
    use crate::gateway::GatewayError;

    fn health_log() -> HealthLog {
        HealthLog {
            id: "log-1".to_string(),
            beneficiary_id: "ben-1".to_string(),
            date: "2024-05-01".to_string(),
            bp_systolic: 140,
            bp_diastolic: 90,
            symptoms: vec!["headache".to_string()],
            mood: "tired".to_string(),
            is_emergency: false,
        }
    }

    #[test]
    fn test_queue_item_persisted_layout() {
        let item = SyncQueueItem::new(Operation::AddHealthLog(health_log()));
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["type"], "ADD_HEALTH_LOG");
        assert_eq!(json["retryCount"], 0);
        assert_eq!(json["payload"]["beneficiaryId"], "ben-1");
        assert!(json["timestamp"].as_i64().unwrap() > 0);

        let back: SyncQueueItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_queue_item_rejects_mismatched_payload() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "type": "TRIGGER_SOS",
            "payload": { "unexpected": true },
            "timestamp": 1,
            "retryCount": 0
        });
        assert!(serde_json::from_value::<SyncQueueItem>(json).is_err());
    }

    #[test]
    fn test_disposition_network_errors_never_exhaust() {
        let mut item = SyncQueueItem::new(Operation::AddHealthLog(health_log()));
        for _ in 0..50 {
            let result = Err(GatewayError::Network("connection refused".into()));
            match disposition(item, &result, 5, str::to_string) {
                ReplayDisposition::Retain(next) => item = next,
                other => panic!("expected retain, got {:?}", other),
            }
        }
        assert_eq!(item.retry_count, 50);
    }

    #[test]
    fn test_disposition_application_error_hits_ceiling() {
        let mut item = SyncQueueItem::new(Operation::AddHealthLog(health_log()));
        let result = Err(GatewayError::Status {
            status: 422,
            message: "invalid".into(),
        });

        for attempt in 1..5 {
            match disposition(item, &result, 5, str::to_string) {
                ReplayDisposition::Retain(next) => {
                    assert_eq!(next.retry_count, attempt);
                    item = next;
                }
                other => panic!("attempt {}: expected retain, got {:?}", attempt, other),
            }
        }

        match disposition(item, &result, 5, str::to_string) {
            ReplayDisposition::DeadLetter(letter) => {
                assert_eq!(letter.status, Some(422));
                assert_eq!(letter.item.retry_count, 5);
            }
            other => panic!("expected dead letter, got {:?}", other),
        }
    }

    #[test]
    fn test_disposition_conflict_is_already_applied() {
        let item = SyncQueueItem::new(Operation::DeleteScheme(DeletePayload { id: "s1".into() }));
        let result = Err(GatewayError::Conflict("exists".into()));
        assert_eq!(
            disposition(item, &result, 5, str::to_string),
            ReplayDisposition::AlreadyApplied
        );
    }

    #[test]
    fn test_apply_local_is_idempotent() {
        use crate::entities::{DailyLog, EnrollmentStatus, Mood};

        let enrollment = Operation::EnrollScheme(Enrollment {
            id: "enr-1".into(),
            scheme_id: "s1".into(),
            beneficiary_id: "ben-1".into(),
            status: EnrollmentStatus::Active,
            enrolled_by: "user-asha".into(),
            date: "2024-05-01".into(),
        });
        let daily = Operation::AddDailyLog(DailyLog {
            id: "day-local".into(),
            user_id: "user-ben".into(),
            date: "2024-05-01".into(),
            symptoms: vec![],
            mood: Mood::Tired,
            notes: String::new(),
            flow: None,
        });

        let mut store = EntityStore::default();
        store.daily_logs.upsert(DailyLog {
            id: "day-server".into(),
            user_id: "user-ben".into(),
            date: "2024-05-01".into(),
            symptoms: vec![],
            mood: Mood::Happy,
            notes: String::new(),
            flow: None,
        });

        for _ in 0..2 {
            enrollment.apply_local(&mut store, "2024-05-01T08:00:00Z");
            daily.apply_local(&mut store, "2024-05-01T08:00:00Z");
        }

        assert_eq!(store.enrollments.len(), 1);
        assert_eq!(store.daily_logs.len(), 1);
        assert!(store.daily_logs.contains("day-local"));
    }
}
