//! Reconciliation with server state
//!
//! All slices are fetched concurrently. Each result is judged on its own:
//! a successful fetch replaces the slice wholesale, a failed one leaves the
//! local slice untouched. Operations still waiting in the sync queue are
//! then laid back over the fresh data, so a record the server has not seen
//! yet never disappears from the store.

use tracing::{debug, warn};

use crate::entities::{
    Alert, BeneficiaryProfile, Child, DailyLog, Enrollment, Entity, HealthLog, Scheme, User,
};
use crate::gateway::{GatewayResult, RemoteGateway};
use crate::queue::SyncQueueItem;
use crate::store::{Collection, EntityStore, Slice};

#[derive(Debug, Clone, PartialEq)]
pub struct SliceFailure {
    pub slice: Slice,
    /// Redacted error text
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub refreshed: Vec<Slice>,
    pub failed: Vec<SliceFailure>,
    pub user_refreshed: bool,
}

impl ReconcileReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of a reconciliation request
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Not attempted while offline
    Offline,
    /// Another fetch or replay held the pipeline
    Busy,
    Completed(ReconcileReport),
}

impl ReconcileOutcome {
    pub fn report(&self) -> Option<&ReconcileReport> {
        match self {
            ReconcileOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// One round of server fetches
pub struct FetchResults {
    pub user: Option<GatewayResult<User>>,
    pub beneficiaries: GatewayResult<Vec<BeneficiaryProfile>>,
    pub children: GatewayResult<Vec<Child>>,
    pub schemes: GatewayResult<Vec<Scheme>>,
    pub enrollments: GatewayResult<Vec<Enrollment>>,
    pub daily_logs: GatewayResult<Vec<DailyLog>>,
    pub health_logs: GatewayResult<Vec<HealthLog>>,
    pub alerts: GatewayResult<Vec<Alert>>,
}

impl FetchResults {
    /// Issue every fetch concurrently. The current user is only requested
    /// for an authenticated session.
    pub async fn fetch_all(gateway: &dyn RemoteGateway, authenticated: bool) -> Self {
        let user = async {
            if authenticated {
                Some(gateway.current_user().await)
            } else {
                None
            }
        };

        let (user, beneficiaries, children, schemes, enrollments, daily_logs, health_logs, alerts) = tokio::join!(
            user,
            gateway.list_beneficiaries(),
            gateway.list_children(),
            gateway.list_schemes(),
            gateway.list_enrollments(),
            gateway.list_daily_logs(),
            gateway.list_health_logs(),
            gateway.list_alerts(),
        );

        Self {
            user,
            beneficiaries,
            children,
            schemes,
            enrollments,
            daily_logs,
            health_logs,
            alerts,
        }
    }

    /// Replace the slices whose fetch succeeded. Returns the refreshed user,
    /// if any, alongside the report.
    pub fn apply<R>(self, store: &mut EntityStore, redact: R) -> (Option<User>, ReconcileReport)
    where
        R: Fn(&str) -> String,
    {
        let mut report = ReconcileReport::default();

        replace_slice(Slice::Beneficiaries, &mut store.beneficiaries, self.beneficiaries, &mut report, &redact);
        replace_slice(Slice::Children, &mut store.children, self.children, &mut report, &redact);
        replace_slice(Slice::Schemes, &mut store.schemes, self.schemes, &mut report, &redact);
        replace_slice(Slice::Enrollments, &mut store.enrollments, self.enrollments, &mut report, &redact);
        replace_slice(Slice::DailyLogs, &mut store.daily_logs, self.daily_logs, &mut report, &redact);
        replace_slice(Slice::HealthLogs, &mut store.health_logs, self.health_logs, &mut report, &redact);
        replace_slice(Slice::Alerts, &mut store.alerts, self.alerts, &mut report, &redact);

        let user = match self.user {
            Some(Ok(user)) => {
                report.user_refreshed = true;
                Some(user)
            }
            Some(Err(e)) => {
                warn!(error = %redact(&e.to_string()), "Failed to refresh current user");
                None
            }
            None => None,
        };

        (user, report)
    }
}

/// Re-apply every queued operation, oldest first, over refreshed slices
pub fn overlay_pending(store: &mut EntityStore, pending: &[SyncQueueItem]) {
    if pending.is_empty() {
        return;
    }
    for item in pending {
        item.reapply(store);
    }
    debug!(pending = pending.len(), "Re-applied queued operations over server data");
}

fn replace_slice<T: Entity>(
    slice: Slice,
    target: &mut Collection<T>,
    result: GatewayResult<Vec<T>>,
    report: &mut ReconcileReport,
    redact: &impl Fn(&str) -> String,
) {
    match result {
        Ok(items) => {
            debug!(slice = %slice, count = items.len(), "Replacing slice with server data");
            *target = Collection::from_vec(items);
            report.refreshed.push(slice);
        }
        Err(e) => {
            let error = redact(&e.to_string());
            warn!(slice = %slice, error = %error, "Fetch failed, keeping local slice");
            report.failed.push(SliceFailure { slice, error });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{AlertKind, Role};
    use crate::gateway::GatewayError;

    fn profile(id: &str) -> BeneficiaryProfile {
        BeneficiaryProfile {
            id: id.to_string(),
            name: format!("Beneficiary {}", id),
            ..Default::default()
        }
    }

    fn results() -> FetchResults {
        FetchResults {
            user: None,
            beneficiaries: Ok(vec![]),
            children: Ok(vec![]),
            schemes: Ok(vec![]),
            enrollments: Ok(vec![]),
            daily_logs: Ok(vec![]),
            health_logs: Ok(vec![]),
            alerts: Ok(vec![]),
        }
    }

    #[test]
    fn test_failed_slice_is_kept() {
        let mut store = EntityStore::default();
        store.beneficiaries.upsert(profile("old"));
        store
            .alerts
            .upsert(Alert::sos("a1".into(), "old".into(), "t".into()));

        let fetched = FetchResults {
            beneficiaries: Ok(vec![profile("b1"), profile("b2")]),
            alerts: Err(GatewayError::Status {
                status: 502,
                message: "bad gateway".into(),
            }),
            ..results()
        };

        let (user, report) = fetched.apply(&mut store, str::to_string);

        assert!(user.is_none());
        assert_eq!(store.beneficiaries.len(), 2);
        assert!(!store.beneficiaries.contains("old"));
        assert_eq!(store.alerts.len(), 1);
        assert_eq!(store.alerts.as_slice()[0].kind, AlertKind::Sos);
        assert_eq!(report.refreshed.len(), 6);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].slice, Slice::Alerts);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_pending_operations_survive_refresh() {
        use crate::entities::AlertStatus;
        use crate::queue::{DeletePayload, Operation, ResolveAlertPayload, SosPayload};

        let visit = HealthLog {
            id: "log-local".into(),
            beneficiary_id: "b1".into(),
            date: "2024-05-01".into(),
            bp_systolic: 150,
            bp_diastolic: 95,
            symptoms: vec![],
            mood: "anxious".into(),
            is_emergency: false,
        };
        let pending = vec![
            SyncQueueItem::new(Operation::AddHealthLog(visit)),
            SyncQueueItem::new(Operation::TriggerSos(SosPayload {
                id: "sos-local".into(),
                beneficiary_id: "b1".into(),
            })),
            SyncQueueItem::new(Operation::ResolveAlert(ResolveAlertPayload {
                alert_id: "a-server".into(),
                notes: Some("visited".into()),
            })),
            SyncQueueItem::new(Operation::DeleteBeneficiary(DeletePayload { id: "b2".into() })),
        ];

        let mut store = EntityStore::default();
        let fetched = FetchResults {
            beneficiaries: Ok(vec![profile("b1"), profile("b2")]),
            alerts: Ok(vec![Alert::sos("a-server".into(), "b1".into(), "t".into())]),
            ..results()
        };
        fetched.apply(&mut store, str::to_string);
        overlay_pending(&mut store, &pending);
        // A second pass over the same data changes nothing
        overlay_pending(&mut store, &pending);

        assert!(store.health_logs.contains("log-local"));
        assert_eq!(store.alerts.len(), 2);
        assert_eq!(store.alerts.as_slice()[0].id, "sos-local");
        assert_eq!(
            store.alerts.get("a-server").map(|a| a.status),
            Some(AlertStatus::Resolved)
        );
        assert!(!store.beneficiaries.contains("b2"));
        assert!(store.beneficiaries.contains("b1"));
    }

    #[test]
    fn test_user_refresh_reported() {
        let fetched = FetchResults {
            user: Some(Ok(User {
                id: "u1".into(),
                name: "Meena".into(),
                role: Role::AshaWorker,
                avatar: None,
            })),
            ..results()
        };

        let mut store = EntityStore::default();
        let (user, report) = fetched.apply(&mut store, str::to_string);
        assert_eq!(user.map(|u| u.role), Some(Role::AshaWorker));
        assert!(report.user_refreshed);
        assert!(report.is_complete());
    }
}
