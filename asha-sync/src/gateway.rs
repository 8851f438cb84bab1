//! Remote gateway contract
//!
//! One async method per queued operation kind, one list method per entity
//! slice, plus the always-online profile calls. Implementations classify
//! every outcome into a [`GatewayError`] variant so the replay loop can
//! decide between retry, discard and dead-letter without inspecting
//! transport details.

use async_trait::async_trait;
use thiserror::Error;

use crate::entities::{
    Alert, BeneficiaryProfile, Child, ChildUpdate, DailyLog, Enrollment, HealthLog,
    ProfileUpdate, Scheme, SchemeUpdate, User,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// No response was received
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The effect already exists on the server
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Transient failures that are retried without limit
    pub fn is_network(&self) -> bool {
        matches!(self, GatewayError::Network(_) | GatewayError::Timeout(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, GatewayError::Conflict(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Status { status, .. } => Some(*status),
            GatewayError::Conflict(_) => Some(409),
            _ => None,
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[async_trait]
pub trait RemoteGateway: Send + Sync {
    // Mutations. Response bodies are not interpreted; reconciliation picks
    // up the server's canonical records.
    async fn create_health_log(&self, log: &HealthLog) -> GatewayResult<()>;
    async fn create_daily_log(&self, log: &DailyLog) -> GatewayResult<()>;
    async fn update_profile(&self, id: &str, updates: &ProfileUpdate) -> GatewayResult<()>;
    async fn trigger_sos(&self, beneficiary_id: &str) -> GatewayResult<()>;
    async fn enroll(&self, scheme_id: &str, beneficiary_id: &str) -> GatewayResult<()>;
    async fn create_child(&self, child: &Child) -> GatewayResult<()>;
    async fn update_child(&self, id: &str, updates: &ChildUpdate) -> GatewayResult<()>;
    async fn create_scheme(&self, scheme: &Scheme) -> GatewayResult<()>;
    async fn update_scheme(&self, id: &str, updates: &SchemeUpdate) -> GatewayResult<()>;
    async fn resolve_alert(&self, id: &str, notes: Option<&str>) -> GatewayResult<()>;
    async fn delete_beneficiary(&self, id: &str) -> GatewayResult<()>;
    async fn delete_scheme(&self, id: &str) -> GatewayResult<()>;

    // Reconciliation fetches
    async fn list_beneficiaries(&self) -> GatewayResult<Vec<BeneficiaryProfile>>;
    async fn list_children(&self) -> GatewayResult<Vec<Child>>;
    async fn list_schemes(&self) -> GatewayResult<Vec<Scheme>>;
    async fn list_enrollments(&self) -> GatewayResult<Vec<Enrollment>>;
    async fn list_daily_logs(&self) -> GatewayResult<Vec<DailyLog>>;
    async fn list_health_logs(&self) -> GatewayResult<Vec<HealthLog>>;
    async fn list_alerts(&self) -> GatewayResult<Vec<Alert>>;

    // Session
    async fn current_user(&self) -> GatewayResult<User>;
    /// `Ok(None)` when the caller has no beneficiary profile yet
    async fn my_profile(&self) -> GatewayResult<Option<BeneficiaryProfile>>;
    async fn create_profile(&self, name: &str) -> GatewayResult<BeneficiaryProfile>;

    /// Liveness probe used by connectivity detection
    async fn health(&self) -> GatewayResult<()>;
}
