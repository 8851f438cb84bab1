//! Shared fixtures for the engine integration tests
//!
//! `ScriptedGateway` is an in-process stand-in for the REST API: mutation
//! calls are recorded in order and answered from a script, list calls serve
//! an in-memory copy of server data.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use asha_sync::entities::{
    Alert, BeneficiaryProfile, Child, ChildUpdate, DailyLog, Enrollment, HealthLog,
    HealthLogDraft, ProfileUpdate, Role, Scheme, SchemeUpdate, User,
};
use asha_sync::{
    EntityStore, GatewayError, GatewayResult, MemoryStateStore, RemoteGateway, Slice, StateStore,
    SyncConfig, SyncEngine, SyncError, SyncResult,
};

pub struct ScriptedGateway {
    calls: Mutex<Vec<String>>,
    script: Mutex<VecDeque<GatewayResult<()>>>,
    default_outcome: Mutex<GatewayResult<()>>,
    server: Mutex<EntityStore>,
    failing: Mutex<Vec<Slice>>,
    user: Mutex<Option<User>>,
    profile: Mutex<Option<BeneficiaryProfile>>,
    fetch_rounds: AtomicUsize,
    held: AtomicBool,
    release: Semaphore,
    waiting: AtomicUsize,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            default_outcome: Mutex::new(Ok(())),
            server: Mutex::new(EntityStore::default()),
            failing: Mutex::new(Vec::new()),
            user: Mutex::new(None),
            profile: Mutex::new(None),
            fetch_rounds: AtomicUsize::new(0),
            held: AtomicBool::new(false),
            release: Semaphore::new(0),
            waiting: AtomicUsize::new(0),
        }
    }
}

impl ScriptedGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Gateway whose mutation calls all fail with a connection error
    pub fn unreachable() -> Arc<Self> {
        let gateway = Self::new();
        gateway.set_default(Err(network_error()));
        gateway
    }

    /// Answer every unscripted mutation call with `outcome`
    pub fn set_default(&self, outcome: GatewayResult<()>) {
        *self.default_outcome.lock() = outcome;
    }

    /// Answer the next mutation call with `outcome`
    pub fn push_outcome(&self, outcome: GatewayResult<()>) {
        self.script.lock().push_back(outcome);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn fetch_rounds(&self) -> usize {
        self.fetch_rounds.load(Ordering::SeqCst)
    }

    pub fn server(&self) -> parking_lot::MutexGuard<'_, EntityStore> {
        self.server.lock()
    }

    pub fn fail_slice(&self, slice: Slice) {
        self.failing.lock().push(slice);
    }

    pub fn set_user(&self, user: User) {
        *self.user.lock() = Some(user);
    }

    pub fn set_profile(&self, profile: BeneficiaryProfile) {
        *self.profile.lock() = Some(profile);
    }

    /// Make mutation calls wait until [`ScriptedGateway::release`]
    pub fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.release.add_permits(1_000);
    }

    /// Resolves once a mutation call is parked by [`ScriptedGateway::hold`]
    pub async fn wait_entered(&self) {
        for _ in 0..500 {
            if self.waiting.load(Ordering::SeqCst) > 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no gateway call arrived");
    }

    async fn mutation(&self, label: String) -> GatewayResult<()> {
        self.calls.lock().push(label);

        if self.held.load(Ordering::SeqCst) {
            self.waiting.fetch_add(1, Ordering::SeqCst);
            self.release
                .acquire()
                .await
                .expect("semaphore closed")
                .forget();
            self.waiting.fetch_sub(1, Ordering::SeqCst);
        }

        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| self.default_outcome.lock().clone())
    }

    fn list<T: Clone>(&self, slice: Slice, read: impl FnOnce(&EntityStore) -> Vec<T>) -> GatewayResult<Vec<T>> {
        if self.failing.lock().contains(&slice) {
            return Err(GatewayError::Status {
                status: 503,
                message: format!("{} unavailable", slice),
            });
        }
        Ok(read(&self.server.lock()))
    }
}

#[async_trait]
impl RemoteGateway for ScriptedGateway {
    async fn create_health_log(&self, log: &HealthLog) -> GatewayResult<()> {
        let result = self.mutation(format!("create_health_log:{}", log.id)).await;
        if result.is_ok() {
            self.server.lock().health_logs.upsert(log.clone());
        }
        result
    }

    async fn create_daily_log(&self, log: &DailyLog) -> GatewayResult<()> {
        self.mutation(format!("create_daily_log:{}", log.id)).await
    }

    async fn update_profile(&self, id: &str, _updates: &ProfileUpdate) -> GatewayResult<()> {
        self.mutation(format!("update_profile:{}", id)).await
    }

    async fn trigger_sos(&self, beneficiary_id: &str) -> GatewayResult<()> {
        self.mutation(format!("trigger_sos:{}", beneficiary_id)).await
    }

    async fn enroll(&self, scheme_id: &str, beneficiary_id: &str) -> GatewayResult<()> {
        self.mutation(format!("enroll:{}:{}", scheme_id, beneficiary_id)).await
    }

    async fn create_child(&self, child: &Child) -> GatewayResult<()> {
        self.mutation(format!("create_child:{}", child.id)).await
    }

    async fn update_child(&self, id: &str, _updates: &ChildUpdate) -> GatewayResult<()> {
        self.mutation(format!("update_child:{}", id)).await
    }

    async fn create_scheme(&self, scheme: &Scheme) -> GatewayResult<()> {
        self.mutation(format!("create_scheme:{}", scheme.id)).await
    }

    async fn update_scheme(&self, id: &str, _updates: &SchemeUpdate) -> GatewayResult<()> {
        self.mutation(format!("update_scheme:{}", id)).await
    }

    async fn resolve_alert(&self, id: &str, _notes: Option<&str>) -> GatewayResult<()> {
        self.mutation(format!("resolve_alert:{}", id)).await
    }

    async fn delete_beneficiary(&self, id: &str) -> GatewayResult<()> {
        self.mutation(format!("delete_beneficiary:{}", id)).await
    }

    async fn delete_scheme(&self, id: &str) -> GatewayResult<()> {
        self.mutation(format!("delete_scheme:{}", id)).await
    }

    async fn list_beneficiaries(&self) -> GatewayResult<Vec<BeneficiaryProfile>> {
        self.fetch_rounds.fetch_add(1, Ordering::SeqCst);
        self.list(Slice::Beneficiaries, |s| s.beneficiaries.as_slice().to_vec())
    }

    async fn list_children(&self) -> GatewayResult<Vec<Child>> {
        self.list(Slice::Children, |s| s.children.as_slice().to_vec())
    }

    async fn list_schemes(&self) -> GatewayResult<Vec<Scheme>> {
        self.list(Slice::Schemes, |s| s.schemes.as_slice().to_vec())
    }

    async fn list_enrollments(&self) -> GatewayResult<Vec<Enrollment>> {
        self.list(Slice::Enrollments, |s| s.enrollments.as_slice().to_vec())
    }

    async fn list_daily_logs(&self) -> GatewayResult<Vec<DailyLog>> {
        self.list(Slice::DailyLogs, |s| s.daily_logs.as_slice().to_vec())
    }

    async fn list_health_logs(&self) -> GatewayResult<Vec<HealthLog>> {
        self.list(Slice::HealthLogs, |s| s.health_logs.as_slice().to_vec())
    }

    async fn list_alerts(&self) -> GatewayResult<Vec<Alert>> {
        self.list(Slice::Alerts, |s| s.alerts.as_slice().to_vec())
    }

    async fn current_user(&self) -> GatewayResult<User> {
        self.user.lock().clone().ok_or(GatewayError::Status {
            status: 401,
            message: "not authenticated".to_string(),
        })
    }

    async fn my_profile(&self) -> GatewayResult<Option<BeneficiaryProfile>> {
        Ok(self.profile.lock().clone())
    }

    async fn create_profile(&self, name: &str) -> GatewayResult<BeneficiaryProfile> {
        self.calls.lock().push(format!("create_profile:{}", name));
        let profile = BeneficiaryProfile {
            id: "ben-created".to_string(),
            user_id: "user-ben".to_string(),
            name: name.to_string(),
            ..Default::default()
        };
        *self.profile.lock() = Some(profile.clone());
        Ok(profile)
    }

    async fn health(&self) -> GatewayResult<()> {
        Ok(())
    }
}

/// In-memory state store whose first `failures` loads return an error
pub struct FlakyStore {
    inner: MemoryStateStore,
    failures: AtomicUsize,
    loads: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: MemoryStateStore, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            inner,
            failures: AtomicUsize::new(failures),
            loads: AtomicUsize::new(0),
        })
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.inner.get(name)
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateStore for FlakyStore {
    async fn load(&self, name: &str) -> SyncResult<Option<String>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SyncError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.load(name).await
    }

    async fn save(&self, name: &str, value: &str) -> SyncResult<()> {
        self.inner.save(name, value).await
    }

    async fn remove(&self, name: &str) -> SyncResult<()> {
        self.inner.remove(name).await
    }
}

pub fn network_error() -> GatewayError {
    GatewayError::Network("connection refused".to_string())
}

pub fn unprocessable() -> GatewayError {
    GatewayError::Status {
        status: 422,
        message: "validation failed".to_string(),
    }
}

pub fn test_config() -> SyncConfig {
    SyncConfig {
        auth_token: Some("test-token".to_string()),
        ..Default::default()
    }
}

/// Hydrated engine over `gateway` and `storage`
pub async fn open_engine(gateway: &Arc<ScriptedGateway>, storage: &Arc<MemoryStateStore>) -> Arc<SyncEngine> {
    SyncEngine::open(test_config(), gateway.clone(), storage.clone()).await
}

/// Hydrated engine over fresh in-memory storage, started offline
pub async fn offline_engine(gateway: &Arc<ScriptedGateway>) -> (Arc<SyncEngine>, Arc<MemoryStateStore>) {
    let storage = Arc::new(MemoryStateStore::new());
    let engine = open_engine(gateway, &storage).await;
    engine.go_offline();
    (engine, storage)
}

pub fn health_log_draft(beneficiary_id: &str, systolic: u32) -> HealthLogDraft {
    HealthLogDraft {
        beneficiary_id: beneficiary_id.to_string(),
        date: "2024-06-01".to_string(),
        bp_systolic: systolic,
        bp_diastolic: 85,
        symptoms: vec!["swelling".to_string()],
        mood: "tired".to_string(),
        is_emergency: false,
    }
}

pub fn worker() -> User {
    User {
        id: "user-asha".to_string(),
        name: "Sunita Devi".to_string(),
        role: Role::AshaWorker,
        avatar: None,
    }
}

pub fn beneficiary_user() -> User {
    User {
        id: "user-ben".to_string(),
        name: "Priya".to_string(),
        role: Role::Beneficiary,
        avatar: None,
    }
}

pub fn profile(id: &str) -> BeneficiaryProfile {
    BeneficiaryProfile {
        id: id.to_string(),
        user_id: format!("user-{}", id),
        name: format!("Beneficiary {}", id),
        ..Default::default()
    }
}
