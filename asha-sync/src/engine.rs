//! Offline-first sync engine
//!
//! [`SyncEngine`] owns the application state and drives every write through
//! the optimistic mutation protocol:
//!
//! 1. apply the change to local state (synchronously) and persist it
//! 2. attempt the matching remote call
//! 3. on anything but success or conflict, append a queue item
//!
//! Queue replay and reconciliation share one async pipeline lock, so at most
//! one of them touches the remote API at a time. Mutations never wait on it.

use chrono::Utc;
use logger_redacted::PiiRedactor;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::entities::{
    Alert, AlertStatus, BeneficiaryProfile, ChildDraft, ChildUpdate, DailyLog, DailyLogDraft,
    Enrollment, EnrollmentStatus, HealthLogDraft, Language, ProfileUpdate, Role, SchemeDraft,
    SchemeUpdate, Theme, User,
};
use crate::error::{SyncError, SyncResult};
use crate::gateway::RemoteGateway;
use crate::persistence::{decode_state, encode_state, HydrationOutcome, StateStore};
use crate::queue::{
    disposition, ChildUpdatePayload, DeadLetter, DeletePayload, Operation, ProfileUpdatePayload,
    ReplayDisposition, ReplayReport, ResolveAlertPayload, SchemeUpdatePayload, SosPayload,
    SyncQueueItem,
};
use crate::reconcile::{overlay_pending, FetchResults, ReconcileOutcome, ReconcileReport};
use crate::store::AppState;

/// Reads of the persisted record attempted before giving up
const LOAD_ATTEMPTS: u32 = 3;
const LOAD_RETRY_DELAY: Duration = Duration::from_millis(100);

/// What happened to a mutation's remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Server accepted it, or already had it
    Confirmed,
    /// Remote call failed; the operation waits in the queue under this id
    Queued(Uuid),
    /// Nothing to do (e.g. enrollment already present)
    Unchanged,
}

impl MutationOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, MutationOutcome::Queued(_))
    }
}

/// Point-in-time view of the engine flags and queue sizes
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStatus {
    pub online: bool,
    pub syncing: bool,
    pub fetching: bool,
    pub hydrated: bool,
    /// Writes to storage are suspended because the stored record could not
    /// be read
    pub read_only: bool,
    pub authenticated: bool,
    pub queue_len: usize,
    pub dead_letters: usize,
    pub current_user: Option<User>,
    pub theme: Theme,
    pub language: Language,
}

pub struct SyncEngine {
    config: SyncConfig,
    gateway: Arc<dyn RemoteGateway>,
    storage: Arc<dyn StateStore>,
    redactor: PiiRedactor,

    state: Mutex<AppState>,
    persist_lock: AsyncMutex<()>,
    pipeline: AsyncMutex<()>,

    online: AtomicBool,
    syncing: AtomicBool,
    fetching: AtomicBool,
    authenticated: AtomicBool,
    hydration_started: AtomicBool,
    hydrated: watch::Sender<bool>,
    read_only: AtomicBool,
}

impl SyncEngine {
    /// Create an engine with empty state. Call [`SyncEngine::hydrate`]
    /// before relying on persisted data; writes are not persisted until then.
    pub fn new(
        config: SyncConfig,
        gateway: Arc<dyn RemoteGateway>,
        storage: Arc<dyn StateStore>,
    ) -> Self {
        let (hydrated, _) = watch::channel(false);
        Self {
            online: AtomicBool::new(config.start_online),
            authenticated: AtomicBool::new(config.auth_token.is_some()),
            config,
            gateway,
            storage,
            redactor: PiiRedactor::default(),
            state: Mutex::new(AppState::default()),
            persist_lock: AsyncMutex::new(()),
            pipeline: AsyncMutex::new(()),
            syncing: AtomicBool::new(false),
            fetching: AtomicBool::new(false),
            hydration_started: AtomicBool::new(false),
            hydrated,
            read_only: AtomicBool::new(false),
        }
    }

    /// Create and hydrate in one step
    pub async fn open(
        config: SyncConfig,
        gateway: Arc<dyn RemoteGateway>,
        storage: Arc<dyn StateStore>,
    ) -> Arc<Self> {
        let engine = Arc::new(Self::new(config, gateway, storage));
        engine.hydrate().await;
        engine
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn redactor(&self) -> &PiiRedactor {
        &self.redactor
    }

    // ------------------------------------------------------------------
    // Hydration and persistence
    // ------------------------------------------------------------------

    /// Load the persisted record. Only the first call does any work; any
    /// later call waits for it and returns `None`.
    ///
    /// If the record cannot be read even after retrying, the engine starts
    /// empty in read-only mode: nothing is written back, so the stored
    /// record survives for a later run.
    pub async fn hydrate(&self) -> Option<HydrationOutcome> {
        if self.hydration_started.swap(true, Ordering::SeqCst) {
            self.wait_hydrated().await;
            return None;
        }

        let (loaded, outcome) = match self.load_persisted().await {
            Ok(raw) => {
                let (state, outcome) = decode_state(raw.as_deref());
                if let (HydrationOutcome::UnsupportedVersion(version), Some(raw)) = (&outcome, raw.as_deref()) {
                    self.back_up_record(*version, raw).await;
                }
                (state, outcome)
            }
            Err(e) => {
                self.read_only.store(true, Ordering::SeqCst);
                (AppState::default(), HydrationOutcome::Unavailable(e.to_string()))
            }
        };

        match &outcome {
            HydrationOutcome::Restored => info!(key = %self.config.storage_key, "Restored persisted state"),
            HydrationOutcome::Missing => info!(key = %self.config.storage_key, "No persisted state, starting empty"),
            HydrationOutcome::Malformed(e) => {
                logger_redacted::redacted_warn!("Persisted state is malformed, starting empty: {}", e)
            }
            HydrationOutcome::UnsupportedVersion(v) => {
                warn!(
                    version = v,
                    backup = %Self::backup_key(&self.config.storage_key, *v),
                    "Persisted state has an unknown version, starting empty"
                )
            }
            HydrationOutcome::Unavailable(e) => {
                logger_redacted::redacted_error!("Failed to read persisted state, writes disabled: {}", e)
            }
        }

        let pending_changes = {
            let mut state = self.state.lock();
            let pending = std::mem::replace(&mut *state, loaded);
            let changed = pending.has_changes();
            state.absorb(pending);
            changed
        };

        self.hydrated.send_replace(true);

        if pending_changes {
            self.persist().await;
        }
        Some(outcome)
    }

    async fn load_persisted(&self) -> SyncResult<Option<String>> {
        let mut attempt = 1;
        loop {
            match self.storage.load(&self.config.storage_key).await {
                Ok(raw) => return Ok(raw),
                Err(e) if attempt < LOAD_ATTEMPTS => {
                    warn!(attempt, error = %e, "Failed to read persisted state, retrying");
                    tokio::time::sleep(LOAD_RETRY_DELAY * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Name a record written by a newer layout is kept under
    pub fn backup_key(storage_key: &str, version: u32) -> String {
        format!("{}.v{}.backup", storage_key, version)
    }

    /// Copy a record this build cannot read aside before it gets replaced.
    /// Without a copy the engine stays read-only.
    async fn back_up_record(&self, version: u32, raw: &str) {
        let backup = Self::backup_key(&self.config.storage_key, version);
        if let Err(e) = self.storage.save(&backup, raw).await {
            error!(backup = %backup, error = %e, "Failed to back up persisted state, writes disabled");
            self.read_only.store(true, Ordering::SeqCst);
        }
    }

    pub fn is_hydrated(&self) -> bool {
        *self.hydrated.borrow()
    }

    /// `true` when the stored record could not be read or backed up and
    /// local changes are kept in memory only
    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::SeqCst)
    }

    /// Resolves once the first hydration attempt has finished
    pub async fn wait_hydrated(&self) {
        let mut rx = self.hydrated.subscribe();
        // The sender lives as long as the engine, so this cannot fail.
        let _ = rx.wait_for(|hydrated| *hydrated).await;
    }

    /// Write a snapshot of the whole state. Failures are logged; the next
    /// write tries again.
    async fn persist(&self) {
        if !self.is_hydrated() {
            debug!("Skipping persistence before hydration");
            return;
        }
        if self.is_read_only() {
            warn!(key = %self.config.storage_key, "Stored state is read-only, change kept in memory");
            return;
        }

        let _guard = self.persist_lock.lock().await;
        let encoded = {
            let state = self.state.lock();
            encode_state(&state)
        };

        let result = match encoded {
            Ok(json) => self.storage.save(&self.config.storage_key, &json).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            error!(error = %e, "Failed to persist state");
        }
    }

    async fn update_state<R>(&self, f: impl FnOnce(&mut AppState) -> R) -> R {
        let result = {
            let mut state = self.state.lock();
            f(&mut state)
        };
        self.persist().await;
        result
    }

    // ------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------

    /// Run `f` against the current state
    pub fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        let state = self.state.lock();
        f(&state)
    }

    pub fn snapshot(&self) -> AppState {
        self.state.lock().clone()
    }

    pub fn queue(&self) -> Vec<SyncQueueItem> {
        self.read(|s| s.sync_queue.clone())
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.read(|s| s.dead_letters.clone())
    }

    /// Remove and return every dead letter
    pub async fn take_dead_letters(&self) -> Vec<DeadLetter> {
        self.update_state(|s| std::mem::take(&mut s.dead_letters)).await
    }

    pub fn current_user(&self) -> Option<User> {
        self.read(|s| s.current_user.clone())
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching.load(Ordering::SeqCst)
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> EngineStatus {
        let (queue_len, dead_letters, current_user, theme, language) = self.read(|s| {
            (
                s.sync_queue.len(),
                s.dead_letters.len(),
                s.current_user.clone(),
                s.theme,
                s.language,
            )
        });
        EngineStatus {
            online: self.is_online(),
            syncing: self.is_syncing(),
            fetching: self.is_fetching(),
            hydrated: self.is_hydrated(),
            read_only: self.is_read_only(),
            authenticated: self.is_authenticated(),
            queue_len,
            dead_letters,
            current_user,
            theme,
            language,
        }
    }

    // ------------------------------------------------------------------
    // Session and preferences
    // ------------------------------------------------------------------

    pub async fn login(&self, user: User) {
        info!(user_id = %user.id, role = ?user.role, "User logged in");
        self.authenticated.store(true, Ordering::SeqCst);
        self.update_state(|s| s.current_user = Some(user)).await;
    }

    /// End the session: forget the user and the per-user slices. Queued
    /// operations are kept for the next session.
    pub async fn logout(&self) {
        self.authenticated.store(false, Ordering::SeqCst);
        self.reset_session().await;
        info!("User logged out");
    }

    pub async fn reset_session(&self) {
        self.update_state(|s| {
            s.current_user = None;
            s.entities.clear_session_data();
        })
        .await;
    }

    pub async fn toggle_theme(&self) -> Theme {
        self.update_state(|s| {
            s.theme = s.theme.toggled();
            s.theme
        })
        .await
    }

    pub async fn set_language(&self, language: Language) {
        self.update_state(|s| s.language = language).await;
    }

    // ------------------------------------------------------------------
    // Optimistic mutations
    // ------------------------------------------------------------------

    /// Apply locally, persist, then try the remote call.
    async fn mutate(&self, apply: impl FnOnce(&mut AppState), operation: Operation) -> MutationOutcome {
        self.update_state(apply).await;
        self.dispatch(operation).await
    }

    async fn dispatch(&self, operation: Operation) -> MutationOutcome {
        let kind = operation.kind();
        match operation.send(self.gateway.as_ref()).await {
            Ok(()) => {
                debug!(kind = %kind, entity_id = %operation.entity_id(), "Remote call confirmed");
                MutationOutcome::Confirmed
            }
            Err(e) if e.is_conflict() => {
                debug!(kind = %kind, entity_id = %operation.entity_id(), "Remote already has this change");
                MutationOutcome::Confirmed
            }
            Err(e) => {
                let item = SyncQueueItem::new(operation);
                let item_id = item.id;
                info!(
                    kind = %kind,
                    item_id = %item_id,
                    error = %self.redactor.redact(&e.to_string()),
                    "Remote call failed, queued for replay"
                );
                self.update_state(|s| s.sync_queue.push(item)).await;
                MutationOutcome::Queued(item_id)
            }
        }
    }

    fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    fn now_iso() -> String {
        Utc::now().to_rfc3339()
    }

    pub async fn add_health_log(&self, draft: HealthLogDraft) -> MutationOutcome {
        let log = draft.with_id(Self::new_id());
        let stored = log.clone();
        self.mutate(
            |s| {
                s.entities.health_logs.upsert(stored);
            },
            Operation::AddHealthLog(log),
        )
        .await
    }

    /// One entry per user and day: an existing entry for the same date is
    /// replaced.
    pub async fn add_daily_log(&self, draft: DailyLogDraft) -> MutationOutcome {
        let log = draft.with_id(Self::new_id());
        let stored = log.clone();
        self.mutate(
            |s| {
                s.entities
                    .daily_logs
                    .retain(|l| !(l.user_id == stored.user_id && l.date == stored.date));
                s.entities.daily_logs.upsert(stored);
            },
            Operation::AddDailyLog(log),
        )
        .await
    }

    /// Local edit only; returns `false` if no log has this id.
    pub async fn update_daily_log(&self, log: DailyLog) -> bool {
        self.update_state(|s| {
            let id = log.id.clone();
            s.entities.daily_logs.update(&id, |existing| *existing = log)
        })
        .await
    }

    pub async fn update_beneficiary_profile(&self, id: &str, updates: ProfileUpdate) -> MutationOutcome {
        let operation = Operation::UpdateProfile(ProfileUpdatePayload {
            id: id.to_string(),
            updates: updates.clone(),
        });
        self.mutate(
            |s| {
                s.entities.beneficiaries.update(id, |p| updates.apply_to(p));
            },
            operation,
        )
        .await
    }

    /// Removes the profile together with its children, health logs, alerts
    /// and enrollments.
    pub async fn delete_beneficiary(&self, id: &str) -> MutationOutcome {
        self.mutate(
            |s| {
                s.entities.remove_beneficiary_cascade(id);
            },
            Operation::DeleteBeneficiary(DeletePayload { id: id.to_string() }),
        )
        .await
    }

    pub async fn add_child(&self, draft: ChildDraft) -> MutationOutcome {
        let child = draft.with_id(Self::new_id());
        let stored = child.clone();
        self.mutate(
            |s| {
                s.entities.children.upsert(stored);
            },
            Operation::AddChild(child),
        )
        .await
    }

    pub async fn update_child(&self, id: &str, updates: ChildUpdate) -> MutationOutcome {
        let operation = Operation::UpdateChild(ChildUpdatePayload {
            id: id.to_string(),
            updates: updates.clone(),
        });
        self.mutate(
            |s| {
                s.entities.children.update(id, |c| updates.apply_to(c));
            },
            operation,
        )
        .await
    }

    /// Raise an SOS alert. It appears at the top of the alert list at once.
    pub async fn trigger_sos(&self, beneficiary_id: &str) -> MutationOutcome {
        let alert_id = Self::new_id();
        let mut alert = Alert::sos(alert_id.clone(), beneficiary_id.to_string(), Self::now_iso());
        alert.triggered_by = self.current_user().map(|u| u.id);

        warn!(alert_id = %alert_id, "SOS triggered");
        self.mutate(
            |s| {
                s.entities.alerts.upsert_front(alert);
            },
            Operation::TriggerSos(SosPayload {
                id: alert_id,
                beneficiary_id: beneficiary_id.to_string(),
            }),
        )
        .await
    }

    pub async fn resolve_alert(&self, alert_id: &str, notes: Option<String>) -> MutationOutcome {
        let resolved_by = self.current_user().map(|u| u.id);
        let resolved_at = Self::now_iso();
        let operation = Operation::ResolveAlert(ResolveAlertPayload {
            alert_id: alert_id.to_string(),
            notes: notes.clone(),
        });
        self.mutate(
            |s| {
                s.entities.alerts.update(alert_id, |a| {
                    a.status = AlertStatus::Resolved;
                    a.resolved_at = Some(resolved_at);
                    a.resolved_by = resolved_by;
                    a.resolution_notes = notes;
                });
            },
            operation,
        )
        .await
    }

    /// Record an alert pushed by the server. Returns `false` for a
    /// duplicate id.
    pub async fn add_incoming_alert(&self, alert: Alert) -> bool {
        let added = {
            let mut state = self.state.lock();
            if state.entities.alerts.contains(&alert.id) {
                false
            } else {
                state.entities.alerts.upsert_front(alert)
            }
        };
        if added {
            self.persist().await;
        }
        added
    }

    pub async fn add_scheme(&self, draft: SchemeDraft) -> MutationOutcome {
        let scheme = draft.with_id(Self::new_id());
        let stored = scheme.clone();
        self.mutate(
            |s| {
                s.entities.schemes.upsert(stored);
            },
            Operation::AddScheme(scheme),
        )
        .await
    }

    pub async fn update_scheme(&self, id: &str, updates: SchemeUpdate) -> MutationOutcome {
        let operation = Operation::UpdateScheme(SchemeUpdatePayload {
            scheme_id: id.to_string(),
            scheme_updates: updates.clone(),
        });
        self.mutate(
            |s| {
                s.entities.schemes.update(id, |scheme| updates.apply_to(scheme));
            },
            operation,
        )
        .await
    }

    pub async fn delete_scheme(&self, id: &str) -> MutationOutcome {
        self.mutate(
            |s| {
                s.entities.schemes.remove(id);
            },
            Operation::DeleteScheme(DeletePayload { id: id.to_string() }),
        )
        .await
    }

    /// Enroll once per (scheme, beneficiary) pair; bumps the scheme's
    /// enrolled count.
    pub async fn enroll_beneficiary(
        &self,
        scheme_id: &str,
        beneficiary_id: &str,
        enrolled_by: &str,
    ) -> MutationOutcome {
        let enrollment = Enrollment {
            id: Self::new_id(),
            scheme_id: scheme_id.to_string(),
            beneficiary_id: beneficiary_id.to_string(),
            status: EnrollmentStatus::Active,
            enrolled_by: enrolled_by.to_string(),
            date: Self::now_iso(),
        };

        let added = {
            let mut state = self.state.lock();
            let exists = state
                .entities
                .enrollments
                .find(|e| e.scheme_id == scheme_id && e.beneficiary_id == beneficiary_id)
                .is_some();
            if !exists {
                state.entities.schemes.update(scheme_id, |s| {
                    s.enrolled_count = s.enrolled_count.saturating_add(1);
                });
                state.entities.enrollments.upsert(enrollment.clone());
            }
            !exists
        };

        if !added {
            debug!(scheme_id, beneficiary_id, "Already enrolled");
            return MutationOutcome::Unchanged;
        }

        self.persist().await;
        self.dispatch(Operation::EnrollScheme(enrollment)).await
    }

    /// Make sure the signed-in beneficiary has a profile, creating one on
    /// the server if needed. Unlike the queued mutations this needs the
    /// network and reports failures.
    pub async fn ensure_beneficiary_profile(&self, user_id: &str, name: &str) -> SyncResult<BeneficiaryProfile> {
        if let Some(existing) = self.read(|s| {
            s.entities
                .beneficiaries
                .find(|b| b.user_id == user_id)
                .cloned()
        }) {
            return Ok(existing);
        }

        if !self.is_online() {
            return Err(SyncError::Offline("profile lookup needs a connection".to_string()));
        }

        let profile = match self.gateway.my_profile().await? {
            Some(profile) => profile,
            None => match self.gateway.create_profile(name).await {
                Ok(profile) => {
                    info!(profile_id = %profile.id, "Created beneficiary profile");
                    profile
                }
                Err(e) if e.is_conflict() => self
                    .gateway
                    .my_profile()
                    .await?
                    .ok_or_else(|| SyncError::NotFound(format!("profile for user {}", user_id)))?,
                Err(e) => return Err(e.into()),
            },
        };

        let stored = profile.clone();
        self.update_state(|s| {
            s.entities.beneficiaries.upsert(stored);
        })
        .await;
        Ok(profile)
    }

    // ------------------------------------------------------------------
    // Replay and reconciliation
    // ------------------------------------------------------------------

    /// Replay the queue in FIFO order. A replay requested while another is
    /// running waits for it and then handles whatever is still queued.
    pub async fn replay_queue(&self) -> ReplayReport {
        if !self.is_online() {
            debug!("Offline, replay skipped");
            return ReplayReport::default();
        }
        let _pipeline = self.pipeline.lock().await;
        self.replay_locked().await
    }

    async fn replay_locked(&self) -> ReplayReport {
        let mut report = ReplayReport::default();
        let snapshot = self.read(|s| s.sync_queue.clone());
        if !self.is_online() || snapshot.is_empty() {
            return report;
        }

        self.syncing.store(true, Ordering::SeqCst);
        info!(pending = snapshot.len(), "Replaying sync queue");

        let snapshot_ids: Vec<Uuid> = snapshot.iter().map(|item| item.id).collect();
        let mut retained = Vec::new();
        let mut dropped = Vec::new();

        for item in snapshot {
            report.attempted += 1;
            let item_id = item.id;
            let kind = item.kind();
            let result = item.operation.send(self.gateway.as_ref()).await;

            match disposition(item, &result, self.config.max_retries, |s| self.redactor.redact(s)) {
                ReplayDisposition::Confirmed => {
                    debug!(item_id = %item_id, kind = %kind, "Replayed");
                    report.confirmed += 1;
                }
                ReplayDisposition::AlreadyApplied => {
                    debug!(item_id = %item_id, kind = %kind, "Server already had queued change");
                    report.conflicts += 1;
                }
                ReplayDisposition::Retain(item) => {
                    debug!(
                        item_id = %item_id,
                        kind = %kind,
                        retry_count = item.retry_count,
                        "Replay failed, keeping item"
                    );
                    report.retained += 1;
                    retained.push(item);
                }
                ReplayDisposition::DeadLetter(letter) => {
                    warn!(
                        item_id = %item_id,
                        kind = %kind,
                        retry_count = letter.item.retry_count,
                        status = ?letter.status,
                        reason = %letter.reason,
                        "Retries exhausted, moved to dead letters"
                    );
                    report.dead_lettered += 1;
                    dropped.push(letter);
                }
            }
        }

        self.update_state(|s| {
            let arrived: Vec<SyncQueueItem> = s
                .sync_queue
                .drain(..)
                .filter(|item| !snapshot_ids.contains(&item.id))
                .collect();
            retained.extend(arrived);
            s.sync_queue = retained;
            s.dead_letters.extend(dropped);
        })
        .await;
        self.syncing.store(false, Ordering::SeqCst);

        info!(
            confirmed = report.confirmed,
            conflicts = report.conflicts,
            retained = report.retained,
            dead_lettered = report.dead_lettered,
            "Replay finished"
        );

        if report.cleared() > 0 {
            report.reconciled = self.reconcile_locked().await;
        }
        report
    }

    /// Refresh every slice from the server. A non-forced request gives way
    /// to a fetch or replay already in flight; a forced one waits its turn.
    pub async fn reconcile(&self, force: bool) -> ReconcileOutcome {
        if !self.is_online() {
            return ReconcileOutcome::Offline;
        }

        let _pipeline = if force {
            self.pipeline.lock().await
        } else {
            match self.pipeline.try_lock() {
                Ok(guard) => guard,
                Err(_) => {
                    debug!("Fetch already in flight, skipping refresh");
                    return ReconcileOutcome::Busy;
                }
            }
        };

        match self.reconcile_locked().await {
            Some(report) => ReconcileOutcome::Completed(report),
            None => ReconcileOutcome::Offline,
        }
    }

    async fn reconcile_locked(&self) -> Option<ReconcileReport> {
        if !self.is_online() {
            return None;
        }

        self.fetching.store(true, Ordering::SeqCst);
        let results = FetchResults::fetch_all(self.gateway.as_ref(), self.is_authenticated()).await;

        let report = self
            .update_state(|s| {
                let (user, report) = results.apply(&mut s.entities, |t| self.redactor.redact(t));
                overlay_pending(&mut s.entities, &s.sync_queue);
                if let Some(user) = user {
                    s.current_user = Some(user);
                }
                report
            })
            .await;
        self.fetching.store(false, Ordering::SeqCst);

        info!(
            refreshed = report.refreshed.len(),
            failed = report.failed.len(),
            "Reconciliation finished"
        );
        Some(report)
    }

    // ------------------------------------------------------------------
    // Connectivity
    // ------------------------------------------------------------------

    /// Record a connectivity signal. Returns `true` on an actual transition.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous != online {
            info!(online, "Connectivity changed");
        }
        previous != online
    }

    /// Coming online replays the queue and then forces a full refresh,
    /// unless the replay already refreshed.
    pub async fn go_online(&self) -> Option<ReplayReport> {
        if !self.set_online(true) {
            return None;
        }
        Some(self.sync_now().await)
    }

    /// Replay the queue, then refresh every slice unless the replay already
    /// did. Waits for any fetch or replay in flight.
    pub async fn sync_now(&self) -> ReplayReport {
        if !self.is_online() {
            debug!("Offline, sync skipped");
            return ReplayReport::default();
        }

        let _pipeline = self.pipeline.lock().await;
        let mut report = self.replay_locked().await;
        if report.reconciled.is_none() {
            report.reconciled = self.reconcile_locked().await;
        }
        report
    }

    pub fn go_offline(&self) -> bool {
        self.set_online(false)
    }

    /// Periodic refresh, only for an authenticated health worker. Pending
    /// queue items are replayed first so the refresh sees them on the server.
    pub async fn poll(&self) -> Option<ReconcileOutcome> {
        let is_worker = self
            .current_user()
            .map_or(false, |u| u.role == Role::AshaWorker);
        if !self.is_authenticated() || !is_worker {
            return None;
        }
        if !self.is_online() {
            return Some(ReconcileOutcome::Offline);
        }

        let _pipeline = match self.pipeline.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Fetch already in flight, skipping periodic refresh");
                return Some(ReconcileOutcome::Busy);
            }
        };

        let mut reconciled = None;
        if self.read(|s| !s.sync_queue.is_empty()) {
            reconciled = self.replay_locked().await.reconciled;
        }
        if reconciled.is_none() {
            reconciled = self.reconcile_locked().await;
        }
        Some(match reconciled {
            Some(report) => ReconcileOutcome::Completed(report),
            None => ReconcileOutcome::Offline,
        })
    }
}
