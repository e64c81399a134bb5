//! Keeps the local paper store and the active namespace's remote record
//! eventually consistent.
//!
//! Local edits call [`SyncReconciler::record_change`], which (re)arms a
//! quiet-period timer. When it fires the whole local snapshot is pushed
//! under the namespace key. At most one push per namespace is in flight; a
//! push requested meanwhile marks the namespace superseded and a fresh
//! quiet period starts once the in-flight push finishes. Pulls claim the
//! namespace the same way, so a push and a pull of one namespace never
//! overlap.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use secrecy::SecretString;
use serde_json::Value;
use tokio::sync::{mpsc, watch, Notify};
use tracing::{debug, info, warn};

use super::merge::{merge_entries, parse_snapshot, MergeReport};
use super::status::{Notice, NoticeKind, SyncStatus};
use super::timer::{Scheduler, Task, TimerHandle, TokioScheduler};
use crate::error::{ExamError, Result};
use crate::kv::{DurableKv, ACTIVE_NAMESPACE};
use crate::namespace::{Directory, Namespace, NamespaceDirectory, DEFAULT_NAMESPACE, DIRECTORY_KEY};
use crate::remote::RemoteStore;
use crate::store::PaperStore;
use crate::vault::{CredentialVault, VaultState};

/// Quiet period before a local change is pushed.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(5);

/// Tunables for [`SyncReconciler`].
#[derive(Clone)]
pub struct SyncOptions {
    pub quiet_period: Duration,
    pub scheduler: Arc<dyn Scheduler>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            quiet_period: DEFAULT_QUIET_PERIOD,
            scheduler: Arc::new(TokioScheduler),
        }
    }
}

/// Result of a push request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The snapshot was stored remotely.
    Pushed { papers: usize },
    /// Another push was in flight; a new quiet period starts when it ends.
    Superseded,
}

struct Pending {
    generation: u64,
    handle: TimerHandle,
}

#[derive(Default)]
struct State {
    generation: u64,
    pending: HashMap<String, Pending>,
    // Namespaces with a push or pull running.
    in_flight: HashSet<String>,
    superseded: HashSet<String>,
}

struct Inner {
    vault: CredentialVault,
    remote: Arc<dyn RemoteStore>,
    store: Arc<dyn PaperStore>,
    settings: Arc<dyn DurableKv>,
    directory: NamespaceDirectory,
    scheduler: Arc<dyn Scheduler>,
    quiet_period: Duration,
    state: Mutex<State>,
    idle: Notify,
    // Pulls and switches never interleave.
    exclusive: tokio::sync::Mutex<()>,
    status: watch::Sender<SyncStatus>,
    notices: mpsc::UnboundedSender<Notice>,
    notice_rx: Mutex<Option<mpsc::UnboundedReceiver<Notice>>>,
}

/// Cloneable handle to the reconciler.
#[derive(Clone)]
pub struct SyncReconciler {
    inner: Arc<Inner>,
}

impl SyncReconciler {
    pub fn new(
        vault: CredentialVault,
        remote: Arc<dyn RemoteStore>,
        store: Arc<dyn PaperStore>,
        settings: Arc<dyn DurableKv>,
        options: SyncOptions,
    ) -> Self {
        let (status, _) = watch::channel(SyncStatus::Idle);
        let (notices, notice_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                vault,
                directory: NamespaceDirectory::new(remote.clone()),
                remote,
                store,
                settings,
                scheduler: options.scheduler,
                quiet_period: options.quiet_period,
                state: Mutex::new(State::default()),
                idle: Notify::new(),
                exclusive: tokio::sync::Mutex::new(()),
                status,
                notices,
                notice_rx: Mutex::new(Some(notice_rx)),
            }),
        }
    }

    pub fn vault(&self) -> &CredentialVault {
        &self.inner.vault
    }

    pub fn store(&self) -> &Arc<dyn PaperStore> {
        &self.inner.store
    }

    pub fn quiet_period(&self) -> Duration {
        self.inner.quiet_period
    }

    pub fn status(&self) -> SyncStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status.subscribe()
    }

    /// Take the notice stream. Only the first caller gets it.
    pub fn take_notices(&self) -> Option<mpsc::UnboundedReceiver<Notice>> {
        self.inner
            .notice_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Key of the namespace local papers belong to.
    pub fn active_namespace(&self) -> Result<String> {
        Ok(self
            .inner
            .settings
            .get(ACTIVE_NAMESPACE)?
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()))
    }

    /// Whether a debounced push is waiting for its quiet period.
    pub fn has_pending(&self) -> bool {
        !self.state().pending.is_empty()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_status(&self, status: SyncStatus) {
        self.inner.status.send_replace(status);
    }

    fn report(&self, kind: NoticeKind, namespace: &str, error: &ExamError) {
        self.set_status(SyncStatus::Failed(error.to_string()));
        // Nobody listening is fine; the status still carries the failure.
        let _ = self.inner.notices.send(Notice {
            kind,
            namespace: namespace.to_string(),
            message: error.to_string(),
        });
    }

    fn token(&self) -> Result<SecretString> {
        self.inner.vault.session_token()
    }

    // --- Auto-push ---

    /// Note a local mutation and restart the quiet period.
    ///
    /// Does nothing while no remote credential is configured.
    pub fn record_change(&self) -> Result<()> {
        if self.inner.vault.state()? == VaultState::Unset {
            return Ok(());
        }
        let namespace = self.active_namespace()?;
        self.schedule_push(&namespace);
        Ok(())
    }

    fn schedule_push(&self, namespace: &str) {
        let mut state = self.state();
        state.generation += 1;
        let generation = state.generation;
        if let Some(previous) = state.pending.remove(namespace) {
            previous.handle.cancel();
        }

        let weak = Arc::downgrade(&self.inner);
        let key = namespace.to_string();
        let task: Task = Box::pin(async move {
            if let Some(inner) = weak.upgrade() {
                SyncReconciler { inner }.on_quiet_period(key, generation).await;
            }
        });
        let handle = self.inner.scheduler.schedule(self.inner.quiet_period, task);
        state
            .pending
            .insert(namespace.to_string(), Pending { generation, handle });
        drop(state);

        debug!(namespace, generation, "Push scheduled");
        self.set_status(SyncStatus::Pending);
    }

    async fn on_quiet_period(self, namespace: String, generation: u64) {
        let armed = {
            let mut state = self.state();
            let current = state.pending.get(&namespace).map(|p| p.generation) == Some(generation);
            if current {
                state.pending.remove(&namespace);
            }
            current
        };
        if !armed {
            return;
        }

        match self.active_namespace() {
            Ok(active) if active == namespace => {}
            _ => {
                debug!(namespace = %namespace, "Dropping push for inactive namespace");
                return;
            }
        }
        // Failures already surface through the status and a notice.
        let _ = self.push(&namespace).await;
    }

    fn cancel_pending(&self, namespace: &str) -> bool {
        let pending = self.state().pending.remove(namespace);
        match pending {
            Some(pending) => {
                pending.handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel the pending timer and push the active namespace right away.
    pub async fn save_now(&self) -> Result<PushOutcome> {
        let namespace = self.active_namespace()?;
        self.cancel_pending(&namespace);
        self.push(&namespace).await
    }

    /// Push now if a debounced push is waiting, and let in-flight pushes
    /// (and any retry they schedule) finish.
    pub async fn flush(&self) -> Result<()> {
        loop {
            let next = {
                let mut state = self.state();
                let key = state.pending.keys().next().cloned();
                key.and_then(|k| state.pending.remove_entry(&k))
            };

            match next {
                Some((namespace, pending)) => {
                    pending.handle.cancel();
                    if self.active_namespace()? != namespace {
                        continue;
                    }
                    self.claim(&namespace).await;
                    self.state().superseded.remove(&namespace);
                    self.run_push(&namespace).await?;
                }
                None => {
                    if !self.wait_idle().await {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn push(&self, namespace: &str) -> Result<PushOutcome> {
        {
            let mut state = self.state();
            if state.in_flight.contains(namespace) {
                state.superseded.insert(namespace.to_string());
                debug!(namespace, "Push in flight; superseding");
                return Ok(PushOutcome::Superseded);
            }
            state.in_flight.insert(namespace.to_string());
        }
        self.run_push(namespace).await
    }

    /// Wait until no push or pull of `namespace` is running, then claim it.
    async fn claim(&self, namespace: &str) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let claimed = self.state().in_flight.insert(namespace.to_string());
            if claimed {
                return;
            }
            notified.await;
        }
    }

    /// Drop the claim on `namespace`. Returns whether a push was
    /// requested while it was held.
    fn release(&self, namespace: &str) -> bool {
        let retry = {
            let mut state = self.state();
            state.in_flight.remove(namespace);
            state.superseded.remove(namespace)
        };
        self.inner.idle.notify_waiters();
        retry
    }

    /// Wait for every in-flight push. Returns whether there was any.
    async fn wait_idle(&self) -> bool {
        let mut waited = false;
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let idle = self.state().in_flight.is_empty();
            if idle {
                return waited;
            }
            waited = true;
            notified.await;
        }
    }

    /// Push with `namespace` already claimed as in flight.
    async fn run_push(&self, namespace: &str) -> Result<PushOutcome> {
        self.set_status(SyncStatus::Saving);
        let result = self.upload(namespace).await;
        let retry = self.release(namespace);

        match &result {
            Ok(papers) => {
                info!(namespace, papers, "Pushed snapshot");
                if !retry {
                    self.set_status(SyncStatus::Saved);
                }
            }
            Err(e) => {
                warn!(namespace, error = %e, "Push failed");
                self.report(NoticeKind::Push, namespace, e);
            }
        }
        if retry {
            self.schedule_push(namespace);
        }

        result.map(|papers| PushOutcome::Pushed { papers })
    }

    async fn upload(&self, namespace: &str) -> Result<usize> {
        let token = self.token()?;
        let papers = self.inner.store.get_all()?;
        let body = serde_json::to_string(&papers)?;
        self.inner.remote.put(namespace, &body, &token).await?;
        Ok(papers.len())
    }

    // --- Pull ---

    /// Pull the active namespace and merge it into the local store.
    pub async fn pull(&self) -> Result<MergeReport> {
        let _exclusive = self.inner.exclusive.lock().await;
        let namespace = self.active_namespace()?;
        match self.pull_into_store(&namespace).await {
            Ok(report) => {
                if !self.has_pending() {
                    self.set_status(SyncStatus::Saved);
                }
                Ok(report)
            }
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "Pull failed");
                self.report(NoticeKind::Pull, &namespace, &e);
                Err(e)
            }
        }
    }

    async fn pull_into_store(&self, namespace: &str) -> Result<MergeReport> {
        let token = self.token()?;
        // The directory must exist before anything is pulled.
        self.inner.directory.ensure(&token).await?;

        self.claim(namespace).await;
        let merged = match self.fetch_snapshot(namespace, &token).await {
            Ok(entries) => merge_entries(self.inner.store.as_ref(), &entries),
            Err(e) => Err(e),
        };
        if self.release(namespace) {
            self.schedule_push(namespace);
        }

        let report = merged?;
        info!(
            namespace,
            inserted = report.inserted,
            updated = report.updated,
            skipped = report.skipped,
            "Pulled snapshot"
        );
        Ok(report)
    }

    /// Read and parse the remote snapshot of `namespace`. A missing record
    /// is an empty snapshot.
    async fn fetch_snapshot(&self, namespace: &str, token: &SecretString) -> Result<Vec<Value>> {
        match self.inner.remote.get(namespace, token).await? {
            Some(raw) => parse_snapshot(&raw),
            None => Ok(Vec::new()),
        }
    }

    /// Unlock the saved credential, then pull the active namespace once.
    ///
    /// A wrong password is returned as `Decryption` without a notice and
    /// without touching the remote store.
    pub async fn unlock(&self, password: &str) -> Result<MergeReport> {
        self.inner.vault.unlock(password).await?;
        self.pull().await
    }

    // --- Namespaces ---

    /// Switch the active namespace to `target`.
    ///
    /// The outgoing namespace is pushed first, then the target's snapshot
    /// is fetched. If either step fails the switch is abandoned with local
    /// data and the active namespace untouched. Otherwise the local store
    /// is replaced by the target's papers and `target` becomes active.
    pub async fn switch_namespace(&self, target: &str) -> Result<MergeReport> {
        let _exclusive = self.inner.exclusive.lock().await;
        let token = self.token()?;
        let directory = self.inner.directory.ensure(&token).await?;
        if !directory.contains(target) {
            return Err(ExamError::NotFound(format!("Folder {}", target)));
        }

        let current = self.active_namespace()?;
        if current == target {
            return Ok(MergeReport::default());
        }

        self.cancel_pending(&current);
        self.claim(&current).await;
        self.state().superseded.remove(&current);
        if let Err(e) = self.run_push(&current).await {
            warn!(from = %current, to = target, "Switch abandoned; outgoing push failed");
            return Err(e);
        }
        // A push that raced the switch may have re-armed the timer.
        self.cancel_pending(&current);

        // No push of either namespace may run while the store is replaced.
        self.claim(&current).await;
        self.claim(target).await;
        let switched = self.replace_local(target, &token).await;
        let retry_current = self.release(&current);
        let retry_target = self.release(target);
        // Retries for whichever namespace is no longer active are dropped
        // when their timer fires.
        if retry_current {
            self.schedule_push(&current);
        }
        if retry_target {
            self.schedule_push(target);
        }

        match switched {
            Ok(report) => {
                info!(from = %current, to = target, "Switched folder");
                self.set_status(SyncStatus::Saved);
                Ok(report)
            }
            Err(e) => {
                warn!(from = %current, to = target, error = %e, "Switch abandoned");
                self.report(NoticeKind::Switch, target, &e);
                Err(e)
            }
        }
    }

    async fn replace_local(&self, target: &str, token: &SecretString) -> Result<MergeReport> {
        let entries = self.fetch_snapshot(target, token).await?;
        self.inner.store.clear()?;
        let report = merge_entries(self.inner.store.as_ref(), &entries)?;
        self.inner.settings.set(ACTIVE_NAMESPACE, target)?;
        Ok(report)
    }

    /// Create the directory record with the default namespace if missing.
    pub async fn bootstrap(&self) -> Result<Directory> {
        let token = self.token()?;
        self.inner.directory.ensure(&token).await
    }

    pub async fn namespaces(&self) -> Result<Vec<Namespace>> {
        let token = self.token()?;
        self.inner.directory.list(&token).await
    }

    pub async fn add_namespace(&self, alias: &str) -> Result<String> {
        let token = self.token()?;
        self.inner.directory.add(alias, &token).await
    }

    pub async fn rename_namespace(&self, key: &str, alias: &str) -> Result<()> {
        let token = self.token()?;
        self.inner.directory.rename(key, alias, &token).await
    }

    /// Remove a namespace and its remote data.
    ///
    /// The active namespace can only be removed after switching away.
    pub async fn remove_namespace(&self, key: &str) -> Result<()> {
        let token = self.token()?;
        if key == self.active_namespace()? {
            let directory = self.inner.directory.ensure(&token).await?;
            if directory.keys.len() <= 1 {
                return Err(ExamError::LastNamespace);
            }
            return Err(ExamError::InvalidInput(
                "Cannot remove the active folder; switch to another one first".to_string(),
            ));
        }
        self.inner.directory.remove(key, &token).await
    }

    /// Authenticated read of the directory record.
    ///
    /// Returns whether the record exists yet.
    pub async fn test_connection(&self) -> Result<bool> {
        let token = self.token()?;
        Ok(self.inner.remote.get(DIRECTORY_KEY, &token).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use crate::model::Paper;
    use crate::remote::MemoryRemoteStore;
    use crate::store::MemoryPaperStore;
    use chrono::Utc;

    struct Harness {
        sync: SyncReconciler,
        remote: Arc<MemoryRemoteStore>,
        store: Arc<MemoryPaperStore>,
    }

    async fn harness() -> Harness {
        let settings = Arc::new(MemoryKv::new());
        let vault = CredentialVault::new(settings.clone(), Arc::new(MemoryKv::new()));
        vault.configure("token", None).await.unwrap();
        let remote = Arc::new(MemoryRemoteStore::new());
        let store = Arc::new(MemoryPaperStore::new());
        let sync = SyncReconciler::new(
            vault,
            remote.clone(),
            store.clone(),
            settings,
            SyncOptions::default(),
        );
        Harness {
            sync,
            remote,
            store,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_change_goes_pending_then_saved() {
        let h = harness().await;
        h.store.put(&Paper::new("One", Utc::now()).unwrap()).unwrap();

        h.sync.record_change().unwrap();
        assert_eq!(h.sync.status(), SyncStatus::Pending);

        tokio::time::sleep(DEFAULT_QUIET_PERIOD + Duration::from_secs(1)).await;
        assert_eq!(h.sync.status(), SyncStatus::Saved);
        assert_eq!(h.remote.puts_to(DEFAULT_NAMESPACE).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_now_cancels_timer() {
        let h = harness().await;
        h.sync.record_change().unwrap();

        let outcome = h.sync.save_now().await.unwrap();
        assert_eq!(outcome, PushOutcome::Pushed { papers: 0 });

        tokio::time::sleep(DEFAULT_QUIET_PERIOD * 2).await;
        assert_eq!(h.remote.puts_to(DEFAULT_NAMESPACE).len(), 1);
        assert!(!h.sync.has_pending());
    }

    #[tokio::test]
    async fn test_no_credential_means_no_timer() {
        let settings = Arc::new(MemoryKv::new());
        let vault = CredentialVault::new(settings.clone(), Arc::new(MemoryKv::new()));
        let sync = SyncReconciler::new(
            vault,
            Arc::new(MemoryRemoteStore::new()),
            Arc::new(MemoryPaperStore::new()),
            settings,
            SyncOptions::default(),
        );

        sync.record_change().unwrap();
        assert!(!sync.has_pending());
        assert_eq!(sync.status(), SyncStatus::Idle);
    }

    #[tokio::test]
    async fn test_failed_push_reports_notice() {
        let h = harness().await;
        let mut notices = h.sync.take_notices().unwrap();
        assert!(h.sync.take_notices().is_none());

        h.remote.fail_next_put(crate::remote::Failure::Status(500));
        assert!(h.sync.save_now().await.is_err());

        let notice = notices.try_recv().unwrap();
        assert_eq!(notice.kind, NoticeKind::Push);
        assert!(matches!(h.sync.status(), SyncStatus::Failed(_)));
    }

    #[tokio::test]
    async fn test_remove_active_namespace_refused() {
        let h = harness().await;
        assert!(matches!(
            h.sync.remove_namespace(DEFAULT_NAMESPACE).await,
            Err(ExamError::LastNamespace)
        ));

        h.sync.add_namespace("Other").await.unwrap();
        assert!(matches!(
            h.sync.remove_namespace(DEFAULT_NAMESPACE).await,
            Err(ExamError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_connection_reports_directory_presence() {
        let h = harness().await;
        assert!(!h.sync.test_connection().await.unwrap());
        h.sync.bootstrap().await.unwrap();
        assert!(h.sync.test_connection().await.unwrap());
    }
}
