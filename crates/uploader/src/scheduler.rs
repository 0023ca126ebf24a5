//! Upload session orchestrator.
//!
//! All session state lives behind one mutex and every transition (an API
//! call, a settled attempt, a progress report) runs as a single critical
//! section. Requests run on spawned tasks without the lock; each carries an
//! attempt number so that a settlement arriving after its attempt was
//! aborted is recognized and dropped.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use resup_protocol::ChunkWrite;
use resup_transfer::{EtaAnchor, FileHandle};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::attempt::{self, AttemptKind, AttemptPlan};
use crate::config::UploaderConfig;
use crate::error::{AttemptFailure, TransportError, UploadError};
use crate::estimator;
use crate::events::{EventBus, SubscriptionId};
use crate::lock;
use crate::registry::{FileEntry, FileRegistry, InFlight, Validator};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::transport::{ProgressFn, QueryRequest, Transport, TransportResponse, WriteRequest};
use crate::types::{FileInfo, FileStatus, UploadEvent};

/// Builder for [`Uploader`].
pub struct UploaderBuilder {
    endpoint: String,
    transport: Arc<dyn Transport>,
    config: UploaderConfig,
    validator: Option<Validator>,
    runtime: Option<Handle>,
}

impl UploaderBuilder {
    pub fn config(mut self, config: UploaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets a predicate every file must satisfy after the size and
    /// extension checks. Files it refuses are skipped without an event.
    ///
    /// The predicate runs while the session is locked and must not call
    /// back into the uploader.
    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&FileInfo) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Runtime used to spawn requests. Defaults to the current one.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<Uploader, UploadError> {
        self.config.validate()?;
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| UploadError::NoRuntime)?,
        };
        Ok(Uploader {
            shared: Arc::new(Shared {
                endpoint: self.endpoint,
                retry: RetryPolicy::new(self.config.max_retries),
                config: self.config,
                transport: self.transport,
                validator: self.validator,
                runtime,
                state: Mutex::new(SessionState::default()),
                bus: EventBus::new(),
            }),
        })
    }
}

/// Uploads a set of files to one endpoint in resumable chunks.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct Uploader {
    shared: Arc<Shared>,
}

struct Shared {
    endpoint: String,
    config: UploaderConfig,
    retry: RetryPolicy,
    transport: Arc<dyn Transport>,
    validator: Option<Validator>,
    runtime: Handle,
    state: Mutex<SessionState>,
    bus: EventBus,
}

#[derive(Default)]
struct SessionState {
    registry: FileRegistry,
    /// Ids of files waiting for a slot, in launch order.
    queue: VecDeque<String>,
    running: bool,
    eta: EtaAnchor,
    next_attempt: u64,
}

impl Uploader {
    /// Creates an uploader with the default configuration.
    pub fn new(
        endpoint: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, UploadError> {
        Self::builder(endpoint, transport).build()
    }

    pub fn builder(endpoint: impl Into<String>, transport: Arc<dyn Transport>) -> UploaderBuilder {
        UploaderBuilder {
            endpoint: endpoint.into(),
            transport,
            config: UploaderConfig::default(),
            validator: None,
            runtime: None,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.shared.endpoint
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.shared.config
    }

    /// Adds files to the session and returns the accepted ones.
    ///
    /// Emits `FileRejected` for every size or extension failure, then one
    /// `FilesAdded`. In single-file mode an accepted file replaces the
    /// current one. When running, the new files are scheduled immediately.
    pub fn add<I>(&self, handles: I) -> Vec<FileInfo>
    where
        I: IntoIterator<Item = Arc<dyn FileHandle>>,
    {
        let handles: Vec<_> = handles.into_iter().collect();
        let now = SystemTime::now();
        self.shared
            .transition(|st| self.shared.add_files(st, handles, now))
    }

    /// Starts (or resumes) uploading. No-op when already running or empty.
    pub fn start(&self) {
        self.shared.transition(|st| self.shared.start(st));
    }

    /// Aborts every outstanding request. Acknowledged chunks are kept, so a
    /// later [`start`](Self::start) resumes where this left off.
    pub fn stop(&self) {
        self.shared.transition(|st| {
            if !st.running {
                return;
            }
            st.running = false;
            st.queue.clear();
            st.eta.reset();
            let aborted = st
                .registry
                .iter_mut()
                .map(|f| f.abort())
                .filter(|aborted| *aborted)
                .count();
            info!(aborted, "upload session stopped");
        });
    }

    /// Clears retry counters, returns abandoned files to `Pending` and
    /// starts the session.
    pub fn retry_failed(&self) {
        self.shared.transition(|st| {
            let mut revived = 0;
            for f in st.registry.iter_mut() {
                f.retries = 0;
                if f.status == FileStatus::Error {
                    f.status = FileStatus::Pending;
                    revived += 1;
                }
            }
            if revived > 0 {
                info!(revived, "retrying failed files");
                self.shared.recompute(st);
            }
            self.shared.start(st);
        });
    }

    /// Aborts and removes a file. Returns `false` if `id` is not managed.
    pub fn remove(&self, id: &str) -> bool {
        self.shared.transition(|st| {
            let Some(entry) = st.registry.remove(id) else {
                return false;
            };
            st.queue.retain(|queued| queued != id);
            info!(file = %entry.name, "file removed");
            self.shared.recompute(st);
            true
        })
    }

    pub fn find_by_id(&self, id: &str) -> Option<FileInfo> {
        lock(&self.shared.state).registry.find(id).map(FileEntry::info)
    }

    /// Snapshots of every managed file in insertion order.
    pub fn files(&self) -> Vec<FileInfo> {
        lock(&self.shared.state)
            .registry
            .iter()
            .map(FileEntry::info)
            .collect()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.shared.state).running
    }

    /// Completed fraction of all chunks of non-abandoned files, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        estimator::progress(&lock(&self.shared.state).registry)
    }

    /// Estimated whole seconds until the session finishes, or `-1` when
    /// unknown.
    ///
    /// The first call after the session (re)starts only anchors the
    /// estimate; later calls extrapolate from the rate since the anchor.
    pub fn seconds_remaining(&self) -> i64 {
        let mut st = lock(&self.shared.state);
        if !st.running {
            return -1;
        }
        match estimator::completion_fraction(&st.registry) {
            Some(p) => st
                .eta
                .observe(p, tokio::time::Instant::now().into_std())
                .map_or(-1, |secs| i64::try_from(secs).unwrap_or(i64::MAX)),
            None => {
                st.eta.reset();
                -1
            }
        }
    }

    /// Registers an event handler. Handlers may call back into the uploader.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&UploadEvent) + Send + Sync + 'static,
    {
        self.shared.bus.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.bus.unsubscribe(id)
    }

    /// Returns a channel receiving every event published from now on.
    pub fn events(&self) -> mpsc::UnboundedReceiver<UploadEvent> {
        self.shared.bus.channel()
    }
}

impl Shared {
    /// Runs `f` under the session lock, then delivers the events it queued.
    fn transition<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let result = {
            let mut st = lock(&self.state);
            f(&mut st)
        };
        self.bus.flush();
        result
    }

    fn emit_progress(&self, st: &SessionState) {
        self.bus.enqueue(UploadEvent::Progress {
            fraction: estimator::progress(&st.registry),
        });
    }

    fn add_files(
        self: &Arc<Self>,
        st: &mut SessionState,
        handles: Vec<Arc<dyn FileHandle>>,
        now: SystemTime,
    ) -> Vec<FileInfo> {
        let offered = handles.len();
        let screening = st
            .registry
            .screen(handles, &self.config, self.validator.as_ref(), now);

        for (file, reason) in screening.rejections {
            info!(file = %file.name, size = file.size, %reason, "file rejected");
            self.bus.enqueue(UploadEvent::FileRejected { file, reason });
        }

        let accepted: Vec<FileInfo> = screening.accepted.iter().map(FileEntry::info).collect();
        if !accepted.is_empty() {
            if self.config.single_file() {
                let replaced: Vec<String> = st.registry.iter().map(|f| f.id.clone()).collect();
                for id in replaced {
                    st.registry.remove(&id);
                    debug!(file = %id, "replaced in single-file mode");
                }
                st.queue.clear();
            }
            st.registry.append(screening.accepted);
            debug!(added = accepted.len(), total = st.registry.len(), "files added");
            self.recompute(st);
        }

        self.bus.enqueue(UploadEvent::FilesAdded {
            accepted: accepted.clone(),
            rejected: offered - accepted.len(),
        });
        accepted
    }

    fn start(self: &Arc<Self>, st: &mut SessionState) {
        if st.running || st.registry.is_empty() {
            return;
        }
        info!(
            endpoint = %self.endpoint,
            files = st.registry.len(),
            "upload session started"
        );
        st.running = true;
        self.recompute(st);
    }

    /// Rebuilds the queue from scratch and fills free slots.
    fn recompute(self: &Arc<Self>, st: &mut SessionState) {
        if !st.running {
            return;
        }
        st.eta.reset();
        self.emit_progress(st);

        st.queue = st
            .registry
            .iter()
            .filter(|f| f.status.needs_attempt() && f.in_flight.is_none())
            .map(|f| f.id.clone())
            .collect();
        self.fill_slots(st);
    }

    /// Launches queued files while slots are free; ends the session when
    /// nothing is queued or outstanding.
    fn fill_slots(self: &Arc<Self>, st: &mut SessionState) {
        while st.registry.in_flight_count() < self.config.max_requests {
            let Some(id) = st.queue.pop_front() else {
                break;
            };
            self.launch(st, &id);
        }
        if st.queue.is_empty() && st.registry.in_flight_count() == 0 {
            self.end_session(st);
        }
    }

    fn launch(self: &Arc<Self>, st: &mut SessionState, file_id: &str) {
        let Some(entry) = st.registry.find_mut(file_id) else {
            return;
        };
        if entry.in_flight.is_some() {
            return;
        }
        let Some(plan) = attempt::plan(entry) else {
            return;
        };

        st.next_attempt += 1;
        let attempt = st.next_attempt;
        let cancel = CancellationToken::new();
        entry.in_flight = Some(InFlight {
            attempt,
            cancel: cancel.clone(),
            fraction: 0.0,
            bytes: 0,
        });
        debug!(
            file = %file_id,
            attempt,
            status = ?entry.status,
            uploaded = entry.uploaded_chunks,
            total = entry.total_chunks(),
            "launching attempt"
        );

        let handle = Arc::clone(&entry.handle);
        let shared = Arc::clone(self);
        let file_id = file_id.to_string();
        self.runtime.spawn(async move {
            shared.run_attempt(file_id, attempt, plan, handle, cancel).await;
        });
    }

    async fn run_attempt(
        self: Arc<Self>,
        file_id: String,
        attempt: u64,
        plan: AttemptPlan,
        handle: Arc<dyn FileHandle>,
        cancel: CancellationToken,
    ) {
        let kind = plan.kind();
        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(file = %file_id, attempt, "attempt aborted");
                return;
            }
            outcome = self.perform(attempt, plan, handle.as_ref()) => outcome,
        };
        self.transition(|st| self.apply_outcome(st, &file_id, attempt, kind, outcome));
    }

    async fn perform(
        self: &Arc<Self>,
        attempt: u64,
        plan: AttemptPlan,
        handle: &dyn FileHandle,
    ) -> Result<TransportResponse, TransportError> {
        match plan {
            AttemptPlan::Query(query) => {
                let timeout = self.config.query_timeout();
                let request = QueryRequest {
                    url: self.endpoint.clone(),
                    params: query.params(&self.config.query, cache_bust()),
                    timeout,
                };
                tokio::time::timeout(timeout, self.transport.get(request))
                    .await
                    .unwrap_or(Err(TransportError::Timeout))
            }
            AttemptPlan::Write {
                file_id,
                chunk_number,
                range,
            } => {
                let data = handle.read_range(range.start, range.end).await?;
                let write = ChunkWrite {
                    file_id: file_id.clone(),
                    chunk_number,
                    field_name: self.config.input_name.clone(),
                    data,
                };
                let request = WriteRequest {
                    url: self.endpoint.clone(),
                    fields: write.fields(&self.config.query),
                    field_name: write.field_name,
                    data: write.data,
                };
                let weak = Arc::downgrade(self);
                let progress: ProgressFn = Box::new(move |loaded, total| {
                    if let Some(shared) = weak.upgrade() {
                        shared.on_write_progress(&file_id, attempt, loaded, total);
                    }
                });
                self.transport.post_multipart(request, progress).await
            }
        }
    }

    fn on_write_progress(&self, file_id: &str, attempt: u64, loaded: u64, total: u64) {
        self.transition(|st| {
            let Some(entry) = st.registry.find_mut(file_id) else {
                return;
            };
            let Some(op) = entry.in_flight.as_mut().filter(|op| op.attempt == attempt) else {
                return;
            };
            op.bytes = loaded.min(total);
            op.fraction = if total == 0 {
                0.0
            } else {
                op.bytes as f64 / total as f64
            };
            self.emit_progress(st);
        });
    }

    fn apply_outcome(
        self: &Arc<Self>,
        st: &mut SessionState,
        file_id: &str,
        attempt: u64,
        kind: AttemptKind,
        outcome: Result<TransportResponse, TransportError>,
    ) {
        let Some(entry) = st.registry.find_mut(file_id) else {
            debug!(file = %file_id, attempt, "settlement for removed file ignored");
            return;
        };
        if !entry.owns_attempt(attempt) {
            debug!(file = %file_id, attempt, "stale settlement ignored");
            return;
        }
        entry.in_flight = None;

        match attempt::apply(entry, kind, outcome) {
            Ok(()) => debug!(
                file = %file_id,
                status = ?entry.status,
                uploaded = entry.uploaded_chunks,
                total = entry.total_chunks(),
                "attempt succeeded"
            ),
            Err(e) => {
                if matches!(e, AttemptFailure::OrderMismatch { .. }) {
                    st.eta.reset();
                }
                warn!(
                    file = %file_id,
                    retries = entry.retries,
                    status = ?entry.status,
                    error = %e,
                    "attempt failed"
                );
            }
        }

        if entry.status == FileStatus::Complete {
            info!(file = %entry.name, chunks = entry.total_chunks(), "file complete");
        }
        self.settle(st, file_id);
    }

    fn settle(self: &Arc<Self>, st: &mut SessionState, file_id: &str) {
        if !st.running {
            return;
        }
        self.emit_progress(st);

        if let Some(entry) = st.registry.find_mut(file_id)
            && entry.status.needs_attempt()
        {
            match self.retry.decide(entry.retries) {
                RetryDecision::Requeue => st.queue.push_back(file_id.to_string()),
                RetryDecision::Abandon => {
                    entry.status = FileStatus::Error;
                    warn!(
                        file = %entry.name,
                        retries = entry.retries,
                        max_retries = self.retry.max_retries(),
                        "file abandoned"
                    );
                    let file = entry.info();
                    self.bus.enqueue(UploadEvent::FileError { file });
                    self.recompute(st);
                    return;
                }
            }
        }
        self.fill_slots(st);
    }

    fn end_session(&self, st: &mut SessionState) {
        st.running = false;
        st.queue.clear();
        let (completed, failed): (Vec<FileInfo>, Vec<FileInfo>) = st
            .registry
            .iter()
            .map(FileEntry::info)
            .partition(|f| f.status == FileStatus::Complete);
        info!(
            completed = completed.len(),
            failed = failed.len(),
            "upload session ended"
        );
        self.bus
            .enqueue(UploadEvent::SessionEnded { completed, failed });
    }
}

fn cache_bust() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}
