//! Scripted transport and helpers for scheduler tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use resup_protocol::constants::{PARAM_CHUNK_NUMBER, PARAM_FILE_ID};
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::transport::{
    ProgressFn, QueryRequest, Transport, TransportFuture, TransportResponse, WriteRequest,
};
use crate::types::{FileInfo, UploadEvent};

/// How the mock answers one request.
pub(crate) enum Reply {
    Ok(String),
    /// `200` with `body` after `delay`.
    After(Duration, String),
    Status(u16),
    Error,
    /// Never completes; only an abort ends it.
    Hang,
}

/// A request observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Query {
        file_id: String,
        params: Vec<(String, String)>,
    },
    Write {
        file_id: String,
        chunk_number: u64,
        fields: Vec<(String, String)>,
        data: Vec<u8>,
    },
}

impl Call {
    pub(crate) fn is_query(&self) -> bool {
        matches!(self, Self::Query { .. })
    }

    pub(crate) fn file_id(&self) -> &str {
        match self {
            Self::Query { file_id, .. } | Self::Write { file_id, .. } => file_id,
        }
    }

    /// `Some(n)` for a write of chunk `n`.
    pub(crate) fn chunk(&self) -> Option<u64> {
        match self {
            Self::Write { chunk_number, .. } => Some(*chunk_number),
            Self::Query { .. } => None,
        }
    }
}

/// Server-side chunk bookkeeping: a write of chunk `n` is stored only when
/// it directly follows the stored count.
#[derive(Default)]
pub(crate) struct FakeServer {
    stored: Mutex<HashMap<String, u64>>,
}

impl FakeServer {
    pub(crate) fn preload(&self, file_id: &str, count: u64) {
        self.stored.lock().unwrap().insert(file_id.to_string(), count);
    }

    pub(crate) fn count(&self, file_id: &str) -> u64 {
        self.stored.lock().unwrap().get(file_id).copied().unwrap_or(0)
    }

    pub(crate) fn write(&self, file_id: &str, chunk_number: u64) -> u64 {
        let mut stored = self.stored.lock().unwrap();
        let count = stored.entry(file_id.to_string()).or_insert(0);
        if chunk_number == *count + 1 {
            *count = chunk_number;
        }
        *count
    }

    /// The well-behaved answer to `call`.
    pub(crate) fn answer(&self, call: &Call) -> Reply {
        match call {
            Call::Query { file_id, .. } => Reply::Ok(self.count(file_id).to_string()),
            Call::Write {
                file_id,
                chunk_number,
                ..
            } => Reply::Ok(self.write(file_id, *chunk_number).to_string()),
        }
    }
}

type Responder = Box<dyn Fn(&Call) -> Reply + Send + Sync>;

pub(crate) struct MockTransport {
    responder: Responder,
    calls: Mutex<Vec<Call>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl MockTransport {
    pub(crate) fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&Call) -> Reply + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    /// A transport backed by a well-behaved server.
    pub(crate) fn serving(server: Arc<FakeServer>) -> Arc<Self> {
        Self::new(move |call| server.answer(call))
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn calls_for(&self, file_id: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.file_id() == file_id)
            .collect()
    }

    /// Highest number of simultaneously outstanding requests seen.
    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn respond(
        &self,
        call: Call,
        progress: Option<ProgressFn>,
    ) -> Result<TransportResponse, TransportError> {
        let _active = ActiveGuard::enter(&self.active, &self.peak);
        let reply = (self.responder)(&call);
        self.calls.lock().unwrap().push(call.clone());

        // Let sibling attempts overlap with this one.
        tokio::task::yield_now().await;

        match reply {
            Reply::Ok(body) => {
                if let (Some(progress), Call::Write { data, .. }) = (&progress, &call) {
                    let total = data.len() as u64;
                    progress(total / 2, total);
                    tokio::task::yield_now().await;
                    progress(total, total);
                }
                Ok(TransportResponse::ok(body))
            }
            Reply::After(delay, body) => {
                tokio::time::sleep(delay).await;
                Ok(TransportResponse::ok(body))
            }
            Reply::Status(code) => Ok(TransportResponse::new(code, "")),
            Reply::Error => Err(TransportError::Network("connection reset".into())),
            Reply::Hang => std::future::pending().await,
        }
    }
}

fn value(pairs: &[(String, String)], name: &str) -> String {
    pairs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.clone())
        .unwrap_or_default()
}

impl Transport for MockTransport {
    fn get(&self, request: QueryRequest) -> TransportFuture<'_> {
        Box::pin(async move {
            let call = Call::Query {
                file_id: value(&request.params, PARAM_FILE_ID),
                params: request.params,
            };
            self.respond(call, None).await
        })
    }

    fn post_multipart(&self, request: WriteRequest, progress: ProgressFn) -> TransportFuture<'_> {
        Box::pin(async move {
            let call = Call::Write {
                file_id: value(&request.fields, PARAM_FILE_ID),
                chunk_number: value(&request.fields, PARAM_CHUNK_NUMBER)
                    .parse()
                    .unwrap(),
                fields: request.fields,
                data: request.data,
            };
            self.respond(call, Some(progress)).await
        })
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl<'a> ActiveGuard<'a> {
    fn enter(active: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self(active)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

const WAIT_LIMIT: Duration = Duration::from_secs(60);

/// Polls `condition` until it holds.
pub(crate) async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT_LIMIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached");
}

/// Receives events until the next `SessionEnded` and returns its lists.
pub(crate) async fn session_end(
    rx: &mut mpsc::UnboundedReceiver<UploadEvent>,
) -> (Vec<FileInfo>, Vec<FileInfo>) {
    tokio::time::timeout(WAIT_LIMIT, async {
        while let Some(event) = rx.recv().await {
            if let UploadEvent::SessionEnded { completed, failed } = event {
                return (completed, failed);
            }
        }
        panic!("event channel closed");
    })
    .await
    .expect("session did not end")
}

/// Drains the events published so far.
pub(crate) fn drain(rx: &mut mpsc::UnboundedReceiver<UploadEvent>) -> Vec<UploadEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}
