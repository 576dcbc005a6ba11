//! Upload session state machine
//!
//! A run moves through `Init -> AwaitingPlan -> Uploading -> Done`, or drops
//! into `Failed` from any of the first three. Both end states are terminal:
//! once there, every operation returns [`Error::Terminal`] without touching
//! the transport.
//!
//! ```text
//!   client                                   relay
//!     |-- GET /setup?size=..&txt=.. -------->  |   200 body = conduit id
//!     |-- GET /ping/{id} ------------------->  |   "" / "[]" until a downloader shows up
//!     |-- GET /ping/{id} ------------------->  |   [4096, 8192, ...] chunk plan
//!     |-- PUT /ul/{id}  (plan[0] bytes) ---->  |   200
//!     |-- PUT /ul/{id}  (plan[1] bytes) ---->  |   200 ... 404 once the session expired
//! ```

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::logger::{Logger, NoopLogger};
use crate::progress::ProgressReporter;
use crate::protocol::{endpoint, query, session_path, timeouts};
use crate::relay::{Method, RelayRequest, RelayResponse, Transport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Init,
    AwaitingPlan,
    Uploading,
    Done,
    Failed,
}

impl TransferState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TransferState::Done | TransferState::Failed)
    }
}

/// What the relay is told about the payload at setup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadMeta {
    /// `None` for text transfers
    pub filename: Option<String>,
    pub size: u64,
}

impl PayloadMeta {
    pub fn file(filename: impl Into<String>, size: u64) -> Self {
        Self {
            filename: Some(filename.into()),
            size,
        }
    }

    pub fn text(size: u64) -> Self {
        Self {
            filename: None,
            size,
        }
    }

    pub fn is_text(&self) -> bool {
        self.filename.is_none()
    }

    fn setup_query(&self) -> Vec<(&'static str, String)> {
        match &self.filename {
            Some(name) => vec![
                (query::FILENAME, name.clone()),
                (query::SIZE, self.size.to_string()),
                (query::TEXT, "0".to_string()),
            ],
            None => vec![
                (query::SIZE, self.size.to_string()),
                (query::TEXT, "1".to_string()),
            ],
        }
    }
}

/// A file on disk or a literal text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    File(PathBuf),
    Text(String),
}

impl Payload {
    pub fn meta(&self) -> Result<PayloadMeta> {
        match self {
            Payload::File(path) => {
                let size = std::fs::metadata(path)?.len();
                Ok(PayloadMeta::file(file_name(path), size))
            }
            Payload::Text(text) => Ok(PayloadMeta::text(text.len() as u64)),
        }
    }

    /// Open the byte source positioned at its start
    pub fn open(&self) -> Result<Box<dyn Read>> {
        match self {
            Payload::File(path) => Ok(Box::new(File::open(path)?)),
            Payload::Text(text) => Ok(Box::new(Cursor::new(text.clone().into_bytes()))),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Handle issued by the relay at setup. Immutable; lives for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    conduit_id: String,
    secret: String,
    is_text: bool,
    size: u64,
}

impl Session {
    pub fn conduit_id(&self) -> &str {
        &self.conduit_id
    }

    pub fn is_text(&self) -> bool {
        self.is_text
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Byte count of every upload request, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan(Vec<u64>);

impl ChunkPlan {
    /// Decode a ping body. `Ok(None)` means the relay is not ready yet.
    pub fn decode(body: &[u8]) -> Result<Option<ChunkPlan>> {
        if body.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(None);
        }
        let sizes: Vec<u64> = serde_json::from_slice(body)
            .map_err(|e| Error::Protocol(format!("malformed chunk plan: {}", e)))?;
        if sizes.is_empty() {
            return Ok(None);
        }
        if let Some(pos) = sizes.iter().position(|&s| s == 0) {
            return Err(Error::Protocol(format!(
                "chunk plan entry {} is zero",
                pos + 1
            )));
        }
        // Every decoded plan has a total that fits in u64
        if sizes.iter().try_fold(0u64, |acc, &s| acc.checked_add(s)).is_none() {
            return Err(Error::Protocol("chunk plan overflows".to_string()));
        }
        Ok(Some(ChunkPlan(sizes)))
    }

    /// Check the plan against what was declared at setup
    pub fn check(&self, session: &Session) -> Result<()> {
        if session.is_text && self.0.len() != 1 {
            return Err(Error::Protocol(format!(
                "text transfers use a single chunk, relay planned {}",
                self.0.len()
            )));
        }
        let total = self.total();
        if total != session.size {
            return Err(Error::Protocol(format!(
                "chunk plan covers {} bytes, payload has {}",
                total, session.size
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    pub fn sizes(&self) -> &[u64] {
        &self.0
    }
}

/// How readiness polling is paced. `max_attempts: None` polls forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: Option<u64>,
}

impl PollPolicy {
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }

    pub fn bounded(interval: Duration, max_attempts: u64) -> Self {
        Self {
            interval,
            max_attempts: Some(max_attempts),
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::unbounded(Duration::from_millis(timeouts::POLL_INTERVAL_MS))
    }
}

pub struct TransferClient<T: Transport> {
    transport: T,
    secret: String,
    poll: PollPolicy,
    logger: Arc<dyn Logger>,
    state: TransferState,
}

impl<T: Transport> TransferClient<T> {
    pub fn new(transport: T, secret: impl Into<String>) -> Self {
        Self {
            transport,
            secret: secret.into(),
            poll: PollPolicy::default(),
            logger: Arc::new(NoopLogger),
            state: TransferState::Init,
        }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    /// INIT -> AWAITING_PLAN
    pub fn begin_session(&mut self, meta: &PayloadMeta) -> Result<Session> {
        self.expect_state(TransferState::Init)?;
        let request = RelayRequest {
            method: Method::Get,
            path: endpoint::SETUP.to_string(),
            query: meta.setup_query(),
            secret: self.secret.clone(),
            body: Vec::new(),
        };
        let resp = match self.transport.send(&request) {
            Ok(r) => r,
            Err(e) => return Err(self.fail("setup", e.into())),
        };
        if !resp.is_success() {
            let err = Error::SetupFailed {
                status: resp.status,
                detail: resp.text(),
            };
            return Err(self.fail("setup", err));
        }
        let conduit_id = resp.text();
        if conduit_id.is_empty() {
            let err = Error::Protocol("relay returned an empty session id".to_string());
            return Err(self.fail("setup", err));
        }

        self.logger.setup(&conduit_id, meta.size, meta.is_text());
        self.state = TransferState::AwaitingPlan;
        Ok(Session {
            conduit_id,
            secret: self.secret.clone(),
            is_text: meta.is_text(),
            size: meta.size,
        })
    }

    /// AWAITING_PLAN -> UPLOADING. Blocks until the relay hands out a plan.
    pub fn await_chunk_plan(&mut self, session: &Session) -> Result<ChunkPlan> {
        self.expect_state(TransferState::AwaitingPlan)?;
        let request = RelayRequest {
            method: Method::Get,
            path: session_path(endpoint::PING, &session.conduit_id),
            query: Vec::new(),
            secret: session.secret.clone(),
            body: Vec::new(),
        };

        let mut attempts = 0u64;
        loop {
            match self.transport.send(&request) {
                // A slow relay is indistinguishable from "not ready"
                Err(TransportError::Timeout) => {}
                Err(e) => return Err(self.fail("ping", e.into())),
                Ok(resp) if resp.is_not_found() => {
                    self.logger.expired(&session.conduit_id);
                    return Err(self.fail("ping", Error::SessionExpired));
                }
                Ok(resp) if !resp.is_success() => {
                    let err = Error::PollFailed {
                        status: resp.status,
                        detail: resp.text(),
                    };
                    return Err(self.fail("ping", err));
                }
                Ok(resp) => match ChunkPlan::decode(&resp.body) {
                    Ok(Some(plan)) => {
                        if let Err(e) = plan.check(session) {
                            return Err(self.fail("ping", e));
                        }
                        self.logger.ready(&session.conduit_id, plan.len());
                        self.state = TransferState::Uploading;
                        return Ok(plan);
                    }
                    Ok(None) => {}
                    Err(e) => return Err(self.fail("ping", e)),
                },
            }

            attempts += 1;
            if let Some(max) = self.poll.max_attempts {
                if attempts >= max {
                    return Err(self.fail("ping", Error::PollExhausted(attempts)));
                }
            }
            if !self.poll.interval.is_zero() {
                std::thread::sleep(self.poll.interval);
            }
        }
    }

    /// UPLOADING -> DONE. One PUT per plan entry, strictly in order.
    pub fn upload<R: Read>(
        &mut self,
        session: &Session,
        plan: &ChunkPlan,
        mut source: R,
        reporter: &dyn ProgressReporter,
    ) -> Result<()> {
        self.expect_state(TransferState::Uploading)?;
        let start = Instant::now();

        // The display is torn down whether or not every chunk made it
        let sent = self.send_chunks(session, plan, &mut source, reporter);
        reporter.finish();
        let bytes_sent = sent?;

        self.logger
            .done(plan.len(), bytes_sent, start.elapsed().as_secs_f64());
        self.state = TransferState::Done;
        Ok(())
    }

    fn send_chunks<R: Read>(
        &mut self,
        session: &Session,
        plan: &ChunkPlan,
        source: &mut R,
        reporter: &dyn ProgressReporter,
    ) -> Result<u64> {
        let path = session_path(endpoint::UPLOAD, &session.conduit_id);
        let total = plan.len();
        let mut bytes_sent = 0u64;

        for (index, &size) in plan.sizes().iter().enumerate() {
            let chunk_no = index + 1;
            let chunk = match read_chunk(source, size) {
                Ok(c) => c,
                Err(e) => return Err(self.fail("read", e.into())),
            };
            let actual = chunk.len() as u64;
            // A short final chunk is fine: read_chunk only stops early at end of stream
            if actual < size && (chunk_no != total || actual == 0) {
                let err = Error::ShortRead {
                    chunk: chunk_no,
                    expected: size,
                    actual,
                };
                return Err(self.fail("read", err));
            }

            let request = RelayRequest {
                method: Method::Put,
                path: path.clone(),
                query: Vec::new(),
                secret: session.secret.clone(),
                body: chunk,
            };
            let resp: RelayResponse = match self.transport.send(&request) {
                Ok(r) => r,
                Err(e) => return Err(self.fail("upload", e.into())),
            };
            if resp.is_not_found() {
                self.logger.expired(&session.conduit_id);
                return Err(self.fail("upload", Error::SessionExpired));
            }
            if !resp.is_success() {
                let err = Error::UploadFailed {
                    chunk: chunk_no,
                    status: resp.status,
                    detail: resp.text(),
                };
                return Err(self.fail("upload", err));
            }

            bytes_sent += actual;
            self.logger.chunk_sent(&session.conduit_id, index, actual);
            reporter.report(chunk_no, total);
        }
        Ok(bytes_sent)
    }

    /// Drive a whole run. `on_session` fires once setup succeeded, before polling.
    pub fn send<F>(
        &mut self,
        payload: &Payload,
        reporter: &dyn ProgressReporter,
        on_session: F,
    ) -> Result<Session>
    where
        F: FnOnce(&Session),
    {
        let meta = payload.meta()?;
        let session = self.begin_session(&meta)?;
        on_session(&session);
        let plan = self.await_chunk_plan(&session)?;
        let source = match payload.open() {
            Ok(s) => s,
            Err(e) => return Err(self.fail("open", e)),
        };
        self.upload(&session, &plan, source, reporter)?;
        Ok(session)
    }

    fn expect_state(&self, expected: TransferState) -> Result<()> {
        if self.state.is_terminal() {
            return Err(Error::Terminal(self.state));
        }
        if self.state != expected {
            return Err(Error::Protocol(format!(
                "operation requires state {:?}, session is {:?}",
                expected, self.state
            )));
        }
        Ok(())
    }

    fn fail(&mut self, context: &str, err: Error) -> Error {
        self.logger.error(context, &err.to_string());
        self.state = TransferState::Failed;
        err
    }
}

// Larger chunks grow the buffer as bytes actually arrive
const MAX_PREALLOC: u64 = 8 * 1024 * 1024;

/// Read up to `size` bytes, looping over short OS reads. Fewer bytes only at end of stream.
fn read_chunk<R: Read>(source: &mut R, size: u64) -> std::io::Result<Vec<u8>> {
    let mut chunk = Vec::with_capacity(size.min(MAX_PREALLOC) as usize);
    source.take(size).read_to_end(&mut chunk)?;
    Ok(chunk)
}
