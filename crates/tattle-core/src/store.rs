//! Persistence backends for submitted feedback.
//!
//! The form only needs [`FeedbackStore::submit`]. Two backends ship here:
//!
//! - [`JsonlStore`] appends one JSON object per line to
//!   `.tattle/feedback.jsonl` under a project root.
//! - [`HttpStore`] POSTs the same record to a configured endpoint.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ErrorCode;
use crate::form::FeedbackSnapshot;

pub const FEEDBACK_DIR: &str = ".tattle";
pub const FEEDBACK_LOG_FILE: &str = "feedback.jsonl";

/// One stored piece of feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: String,
    pub submitted_at: DateTime<Utc>,
    pub url: String,
    pub description: String,
    pub steps_to_reproduce: String,
}

impl FeedbackRecord {
    /// Stamp a snapshot with an id and submission time.
    #[must_use]
    pub fn from_snapshot(snapshot: &FeedbackSnapshot, submitted_at: DateTime<Utc>) -> Self {
        Self {
            id: record_id(submitted_at),
            submitted_at,
            url: snapshot.url.clone(),
            description: snapshot.description.clone(),
            steps_to_reproduce: snapshot.steps_to_reproduce.clone(),
        }
    }
}

/// Acknowledgement returned by a backend once feedback is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub id: String,
    pub submitted_at: DateTime<Utc>,
    /// Where the record went (file path or endpoint URL).
    pub location: String,
}

/// Errors a backend can report. `Display` is the text shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to write feedback to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize feedback: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("feedback endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("feedback endpoint rejected submission ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Backend-specific failure whose message is already user-facing.
    #[error("{0}")]
    Backend(String),

    #[error("malformed feedback record at {path}:{line}: {message}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

impl StoreError {
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Io { .. } => ErrorCode::StoreWriteFailed,
            Self::Serialize(_) => ErrorCode::InternalUnexpected,
            Self::Unreachable(_) => ErrorCode::StoreUnreachable,
            Self::Rejected { .. } | Self::Backend(_) => ErrorCode::StoreRejected,
            Self::Corrupt { .. } => ErrorCode::CorruptFeedbackLog,
        }
    }
}

/// Somewhere submitted feedback ends up.
///
/// `submit` may block; callers run it off the UI thread.
pub trait FeedbackStore: Send + Sync {
    fn submit(&self, snapshot: &FeedbackSnapshot) -> Result<Receipt, StoreError>;

    /// Short name for logs.
    fn describe(&self) -> String;
}

// ---------------------------------------------------------------------------
// JSONL
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct JsonlStore {
    root: PathBuf,
}

impl JsonlStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        feedback_log_path(&self.root)
    }

    /// Append one record to the log.
    pub fn append(&self, record: &FeedbackRecord) -> Result<(), StoreError> {
        let log_path = self.log_path();
        let io_err = |source| StoreError::Io {
            path: log_path.clone(),
            source,
        };

        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(io_err)?;
        file.write_all(&line).map_err(io_err)?;
        file.flush().map_err(io_err)?;
        Ok(())
    }

    /// Load every record in the log, oldest first.
    pub fn load_records(&self) -> Result<Vec<FeedbackRecord>, StoreError> {
        load_records(&self.root)
    }
}

impl FeedbackStore for JsonlStore {
    fn submit(&self, snapshot: &FeedbackSnapshot) -> Result<Receipt, StoreError> {
        let record = FeedbackRecord::from_snapshot(snapshot, Utc::now());
        self.append(&record)?;
        let location = self.log_path().display().to_string();
        info!(id = %record.id, %location, "feedback stored");
        Ok(Receipt {
            id: record.id,
            submitted_at: record.submitted_at,
            location,
        })
    }

    fn describe(&self) -> String {
        format!("jsonl:{}", self.log_path().display())
    }
}

/// Load all records from `<root>/.tattle/feedback.jsonl`.
///
/// A missing log is an empty list. Blank lines are skipped.
pub fn load_records(root: &Path) -> Result<Vec<FeedbackRecord>, StoreError> {
    let log_path = feedback_log_path(root);
    if !log_path.exists() {
        return Ok(Vec::new());
    }

    let file = fs::File::open(&log_path).map_err(|source| StoreError::Io {
        path: log_path.clone(),
        source,
    })?;

    let mut records = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| StoreError::Io {
            path: log_path.clone(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let record =
            serde_json::from_str::<FeedbackRecord>(&line).map_err(|err| StoreError::Corrupt {
                path: log_path.clone(),
                line: line_no + 1,
                message: err.to_string(),
            })?;
        records.push(record);
    }

    debug!(count = records.len(), path = %log_path.display(), "feedback log loaded");
    Ok(records)
}

fn feedback_log_path(root: &Path) -> PathBuf {
    root.join(FEEDBACK_DIR).join(FEEDBACK_LOG_FILE)
}

static RECORD_SEQ: AtomicU64 = AtomicU64::new(0);

/// `fb-<micros>-<pid><seq>`, all hex. The suffix keeps ids from separate
/// processes, or from one process within the same microsecond, apart.
fn record_id(submitted_at: DateTime<Utc>) -> String {
    let seq = RECORD_SEQ.fetch_add(1, Ordering::Relaxed) & 0xffff;
    format!(
        "fb-{:x}-{:x}{seq:04x}",
        submitted_at.timestamp_micros(),
        std::process::id()
    )
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

pub struct HttpStore {
    endpoint: String,
    agent: ureq::Agent,
}

impl HttpStore {
    #[must_use]
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            endpoint: endpoint.into(),
            agent,
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl FeedbackStore for HttpStore {
    fn submit(&self, snapshot: &FeedbackSnapshot) -> Result<Receipt, StoreError> {
        let record = FeedbackRecord::from_snapshot(snapshot, Utc::now());
        let body = serde_json::to_value(&record)?;

        match self.agent.post(&self.endpoint).send_json(body) {
            Ok(response) => {
                info!(id = %record.id, endpoint = %self.endpoint, status = response.status(), "feedback posted");
                Ok(Receipt {
                    id: record.id,
                    submitted_at: record.submitted_at,
                    location: self.endpoint.clone(),
                })
            }
            Err(ureq::Error::Status(status, response)) => {
                let message = response
                    .into_string()
                    .ok()
                    .map(|body| body.trim().to_string())
                    .filter(|body| !body.is_empty())
                    .unwrap_or_else(|| "no response body".to_string());
                Err(StoreError::Rejected { status, message })
            }
            Err(ureq::Error::Transport(transport)) => {
                Err(StoreError::Unreachable(transport.to_string()))
            }
        }
    }

    fn describe(&self) -> String {
        format!("http:{}", self.endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot() -> FeedbackSnapshot {
        FeedbackSnapshot {
            url: "https://example.com/issue/1".into(),
            description: "it breaks".into(),
            steps_to_reproduce: "click then crash".into(),
        }
    }

    #[test]
    fn missing_log_loads_empty() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let records = load_records(temp.path()).expect("load should succeed");
        assert!(records.is_empty());
    }

    #[test]
    fn submit_appends_and_loads_back() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = JsonlStore::new(temp.path());

        let first = store.submit(&snapshot()).expect("submit should succeed");
        let mut other = snapshot();
        other.description = "second report".into();
        store.submit(&other).expect("submit should succeed");

        let records = store.load_records().expect("load should succeed");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, first.id);
        assert_eq!(records[0].url, "https://example.com/issue/1");
        assert_eq!(records[1].description, "second report");
        assert!(first.location.ends_with("feedback.jsonl"));
    }

    #[test]
    fn multiline_text_stays_on_one_line() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = JsonlStore::new(temp.path());
        let mut snap = snapshot();
        snap.steps_to_reproduce = "1. open\n2. click\n3. crash".into();
        store.submit(&snap).expect("submit should succeed");

        let raw = std::fs::read_to_string(store.log_path()).expect("read log");
        assert_eq!(raw.lines().count(), 1);
        let records = store.load_records().expect("load should succeed");
        assert_eq!(records[0].steps_to_reproduce, "1. open\n2. click\n3. crash");
    }

    #[test]
    fn blank_lines_are_skipped() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = JsonlStore::new(temp.path());
        store.submit(&snapshot()).expect("submit should succeed");
        let mut file = OpenOptions::new()
            .append(true)
            .open(store.log_path())
            .expect("open log");
        writeln!(file).expect("write blank");
        writeln!(file, "   ").expect("write blank");

        assert_eq!(store.load_records().expect("load").len(), 1);
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = JsonlStore::new(temp.path());
        store.submit(&snapshot()).expect("submit should succeed");
        let mut file = OpenOptions::new()
            .append(true)
            .open(store.log_path())
            .expect("open log");
        writeln!(file, "{{not json").expect("write garbage");

        let err = store.load_records().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { line: 2, .. }));
        assert_eq!(err.error_code(), ErrorCode::CorruptFeedbackLog);
    }

    #[test]
    fn unwritable_root_surfaces_io_error() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, b"file, not dir").expect("write blocker");

        let store = JsonlStore::new(&blocker);
        let err = store.submit(&snapshot()).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert!(err.to_string().starts_with("failed to write feedback to"));
    }

    #[test]
    fn record_id_is_time_derived() {
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let record = FeedbackRecord::from_snapshot(&snapshot(), at);
        let prefix = format!("fb-{:x}-{:x}", 1_700_000_000_000_000_i64, std::process::id());
        assert!(record.id.starts_with(&prefix), "unexpected id {}", record.id);
        assert_eq!(record.submitted_at, at);
    }

    #[test]
    fn record_ids_differ_within_one_microsecond() {
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let first = FeedbackRecord::from_snapshot(&snapshot(), at);
        let second = FeedbackRecord::from_snapshot(&snapshot(), at);
        assert_ne!(first.id, second.id);
    }

    // -----------------------------------------------------------------------
    // HTTP backend against a one-shot local server
    // -----------------------------------------------------------------------

    /// Serve exactly one request with `status_line` and `body`, returning the
    /// endpoint URL and a handle yielding the request body the server saw.
    fn one_shot_server(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, std::thread::JoinHandle<String>) {
        use std::io::Read;
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);

            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut request_body = vec![0; content_length];
            reader.read_exact(&mut request_body).unwrap();

            let mut stream = reader.into_inner();
            write!(
                stream,
                "HTTP/1.1 {status_line}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
            stream.flush().unwrap();
            String::from_utf8(request_body).unwrap()
        });
        (format!("http://{addr}/feedback"), handle)
    }

    #[test]
    fn http_created_returns_receipt_for_endpoint() {
        let (endpoint, server) = one_shot_server("201 Created", "");
        let store = HttpStore::new(endpoint.clone(), Duration::from_secs(5));

        let receipt = store.submit(&snapshot()).expect("2xx should be accepted");
        assert_eq!(receipt.location, endpoint);
        assert!(receipt.id.starts_with("fb-"));

        let sent: FeedbackRecord =
            serde_json::from_str(&server.join().unwrap()).expect("server saw a record");
        assert_eq!(sent.id, receipt.id);
        assert_eq!(sent.description, "it breaks");
        assert_eq!(sent.steps_to_reproduce, "click then crash");
    }

    #[test]
    fn http_error_status_maps_to_rejected() {
        let (endpoint, server) = one_shot_server("422 Unprocessable Entity", "duplicate report");
        let store = HttpStore::new(endpoint, Duration::from_secs(5));

        let err = store.submit(&snapshot()).unwrap_err();
        server.join().unwrap();
        match err {
            StoreError::Rejected { status, ref message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "duplicate report");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn http_error_status_without_body_says_so() {
        let (endpoint, server) = one_shot_server("500 Internal Server Error", "");
        let store = HttpStore::new(endpoint, Duration::from_secs(5));

        let err = store.submit(&snapshot()).unwrap_err();
        server.join().unwrap();
        assert!(matches!(
            err,
            StoreError::Rejected { status: 500, ref message } if message == "no response body"
        ));
        assert_eq!(err.error_code(), ErrorCode::StoreRejected);
    }

    #[test]
    fn unreachable_endpoint_maps_to_unreachable() {
        // Bind then drop, so the port is known to have no listener.
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let store = HttpStore::new(format!("http://{addr}/feedback"), Duration::from_secs(2));

        let err = store.submit(&snapshot()).unwrap_err();
        assert!(matches!(err, StoreError::Unreachable(_)));
        assert!(err.to_string().starts_with("feedback endpoint unreachable"));
        assert_eq!(err.error_code(), ErrorCode::StoreUnreachable);
    }

    #[test]
    fn rejected_error_message_is_user_facing() {
        let err = StoreError::Rejected {
            status: 422,
            message: "duplicate report".into(),
        };
        assert_eq!(
            err.to_string(),
            "feedback endpoint rejected submission (422): duplicate report"
        );
        assert_eq!(err.error_code(), ErrorCode::StoreRejected);
    }
}
