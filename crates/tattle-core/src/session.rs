//! A mounted feedback form wired to a persistence backend.
//!
//! [`FeedbackSession`] owns the [`FormState`] plus the channel that carries
//! submission outcomes back from the worker thread. Outcomes are only applied
//! on the owning thread, in [`FeedbackSession::poll`] or
//! [`FeedbackSession::wait`], so form state is never touched concurrently.
//!
//! Dropping the session drops the receiving end of the channel. A worker that
//! finishes after that point sends into a closed channel and its outcome is
//! discarded.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::ErrorCode;
use crate::form::{FeedbackSnapshot, FormState, RejectReason, SubmitAttempt, Ticket};
use crate::store::{FeedbackStore, Receipt, StoreError};
use crate::validate::Field;

/// Outcome of one submission, as applied to the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitEvent {
    Succeeded { ticket: Ticket, receipt: Receipt },
    Failed {
        ticket: Ticket,
        code: ErrorCode,
        message: String,
    },
}

impl SubmitEvent {
    #[must_use]
    pub const fn ticket(&self) -> Ticket {
        match self {
            Self::Succeeded { ticket, .. } | Self::Failed { ticket, .. } => *ticket,
        }
    }
}

struct Completion {
    ticket: Ticket,
    result: Result<Receipt, StoreError>,
}

pub struct FeedbackSession {
    form: FormState,
    store: Arc<dyn FeedbackStore>,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
    last_receipt: Option<Receipt>,
}

impl FeedbackSession {
    #[must_use]
    pub fn new(form: FormState, store: Arc<dyn FeedbackStore>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            form,
            store,
            tx,
            rx,
            last_receipt: None,
        }
    }

    #[must_use]
    pub const fn form(&self) -> &FormState {
        &self.form
    }

    #[must_use]
    pub const fn last_receipt(&self) -> Option<&Receipt> {
        self.last_receipt.as_ref()
    }

    pub fn on_url_change(&mut self, value: impl Into<String>) {
        self.form.on_url_change(value);
    }

    pub fn on_description_change(&mut self, value: impl Into<String>) {
        self.form.on_description_change(value);
    }

    pub fn on_steps_change(&mut self, value: impl Into<String>) {
        self.form.on_steps_change(value);
    }

    pub fn set_field(&mut self, field: Field, value: impl Into<String>) {
        self.form.set_field(field, value);
    }

    /// Start a submission if the form allows it.
    ///
    /// The backend runs on its own thread with an owned snapshot; edits made
    /// while it runs do not reach it.
    pub fn submit(&mut self) -> Result<Ticket, RejectReason> {
        let (ticket, snapshot) = match self.form.begin_submit() {
            SubmitAttempt::Started { ticket, snapshot } => (ticket, snapshot),
            SubmitAttempt::Rejected(reason) => return Err(reason),
        };

        debug!(%ticket, store = %self.store.describe(), "dispatching submission");
        if let Err(err) = self.spawn_worker(ticket, snapshot) {
            warn!(%ticket, error = %err, "could not start submission worker");
            let result = Err(StoreError::Backend(format!(
                "could not start submission: {err}"
            )));
            // Both channel ends live in `self`, so this send cannot fail.
            let _ = self.tx.send(Completion { ticket, result });
        }
        Ok(ticket)
    }

    fn spawn_worker(&self, ticket: Ticket, snapshot: FeedbackSnapshot) -> std::io::Result<()> {
        let store = Arc::clone(&self.store);
        let tx = self.tx.clone();
        thread::Builder::new()
            .name(format!("tattle-submit-{}", ticket.get()))
            .spawn(move || {
                let result = store.submit(&snapshot);
                if tx.send(Completion { ticket, result }).is_err() {
                    debug!(%ticket, "form closed before submission finished");
                }
            })?;
        Ok(())
    }

    /// Apply any finished submission without blocking.
    pub fn poll(&mut self) -> Option<SubmitEvent> {
        while let Ok(completion) = self.rx.try_recv() {
            if let Some(event) = self.apply(completion) {
                return Some(event);
            }
        }
        None
    }

    /// Block up to `timeout` for the in-flight submission to resolve.
    ///
    /// Returns `None` on timeout or when nothing is in flight.
    pub fn wait(&mut self, timeout: Duration) -> Option<SubmitEvent> {
        let deadline = Instant::now() + timeout;
        while self.form.status().is_submitting() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(completion) => {
                    if let Some(event) = self.apply(completion) {
                        return Some(event);
                    }
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
            }
        }
        None
    }

    fn apply(&mut self, completion: Completion) -> Option<SubmitEvent> {
        let Completion { ticket, result } = completion;
        let outcome = result.as_ref().map(|_| ()).map_err(ToString::to_string);
        if !self.form.finish_submit(ticket, outcome) {
            return None;
        }

        match result {
            Ok(receipt) => {
                self.last_receipt = Some(receipt.clone());
                Some(SubmitEvent::Succeeded { ticket, receipt })
            }
            Err(err) => {
                warn!(%ticket, code = %err.error_code(), error = %err, "submission failed");
                Some(SubmitEvent::Failed {
                    ticket,
                    code: err.error_code(),
                    message: err.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::SubmitStatus;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WAIT: Duration = Duration::from_secs(5);

    /// Backend that blocks until the test releases an outcome.
    struct GatedStore {
        calls: AtomicUsize,
        seen: Mutex<Vec<FeedbackSnapshot>>,
        release: Mutex<Receiver<Result<(), String>>>,
    }

    impl GatedStore {
        fn new() -> (Arc<Self>, Sender<Result<(), String>>) {
            let (tx, rx) = mpsc::channel();
            let store = Arc::new(Self {
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
                release: Mutex::new(rx),
            });
            (store, tx)
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl FeedbackStore for GatedStore {
        fn submit(&self, snapshot: &FeedbackSnapshot) -> Result<Receipt, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(snapshot.clone());
            let outcome = self
                .release
                .lock()
                .unwrap()
                .recv()
                .unwrap_or_else(|_| Err("released without outcome".into()));
            outcome
                .map(|()| Receipt {
                    id: "fb-test".into(),
                    submitted_at: Utc::now(),
                    location: "memory".into(),
                })
                .map_err(StoreError::Backend)
        }

        fn describe(&self) -> String {
            "gated".into()
        }
    }

    fn session_with(store: Arc<GatedStore>) -> FeedbackSession {
        FeedbackSession::new(FormState::default(), store)
    }

    fn fill_valid(session: &mut FeedbackSession) {
        session.on_url_change("https://example.com/issue/1");
        session.on_description_change("it breaks");
        session.on_steps_change("click then crash");
    }

    #[test]
    fn invalid_form_never_reaches_store() {
        let (store, _release) = GatedStore::new();
        let mut session = session_with(Arc::clone(&store));
        session.on_url_change("not a url");
        session.on_description_change("d");
        session.on_steps_change("s");

        assert_eq!(session.submit(), Err(RejectReason::Invalid));
        assert!(session.poll().is_none());
        assert_eq!(store.calls(), 0);
        assert_eq!(session.form().status(), SubmitStatus::Idle);
    }

    #[test]
    fn valid_form_submits_triple_once() {
        let (store, release) = GatedStore::new();
        let mut session = session_with(Arc::clone(&store));
        fill_valid(&mut session);

        let ticket = session.submit().expect("submission should start");
        release.send(Ok(())).unwrap();
        let event = session.wait(WAIT).expect("submission should resolve");

        assert!(matches!(event, SubmitEvent::Succeeded { .. }));
        assert_eq!(event.ticket(), ticket);
        assert_eq!(store.calls(), 1);
        assert_eq!(
            store.seen.lock().unwrap()[0],
            FeedbackSnapshot {
                url: "https://example.com/issue/1".into(),
                description: "it breaks".into(),
                steps_to_reproduce: "click then crash".into(),
            }
        );
        assert!(session.form().submission_error().is_none());
        assert_eq!(session.last_receipt().map(|r| r.id.as_str()), Some("fb-test"));
    }

    #[test]
    fn failure_surfaces_message_and_allows_retry() {
        let (store, release) = GatedStore::new();
        let mut session = session_with(Arc::clone(&store));
        fill_valid(&mut session);

        session.submit().expect("submission should start");
        release.send(Err("network error".into())).unwrap();
        let event = session.wait(WAIT).expect("submission should resolve");

        assert!(matches!(event, SubmitEvent::Failed { ref message, .. } if message == "network error"));
        let form = session.form();
        assert_eq!(form.submission_error(), Some("network error"));
        assert_eq!(form.url(), "https://example.com/issue/1");
        assert_eq!(form.description(), "it breaks");
        assert_eq!(form.steps_to_reproduce(), "click then crash");
        assert!(form.all_valid());

        session.submit().expect("retry should be allowed");
        release.send(Ok(())).unwrap();
        session.wait(WAIT).expect("retry should resolve");
        assert_eq!(store.calls(), 2);
        assert!(session.form().submission_error().is_none());
    }

    #[test]
    fn rapid_double_submit_calls_store_once() {
        let (store, release) = GatedStore::new();
        let mut session = session_with(Arc::clone(&store));
        fill_valid(&mut session);

        session.submit().expect("first submission should start");
        assert_eq!(session.submit(), Err(RejectReason::InFlight));

        release.send(Ok(())).unwrap();
        session.wait(WAIT).expect("submission should resolve");
        assert_eq!(store.calls(), 1);
    }

    #[test]
    fn edits_while_in_flight_do_not_reach_store() {
        let (store, release) = GatedStore::new();
        let mut session = session_with(Arc::clone(&store));
        fill_valid(&mut session);

        session.submit().expect("submission should start");
        session.on_description_change("edited mid-flight");
        release.send(Ok(())).unwrap();
        session.wait(WAIT).expect("submission should resolve");

        assert_eq!(store.seen.lock().unwrap()[0].description, "it breaks");
        assert_eq!(session.form().description(), "edited mid-flight");
    }

    #[test]
    fn poll_is_empty_while_in_flight() {
        let (store, release) = GatedStore::new();
        let mut session = session_with(store);
        fill_valid(&mut session);

        session.submit().expect("submission should start");
        assert!(session.poll().is_none());
        assert!(session.form().status().is_submitting());

        release.send(Ok(())).unwrap();
        assert!(session.wait(WAIT).is_some());
        assert!(session.poll().is_none());
    }

    #[test]
    fn wait_times_out_without_touching_state() {
        let (store, release) = GatedStore::new();
        let mut session = session_with(store);
        fill_valid(&mut session);

        session.submit().expect("submission should start");
        assert!(session.wait(Duration::from_millis(20)).is_none());
        assert!(session.form().status().is_submitting());
        assert!(session.form().submission_error().is_none());

        release.send(Ok(())).unwrap();
        assert!(session.wait(WAIT).is_some());
    }

    #[test]
    fn wait_with_nothing_in_flight_returns_immediately() {
        let (store, _release) = GatedStore::new();
        let mut session = session_with(store);
        assert!(session.wait(WAIT).is_none());
    }

    #[test]
    fn closing_session_discards_late_outcome() {
        let (store, release) = GatedStore::new();
        let mut session = session_with(Arc::clone(&store));
        fill_valid(&mut session);
        session.submit().expect("submission should start");

        drop(session);
        release.send(Err("too late".into())).unwrap();

        // The worker still ran; its send simply has nowhere to go.
        let deadline = Instant::now() + WAIT;
        while store.calls() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(store.calls(), 1);
    }
}
