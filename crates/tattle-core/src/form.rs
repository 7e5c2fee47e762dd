//! Feedback form state machine.
//!
//! [`FormState`] owns the three raw field values, the per-field invalid flags,
//! the aggregate validity flag, and the last submission error. Field handlers
//! are synchronous and infallible. Submission is split in two halves so the
//! persistence call can run elsewhere:
//!
//! 1. [`FormState::begin_submit`] checks the validity gate and the in-flight
//!    guard, then hands out a [`Ticket`] plus an owned [`FeedbackSnapshot`].
//! 2. [`FormState::finish_submit`] applies the outcome for that ticket.
//!
//! ```text
//! Idle ──begin_submit──▶ Submitting ──finish_submit(Ok)──▶ Done (no error)
//!   ▲                        │
//!   │                        └──────finish_submit(Err)──▶ Done (error shown)
//!   └──────────── begin_submit is allowed again from Done ◀┘
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::validate::{Field, FieldRules, StandardRules};

/// What happens to the field values after a successful submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuccessPolicy {
    /// Keep the submitted values in place.
    #[default]
    Retain,
    /// Return the form to its freshly-mounted state.
    Reset,
}

/// Identifies one submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

impl Ticket {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Immutable copy of the field values taken when a submission starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackSnapshot {
    pub url: String,
    pub description: String,
    pub steps_to_reproduce: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmitStatus {
    #[default]
    Idle,
    Submitting(Ticket),
    Done,
}

impl SubmitStatus {
    #[must_use]
    pub const fn is_submitting(self) -> bool {
        matches!(self, Self::Submitting(_))
    }
}

/// Why [`FormState::begin_submit`] refused to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// At least one field fails its rule.
    Invalid,
    /// Another submission has not resolved yet.
    InFlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitAttempt {
    Started {
        ticket: Ticket,
        snapshot: FeedbackSnapshot,
    },
    Rejected(RejectReason),
}

impl SubmitAttempt {
    #[must_use]
    pub const fn is_started(&self) -> bool {
        matches!(self, Self::Started { .. })
    }
}

pub struct FormState {
    rules: Arc<dyn FieldRules>,
    policy: SuccessPolicy,
    url: String,
    description: String,
    steps_to_reproduce: String,
    url_invalid: bool,
    description_invalid: bool,
    steps_invalid: bool,
    all_valid: bool,
    submission_error: Option<String>,
    status: SubmitStatus,
    next_ticket: u64,
}

impl fmt::Debug for FormState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormState")
            .field("policy", &self.policy)
            .field("url", &self.url)
            .field("description", &self.description)
            .field("steps_to_reproduce", &self.steps_to_reproduce)
            .field("url_invalid", &self.url_invalid)
            .field("description_invalid", &self.description_invalid)
            .field("steps_invalid", &self.steps_invalid)
            .field("all_valid", &self.all_valid)
            .field("submission_error", &self.submission_error)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl Default for FormState {
    fn default() -> Self {
        Self::new(Arc::new(StandardRules::default()), SuccessPolicy::default())
    }
}

impl FormState {
    /// A freshly-mounted form: every field empty, nothing flagged, not valid.
    #[must_use]
    pub fn new(rules: Arc<dyn FieldRules>, policy: SuccessPolicy) -> Self {
        Self {
            rules,
            policy,
            url: String::new(),
            description: String::new(),
            steps_to_reproduce: String::new(),
            url_invalid: false,
            description_invalid: false,
            steps_invalid: false,
            all_valid: false,
            submission_error: None,
            status: SubmitStatus::Idle,
            next_ticket: 1,
        }
    }

    // -----------------------------------------------------------------------
    // Read side
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn steps_to_reproduce(&self) -> &str {
        &self.steps_to_reproduce
    }

    #[must_use]
    pub fn value(&self, field: Field) -> &str {
        match field {
            Field::Url => &self.url,
            Field::Description => &self.description,
            Field::StepsToReproduce => &self.steps_to_reproduce,
        }
    }

    #[must_use]
    pub const fn is_invalid(&self, field: Field) -> bool {
        match field {
            Field::Url => self.url_invalid,
            Field::Description => self.description_invalid,
            Field::StepsToReproduce => self.steps_invalid,
        }
    }

    #[must_use]
    pub const fn all_valid(&self) -> bool {
        self.all_valid
    }

    #[must_use]
    pub fn submission_error(&self) -> Option<&str> {
        self.submission_error.as_deref()
    }

    #[must_use]
    pub const fn status(&self) -> SubmitStatus {
        self.status
    }

    #[must_use]
    pub const fn policy(&self) -> SuccessPolicy {
        self.policy
    }

    /// Whether a submit trigger should be enabled right now.
    #[must_use]
    pub const fn can_submit(&self) -> bool {
        self.all_valid && !self.status.is_submitting()
    }

    #[must_use]
    pub fn rules(&self) -> &dyn FieldRules {
        self.rules.as_ref()
    }

    // -----------------------------------------------------------------------
    // Change handlers
    // -----------------------------------------------------------------------

    pub fn on_url_change(&mut self, value: impl Into<String>) {
        self.set_field(Field::Url, value);
    }

    pub fn on_description_change(&mut self, value: impl Into<String>) {
        self.set_field(Field::Description, value);
    }

    pub fn on_steps_change(&mut self, value: impl Into<String>) {
        self.set_field(Field::StepsToReproduce, value);
    }

    /// Store `value` into `field`, flag it from its own rule, and rederive
    /// aggregate validity.
    pub fn set_field(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        let invalid = !self.rules.is_valid(field, &value);
        match field {
            Field::Url => {
                self.url = value;
                self.url_invalid = invalid;
            }
            Field::Description => {
                self.description = value;
                self.description_invalid = invalid;
            }
            Field::StepsToReproduce => {
                self.steps_to_reproduce = value;
                self.steps_invalid = invalid;
            }
        }
        self.recompute_validity();
    }

    fn recompute_validity(&mut self) {
        self.all_valid = self.rules.is_valid_url(&self.url)
            && self.rules.is_valid_description(&self.description)
            && self.rules.is_valid_steps_to_reproduce(&self.steps_to_reproduce);
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Try to start a submission.
    ///
    /// A rejected attempt leaves the form exactly as it was.
    pub fn begin_submit(&mut self) -> SubmitAttempt {
        if !self.all_valid {
            debug!("submit ignored: form invalid");
            return SubmitAttempt::Rejected(RejectReason::Invalid);
        }
        if let SubmitStatus::Submitting(ticket) = self.status {
            debug!(%ticket, "submit ignored: submission already in flight");
            return SubmitAttempt::Rejected(RejectReason::InFlight);
        }

        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.status = SubmitStatus::Submitting(ticket);
        debug!(%ticket, "submission started");

        SubmitAttempt::Started {
            ticket,
            snapshot: self.snapshot(),
        }
    }

    /// Apply the outcome of the submission identified by `ticket`.
    ///
    /// Returns `false` (and changes nothing) when `ticket` is not the one in
    /// flight.
    pub fn finish_submit(&mut self, ticket: Ticket, outcome: Result<(), String>) -> bool {
        if self.status != SubmitStatus::Submitting(ticket) {
            debug!(%ticket, status = ?self.status, "stale submission outcome dropped");
            return false;
        }

        self.status = SubmitStatus::Done;
        match outcome {
            Ok(()) => {
                debug!(%ticket, "submission succeeded");
                self.submission_error = None;
                if self.policy == SuccessPolicy::Reset {
                    self.clear_fields();
                }
            }
            Err(message) => {
                debug!(%ticket, %message, "submission failed");
                self.submission_error = Some(message);
            }
        }
        true
    }

    fn snapshot(&self) -> FeedbackSnapshot {
        FeedbackSnapshot {
            url: self.url.clone(),
            description: self.description.clone(),
            steps_to_reproduce: self.steps_to_reproduce.clone(),
        }
    }

    fn clear_fields(&mut self) {
        self.url.clear();
        self.description.clear();
        self.steps_to_reproduce.clear();
        self.url_invalid = false;
        self.description_invalid = false;
        self.steps_invalid = false;
        self.recompute_validity();
    }
}
