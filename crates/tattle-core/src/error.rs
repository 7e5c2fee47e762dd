use std::fmt;

/// Machine-readable error codes for scripted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    FormIncomplete,
    SubmissionInFlight,
    SubmissionTimedOut,
    StoreWriteFailed,
    StoreRejected,
    StoreUnreachable,
    CorruptFeedbackLog,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1002",
            Self::FormIncomplete => "E2002",
            Self::SubmissionInFlight => "E2003",
            Self::SubmissionTimedOut => "E2004",
            Self::StoreWriteFailed => "E5001",
            Self::StoreRejected => "E5002",
            Self::StoreUnreachable => "E5003",
            Self::CorruptFeedbackLog => "E5004",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::FormIncomplete => "Form is incomplete",
            Self::SubmissionInFlight => "A submission is already in flight",
            Self::SubmissionTimedOut => "Submission did not finish in time",
            Self::StoreWriteFailed => "Feedback log write failed",
            Self::StoreRejected => "Feedback endpoint rejected the submission",
            Self::StoreUnreachable => "Feedback endpoint unreachable",
            Self::CorruptFeedbackLog => "Corrupt feedback log",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to users.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .tattle/config.toml and retry."),
            Self::FormIncomplete => {
                Some("Provide an issue URL, a description, and steps to reproduce.")
            }
            Self::SubmissionInFlight => Some("Wait for the current submission to finish."),
            Self::SubmissionTimedOut => {
                Some("The submission may still land; check `tt list` before retrying.")
            }
            Self::StoreWriteFailed => Some("Check disk space and write permissions."),
            Self::StoreRejected => None,
            Self::StoreUnreachable => Some("Check the [store] endpoint in config and retry."),
            Self::CorruptFeedbackLog => {
                Some("Remove or repair the malformed line in .tattle/feedback.jsonl.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
