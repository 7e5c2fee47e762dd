//! Field rules for the feedback form.
//!
//! Every rule is a total, pure predicate over the raw field text. The
//! `validate_*` functions return the reason a value failed so the CLI can
//! print something actionable; the `is_valid_*` predicates are what the form
//! state machine consumes.

use std::fmt;

use url::Url;

pub const MAX_DESCRIPTION_LEN: usize = 10_000;
pub const MAX_STEPS_LEN: usize = 10_000;
pub const DEFAULT_SCHEMES: &[&str] = &["http", "https"];

/// One of the three user-supplied form fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Url,
    Description,
    StepsToReproduce,
}

impl Field {
    /// All fields in display order.
    pub const ALL: [Self; 3] = [Self::Url, Self::Description, Self::StepsToReproduce];

    /// Stable snake-case key used in JSON output and error codes.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Description => "description",
            Self::StepsToReproduce => "steps_to_reproduce",
        }
    }

    /// Field label shown next to the input.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Url => "URL link to the issue",
            Self::Description => "Description",
            Self::StepsToReproduce => "Steps to reproduce",
        }
    }

    /// Helper text shown under an invalid field.
    #[must_use]
    pub const fn hint(self) -> &'static str {
        match self {
            Self::Url => "Must be a valid URL",
            Self::Description => "Description must be included",
            Self::StepsToReproduce => "Steps to reproduce any issue must be included",
        }
    }

    /// Next field in display order, wrapping around.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Url => Self::Description,
            Self::Description => Self::StepsToReproduce,
            Self::StepsToReproduce => Self::Url,
        }
    }

    /// Previous field in display order, wrapping around.
    #[must_use]
    pub const fn prev(self) -> Self {
        match self {
            Self::Url => Self::StepsToReproduce,
            Self::Description => Self::Url,
            Self::StepsToReproduce => Self::Description,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: Field,
    pub value: String,
    pub reason: String,
    pub suggestion: String,
    pub code: &'static str,
}

impl ValidationError {
    pub fn new(
        field: Field,
        value: impl Into<String>,
        reason: impl Into<String>,
        suggestion: impl Into<String>,
        code: &'static str,
    ) -> Self {
        Self {
            field,
            value: value.into(),
            reason: reason.into(),
            suggestion: suggestion.into(),
            code,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} '{}': {}", self.field, self.value, self.reason)
    }
}

impl std::error::Error for ValidationError {}

/// The three field predicates the form depends on.
///
/// Implementations must be deterministic and side-effect free; the form calls
/// them on every keystroke and assumes the same input yields the same answer.
pub trait FieldRules: Send + Sync {
    fn validate_url(&self, s: &str) -> Result<(), ValidationError>;
    fn validate_description(&self, s: &str) -> Result<(), ValidationError>;
    fn validate_steps_to_reproduce(&self, s: &str) -> Result<(), ValidationError>;

    fn is_valid_url(&self, s: &str) -> bool {
        self.validate_url(s).is_ok()
    }

    fn is_valid_description(&self, s: &str) -> bool {
        self.validate_description(s).is_ok()
    }

    fn is_valid_steps_to_reproduce(&self, s: &str) -> bool {
        self.validate_steps_to_reproduce(s).is_ok()
    }

    /// Dispatch to the rule for `field`.
    fn validate(&self, field: Field, s: &str) -> Result<(), ValidationError> {
        match field {
            Field::Url => self.validate_url(s),
            Field::Description => self.validate_description(s),
            Field::StepsToReproduce => self.validate_steps_to_reproduce(s),
        }
    }

    fn is_valid(&self, field: Field, s: &str) -> bool {
        self.validate(field, s).is_ok()
    }
}

/// Default rules: a parseable web URL plus two required free-text fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardRules {
    pub allowed_schemes: Vec<String>,
    pub max_description_len: usize,
    pub max_steps_len: usize,
}

impl Default for StandardRules {
    fn default() -> Self {
        Self {
            allowed_schemes: DEFAULT_SCHEMES.iter().map(ToString::to_string).collect(),
            max_description_len: MAX_DESCRIPTION_LEN,
            max_steps_len: MAX_STEPS_LEN,
        }
    }
}

impl FieldRules for StandardRules {
    fn validate_url(&self, s: &str) -> Result<(), ValidationError> {
        let field = Field::Url;
        if s.trim().is_empty() {
            return Err(ValidationError::new(
                field,
                s,
                "must not be empty",
                "paste a link to the issue, e.g. https://example.com/issue/1",
                "invalid_url",
            ));
        }
        if s.trim() != s {
            return Err(ValidationError::new(
                field,
                s,
                "must not start or end with whitespace",
                "trim leading/trailing whitespace from the URL",
                "invalid_url",
            ));
        }

        let parsed = Url::parse(s).map_err(|err| {
            ValidationError::new(
                field,
                s,
                format!("is not a URL ({err})"),
                "use an absolute link such as https://example.com/issue/1",
                "invalid_url",
            )
        })?;

        if !self
            .allowed_schemes
            .iter()
            .any(|scheme| scheme.eq_ignore_ascii_case(parsed.scheme()))
        {
            return Err(ValidationError::new(
                field,
                s,
                format!("scheme '{}' is not allowed", parsed.scheme()),
                format!("use one of: {}", self.allowed_schemes.join(", ")),
                "invalid_url",
            ));
        }

        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(ValidationError::new(
                field,
                s,
                "must include a host",
                "use an absolute link such as https://example.com/issue/1",
                "invalid_url",
            ));
        }

        Ok(())
    }

    fn validate_description(&self, s: &str) -> Result<(), ValidationError> {
        validate_required_text(
            Field::Description,
            s,
            self.max_description_len,
            "invalid_description",
        )
    }

    fn validate_steps_to_reproduce(&self, s: &str) -> Result<(), ValidationError> {
        validate_required_text(
            Field::StepsToReproduce,
            s,
            self.max_steps_len,
            "invalid_steps_to_reproduce",
        )
    }
}

fn validate_required_text(
    field: Field,
    s: &str,
    max_len: usize,
    code: &'static str,
) -> Result<(), ValidationError> {
    if s.trim().is_empty() {
        return Err(ValidationError::new(
            field,
            s,
            "must not be empty",
            format!("provide a non-empty {}", field.label().to_lowercase()),
            code,
        ));
    }
    if s.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            s,
            format!("must be <= {max_len} characters"),
            "shorten the text",
            code,
        ));
    }
    if s
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
    {
        return Err(ValidationError::new(
            field,
            s,
            "must not contain control characters",
            "remove control characters from the text",
            code,
        ));
    }
    Ok(())
}
