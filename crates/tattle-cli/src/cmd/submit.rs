//! `tt submit`: fill the feedback form from flags and submit it.
//!
//! Values go through the same [`FeedbackSession`] the interactive panel uses,
//! so the validity gate and the backend are identical in both paths.

use crate::output::{
    CliError, OutputMode, pretty_kv, pretty_rule, render, render_error, render_field_errors,
};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use std::time::Duration;
use tattle_core::error::ErrorCode;
use tattle_core::validate::ValidationError;
use tattle_core::{FeedbackSession, Field, RejectReason, SubmitEvent};

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Link to the issue the feedback is about.
    #[arg(short, long)]
    pub url: String,

    /// What went wrong.
    #[arg(short, long)]
    pub description: String,

    /// How to reproduce it.
    #[arg(short, long)]
    pub steps: String,

    /// Seconds to wait for the backend before giving up.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct SubmitOutput {
    id: String,
    submitted_at: DateTime<Utc>,
    location: String,
    url: String,
    description: String,
    steps_to_reproduce: String,
}

/// Collect the validation failure for every invalid field, in display order.
pub fn field_errors(session: &FeedbackSession) -> Vec<ValidationError> {
    let form = session.form();
    Field::ALL
        .iter()
        .filter_map(|field| form.rules().validate(*field, form.value(*field)).err())
        .collect()
}

pub fn run_submit(
    args: &SubmitArgs,
    mut session: FeedbackSession,
    output: OutputMode,
) -> anyhow::Result<()> {
    session.on_url_change(args.url.as_str());
    session.on_description_change(args.description.as_str());
    session.on_steps_change(args.steps.as_str());

    match session.submit() {
        Ok(_) => {}
        Err(RejectReason::Invalid) => {
            let fields = field_errors(&session);
            let names: Vec<&str> = fields.iter().map(|err| err.field.key()).collect();
            let summary = CliError::from_code(
                ErrorCode::FormIncomplete,
                format!("form is incomplete: {}", names.join(", ")),
            );
            render_field_errors(output, &summary, &fields)?;
            anyhow::bail!("{}", summary.message);
        }
        Err(RejectReason::InFlight) => {
            let err = CliError::from_code(
                ErrorCode::SubmissionInFlight,
                ErrorCode::SubmissionInFlight.message(),
            );
            render_error(output, &err)?;
            anyhow::bail!("{}", err.message);
        }
    }

    let Some(event) = session.wait(Duration::from_secs(args.timeout_secs)) else {
        let err = CliError::from_code(
            ErrorCode::SubmissionTimedOut,
            format!("submission did not finish within {}s", args.timeout_secs),
        );
        render_error(output, &err)?;
        anyhow::bail!("{}", err.message);
    };

    match event {
        SubmitEvent::Succeeded { receipt, .. } => {
            let result = SubmitOutput {
                id: receipt.id,
                submitted_at: receipt.submitted_at,
                location: receipt.location,
                url: args.url.clone(),
                description: args.description.clone(),
                steps_to_reproduce: args.steps.clone(),
            };
            render(output, &result, |r, w| {
                if output == OutputMode::Pretty {
                    writeln!(w, "Feedback submitted")?;
                    pretty_rule(w)?;
                    pretty_kv(w, "ID", &r.id)?;
                    pretty_kv(w, "Stored", &r.location)?;
                    pretty_kv(w, "URL", &r.url)
                } else {
                    writeln!(w, "{}  {}", r.id, r.location)
                }
            })
        }
        SubmitEvent::Failed { code, message, .. } => {
            let err = CliError::from_code(code, message);
            render_error(output, &err)?;
            anyhow::bail!("{}", err.message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::mount_session;
    use tattle_core::config::ProjectConfig;

    #[test]
    fn submit_args_parse() {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: SubmitArgs,
        }
        let w = Wrapper::parse_from([
            "test",
            "--url",
            "https://example.com/issue/1",
            "-d",
            "it breaks",
            "-s",
            "click then crash",
        ]);
        assert_eq!(w.args.url, "https://example.com/issue/1");
        assert_eq!(w.args.steps, "click then crash");
        assert_eq!(w.args.timeout_secs, 30);
    }

    #[test]
    fn field_errors_follow_display_order() {
        let temp = tempfile::tempdir().expect("temp dir");
        let mut session =
            mount_session(&ProjectConfig::default(), temp.path()).expect("mount session");
        session.on_url_change("not a url");
        session.on_description_change("");
        session.on_steps_change("fine");

        let errors = field_errors(&session);
        let fields: Vec<Field> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec![Field::Url, Field::Description]);
    }

    #[test]
    fn valid_submission_writes_log() {
        let temp = tempfile::tempdir().expect("temp dir");
        let session =
            mount_session(&ProjectConfig::default(), temp.path()).expect("mount session");
        let args = SubmitArgs {
            url: "https://example.com/issue/1".into(),
            description: "it breaks".into(),
            steps: "click then crash".into(),
            timeout_secs: 5,
        };

        run_submit(&args, session, OutputMode::Text).expect("submit should succeed");

        let records = tattle_core::store::load_records(temp.path()).expect("load");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].description, "it breaks");
    }

    #[test]
    fn invalid_submission_fails_without_writing() {
        let temp = tempfile::tempdir().expect("temp dir");
        let session =
            mount_session(&ProjectConfig::default(), temp.path()).expect("mount session");
        let args = SubmitArgs {
            url: "not a url".into(),
            description: "d".into(),
            steps: "s".into(),
            timeout_secs: 5,
        };

        let err = run_submit(&args, session, OutputMode::Text).unwrap_err();
        assert!(err.to_string().contains("url"));
        assert!(!temp.path().join(".tattle/feedback.jsonl").exists());
    }
}
