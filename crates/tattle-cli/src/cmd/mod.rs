pub mod completions;
pub mod list;
pub mod panel;
pub mod submit;

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tattle_core::config::ProjectConfig;
use tattle_core::{FeedbackSession, FormState, StandardRules};
use tracing::debug;

/// Mount a fresh form over the backend the project config selects.
pub fn mount_session(config: &ProjectConfig, project_root: &Path) -> Result<FeedbackSession> {
    let rules = StandardRules::from(&config.rules);
    let form = FormState::new(Arc::new(rules), config.form.on_success);
    let store = config.build_store(project_root)?;
    debug!(store = %store.describe(), policy = ?config.form.on_success, "feedback form mounted");
    Ok(FeedbackSession::new(form, store))
}
