//! `tt panel`: interactive terminal feedback form.

use crate::tui;
use tattle_core::FeedbackSession;

/// Open the panel and block until the user closes it.
pub fn run_panel(session: FeedbackSession) -> anyhow::Result<()> {
    tui::run_feedback_panel(session)
}
