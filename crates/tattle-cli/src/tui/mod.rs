//! Terminal user interface (TUI) for tattle.
//!
//! ## Entry points
//!
//! - [`run_feedback_panel`]: full-screen feedback form.

pub mod feedback_panel;

use anyhow::Result;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind};
use crossterm::execute;
use ratatui::DefaultTerminal;
use std::io;
use std::time::Duration;
use tattle_core::FeedbackSession;
use tracing::debug;

use feedback_panel::{FeedbackPanel, PanelAction};

const TICK: Duration = Duration::from_millis(100);

/// Take over the terminal, run the panel until it closes, then restore.
pub fn run_feedback_panel(session: FeedbackSession) -> Result<()> {
    let mut terminal = ratatui::init();
    let mouse = execute!(io::stdout(), EnableMouseCapture);
    if let Err(err) = &mouse {
        debug!(error = %err, "mouse capture unavailable");
    }

    let result = run_loop(&mut terminal, FeedbackPanel::new(session));

    if mouse.is_ok() {
        let _ = execute!(io::stdout(), DisableMouseCapture);
    }
    ratatui::restore();
    result
}

fn run_loop(terminal: &mut DefaultTerminal, mut panel: FeedbackPanel) -> Result<()> {
    loop {
        panel.tick();
        terminal.draw(|frame| {
            let area = frame.area();
            panel.render(frame, area);
        })?;

        if !event::poll(TICK)? {
            continue;
        }
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if let Some(PanelAction::Close) = panel.handle_key(key) {
                    panel.close();
                    return Ok(());
                }
            }
            Event::Mouse(mouse) => panel.handle_mouse(mouse),
            _ => {}
        }
    }
}
