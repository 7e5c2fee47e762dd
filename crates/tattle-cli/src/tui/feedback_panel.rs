//! TUI feedback panel.
//!
//! A centered overlay with three required inputs (issue URL, description,
//! steps to reproduce). Each keystroke revalidates the focused field; invalid
//! fields show their hint underneath. The submit button is only live while the
//! whole form is valid and nothing is in flight.
//!
//! - **Tab / ↓** and **Shift-Tab / ↑** move focus
//! - **Enter** (or clicking the button) submits
//! - **Ctrl-U** clears the focused field
//! - **Esc** closes the panel
//!
//! Enter is handled here and nowhere else, so the shortcut lives exactly as
//! long as the panel does. [`FeedbackPanel::close`] drops the session and with
//! it any submission result that has not arrived yet.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};
use tattle_core::{FeedbackSession, Field, SubmitEvent};
use tracing::debug;

/// The action the panel wants the caller to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelAction {
    /// The user closed the panel.
    Close,
}

pub struct FeedbackPanel {
    session: FeedbackSession,
    focus: Field,
    /// Confirmation text after a successful submission.
    notice: Option<String>,
    /// Screen regions from the last render, for mouse hit-testing.
    field_areas: [Option<Rect>; 3],
    submit_area: Option<Rect>,
}

impl FeedbackPanel {
    /// Mount the panel over a fresh session.
    pub fn new(session: FeedbackSession) -> Self {
        Self {
            session,
            focus: Field::Url,
            notice: None,
            field_areas: [None; 3],
            submit_area: None,
        }
    }

    pub const fn session(&self) -> &FeedbackSession {
        &self.session
    }

    pub const fn focus(&self) -> Field {
        self.focus
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Unmount: drop the session so late results go nowhere.
    pub fn close(self) {
        debug!(status = ?self.session.form().status(), "feedback panel closed");
    }

    // -----------------------------------------------------------------------
    // Input handling
    // -----------------------------------------------------------------------

    /// Feed a key event to the panel.
    ///
    /// Returns `Some(PanelAction)` when the caller should close the panel.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<PanelAction> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => Some(PanelAction::Close),
            KeyCode::Char('c') if ctrl => Some(PanelAction::Close),

            KeyCode::Enter => {
                self.submit();
                None
            }

            KeyCode::Tab | KeyCode::Down => {
                self.focus = self.focus.next();
                None
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.focus = self.focus.prev();
                None
            }

            KeyCode::Char('u') if ctrl => {
                self.session.set_field(self.focus, String::new());
                None
            }

            KeyCode::Backspace => {
                let mut value = self.focused_value().to_string();
                value.pop();
                self.session.set_field(self.focus, value);
                None
            }

            KeyCode::Char(c) if !ctrl && !key.modifiers.contains(KeyModifiers::ALT) => {
                let mut value = self.focused_value().to_string();
                value.push(c);
                self.session.set_field(self.focus, value);
                None
            }

            _ => None,
        }
    }

    /// Feed a mouse event: clicking an input focuses it, clicking the button
    /// submits.
    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        if mouse.kind != MouseEventKind::Down(MouseButton::Left) {
            return;
        }
        let pos = Position::new(mouse.column, mouse.row);

        if self.submit_area.is_some_and(|area| area.contains(pos)) {
            self.submit();
            return;
        }

        for (field, area) in Field::ALL.iter().zip(self.field_areas) {
            if area.is_some_and(|area| area.contains(pos)) {
                self.focus = *field;
                return;
            }
        }
    }

    /// Shared by Enter and the button; the form itself refuses when invalid
    /// or already submitting.
    pub fn submit(&mut self) {
        if let Ok(ticket) = self.session.submit() {
            debug!(%ticket, "submission started from panel");
            self.notice = None;
        }
    }

    /// Called periodically to pick up finished submissions.
    pub fn tick(&mut self) {
        while let Some(event) = self.session.poll() {
            debug!(ticket = %event.ticket(), "submission resolved in panel");
            match event {
                SubmitEvent::Succeeded { receipt, .. } => {
                    self.notice = Some(format!("Thanks! Feedback saved as {}", receipt.id));
                }
                SubmitEvent::Failed { .. } => {
                    self.notice = None;
                }
            }
        }
    }

    fn focused_value(&self) -> &str {
        self.session.form().value(self.focus)
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    /// Render the panel as a centered overlay on top of `area`.
    pub fn render(&mut self, frame: &mut Frame, area: Rect) {
        let dialog_w: u16 = 70.min(area.width.saturating_sub(4));
        let dialog_h: u16 = 18.min(area.height.saturating_sub(4));

        let x = area.x + area.width.saturating_sub(dialog_w) / 2;
        let y = area.y + area.height.saturating_sub(dialog_h) / 2;

        let dialog_area = Rect {
            x,
            y,
            width: dialog_w,
            height: dialog_h,
        };

        frame.render_widget(Clear, dialog_area);

        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Leave Feedback ")
            .title_style(
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )
            .style(Style::default().bg(Color::Black));
        let inner = block.inner(dialog_area);
        frame.render_widget(block, dialog_area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // intro
                Constraint::Length(3), // url
                Constraint::Length(1),
                Constraint::Length(3), // description
                Constraint::Length(1),
                Constraint::Length(3), // steps
                Constraint::Length(1),
                Constraint::Length(1), // button
                Constraint::Length(1), // error / notice
                Constraint::Min(0),
                Constraint::Length(1), // key hints
            ])
            .split(inner);

        frame.render_widget(
            Paragraph::new("Give the developers feedback about the app.")
                .style(Style::default().fg(Color::Gray)),
            chunks[0],
        );

        for (idx, field) in Field::ALL.iter().enumerate() {
            let input_area = chunks[1 + idx * 2];
            let hint_area = chunks[2 + idx * 2];
            self.render_field(frame, *field, input_area, hint_area);
            self.field_areas[idx] = Some(input_area);
        }

        self.render_button(frame, chunks[7]);
        self.render_status(frame, chunks[8]);

        let hints = Line::from(vec![
            Span::styled("Tab", Style::default().fg(Color::Yellow)),
            Span::raw(" next field  "),
            Span::styled("Enter", Style::default().fg(Color::Yellow)),
            Span::raw(" submit  "),
            Span::styled("Ctrl-U", Style::default().fg(Color::Yellow)),
            Span::raw(" clear  "),
            Span::styled("Esc", Style::default().fg(Color::Yellow)),
            Span::raw(" close"),
        ]);
        frame.render_widget(Paragraph::new(hints), chunks[10]);
    }

    fn render_field(&self, frame: &mut Frame, field: Field, input_area: Rect, hint_area: Rect) {
        let form = self.session.form();
        let focused = self.focus == field;
        let invalid = form.is_invalid(field);

        let border = if invalid {
            Color::Red
        } else if focused {
            Color::Yellow
        } else {
            Color::DarkGray
        };

        let width = usize::from(input_area.width.saturating_sub(3));
        let mut shown = visible_tail(form.value(field), width);
        if focused {
            shown.push('_');
        }

        let input = Paragraph::new(shown)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" {} * ", field.label()))
                    .border_style(Style::default().fg(border)),
            )
            .style(Style::default().fg(Color::White));
        frame.render_widget(input, input_area);

        if invalid {
            frame.render_widget(
                Paragraph::new(format!(" {}", field.hint())).style(Style::default().fg(Color::Red)),
                hint_area,
            );
        }
    }

    fn render_button(&mut self, frame: &mut Frame, area: Rect) {
        let form = self.session.form();
        let (label, style) = if form.status().is_submitting() {
            (
                "[ Submitting… ]",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )
        } else if form.can_submit() {
            (
                "[ Submit ]",
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )
        } else {
            ("[ Submit ]", Style::default().fg(Color::DarkGray))
        };

        let width = u16::try_from(label.chars().count()).unwrap_or(u16::MAX);
        let button_area = Rect {
            width: width.min(area.width),
            ..area
        };
        frame.render_widget(Paragraph::new(label).style(style), button_area);
        self.submit_area = Some(button_area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let form = self.session.form();
        if let Some(err) = form.submission_error() {
            frame.render_widget(
                Paragraph::new(format!("✗ {err}")).style(Style::default().fg(Color::Red)),
                area,
            );
        } else if let Some(notice) = &self.notice {
            frame.render_widget(
                Paragraph::new(format!("✓ {notice}")).style(Style::default().fg(Color::Green)),
                area,
            );
        }
    }
}

/// The last `width` characters of a single-line rendering of `value`.
fn visible_tail(value: &str, width: usize) -> String {
    let flat: String = value
        .chars()
        .map(|c| if c == '\n' { '⏎' } else { c })
        .collect();
    let len = flat.chars().count();
    if len <= width {
        flat
    } else {
        flat.chars().skip(len - width).collect()
    }
}
