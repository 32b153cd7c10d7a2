use std::io::{self, Stderr};
use std::sync::Mutex;

use chrono::NaiveDateTime;
use crossterm::tty::IsTty;
use ratatui::backend::CrosstermBackend;
use ratatui::style::{Color, Style};
use ratatui::widgets::Gauge;
use ratatui::{Terminal, TerminalOptions, Viewport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Planned {
        total: usize,
    },
    Advanced {
        position: usize,
        total: usize,
        timestamp: NaiveDateTime,
        success: bool,
    },
    Finished {
        succeeded: usize,
        failed: usize,
    },
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Discards every event; used when the report itself is the output.
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn event(&self, _event: ProgressEvent) {}
}

type InlineTerminal = Terminal<CrosstermBackend<Stderr>>;

#[derive(Default)]
struct BarState {
    terminal: Option<InlineTerminal>,
    failed: usize,
}

/// One-line gauge on stderr. Without a TTY every step is logged instead.
pub struct TerminalProgress {
    label: String,
    state: Mutex<BarState>,
}

impl TerminalProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            state: Mutex::new(BarState::default()),
        }
    }

    fn open_terminal() -> Option<InlineTerminal> {
        if !io::stderr().is_tty() {
            return None;
        }
        Terminal::with_options(
            CrosstermBackend::new(io::stderr()),
            TerminalOptions {
                viewport: Viewport::Inline(1),
            },
        )
        .ok()
    }

    fn draw(&self, terminal: &mut InlineTerminal, position: usize, total: usize, failed: usize) {
        let ratio = if total == 0 {
            1.0
        } else {
            (position as f64 / total as f64).clamp(0.0, 1.0)
        };
        let label = if failed > 0 {
            format!("{} {position}/{total} ({failed} failed)", self.label)
        } else {
            format!("{} {position}/{total}", self.label)
        };
        let color = if failed > 0 { Color::Yellow } else { Color::Cyan };
        let drawn = terminal.draw(|frame| {
            let gauge = Gauge::default()
                .gauge_style(Style::default().fg(color))
                .ratio(ratio)
                .label(label);
            frame.render_widget(gauge, frame.area());
        });
        if let Err(err) = drawn {
            tracing::debug!(error = %err, "progress redraw failed");
        }
    }
}

impl ProgressSink for TerminalProgress {
    fn event(&self, event: ProgressEvent) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        match event {
            ProgressEvent::Planned { total } => {
                state.failed = 0;
                state.terminal = Self::open_terminal();
                match state.terminal.as_mut() {
                    Some(terminal) => self.draw(terminal, 0, total, 0),
                    None => tracing::info!(total, "{}", self.label),
                }
            }
            ProgressEvent::Advanced {
                position,
                total,
                timestamp,
                success,
            } => {
                if !success {
                    state.failed += 1;
                }
                let failed = state.failed;
                match state.terminal.as_mut() {
                    Some(terminal) => self.draw(terminal, position, total, failed),
                    None => tracing::info!(%timestamp, success, "{} {position}/{total}", self.label),
                }
            }
            ProgressEvent::Finished { succeeded, failed } => {
                if state.terminal.take().is_some() {
                    eprintln!();
                }
                tracing::info!(succeeded, failed, "{} done", self.label);
            }
        }
    }
}
