//! Progress reporting for discussion runs

use crate::output::console::ConsoleFormatter;
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use roundtable_application::{LlmStatus, RunEvent};
use roundtable_domain::DiscussionStatus;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Consumes the events of one run.
pub trait RunEventView {
    fn on_event(&self, event: &RunEvent);
}

/// Text shown for an event, or `None` when the event is only progress.
fn describe(event: &RunEvent) -> Option<String> {
    match event {
        RunEvent::PhaseChange { phase, content } => {
            Some(ConsoleFormatter::phase_banner(*phase, content.as_deref()))
        }
        RunEvent::Message { message } => Some(ConsoleFormatter::format_message(message)),
        RunEvent::UserMessageConsumed {
            agent_name,
            content,
        } => Some(format!(
            "{} {} read your input: {}\n",
            "->".green(),
            agent_name.bold(),
            content
        )),
        RunEvent::CycleComplete { status, content } => {
            let line = match status {
                DiscussionStatus::Completed => content.green().bold(),
                _ => content.yellow().bold(),
            };
            Some(format!("\n{}\n", line))
        }
        RunEvent::Error { content } => Some(format!("\n{} {}\n", "Error:".red().bold(), content)),
        RunEvent::LiveMessage { .. } | RunEvent::LlmProgress { .. } => None,
    }
}

/// Reports progress with one spinner per agent that is generating.
pub struct ProgressReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    pub fn with_draw_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn update_bar(&self, agent_name: &str, chars: usize, status: LlmStatus) {
        let Ok(mut bars) = self.bars.lock() else {
            return;
        };
        match status {
            LlmStatus::Done => {
                if let Some(bar) = bars.remove(agent_name) {
                    bar.finish_and_clear();
                    self.multi.remove(&bar);
                }
            }
            LlmStatus::Waiting | LlmStatus::Streaming => {
                let bar = bars.entry(agent_name.to_string()).or_insert_with(|| {
                    let bar = self.multi.add(ProgressBar::new_spinner());
                    bar.set_style(Self::spinner_style());
                    bar.set_prefix(agent_name.to_string());
                    bar.enable_steady_tick(Duration::from_millis(100));
                    bar
                });
                if status == LlmStatus::Waiting {
                    bar.set_message("thinking...");
                } else {
                    bar.set_message(format!("{} chars", chars));
                }
            }
        }
    }

    fn clear_bars(&self) {
        if let Ok(mut bars) = self.bars.lock() {
            for (_, bar) in bars.drain() {
                bar.finish_and_clear();
                self.multi.remove(&bar);
            }
        }
    }

    fn active_bars(&self) -> usize {
        self.bars.lock().map(|bars| bars.len()).unwrap_or(0)
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl RunEventView for ProgressReporter {
    fn on_event(&self, event: &RunEvent) {
        if let RunEvent::LlmProgress {
            agent_name,
            chars_received,
            status,
            ..
        } = event
        {
            self.update_bar(agent_name, *chars_received, *status);
            return;
        }
        if event.is_terminal() {
            self.clear_bars();
        }
        if let Some(text) = describe(event) {
            self.multi.suspend(|| print!("{}", text));
        }
    }
}

/// Simple text-based progress (no spinners)
pub struct SimpleProgress;

impl RunEventView for SimpleProgress {
    fn on_event(&self, event: &RunEvent) {
        if let Some(text) = describe(event) {
            print!("{}", text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roundtable_domain::{DraftMessage, MessagePhase};

    fn progress(agent: &str, chars: usize, status: LlmStatus) -> RunEvent {
        RunEvent::LlmProgress {
            agent_name: agent.to_string(),
            chars_received: chars,
            status,
            phase: MessagePhase::Discussing,
        }
    }

    #[test]
    fn test_describe_skips_progress_only_events() {
        assert!(describe(&progress("A", 3, LlmStatus::Streaming)).is_none());
        assert!(
            describe(&RunEvent::LiveMessage {
                message: DraftMessage::user("x", 0, 0)
            })
            .is_none()
        );
        let banner = describe(&RunEvent::PhaseChange {
            phase: MessagePhase::Planning,
            content: Some("Discussion starting...".to_string()),
        })
        .unwrap();
        assert!(banner.contains("Host Planning"));
        assert!(banner.contains("Discussion starting..."));
        assert!(describe(&RunEvent::error("boom")).unwrap().contains("boom"));
    }

    #[test]
    fn test_spinner_per_agent_lifecycle() {
        let reporter = ProgressReporter::with_draw_target(ProgressDrawTarget::hidden());

        reporter.on_event(&progress("A", 0, LlmStatus::Waiting));
        reporter.on_event(&progress("B", 0, LlmStatus::Waiting));
        reporter.on_event(&progress("A", 40, LlmStatus::Streaming));
        assert_eq!(reporter.active_bars(), 2);

        reporter.on_event(&progress("A", 80, LlmStatus::Done));
        assert_eq!(reporter.active_bars(), 1);

        reporter.on_event(&RunEvent::CycleComplete {
            status: DiscussionStatus::WaitingInput,
            content: "waiting".to_string(),
        });
        assert_eq!(reporter.active_bars(), 0);
    }
}
