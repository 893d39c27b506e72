//! Console output formatter for discussions

use colored::{ColoredString, Colorize};
use roundtable_application::DiscussionSummary;
use roundtable_domain::core::string::preview;
use roundtable_domain::{
    AgentRole, Discussion, DiscussionStatus, DraftMessage, Message, MessagePhase,
};

/// Formats discussions and messages for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format a whole discussion: header, roster and transcript grouped by cycle and round.
    pub fn format_discussion(discussion: &Discussion) -> String {
        let mut output = String::new();

        output.push_str(&Self::header(
            discussion.title.as_deref().unwrap_or("Round Table"),
        ));
        output.push('\n');
        output.push_str(&format!(
            "{} {}\n",
            "Topic:".cyan().bold(),
            discussion.topic
        ));
        output.push_str(&format!(
            "{} #{}  {} {}  {} {}  {} {}/{}\n",
            "Id:".cyan().bold(),
            discussion.id,
            "Mode:".cyan().bold(),
            discussion.mode,
            "Status:".cyan().bold(),
            Self::status(discussion.status),
            "Round:".cyan().bold(),
            discussion.current_round,
            discussion.max_rounds
        ));

        if !discussion.agents.is_empty() {
            output.push_str(&format!("\n{}\n", "Panel:".cyan().bold()));
            for agent in &discussion.agents {
                output.push_str(&format!(
                    "  {} {} ({})\n",
                    Self::role_marker(agent.role),
                    agent.name.bold(),
                    agent.llm
                ));
            }
        }

        let mut position: Option<(u32, u32)> = None;
        for message in &discussion.messages {
            let here = (message.cycle_index, message.round_number);
            if !message.is_user() && position != Some(here) {
                output.push_str(&Self::section_header(&format!(
                    "Cycle {} - Round {}",
                    message.cycle_index + 1,
                    message.round_number
                )));
                position = Some(here);
            }
            output.push_str(&Self::format_message(message));
        }

        if let Some(summary) = &discussion.final_summary {
            output.push_str(&Self::section_header("Final Report"));
            output.push_str(&format!("\n{}\n", summary));
        }

        output.push_str(&Self::footer());
        output
    }

    /// Format as JSON
    pub fn format_json(discussion: &Discussion) -> String {
        serde_json::to_string_pretty(discussion).unwrap_or_else(|_| "{}".to_string())
    }

    /// One line per discussion.
    pub fn format_list(discussions: &[DiscussionSummary]) -> String {
        if discussions.is_empty() {
            return format!("{}\n", "No discussions yet.".dimmed());
        }
        let mut output = String::new();
        for summary in discussions {
            let label = summary.title.as_deref().unwrap_or(&summary.topic);
            output.push_str(&format!(
                "{:>4}  {:<14} {:>4} msgs  {}\n",
                format!("#{}", summary.id).bold(),
                Self::status(summary.status),
                summary.message_count,
                preview(label, 60)
            ));
        }
        output
    }

    /// A stored message with its id.
    pub fn format_message(message: &Message) -> String {
        let label = format!(
            "[{}] {} · {}",
            message.id,
            message.agent_name,
            message.phase.display_name()
        );
        format!(
            "\n{}\n{}\n",
            Self::role_color(message.agent_role, &label),
            message.content.trim_end()
        )
    }

    /// A message the engine has produced but not yet stored.
    pub fn format_draft(message: &DraftMessage) -> String {
        let label = format!("{} · {}", message.agent_name, message.phase.display_name());
        format!(
            "\n{}\n{}\n",
            Self::role_color(message.agent_role, &label),
            message.content.trim_end()
        )
    }

    pub fn phase_banner(phase: MessagePhase, note: Option<&str>) -> String {
        let title = format!("==> {}", phase.display_name());
        match note {
            Some(note) => format!("\n{} {}\n", title.cyan().bold(), note.dimmed()),
            None => format!("\n{}\n", title.cyan().bold()),
        }
    }

    fn role_marker(role: AgentRole) -> ColoredString {
        match role {
            AgentRole::Host => "H".yellow().bold(),
            AgentRole::Panelist => "P".blue().bold(),
            AgentRole::Critic => "C".magenta().bold(),
            AgentRole::User => "U".green().bold(),
        }
    }

    fn role_color(role: AgentRole, label: &str) -> ColoredString {
        let label = format!("── {} ──", label);
        match role {
            AgentRole::Host => label.yellow().bold(),
            AgentRole::Panelist => label.blue().bold(),
            AgentRole::Critic => label.magenta().bold(),
            AgentRole::User => label.green().bold(),
        }
    }

    pub fn status(status: DiscussionStatus) -> ColoredString {
        match status {
            DiscussionStatus::Completed => status.as_str().green(),
            DiscussionStatus::WaitingInput => status.as_str().yellow(),
            DiscussionStatus::Failed => status.as_str().red(),
            DiscussionStatus::Created => status.as_str().normal(),
            _ => status.as_str().cyan(),
        }
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }
}
