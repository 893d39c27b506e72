//! Bounded text blocks for prompts.
//!
//! Pure functions: every output respects its character ceiling plus, at
//! most, one trailing omission notice.

use super::budget::{HistoryWindow, ListBudget};
use crate::core::string::{char_len, take_chars, truncate_chars};
use crate::discussion::message::DraftMessage;
use crate::orchestration::state::RoundSummary;
use std::collections::BTreeMap;

const USER_VERBOSE_CHARS: usize = 1_200;
const OTHER_VERBOSE_CHARS: usize = 700;
const USER_COMPACT_CHARS: usize = 700;
const OTHER_COMPACT_CHARS: usize = 360;

/// Reference material block appended to prompt headers.
///
/// Returns an empty string when there is nothing to show.
pub fn format_materials(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let body = if char_len(trimmed) > max_chars {
        format!("{}\n...(参考材料过长，已截断)", take_chars(trimmed, max_chars))
    } else {
        trimmed.to_string()
    };
    format!("\n\n参考材料:\n{body}")
}

/// Bullet list of user inputs.
///
/// Items that do not fit are skipped (later, smaller items may still fit)
/// and counted in a trailing notice.
pub fn format_user_inputs<S: AsRef<str>>(inputs: &[S], budget: ListBudget) -> String {
    if inputs.is_empty() {
        return "- （无）".to_string();
    }

    let mut lines = Vec::new();
    let mut used = 0;
    let mut omitted = 0;
    for input in inputs {
        let line = format!("- {}", truncate_chars(input.as_ref(), budget.max_item_chars));
        let cost = char_len(&line) + 1;
        if used + cost > budget.max_total_chars {
            omitted += 1;
            continue;
        }
        used += cost;
        lines.push(line);
    }

    if lines.is_empty() {
        return "- （用户输入过长，已省略）".to_string();
    }
    if omitted > 0 {
        lines.push(format!("- （另有 {omitted} 条用户输入因过长被省略）"));
    }
    lines.join("\n")
}

/// Headed blocks of previous round summaries.
pub fn format_round_summaries(summaries: &[RoundSummary], budget: ListBudget) -> String {
    if summaries.is_empty() {
        return "（首轮，无历史总结）".to_string();
    }

    let mut blocks = Vec::new();
    let mut used = 0;
    let mut omitted = 0;
    for entry in summaries {
        let block = format!(
            "--- 第 {} 轮总结 ---\n{}",
            entry.round + 1,
            truncate_chars(&entry.summary, budget.max_item_chars)
        );
        let cost = char_len(&block) + 2;
        if used + cost > budget.max_total_chars {
            omitted += 1;
            continue;
        }
        used += cost;
        blocks.push(block);
    }

    if blocks.is_empty() {
        return "（历史总结过长，已省略）".to_string();
    }
    if omitted > 0 {
        blocks.push(format!("---\n（另有 {omitted} 轮历史总结因过长被省略）"));
    }
    blocks.join("\n\n")
}

fn history_line(message: &DraftMessage, compact: bool) -> String {
    let limit = match (message.is_user(), compact) {
        (true, false) => USER_VERBOSE_CHARS,
        (false, false) => OTHER_VERBOSE_CHARS,
        (true, true) => USER_COMPACT_CHARS,
        (false, true) => OTHER_COMPACT_CHARS,
    };
    format!(
        "[{} ({})]: {}",
        message.agent_name,
        message.phase.as_str(),
        truncate_chars(&message.content, limit)
    )
}

/// Chronological history with anchored priorities.
///
/// Inclusion order, each subject to the remaining budget:
/// 1. the first user message (compact)
/// 2. messages of the first `keep_head_rounds` rounds (compact)
/// 3. every user message (compact)
/// 4. the last `keep_tail_messages` messages (verbose)
///
/// A chosen line is never evicted by a later priority.
pub fn format_history_with_anchors<'a, I>(messages: I, window: HistoryWindow) -> String
where
    I: IntoIterator<Item = &'a DraftMessage>,
{
    let messages: Vec<&DraftMessage> = messages.into_iter().collect();
    if messages.is_empty() {
        return String::new();
    }

    let total = messages.len();
    let mut chosen: BTreeMap<usize, String> = BTreeMap::new();
    let mut used = 0;

    let mut add = |idx: usize, compact: bool, chosen: &mut BTreeMap<usize, String>| {
        if chosen.contains_key(&idx) {
            return;
        }
        let line = history_line(messages[idx], compact);
        let cost = char_len(&line) + 2;
        if used + cost > window.max_total_chars() {
            return;
        }
        used += cost;
        chosen.insert(idx, line);
    };

    if let Some(first_user) = messages.iter().position(|m| m.is_user()) {
        add(first_user, true, &mut chosen);
    }
    for idx in 0..total {
        if messages[idx].round_number < window.keep_head_rounds() {
            add(idx, true, &mut chosen);
        }
    }
    for idx in 0..total {
        if messages[idx].is_user() {
            add(idx, true, &mut chosen);
        }
    }
    for idx in total.saturating_sub(window.keep_tail_messages())..total {
        add(idx, false, &mut chosen);
    }

    let omitted = total - chosen.len();
    let mut lines: Vec<String> = chosen.into_values().collect();
    if omitted > 0 {
        lines.push(format!("（历史已裁剪：省略 {omitted} 条较低优先级消息）"));
    }
    lines.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discussion::agent::AgentRole;
    use crate::discussion::message::MessagePhase;

    fn panel_msg(name: &str, content: &str, round: u32) -> DraftMessage {
        DraftMessage {
            agent_name: name.to_string(),
            agent_role: AgentRole::Panelist,
            content: content.to_string(),
            round_number: round,
            cycle_index: 0,
            phase: MessagePhase::Discussing,
        }
    }

    fn summary(round: u32, text: &str) -> RoundSummary {
        RoundSummary {
            round,
            summary: text.to_string(),
        }
    }

    // ==================== Materials ====================

    #[test]
    fn test_materials_empty_and_plain() {
        assert_eq!(format_materials("", 100), "");
        assert_eq!(format_materials("   ", 100), "");
        assert_eq!(format_materials(" notes ", 100), "\n\n参考材料:\nnotes");
    }

    #[test]
    fn test_materials_truncated_with_marker() {
        let text = "资".repeat(30);
        let block = format_materials(&text, 10);
        assert_eq!(
            block,
            format!("\n\n参考材料:\n{}\n...(参考材料过长，已截断)", "资".repeat(10))
        );
    }

    // ==================== User Inputs ====================

    #[test]
    fn test_user_inputs_empty() {
        assert_eq!(format_user_inputs::<&str>(&[], ListBudget::new(100, 10)), "- （无）");
    }

    #[test]
    fn test_user_inputs_truncate_items() {
        let out = format_user_inputs(&["abcdefghijkl", "short"], ListBudget::new(100, 5));
        assert_eq!(out, "- abcde...\n- short");
    }

    #[test]
    fn test_user_inputs_skip_overflow_and_count() {
        // "- aaaa" costs 7; budget 11 fits one, the second is skipped,
        // the third ("- b" = 4) still fits.
        let out = format_user_inputs(&["aaaa", "cccc", "b"], ListBudget::new(11, 100));
        assert_eq!(out, "- aaaa\n- b\n- （另有 1 条用户输入因过长被省略）");
    }

    #[test]
    fn test_user_inputs_all_dropped() {
        let out = format_user_inputs(&["long input"], ListBudget::new(3, 100));
        assert_eq!(out, "- （用户输入过长，已省略）");
    }

    // ==================== Round Summaries ====================

    #[test]
    fn test_round_summaries_empty() {
        assert_eq!(
            format_round_summaries(&[], ListBudget::new(100, 100)),
            "（首轮，无历史总结）"
        );
    }

    #[test]
    fn test_round_summaries_blocks_are_one_based() {
        let out = format_round_summaries(
            &[summary(0, "first"), summary(1, "second")],
            ListBudget::new(1_000, 100),
        );
        assert_eq!(
            out,
            "--- 第 1 轮总结 ---\nfirst\n\n--- 第 2 轮总结 ---\nsecond"
        );
    }

    #[test]
    fn test_round_summaries_overflow() {
        let block_cost = char_len("--- 第 1 轮总结 ---\nfirst") + 2;
        let out = format_round_summaries(
            &[summary(0, "first"), summary(1, "second")],
            ListBudget::new(block_cost, 100),
        );
        assert_eq!(
            out,
            "--- 第 1 轮总结 ---\nfirst\n\n---\n（另有 1 轮历史总结因过长被省略）"
        );

        let none = format_round_summaries(&[summary(0, "first")], ListBudget::new(5, 100));
        assert_eq!(none, "（历史总结过长，已省略）");
    }

    // ==================== History ====================

    #[test]
    fn test_history_empty() {
        assert_eq!(format_history_with_anchors(&[], HistoryWindow::panel()), "");
    }

    #[test]
    fn test_history_fits_entirely() {
        let messages = vec![
            DraftMessage::user("topic", 0, 0),
            panel_msg("A", "view", 0),
        ];
        let out = format_history_with_anchors(&messages, HistoryWindow::panel());
        assert_eq!(out, "[用户 (user_input)]: topic\n\n[A (discussing)]: view");
    }

    #[test]
    fn test_history_respects_budget() {
        let messages: Vec<_> = (0..50)
            .map(|i| panel_msg("A", &"x".repeat(300), i / 5))
            .collect();
        for max in [200, 1_000, 5_000] {
            let window = HistoryWindow::new(max, 2, 20);
            let out = format_history_with_anchors(&messages, window);
            let lines: Vec<_> = out.split("\n\n").collect();
            let kept: usize = lines
                .iter()
                .filter(|l| l.starts_with('['))
                .map(|l| char_len(l) + 2)
                .sum();
            assert!(kept <= max, "budget {max} exceeded: {kept}");
            assert!(out.ends_with("条较低优先级消息）"));
        }
    }

    #[test]
    fn test_history_larger_budget_keeps_superset() {
        let messages: Vec<_> = (0..30)
            .map(|i| panel_msg(&format!("P{i}"), &"y".repeat(200), i / 3))
            .collect();
        let small = format_history_with_anchors(&messages, HistoryWindow::new(1_500, 2, 10));
        let large = format_history_with_anchors(&messages, HistoryWindow::new(4_000, 2, 10));
        for line in small.split("\n\n").filter(|l| l.starts_with('[')) {
            assert!(large.contains(line), "missing {line}");
        }
    }

    #[test]
    fn test_history_anchors_first_user_message() {
        let mut messages = vec![DraftMessage::user("the original requirement", 0, 0)];
        messages.extend((0..40).map(|i| panel_msg("A", &"z".repeat(400), 3 + i / 4)));
        let first_line = "[用户 (user_input)]: the original requirement";
        let window = HistoryWindow::new(char_len(first_line) + 2 + 500, 0, 24);
        let out = format_history_with_anchors(&messages, window);
        assert!(out.starts_with(first_line));
    }

    #[test]
    fn test_history_head_and_user_lines_are_compact() {
        let long = "w".repeat(1_000);
        let messages = vec![
            DraftMessage::user(long.clone(), 0, 0),
            panel_msg("A", &long, 0),
            panel_msg("B", &long, 5),
        ];
        let out = format_history_with_anchors(&messages, HistoryWindow::new(100_000, 1, 1));
        let lines: Vec<_> = out.split("\n\n").collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], format!("[用户 (user_input)]: {}...", "w".repeat(700)));
        assert_eq!(lines[1], format!("[A (discussing)]: {}...", "w".repeat(360)));
        // Only reachable through the tail: verbose limit applies.
        assert_eq!(lines[2], format!("[B (discussing)]: {}...", "w".repeat(700)));
    }
}
