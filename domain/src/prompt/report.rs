//! Bodies of the host's transcript messages.

use crate::routing::RoutingDecision;

pub const DEGRADED_INTENT: &str = "主持人调用异常，已按用户最新目标进行降级推进。";
pub const DEGRADED_POSITION: &str = "先保证流程不中断，继续产出可用讨论结果。";
pub const DEGRADED_OPEN_TASK: &str = "确认本轮输出是否覆盖用户最新诉求。";
pub const CRITIC_SKIPPED: &str = "No critic configured - skipping review.";

/// Render the host's planning message from a routing decision.
pub fn host_plan_message(decision: &RoutingDecision) -> String {
    let assignments: Vec<String> = decision
        .selected_panelists
        .iter()
        .filter_map(|name| {
            decision
                .task_for(name)
                .filter(|t| !t.is_empty())
                .map(|task| format!("- {name}: {task}"))
        })
        .collect();
    let assignment_text = if assignments.is_empty() {
        "- （无，主持人直出）".to_string()
    } else {
        assignments.join("\n")
    };
    let open_tasks = decision
        .open_tasks
        .iter()
        .map(|t| format!("- {t}"))
        .collect::<Vec<_>>()
        .join("\n");
    let selected = if decision.selected_panelists.is_empty() {
        "无".to_string()
    } else {
        decision.selected_panelists.join(", ")
    };
    let reasoning = if decision.reasoning.is_empty() {
        String::new()
    } else {
        format!("补充说明: {}\n", decision.reasoning)
    };

    format!(
        "意图判断: {}\n\n主持人观点: {}\n\n本轮主线: {}\n\n{}执行模式: {}\n本轮调用嘉宾: {}\n任务分配:\n{}\n开放任务:\n{}\n是否需要综合: {}",
        decision.intent_judgment,
        decision.host_position,
        decision.plan,
        reasoning,
        decision.execution_mode.label(),
        selected,
        assignment_text,
        open_tasks,
        if decision.needs_synthesis { "是" } else { "否" },
    )
    .trim()
    .to_string()
}

/// Plan used when the host could not be reached.
pub fn degraded_plan(latest_user_input: Option<&str>) -> String {
    match latest_user_input {
        Some(input) => format!("围绕用户最新目标推进：{input}"),
        None => "围绕当前主题推进，并优先收敛可执行结论。".to_string(),
    }
}

pub fn degraded_plan_message(plan: &str, error: &str, selected: &[String]) -> String {
    let called = if selected.is_empty() {
        "无".to_string()
    } else {
        selected.join(", ")
    };
    format!(
        "主持人规划降级执行（上游调用异常，已自动继续）\n\n本轮主线: {plan}\n\n异常信息: {error}\n本轮调用嘉宾: {called}"
    )
}

pub fn next_step_message(plan: &str, absorbed_inputs: &[&str]) -> String {
    let inputs = if absorbed_inputs.is_empty() {
        "- （本轮无新增用户插问）".to_string()
    } else {
        absorbed_inputs
            .iter()
            .map(|c| format!("- {c}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!("下一步规划:\n{}\n\n本轮回收的用户插问:\n{inputs}", plan.trim())
}

pub fn synthesis_fallback(error: &str) -> String {
    format!(
        "最终综合阶段调用异常，已返回降级总结。\n\n异常信息: {error}\n建议：请重试一次综合，或在下一轮输入中指定需要重点整合的结论。"
    )
}

pub fn panelist_error(error: &str) -> String {
    format!("[Error: {error}]")
}

pub fn critic_error_feedback(error: &str) -> String {
    format!("Critic error: {error}")
}

pub fn critic_error_message(error: &str) -> String {
    format!("[Critic error: {error}]")
}

pub fn round_summary_failure(error: &str) -> String {
    format!("[总结失败: {error}]")
}

pub fn next_step_failure(error: &str) -> String {
    format!("[下一步规划失败: {error}]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{RoutingConstraints, parse_host_routing};

    #[test]
    fn test_host_plan_message_layout() {
        let decision = parse_host_routing(
            r#"{"intent_judgment": "I", "host_position": "P", "discussion_plan": "M",
                "assignments": {"A": "task a"}, "open_tasks": ["o1", "o2"]}"#,
            &["A", "B"],
            &RoutingConstraints::default(),
            false,
        );
        assert_eq!(
            host_plan_message(&decision),
            "意图判断: I\n\n主持人观点: P\n\n本轮主线: M\n\n执行模式: 嘉宾分工讨论\n本轮调用嘉宾: A\n任务分配:\n- A: task a\n开放任务:\n- o1\n- o2\n是否需要综合: 否"
        );
    }

    #[test]
    fn test_host_plan_message_includes_reasoning() {
        let decision = parse_host_routing(
            r#"{"discussion_plan": "M", "reasoning": "R"}"#,
            &["A"],
            &RoutingConstraints::default(),
            false,
        );
        let message = host_plan_message(&decision);
        assert!(message.contains("本轮主线: M\n\n补充说明: R\n执行模式"));
    }

    #[test]
    fn test_degraded_plan_variants() {
        assert_eq!(degraded_plan(Some("ship it")), "围绕用户最新目标推进：ship it");
        assert_eq!(degraded_plan(None), "围绕当前主题推进，并优先收敛可执行结论。");
        let message = degraded_plan_message("p", "timeout", &["A".to_string(), "B".to_string()]);
        assert!(message.starts_with("主持人规划降级执行"));
        assert!(message.ends_with("异常信息: timeout\n本轮调用嘉宾: A, B"));
    }

    #[test]
    fn test_next_step_message() {
        assert_eq!(
            next_step_message(" plan \n", &[]),
            "下一步规划:\nplan\n\n本轮回收的用户插问:\n- （本轮无新增用户插问）"
        );
        assert!(next_step_message("plan", &["q1", "q2"]).ends_with("- q1\n- q2"));
    }
}
