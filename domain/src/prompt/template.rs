//! Prompt templates for every node of the discussion.
//!
//! Each function builds its prompt from the run state and a
//! [`ContextBudget`], so all truncation decisions stay in the domain.

use crate::context::{
    ContextBudget, format_history_with_anchors, format_materials, format_round_summaries,
    format_user_inputs,
};
use crate::discussion::agent::Agent;
use crate::discussion::message::{DraftMessage, MessagePhase};
use crate::orchestration::state::OrchestrationState;

/// Default task for a panelist the host did not brief.
pub const FALLBACK_PANELIST_TASK: &str = "请从你的专业视角回应主持人本轮问题。";

/// Templates for generating prompts at each node
pub struct PromptTemplate;

fn persona_or_default(agent: &Agent) -> &str {
    if agent.persona.trim().is_empty() {
        "General expert"
    } else {
        agent.persona.trim()
    }
}

fn contents<'a>(messages: &[&'a DraftMessage]) -> Vec<&'a str> {
    messages.iter().map(|m| m.content.as_str()).collect()
}

impl PromptTemplate {
    // ==================== Host Planning ====================

    pub fn host_planning_system(host: &Agent) -> String {
        format!(
            "You are {}, a skilled discussion moderator. {}",
            host.name, host.persona
        )
    }

    pub fn host_planning(state: &OrchestrationState, budget: &ContextBudget) -> String {
        let round_context = if state.current_round == 0 && !state.has_prior_discussion() {
            "首轮讨论".to_string()
        } else {
            format!("第 {} 轮", state.current_round + 1)
        };
        let user_inputs = state.user_messages();
        let constraints = &state.routing_constraints;
        let mut constraint_lines = Vec::new();
        if !constraints.target_panelists.is_empty() {
            constraint_lines.push(format!(
                "- 外部限制指定候选嘉宾：{}。",
                constraints.target_panelists.join(", ")
            ));
        }
        if constraints.avoid_all_panelists {
            constraint_lines.push("- 外部限制：本轮禁止选择全体嘉宾。".to_string());
        }
        let constraints_block = if constraint_lines.is_empty() {
            "- 无额外硬性约束。".to_string()
        } else {
            constraint_lines.join("\n")
        };
        let roster = state
            .panelists()
            .iter()
            .map(|p| format!("- {}: {}", p.name, persona_or_default(p)))
            .collect::<Vec<_>>()
            .join("\n");
        let critic_feedback = if state.critic_feedback.is_empty() {
            "None"
        } else {
            state.critic_feedback.as_str()
        };
        let next_step_plan = if state.next_step_plan.is_empty() {
            "（首轮，无上一轮下一步规划）"
        } else {
            state.next_step_plan.as_str()
        };

        format!(
            r#"You are the Host of an expert round table discussion.

Current stage: {round_context}
Topic: {topic}{materials}

Previous round summaries:
{summaries}

Discussion so far:
{history}

All user inputs (every one must be addressed):
{user_inputs}

Critic feedback from the last round:
{critic_feedback}

Next-step plan made after the last round:
{next_step_plan}

Available panelists:
{roster}

Hard routing constraints:
{constraints_block}

User-priority rules:
0) The latest user input wins. When it conflicts with the earlier plan or history, revise the plan to follow it.
1) Stay on what the user asked for: objective, constraints and deliverable. No generic discussion.
2) In the first round, derive a concrete working sub-topic from the user's input, not just the topic title.
3) In later rounds, finish unresolved user requests before extending scope.
4) Every assignment names the user question or request it answers.
5) Open tasks are unresolved user-facing items, never filler.

Your job:
1) State the user's intent in "intent_judgment".
2) Give your own stance in "host_position"; do not merely repeat the user.
3) Write a short mainline in "discussion_plan" covering the target outcome, this round's scope, and the concrete answer or artifact this round must produce.
4) Choose "execution_mode": "panelists" to assign tasks, or "host_only" when the user explicitly wants a direct answer without splitting work.
5) List 1-3 "open_tasks" still to validate or refine.
6) "needs_synthesis" is always false in this workflow.
7) If the user asks for a specific panelist, pick that panelist; if the user asks not to involve everyone, do not select everyone.

Return ONLY valid JSON with this schema:
{{
  "intent_judgment": "what the user wants this round",
  "host_position": "your own stance",
  "discussion_plan": "short plan",
  "execution_mode": "panelists",
  "reasoning": "why these panelists",
  "selected_panelists": ["name1", "name2"],
  "assignments": [{{"panelist": "name1", "task": "what to do and which user request it answers"}}],
  "open_tasks": ["follow-up 1"],
  "needs_synthesis": false
}}

Never select names that are not in the panelist list. If the user named specific panelists, choose only among them.
If execution_mode is "host_only", return empty "selected_panelists" and "assignments"."#,
            topic = state.topic,
            materials = format_materials(&state.materials, budget.materials_max_chars),
            summaries = format_round_summaries(&state.round_summaries, budget.planning_summaries),
            history = format_history_with_anchors(&state.messages, budget.planning_history),
            user_inputs = format_user_inputs(&contents(&user_inputs), budget.planning_user_inputs),
        )
    }

    // ==================== Panelists ====================

    pub fn panelist_system(panelist: &Agent) -> String {
        format!(
            "You are {}. {} Respond thoughtfully and specifically.",
            panelist.name, panelist.persona
        )
    }

    /// Context shared by every panelist of a round (everything but the task).
    pub fn panelist_shared_context(state: &OrchestrationState, budget: &ContextBudget) -> PanelContext {
        let user_inputs = state.user_messages();
        let recent: Vec<&DraftMessage> = user_inputs.iter().rev().take(3).rev().copied().collect();
        let user_block = if recent.is_empty() {
            String::new()
        } else {
            format!(
                "\n\n⚠️ 用户新的输入/问题（请重点回应）:\n{}",
                format_user_inputs(&contents(&recent), budget.recent_user_inputs)
            )
        };
        PanelContext {
            materials: format_materials(&state.materials, budget.materials_max_chars),
            history: format_history_with_anchors(&state.messages, budget.panel_history),
            user_block,
        }
    }

    pub fn panelist_prompt(
        state: &OrchestrationState,
        shared: &PanelContext,
        panelist: &Agent,
        task: &str,
    ) -> String {
        let user_hint = if shared.user_block.is_empty() {
            ""
        } else {
            " Pay special attention to the user input above and make sure your response addresses it."
        };
        format!(
            r#"You are taking part in an expert round table discussion.

Topic: {topic}{materials}

The host's plan for this round:
{plan}

Your assigned task:
{task}

Discussion so far:
{history}{user_block}

You are {name}. Your expertise: {persona}

Answer the host from your own perspective. Be specific and give concrete examples or figures where you can. If you disagree with another panelist, say why constructively.{user_hint}"#,
            topic = state.topic,
            materials = shared.materials,
            plan = state.host_plan,
            history = shared.history,
            user_block = shared.user_block,
            name = panelist.name,
            persona = persona_or_default(panelist),
        )
    }

    // ==================== Critic ====================

    pub fn critic_system(critic: &Agent) -> String {
        format!(
            "You are {}, a rigorous analytical critic. {}",
            critic.name, critic.persona
        )
    }

    pub fn critic_review(state: &OrchestrationState, budget: &ContextBudget) -> String {
        let user_inputs = state.user_messages();
        let recent: Vec<&DraftMessage> = user_inputs.iter().rev().take(3).rev().copied().collect();
        let (user_section, user_item) = if recent.is_empty() {
            (String::new(), "")
        } else {
            (
                format!(
                    "\n\n用户提出的问题/意见:\n{}\n",
                    format_user_inputs(&contents(&recent), budget.recent_user_inputs)
                ),
                "\n6. **User input coverage**: Did the panelists answer the user's questions and concerns? What was missed?",
            )
        };
        format!(
            r#"You are the Critic of an expert round table discussion. Be rigorous and constructive.

Topic: {topic}{materials}
Current round: {round} of {max_rounds}

Discussion so far:
{history}{user_section}

Review the discussion:
1. **Contradictions**: Where do panelists disagree, and is it resolved?
2. **Blind spots**: Which important aspects are missing?
3. **Logical gaps**: Which claims are unsupported or weakly argued?
4. **Missing perspectives**: Which viewpoints are absent?
5. **Suggestions**: Which questions or angles should the next round pursue?{user_item}

Keep the feedback actionable for the next round."#,
            topic = state.topic,
            materials = format_materials(&state.materials, budget.materials_max_chars),
            round = state.current_round + 1,
            max_rounds = state.max_rounds,
            history = format_history_with_anchors(&state.messages, budget.panel_history),
        )
    }

    // ==================== Round Summary ====================

    pub fn round_summary_system(host: &Agent) -> String {
        format!("You are {}, summarizing the current round. {}", host.name, host.persona)
    }

    pub fn round_summary(state: &OrchestrationState, budget: &ContextBudget) -> String {
        let round = state.current_round;
        let round_messages = state.messages.iter().filter(|m| {
            m.round_number == round
                && matches!(m.phase, MessagePhase::Discussing | MessagePhase::Reflecting)
        });
        let round_inputs: Vec<&DraftMessage> = state
            .messages
            .iter()
            .filter(|m| m.is_user() && m.round_number == round)
            .collect();
        let critic_feedback = if state.critic_feedback.is_empty() {
            "无"
        } else {
            state.critic_feedback.as_str()
        };
        format!(
            r#"你是圆桌讨论的主持人，请对本轮讨论做结构化总结。

主题: {topic}{materials}
当前轮次: 第 {display_round} 轮（共 {max_rounds} 轮）

本轮讨论内容:
{history}

评论员反馈:
{critic_feedback}

本轮用户输入（优先级最高）:
{user_inputs}

总结需包含:
1. 本轮讨论概述（一句话）
2. 各嘉宾的关键观点
3. 评论员的主要反馈
4. 用户输入覆盖情况（逐条标注“已回答/部分回答/未回答”）
5. 已达成的共识
6. 待解决问题（先列仍未回答的用户问题）"#,
            topic = state.topic,
            materials = format_materials(&state.materials, budget.materials_max_chars),
            display_round = round + 1,
            max_rounds = state.max_rounds,
            history = format_history_with_anchors(round_messages, budget.round_summary_history),
            user_inputs = format_user_inputs(&contents(&round_inputs), budget.round_user_inputs),
        )
    }

    // ==================== Next-Step Planning ====================

    pub fn next_step_system(host: &Agent) -> String {
        format!(
            "You are {}, planning the next step after each round. {}",
            host.name, host.persona
        )
    }

    /// `absorbed` are the pending user inputs drained for this step; they are
    /// already part of `state.messages`.
    pub fn next_step(
        state: &OrchestrationState,
        absorbed: &[DraftMessage],
        budget: &ContextBudget,
    ) -> String {
        let round = state.current_round;
        let latest_summary = state
            .round_summaries
            .iter()
            .rev()
            .find(|s| s.round == round)
            .map(|s| s.summary.as_str())
            .unwrap_or("（无）");
        let new_questions: Vec<&str> = absorbed.iter().map(|m| m.content.as_str()).collect();
        let all_inputs = state.user_messages();
        let critic_feedback = if state.critic_feedback.is_empty() {
            "无"
        } else {
            state.critic_feedback.as_str()
        };
        format!(
            r#"你是主持人。第 {display_round} 轮刚结束，请规划下一步。

主题: {topic}{materials}

本轮总结:
{latest_summary}

评论员反馈:
{critic_feedback}

本轮期间用户新增的问题（必须纳入下一步）:
{new_questions}

历史全部用户输入（同样需要保持对齐）:
{all_inputs}

最近讨论上下文:
{history}

请给出简洁的“下一步规划”，包含:
1. 下一轮的核心目标（直接对应用户目标）
2. 用户输入覆盖检查：逐条说明已解决与未解决
3. 需要重点追问的 1-3 个问题（优先未解决的用户问题）
4. 建议的推进顺序
"#,
            display_round = round + 1,
            topic = state.topic,
            materials = format_materials(&state.materials, budget.materials_max_chars),
            new_questions = format_user_inputs(&new_questions, budget.recent_user_inputs),
            all_inputs = format_user_inputs(&contents(&all_inputs), budget.all_user_inputs),
            history = format_history_with_anchors(&state.messages, budget.next_step_history),
        )
    }

    // ==================== Synthesis ====================

    pub fn synthesis_system(host: &Agent) -> String {
        format!(
            "You are {}, synthesizing the discussion into a final report. {}",
            host.name, host.persona
        )
    }

    pub fn synthesis(state: &OrchestrationState, budget: &ContextBudget) -> String {
        let user_inputs = state.user_messages();
        format!(
            r#"You are the Host closing the round table discussion.

Topic: {topic}{materials}

Discussion history:
{history}

Round summaries:
{summaries}

All user inputs to satisfy:
{user_inputs}

Write a final synthesis that:
1. Summarizes each panelist's key insights
2. States where consensus was reached
3. Separates resolved from unresolved disagreements
4. Checks every user request: answered / partially answered / unanswered
5. Lists concrete recommendations or conclusions
6. Notes caveats and areas needing further work

Format it as a well-structured report."#,
            topic = state.topic,
            materials = format_materials(&state.materials, budget.materials_max_chars),
            history = format_history_with_anchors(&state.messages, budget.synthesis_history),
            summaries = format_round_summaries(&state.round_summaries, budget.synthesis_summaries),
            user_inputs = format_user_inputs(&contents(&user_inputs), budget.all_user_inputs),
        )
    }

    // ==================== Panel Preparation ====================

    pub fn panel_planner_system() -> &'static str {
        "You are a discussion planning assistant. Respond with valid JSON only."
    }

    pub fn panel_planner(topic: &str) -> String {
        format!(
            r#"Design the best panel of experts for a round table discussion on this topic.

Topic: {topic}

Respond with a JSON array only, in exactly this shape:
[
  {{"name": "主持人", "role": "host", "persona": "how the host will steer"}},
  {{"name": "Expert name", "role": "panelist", "persona": "expertise and perspective"}},
  {{"name": "Critic name", "role": "critic", "persona": "what the critic scrutinizes"}}
]

Rules:
- Exactly one host named 主持人 and exactly one critic
- Two to four panelists with diverse, complementary perspectives
- Chinese names and personas
- Personas specific to this topic, never generic"#
        )
    }

    pub fn title_system() -> &'static str {
        "You write short titles. Reply with the title only."
    }

    pub fn title(topic: &str) -> String {
        format!(
            "请为以下讨论主题生成一个不超过15个字的简短标题，只输出标题本身：\n\n{topic}"
        )
    }

    pub fn message_summary_system() -> &'static str {
        "You condense discussion messages. Reply with the summary only."
    }

    pub fn message_summary(content: &str) -> String {
        format!("请用2-3句话简洁总结以下内容，保留核心观点：\n\n{content}")
    }
}

/// Prompt parts computed once per panelist round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelContext {
    pub materials: String,
    pub history: String,
    pub user_block: String,
}
