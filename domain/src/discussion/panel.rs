//! Panel composition: fixed seat templates per mode, auto-planned panels,
//! and binding LLMs to seats.

use super::agent::{Agent, AgentRole, LlmBinding};
use super::entities::DiscussionMode;
use serde::Deserialize;

/// A seat at the table before an LLM is bound to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelSeat {
    pub name: String,
    pub role: AgentRole,
    pub persona: String,
}

impl PanelSeat {
    pub fn new(name: &str, role: AgentRole, persona: &str) -> Self {
        Self {
            name: name.to_string(),
            role,
            persona: persona.to_string(),
        }
    }
}

/// Seats for the template modes. `Auto` and `Custom` have no template.
pub fn mode_template(mode: DiscussionMode) -> Option<Vec<PanelSeat>> {
    use AgentRole::*;
    let seats = match mode {
        DiscussionMode::Debate => vec![
            PanelSeat::new(
                "主持人",
                Host,
                "公正的辩论主持人，负责引导讨论、总结观点、确保双方公平发言。",
            ),
            PanelSeat::new(
                "正方辩手",
                Panelist,
                "支持该观点的辩手，提供有力论据和证据来支持正方立场。",
            ),
            PanelSeat::new(
                "反方辩手",
                Panelist,
                "反对该观点的辩手，提出质疑和反驳，寻找正方论证的漏洞。",
            ),
            PanelSeat::new(
                "评判员",
                Critic,
                "客观的评判者，分析双方论点的逻辑性、证据充分性和说服力。",
            ),
        ],
        DiscussionMode::Brainstorm => vec![
            PanelSeat::new(
                "主持人",
                Host,
                "创意工作坊主持人，鼓励发散思维，引导团队探索多种可能性。",
            ),
            PanelSeat::new(
                "创意专家A",
                Panelist,
                "擅长跨领域联想的创意思考者，善于从不同行业和学科中寻找灵感。",
            ),
            PanelSeat::new(
                "创意专家B",
                Panelist,
                "注重用户体验和实际需求的创新者，善于将抽象概念转化为可行方案。",
            ),
            PanelSeat::new(
                "创意专家C",
                Panelist,
                "技术导向的创新者，关注前沿技术趋势和技术可行性。",
            ),
            PanelSeat::new(
                "批评家",
                Critic,
                "建设性的批评者，评估创意的可行性、风险和改进空间，帮助收敛到最佳方案。",
            ),
        ],
        DiscussionMode::Sequential => vec![
            PanelSeat::new(
                "主持人",
                Host,
                "评审流程主持人，确保每位评审员依次发言，后者基于前者的反馈进行改进。",
            ),
            PanelSeat::new("评审员A", Panelist, "第一轮评审员，提供初步分析和基础评估。"),
            PanelSeat::new(
                "评审员B",
                Panelist,
                "第二轮评审员，基于前一位评审的反馈进行深入分析和补充。",
            ),
            PanelSeat::new(
                "评审员C",
                Panelist,
                "第三轮评审员，综合前两位评审的意见，提出最终改进建议。",
            ),
            PanelSeat::new(
                "质量检查员",
                Critic,
                "最终质量把关者，检查所有评审意见的一致性和完整性。",
            ),
        ],
        DiscussionMode::Auto | DiscussionMode::Custom => return None,
    };
    Some(seats)
}

/// Panel used when auto planning fails or returns nothing usable.
pub fn default_panel() -> Vec<PanelSeat> {
    vec![
        PanelSeat::new(
            "主持人",
            AgentRole::Host,
            "经验丰富的讨论主持人，善于引导深入对话。",
        ),
        PanelSeat::new(
            "专家A",
            AgentRole::Panelist,
            "该领域的资深研究者，注重理论分析。",
        ),
        PanelSeat::new(
            "专家B",
            AgentRole::Panelist,
            "实践导向的从业者，关注实际应用和案例。",
        ),
        PanelSeat::new(
            "批评家",
            AgentRole::Critic,
            "严谨的分析者，善于发现逻辑漏洞和盲点。",
        ),
    ]
}

/// Bind LLMs to seats round-robin. Returns no agents when no binding exists.
pub fn assign_bindings(seats: Vec<PanelSeat>, bindings: &[LlmBinding]) -> Vec<Agent> {
    if bindings.is_empty() {
        return Vec::new();
    }
    seats
        .into_iter()
        .enumerate()
        .map(|(i, seat)| {
            Agent::new(
                seat.name,
                seat.role,
                seat.persona,
                bindings[i % bindings.len()].clone(),
            )
        })
        .collect()
}

#[derive(Deserialize)]
struct PlannedSeat {
    #[serde(default)]
    name: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    persona: String,
}

/// Parse the auto planner's JSON array of seats.
///
/// Entries with an unknown role or an empty name are skipped. The result is
/// empty unless it contains at least one host and one panelist.
pub fn parse_planned_panel(response: &str) -> Vec<PanelSeat> {
    let text: String = response
        .trim()
        .lines()
        .filter(|line| !line.trim().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n");

    let candidate = match (text.find('['), text.rfind(']')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => return Vec::new(),
    };

    let Ok(raw) = serde_json::from_str::<Vec<PlannedSeat>>(candidate) else {
        return Vec::new();
    };

    let seats: Vec<PanelSeat> = raw
        .into_iter()
        .filter_map(|item| {
            let role = match item.role.trim().to_lowercase().as_str() {
                "host" => AgentRole::Host,
                "panelist" => AgentRole::Panelist,
                "critic" => AgentRole::Critic,
                _ => return None,
            };
            let name = item.name.trim();
            if name.is_empty() {
                return None;
            }
            Some(PanelSeat {
                name: name.to_string(),
                role,
                persona: item.persona.trim().to_string(),
            })
        })
        .collect();

    let has_host = seats.iter().any(|s| s.role == AgentRole::Host);
    let has_panelist = seats.iter().any(|s| s.role == AgentRole::Panelist);
    if has_host && has_panelist { seats } else { Vec::new() }
}
