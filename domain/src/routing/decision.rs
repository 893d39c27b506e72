//! The host's routing decision and the constraints it must respect.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_INTENT_JUDGMENT: &str = "用户意图未明确，默认按常规讨论推进。";
pub const DEFAULT_HOST_POSITION: &str = "主持人建议先聚焦可验证结论，再决定是否扩展讨论范围。";
pub const DEFAULT_PANELIST_TASK: &str = "请结合你的专业视角，直接回应主持人的问题与用户最新需求。";
pub const DEFAULT_OPEN_TASK: &str = "请确认该主线是否可直接进入执行；若否，请指出最小补充信息。";

/// Whether panelists are called this round.
///
/// `HostOnly` is parsed and reported but never changes control flow: host
/// planning always normalizes to `Panelists`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Panelists,
    HostOnly,
}

impl ExecutionMode {
    /// Lenient parse: `host_only`, `host-only`, `HostOnly`; anything else is `Panelists`.
    pub fn normalize(raw: &str) -> Self {
        let candidate = raw.trim().to_lowercase().replace('-', "_");
        match candidate.as_str() {
            "host_only" | "hostonly" => ExecutionMode::HostOnly,
            _ => ExecutionMode::Panelists,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ExecutionMode::Panelists => "panelists",
            ExecutionMode::HostOnly => "host_only",
        }
    }

    /// Label used in the host's planning message.
    pub fn label(&self) -> &str {
        match self {
            ExecutionMode::Panelists => "嘉宾分工讨论",
            ExecutionMode::HostOnly => "主持人直出",
        }
    }
}

/// Externally imposed limits on panelist selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingConstraints {
    /// When non-empty, only these panelists may be selected.
    #[serde(default)]
    pub target_panelists: Vec<String>,
    /// Forbid selecting the entire roster.
    #[serde(default)]
    pub avoid_all_panelists: bool,
}

impl RoutingConstraints {
    pub fn targeting(names: &[&str]) -> Self {
        Self {
            target_panelists: names.iter().map(|n| n.to_string()).collect(),
            avoid_all_panelists: false,
        }
    }

    pub fn avoiding_all() -> Self {
        Self {
            target_panelists: Vec::new(),
            avoid_all_panelists: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.target_panelists.is_empty() && !self.avoid_all_panelists
    }
}

/// Structured outcome of interpreting the host's plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub plan: String,
    pub reasoning: String,
    pub intent_judgment: String,
    pub host_position: String,
    pub execution_mode: ExecutionMode,
    pub selected_panelists: Vec<String>,
    pub panelist_tasks: BTreeMap<String, String>,
    pub open_tasks: Vec<String>,
    pub needs_synthesis: bool,
}

impl RoutingDecision {
    /// Task assigned to `name`, if any.
    pub fn task_for(&self, name: &str) -> Option<&str> {
        self.panelist_tasks.get(name).map(String::as_str)
    }

    /// Normalize to a round that calls panelists.
    ///
    /// An empty selection becomes the whole roster, every selected panelist
    /// gets a task, and mid-cycle synthesis is switched off.
    pub fn into_panel_round(mut self, panelists: &[&str]) -> Self {
        self.execution_mode = ExecutionMode::Panelists;
        if self.selected_panelists.is_empty() {
            self.selected_panelists = panelists.iter().map(|p| p.to_string()).collect();
        }
        for name in &self.selected_panelists {
            self.panelist_tasks
                .entry(name.clone())
                .or_insert_with(|| DEFAULT_PANELIST_TASK.to_string());
        }
        self.needs_synthesis = false;
        self
    }
}
