//! Host plan parsing.
//!
//! Hosts are asked for JSON but answer with whatever they like: fenced
//! blocks, prose around an object, half-filled fields, or no JSON at all.
//! Parsing never fails; every missing field gets a default.

use super::decision::{
    DEFAULT_HOST_POSITION, DEFAULT_INTENT_JUDGMENT, DEFAULT_OPEN_TASK, DEFAULT_PANELIST_TASK,
    ExecutionMode, RoutingConstraints, RoutingDecision,
};
use super::selection::normalize_selection;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Drop a leading code-fence line and a trailing fence line, if present.
pub fn strip_code_fence(text: &str) -> &str {
    let stripped = text.trim();
    if !stripped.starts_with("```") {
        return stripped;
    }
    let body = match stripped.find('\n') {
        Some(idx) => &stripped[idx + 1..],
        None => "",
    };
    let body = body.trim_end();
    match body.rfind('\n') {
        Some(idx) if body[idx + 1..].trim().starts_with("```") => body[..idx].trim(),
        None if body.trim().starts_with("```") => "",
        _ => body.trim(),
    }
}

/// Extract the JSON object from a host response.
///
/// Tries the fence-stripped text first, then the span between the first
/// `{` and the last `}`. Non-object JSON is rejected.
pub fn extract_structured_plan(raw: &str) -> Option<Map<String, Value>> {
    let cleaned = strip_code_fence(raw);
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(cleaned) {
        return Some(map);
    }

    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&cleaned[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Render a present JSON value as trimmed text.
///
/// Null, false, zero and empty values count as absent. A whitespace-only
/// string is present and renders as empty text.
fn value_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Array(items) if items.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        other => Some(other.to_string()),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Open tasks as a list of non-empty strings, or a single string.
fn open_tasks(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(scalar_text)
            .filter(|t| !t.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

/// Assignments as `{name: task}` or `[{"panelist": name, "task": task}]`.
///
/// Returns tasks keyed by name plus the names in the order they appeared.
fn assignments(value: Option<&Value>) -> (BTreeMap<String, String>, Vec<String>) {
    let mut tasks = BTreeMap::new();
    let mut order = Vec::new();
    let mut push = |name: String, task: String| {
        if name.is_empty() || task.is_empty() {
            return;
        }
        if !order.contains(&name) {
            order.push(name.clone());
        }
        tasks.insert(name, task);
    };

    match value {
        Some(Value::Object(map)) => {
            for (name, task) in map {
                push(name.trim().to_string(), scalar_text(task));
            }
        }
        Some(Value::Array(items)) => {
            for item in items.iter().filter_map(Value::as_object) {
                let name = item.get("panelist").map(scalar_text).unwrap_or_default();
                let task = item.get("task").map(scalar_text).unwrap_or_default();
                push(name, task);
            }
        }
        _ => {}
    }
    (tasks, order)
}

/// Interpret a host response as a [`RoutingDecision`].
///
/// In `Panelists` mode the selection is normalized against the roster and
/// constraints, never left empty while panelists exist, and every selected
/// name gets a task. In `HostOnly` mode selection and tasks are cleared.
/// `needs_synthesis` is honored only in single-round mode.
pub fn parse_host_routing(
    raw: &str,
    panelists: &[&str],
    constraints: &RoutingConstraints,
    single_round_mode: bool,
) -> RoutingDecision {
    let mut decision = RoutingDecision {
        plan: raw.trim().to_string(),
        reasoning: String::new(),
        intent_judgment: DEFAULT_INTENT_JUDGMENT.to_string(),
        host_position: DEFAULT_HOST_POSITION.to_string(),
        execution_mode: ExecutionMode::Panelists,
        selected_panelists: Vec::new(),
        panelist_tasks: BTreeMap::new(),
        open_tasks: Vec::new(),
        needs_synthesis: false,
    };

    if let Some(parsed) = extract_structured_plan(raw) {
        let reasoning = value_text(parsed.get("reasoning"));
        if let Some(plan) = value_text(parsed.get("discussion_plan")).or_else(|| reasoning.clone()) {
            decision.plan = plan;
        }
        if let Some(intent) = value_text(parsed.get("intent_judgment")) {
            decision.intent_judgment = intent;
        }
        decision.reasoning = reasoning.unwrap_or_default();
        if let Some(position) = value_text(parsed.get("host_position"))
            .or_else(|| Some(decision.reasoning.clone()).filter(|r| !r.is_empty()))
        {
            decision.host_position = position;
        }
        decision.execution_mode = parsed
            .get("execution_mode")
            .map(|v| ExecutionMode::normalize(&scalar_text(v)))
            .unwrap_or_default();
        decision.open_tasks = open_tasks(parsed.get("open_tasks"));

        if let Some(Value::Array(items)) = parsed.get("selected_panelists") {
            decision.selected_panelists = items
                .iter()
                .map(scalar_text)
                .filter(|n| !n.is_empty())
                .collect();
        }

        let (tasks, order) = assignments(parsed.get("assignments"));
        if decision.selected_panelists.is_empty() {
            decision.selected_panelists = order;
        }
        decision.panelist_tasks = tasks;

        if let Some(Value::Bool(flag)) = parsed.get("needs_synthesis") {
            decision.needs_synthesis = *flag;
        }
    }

    match decision.execution_mode {
        ExecutionMode::Panelists => {
            let mut selected =
                normalize_selection(&decision.selected_panelists, panelists, constraints);
            if selected.is_empty() {
                selected = panelists.iter().take(1).map(|n| n.to_string()).collect();
            }
            for name in &selected {
                decision
                    .panelist_tasks
                    .entry(name.clone())
                    .or_insert_with(|| DEFAULT_PANELIST_TASK.to_string());
            }
            decision.selected_panelists = selected;
        }
        ExecutionMode::HostOnly => {
            decision.selected_panelists.clear();
            decision.panelist_tasks.clear();
        }
    }

    if !single_round_mode {
        decision.needs_synthesis = false;
    }
    if decision.open_tasks.is_empty() {
        decision.open_tasks = vec![DEFAULT_OPEN_TASK.to_string()];
    }
    decision
}
