//! Panelist selection normalization.

use super::decision::RoutingConstraints;

/// Reconcile a requested selection with the roster and hard constraints.
///
/// 1. Unknown names are dropped; an empty result selects every panelist.
/// 2. A non-empty `target_panelists` allow-list (itself filtered to known
///    names) intersects the selection, falling back to the allow-list.
/// 3. `avoid_all_panelists` trims a full-roster selection (roster > 1) to
///    its first name.
///
/// Applying it twice yields the same result.
pub fn normalize_selection(
    selected: &[String],
    panelists: &[&str],
    constraints: &RoutingConstraints,
) -> Vec<String> {
    let mut valid: Vec<String> = selected
        .iter()
        .filter(|name| panelists.contains(&name.as_str()))
        .cloned()
        .collect();

    if valid.is_empty() {
        valid = panelists.iter().map(|n| n.to_string()).collect();
    }

    let targets: Vec<String> = constraints
        .target_panelists
        .iter()
        .filter(|name| panelists.contains(&name.as_str()))
        .cloned()
        .collect();
    if !targets.is_empty() {
        valid.retain(|name| targets.contains(name));
        if valid.is_empty() {
            valid = targets;
        }
    }

    if constraints.avoid_all_panelists && valid.len() == panelists.len() && valid.len() > 1 {
        valid.truncate(1);
    }

    valid
}
