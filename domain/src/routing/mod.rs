//! Routing: turning the host's plan into panelist assignments.

pub mod decision;
pub mod parsing;
pub mod selection;

pub use decision::{ExecutionMode, RoutingConstraints, RoutingDecision};
pub use parsing::{extract_structured_plan, parse_host_routing, strip_code_fence};
pub use selection::normalize_selection;
