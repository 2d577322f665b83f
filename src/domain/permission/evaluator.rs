//! RBAC evaluation of a query tree against a granted permission set

use super::query::PermissionQuery;
use super::set::PermissionSet;

/// Verdict of an evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationResult {
    pub valid: bool,
    /// Names the unmet permission(s) when `valid` is false, empty otherwise
    pub message: String,
}

impl EvaluationResult {
    fn granted() -> Self {
        Self {
            valid: true,
            message: String::new(),
        }
    }

    fn denied(message: String) -> Self {
        Self {
            valid: false,
            message,
        }
    }
}

/// Evaluate `query` against `granted`
///
/// - `Leaf` holds when any granted permission matches it.
/// - `And` holds when every child holds; the first unmet child is reported.
/// - `Or` holds when any child holds; all alternatives are reported.
pub fn evaluate(query: &PermissionQuery, granted: &PermissionSet) -> EvaluationResult {
    match query {
        PermissionQuery::Leaf(required) => {
            if granted.grants(required) {
                EvaluationResult::granted()
            } else {
                EvaluationResult::denied(format!("Missing permission: '{}'", required))
            }
        }
        PermissionQuery::And(children) => {
            for child in children {
                let result = evaluate(child, granted);
                if !result.valid {
                    return result;
                }
            }
            EvaluationResult::granted()
        }
        PermissionQuery::Or(children) => {
            if children.iter().any(|child| evaluate(child, granted).valid) {
                return EvaluationResult::granted();
            }

            let alternatives: Vec<String> = children
                .iter()
                .map(|child| format!("'{}'", child))
                .collect();

            EvaluationResult::denied(format!(
                "Missing one of these permissions: [{}]",
                alternatives.join(", ")
            ))
        }
    }
}
