//! Permission domain
//!
//! Hierarchical permission strings, wildcard matching, query trees and
//! the RBAC evaluator that walks them.

mod evaluator;
mod matcher;
mod query;
mod set;
mod string;

pub use evaluator::{evaluate, EvaluationResult};
pub use matcher::matches;
pub use query::{PermissionQuery, PermissionTemplate, QueryTemplate};
pub use set::PermissionSet;
pub use string::{validate_permission, PermissionError, PermissionString, WILDCARD};

impl From<PermissionError> for crate::domain::DomainError {
    fn from(err: PermissionError) -> Self {
        Self::invalid_permission(err.to_string())
    }
}
