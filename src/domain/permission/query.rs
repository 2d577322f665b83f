//! Permission query trees and their builders

use std::fmt;

use super::string::{PermissionError, PermissionString};

/// Boolean expression over required permissions
///
/// An empty `And` is satisfied by any principal; an empty `Or` by none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionQuery {
    Leaf(PermissionString),
    And(Vec<PermissionQuery>),
    Or(Vec<PermissionQuery>),
}

impl PermissionQuery {
    /// Parse a single required permission
    pub fn permission(value: impl Into<String>) -> Result<Self, PermissionError> {
        Ok(Self::Leaf(PermissionString::new(value)?))
    }

    pub fn leaf(permission: PermissionString) -> Self {
        Self::Leaf(permission)
    }

    pub fn and(children: impl IntoIterator<Item = PermissionQuery>) -> Self {
        Self::And(children.into_iter().collect())
    }

    pub fn or(children: impl IntoIterator<Item = PermissionQuery>) -> Self {
        Self::Or(children.into_iter().collect())
    }

    /// `Or` over plain permission strings, e.g. `any_of(["*", "rbac.*.create_role"])`
    pub fn any_of<I, S>(values: I) -> Result<Self, PermissionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self::Or(Self::leaves_from(values)?))
    }

    /// `And` over plain permission strings
    pub fn all_of<I, S>(values: I) -> Result<Self, PermissionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self::And(Self::leaves_from(values)?))
    }

    /// Every leaf permission in tree order
    pub fn leaves(&self) -> Vec<&PermissionString> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a PermissionString>) {
        match self {
            Self::Leaf(permission) => out.push(permission),
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }

    fn leaves_from<I, S>(values: I) -> Result<Vec<PermissionQuery>, PermissionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        values
            .into_iter()
            .map(|v| PermissionString::new(v).map(Self::Leaf))
            .collect()
    }
}

impl From<PermissionString> for PermissionQuery {
    fn from(permission: PermissionString) -> Self {
        Self::Leaf(permission)
    }
}

impl fmt::Display for PermissionQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(permission) => write!(f, "{}", permission),
            Self::And(children) => write_joined(f, children, " AND "),
            Self::Or(children) => write_joined(f, children, " OR "),
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    children: &[PermissionQuery],
    separator: &str,
) -> fmt::Result {
    write!(f, "(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", separator)?;
        }
        write!(f, "{}", child)?;
    }
    write!(f, ")")
}

/// A required permission that may depend on the instance being operated on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionTemplate {
    /// Used as-is
    Literal(PermissionString),
    /// Becomes `resource.<instance id>.action` when bound
    Instance { resource: String, action: String },
}

impl PermissionTemplate {
    pub fn literal(value: impl Into<String>) -> Result<Self, PermissionError> {
        Ok(Self::Literal(PermissionString::new(value)?))
    }

    pub fn instance(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self::Instance {
            resource: resource.into(),
            action: action.into(),
        }
    }

    /// Substitute the instance id; literals are returned unchanged
    pub fn bind(&self, instance_id: &str) -> Result<PermissionString, PermissionError> {
        match self {
            Self::Literal(permission) => Ok(permission.clone()),
            Self::Instance { resource, action } => {
                PermissionString::from_parts(resource, instance_id, action)
            }
        }
    }
}

/// Query tree whose leaves are templates, bound once per request
///
/// ```
/// use keygate::domain::permission::{PermissionTemplate, QueryTemplate};
///
/// let template = QueryTemplate::or([
///     QueryTemplate::literal("*").unwrap(),
///     QueryTemplate::literal("identity.*.delete_identity").unwrap(),
///     QueryTemplate::leaf(PermissionTemplate::instance("identity", "delete_identity")),
/// ]);
///
/// let query = template.bind("idn_123").unwrap();
/// assert_eq!(
///     query.to_string(),
///     "(* OR identity.*.delete_identity OR identity.idn_123.delete_identity)"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryTemplate {
    Leaf(PermissionTemplate),
    And(Vec<QueryTemplate>),
    Or(Vec<QueryTemplate>),
}

impl QueryTemplate {
    pub fn leaf(template: PermissionTemplate) -> Self {
        Self::Leaf(template)
    }

    pub fn literal(value: impl Into<String>) -> Result<Self, PermissionError> {
        Ok(Self::Leaf(PermissionTemplate::literal(value)?))
    }

    pub fn instance(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self::Leaf(PermissionTemplate::instance(resource, action))
    }

    pub fn and(children: impl IntoIterator<Item = QueryTemplate>) -> Self {
        Self::And(children.into_iter().collect())
    }

    pub fn or(children: impl IntoIterator<Item = QueryTemplate>) -> Self {
        Self::Or(children.into_iter().collect())
    }

    /// Produce a concrete query for `instance_id`
    pub fn bind(&self, instance_id: &str) -> Result<PermissionQuery, PermissionError> {
        match self {
            Self::Leaf(template) => Ok(PermissionQuery::Leaf(template.bind(instance_id)?)),
            Self::And(children) => Ok(PermissionQuery::And(Self::bind_all(children, instance_id)?)),
            Self::Or(children) => Ok(PermissionQuery::Or(Self::bind_all(children, instance_id)?)),
        }
    }

    fn bind_all(
        children: &[QueryTemplate],
        instance_id: &str,
    ) -> Result<Vec<PermissionQuery>, PermissionError> {
        children.iter().map(|c| c.bind(instance_id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_of() {
        let query = PermissionQuery::any_of(["*", "rbac.*.create_role"]).unwrap();

        assert_eq!(query.leaves().len(), 2);
        assert_eq!(query.to_string(), "(* OR rbac.*.create_role)");
    }

    #[test]
    fn test_any_of_rejects_malformed_leaf() {
        assert!(PermissionQuery::any_of(["*", "rbac.create_role"]).is_err());
    }

    #[test]
    fn test_nested_display() {
        let query = PermissionQuery::or([
            PermissionQuery::permission("*").unwrap(),
            PermissionQuery::all_of(["api.*.read_api", "api.*.read_key"]).unwrap(),
        ]);

        assert_eq!(query.to_string(), "(* OR (api.*.read_api AND api.*.read_key))");
    }

    #[test]
    fn test_leaves_in_order() {
        let query = PermissionQuery::and([
            PermissionQuery::permission("a.b.c").unwrap(),
            PermissionQuery::any_of(["d.e.f", "g.h.i"]).unwrap(),
        ]);

        let leaves: Vec<&str> = query.leaves().iter().map(|p| p.as_str()).collect();
        assert_eq!(leaves, vec!["a.b.c", "d.e.f", "g.h.i"]);
    }

    #[test]
    fn test_template_bind_substitutes_instance() {
        let template = QueryTemplate::or([
            QueryTemplate::literal("*").unwrap(),
            QueryTemplate::instance("identity", "delete_identity"),
        ]);

        let query = template.bind("idn_123").unwrap();
        let leaves: Vec<&str> = query.leaves().iter().map(|p| p.as_str()).collect();
        assert_eq!(leaves, vec!["*", "identity.idn_123.delete_identity"]);
    }

    #[test]
    fn test_template_bind_rejects_bad_instance_id() {
        let template = QueryTemplate::instance("api", "delete_api");

        assert!(template.bind("").is_err());
        assert!(template.bind("a.b").is_err());
    }

    #[test]
    fn test_literal_template_ignores_instance() {
        let template = PermissionTemplate::literal("api.*.read_api").unwrap();
        assert_eq!(template.bind("api_1").unwrap().as_str(), "api.*.read_api");
    }
}
