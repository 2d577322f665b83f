//! Wildcard matching between a granted and a required permission

use super::string::{PermissionString, WILDCARD};

/// Check whether `granted` authorizes `required`
///
/// - A granted `*` authorizes everything.
/// - Otherwise both sides must have the same number of segments, and each
///   granted segment must be `*` or equal to the required segment.
///
/// Matching is directional: `api.*.read_api` authorizes `api.123.read_api`,
/// but `api.123.read_api` does not authorize `api.*.read_api`. A `*` in the
/// requirement is only satisfied by a `*` in the same granted position.
pub fn matches(granted: &PermissionString, required: &PermissionString) -> bool {
    if granted.is_wildcard() {
        return true;
    }

    let granted_segments: Vec<&str> = granted.segments().collect();
    let required_segments: Vec<&str> = required.segments().collect();

    if granted_segments.len() != required_segments.len() {
        return false;
    }

    granted_segments
        .iter()
        .zip(required_segments.iter())
        .all(|(g, r)| *g == WILDCARD || g == r)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(value: &str) -> PermissionString {
        PermissionString::new(value).unwrap()
    }

    #[test]
    fn test_universal_grant_matches_everything() {
        assert!(matches(&p("*"), &p("api.123.read_api")));
        assert!(matches(&p("*"), &p("api.*.read_api")));
        assert!(matches(&p("*"), &p("*")));
    }

    #[test]
    fn test_exact_match() {
        assert!(matches(&p("api.123.delete_api"), &p("api.123.delete_api")));
        assert!(!matches(&p("api.123.delete_api"), &p("api.456.delete_api")));
        assert!(!matches(&p("api.123.delete_api"), &p("api.123.read_api")));
    }

    #[test]
    fn test_wildcard_grant_covers_concrete_requirement() {
        assert!(matches(&p("api.*.read_api"), &p("api.123.read_api")));
        assert!(matches(&p("api.*.read_api"), &p("api.*.read_api")));
        assert!(!matches(&p("api.*.read_api"), &p("api.123.update_api")));
        assert!(!matches(&p("api.*.read_api"), &p("rbac.123.read_api")));
    }

    #[test]
    fn test_concrete_grant_does_not_cover_wildcard_requirement() {
        assert!(!matches(&p("api.123.read_api"), &p("api.*.read_api")));
    }

    #[test]
    fn test_universal_requirement_needs_universal_grant() {
        assert!(!matches(&p("api.*.read_api"), &p("*")));
        assert!(!matches(&p("*.*.*"), &p("*")));
    }

    #[test]
    fn test_wildcards_in_other_positions() {
        assert!(matches(&p("*.*.*"), &p("api.123.read_api")));
        assert!(matches(&p("api.123.*"), &p("api.123.delete_api")));
        assert!(!matches(&p("api.123.*"), &p("api.456.delete_api")));
    }

    #[test]
    fn test_segment_comparison_is_byte_exact() {
        assert!(!matches(&p("api.*.Read_api"), &p("api.123.read_api")));
        assert!(!matches(&p("api.*.read_api"), &p("api.123.read_api_v2")));
    }
}
