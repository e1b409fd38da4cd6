//! Transport listing predicates.
//!
//! An absent filter places no restriction. An empty filter rejects everything.

use crate::identity::Identity;

/// Whether `transport_type` passes the type filter.
pub fn type_included(filter: Option<&[String]>, transport_type: &str) -> bool {
    match filter {
        Some(types) => types.iter().any(|t| t == transport_type),
        None => true,
    }
}

/// Whether either edge of a transport passes the identity filter.
pub fn identity_included(
    filter: Option<&[Identity]>,
    local: &Identity,
    remote: &Identity,
) -> bool {
    match filter {
        Some(ids) => ids.iter().any(|id| id == local || id == remote),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_filters_admit_everything() {
        let a = Identity::generate();
        let b = Identity::generate();
        assert!(type_included(None, "tcp"));
        assert!(identity_included(None, &a, &b));
    }

    #[test]
    fn test_type_filter() {
        let types = vec!["messaging".to_string()];
        assert!(type_included(Some(types.as_slice()), "messaging"));
        assert!(!type_included(Some(types.as_slice()), "tcp"));
        assert!(!type_included(Some(&[][..]), "messaging"));
    }

    #[test]
    fn test_identity_filter_matches_either_edge() {
        let local = Identity::generate();
        let remote = Identity::generate();
        let other = Identity::generate();

        assert!(identity_included(Some([remote].as_slice()), &local, &remote));
        assert!(identity_included(Some([local].as_slice()), &local, &remote));
        assert!(!identity_included(Some([other].as_slice()), &local, &remote));
    }
}
