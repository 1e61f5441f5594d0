// src/utils/policy.rs

use crate::models::Visibility;

/// The single read-access rule: public entities are readable by anyone,
/// private ones only by the owners of the enclosing module.
pub fn can_read(requesting_user_id: i64, visibility: Visibility, owner_ids: &[i64]) -> bool {
    visibility == Visibility::Public || owner_ids.contains(&requesting_user_id)
}

/// Write access. Public visibility never grants writes.
pub fn is_owner(requesting_user_id: i64, owner_ids: &[i64]) -> bool {
    owner_ids.contains(&requesting_user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_is_readable_by_anyone() {
        assert!(can_read(42, Visibility::Public, &[]));
        assert!(can_read(42, Visibility::Public, &[1, 2]));
    }

    #[test]
    fn private_is_readable_only_by_owners() {
        assert!(can_read(2, Visibility::Private, &[1, 2]));
        assert!(!can_read(3, Visibility::Private, &[1, 2]));
    }

    #[test]
    fn public_visibility_does_not_grant_writes() {
        assert!(is_owner(1, &[1, 2]));
        assert!(!is_owner(3, &[1, 2]));
    }
}
