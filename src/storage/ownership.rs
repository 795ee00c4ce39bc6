// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ownership enforcement for device-scoped storage operations.
//!
//! A missing resource and a resource owned by someone else are collapsed
//! into the same `NotFound` error, so callers can never probe for the
//! existence of another user's devices.

use uuid::Uuid;

use super::{StoreError, StoreResult};

/// Trait for resources that belong to a single user.
pub trait OwnedResource {
    /// The owning user's id.
    fn owner_id(&self) -> Uuid;

    /// Resource kind used in error messages, e.g. `"Device"`.
    fn resource_kind() -> &'static str;
}

/// Resolve an optional lookup result against the requesting user.
///
/// Returns the resource only when it exists and is owned by `user_id`;
/// both failure cases yield an identical `NotFound`.
pub fn ensure_owned<T: OwnedResource>(resource: Option<T>, user_id: Uuid) -> StoreResult<T> {
    match resource {
        Some(resource) if resource.owner_id() == user_id => Ok(resource),
        _ => Err(StoreError::NotFound(T::resource_kind().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct TestResource {
        owner: Uuid,
    }

    impl OwnedResource for TestResource {
        fn owner_id(&self) -> Uuid {
            self.owner
        }

        fn resource_kind() -> &'static str {
            "Resource"
        }
    }

    #[test]
    fn owner_passes() {
        let owner = Uuid::new_v4();
        let resource = TestResource { owner };
        assert!(ensure_owned(Some(resource), owner).is_ok());
    }

    #[test]
    fn non_owner_and_missing_are_indistinguishable() {
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        let not_owned = ensure_owned(Some(TestResource { owner }), stranger);
        let missing = ensure_owned(None::<TestResource>, stranger);

        let not_owned_msg = match not_owned {
            Err(StoreError::NotFound(msg)) => msg,
            other => panic!("expected NotFound, got {other:?}"),
        };
        let missing_msg = match missing {
            Err(StoreError::NotFound(msg)) => msg,
            other => panic!("expected NotFound, got {other:?}"),
        };
        assert_eq!(not_owned_msg, missing_msg);
    }
}
