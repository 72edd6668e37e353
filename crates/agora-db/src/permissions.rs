use crate::{StoreError, StoreResult};

/// Elevated rights an actor holds over a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Moderator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    Deny,
}

impl Access {
    pub fn ensure(self) -> StoreResult<()> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny => Err(StoreError::Forbidden),
        }
    }
}

/// Owners may always modify their own resources; anyone else needs a role
/// that grants it.
pub fn authorize(actor_id: i64, owner_id: i64, roles: &[Role]) -> Access {
    if actor_id == owner_id || roles.contains(&Role::Moderator) {
        Access::Allow
    } else {
        Access::Deny
    }
}
