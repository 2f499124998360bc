//! # Actors and Permissions
//!
//! The authenticated identity behind an operation, as resolved by the
//! surrounding authentication layer. The core only checks permissions; it
//! never authenticates.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a user (or the system) performing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub u64);

impl ActorId {
    /// Identity used when no authenticated actor is attached to a session.
    pub const SYSTEM: ActorId = ActorId(0);

    pub fn is_system(&self) -> bool {
        *self == Self::SYSTEM
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What an actor is attempting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
    /// Approve or reject change requests.
    Review,
    /// Apply gated changes directly, skipping review.
    BypassReview,
    /// Review a change request one requested oneself.
    SelfReview,
}

/// Resource families permissions are granted over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Resource {
    Agreement,
    BudgetLineItem,
    Can,
    CanFunding,
    ChangeRequest,
}

impl Resource {
    /// Resource family for an entity class name.
    pub fn for_class(class_name: &str) -> Option<Resource> {
        match class_name {
            "Agreement" => Some(Self::Agreement),
            "BudgetLineItem" => Some(Self::BudgetLineItem),
            "CAN" => Some(Self::Can),
            "CANFundingReceived" | "CANFundingBudget" => Some(Self::CanFunding),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission {
    pub operation: Operation,
    pub resource: Resource,
}

impl Permission {
    pub const fn new(operation: Operation, resource: Resource) -> Self {
        Self {
            operation,
            resource,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{:?}", self.operation, self.resource)
    }
}

/// An authenticated identity with its granted permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub full_name: Option<String>,
    pub permissions: BTreeSet<Permission>,
}

impl Actor {
    pub fn new(id: u64, full_name: impl Into<String>) -> Self {
        Self {
            id: ActorId(id),
            full_name: Some(full_name.into()),
            permissions: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_permission(mut self, operation: Operation, resource: Resource) -> Self {
        self.permissions.insert(Permission::new(operation, resource));
        self
    }

    /// Grant read/create/update/delete over a resource.
    #[must_use]
    pub fn with_crud(self, resource: Resource) -> Self {
        self.with_permission(Operation::Read, resource)
            .with_permission(Operation::Create, resource)
            .with_permission(Operation::Update, resource)
            .with_permission(Operation::Delete, resource)
    }

    pub fn can(&self, operation: Operation, resource: Resource) -> bool {
        self.permissions
            .contains(&Permission::new(operation, resource))
    }

    /// Name shown in history and notification messages.
    pub fn display_name(&self) -> String {
        crate::display::display_name(self.full_name.as_deref(), self.id)
    }
}
