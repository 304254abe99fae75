//! Caller identity and visibility rules.

use std::collections::HashSet;

use model::{CustomerId, Entity, VehicleId};

/// Who is asking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerScope {
    /// A customer: sees the shared space inventory plus records tied to
    /// vehicles registered to them.
    Customer(CustomerId),
    /// Staff: unrestricted reads plus recompute control.
    Staff,
}

impl CallerScope {
    /// Whether this caller may trigger or inspect recomputation.
    pub fn can_administer(&self) -> bool {
        matches!(self, CallerScope::Staff)
    }

    /// Whether this caller may see `entity`, given the set of vehicles they
    /// own. Spaces are public inventory; everything else is owner-scoped for
    /// customers.
    pub fn permits(&self, entity: &Entity, owned: &HashSet<VehicleId>) -> bool {
        match self {
            CallerScope::Staff => true,
            CallerScope::Customer(_) => match entity {
                Entity::Space(_) => true,
                Entity::Vehicle(_) | Entity::Session(_) | Entity::Citation(_) => entity
                    .vehicle()
                    .is_some_and(|vehicle| owned.contains(vehicle)),
            },
        }
    }
}
