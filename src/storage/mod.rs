pub mod memory;

use std::collections::HashMap;

use crate::models::host::HostAddress;

/// Stable numeric IDs for server addresses.
pub trait IdentityStore: Send + Sync {
    /// Write-through: unknown hosts are assigned a fresh ID.
    fn assign_or_lookup_ids(
        &self,
        host_games: &HashMap<HostAddress, String>,
    ) -> HashMap<HostAddress, i64>;

    /// Read-only: unknown hosts map to 0.
    fn lookup_ids(&self, hosts: &[HostAddress]) -> HashMap<HostAddress, i64>;
}
