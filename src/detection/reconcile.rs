use std::collections::HashSet;
use std::net::Ipv4Addr;

use crate::models::{BlacklistEntry, FirewallBanEntry};

/// Blacklist entries whose address the firewall does not drop yet.
///
/// Only the address is compared; result order follows `blacklist`.
pub fn pending_bans(blacklist: &[BlacklistEntry], banned: &[FirewallBanEntry]) -> Vec<BlacklistEntry> {
    let enforced: HashSet<Ipv4Addr> = banned.iter().map(|b| b.address).collect();

    let pending: Vec<BlacklistEntry> = blacklist
        .iter()
        .filter(|entry| !enforced.contains(&entry.address))
        .cloned()
        .collect();

    log::info!("Got {} new address(es) to ban", pending.len());
    for entry in &pending {
        log::info!(
            "\t{} ({}) ({})",
            entry.address,
            entry.attempt_count,
            entry.users_display()
        );
    }

    pending
}
