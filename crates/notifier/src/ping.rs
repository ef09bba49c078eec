//! Ping annotator — per-guild mention text for an event type and item set.

use std::collections::HashMap;

/// Key into the `pings` table: `guildId:type,item1,item2,...` with items
/// sorted so any input order resolves to the same entry.
pub fn ping_key(guild_id: &str, event_type: &str, items: &[String]) -> String {
    let mut sorted: Vec<&str> = items.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    let mut parts = Vec::with_capacity(sorted.len() + 1);
    parts.push(event_type);
    parts.extend(sorted);

    format!("{}:{}", guild_id, parts.join(","))
}

/// Snapshot of the ping table taken once per broadcast.
#[derive(Debug, Clone, Default)]
pub struct PingTable {
    pings: HashMap<String, String>,
}

impl PingTable {
    pub fn new(pings: HashMap<String, String>) -> Self {
        Self { pings }
    }

    /// Mention text for this guild, or an empty string if none is configured.
    pub fn ping_for(&self, guild_id: &str, event_type: &str, items: &[String]) -> String {
        self.pings
            .get(&ping_key(guild_id, event_type, items))
            .cloned()
            .unwrap_or_default()
    }
}
