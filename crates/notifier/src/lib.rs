//! World-state notification fan-out.
//!
//! Routes each world-state event to the channels subscribed to it and delivers
//! it over their webhooks, one concurrent delivery per channel.

pub mod broadcaster;
pub mod cache;
pub mod delivery;
pub mod dispatcher;
pub mod filter;
pub mod ping;
pub mod resolver;
pub mod shard;
pub mod store;
pub mod worker;

#[cfg(test)]
mod testing;
