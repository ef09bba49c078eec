/// Event types whose subscriber lists are precomputed into the worker cache
/// under `type:platform:locale`. Anything else goes through the settings store.
pub const DEFAULT_CACHED_EVENTS: &[&str] = &[
    "alerts",
    "arbitration",
    "archonhunt",
    "baro",
    "cambion",
    "cetus",
    "conclave.challenges",
    "cycle",
    "darvo",
    "duviri",
    "earth",
    "enemies",
    "fissures",
    "invasions",
    "kuva",
    "news",
    "nightwave",
    "sales",
    "sortie",
    "steelpath",
    "updates",
    "vallis",
];

/// Shard identity of this process.
///
/// Partitioning is disabled when `shard_id` is unset or `total_shards` is 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShardConfig {
    pub shard_id: Option<u64>,
    pub total_shards: u64,
}

impl ShardConfig {
    pub fn new(shard_id: Option<u64>, total_shards: u64) -> Self {
        Self {
            shard_id,
            total_shards,
        }
    }

    /// Single-process mode: every guild belongs to this process.
    pub fn unsharded() -> Self {
        Self::default()
    }
}

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// PostgreSQL connection string (settings store)
    pub database_url: String,

    /// Redis connection string (worker cache + broadcast queue)
    pub redis_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// This process's slice of the guild space
    pub shard: ShardConfig,

    /// Redis list the worker pops broadcast jobs from
    pub broadcast_queue: String,

    /// Per-request timeout for webhook delivery in milliseconds (default: 10000)
    pub webhook_timeout_ms: u64,

    /// Event types served from the worker cache
    pub cached_events: Vec<String>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let shard_id = match std::env::var("SHARD_ID") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                raw.trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("SHARD_ID must be a valid u64"))?,
            ),
            _ => None,
        };

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            shard: ShardConfig::new(
                shard_id,
                std::env::var("SHARDS")
                    .unwrap_or_else(|_| "0".to_string())
                    .parse()
                    .map_err(|_| anyhow::anyhow!("SHARDS must be a valid u64"))?,
            ),
            broadcast_queue: std::env::var("BROADCAST_QUEUE")
                .unwrap_or_else(|_| "broadcast:queue".to_string()),
            webhook_timeout_ms: std::env::var("WEBHOOK_TIMEOUT_MS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("WEBHOOK_TIMEOUT_MS must be a valid u64"))?,
            cached_events: std::env::var("CACHED_EVENTS")
                .ok()
                .map(|raw| parse_list(&raw))
                .unwrap_or_else(|| DEFAULT_CACHED_EVENTS.iter().map(|s| s.to_string()).collect()),
        })
    }
}

/// Split a comma-separated env value, dropping blanks.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
