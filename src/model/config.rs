use serde::{Deserialize, Serialize};

/// Configuration from `.daylog/config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub owner: OwnerConfig,
    #[serde(default)]
    pub carry_over: CarryOverConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub save: SaveConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerConfig {
    #[serde(default = "default_owner")]
    pub id: String,
}

impl Default for OwnerConfig {
    fn default() -> Self {
        OwnerConfig {
            id: default_owner(),
        }
    }
}

fn default_owner() -> String {
    "me".to_string()
}

/// Owner ids become cache key segments, so they cannot contain the delimiter
pub fn validate_owner(owner: &str) -> Result<(), String> {
    if owner.trim().is_empty() {
        return Err("owner id cannot be empty".to_string());
    }
    if owner.contains(':') || owner.contains('"') {
        return Err(format!(
            "invalid owner id \"{}\": ':' and '\"' are not allowed",
            owner
        ));
    }
    Ok(())
}

impl Config {
    /// Check values serde cannot: owner id grammar and the TTL range
    pub fn validate(&self) -> Result<(), String> {
        validate_owner(&self.owner.id)?;
        if self.cache.ttl_secs > MAX_TTL_SECS {
            return Err(format!(
                "cache.ttl_secs = {} is out of range (at most {})",
                self.cache.ttl_secs, MAX_TTL_SECS
            ));
        }
        if self.carry_over.lookback_days > MAX_LOOKBACK_DAYS {
            return Err(format!(
                "carry_over.lookback_days = {} is out of range (at most {})",
                self.carry_over.lookback_days, MAX_LOOKBACK_DAYS
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarryOverConfig {
    /// How many days back to scan for unfinished items
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u64,
}

impl Default for CarryOverConfig {
    fn default() -> Self {
        CarryOverConfig {
            lookback_days: default_lookback_days(),
        }
    }
}

pub const MAX_LOOKBACK_DAYS: u64 = 366;

fn default_lookback_days() -> u64 {
    7
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Keep a reload-surviving tier under `.daylog/cache/`
    #[serde(default = "default_true")]
    pub durable: bool,
    /// Safety-net expiry for cached views
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            durable: true,
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Longest accepted cache TTL: one year
pub const MAX_TTL_SECS: u64 = 366 * 24 * 60 * 60;

fn default_ttl_secs() -> u64 {
    30 * 60
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveConfig {
    /// Save immediately after accepting carry-over items instead of waiting
    /// for the next `dl save`
    #[serde(default)]
    pub auto_save_carry_over: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Shell command that reads a feedback request as JSON on stdin and
    /// prints a feedback object as JSON
    #[serde(default)]
    pub command: Option<String>,
}
