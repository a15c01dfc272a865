//! Engine configuration.
//!
//! All knobs carry defaults that match the production deployment; the
//! environment overrides them at process start. Connection-pool sizing and
//! request timeouts are owned by the embedding process, not this crate.

use std::env;
use std::time::Duration;

/// Environment variable holding comma-separated shard connection URLs.
const SHARD_URLS_VAR: &str = "ENGINE_SHARD_URLS";
/// Environment variable holding the master-data database URL.
const MASTER_URL_VAR: &str = "ENGINE_MASTER_URL";
/// Environment variable holding the per-user cache (Redis) URL.
const REDIS_URL_VAR: &str = "ENGINE_REDIS_URL";
/// Environment variable holding the per-process identifier salt.
const PROCESS_SALT_VAR: &str = "ENGINE_PROCESS_SALT";

/// Runtime configuration for the engine and its adapters.
///
/// Login-bonus exclusions are configuration data, never hard-coded
/// identifiers: operators retire a misconfigured bonus by listing it in
/// `excluded_login_bonus_ids` rather than patching the window check.
#[derive(Debug, Clone)]
pub struct Config {
    /// One PostgreSQL URL per user shard. Shard membership is
    /// `user_id mod shard_urls.len()` and must never be reordered.
    pub shard_urls: Vec<String>,
    /// PostgreSQL URL for the master-data tables.
    pub master_url: String,
    /// Redis URL for the per-user cache.
    pub redis_url: String,
    /// Maximum connections per shard pool.
    pub max_pool_size: u32,
    /// Pool checkout timeout.
    pub connection_timeout: Duration,
    /// Per-process salt mixed into generated identifiers so concurrent
    /// processes never collide.
    pub process_salt: i64,
    /// Currency cost of a single lottery draw.
    pub draw_cost: i64,
    /// Session lifetime in seconds.
    pub session_ttl: i64,
    /// One-time token lifetime in seconds.
    pub token_ttl: i64,
    /// Item definition granted three times to every new user.
    pub initial_card_id: i64,
    /// Login bonuses withheld by operators regardless of their window.
    pub excluded_login_bonus_ids: Vec<i64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shard_urls: vec!["postgres://localhost/game_shard_0".to_owned()],
            master_url: "postgres://localhost/game_master".to_owned(),
            redis_url: "redis://localhost:6379".to_owned(),
            max_pool_size: 16,
            connection_timeout: Duration::from_secs(30),
            process_salt: 1,
            draw_cost: 1000,
            session_ttl: 86_400,
            token_ttl: 600,
            initial_card_id: 2,
            excluded_login_bonus_ids: Vec::new(),
        }
    }
}

impl Config {
    /// Build a configuration from the environment, falling back to the
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(urls) = env::var(SHARD_URLS_VAR) {
            let shard_urls: Vec<String> = urls
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_owned)
                .collect();
            if !shard_urls.is_empty() {
                config.shard_urls = shard_urls;
            }
        }
        if let Ok(url) = env::var(MASTER_URL_VAR) {
            config.master_url = url;
        }
        if let Ok(url) = env::var(REDIS_URL_VAR) {
            config.redis_url = url;
        }
        if let Some(salt) = env::var(PROCESS_SALT_VAR)
            .ok()
            .and_then(|raw| raw.parse().ok())
        {
            config.process_salt = salt;
        }
        config
    }

    /// Replace the shard URL list.
    pub fn with_shard_urls(mut self, shard_urls: Vec<String>) -> Self {
        self.shard_urls = shard_urls;
        self
    }

    /// Replace the per-process salt.
    pub fn with_process_salt(mut self, process_salt: i64) -> Self {
        self.process_salt = process_salt;
        self
    }

    /// Replace the operator exclusion list for login bonuses.
    pub fn with_excluded_login_bonus_ids(mut self, ids: Vec<i64>) -> Self {
        self.excluded_login_bonus_ids = ids;
        self
    }

    /// Number of user shards.
    pub fn shard_count(&self) -> usize {
        self.shard_urls.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn default_values_match_deployment() {
        let config = Config::default();

        assert_eq!(config.draw_cost, 1000);
        assert_eq!(config.session_ttl, 86_400);
        assert_eq!(config.token_ttl, 600);
        assert_eq!(config.shard_count(), 1);
        assert!(config.excluded_login_bonus_ids.is_empty());
    }

    #[rstest]
    fn builder_overrides_apply() {
        let config = Config::default()
            .with_shard_urls(vec!["a".into(), "b".into(), "c".into()])
            .with_process_salt(5)
            .with_excluded_login_bonus_ids(vec![3]);

        assert_eq!(config.shard_count(), 3);
        assert_eq!(config.process_salt, 5);
        assert_eq!(config.excluded_login_bonus_ids, vec![3]);
    }
}
