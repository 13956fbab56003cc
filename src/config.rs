use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub pool_size: u32,
    /// Prefix for newly minted keys (PREFIX-XXXX-XXXX)
    pub key_prefix: String,
    /// Duration used by `issue` when none is given
    pub default_duration: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let pool_size: u32 = env::var("LICENSEGATE_POOL_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&n| n > 0)
            .unwrap_or(8);

        Self {
            database_path: env::var("LICENSEGATE_DATABASE_PATH")
                .unwrap_or_else(|_| "licensegate.db".to_string()),
            pool_size,
            key_prefix: env::var("LICENSEGATE_KEY_PREFIX").unwrap_or_else(|_| "CS".to_string()),
            default_duration: env::var("LICENSEGATE_DEFAULT_DURATION")
                .unwrap_or_else(|_| "lifetime".to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "licensegate.db".to_string(),
            pool_size: 8,
            key_prefix: "CS".to_string(),
            default_duration: "lifetime".to_string(),
        }
    }
}
