// src/config.rs

use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    /// When true, the demo dataset is seeded at startup (skipped if present).
    pub seed_demo_data: bool,
    /// Directory the seeder loads sample documents from.
    pub seed_data_dir: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let seed_demo_data = env::var("SEED_DEMO_DATA")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let seed_data_dir = env::var("SEED_DATA_DIR").unwrap_or_else(|_| "seed_data".to_string());

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            seed_demo_data,
            seed_data_dir,
        }
    }
}
