use std::env;

use crate::constants::DEFAULT_SWEEP_HOUR;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_path: String,
    pub allowed_origins: Vec<String>,
    pub environment: String,
    /// Shared secret required by the sweep endpoint (not a user credential)
    pub sweep_secret_key: String,
    /// Hour-of-day (reference timezone) at which the sweep is allowed to run
    pub sweep_hour: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if it exists (development)
        dotenvy::dotenv().ok();

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| "Invalid SERVER_PORT")?;

        let database_path =
            env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/pairplan.db".to_string());

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let sweep_secret_key = env::var("SWEEP_SECRET_KEY")
            .map_err(|_| "SWEEP_SECRET_KEY must be set for the reminder sweep endpoint")?;

        let sweep_hour = env::var("SWEEP_HOUR")
            .unwrap_or_else(|_| DEFAULT_SWEEP_HOUR.to_string())
            .parse::<u32>()
            .map_err(|_| "Invalid SWEEP_HOUR")?;
        if sweep_hour > 23 {
            return Err("SWEEP_HOUR must be between 0 and 23".to_string());
        }

        Ok(Config {
            server_host,
            server_port,
            database_path,
            allowed_origins,
            environment,
            sweep_secret_key,
            sweep_hour,
        })
    }

    /// Get server address as string
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
