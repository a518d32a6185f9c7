//! API configuration.

use std::time::Duration;

/// Hourly admission budgets per caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionConfig {
    /// Rolling window length
    pub window: Duration,
    /// Full pipeline runs per window
    pub budget: usize,
    /// Analyze-only / prompt-only runs per window
    pub debug_budget: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(3600),
            budget: 3,
            debug_budget: 5,
        }
    }
}

impl AdmissionConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            window: std::env::var("RATE_LIMIT_WINDOW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|v: &u64| *v > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.window),
            budget: std::env::var("RATE_LIMIT_BUDGET")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.budget),
            debug_budget: std::env::var("DEBUG_RATE_LIMIT_BUDGET")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.debug_budget),
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Burst limit, requests per second per IP
    pub rate_limit_rps: u32,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Expose `/metrics`
    pub metrics_enabled: bool,
    pub admission: AdmissionConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: [
                "http://localhost:3000",
                "http://localhost:3001",
                "http://localhost:3005",
                "http://localhost:5173",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            rate_limit_rps: 10,
            max_body_size: 200 * 1024 * 1024, // 200MB
            environment: "development".to_string(),
            metrics_enabled: true,
            admission: AdmissionConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rate_limit_rps),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
            admission: AdmissionConfig::from_env(),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.cors_origins.len(), 4);
        assert_eq!(config.admission.budget, 3);
        assert_eq!(config.admission.debug_budget, 5);
        assert_eq!(config.admission.window, Duration::from_secs(3600));
        assert!(!config.is_production());
    }
}
