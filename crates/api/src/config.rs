//! Typed runtime configuration (spec §6 Configuration). Loaded once at
//! startup via the `config` crate the way the teacher's binary reads its
//! pool-tuning knobs from the environment, but collected into one struct
//! instead of scattered `std::env::var` calls.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub redis_url: Option<String>,

    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,

    pub bootstrap_api_key: Option<String>,

    pub session_secret_key: String,

    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    #[serde(default = "default_admin_name")]
    pub admin_name: String,

    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub cors_origins: Vec<String>,
    #[serde(default = "default_cors_methods")]
    pub cors_allow_methods: Vec<String>,

    #[serde(default = "default_true")]
    pub rate_limit_enabled: bool,

    pub git_sync_path: Option<String>,

    #[serde(default)]
    pub auth_disabled: bool,

    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_admin_name() -> String {
    "Administrator".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_cors_methods() -> Vec<String> {
    vec!["GET".into(), "POST".into(), "PATCH".into(), "DELETE".into()]
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Settings {
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Load from environment variables, all upper-cased with a `TESSERA_`
    /// prefix (e.g. `TESSERA_DATABASE_URL`, `TESSERA_CORS_ORIGINS`).
    /// List-valued keys are comma-separated.
    pub fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("TESSERA")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors_origins")
                    .with_list_parse_key("cors_allow_methods")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_detection_matches_environment_string() {
        let mut settings = Settings {
            database_url: "postgres://localhost/tessera".into(),
            redis_url: None,
            webhook_url: None,
            webhook_secret: None,
            bootstrap_api_key: None,
            session_secret_key: "secret".into(),
            admin_email: None,
            admin_password: None,
            admin_name: default_admin_name(),
            environment: default_environment(),
            cors_origins: Vec::new(),
            cors_allow_methods: default_cors_methods(),
            rate_limit_enabled: true,
            git_sync_path: None,
            auth_disabled: false,
            host: default_host(),
            port: default_port(),
        };
        assert!(!settings.is_production());
        settings.environment = "production".into();
        assert!(settings.is_production());
    }
}
