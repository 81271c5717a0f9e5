use craftd_common::{CraftdError, Result};
use craftd_executor::config::DEFAULT_IMAGE_REPO;
use craftd_executor::LifecycleConfig;
use std::str::FromStr;
use std::time::Duration;

/// Process configuration, read from `CRAFTD_*` environment variables.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub lifecycle: LifecycleConfig,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("CRAFTD_JWT_SECRET")
            .filter(|secret| !secret.trim().is_empty())
            .ok_or_else(|| CraftdError::Config("CRAFTD_JWT_SECRET must be set".to_string()))?;

        let defaults = LifecycleConfig::default();
        let lifecycle = LifecycleConfig {
            image_repo: lookup("CRAFTD_IMAGE_REPO")
                .filter(|repo| !repo.is_empty())
                .unwrap_or_else(|| DEFAULT_IMAGE_REPO.to_string()),
            log_poll_interval: Duration::from_millis(parse_var(
                &lookup,
                "CRAFTD_LOG_POLL_INTERVAL_MS",
                defaults.log_poll_interval.as_millis() as u64,
            )?),
            log_tail_lines: parse_var(&lookup, "CRAFTD_LOG_TAIL_LINES", defaults.log_tail_lines)?,
            handshake_timeout_secs: parse_var(
                &lookup,
                "CRAFTD_HANDSHAKE_TIMEOUT_SECS",
                defaults.handshake_timeout_secs,
            )?,
            autopause: parse_flag(&lookup, "CRAFTD_AUTOPAUSE", defaults.autopause)?,
            command_history: parse_var(
                &lookup,
                "CRAFTD_COMMAND_HISTORY",
                defaults.command_history,
            )?,
        };

        if lifecycle.log_poll_interval.is_zero() {
            return Err(CraftdError::Config(
                "CRAFTD_LOG_POLL_INTERVAL_MS must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            host: lookup("CRAFTD_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_var(&lookup, "CRAFTD_PORT", 3000)?,
            jwt_secret,
            lifecycle,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| CraftdError::Config(format!("{key}: {e}"))),
        None => Ok(default),
    }
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> Result<bool> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(CraftdError::Config(format!(
            "{key}: expected a boolean, got '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            GatewayConfig::from_lookup(lookup(&[("CRAFTD_JWT_SECRET", "s3cret")])).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert_eq!(config.lifecycle, LifecycleConfig::default());
    }

    #[test]
    fn test_missing_secret_is_config_error() {
        for vars in [&[][..], &[("CRAFTD_JWT_SECRET", "  ")][..]] {
            assert!(matches!(
                GatewayConfig::from_lookup(lookup(vars)),
                Err(CraftdError::Config(_))
            ));
        }
    }

    #[test]
    fn test_overrides() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("CRAFTD_JWT_SECRET", "s3cret"),
            ("CRAFTD_PORT", "8080"),
            ("CRAFTD_LOG_POLL_INTERVAL_MS", "250"),
            ("CRAFTD_AUTOPAUSE", "TRUE"),
            ("CRAFTD_IMAGE_REPO", "registry.local/mc"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.lifecycle.log_poll_interval, Duration::from_millis(250));
        assert!(config.lifecycle.autopause);
        assert_eq!(config.lifecycle.image_repo, "registry.local/mc");
    }

    #[test]
    fn test_unparseable_value_names_variable() {
        let err = GatewayConfig::from_lookup(lookup(&[
            ("CRAFTD_JWT_SECRET", "s3cret"),
            ("CRAFTD_LOG_TAIL_LINES", "lots"),
        ]))
        .unwrap_err();

        assert!(err.to_string().contains("CRAFTD_LOG_TAIL_LINES"));
    }
}
