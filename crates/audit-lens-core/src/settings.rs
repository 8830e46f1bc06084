use std::collections::HashMap;
use std::time::Duration;

use crate::error::SettingsError;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000/analyze";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_RETRIES: u32 = 0;

/// Connection settings for the remote analysis service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    pub endpoint: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ServiceSettings {
    pub const ENDPOINT_ENV: &'static str = "AUDIT_LENS_ENDPOINT";
    pub const TIMEOUT_ENV: &'static str = "AUDIT_LENS_TIMEOUT";
    pub const RETRIES_ENV: &'static str = "AUDIT_LENS_MAX_RETRIES";

    /// Load settings from environment variables on top of the defaults.
    ///
    /// * `AUDIT_LENS_ENDPOINT`: analysis endpoint URL.
    /// * `AUDIT_LENS_TIMEOUT`: request timeout, e.g. `45s` or `2m`.
    /// * `AUDIT_LENS_MAX_RETRIES`: retries after the first attempt.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_map(std::env::vars().collect())
    }

    fn from_map(vars: HashMap<String, String>) -> Result<Self, SettingsError> {
        let mut settings = Self::default();
        if let Some(endpoint) = vars.get(Self::ENDPOINT_ENV) {
            settings.set_endpoint(Self::ENDPOINT_ENV, endpoint)?;
        }
        if let Some(timeout) = vars.get(Self::TIMEOUT_ENV).filter(|v| !v.trim().is_empty()) {
            settings.set_timeout(Self::TIMEOUT_ENV, timeout)?;
        }
        if let Some(retries) = vars.get(Self::RETRIES_ENV).filter(|v| !v.trim().is_empty()) {
            settings.set_max_retries(Self::RETRIES_ENV, retries)?;
        }
        Ok(settings)
    }

    /// Override the endpoint; `key` names the source in error messages.
    pub fn set_endpoint(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(SettingsError::BlankEndpoint { key: key.into() });
        }
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(SettingsError::InvalidEndpoint {
                key: key.into(),
                value: trimmed.into(),
            });
        }
        self.endpoint = trimmed.to_string();
        Ok(())
    }

    pub fn set_timeout(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let trimmed = value.trim();
        self.timeout = humantime::parse_duration(trimmed)
            .ok()
            .filter(|d| !d.is_zero())
            .ok_or_else(|| SettingsError::InvalidTimeout {
                key: key.into(),
                value: trimmed.into(),
            })?;
        Ok(())
    }

    pub fn set_max_retries(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let trimmed = value.trim();
        self.max_retries = trimmed
            .parse::<u32>()
            .map_err(|_| SettingsError::InvalidRetries {
                key: key.into(),
                value: trimmed.into(),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::env;
    use std::sync::Mutex;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    fn with_env_lock<F: FnOnce()>(func: F) {
        let _guard = ENV_LOCK.lock().unwrap();
        func();
    }

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_to_local_service() {
        with_env_lock(|| {
            env::remove_var(ServiceSettings::ENDPOINT_ENV);
            env::remove_var(ServiceSettings::TIMEOUT_ENV);
            env::remove_var(ServiceSettings::RETRIES_ENV);

            let settings = ServiceSettings::from_env().expect("defaults should load");
            assert_eq!(settings.endpoint, "http://localhost:5000/analyze");
            assert_eq!(settings.timeout, Duration::from_secs(30));
            assert_eq!(settings.max_retries, 0);
        });
    }

    #[test]
    fn reads_overrides_from_environment() {
        with_env_lock(|| {
            env::set_var(ServiceSettings::ENDPOINT_ENV, " https://audit.example.com/analyze ");
            env::set_var(ServiceSettings::TIMEOUT_ENV, "1m 30s");
            env::set_var(ServiceSettings::RETRIES_ENV, "3");

            let settings = ServiceSettings::from_env().expect("overrides should parse");
            assert_eq!(settings.endpoint, "https://audit.example.com/analyze");
            assert_eq!(settings.timeout, Duration::from_secs(90));
            assert_eq!(settings.max_retries, 3);

            env::remove_var(ServiceSettings::ENDPOINT_ENV);
            env::remove_var(ServiceSettings::TIMEOUT_ENV);
            env::remove_var(ServiceSettings::RETRIES_ENV);
        });
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let err = ServiceSettings::from_map(vars(&[(ServiceSettings::ENDPOINT_ENV, "ftp://x")]))
            .expect_err("ftp endpoint should be rejected");
        assert!(err.to_string().contains(ServiceSettings::ENDPOINT_ENV));
    }

    #[test]
    fn rejects_blank_endpoint() {
        let err = ServiceSettings::from_map(vars(&[(ServiceSettings::ENDPOINT_ENV, "  ")]))
            .expect_err("blank endpoint should be rejected");
        assert!(matches!(err, SettingsError::BlankEndpoint { .. }));
    }

    #[test]
    fn rejects_bad_timeout_and_retries() {
        let err = ServiceSettings::from_map(vars(&[(ServiceSettings::TIMEOUT_ENV, "soon")]))
            .expect_err("bad duration");
        assert!(matches!(err, SettingsError::InvalidTimeout { .. }));

        let err = ServiceSettings::from_map(vars(&[(ServiceSettings::TIMEOUT_ENV, "0s")]))
            .expect_err("zero duration");
        assert!(matches!(err, SettingsError::InvalidTimeout { .. }));

        let err = ServiceSettings::from_map(vars(&[(ServiceSettings::RETRIES_ENV, "-1")]))
            .expect_err("negative retries");
        assert!(matches!(err, SettingsError::InvalidRetries { .. }));
    }

    #[test]
    fn blank_optional_values_fall_back_to_defaults() {
        let settings = ServiceSettings::from_map(vars(&[
            (ServiceSettings::TIMEOUT_ENV, ""),
            (ServiceSettings::RETRIES_ENV, " "),
        ]))
        .unwrap();
        assert_eq!(settings, ServiceSettings::default());
    }
}
