//! Top-level configuration.
//!
//! Every knob has a default that matches production behaviour. Values can be
//! overridden in code with the `with_*` methods or from `GATEHOUSE_*`
//! environment variables via [`GatehouseConfig::from_env`].
//!
//! | Variable                             | Default  |
//! | ------------------------------------ | -------- |
//! | `GATEHOUSE_MAX_LOGIN_ATTEMPTS`       | 5        |
//! | `GATEHOUSE_LOCKOUT_SECONDS`          | 900      |
//! | `GATEHOUSE_SESSION_TIMEOUT_SECONDS`  | 3600     |
//! | `GATEHOUSE_REMEMBER_ME_DAYS`         | 30       |
//! | `GATEHOUSE_PASSWORD_MEMORY_KIB`      | 19456    |
//! | `GATEHOUSE_PASSWORD_TIME_COST`       | 2        |
//! | `GATEHOUSE_CLEANUP_INTERVAL_SECONDS` | 3600     |

use std::str::FromStr;

use chrono::Duration;
use gatehouse_core::{
    AuthConfig, LoginThrottleConfig, PasswordConfig, RememberMeConfig, SessionConfig,
};

use crate::builder::GatehouseBuilderError;

#[derive(Debug, Clone)]
pub struct GatehouseConfig {
    pub login_throttle: LoginThrottleConfig,
    pub session: SessionConfig,
    pub remember_me: RememberMeConfig,
    pub password: PasswordConfig,
    /// How often the maintenance task sweeps expired state.
    pub cleanup_interval: std::time::Duration,
}

impl Default for GatehouseConfig {
    fn default() -> Self {
        Self {
            login_throttle: LoginThrottleConfig::default(),
            session: SessionConfig::default(),
            remember_me: RememberMeConfig::default(),
            password: PasswordConfig::default(),
            cleanup_interval: std::time::Duration::from_secs(3600),
        }
    }
}

impl GatehouseConfig {
    pub fn with_login_throttle(mut self, config: LoginThrottleConfig) -> Self {
        self.login_throttle = config;
        self
    }

    pub fn with_session_timeout(mut self, idle_timeout: Duration) -> Self {
        self.session = self.session.with_idle_timeout(idle_timeout);
        self
    }

    pub fn with_remember_me_lifetime(mut self, lifetime: Duration) -> Self {
        self.remember_me = self.remember_me.with_lifetime(lifetime);
        self
    }

    pub fn with_password(mut self, config: PasswordConfig) -> Self {
        self.password = config;
        self
    }

    pub fn with_cleanup_interval(mut self, interval: std::time::Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Defaults overridden by any `GATEHOUSE_*` variables that are set.
    pub fn from_env() -> Result<Self, GatehouseBuilderError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GatehouseBuilderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(max) = parse::<u32, _>(&lookup, "GATEHOUSE_MAX_LOGIN_ATTEMPTS")? {
            if max == 0 {
                return Err(GatehouseBuilderError::InvalidConfiguration(
                    "GATEHOUSE_MAX_LOGIN_ATTEMPTS must be at least 1".to_string(),
                ));
            }
            config.login_throttle = config.login_throttle.with_max_failed_attempts(max);
        }
        if let Some(secs) = parse::<i64, _>(&lookup, "GATEHOUSE_LOCKOUT_SECONDS")? {
            config.login_throttle = config
                .login_throttle
                .with_lockout_window(Duration::seconds(secs));
        }
        if let Some(secs) = parse::<i64, _>(&lookup, "GATEHOUSE_SESSION_TIMEOUT_SECONDS")? {
            config.session = config.session.with_idle_timeout(Duration::seconds(secs));
        }
        if let Some(days) = parse::<i64, _>(&lookup, "GATEHOUSE_REMEMBER_ME_DAYS")? {
            config.remember_me = config.remember_me.with_lifetime(Duration::days(days));
        }
        if let Some(kib) = parse::<u32, _>(&lookup, "GATEHOUSE_PASSWORD_MEMORY_KIB")? {
            config.password = config.password.with_memory_cost_kib(kib);
        }
        if let Some(cost) = parse::<u32, _>(&lookup, "GATEHOUSE_PASSWORD_TIME_COST")? {
            config.password = config.password.with_time_cost(cost);
        }
        if let Some(secs) = parse::<u64, _>(&lookup, "GATEHOUSE_CLEANUP_INTERVAL_SECONDS")? {
            config.cleanup_interval = std::time::Duration::from_secs(secs.max(1));
        }

        Ok(config)
    }

    pub(crate) fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            login_throttle: self.login_throttle.clone(),
            session: self.session.clone(),
            remember_me: self.remember_me.clone(),
            password: self.password.clone(),
        }
    }
}

fn parse<T, F>(lookup: &F, key: &str) -> Result<Option<T>, GatehouseBuilderError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            GatehouseBuilderError::InvalidConfiguration(format!("{key} has invalid value {raw:?}"))
        }),
    }
}
