//! Tunables consumed by the core services.
//!
//! Each service owns one config struct; the `gatehouse` crate aggregates them
//! and reads overrides from the environment.

use chrono::Duration;

/// Fixed-window login throttling.
#[derive(Debug, Clone)]
pub struct LoginThrottleConfig {
    /// Consecutive failures that lock the session out.
    pub max_failed_attempts: u32,
    /// Cooldown measured from the most recent failure.
    pub lockout_window: Duration,
    /// When false, admission is always granted and nothing is recorded.
    pub enabled: bool,
}

impl Default for LoginThrottleConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lockout_window: Duration::seconds(900),
            enabled: true,
        }
    }
}

impl LoginThrottleConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_max_failed_attempts(mut self, max_failed_attempts: u32) -> Self {
        self.max_failed_attempts = max_failed_attempts;
        self
    }

    pub fn with_lockout_window(mut self, lockout_window: Duration) -> Self {
        self.lockout_window = lockout_window;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sliding idle timeout measured from the last activity.
    pub idle_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::seconds(3600),
        }
    }
}

impl SessionConfig {
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RememberMeConfig {
    /// Fixed validity from issuance; resolving a token never extends it.
    pub lifetime: Duration,
}

impl Default for RememberMeConfig {
    fn default() -> Self {
        Self {
            lifetime: Duration::days(30),
        }
    }
}

impl RememberMeConfig {
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }
}

/// Argon2id parameters.
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    /// Memory cost in KiB.
    pub memory_cost_kib: u32,
    /// Number of passes.
    pub time_cost: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost_kib: argon2::Params::DEFAULT_M_COST,
            time_cost: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

impl PasswordConfig {
    /// Smallest parameters argon2 accepts. Only for tests.
    pub fn low_cost() -> Self {
        Self {
            memory_cost_kib: argon2::Params::MIN_M_COST,
            time_cost: argon2::Params::MIN_T_COST,
            parallelism: argon2::Params::MIN_P_COST,
        }
    }

    pub fn with_memory_cost_kib(mut self, memory_cost_kib: u32) -> Self {
        self.memory_cost_kib = memory_cost_kib;
        self
    }

    pub fn with_time_cost(mut self, time_cost: u32) -> Self {
        self.time_cost = time_cost;
        self
    }
}

/// Everything [`AuthenticationService`](crate::services::AuthenticationService) needs.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub login_throttle: LoginThrottleConfig,
    pub session: SessionConfig,
    pub remember_me: RememberMeConfig,
    pub password: PasswordConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let throttle = LoginThrottleConfig::default();
        assert_eq!(throttle.max_failed_attempts, 5);
        assert_eq!(throttle.lockout_window, Duration::seconds(900));
        assert!(throttle.enabled);

        assert_eq!(SessionConfig::default().idle_timeout, Duration::hours(1));
        assert_eq!(RememberMeConfig::default().lifetime, Duration::days(30));
        let password = PasswordConfig::default();
        assert_eq!(password.memory_cost_kib, 19 * 1024);
        assert_eq!(password.time_cost, 2);
        assert_eq!(password.parallelism, 1);
    }

    #[test]
    fn test_disabled_throttle_keeps_limits() {
        let config = LoginThrottleConfig::disabled().with_max_failed_attempts(3);
        assert!(!config.enabled);
        assert_eq!(config.max_failed_attempts, 3);
    }
}
