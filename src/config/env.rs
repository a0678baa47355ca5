//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

use super::RunnerConfig;

/// Environment variable prefix
const ENV_PREFIX: &str = "FITNESSE_RUNNER";

/// Overrides read from `FITNESSE_RUNNER_*` variables
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnvConfig {
    /// Config file from FITNESSE_RUNNER_CONFIG
    pub config_file: Option<String>,
    pub pool_wait_timeout_secs: Option<u64>,
    pub discovery_retries: Option<u32>,
    pub discovery_min_timeout_ms: Option<u64>,
    pub discovery_max_timeout_ms: Option<u64>,
    pub test_retries: Option<u32>,
    pub test_min_timeout_ms: Option<u64>,
    pub test_max_timeout_ms: Option<u64>,
    pub failed_test_retries: Option<u32>,
    pub failed_test_retry_timeout_ms: Option<u64>,
    pub http_timeout_secs: Option<u64>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            config_file: get_env("CONFIG"),
            pool_wait_timeout_secs: get_env_parse("POOL_WAIT_TIMEOUT_SECS"),
            discovery_retries: get_env_parse("DISCOVERY_RETRIES"),
            discovery_min_timeout_ms: get_env_parse("DISCOVERY_MIN_TIMEOUT_MS"),
            discovery_max_timeout_ms: get_env_parse("DISCOVERY_MAX_TIMEOUT_MS"),
            test_retries: get_env_parse("TEST_RETRIES"),
            test_min_timeout_ms: get_env_parse("TEST_MIN_TIMEOUT_MS"),
            test_max_timeout_ms: get_env_parse("TEST_MAX_TIMEOUT_MS"),
            failed_test_retries: get_env_parse("FAILED_TEST_RETRIES"),
            failed_test_retry_timeout_ms: get_env_parse("FAILED_TEST_RETRY_TIMEOUT_MS"),
            http_timeout_secs: get_env_parse("HTTP_TIMEOUT_SECS"),
        }
    }

    /// Check if any override is set
    pub fn has_any(&self) -> bool {
        *self != Self::default()
    }

    /// Overlay every set variable onto `config`
    pub fn apply_to(&self, config: &mut RunnerConfig) {
        fn set<T: Copy>(target: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *target = value;
            }
        }

        set(&mut config.pool_wait_timeout_secs, self.pool_wait_timeout_secs);
        set(&mut config.discovery_retry.retries, self.discovery_retries);
        set(
            &mut config.discovery_retry.min_timeout_ms,
            self.discovery_min_timeout_ms,
        );
        set(
            &mut config.discovery_retry.max_timeout_ms,
            self.discovery_max_timeout_ms,
        );
        set(&mut config.test_retry.retries, self.test_retries);
        set(&mut config.test_retry.min_timeout_ms, self.test_min_timeout_ms);
        set(&mut config.test_retry.max_timeout_ms, self.test_max_timeout_ms);
        set(&mut config.failed_test_retries, self.failed_test_retries);
        set(
            &mut config.failed_test_retry_timeout_ms,
            self.failed_test_retry_timeout_ms,
        );
        set(&mut config.http_timeout_secs, self.http_timeout_secs);
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {ENV_PREFIX}_CONFIG:                       {:?}", self.config_file);
        println!("  {ENV_PREFIX}_POOL_WAIT_TIMEOUT_SECS:       {:?}", self.pool_wait_timeout_secs);
        println!("  {ENV_PREFIX}_DISCOVERY_RETRIES:            {:?}", self.discovery_retries);
        println!("  {ENV_PREFIX}_DISCOVERY_MIN_TIMEOUT_MS:     {:?}", self.discovery_min_timeout_ms);
        println!("  {ENV_PREFIX}_DISCOVERY_MAX_TIMEOUT_MS:     {:?}", self.discovery_max_timeout_ms);
        println!("  {ENV_PREFIX}_TEST_RETRIES:                 {:?}", self.test_retries);
        println!("  {ENV_PREFIX}_TEST_MIN_TIMEOUT_MS:          {:?}", self.test_min_timeout_ms);
        println!("  {ENV_PREFIX}_TEST_MAX_TIMEOUT_MS:          {:?}", self.test_max_timeout_ms);
        println!("  {ENV_PREFIX}_FAILED_TEST_RETRIES:          {:?}", self.failed_test_retries);
        println!("  {ENV_PREFIX}_FAILED_TEST_RETRY_TIMEOUT_MS: {:?}", self.failed_test_retry_timeout_ms);
        println!("  {ENV_PREFIX}_HTTP_TIMEOUT_SECS:            {:?}", self.http_timeout_secs);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = get_env(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {}_{}={:?}: not a valid number", ENV_PREFIX, name, raw);
            None
        }
    }
}

/// Print all FITNESSE_RUNNER environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_CONFIG                        Path to configuration file");
    println!("  {ENV_PREFIX}_POOL_WAIT_TIMEOUT_SECS        Wait for a free executor (default 600)");
    println!("  {ENV_PREFIX}_DISCOVERY_RETRIES             Suite listing retries (default 5)");
    println!("  {ENV_PREFIX}_DISCOVERY_MIN_TIMEOUT_MS      Suite listing first backoff (default 5000)");
    println!("  {ENV_PREFIX}_DISCOVERY_MAX_TIMEOUT_MS      Suite listing backoff cap (default 10000)");
    println!("  {ENV_PREFIX}_TEST_RETRIES                  Page request retries (default 5)");
    println!("  {ENV_PREFIX}_TEST_MIN_TIMEOUT_MS           Page request first backoff (default 10000)");
    println!("  {ENV_PREFIX}_TEST_MAX_TIMEOUT_MS           Page request backoff cap (default 30000)");
    println!("  {ENV_PREFIX}_FAILED_TEST_RETRIES           Reruns of a failing page (default 3)");
    println!("  {ENV_PREFIX}_FAILED_TEST_RETRY_TIMEOUT_MS  Pause before a rerun (default 5000)");
    println!("  {ENV_PREFIX}_HTTP_TIMEOUT_SECS             HTTP request timeout (default 1800)");
    println!("  RUST_LOG                                      Log filter (e.g. fitnesse_runner=debug)");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_FAILED_TEST_RETRIES=1");
    println!("  fitnesse-runner run -t 'fitnesse-{{0}}:8080' -c 4 -s FrontPage.SuiteAcceptance");
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sets variables for the lifetime of the guard
    struct EnvGuard {
        previous: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn set(vars: &[(&str, &str)]) -> Self {
            let previous = vars
                .iter()
                .map(|(name, value)| {
                    let key = format!("{ENV_PREFIX}_{name}");
                    let previous = env::var(&key).ok();
                    env::set_var(&key, value);
                    (key, previous)
                })
                .collect();
            Self { previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in &self.previous {
                match value {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }
    }

    #[test]
    fn test_env_config_default() {
        let config = EnvConfig::default();
        assert!(!config.has_any());

        let mut runner = RunnerConfig::default();
        config.apply_to(&mut runner);
        assert_eq!(runner, RunnerConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let _guard = EnvGuard::set(&[
            ("DISCOVERY_RETRIES", "2"),
            ("TEST_MAX_TIMEOUT_MS", "45000"),
            ("FAILED_TEST_RETRY_TIMEOUT_MS", "100"),
        ]);

        let env = EnvConfig::load();
        assert_eq!(env.discovery_retries, Some(2));
        assert!(env.has_any());

        let mut config = RunnerConfig::default();
        env.apply_to(&mut config);
        assert_eq!(config.discovery_retry.retries, 2);
        assert_eq!(config.discovery_retry.min_timeout_ms, 5_000);
        assert_eq!(config.test_retry.max_timeout_ms, 45_000);
        assert_eq!(config.failed_test_retry_timeout_ms, 100);
    }

    #[test]
    fn test_invalid_number_is_ignored() {
        let _guard = EnvGuard::set(&[("HTTP_TIMEOUT_SECS", "soon")]);
        assert_eq!(EnvConfig::load().http_timeout_secs, None);
    }
}
