//! Engine configuration (SPEC_FULL.md §1.1): a `clap`-derived `Cli` plus a
//! `validator`-free `EngineConfig`, shaped after the teacher's `config.rs`
//! (struct + `From<Cli>` conversion + environment-variable override path)
//! but carrying the in-process engine's own knobs instead of HTTP/Bolt
//! server fields that no longer apply.

use std::env;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("parse error for {field}: {value} - {source}")]
    Parse { field: String, value: String, source: Box<dyn std::error::Error + Send + Sync> },
}

/// Runtime knobs for the execution engine. None of these change plan
/// semantics — they bound resource usage (SPEC_FULL.md §5).
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Rows pulled from the root operator per `consume` batch before
    /// yielding control back to the caller.
    pub batch_size: u32,
    /// Hard cap on rows a single query may return; `Session::execute`
    /// truncates past this rather than exhausting memory on a runaway scan.
    pub result_set_cap: u64,
    /// Default wall-clock budget for a query with no explicit timeout.
    pub default_query_timeout_ms: u64,
    /// Worker-pool size for the matrix library's sparse row/column
    /// operations.
    pub worker_pool_size: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { batch_size: 1024, result_set_cap: 1_000_000, default_query_timeout_ms: 30_000, worker_pool_size: 4 }
    }
}

impl EngineConfig {
    /// Build from environment variables, falling back to `Default` for
    /// anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let default = Self::default();
        Ok(Self {
            batch_size: parse_env_var("GRAPHWAVE_BATCH_SIZE", default.batch_size)?,
            result_set_cap: parse_env_var("GRAPHWAVE_RESULT_SET_CAP", default.result_set_cap)?,
            default_query_timeout_ms: parse_env_var("GRAPHWAVE_QUERY_TIMEOUT_MS", default.default_query_timeout_ms)?,
            worker_pool_size: parse_env_var("GRAPHWAVE_WORKER_POOL_SIZE", default.worker_pool_size)?,
        })
    }

    /// Build from parsed CLI arguments, falling back to `Default` for
    /// anything the user didn't pass.
    pub fn from_cli(cli: CliConfig) -> Self {
        Self {
            batch_size: cli.batch_size,
            result_set_cap: cli.result_set_cap,
            default_query_timeout_ms: cli.query_timeout_ms,
            worker_pool_size: cli.worker_pool_size,
        }
    }

    /// CLI values override environment values (CLI wins).
    pub fn merge(&mut self, other: Self) {
        self.batch_size = other.batch_size;
        self.result_set_cap = other.result_set_cap;
        self.default_query_timeout_ms = other.default_query_timeout_ms;
        self.worker_pool_size = other.worker_pool_size;
    }
}

/// Plain data carried out of [`Cli`] (in `main.rs`) before it becomes an
/// [`EngineConfig`]; kept separate so this module doesn't depend on `clap`.
#[derive(Clone, Debug)]
pub struct CliConfig {
    pub batch_size: u32,
    pub result_set_cap: u64,
    pub query_timeout_ms: u64,
    pub worker_pool_size: u32,
}

fn parse_env_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::fmt::Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value.parse().map_err(|e| ConfigError::Parse { field: key.to_string(), value, source: Box::new(e) }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_bounds() {
        let config = EngineConfig::default();
        assert!(config.batch_size > 0);
        assert!(config.result_set_cap > 0);
        assert!(config.worker_pool_size > 0);
    }

    #[test]
    fn from_cli_takes_every_field() {
        let cli = CliConfig { batch_size: 10, result_set_cap: 20, query_timeout_ms: 30, worker_pool_size: 2 };
        let config = EngineConfig::from_cli(cli);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.result_set_cap, 20);
        assert_eq!(config.default_query_timeout_ms, 30);
        assert_eq!(config.worker_pool_size, 2);
    }

    #[test]
    fn merge_prefers_the_other_side() {
        let mut base = EngineConfig::default();
        let override_config =
            EngineConfig { batch_size: 99, result_set_cap: 99, default_query_timeout_ms: 99, worker_pool_size: 99 };
        base.merge(override_config);
        assert_eq!(base.batch_size, 99);
    }
}
