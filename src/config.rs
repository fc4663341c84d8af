use std::str::FromStr;

use crate::{utils::error::SeedingError, SeedError};

/// Default number of downstream layers a single result change is pushed through.
pub const DEFAULT_MAX_CASCADE_DEPTH: usize = 8;

/// Settings for the propagation engine.
///
/// Loaded from the environment, with a `.env` file honoured in debug builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: Option<String>,
    /// 1 syncs only the groups seeded directly from the changed group.
    pub max_cascade_depth: usize,
    /// Refuse seeding edits that would close a cycle.
    pub reject_cycles: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
            reject_cycles: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, SeedError> {
        #[cfg(debug_assertions)]
        dotenv::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. Unset keys fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SeedError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            database_url: lookup("DATABASE_URL"),
            max_cascade_depth: parse_var(&lookup, "SEEDING_MAX_CASCADE_DEPTH")?
                .unwrap_or(defaults.max_cascade_depth),
            reject_cycles: parse_var(&lookup, "SEEDING_REJECT_CYCLES")?
                .unwrap_or(defaults.reject_cycles),
        })
    }

    pub fn database_url(&self) -> Result<&str, SeedError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| SeedingError::MissingConfig("DATABASE_URL".to_string()).into())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, SeedError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| SeedingError::InvalidConfig(key.to_string(), raw).into()),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{Config, DEFAULT_MAX_CASCADE_DEPTH};

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.max_cascade_depth, DEFAULT_MAX_CASCADE_DEPTH);
        assert!(config.database_url().is_err());
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/seeds"),
            ("SEEDING_MAX_CASCADE_DEPTH", " 1 "),
            ("SEEDING_REJECT_CYCLES", "false"),
        ]))
        .unwrap();
        assert_eq!(config.database_url().unwrap(), "postgres://localhost/seeds");
        assert_eq!(config.max_cascade_depth, 1);
        assert!(!config.reject_cycles);
    }

    #[test]
    fn rejects_garbage() {
        let result = Config::from_lookup(lookup_from(&[("SEEDING_MAX_CASCADE_DEPTH", "deep")]));
        assert!(result.is_err());
    }
}
