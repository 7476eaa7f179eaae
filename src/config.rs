use std::env;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;
use crate::constants;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("environment variable {name} is not valid unicode")]
    NotUnicode { name: String },
    #[error("environment variable {name} has invalid value '{value}'")]
    InvalidNumber { name: String, value: String },
}

/// Builds the name of a versioned environment variable, e.g. `LUA_PATH` -> `LUA_PATH_5_4`
pub fn versioned_env_name(base: &str) -> String {
    format!("{}{}", base, constants::version_suffix())
}

/// Limits and host settings for a single interpreter instance
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub max_call_depth: usize,
    pub max_resume_depth: usize,
    pub max_host_depth: usize,
    pub module_path: Option<String>,
    pub random_seed: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            max_call_depth: constants::DEFAULT_MAX_CALL_DEPTH,
            max_resume_depth: constants::DEFAULT_MAX_RESUME_DEPTH,
            max_host_depth: constants::DEFAULT_MAX_HOST_DEPTH,
            module_path: None,
            random_seed: None,
        }
    }
}

impl RuntimeConfig {
    /// Reads overrides from the process environment
    ///
    /// Each setting is looked up under its versioned name first and its plain name second
    pub fn from_env() -> Result<RuntimeConfig, ConfigError> {
        RuntimeConfig::from_lookup(|name| env::var(name))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<RuntimeConfig, ConfigError>
        where F: Fn(&str) -> Result<String, env::VarError> {
        let read = |base: &str| -> Result<Option<(String, String)>, ConfigError> {
            for name in [versioned_env_name(base), base.to_string()] {
                match lookup(&name) {
                    Ok(value) => return Ok(Some((name, value))),
                    Err(env::VarError::NotPresent) => continue,
                    Err(env::VarError::NotUnicode(_)) => return Err(ConfigError::NotUnicode { name }),
                }
            }
            Ok(None)
        };

        fn parse<T: FromStr>(entry: Option<(String, String)>, default: T) -> Result<T, ConfigError> {
            match entry {
                None => Ok(default),
                Some((name, value)) => value.trim().parse::<T>().map_err(|_| ConfigError::InvalidNumber { name, value }),
            }
        }

        let defaults = RuntimeConfig::default();
        let config = RuntimeConfig {
            max_call_depth: parse(read("LUA_MAXCALLS")?, defaults.max_call_depth)?,
            max_resume_depth: parse(read("LUA_MAXRESUMES")?, defaults.max_resume_depth)?,
            max_host_depth: parse(read("LUA_MAXCCALLS")?, defaults.max_host_depth)?,
            module_path: read("LUA_PATH")?.map(|(_, value)| value),
            random_seed: match read("LUA_SEED")? {
                None => None,
                entry @ Some(_) => Some(parse(entry, 0u64)?),
            },
        };
        debug!(target: "lua_runtime::config", ?config, "resolved runtime configuration");
        Ok(config)
    }

    /// Module search path, with `;;` expanded to the default path as the original runtime does
    pub fn resolved_module_path(&self) -> String {
        match &self.module_path {
            None => constants::LUA_PATH_DEFAULT.to_string(),
            Some(path) => {
                if path.contains(";;") {
                    path.replacen(";;", &format!(";{};", constants::LUA_PATH_DEFAULT), 1)
                        .trim_matches(';')
                        .to_string()
                } else {
                    path.clone()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Result<String, env::VarError> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned().ok_or(env::VarError::NotPresent)
    }

    #[test]
    fn versioned_name_uses_major_and_minor() {
        assert_eq!(versioned_env_name("LUA_PATH"), "LUA_PATH_5_4");
        assert_eq!(versioned_env_name("LUA_INIT"), "LUA_INIT_5_4");
    }

    #[test]
    fn versioned_variable_takes_precedence() {
        let config = RuntimeConfig::from_lookup(lookup_from(&[
            ("LUA_PATH", "./plain/?.lua"),
            ("LUA_PATH_5_4", "./versioned/?.lua"),
        ])).unwrap();
        assert_eq!(config.module_path.as_deref(), Some("./versioned/?.lua"));
    }

    #[test]
    fn falls_back_to_plain_name() {
        let config = RuntimeConfig::from_lookup(lookup_from(&[("LUA_PATH", "./plain/?.lua"), ("LUA_MAXCALLS", "50"), ("LUA_MAXCCALLS_5_4", "80")])).unwrap();
        assert_eq!(config.module_path.as_deref(), Some("./plain/?.lua"));
        assert_eq!(config.max_call_depth, 50);
        assert_eq!(config.max_resume_depth, constants::DEFAULT_MAX_RESUME_DEPTH);
        assert_eq!(config.max_host_depth, 80);
    }

    #[test]
    fn invalid_number_is_reported() {
        let err = RuntimeConfig::from_lookup(lookup_from(&[("LUA_MAXCALLS_5_4", "lots")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidNumber { name: "LUA_MAXCALLS_5_4".to_string(), value: "lots".to_string() });
    }

    #[test]
    fn double_semicolon_expands_default_path() {
        let config = RuntimeConfig { module_path: Some("./mine/?.lua;;".to_string()), ..RuntimeConfig::default() };
        let path = config.resolved_module_path();
        assert!(path.starts_with("./mine/?.lua;"));
        assert!(path.ends_with(constants::LUA_PATH_DEFAULT));
    }
}
