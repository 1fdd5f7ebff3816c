//! Oracle configuration and factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use checkride_core::evaluator::RetryPolicy;
use checkride_core::traits::GradingOracle;

use crate::openai::OpenAiOracle;
use crate::stub::RuleOracle;

/// Configuration for the grading oracle.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in
/// logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OracleConfig {
    OpenAi {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    /// Offline rule-based grading; no network, no key.
    Rules,
}

impl std::fmt::Debug for OracleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleConfig::OpenAi {
                api_key: _,
                base_url,
                model,
            } => f
                .debug_struct("OpenAi")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("model", model)
                .finish(),
            OracleConfig::Rules => f.debug_struct("Rules").finish(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        OracleConfig::Rules
    }
}

/// Top-level checkride configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckrideConfig {
    /// Grading oracle to use.
    #[serde(default)]
    pub oracle: OracleConfig,
    /// Examinee profile name stamped onto sessions.
    #[serde(default = "default_profile")]
    pub profile: String,
    /// Probe depth limit for new sessions.
    #[serde(default = "default_max_probes")]
    pub max_probes_per_task: u32,
    /// Repair attempts after a malformed oracle reply.
    #[serde(default = "default_max_repairs")]
    pub max_repairs: u32,
    /// Overall evaluation deadline in seconds.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    /// Directory of TOML question banks.
    #[serde(default = "default_bank_dir")]
    pub bank_dir: PathBuf,
}

fn default_profile() -> String {
    "demo-user".to_string()
}
fn default_max_probes() -> u32 {
    2
}
fn default_max_repairs() -> u32 {
    2
}
fn default_deadline_secs() -> u64 {
    90
}
fn default_bank_dir() -> PathBuf {
    PathBuf::from("./question-banks")
}

impl Default for CheckrideConfig {
    fn default() -> Self {
        Self {
            oracle: OracleConfig::default(),
            profile: default_profile(),
            max_probes_per_task: default_max_probes(),
            max_repairs: default_max_repairs(),
            deadline_secs: default_deadline_secs(),
            bank_dir: default_bank_dir(),
        }
    }
}

impl CheckrideConfig {
    /// The retry policy these settings describe.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_repairs: self.max_repairs,
            deadline: Duration::from_secs(self.deadline_secs),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_oracle_config(config: &OracleConfig) -> OracleConfig {
    match config {
        OracleConfig::OpenAi {
            api_key,
            base_url,
            model,
        } => OracleConfig::OpenAi {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_ref().map(|u| resolve_env_vars(u)),
            model: model.clone(),
        },
        OracleConfig::Rules => OracleConfig::Rules,
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `checkride.toml` in the current directory
/// 2. `~/.config/checkride/config.toml`
///
/// Environment variable override: `CHECKRIDE_OPENAI_KEY`.
pub fn load_config() -> Result<CheckrideConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<CheckrideConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("checkride.toml");
        if local.exists() {
            Some(local)
        } else if let Some(home) = dirs_path() {
            let global = home.join("config.toml");
            if global.exists() {
                Some(global)
            } else {
                None
            }
        } else {
            None
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<CheckrideConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => CheckrideConfig::default(),
    };

    // Env var override: a key in the environment switches to the OpenAI
    // oracle unless one is already configured.
    if let Ok(key) = std::env::var("CHECKRIDE_OPENAI_KEY") {
        match &mut config.oracle {
            OracleConfig::OpenAi { api_key, .. } => *api_key = key,
            OracleConfig::Rules => {
                config.oracle = OracleConfig::OpenAi {
                    api_key: key,
                    base_url: None,
                    model: None,
                };
            }
        }
    }

    config.oracle = resolve_oracle_config(&config.oracle);

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("checkride"))
}

/// Create an oracle instance from its configuration.
pub fn create_oracle(config: &OracleConfig) -> Result<Arc<dyn GradingOracle>> {
    match config {
        OracleConfig::OpenAi {
            api_key,
            base_url,
            model,
        } => {
            anyhow::ensure!(!api_key.is_empty(), "openai oracle requires an api_key");
            Ok(Arc::new(OpenAiOracle::new(
                api_key,
                base_url.clone(),
                model.clone(),
            )))
        }
        OracleConfig::Rules => Ok(Arc::new(RuleOracle)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_CHECKRIDE_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_CHECKRIDE_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_CHECKRIDE_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        std::env::remove_var("_CHECKRIDE_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = CheckrideConfig::default();
        assert!(matches!(config.oracle, OracleConfig::Rules));
        assert_eq!(config.max_probes_per_task, 2);
        assert_eq!(config.max_repairs, 2);
        assert_eq!(config.profile, "demo-user");
    }

    #[test]
    fn parse_oracle_config() {
        let toml_str = r#"
profile = "student-1"
max_probes_per_task = 3

[oracle]
type = "openai"
api_key = "sk-test"
model = "gpt-4.1-mini"
"#;
        let config: CheckrideConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.max_probes_per_task, 3);
        assert!(matches!(config.oracle, OracleConfig::OpenAi { .. }));
        // Unset knobs keep their defaults.
        assert_eq!(config.deadline_secs, 90);
    }

    #[test]
    fn debug_masks_api_key() {
        let config = OracleConfig::OpenAi {
            api_key: "sk-secret".into(),
            base_url: None,
            model: None,
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn retry_policy_from_config() {
        let config = CheckrideConfig {
            max_repairs: 5,
            deadline_secs: 10,
            ..CheckrideConfig::default()
        };
        let policy = config.retry_policy();
        assert_eq!(policy.max_repairs, 5);
        assert_eq!(policy.deadline, Duration::from_secs(10));
    }

    #[test]
    fn create_rules_oracle() {
        let oracle = create_oracle(&OracleConfig::Rules).unwrap();
        assert_eq!(oracle.name(), "rules");
    }

    #[test]
    fn openai_oracle_requires_key() {
        let config = OracleConfig::OpenAi {
            api_key: String::new(),
            base_url: None,
            model: None,
        };
        assert!(create_oracle(&config).is_err());
    }
}
