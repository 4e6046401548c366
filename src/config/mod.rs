// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Global configuration
//!
//! Pipeline-wide settings read from `config.yaml`, an optional
//! `config_<env>.yaml` overlay and `KAFLOW_*` environment variables.
//! Handlers only ever see this read-only.

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::errors::{KaflowError, KaflowResult};

/// Prefix of environment variables overriding configuration keys
pub const ENV_PREFIX: &str = "KAFLOW_";

/// Default config file name
pub const CONFIG_FILE: &str = "config.yaml";

/// Global kaflow configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KaflowConfig {
    /// Base directory of all pipelines, used to derive pipeline names
    pub pipeline_base_dir: PathBuf,

    /// Directory holding the global defaults files
    pub defaults_path: PathBuf,

    /// File name prefix of defaults files (`defaults.yaml`, `defaults_dev.yaml`)
    pub defaults_filename_prefix: String,

    /// Prefix prepended to every component name
    pub pipeline_prefix: String,

    /// Templates for generated topic names
    pub topic_name_config: TopicNameConfig,

    /// Comma separated bootstrap servers
    pub kafka_brokers: String,

    pub schema_registry: SchemaRegistryConfig,

    pub kafka_rest: KafkaRestConfig,

    pub kafka_connect: KafkaConnectConfig,

    /// Timeout in seconds for a single external operation
    pub timeout: u64,

    /// Create the namespace on helm installs if it does not exist
    pub create_namespace: bool,

    pub helm_config: HelmConfig,

    pub helm_diff_config: HelmDiffConfig,

    /// Keep finished cleanup jobs installed
    pub retain_clean_jobs: bool,
}

impl Default for KaflowConfig {
    fn default() -> Self {
        Self {
            pipeline_base_dir: PathBuf::from("."),
            defaults_path: PathBuf::from("."),
            defaults_filename_prefix: "defaults".to_string(),
            pipeline_prefix: "${pipeline_name}-".to_string(),
            topic_name_config: TopicNameConfig::default(),
            kafka_brokers: String::new(),
            schema_registry: SchemaRegistryConfig::default(),
            kafka_rest: KafkaRestConfig::default(),
            kafka_connect: KafkaConnectConfig::default(),
            timeout: 300,
            create_namespace: false,
            helm_config: HelmConfig::default(),
            helm_diff_config: HelmDiffConfig::default(),
            retain_clean_jobs: false,
        }
    }
}

/// Topic naming templates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicNameConfig {
    pub default_output_topic_name: String,
    pub default_error_topic_name: String,
}

impl Default for TopicNameConfig {
    fn default() -> Self {
        Self {
            default_output_topic_name: "${pipeline_name}-${component_name}".to_string(),
            default_error_topic_name: "${pipeline_name}-${component_name}-error".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaRegistryConfig {
    pub enabled: bool,
    pub url: String,
    /// Request timeout in seconds
    pub timeout: u64,
}

impl Default for SchemaRegistryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "http://localhost:8081".to_string(),
            timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaRestConfig {
    pub url: String,
    pub timeout: u64,
}

impl Default for KafkaRestConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8082".to_string(),
            timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConnectConfig {
    pub url: String,
    pub timeout: u64,
}

impl Default for KafkaConnectConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8083".to_string(),
            timeout: 30,
        }
    }
}

/// Global helm flags
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HelmConfig {
    /// Kubernetes context passed as `--kube-context`
    pub context: Option<String>,
    /// Run helm with `--debug`
    pub debug: bool,
    /// Kubernetes API version used by `helm template`
    pub api_version: Option<String>,
}

/// Key paths ignored when diffing rendered manifests
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HelmDiffConfig {
    pub ignore: Vec<Vec<String>>,
}

impl KaflowConfig {
    /// Load configuration from a file or directory
    ///
    /// `path` may point at a config file or at a directory containing
    /// `config.yaml`. A missing file falls back to the defaults. When an
    /// environment is given, `config_<env>.yaml` next to the base file is
    /// layered on top. `KAFLOW_*` environment variables come last, `__`
    /// separating nested keys.
    pub fn load(path: Option<&Path>, environment: Option<&str>) -> KaflowResult<Self> {
        let base_file = match path {
            Some(p) if p.is_dir() => p.join(CONFIG_FILE),
            Some(p) => p.to_path_buf(),
            None => PathBuf::from(CONFIG_FILE),
        };

        if path.is_some() && !base_file.exists() {
            tracing::warn!(
                "Config file {} not found, using defaults",
                base_file.display()
            );
        }

        let mut figment = Figment::from(Serialized::defaults(KaflowConfig::default()))
            .merge(Yaml::file(&base_file));
        if let Some(env_name) = environment {
            figment = figment.merge(Yaml::file(environment_file(&base_file, env_name)));
        }

        // These select files and are not config keys
        let env = Env::prefixed(ENV_PREFIX)
            .ignore(&["ENVIRONMENT", "CONFIG", "DEFAULT_PATH"])
            .split("__");

        let config: KaflowConfig = figment
            .merge(env)
            .extract()
            .map_err(|e| KaflowError::Config {
                reason: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Check required settings
    pub fn validate(&self) -> KaflowResult<()> {
        if self.kafka_brokers.trim().is_empty() {
            return Err(KaflowError::Config {
                reason: format!(
                    "kafka_brokers is required (set it in {} or via {}KAFKA_BROKERS)",
                    CONFIG_FILE, ENV_PREFIX
                ),
            });
        }

        if self.timeout == 0 {
            return Err(KaflowError::Config {
                reason: "timeout must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Flatten the configuration into `config.*` substitution variables
    pub fn substitution_vars(&self) -> Vec<(String, String)> {
        let mut vars = Vec::new();
        if let Ok(value) = serde_json::to_value(self) {
            flatten_into("config", &value, &mut vars);
        }
        vars
    }
}

/// `config.yaml` → `config_<env>.yaml`
fn environment_file(base: &Path, environment: &str) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "config".to_string());
    let ext = base
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_else(|| "yaml".to_string());

    base.with_file_name(format!("{}_{}.{}", stem, environment, ext))
}

fn flatten_into(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                flatten_into(&format!("{}.{}", prefix, key), inner, out);
            }
        }
        Value::String(s) => out.push((prefix.to_string(), s.clone())),
        Value::Bool(_) | Value::Number(_) => out.push((prefix.to_string(), value.to_string())),
        Value::Null | Value::Array(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn load(environment: Option<&str>) -> Result<KaflowConfig, String> {
        KaflowConfig::load(Some(Path::new(".")), environment).map_err(|e| e.to_string())
    }

    #[test]
    fn test_defaults_require_brokers() {
        Jail::expect_with(|jail| {
            let err = KaflowConfig::load(Some(jail.directory()), None).unwrap_err();
            assert!(matches!(err, KaflowError::Config { .. }));
            Ok(())
        });
    }

    #[test]
    fn test_load_from_directory() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                "kafka_brokers: broker:9092\nschema_registry:\n  enabled: true\n",
            )?;

            let config = load(None)?;
            assert_eq!(config.kafka_brokers, "broker:9092");
            assert!(config.schema_registry.enabled);
            assert_eq!(config.schema_registry.url, "http://localhost:8081");
            assert_eq!(config.defaults_filename_prefix, "defaults");
            Ok(())
        });
    }

    #[test]
    fn test_environment_file_overlays_base() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "kafka_brokers: base:9092\ntimeout: 10\n")?;
            jail.create_file("config_dev.yaml", "kafka_brokers: dev:9092\n")?;

            let config = load(Some("dev"))?;
            assert_eq!(config.kafka_brokers, "dev:9092");
            assert_eq!(config.timeout, 10);

            let config = load(None)?;
            assert_eq!(config.kafka_brokers, "base:9092");
            Ok(())
        });
    }

    #[test]
    fn test_env_vars_override_files() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                "kafka_brokers: file:9092\nkafka_connect:\n  url: http://connect:8083\n",
            )?;
            jail.set_env("KAFLOW_KAFKA_BROKERS", "env:9092");
            jail.set_env("KAFLOW_SCHEMA_REGISTRY__ENABLED", "true");
            jail.set_env("KAFLOW_KAFKA_CONNECT__TIMEOUT", "5");
            jail.set_env("KAFLOW_ENVIRONMENT", "prod");
            jail.set_env("UNRELATED", "x");

            let config = load(None)?;
            assert_eq!(config.kafka_brokers, "env:9092");
            assert!(config.schema_registry.enabled);
            assert_eq!(config.kafka_connect.timeout, 5);
            assert_eq!(config.kafka_connect.url, "http://connect:8083");
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|jail| {
            jail.set_env("KAFLOW_KAFKA_BROKERS", "broker:9092");

            let config = KaflowConfig::load(Some(Path::new("absent.yaml")), Some("dev"))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.timeout, 300);
            assert_eq!(config.pipeline_prefix, "${pipeline_name}-");
            Ok(())
        });
    }

    #[test]
    fn test_substitution_vars_are_flattened() {
        let config = KaflowConfig {
            kafka_brokers: "broker:9092".into(),
            ..Default::default()
        };

        let vars = config.substitution_vars();
        assert!(vars.contains(&("config.kafka_brokers".to_string(), "broker:9092".to_string())));
        assert!(vars.contains(&(
            "config.schema_registry.url".to_string(),
            "http://localhost:8081".to_string()
        )));
        assert!(vars.contains(&("config.timeout".to_string(), "300".to_string())));
    }
}
