pub mod interpolate;

use courier_common::serde_utils::{JsonSchemaExample, JsonSchemaExampleMetadata};
use courier_logger::config::LoggerConfigFormat;
use interpolate::interpolate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs::read_to_string, path::Path};
use tracing::warn;

/// This section describes the top-level configuration object for the courier GraphQL client.
///
/// Courier supports both YAML and JSON format for the configuration file.
///
/// The client sends every operation through the list of `links`, in the order they are declared,
/// and finally to the GraphQL server at `endpoint`.
///
/// ### Configuration Interpolation with Environment Variables
///
/// - Use `${VAR_NAME}` to insert the value of an environment variable. If `VAR_NAME` is not set, loading fails.
/// - Specify a default value with `${VAR_NAME:default_value}`, used when `VAR_NAME` is not set.
/// - Use `$$` to write a literal dollar sign.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[schemars(example = "courier_config_example1")]
pub struct CourierConfig {
  /// The URL of the GraphQL server.
  pub endpoint: String,
  /// Static HTTP headers sent with every request.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub headers: Option<HashMap<String, String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  /// Client logger configuration.
  pub logger: Option<LoggerConfig>,
  /// List of links every operation goes through before it is sent to the server.
  ///
  /// Order of links is important: links are applied in the order they are defined.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub links: Option<Vec<LinkDefinition>>,
}

fn courier_config_example1() -> JsonSchemaExample<CourierConfig> {
  JsonSchemaExample {
    metadata: JsonSchemaExampleMetadata::new(
      "Automatic Persisted Queries",
      Some("This example sends hash-only queries to the server, using HTTP GET for queries."),
    ),
    wrapper: None,
    example: CourierConfig {
      endpoint: "https://my-source.com/graphql".to_string(),
      headers: None,
      logger: None,
      links: Some(vec![LinkDefinition::PersistedQueries {
        enabled: Default::default(),
        config: None,
      }]),
    },
  }
}

fn default_link_enabled() -> Option<bool> {
  Some(true)
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(tag = "type")]
pub enum LinkDefinition {
  #[serde(rename = "persisted_queries")]
  PersistedQueries {
    #[serde(
      default = "default_link_enabled",
      skip_serializing_if = "Option::is_none"
    )]
    enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<persisted_queries_link::Config>,
  },
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct LoggerConfig {
  /// Log filter, using the `EnvFilter` directives syntax, for example: `info,persisted_queries_link=debug`.
  #[serde(default = "default_log_filter")]
  pub filter: String,
  #[serde(default)]
  pub format: LoggerConfigFormat,
  /// Emits a log line with timing information whenever a span is closed.
  #[serde(default)]
  pub print_performance_info: bool,
}

impl Default for LoggerConfig {
  fn default() -> Self {
    Self {
      filter: default_log_filter(),
      format: LoggerConfigFormat::default(),
      print_performance_info: false,
    }
  }
}

fn default_log_filter() -> String {
  "info".to_string()
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
  #[error("failed to read config file \"{path}\": {source}")]
  ReadFailed {
    path: String,
    source: std::io::Error,
  },
  #[error("failed to interpolate config file: {}", .0.join(", "))]
  InterpolationFailed(Vec<String>),
  #[error("failed to parse JSON config file: {0}")]
  InvalidJson(serde_json::Error),
  #[error("failed to parse YAML config file: {0}")]
  InvalidYaml(serde_yaml::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
  Json,
  Yaml,
}

impl ConfigFormat {
  pub fn from_path(path: &Path) -> Self {
    match path.extension().and_then(|ext| ext.to_str()) {
      Some("yaml") | Some("yml") => ConfigFormat::Yaml,
      Some("json") => ConfigFormat::Json,
      other => {
        warn!(
          "unknown config file extension {:?}, assuming JSON format",
          other
        );
        ConfigFormat::Json
      }
    }
  }
}

pub fn load_config(
  file_path: &str,
  get_env_value: impl Fn(&str) -> Option<String>,
) -> Result<CourierConfig, ConfigError> {
  let path = Path::new(file_path);
  let raw_contents = read_to_string(path).map_err(|source| ConfigError::ReadFailed {
    path: file_path.to_string(),
    source,
  })?;

  parse_config_contents(&raw_contents, ConfigFormat::from_path(path), get_env_value)
}

pub fn parse_config_contents(
  contents: &str,
  format: ConfigFormat,
  get_env_value: impl Fn(&str) -> Option<String>,
) -> Result<CourierConfig, ConfigError> {
  let config_string = interpolate(contents, get_env_value).map_err(ConfigError::InterpolationFailed)?;

  match format {
    ConfigFormat::Json => parse_config_from_json(&config_string),
    ConfigFormat::Yaml => parse_config_from_yaml(&config_string),
  }
}

pub fn parse_config_from_yaml(contents: &str) -> Result<CourierConfig, ConfigError> {
  serde_yaml::from_str::<CourierConfig>(contents).map_err(ConfigError::InvalidYaml)
}

pub fn parse_config_from_json(contents: &str) -> Result<CourierConfig, ConfigError> {
  serde_json::from_str::<CourierConfig>(contents).map_err(ConfigError::InvalidJson)
}
