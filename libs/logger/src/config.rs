use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema, PartialEq)]
/// Output format of the client logs.
pub enum LoggerConfigFormat {
  /// Minimal, single-line logs. Cheap to produce and easy to scan, but with little context.
  #[serde(rename = "compact")]
  #[schemars(title = "compact")]
  Compact,

  /// Multi-line, human friendly output including span context and source locations.
  /// Useful while developing against a new GraphQL server.
  #[serde(rename = "pretty")]
  #[schemars(title = "pretty")]
  Pretty,

  /// One JSON object per line, for log aggregators and other tooling.
  #[serde(rename = "json")]
  #[schemars(title = "json")]
  Json,
}

impl Default for LoggerConfigFormat {
  // In development, we wish to see some more details and code locations.
  #[cfg(debug_assertions)]
  fn default() -> Self {
    LoggerConfigFormat::Pretty
  }

  #[cfg(not(debug_assertions))]
  fn default() -> Self {
    if atty::is(atty::Stream::Stdout) {
      LoggerConfigFormat::Compact
    } else {
      LoggerConfigFormat::Json
    }
  }
}
