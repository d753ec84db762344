use serde::Serialize;

/// Wraps a configuration value so it can be attached to a JSONSchema as a documented example.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSchemaExample<T: Serialize> {
  #[serde(rename = "$metadata")]
  pub metadata: Option<JsonSchemaExampleMetadata>,
  #[serde(flatten)]
  pub example: T,
  #[serde(rename = "$wrapper")]
  pub wrapper: Option<JsonSchemaExampleWrapperType>,
}

#[derive(Debug, Clone, Serialize)]
pub enum JsonSchemaExampleWrapperType {
  #[serde(rename = "link")]
  Link { name: String },
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct JsonSchemaExampleMetadata {
  pub title: Option<String>,
  pub description: Option<String>,
}

impl JsonSchemaExampleMetadata {
  pub fn new(title: &str, description: Option<&str>) -> Option<Self> {
    Some(Self {
      title: Some(title.to_string()),
      description: description.map(|s| s.to_string()),
    })
  }
}
