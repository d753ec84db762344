use courier_common::serde_utils::{
  JsonSchemaExample, JsonSchemaExampleMetadata, JsonSchemaExampleWrapperType,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The `persisted_queries` link implements [Automatic Persisted Queries](https://www.apollographql.com/docs/apollo-server/performance/apq/).
///
/// Instead of sending the full GraphQL document, the link first sends only its SHA-256 hash in the `extensions` field:
///
/// `{"extensions": {"persistedQuery": {"version": 1, "sha256Hash": "<hex>"}}}`
///
/// When the server does not know the hash, the request is retried once with both the document and the hash, so the server can store it for the next time.
///
/// When the server reports that it does not support persisted queries at all, the link disables itself and sends full documents for the rest of its lifetime.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, JsonSchema)]
#[schemars(example = "persisted_queries_example_1")]
#[schemars(example = "persisted_queries_example_2")]
pub struct PersistedQueriesLinkConfig {
  /// Send hash-only queries over HTTP `GET`, which makes them cacheable by CDNs and proxies.
  ///
  /// Mutations, subscriptions and ambiguous documents are always sent using `POST`.
  #[serde(default = "use_get_for_hashed_queries_default")]
  pub use_get_for_hashed_queries: bool,
  /// Which failed results are evaluated when deciding whether to disable persisted queries.
  #[serde(default)]
  pub disablement_evaluation: DisablementEvaluation,
}

impl Default for PersistedQueriesLinkConfig {
  fn default() -> Self {
    Self {
      use_get_for_hashed_queries: use_get_for_hashed_queries_default(),
      disablement_evaluation: DisablementEvaluation::default(),
    }
  }
}

fn use_get_for_hashed_queries_default() -> bool {
  true
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq, JsonSchema)]
pub enum DisablementEvaluation {
  /// The disable policy only runs for a failed HTTP response that also carries a GraphQL response body.
  /// A plain GraphQL error (HTTP 200) never disables the link.
  #[serde(rename = "joint_response_and_error")]
  #[schemars(title = "joint_response_and_error")]
  #[default]
  JointResponseAndError,
  /// The disable policy runs for every failed result: GraphQL errors, HTTP errors, or both.
  #[serde(rename = "any_error")]
  #[schemars(title = "any_error")]
  AnyError,
}

fn persisted_queries_example_1() -> JsonSchemaExample<PersistedQueriesLinkConfig> {
  JsonSchemaExample {
    metadata: JsonSchemaExampleMetadata::new("Default", None),
    wrapper: Some(JsonSchemaExampleWrapperType::Link {
      name: "persisted_queries".to_string(),
    }),
    example: PersistedQueriesLinkConfig::default(),
  }
}

fn persisted_queries_example_2() -> JsonSchemaExample<PersistedQueriesLinkConfig> {
  JsonSchemaExample {
    metadata: JsonSchemaExampleMetadata::new(
      "POST only",
      Some("Hash-only queries are sent using POST, and every failed result is evaluated by the disable policy."),
    ),
    wrapper: Some(JsonSchemaExampleWrapperType::Link {
      name: "persisted_queries".to_string(),
    }),
    example: PersistedQueriesLinkConfig {
      use_get_for_hashed_queries: false,
      disablement_evaluation: DisablementEvaluation::AnyError,
    },
  }
}
