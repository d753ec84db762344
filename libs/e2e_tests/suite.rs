use courier_common::{
  graphql::parse_graphql_operation,
  link::{LinkResult, Operation},
};
use courier_config::{CourierConfig, LinkDefinition};
use courier_engine::chain::LinkChain;
use httpmock::MockServer;
use persisted_queries_link::{QueryHashGenerator, Sha256QueryHashGenerator};

pub const GRAPHQL_PATH: &str = "/graphql";

pub struct TestSuite {
  pub links: Option<Vec<LinkDefinition>>,
  pub mock_server: MockServer,
}

impl Default for TestSuite {
  fn default() -> Self {
    Self {
      links: None,
      mock_server: MockServer::start(),
    }
  }
}

impl TestSuite {
  pub fn with_persisted_queries(config: persisted_queries_link::Config) -> Self {
    Self {
      links: Some(vec![LinkDefinition::PersistedQueries {
        enabled: Some(true),
        config: Some(config),
      }]),
      ..Default::default()
    }
  }

  /// A chain sending to the mock server. Links keep their state for as long as the chain lives.
  pub fn chain(&self) -> LinkChain {
    let config = CourierConfig {
      endpoint: self.mock_server.url(GRAPHQL_PATH),
      headers: None,
      logger: None,
      links: self.links.clone(),
    };

    LinkChain::from_config(&config).expect("failed to build link chain")
  }

  pub async fn execute(chain: &LinkChain, operation: Operation) -> LinkResult {
    chain
      .execute_once(operation)
      .await
      .expect("chain completed without a result")
  }
}

pub fn sha256_of(source: &str) -> String {
  let document = parse_graphql_operation(source).expect("invalid test document");

  Sha256QueryHashGenerator
    .generate(&document)
    .expect("failed to hash test document")
}

pub fn data_response() -> String {
  serde_json::json!({ "data": { "user": { "id": "1" } } }).to_string()
}

pub fn error_response(message: &str) -> String {
  serde_json::json!({ "errors": [{ "message": message }] }).to_string()
}
