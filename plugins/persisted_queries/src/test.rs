#[cfg(test)]
pub mod persisted_queries_link {
  use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
  };

  use courier_common::{
    graphql::{GraphQLRequest, GraphQLResponse, ParsedGraphQLDocument},
    http::{Method, StatusCode},
    link::{
      Link as _, LinkError, LinkResult, NextLink, Operation, PERSISTED_QUERY_EXTENSION_KEY,
    },
  };
  use futures::{stream, StreamExt};
  use serde_json::json;

  use crate::{
    Config, DisablementEvaluation, Link, PersistedQueriesLinkError, QueryHashGenerator,
    Sha256QueryHashGenerator, PERSISTED_QUERY_NOT_FOUND, PERSISTED_QUERY_NOT_SUPPORTED,
  };

  static GET_USER: &str = "query GetUser { user { id name } }";

  struct DropRecorder {
    events: Arc<Mutex<Vec<String>>>,
    label: String,
  }

  impl Drop for DropRecorder {
    fn drop(&mut self) {
      self.events.lock().unwrap().push(self.label.clone());
    }
  }

  /// Stands in for the rest of the chain: hands out scripted results and records what it was asked to send.
  #[derive(Clone, Default)]
  struct ScriptedForward {
    results: Arc<Mutex<VecDeque<LinkResult>>>,
    forwarded: Arc<Mutex<Vec<Operation>>>,
    events: Arc<Mutex<Vec<String>>>,
  }

  impl ScriptedForward {
    fn new(results: Vec<LinkResult>) -> Self {
      Self {
        results: Arc::new(Mutex::new(results.into())),
        ..Default::default()
      }
    }

    fn next_link(&self) -> NextLink {
      let this = self.clone();

      NextLink::new(move |operation| {
        let attempt = {
          let mut forwarded = this.forwarded.lock().unwrap();
          forwarded.push(operation);
          forwarded.len()
        };
        this
          .events
          .lock()
          .unwrap()
          .push(format!("forward#{}", attempt));

        let result = this.results.lock().unwrap().pop_front();
        let guard = DropRecorder {
          events: this.events.clone(),
          label: format!("drop#{}", attempt),
        };

        stream::iter(result)
          .map(move |result| {
            let _ = &guard;
            result
          })
          .boxed()
      })
    }

    fn forwarded(&self) -> Vec<Operation> {
      self.forwarded.lock().unwrap().clone()
    }

    fn forwarded_requests(&self) -> Vec<GraphQLRequest> {
      self
        .forwarded()
        .iter()
        .map(|operation| operation.to_graphql_request().unwrap())
        .collect()
    }

    fn events(&self) -> Vec<String> {
      self.events.lock().unwrap().clone()
    }
  }

  fn get_user() -> Operation {
    Operation::parse(GET_USER)
      .unwrap()
      .with_operation_name("GetUser")
  }

  fn data() -> LinkResult {
    Ok(GraphQLResponse::new_data(
      json!({ "user": { "id": "1", "name": "Dotan" } }),
    ))
  }

  fn graphql_error(message: &str) -> LinkResult {
    Ok(GraphQLResponse::new_error(message))
  }

  fn server_error(status: StatusCode, response: Option<GraphQLResponse>) -> LinkResult {
    Err(LinkError::Server { status, response })
  }

  async fn execute(link: &Link, forward: &ScriptedForward, operation: Operation) -> Vec<LinkResult> {
    link
      .request(operation, forward.next_link())
      .collect::<Vec<_>>()
      .await
  }

  fn has_hash(request: &GraphQLRequest) -> bool {
    request
      .extensions
      .as_ref()
      .is_some_and(|e| e.contains_key(PERSISTED_QUERY_EXTENSION_KEY))
  }

  #[tokio::test]
  async fn successful_hash_only_request() {
    let link = Link::new(Config::default());
    let forward = ScriptedForward::new(vec![data()]);

    let results = execute(&link, &forward, get_user()).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].as_ref().unwrap(), &data().unwrap());

    let requests = forward.forwarded_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].operation, None);
    assert_eq!(requests[0].operation_name.as_deref(), Some("GetUser"));
    assert!(has_hash(&requests[0]));
    assert_eq!(forward.forwarded()[0].http_method(), Method::GET);
  }

  #[tokio::test]
  async fn hash_matches_the_sent_document() {
    let link = Link::new(Config::default());
    let forward = ScriptedForward::new(vec![data()]);

    execute(&link, &forward, get_user()).await;

    let request = &forward.forwarded_requests()[0];
    let sent_hash = request.extensions.as_ref().unwrap()[PERSISTED_QUERY_EXTENSION_KEY]
      ["sha256Hash"]
      .as_str()
      .unwrap()
      .to_string();
    let expected = Sha256QueryHashGenerator
      .generate(&get_user().document)
      .unwrap();

    assert_eq!(sent_hash, expected);
    assert_eq!(
      request.extensions.as_ref().unwrap()[PERSISTED_QUERY_EXTENSION_KEY]["version"],
      json!(1)
    );
  }

  #[tokio::test]
  async fn not_found_retries_once_with_document_and_hash() {
    let link = Link::new(Config::default());
    let forward = ScriptedForward::new(vec![graphql_error(PERSISTED_QUERY_NOT_FOUND), data()]);

    let results = execute(&link, &forward, get_user()).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].as_ref().unwrap(), &data().unwrap());

    let requests = forward.forwarded_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].operation, None);
    assert!(requests[1].operation.is_some());
    assert!(has_hash(&requests[1]));
    assert_eq!(requests[1].operation_name.as_deref(), Some("GetUser"));
    // the retry carries the full document, so it goes out as POST
    assert_eq!(forward.forwarded()[1].http_method(), Method::POST);
    assert!(!link.disablement_state().is_disabled());
  }

  #[tokio::test]
  async fn any_graphql_error_triggers_the_retry() {
    let link = Link::new(Config::default());
    let forward = ScriptedForward::new(vec![graphql_error("something else"), data()]);

    let results = execute(&link, &forward, get_user()).await;

    assert!(results[0].is_ok());
    assert_eq!(forward.forwarded().len(), 2);
    assert!(!link.disablement_state().is_disabled());
  }

  #[tokio::test]
  async fn retries_at_most_once() {
    let link = Link::new(Config::default());
    let forward = ScriptedForward::new(vec![
      graphql_error(PERSISTED_QUERY_NOT_FOUND),
      graphql_error(PERSISTED_QUERY_NOT_FOUND),
      data(),
    ]);

    let results = execute(&link, &forward, get_user()).await;

    assert_eq!(forward.forwarded().len(), 2);
    assert_eq!(results.len(), 1);
    assert!(results[0]
      .as_ref()
      .unwrap()
      .has_error_message(PERSISTED_QUERY_NOT_FOUND));
  }

  #[tokio::test]
  async fn not_supported_without_transport_error_is_delivered() {
    let link = Link::new(Config::default());
    let forward = ScriptedForward::new(vec![graphql_error(PERSISTED_QUERY_NOT_SUPPORTED), data()]);

    let results = execute(&link, &forward, get_user()).await;

    assert_eq!(forward.forwarded().len(), 1);
    assert!(results[0]
      .as_ref()
      .unwrap()
      .has_error_message(PERSISTED_QUERY_NOT_SUPPORTED));
    // the disable policy is not consulted without a transport error
    assert!(!link.disablement_state().is_disabled());
  }

  #[tokio::test]
  async fn not_supported_disables_when_every_error_is_evaluated() {
    let link = Link::new(Config {
      disablement_evaluation: DisablementEvaluation::AnyError,
      ..Default::default()
    });
    let forward = ScriptedForward::new(vec![graphql_error(PERSISTED_QUERY_NOT_SUPPORTED), data()]);

    let results = execute(&link, &forward, get_user()).await;

    assert!(results[0].is_ok());
    assert!(link.disablement_state().is_disabled());

    let requests = forward.forwarded_requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].operation.is_some());
    assert!(!has_hash(&requests[1]));
  }

  #[tokio::test]
  async fn server_error_with_body_disables_and_retries_with_document() {
    let link = Link::new(Config::default());
    let forward = ScriptedForward::new(vec![
      server_error(
        StatusCode::BAD_REQUEST,
        Some(GraphQLResponse::new_error(PERSISTED_QUERY_NOT_SUPPORTED)),
      ),
      data(),
    ]);

    let results = execute(&link, &forward, get_user()).await;

    assert!(results[0].is_ok());
    assert!(link.disablement_state().is_disabled());

    let requests = forward.forwarded_requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].operation.is_some());
    assert!(!has_hash(&requests[1]));
    assert_eq!(forward.forwarded()[1].http_method(), Method::POST);
  }

  #[tokio::test]
  async fn server_error_without_body_retries_without_disabling() {
    let link = Link::new(Config::default());
    let forward = ScriptedForward::new(vec![
      server_error(StatusCode::INTERNAL_SERVER_ERROR, None),
      data(),
    ]);

    let results = execute(&link, &forward, get_user()).await;

    assert!(results[0].is_ok());
    assert!(!link.disablement_state().is_disabled());

    let requests = forward.forwarded_requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].operation.is_some());
    assert!(has_hash(&requests[1]));
  }

  #[tokio::test]
  async fn failed_retry_is_surfaced() {
    let link = Link::new(Config::default());
    let forward = ScriptedForward::new(vec![
      server_error(StatusCode::BAD_GATEWAY, None),
      server_error(StatusCode::BAD_GATEWAY, None),
    ]);

    let results = execute(&link, &forward, get_user()).await;

    assert_eq!(forward.forwarded().len(), 2);
    assert_eq!(results.len(), 1);
    assert_eq!(
      results[0].as_ref().unwrap_err().status(),
      Some(StatusCode::BAD_GATEWAY)
    );
  }

  #[tokio::test]
  async fn network_errors_pass_through() {
    let link = Link::new(Config::default());
    let forward = ScriptedForward::new(vec![Err(LinkError::Network(
      reqwest_middleware::Error::Middleware(anyhow::anyhow!("connection refused")),
    ))]);

    let results = execute(&link, &forward, get_user()).await;

    assert_eq!(forward.forwarded().len(), 1);
    assert!(matches!(results[0], Err(LinkError::Network(_))));
    assert!(!link.disablement_state().is_disabled());
  }

  #[tokio::test]
  async fn disabled_link_sends_full_documents_over_post() {
    let link = Link::new(Config::default());
    link.disablement_state().disable();

    for _ in 0..2 {
      let forward = ScriptedForward::new(vec![data()]);
      execute(&link, &forward, get_user()).await;

      let requests = forward.forwarded_requests();
      assert_eq!(requests.len(), 1);
      assert!(requests[0].operation.is_some());
      assert!(!has_hash(&requests[0]));
      assert_eq!(forward.forwarded()[0].http_method(), Method::POST);
    }

    assert!(link.disablement_state().is_disabled());
  }

  #[tokio::test]
  async fn disabled_link_still_resends_once_on_error() {
    let link = Link::new(Config::default());
    link.disablement_state().disable();
    let forward = ScriptedForward::new(vec![graphql_error("boom"), data()]);

    let results = execute(&link, &forward, get_user()).await;

    assert!(results[0].is_ok());
    let requests = forward.forwarded_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], requests[1]);
  }

  #[tokio::test]
  async fn disabling_affects_later_requests() {
    let link = Link::new(Config::default());
    let first = ScriptedForward::new(vec![
      server_error(
        StatusCode::BAD_REQUEST,
        Some(GraphQLResponse::new_error(PERSISTED_QUERY_NOT_SUPPORTED)),
      ),
      data(),
    ]);
    execute(&link, &first, get_user()).await;

    let second = ScriptedForward::new(vec![data()]);
    execute(&link, &second, get_user()).await;

    let requests = second.forwarded_requests();
    assert!(requests[0].operation.is_some());
    assert!(!has_hash(&requests[0]));
  }

  #[tokio::test]
  async fn mutations_are_sent_over_post() {
    let link = Link::new(Config::default());
    let forward = ScriptedForward::new(vec![data()]);
    let mutation = Operation::parse("mutation { updateUser { id } }").unwrap();

    execute(&link, &forward, mutation).await;

    assert_eq!(forward.forwarded()[0].http_method(), Method::POST);
    assert_eq!(forward.forwarded_requests()[0].operation, None);
  }

  #[tokio::test]
  async fn get_can_be_turned_off() {
    let link = Link::new(Config {
      use_get_for_hashed_queries: false,
      ..Default::default()
    });
    let forward = ScriptedForward::new(vec![data()]);

    execute(&link, &forward, get_user()).await;

    assert_eq!(forward.forwarded()[0].http_method(), Method::POST);
  }

  #[tokio::test]
  async fn operation_name_is_omitted_when_absent() {
    let link = Link::new(Config::default());
    let forward = ScriptedForward::new(vec![graphql_error(PERSISTED_QUERY_NOT_FOUND), data()]);

    execute(&link, &forward, Operation::parse("{ user { id } }").unwrap()).await;

    for request in forward.forwarded_requests() {
      assert_eq!(request.operation_name, None);
    }
  }

  #[tokio::test]
  async fn hash_failure_is_terminal() {
    let link = Link::new(Config::default()).with_query_hash_generator(
      |_: &ParsedGraphQLDocument| -> Result<String, anyhow::Error> {
        Err(anyhow::anyhow!("printer exploded"))
      },
    );
    let forward = ScriptedForward::new(vec![data()]);

    let results = execute(&link, &forward, get_user()).await;

    assert!(forward.forwarded().is_empty());
    assert_eq!(results.len(), 1);
    match &results[0] {
      Err(LinkError::Link { name, source }) => {
        assert_eq!(*name, "persisted_queries");
        assert!(matches!(
          source.downcast_ref::<PersistedQueriesLinkError>(),
          Some(PersistedQueriesLinkError::HashComputation(_))
        ));
      }
      other => panic!("unexpected result: {:?}", other),
    }
  }

  #[tokio::test]
  async fn custom_hash_generator_is_used() {
    let link = Link::new(Config::default()).with_query_hash_generator(
      |_: &ParsedGraphQLDocument| -> Result<String, anyhow::Error> {
        Ok("custom-hash".to_string())
      },
    );
    let forward = ScriptedForward::new(vec![data()]);

    execute(&link, &forward, get_user()).await;

    let request = &forward.forwarded_requests()[0];
    assert_eq!(
      request.extensions.as_ref().unwrap()[PERSISTED_QUERY_EXTENSION_KEY]["sha256Hash"],
      json!("custom-hash")
    );
  }

  #[tokio::test]
  async fn custom_disable_policy_is_used() {
    let link = Link::new(Config::default()).with_disable_policy(
      |_: &Operation, _: Option<&GraphQLResponse>, error: Option<&LinkError>| {
        error.and_then(LinkError::status) == Some(StatusCode::NOT_IMPLEMENTED)
      },
    );
    let forward = ScriptedForward::new(vec![
      server_error(
        StatusCode::NOT_IMPLEMENTED,
        Some(GraphQLResponse::new_error("nope")),
      ),
      data(),
    ]);

    execute(&link, &forward, get_user()).await;

    assert!(link.disablement_state().is_disabled());
    assert!(!has_hash(&forward.forwarded_requests()[1]));
  }

  #[tokio::test]
  async fn previous_attempt_is_cancelled_before_the_retry() {
    let link = Link::new(Config::default());
    let forward = ScriptedForward::new(vec![graphql_error(PERSISTED_QUERY_NOT_FOUND), data()]);

    execute(&link, &forward, get_user()).await;

    assert_eq!(
      forward.events(),
      vec!["forward#1", "drop#1", "forward#2", "drop#2"]
    );
  }

  #[tokio::test]
  async fn empty_downstream_completes_without_result() {
    let link = Link::new(Config::default());
    let forward = ScriptedForward::new(vec![]);

    let results = execute(&link, &forward, get_user()).await;

    assert!(results.is_empty());
    assert_eq!(forward.forwarded().len(), 1);
  }

  #[tokio::test]
  async fn dropping_the_result_stream_cancels_downstream() {
    let link = Link::new(Config::default());
    let events = Arc::new(Mutex::new(Vec::<String>::new()));
    let next = {
      let events = events.clone();
      NextLink::new(move |_| {
        let guard = DropRecorder {
          events: events.clone(),
          label: "cancelled".to_string(),
        };

        stream::pending::<LinkResult>()
          .map(move |result| {
            let _ = &guard;
            result
          })
          .boxed()
      })
    };

    let mut results = link.request(get_user(), next);
    assert!(futures::poll!(results.next()).is_pending());
    assert!(events.lock().unwrap().is_empty());

    drop(results);
    assert_eq!(*events.lock().unwrap(), vec!["cancelled".to_string()]);
  }

  #[tokio::test]
  async fn operations_are_not_mutated() {
    let link = Link::new(Config::default());
    let forward = ScriptedForward::new(vec![graphql_error(PERSISTED_QUERY_NOT_FOUND), data()]);
    let operation = get_user();

    execute(&link, &forward, operation.clone()).await;

    let request = operation.to_graphql_request().unwrap();
    assert!(request.operation.is_some());
    assert!(!has_hash(&request));
    assert_eq!(operation.http_method(), Method::POST);
  }
}
