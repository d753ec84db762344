use std::{
  fmt::{Debug, Formatter},
  sync::Arc,
};

use courier_common::{
  graphql::GraphQLResponse,
  http::Method,
  link::{
    CreatableLink, HttpMethodOverride, Link, LinkError, LinkInitError, LinkResult, LinkStream,
    NextLink, Operation, PersistedQueryPayload,
  },
};
use futures::{future, stream, StreamExt};
use tracing::{debug, debug_span, error, warn, Instrument};

use crate::{
  config::{DisablementEvaluation, PersistedQueriesLinkConfig},
  hasher::{QueryHashGenerator, Sha256QueryHashGenerator},
  policy::{
    first_attempt_inclusions, retry_inclusions, should_use_get, DefaultDisablePolicy,
    DisablePolicy, PERSISTED_QUERY_NOT_SUPPORTED,
  },
  state::LinkDisablementState,
};

const LINK_NAME: &str = "persisted_queries";

#[derive(Debug, thiserror::Error)]
pub enum PersistedQueriesLinkError {
  #[error("failed to compute persisted query hash: {0}")]
  HashComputation(anyhow::Error),
}

impl From<PersistedQueriesLinkError> for LinkError {
  fn from(error: PersistedQueriesLinkError) -> Self {
    LinkError::Link {
      name: LINK_NAME,
      source: error.into(),
    }
  }
}

pub struct PersistedQueriesLink {
  config: PersistedQueriesLinkConfig,
  hash_generator: Arc<dyn QueryHashGenerator>,
  disable_policy: Arc<dyn DisablePolicy>,
  state: Arc<LinkDisablementState>,
}

impl Debug for PersistedQueriesLink {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PersistedQueriesLink")
      .field("config", &self.config)
      .field("state", &self.state)
      .finish()
  }
}

impl CreatableLink for PersistedQueriesLink {
  type Config = PersistedQueriesLinkConfig;

  fn create(config: Self::Config) -> Result<Box<Self>, LinkInitError> {
    debug!("creating persisted queries link: {:?}", config);

    Ok(Box::new(Self::new(config)))
  }
}

impl PersistedQueriesLink {
  pub fn new(config: PersistedQueriesLinkConfig) -> Self {
    Self {
      config,
      hash_generator: Arc::new(Sha256QueryHashGenerator),
      disable_policy: Arc::new(DefaultDisablePolicy),
      state: Arc::new(LinkDisablementState::default()),
    }
  }

  pub fn with_query_hash_generator(mut self, generator: impl QueryHashGenerator + 'static) -> Self {
    self.hash_generator = Arc::new(generator);
    self
  }

  pub fn with_disable_policy(mut self, policy: impl DisablePolicy + 'static) -> Self {
    self.disable_policy = Arc::new(policy);
    self
  }

  pub fn disablement_state(&self) -> &LinkDisablementState {
    &self.state
  }
}

impl Link for PersistedQueriesLink {
  fn name(&self) -> &'static str {
    LINK_NAME
  }

  fn request(&self, operation: Operation, forward: NextLink) -> LinkStream {
    let span = debug_span!(
      "persisted_queries",
      operation_name = ?operation.operation_name
    );
    let controller = RetryController {
      config: self.config.clone(),
      hash_generator: self.hash_generator.clone(),
      disable_policy: self.disable_policy.clone(),
      state: self.state.clone(),
      forward,
      original: operation,
      retried: false,
      active: None,
    };

    stream::once(controller.run().instrument(span))
      .flatten()
      .boxed()
  }
}

/// Drives a single operation: hash-only attempt first, then at most one retry.
struct RetryController {
  config: PersistedQueriesLinkConfig,
  hash_generator: Arc<dyn QueryHashGenerator>,
  disable_policy: Arc<dyn DisablePolicy>,
  state: Arc<LinkDisablementState>,
  forward: NextLink,
  // The operation as received, plus the hash once computed. Every attempt is derived from it.
  original: Operation,
  retried: bool,
  active: Option<LinkStream>,
}

impl RetryController {
  async fn run(mut self) -> LinkStream {
    let first_attempt = match self.first_attempt() {
      Ok(operation) => operation,
      Err(e) => return stream::once(future::ready(Err(e))).boxed(),
    };
    self.subscribe(first_attempt);

    loop {
      let next = match self.active.as_mut() {
        Some(active) => active.next().await,
        None => None,
      };

      let Some(result) = next else {
        debug!("downstream completed without a result");
        return stream::empty().boxed();
      };

      if self.should_retry(&result) {
        self.retried = true;
        let retry = self.retry_attempt();
        self.subscribe(retry);
        continue;
      }

      let rest = self.active.take().unwrap_or_else(|| stream::empty().boxed());
      return stream::once(future::ready(result)).chain(rest).boxed();
    }
  }

  fn first_attempt(&mut self) -> Result<Operation, LinkError> {
    let disabled = self.state.is_disabled();

    if !disabled {
      let hash = self
        .hash_generator
        .generate(&self.original.document)
        .map_err(|e| {
          error!("failed to compute persisted query hash: {:?}", e);
          PersistedQueriesLinkError::HashComputation(e)
        })?;
      debug!("computed persisted query hash: {}", hash);

      self.original = self
        .original
        .with_entry(PersistedQueryPayload::new(self.original.document.clone(), hash));
    }

    let mut attempt = self.original.with_entry(first_attempt_inclusions(
      disabled,
      self.original.operation_name.is_some(),
    ));

    if should_use_get(self.config.use_get_for_hashed_queries, disabled, &self.original) {
      attempt = attempt.with_entry(HttpMethodOverride(Method::GET));
    }

    Ok(attempt)
  }

  // Built from the original operation, so the retry never inherits the GET override.
  fn retry_attempt(&self) -> Operation {
    let disabled = self.state.is_disabled();
    debug!(
      "retrying operation with the full document (persisted queries disabled: {})",
      disabled
    );

    self.original.with_entry(retry_inclusions(
      disabled,
      self.original.operation_name.is_some(),
    ))
  }

  /// Replaces the active downstream subscription. The previous one is cancelled first,
  /// so a stale attempt can never deliver a result.
  fn subscribe(&mut self, operation: Operation) {
    if let Some(previous) = self.active.take() {
      drop(previous);
    }

    self.active = Some(self.forward.forward(operation));
  }

  fn should_retry(&self, result: &LinkResult) -> bool {
    if self.retried {
      return false;
    }

    let (response, error) = match result {
      Ok(response) if response.has_errors() => (Some(response), None),
      Err(error @ LinkError::Server { .. }) => (error.response(), Some(error)),
      _ => return false,
    };

    self.evaluate_disablement(response, error);

    let not_supported =
      response.is_some_and(|r| r.has_error_message(PERSISTED_QUERY_NOT_SUPPORTED));

    !not_supported || self.state.is_disabled()
  }

  fn evaluate_disablement(&self, response: Option<&GraphQLResponse>, error: Option<&LinkError>) {
    let evaluate = match self.config.disablement_evaluation {
      DisablementEvaluation::JointResponseAndError => response.is_some() && error.is_some(),
      DisablementEvaluation::AnyError => true,
    };

    if evaluate
      && self
        .disable_policy
        .should_disable(&self.original, response, error)
      && self.state.disable()
    {
      warn!("server does not support persisted queries, sending full documents from now on");
    }
  }
}
