use courier_common::{
  graphql::GraphQLResponse,
  http::StatusCode,
  link::{InclusionDirective, LinkError, Operation},
};

/// Error message a server sends when it does not implement persisted queries at all.
pub const PERSISTED_QUERY_NOT_SUPPORTED: &str = "PersistedQueryNotSupported";
/// Error message a server sends when it does not know the hash yet.
pub const PERSISTED_QUERY_NOT_FOUND: &str = "PersistedQueryNotFound";

/// Fields sent on the first attempt: hash only, unless persisted queries are disabled.
pub fn first_attempt_inclusions(
  disabled_due_to_errors: bool,
  has_operation_name: bool,
) -> InclusionDirective {
  InclusionDirective {
    include_query: disabled_due_to_errors,
    include_extensions: !disabled_due_to_errors,
    include_operation_name: has_operation_name,
  }
}

/// Fields sent on the retry: always the full document, plus the hash so the server can store it.
pub fn retry_inclusions(disabled_due_to_errors: bool, has_operation_name: bool) -> InclusionDirective {
  InclusionDirective {
    include_query: true,
    include_extensions: !disabled_due_to_errors,
    include_operation_name: has_operation_name,
  }
}

pub fn should_use_get(
  use_get_for_hashed_queries: bool,
  disabled_due_to_errors: bool,
  operation: &Operation,
) -> bool {
  use_get_for_hashed_queries && !disabled_due_to_errors && operation.is_query()
}

/// Decides whether a failed result proves the server cannot handle persisted queries.
pub trait DisablePolicy: Send + Sync {
  fn should_disable(
    &self,
    operation: &Operation,
    response: Option<&GraphQLResponse>,
    error: Option<&LinkError>,
  ) -> bool;
}

/// Disables on a `PersistedQueryNotSupported` GraphQL error, or on an HTTP 400/500 answer.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDisablePolicy;

impl DisablePolicy for DefaultDisablePolicy {
  fn should_disable(
    &self,
    _operation: &Operation,
    response: Option<&GraphQLResponse>,
    error: Option<&LinkError>,
  ) -> bool {
    if response.is_some_and(|r| r.has_error_message(PERSISTED_QUERY_NOT_SUPPORTED)) {
      return true;
    }

    matches!(
      error.and_then(LinkError::status),
      Some(StatusCode::BAD_REQUEST) | Some(StatusCode::INTERNAL_SERVER_ERROR)
    )
  }
}

impl<F> DisablePolicy for F
where
  F: Fn(&Operation, Option<&GraphQLResponse>, Option<&LinkError>) -> bool + Send + Sync,
{
  fn should_disable(
    &self,
    operation: &Operation,
    response: Option<&GraphQLResponse>,
    error: Option<&LinkError>,
  ) -> bool {
    self(operation, response, error)
  }
}
