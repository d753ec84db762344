use std::{
  fmt::{Debug, Formatter},
  sync::Arc,
};

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
  graphql::{
    is_query_operation, parse_graphql_operation, print_graphql_document, GraphQLRequest,
    GraphQLResponse, ParsedGraphQLDocument,
  },
  http::{Method, StatusCode},
  ParseError,
};

pub const PERSISTED_QUERY_EXTENSION_KEY: &str = "persistedQuery";

/// Typed, extensible bag of directives attached to an operation. Links read and add entries,
/// the terminating link interprets them when the request is serialized and sent.
pub type OperationContext = http::Extensions;

/// Controls which fields of the GraphQL request are serialized.
/// When absent from the context, everything the operation carries is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InclusionDirective {
  pub include_query: bool,
  pub include_extensions: bool,
  pub include_operation_name: bool,
}

impl Default for InclusionDirective {
  fn default() -> Self {
    Self {
      include_query: true,
      include_extensions: true,
      include_operation_name: true,
    }
  }
}

/// Overrides the HTTP method used by the terminating link. Without it, requests are sent as `POST`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpMethodOverride(pub Method);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedQueryExtension {
  pub version: u32,
  pub sha256_hash: String,
}

/// A computed hash, bound to the exact document it was computed from.
#[derive(Debug, Clone)]
pub struct PersistedQueryPayload {
  pub document: Arc<ParsedGraphQLDocument>,
  pub extension: PersistedQueryExtension,
}

impl PersistedQueryPayload {
  pub fn new(document: Arc<ParsedGraphQLDocument>, sha256_hash: String) -> Self {
    Self {
      document,
      extension: PersistedQueryExtension {
        version: 1,
        sha256_hash,
      },
    }
  }

  /// A payload may only be serialized along with the document it hashed: the same instance, or a
  /// document with identical canonical text. AST equality is not enough, it includes source positions.
  pub fn matches(&self, document: &Arc<ParsedGraphQLDocument>) -> bool {
    Arc::ptr_eq(&self.document, document)
      || print_graphql_document(&self.document) == print_graphql_document(document)
  }
}

#[derive(thiserror::Error, Debug)]
pub enum RequestSerializationError {
  #[error("persisted query hash was computed for a different document than the one being sent")]
  PersistedQueryDocumentMismatch,
  #[error("failed to serialize request extensions: {0}")]
  Extensions(serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct Operation {
  pub document: Arc<ParsedGraphQLDocument>,
  pub operation_name: Option<String>,
  pub variables: Option<Map<String, Value>>,
  pub extensions: Option<Map<String, Value>>,
  pub context: OperationContext,
}

impl Operation {
  pub fn new(document: ParsedGraphQLDocument) -> Self {
    Self {
      document: Arc::new(document),
      operation_name: None,
      variables: None,
      extensions: None,
      context: OperationContext::new(),
    }
  }

  pub fn parse(source: &str) -> Result<Self, ParseError> {
    parse_graphql_operation(source).map(Self::new)
  }

  pub fn with_operation_name(mut self, operation_name: impl Into<String>) -> Self {
    self.operation_name = Some(operation_name.into());
    self
  }

  pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
    self.variables = Some(variables);
    self
  }

  /// Derives a new operation that carries `entry` in its context, replacing any previous entry of
  /// the same type. The receiver is left untouched.
  pub fn with_entry<T: Clone + Send + Sync + 'static>(&self, entry: T) -> Self {
    let mut derived = self.clone();
    derived.context.insert(entry);
    derived
  }

  pub fn entry<T: Send + Sync + 'static>(&self) -> Option<&T> {
    self.context.get::<T>()
  }

  pub fn is_query(&self) -> bool {
    is_query_operation(&self.document, self.operation_name.as_deref())
  }

  pub fn http_method(&self) -> Method {
    self
      .entry::<HttpMethodOverride>()
      .map(|m| m.0.clone())
      .unwrap_or(Method::POST)
  }

  pub fn to_graphql_request(&self) -> Result<GraphQLRequest, RequestSerializationError> {
    let inclusions = self
      .entry::<InclusionDirective>()
      .copied()
      .unwrap_or_default();

    let extensions = match inclusions.include_extensions {
      true => self.serialized_extensions()?,
      false => None,
    };

    Ok(GraphQLRequest {
      operation: inclusions
        .include_query
        .then(|| print_graphql_document(&self.document)),
      operation_name: match inclusions.include_operation_name {
        true => self.operation_name.clone(),
        false => None,
      },
      variables: self.variables.clone(),
      extensions,
    })
  }

  fn serialized_extensions(
    &self,
  ) -> Result<Option<Map<String, Value>>, RequestSerializationError> {
    let mut extensions = self.extensions.clone().unwrap_or_default();

    if let Some(payload) = self.entry::<PersistedQueryPayload>() {
      if !payload.matches(&self.document) {
        return Err(RequestSerializationError::PersistedQueryDocumentMismatch);
      }

      extensions.insert(
        PERSISTED_QUERY_EXTENSION_KEY.to_string(),
        serde_json::to_value(&payload.extension).map_err(RequestSerializationError::Extensions)?,
      );
    }

    match extensions.is_empty() {
      true => Ok(None),
      false => Ok(Some(extensions)),
    }
  }
}

#[derive(thiserror::Error, Debug)]
pub enum LinkError {
  /// The server answered with a non-successful status. The body is attached when it could be
  /// parsed as a GraphQL response.
  #[error("unexpected HTTP status: {status}")]
  Server {
    status: StatusCode,
    response: Option<GraphQLResponse>,
  },
  #[error("network error: {0}")]
  Network(reqwest_middleware::Error),
  #[error("failed to serialize request: {0}")]
  Serialization(#[from] RequestSerializationError),
  #[error("link \"{name}\" failed: {source}")]
  Link {
    name: &'static str,
    source: anyhow::Error,
  },
}

impl LinkError {
  pub fn status(&self) -> Option<StatusCode> {
    match self {
      LinkError::Server { status, .. } => Some(*status),
      _ => None,
    }
  }

  pub fn response(&self) -> Option<&GraphQLResponse> {
    match self {
      LinkError::Server { response, .. } => response.as_ref(),
      _ => None,
    }
  }
}

pub type LinkResult = Result<GraphQLResponse, LinkError>;

/// Result stream of a single operation: at most one item, then completion.
/// Dropping the stream cancels the work behind it.
pub type LinkStream = BoxStream<'static, LinkResult>;

/// Handle to the rest of the chain, following the link that receives it.
#[derive(Clone)]
pub struct NextLink(Arc<dyn Fn(Operation) -> LinkStream + Send + Sync>);

impl NextLink {
  pub fn new(forward: impl Fn(Operation) -> LinkStream + Send + Sync + 'static) -> Self {
    Self(Arc::new(forward))
  }

  pub fn forward(&self, operation: Operation) -> LinkStream {
    (self.0)(operation)
  }
}

impl Debug for NextLink {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_str("NextLink")
  }
}

pub trait Link: Debug + Send + Sync {
  fn name(&self) -> &'static str;
  fn request(&self, operation: Operation, forward: NextLink) -> LinkStream;
}

/// The last element of a chain, responsible for actually sending the operation.
pub trait TerminatingLink: Debug + Send + Sync {
  fn execute(&self, operation: Operation) -> LinkStream;
}

#[derive(Debug, thiserror::Error)]
pub enum LinkInitError {
  #[error("Link init error: {source}")]
  InitError { source: anyhow::Error },
}

pub trait CreatableLink: Link + Sized {
  type Config;

  fn create(config: Self::Config) -> Result<Box<Self>, LinkInitError>;
}
