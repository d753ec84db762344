use std::fmt::{Display, Formatter};

use bytes::Bytes;
use graphql_parser::{
  parse_query,
  query::{Definition, Document, OperationDefinition, ParseError},
};
use serde::{Deserialize, Serialize};
use serde_json::{Error as SerdeError, Map, Value};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct GraphQLRequest {
  // The GraphQL operation, as string. Omitted for hash-only requests.
  #[serde(rename = "query")]
  #[serde(skip_serializing_if = "Option::is_none")]
  pub operation: Option<String>,
  // The operation name, if specified
  #[serde(rename = "operationName")]
  #[serde(skip_serializing_if = "Option::is_none")]
  pub operation_name: Option<String>,
  // GraphQL operation variables, in JSON format
  #[serde(skip_serializing_if = "Option::is_none")]
  pub variables: Option<Map<String, Value>>,
  // GraphQL execution extensions, in JSON format
  #[serde(skip_serializing_if = "Option::is_none")]
  pub extensions: Option<Map<String, Value>>,
}

impl Display for GraphQLRequest {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "{}",
      serde_json::to_string(self).unwrap_or_else(|e| e.to_string())
    )
  }
}

impl GraphQLRequest {
  /// Renders the request as URL query parameters, following the GraphQL over HTTP `GET` convention.
  /// `variables` and `extensions` are JSON-encoded.
  pub fn to_query_params(&self) -> Result<Vec<(&'static str, String)>, SerdeError> {
    let mut params = Vec::with_capacity(4);

    if let Some(operation) = &self.operation {
      params.push(("query", operation.clone()));
    }

    if let Some(operation_name) = &self.operation_name {
      params.push(("operationName", operation_name.clone()));
    }

    if let Some(variables) = &self.variables {
      params.push(("variables", serde_json::to_string(variables)?));
    }

    if let Some(extensions) = &self.extensions {
      params.push(("extensions", serde_json::to_string(extensions)?));
    }

    Ok(params)
  }
}

impl From<&GraphQLRequest> for Bytes {
  fn from(request: &GraphQLRequest) -> Self {
    serde_json::to_vec(&request)
      .unwrap_or_else(|e| e.to_string().into_bytes())
      .into()
  }
}

/// An error with a message and optional extensions.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GraphQLError {
  /// The error message.
  pub message: String,
  /// Extensions to the error.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub extensions: Option<Map<String, Value>>,
}

impl std::fmt::Display for GraphQLError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.message)
  }
}

impl GraphQLError {
  pub fn new(message: &str) -> Self {
    GraphQLError {
      message: message.to_string(),
      extensions: None,
    }
  }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct GraphQLResponse {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub data: Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub errors: Option<Vec<GraphQLError>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub extensions: Option<Value>,
}

impl GraphQLResponse {
  pub fn new_data(data: Value) -> Self {
    GraphQLResponse {
      data: Some(data),
      ..Default::default()
    }
  }

  pub fn new_error(error: &str) -> Self {
    GraphQLResponse {
      errors: Some(vec![GraphQLError::new(error)]),
      ..Default::default()
    }
  }

  /// `true` when the response carries at least one GraphQL-level error.
  pub fn has_errors(&self) -> bool {
    self.errors.as_ref().is_some_and(|errors| !errors.is_empty())
  }

  pub fn has_error_message(&self, message: &str) -> bool {
    self
      .errors
      .iter()
      .flatten()
      .any(|error| error.message == message)
  }
}

pub type ParsedGraphQLDocument = Document<'static, String>;

pub fn parse_graphql_operation(operation_str: &str) -> Result<ParsedGraphQLDocument, ParseError> {
  parse_query::<String>(operation_str).map(|v| v.into_static())
}

/// Prints a document in its canonical form. Two structurally equal documents always print
/// to the same text, regardless of the whitespace and comments in their original source.
pub fn print_graphql_document(document: &ParsedGraphQLDocument) -> String {
  document.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
  Query,
  Mutation,
  Subscription,
}

impl From<&OperationDefinition<'static, String>> for OperationKind {
  fn from(operation: &OperationDefinition<'static, String>) -> Self {
    match operation {
      OperationDefinition::SelectionSet(_) | OperationDefinition::Query(_) => OperationKind::Query,
      OperationDefinition::Mutation(_) => OperationKind::Mutation,
      OperationDefinition::Subscription(_) => OperationKind::Subscription,
    }
  }
}

fn operation_name_of<'a>(operation: &'a OperationDefinition<'static, String>) -> Option<&'a str> {
  match operation {
    OperationDefinition::SelectionSet(_) => None,
    OperationDefinition::Query(query) => query.name.as_deref(),
    OperationDefinition::Mutation(mutation) => mutation.name.as_deref(),
    OperationDefinition::Subscription(subscription) => subscription.name.as_deref(),
  }
}

/// Resolves the kind of the operation that would be executed for the given document.
///
/// With an operation name, the named operation is looked up. Without one, the document must
/// contain exactly one operation; anything else is ambiguous and resolves to `None`.
pub fn resolve_operation_kind(
  document: &ParsedGraphQLDocument,
  operation_name: Option<&str>,
) -> Option<OperationKind> {
  let mut operations = document.definitions.iter().filter_map(|definition| {
    if let Definition::Operation(operation) = definition {
      return Some(operation);
    }

    None
  });

  match operation_name {
    Some(name) => operations
      .find(|operation| operation_name_of(operation) == Some(name))
      .map(OperationKind::from),
    None => match (operations.next(), operations.next()) {
      (Some(operation), None) => Some(OperationKind::from(operation)),
      _ => None,
    },
  }
}

#[tracing::instrument(level = "trace", name = "graphql::is_query_operation", skip_all)]
pub fn is_query_operation(document: &ParsedGraphQLDocument, operation_name: Option<&str>) -> bool {
  resolve_operation_kind(document, operation_name) == Some(OperationKind::Query)
}
