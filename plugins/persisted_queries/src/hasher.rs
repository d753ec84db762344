use courier_common::graphql::{print_graphql_document, ParsedGraphQLDocument};
use sha2::{Digest, Sha256};

/// Computes the identifier a GraphQL document is persisted under.
///
/// Implementations must be deterministic: structurally equal documents produce the same hash.
pub trait QueryHashGenerator: Send + Sync {
  fn generate(&self, document: &ParsedGraphQLDocument) -> Result<String, anyhow::Error>;
}

/// SHA-256 over the canonical printed form of the document, rendered as lowercase hex.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256QueryHashGenerator;

impl QueryHashGenerator for Sha256QueryHashGenerator {
  fn generate(&self, document: &ParsedGraphQLDocument) -> Result<String, anyhow::Error> {
    let canonical = print_graphql_document(document);
    let digest = <Sha256 as Digest>::digest(canonical.as_bytes());

    Ok(hex::encode(digest))
  }
}

impl<F> QueryHashGenerator for F
where
  F: Fn(&ParsedGraphQLDocument) -> Result<String, anyhow::Error> + Send + Sync,
{
  fn generate(&self, document: &ParsedGraphQLDocument) -> Result<String, anyhow::Error> {
    self(document)
  }
}
