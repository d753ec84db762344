pub mod graphql;
pub mod http;
pub mod json;
pub mod link;
pub mod serde_utils;
pub use graphql_parser::query::{Definition, Document, OperationDefinition, ParseError};
