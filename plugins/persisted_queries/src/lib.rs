mod config;
mod hasher;
mod link;
mod policy;
mod state;
mod test;

pub use config::DisablementEvaluation;
pub use config::PersistedQueriesLinkConfig as Config;
pub use hasher::{QueryHashGenerator, Sha256QueryHashGenerator};
pub use link::{PersistedQueriesLink as Link, PersistedQueriesLinkError};
pub use policy::{
  first_attempt_inclusions, retry_inclusions, should_use_get, DefaultDisablePolicy, DisablePolicy,
  PERSISTED_QUERY_NOT_FOUND, PERSISTED_QUERY_NOT_SUPPORTED,
};
pub use state::LinkDisablementState;
