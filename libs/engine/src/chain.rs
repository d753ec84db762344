use std::sync::Arc;

use courier_common::{
  http::ToHeadersMap,
  link::{Link, LinkInitError, LinkResult, LinkStream, NextLink, Operation, TerminatingLink},
};
use courier_config::CourierConfig;
use futures::StreamExt;
use tracing::debug;

use crate::{http_link::HttpLink, link_manager::LinkManager};

#[derive(Debug, thiserror::Error)]
pub enum ChainBuildError {
  #[error("invalid headers configuration: {0}")]
  InvalidHeaders(anyhow::Error),
  #[error(transparent)]
  LinkInit(#[from] LinkInitError),
}

/// An ordered list of links ending with a terminating link.
#[derive(Debug, Clone)]
pub struct LinkChain {
  links: Arc<[Arc<dyn Link>]>,
  terminal: Arc<dyn TerminatingLink>,
}

impl LinkChain {
  pub fn new(links: Vec<Arc<dyn Link>>, terminal: Arc<dyn TerminatingLink>) -> Self {
    Self {
      links: links.into(),
      terminal,
    }
  }

  pub fn from_config(config: &CourierConfig) -> Result<Self, ChainBuildError> {
    let headers = match &config.headers {
      Some(headers) => headers
        .to_headers_map()
        .map_err(ChainBuildError::InvalidHeaders)?,
      None => Default::default(),
    };

    let link_manager = LinkManager::new(&config.links)?;
    debug!(
      "building chain with {} link(s), sending to {}",
      link_manager.links().len(),
      config.endpoint
    );

    Ok(Self::new(
      link_manager.into_links(),
      Arc::new(HttpLink::new(config.endpoint.clone(), headers)),
    ))
  }

  #[tracing::instrument(level = "debug", name = "LinkChain::execute", skip_all, fields(operation_name = ?operation.operation_name))]
  pub fn execute(&self, operation: Operation) -> LinkStream {
    dispatch(self.links.clone(), 0, self.terminal.clone(), operation)
  }

  /// Runs the operation and waits for its single result. `None` when the chain completed without one.
  pub async fn execute_once(&self, operation: Operation) -> Option<LinkResult> {
    self.execute(operation).next().await
  }
}

fn dispatch(
  links: Arc<[Arc<dyn Link>]>,
  index: usize,
  terminal: Arc<dyn TerminatingLink>,
  operation: Operation,
) -> LinkStream {
  match links.get(index).cloned() {
    Some(link) => {
      let forward = NextLink::new(move |operation| {
        dispatch(links.clone(), index + 1, terminal.clone(), operation)
      });

      link.request(operation, forward)
    }
    None => terminal.execute(operation),
  }
}
