use std::sync::Arc;

use courier_common::link::{CreatableLink, Link, LinkInitError};
use courier_config::LinkDefinition;
use tracing::debug;

#[derive(Debug, Default)]
pub struct LinkManager {
  links: Vec<Arc<dyn Link>>,
}

impl LinkManager {
  pub fn new(links_config: &Option<Vec<LinkDefinition>>) -> Result<Self, LinkInitError> {
    let mut instance = LinkManager::default();

    if let Some(config_defs) = links_config {
      for link_def in config_defs {
        match link_def {
          LinkDefinition::PersistedQueries { enabled, config } => {
            if enabled.is_some_and(|v| v) {
              instance.register_boxed_link(persisted_queries_link::Link::create(
                config.clone().unwrap_or_default(),
              )?)
            }
          }
        }
      }
    }

    Ok(instance)
  }

  pub fn register_boxed_link(&mut self, link: Box<dyn Link>) {
    debug!("registering link {}", link.name());
    self.links.push(Arc::from(link));
  }

  pub fn links(&self) -> &[Arc<dyn Link>] {
    &self.links
  }

  pub fn into_links(self) -> Vec<Arc<dyn Link>> {
    self.links
  }
}
