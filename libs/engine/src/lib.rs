pub mod chain;
pub mod http_link;
pub mod link_manager;
