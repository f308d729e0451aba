// src/source/mod.rs
pub mod api;
pub mod rss;

pub use api::ApiSource;
pub use rss::RssSource;
