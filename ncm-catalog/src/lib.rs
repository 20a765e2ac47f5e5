//! Music catalog client for ncm-directlink.
//!
//! Every outbound call goes through one paced [`ApiGateway`]; the
//! [`CatalogClient`] on top of it turns loosely shaped JSON into [`Track`]s
//! and direct links.

mod client;
mod error;
mod gateway;
mod shapes;
mod types;

pub use client::{Catalog, CatalogClient};
pub use error::{CatalogError, Result};
pub use gateway::{ApiGateway, DEFAULT_MIN_INTERVAL, REQUEST_TIMEOUT};
pub use shapes::{LinkField, SongListShape, extract_link, extract_tracks};
pub use types::{LinkOptions, Track};
