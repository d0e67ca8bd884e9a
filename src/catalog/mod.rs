//! Landmark registry REST client.

pub mod client;
pub mod types;

pub use client::CatalogClient;
pub use types::{
    Building, CatalogError, Landmark, LandmarkId, PlutoRecord, WikipediaArticleRef,
};
