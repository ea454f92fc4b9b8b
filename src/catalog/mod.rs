// 曲库API模块

pub mod api;
pub mod client;
pub mod types;

pub use api::{AudioStream, ByteSource, CatalogApi};
pub use client::CatalogClient;
pub use types::{Page, PageItem, PageKey, Resource, SearchKind, StreamRef, TrackListRef};
