//! Feed ingestion: fetch → parse → normalize → score.

pub mod fallback;
pub mod feed;
pub mod normalizer;
pub mod rss;
pub mod severity;
