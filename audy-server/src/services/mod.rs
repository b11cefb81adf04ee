//! Core services: ingestion, live channels, remote import, range streaming

pub mod batch;
pub mod channels;
pub mod content_hash;
pub mod import_queue;
pub mod ingest;
pub mod library;
pub mod range;

pub use batch::BatchUpload;
pub use channels::{ChannelHandle, ChannelRegistry};
pub use import_queue::{ImportJob, ImportQueue, ImportSettings};
pub use ingest::{IngestError, TrackIngestor};
pub use library::LibraryStore;
