//! Adapters for the external services Kiln talks to.

pub mod blob;
pub mod github;

pub use blob::{AzureBlobStore, BlobStoreConfig};
pub use github::{GitHubConfig, GitHubFeed};
