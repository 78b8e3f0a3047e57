//! Audio file storage on the local filesystem

mod media_store;

pub use media_store::{GENERATED_ROUTE, LocalMediaStore, MediaStoreError};
