// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

pub mod cached_store;
pub mod file;
pub mod http;
pub mod registry;
pub mod store;
pub mod uri_store;

pub use cached_store::{BlobCache, CachedStore};
pub use file::FileStore;
pub use http::HttpStore;
pub use registry::{FileRegistry, InMemoryRegistry, MetadataRegistry};
pub use store::{BlobSink, BlobSource, MemoryStore};
pub use uri_store::UriStore;
