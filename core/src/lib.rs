//! # Ferry Core
//!
//! The request-execution core of an offline-first client SDK.
//!
//! This crate takes a high-level data operation (a method and a
//! hierarchical resource path) and satisfies it against two stores: a
//! local cache and a remote backend. A caller-selected [`DataPolicy`]
//! decides which store is authoritative, how results are mirrored into the
//! other, and how offline writes are queued for later replay.
//!
//! ## Design Principles
//!
//! - **No I/O here**: the stores are pluggable [`Rack`]s; the core only
//!   sequences them
//! - **Typed failures**: every error path lifts into one [`Error`] enum
//! - **Untyped entities**: payloads stay JSON values with `_id`/`_kmd`
//!   conventions, exactly as the backend ships them
//!
//! ## Core Concepts
//!
//! ### Requests
//!
//! A [`Request`] owns its method, path, query, body, headers, credentials,
//! and policy. [`Request::execute`] resolves credentials, dispatches across
//! the racks, and validates the outcome. A request is not re-entrant: a
//! second `execute` while one is in flight fails with
//! [`Error::AlreadyExecuting`].
//!
//! ### Data policies
//!
//! [`DataPolicy`] selects the branch: cache only, cache first with network
//! escalation, network only, or network first with cache mirroring and
//! fallback.
//!
//! ### Sync queue
//!
//! Successful local mutations are recorded per collection in a
//! [`SyncDocument`] so they can replay against the backend later.
//!
//! ### Delta sets
//!
//! [`DeltaSetRequest`] refreshes a collection by fetching only the entities
//! whose backend last-modified time beats the cached one, in id batches.
//!
//! ## Quick Start
//!
//! ```rust
//! use ferry_core::{Client, DataPolicy, MemoryRack, Method, MockRack, Request, Response};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> ferry_core::Result<()> {
//! let network = Arc::new(MockRack::new());
//! network.push_response(Response::ok(json!([{"_id": "b1", "title": "The Raven"}])));
//!
//! let client = Arc::new(Client::new(
//!     "https",
//!     "baas.example.com",
//!     Arc::new(MemoryRack::new()),
//!     network,
//! ));
//!
//! // Network first: the result is returned and mirrored into the cache
//! let request = Request::new(client.clone())
//!     .with_pathname("/appdata/app1/books")
//!     .with_policy(DataPolicy::PreferNetwork);
//! let response = request.execute().await?;
//! assert_eq!(response.data[0]["title"], "The Raven");
//!
//! // The mirror satisfies an offline read
//! let cached = Request::new(client)
//!     .with_method(Method::Get)
//!     .with_pathname("/appdata/app1/books")
//!     .with_policy(DataPolicy::ForceLocal)
//!     .execute()
//!     .await?;
//! assert_eq!(cached.entities().len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod delta;
pub mod entity;
pub mod error;
pub mod headers;
pub mod memory;
pub mod path;
pub mod policy;
pub mod properties;
pub mod query;
pub mod rack;
pub mod request;
pub mod response;
pub mod sync;

// Re-export main types at crate root
pub use auth::{Auth, AuthCredentials, AuthProvider};
pub use client::Client;
pub use config::Config;
pub use delta::DeltaSetRequest;
pub use entity::Kmd;
pub use error::{Error, ErrorEnvelope, Result};
pub use headers::HeaderMap;
pub use memory::MemoryRack;
pub use path::ResourcePath;
pub use policy::DataPolicy;
pub use properties::RequestProperties;
pub use query::Query;
pub use rack::{MockRack, Rack};
pub use request::{Method, Request, RequestDescriptor, ResponseType};
pub use response::Response;
pub use sync::{SyncDocument, SyncEntry};

/// Type aliases for clarity
pub type EntityId = String;
pub type CollectionName = String;
