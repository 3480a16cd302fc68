//! Bucket-backed route handlers for Armature
//!
//! This crate maps GET, POST and DELETE requests onto an object store:
//! - GET streams an object back with `Content-Type` and `Content-Disposition`
//! - POST stores every part of a multipart upload
//! - DELETE removes an object
//!
//! # Features
//!
//! - **Literal or resolver options** - bucket, key, filename and content type
//!   may be fixed or computed per request
//! - **Key composition** - prefix, path parameter and form filename, with
//!   optional randomized basenames
//! - **Disposition policy** - `off`, `auto`, `attachment` or `inline`, per method
//! - **Upload validation** - conflict checks, content type allow-lists,
//!   ignored form keys, size limits
//! - **Response delegates** - take over the reply for any outcome
//! - **Backends** - in-memory store, AWS S3 (feature `s3`)
//!
//! # Quick Start
//!
//! ```
//! use armature_bucket::*;
//! use http::{Method, StatusCode};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(MemoryStore::new());
//! let config = RouteConfig::builder("media")
//!     .key("files")
//!     .mode(DispositionMode::Inline)
//!     .build()
//!     .unwrap();
//! let route = BucketRoute::new(config, store.clone());
//!
//! store
//!     .put_object("media", "files/a.txt", "hello".into(), PutOptions::default())
//!     .await
//!     .unwrap();
//!
//! let request = RouteRequest::new(Method::GET, "/files/a.txt").with_param("key", "a.txt");
//! let response = route.handle(request).await;
//! assert_eq!(response.status, StatusCode::OK);
//! assert_eq!(
//!     response.header(http::header::CONTENT_DISPOSITION),
//!     Some(r#"inline; filename="a.txt""#)
//! );
//! # });
//! ```

pub mod config;
pub mod delegate;
pub mod disposition;
pub mod error;
pub mod key;
pub mod matcher;
pub mod memory;
pub mod multipart;
pub mod pipeline;
pub mod request;
pub mod resolver;
pub mod route;
pub mod settings;
pub mod storage;

#[cfg(feature = "s3")]
pub mod s3;

pub use config::*;
pub use delegate::*;
pub use disposition::*;
pub use error::*;
pub use key::{KeyBase, KeySpec, compute_key};
pub use matcher::*;
pub use memory::*;
pub use multipart::{FormPart, UploadLimits};
pub use request::*;
pub use resolver::*;
pub use route::*;
pub use settings::*;
pub use storage::*;

#[cfg(feature = "s3")]
pub use s3::*;
