//! `indexpilot-indexing` — interface to the platform's indexing service.
//!
//! The scheduler never talks to the third-party search API itself; it
//! delegates each bounded action to an [`IndexingService`], which performs
//! the actual URL submission or inspection and reports back an opaque
//! payload. [`HttpIndexingService`] is the production implementation.

pub mod action;
pub mod http;
pub mod service;

pub use action::ActionKind;
pub use http::HttpIndexingService;
pub use service::{IndexingService, ServiceError, SubmitRequest};
