//! # nectarclient-lib
//!
//! Resource and response modelling shared by Nectar cloud API clients.
//!
//! Service clients perform the HTTP calls; this crate turns what comes back
//! into typed values. Successful bodies become [`Resource`]s or
//! [`WithMeta`] containers tagged with the request IDs of the response.
//! Failed responses become an [`HttpException`] chosen by status code.
//!
//! ## Modules
//!
//! - [`base`] - Resources, managers and identifier resolution
//! - [`meta`] - Values tagged with request IDs
//! - [`response`] - Response views, request-ID extraction, `reqwest` adapter
//! - [`exceptions`] - HTTP exception taxonomy and classification
//! - [`datetime`] - Timestamp parsing for datetime fields
//! - [`config`] - Modelling configuration
//! - [`error`] - Error type and result alias

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod base;
pub mod config;
pub mod datetime;
pub mod error;
pub mod exceptions;
pub mod meta;
pub mod response;

// Re-export commonly used types
pub use base::{
    getid, FieldValue, GenericResource, HasId, Manager, ManagerWithFind, Resource, ResourceKind,
};
pub use config::ModelConfig;
pub use error::{Error, Result};
pub use exceptions::{from_response, ErrorInfo, HttpException};
pub use meta::{BytesWithMeta, DictWithMeta, ListWithMeta, StrWithMeta, TupleWithMeta, WithMeta};
pub use response::{request_ids, HttpResponse, ResponseMeta};
