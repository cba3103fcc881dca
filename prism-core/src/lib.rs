#![doc = "prism-core: client library for the Workday Prism Analytics data-loading API."]

//! Everything the `prism` CLI does is implemented here so it can be used as a
//! library as well.
//!
//! # Usage
//! Resolve [`config::Settings`], connect a [`client::PrismClient`] and drive it
//! through the operations in [`workflow`]. Code that only needs the REST calls
//! can depend on the [`contract::PrismApi`] trait instead.

pub mod auth;
pub mod client;
pub mod config;
pub mod contract;
pub mod error;
pub mod model;
pub mod schema;
pub mod upload;
pub mod workflow;

pub use client::PrismClient;
pub use contract::PrismApi;
pub use error::{PrismError, Result};
