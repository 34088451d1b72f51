//! The upstream GraphQL transport (C1, §4.1).
//!
//! Everything above this crate sees [`UpstreamClient`] and the [`model`]
//! DTOs only; swapping upstreams means swapping the
//! [`GraphQlUpstreamClient`] implementation.

mod client;
pub mod error;
mod graphql;
pub mod model;

pub use client::UpstreamClient;
pub use error::{UpstreamError, UpstreamResult};
pub use graphql::{GraphQlUpstreamClient, LOG_TARGET};
pub use model::{Filter, Page, UpstreamItem};
