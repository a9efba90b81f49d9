//! Twitter/X API integration.
//!
//! `client` shapes requests against the v2 REST API, `types` holds the
//! response models, and `gateway` turns raw results into [`Outcome`]s.
//!
//! [`Outcome`]: perspec_common::Outcome
pub mod client;
pub mod gateway;
pub mod types;

pub use client::TwitterApi;
pub use gateway::{TimelineRequest, TwitterGateway, failure_from_http, is_valid_handle, parse_handles};
