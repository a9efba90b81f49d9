//! Social network clients used by Perspec.
//!
//! Only Twitter/X is implemented. [`twitter::TwitterApi`] exposes the raw v2
//! endpoints; the [`twitter::TwitterGateway`] trait is the fail-soft surface
//! the pipeline consumes.
pub mod twitter;
