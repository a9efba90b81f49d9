//! HTTP surface of Perspec.
//!
//! [`app::router`] wires the routes onto an [`app::AppState`];
//! [`startup::build_orchestrator`] turns a loaded configuration into the
//! pipeline the handlers call.
pub mod app;
pub mod envelope;
pub mod handlers;
pub mod startup;
