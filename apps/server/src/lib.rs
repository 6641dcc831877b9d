pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod main_lib;

pub use main_lib::{build_state, build_state_from_catalog, init_tracing, AppState};
