//! NOTAM service for Saudi Arabian airports.
//!
//! Serves filtered notices over REST from an in-memory snapshot that is
//! persisted to a single JSON file and refreshed on a fixed cadence.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod geo;
pub mod model;
pub mod query;
pub mod scheduler;
pub mod service;
pub mod source;
pub mod store;

pub use crate::config::Config;
pub use crate::error::{Error, Result};
pub use crate::model::{KSA_AIRPORTS, Notam, NotamStatus, NotamType, Priority};
pub use crate::service::NotamService;
