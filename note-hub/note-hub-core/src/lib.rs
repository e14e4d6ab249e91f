//! Core library for note-hub: the folder hierarchy manager, its
//! filesystem-backed document store, the typed error taxonomy, the identity
//! seam, and the event bus.

pub mod auth;
pub mod error;
pub mod events;
pub mod storage;

pub use error::{Error, Result};
