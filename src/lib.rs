//! Keep several viewers of one video in lockstep through a shared
//! last-write-wins room store.

pub mod client;
pub mod config;
pub mod error;
pub mod player;
pub mod store;
pub mod utils;

pub use client::{SessionManager, SyncEngine};
pub use error::{Error, Result};
