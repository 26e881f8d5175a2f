#![warn(clippy::unwrap_used)]

pub mod rest;
pub mod server;
pub mod signature;
pub mod webhook;

pub use server::{router, ApiServer, AppState};
