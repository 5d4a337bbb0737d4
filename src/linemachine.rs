//! Main module for linemachine functionality

pub mod config;
pub mod engine;
pub mod error;
pub mod lines;
pub mod loader;
pub mod state;
pub mod testing;
