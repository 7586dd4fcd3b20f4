//! Core document model for bee reference boards.
//!
//! Items, the scene that holds them, the undo/redo log that mutates the
//! scene, and the background worker protocol used to keep archive I/O off the
//! interactive thread. This crate is free of database dependencies; the
//! archive format lives in `bee-store-sqlite`.

pub mod command;
pub mod error;
pub mod export;
pub mod item;
pub mod scene;
pub mod worker;

pub use error::{Error, Result};

#[cfg(test)]
mod tests;
