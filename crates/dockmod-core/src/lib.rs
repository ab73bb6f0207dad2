//! Core types shared by dockmod modules
//!
//! This crate provides argument-file loading and the structured result
//! envelope every module writes to standard output before exiting.

pub mod args;
pub mod error;
pub mod response;

pub use args::load_arguments;
pub use error::{Error, Result};
pub use response::Response;
