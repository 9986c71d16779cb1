//! Shared plumbing of the data panel crates: configuration, logging and the common error type.

#![warn(rust_2018_idioms)]

pub mod common;
pub mod config;
pub mod logging;
