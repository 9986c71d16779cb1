//! Routing and rewriting core of the data panel.
//!
//! A bound statement goes through [`route::engine::SQLRouteEngine`], which
//! produces route units from the configured rules, and then through
//! [`rewrite::engine::RouteSQLRewriteEngine`], which renders one actual SQL
//! with its parameters per unit. [`kernel::KernelProcessor`] runs both.

#![warn(rust_2018_idioms)]

pub mod binder;
pub mod error;
pub mod kernel;
pub mod logic;
pub mod protocol;
pub mod rewrite;
pub mod route;
pub mod rule;
pub mod session;
pub mod value;
