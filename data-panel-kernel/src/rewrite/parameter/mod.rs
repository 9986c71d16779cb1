//! Parameters bound to the rewritten SQL.

pub mod builder;
pub mod rewriter;
