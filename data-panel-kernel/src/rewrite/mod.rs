//! Turn the logic SQL into one actual SQL per route unit.

pub mod builder;
pub mod context;
pub mod engine;
pub mod parameter;
pub mod token;
