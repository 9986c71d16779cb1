//! The bound statement the kernel consumes, plus the binder pieces the kernel
//! takes part in: wildcard expansion and column ownership resolution.

pub mod column;
pub mod context;
pub mod segment;
pub mod shorthand;
pub mod statement;

pub use self::statement::{BoundStatementContext, StatementType};
