//! Wire formats shared with the database protocol front ends.

pub mod postgresql;
