//! Route handlers

pub mod health;
pub mod stress;
