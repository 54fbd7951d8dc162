//! DQ Monitor Core Library
//!
//! Contains domain models, the data-quality store abstraction, dynamic
//! break-record decoding and the health aggregation engine for the
//! DQ monitoring dashboard API.

pub mod adapter;
pub mod aggregate;
pub mod breaks;
pub mod domain;
pub mod error;
pub mod headers;
pub mod health;
pub mod sql_gen;

pub use error::{CoreError, Result};
