//! Runtime configuration, passed explicitly into state and services.

mod env;

pub use env::*;
