//! Schema model, catalog introspection and the reloadable registry.

mod loader;
mod model;
mod registry;
mod stats;

pub use loader::*;
pub use model::*;
pub use registry::*;
pub use stats::*;

#[cfg(test)]
pub(crate) use model::fixtures;
