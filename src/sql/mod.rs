//! Safe SQL builder: identifiers come from the schema model only, values are always bound parameters.

mod builder;
pub mod params;
mod placeholders;
pub use builder::*;
pub use params::*;
pub use placeholders::cast_placeholders;
