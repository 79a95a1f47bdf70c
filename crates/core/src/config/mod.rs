pub mod registry_config;
pub mod sources;
pub mod validation;

pub use registry_config::*;
pub use sources::*;
pub use validation::*;
