//! Feed lifecycle: provision the topology, reset mutable state, seed demo content.

pub mod error;
mod orchestrator;
mod reset;
mod seed;
mod topology;

pub use error::{DefinitionKind, PipelineError, ProvisionError, ResetError, SeedError};
pub use orchestrator::Pipeline;
pub use reset::ResetEngine;
pub use seed::{SeedEngine, SeedOptions};
pub use topology::TopologyProvisioner;
