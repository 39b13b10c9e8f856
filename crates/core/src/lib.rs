//! Survey geometry, forward operator and operator cache for 2.5D DC
//! resistivity simulation.

pub mod cache;
pub mod geometry;
pub mod grid;
pub mod io;
pub mod operator;
pub mod simulate;

pub use cache::{CacheError, CacheOutcome, OperatorCache};
pub use geometry::{ArrayType, GeometryError, RawGeometry, SourceReceiverSet};
pub use grid::Mesh;
pub use io::{ConfigError, ForwardConfig};
pub use operator::{ForwardKernel, KernelError, Para, SensitivityKernel};
pub use simulate::{forward_simulation, ForwardContext, ForwardError, ForwardSimulator};

#[cfg(test)]
mod _tests_geometry;
#[cfg(test)]
mod _tests_grid;
#[cfg(test)]
mod _tests_io;
#[cfg(test)]
mod _tests_operator;
