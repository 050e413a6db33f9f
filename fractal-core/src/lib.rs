//! Animated fractal tree: hierarchical transform propagation for
//! instanced rendering.
//!
//! Main components:
//! - [`table`] - flat per-level storage of parts and transforms.
//! - [`factory`] - construction and population of parts.
//! - [`kernel`] - per-part and per-level transform math.
//! - [`scheduler`] - level-by-level frame driver.
//! - [`export`] - per-level draw requests for a renderer.
//! - [`fractal`] - activate / deactivate / reconfigure lifecycle.
//! - [`config`] - validated host configuration.
//! - [`part`] - part and instance-transform value types.
//! - [`error`] - crate error type.
//! - [`types`] - shared index aliases and constants.

pub mod config;
pub mod error;
pub mod export;
pub mod factory;
pub mod fractal;
pub mod kernel;
pub mod part;
pub mod scheduler;
pub mod table;
pub mod types;

pub use config::{FractalConfig, ShadingConfig, ValueRange};
pub use error::{FractalError, Result};
pub use export::{DrawRequest, InstanceExporter, MeshKind, Renderer, ShadingParams};
pub use fractal::Fractal;
pub use kernel::RootTransform;
pub use part::{FractalPart, InstanceTransform};
pub use scheduler::{ExecutionStrategy, FractalScheduler};
pub use table::PartTable;
