//! cubicle-view
//!
//! A first-person walkthrough of a procedurally built office floor. The room
//! shell and cubicle partitions are generated from box primitives, the
//! furniture is streamed in from GLB files, and the player walks around with
//! ray-based collision against everything built.
//!
//! High-level modules
//! - `render`: scene graph, camera, lights and the GPU resource ledger
//! - `backend`: the `wgpu` renderer and a recording headless backend
//! - `environment`: room, cubicles, furniture loading and teardown
//! - `movement`: pointer-locked first-person controller
//! - `viewer`: mount, frame and unmount of the three parts above
//! - `flow`: the winit host driving a `Viewer`
//! - `debug`: live transform tuning panel
//!

pub mod backend;
pub mod camera;
pub mod collision;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod debug;
pub mod environment;
pub mod error;
pub mod flow;
pub mod movement;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod story;
pub mod viewer;

pub use config::ViewerConfig;
pub use error::{RenderError, ViewerError};
pub use viewer::Viewer;
