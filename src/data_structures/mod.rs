//! Scene data: transforms, meshes, materials, procedural shapes and the scene graph.
//!
//! - `instance` holds node transforms and the per-draw GPU instance layout
//! - `model` contains mesh/material descriptions and the ids that reference them
//! - `primitives` generates boxes and planes for walls, floors and partitions
//! - `scene_graph` enables hierarchical scene organization
//! - `texture` wraps depth and shadow-map textures

pub mod instance;
pub mod model;
pub mod primitives;
pub mod scene_graph;
pub mod texture;
