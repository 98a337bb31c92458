//! Render pipelines and the lighting rig.
//!
//! - `basic` holds the lit forward pipeline, material bindings and the shared pipeline builder
//! - `light` describes the office lighting rig and its uniform layout
//! - `shadow` holds the depth-only shadow pipeline and the shadow cache

pub mod basic;
pub mod light;
pub mod shadow;
