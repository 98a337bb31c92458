//! Cubicle grid layout.
//!
//! Cubicle 0 belongs to the protagonist, the generic ones follow it on a
//! fixed grid. Every cubicle is open towards +z.

use cgmath::Vector3;

use crate::{
    config::{AssetConfig, CubicleConfig},
    data_structures::instance::Transform,
    environment::room::Piece,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FurnitureKind {
    Desk,
    Monitor,
    Chair,
}

impl FurnitureKind {
    pub const ALL: [FurnitureKind; 3] = [
        FurnitureKind::Desk,
        FurnitureKind::Monitor,
        FurnitureKind::Chair,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FurnitureKind::Desk => "desk",
            FurnitureKind::Monitor => "monitor",
            FurnitureKind::Chair => "chair",
        }
    }

    pub fn file<'a>(&self, assets: &'a AssetConfig) -> &'a str {
        match self {
            FurnitureKind::Desk => &assets.desk,
            FurnitureKind::Monitor => &assets.monitor,
            FurnitureKind::Chair => &assets.chair,
        }
    }

    /// Placeholder transform relative to the cubicle centre.
    pub fn placement(&self, config: &CubicleConfig) -> Transform {
        let back = -config.size / 2.0;
        match self {
            FurnitureKind::Desk => Transform::at(0.0, 0.0, back + 0.45),
            FurnitureKind::Monitor => Transform::at(0.0, 0.75, back + 0.3),
            FurnitureKind::Chair => {
                Transform::at(0.0, 0.0, back + 1.2).with_yaw(std::f32::consts::PI)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CubicleSlot {
    pub index: usize,
    pub protagonist: bool,
    pub centre: Vector3<f32>,
}

impl CubicleSlot {
    pub fn name(&self) -> String {
        format!("cubicle_{:02}", self.index)
    }
}

/// The protagonist cubicle followed by `config.count` generic ones.
pub fn grid(config: &CubicleConfig) -> Vec<CubicleSlot> {
    let columns = config.columns.max(1);
    (0..=config.count)
        .map(|index| {
            let col = index % columns;
            let row = index / columns;
            CubicleSlot {
                index,
                protagonist: index == 0,
                centre: Vector3::new(
                    config.origin[0] + col as f32 * config.spacing,
                    0.0,
                    config.origin[1] + row as f32 * config.spacing,
                ),
            }
        })
        .collect()
}

/// Back, left and right partitions relative to the cubicle centre.
pub fn partitions(slot: &CubicleSlot, config: &CubicleConfig) -> [Piece; 3] {
    let (s, h, t) = (config.size, config.partition_height, config.partition_thickness);
    let name = slot.name();
    [
        Piece {
            name: format!("{name}_back"),
            size: Vector3::new(s, h, t),
            centre: Vector3::new(0.0, h / 2.0, -s / 2.0),
        },
        Piece {
            name: format!("{name}_left"),
            size: Vector3::new(t, h, s),
            centre: Vector3::new(-s / 2.0, h / 2.0, 0.0),
        },
        Piece {
            name: format!("{name}_right"),
            size: Vector3::new(t, h, s),
            centre: Vector3::new(s / 2.0, h / 2.0, 0.0),
        },
    ]
}
