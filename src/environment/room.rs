//! Room shell layout: floor and four walls, two of them with a doorway.

use cgmath::Vector3;

use crate::config::RoomConfig;

/// A box-shaped piece of the environment in the coordinates of its group.
#[derive(Debug, Clone, PartialEq)]
pub struct Piece {
    pub name: String,
    /// Full extents along x, y and z.
    pub size: Vector3<f32>,
    pub centre: Vector3<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    North,
    South,
    East,
    West,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::North, Side::South, Side::East, Side::West];

    pub fn name(&self) -> &'static str {
        match self {
            Side::North => "north",
            Side::South => "south",
            Side::East => "east",
            Side::West => "west",
        }
    }

    /// The north (-z) and east (+x) walls lead out of the office.
    pub fn has_doorway(&self) -> bool {
        matches!(self, Side::North | Side::East)
    }
}

/// A wall section in wall-local coordinates: `start..end` along the wall,
/// centred on zero, and `bottom..top` vertically.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub suffix: &'static str,
    pub start: f32,
    pub end: f32,
    pub bottom: f32,
    pub top: f32,
}

/// Splits a wall of `length` x `height` around a centred doorway into left,
/// right and top segments. A doorway that does not fit leaves the wall solid.
pub fn split_doorway(length: f32, height: f32, door_width: f32, door_height: f32) -> Vec<Span> {
    let fits = door_width > 0.0
        && door_height > 0.0
        && door_width < length
        && door_height < height;
    if !fits {
        return vec![Span {
            suffix: "",
            start: -length / 2.0,
            end: length / 2.0,
            bottom: 0.0,
            top: height,
        }];
    }
    let half_door = door_width / 2.0;
    vec![
        Span {
            suffix: "_left",
            start: -length / 2.0,
            end: -half_door,
            bottom: 0.0,
            top: height,
        },
        Span {
            suffix: "_right",
            start: half_door,
            end: length / 2.0,
            bottom: 0.0,
            top: height,
        },
        Span {
            suffix: "_top",
            start: -half_door,
            end: half_door,
            bottom: door_height,
            top: height,
        },
    ]
}

pub fn floor(room: &RoomConfig) -> Piece {
    Piece {
        name: "floor_main".to_string(),
        size: Vector3::new(room.width, 0.0, room.depth),
        centre: Vector3::new(0.0, 0.0, 0.0),
    }
}

/// All wall segments. North and south walls run the full width including the
/// corners; east and west walls fit between them.
pub fn walls(room: &RoomConfig) -> Vec<Piece> {
    let t = room.wall_thickness;
    let (half_w, half_d) = (room.width / 2.0, room.depth / 2.0);
    let mut pieces = Vec::new();
    for side in Side::ALL {
        let (length, along_x, offset) = match side {
            Side::North => (room.width + t, true, Vector3::new(0.0, 0.0, -half_d)),
            Side::South => (room.width + t, true, Vector3::new(0.0, 0.0, half_d)),
            Side::East => (room.depth - t, false, Vector3::new(half_w, 0.0, 0.0)),
            Side::West => (room.depth - t, false, Vector3::new(-half_w, 0.0, 0.0)),
        };
        let spans = if side.has_doorway() {
            split_doorway(length, room.height, room.door_width, room.door_height)
        } else {
            split_doorway(length, room.height, 0.0, 0.0)
        };
        for span in spans {
            let run = span.end - span.start;
            let mid = (span.start + span.end) / 2.0;
            let rise = span.top - span.bottom;
            let y = (span.top + span.bottom) / 2.0;
            let (size, centre) = if along_x {
                (Vector3::new(run, rise, t), offset + Vector3::new(mid, y, 0.0))
            } else {
                (Vector3::new(t, rise, run), offset + Vector3::new(0.0, y, mid))
            };
            pieces.push(Piece {
                name: format!("wall_{}{}", side.name(), span.suffix),
                size,
                centre,
            });
        }
    }
    pieces
}
