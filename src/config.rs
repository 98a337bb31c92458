//! Viewer configuration.
//!
//! Every knob has a default that produces the standard office layout. The
//! binary overrides a handful of them from the command line.

use std::path::PathBuf;

use crate::error::ViewerError;

/// Dimensions of the room shell. The floor is centred on the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomConfig {
    /// Extent along x.
    pub width: f32,
    /// Extent along z.
    pub depth: f32,
    pub height: f32,
    pub wall_thickness: f32,
    pub door_width: f32,
    pub door_height: f32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            width: 20.0,
            depth: 20.0,
            height: 3.0,
            wall_thickness: 0.2,
            door_width: 1.2,
            door_height: 2.2,
        }
    }
}

/// Layout of the cubicle grid.
#[derive(Debug, Clone, PartialEq)]
pub struct CubicleConfig {
    /// Number of generic cubicles next to the protagonist's one.
    pub count: usize,
    pub columns: usize,
    /// Side length of one cubicle footprint.
    pub size: f32,
    pub spacing: f32,
    pub partition_height: f32,
    pub partition_thickness: f32,
    /// Centre of the protagonist cubicle; generic cubicles extend from here.
    pub origin: [f32; 2],
}

impl Default for CubicleConfig {
    fn default() -> Self {
        Self {
            count: 5,
            columns: 3,
            size: 2.4,
            spacing: 3.2,
            partition_height: 1.4,
            partition_thickness: 0.06,
            origin: [-4.0, -4.0],
        }
    }
}

/// Where the furniture models live.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetConfig {
    pub root: PathBuf,
    pub desk: String,
    pub monitor: String,
    pub chair: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("assets"),
            desk: "desk.glb".to_string(),
            monitor: "monitor.glb".to_string(),
            chair: "chair.glb".to_string(),
        }
    }
}

/// Tuning of the first-person controller. Units are metres and seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementConfig {
    /// Thrust applied per second of held input.
    pub acceleration: f32,
    pub damping: f32,
    pub max_speed: f32,
    pub eye_height: f32,
    /// Rays are cast from this height.
    pub player_height: f32,
    pub collision_threshold: f32,
    /// Keeps the eye this far away from the walls when clamping to the room.
    pub wall_margin: f32,
    /// Sampling period while there is no movement intent.
    pub check_interval: f32,
    pub max_delta: f32,
    pub mouse_sensitivity: f32,
    pub spawn: [f32; 2],
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            acceleration: 50.0,
            damping: 10.0,
            max_speed: 4.0,
            eye_height: 1.6,
            player_height: 1.8,
            collision_threshold: 0.35,
            wall_margin: 0.25,
            check_interval: 0.1,
            max_delta: 0.1,
            mouse_sensitivity: 0.002,
            spawn: [0.0, 6.0],
        }
    }
}

impl MovementConfig {
    pub fn validate(&self) -> Result<(), ViewerError> {
        let positive = [
            ("acceleration", self.acceleration),
            ("damping", self.damping),
            ("max_speed", self.max_speed),
            ("eye_height", self.eye_height),
            ("player_height", self.player_height),
            ("collision_threshold", self.collision_threshold),
            ("max_delta", self.max_delta),
            ("mouse_sensitivity", self.mouse_sensitivity),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ViewerError::InvalidControls(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        if !self.check_interval.is_finite() || self.check_interval < 0.0 {
            return Err(ViewerError::InvalidControls(format!(
                "check_interval must not be negative, got {}",
                self.check_interval
            )));
        }
        if !self.wall_margin.is_finite() || self.wall_margin < 0.0 {
            return Err(ViewerError::InvalidControls(format!(
                "wall_margin must not be negative, got {}",
                self.wall_margin
            )));
        }
        if self.spawn.iter().any(|c| !c.is_finite()) {
            return Err(ViewerError::InvalidControls(
                "spawn point is not finite".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub room: RoomConfig,
    pub cubicles: CubicleConfig,
    pub assets: AssetConfig,
    pub movement: MovementConfig,
    pub debug_panel: bool,
    pub clear_colour: wgpu::Color,
    pub window_size: (u32, u32),
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            room: RoomConfig::default(),
            cubicles: CubicleConfig::default(),
            assets: AssetConfig::default(),
            movement: MovementConfig::default(),
            debug_panel: true,
            clear_colour: wgpu::Color {
                r: 0.05,
                g: 0.05,
                b: 0.07,
                a: 1.0,
            },
            window_size: (1280, 720),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_movement_is_valid() {
        assert!(MovementConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_speed() {
        let config = MovementConfig {
            max_speed: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ViewerError::InvalidControls(_))
        ));
    }

    #[test]
    fn rejects_nan_spawn() {
        let config = MovementConfig {
            spawn: [f32::NAN, 0.0],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_spawn_is_inside_the_room() {
        let room = RoomConfig::default();
        let movement = MovementConfig::default();
        assert!(movement.spawn[0].abs() < room.width / 2.0);
        assert!(movement.spawn[1].abs() < room.depth / 2.0);
        assert!(movement.eye_height < room.height);
    }
}
