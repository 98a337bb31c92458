//! First-person movement with ray-sampled collision avoidance.
//!
//! The controller is a small state machine. While unlocked it ignores input
//! and keeps the player still. Once the pointer is locked every update damps
//! the velocity, adds thrust along the held directions unless a wall is in
//! the way, clamps the speed, moves the camera and validates the result
//! against the room bounds. The very first update only records the start
//! position and caches the collidables.

use std::{cell::RefCell, rc::Rc};

use cgmath::{InnerSpace, Point3, Vector2, Vector3, Zero};
use winit::keyboard::KeyCode;

use crate::{
    camera::Camera,
    collision::{self, CollidableSet},
    config::{MovementConfig, RoomConfig},
    error::ViewerError,
};

/// Velocities below this are treated as rest.
const REST_SPEED: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    /// First update not run yet.
    Priming,
    Unlocked,
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
}

impl Direction {
    pub fn from_key(code: KeyCode) -> Option<Self> {
        match code {
            KeyCode::KeyW | KeyCode::ArrowUp => Some(Direction::Forward),
            KeyCode::KeyS | KeyCode::ArrowDown => Some(Direction::Backward),
            KeyCode::KeyA | KeyCode::ArrowLeft => Some(Direction::Left),
            KeyCode::KeyD | KeyCode::ArrowRight => Some(Direction::Right),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementIntent {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

impl MovementIntent {
    pub fn set(&mut self, direction: Direction, active: bool) {
        match direction {
            Direction::Forward => self.forward = active,
            Direction::Backward => self.backward = active,
            Direction::Left => self.left = active,
            Direction::Right => self.right = active,
        }
    }

    /// Unit vector in camera space, x to the right and y forward. Zero when
    /// opposite keys cancel out.
    pub fn vector(&self) -> Vector2<f32> {
        let axis = |positive: bool, negative: bool| positive as i8 as f32 - negative as i8 as f32;
        let raw = Vector2::new(
            axis(self.right, self.left),
            axis(self.forward, self.backward),
        );
        if raw.is_zero() { raw } else { raw.normalize() }
    }

    pub fn is_idle(&self) -> bool {
        self.vector().is_zero()
    }
}

/// Axis-aligned box the eye must stay in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoomBounds {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl RoomBounds {
    /// Inner floor area of the room, kept `wall_margin` away from the walls.
    pub fn new(room: &RoomConfig, movement: &MovementConfig) -> Result<Self, ViewerError> {
        let inset = room.wall_thickness / 2.0 + movement.wall_margin;
        let half_w = room.width / 2.0 - inset;
        let half_d = room.depth / 2.0 - inset;
        if !(half_w > 0.0 && half_d > 0.0 && movement.eye_height < room.height) {
            return Err(ViewerError::InvalidControls(format!(
                "room {}x{}x{} leaves no space to stand in",
                room.width, room.depth, room.height
            )));
        }
        Ok(Self {
            min: Vector3::new(-half_w, 0.0, -half_d),
            max: Vector3::new(half_w, room.height, half_d),
        })
    }

    pub fn contains(&self, p: Point3<f32>) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    pub fn clamp(&self, p: Point3<f32>) -> Point3<f32> {
        Point3::new(
            p.x.clamp(self.min.x, self.max.x),
            p.y.clamp(self.min.y, self.max.y),
            p.z.clamp(self.min.z, self.max.z),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub position: Point3<f32>,
    /// Camera-space velocity: x strafes right, y moves forward.
    pub velocity: Vector2<f32>,
    pub last_valid: Point3<f32>,
    pub intent: MovementIntent,
}

/// What one update did, mostly for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepReport {
    pub delta: f32,
    /// Blocked strafe and forward axes.
    pub blocked: [bool; 2],
    pub rolled_back: bool,
}

pub struct MovementController {
    config: MovementConfig,
    bounds: RoomBounds,
    state: ControlState,
    lock_requested: bool,
    player: PlayerState,
    collidables: Rc<RefCell<CollidableSet>>,
    cache: CollidableSet,
    since_check: f32,
    disposed: bool,
}

impl MovementController {
    pub fn new(
        config: &MovementConfig,
        room: &RoomConfig,
        camera: &Camera,
        collidables: Rc<RefCell<CollidableSet>>,
    ) -> Result<Self, ViewerError> {
        config.validate()?;
        let bounds = RoomBounds::new(room, config)?;
        let p = camera.position;
        if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
            return Err(ViewerError::InvalidCamera(format!(
                "camera starts at a non-finite position {p:?}"
            )));
        }
        Ok(Self {
            config: config.clone(),
            bounds,
            state: ControlState::Priming,
            lock_requested: false,
            player: PlayerState {
                position: p,
                velocity: Vector2::zero(),
                last_valid: p,
                intent: MovementIntent::default(),
            },
            collidables,
            cache: CollidableSet::new(),
            since_check: 0.0,
            disposed: false,
        })
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        self.state == ControlState::Locked
    }

    pub fn player(&self) -> &PlayerState {
        &self.player
    }

    pub fn bounds(&self) -> &RoomBounds {
        &self.bounds
    }

    pub fn speed(&self) -> f32 {
        self.player.velocity.magnitude()
    }

    /// Pointer captured. A lock requested while priming takes effect right
    /// after the priming update.
    pub fn lock(&mut self) {
        if self.disposed {
            return;
        }
        match self.state {
            ControlState::Priming => self.lock_requested = true,
            _ => self.state = ControlState::Locked,
        }
    }

    /// Pointer released: stop immediately.
    pub fn unlock(&mut self) {
        self.lock_requested = false;
        if self.state == ControlState::Locked {
            self.state = ControlState::Unlocked;
        }
        self.player.velocity = Vector2::zero();
    }

    pub fn set_intent(&mut self, direction: Direction, active: bool) {
        if !self.disposed {
            self.player.intent.set(direction, active);
        }
    }

    /// Returns true if the key is a movement key.
    pub fn handle_key(&mut self, code: KeyCode, pressed: bool) -> bool {
        match Direction::from_key(code) {
            Some(direction) => {
                self.set_intent(direction, pressed);
                true
            }
            None => false,
        }
    }

    pub fn on_pointer_move(&self, camera: &mut Camera, dx: f64, dy: f64) {
        if self.is_locked() && !self.disposed {
            camera.rotate(dx as f32, dy as f32, self.config.mouse_sensitivity);
        }
    }

    /// Stops reacting to input. Updates after this are no-ops.
    pub fn dispose(&mut self) {
        self.unlock();
        self.player.intent = MovementIntent::default();
        self.disposed = true;
    }

    fn refresh_cache(&mut self) {
        let shared = self.collidables.borrow();
        if shared.version() != self.cache.version() || self.state == ControlState::Priming {
            self.cache = shared.clone();
        }
    }

    /// Whether moving along `direction` is blocked: a hit within the
    /// threshold on any ray of the ring blocks the axis.
    fn blocked(&self, origin: Vector3<f32>, direction: Vector3<f32>) -> bool {
        if self.cache.is_empty() {
            return false;
        }
        collision::sample_ring(&self.cache, origin, direction)
            .iter()
            .any(|hit| hit.is_some_and(|distance| distance <= self.config.collision_threshold))
    }

    fn axis_direction(camera: &Camera, axis: usize, sign: f32) -> Vector3<f32> {
        let base = if axis == 0 {
            camera.right_flat()
        } else {
            camera.forward_flat()
        };
        base * sign
    }

    /// Advances the simulation by `elapsed` seconds and moves the camera.
    pub fn update(&mut self, camera: &mut Camera, elapsed: f32) -> StepReport {
        let mut report = StepReport::default();
        if self.disposed {
            return report;
        }

        if self.state == ControlState::Priming {
            self.refresh_cache();
            let start = self.bounds.clamp(Point3::new(
                camera.position.x,
                self.config.eye_height,
                camera.position.z,
            ));
            camera.position = start;
            self.player.position = start;
            self.player.last_valid = start;
            self.player.velocity = Vector2::zero();
            self.state = if std::mem::take(&mut self.lock_requested) {
                ControlState::Locked
            } else {
                ControlState::Unlocked
            };
            return report;
        }
        self.refresh_cache();

        if self.state == ControlState::Unlocked {
            self.player.velocity = Vector2::zero();
            camera.position.y = self.config.eye_height;
            camera.position = self.validate_position(camera.position);
            self.player.position = camera.position;
            return report;
        }

        let dt = if elapsed.is_finite() {
            elapsed.clamp(0.0, self.config.max_delta)
        } else {
            0.0
        };
        report.delta = dt;

        let damping = (1.0 - self.config.damping * dt).max(0.0);
        self.player.velocity *= damping;

        let origin = Vector3::new(
            camera.position.x,
            self.config.player_height / 2.0,
            camera.position.z,
        );
        let intent = self.player.intent.vector();
        if !intent.is_zero() {
            self.since_check = 0.0;
            for axis in 0..2 {
                let component = intent[axis];
                if component == 0.0 {
                    continue;
                }
                let direction = Self::axis_direction(camera, axis, component.signum());
                if self.blocked(origin, direction) {
                    self.player.velocity[axis] = 0.0;
                    report.blocked[axis] = true;
                } else {
                    self.player.velocity[axis] += component * self.config.acceleration * dt;
                }
            }
        } else if !self.player.velocity.is_zero() {
            self.since_check += dt;
            if self.since_check >= self.config.check_interval {
                self.since_check = 0.0;
                for axis in 0..2 {
                    let component = self.player.velocity[axis];
                    if component == 0.0 {
                        continue;
                    }
                    let direction = Self::axis_direction(camera, axis, component.signum());
                    if self.blocked(origin, direction) {
                        self.player.velocity[axis] = 0.0;
                        report.blocked[axis] = true;
                    }
                }
            }
        }

        let speed = self.player.velocity.magnitude();
        if speed > self.config.max_speed {
            self.player.velocity *= self.config.max_speed / speed;
        } else if speed < REST_SPEED && intent.is_zero() {
            self.player.velocity = Vector2::zero();
        }

        camera.move_right(self.player.velocity.x * dt);
        camera.move_forward(self.player.velocity.y * dt);
        camera.position.y = self.config.eye_height;

        let candidate = camera.position;
        camera.position = self.validate_position(candidate);
        report.rolled_back = camera.position != candidate;
        self.player.position = camera.position;
        report
    }

    /// Commits `candidate` if it is finite and inside the room, otherwise
    /// returns the last valid position and stops the player.
    pub fn validate_position(&mut self, candidate: Point3<f32>) -> Point3<f32> {
        let finite = candidate.x.is_finite() && candidate.y.is_finite() && candidate.z.is_finite();
        if finite && self.bounds.contains(candidate) {
            self.player.last_valid = candidate;
            candidate
        } else {
            log::warn!(
                "rejected player position {:?}, rolling back to {:?}",
                candidate,
                self.player.last_valid
            );
            self.player.velocity = Vector2::zero();
            self.player.last_valid
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::Aabb;
    use cgmath::Deg;

    const FRAME: f32 = 1.0 / 60.0;

    fn controller_with(boxes: Vec<Aabb>) -> (MovementController, Camera) {
        let camera = Camera::new((0.0, 1.6, 0.0), Deg(-90.0), Deg(0.0));
        let set = Rc::new(RefCell::new(CollidableSet::new()));
        set.borrow_mut().replace(boxes);
        let mut controller = MovementController::new(
            &MovementConfig::default(),
            &RoomConfig::default(),
            &camera,
            set,
        )
        .unwrap();
        let mut camera = camera;
        controller.update(&mut camera, FRAME);
        controller.lock();
        (controller, camera)
    }

    #[test]
    fn priming_update_does_not_move() {
        let camera = Camera::new((1.0, 5.0, 2.0), Deg(-90.0), Deg(0.0));
        let mut controller = MovementController::new(
            &MovementConfig::default(),
            &RoomConfig::default(),
            &camera,
            Rc::new(RefCell::new(CollidableSet::new())),
        )
        .unwrap();
        controller.set_intent(Direction::Forward, true);
        controller.lock();
        let mut camera = camera;
        assert_eq!(controller.state(), ControlState::Priming);
        controller.update(&mut camera, 0.1);
        assert_eq!(controller.state(), ControlState::Locked);
        assert_eq!(camera.position, Point3::new(1.0, 1.6, 2.0));
        assert!(controller.player().velocity.is_zero());
    }

    #[test]
    fn unlocked_ignores_input() {
        let (mut controller, mut camera) = controller_with(Vec::new());
        controller.unlock();
        controller.set_intent(Direction::Forward, true);
        let start = camera.position;
        for _ in 0..30 {
            controller.update(&mut camera, FRAME);
        }
        assert_eq!(camera.position, start);
        assert_eq!(controller.speed(), 0.0);
    }

    #[test]
    fn eye_height_is_forced() {
        let (mut controller, mut camera) = controller_with(Vec::new());
        controller.set_intent(Direction::Forward, true);
        for _ in 0..10 {
            camera.position.y = 3.0;
            controller.update(&mut camera, FRAME);
            assert_eq!(camera.position.y, 1.6);
        }
    }

    #[test]
    fn delta_is_clamped() {
        let (mut controller, mut camera) = controller_with(Vec::new());
        controller.set_intent(Direction::Forward, true);
        let report = controller.update(&mut camera, 2.0);
        assert_eq!(report.delta, 0.1);
        let report = controller.update(&mut camera, f32::NAN);
        assert_eq!(report.delta, 0.0);
    }

    #[test]
    fn idle_velocity_decays_monotonically_to_zero() {
        let (mut controller, mut camera) = controller_with(Vec::new());
        controller.set_intent(Direction::Forward, true);
        for _ in 0..30 {
            controller.update(&mut camera, FRAME);
        }
        controller.set_intent(Direction::Forward, false);
        let mut previous = controller.speed();
        assert!(previous > 0.0);
        let mut reached_zero = false;
        for _ in 0..600 {
            controller.update(&mut camera, FRAME);
            let speed = controller.speed();
            if reached_zero {
                assert_eq!(speed, 0.0);
            } else if speed == 0.0 {
                reached_zero = true;
            } else {
                assert!(speed < previous);
            }
            previous = speed;
        }
        assert!(reached_zero);
    }

    #[test]
    fn speed_never_exceeds_the_maximum() {
        let (mut controller, mut camera) = controller_with(Vec::new());
        controller.set_intent(Direction::Forward, true);
        controller.set_intent(Direction::Right, true);
        for _ in 0..60 {
            controller.update(&mut camera, FRAME);
            assert!(controller.speed() <= 4.0 + 1e-4);
        }
    }

    #[test]
    fn wall_at_threshold_blocks_forward_motion() {
        // Camera looks down -z; the box face sits exactly at the threshold.
        let threshold = MovementConfig::default().collision_threshold;
        let wall = Aabb::new(
            Vector3::new(-2.0, 0.0, -threshold - 0.2),
            Vector3::new(2.0, 3.0, -threshold),
        );
        let (mut controller, mut camera) = controller_with(vec![wall]);
        controller.set_intent(Direction::Forward, true);
        let start = camera.position;
        for _ in 0..30 {
            let report = controller.update(&mut camera, FRAME);
            assert!(report.blocked[1]);
        }
        assert!((camera.position.z - start.z).abs() < 1e-6);
        assert_eq!(controller.player().velocity.y, 0.0);
    }

    #[test]
    fn wall_close_behind_blocks_forward_thrust() {
        // Looking down -z with a wall 0.2 behind at +z.
        let wall = Aabb::new(Vector3::new(-2.0, 0.0, 0.2), Vector3::new(2.0, 3.0, 0.4));
        let (mut controller, mut camera) = controller_with(vec![wall]);
        controller.set_intent(Direction::Forward, true);
        let start = camera.position;
        for _ in 0..10 {
            let report = controller.update(&mut camera, FRAME);
            assert!(report.blocked[1]);
        }
        assert_eq!(camera.position, start);
        assert_eq!(controller.player().velocity.y, 0.0);
    }

    #[test]
    fn wall_out_of_reach_does_not_block() {
        let threshold = MovementConfig::default().collision_threshold;
        let wall = Aabb::new(
            Vector3::new(-2.0, 0.0, threshold + 0.5),
            Vector3::new(2.0, 3.0, threshold + 0.7),
        );
        let (mut controller, mut camera) = controller_with(vec![wall]);
        controller.set_intent(Direction::Forward, true);
        let start = camera.position;
        for _ in 0..10 {
            let report = controller.update(&mut camera, FRAME);
            assert!(!report.blocked[1]);
        }
        assert!(camera.position.z < start.z);
    }

    #[test]
    fn nearby_wall_blocks_strafing_too() {
        let threshold = MovementConfig::default().collision_threshold;
        let wall = Aabb::new(
            Vector3::new(-5.0, 0.0, -threshold - 0.2),
            Vector3::new(5.0, 3.0, -threshold + 0.05),
        );
        let (mut controller, mut camera) = controller_with(vec![wall]);
        controller.set_intent(Direction::Right, true);
        let start = camera.position;
        for _ in 0..10 {
            let report = controller.update(&mut camera, FRAME);
            assert!(report.blocked[0]);
        }
        assert_eq!(camera.position, start);
    }

    #[test]
    fn validate_position_rolls_back_invalid_candidates() {
        let (mut controller, _camera) = controller_with(Vec::new());
        let valid = controller.player().last_valid;
        let outside = Point3::new(100.0, 1.6, 0.0);
        assert_eq!(controller.validate_position(outside), valid);
        let nan = Point3::new(f32::NAN, 1.6, 0.0);
        assert_eq!(controller.validate_position(nan), valid);
        let inside = Point3::new(1.0, 1.6, 1.0);
        assert_eq!(controller.validate_position(inside), inside);
        assert_eq!(controller.player().last_valid, inside);
    }

    #[test]
    fn position_stays_inside_the_room() {
        let (mut controller, mut camera) = controller_with(Vec::new());
        controller.set_intent(Direction::Forward, true);
        for _ in 0..600 {
            controller.update(&mut camera, FRAME);
            assert!(controller.bounds().contains(camera.position));
        }
    }

    #[test]
    fn keys_map_to_directions() {
        assert_eq!(Direction::from_key(KeyCode::KeyW), Some(Direction::Forward));
        assert_eq!(Direction::from_key(KeyCode::ArrowLeft), Some(Direction::Left));
        assert_eq!(Direction::from_key(KeyCode::Space), None);
    }

    #[test]
    fn opposite_keys_cancel() {
        let mut intent = MovementIntent::default();
        intent.set(Direction::Left, true);
        intent.set(Direction::Right, true);
        assert!(intent.is_idle());
        intent.set(Direction::Forward, true);
        assert_eq!(intent.vector(), Vector2::new(0.0, 1.0));
    }

    #[test]
    fn invalid_configuration_is_fatal() {
        let camera = Camera::new((0.0, 1.6, 0.0), Deg(-90.0), Deg(0.0));
        let config = MovementConfig {
            damping: -1.0,
            ..Default::default()
        };
        let result = MovementController::new(
            &config,
            &RoomConfig::default(),
            &camera,
            Rc::new(RefCell::new(CollidableSet::new())),
        );
        assert!(matches!(result, Err(ViewerError::InvalidControls(_))));
    }
}
