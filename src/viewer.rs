//! Viewer lifecycle.
//!
//! [`Viewer::mount`] wires the render manager, the movement controller and
//! the environment builder together; [`Viewer::frame`] runs one tick of the
//! loop; [`Viewer::unmount`] tears everything down in reverse order. The
//! host (see [`crate::flow`]) drives frames and forwards input.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
    sync::Arc,
};

use instant::Instant;
use winit::{event::WindowEvent, keyboard::KeyCode, window::Window};

use crate::{
    backend::{RenderBackend, WgpuBackend},
    collision::CollidableSet,
    config::ViewerConfig,
    environment::EnvironmentBuilder,
    error::{RenderError, ViewerError},
    movement::MovementController,
    render::RenderManager,
    resources::AssetLoader,
    story::StoryRecord,
};

pub struct Viewer {
    render: Option<RenderManager>,
    movement: Option<MovementController>,
    environment: Option<EnvironmentBuilder>,
    alive: Rc<Cell<bool>>,
    listening_for_resize: bool,
    story: Option<StoryRecord>,
    last_frame: Instant,
}

impl Viewer {
    /// Mounts onto a window-backed `wgpu` surface. `None` means there is
    /// nothing to mount onto.
    pub async fn mount_window(
        window: Option<Arc<Window>>,
        config: &ViewerConfig,
        loader: Rc<dyn AssetLoader>,
        story: Option<StoryRecord>,
    ) -> Result<Self, ViewerError> {
        let size = window
            .as_ref()
            .map(|w| w.inner_size())
            .ok_or(ViewerError::MissingSurface)?;
        let backend = WgpuBackend::new(window).await?;
        Self::mount(Box::new(backend), (size.width, size.height), config, loader, story)
    }

    /// Creates the render manager, the movement controller and the
    /// environment builder in that order, then starts loading the
    /// environment. Any failure is returned before the first frame.
    pub fn mount(
        backend: Box<dyn RenderBackend>,
        size: (u32, u32),
        config: &ViewerConfig,
        loader: Rc<dyn AssetLoader>,
        story: Option<StoryRecord>,
    ) -> Result<Self, ViewerError> {
        let mut render = RenderManager::initialize(backend, size, config)?;

        let collidables = Rc::new(RefCell::new(CollidableSet::new()));
        let movement = match MovementController::new(
            &config.movement,
            &config.room,
            &render.camera,
            collidables.clone(),
        ) {
            Ok(movement) => movement,
            Err(err) => {
                render.dispose();
                return Err(err);
            }
        };

        let alive = Rc::new(Cell::new(true));
        let mut environment = EnvironmentBuilder::new(config, loader, collidables, alive.clone());
        environment.load(&mut render);
        log::info!("viewer mounted at {}x{}", size.0, size.1);

        Ok(Self {
            render: Some(render),
            movement: Some(movement),
            environment: Some(environment),
            alive,
            listening_for_resize: true,
            story,
            last_frame: Instant::now(),
        })
    }

    pub fn is_mounted(&self) -> bool {
        self.alive.get()
    }

    pub fn render_manager(&self) -> Option<&RenderManager> {
        self.render.as_ref()
    }

    pub fn render_manager_mut(&mut self) -> Option<&mut RenderManager> {
        self.render.as_mut()
    }

    pub fn movement(&self) -> Option<&MovementController> {
        self.movement.as_ref()
    }

    pub fn environment(&self) -> Option<&EnvironmentBuilder> {
        self.environment.as_ref()
    }

    pub fn environment_mut(&mut self) -> Option<&mut EnvironmentBuilder> {
        self.environment.as_mut()
    }

    pub fn story(&self) -> Option<&StoryRecord> {
        self.story.as_ref()
    }

    /// One tick measured against the wall clock.
    pub fn frame(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.frame_with_delta(elapsed);
    }

    /// One tick: attach finished loads, apply debug edits, move, render.
    /// Render failures are handled here and never returned.
    pub fn frame_with_delta(&mut self, elapsed: f32) {
        if !self.alive.get() {
            return;
        }
        let Self {
            render: Some(render),
            movement,
            environment,
            story,
            ..
        } = self
        else {
            return;
        };

        if let Some(environment) = environment.as_mut() {
            environment.poll(render);
            if environment.debug_mut().apply(&mut render.scene) {
                // Edited groups carry walls and partitions with them.
                environment.rebuild_collidables(render);
            }
            environment.debug_mut().sync(&render.scene);
        }
        if let Some(movement) = movement.as_mut() {
            movement.update(&mut render.camera, elapsed);
        }

        let wants_overlay = environment
            .as_ref()
            .is_some_and(|env| env.debug().is_enabled())
            || story.is_some();
        let result = if wants_overlay {
            let mut overlay = |ctx: &egui::Context| {
                if let Some(environment) = environment.as_mut() {
                    environment.debug_mut().show(ctx);
                }
                if let Some(story) = story.as_ref() {
                    story.show(ctx);
                }
            };
            render.render(Some(&mut overlay))
        } else {
            render.render(None)
        };

        match result {
            Ok(()) => {}
            Err(RenderError::SurfaceLost | RenderError::SurfaceOutdated) => render.reconfigure(),
            Err(err) => log::error!("{err}"),
        }
    }

    /// Forwards a new surface size. Silently ignored when not mounted.
    pub fn resize(&mut self, width: u32, height: u32) {
        if !self.listening_for_resize {
            return;
        }
        if let Some(render) = self.render.as_mut() {
            render.on_resize(width, height);
        }
    }

    /// Returns true if the key moved the player.
    pub fn key(&mut self, code: KeyCode, pressed: bool) -> bool {
        self.movement
            .as_mut()
            .is_some_and(|movement| movement.handle_key(code, pressed))
    }

    pub fn pointer_moved(&mut self, dx: f64, dy: f64) {
        if let (Some(movement), Some(render)) = (self.movement.as_ref(), self.render.as_mut()) {
            movement.on_pointer_move(&mut render.camera, dx, dy);
        }
    }

    pub fn lock(&mut self) {
        if let Some(movement) = self.movement.as_mut() {
            movement.lock();
        }
    }

    pub fn unlock(&mut self) {
        if let Some(movement) = self.movement.as_mut() {
            movement.unlock();
        }
    }

    pub fn is_locked(&self) -> bool {
        self.movement.as_ref().is_some_and(MovementController::is_locked)
    }

    /// Lets the overlay see the event first. Returns true if it was consumed.
    pub fn window_event(&mut self, event: &WindowEvent) -> bool {
        self.render
            .as_mut()
            .is_some_and(|render| render.on_window_event(event))
    }

    /// Stops listening for resizes, then disposes the movement controller,
    /// the environment and the render manager. Safe to call repeatedly.
    pub fn unmount(&mut self) {
        if !self.alive.get() && self.render.is_none() {
            return;
        }
        self.listening_for_resize = false;
        if let Some(mut movement) = self.movement.take() {
            movement.dispose();
        }
        self.alive.set(false);
        let mut render = self.render.take();
        if let Some(mut environment) = self.environment.take() {
            if let Some(render) = render.as_mut() {
                environment.dispose(render);
            }
        }
        if let Some(mut render) = render.take() {
            render.dispose();
        }
        self.story = None;
        log::info!("viewer unmounted");
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.unmount();
    }
}
