//! Window and event loop.
//!
//! [`App`] owns the winit window and the mounted [`Viewer`]. It mounts once
//! the window exists, forwards resize, keyboard and pointer events, drives
//! one viewer frame per redraw and unmounts when the window closes.
//!
//! Clicking the view captures the pointer and starts walking; Escape
//! releases it again.

use std::{rc::Rc, sync::Arc};

use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window},
};

use crate::{
    config::ViewerConfig,
    error::ViewerError,
    resources::{AssetLoader, FileAssetLoader},
    story::StoryRecord,
    viewer::Viewer,
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Sent back to the event loop by tasks started from `App`.
pub enum ViewerEvent {
    #[allow(dead_code)]
    Mounted(Result<Viewer, ViewerError>),
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    #[allow(dead_code)]
    proxy: winit::event_loop::EventLoopProxy<ViewerEvent>,
    config: ViewerConfig,
    story: Option<StoryRecord>,
    window: Option<Arc<Window>>,
    viewer: Option<Viewer>,
}

impl App {
    fn new(
        event_loop: &EventLoop<ViewerEvent>,
        config: ViewerConfig,
        story: Option<StoryRecord>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            proxy: event_loop.create_proxy(),
            config,
            story,
            window: None,
            viewer: None,
        })
    }

    fn loader(&self) -> Rc<dyn AssetLoader> {
        #[cfg(not(target_arch = "wasm32"))]
        let loader = FileAssetLoader::new(
            self.config.assets.root.clone(),
            self.async_runtime.handle().clone(),
        );
        #[cfg(target_arch = "wasm32")]
        let loader = FileAssetLoader::new(self.config.assets.root.clone());
        Rc::new(loader)
    }

    fn on_mounted(&mut self, event_loop: &ActiveEventLoop, result: Result<Viewer, ViewerError>) {
        match result {
            Ok(viewer) => {
                self.viewer = Some(viewer);
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            Err(e) => {
                log::error!("Unable to mount the viewer: {}", e);
                event_loop.exit();
            }
        }
    }

    fn grab_pointer(&mut self) {
        let Some(window) = &self.window else {
            return;
        };
        let grabbed = window
            .set_cursor_grab(CursorGrabMode::Locked)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
        match grabbed {
            Ok(()) => {
                window.set_cursor_visible(false);
                if let Some(viewer) = &mut self.viewer {
                    viewer.lock();
                }
            }
            Err(e) => log::warn!("Pointer lock refused: {}", e),
        }
    }

    fn release_pointer(&mut self) {
        if let Some(window) = &self.window {
            let _ = window.set_cursor_grab(CursorGrabMode::None);
            window.set_cursor_visible(true);
        }
        if let Some(viewer) = &mut self.viewer {
            viewer.unlock();
        }
    }
}

impl ApplicationHandler<ViewerEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes()
            .with_title("cubicle-view")
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window_size.0,
                self.config.window_size.1,
            ));

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let canvas = wgpu::web_sys::window()
                .and_then(|window| window.document())
                .and_then(|document| document.get_element_by_id(CANVAS_ID));
            window_attributes =
                window_attributes.with_canvas(canvas.map(|canvas| canvas.unchecked_into()));
        }

        // A missing window is reported by `mount_window` as a missing surface.
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Some(Arc::new(window)),
            Err(e) => {
                log::error!("Unable to create a window: {}", e);
                None
            }
        };
        self.window = window.clone();

        let config = self.config.clone();
        let loader = self.loader();
        let story = self.story.clone();

        #[cfg(not(target_arch = "wasm32"))]
        {
            let result = self
                .async_runtime
                .block_on(Viewer::mount_window(window, &config, loader, story));
            self.on_mounted(event_loop, result);
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let result = Viewer::mount_window(window, &config, loader, story).await;
                if proxy.send_event(ViewerEvent::Mounted(result)).is_err() {
                    log::error!("event loop closed before the viewer was mounted");
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Mounted(result) => self.on_mounted(event_loop, result),
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        let Some(viewer) = &mut self.viewer else {
            return;
        };
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            viewer.pointer_moved(dx, dy);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(viewer) = &mut self.viewer else {
            if let WindowEvent::CloseRequested = event {
                event_loop.exit();
            }
            return;
        };

        // The debug panel gets the event first while the pointer is free.
        if !viewer.is_locked() && viewer.window_event(&event) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                viewer.unmount();
                self.viewer = None;
                event_loop.exit();
            }
            WindowEvent::Resized(size) => viewer.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                viewer.frame();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                let pressed = event.state == ElementState::Pressed;
                if code == KeyCode::Escape && pressed {
                    self.release_pointer();
                } else {
                    viewer.key(code, pressed);
                }
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } if !viewer.is_locked() => self.grab_pointer(),
            WindowEvent::Focused(false) => self.release_pointer(),
            _ => {}
        }
    }
}

/// Opens the window and runs the viewer until it is closed.
pub fn run(config: ViewerConfig, story: Option<StoryRecord>) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info).unwrap_throw();
    }

    let event_loop: EventLoop<ViewerEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, config, story)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}
