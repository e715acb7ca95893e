//! Application loop: window, scene setup and per-frame orchestration.
//!
//! [`run`] drives a winit `ApplicationHandler` that owns one [`GpuContext`],
//! one [`Camera`] and the demo scene: a single [`ModelAsset`] shared by two
//! [`ModelInstance`]s. Each frame polls input, updates the camera and the
//! spinning instance, pushes the lighting uniforms from the overlay panel
//! into the shader, draws both instances and composites the overlay on top.

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use anyhow::Result;
use cgmath::{EuclideanSpace, InnerSpace, Point3, Quaternion, Rad, Rotation3, Vector3, Zero};
use instant::Instant;
use winit::application::ApplicationHandler;
use winit::event::{KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::camera::Camera;
use crate::context::GpuContext;
use crate::mesh::Mesh;
use crate::model::{ModelAsset, ModelInstance};
use crate::overlay::{LightingPanel, Overlay};
use crate::shader::{Shader, ShaderDesc, UniformBlock};
use crate::texture::{DepthTexture, Texture};

fn asset_path(name: &str) -> PathBuf {
    Path::new("assets").join(name)
}

/// The uniform block and texture slots declared by `assets/lit.wgsl`.
pub fn lit_shader_desc() -> ShaderDesc {
    ShaderDesc {
        uniforms: UniformBlock::builder()
            .mat4("MV")
            .mat3("N")
            .mat4("MVP")
            .vec4("Ambient")
            .vec4("LightColor")
            .vec3("LightPosition")
            .float("Shininess")
            .vec3("EyeDirection")
            .float("Strength")
            .float("ConstantAttenuation")
            .float("LinearAttenuation")
            .float("QuadraticAttenuation")
            .build(),
        texture_slots: vec!["Texture".to_string()],
    }
}

#[derive(Debug)]
enum SurfaceRenderError {
    Lost,
    Outdated,
    Other(String),
}

impl std::fmt::Display for SurfaceRenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceRenderError::Lost => write!(f, "surface lost"),
            SurfaceRenderError::Outdated => write!(f, "surface outdated"),
            SurfaceRenderError::Other(message) => write!(f, "{message}"),
        }
    }
}

struct AppState {
    ctx: GpuContext,
    overlay: Overlay,
    panel: LightingPanel,
    camera: Camera,
    shader: Rc<RefCell<Shader>>,
    instance: ModelInstance,
    instance2: ModelInstance,
    keys: HashSet<KeyCode>,
    last_frame: Instant,
    smoothed_dt: f32,
    surface_configured: bool,
}

impl AppState {
    async fn new(window: Arc<Window>) -> Result<AppState> {
        let ctx = GpuContext::new(window).await?;

        let texture = Texture::load_from_file(
            &ctx.device,
            &ctx.queue,
            &ctx.caps,
            asset_path("crate.png"),
        )?;
        let (shader, mesh) = futures::join!(
            Shader::load_from_file(
                &ctx.device,
                &ctx.queue,
                asset_path("lit.wgsl"),
                lit_shader_desc(),
                ctx.config.format,
                Some(DepthTexture::DEPTH_FORMAT),
            ),
            Mesh::load_from_file(&ctx.device, asset_path("cube.obj")),
        );
        let shader = Rc::new(RefCell::new(shader?));
        let mesh = Rc::new(mesh?);
        let texture = Rc::new(texture);

        let mut asset = ModelAsset::new();
        asset.set_mesh(mesh);
        asset.set_shader(Rc::clone(&shader));
        asset.set_texture(texture);
        let asset = Rc::new(asset);

        let mut instance = ModelInstance::new();
        instance.set_asset(Rc::clone(&asset));
        let mut instance2 = ModelInstance::new();
        instance2.set_asset(asset);
        instance2.transform_mut().set_position(Vector3::new(3.0, 0.0, 3.0));

        let mut camera = Camera::new();
        let size = ctx.window.inner_size();
        camera.set_perspective(
            45.0,
            size.width.max(1) as f32 / size.height.max(1) as f32,
            0.1,
            100.0,
        );
        camera.look_at(
            Point3::new(-2.0, 1.0, -2.0),
            Point3::new(0.0, 0.0, 0.0),
            Vector3::unit_y(),
        );

        let overlay = Overlay::new(&ctx.device, ctx.config.format, &ctx.window);

        Ok(AppState {
            ctx,
            overlay,
            panel: LightingPanel::default(),
            camera,
            shader,
            instance,
            instance2,
            keys: HashSet::new(),
            last_frame: Instant::now(),
            smoothed_dt: 1.0 / 60.0,
            surface_configured: false,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.ctx.resize(width, height);
        self.surface_configured = true;
        self.camera.set_ratio(width as f32 / height as f32);
        let scale_factor = self.ctx.window.scale_factor() as f32;
        self.overlay.resize(width, height, scale_factor);
    }

    /// Per-frame simulation: camera movement and the spinning instance.
    fn update(&mut self, dt: f32) {
        let position = self.camera.position();
        let to_target = self.camera.target() - position;
        if to_target.magnitude2() > 0.0 {
            let direction = to_target.normalize();
            let right = direction.cross(Vector3::unit_y());
            let mut movement = Vector3::zero();
            if self.keys.contains(&KeyCode::ArrowUp) {
                movement += direction * 2.0 * dt;
            }
            if self.keys.contains(&KeyCode::ArrowDown) {
                movement -= direction * 2.0 * dt;
            }
            if self.keys.contains(&KeyCode::ArrowRight) {
                movement += right * 10.0 * dt;
            }
            if self.keys.contains(&KeyCode::ArrowLeft) {
                movement -= right * 10.0 * dt;
            }
            if !movement.is_zero() {
                self.camera.set_position(position + movement);
            }
        }

        self.instance
            .transform_mut()
            .rotate_quat(Quaternion::from_axis_angle(Vector3::unit_y(), Rad(0.3 * dt)));

        self.smoothed_dt = self.smoothed_dt * 0.95 + dt * 0.05;
    }

    fn render(&mut self) -> Result<(), SurfaceRenderError> {
        self.ctx.window.request_redraw();
        if !self.surface_configured {
            return Ok(());
        }

        let output = match self.ctx.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(texture)
            | wgpu::CurrentSurfaceTexture::Suboptimal(texture) => texture,
            wgpu::CurrentSurfaceTexture::Lost => return Err(SurfaceRenderError::Lost),
            wgpu::CurrentSurfaceTexture::Outdated => return Err(SurfaceRenderError::Outdated),
            wgpu::CurrentSurfaceTexture::Timeout => return Err(SurfaceRenderError::Other("surface acquisition timed out".into())),
            wgpu::CurrentSurfaceTexture::Occluded => return Err(SurfaceRenderError::Other("surface is occluded".into())),
            wgpu::CurrentSurfaceTexture::Validation => return Err(SurfaceRenderError::Other("surface validation error".into())),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let view_matrix = self.camera.view_matrix();
        let projection = self.camera.projection_matrix();
        // The light sits at the eye, expressed in view space.
        let light_position = (view_matrix * self.camera.position().to_homogeneous()).truncate();
        {
            let mut shader = self.shader.borrow_mut();
            shader.set_current_texture_slot("Texture");
            shader.set_uniform("Ambient", &self.panel.ambient);
            shader.set_uniform("LightColor", &self.panel.light_color);
            shader.set_uniform("LightPosition", &light_position);
            shader.set_uniform("EyeDirection", &-light_position);
            shader.set_uniform("Shininess", &self.panel.shininess);
            shader.set_uniform("Strength", &self.panel.strength);
            shader.set_uniform("ConstantAttenuation", &self.panel.constant_attenuation);
            shader.set_uniform("LinearAttenuation", &self.panel.linear_attenuation);
            shader.set_uniform("QuadraticAttenuation", &self.panel.quadratic_attenuation);
        }

        self.overlay.prepare(&self.ctx.device, &self.ctx.queue);

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.panel.clear_color.into()),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });

            self.instance.draw(
                &self.ctx.device,
                &self.ctx.queue,
                &mut render_pass,
                view_matrix,
                projection,
            );
            self.instance2.draw(
                &self.ctx.device,
                &self.ctx.queue,
                &mut render_pass,
                view_matrix,
                projection,
            );
        }
        self.overlay.render(&mut encoder, &view);

        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

pub struct App {
    runtime: tokio::runtime::Runtime,
    state: Option<AppState>,
    init_error: Option<anyhow::Error>,
}

impl App {
    fn new() -> Result<Self> {
        Ok(Self {
            runtime: tokio::runtime::Runtime::new()?,
            state: None,
            init_error: None,
        })
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        let attributes = Window::default_attributes()
            .with_title("glimmer")
            .with_inner_size(winit::dpi::LogicalSize::new(1024, 768));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(error) => {
                self.init_error = Some(error.into());
                event_loop.exit();
                return;
            }
        };

        match self.runtime.block_on(AppState::new(window)) {
            Ok(mut state) => {
                let size = state.ctx.window.inner_size();
                state.resize(size.width, size.height);
                state.ctx.window.request_redraw();
                self.state = Some(state);
            }
            Err(error) => {
                log::error!("initialization failed: {error:#}");
                self.init_error = Some(error);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(state) = &mut self.state else {
            return;
        };

        let window = state.ctx.window.clone();
        let consumed = state.overlay.handle_input(&window, &event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: key_state,
                        ..
                    },
                ..
            } if !consumed => {
                if code == KeyCode::Escape && key_state.is_pressed() {
                    event_loop.exit();
                } else if key_state.is_pressed() {
                    state.keys.insert(code);
                } else {
                    state.keys.remove(&code);
                }
            }
            WindowEvent::RedrawRequested => {
                let dt = state.last_frame.elapsed().as_secs_f32();
                state.last_frame = Instant::now();
                state.update(dt);

                state.overlay.begin_frame(&window);
                let egui_ctx = state.overlay.context().clone();
                let fps = 1.0 / state.smoothed_dt.max(f32::EPSILON);
                state.panel.ui(&egui_ctx, fps);
                state.overlay.end_frame(&window);

                match state.render() {
                    Ok(()) => {}
                    // Reconfigure the surface if it is lost or outdated.
                    Err(SurfaceRenderError::Lost | SurfaceRenderError::Outdated) => {
                        let size = window.inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(error) => log::error!("unable to render: {error}"),
                }
            }
            _ => {}
        }
    }
}

/// Create the window and run the frame loop until a close request.
///
/// Returns an error (and the process a nonzero exit code) when any
/// initialization stage fails.
pub fn run() -> Result<()> {
    if let Err(error) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {error}");
    }

    let event_loop = EventLoop::new()?;
    let mut app = App::new()?;
    event_loop.run_app(&mut app)?;

    match app.init_error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
