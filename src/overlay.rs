//! egui debug overlay with the live-tunable lighting parameters.
//!
//! The overlay owns the whole egui lifecycle: winit input forwarding, frame
//! begin/end, tessellation, texture/buffer upload and a final Load-op render
//! pass on top of the scene. Per frame:
//!
//! ```text
//! handle_input()        // forward winit events
//! begin_frame(window)
//! … build widgets via context() …
//! end_frame(window)     // tessellate, capture texture deltas
//! prepare(device, queue)
//! render(encoder, surface_view)
//! ```

use winit::event::WindowEvent;
use winit::window::Window;

use crate::color::Color;

/// egui context + winit bridge + wgpu backend.
pub struct Overlay {
    ctx: egui::Context,
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
    primitives: Vec<egui::ClippedPrimitive>,
    textures_delta: egui::TexturesDelta,
    screen: egui_wgpu::ScreenDescriptor,
}

impl Overlay {
    pub fn new(device: &wgpu::Device, output_format: wgpu::TextureFormat, window: &Window) -> Self {
        let size = window.inner_size();
        let ctx = egui::Context::default();
        let state = egui_winit::State::new(ctx.clone(), ctx.viewport_id(), window, None, None, None);
        let renderer =
            egui_wgpu::Renderer::new(device, output_format, egui_wgpu::RendererOptions::default());
        Self {
            ctx,
            state,
            renderer,
            primitives: Vec::new(),
            textures_delta: egui::TexturesDelta::default(),
            screen: egui_wgpu::ScreenDescriptor {
                size_in_pixels: [size.width, size.height],
                pixels_per_point: window.scale_factor() as f32,
            },
        }
    }

    /// Forward a window event; returns true when egui consumed it.
    pub fn handle_input(&mut self, window: &Window, event: &WindowEvent) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    pub fn resize(&mut self, width: u32, height: u32, scale_factor: f32) {
        self.screen.size_in_pixels = [width, height];
        self.screen.pixels_per_point = scale_factor;
    }

    pub fn begin_frame(&mut self, window: &Window) {
        let raw_input = self.state.take_egui_input(window);
        self.ctx.begin_pass(raw_input);
    }

    /// The shared context for building widgets between begin and end.
    pub fn context(&self) -> &egui::Context {
        &self.ctx
    }

    pub fn end_frame(&mut self, window: &Window) {
        let egui::FullOutput {
            shapes,
            textures_delta,
            platform_output,
            ..
        } = self.ctx.end_pass();
        self.state.handle_platform_output(window, platform_output);
        self.textures_delta = textures_delta;
        self.primitives = self.ctx.tessellate(shapes, self.ctx.pixels_per_point());
    }

    /// Upload egui textures and geometry; submits its own encoder so the
    /// uploads land before the frame's render passes.
    pub fn prepare(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        for (id, delta) in &self.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, delta);
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("egui buffer upload"),
        });
        let user_buffers = self.renderer.update_buffers(
            device,
            queue,
            &mut encoder,
            &self.primitives,
            &self.screen,
        );
        let mut buffers = Vec::with_capacity(1 + user_buffers.len());
        buffers.push(encoder.finish());
        buffers.extend(user_buffers);
        queue.submit(buffers);

        for id in &self.textures_delta.free {
            self.renderer.free_texture(id);
        }
        self.textures_delta.set.clear();
        self.textures_delta.free.clear();
    }

    /// Record the overlay render pass on top of the already-rendered frame.
    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, surface_view: &wgpu::TextureView) {
        let mut render_pass = encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: surface_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            })
            .forget_lifetime();
        self.renderer
            .render(&mut render_pass, &self.primitives, &self.screen);
    }
}

/// The live-tunable lighting state behind the debug window.
pub struct LightingPanel {
    pub clear_color: Color,
    pub ambient: Color,
    pub light_color: Color,
    pub shininess: f32,
    pub strength: f32,
    pub constant_attenuation: f32,
    pub linear_attenuation: f32,
    pub quadratic_attenuation: f32,
}

impl Default for LightingPanel {
    fn default() -> Self {
        Self {
            clear_color: Color::LIGHT_BLUE,
            ambient: Color::from_normalized([0.2, 0.3, 0.3, 1.0]),
            light_color: Color::from_normalized([1.0, 0.0, 0.0, 1.0]),
            shininess: 5.0,
            strength: 1.0,
            constant_attenuation: 0.5,
            linear_attenuation: 0.5,
            quadratic_attenuation: 0.5,
        }
    }
}

impl LightingPanel {
    /// Build the debug window for the current frame.
    pub fn ui(&mut self, ctx: &egui::Context, fps: f32) {
        egui::Window::new("Lighting").show(ctx, |ui| {
            color_edit(ui, "Clear color", &mut self.clear_color);
            color_edit(ui, "Ambient color", &mut self.ambient);
            color_edit(ui, "Light color", &mut self.light_color);
            ui.add(egui::Slider::new(&mut self.shininess, 0.0..=10.0).text("Shininess"));
            ui.add(egui::Slider::new(&mut self.strength, 0.0..=10.0).text("Strength"));
            ui.add(egui::Slider::new(&mut self.constant_attenuation, 0.0..=10.0).text("Catt"));
            ui.add(egui::Slider::new(&mut self.linear_attenuation, 0.0..=10.0).text("Latt"));
            ui.add(egui::Slider::new(&mut self.quadratic_attenuation, 0.0..=10.0).text("Qatt"));
            ui.label(format!(
                "Application average {:.3} ms/frame ({:.1} FPS)",
                1000.0 / fps.max(f32::EPSILON),
                fps
            ));
        });
    }
}

fn color_edit(ui: &mut egui::Ui, label: &str, color: &mut Color) {
    let mut srgba = egui::Color32::from_rgba_unmultiplied(color.r, color.g, color.b, color.a);
    ui.horizontal(|ui| {
        ui.color_edit_button_srgba(&mut srgba);
        ui.label(label);
    });
    let [r, g, b, a] = srgba.to_srgba_unmultiplied();
    *color = Color::new(r, g, b, a);
}
