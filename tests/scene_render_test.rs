//! End-to-end scene test on a live adapter: one asset, two instances.
//!
//! Needs a GPU, so it sits behind the `integration-tests` feature:
//! `cargo test --features integration-tests`.
#![cfg(feature = "integration-tests")]

use std::cell::RefCell;
use std::rc::Rc;

use cgmath::{Point3, Vector3};
use glimmer::camera::Camera;
use glimmer::color::Color;
use glimmer::image::Image;
use glimmer::mesh::Mesh;
use glimmer::model::{ModelAsset, ModelInstance};
use glimmer::shader::{Shader, ShaderDesc, UniformBlock};
use glimmer::texture::{DepthTexture, DeviceCaps, Texture};

const SIZE: u32 = 256;

fn block_on<T>(future: impl Future<Output = T>) -> T {
    tokio::runtime::Runtime::new()
        .expect("tokio runtime")
        .block_on(future)
}

async fn create_device() -> (wgpu::Adapter, wgpu::Device, wgpu::Queue) {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .expect("an adapter is required for integration tests");
    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: wgpu::Trace::Off,
        })
        .await
        .expect("device creation");
    (adapter, device, queue)
}

/// Read an RGBA8 render target back to the CPU.
async fn read_target(device: &wgpu::Device, queue: &wgpu::Queue, target: &wgpu::Texture) -> Image {
    let padded_bytes_per_row = (4 * SIZE).div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
        * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("test readback"),
        size: padded_bytes_per_row as u64 * SIZE as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    let mut encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            aspect: wgpu::TextureAspect::All,
            texture: target,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bytes_per_row),
                rows_per_image: Some(SIZE),
            },
        },
        wgpu::Extent3d {
            width: SIZE,
            height: SIZE,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
    let slice = buffer.slice(..);
    slice.map_async(wgpu::MapMode::Read, move |result| {
        tx.send(result).expect("readback channel");
    });
    device
        .poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: Some(std::time::Duration::from_secs(5)),
        })
        .expect("poll");
    rx.receive().await.expect("map callback").expect("map");

    let data = slice.get_mapped_range();
    let mut pixels = Vec::with_capacity((SIZE * SIZE * 4) as usize);
    for row in 0..SIZE as usize {
        let start = row * padded_bytes_per_row as usize;
        pixels.extend_from_slice(&data[start..start + (SIZE * 4) as usize]);
    }
    drop(data);
    buffer.unmap();
    Image::from_pixels(SIZE, SIZE, &pixels)
}

fn checkerboard(size: u32) -> Image {
    let mut image = Image::new();
    image.create(size, size, Color::WHITE);
    for y in 0..size {
        for x in 0..size {
            if (x / 4 + y / 4) % 2 == 0 {
                image.set_pixel(x, y, Color::GRAY);
            }
        }
    }
    image
}

fn covered_fraction(image: &Image, x_range: std::ops::Range<u32>) -> f32 {
    let mut covered = 0u32;
    let mut total = 0u32;
    for y in 0..SIZE {
        for x in x_range.clone() {
            total += 1;
            if image.pixel(x, y).a != 0 {
                covered += 1;
            }
        }
    }
    covered as f32 / total as f32
}

#[test]
fn two_instances_render_into_both_screen_halves() {
    block_on(async {
        let (adapter, device, queue) = create_device().await;
        let caps = DeviceCaps::from_adapter(&adapter, &device);

        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("test target"),
            size: wgpu::Extent3d {
                width: SIZE,
                height: SIZE,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let depth = DepthTexture::create(&device, [SIZE, SIZE], "test depth");

        let wgsl = std::fs::read_to_string("assets/lit.wgsl").expect("shader asset");
        let shader = Shader::from_source(
            &device,
            &queue,
            "lit",
            &wgsl,
            glimmer::app::lit_shader_desc(),
            wgpu::TextureFormat::Rgba8UnormSrgb,
            Some(DepthTexture::DEPTH_FORMAT),
        )
        .await
        .expect("shader compiles");
        let shader = Rc::new(RefCell::new(shader));

        let obj = std::fs::read("assets/cube.obj").expect("mesh asset");
        let mesh = Mesh::from_obj_bytes(&device, &obj, "cube.obj")
            .await
            .expect("mesh parses");
        // 12 triangles, one index per corner.
        assert_eq!(mesh.num_elements(), 36);
        let mesh = Rc::new(mesh);

        let texture =
            Texture::load_from_image(&device, &queue, &caps, &checkerboard(16)).expect("texture");
        assert!(texture.is_valid());
        let texture = Rc::new(texture);

        let mut asset = ModelAsset::new();
        asset.set_mesh(Rc::clone(&mesh));
        asset.set_shader(Rc::clone(&shader));
        asset.set_texture(Rc::clone(&texture));
        let asset = Rc::new(asset);

        let mut left = ModelInstance::new();
        left.set_asset(Rc::clone(&asset));
        left.transform_mut().set_position(Vector3::new(-1.5, 0.0, 0.0));
        let mut right = ModelInstance::new();
        right.set_asset(Rc::clone(&asset));
        right.transform_mut().set_position(Vector3::new(1.5, 0.0, 0.0));

        let mut camera = Camera::new();
        camera.set_perspective(45.0, 1.0, 0.1, 100.0);
        camera.look_at(
            Point3::new(0.0, 0.0, 5.0),
            Point3::new(0.0, 0.0, 0.0),
            Vector3::unit_y(),
        );
        let view = camera.view_matrix();
        let projection = camera.projection_matrix();

        {
            let mut shader = shader.borrow_mut();
            shader.set_current_texture_slot("Texture");
            shader.set_uniform("Ambient", &Color::gray(128));
            shader.set_uniform("LightColor", &Color::WHITE);
            shader.set_uniform("LightPosition", &Vector3::new(0.0, 0.0, 0.0));
            shader.set_uniform("EyeDirection", &Vector3::new(0.0, 0.0, 1.0));
            shader.set_uniform("Shininess", &5.0f32);
            shader.set_uniform("Strength", &1.0f32);
            shader.set_uniform("ConstantAttenuation", &1.0f32);
            shader.set_uniform("LinearAttenuation", &0.0f32);
            shader.set_uniform("QuadraticAttenuation", &0.0f32);
        }

        let mut encoder =
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("test pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth.view,
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

            left.draw(&device, &queue, &mut render_pass, view, projection);
            right.draw(&device, &queue, &mut render_pass, view, projection);
        }
        queue.submit(std::iter::once(encoder.finish()));

        let frame = read_target(&device, &queue, &target).await;

        // Each cube projects into its own half of the frame.
        let left_cover = covered_fraction(&frame, 0..SIZE / 2);
        let right_cover = covered_fraction(&frame, SIZE / 2..SIZE);
        assert!(
            left_cover > 0.02,
            "left instance produced no fragments ({left_cover})"
        );
        assert!(
            right_cover > 0.02,
            "right instance produced no fragments ({right_cover})"
        );
        // The gap between the cubes stays at the clear color.
        assert_eq!(frame.pixel(SIZE / 2, 0).a, 0);
    });
}

#[test]
fn empty_asset_and_missing_parts_are_silent_no_ops() {
    block_on(async {
        let (_, device, queue) = create_device().await;

        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("test target"),
            size: wgpu::Extent3d {
                width: SIZE,
                height: SIZE,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());

        let mut camera = Camera::new();
        let view = camera.view_matrix();
        let projection = camera.projection_matrix();

        // No asset at all, and an asset with no mesh: both draw nothing.
        let mut detached = ModelInstance::new();
        let mut empty = ModelInstance::new();
        empty.set_asset(Rc::new(ModelAsset::new()));

        let mut encoder =
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("empty pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });
            detached.draw(&device, &queue, &mut render_pass, view, projection);
            empty.draw(&device, &queue, &mut render_pass, view, projection);
        }
        queue.submit(std::iter::once(encoder.finish()));

        let frame = read_target(&device, &queue, &target).await;
        assert_eq!(covered_fraction(&frame, 0..SIZE), 0.0);
    });
}

#[test]
fn failed_texture_create_leaves_no_storage() {
    block_on(async {
        let (_, device, _queue) = create_device().await;

        let tiny_caps = DeviceCaps {
            max_texture_dimension: 16,
            npot_mipmaps: true,
        };
        let mut texture = Texture::new(&device);
        assert!(texture.create(&device, &tiny_caps, 64, 64).is_err());
        assert!(!texture.is_valid());
        assert_eq!(texture.id(), 0);
        assert!(texture.create(&device, &tiny_caps, 0, 4).is_err());
        assert!(!texture.is_valid());

        // A legal retry afterwards succeeds and allocates.
        assert!(texture.create(&device, &tiny_caps, 8, 8).is_ok());
        assert!(texture.is_valid());
        assert!(texture.id() > 0);
    });
}

#[test]
fn broken_shader_source_reports_the_diagnostic() {
    block_on(async {
        let (_, device, queue) = create_device().await;
        let result = Shader::from_source(
            &device,
            &queue,
            "broken",
            "@vertex fn vs_main( -> this is not wgsl",
            ShaderDesc {
                uniforms: UniformBlock::builder().build(),
                texture_slots: Vec::new(),
            },
            wgpu::TextureFormat::Rgba8UnormSrgb,
            None,
        )
        .await;
        let error = result.err().expect("compilation must fail");
        assert!(error.to_string().contains("broken"));
    });
}
