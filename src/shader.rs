//! Shader programs: pipeline construction, named uniforms, texture slots.
//!
//! A [`Shader`] couples a render pipeline with one uniform buffer whose
//! fields are addressed by name. The declared [`UniformBlock`] plays the role
//! of the compiled program's uniform table: [`UniformCache`] memoizes lookups
//! into it, including the "not found" result, so an unknown name is reported
//! exactly once no matter how often it is set. Scalar/vector/matrix uniforms
//! update a CPU staging block; [`Shader::bind`] snapshots that block into a
//! fresh per-draw slot of the uniform buffer and binds it with a dynamic
//! offset, so instances sharing one shader keep distinct matrices within a
//! submission. Texture slots only record a reference and are likewise bound
//! in [`Shader::bind`].

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use cgmath::{Matrix3, Matrix4, Vector2, Vector3, Vector4};

use crate::color::Color;
use crate::mesh::ModelVertex;
use crate::texture::Texture;

/// The WGSL uniform-address-space type of one block field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
}

impl UniformKind {
    pub fn size(self) -> u32 {
        match self {
            UniformKind::Float => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec3 => 12,
            UniformKind::Vec4 => 16,
            // mat3x3 stores three vec3 columns at a vec4 stride.
            UniformKind::Mat3 => 48,
            UniformKind::Mat4 => 64,
        }
    }

    pub fn align(self) -> u32 {
        match self {
            UniformKind::Float => 4,
            UniformKind::Vec2 => 8,
            _ => 16,
        }
    }
}

/// Resolved position of a named field inside the uniform buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniformField {
    pub offset: u32,
    pub kind: UniformKind,
}

/// The declared field list of a shader's uniform struct.
///
/// Field order and offsets must mirror the WGSL source; offsets follow the
/// WGSL uniform address space rules, so a `Float` can pack into the tail
/// of a preceding `Vec3`.
#[derive(Clone, Debug, Default)]
pub struct UniformBlock {
    fields: Vec<(String, UniformField)>,
    size: u32,
}

impl UniformBlock {
    pub fn builder() -> UniformBlockBuilder {
        UniformBlockBuilder::default()
    }

    /// Scan the declared fields for `name`. This is the underlying query that
    /// [`UniformCache`] memoizes.
    pub fn lookup(&self, name: &str) -> Option<UniformField> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, field)| *field)
    }

    /// Total buffer size, padded to 16 bytes.
    pub fn size(&self) -> u32 {
        self.size
    }
}

#[derive(Default)]
pub struct UniformBlockBuilder {
    fields: Vec<(String, UniformField)>,
    cursor: u32,
}

impl UniformBlockBuilder {
    pub fn field(mut self, name: &str, kind: UniformKind) -> Self {
        let offset = align_up(self.cursor, kind.align());
        self.fields.push((
            name.to_string(),
            UniformField { offset, kind },
        ));
        self.cursor = offset + kind.size();
        self
    }

    pub fn float(self, name: &str) -> Self {
        self.field(name, UniformKind::Float)
    }

    pub fn vec2(self, name: &str) -> Self {
        self.field(name, UniformKind::Vec2)
    }

    pub fn vec3(self, name: &str) -> Self {
        self.field(name, UniformKind::Vec3)
    }

    pub fn vec4(self, name: &str) -> Self {
        self.field(name, UniformKind::Vec4)
    }

    pub fn mat3(self, name: &str) -> Self {
        self.field(name, UniformKind::Mat3)
    }

    pub fn mat4(self, name: &str) -> Self {
        self.field(name, UniformKind::Mat4)
    }

    pub fn build(self) -> UniformBlock {
        UniformBlock {
            fields: self.fields,
            size: align_up(self.cursor, 16),
        }
    }
}

fn align_up(value: u32, align: u32) -> u32 {
    value.div_ceil(align) * align
}

/// Memoized name-to-field resolution with a cached miss sentinel.
///
/// The first lookup of a name runs `query` and stores the result either way;
/// a miss is logged once and then answered from the cache silently.
#[derive(Debug, Default)]
pub struct UniformCache {
    resolved: HashMap<String, Option<UniformField>>,
}

impl UniformCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(
        &mut self,
        name: &str,
        query: impl FnOnce(&str) -> Option<UniformField>,
    ) -> Option<UniformField> {
        if let Some(cached) = self.resolved.get(name) {
            return *cached;
        }
        let found = query(name);
        if found.is_none() {
            log::warn!("uniform \"{name}\" not found in shader");
        }
        self.resolved.insert(name.to_string(), found);
        found
    }
}

/// A value that can be written into a uniform block field.
pub trait UniformData {
    const KIND: UniformKind;

    /// Write the WGSL byte representation into `out`
    /// (`out.len() == Self::KIND.size()`).
    fn write(&self, out: &mut [u8]);
}

impl UniformData for f32 {
    const KIND: UniformKind = UniformKind::Float;

    fn write(&self, out: &mut [u8]) {
        out.copy_from_slice(bytemuck::bytes_of(self));
    }
}

impl UniformData for [f32; 2] {
    const KIND: UniformKind = UniformKind::Vec2;

    fn write(&self, out: &mut [u8]) {
        out.copy_from_slice(bytemuck::cast_slice(self));
    }
}

impl UniformData for [f32; 3] {
    const KIND: UniformKind = UniformKind::Vec3;

    fn write(&self, out: &mut [u8]) {
        out.copy_from_slice(bytemuck::cast_slice(self));
    }
}

impl UniformData for [f32; 4] {
    const KIND: UniformKind = UniformKind::Vec4;

    fn write(&self, out: &mut [u8]) {
        out.copy_from_slice(bytemuck::cast_slice(self));
    }
}

impl UniformData for Vector2<f32> {
    const KIND: UniformKind = UniformKind::Vec2;

    fn write(&self, out: &mut [u8]) {
        let v: [f32; 2] = (*self).into();
        v.write(out);
    }
}

impl UniformData for Vector3<f32> {
    const KIND: UniformKind = UniformKind::Vec3;

    fn write(&self, out: &mut [u8]) {
        let v: [f32; 3] = (*self).into();
        v.write(out);
    }
}

impl UniformData for Vector4<f32> {
    const KIND: UniformKind = UniformKind::Vec4;

    fn write(&self, out: &mut [u8]) {
        let v: [f32; 4] = (*self).into();
        v.write(out);
    }
}

impl UniformData for Matrix3<f32> {
    const KIND: UniformKind = UniformKind::Mat3;

    fn write(&self, out: &mut [u8]) {
        let m: [[f32; 3]; 3] = (*self).into();
        for (i, column) in m.iter().enumerate() {
            out[i * 16..i * 16 + 12].copy_from_slice(bytemuck::cast_slice(column));
        }
    }
}

impl UniformData for Matrix4<f32> {
    const KIND: UniformKind = UniformKind::Mat4;

    fn write(&self, out: &mut [u8]) {
        let m: [[f32; 4]; 4] = (*self).into();
        out.copy_from_slice(bytemuck::cast_slice(&m));
    }
}

impl UniformData for Color {
    const KIND: UniformKind = UniformKind::Vec4;

    fn write(&self, out: &mut [u8]) {
        self.to_normalized().write(out);
    }
}

/// The interface a shader's WGSL source declares: its uniform struct and its
/// texture slots, in binding order (slot `i` uses `@group(1) @binding(2i)`
/// for the texture and `@binding(2i + 1)` for its sampler).
pub struct ShaderDesc {
    pub uniforms: UniformBlock,
    pub texture_slots: Vec<String>,
}

/// Per-draw uniform slots available before offsets wrap around. One
/// submission must not bind the same shader more often than this.
const UNIFORM_SLOTS: u32 = 64;

/// A compiled render pipeline with named uniform and texture access.
pub struct Shader {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    slot_stride: u32,
    next_slot: u32,
    staging: Vec<u8>,
    block: UniformBlock,
    cache: UniformCache,

    slots: Vec<String>,
    slot_cache: HashMap<String, Option<usize>>,
    attachments: Vec<Option<Rc<Texture>>>,
    current_slot: Option<usize>,
    texture_layout: Option<wgpu::BindGroupLayout>,
    texture_bind_group: Option<(wgpu::BindGroup, u64)>,
    bind_dirty: bool,

    fallback_view: wgpu::TextureView,
    fallback_sampler: wgpu::Sampler,
}

impl Shader {
    /// Read a WGSL file and compile it.
    pub async fn load_from_file(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        path: impl AsRef<Path>,
        desc: ShaderDesc,
        color_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
    ) -> Result<Shader> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read shader {}", path.display()))?;
        Self::from_source(
            device,
            queue,
            &path.display().to_string(),
            &source,
            desc,
            color_format,
            depth_format,
        )
        .await
    }

    /// Compile WGSL source (`vs_main` + `fs_main` entry points) into a
    /// pipeline.
    ///
    /// Validation failures carry the wgpu diagnostic and are not retried; on
    /// failure no shader exists.
    pub async fn from_source(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        source: &str,
        desc: ShaderDesc,
        color_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
    ) -> Result<Shader> {
        let error_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        if let Some(error) = error_scope.pop().await {
            bail!("shader compilation failed for {label}: {error}");
        }

        let ShaderDesc {
            uniforms: block,
            texture_slots: slots,
        } = desc;

        // One uniform slot per draw, stride aligned to the device's offset
        // alignment, cycled round-robin and addressed with a dynamic offset
        // so each draw reads its own uniform snapshot.
        let block_size = block.size().max(16);
        let min_alignment = device.limits().min_uniform_buffer_offset_alignment.max(1);
        let slot_stride = align_up(block_size, min_alignment);
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label} uniforms")),
            size: u64::from(slot_stride) * u64::from(UNIFORM_SLOTS),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(u64::from(block_size)),
                },
                count: None,
            }],
            label: Some("uniform_bind_group_layout"),
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &uniform_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(u64::from(block_size)),
                }),
            }],
            label: Some("uniform_bind_group"),
        });

        let texture_layout = if slots.is_empty() {
            None
        } else {
            Some(texture_slot_layout(device, slots.len() as u32))
        };

        let mut layouts: Vec<Option<&wgpu::BindGroupLayout>> = vec![Some(&uniform_layout)];
        if let Some(layout) = &texture_layout {
            layouts.push(Some(layout));
        }
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label} pipeline layout")),
            bind_group_layouts: &layouts,
            immediate_size: 0,
        });

        let error_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            cache: None,
            label: Some(label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                buffers: &[ModelVertex::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: Some(wgpu::BlendState {
                        alpha: wgpu::BlendComponent::REPLACE,
                        color: wgpu::BlendComponent::REPLACE,
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: depth_format.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: Some(true),
                depth_compare: Some(wgpu::CompareFunction::Less),
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview_mask: None,
        });
        if let Some(error) = error_scope.pop().await {
            bail!("pipeline creation failed for {label}: {error}");
        }

        let (fallback_view, fallback_sampler) = fallback_texture(device, queue);

        let staging = vec![0u8; block_size as usize];
        let attachments = vec![None; slots.len()];
        Ok(Shader {
            pipeline,
            uniform_buffer,
            uniform_bind_group,
            slot_stride,
            next_slot: 0,
            staging,
            block,
            cache: UniformCache::new(),
            slots,
            slot_cache: HashMap::new(),
            attachments,
            current_slot: None,
            texture_layout,
            texture_bind_group: None,
            bind_dirty: true,
            fallback_view,
            fallback_sampler,
        })
    }

    /// Set a scalar/vector/matrix/color uniform by name.
    ///
    /// A name the block does not declare is reported once and then ignored;
    /// a kind mismatch is reported and ignored. On a hit the bytes land in
    /// the staging block, which [`bind`](Self::bind) uploads for the next
    /// draw.
    pub fn set_uniform<T: UniformData>(&mut self, name: &str, value: &T) {
        let block = &self.block;
        let Some(field) = self.cache.resolve(name, |n| block.lookup(n)) else {
            return;
        };
        if field.kind != T::KIND {
            log::warn!(
                "uniform \"{name}\" is declared {:?} but was set as {:?}",
                field.kind,
                T::KIND
            );
            return;
        }
        let start = field.offset as usize;
        let end = start + field.kind.size() as usize;
        value.write(&mut self.staging[start..end]);
    }

    /// Attach a texture to the named slot.
    ///
    /// Only the association is recorded; the GPU bind happens in
    /// [`bind`](Self::bind). The reference is shared, not owned.
    pub fn set_texture(&mut self, name: &str, texture: &Rc<Texture>) {
        let Some(slot) = self.resolve_slot(name) else {
            return;
        };
        self.attachments[slot] = Some(Rc::clone(texture));
        self.bind_dirty = true;
    }

    /// Designate the slot that receives the texture supplied to
    /// [`bind`](Self::bind), the one texture that travels with the draw
    /// rather than with the shader.
    pub fn set_current_texture_slot(&mut self, name: &str) {
        self.current_slot = self.resolve_slot(name);
        self.bind_dirty = true;
    }

    /// Bind the pipeline, a per-draw uniform snapshot and every texture slot.
    ///
    /// The current staging block is written into the next uniform slot and
    /// bound at its dynamic offset, so every draw keeps the uniform values
    /// that were set before it. Texture slots get their attachment, the
    /// designated slot gets `current`, and anything unfilled falls back to a
    /// built-in 1×1 white texture. The texture bind group is rebuilt only
    /// when an association or the current texture changed.
    pub fn bind(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        render_pass: &mut wgpu::RenderPass<'_>,
        current: Option<&Texture>,
    ) {
        render_pass.set_pipeline(&self.pipeline);

        let offset = (self.next_slot % UNIFORM_SLOTS) * self.slot_stride;
        self.next_slot = self.next_slot.wrapping_add(1);
        queue.write_buffer(&self.uniform_buffer, u64::from(offset), &self.staging);
        render_pass.set_bind_group(0, &self.uniform_bind_group, &[offset]);

        if self.slots.is_empty() {
            return;
        }

        let current_id = current.map_or(0, |t| t.id());
        let stale = self
            .texture_bind_group
            .as_ref()
            .is_none_or(|(_, id)| *id != current_id);
        if let Some(layout) = &self.texture_layout
            && (self.bind_dirty || stale)
        {
            let bind_group = self.build_texture_bind_group(device, layout, current);
            self.texture_bind_group = Some((bind_group, current_id));
            self.bind_dirty = false;
        }
        if let Some((bind_group, _)) = &self.texture_bind_group {
            render_pass.set_bind_group(1, bind_group, &[]);
        }
    }

    pub fn uniform_block(&self) -> &UniformBlock {
        &self.block
    }

    fn resolve_slot(&mut self, name: &str) -> Option<usize> {
        if let Some(cached) = self.slot_cache.get(name) {
            return *cached;
        }
        let found = self.slots.iter().position(|slot| slot == name);
        if found.is_none() {
            log::warn!("texture slot \"{name}\" not found in shader");
        }
        self.slot_cache.insert(name.to_string(), found);
        found
    }

    fn build_texture_bind_group(
        &self,
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        current: Option<&Texture>,
    ) -> wgpu::BindGroup {
        let mut entries = Vec::with_capacity(self.slots.len() * 2);
        for slot in 0..self.slots.len() {
            let attached = if self.current_slot == Some(slot) {
                current
            } else {
                self.attachments[slot].as_deref()
            };
            let view = attached
                .and_then(|t| t.view())
                .unwrap_or(&self.fallback_view);
            let sampler = attached.map_or(&self.fallback_sampler, |t| t.sampler());
            entries.push(wgpu::BindGroupEntry {
                binding: (slot * 2) as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: (slot * 2 + 1) as u32,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &entries,
            label: Some("shader texture bind group"),
        })
    }
}

/// One texture + sampler binding pair per slot, fragment stage only.
fn texture_slot_layout(device: &wgpu::Device, slots: u32) -> wgpu::BindGroupLayout {
    let mut entries = Vec::with_capacity(slots as usize * 2);
    for slot in 0..slots {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: slot * 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: slot * 2 + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &entries,
        label: Some("texture_slot_bind_group_layout"),
    })
}

/// 1×1 opaque white, bound wherever no texture was attached.
fn fallback_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> (wgpu::TextureView, wgpu::Sampler) {
    let size = wgpu::Extent3d {
        width: 1,
        height: 1,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("fallback texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            aspect: wgpu::TextureAspect::All,
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
        },
        &[255, 255, 255, 255],
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: Some(1),
        },
        size,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::MipmapFilterMode::Linear,
        ..Default::default()
    });
    (view, sampler)
}
