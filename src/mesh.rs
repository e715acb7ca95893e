//! Mesh geometry: the interleaved vertex format and the GPU buffer pair.

use std::io::{BufReader, Cursor};
use std::mem;
use std::path::Path;

use anyhow::{Context, Result, bail};
use wgpu::util::DeviceExt;

/// One interleaved vertex: position, texture coordinates, normal.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl ModelVertex {
    /// Buffer layout matching the `@location(0..2)` inputs of the shaders.
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// A static vertex/index buffer pair built once from an imported model.
///
/// The buffers are immutable after construction and released when the mesh is
/// dropped. Deliberately not `Clone`: two meshes never alias one buffer pair.
#[derive(Debug)]
pub struct Mesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    num_elements: u32,
}

impl Mesh {
    /// Parse an obj file and upload its first model.
    pub async fn load_from_file(device: &wgpu::Device, path: impl AsRef<Path>) -> Result<Mesh> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read model {}", path.display()))?;
        Self::from_obj_bytes(device, &bytes, &path.display().to_string()).await
    }

    /// Build a mesh from obj source bytes.
    ///
    /// Only the first model in the file is used. Positions, texture
    /// coordinates and normals are interleaved per vertex; missing attributes
    /// default to zero and the v coordinate is flipped for the wgpu texture
    /// origin. Import failures carry the parser diagnostic and leave no GPU
    /// state behind.
    pub async fn from_obj_bytes(device: &wgpu::Device, bytes: &[u8], label: &str) -> Result<Mesh> {
        let cursor = Cursor::new(bytes);
        let mut reader = BufReader::new(cursor);
        let (models, _materials) = tobj::load_obj_buf_async(
            &mut reader,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
            // Materials are not part of this mesh format.
            |_p| async move { Err(tobj::LoadError::OpenFileFailed) },
        )
        .await
        .with_context(|| format!("failed to parse model {label}"))?;

        let Some(model) = models.first() else {
            bail!("no mesh found in {label}");
        };
        let m = &model.mesh;

        let vertices = (0..m.positions.len() / 3)
            .map(|i| ModelVertex {
                position: [
                    m.positions[i * 3],
                    m.positions[i * 3 + 1],
                    m.positions[i * 3 + 2],
                ],
                tex_coords: [
                    m.texcoords.get(i * 2).map_or(0.0, |f| *f),
                    1.0 - m.texcoords.get(i * 2 + 1).map_or(0.0, |f| *f),
                ],
                normal: [
                    m.normals.get(i * 3).map_or(0.0, |f| *f),
                    m.normals.get(i * 3 + 1).map_or(0.0, |f| *f),
                    m.normals.get(i * 3 + 2).map_or(0.0, |f| *f),
                ],
            })
            .collect::<Vec<_>>();

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label:?} Vertex Buffer")),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label:?} Index Buffer")),
            contents: bytemuck::cast_slice(&m.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Ok(Mesh {
            vertex_buffer,
            index_buffer,
            num_elements: m.indices.len() as u32,
        })
    }

    /// Number of indices drawn per draw call (3 per triangle).
    pub fn num_elements(&self) -> u32 {
        self.num_elements
    }

    /// Issue one indexed draw with this mesh's buffers.
    ///
    /// The vertex layout is asserted against whatever pipeline is currently
    /// bound, so the caller must bind a shader with a matching layout first.
    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        render_pass.draw_indexed(0..self.num_elements, 0, 0..1);
    }
}
