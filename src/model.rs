//! Reusable geometry/material bundles and their drawable instances.

use std::cell::RefCell;
use std::rc::Rc;

use cgmath::{Matrix, Matrix3, Matrix4, SquareMatrix};

use crate::mesh::Mesh;
use crate::shader::Shader;
use crate::texture::Texture;
use crate::transform::Transformable;

/// A mesh + shader + texture bundle shared by many instances.
///
/// All three parts are optional and reference-counted: the asset shares them
/// without controlling their lifetime, and a draw silently skips whatever is
/// missing.
#[derive(Clone, Default)]
pub struct ModelAsset {
    mesh: Option<Rc<Mesh>>,
    shader: Option<Rc<RefCell<Shader>>>,
    texture: Option<Rc<Texture>>,
}

impl ModelAsset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mesh(&mut self, mesh: Rc<Mesh>) {
        self.mesh = Some(mesh);
    }

    pub fn set_shader(&mut self, shader: Rc<RefCell<Shader>>) {
        self.shader = Some(shader);
    }

    pub fn set_texture(&mut self, texture: Rc<Texture>) {
        self.texture = Some(texture);
    }

    pub fn mesh(&self) -> Option<&Rc<Mesh>> {
        self.mesh.as_ref()
    }

    pub fn shader(&self) -> Option<&Rc<RefCell<Shader>>> {
        self.shader.as_ref()
    }

    pub fn texture(&self) -> Option<&Rc<Texture>> {
        self.texture.as_ref()
    }

    /// Bind the shader (with this asset's texture as the current texture)
    /// and draw the mesh.
    ///
    /// Without a mesh this is a no-op. Without a shader the mesh is drawn
    /// against whatever pipeline is already bound, so the caller must have
    /// bound one with a matching vertex layout.
    pub fn draw(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        render_pass: &mut wgpu::RenderPass<'_>,
    ) {
        let Some(mesh) = &self.mesh else {
            return;
        };
        if let Some(shader) = &self.shader {
            shader
                .borrow_mut()
                .bind(device, queue, render_pass, self.texture.as_deref());
        }
        mesh.draw(render_pass);
    }
}

/// One placed occurrence of a [`ModelAsset`].
///
/// Holds its own [`Transformable`] and a shared handle to the asset; many
/// instances may reference one asset and are destroyed independently of it.
#[derive(Clone, Default)]
pub struct ModelInstance {
    transform: Transformable,
    asset: Option<Rc<ModelAsset>>,
}

impl ModelInstance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_asset(&mut self, asset: Rc<ModelAsset>) {
        self.asset = Some(asset);
    }

    pub fn asset(&self) -> Option<&Rc<ModelAsset>> {
        self.asset.as_ref()
    }

    pub fn transform(&self) -> &Transformable {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut Transformable {
        &mut self.transform
    }

    /// Push this instance's matrices and draw the shared asset.
    ///
    /// Computes `mv = view * model`, `mvp = projection * mv` and the normal
    /// matrix (the transposed inverse of the upper-left 3×3 of `mv`, which
    /// keeps lighting normals orthogonal under non-uniform scale), sets them
    /// as "MV", "N" and "MVP" when the asset has a shader, then defers to
    /// [`ModelAsset::draw`], whose bind snapshots them into a per-draw
    /// uniform slot. A no-op without an asset.
    pub fn draw(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        render_pass: &mut wgpu::RenderPass<'_>,
        view: Matrix4<f32>,
        projection: Matrix4<f32>,
    ) {
        let Some(asset) = &self.asset else {
            return;
        };
        if let Some(shader) = asset.shader() {
            let model = self.transform.transform();
            let mv = view * model;
            let mvp = projection * mv;
            let upper = Matrix3::from_cols(mv.x.truncate(), mv.y.truncate(), mv.z.truncate());
            // A singular modelview (e.g. zero scale) has no inverse; fall
            // back to the plain basis instead of poisoning the draw.
            let normal = upper.invert().map_or(upper, |inv| inv.transpose());
            let mut shader = shader.borrow_mut();
            shader.set_uniform("MV", &mv);
            shader.set_uniform("N", &normal);
            shader.set_uniform("MVP", &mvp);
        }
        asset.draw(device, queue, render_pass);
    }
}
