//! Position/scale/rotation state with a lazily rebuilt model matrix.

use cgmath::{Matrix4, Quaternion, SquareMatrix, Vector3};

use crate::cache::Cached;

/// A translate/rotate/scale triple composed into a cached model matrix.
///
/// Every mutator only records the new state and marks the matrix dirty;
/// [`transform`](Self::transform) rebuilds
/// `translate(position) * rotation * scale` on the next read. The rotation is
/// stored as a full matrix (constructible from a quaternion) so that
/// matrix-composed rotations accumulate without conversion loss.
#[derive(Clone, Debug)]
pub struct Transformable {
    position: Vector3<f32>,
    scale: Vector3<f32>,
    rotation: Matrix4<f32>,
    transform: Cached<Matrix4<f32>>,
}

impl Transformable {
    pub fn new() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
            rotation: Matrix4::identity(),
            transform: Cached::new(Matrix4::identity()),
        }
    }

    /// Replace position, scale and rotation in one go.
    pub fn set_transform(
        &mut self,
        position: Vector3<f32>,
        scale: Vector3<f32>,
        rotation: Matrix4<f32>,
    ) {
        self.position = position;
        self.scale = scale;
        self.rotation = rotation;
        self.transform.invalidate();
    }

    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.position = position;
        self.transform.invalidate();
    }

    pub fn set_scale(&mut self, scale: Vector3<f32>) {
        self.scale = scale;
        self.transform.invalidate();
    }

    pub fn set_scale_uniform(&mut self, s: f32) {
        self.set_scale(Vector3::new(s, s, s));
    }

    pub fn set_rotation(&mut self, rotation: Matrix4<f32>) {
        self.rotation = rotation;
        self.transform.invalidate();
    }

    pub fn set_rotation_quat(&mut self, rotation: Quaternion<f32>) {
        self.set_rotation(Matrix4::from(rotation));
    }

    /// Add a translation to the current position.
    pub fn translate(&mut self, movement: Vector3<f32>) {
        self.position += movement;
        self.transform.invalidate();
    }

    /// Multiply the current scale component-wise.
    pub fn scale_by(&mut self, factors: Vector3<f32>) {
        self.scale.x *= factors.x;
        self.scale.y *= factors.y;
        self.scale.z *= factors.z;
        self.transform.invalidate();
    }

    pub fn scale_uniform(&mut self, factor: f32) {
        self.scale_by(Vector3::new(factor, factor, factor));
    }

    /// Compose a further rotation onto the current one.
    pub fn rotate(&mut self, rotation: Matrix4<f32>) {
        self.rotation = self.rotation * rotation;
        self.transform.invalidate();
    }

    pub fn rotate_quat(&mut self, rotation: Quaternion<f32>) {
        self.rotate(Matrix4::from(rotation));
    }

    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    pub fn scale(&self) -> Vector3<f32> {
        self.scale
    }

    pub fn rotation(&self) -> Matrix4<f32> {
        self.rotation
    }

    pub fn is_transform_dirty(&self) -> bool {
        self.transform.is_dirty()
    }

    /// How often the composed matrix has been rebuilt.
    pub fn transform_recomputes(&self) -> u64 {
        self.transform.recomputes()
    }

    /// The composed model matrix, rebuilt only after a mutation.
    pub fn transform(&mut self) -> Matrix4<f32> {
        let position = self.position;
        let rotation = self.rotation;
        let scale = self.scale;
        *self.transform.get_or_update(|| {
            Matrix4::from_translation(position)
                * rotation
                * Matrix4::from_nonuniform_scale(scale.x, scale.y, scale.z)
        })
    }
}

impl Default for Transformable {
    fn default() -> Self {
        Self::new()
    }
}
