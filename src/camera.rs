//! View and projection state with independently cached matrices.

use cgmath::{Deg, Matrix4, Point3, SquareMatrix, Vector3, perspective};

use crate::cache::Cached;

/// cgmath produces OpenGL clip space (z in -1..1); wgpu expects z in 0..1.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// A perspective camera with lazily recomputed view and projection matrices.
///
/// Projection parameters (fov/ratio/near/far) and view parameters
/// (position/target/up) drive two separate [`Cached`] matrices with
/// independent dirty flags: changing the aspect ratio never touches the view
/// matrix and vice versa.
///
/// A degenerate or zero up vector makes the view matrix undefined; keeping it
/// non-collinear with the look direction is the caller's responsibility.
#[derive(Clone, Debug)]
pub struct Camera {
    position: Point3<f32>,
    target: Point3<f32>,
    up: Vector3<f32>,

    near: f32,
    far: f32,
    fov_deg: f32,
    ratio: f32,

    view: Cached<Matrix4<f32>>,
    projection: Cached<Matrix4<f32>>,
}

impl Camera {
    pub fn new() -> Self {
        Self {
            position: Point3::new(0.0, 0.0, 0.0),
            target: Point3::new(0.0, 0.0, -1.0),
            up: Vector3::new(0.0, 1.0, 0.0),
            near: 0.1,
            far: 100.0,
            fov_deg: 45.0,
            ratio: 4.0 / 3.0,
            view: Cached::new(Matrix4::identity()),
            projection: Cached::new(Matrix4::identity()),
        }
    }

    /// Replace all projection parameters at once.
    pub fn set_perspective(&mut self, fov_deg: f32, ratio: f32, near: f32, far: f32) {
        self.fov_deg = fov_deg;
        self.ratio = ratio;
        self.near = near;
        self.far = far;
        self.projection.invalidate();
    }

    pub fn set_near(&mut self, near: f32) {
        self.near = near;
        self.projection.invalidate();
    }

    pub fn set_far(&mut self, far: f32) {
        self.far = far;
        self.projection.invalidate();
    }

    pub fn set_fov(&mut self, fov_deg: f32) {
        self.fov_deg = fov_deg;
        self.projection.invalidate();
    }

    pub fn set_ratio(&mut self, ratio: f32) {
        self.ratio = ratio;
        self.projection.invalidate();
    }

    /// Replace all view parameters at once.
    pub fn look_at(&mut self, position: Point3<f32>, target: Point3<f32>, up: Vector3<f32>) {
        self.position = position;
        self.target = target;
        self.up = up;
        self.view.invalidate();
    }

    pub fn set_position(&mut self, position: Point3<f32>) {
        self.position = position;
        self.view.invalidate();
    }

    pub fn set_target(&mut self, target: Point3<f32>) {
        self.target = target;
        self.view.invalidate();
    }

    pub fn set_up(&mut self, up: Vector3<f32>) {
        self.up = up;
        self.view.invalidate();
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn fov(&self) -> f32 {
        self.fov_deg
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn position(&self) -> Point3<f32> {
        self.position
    }

    pub fn target(&self) -> Point3<f32> {
        self.target
    }

    pub fn up(&self) -> Vector3<f32> {
        self.up
    }

    pub fn is_view_dirty(&self) -> bool {
        self.view.is_dirty()
    }

    pub fn is_projection_dirty(&self) -> bool {
        self.projection.is_dirty()
    }

    /// How often the view matrix has been rebuilt.
    pub fn view_recomputes(&self) -> u64 {
        self.view.recomputes()
    }

    /// How often the projection matrix has been rebuilt.
    pub fn projection_recomputes(&self) -> u64 {
        self.projection.recomputes()
    }

    /// Perspective projection, rebuilt only after a projection mutator.
    pub fn projection_matrix(&mut self) -> Matrix4<f32> {
        let (fov, ratio, near, far) = (self.fov_deg, self.ratio, self.near, self.far);
        *self
            .projection
            .get_or_update(|| OPENGL_TO_WGPU_MATRIX * perspective(Deg(fov), ratio, near, far))
    }

    /// Look-at view matrix, rebuilt only after a view mutator.
    pub fn view_matrix(&mut self) -> Matrix4<f32> {
        let (position, target, up) = (self.position, self.target, self.up);
        *self
            .view
            .get_or_update(|| Matrix4::look_at_rh(position, target, up))
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}
