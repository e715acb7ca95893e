//! Transformable tests
//!
//! Tests for:
//! - TRS composition order (translate * rotation * scale)
//! - Dirty-flag behavior of every mutator
//! - Relative translate/scale/rotate accumulation

use cgmath::{Deg, Matrix4, Quaternion, Rad, Rotation3, SquareMatrix, Vector3, Vector4};
use glimmer::transform::Transformable;

const EPSILON: f32 = 1e-5;

fn mat4_approx(a: Matrix4<f32>, b: Matrix4<f32>) -> bool {
    let a: [[f32; 4]; 4] = a.into();
    let b: [[f32; 4]; 4] = b.into();
    a.iter()
        .flatten()
        .zip(b.iter().flatten())
        .all(|(x, y)| (x - y).abs() < EPSILON)
}

/// The reference composition the cached matrix must always equal.
fn reference(t: &Transformable) -> Matrix4<f32> {
    let s = t.scale();
    Matrix4::from_translation(t.position()) * t.rotation()
        * Matrix4::from_nonuniform_scale(s.x, s.y, s.z)
}

#[test]
fn default_is_identity() {
    let mut t = Transformable::new();
    assert_eq!(t.position(), Vector3::new(0.0, 0.0, 0.0));
    assert_eq!(t.scale(), Vector3::new(1.0, 1.0, 1.0));
    assert!(mat4_approx(t.transform(), Matrix4::identity()));
}

#[test]
fn every_mutator_is_reflected_on_the_next_read() {
    let mut t = Transformable::new();

    t.set_position(Vector3::new(1.0, 2.0, 3.0));
    assert!(mat4_approx(t.transform(), reference(&t)));

    t.set_scale(Vector3::new(2.0, 0.5, 3.0));
    assert!(mat4_approx(t.transform(), reference(&t)));

    t.set_rotation_quat(Quaternion::from_angle_y(Deg(90.0)));
    assert!(mat4_approx(t.transform(), reference(&t)));

    t.translate(Vector3::new(-4.0, 0.0, 1.0));
    assert!(mat4_approx(t.transform(), reference(&t)));

    t.scale_by(Vector3::new(1.0, 2.0, 1.0));
    assert!(mat4_approx(t.transform(), reference(&t)));

    t.rotate_quat(Quaternion::from_angle_x(Deg(45.0)));
    assert!(mat4_approx(t.transform(), reference(&t)));

    t.set_transform(
        Vector3::new(9.0, 9.0, 9.0),
        Vector3::new(1.0, 1.0, 2.0),
        Matrix4::from_angle_z(Deg(30.0)),
    );
    assert!(mat4_approx(t.transform(), reference(&t)));
}

#[test]
fn mutators_mark_the_matrix_dirty() {
    let mut t = Transformable::new();
    t.transform();
    assert!(!t.is_transform_dirty());

    t.set_position(Vector3::new(1.0, 0.0, 0.0));
    assert!(t.is_transform_dirty());
    t.transform();
    assert!(!t.is_transform_dirty());

    t.scale_uniform(2.0);
    assert!(t.is_transform_dirty());
    t.transform();

    t.rotate_quat(Quaternion::from_angle_y(Rad(0.5)));
    assert!(t.is_transform_dirty());
}

#[test]
fn no_stale_matrix_after_a_mutation_burst() {
    let mut t = Transformable::new();
    t.set_position(Vector3::new(1.0, 0.0, 0.0));
    t.transform();
    assert_eq!(t.transform_recomputes(), 1);

    // A burst of mutations costs exactly one rebuild on the next read.
    t.set_position(Vector3::new(5.0, 0.0, 0.0));
    t.set_scale_uniform(3.0);
    let m = t.transform();
    let expected =
        Matrix4::from_translation(Vector3::new(5.0, 0.0, 0.0)) * Matrix4::from_scale(3.0);
    assert!(mat4_approx(m, expected));
    t.transform();
    assert_eq!(t.transform_recomputes(), 2);
}

#[test]
fn composition_order_is_translate_rotate_scale() {
    // With non-uniform scale the order is observable: the translation column
    // must be the raw position, untouched by rotation or scale.
    let mut t = Transformable::new();
    t.set_position(Vector3::new(10.0, 0.0, 0.0));
    t.set_scale(Vector3::new(2.0, 1.0, 1.0));
    t.set_rotation_quat(Quaternion::from_angle_y(Deg(90.0)));

    let m = t.transform();
    let translation: [f32; 4] = m.w.into();
    assert!((translation[0] - 10.0).abs() < EPSILON);
    assert!(translation[1].abs() < EPSILON);
    assert!(translation[2].abs() < EPSILON);

    // A unit x vector is scaled first (×2), then rotated onto -z.
    let v = m * Vector4::new(1.0, 0.0, 0.0, 0.0);
    assert!(v.x.abs() < EPSILON);
    assert!((v.z + 2.0).abs() < EPSILON);
}

#[test]
fn relative_mutators_accumulate() {
    let mut t = Transformable::new();
    t.translate(Vector3::new(1.0, 0.0, 0.0));
    t.translate(Vector3::new(0.0, 2.0, 0.0));
    assert_eq!(t.position(), Vector3::new(1.0, 2.0, 0.0));

    t.set_scale(Vector3::new(2.0, 2.0, 2.0));
    t.scale_by(Vector3::new(2.0, 0.5, 1.0));
    assert_eq!(t.scale(), Vector3::new(4.0, 1.0, 2.0));

    t.rotate_quat(Quaternion::from_angle_y(Deg(45.0)));
    t.rotate_quat(Quaternion::from_angle_y(Deg(45.0)));
    let expected: Matrix4<f32> = Quaternion::from_angle_y(Deg(90.0)).into();
    assert!(mat4_approx(t.rotation(), expected));
}

#[test]
fn rotation_survives_matrix_quaternion_mixing() {
    let mut a = Transformable::new();
    let mut b = Transformable::new();
    a.set_rotation(Matrix4::from_angle_y(Deg(30.0)));
    b.set_rotation_quat(Quaternion::from_angle_y(Deg(30.0)));
    assert!(mat4_approx(a.transform(), b.transform()));
}
