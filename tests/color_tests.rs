//! Color conversions, arithmetic and the named palette.

use glimmer::color::Color;

#[test]
fn integer_round_trip() {
    let colors = [
        Color::new(0, 0, 0, 0),
        Color::new(255, 255, 255, 255),
        Color::new(1, 2, 3, 4),
        Color::new(200, 100, 50, 25),
        Color::LIGHT_BLUE,
        Color::DARK_PEACH,
    ];
    for c in colors {
        assert_eq!(Color::from_u32(c.to_u32()), c);
    }
}

#[test]
fn integer_layout_is_rgba() {
    assert_eq!(Color::new(0x12, 0x34, 0x56, 0x78).to_u32(), 0x1234_5678);
    assert_eq!(Color::from_u32(0xff00_00ff), Color::rgb(255, 0, 0));
}

#[test]
fn hex_string_round_trip() {
    let colors = [
        Color::WHITE,
        Color::new(18, 52, 86, 120),
        Color::TRANSPARENT,
        Color::rgb(0, 128, 7),
    ];
    for c in colors {
        let parsed: Color = c.to_hex().parse().expect("hex string parses back");
        assert_eq!(parsed, c);
    }
}

#[test]
fn hex_string_rejects_garbage() {
    assert!("not-a-color".parse::<Color>().is_err());
    assert!("".parse::<Color>().is_err());
}

#[test]
fn addition_saturates() {
    let sum = Color::new(250, 250, 250, 250) + Color::new(10, 10, 10, 10);
    assert_eq!(sum, Color::new(255, 255, 255, 255));
    assert_eq!(Color::BLACK + Color::rgb(10, 20, 30), Color::rgb(10, 20, 30));
}

#[test]
fn subtraction_saturates_on_every_channel() {
    let diff = Color::new(0, 5, 5, 5) - Color::new(10, 10, 10, 10);
    assert_eq!(diff, Color::new(0, 0, 0, 0));
    assert_eq!(
        Color::new(100, 100, 100, 100) - Color::new(30, 40, 50, 60),
        Color::new(70, 60, 50, 40)
    );
}

#[test]
fn multiplication_modulates() {
    assert_eq!(Color::WHITE * Color::rgb(10, 20, 30), Color::rgb(10, 20, 30));
    assert_eq!(Color::BLACK * Color::WHITE, Color::new(0, 0, 0, 255));
    let half = Color::new(128, 128, 128, 255);
    let modulated = half * half;
    assert_eq!(modulated.r, 64);
}

#[test]
fn assign_operators_match_binary_operators() {
    let a = Color::new(200, 10, 100, 255);
    let b = Color::new(100, 20, 50, 10);

    let mut c = a;
    c += b;
    assert_eq!(c, a + b);

    let mut c = a;
    c -= b;
    assert_eq!(c, a - b);

    let mut c = a;
    c *= b;
    assert_eq!(c, a * b);
}

#[test]
fn opacity() {
    assert!(Color::WHITE.is_opaque());
    assert!(!Color::TRANSPARENT.is_opaque());
    assert!(!Color::new(1, 2, 3, 254).is_opaque());
}

#[test]
fn normalized_float_conversions() {
    assert_eq!(Color::from_normalized([1.0, 0.0, 0.5, 1.0]).r, 255);
    assert_eq!(Color::from_normalized([1.0, 0.0, 0.5, 1.0]).g, 0);
    assert_eq!(Color::from_normalized_rgb([0.0, 1.0, 0.0]), Color::GREEN);
    // Out-of-range input clamps instead of wrapping.
    assert_eq!(Color::from_normalized([2.0, -1.0, 0.0, 1.0]).r, 255);
    assert_eq!(Color::from_normalized([2.0, -1.0, 0.0, 1.0]).g, 0);

    let n = Color::new(255, 0, 51, 255).to_normalized();
    assert!((n[0] - 1.0).abs() < 1e-6);
    assert!((n[2] - 0.2).abs() < 1e-2);
}

#[test]
fn default_is_opaque_black() {
    assert_eq!(Color::default(), Color::rgb(0, 0, 0));
    assert!(Color::default().is_opaque());
}

#[test]
fn gray_constructor() {
    assert_eq!(Color::gray(64), Color::rgb(64, 64, 64));
    assert_eq!(Color::gray(64), Color::LIGHT_BLACK);
}

#[test]
fn clear_color_conversion() {
    let clear: glimmer::wgpu::Color = Color::WHITE.into();
    assert_eq!(clear.r, 1.0);
    assert_eq!(clear.a, 1.0);
    let clear: glimmer::wgpu::Color = Color::TRANSPARENT.into();
    assert_eq!(clear.g, 0.0);
    assert_eq!(clear.a, 0.0);
}
