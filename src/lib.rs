//! glimmer
//!
//! A minimal real-time 3D model viewer: one window, one camera, one
//! mesh/shader/texture bundle rendered as two lit instances, with the
//! lighting parameters live-tunable through a debug overlay.
//!
//! High-level modules
//! - `color` / `image`: CPU-side color values and pixel buffers
//! - `cache`: the dirty-flagged value cache behind the matrix getters
//! - `transform` / `camera`: lazily recomputed model/view/projection state
//! - `mesh` / `texture` / `shader`: the GPU resource layer
//! - `model`: mesh+shader+texture bundles and their placed instances
//! - `context`: window-bound device/queue/surface context
//! - `overlay` / `app`: egui debug overlay and the frame loop
//!

pub mod app;
pub mod cache;
pub mod camera;
pub mod color;
pub mod context;
pub mod image;
pub mod mesh;
pub mod model;
pub mod overlay;
pub mod shader;
pub mod texture;
pub mod transform;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use wgpu;
pub use winit::event::WindowEvent;
