//! GPU textures: creation, sizing policy, mipmaps and readback.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result, anyhow, bail};

use crate::image::Image;

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Texture-related limits of the active device, captured once at startup.
///
/// `npot_mipmaps` is false on downlevel (WebGL2-class) hardware that cannot
/// mipmap non-power-of-two textures; there, requested sizes round up to the
/// next power of two.
#[derive(Clone, Copy, Debug)]
pub struct DeviceCaps {
    pub max_texture_dimension: u32,
    pub npot_mipmaps: bool,
}

impl DeviceCaps {
    pub fn from_adapter(adapter: &wgpu::Adapter, device: &wgpu::Device) -> Self {
        Self {
            max_texture_dimension: device.limits().max_texture_dimension_2d,
            npot_mipmaps: adapter
                .get_downlevel_capabilities()
                .flags
                .contains(wgpu::DownlevelFlags::NON_POWER_OF_TWO_MIPMAPPED_TEXTURES),
        }
    }
}

/// A GPU 2D RGBA8 texture with logical size, padded actual size, and
/// smoothing/mipmap policy.
///
/// The underlying storage exists only after a successful
/// [`create`](Self::create); every (re)allocation bumps [`id`](Self::id) so
/// that downstream bind caches notice the swap. Not `Clone`: one wrapper per
/// GPU resource.
#[derive(Debug)]
pub struct Texture {
    texture: Option<wgpu::Texture>,
    view: Option<wgpu::TextureView>,
    sampler: wgpu::Sampler,
    size: (u32, u32),
    actual_size: (u32, u32),
    smooth: bool,
    has_mipmap: bool,
    id: u64,
}

impl Texture {
    /// An empty texture with no GPU storage.
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            texture: None,
            view: None,
            sampler: make_sampler(device, false, false),
            size: (0, 0),
            actual_size: (0, 0),
            smooth: false,
            has_mipmap: false,
            id: 0,
        }
    }

    /// The device-legal storage size for a requested dimension.
    pub fn actual_dimension(size: u32, caps: &DeviceCaps) -> u32 {
        if caps.npot_mipmaps {
            size
        } else {
            size.max(1).next_power_of_two()
        }
    }

    /// The storage size a `width` × `height` request would allocate.
    ///
    /// Rejects zero dimensions and padded sizes beyond the device maximum;
    /// this check runs before any allocation.
    pub fn storage_size(width: u32, height: u32, caps: &DeviceCaps) -> Result<(u32, u32)> {
        if width == 0 || height == 0 {
            bail!("failed to create texture, invalid size ({width}x{height})");
        }
        let actual = (
            Self::actual_dimension(width, caps),
            Self::actual_dimension(height, caps),
        );
        let max = caps.max_texture_dimension;
        if actual.0 > max || actual.1 > max {
            bail!(
                "failed to create texture, its internal size is too high ({}x{}), maximum is ({max}x{max})",
                actual.0,
                actual.1
            );
        }
        Ok(actual)
    }

    /// Allocate (or reallocate) storage for a `width` × `height` image.
    ///
    /// Fails on a zero dimension or when the padded size exceeds the device
    /// maximum; in both cases no storage is touched. On success the full mip
    /// chain is allocated but sampling is clamped to level 0 until
    /// [`generate_mipmap`](Self::generate_mipmap) fills it.
    pub fn create(
        &mut self,
        device: &wgpu::Device,
        caps: &DeviceCaps,
        width: u32,
        height: u32,
    ) -> Result<()> {
        let actual = Self::storage_size(width, height, caps)?;

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("texture"),
            size: wgpu::Extent3d {
                width: actual.0,
                height: actual.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: mip_level_count(actual.0, actual.1),
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        self.view = Some(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        self.texture = Some(texture);
        self.size = (width, height);
        self.actual_size = actual;
        self.has_mipmap = false;
        self.sampler = make_sampler(device, self.smooth, false);
        self.id = NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Upload an image into the top-left corner of the existing storage.
    pub fn update_image(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, image: &Image) {
        let (w, h) = image.size();
        self.update_pixels(device, queue, image.pixels(), w, h, 0, 0);
    }

    /// Upload a `width` × `height` block of RGBA8 pixels at `(x, y)`.
    ///
    /// A no-op when there is no storage; an out-of-range region is refused
    /// with a warning. Any resident mipmap becomes stale and sampling drops
    /// back to level 0.
    pub fn update_pixels(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pixels: &[u8],
        width: u32,
        height: u32,
        x: u32,
        y: u32,
    ) {
        let Some(texture) = &self.texture else {
            return;
        };
        if pixels.len() < (width as usize * height as usize * 4) {
            log::warn!("texture update skipped, pixel buffer shorter than {width}x{height}");
            return;
        }
        if x + width > self.actual_size.0 || y + height > self.actual_size.1 {
            log::warn!(
                "texture update skipped, region {width}x{height}+{x}+{y} exceeds storage {}x{}",
                self.actual_size.0,
                self.actual_size.1
            );
            return;
        }
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.invalidate_mipmap(device);
    }

    /// Create storage sized for `image` and upload it.
    pub fn load_from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        caps: &DeviceCaps,
        image: &Image,
    ) -> Result<Texture> {
        let mut texture = Texture::new(device);
        let (w, h) = image.size();
        texture.create(device, caps, w, h)?;
        texture.update_image(device, queue, image);
        Ok(texture)
    }

    /// Decode an image file and upload it into a fresh texture.
    pub fn load_from_file(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        caps: &DeviceCaps,
        path: impl AsRef<Path>,
    ) -> Result<Texture> {
        let image = Image::load_from_file(path)?;
        Self::load_from_image(device, queue, caps, &image)
    }

    /// Switch between linear and nearest filtering.
    pub fn set_smooth(&mut self, device: &wgpu::Device, smooth: bool) {
        if smooth != self.smooth {
            self.smooth = smooth;
            self.sampler = make_sampler(device, smooth, self.has_mipmap);
        }
    }

    pub fn is_smooth(&self) -> bool {
        self.smooth
    }

    /// Fill the mip chain by box-filtering the resident image on the CPU.
    ///
    /// Returns `Ok(false)` when there is no storage to mipmap.
    pub async fn generate_mipmap(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> Result<bool> {
        let Some(texture) = &self.texture else {
            return Ok(false);
        };
        let (mut width, mut height) = self.actual_size;
        let mut pixels = self.read_level0(device, queue).await?;
        let mut level = 1u32;
        while width > 1 || height > 1 {
            let (next, nw, nh) = downsample(&pixels, width, height);
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    aspect: wgpu::TextureAspect::All,
                    texture,
                    mip_level: level,
                    origin: wgpu::Origin3d::ZERO,
                },
                &next,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * nw),
                    rows_per_image: Some(nh),
                },
                wgpu::Extent3d {
                    width: nw,
                    height: nh,
                    depth_or_array_layers: 1,
                },
            );
            pixels = next;
            width = nw;
            height = nh;
            level += 1;
        }
        self.has_mipmap = true;
        self.sampler = make_sampler(device, self.smooth, true);
        Ok(true)
    }

    /// Clamp sampling back to the base level.
    pub fn invalidate_mipmap(&mut self, device: &wgpu::Device) {
        if !self.has_mipmap {
            return;
        }
        self.has_mipmap = false;
        self.sampler = make_sampler(device, self.smooth, false);
    }

    pub fn has_mipmap(&self) -> bool {
        self.has_mipmap
    }

    /// Read the logical-size image back from the GPU.
    pub async fn copy_to_image(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Result<Image> {
        if self.texture.is_none() {
            return Ok(Image::new());
        }
        let pixels = self.read_level0(device, queue).await?;
        let (aw, _) = self.actual_size;
        let (w, h) = self.size;
        if (w, h) == self.actual_size {
            return Ok(Image::from_pixels(w, h, &pixels));
        }
        // Crop the power-of-two padding away row by row.
        let mut cropped = Vec::with_capacity(w as usize * h as usize * 4);
        for row in 0..h as usize {
            let start = row * aw as usize * 4;
            cropped.extend_from_slice(&pixels[start..start + w as usize * 4]);
        }
        Ok(Image::from_pixels(w, h, &cropped))
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn actual_size(&self) -> (u32, u32) {
        self.actual_size
    }

    pub fn view(&self) -> Option<&wgpu::TextureView> {
        self.view.as_ref()
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    /// Whether GPU storage is currently resident.
    pub fn is_valid(&self) -> bool {
        self.texture.is_some()
    }

    /// Identity of the current storage allocation (0 before any `create`).
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Read the full (padded) base level back into RGBA8 bytes.
    async fn read_level0(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Result<Vec<u8>> {
        let texture = self
            .texture
            .as_ref()
            .ok_or_else(|| anyhow!("no texture storage to read back"))?;
        let (width, height) = self.actual_size;
        // Buffer rows must be 256-byte aligned for texture-to-buffer copies.
        let padded_bytes_per_row = (4 * width).div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("texture readback buffer"),
            size: padded_bytes_per_row as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("texture readback encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(std::iter::once(encoder.finish()));

        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        let slice = buffer.slice(..);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(std::time::Duration::from_secs(5)),
            })
            .map_err(|e| anyhow!("device poll failed during readback: {e:?}"))?;
        rx.receive()
            .await
            .context("readback channel closed")?
            .context("buffer mapping failed")?;

        let data = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for row in 0..height as usize {
            let start = row * padded_bytes_per_row as usize;
            pixels.extend_from_slice(&data[start..start + width as usize * 4]);
        }
        drop(data);
        buffer.unmap();
        Ok(pixels)
    }
}

/// A depth attachment matching the surface size.
#[derive(Debug)]
pub struct DepthTexture {
    pub view: wgpu::TextureView,
}

impl DepthTexture {
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    pub fn create(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size[0].max(1),
                height: size[1].max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[Self::DEPTH_FORMAT],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { view }
    }
}

fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

fn make_sampler(device: &wgpu::Device, smooth: bool, has_mipmap: bool) -> wgpu::Sampler {
    let filter = if smooth {
        wgpu::FilterMode::Linear
    } else {
        wgpu::FilterMode::Nearest
    };
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::MipmapFilterMode::Linear,
        lod_min_clamp: 0.0,
        // Without generated mip levels, sampling stays on the base level.
        lod_max_clamp: if has_mipmap { 32.0 } else { 0.0 },
        ..Default::default()
    })
}

/// Halve an RGBA8 image with a 2×2 box filter (edge pixels clamp).
fn downsample(pixels: &[u8], width: u32, height: u32) -> (Vec<u8>, u32, u32) {
    let nw = (width / 2).max(1);
    let nh = (height / 2).max(1);
    let mut out = Vec::with_capacity(nw as usize * nh as usize * 4);
    let sample = |x: u32, y: u32, c: usize| {
        let x = x.min(width - 1);
        let y = y.min(height - 1);
        pixels[((x + y * width) * 4) as usize + c] as u32
    };
    for y in 0..nh {
        for x in 0..nw {
            for c in 0..4 {
                let sum = sample(x * 2, y * 2, c)
                    + sample(x * 2 + 1, y * 2, c)
                    + sample(x * 2, y * 2 + 1, c)
                    + sample(x * 2 + 1, y * 2 + 1, c);
                out.push((sum / 4) as u8);
            }
        }
    }
    (out, nw, nh)
}
