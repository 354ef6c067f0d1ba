//! Textures and texture resolution
//!
//! A `Texture` is an identity plus optional RGBA8 pixels. Pixels are kept
//! on the CPU so recolor materials can be shaded without a GPU (tests and
//! debug tooling) and so the GPU backend can upload them lazily.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use glam::Vec2;

use crate::RenderError;

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique texture identity used in material cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(u64);

impl TextureId {
    fn next() -> Self {
        Self(NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// An atlas page or mask page.
#[derive(Debug)]
pub struct Texture {
    id: TextureId,
    name: String,
    width: u32,
    height: u32,
    /// Row-major RGBA8, top row first
    pixels: Option<Vec<u8>>,
}

pub type TextureHandle = Arc<Texture>;

impl Texture {
    /// A texture known only by name and size (pixels live elsewhere).
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> TextureHandle {
        Arc::new(Self {
            id: TextureId::next(),
            name: name.into(),
            width,
            height,
            pixels: None,
        })
    }

    pub fn from_rgba8(
        name: impl Into<String>,
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    ) -> Result<TextureHandle, RenderError> {
        let name = name.into();
        if width == 0 || height == 0 {
            return Err(RenderError::EmptyTexture { name });
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(RenderError::PixelSize {
                name,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Arc::new(Self {
            id: TextureId::next(),
            name,
            width,
            height,
            pixels: Some(pixels),
        }))
    }

    /// Single-color texture, handy for placeholder pages.
    pub fn solid(name: impl Into<String>, width: u32, height: u32, rgba: [u8; 4]) -> TextureHandle {
        let count = width.max(1) as usize * height.max(1) as usize;
        Arc::new(Self {
            id: TextureId::next(),
            name: name.into(),
            width: width.max(1),
            height: height.max(1),
            pixels: Some(rgba.repeat(count)),
        })
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> Option<&[u8]> {
        self.pixels.as_deref()
    }

    /// Texel at integer coordinates as 0..1 floats.
    pub fn texel(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        let pixels = self.pixels.as_ref()?;
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let p = &pixels[i..i + 4];
        Some([
            p[0] as f32 / 255.0,
            p[1] as f32 / 255.0,
            p[2] as f32 / 255.0,
            p[3] as f32 / 255.0,
        ])
    }

    /// Nearest-neighbour sample with clamp-to-edge addressing, matching the
    /// GPU sampler.
    pub fn sample(&self, uv: Vec2) -> Option<[f32; 4]> {
        let x = (uv.x * self.width as f32).floor() as i64;
        let y = (uv.y * self.height as f32).floor() as i64;
        let x = x.clamp(0, self.width as i64 - 1) as u32;
        let y = y.clamp(0, self.height as i64 - 1) as u32;
        self.texel(x, y)
    }
}

/// Looks textures up by atlas page name or file name.
///
/// Implementations must be idempotent: the renderer calls this for every
/// visible slot every frame.
pub trait TextureResolver {
    fn resolve(&self, name: &str) -> Option<TextureHandle>;
}

impl<F> TextureResolver for F
where
    F: Fn(&str) -> Option<TextureHandle>,
{
    fn resolve(&self, name: &str) -> Option<TextureHandle> {
        self(name)
    }
}

/// Simple name → texture map.
#[derive(Debug, Default, Clone)]
pub struct TexturePages {
    pages: AHashMap<String, TextureHandle>,
}

impl TexturePages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the texture's own name.
    pub fn insert(&mut self, texture: TextureHandle) {
        self.pages.insert(texture.name().to_string(), texture);
    }

    /// Register under an additional alias (e.g. a region name).
    pub fn alias(&mut self, name: impl Into<String>, texture: TextureHandle) {
        self.pages.insert(name.into(), texture);
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TextureHandle> {
        self.pages.values()
    }
}

impl TextureResolver for TexturePages {
    fn resolve(&self, name: &str) -> Option<TextureHandle> {
        self.pages.get(name).cloned()
    }
}
