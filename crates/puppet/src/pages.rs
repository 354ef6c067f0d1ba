//! Atlas pages from disk, placeholder pages, and PNG captures

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use image::{ImageBuffer, Rgba};
use puppet_render::{Texture, TexturePages};
use puppet_rig::SkeletonData;

/// Load every `*.png` in `dir`, keyed by file name (`skeleton.png`).
pub fn load_pages(dir: &Path) -> Result<TexturePages> {
    let mut pages = TexturePages::new();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read page directory {}", dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("png") {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let img = image::open(&path)
            .with_context(|| format!("Failed to decode {}", path.display()))?
            .to_rgba8();
        let (width, height) = img.dimensions();
        let texture = Texture::from_rgba8(name, width, height, img.into_raw())?;
        log::debug!("Loaded page {} ({}x{})", name, width, height);
        pages.insert(texture);
    }

    log::info!("Loaded {} pages from {}", pages.len(), dir.display());
    Ok(pages)
}

/// Atlas page names referenced by any skin, sorted.
pub fn referenced_pages(data: &SkeletonData) -> BTreeSet<String> {
    data.skins
        .iter()
        .flat_map(|skin| skin.attachments.iter())
        .filter_map(|entry| entry.attachment.region())
        .map(|region| region.page.clone())
        .collect()
}

/// Solid white stand-ins for every page the rig references, so a rig can be
/// simulated and rendered without its art.
pub fn placeholder_pages(data: &SkeletonData, default_page: &str) -> TexturePages {
    let mut pages = TexturePages::new();
    let mut names = referenced_pages(data);
    names.insert(default_page.to_string());
    for name in names {
        pages.insert(Texture::solid(name, 16, 16, [255, 255, 255, 255]));
    }
    pages
}

/// Save an RGBA8 buffer as PNG.
pub fn save_png(buffer: Vec<u8>, width: u32, height: u32, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let img: ImageBuffer<Rgba<u8>, _> = ImageBuffer::from_raw(width, height, buffer)
        .ok_or_else(|| anyhow::anyhow!("Failed to create image buffer"))?;
    img.save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
