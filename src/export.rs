use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Serialize;

use crate::{
    audio::AudioPlan,
    error::{ShortreelError, ShortreelResult},
    timeline::{LayerKind, LayerSource, Timeline},
};

/// Serialized form of one timeline layer. Raster layers reference a PNG file
/// written next to the manifest; solid layers carry their color inline.
#[derive(Debug, Serialize)]
pub struct ManifestLayer {
    pub kind: LayerKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub png: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solid_rgba: Option<[u8; 4]>,
    pub x: i32,
    pub y: i32,
    pub start_time: f64,
    pub duration: f64,
    pub fade_in: f64,
    pub fade_out: f64,
}

#[derive(Debug, Serialize)]
pub struct Manifest {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub frame_rate: u32,
    pub total_duration: f64,
    pub layers: Vec<ManifestLayer>,
    pub audio: AudioPlan,
}

/// Write the composed program to `out_dir` as `manifest.json` plus one
/// straight-alpha PNG per raster layer. Returns the manifest path.
pub fn export_manifest(timeline: &Timeline, out_dir: &Path) -> ShortreelResult<PathBuf> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create export directory '{}'", out_dir.display()))?;

    let mut layers = Vec::with_capacity(timeline.layers.len());
    for (idx, layer) in timeline.layers.iter().enumerate() {
        let (png, solid_rgba) = match &layer.source {
            LayerSource::Solid(rgba) => (None, Some(*rgba)),
            LayerSource::Raster(raster) => {
                let name = format!("layer_{idx:03}_{}.png", kind_slug(layer.kind));
                let path = out_dir.join(&name);
                let straight = unpremultiply_rgba8(&raster.rgba8_premul);
                image::save_buffer_with_format(
                    &path,
                    &straight,
                    raster.width,
                    raster.height,
                    image::ColorType::Rgba8,
                    image::ImageFormat::Png,
                )
                .map_err(|e| {
                    ShortreelError::rasterization(format!(
                        "failed to write layer PNG '{}': {e}",
                        path.display()
                    ))
                })?;
                (Some(name), None)
            }
        };

        layers.push(ManifestLayer {
            kind: layer.kind,
            png,
            solid_rgba,
            x: layer.x,
            y: layer.y,
            start_time: layer.start_time,
            duration: layer.duration,
            fade_in: layer.fade_in,
            fade_out: layer.fade_out,
        });
    }

    let manifest = Manifest {
        canvas_width: timeline.canvas_width,
        canvas_height: timeline.canvas_height,
        frame_rate: timeline.frame_rate,
        total_duration: timeline.total_duration,
        layers,
        audio: timeline.audio.clone(),
    };

    let manifest_path = out_dir.join("manifest.json");
    let json = serde_json::to_string_pretty(&manifest)
        .map_err(|e| ShortreelError::Other(anyhow::anyhow!("manifest serialization failed: {e}")))?;
    std::fs::write(&manifest_path, json)
        .with_context(|| format!("failed to write '{}'", manifest_path.display()))?;

    Ok(manifest_path)
}

fn kind_slug(kind: LayerKind) -> &'static str {
    match kind {
        LayerKind::Background => "background",
        LayerKind::Image => "image",
        LayerKind::Title => "title",
        LayerKind::Content => "content",
    }
}

/// PNG carries straight alpha; undo the premultiplication before saving.
fn unpremultiply_rgba8(premul: &[u8]) -> Vec<u8> {
    let mut out = premul.to_vec();
    for px in out.chunks_exact_mut(4) {
        let a = px[3];
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * 255 + u16::from(a) / 2) / u16::from(a)).min(255) as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpremultiply_inverts_half_alpha() {
        // Premul (128, 0, 0, 128) round-trips to straight (255, 0, 0, 128).
        let out = unpremultiply_rgba8(&[128, 0, 0, 128]);
        assert_eq!(out, vec![255, 0, 0, 128]);
    }

    #[test]
    fn unpremultiply_leaves_opaque_and_clear_pixels_alone() {
        assert_eq!(unpremultiply_rgba8(&[10, 20, 30, 255]), vec![10, 20, 30, 255]);
        assert_eq!(unpremultiply_rgba8(&[0, 0, 0, 0]), vec![0, 0, 0, 0]);
    }

    #[test]
    fn kind_slugs_are_stable() {
        assert_eq!(kind_slug(LayerKind::Background), "background");
        assert_eq!(kind_slug(LayerKind::Content), "content");
    }
}
