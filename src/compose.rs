use std::sync::Arc;

use rand::Rng;

use crate::{
    assets::{category_from_image, AssetLibrary},
    audio::plan_audio,
    config::RenderConfig,
    error::ShortreelResult,
    layout::{paginate, plan_layout},
    raster::{load_image_resized, probe_image_size, RasterImage},
    script::{ContentBlock, Section},
    text::{rasterize_text, FontSet, FontWeight, TextAlign, TextStyle},
    timeline::{LayerKind, LayerSource, Timeline, TimelineBuilder, TimelineLayer},
};

/// Fraction of the band width available to rendered text; the remainder is
/// symmetric horizontal padding.
const TEXT_WIDTH_FRACTION: f64 = 0.8;

/// Assemble the full timeline for one content block.
///
/// Z-order is background < image < title < content pages, expressed as layer
/// list order. A missing image or a failed page raster degrades to an omitted
/// layer with a diagnostic; the timing partition is unaffected.
pub fn compose_block<R: Rng>(
    block: &ContentBlock,
    cfg: &RenderConfig,
    fonts: &FontSet,
    library: &AssetLibrary,
    rng: &mut R,
) -> ShortreelResult<Timeline> {
    cfg.validate()?;

    let image_path = block
        .image_ref
        .as_deref()
        .and_then(|name| match library.resolve_image(name) {
            Some(path) => Some(path),
            None => {
                tracing::warn!(image = name, "image asset not found; layer omitted");
                None
            }
        });

    let image_size = image_path.as_deref().and_then(|path| {
        match probe_image_size(path) {
            Ok(dims) => Some(dims),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable image; layer omitted");
                None
            }
        }
    });

    let plan = plan_layout(cfg, image_size);
    let pages = paginate(&block.sections, cfg)?;

    let mut builder = TimelineBuilder::new(
        cfg.canvas_width,
        cfg.canvas_height,
        cfg.frame_rate,
        cfg.total_duration,
    );

    builder.push_static(
        LayerKind::Background,
        LayerSource::Solid(cfg.background_rgba),
        0,
        0,
    );

    if let (Some(path), Some(region)) = (image_path.as_deref(), plan.image_region) {
        match load_image_resized(path, region.width, region.height) {
            Ok(raster) => {
                builder.push_static(
                    LayerKind::Image,
                    LayerSource::Raster(Arc::new(raster)),
                    region.x,
                    region.y,
                );
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "image decode failed; layer omitted");
            }
        }
    }

    let title_style = TextStyle {
        size: cfg.title_font_size,
        weight: FontWeight::Bold,
        align: TextAlign::Center,
        rgba: cfg.text_rgba,
        stroke: None,
    };
    let title_max = text_width(plan.title_region.width);
    match rasterize_text(fonts, &block.title, &title_style, title_max) {
        Ok(raster) => {
            let x = plan.title_region.x + centered(plan.title_region.width, raster.width);
            let y = plan.title_region.y
                + centered(plan.title_region.height, raster.height.min(plan.title_region.height));
            builder.push_static(LayerKind::Title, LayerSource::Raster(Arc::new(raster)), x, y);
        }
        Err(e) => {
            tracing::warn!(title = %block.title, error = %e, "title raster failed; layer omitted");
        }
    }

    let content_max = text_width(plan.content_region.width);
    for (idx, page) in pages.iter().enumerate() {
        if page.sections.is_empty() {
            continue;
        }
        match render_page(fonts, &page.sections, cfg, content_max) {
            Ok(raster) => {
                let x = plan.content_region.x + centered(plan.content_region.width, raster.width);
                builder.push(TimelineLayer {
                    kind: LayerKind::Content,
                    source: LayerSource::Raster(Arc::new(raster)),
                    x,
                    y: plan.content_region.y,
                    start_time: page.start_time,
                    duration: page.duration,
                    fade_in: page.fade_in,
                    fade_out: page.fade_out,
                });
            }
            Err(e) => {
                tracing::warn!(page = idx, error = %e, "page raster failed; layer omitted");
            }
        }
    }

    let audio_source = resolve_block_audio(block, cfg, library, rng);
    let audio = plan_audio(audio_source.as_deref(), cfg.total_duration)?;

    builder.finish(audio)
}

/// Render one page of sections as a single stacked raster: bold heading line
/// (with a trailing colon) above the regular body, sections separated by the
/// configured gap.
pub fn render_page(
    fonts: &FontSet,
    sections: &[Section],
    cfg: &RenderConfig,
    max_width: u32,
) -> ShortreelResult<RasterImage> {
    let heading_style = TextStyle {
        size: cfg.content_font_size,
        weight: FontWeight::Bold,
        align: TextAlign::Left,
        rgba: cfg.text_rgba,
        stroke: None,
    };
    let body_style = TextStyle {
        weight: FontWeight::Regular,
        ..heading_style
    };
    let inner_gap = (cfg.content_font_size * 0.4).round() as u32;

    let mut parts: Vec<RasterImage> = Vec::new();
    let mut gaps: Vec<u32> = Vec::new();

    for (idx, section) in sections.iter().enumerate() {
        let mut first_in_section = true;
        if !section.heading.is_empty() {
            let heading = format!("{}:", section.heading);
            parts.push(rasterize_text(fonts, &heading, &heading_style, max_width)?);
            gaps.push(if idx == 0 { 0 } else { cfg.section_gap });
            first_in_section = false;
        }
        if !section.body.is_empty() {
            parts.push(rasterize_text(fonts, &section.body, &body_style, max_width)?);
            gaps.push(match (idx, first_in_section) {
                (0, true) => 0,
                (_, true) => cfg.section_gap,
                (_, false) => inner_gap,
            });
        }
    }

    if parts.is_empty() {
        return Ok(RasterImage::transparent(1, 1));
    }

    let width = parts.iter().map(|p| p.width).max().unwrap_or(1);
    let height: u32 = parts.iter().map(|p| p.height).sum::<u32>() + gaps.iter().sum::<u32>();

    let mut buf = vec![0u8; (width as usize) * (height as usize) * 4];
    let mut y = 0u32;
    for (part, gap) in parts.iter().zip(&gaps) {
        y += gap;
        blit(&mut buf, width, part, 0, y);
        y += part.height;
    }

    Ok(RasterImage::new(width, height, buf))
}

fn blit(dst: &mut [u8], dst_width: u32, src: &RasterImage, x: u32, y: u32) {
    for row in 0..src.height {
        let src_off = (row as usize) * (src.width as usize) * 4;
        let dst_off = (((y + row) as usize) * (dst_width as usize) + (x as usize)) * 4;
        let len = (src.width as usize) * 4;
        dst[dst_off..dst_off + len].copy_from_slice(&src.rgba8_premul[src_off..src_off + len]);
    }
}

fn text_width(band_width: u32) -> u32 {
    ((f64::from(band_width) * TEXT_WIDTH_FRACTION) as u32).max(1)
}

fn centered(band: u32, inner: u32) -> i32 {
    (band as i32 - inner as i32) / 2
}

/// Music lookup order: the category folder derived from the image stem (or
/// the title prefix before any parenthesis), then the BG_MUSIC hint as a
/// literal path, then fuzzy matching against the music library.
fn resolve_block_audio<R: Rng>(
    block: &ContentBlock,
    cfg: &RenderConfig,
    library: &AssetLibrary,
    rng: &mut R,
) -> Option<std::path::PathBuf> {
    let category = block
        .image_ref
        .as_deref()
        .map(category_from_image)
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| title_category(&block.title));

    if let Some(path) = library.resolve_audio(&category, rng) {
        return Some(path);
    }

    let hint = block.audio_hint.as_deref()?;
    let literal = std::path::Path::new(hint);
    if literal.is_file() {
        return Some(literal.to_path_buf());
    }

    match library.resolve_audio_hint(hint, cfg.audio_match_threshold) {
        Some(path) => Some(path),
        None => {
            tracing::warn!(hint, "no background music matched; output will be silent");
            None
        }
    }
}

fn title_category(title: &str) -> String {
    title
        .split('(')
        .next()
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}
