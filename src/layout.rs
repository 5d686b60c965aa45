use crate::{
    config::{RenderConfig, SectionsPerPage},
    error::{ShortreelError, ShortreelResult},
    script::Section,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Vertical placement of the image/title/content bands on the canvas.
/// Regions never overlap; they stack top to bottom in that order.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LayoutPlan {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub image_region: Option<Rect>,
    pub title_region: Rect,
    pub content_region: Rect,
}

/// One time-boxed slice of content sections.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Page {
    pub sections: Vec<Section>,
    pub start_time: f64,
    pub duration: f64,
    pub fade_in: f64,
    pub fade_out: f64,
}

/// Compute the region plan for one block. `image_size` is the resolved image
/// asset's native dimensions, or `None` when no image asset was found.
///
/// This never fails: a cramped content region is a degraded but valid plan.
pub fn plan_layout(cfg: &RenderConfig, image_size: Option<(u32, u32)>) -> LayoutPlan {
    let canvas_w = cfg.canvas_width;
    let canvas_h = cfg.canvas_height;
    let mut y = cfg.top_margin as i32;

    let image_region = match image_size {
        Some((src_w, src_h)) if src_w > 0 && src_h > 0 => {
            let (w, h) = fit_image(cfg, src_w, src_h);
            let rect = Rect {
                x: ((canvas_w as i32) - (w as i32)) / 2,
                y,
                width: w,
                height: h,
            };
            y += h as i32 + cfg.image_gap as i32;
            Some(rect)
        }
        _ => {
            y += cfg.placeholder_image_margin as i32;
            None
        }
    };

    let title_region = Rect {
        x: 0,
        y,
        width: canvas_w,
        height: cfg.title_height,
    };
    y += cfg.title_height as i32 + cfg.title_gap as i32;

    let content_height = (canvas_h as i32 - y - cfg.content_bottom_margin as i32).max(0) as u32;
    if content_height < cfg.min_content_height {
        tracing::warn!(
            available = content_height,
            minimum = cfg.min_content_height,
            "content region below minimum height; output will be cramped"
        );
    }

    LayoutPlan {
        canvas_width: canvas_w,
        canvas_height: canvas_h,
        image_region,
        title_region,
        content_region: Rect {
            x: 0,
            y,
            width: canvas_w,
            height: content_height,
        },
    }
}

/// Height-first fit at `image_height_fraction` of the canvas, falling back to
/// the width cap (aspect ratio preserved) when the scaled width would exceed
/// `image_max_width_fraction` of the canvas.
fn fit_image(cfg: &RenderConfig, src_w: u32, src_h: u32) -> (u32, u32) {
    let aspect = f64::from(src_w) / f64::from(src_h);
    let mut h = f64::from(cfg.canvas_height) * cfg.image_height_fraction;
    let mut w = h * aspect;

    let max_w = f64::from(cfg.canvas_width) * cfg.image_max_width_fraction;
    if w > max_w {
        w = max_w;
        h = w / aspect;
    }

    ((w.round() as u32).max(1), (h.round() as u32).max(1))
}

/// Split sections into evenly time-sliced pages.
///
/// The rounding remainder is absorbed into the last page so the durations sum
/// to `total_duration` exactly. An empty section list yields a single
/// full-duration page.
pub fn paginate(sections: &[Section], cfg: &RenderConfig) -> ShortreelResult<Vec<Page>> {
    if !(cfg.total_duration > 0.0) {
        return Err(ShortreelError::invalid_config(
            "total_duration must be > 0 to paginate",
        ));
    }

    let per_page = match cfg.sections_per_page {
        SectionsPerPage::Count(0) => {
            return Err(ShortreelError::invalid_config(
                "sections_per_page must be >= 1",
            ));
        }
        SectionsPerPage::Count(n) => n,
        SectionsPerPage::All(_) => sections.len().max(1),
    };

    let page_count = if sections.is_empty() {
        1
    } else {
        sections.len().div_ceil(per_page)
    };

    let slice = cfg.total_duration / page_count as f64;
    let mut pages = Vec::with_capacity(page_count);

    for idx in 0..page_count {
        let start_time = slice * idx as f64;
        let duration = if idx + 1 == page_count {
            cfg.total_duration - start_time
        } else {
            slice
        };
        let fade = cfg.fade_duration.min(duration / 2.0);

        let lo = idx * per_page;
        let hi = ((idx + 1) * per_page).min(sections.len());
        pages.push(Page {
            sections: sections.get(lo..hi).unwrap_or_default().to_vec(),
            start_time,
            duration,
            fade_in: fade,
            fade_out: fade,
        });
    }

    Ok(pages)
}
