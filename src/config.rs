use crate::error::{ShortreelError, ShortreelResult};

/// How many content sections share one timed page.
///
/// `All` collapses the whole body onto a single page; it is the configuration
/// form of the "no paging" variant rather than a separate code path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged, rename_all = "lowercase")]
pub enum SectionsPerPage {
    Count(usize),
    All(AllMarker),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllMarker {
    All,
}

impl SectionsPerPage {
    pub const ALL: SectionsPerPage = SectionsPerPage::All(AllMarker::All);
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub total_duration: f64,
    pub frame_rate: u32,
    pub sections_per_page: SectionsPerPage,
    pub fade_duration: f64,

    pub image_height_fraction: f64,
    pub image_max_width_fraction: f64,

    /// Margin above the image region (px from the canvas top).
    pub top_margin: u32,
    /// Gap between the image region and the title band.
    pub image_gap: u32,
    /// Vertical budget consumed when no image asset resolves.
    pub placeholder_image_margin: u32,
    pub title_height: u32,
    pub title_gap: u32,
    pub content_bottom_margin: u32,
    /// Below this usable content height the plan still succeeds but a
    /// diagnostic is emitted.
    pub min_content_height: u32,

    pub title_font_size: f32,
    pub content_font_size: f32,
    /// Vertical gap between stacked sections on one page.
    pub section_gap: u32,
    pub background_rgba: [u8; 4],
    pub text_rgba: [u8; 4],

    /// Minimum similarity for fuzzy audio-hint matching. `None` always
    /// returns the best-scoring candidate, however poor.
    pub audio_match_threshold: Option<f64>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            canvas_width: 1080,
            canvas_height: 1920,
            total_duration: 30.0,
            frame_rate: 30,
            sections_per_page: SectionsPerPage::Count(2),
            fade_duration: 0.5,
            image_height_fraction: 0.35,
            image_max_width_fraction: 0.70,
            top_margin: 40,
            image_gap: 30,
            placeholder_image_margin: 300,
            title_height: 180,
            title_gap: 25,
            content_bottom_margin: 60,
            min_content_height: 800,
            title_font_size: 52.0,
            content_font_size: 44.0,
            section_gap: 25,
            background_rgba: [255, 255, 255, 255],
            text_rgba: [0, 0, 0, 255],
            audio_match_threshold: Some(0.6),
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> ShortreelResult<()> {
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(ShortreelError::invalid_config(
                "canvas width/height must be > 0",
            ));
        }
        if !(self.total_duration > 0.0) {
            return Err(ShortreelError::invalid_config(
                "total_duration must be > 0 seconds",
            ));
        }
        if self.frame_rate == 0 {
            return Err(ShortreelError::invalid_config("frame_rate must be > 0"));
        }
        if self.sections_per_page == SectionsPerPage::Count(0) {
            return Err(ShortreelError::invalid_config(
                "sections_per_page must be >= 1 (or \"all\")",
            ));
        }
        if !(self.fade_duration >= 0.0) {
            return Err(ShortreelError::invalid_config(
                "fade_duration must be >= 0",
            ));
        }
        if !(self.image_height_fraction > 0.0 && self.image_height_fraction <= 1.0) {
            return Err(ShortreelError::invalid_config(
                "image_height_fraction must be in (0, 1]",
            ));
        }
        if !(self.image_max_width_fraction > 0.0 && self.image_max_width_fraction <= 1.0) {
            return Err(ShortreelError::invalid_config(
                "image_max_width_fraction must be in (0, 1]",
            ));
        }
        if !(self.title_font_size > 0.0) || !(self.content_font_size > 0.0) {
            return Err(ShortreelError::invalid_config("font sizes must be > 0"));
        }
        Ok(())
    }
}
