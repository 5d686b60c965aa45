use std::path::Path;

use fontdue::{Font, FontSettings};

use crate::{
    error::{ShortreelError, ShortreelResult},
    raster::{over, RasterImage},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FontWeight {
    Regular,
    Bold,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
}

#[derive(Clone, Copy, Debug)]
pub struct Stroke {
    pub width: u32,
    pub rgba: [u8; 4],
}

#[derive(Clone, Copy, Debug)]
pub struct TextStyle {
    pub size: f32,
    pub weight: FontWeight,
    pub align: TextAlign,
    pub rgba: [u8; 4],
    pub stroke: Option<Stroke>,
}

/// Regular + bold faces for one script.
#[derive(Debug)]
pub struct FontSet {
    regular: Font,
    bold: Font,
}

impl FontSet {
    pub fn load(regular_path: &Path, bold_path: &Path) -> ShortreelResult<Self> {
        let regular = read_font(regular_path)?;
        let bold = read_font(bold_path)?;
        Ok(Self { regular, bold })
    }

    pub fn from_bytes(regular: &[u8], bold: &[u8]) -> ShortreelResult<Self> {
        Ok(Self {
            regular: parse_font(regular, "<regular bytes>")?,
            bold: parse_font(bold, "<bold bytes>")?,
        })
    }

    pub fn font(&self, weight: FontWeight) -> &Font {
        match weight {
            FontWeight::Regular => &self.regular,
            FontWeight::Bold => &self.bold,
        }
    }
}

fn read_font(path: &Path) -> ShortreelResult<Font> {
    let bytes = std::fs::read(path).map_err(|e| {
        ShortreelError::font_load(format!("read font file '{}': {e}", path.display()))
    })?;
    parse_font(&bytes, &path.display().to_string())
}

fn parse_font(bytes: &[u8], origin: &str) -> ShortreelResult<Font> {
    Font::from_bytes(bytes, FontSettings::default())
        .map_err(|e| ShortreelError::font_load(format!("parse font '{origin}': {e}")))
}

/// Advance-sum width of a single line at the given pixel size.
pub fn measure_line(font: &Font, size: f32, line: &str) -> f32 {
    line.chars()
        .map(|ch| font.metrics(ch, size).advance_width)
        .sum()
}

/// Greedy word wrap of one paragraph. Words accumulate while the measured
/// width of `current + " " + word` stays within `max_width`; a single word
/// wider than `max_width` goes alone on its own line, untruncated.
pub fn wrap_paragraph<M: Fn(&str) -> f32>(
    measure: &M,
    paragraph: &str,
    max_width: f32,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in paragraph.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
            continue;
        }
        let candidate = format!("{current} {word}");
        if measure(&candidate) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }

    if lines.is_empty() && current.is_empty() {
        lines.push(String::new());
    } else if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Wrap blank-line-separated paragraphs; each restarts wrapping
/// independently, and an empty paragraph becomes an empty line.
pub fn wrap_text<M: Fn(&str) -> f32>(measure: &M, text: &str, max_width: f32) -> Vec<String> {
    let raw: Vec<&str> = text.lines().collect();
    let mut out = Vec::new();
    for group in raw.split(|line| line.trim().is_empty()) {
        let paragraph = group.join(" ");
        out.extend(wrap_paragraph(measure, &paragraph, max_width));
    }
    if out.is_empty() {
        out.push(String::new());
    }
    out
}

/// Render wrapped text into a premultiplied raster.
///
/// Raster width = min(`max_width`, widest wrapped line); height = per-line
/// heights plus 40%-of-font-size inter-line spacing. When a stroke is
/// configured the raster grows by the stroke width on every side and the
/// outline is drawn by offsetting the glyph pass in the 8 neighbouring pixel
/// directions before the fill pass.
pub fn rasterize_text(
    fonts: &FontSet,
    text: &str,
    style: &TextStyle,
    max_width: u32,
) -> ShortreelResult<RasterImage> {
    if max_width == 0 {
        return Err(ShortreelError::rasterization(
            "text raster max_width must be > 0",
        ));
    }
    if !(style.size > 0.0) {
        return Err(ShortreelError::rasterization("font size must be > 0"));
    }

    let font = fonts.font(style.weight);
    let measure = |s: &str| measure_line(font, style.size, s);
    let lines = wrap_text(&measure, text, max_width as f32);

    let widest = lines
        .iter()
        .map(|l| measure(l))
        .fold(0.0f32, f32::max)
        .ceil() as u32;
    let text_width = widest.min(max_width).max(1);

    let line_height = style.size.ceil() as u32;
    let spacing = (style.size * 0.4).round() as u32;
    let text_height = line_height * lines.len() as u32
        + spacing * (lines.len() as u32).saturating_sub(1);

    let pad = style.stroke.map(|s| s.width).unwrap_or(0);
    let width = text_width + pad * 2;
    let height = text_height.max(1) + pad * 2;

    let mut buf = vec![0u8; (width as usize) * (height as usize) * 4];

    let ascent = font
        .horizontal_line_metrics(style.size)
        .map(|m| m.ascent)
        .unwrap_or(style.size * 0.8)
        .ceil() as i32;

    for (idx, line) in lines.iter().enumerate() {
        let line_width = measure(line);
        let pen_x = match style.align {
            TextAlign::Left => pad as i32,
            TextAlign::Center => pad as i32 + ((text_width as f32 - line_width) / 2.0) as i32,
        };
        let baseline =
            pad as i32 + (idx as u32 * (line_height + spacing)) as i32 + ascent.min(line_height as i32);

        if let Some(stroke) = style.stroke {
            let w = stroke.width as i32;
            for dy in [-w, 0, w] {
                for dx in [-w, 0, w] {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    draw_line(
                        &mut buf, width, height, font, style.size, line, pen_x + dx,
                        baseline + dy, stroke.rgba,
                    );
                }
            }
        }
        draw_line(
            &mut buf, width, height, font, style.size, line, pen_x, baseline, style.rgba,
        );
    }

    Ok(RasterImage::new(width, height, buf))
}

#[allow(clippy::too_many_arguments)]
fn draw_line(
    buf: &mut [u8],
    buf_width: u32,
    buf_height: u32,
    font: &Font,
    size: f32,
    line: &str,
    start_x: i32,
    baseline: i32,
    rgba: [u8; 4],
) {
    let mut pen_x = start_x as f32;
    for ch in line.chars() {
        let (metrics, coverage) = font.rasterize(ch, size);
        let glyph_x = pen_x as i32 + metrics.xmin;
        let glyph_y = baseline - metrics.height as i32 - metrics.ymin;

        for row in 0..metrics.height {
            let y = glyph_y + row as i32;
            if y < 0 || y >= buf_height as i32 {
                continue;
            }
            for col in 0..metrics.width {
                let x = glyph_x + col as i32;
                if x < 0 || x >= buf_width as i32 {
                    continue;
                }
                let cov = coverage[row * metrics.width + col];
                if cov == 0 {
                    continue;
                }

                let alpha = ((u16::from(cov) * u16::from(rgba[3]) + 127) / 255) as u8;
                let src = [
                    ((u16::from(rgba[0]) * u16::from(alpha) + 127) / 255) as u8,
                    ((u16::from(rgba[1]) * u16::from(alpha) + 127) / 255) as u8,
                    ((u16::from(rgba[2]) * u16::from(alpha) + 127) / 255) as u8,
                    alpha,
                ];

                let off = ((y as usize) * (buf_width as usize) + (x as usize)) * 4;
                let dst = [buf[off], buf[off + 1], buf[off + 2], buf[off + 3]];
                buf[off..off + 4].copy_from_slice(&over(dst, src, 1.0));
            }
        }

        pen_x += metrics.advance_width;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 10 px per character keeps widths trivially predictable.
    fn fake_measure(s: &str) -> f32 {
        s.chars().count() as f32 * 10.0
    }

    #[test]
    fn no_wrapped_line_exceeds_max_width() {
        let text = "the quick brown fox jumps over the lazy dog again and again";
        let lines = wrap_paragraph(&fake_measure, text, 200.0);
        for line in &lines {
            assert!(fake_measure(line) <= 200.0, "line too wide: {line:?}");
        }
        // Every word survives wrapping.
        let rejoined = lines.join(" ");
        assert_eq!(rejoined, text);
    }

    #[test]
    fn overwide_word_goes_alone_on_its_line() {
        let lines = wrap_paragraph(&fake_measure, "ok incomprehensibilities ok", 100.0);
        assert_eq!(lines, ["ok", "incomprehensibilities", "ok"]);
    }

    #[test]
    fn empty_paragraph_becomes_empty_line() {
        let lines = wrap_text(&fake_measure, "alpha\n\n\nbeta", 400.0);
        assert_eq!(lines, ["alpha", "", "beta"]);
    }

    #[test]
    fn paragraphs_wrap_independently() {
        let lines = wrap_text(&fake_measure, "one two three\nfour\n\nfive six", 70.0);
        // Intra-paragraph newlines act as spaces before wrapping.
        assert_eq!(lines, ["one two", "three", "four", "five", "six"]);
    }

    #[test]
    fn wrapping_is_deterministic() {
        let text = "some reasonably long input that wraps across lines";
        assert_eq!(
            wrap_text(&fake_measure, text, 150.0),
            wrap_text(&fake_measure, text, 150.0)
        );
    }

    #[test]
    fn empty_input_is_one_empty_line() {
        assert_eq!(wrap_text(&fake_measure, "", 100.0), [""]);
    }

    #[test]
    fn missing_font_file_is_a_font_load_error() {
        let err = FontSet::load(
            Path::new("/nonexistent/regular.ttf"),
            Path::new("/nonexistent/bold.ttf"),
        )
        .unwrap_err();
        assert!(matches!(err, ShortreelError::FontLoad(_)));
    }
}
