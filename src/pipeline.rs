use std::path::{Path, PathBuf};

use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;

use crate::{
    assets::AssetLibrary,
    compose::compose_block,
    config::RenderConfig,
    encode_ffmpeg::{EncodeConfig, FfmpegEncoder},
    error::{ShortreelError, ShortreelResult},
    export::export_manifest,
    frame::{frame_time, render_frame},
    script::ContentBlock,
    text::FontSet,
    timeline::Timeline,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmitMode {
    Mp4,
    Manifest,
}

#[derive(Clone, Debug)]
pub struct BatchOptions {
    pub out_dir: PathBuf,
    pub emit: EmitMode,
    pub base_seed: u64,
    pub overwrite: bool,
}

#[derive(Debug)]
pub struct BlockFailure {
    pub index: usize,
    pub title: String,
    pub error: ShortreelError,
}

#[derive(Debug)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failures: Vec<BlockFailure>,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Render every parsed block independently on the rayon pool. One block's
/// failure (including a parse failure) never aborts its siblings; the music
/// rng is seeded per block from `base_seed + index` so the random selection
/// stays reproducible under parallelism.
pub fn run_batch(
    blocks: Vec<ShortreelResult<ContentBlock>>,
    cfg: &RenderConfig,
    fonts: &FontSet,
    library: &AssetLibrary,
    opts: &BatchOptions,
) -> ShortreelResult<BatchReport> {
    cfg.validate()?;
    let total = blocks.len();

    let failures: Vec<BlockFailure> = blocks
        .into_par_iter()
        .enumerate()
        .filter_map(|(index, parsed)| {
            let block = match parsed {
                Ok(block) => block,
                Err(error) => {
                    tracing::error!(index, %error, "block skipped: parse failure");
                    return Some(BlockFailure {
                        index,
                        title: format!("<block {index}>"),
                        error,
                    });
                }
            };

            let mut rng = StdRng::seed_from_u64(opts.base_seed.wrapping_add(index as u64));
            match render_block(&block, index, cfg, fonts, library, opts, &mut rng) {
                Ok(out) => {
                    tracing::info!(index, title = %block.title, out = %out.display(), "block rendered");
                    None
                }
                Err(error) => {
                    tracing::error!(index, title = %block.title, %error, "block failed");
                    Some(BlockFailure {
                        index,
                        title: block.title,
                        error,
                    })
                }
            }
        })
        .collect();

    let report = BatchReport {
        total,
        succeeded: total - failures.len(),
        failures,
    };
    tracing::info!(
        total = report.total,
        succeeded = report.succeeded,
        failed = report.failures.len(),
        "batch finished"
    );
    Ok(report)
}

fn render_block(
    block: &ContentBlock,
    index: usize,
    cfg: &RenderConfig,
    fonts: &FontSet,
    library: &AssetLibrary,
    opts: &BatchOptions,
    rng: &mut StdRng,
) -> ShortreelResult<PathBuf> {
    let timeline = compose_block(block, cfg, fonts, library, rng)?;
    let stem = output_stem(block, index);

    match opts.emit {
        EmitMode::Mp4 => {
            let out_path = opts.out_dir.join(format!("{stem}.mp4"));
            encode_timeline(&timeline, cfg, &out_path, opts.overwrite)?;
            Ok(out_path)
        }
        EmitMode::Manifest => export_manifest(&timeline, &opts.out_dir.join(stem)),
    }
}

fn encode_timeline(
    timeline: &Timeline,
    cfg: &RenderConfig,
    out_path: &Path,
    overwrite: bool,
) -> ShortreelResult<()> {
    let enc_cfg = EncodeConfig {
        width: timeline.canvas_width,
        height: timeline.canvas_height,
        fps: timeline.frame_rate,
        out_path: out_path.to_path_buf(),
        overwrite,
    };

    let mut encoder = FfmpegEncoder::new(enc_cfg, cfg.background_rgba, &timeline.audio)?;
    for idx in 0..timeline.frame_count() {
        let frame = render_frame(timeline, frame_time(timeline, idx))?;
        encoder.encode_frame(&frame)?;
    }
    encoder.finish()
}

/// Output file stem: the explicit OUTPUT_FILENAME when present (any extension
/// stripped), otherwise a sanitized form of the title.
fn output_stem(block: &ContentBlock, index: usize) -> String {
    if let Some(id) = block.output_id.as_deref() {
        let stem = Path::new(id)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(id);
        let slug = sanitize_stem(stem);
        if !slug.is_empty() {
            return slug;
        }
    }

    let slug = sanitize_stem(&block.title);
    if slug.is_empty() {
        format!("block_{index:03}")
    } else {
        slug
    }
}

fn sanitize_stem(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_sep = true;
    for ch in raw.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}
