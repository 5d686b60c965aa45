use std::path::{Path, PathBuf};

use crate::error::{ShortreelError, ShortreelResult};

/// Background track reconciled to the video duration. An absent source is a
/// valid silent plan, not an error.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AudioPlan {
    pub source_path: Option<PathBuf>,
    pub target_duration: f64,
    /// Additional repeats needed when the source is shorter than the target
    /// (matches ffmpeg `-stream_loop` semantics).
    pub loop_count: u32,
    /// Always equals `target_duration`.
    pub trim_to: f64,
}

impl AudioPlan {
    pub fn silent(target_duration: f64) -> Self {
        Self {
            source_path: None,
            target_duration,
            loop_count: 0,
            trim_to: target_duration,
        }
    }
}

/// Loop/trim arithmetic: a source shorter than the target is conceptually
/// repeated `ceil(target / d)` times, so it needs `ceil(target / d) - 1`
/// additional repeats; a source at or beyond the target is trimmed directly.
pub fn reconcile(source_duration: f64, target_duration: f64) -> (u32, f64) {
    let loops = if source_duration > 0.0 && source_duration < target_duration {
        (target_duration / source_duration).ceil() as u32 - 1
    } else {
        0
    };
    (loops, target_duration)
}

/// Build the audio plan for one block, probing the source duration with
/// ffprobe. A source that cannot be probed degrades to a silent plan.
pub fn plan_audio(source: Option<&Path>, target_duration: f64) -> ShortreelResult<AudioPlan> {
    if !(target_duration > 0.0) {
        return Err(ShortreelError::invalid_config(
            "audio target duration must be > 0",
        ));
    }

    let Some(path) = source else {
        return Ok(AudioPlan::silent(target_duration));
    };

    let duration = match probe_audio_duration(path) {
        Ok(d) if d > 0.0 => d,
        Ok(_) => {
            tracing::warn!(path = %path.display(), "audio source has no duration; dropping track");
            return Ok(AudioPlan::silent(target_duration));
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "audio probe failed; dropping track");
            return Ok(AudioPlan::silent(target_duration));
        }
    };

    let (loop_count, trim_to) = reconcile(duration, target_duration);
    Ok(AudioPlan {
        source_path: Some(path.to_path_buf()),
        target_duration,
        loop_count,
        trim_to,
    })
}

/// Read a media file's duration in seconds via `ffprobe` (requires ffprobe on
/// PATH).
pub fn probe_audio_duration(path: &Path) -> ShortreelResult<f64> {
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        format: Option<ProbeFormat>,
    }

    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| {
            ShortreelError::asset_not_found(format!(
                "ffprobe failed to start for '{}': {e}",
                path.display()
            ))
        })?;

    if !out.status.success() {
        return Err(ShortreelError::asset_not_found(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout).map_err(|e| {
        ShortreelError::asset_not_found(format!(
            "ffprobe output for '{}' was not valid JSON: {e}",
            path.display()
        ))
    })?;

    parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| {
            ShortreelError::asset_not_found(format!(
                "ffprobe reported no duration for '{}'",
                path.display()
            ))
        })
}
