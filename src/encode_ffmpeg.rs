use std::{
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use anyhow::Context as _;

use crate::{
    audio::AudioPlan,
    error::{ShortreelError, ShortreelResult},
    frame::FrameRgba,
};

#[derive(Clone, Debug)]
pub struct EncodeConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub out_path: PathBuf,
    pub overwrite: bool,
}

impl EncodeConfig {
    pub fn validate(&self) -> ShortreelResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ShortreelError::invalid_config(
                "encode width/height must be non-zero",
            ));
        }
        if self.fps == 0 {
            return Err(ShortreelError::invalid_config("encode fps must be non-zero"));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            // With the default settings we target yuv420p output for maximum compatibility.
            return Err(ShortreelError::invalid_config(
                "encode width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        Ok(())
    }
}

pub fn default_mp4_config(
    out_path: impl Into<PathBuf>,
    width: u32,
    height: u32,
    fps: u32,
) -> EncodeConfig {
    EncodeConfig {
        width,
        height,
        fps,
        out_path: out_path.into(),
        overwrite: true,
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> ShortreelResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create output directory '{}'", parent.display())
            })?;
        }
    }
    Ok(())
}

/// Streams raw RGBA frames over stdin to a spawned `ffmpeg` process and muxes
/// the reconciled background track in the same pass. A shorter track is
/// repeated with `-stream_loop` and the output is cut at `trim_to`, so the
/// audio always matches the video duration exactly.
pub struct FfmpegEncoder {
    cfg: EncodeConfig,
    bg_rgba: [u8; 4],
    child: Child,
    stdin: Option<ChildStdin>,
    scratch: Vec<u8>,
}

impl FfmpegEncoder {
    pub fn new(cfg: EncodeConfig, bg_rgba: [u8; 4], audio: &AudioPlan) -> ShortreelResult<Self> {
        cfg.validate()?;
        ensure_parent_dir(&cfg.out_path)?;

        if !cfg.overwrite && cfg.out_path.exists() {
            return Err(ShortreelError::invalid_config(format!(
                "output file '{}' already exists",
                cfg.out_path.display()
            )));
        }

        if !is_ffmpeg_on_path() {
            return Err(ShortreelError::Other(anyhow::anyhow!(
                "ffmpeg is required for MP4 encoding, but was not found on PATH"
            )));
        }

        // System ffmpeg binary rather than linked FFmpeg libraries, to keep
        // the build free of native dev headers.
        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        if cfg.overwrite {
            cmd.arg("-y");
        } else {
            cmd.arg("-n");
        }

        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &cfg.fps.to_string(),
            "-i",
            "pipe:0",
        ]);

        match &audio.source_path {
            Some(track) => {
                // -stream_loop applies to the input that follows it.
                cmd.args(["-stream_loop", &audio.loop_count.to_string()])
                    .arg("-i")
                    .arg(track)
                    .args(["-map", "0:v", "-map", "1:a", "-c:a", "aac"])
                    .args(["-t", &format!("{:.3}", audio.trim_to)]);
            }
            None => {
                cmd.arg("-an");
            }
        }

        cmd.args([
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ])
        .arg(&cfg.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            ShortreelError::Other(anyhow::anyhow!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            ShortreelError::Other(anyhow::anyhow!("failed to open ffmpeg stdin (unexpected)"))
        })?;

        Ok(Self {
            scratch: vec![0u8; (cfg.width as usize) * (cfg.height as usize) * 4],
            cfg,
            bg_rgba,
            child,
            stdin: Some(stdin),
        })
    }

    /// Flatten one premultiplied frame over the background color and write it
    /// to the encoder pipe.
    pub fn encode_frame(&mut self, frame: &FrameRgba) -> ShortreelResult<()> {
        if frame.width != self.cfg.width || frame.height != self.cfg.height {
            return Err(ShortreelError::invalid_config(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.cfg.width, self.cfg.height
            )));
        }
        if frame.data.len() != self.scratch.len() {
            return Err(ShortreelError::invalid_config(
                "frame data length does not match width*height*4",
            ));
        }

        flatten_premul_to_opaque(&mut self.scratch, &frame.data, self.bg_rgba);

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ShortreelError::Other(anyhow::anyhow!(
                "ffmpeg encoder is already finalized"
            )));
        };

        use std::io::Write as _;
        stdin.write_all(&self.scratch).map_err(|e| {
            ShortreelError::Other(anyhow::anyhow!(
                "failed to write frame to ffmpeg stdin: {e}"
            ))
        })?;

        Ok(())
    }

    /// Close the pipe and wait for ffmpeg to finalize the MP4.
    pub fn finish(mut self) -> ShortreelResult<()> {
        drop(self.stdin.take());

        let output = self.child.wait_with_output().map_err(|e| {
            ShortreelError::Other(anyhow::anyhow!("failed to wait for ffmpeg to finish: {e}"))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ShortreelError::Other(anyhow::anyhow!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

/// Composite premultiplied RGBA over an opaque background color, producing
/// fully opaque pixels for the rawvideo pipe.
fn flatten_premul_to_opaque(dst: &mut [u8], src: &[u8], bg_rgba: [u8; 4]) {
    debug_assert_eq!(dst.len(), src.len());

    let bg = [
        u16::from(bg_rgba[0]),
        u16::from(bg_rgba[1]),
        u16::from(bg_rgba[2]),
    ];

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }

        let inv = 255 - a;
        for c in 0..3 {
            d[c] = (u16::from(s[c]) + mul_div255(bg[c], inv)).min(255) as u8;
        }
        d[3] = 255;
    }
}

fn mul_div255(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(width: u32, height: u32, fps: u32) -> EncodeConfig {
        EncodeConfig {
            width,
            height,
            fps,
            out_path: PathBuf::from("target/test_out.mp4"),
            overwrite: true,
        }
    }

    #[test]
    fn validate_rejects_zero_and_odd_dimensions() {
        assert!(cfg(0, 10, 30).validate().is_err());
        assert!(cfg(10, 0, 30).validate().is_err());
        assert!(cfg(11, 10, 30).validate().is_err());
        assert!(cfg(10, 11, 30).validate().is_err());
        assert!(cfg(10, 10, 0).validate().is_err());
        assert!(cfg(1080, 1920, 30).validate().is_ok());
    }

    #[test]
    fn flatten_half_alpha_red_over_black() {
        // Premultiplied red at 50% alpha is (128, 0, 0, 128).
        let src = [128u8, 0, 0, 128];
        let mut dst = [0u8; 4];
        flatten_premul_to_opaque(&mut dst, &src, [0, 0, 0, 255]);
        assert_eq!(dst, [128, 0, 0, 255]);
    }

    #[test]
    fn flatten_transparent_pixel_shows_background() {
        let src = [0u8; 4];
        let mut dst = [0u8; 4];
        flatten_premul_to_opaque(&mut dst, &src, [255, 255, 255, 255]);
        assert_eq!(dst, [255, 255, 255, 255]);
    }

    #[test]
    fn flatten_opaque_pixel_passes_through() {
        let src = [10u8, 20, 30, 255];
        let mut dst = [0u8; 4];
        flatten_premul_to_opaque(&mut dst, &src, [255, 255, 255, 255]);
        assert_eq!(dst, src);
    }
}
