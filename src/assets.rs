use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;

/// Extension fallback order for image stem lookup.
pub const IMAGE_EXTENSIONS: [&str; 6] = [".jpg", ".jpeg", ".png", ".JPG", ".JPEG", ".PNG"];
/// Recognized background music extensions.
pub const AUDIO_EXTENSIONS: [&str; 6] = [".mp3", ".wav", ".m4a", ".MP3", ".WAV", ".M4A"];

/// Maps logical asset names to concrete file paths. Pure queries over the
/// filesystem; never writes.
#[derive(Clone, Debug)]
pub struct AssetLibrary {
    images_dir: PathBuf,
    music_dir: PathBuf,
}

impl AssetLibrary {
    pub fn new(images_dir: impl Into<PathBuf>, music_dir: impl Into<PathBuf>) -> Self {
        Self {
            images_dir: images_dir.into(),
            music_dir: music_dir.into(),
        }
    }

    /// Resolve an image by exact filename first, then by stem with each
    /// case-variant extension in fixed priority order.
    pub fn resolve_image(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() {
            return None;
        }

        let exact = self.images_dir.join(name);
        if exact.is_file() {
            return Some(exact);
        }

        let stem = file_stem(name);
        for ext in IMAGE_EXTENSIONS {
            let candidate = self.images_dir.join(format!("{stem}{ext}"));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }

    /// Pick a music file uniformly at random from a category directory.
    /// The rng is injected so selection is seedable in tests.
    pub fn resolve_audio<R: Rng>(&self, category: &str, rng: &mut R) -> Option<PathBuf> {
        if category.is_empty() {
            return None;
        }

        let dir = self.music_dir.join(category);
        let mut files = list_audio_files(&dir);
        if files.is_empty() {
            tracing::debug!(category, dir = %dir.display(), "no music files in category");
            return None;
        }
        files.sort();
        files.choose(rng).cloned()
    }

    /// Fuzzy-match a free-form hint against every music file under the music
    /// root (one directory level of categories plus loose files). Returns the
    /// highest-scoring candidate; with `threshold = None` a poor best match
    /// is still returned.
    pub fn resolve_audio_hint(&self, hint: &str, threshold: Option<f64>) -> Option<PathBuf> {
        if hint.is_empty() {
            return None;
        }

        let mut candidates = list_audio_files(&self.music_dir);
        if let Ok(entries) = std::fs::read_dir(&self.music_dir) {
            for entry in entries.flatten() {
                if entry.path().is_dir() {
                    candidates.extend(list_audio_files(&entry.path()));
                }
            }
        }
        candidates.sort();

        let hint_lower = hint.to_lowercase();
        let mut best: Option<(f64, PathBuf)> = None;
        for path in candidates {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            let score = similarity(&hint_lower, &stem);
            if best.as_ref().is_none_or(|(s, _)| score > *s) {
                best = Some((score, path));
            }
        }

        let (score, path) = best?;
        if let Some(min) = threshold {
            if score < min {
                tracing::debug!(hint, score, "best fuzzy audio match below threshold");
                return None;
            }
        }
        Some(path)
    }
}

/// Derive a music category folder name from an image filename, e.g.
/// "mesh.jpg" -> "Mesh".
pub fn category_from_image(image_name: &str) -> String {
    capitalize(file_stem(image_name))
}

fn file_stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn list_audio_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| AUDIO_EXTENSIONS.iter().any(|ext| n.ends_with(ext)))
        })
        .collect()
}

/// Similarity in [0, 1]: longest-common-subsequence length over mean length.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    let mut prev = vec![0usize; b_chars.len() + 1];
    let mut row = vec![0usize; b_chars.len() + 1];
    for &ca in &a_chars {
        for (j, &cb) in b_chars.iter().enumerate() {
            row[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                row[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut row);
    }

    let lcs = prev[b_chars.len()] as f64;
    2.0 * lcs / (a_chars.len() + b_chars.len()) as f64
}
