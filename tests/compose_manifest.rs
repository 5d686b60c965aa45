use std::path::{Path, PathBuf};

use rand::{rngs::StdRng, SeedableRng};
use shortreel::{
    compose_block, export::export_manifest, parse_document, render_frame,
    timeline::{LayerKind, LayerSource},
    AssetLibrary, FontSet, RenderConfig,
};

const SCRIPT: &str = "\
TITLE: Mesh (Aries)
---
Love:
A calm day for the heart.

Career:
Push the big task before noon.

Money:
Hold off on large purchases.

Health:
A short walk clears the mind.

Luck:
Green works in your favour today.
";

/// Locate any TTF/OTF on the host so these tests run without bundled font
/// assets. Absent fonts skip the test, like the ffmpeg-gated media tests.
fn find_system_font() -> Option<PathBuf> {
    let roots = [
        Path::new("/usr/share/fonts"),
        Path::new("/usr/local/share/fonts"),
        Path::new("/Library/Fonts"),
        Path::new("/System/Library/Fonts"),
    ];
    roots.iter().find_map(|root| find_font_in(root))
}

fn find_font_in(dir: &Path) -> Option<PathBuf> {
    let mut entries: Vec<_> = std::fs::read_dir(dir).ok()?.flatten().collect();
    entries.sort_by_key(|e| e.path());
    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            if let Some(found) = find_font_in(&path) {
                return Some(found);
            }
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("ttf") | Some("otf")
        ) {
            return Some(path);
        }
    }
    None
}

fn fixture() -> Option<(shortreel::ContentBlock, RenderConfig, FontSet, tempfile::TempDir)> {
    let Some(font_path) = find_system_font() else {
        eprintln!("skipping: no system TTF/OTF font found");
        return None;
    };
    let fonts = FontSet::load(&font_path, &font_path).unwrap();

    let block = parse_document(SCRIPT)
        .remove(0)
        .expect("fixture script parses");
    let assets_root = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(assets_root.path().join("images")).unwrap();
    std::fs::create_dir_all(assets_root.path().join("music")).unwrap();

    Some((block, RenderConfig::default(), fonts, assets_root))
}

#[test]
fn composed_timeline_has_expected_layer_program() {
    let Some((block, cfg, fonts, assets_root)) = fixture() else {
        return;
    };
    let library = AssetLibrary::new(
        assets_root.path().join("images"),
        assets_root.path().join("music"),
    );
    let mut rng = StdRng::seed_from_u64(7);

    let timeline = compose_block(&block, &cfg, &fonts, &library, &mut rng).unwrap();

    assert_eq!(timeline.canvas_width, 1080);
    assert_eq!(timeline.canvas_height, 1920);
    assert_eq!(timeline.frame_count(), 900);
    assert!(timeline.audio.source_path.is_none());

    // Background, title, then one content layer per page (5 sections at 2
    // per page). No image was referenced, so no image layer.
    assert_eq!(timeline.layers[0].kind, LayerKind::Background);
    assert!(matches!(timeline.layers[0].source, LayerSource::Solid(_)));
    assert!(!timeline.layers.iter().any(|l| l.kind == LayerKind::Image));
    assert_eq!(
        timeline
            .layers
            .iter()
            .filter(|l| l.kind == LayerKind::Title)
            .count(),
        1
    );

    let content: Vec<_> = timeline
        .layers
        .iter()
        .filter(|l| l.kind == LayerKind::Content)
        .collect();
    assert_eq!(content.len(), 3);
    let starts: Vec<f64> = content.iter().map(|l| l.start_time).collect();
    assert_eq!(starts, [0.0, 10.0, 20.0]);
    let covered: f64 = content.iter().map(|l| l.duration).sum();
    assert!((covered - cfg.total_duration).abs() < 1e-9);
}

#[test]
fn composed_frame_is_canvas_sized_and_opaque_over_background() {
    let Some((block, cfg, fonts, assets_root)) = fixture() else {
        return;
    };
    let library = AssetLibrary::new(
        assets_root.path().join("images"),
        assets_root.path().join("music"),
    );
    let mut rng = StdRng::seed_from_u64(7);

    let timeline = compose_block(&block, &cfg, &fonts, &library, &mut rng).unwrap();
    let frame = render_frame(&timeline, 1.0).unwrap();

    assert_eq!((frame.width, frame.height), (1080, 1920));
    assert_eq!(frame.data.len(), 1080 * 1920 * 4);
    // Top-left corner shows the solid background.
    assert_eq!(frame.data[..4], cfg.background_rgba[..]);
    // Somewhere in the canvas the rendered text darkens a pixel.
    assert!(frame
        .data
        .chunks_exact(4)
        .any(|px| px[3] == 255 && px[0] < 128));
}

#[test]
fn manifest_export_writes_json_and_layer_pngs() {
    let Some((block, cfg, fonts, assets_root)) = fixture() else {
        return;
    };
    let library = AssetLibrary::new(
        assets_root.path().join("images"),
        assets_root.path().join("music"),
    );
    let mut rng = StdRng::seed_from_u64(7);
    let timeline = compose_block(&block, &cfg, &fonts, &library, &mut rng).unwrap();

    let out = tempfile::tempdir().unwrap();
    let manifest_path = export_manifest(&timeline, out.path()).unwrap();
    assert!(manifest_path.ends_with("manifest.json"));

    let text = std::fs::read_to_string(&manifest_path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();

    assert_eq!(value["canvas_width"], 1080);
    assert_eq!(value["total_duration"], 30.0);

    let layers = value["layers"].as_array().unwrap();
    assert_eq!(layers.len(), timeline.layers.len());
    assert_eq!(layers[0]["kind"], "background");
    assert!(layers[0]["solid_rgba"].is_array());

    for layer in layers {
        if let Some(png) = layer["png"].as_str() {
            assert!(out.path().join(png).is_file(), "missing layer png {png}");
        }
    }

    assert!(value["audio"]["source_path"].is_null());
}
