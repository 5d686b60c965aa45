use crate::{
    error::{ShortreelError, ShortreelResult},
    raster::over,
    timeline::{LayerSource, Timeline},
};

/// One composited canvas frame, premultiplied RGBA8.
#[derive(Clone, Debug)]
pub struct FrameRgba {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Composite the timeline at time `t` seconds: layers are drawn in list
/// order with their crossfade opacity, clipped at the canvas edges.
pub fn render_frame(timeline: &Timeline, t: f64) -> ShortreelResult<FrameRgba> {
    if t < 0.0 || t > timeline.total_duration {
        return Err(ShortreelError::inconsistency(format!(
            "frame time {t} outside [0, {}]",
            timeline.total_duration
        )));
    }

    let width = timeline.canvas_width;
    let height = timeline.canvas_height;
    let mut data = vec![0u8; (width as usize) * (height as usize) * 4];

    for layer in &timeline.layers {
        let opacity = layer.opacity_at(t);
        if opacity <= 0.0 {
            continue;
        }

        match &layer.source {
            LayerSource::Solid(rgba) => {
                let mut src = *rgba;
                // Solid sources are straight color; premultiply once.
                let a = u16::from(src[3]);
                for c in &mut src[..3] {
                    *c = ((u16::from(*c) * a + 127) / 255) as u8;
                }
                for px in data.chunks_exact_mut(4) {
                    let out = over([px[0], px[1], px[2], px[3]], src, opacity);
                    px.copy_from_slice(&out);
                }
            }
            LayerSource::Raster(raster) => {
                blit_over(
                    &mut data, width, height, raster.width, raster.height,
                    &raster.rgba8_premul, layer.x, layer.y, opacity,
                );
            }
        }
    }

    Ok(FrameRgba { width, height, data })
}

/// Frame timestamp for a 0-based frame index at the timeline frame rate.
pub fn frame_time(timeline: &Timeline, frame_index: u64) -> f64 {
    frame_index as f64 / f64::from(timeline.frame_rate)
}

#[allow(clippy::too_many_arguments)]
fn blit_over(
    dst: &mut [u8],
    dst_w: u32,
    dst_h: u32,
    src_w: u32,
    src_h: u32,
    src: &[u8],
    x: i32,
    y: i32,
    opacity: f32,
) {
    for row in 0..src_h as i32 {
        let dy = y + row;
        if dy < 0 || dy >= dst_h as i32 {
            continue;
        }
        for col in 0..src_w as i32 {
            let dx = x + col;
            if dx < 0 || dx >= dst_w as i32 {
                continue;
            }
            let s_off = ((row as usize) * (src_w as usize) + (col as usize)) * 4;
            let s = [src[s_off], src[s_off + 1], src[s_off + 2], src[s_off + 3]];
            if s[3] == 0 {
                continue;
            }
            let d_off = ((dy as usize) * (dst_w as usize) + (dx as usize)) * 4;
            let d = [dst[d_off], dst[d_off + 1], dst[d_off + 2], dst[d_off + 3]];
            dst[d_off..d_off + 4].copy_from_slice(&over(d, s, opacity));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        audio::AudioPlan,
        raster::RasterImage,
        timeline::{LayerKind, LayerSource, TimelineBuilder, TimelineLayer},
    };

    fn red_dot() -> RasterImage {
        RasterImage::new(1, 1, vec![255, 0, 0, 255])
    }

    fn basic_timeline() -> Timeline {
        let mut b = TimelineBuilder::new(4, 4, 30, 10.0);
        b.push_static(
            LayerKind::Background,
            LayerSource::Solid([255, 255, 255, 255]),
            0,
            0,
        );
        b.push(TimelineLayer {
            kind: LayerKind::Content,
            source: LayerSource::Raster(Arc::new(red_dot())),
            x: 1,
            y: 1,
            start_time: 0.0,
            duration: 5.0,
            fade_in: 0.0,
            fade_out: 0.0,
        });
        b.finish(AudioPlan::silent(10.0)).unwrap()
    }

    fn px(frame: &FrameRgba, x: u32, y: u32) -> [u8; 4] {
        let off = ((y * frame.width + x) * 4) as usize;
        frame.data[off..off + 4].try_into().unwrap()
    }

    #[test]
    fn background_fills_canvas_and_layer_draws_over_it() {
        let t = basic_timeline();
        let frame = render_frame(&t, 1.0).unwrap();
        assert_eq!(px(&frame, 0, 0), [255, 255, 255, 255]);
        assert_eq!(px(&frame, 1, 1), [255, 0, 0, 255]);
    }

    #[test]
    fn expired_layer_no_longer_draws() {
        let t = basic_timeline();
        let frame = render_frame(&t, 6.0).unwrap();
        assert_eq!(px(&frame, 1, 1), [255, 255, 255, 255]);
    }

    #[test]
    fn out_of_range_time_is_rejected() {
        let t = basic_timeline();
        assert!(render_frame(&t, -0.1).is_err());
        assert!(render_frame(&t, 10.5).is_err());
    }

    #[test]
    fn offscreen_raster_is_clipped_not_panicking() {
        let mut b = TimelineBuilder::new(2, 2, 30, 1.0);
        b.push_static(LayerKind::Background, LayerSource::Solid([0, 0, 0, 255]), 0, 0);
        b.push_static(
            LayerKind::Image,
            LayerSource::Raster(Arc::new(red_dot())),
            -5,
            -5,
        );
        let t = b.finish(AudioPlan::silent(1.0)).unwrap();
        let frame = render_frame(&t, 0.5).unwrap();
        assert_eq!(px(&frame, 0, 0), [0, 0, 0, 255]);
    }

    #[test]
    fn frame_time_is_index_over_fps() {
        let t = basic_timeline();
        assert_eq!(frame_time(&t, 0), 0.0);
        assert_eq!(frame_time(&t, 15), 0.5);
    }
}
