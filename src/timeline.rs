use std::sync::Arc;

use crate::{
    audio::AudioPlan,
    error::{ShortreelError, ShortreelResult},
    raster::RasterImage,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Background,
    Image,
    Title,
    Content,
}

/// Pixel source for one layer: a solid canvas fill or a prepared raster.
#[derive(Clone, Debug)]
pub enum LayerSource {
    Solid([u8; 4]),
    Raster(Arc<RasterImage>),
}

/// One positioned, timed element on the composed timeline.
#[derive(Clone, Debug)]
pub struct TimelineLayer {
    pub kind: LayerKind,
    pub source: LayerSource,
    pub x: i32,
    pub y: i32,
    pub start_time: f64,
    pub duration: f64,
    pub fade_in: f64,
    pub fade_out: f64,
}

impl TimelineLayer {
    /// Layer opacity at timeline time `t`, with crossfade ramps applied.
    /// Zero outside `[start_time, start_time + duration)`.
    pub fn opacity_at(&self, t: f64) -> f32 {
        let local = t - self.start_time;
        if local < 0.0 || local >= self.duration {
            return 0.0;
        }

        let mut opacity = 1.0f64;
        if self.fade_in > 0.0 && local < self.fade_in {
            opacity = opacity.min(local / self.fade_in);
        }
        let remaining = self.duration - local;
        if self.fade_out > 0.0 && remaining < self.fade_out {
            opacity = opacity.min(remaining / self.fade_out);
        }
        opacity.clamp(0.0, 1.0) as f32
    }
}

/// Frozen output of composition: the ordered layer program plus the
/// reconciled audio plan. Draw order is list order (background first).
#[derive(Clone, Debug)]
pub struct Timeline {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub frame_rate: u32,
    pub total_duration: f64,
    pub layers: Vec<TimelineLayer>,
    pub audio: AudioPlan,
}

impl Timeline {
    pub fn frame_count(&self) -> u64 {
        (self.total_duration * f64::from(self.frame_rate)).round() as u64
    }
}

/// Accumulates immutable layers and finalizes into a frozen `Timeline`,
/// checking the containment and consistency invariants once at the end.
pub struct TimelineBuilder {
    canvas_width: u32,
    canvas_height: u32,
    frame_rate: u32,
    total_duration: f64,
    layers: Vec<TimelineLayer>,
}

impl TimelineBuilder {
    pub fn new(canvas_width: u32, canvas_height: u32, frame_rate: u32, total_duration: f64) -> Self {
        Self {
            canvas_width,
            canvas_height,
            frame_rate,
            total_duration,
            layers: Vec::new(),
        }
    }

    pub fn push(&mut self, layer: TimelineLayer) -> &mut Self {
        self.layers.push(layer);
        self
    }

    /// Full-duration layer helper for background/image/title bands.
    pub fn push_static(&mut self, kind: LayerKind, source: LayerSource, x: i32, y: i32) -> &mut Self {
        self.push(TimelineLayer {
            kind,
            source,
            x,
            y,
            start_time: 0.0,
            duration: self.total_duration,
            fade_in: 0.0,
            fade_out: 0.0,
        })
    }

    pub fn finish(self, audio: AudioPlan) -> ShortreelResult<Timeline> {
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(ShortreelError::inconsistency(
                "timeline canvas must be non-zero",
            ));
        }
        if !(self.total_duration > 0.0) {
            return Err(ShortreelError::inconsistency(
                "timeline duration must be > 0",
            ));
        }
        if self.layers.is_empty() {
            return Err(ShortreelError::inconsistency(
                "timeline must contain at least one layer",
            ));
        }

        const EPS: f64 = 1e-9;
        for (idx, layer) in self.layers.iter().enumerate() {
            if layer.start_time < -EPS
                || layer.duration <= 0.0
                || layer.start_time + layer.duration > self.total_duration + EPS
            {
                return Err(ShortreelError::inconsistency(format!(
                    "layer {idx} ({:?}) extends outside [0, {}]",
                    layer.kind, self.total_duration
                )));
            }
        }

        Ok(Timeline {
            canvas_width: self.canvas_width,
            canvas_height: self.canvas_height,
            frame_rate: self.frame_rate,
            total_duration: self.total_duration,
            layers: self.layers,
            audio,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(start: f64, duration: f64, fade: f64) -> TimelineLayer {
        TimelineLayer {
            kind: LayerKind::Content,
            source: LayerSource::Solid([255, 255, 255, 255]),
            x: 0,
            y: 0,
            start_time: start,
            duration,
            fade_in: fade,
            fade_out: fade,
        }
    }

    #[test]
    fn opacity_ramps_in_and_out() {
        let l = layer(10.0, 10.0, 0.5);
        assert_eq!(l.opacity_at(9.9), 0.0);
        assert_eq!(l.opacity_at(10.25), 0.5);
        assert_eq!(l.opacity_at(15.0), 1.0);
        assert_eq!(l.opacity_at(19.75), 0.5);
        assert_eq!(l.opacity_at(20.0), 0.0);
    }

    #[test]
    fn opacity_without_fades_is_a_step() {
        let l = layer(0.0, 5.0, 0.0);
        assert_eq!(l.opacity_at(0.0), 1.0);
        assert_eq!(l.opacity_at(4.999), 1.0);
        assert_eq!(l.opacity_at(5.0), 0.0);
    }

    #[test]
    fn finish_rejects_out_of_bounds_layers() {
        let mut b = TimelineBuilder::new(64, 64, 30, 10.0);
        b.push(layer(5.0, 10.0, 0.0));
        assert!(matches!(
            b.finish(AudioPlan::silent(10.0)),
            Err(ShortreelError::CompositionInconsistency(_))
        ));
    }

    #[test]
    fn finish_rejects_empty_timeline_and_zero_duration() {
        let b = TimelineBuilder::new(64, 64, 30, 10.0);
        assert!(b.finish(AudioPlan::silent(10.0)).is_err());

        let mut b = TimelineBuilder::new(64, 64, 30, 0.0);
        b.push(layer(0.0, 1.0, 0.0));
        assert!(b.finish(AudioPlan::silent(0.0)).is_err());
    }

    #[test]
    fn finish_freezes_layers_in_push_order() {
        let mut b = TimelineBuilder::new(64, 64, 30, 10.0);
        b.push_static(LayerKind::Background, LayerSource::Solid([255; 4]), 0, 0);
        b.push(layer(0.0, 10.0, 0.5));
        let t = b.finish(AudioPlan::silent(10.0)).unwrap();
        assert_eq!(t.layers.len(), 2);
        assert_eq!(t.layers[0].kind, LayerKind::Background);
        assert_eq!(t.layers[1].kind, LayerKind::Content);
        assert_eq!(t.frame_count(), 300);
    }
}
