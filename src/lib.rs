#![forbid(unsafe_code)]

pub mod assets;
pub mod audio;
pub mod compose;
pub mod config;
pub mod encode_ffmpeg;
pub mod error;
pub mod export;
pub mod frame;
pub mod layout;
pub mod pipeline;
pub mod raster;
pub mod script;
pub mod text;
pub mod timeline;

pub use assets::AssetLibrary;
pub use audio::AudioPlan;
pub use compose::compose_block;
pub use config::{RenderConfig, SectionsPerPage};
pub use error::{ShortreelError, ShortreelResult};
pub use frame::{render_frame, FrameRgba};
pub use pipeline::{run_batch, BatchOptions, BatchReport, EmitMode};
pub use script::{parse_document, ContentBlock, Section};
pub use text::FontSet;
pub use timeline::{Timeline, TimelineBuilder, TimelineLayer};
