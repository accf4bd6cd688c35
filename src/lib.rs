//! Cardreel turns a decision card into a short vertical video.
//!
//! A decision card is a question with up to five choices, each carrying pros and
//! cons. The pipeline renders one styled card image per choice, sequences them over
//! a solid or video background with an optional caption and audio track, and encodes
//! the result as a 1080x1920 H.264 MP4:
//!
//! - Describe the card with a [`DecisionCard`]
//! - Build a [`GenerateRequest`] with output and media options
//! - Call [`generate`] to produce the MP4
#![forbid(unsafe_code)]

pub mod assemble;
pub mod audio;
pub mod core;
pub mod encode_ffmpeg;
pub mod error;
pub mod layout;
pub mod media;
pub mod model;
pub mod pipeline;
pub mod render_cpu;
pub mod render_html;
pub mod store;
pub mod temp;
pub mod text;
pub mod wrap;

pub use crate::assemble::{Assembler, Background, SequencePlan};
pub use crate::core::{Canvas, Fps, FrameIndex, Rgba8};
pub use crate::encode_ffmpeg::{EncodeConfig, FfmpegSink, FrameSink, InMemorySink, PcmTrack};
pub use crate::error::{CardreelError, CardreelResult};
pub use crate::model::{Choice, DecisionCard};
pub use crate::pipeline::{GenerateRequest, RendererKind, generate};
pub use crate::render_cpu::{CardRenderer, CpuCardRenderer, RenderedCard};
pub use crate::render_html::HtmlCardRenderer;
pub use crate::store::EntryStore;
pub use crate::text::TextEngine;
