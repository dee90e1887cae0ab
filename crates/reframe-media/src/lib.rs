//! Process supervision for the external conversion tool and FFmpeg.
//!
//! This crate provides:
//! - The conversion-tool command builder and tool-path configuration
//! - Audio extraction and the final audio/video remux step
//! - FFprobe duration probing
//! - The supervisor that runs one conversion end to end: merged output
//!   draining, timeout kill, remux, exit-code mapping

pub mod audio;
pub mod command;
pub mod error;
pub mod probe;
pub mod supervisor;

pub use audio::{extract_audio, remux};
pub use command::{ConvertCommand, ToolPaths};
pub use error::{MediaError, MediaResult};
pub use probe::probe_duration;
pub use supervisor::{
    ConversionOutcome, ConversionRequest, Supervisor, DEFAULT_DURATION_SECS, TIMEOUT_FACTOR,
};
