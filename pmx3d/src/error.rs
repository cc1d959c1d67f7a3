use crate::binary::IndexKind;
use std::fmt;
use thiserror::Error;

/// Decode stage a failure was detected in.
///
/// Stages run in declaration order; a failed decode reports the stage that
/// was active when the stream ran short or a selector byte fell outside its
/// domain.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Stage {
    Header,
    Info,
    IndexWidths,
    ModelInfo,
    Vertices,
    Faces,
    Textures,
    Materials,
    Bones,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Header => "header",
            Self::Info => "info",
            Self::IndexWidths => "index widths",
            Self::ModelInfo => "model info",
            Self::Vertices => "vertices",
            Self::Faces => "faces",
            Self::Textures => "textures",
            Self::Materials => "materials",
            Self::Bones => "bones",
        };
        f.write_str(name)
    }
}

/// A failed PMX decode. Every variant is fatal for the whole session: there
/// is no field-level recovery and no partial model is returned.
#[derive(Debug, Error)]
pub enum Error {
    #[error("truncated stream in {stage} stage at byte {offset}: {needed} more byte(s) required")]
    Truncated {
        stage: Stage,
        offset: usize,
        needed: usize,
    },

    #[error("invalid string encoding selector {value} at byte {offset}")]
    InvalidEncoding { value: u8, offset: usize },

    #[error("invalid extra UV count {value} at byte {offset} (must be 0..=4)")]
    InvalidExtraUvCount { value: u8, offset: usize },

    #[error("invalid {kind} index width {value} at byte {offset} (must be 1, 2 or 4)")]
    InvalidIndexWidth {
        kind: IndexKind,
        value: u8,
        offset: usize,
    },

    #[error("invalid weight kind {value} at byte {offset}")]
    InvalidWeightKind { value: u8, offset: usize },

    #[error("invalid toon reference kind {value} at byte {offset}")]
    InvalidToonKind { value: u8, offset: usize },

    #[error("odd UTF-16 byte length {length} at byte {offset}")]
    OddUtf16Length { length: u32, offset: usize },
}
