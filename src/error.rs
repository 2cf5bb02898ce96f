/*!
 * Errors returned by the decode/encode engine
 */

use thiserror::Error;

/// Failure of a decode call. Every variant is detected before any output is
/// written, so a failed call never leaves a partially populated result.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("no message registered for frame id {id:#x}")]
    UnknownMessage { id: u32 },

    #[error("frame id {id:#x} carries {actual} bytes, message expects {expected}")]
    LengthMismatch { id: u32, expected: u8, actual: u8 },

    #[error("destination holds {capacity} signals, message decodes {needed}")]
    BufferTooSmall { needed: usize, capacity: usize },

    #[error("required argument was null")]
    NullArgument,
}

pub type Result<T> = std::result::Result<T, Error>;
