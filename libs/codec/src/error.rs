//! Protocol-level errors for ISO 8583 frame processing
//!
//! Every decode failure is reported as a [`ProtocolError`]; the codec never panics on
//! hostile or truncated input. Each variant carries the offset or field number that
//! tripped it so a failed exchange can be diagnosed from a single log line.

use thiserror::Error;

/// Frame encoding and decoding errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer is too small to contain the expected structure
    #[error("Frame too small: need {need} bytes, got {got} (context: {context})")]
    FrameTooSmall {
        need: usize,
        got: usize,
        context: String,
    },

    /// Length header disagrees with the bytes that follow it
    #[error("Length header mismatch: header declares {declared} bytes, {actual} present")]
    LengthMismatch { declared: usize, actual: usize },

    /// Body exceeds the protocol limit
    #[error("Frame too large: {size} bytes exceeds maximum {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// MTI is not four ASCII digits
    #[error("Invalid MTI {mti:?}: expected 4 numeric digits")]
    InvalidMti { mti: String },

    /// Field number has no dictionary entry
    #[error("Field {field} is not defined in the field dictionary")]
    UnknownField { field: u8 },

    /// Field value declares or needs more bytes than remain in the frame
    #[error("Truncated field {field}: need {required} bytes at offset {offset}, {available} remain")]
    TruncatedField {
        field: u8,
        offset: usize,
        required: usize,
        available: usize,
    },

    /// Variable-length prefix is not numeric
    #[error("Invalid length prefix {prefix:?} for field {field} at offset {offset}")]
    InvalidLengthPrefix {
        field: u8,
        offset: usize,
        prefix: String,
    },

    /// Value is longer than the field allows
    #[error("Field {field} value is {len} characters, maximum is {max}")]
    ValueTooLong { field: u8, len: usize, max: usize },

    /// Value contains characters outside the field's class
    #[error("Field {field} value {value:?} violates class {class}")]
    InvalidCharacters {
        field: u8,
        value: String,
        class: &'static str,
    },

    /// Bytes remain after the last field described by the bitmap
    #[error("{extra} unexpected trailing bytes after last field")]
    TrailingBytes { extra: usize },
}

impl ProtocolError {
    /// Create a FrameTooSmall error
    pub fn frame_too_small(need: usize, got: usize, context: impl Into<String>) -> Self {
        Self::FrameTooSmall {
            need,
            got,
            context: context.into(),
        }
    }

    /// Create a TruncatedField error
    pub fn truncated_field(field: u8, offset: usize, required: usize, available: usize) -> Self {
        Self::TruncatedField {
            field,
            offset,
            required,
            available,
        }
    }

    /// Create an InvalidCharacters error
    pub fn invalid_characters(field: u8, value: &str, class: &'static str) -> Self {
        Self::InvalidCharacters {
            field,
            value: value.to_string(),
            class,
        }
    }
}

/// Result type for protocol operations
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::frame_too_small(12, 3, "frame header");
        assert_eq!(
            err.to_string(),
            "Frame too small: need 12 bytes, got 3 (context: frame header)"
        );

        let err = ProtocolError::truncated_field(35, 40, 37, 10);
        assert_eq!(
            err.to_string(),
            "Truncated field 35: need 37 bytes at offset 40, 10 remain"
        );

        assert_eq!(
            ProtocolError::UnknownField { field: 5 }.to_string(),
            "Field 5 is not defined in the field dictionary"
        );
    }
}
