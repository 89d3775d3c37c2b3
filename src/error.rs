use core::fmt;

use crate::marker::MarkerCode;

pub(crate) type Result<T, E = MarkerError> = std::result::Result<T, E>;

/// The input ended before a read could be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eof {
    /// Position of the failed read.
    pub offset: usize,
    /// Number of bytes the read needed, starting at `offset`.
    pub needed: usize,
}

impl fmt::Display for Eof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "reached end of data at offset 0x{:04X} (needed {} bytes)",
            self.offset, self.needed
        )
    }
}

impl std::error::Error for Eof {}

/// Errors that abort parsing a [`Document`][crate::Document].
///
/// Every variant records the byte offset in the input buffer it refers to. For segment-level
/// errors, this is the offset of the segment's `0xFF 0xXX` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MarkerError {
    /// The buffer was exhausted in the middle of a read.
    Eof { offset: usize, needed: usize },
    /// A segment's declared length disagrees with the number of bytes its decoder consumed.
    ///
    /// Both counts include the 2 bytes of the length field itself.
    LengthMismatch {
        offset: usize,
        marker: MarkerCode,
        expected: usize,
        actual: usize,
    },
    /// A marker showed up where the stream structure requires a different one.
    UnexpectedMarker {
        offset: usize,
        expected: MarkerCode,
        found: MarkerCode,
    },
    /// A second SOF segment was found in the frame.
    DuplicateFrame { offset: usize },
    /// A well-formed marker that this parser has no decoder for.
    UnsupportedMarker { offset: usize, code: MarkerCode },
    /// The bytes at a marker position are not a `0xFF 0xXX` marker.
    InvalidMarker { offset: usize, found: u16 },
    /// A segment field holds a value outside of its legal range.
    Malformed { offset: usize, reason: String },
    /// EOI was reached before any scan was decoded.
    MissingScan { offset: usize },
    /// Bytes follow the EOI marker.
    TrailingData { offset: usize, len: usize },
    /// The scanner failed to advance. Indicates a parser bug rather than bad input.
    NoProgress { offset: usize },
}

impl MarkerError {
    /// Returns the byte offset in the input buffer this error refers to.
    pub fn offset(&self) -> usize {
        match *self {
            Self::Eof { offset, .. }
            | Self::LengthMismatch { offset, .. }
            | Self::UnexpectedMarker { offset, .. }
            | Self::DuplicateFrame { offset }
            | Self::UnsupportedMarker { offset, .. }
            | Self::InvalidMarker { offset, .. }
            | Self::Malformed { offset, .. }
            | Self::MissingScan { offset }
            | Self::TrailingData { offset, .. }
            | Self::NoProgress { offset } => offset,
        }
    }

    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            offset,
            reason: reason.into(),
        }
    }
}

impl From<Eof> for MarkerError {
    fn from(e: Eof) -> Self {
        Self::Eof {
            offset: e.offset,
            needed: e.needed,
        }
    }
}

impl fmt::Display for MarkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eof { offset, needed } => fmt::Display::fmt(
                &Eof {
                    offset: *offset,
                    needed: *needed,
                },
                f,
            ),
            Self::LengthMismatch {
                offset,
                marker,
                expected,
                actual,
            } => write!(
                f,
                "{marker} segment at 0x{offset:04X} declares a length of {expected} bytes, but decoding it consumed {actual}"
            ),
            Self::UnexpectedMarker {
                offset,
                expected,
                found,
            } => write!(f, "expected {expected} at 0x{offset:04X}, found {found}"),
            Self::DuplicateFrame { offset } => {
                write!(f, "second SOF segment at 0x{offset:04X}")
            }
            Self::UnsupportedMarker { offset, code } => {
                write!(f, "unsupported marker {code} at 0x{offset:04X}")
            }
            Self::InvalidMarker { offset, found } => {
                write!(f, "invalid marker {found:04X} at 0x{offset:04X}")
            }
            Self::Malformed { offset, reason } => {
                write!(f, "malformed segment at 0x{offset:04X}: {reason}")
            }
            Self::MissingScan { offset } => {
                write!(f, "EOI at 0x{offset:04X} not preceded by any scan")
            }
            Self::TrailingData { offset, len } => {
                write!(f, "{len} trailing bytes after EOI at 0x{offset:04X}")
            }
            Self::NoProgress { offset } => {
                write!(f, "parser made no progress at 0x{offset:04X}")
            }
        }
    }
}

impl std::error::Error for MarkerError {}
