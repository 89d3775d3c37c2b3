//! A strict parser for the marker segments of JPEG/JFIF byte streams.
//!
//! [`parse`] walks an in-memory buffer marker by marker, decodes the JFIF header, quantization
//! and Huffman tables, and the frame and scan headers, and locates the entropy-coded data of every
//! scan. The entropy-coded data itself is not decoded.
//!
//! Every declared segment length is checked against the number of bytes its decoder actually
//! consumed, and any violation of the stream structure aborts the parse with a [`MarkerError`]
//! that points at the offending byte offset.

mod cursor;
mod document;
mod error;
mod marker;
mod scanner;
mod source;
mod tables;

pub use cursor::ByteCursor;
pub use document::{Document, Frame, Scan, Segment};
pub use error::{Eof, MarkerError};
pub use marker::{
    classify_sof, App0, DensityUnit, EntropyCoding, FrameComponent, FrameSubtype, HuffmanTable,
    Marker, MarkerCode, QuantizationTable, ScanComponent, StartOfFrame, StartOfScan,
};
pub use scanner::Options;
pub use source::{ByteSource, FileSource, LoadError};
pub use tables::{Table, TableAggregator};

use scanner::SegmentScanner;

/// Parses a complete JPEG/JFIF stream with the default [`Options`].
pub fn parse(buf: &[u8]) -> Result<Document<'_>, MarkerError> {
    parse_with(buf, &Options::default())
}

/// Parses a complete JPEG/JFIF stream.
///
/// The returned [`Document`] borrows `buf`. On error, nothing of the partially parsed stream is
/// returned.
pub fn parse_with<'a>(buf: &'a [u8], options: &Options) -> Result<Document<'a>, MarkerError> {
    let document = SegmentScanner::new(buf, *options).run()?;
    log::debug!(
        "parsed {} segments, {} scans",
        document.segments().len(),
        document.frame().map_or(0, |frame| frame.scans().len())
    );
    Ok(document)
}
