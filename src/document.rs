//! The parsed representation of a JPEG/JFIF stream.

use std::{
    fmt::{self, Write},
    ops::Range,
};

use crate::{
    marker::{App0, DensityUnit, EntropyCoding, Marker, MarkerCode, StartOfFrame, StartOfScan},
    tables::TableAggregator,
    HuffmanTable, QuantizationTable,
};

/// A marker segment, located in the input buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub(crate) offset: usize,
    pub(crate) code: MarkerCode,
    pub(crate) len: usize,
    pub(crate) marker: Marker,
}

impl Segment {
    /// Returns the offset of the segment's `0xFF 0xXX` marker in the input buffer.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn code(&self) -> MarkerCode {
        self.code
    }

    /// Returns the size of the segment in bytes, including the marker.
    ///
    /// For SOS segments this only covers the scan header, not the entropy-coded data.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn marker(&self) -> &Marker {
        &self.marker
    }
}

/// A scan: the decoded scan header plus the location of its entropy-coded data.
///
/// A scan also keeps the tables that were defined when its SOS segment was read, since later DQT
/// and DHT segments may redefine them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan {
    pub(crate) offset: usize,
    pub(crate) header: StartOfScan,
    pub(crate) data: Range<usize>,
    pub(crate) quantization: TableAggregator<QuantizationTable>,
    pub(crate) huffman: TableAggregator<HuffmanTable>,
}

impl Scan {
    /// Returns the offset of the SOS marker that started this scan.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn header(&self) -> &StartOfScan {
        &self.header
    }

    /// Returns the byte range of the entropy-coded data in the input buffer.
    ///
    /// The range includes any `RST` markers and byte stuffing.
    #[inline]
    pub fn data_range(&self) -> Range<usize> {
        self.data.clone()
    }

    /// Returns the quantization tables in force for this scan.
    #[inline]
    pub fn quantization_tables(&self) -> &TableAggregator<QuantizationTable> {
        &self.quantization
    }

    /// Returns the Huffman tables in force for this scan.
    #[inline]
    pub fn huffman_tables(&self) -> &TableAggregator<HuffmanTable> {
        &self.huffman
    }
}

/// The frame header and the scans that belong to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub(crate) sof: StartOfFrame,
    pub(crate) scans: Vec<Scan>,
    pub(crate) lines: Option<u16>,
}

impl Frame {
    #[inline]
    pub fn sof(&self) -> &StartOfFrame {
        &self.sof
    }

    #[inline]
    pub fn scans(&self) -> &[Scan] {
        &self.scans
    }

    /// Returns the number of lines of the frame.
    ///
    /// This is the height from the frame header, unless a DNL segment followed the first scan.
    pub fn number_of_lines(&self) -> u16 {
        self.lines.unwrap_or(self.sof.height())
    }
}

/// A fully parsed JPEG/JFIF stream.
///
/// A `Document` always starts with SOI and the JFIF APP0 header and ends with EOI. It borrows the
/// input buffer so that the entropy-coded data can be handed out without copying.
#[derive(Debug, Clone)]
pub struct Document<'a> {
    pub(crate) buf: &'a [u8],
    pub(crate) segments: Vec<Segment>,
    pub(crate) app0: App0,
    pub(crate) frame: Option<Frame>,
    pub(crate) quantization: TableAggregator<QuantizationTable>,
    pub(crate) huffman: TableAggregator<HuffmanTable>,
    pub(crate) restart_interval: Option<u16>,
    pub(crate) end: usize,
}

impl<'a> Document<'a> {
    /// Returns all segments in file order, from SOI to EOI.
    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns the JFIF header.
    #[inline]
    pub fn app0(&self) -> &App0 {
        &self.app0
    }

    /// Returns the frame, if the stream contains one.
    #[inline]
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// Returns the quantization tables as defined at the end of the stream.
    #[inline]
    pub fn quantization_tables(&self) -> &TableAggregator<QuantizationTable> {
        &self.quantization
    }

    /// Returns the Huffman tables as defined at the end of the stream.
    #[inline]
    pub fn huffman_tables(&self) -> &TableAggregator<HuffmanTable> {
        &self.huffman
    }

    /// Returns the restart interval set by the last DRI segment, if any.
    #[inline]
    pub fn restart_interval(&self) -> Option<u16> {
        self.restart_interval
    }

    /// Returns the entropy-coded data of the scan at `index`.
    pub fn scan_payload(&self, index: usize) -> Option<&'a [u8]> {
        let scan = self.frame.as_ref()?.scans.get(index)?;
        Some(&self.buf[scan.data_range()])
    }

    /// Returns any bytes following the EOI marker.
    ///
    /// This is only ever non-empty when parsing with
    /// [`Options::allow_trailing_data`][crate::Options::allow_trailing_data].
    #[inline]
    pub fn trailing_data(&self) -> &'a [u8] {
        &self.buf[self.end..]
    }

    /// Renders a human-readable dump of all segments in file order.
    ///
    /// This is the same as the [`fmt::Display`] output.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Document<'_> {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut scans = self.frame.iter().flat_map(|frame| &frame.scans);
        for segment in &self.segments {
            writeln!(
                out,
                "{:04X} [FF {:02X}] {}, {} bytes",
                segment.offset,
                segment.code.low_byte(),
                segment.code,
                segment.len,
            )?;
            render_marker(out, &segment.marker)?;

            if let Marker::StartOfScan(_) = segment.marker {
                if let Some(scan) = scans.next() {
                    writeln!(
                        out,
                        "    entropy-coded data: {} bytes at 0x{:04X}",
                        scan.data.len(),
                        scan.data.start,
                    )?;
                }
            }
        }

        if !self.trailing_data().is_empty() {
            writeln!(out, "{} trailing bytes", self.trailing_data().len())?;
        }
        Ok(())
    }
}

/// Number of thumbnail pixels listed before the rest are elided.
const THUMBNAIL_PIXELS: usize = 16;

fn render_marker(out: &mut impl Write, marker: &Marker) -> fmt::Result {
    match marker {
        Marker::Soi | Marker::Eoi => {}
        Marker::App0(app0) => {
            let (major, minor) = app0.version();
            let units = match app0.density_unit() {
                Some(DensityUnit::None) => "no units, densities give the pixel aspect ratio",
                Some(DensityUnit::DotsPerInch) => "dots per inch",
                Some(DensityUnit::DotsPerCm) => "dots per cm",
                None => "unknown",
            };
            let (width, height) = app0.thumbnail();
            writeln!(out, "    version: {major}.{minor:02}")?;
            writeln!(out, "    units: {} ({units})", app0.units())?;
            writeln!(out, "    density: {}x{}", app0.x_density(), app0.y_density())?;
            writeln!(
                out,
                "    thumbnail: {width}x{height}, {} RGB pixels",
                app0.thumbnail_rgb().len()
            )?;
            let pixels = app0.thumbnail_rgb();
            if !pixels.is_empty() {
                out.write_str("    thumbnail pixels:")?;
                for (r, g, b) in pixels.iter().take(THUMBNAIL_PIXELS) {
                    write!(out, " #{r:02x}{g:02x}{b:02x}")?;
                }
                if pixels.len() > THUMBNAIL_PIXELS {
                    write!(out, " (+{} more)", pixels.len() - THUMBNAIL_PIXELS)?;
                }
                out.write_char('\n')?;
            }
        }
        Marker::QuantizationTables(tables) => {
            for table in tables {
                writeln!(
                    out,
                    "    table {}: {}-bit elements",
                    table.destination(),
                    if table.precision() == 0 { 8 } else { 16 },
                )?;
                for row in table.coefficients().chunks(8) {
                    out.write_str("       ")?;
                    for coefficient in row {
                        write!(out, " {coefficient:3}")?;
                    }
                    out.write_char('\n')?;
                }
            }
        }
        Marker::HuffmanTables(tables) => {
            for table in tables {
                let count: usize = table.values().iter().map(Vec::len).sum();
                writeln!(
                    out,
                    "    table {} {}: {count} codes",
                    table.destination(),
                    if table.class() == 0 { "DC" } else { "AC" },
                )?;
                out.write_str("        code lengths:")?;
                for n in table.code_lengths() {
                    write!(out, " {n}")?;
                }
                out.write_char('\n')?;
                for (length, values) in table.values().iter().enumerate() {
                    if values.is_empty() {
                        continue;
                    }
                    write!(out, "        {:2} bits:", length + 1)?;
                    for value in values {
                        write!(out, " {value:02x}")?;
                    }
                    out.write_char('\n')?;
                }
            }
        }
        Marker::StartOfFrame(sof) => {
            writeln!(
                out,
                "    process: {}, {} coding{}",
                sof.subtype().description(),
                match sof.coding() {
                    EntropyCoding::Huffman => "Huffman",
                    EntropyCoding::Arithmetic => "arithmetic",
                },
                if sof.differential() {
                    ", differential"
                } else {
                    ""
                },
            )?;
            writeln!(out, "    precision: {} bits", sof.precision())?;
            writeln!(out, "    size: {}x{}", sof.width(), sof.height())?;
            for c in sof.components() {
                writeln!(
                    out,
                    "    component {}: sampling {}x{}, quantization table {}",
                    c.id(),
                    c.h_sample(),
                    c.v_sample(),
                    c.quant_table_dest(),
                )?;
            }
        }
        Marker::StartOfScan(sos) => {
            for c in sos.components() {
                writeln!(
                    out,
                    "    component {}: DC table {}, AC table {}",
                    c.selector(),
                    c.dc_table_dest(),
                    c.ac_table_dest(),
                )?;
            }
            writeln!(
                out,
                "    spectral selection: {}..={}",
                sos.spectral_start(),
                sos.spectral_end()
            )?;
            writeln!(
                out,
                "    successive approximation: high {}, low {}",
                sos.approx_high(),
                sos.approx_low()
            )?;
        }
        Marker::NumberOfLines(lines) => writeln!(out, "    lines: {lines}")?,
        Marker::RestartInterval(ri) => writeln!(out, "    restart interval: {ri} MCUs")?,
        Marker::App { data, .. } => {
            writeln!(out, "    {} bytes of application data", data.len())?
        }
        Marker::Comment(text) => writeln!(out, "    \"{}\"", text.escape_ascii())?,
    }
    Ok(())
}
