//! The segment scanner: walks the marker segments of a stream and assembles a [`Document`].

#[cfg(test)]
mod tests;

use std::{mem, ops::Range};

use crate::{
    cursor::ByteCursor,
    document::{Document, Frame, Scan, Segment},
    error::{Eof, MarkerError, Result},
    marker::{
        decode_opaque_segment, decode_u16_segment, App0, EntropyCoding, FrameSubtype,
        HuffmanTable, Marker, MarkerCode, QuantizationTable, StartOfFrame, StartOfScan,
    },
    tables::{Table, TableAggregator},
};

/// Parser configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    require_scan: bool,
    allow_trailing_data: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            require_scan: true,
            allow_trailing_data: false,
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether EOI must be preceded by a frame with at least one scan (default: `true`).
    ///
    /// When disabled, a stream consisting of only SOI, APP0, table segments and EOI parses into a
    /// [`Document`] without a [`Frame`].
    pub fn require_scan(mut self, require: bool) -> Self {
        self.require_scan = require;
        self
    }

    /// Whether data after the EOI marker is tolerated (default: `false`).
    ///
    /// When enabled, trailing bytes are logged and available via [`Document::trailing_data`].
    pub fn allow_trailing_data(mut self, allow: bool) -> Self {
        self.allow_trailing_data = allow;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    AwaitingSoi,
    AwaitingApp0,
    InFrame,
    Done,
    Failed,
}

/// Drives the parse of one stream, marker by marker.
pub(crate) struct SegmentScanner<'a> {
    cursor: ByteCursor<'a>,
    options: Options,
    state: State,
    segments: Vec<Segment>,
    frame: Option<Frame>,
    quantization: TableAggregator<QuantizationTable>,
    huffman: TableAggregator<HuffmanTable>,
    restart_interval: Option<u16>,
}

impl<'a> SegmentScanner<'a> {
    pub(crate) fn new(buf: &'a [u8], options: Options) -> Self {
        Self {
            cursor: ByteCursor::new(buf),
            options,
            state: State::AwaitingSoi,
            segments: Vec::new(),
            frame: None,
            quantization: TableAggregator::new(),
            huffman: TableAggregator::new(),
            restart_interval: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> State {
        self.state
    }

    /// Parses the whole stream.
    ///
    /// On failure, the scanner is left in the `Failed` state and nothing that was decoded so far
    /// is exposed.
    pub(crate) fn run(&mut self) -> Result<Document<'a>> {
        match self.run_impl() {
            Ok(document) => Ok(document),
            Err(e) => {
                log::debug!("parse failed in state {:?}: {e}", self.state);
                self.state = State::Failed;
                Err(e)
            }
        }
    }

    fn run_impl(&mut self) -> Result<Document<'a>> {
        self.expect_marker(MarkerCode::SOI)?;
        self.push(0, MarkerCode::SOI, Marker::Soi);
        self.transition(State::AwaitingApp0);

        let offset = self.expect_marker(MarkerCode::APP0)?;
        let app0 = App0::decode(&mut self.cursor)?;
        self.push(offset, MarkerCode::APP0, Marker::App0(app0.clone()));
        self.transition(State::InFrame);

        loop {
            let before = self.cursor.position();
            if self.next_segment()? {
                break;
            }
            if self.cursor.position() <= before {
                return Err(MarkerError::NoProgress { offset: before });
            }
        }
        self.transition(State::Done);

        Ok(Document {
            buf: self.cursor.buffer(),
            segments: mem::take(&mut self.segments),
            app0,
            frame: self.frame.take(),
            quantization: mem::take(&mut self.quantization),
            huffman: mem::take(&mut self.huffman),
            restart_interval: self.restart_interval,
            end: self.cursor.position(),
        })
    }

    fn transition(&mut self, next: State) {
        log::debug!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Consumes the next marker code, which must be `expected`. Returns its offset.
    fn expect_marker(&mut self, expected: MarkerCode) -> Result<usize> {
        let offset = self.cursor.position();
        let found = MarkerCode::new(self.cursor.read_u16_be()?);
        if found != expected {
            return Err(MarkerError::UnexpectedMarker {
                offset,
                expected,
                found,
            });
        }
        Ok(offset)
    }

    /// Records a segment that starts at `offset` and ends at the current position.
    fn push(&mut self, offset: usize, code: MarkerCode, marker: Marker) {
        let len = self.cursor.position() - offset;
        log::debug!("{code} segment at 0x{offset:04X}, {len} bytes");
        self.segments.push(Segment {
            offset,
            code,
            len,
            marker,
        });
    }

    /// Decodes the next segment inside the frame. Returns `true` once EOI has been consumed.
    fn next_segment(&mut self) -> Result<bool> {
        let offset = self.cursor.position();
        let raw = self.cursor.peek_u16_be()?;

        if raw == 0xFFFF {
            // Any marker may be preceded by 0xFF fill bytes.
            log::warn!("skipping fill byte at 0x{offset:04X}");
            self.cursor.advance(1)?;
            return Ok(false);
        }
        if raw >> 8 != 0xFF || raw == 0xFF00 {
            return Err(MarkerError::InvalidMarker { offset, found: raw });
        }

        let code = MarkerCode::new(raw);
        self.cursor.advance(2)?;

        let marker = match code {
            MarkerCode::DQT => {
                let tables = QuantizationTable::decode_segment(&mut self.cursor)?;
                for table in &tables {
                    if self.quantization.insert(table.clone()).is_some() {
                        log::debug!("redefined quantization table {}", table.destination());
                    }
                }
                Marker::QuantizationTables(tables)
            }
            MarkerCode::DHT => {
                let tables = HuffmanTable::decode_segment(&mut self.cursor)?;
                for table in &tables {
                    if self.huffman.insert(table.clone()).is_some() {
                        log::debug!("redefined Huffman table {:?}", table.key());
                    }
                }
                Marker::HuffmanTables(tables)
            }
            code if code.is_sof() => {
                if self.frame.is_some() {
                    return Err(MarkerError::DuplicateFrame { offset });
                }
                let sof = StartOfFrame::decode(code, &mut self.cursor)?;
                self.frame = Some(Frame {
                    sof: sof.clone(),
                    scans: Vec::new(),
                    lines: None,
                });
                Marker::StartOfFrame(sof)
            }
            MarkerCode::SOS => {
                let header = StartOfScan::decode(&mut self.cursor)?;
                self.validate_scan(offset, &header)?;
                self.push(offset, code, Marker::StartOfScan(header.clone()));

                let data = self.entropy_coded_span()?;
                log::debug!(
                    "scan data: {} bytes at 0x{:04X}",
                    data.len(),
                    data.start
                );
                if let Some(frame) = &mut self.frame {
                    frame.scans.push(Scan {
                        offset,
                        header,
                        data,
                        quantization: self.quantization.clone(),
                        huffman: self.huffman.clone(),
                    });
                }
                return Ok(false);
            }
            MarkerCode::DNL => {
                let lines = decode_u16_segment(&mut self.cursor, code)?;
                let follows_scan = matches!(
                    self.segments.last(),
                    Some(Segment {
                        marker: Marker::StartOfScan(_),
                        ..
                    })
                );
                match &mut self.frame {
                    Some(frame) if follows_scan && frame.lines.is_none() => {
                        frame.lines = Some(lines);
                    }
                    _ => {
                        return Err(MarkerError::malformed(
                            offset,
                            "DNL segment must directly follow a scan and may only appear once",
                        ))
                    }
                }
                Marker::NumberOfLines(lines)
            }
            MarkerCode::DRI => {
                let ri = decode_u16_segment(&mut self.cursor, code)?;
                self.restart_interval = Some(ri);
                Marker::RestartInterval(ri)
            }
            MarkerCode::COM => Marker::Comment(decode_opaque_segment(&mut self.cursor, code)?),
            MarkerCode::EOI => {
                self.finish_at_eoi(offset)?;
                self.push(offset, code, Marker::Eoi);
                return Ok(true);
            }
            code => match code.app_index() {
                Some(n) => Marker::App {
                    n,
                    data: decode_opaque_segment(&mut self.cursor, code)?,
                },
                None => return Err(MarkerError::UnsupportedMarker { offset, code }),
            },
        };

        self.push(offset, code, marker);
        Ok(false)
    }

    /// Checks the structural requirements on the stream once EOI (at `offset`) was read.
    fn finish_at_eoi(&self, offset: usize) -> Result<()> {
        let trailing = self.cursor.remaining().len();
        if trailing != 0 {
            if !self.options.allow_trailing_data {
                return Err(MarkerError::TrailingData {
                    offset: self.cursor.position(),
                    len: trailing,
                });
            }
            log::warn!("ignoring {trailing} trailing bytes after EOI");
        }

        let has_scan = self.frame.as_ref().is_some_and(|f| !f.scans.is_empty());
        if self.options.require_scan && !has_scan {
            return Err(MarkerError::MissingScan { offset });
        }
        Ok(())
    }

    /// Checks a scan header against the frame and the tables defined so far.
    ///
    /// Unknown component selectors are an error. Missing tables are only logged, since the
    /// tables may legitimately be supplied out of band (e.g. Motion JPEG).
    fn validate_scan(&self, offset: usize, header: &StartOfScan) -> Result<()> {
        let Some(frame) = &self.frame else {
            return Err(MarkerError::UnexpectedMarker {
                offset,
                expected: MarkerCode::SOF0,
                found: MarkerCode::SOS,
            });
        };
        let sof = &frame.sof;
        let lossless = matches!(
            sof.subtype(),
            FrameSubtype::LosslessSequential | FrameSubtype::DifferentialLossless
        );

        for component in header.components() {
            let Some(frame_component) = sof
                .components()
                .iter()
                .find(|c| c.id() == component.selector())
            else {
                return Err(MarkerError::malformed(
                    offset,
                    format!(
                        "scan refers to component {}, which is not part of the frame",
                        component.selector()
                    ),
                ));
            };
            log::trace!("{:?}", component);

            if sof.coding() == EntropyCoding::Huffman {
                let needs_dc = header.spectral_start() == 0;
                let needs_ac = header.spectral_end() > 0 && !lossless;
                if needs_dc && self.huffman.get((0, component.dc_table_dest())).is_none() {
                    log::warn!(
                        "scan at 0x{offset:04X} uses undefined DC table {}",
                        component.dc_table_dest()
                    );
                }
                if needs_ac && self.huffman.get((1, component.ac_table_dest())).is_none() {
                    log::warn!(
                        "scan at 0x{offset:04X} uses undefined AC table {}",
                        component.ac_table_dest()
                    );
                }
            }

            let quant = frame_component.quant_table_dest();
            if !lossless && self.quantization.get(quant).is_none() {
                log::warn!("scan at 0x{offset:04X} uses undefined quantization table {quant}");
            }
        }
        Ok(())
    }

    /// Skips the entropy-coded data following a scan header and returns its byte range.
    ///
    /// The data ends at the first marker that is neither byte stuffing (`FF 00`) nor a restart
    /// marker (`FF D0`-`FF D7`). The cursor is left on that marker.
    fn entropy_coded_span(&mut self) -> Result<Range<usize>> {
        let start = self.cursor.position();
        loop {
            let Some(ff) = self.cursor.remaining().iter().position(|&b| b == 0xFF) else {
                return Err(Eof {
                    offset: self.cursor.buffer().len(),
                    needed: 2,
                }
                .into());
            };
            self.cursor.advance(ff)?;

            let mut offset = 1;
            let mut byte = self.cursor.peek_u8_at(offset)?;
            while byte == 0xFF {
                offset += 1;
                byte = self.cursor.peek_u8_at(offset)?;
            }

            match byte {
                0x00 | 0xD0..=0xD7 => self.cursor.advance(offset + 1)?,
                _ => {
                    // Leave the cursor on the last 0xFF before the marker.
                    self.cursor.advance(offset - 1)?;
                    break;
                }
            }
        }
        Ok(start..self.cursor.position())
    }
}
