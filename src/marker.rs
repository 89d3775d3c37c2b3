//! Marker codes and the decoders for each kind of marker segment.

use std::fmt;

use bytemuck::AnyBitPattern;

use crate::{
    cursor::ByteCursor,
    error::{Eof, MarkerError, Result},
};

/// A 16-bit `0xFFXX` marker code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerCode(u16);

impl MarkerCode {
    /// Baseline DCT. The other SOF codes are built with [`MarkerCode::new`].
    pub const SOF0: Self = Self(0xFFC0);
    /// Define Huffman tables.
    pub const DHT: Self = Self(0xFFC4);
    /// Reserved for JPEG extensions.
    pub const JPG: Self = Self(0xFFC8);
    /// Define arithmetic coding conditioning.
    pub const DAC: Self = Self(0xFFCC);
    /// Start of image.
    pub const SOI: Self = Self(0xFFD8);
    /// End of image.
    pub const EOI: Self = Self(0xFFD9);
    /// Start of scan.
    pub const SOS: Self = Self(0xFFDA);
    /// Define quantization tables.
    pub const DQT: Self = Self(0xFFDB);
    /// Define number of lines.
    pub const DNL: Self = Self(0xFFDC);
    /// Define restart interval.
    pub const DRI: Self = Self(0xFFDD);
    /// Application segment 0, used by the JFIF header.
    pub const APP0: Self = Self(0xFFE0);
    /// Comment.
    pub const COM: Self = Self(0xFFFE);

    #[inline]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    #[inline]
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Returns the `0xXX` half of the `0xFF 0xXX` marker.
    #[inline]
    pub const fn low_byte(self) -> u8 {
        self.0 as u8
    }

    /// Whether this is one of the 13 Start-Of-Frame markers.
    ///
    /// `0xFFC4` (DHT), `0xFFC8` (JPG) and `0xFFCC` (DAC) share the `0xFFCX` range but are not
    /// frame headers.
    pub const fn is_sof(self) -> bool {
        self.0 >> 4 == 0xFFC && !matches!(self.0 & 0xF, 0x4 | 0x8 | 0xC)
    }

    /// Returns `n` for `APPn` markers.
    pub const fn app_index(self) -> Option<u8> {
        if self.0 >> 4 == 0xFFE {
            Some((self.0 & 0xF) as u8)
        } else {
            None
        }
    }

    /// Whether this is a `RSTm` restart marker.
    pub const fn is_rst(self) -> bool {
        matches!(self.0, 0xFFD0..=0xFFD7)
    }
}

impl fmt::Display for MarkerCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.0 & 0xF;
        match self.0 {
            0xFF01 => f.write_str("TEM"),
            0xFFC4 => f.write_str("DHT"),
            0xFFC8 => f.write_str("JPG"),
            0xFFCC => f.write_str("DAC"),
            0xFFC0..=0xFFCF => write!(f, "SOF{n}"),
            0xFFD0..=0xFFD7 => write!(f, "RST{n}"),
            0xFFD8 => f.write_str("SOI"),
            0xFFD9 => f.write_str("EOI"),
            0xFFDA => f.write_str("SOS"),
            0xFFDB => f.write_str("DQT"),
            0xFFDC => f.write_str("DNL"),
            0xFFDD => f.write_str("DRI"),
            0xFFDE => f.write_str("DHP"),
            0xFFDF => f.write_str("EXP"),
            0xFFE0..=0xFFEF => write!(f, "APP{n}"),
            0xFFFE => f.write_str("COM"),
            0xFFF0..=0xFFFD => write!(f, "JPG{n}"),
            other => write!(f, "{other:04X}"),
        }
    }
}

impl fmt::Debug for MarkerCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self} ({:04X})", self.0)
    }
}

/// A decoded marker segment.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Marker {
    Soi,
    Eoi,
    /// The JFIF header.
    App0(App0),
    /// A DQT segment, defining one or more quantization tables.
    QuantizationTables(Vec<QuantizationTable>),
    /// A DHT segment, defining one or more Huffman tables.
    HuffmanTables(Vec<HuffmanTable>),
    StartOfFrame(StartOfFrame),
    /// A scan header. The entropy-coded data following it is recorded in the
    /// [`Frame`][crate::Frame].
    StartOfScan(StartOfScan),
    /// DNL: the number of lines in the frame, following the first scan.
    NumberOfLines(u16),
    /// DRI: the number of MCUs in each restart interval.
    RestartInterval(u16),
    /// Any `APPn` segment other than the leading JFIF header, kept as raw bytes.
    App { n: u8, data: Vec<u8> },
    /// COM: comment bytes.
    Comment(Vec<u8>),
}

/// Decodes one length-prefixed segment.
///
/// `cursor` must be positioned right after the marker code. `decode` is given a cursor limited to
/// the segment payload and the payload length (the declared length minus the 2 length bytes), and
/// must consume exactly that many bytes, or the segment is rejected with
/// [`MarkerError::LengthMismatch`]. Reading past the payload is a `LengthMismatch` too.
pub(crate) fn decode_segment<'a, T>(
    cursor: &mut ByteCursor<'a>,
    code: MarkerCode,
    decode: impl FnOnce(&mut ByteCursor<'a>, usize) -> Result<T>,
) -> Result<T> {
    let offset = cursor.position().saturating_sub(2);

    // The length includes the length field itself, but not the FF xx marker.
    let declared = usize::from(cursor.read_u16_be()?);
    if declared < 2 {
        return Err(MarkerError::malformed(
            offset,
            format!("invalid {code} segment length {declared}"),
        ));
    }
    let payload_len = declared - 2;
    if cursor.remaining().len() < payload_len {
        return Err(Eof {
            offset: cursor.position(),
            needed: payload_len,
        }
        .into());
    }

    let start = cursor.position();
    let mut payload = cursor.sub_cursor_at(start).limited(payload_len);
    let value = match decode(&mut payload, payload_len) {
        Ok(value) => value,
        // The whole payload is in the buffer, so this read ran past the segment.
        Err(MarkerError::Eof { offset: at, needed }) => {
            return Err(MarkerError::LengthMismatch {
                offset,
                marker: code,
                expected: declared,
                actual: at + needed - start + 2,
            })
        }
        Err(e) => return Err(e),
    };

    let actual = payload.position() - start + 2;
    if actual != declared {
        return Err(MarkerError::LengthMismatch {
            offset,
            marker: code,
            expected: declared,
            actual,
        });
    }

    cursor.advance(payload_len)?;
    Ok(value)
}

/// Density units of the JFIF header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DensityUnit {
    /// The densities only specify the pixel aspect ratio.
    None,
    DotsPerInch,
    DotsPerCm,
}

impl DensityUnit {
    pub fn from_u8(units: u8) -> Option<Self> {
        match units {
            0 => Some(Self::None),
            1 => Some(Self::DotsPerInch),
            2 => Some(Self::DotsPerCm),
            _ => None,
        }
    }
}

/// The `APP0` JFIF header segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct App0 {
    version: (u8, u8),
    units: u8,
    x_density: u16,
    y_density: u16,
    thumbnail: (u8, u8),
    thumbnail_rgb: Vec<(u8, u8, u8)>,
}

impl App0 {
    const IDENTIFIER: &'static [u8] = b"JFIF\0";

    /// Decodes the segment following an `APP0` marker code.
    pub fn decode(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        decode_segment(cursor, MarkerCode::APP0, |payload, _| {
            let offset = payload.position();
            if payload.read_bytes(Self::IDENTIFIER.len()).ok() != Some(Self::IDENTIFIER) {
                return Err(MarkerError::malformed(
                    offset,
                    "APP0 segment does not start with a JFIF identifier",
                ));
            }

            let major = payload.read_u8()?;
            let minor = payload.read_u8()?;
            let units = payload.read_u8()?;
            let x_density = payload.read_u16_be()?;
            let y_density = payload.read_u16_be()?;
            let width = payload.read_u8()?;
            let height = payload.read_u8()?;
            let pixels = usize::from(width) * usize::from(height);
            let thumbnail_rgb = payload
                .read_objs::<[u8; 3]>(pixels)?
                .iter()
                .map(|&[r, g, b]| (r, g, b))
                .collect();

            Ok(Self {
                version: (major, minor),
                units,
                x_density,
                y_density,
                thumbnail: (width, height),
                thumbnail_rgb,
            })
        })
    }

    /// Returns the `(major, minor)` JFIF version.
    #[inline]
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Returns the raw density unit byte.
    #[inline]
    pub fn units(&self) -> u8 {
        self.units
    }

    /// Interprets [`App0::units`], if it holds one of the values defined by JFIF.
    #[inline]
    pub fn density_unit(&self) -> Option<DensityUnit> {
        DensityUnit::from_u8(self.units)
    }

    #[inline]
    pub fn x_density(&self) -> u16 {
        self.x_density
    }

    #[inline]
    pub fn y_density(&self) -> u16 {
        self.y_density
    }

    /// Returns the `(width, height)` of the embedded thumbnail in pixels.
    #[inline]
    pub fn thumbnail(&self) -> (u8, u8) {
        self.thumbnail
    }

    /// Returns the packed RGB pixels of the thumbnail, row by row.
    #[inline]
    pub fn thumbnail_rgb(&self) -> &[(u8, u8, u8)] {
        &self.thumbnail_rgb
    }
}

/// A quantization table, as defined by a DQT segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizationTable {
    precision: u8,
    destination: u8,
    coefficients: [u16; 64],
}

impl QuantizationTable {
    /// Decodes a single table: the precision/destination byte followed by 64 elements.
    pub fn decode(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let offset = cursor.position();
        let pq_tq = cursor.read_u8()?;
        let precision = pq_tq >> 4;
        let destination = pq_tq & 0xF;
        if precision > 1 {
            return Err(MarkerError::malformed(
                offset,
                format!("invalid quantization table precision {precision}"),
            ));
        }
        if destination > 3 {
            return Err(MarkerError::malformed(
                offset,
                format!("invalid quantization table destination {destination}"),
            ));
        }

        let mut coefficients = [0; 64];
        if precision == 0 {
            let elements: &[u8; 64] = cursor.read_obj()?;
            for (dest, src) in coefficients.iter_mut().zip(elements) {
                *dest = u16::from(*src);
            }
        } else {
            let elements = cursor.read_objs::<[u8; 2]>(64)?;
            for (dest, src) in coefficients.iter_mut().zip(elements) {
                *dest = u16::from_be_bytes(*src);
            }
        }

        Ok(Self {
            precision,
            destination,
            coefficients,
        })
    }

    /// Decodes a whole DQT segment, which may pack several tables.
    pub fn decode_segment(cursor: &mut ByteCursor<'_>) -> Result<Vec<Self>> {
        decode_segment(cursor, MarkerCode::DQT, |payload, len| {
            let start = payload.position();
            let mut tables = Vec::new();
            while payload.position() - start < len {
                let table = Self::decode(payload)?;
                log::trace!(
                    "DQT: table {} with precision {}",
                    table.destination,
                    table.precision
                );
                tables.push(table);
            }
            Ok(tables)
        })
    }

    /// Returns the element precision: 0 for 8-bit elements, 1 for 16-bit elements.
    #[inline]
    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// Returns the destination identifier (0-3).
    #[inline]
    pub fn destination(&self) -> u8 {
        self.destination
    }

    /// Returns the table elements in zig-zag order.
    #[inline]
    pub fn coefficients(&self) -> &[u16; 64] {
        &self.coefficients
    }
}

#[derive(Clone, Copy, AnyBitPattern)]
#[repr(C)]
struct DhtHeader {
    class_destination: u8,
    code_lengths: [u8; 16],
}

/// A Huffman table, as defined by a DHT segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTable {
    class: u8,
    destination: u8,
    code_lengths: [u8; 16],
    values: Vec<Vec<u8>>,
}

impl HuffmanTable {
    /// Decodes a single table: the class/destination byte, 16 code counts and the code values.
    pub fn decode(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let offset = cursor.position();
        let header: &DhtHeader = cursor.read_obj()?;
        let class = header.class_destination >> 4;
        let destination = header.class_destination & 0xF;
        if class > 1 {
            return Err(MarkerError::malformed(
                offset,
                format!("invalid Huffman table class {class}"),
            ));
        }
        if destination > 3 {
            return Err(MarkerError::malformed(
                offset,
                format!("invalid Huffman table destination {destination}"),
            ));
        }

        let values = header
            .code_lengths
            .iter()
            .map(|&count| cursor.read_bytes(count.into()).map(<[u8]>::to_vec))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            class,
            destination,
            code_lengths: header.code_lengths,
            values,
        })
    }

    /// Decodes a whole DHT segment, which may pack several tables.
    pub fn decode_segment(cursor: &mut ByteCursor<'_>) -> Result<Vec<Self>> {
        decode_segment(cursor, MarkerCode::DHT, |payload, len| {
            let start = payload.position();
            let mut tables = Vec::new();
            while payload.position() - start < len {
                let table = Self::decode(payload)?;
                log::trace!(
                    "DHT: class {} table {}, lengths {:?}",
                    table.class,
                    table.destination,
                    table.code_lengths
                );
                tables.push(table);
            }
            Ok(tables)
        })
    }

    /// Returns the table class (0 = DC or lossless, 1 = AC).
    #[inline]
    pub fn class(&self) -> u8 {
        self.class
    }

    /// Returns the destination identifier (0-3).
    #[inline]
    pub fn destination(&self) -> u8 {
        self.destination
    }

    /// Returns the number of codes of each length, from 1 to 16 bits.
    #[inline]
    pub fn code_lengths(&self) -> &[u8; 16] {
        &self.code_lengths
    }

    /// Returns the values associated with each code, grouped by code length.
    ///
    /// `values()[i].len()` always equals `code_lengths()[i]`.
    #[inline]
    pub fn values(&self) -> &[Vec<u8>] {
        &self.values
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntropyCoding {
    Huffman,
    Arithmetic,
}

/// The coding process of a frame, derived from its SOF marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSubtype {
    BaselineDct,
    ExtendedSequential,
    ProgressiveDct,
    LosslessSequential,
    DifferentialSequential,
    DifferentialProgressive,
    DifferentialLossless,
}

impl FrameSubtype {
    pub fn description(self) -> &'static str {
        match self {
            Self::BaselineDct => "baseline DCT",
            Self::ExtendedSequential => "extended sequential DCT",
            Self::ProgressiveDct => "progressive DCT",
            Self::LosslessSequential => "lossless sequential",
            Self::DifferentialSequential => "differential sequential DCT",
            Self::DifferentialProgressive => "differential progressive DCT",
            Self::DifferentialLossless => "differential lossless",
        }
    }
}

/// Classifies a SOF marker by the low nibble of its code.
///
/// Returns `(differential, coding, subtype)`, or `None` for codes in the SOF range that do not
/// introduce a frame.
pub fn classify_sof(code: MarkerCode) -> Option<(bool, EntropyCoding, FrameSubtype)> {
    let nibble = code.get() & 0xF;
    if code.get() >> 4 != 0xFFC {
        return None;
    }
    let coding = if nibble < 8 {
        EntropyCoding::Huffman
    } else {
        EntropyCoding::Arithmetic
    };
    let differential = matches!(nibble, 0x5 | 0x6 | 0x7 | 0xD | 0xE | 0xF);
    let subtype = match nibble {
        0x0 => FrameSubtype::BaselineDct,
        0x1 | 0x9 => FrameSubtype::ExtendedSequential,
        0x2 | 0xA => FrameSubtype::ProgressiveDct,
        0x3 | 0xB => FrameSubtype::LosslessSequential,
        0x5 | 0xD => FrameSubtype::DifferentialSequential,
        0x6 | 0xE => FrameSubtype::DifferentialProgressive,
        0x7 | 0xF => FrameSubtype::DifferentialLossless,
        _ => return None,
    };
    Some((differential, coding, subtype))
}

#[derive(Clone, Copy, AnyBitPattern)]
#[repr(C)]
struct RawFrameComponent {
    id: u8,
    sampling: u8,
    quant_table: u8,
}

/// A component descriptor of a frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameComponent {
    id: u8,
    h_sample: u8,
    v_sample: u8,
    quant_table_dest: u8,
}

impl FrameComponent {
    /// Returns the component identifier, which scan headers refer to.
    #[inline]
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Returns the horizontal sampling factor (1-4).
    #[inline]
    pub fn h_sample(&self) -> u8 {
        self.h_sample
    }

    /// Returns the vertical sampling factor (1-4).
    #[inline]
    pub fn v_sample(&self) -> u8 {
        self.v_sample
    }

    /// Returns the destination of the quantization table used by this component (0-3).
    #[inline]
    pub fn quant_table_dest(&self) -> u8 {
        self.quant_table_dest
    }
}

/// **SOF** Start Of Frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOfFrame {
    code: MarkerCode,
    differential: bool,
    coding: EntropyCoding,
    subtype: FrameSubtype,
    precision: u8,
    height: u16,
    width: u16,
    components: Vec<FrameComponent>,
}

impl StartOfFrame {
    /// Decodes the segment following the SOF marker `code`.
    pub fn decode(code: MarkerCode, cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let offset = cursor.position().saturating_sub(2);
        let Some((differential, coding, subtype)) = classify_sof(code) else {
            return Err(MarkerError::UnsupportedMarker { offset, code });
        };

        decode_segment(cursor, code, |payload, _| {
            let precision = payload.read_u8()?;
            let height = payload.read_u16_be()?;
            let width = payload.read_u16_be()?;
            let count = payload.read_u8()?;
            if count == 0 {
                return Err(MarkerError::malformed(offset, "frame without components"));
            }

            let raw = payload.read_objs::<RawFrameComponent>(count.into())?;
            let mut components: Vec<FrameComponent> = Vec::with_capacity(raw.len());
            for c in raw {
                let component = FrameComponent {
                    id: c.id,
                    h_sample: c.sampling >> 4,
                    v_sample: c.sampling & 0xF,
                    quant_table_dest: c.quant_table,
                };
                if components.iter().any(|other| other.id == component.id) {
                    return Err(MarkerError::malformed(
                        offset,
                        format!("duplicate frame component identifier {}", component.id),
                    ));
                }
                let valid = 1..=4;
                if !valid.contains(&component.h_sample) || !valid.contains(&component.v_sample) {
                    return Err(MarkerError::malformed(
                        offset,
                        format!(
                            "invalid sampling factors {}x{} for component {}",
                            component.h_sample, component.v_sample, component.id
                        ),
                    ));
                }
                if component.quant_table_dest > 3 {
                    return Err(MarkerError::malformed(
                        offset,
                        format!(
                            "invalid quantization table selection {} for component {}",
                            component.quant_table_dest, component.id
                        ),
                    ));
                }
                log::trace!("{:?}", component);
                components.push(component);
            }

            Ok(Self {
                code,
                differential,
                coding,
                subtype,
                precision,
                height,
                width,
                components,
            })
        })
    }

    /// Returns the SOF marker this frame header was introduced by.
    #[inline]
    pub fn code(&self) -> MarkerCode {
        self.code
    }

    #[inline]
    pub fn differential(&self) -> bool {
        self.differential
    }

    #[inline]
    pub fn coding(&self) -> EntropyCoding {
        self.coding
    }

    #[inline]
    pub fn subtype(&self) -> FrameSubtype {
        self.subtype
    }

    /// Returns the sample precision in bits.
    #[inline]
    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// Returns the number of lines. 0 means the lines are defined by a DNL segment.
    #[inline]
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Returns the number of samples per line.
    #[inline]
    pub fn width(&self) -> u16 {
        self.width
    }

    #[inline]
    pub fn components(&self) -> &[FrameComponent] {
        &self.components
    }
}

#[derive(Clone, Copy, AnyBitPattern)]
#[repr(C)]
struct RawScanComponent {
    selector: u8,
    tables: u8,
}

/// A component selector of a scan header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanComponent {
    selector: u8,
    dc_table_dest: u8,
    ac_table_dest: u8,
}

impl ScanComponent {
    /// Returns the identifier of the frame component coded in this scan.
    #[inline]
    pub fn selector(&self) -> u8 {
        self.selector
    }

    /// Returns the DC entropy coding table destination.
    #[inline]
    pub fn dc_table_dest(&self) -> u8 {
        self.dc_table_dest
    }

    /// Returns the AC entropy coding table destination.
    #[inline]
    pub fn ac_table_dest(&self) -> u8 {
        self.ac_table_dest
    }
}

/// **SOS** Start Of Scan – the scan header preceding the entropy-coded data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOfScan {
    components: Vec<ScanComponent>,
    spectral_start: u8,
    spectral_end: u8,
    approx_high: u8,
    approx_low: u8,
}

impl StartOfScan {
    /// Decodes the scan header following an SOS marker code.
    ///
    /// This does not touch the entropy-coded data after the header.
    pub fn decode(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let offset = cursor.position().saturating_sub(2);
        decode_segment(cursor, MarkerCode::SOS, |payload, _| {
            let count = payload.read_u8()?;
            if !(1..=4).contains(&count) {
                return Err(MarkerError::malformed(
                    offset,
                    format!("scan with {count} components (1-4 are allowed)"),
                ));
            }
            let components = payload
                .read_objs::<RawScanComponent>(count.into())?
                .iter()
                .map(|c| ScanComponent {
                    selector: c.selector,
                    dc_table_dest: c.tables >> 4,
                    ac_table_dest: c.tables & 0xF,
                })
                .collect();
            let spectral_start = payload.read_u8()?;
            let spectral_end = payload.read_u8()?;
            let approx = payload.read_u8()?;

            Ok(Self {
                components,
                spectral_start,
                spectral_end,
                approx_high: approx >> 4,
                approx_low: approx & 0xF,
            })
        })
    }

    #[inline]
    pub fn components(&self) -> &[ScanComponent] {
        &self.components
    }

    /// Returns the first coefficient of the spectral selection.
    #[inline]
    pub fn spectral_start(&self) -> u8 {
        self.spectral_start
    }

    /// Returns the last coefficient of the spectral selection.
    #[inline]
    pub fn spectral_end(&self) -> u8 {
        self.spectral_end
    }

    /// Returns the successive approximation bit position high.
    #[inline]
    pub fn approx_high(&self) -> u8 {
        self.approx_high
    }

    /// Returns the successive approximation bit position low (or point transform).
    #[inline]
    pub fn approx_low(&self) -> u8 {
        self.approx_low
    }
}

/// Decodes a segment carrying a single `u16` (DNL, DRI).
pub(crate) fn decode_u16_segment(cursor: &mut ByteCursor<'_>, code: MarkerCode) -> Result<u16> {
    decode_segment(cursor, code, |payload, _| Ok(payload.read_u16_be()?))
}

/// Decodes a segment whose payload is kept as opaque bytes (APPn, COM).
pub(crate) fn decode_opaque_segment(
    cursor: &mut ByteCursor<'_>,
    code: MarkerCode,
) -> Result<Vec<u8>> {
    decode_segment(cursor, code, |payload, len| {
        Ok(payload.read_bytes(len)?.to_vec())
    })
}
