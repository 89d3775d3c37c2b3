use expect_test::{expect, Expect};

use crate::{error::MarkerError, parse, parse_with, MarkerCode};

use super::{Options, SegmentScanner, State};

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

fn segment(code: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = code.to_be_bytes().to_vec();
    out.extend_from_slice(&(payload.len() as u16 + 2).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// JFIF 1.01, no units, 72x72, no thumbnail.
fn app0() -> Vec<u8> {
    segment(0xFFE0, b"JFIF\0\x01\x01\x00\x00\x48\x00\x48\x00\x00")
}

fn dqt(destination: u8, value: u8) -> Vec<u8> {
    let mut payload = vec![destination];
    payload.extend([value; 64]);
    segment(0xFFDB, &payload)
}

/// A DHT segment with one table per `class << 4 | destination` byte, each with a single 1-bit
/// code.
fn dht(tables: &[u8]) -> Vec<u8> {
    let mut payload = Vec::new();
    for &class_destination in tables {
        payload.push(class_destination);
        payload.push(1);
        payload.extend([0; 15]);
        payload.push(0x00);
    }
    segment(0xFFC4, &payload)
}

/// A DHT segment with a single table whose only code is 1 bit long and maps to `value`.
fn dht_value(class_destination: u8, value: u8) -> Vec<u8> {
    let mut payload = vec![class_destination, 1];
    payload.extend([0; 15]);
    payload.push(value);
    segment(0xFFC4, &payload)
}

/// An 8 pixel wide, single-component frame.
fn sof(code: u16, height: u16) -> Vec<u8> {
    let [hi, lo] = height.to_be_bytes();
    segment(code, &[8, hi, lo, 0, 8, 1, 1, 0x11, 0])
}

fn sos(spectral_start: u8, spectral_end: u8) -> Vec<u8> {
    segment(0xFFDA, &[1, 1, 0x00, spectral_start, spectral_end, 0])
}

fn baseline() -> Vec<u8> {
    [
        &SOI[..],
        &app0(),
        &dqt(0, 1),
        &dht(&[0x00, 0x10]),
        &sof(0xFFC0, 8),
        &sos(0, 63),
        &[0x12, 0xFF, 0x00, 0x34],
        &EOI,
    ]
    .concat()
}

fn dump(jpeg: &[u8], options: Options) -> String {
    match parse_with(jpeg, &options) {
        Ok(document) => document.render(),
        Err(e) => format!("error: {e}\n"),
    }
}

fn check(jpeg: &[u8], expect: Expect) {
    expect.assert_eq(&dump(jpeg, Options::default()));
}

fn check_with(jpeg: &[u8], options: Options, expect: Expect) {
    expect.assert_eq(&dump(jpeg, options));
}

#[test]
fn minimal_jfif() {
    let jpeg = [&SOI[..], &app0(), &EOI].concat();
    assert_eq!(
        jpeg,
        [
            0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00,
            0x00, 0x48, 0x00, 0x48, 0x00, 0x00, 0xFF, 0xD9,
        ]
    );

    check(
        &jpeg,
        expect![[r#"
            error: EOI at 0x0014 not preceded by any scan
        "#]],
    );
    check_with(
        &jpeg,
        Options::new().require_scan(false),
        expect![[r#"
            0000 [FF D8] SOI, 2 bytes
            0002 [FF E0] APP0, 18 bytes
                version: 1.01
                units: 0 (no units, densities give the pixel aspect ratio)
                density: 72x72
                thumbnail: 0x0, 0 RGB pixels
            0014 [FF D9] EOI, 2 bytes
        "#]],
    );

    let document = parse_with(&jpeg, &Options::new().require_scan(false)).unwrap();
    assert_eq!(document.segments().len(), 3);
    assert_eq!(document.app0().version(), (1, 1));
    assert_eq!(document.app0().units(), 0);
    assert_eq!(document.app0().x_density(), 0x48);
    assert_eq!(document.app0().y_density(), 0x48);
    assert_eq!(document.app0().thumbnail(), (0, 0));
    assert!(document.app0().thumbnail_rgb().is_empty());
    assert!(document.frame().is_none());
    assert_eq!(document.scan_payload(0), None);
}

#[test]
fn baseline_dump() {
    check(
        &baseline(),
        expect![[r#"
            0000 [FF D8] SOI, 2 bytes
            0002 [FF E0] APP0, 18 bytes
                version: 1.01
                units: 0 (no units, densities give the pixel aspect ratio)
                density: 72x72
                thumbnail: 0x0, 0 RGB pixels
            0014 [FF DB] DQT, 69 bytes
                table 0: 8-bit elements
                      1   1   1   1   1   1   1   1
                      1   1   1   1   1   1   1   1
                      1   1   1   1   1   1   1   1
                      1   1   1   1   1   1   1   1
                      1   1   1   1   1   1   1   1
                      1   1   1   1   1   1   1   1
                      1   1   1   1   1   1   1   1
                      1   1   1   1   1   1   1   1
            0059 [FF C4] DHT, 40 bytes
                table 0 DC: 1 codes
                    code lengths: 1 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0
                     1 bits: 00
                table 0 AC: 1 codes
                    code lengths: 1 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0
                     1 bits: 00
            0081 [FF C0] SOF0, 13 bytes
                process: baseline DCT, Huffman coding
                precision: 8 bits
                size: 8x8
                component 1: sampling 1x1, quantization table 0
            008E [FF DA] SOS, 10 bytes
                component 1: DC table 0, AC table 0
                spectral selection: 0..=63
                successive approximation: high 0, low 0
                entropy-coded data: 4 bytes at 0x0098
            009C [FF D9] EOI, 2 bytes
        "#]],
    );

    let jpeg = baseline();
    let document = parse(&jpeg).unwrap();
    let frame = document.frame().unwrap();
    assert_eq!(frame.scans().len(), 1);
    assert_eq!(frame.number_of_lines(), 8);
    assert_eq!(document.scan_payload(0), Some(&[0x12, 0xFF, 0x00, 0x34][..]));
    assert_eq!(document.scan_payload(1), None);
    assert!(document.trailing_data().is_empty());
}

#[test]
fn metadata_segments() {
    let jpeg = [
        &SOI[..],
        &app0(),
        &segment(0xFFFE, b"hi"),
        &segment(0xFFE1, b"Exif\0\0"),
        &segment(0xFFDD, &[0x00, 0x04]),
        &EOI,
    ]
    .concat();
    check_with(
        &jpeg,
        Options::new().require_scan(false),
        expect![[r#"
            0000 [FF D8] SOI, 2 bytes
            0002 [FF E0] APP0, 18 bytes
                version: 1.01
                units: 0 (no units, densities give the pixel aspect ratio)
                density: 72x72
                thumbnail: 0x0, 0 RGB pixels
            0014 [FF FE] COM, 6 bytes
                "hi"
            001A [FF E1] APP1, 10 bytes
                6 bytes of application data
            0024 [FF DD] DRI, 6 bytes
                restart interval: 4 MCUs
            002A [FF D9] EOI, 2 bytes
        "#]],
    );

    let document = parse_with(&jpeg, &Options::new().require_scan(false)).unwrap();
    assert_eq!(document.restart_interval(), Some(4));
}

#[test]
fn structure() {
    // No SOI.
    check(
        &[&app0()[..], &EOI].concat(),
        expect![[r#"
            error: expected SOI at 0x0000, found APP0
        "#]],
    );
    // No APP0 after SOI.
    check(
        &[&SOI[..], &dqt(0, 1), &EOI].concat(),
        expect![[r#"
            error: expected APP0 at 0x0002, found DQT
        "#]],
    );
    // SOS before any SOF.
    check(
        &[&SOI[..], &app0(), &dqt(0, 1), &sos(0, 63), &EOI].concat(),
        expect![[r#"
            error: expected SOF0 at 0x0059, found SOS
        "#]],
    );
    check(
        &[],
        expect![[r#"
            error: reached end of data at offset 0x0000 (needed 2 bytes)
        "#]],
    );
}

#[test]
fn truncation_is_eof() {
    let jpeg = baseline();
    for len in 0..jpeg.len() {
        match parse(&jpeg[..len]) {
            Err(MarkerError::Eof { .. }) => {}
            other => panic!("truncated to {len} bytes: {other:?}"),
        }
    }

    let jpeg = [&SOI[..], &app0(), &EOI].concat();
    let options = Options::new().require_scan(false);
    for len in 0..jpeg.len() {
        assert!(
            matches!(
                parse_with(&jpeg[..len], &options),
                Err(MarkerError::Eof { .. })
            ),
            "truncated to {len} bytes"
        );
    }
}

#[test]
fn last_write_wins() {
    let jpeg = [
        &SOI[..],
        &app0(),
        &dqt(0, 1),
        &dqt(0, 9),
        &dht(&[0x00, 0x10]),
        &sof(0xFFC0, 8),
        &sos(0, 63),
        &[0x00],
        &EOI,
    ]
    .concat();
    let document = parse(&jpeg).unwrap();
    let tables = document.quantization_tables();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables.get(0).unwrap().coefficients(), &[9; 64]);

    let dqt_segments = document
        .segments()
        .iter()
        .filter(|s| s.code() == MarkerCode::DQT)
        .count();
    assert_eq!(dqt_segments, 2);
}

#[test]
fn segment_overruns_declared_length() {
    // SOF0 declaring 2 components, but only long enough for one.
    let short_sof = segment(0xFFC0, &[8, 0, 8, 0, 8, 2, 1, 0x11, 0]);
    check(
        &[&SOI[..], &app0(), &short_sof, &EOI].concat(),
        expect![[r#"
            error: SOF0 segment at 0x0014 declares a length of 11 bytes, but decoding it consumed 14
        "#]],
    );
    // The following DQT segment must not be read as the second component.
    check(
        &[&SOI[..], &app0(), &short_sof, &dqt(0, 1)].concat(),
        expect![[r#"
            error: SOF0 segment at 0x0014 declares a length of 11 bytes, but decoding it consumed 14
        "#]],
    );

    // A 1x1 thumbnail that does not fit in the declared length.
    check(
        &[
            &SOI[..],
            &segment(0xFFE0, b"JFIF\0\x01\x01\x00\x00\x01\x00\x01\x01\x01"),
            &EOI,
        ]
        .concat(),
        expect![[r#"
            error: APP0 segment at 0x0002 declares a length of 16 bytes, but decoding it consumed 19
        "#]],
    );

    // SOS naming 2 components, with the scan data right behind it.
    let jpeg = [
        &SOI[..],
        &app0(),
        &dqt(0, 1),
        &dht(&[0x00, 0x10]),
        &sof(0xFFC0, 8),
        &segment(0xFFDA, &[2, 1, 0x00, 0, 63, 0]),
        &[0x12, 0x34],
        &EOI,
    ]
    .concat();
    check(
        &jpeg,
        expect![[r#"
            error: SOS segment at 0x008E declares a length of 8 bytes, but decoding it consumed 9
        "#]],
    );
}

#[test]
fn thumbnail() {
    let mut payload = b"JFIF\0\x01\x02\x01\x00\x48\x00\x48\x02\x01".to_vec();
    payload.extend([0xFF, 0x00, 0x00, 0x00, 0xFF, 0x80]);
    let jpeg = [&SOI[..], &segment(0xFFE0, &payload), &EOI].concat();
    check_with(
        &jpeg,
        Options::new().require_scan(false),
        expect![[r#"
            0000 [FF D8] SOI, 2 bytes
            0002 [FF E0] APP0, 24 bytes
                version: 1.02
                units: 1 (dots per inch)
                density: 72x72
                thumbnail: 2x1, 2 RGB pixels
                thumbnail pixels: #ff0000 #00ff80
            001A [FF D9] EOI, 2 bytes
        "#]],
    );

    // Long thumbnails are cut short in the dump.
    let mut payload = b"JFIF\0\x01\x01\x00\x00\x01\x00\x01\x05\x04".to_vec();
    payload.extend((0..60).map(|i| i as u8));
    let jpeg = [&SOI[..], &segment(0xFFE0, &payload), &EOI].concat();
    let document = parse_with(&jpeg, &Options::new().require_scan(false)).unwrap();
    assert_eq!(document.app0().thumbnail_rgb().len(), 20);
    let render = document.render();
    let pixels = render
        .lines()
        .find(|line| line.starts_with("    thumbnail pixels:"))
        .unwrap();
    assert!(pixels.starts_with("    thumbnail pixels: #000102 #030405 "));
    assert!(pixels.ends_with(" #2d2e2f (+4 more)"), "{pixels}");
}

#[test]
fn scans_keep_their_tables() {
    let jpeg = [
        &SOI[..],
        &app0(),
        &dqt(0, 1),
        &dht_value(0x00, 0x00),
        &dht_value(0x10, 0x00),
        &sof(0xFFC2, 8),
        &sos(0, 0),
        &[0x01],
        &dht_value(0x00, 0x05),
        &dqt(0, 2),
        &sos(0, 0),
        &[0x02],
        &EOI,
    ]
    .concat();
    let document = parse(&jpeg).unwrap();
    let scans = document.frame().unwrap().scans();
    assert_eq!(scans.len(), 2);

    assert_eq!(scans[0].huffman_tables().get((0, 0)).unwrap().values()[0], [0x00]);
    assert_eq!(scans[1].huffman_tables().get((0, 0)).unwrap().values()[0], [0x05]);
    assert_eq!(scans[0].huffman_tables().get((1, 0)), scans[1].huffman_tables().get((1, 0)));
    assert_eq!(scans[0].quantization_tables().get(0).unwrap().coefficients(), &[1; 64]);
    assert_eq!(scans[1].quantization_tables().get(0).unwrap().coefficients(), &[2; 64]);

    assert_eq!(document.huffman_tables(), scans[1].huffman_tables());
    assert_eq!(document.quantization_tables(), scans[1].quantization_tables());
}

#[test]
fn render_is_idempotent() {
    let jpeg = baseline();
    let document = parse(&jpeg).unwrap();
    let first = document.render();
    assert_eq!(first, document.render());
    assert_eq!(first, document.to_string());
}

#[test]
fn rejected_markers() {
    let mut jpeg = baseline();
    jpeg.splice(0x8E..0x8E, sof(0xFFC1, 8));
    check(
        &jpeg,
        expect![[r#"
            error: second SOF segment at 0x008E
        "#]],
    );

    let mut jpeg = baseline();
    jpeg.splice(0x59..0x59, segment(0xFFCC, &[0x00, 0x00]));
    check(
        &jpeg,
        expect![[r#"
            error: unsupported marker DAC at 0x0059
        "#]],
    );

    let mut jpeg = baseline();
    jpeg.splice(0x59..0x59, segment(0xFFC8, &[]));
    check(
        &jpeg,
        expect![[r#"
            error: unsupported marker JPG at 0x0059
        "#]],
    );

    let mut jpeg = baseline();
    jpeg.splice(0x59..0x59, [0xFF, 0xD3]);
    check(
        &jpeg,
        expect![[r#"
            error: unsupported marker RST3 at 0x0059
        "#]],
    );

    let mut jpeg = baseline();
    jpeg.splice(0x59..0x59, [0x12, 0x34]);
    check(
        &jpeg,
        expect![[r#"
            error: invalid marker 1234 at 0x0059
        "#]],
    );

    let mut jpeg = baseline();
    jpeg.splice(0x59..0x59, [0xFF, 0x00]);
    check(
        &jpeg,
        expect![[r#"
            error: invalid marker FF00 at 0x0059
        "#]],
    );
}

#[test]
fn scan_component_not_in_frame() {
    let jpeg = [
        &SOI[..],
        &app0(),
        &dqt(0, 1),
        &dht(&[0x00, 0x10]),
        &sof(0xFFC0, 8),
        &segment(0xFFDA, &[1, 2, 0x00, 0, 63, 0]),
        &[0x00],
        &EOI,
    ]
    .concat();
    check(
        &jpeg,
        expect![[r#"
            error: malformed segment at 0x008E: scan refers to component 2, which is not part of the frame
        "#]],
    );
}

#[test]
fn missing_tables_are_tolerated() {
    // Motion JPEG frames often leave out the Huffman tables.
    let jpeg = [
        &SOI[..],
        &app0(),
        &sof(0xFFC0, 8),
        &sos(0, 63),
        &[0x00],
        &EOI,
    ]
    .concat();
    let document = parse(&jpeg).unwrap();
    assert!(document.huffman_tables().is_empty());
    assert!(document.quantization_tables().is_empty());
    assert_eq!(document.frame().unwrap().scans().len(), 1);
}

#[test]
fn trailing_data() {
    let mut jpeg = baseline();
    jpeg.extend([0, 0, 0]);
    check(
        &jpeg,
        expect![[r#"
            error: 3 trailing bytes after EOI at 0x009E
        "#]],
    );

    let document = parse_with(&jpeg, &Options::new().allow_trailing_data(true)).unwrap();
    assert_eq!(document.trailing_data(), &[0, 0, 0]);
    assert!(document
        .render()
        .ends_with("009C [FF D9] EOI, 2 bytes\n3 trailing bytes\n"));
}

#[test]
fn restart_markers_and_stuffing() {
    let data: [u8; 12] = [
        0x12, 0xFF, 0x00, 0xFF, 0xD0, 0x34, 0xFF, 0xFF, 0xD1, 0x56, 0xFF, 0x00,
    ];
    let jpeg = [
        &SOI[..],
        &app0(),
        &dqt(0, 1),
        &dht(&[0x00, 0x10]),
        &sof(0xFFC0, 8),
        &sos(0, 63),
        &data,
        // Fill byte before EOI.
        &[0xFF],
        &EOI,
    ]
    .concat();
    let document = parse(&jpeg).unwrap();
    let payload = document.scan_payload(0).unwrap();
    assert_eq!(&payload[..data.len()], &data);
    assert_eq!(payload.len(), data.len() + 1);
    assert_eq!(
        document.segments().last().unwrap().offset(),
        jpeg.len() - 2
    );
}

#[test]
fn fill_bytes_between_segments() {
    let jpeg = [
        &SOI[..],
        &app0(),
        &dqt(0, 1),
        &[0xFF, 0xFF],
        &dht(&[0x00, 0x10]),
        &sof(0xFFC0, 8),
        &sos(0, 63),
        &[0x00],
        &EOI,
    ]
    .concat();
    let document = parse(&jpeg).unwrap();
    let codes = document
        .segments()
        .iter()
        .map(|s| s.code().to_string())
        .collect::<Vec<_>>();
    assert_eq!(codes, ["SOI", "APP0", "DQT", "DHT", "SOF0", "SOS", "EOI"]);
    assert_eq!(document.segments()[3].offset(), 0x5B);
    assert_eq!(document.huffman_tables().len(), 2);
}

#[test]
fn number_of_lines() {
    let jpeg = [
        &SOI[..],
        &app0(),
        &dqt(0, 1),
        &dht(&[0x00, 0x10]),
        &sof(0xFFC0, 0),
        &sos(0, 63),
        &[0x00],
        &segment(0xFFDC, &[0x00, 0x10]),
        &EOI,
    ]
    .concat();
    let document = parse(&jpeg).unwrap();
    let frame = document.frame().unwrap();
    assert_eq!(frame.sof().height(), 0);
    assert_eq!(frame.number_of_lines(), 16);
    assert!(document.render().contains("    lines: 16\n"));

    // DNL is only valid right after scan data.
    let jpeg = [
        &SOI[..],
        &app0(),
        &dqt(0, 1),
        &segment(0xFFDC, &[0x00, 0x10]),
        &EOI,
    ]
    .concat();
    check(
        &jpeg,
        expect![[r#"
            error: malformed segment at 0x0059: DNL segment must directly follow a scan and may only appear once
        "#]],
    );
}

#[test]
fn progressive_scans() {
    let jpeg = [
        &SOI[..],
        &app0(),
        &dqt(0, 1),
        &dht(&[0x00]),
        &sof(0xFFC2, 8),
        &sos(0, 0),
        &[0x01],
        &dht(&[0x10]),
        &sos(1, 63),
        &[0x02, 0xFF, 0x00],
        &EOI,
    ]
    .concat();
    let document = parse(&jpeg).unwrap();
    let codes = document
        .segments()
        .iter()
        .map(|s| s.code().to_string())
        .collect::<Vec<_>>();
    assert_eq!(
        codes,
        ["SOI", "APP0", "DQT", "DHT", "SOF2", "SOS", "DHT", "SOS", "EOI"]
    );

    let frame = document.frame().unwrap();
    assert_eq!(frame.scans().len(), 2);
    assert_eq!(frame.scans()[1].header().spectral_start(), 1);
    assert_eq!(document.scan_payload(0), Some(&[0x01][..]));
    assert_eq!(document.scan_payload(1), Some(&[0x02, 0xFF, 0x00][..]));
    assert_eq!(document.huffman_tables().len(), 2);
}

#[test]
fn scanner_states() {
    let jpeg = baseline();
    let mut scanner = SegmentScanner::new(&jpeg, Options::default());
    assert_eq!(scanner.state(), State::AwaitingSoi);
    scanner.run().unwrap();
    assert_eq!(scanner.state(), State::Done);

    let mut scanner = SegmentScanner::new(&jpeg[..0x30], Options::default());
    assert!(scanner.run().is_err());
    assert_eq!(scanner.state(), State::Failed);
}
