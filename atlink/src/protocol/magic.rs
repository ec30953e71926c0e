//! Content sniffing for downloaded objects.
//!
//! A download reply is an undelimited blob:
//!
//! ```text
//! [echo] \r\n CONNECT \r\n <file bytes> \r\n NO CARRIER \r\n
//! ```
//!
//! The file starts at the first signature found in [`SIGNATURES`] order
//! (order matters, the first entry that matches anywhere wins) and ends
//! right before `\r\nNO CARRIER`. When nothing matches, the file is
//! everything after the `CONNECT` marker.

use std::fmt;

use log::debug;

use crate::error::{Error, Result};
use crate::protocol::commands::{CONNECT, NO_CARRIER};

/// Window after a JPEG start marker in which a second marker wins.
const JPEG_WINDOW: usize = 20;

/// Detected format of a downloaded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ContentKind {
    /// JPEG image.
    Jpeg,
    /// Standard MIDI file.
    Midi,
    /// AMR speech.
    Amr,
    /// RIFF WAVE audio.
    Wav,
    /// GIF image.
    Gif,
    /// PNG image.
    Png,
    /// vCalendar entry.
    VCalendar,
    /// vCard entry.
    VCard,
    /// MNG animation.
    Mng,
    /// AIFF audio.
    Aiff,
    /// iMelody ring tone.
    IMelody,
    /// MPEG-4 / 3GP clip.
    Mp4,
    /// gzip archive.
    Gzip,
    /// zip archive.
    Zip,
    /// MPEG audio (MP3).
    Mp3,
    /// Windows Media video.
    Wmv,
    /// XML document.
    Xml,
    /// SVG image.
    Svg,
    /// Windows metafile.
    Wmf,
    /// PostScript.
    PostScript,
    /// TIFF image.
    Tiff,
    /// Windows bitmap.
    Bmp,
    /// Java MIDlet descriptor.
    Midlet,
    /// Computer graphics metafile.
    Cgm,
    /// Vendor bitmap format.
    ProprietaryBitmap,
    /// Wireless bitmap.
    Wbmp,
    /// No signature matched; everything after `CONNECT`.
    Raw,
}

impl ContentKind {
    /// Conventional file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Midi => "mid",
            Self::Amr => "amr",
            Self::Wav => "wav",
            Self::Gif => "gif",
            Self::Png => "png",
            Self::VCalendar => "vcs",
            Self::VCard => "vcf",
            Self::Mng => "mng",
            Self::Aiff => "aif",
            Self::IMelody => "imy",
            Self::Mp4 => "mp4",
            Self::Gzip => "gz",
            Self::Zip => "zip",
            Self::Mp3 => "mp3",
            Self::Wmv => "wmv",
            Self::Xml => "xml",
            Self::Svg => "svg",
            Self::Wmf => "wmf",
            Self::PostScript => "eps",
            Self::Tiff => "tif",
            Self::Bmp => "bmp",
            Self::Midlet => "jad",
            Self::Cgm => "cgm",
            Self::ProprietaryBitmap => "pbf",
            Self::Wbmp => "wbmp",
            Self::Raw => "bin",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// One entry of the signature chain.
#[derive(Debug, Clone, Copy)]
pub struct Signature {
    /// Format recognised by this entry.
    pub kind: ContentKind,
    /// Bytes to search for.
    pub magic: &'static [u8],
    /// Offset from the match to the start of the file.
    pub adjust: isize,
}

const fn sig(kind: ContentKind, magic: &'static [u8]) -> Signature {
    Signature {
        kind,
        magic,
        adjust: 0,
    }
}

/// The signature chain, in match order.
pub const SIGNATURES: &[Signature] = &[
    sig(ContentKind::Jpeg, &[0xFF, 0xD8]),
    sig(ContentKind::Midi, b"MThd"),
    sig(ContentKind::Amr, b"#!AMR"),
    sig(ContentKind::Wav, b"RIFF"),
    sig(ContentKind::Gif, b"GIF8"),
    sig(ContentKind::Png, &[0x89, b'P', b'N', b'G']),
    sig(ContentKind::VCalendar, b"BEGIN:VCALENDAR"),
    sig(ContentKind::VCard, b"BEGIN:VCARD"),
    sig(ContentKind::Mng, &[0x8A, b'M', b'N', b'G']),
    sig(ContentKind::Aiff, b"FORM"),
    sig(ContentKind::IMelody, b"BEGIN:IMELODY"),
    Signature {
        kind: ContentKind::Mp4,
        magic: b"ftyp",
        adjust: -4,
    },
    sig(ContentKind::Gzip, &[0x1F, 0x8B]),
    sig(ContentKind::Zip, b"PK\x03\x04"),
    sig(ContentKind::Mp3, b"ID3"),
    sig(ContentKind::Mp3, &[0xFF, 0xFB]),
    sig(ContentKind::Mp3, &[0xFF, 0xF3]),
    sig(ContentKind::Mp3, &[0xFF, 0xF2]),
    sig(
        ContentKind::Wmv,
        &[0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11],
    ),
    sig(ContentKind::Xml, b"<?xml"),
    sig(ContentKind::Xml, b"<!DOCTYPE"),
    sig(ContentKind::Svg, b"<svg"),
    sig(ContentKind::Wmf, &[0xD7, 0xCD, 0xC6, 0x9A]),
    sig(ContentKind::PostScript, b"%!"),
    sig(ContentKind::Tiff, b"II*\x00"),
    sig(ContentKind::Tiff, b"MM\x00*"),
    sig(ContentKind::Bmp, b"BM"),
    sig(ContentKind::Midlet, b"MIDlet-"),
    sig(ContentKind::Cgm, b"BEGMF"),
    sig(ContentKind::Cgm, &[0x00, 0x3F]),
    sig(ContentKind::Cgm, &[0x30, 0x20]),
    sig(ContentKind::ProprietaryBitmap, b"KPBF"),
    sig(ContentKind::Wbmp, &[0x00, 0x00]),
];

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|w| w == needle)
}

/// Start of a JPEG given the first `FF D8` at `first`.
///
/// A second `FF D8 FF` shortly after the first marker is the real start.
fn jpeg_start(region: &[u8], first: usize) -> Option<usize> {
    let from = first + 2;
    let to = (from + JPEG_WINDOW).min(region.len());
    if from < to {
        if let Some(second) = find(&region[from..to], &[0xFF, 0xD8, 0xFF]) {
            return Some(from + second);
        }
    }
    (region.get(from) == Some(&0xFF)).then_some(first)
}

/// Find the format and start offset of the file inside `region`.
pub fn classify(region: &[u8]) -> Option<(ContentKind, usize)> {
    SIGNATURES.iter().find_map(|s| {
        let pos = find(region, s.magic)?;
        let start = if s.kind == ContentKind::Jpeg {
            jpeg_start(region, pos)?
        } else {
            pos.checked_add_signed(s.adjust)?
        };
        Some((s.kind, start))
    })
}

/// Cut the file out of a raw download reply.
///
/// Fails with [`Error::MissingTerminator`] when the reply has no
/// `NO CARRIER`, and with [`Error::UnknownContent`] when it has neither a
/// known signature nor a `CONNECT` marker.
pub fn extract(reply: &[u8]) -> Result<(ContentKind, &[u8])> {
    let carrier = find(reply, NO_CARRIER.as_bytes()).ok_or(Error::MissingTerminator)?;
    let end = if carrier >= 2 && &reply[carrier - 2..carrier] == b"\r\n" {
        carrier - 2
    } else {
        carrier
    };

    let connect = find(&reply[..end], CONNECT.as_bytes()).map(|p| {
        let after = p + CONNECT.len();
        if reply[after..end].starts_with(b"\r\n") {
            after + 2
        } else {
            after
        }
    });
    let region = &reply[connect.unwrap_or(0)..end];

    match classify(region) {
        Some((kind, start)) => {
            debug!("Detected {kind} at offset {start}");
            Ok((kind, &region[start..]))
        },
        None if connect.is_some() => {
            debug!("No signature matched, taking everything after {CONNECT}");
            Ok((ContentKind::Raw, region))
        },
        None => Err(Error::UnknownContent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(file: &[u8]) -> Vec<u8> {
        let mut reply = b"AT+KPSR=\"01\"\r\r\nCONNECT\r\n".to_vec();
        reply.extend_from_slice(file);
        reply.extend_from_slice(b"\r\nNO CARRIER\r\n");
        reply
    }

    fn samples() -> Vec<(ContentKind, Vec<u8>)> {
        let mut mp4 = vec![0x00, 0x00, 0x00, 0x18];
        mp4.extend_from_slice(b"ftypisom\x00\x00\x02\x00isomiso2");
        let mut wmv = vec![0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11];
        wmv.extend_from_slice(&[0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C]);
        vec![
            (
                ContentKind::Jpeg,
                vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0xFF, 0xD9],
            ),
            (ContentKind::Midi, b"MThd\x00\x00\x00\x06\x00\x00\x00\x01\x00\x60".to_vec()),
            (ContentKind::Amr, b"#!AMR\n\x3c\x91\x17".to_vec()),
            (ContentKind::Wav, b"RIFF\x24\x00\x00\x00WAVEfmt ".to_vec()),
            (ContentKind::Gif, b"GIF89a\x01\x00\x01\x00\x80;".to_vec()),
            (ContentKind::Png, b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR".to_vec()),
            (
                ContentKind::VCalendar,
                b"BEGIN:VCALENDAR\r\nVERSION:1.0\r\nEND:VCALENDAR".to_vec(),
            ),
            (
                ContentKind::VCard,
                b"BEGIN:VCARD\r\nVERSION:2.1\r\nN:Doe\r\nEND:VCARD".to_vec(),
            ),
            (ContentKind::Mng, b"\x8aMNG\r\n\x1a\n".to_vec()),
            (ContentKind::Aiff, b"FORM\x00\x00\x00\x04AIFF".to_vec()),
            (
                ContentKind::IMelody,
                b"BEGIN:IMELODY\r\nVERSION:1.2\r\nMELODY:c2d2e2\r\nEND:IMELODY".to_vec(),
            ),
            (ContentKind::Mp4, mp4),
            (ContentKind::Gzip, vec![0x1F, 0x8B, 0x08, 0x00, 0x12, 0x34]),
            (ContentKind::Zip, b"PK\x03\x04\x14\x00\x08\x00".to_vec()),
            (ContentKind::Mp3, b"ID3\x03\x00\x00\x00\x00\x0f\x76".to_vec()),
            (ContentKind::Mp3, vec![0xFF, 0xFB, 0x90, 0x64, 0x12]),
            (ContentKind::Mp3, vec![0xFF, 0xF3, 0x90, 0x64, 0x12]),
            (ContentKind::Mp3, vec![0xFF, 0xF2, 0x50, 0x44, 0x11]),
            (ContentKind::Wmv, wmv),
            (ContentKind::Xml, b"<?xml version=\"1.0\"?><a/>".to_vec()),
            (ContentKind::Xml, b"<!DOCTYPE html><html></html>".to_vec()),
            (ContentKind::Svg, b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>".to_vec()),
            (ContentKind::Wmf, vec![0xD7, 0xCD, 0xC6, 0x9A, 0x11, 0x22]),
            (ContentKind::PostScript, b"%!PS-Adobe-3.0\nshowpage\n".to_vec()),
            (ContentKind::Tiff, b"II*\x00\x08\x11\x11\x11".to_vec()),
            (ContentKind::Tiff, b"MM\x00*\x11\x11\x11\x08".to_vec()),
            (ContentKind::Bmp, b"BM\x3e\x11\x11\x11".to_vec()),
            (ContentKind::Midlet, b"MIDlet-Name: Game\nMIDlet-Vendor: Acme\n".to_vec()),
            (ContentKind::Cgm, b"BEGMF \"demo\";\nENDMF;".to_vec()),
            (ContentKind::Cgm, vec![0x00, 0x3F, 0x11, 0x22]),
            (ContentKind::Cgm, vec![0x30, 0x20, 0x41, 0x42]),
            (ContentKind::ProprietaryBitmap, b"KPBF\x01\x02\x03".to_vec()),
            (ContentKind::Wbmp, vec![0x00, 0x00, 0x10, 0x10, 0xAA, 0x55]),
        ]
    }

    #[test]
    fn test_every_family_extracts_exact_file() {
        for (kind, file) in samples() {
            let reply = wrap(&file);
            let (detected, extracted) = extract(&reply).unwrap();
            assert_eq!(detected, kind, "sample {file:02X?}");
            assert_eq!(extracted, file.as_slice(), "sample {kind}");
        }
    }

    #[test]
    fn test_jpeg_double_marker_starts_at_second() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE1, 0x00, 0x08, b'E', b'x', b'i', b'f', 0xFF, 0xD9];
        let mut blob = vec![0xFF, 0xD8, 0x00, 0x04];
        blob.extend_from_slice(&jpeg);
        let reply = wrap(&blob);
        let (kind, extracted) = extract(&reply).unwrap();
        assert_eq!(kind, ContentKind::Jpeg);
        assert_eq!(extracted, jpeg.as_slice());
    }

    #[test]
    fn test_signature_order_wins_over_position() {
        // A GIF that carries a MIDI tag later still matches MIDI first.
        let region = b"GIF89a....MThd";
        assert_eq!(classify(region), Some((ContentKind::Midi, 10)));
    }

    #[test]
    fn test_unknown_content_falls_back_to_connect() {
        let reply = wrap(b"\x01\x02\x03");
        let (kind, extracted) = extract(&reply).unwrap();
        assert_eq!(kind, ContentKind::Raw);
        assert_eq!(extracted, b"\x01\x02\x03");
    }

    #[test]
    fn test_missing_no_carrier() {
        let reply = b"\r\nCONNECT\r\nGIF89a";
        assert!(matches!(extract(reply), Err(Error::MissingTerminator)));
    }

    #[test]
    fn test_file_ends_at_first_no_carrier() {
        let reply = b"\r\nCONNECT\r\nGIF89a\x01\r\nNO CARRIER\r\ntrailing\r\nNO CARRIER\r\n";
        let (kind, extracted) = extract(reply).unwrap();
        assert_eq!(kind, ContentKind::Gif);
        assert_eq!(extracted, b"GIF89a\x01");
    }

    #[test]
    fn test_no_connect_no_signature() {
        let reply = b"\x01\x02\r\nNO CARRIER\r\n";
        assert!(matches!(extract(reply), Err(Error::UnknownContent)));
    }

    #[test]
    fn test_extensions() {
        assert_eq!(ContentKind::Jpeg.extension(), "jpg");
        assert_eq!(ContentKind::Midi.extension(), "mid");
        assert_eq!(ContentKind::Raw.extension(), "bin");
    }
}
