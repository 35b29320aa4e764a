//! Minimal PNG support: solid placeholder encoding and structural decoding.
//!
//! Only what the pipeline needs. Encoding writes 8-bit RGBA; decoding
//! checks the signature, chunk CRCs and the inflated image data size so a
//! truncated or mislabelled file is rejected.

use flate2::write::ZlibEncoder;
use flate2::read::ZlibDecoder;
use flate2::{Compression, Crc};
use std::io::{Read, Write};

use super::color::Rgb;

const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: u8,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PngError {
    #[error("missing PNG signature")]
    Signature,
    #[error("truncated chunk at byte {0}")]
    Truncated(usize),
    #[error("CRC mismatch in {0} chunk")]
    Crc(String),
    #[error("first chunk must be IHDR")]
    MissingHeader,
    #[error("no image data")]
    MissingData,
    #[error("image data is corrupt: {0}")]
    Corrupt(String),
    #[error("zero-sized image")]
    Empty,
}

/// Encode a placeholder: `fill` background with a diagonal cross in `mark`
pub fn encode_placeholder(width: u32, height: u32, fill: Rgb, mark: Rgb) -> Vec<u8> {
    let mut out = Vec::with_capacity(1024);
    out.extend_from_slice(&SIGNATURE);

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.extend_from_slice(&[8, 6, 0, 0, 0]);
    write_chunk(&mut out, b"IHDR", &ihdr);

    let (w, h) = (width as u64, height as u64);
    let band = (w.max(h) / 40).max(1);
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
    let mut row = Vec::with_capacity(1 + width as usize * 4);
    for y in 0..h {
        row.clear();
        row.push(0);
        for x in 0..w {
            // distance from each diagonal, scaled by the longer side
            let d1 = (x * h).abs_diff(y * w);
            let d2 = (x * h).abs_diff((h - 1 - y) * w);
            let on_cross = d1.min(d2) < band * w.max(h);
            let c = if on_cross { mark } else { fill };
            row.extend_from_slice(&[c.r, c.g, c.b, 0xFF]);
        }
        // Writing into a Vec cannot fail
        let _ = encoder.write_all(&row);
    }
    let data = encoder.finish().unwrap_or_default();
    write_chunk(&mut out, b"IDAT", &data);
    write_chunk(&mut out, b"IEND", &[]);
    out
}

fn write_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    let mut crc = Crc::new();
    crc.update(kind);
    crc.update(data);
    out.extend_from_slice(&crc.sum().to_be_bytes());
}

/// Decode enough of a PNG to trust its dimensions
pub fn decode_info(bytes: &[u8]) -> Result<ImageInfo, PngError> {
    if bytes.len() < SIGNATURE.len() || bytes[..8] != SIGNATURE {
        return Err(PngError::Signature);
    }

    let mut pos = 8;
    let mut info: Option<ImageInfo> = None;
    let mut idat = Vec::new();
    let mut saw_end = false;

    while pos < bytes.len() {
        if pos + 8 > bytes.len() {
            return Err(PngError::Truncated(pos));
        }
        let len = u32::from_be_bytes([bytes[pos], bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]])
            as usize;
        let kind = &bytes[pos + 4..pos + 8];
        let data_start = pos + 8;
        let data_end = data_start
            .checked_add(len)
            .ok_or(PngError::Truncated(pos))?;
        if data_end + 4 > bytes.len() {
            return Err(PngError::Truncated(pos));
        }
        let data = &bytes[data_start..data_end];
        let stored = u32::from_be_bytes([
            bytes[data_end],
            bytes[data_end + 1],
            bytes[data_end + 2],
            bytes[data_end + 3],
        ]);
        let mut crc = Crc::new();
        crc.update(kind);
        crc.update(data);
        if crc.sum() != stored {
            return Err(PngError::Crc(String::from_utf8_lossy(kind).into_owned()));
        }

        match kind {
            b"IHDR" => {
                if data.len() != 13 {
                    return Err(PngError::MissingHeader);
                }
                info = Some(ImageInfo {
                    width: u32::from_be_bytes([data[0], data[1], data[2], data[3]]),
                    height: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
                    bit_depth: data[8],
                    color_type: data[9],
                });
            }
            _ if info.is_none() => return Err(PngError::MissingHeader),
            b"IDAT" => idat.extend_from_slice(data),
            b"IEND" => {
                saw_end = true;
                break;
            }
            _ => {}
        }
        pos = data_end + 4;
    }

    let info = info.ok_or(PngError::MissingHeader)?;
    if info.width == 0 || info.height == 0 {
        return Err(PngError::Empty);
    }
    if idat.is_empty() {
        return Err(PngError::MissingData);
    }
    if !saw_end {
        return Err(PngError::Truncated(bytes.len()));
    }

    let mut inflated = Vec::new();
    ZlibDecoder::new(idat.as_slice())
        .read_to_end(&mut inflated)
        .map_err(|e| PngError::Corrupt(e.to_string()))?;

    if let Some(channels) = channels(info.color_type) {
        if info.bit_depth == 8 {
            let expected =
                info.height as usize * (1 + info.width as usize * channels as usize);
            if inflated.len() != expected {
                return Err(PngError::Corrupt(format!(
                    "expected {} bytes of scanlines, found {}",
                    expected,
                    inflated.len()
                )));
            }
        }
    }

    Ok(info)
}

fn channels(color_type: u8) -> Option<u8> {
    match color_type {
        0 => Some(1),
        2 => Some(3),
        4 => Some(2),
        6 => Some(4),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_decodes_at_requested_size() {
        let png = encode_placeholder(64, 48, Rgb::new(20, 30, 60), Rgb::new(255, 255, 255));
        let info = decode_info(&png).unwrap();
        assert_eq!((info.width, info.height), (64, 48));
        assert_eq!(info.color_type, 6);
        assert_eq!(info.bit_depth, 8);
    }

    #[test]
    fn test_truncated_file_rejected() {
        let png = encode_placeholder(16, 16, Rgb::new(0, 0, 0), Rgb::new(255, 0, 0));
        let cut = &png[..png.len() - 20];
        assert!(decode_info(cut).is_err());
    }

    #[test]
    fn test_corrupted_byte_fails_crc() {
        let mut png = encode_placeholder(16, 16, Rgb::new(0, 0, 0), Rgb::new(255, 0, 0));
        png[20] ^= 0xFF;
        assert!(matches!(decode_info(&png), Err(PngError::Crc(_))));
    }

    #[test]
    fn test_not_a_png() {
        assert_eq!(decode_info(b"GIF89a...."), Err(PngError::Signature));
        assert_eq!(decode_info(&[]), Err(PngError::Signature));
    }
}
