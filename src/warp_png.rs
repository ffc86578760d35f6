//! The 16-bit-per-channel PNG warp codec used by the `cam-png` dataset format.
//!
//! Ported from `original_source/warp_to_png.cc`/`warp_to_png.h`: a warp
//! field is stored as an RGB PNG with 16 bits per channel, red holding the
//! destination x coordinate and green the destination y coordinate (blue
//! unused), both scaled by `value = round((v + SHIFT) * MULT)` so that the
//! sentinel `(-1, -1)` round-trips through the same formula with no special
//! casing.
use std::io::Cursor;

use png::{BitDepth, ColorType, Decoder, Encoder};

use crate::dataset::WarpField;
use crate::error::DatasetError;

pub const SHIFT: f64 = 10.0;
pub const MULT: f64 = 64.0;

fn encode_sample(v: f32) -> u16 {
    ((v as f64 + SHIFT) * MULT + 0.5) as u16
}

fn decode_sample(v: u16) -> f32 {
    (v as f64 / MULT - SHIFT) as f32
}

/// Encode `field` as a 16-bit RGB PNG.
pub fn encode(field: &WarpField) -> Result<Vec<u8>, DatasetError> {
    let width = field.width as u32;
    let height = field.height as u32;

    let mut buf = Vec::new();
    {
        let mut encoder = Encoder::new(Cursor::new(&mut buf), width, height);
        encoder.set_color(ColorType::Rgb);
        encoder.set_depth(BitDepth::Sixteen);
        let mut writer = encoder
            .write_header()
            .map_err(|e| DatasetError::Png(e.to_string()))?;

        let mut data = Vec::with_capacity((width * height * 3) as usize * 2);
        for &(x, y) in &field.values {
            let r = encode_sample(x);
            let g = encode_sample(y);
            data.extend_from_slice(&r.to_be_bytes());
            data.extend_from_slice(&g.to_be_bytes());
            data.extend_from_slice(&0u16.to_be_bytes());
        }
        writer
            .write_image_data(&data)
            .map_err(|e| DatasetError::Png(e.to_string()))?;
    }
    Ok(buf)
}

/// Decode a 16-bit RGB PNG warp field.
pub fn decode(bytes: &[u8]) -> Result<WarpField, DatasetError> {
    let decoder = Decoder::new(Cursor::new(bytes));
    let mut reader = decoder
        .read_info()
        .map_err(|e| DatasetError::Png(e.to_string()))?;
    let info = reader.info();
    if info.color_type != ColorType::Rgb || info.bit_depth != BitDepth::Sixteen {
        return Err(DatasetError::Png(format!(
            "expected 16-bit RGB PNG, found {:?}/{:?}",
            info.color_type, info.bit_depth
        )));
    }
    let width = info.width as i32;
    let height = info.height as i32;

    let mut data = vec![0u8; reader.output_buffer_size()];
    reader
        .next_frame(&mut data)
        .map_err(|e| DatasetError::Png(e.to_string()))?;

    let mut values = Vec::with_capacity((width as usize) * (height as usize));
    for chunk in data.chunks_exact(6) {
        let r = u16::from_be_bytes([chunk[0], chunk[1]]);
        let g = u16::from_be_bytes([chunk[2], chunk[3]]);
        values.push((decode_sample(r), decode_sample(g)));
    }

    Ok(WarpField { width, height, values })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_ordinary_values() {
        let mut field = WarpField::filled(4, 3, (0.0, 0.0));
        field.set(1, 1, (12.5, 300.25));
        field.set(2, 0, (-2.0, 400.0));

        let bytes = encode(&field).unwrap();
        let back = decode(&bytes).unwrap();

        assert_eq!(back.width, field.width);
        assert_eq!(back.height, field.height);
        for y in 0..3 {
            for x in 0..4 {
                let (ex, ey) = field.get(x, y);
                let (ax, ay) = back.get(x, y);
                assert!((ex - ax).abs() <= (1.0 / MULT as f32), "x mismatch at ({x},{y})");
                assert!((ey - ay).abs() <= (1.0 / MULT as f32), "y mismatch at ({x},{y})");
            }
        }
    }

    #[test]
    fn sentinel_round_trips_through_the_same_formula() {
        let field = WarpField::filled(2, 2, (-1.0, -1.0));
        let bytes = encode(&field).unwrap();
        let back = decode(&bytes).unwrap();
        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(back.get(x, y), (-1.0, -1.0));
            }
        }
    }

    #[test]
    fn rejects_non_rgb16_png() {
        // An 8-bit grayscale PNG should be rejected rather than
        // misinterpreted.
        let mut buf = Vec::new();
        {
            let mut encoder = Encoder::new(Cursor::new(&mut buf), 2, 2);
            encoder.set_color(ColorType::Grayscale);
            encoder.set_depth(BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[0, 0, 0, 0]).unwrap();
        }
        assert!(decode(&buf).is_err());
    }
}
