//! Replacement image payloads: data URI decoding and image XObjects.

use crate::error::AnnotateError;
use base64::Engine;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MediaType {
    Png,
    Jpeg,
}

/// Split a `data:image/...;base64,` URI into its media type and bytes.
pub(crate) fn parse_data_uri(uri: &str) -> Result<(MediaType, Vec<u8>), AnnotateError> {
    let rest = uri
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| AnnotateError::ImageError("Not a data URI".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| AnnotateError::ImageError("Data URI has no payload".to_string()))?;

    let mut parts = header.split(';');
    let media = match parts.next().map(str::to_ascii_lowercase).as_deref() {
        Some("image/png") => MediaType::Png,
        Some("image/jpeg") | Some("image/jpg") => MediaType::Jpeg,
        Some(other) => {
            return Err(AnnotateError::ImageError(format!(
                "Unsupported image type: {}",
                other
            )))
        }
        None => return Err(AnnotateError::ImageError("Missing media type".to_string())),
    };
    if !parts.any(|p| p.eq_ignore_ascii_case("base64")) {
        return Err(AnnotateError::ImageError(
            "Only base64 data URIs are supported".to_string(),
        ));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| AnnotateError::ImageError(format!("Invalid base64 payload: {}", e)))?;
    Ok((media, bytes))
}

/// Decode a payload and add it to the document as an image XObject.
pub(crate) fn embed_image(
    doc: &mut Document,
    media: MediaType,
    bytes: &[u8],
) -> Result<ObjectId, AnnotateError> {
    match media {
        MediaType::Png => embed_png(doc, bytes),
        MediaType::Jpeg => embed_jpeg(doc, bytes),
    }
}

fn embed_jpeg(doc: &mut Document, bytes: &[u8]) -> Result<ObjectId, AnnotateError> {
    let header = parse_jpeg_header(bytes)?;
    let color_space = match header.components {
        1 => "DeviceGray",
        3 => "DeviceRGB",
        4 => "DeviceCMYK",
        n => {
            return Err(AnnotateError::ImageError(format!(
                "Unsupported JPEG component count: {}",
                n
            )))
        }
    };
    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => header.width as i64,
        "Height" => header.height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8,
        "Filter" => "DCTDecode",
    };
    Ok(doc.add_object(Stream::new(dict, bytes.to_vec())))
}

fn embed_png(doc: &mut Document, bytes: &[u8]) -> Result<ObjectId, AnnotateError> {
    let mut decoder = png::Decoder::new(bytes);
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder
        .read_info()
        .map_err(|e| AnnotateError::ImageError(format!("Invalid PNG: {}", e)))?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let frame = reader
        .next_frame(&mut buf)
        .map_err(|e| AnnotateError::ImageError(format!("Invalid PNG: {}", e)))?;
    buf.truncate(frame.buffer_size());

    let (channels, has_alpha, color_space) = match frame.color_type {
        png::ColorType::Grayscale => (1, false, "DeviceGray"),
        png::ColorType::GrayscaleAlpha => (2, true, "DeviceGray"),
        png::ColorType::Rgb => (3, false, "DeviceRGB"),
        png::ColorType::Rgba => (4, true, "DeviceRGB"),
        png::ColorType::Indexed => {
            return Err(AnnotateError::ImageError(
                "Palette PNG was not expanded".to_string(),
            ))
        }
    };

    let (color, alpha) = if has_alpha {
        split_alpha(&buf, channels)
    } else {
        (buf, Vec::new())
    };

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => frame.width as i64,
        "Height" => frame.height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };

    if has_alpha {
        let smask = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => frame.width as i64,
            "Height" => frame.height as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        };
        let smask_id = doc.add_object(Stream::new(smask, deflate(&alpha)?));
        dict.set("SMask", Object::Reference(smask_id));
    }

    Ok(doc.add_object(Stream::new(dict, deflate(&color)?)))
}

/// Separate interleaved samples into color bytes and an alpha plane.
fn split_alpha(samples: &[u8], channels: usize) -> (Vec<u8>, Vec<u8>) {
    let pixels = samples.len() / channels;
    let mut color = Vec::with_capacity(pixels * (channels - 1));
    let mut alpha = Vec::with_capacity(pixels);
    for px in samples.chunks_exact(channels) {
        color.extend_from_slice(&px[..channels - 1]);
        alpha.push(px[channels - 1]);
    }
    (color, alpha)
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, AnnotateError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| AnnotateError::ImageError(format!("Compression failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| AnnotateError::ImageError(format!("Compression failed: {}", e)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct JpegHeader {
    pub width: u32,
    pub height: u32,
    pub components: u8,
}

/// Walk JPEG markers up to the first start-of-frame segment.
pub(crate) fn parse_jpeg_header(data: &[u8]) -> Result<JpegHeader, AnnotateError> {
    let invalid = |msg: &str| AnnotateError::ImageError(msg.to_string());
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return Err(invalid("Not a JPEG file"));
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            return Err(invalid("Invalid JPEG marker"));
        }
        let marker = data[pos + 1];
        pos += 2;

        match marker {
            0xFF => pos -= 1,
            0xD8 | 0x01 | 0xD0..=0xD7 => {}
            0xD9 | 0xDA => break,
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                // length(2) precision(1) height(2) width(2) components(1)
                if pos + 8 > data.len() {
                    return Err(invalid("Truncated JPEG frame header"));
                }
                let height = u16::from_be_bytes([data[pos + 3], data[pos + 4]]) as u32;
                let width = u16::from_be_bytes([data[pos + 5], data[pos + 6]]) as u32;
                let components = data[pos + 7];
                if width == 0 || height == 0 {
                    return Err(invalid("JPEG has zero dimensions"));
                }
                return Ok(JpegHeader {
                    width,
                    height,
                    components,
                });
            }
            _ => {
                if pos + 2 > data.len() {
                    return Err(invalid("Truncated JPEG segment"));
                }
                let length = u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;
                pos += length;
            }
        }
    }
    Err(invalid("JPEG has no frame header"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 2x1 RGBA PNG: one opaque red pixel, one half-transparent blue pixel.
    pub(crate) fn rgba_png() -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, 2, 1);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer
                .write_image_data(&[255, 0, 0, 255, 0, 0, 255, 128])
                .unwrap();
        }
        out
    }

    /// Minimal marker sequence with a baseline frame header; no scan data.
    pub(crate) fn jpeg_header_bytes(width: u16, height: u16, components: u8) -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8];
        // APP0 segment, length 16
        data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
        data.extend_from_slice(b"JFIF\0");
        data.extend_from_slice(&[1, 1, 0, 0, 1, 0, 1, 0, 0]);
        // SOF0
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&width.to_be_bytes());
        data.push(components);
        data.extend_from_slice(&[1, 0x11, 0, 2, 0x11, 1, 3, 0x11, 1]);
        data.extend_from_slice(&[0xFF, 0xD9]);
        data
    }

    fn data_uri(media: &str, bytes: &[u8]) -> String {
        format!(
            "data:{};base64,{}",
            media,
            base64::engine::general_purpose::STANDARD.encode(bytes)
        )
    }

    #[test]
    fn test_parse_data_uri_media_types() {
        let (media, bytes) = parse_data_uri(&data_uri("image/png", b"abc")).unwrap();
        assert_eq!(media, MediaType::Png);
        assert_eq!(bytes, b"abc");

        let (media, _) = parse_data_uri(&data_uri("image/jpeg", b"abc")).unwrap();
        assert_eq!(media, MediaType::Jpeg);
    }

    #[test]
    fn test_parse_data_uri_rejects() {
        assert!(parse_data_uri("https://example.com/a.png").is_err());
        assert!(parse_data_uri(&data_uri("image/gif", b"GIF89a")).is_err());
        assert!(parse_data_uri("data:image/png,rawbytes").is_err());
        assert!(parse_data_uri("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn test_jpeg_header() {
        let header = parse_jpeg_header(&jpeg_header_bytes(640, 480, 3)).unwrap();
        assert_eq!(
            header,
            JpegHeader {
                width: 640,
                height: 480,
                components: 3
            }
        );
        assert!(parse_jpeg_header(b"\x89PNG\r\n").is_err());
        assert!(parse_jpeg_header(&[0xFF, 0xD8, 0xFF, 0xD9]).is_err());
    }

    #[test]
    fn test_png_with_alpha_gets_smask() {
        let mut doc = Document::with_version("1.7");
        let id = embed_image(&mut doc, MediaType::Png, &rgba_png()).unwrap();

        let stream = doc.get_object(id).unwrap().as_stream().unwrap();
        assert_eq!(stream.dict.get(b"Width").unwrap().as_i64().unwrap(), 2);
        assert_eq!(
            stream.dict.get(b"ColorSpace").unwrap().as_name().unwrap(),
            b"DeviceRGB"
        );
        let smask_id = stream.dict.get(b"SMask").unwrap().as_reference().unwrap();
        assert!(doc.get_object(smask_id).is_ok());
    }

    #[test]
    fn test_corrupt_png_is_image_error() {
        let mut doc = Document::with_version("1.7");
        let err = embed_image(&mut doc, MediaType::Png, b"\x89PNG\r\n\x1a\nnope").unwrap_err();
        assert!(matches!(err, AnnotateError::ImageError(_)));
    }

    #[test]
    fn test_split_alpha() {
        let (color, alpha) = split_alpha(&[1, 2, 3, 4, 5, 6, 7, 8], 4);
        assert_eq!(color, vec![1, 2, 3, 5, 6, 7]);
        assert_eq!(alpha, vec![4, 8]);
    }
}
