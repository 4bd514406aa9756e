//! Payload transforms applied between a source file and its stored object:
//! zlib compression and length-hiding padding.

use crate::{Error, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use rand::RngCore;
use std::io::{Read, Write};
use std::path::Path;

pub const PAD_BLOCK: usize = 256;
pub const LENGTH_PREFIX: usize = 4;
pub const COMPRESSION_LEVEL: u32 = 6;

/// Already-dense formats that are stored without compression.
pub const NON_COMPRESSIBLE: &[&str] = &[
    // archives
    "zip", "7z", "rar", "gz", "tar",
    // video
    "mp4", "mkv", "avi", "mov",
    // audio
    "mp3", "wav", "flac",
    // images
    "jpg", "jpeg", "png",
    // documents
    "docx", "xlsx", "pptx", "pdf",
];

pub fn should_compress(path: &Path, compression_enabled: bool) -> bool {
    if !compression_enabled {
        return false;
    }
    !path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| NON_COMPRESSIBLE.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Whether an object written with these flags carries padding.
pub fn is_padded(compressed: bool, encrypted: bool) -> bool {
    compressed || encrypted
}

pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(COMPRESSION_LEVEL));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

pub fn decompress(data: &[u8], label: &str) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| Error::Decompression {
            path: label.to_string(),
            reason: e.to_string(),
        })?;
    Ok(out)
}

/// `len (u32 BE) || data || random fill` up to the next 256-byte boundary.
pub fn pad(data: &[u8]) -> Result<Vec<u8>> {
    let len = u32::try_from(data.len())
        .map_err(|_| Error::Padding(format!("payload of {} bytes is too large", data.len())))?;
    let fill = PAD_BLOCK - (data.len() + LENGTH_PREFIX) % PAD_BLOCK;

    let mut out = Vec::with_capacity(LENGTH_PREFIX + data.len() + fill);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(data);

    let mut noise = vec![0u8; fill];
    rand::thread_rng().fill_bytes(&mut noise);
    out.extend_from_slice(&noise);
    Ok(out)
}

pub fn unpad(padded: &[u8]) -> Result<Vec<u8>> {
    let Some((prefix, rest)) = padded.split_first_chunk::<LENGTH_PREFIX>() else {
        return Err(Error::Padding(format!("{} bytes is shorter than the length prefix", padded.len())));
    };

    let len = u32::from_be_bytes(*prefix) as usize;
    rest.get(..len).map(<[u8]>::to_vec).ok_or_else(|| {
        Error::Padding(format!("declared length {} exceeds {} payload bytes", len, rest.len()))
    })
}
