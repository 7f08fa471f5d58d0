//! Reproducible gzip framing.
//!
//! Stock gzip encoders embed an mtime, an OS byte, and sometimes a
//! filename, which breaks byte-for-byte reproducibility across machines.
//! The writer here produces raw deflate output and frames the gzip
//! envelope by hand with every variable byte zeroed.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};

/// Fixed gzip header: magic, deflate method, no flags, zero mtime,
/// zero extra flags, zero OS byte.
const GZIP_HEADER: [u8; 10] = [0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

/// Compress a buffer into a canonical gzip stream.
///
/// Repeated calls with equal input return identical bytes. The stream is
/// raw deflate at the default level, preceded by [`GZIP_HEADER`] and
/// followed by the little-endian CRC-32 and uncompressed size.
pub fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    let deflated = encoder.finish()?;

    let mut crc = Crc::new();
    crc.update(data);

    let mut out = Vec::with_capacity(GZIP_HEADER.len() + deflated.len() + 8);
    out.extend_from_slice(&GZIP_HEADER);
    out.extend_from_slice(&deflated);
    out.extend_from_slice(&crc.sum().to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    Ok(out)
}

/// Decompress a gzip stream.
///
/// Accepts any conformant gzip input, not only the canonical framing
/// produced by [`gzip`].
pub fn gunzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
