use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use trellis_core::TrellisError;

/// Gzip-compress a serialized file.
pub fn compress(content: &[u8]) -> Result<Vec<u8>, TrellisError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(content)
        .and_then(|_| encoder.finish())
        .map_err(|e| TrellisError::CompressionFailure(e.to_string()))
}

/// Gzip-decompress with a hard output cap.
///
/// The cap defends against decompression bombs: a fetched file already
/// passed the compressed size check, but its inflated form must also stay
/// within `size cap × estimated_decompression_multiplier`.
pub fn decompress(content: &[u8], max_decompressed_size: u64) -> Result<Vec<u8>, TrellisError> {
    let mut decoder = GzDecoder::new(content).take(max_decompressed_size + 1);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| TrellisError::DecompressionFailure(e.to_string()))?;
    if decompressed.len() as u64 > max_decompressed_size {
        return Err(TrellisError::CompressorMaxAllowedDecompressedDataSizeExceeded {
            max: max_decompressed_size,
        });
    }
    Ok(decompressed)
}
