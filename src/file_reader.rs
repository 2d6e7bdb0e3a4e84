//! Input helpers with transparent gzip support
//!
//! Source range files for the builder may be plain text or gzip-compressed
//! (detected by a `.gz` extension), and mirrors may serve the database image
//! gzip-compressed (detected by the gzip magic bytes).
//!
//! # Example
//!
//! ```rust,no_run
//! use ipregion::file_reader;
//! use std::io::BufRead;
//!
//! let reader = file_reader::open("ip.merge.txt.gz")?;
//! for line in reader.lines() {
//!     println!("{}", line?);
//! }
//! # Ok::<(), std::io::Error>(())
//! ```

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, stdin, BufRead, BufReader, Read};
use std::path::Path;

/// Buffer size for file reading (128KB)
const BUFFER_SIZE: usize = 128 * 1024;

/// Leading bytes of every gzip stream
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Largest decompressed payload accepted from a mirror (1 GiB)
pub const MAX_DECOMPRESSED_LEN: u64 = 1 << 30;

/// Open a file with automatic gzip detection based on file extension
///
/// Files ending in `.gz` (case-insensitive) are decompressed. The path `-`
/// reads from stdin.
pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn BufRead + Send>> {
    let path = path.as_ref();

    if path.to_str() == Some("-") {
        return Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, stdin())));
    }

    let file = File::open(path)?;

    let is_gzip = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);

    if is_gzip {
        Ok(Box::new(BufReader::with_capacity(
            BUFFER_SIZE,
            GzDecoder::new(file),
        )))
    } else {
        Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, file)))
    }
}

/// Whether a payload starts with the gzip magic bytes
pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

/// Decompress a payload if it is gzip, otherwise return it unchanged.
///
/// Output is capped at [`MAX_DECOMPRESSED_LEN`].
pub fn decompress_if_gzip(bytes: Vec<u8>) -> io::Result<Vec<u8>> {
    decompress_if_gzip_limited(bytes, MAX_DECOMPRESSED_LEN)
}

/// Like [`decompress_if_gzip`] with an explicit output cap.
///
/// Fails with `InvalidData` when the stream inflates past `limit` bytes.
pub fn decompress_if_gzip_limited(bytes: Vec<u8>, limit: u64) -> io::Result<Vec<u8>> {
    if !is_gzip(&bytes) {
        return Ok(bytes);
    }
    let mut out = Vec::with_capacity(bytes.len().saturating_mul(4).min(limit as usize));
    GzDecoder::new(bytes.as_slice())
        .take(limit.saturating_add(1))
        .read_to_end(&mut out)?;
    if out.len() as u64 > limit {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("gzip payload inflates past {} bytes", limit),
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_plain_text_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "1.0.0.0|1.0.0.255|Australia|0|0|0|0").unwrap();
        writeln!(file, "1.0.1.0|1.0.3.255|China|0|Fujian|Fuzhou|0").unwrap();
        file.flush().unwrap();

        let reader = open(file.path()).unwrap();
        let lines: Vec<String> = reader.lines().collect::<io::Result<Vec<_>>>().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("1.0.1.0|"));
    }

    #[test]
    fn test_gzip_file_case_insensitive() {
        for suffix in [".gz", ".GZ"] {
            let mut file = NamedTempFile::with_suffix(suffix).unwrap();
            file.write_all(&gzip(b"compressed 1\ncompressed 2\n")).unwrap();
            file.flush().unwrap();

            let reader = open(file.path()).unwrap();
            let lines: Vec<String> = reader.lines().collect::<io::Result<Vec<_>>>().unwrap();
            assert_eq!(lines, vec!["compressed 1", "compressed 2"]);
        }
    }

    #[test]
    fn test_decompress_if_gzip() {
        let payload = b"not compressed".to_vec();
        assert_eq!(decompress_if_gzip(payload.clone()).unwrap(), payload);

        let packed = gzip(&payload);
        assert!(is_gzip(&packed));
        assert_eq!(decompress_if_gzip(packed).unwrap(), payload);
    }

    #[test]
    fn test_decompress_limit() {
        let payload = vec![0u8; 64 * 1024];
        let packed = gzip(&payload);
        // Highly compressible input still stops at the cap.
        let err = decompress_if_gzip_limited(packed.clone(), 1024).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        assert_eq!(
            decompress_if_gzip_limited(packed, payload.len() as u64).unwrap(),
            payload
        );
        // The cap only applies to gzip payloads.
        assert_eq!(decompress_if_gzip_limited(payload.clone(), 1).unwrap(), payload);
    }
}
