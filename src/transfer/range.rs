//! Range Extractor
//!
//! Byte-range reads for the download side: file metadata, exact reads at an
//! offset (chunk-by-index downloads) and buffered range streaming into an
//! arbitrary sink (resumable range downloads).

use std::io::SeekFrom;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};

use super::types::{FileInfo, TransferError};

// ============================================================================
// Byte Range
// ============================================================================

/// An inclusive `[start, end]` byte span of a file.
///
/// Only constructed through [`ByteRange::parse`], which validates the header
/// shape and clamps `end` to the last byte of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes the range covers; never zero, construction keeps
    /// `start <= end`
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Parse a range header value against a file of `file_size` bytes.
    ///
    /// Accepted shapes: `bytes=start-end`, `start-end` and open-ended
    /// `start-`. An `end` past the last byte is silently clamped to
    /// `file_size - 1`. Multiple ranges, suffix ranges (`-N`) and anything
    /// unparseable are rejected as malformed; a `start` at or past the end
    /// of the file is not satisfiable.
    pub fn parse(header: &str, file_size: u64) -> Result<Self, TransferError> {
        let raw = header.trim();
        let raw = raw.strip_prefix("bytes=").unwrap_or(raw);

        if raw.contains(',') {
            return Err(TransferError::MalformedRange(format!(
                "multiple ranges are not supported: {header}"
            )));
        }

        let (start, end) = raw
            .split_once('-')
            .ok_or_else(|| TransferError::MalformedRange(format!("expected start-end: {header}")))?;

        let start: u64 = start
            .trim()
            .parse()
            .map_err(|_| TransferError::MalformedRange(format!("invalid range start: {header}")))?;

        if start >= file_size {
            return Err(TransferError::RangeNotSatisfiable {
                start,
                size: file_size,
            });
        }

        let end: u64 = match end.trim() {
            // open-ended range: everything from start to the last byte
            "" => file_size - 1,
            end => end.parse().map_err(|_| {
                TransferError::MalformedRange(format!("invalid range end: {header}"))
            })?,
        };

        if end < start {
            return Err(TransferError::MalformedRange(format!(
                "range end precedes start: {header}"
            )));
        }

        Ok(Self {
            start,
            end: end.min(file_size - 1),
        })
    }
}

// ============================================================================
// File Reads
// ============================================================================

/// Metadata read: whether the file exists and how large it is.
pub async fn file_info(path: &Path) -> FileInfo {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => FileInfo {
            exists: true,
            file_length: meta.len(),
        },
        _ => FileInfo {
            exists: false,
            file_length: 0,
        },
    }
}

/// Read up to `length` bytes at `offset`.
///
/// A read past the end of the file returns the tail (possibly empty), not an
/// error: the final chunk of a file is expected to be short.
pub async fn read_chunk_at(
    path: &Path,
    offset: u64,
    length: u64,
) -> Result<Vec<u8>, TransferError> {
    let mut file = open(path).await?;

    let size = file
        .metadata()
        .await
        .map_err(|e| TransferError::io(format!("failed to stat {}", path.display()), e))?
        .len();

    if offset >= size {
        return Ok(Vec::new());
    }

    file.seek(SeekFrom::Start(offset))
        .await
        .map_err(|e| TransferError::io(format!("failed to seek {}", path.display()), e))?;

    let mut buf = vec![0u8; length.min(size - offset) as usize];
    file.read_exact(&mut buf)
        .await
        .map_err(|e| TransferError::io(format!("failed to read {}", path.display()), e))?;

    Ok(buf)
}

/// Copy exactly `range.len()` bytes of `path` into `sink`, through a fixed
/// `buffer_size` intermediate buffer.
///
/// The caller passes a range already clamped to the file size; hitting EOF
/// before the range is exhausted therefore means the file shrank underneath
/// us and is reported as an I/O failure. Returns the number of bytes written.
pub async fn stream_range<W>(
    path: &Path,
    range: ByteRange,
    buffer_size: usize,
    sink: &mut W,
) -> Result<u64, TransferError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut file = open(path).await?;

    file.seek(SeekFrom::Start(range.start))
        .await
        .map_err(|e| TransferError::io(format!("failed to seek {}", path.display()), e))?;

    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut remaining = range.len();
    let mut written = 0u64;

    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let got = file
            .read(&mut buf[..want])
            .await
            .map_err(|e| TransferError::io(format!("failed to read {}", path.display()), e))?;

        if got == 0 {
            return Err(TransferError::io(
                format!("{} truncated mid-range", path.display()),
                std::io::Error::from(std::io::ErrorKind::UnexpectedEof),
            ));
        }

        sink.write_all(&buf[..got])
            .await
            .map_err(|e| TransferError::io("failed to write range to sink", e))?;

        written += got as u64;
        remaining -= got as u64;
    }

    sink.flush()
        .await
        .map_err(|e| TransferError::io("failed to flush range sink", e))?;

    Ok(written)
}

async fn open(path: &Path) -> Result<File, TransferError> {
    match File::open(path).await {
        Ok(file) => Ok(file),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(TransferError::NotFound(path.display().to_string()))
        }
        Err(e) => Err(TransferError::io(
            format!("failed to open {}", path.display()),
            e,
        )),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn sample_file(len: usize) -> (TempDir, std::path::PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("x.bin");
        let bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        tokio::fs::write(&path, &bytes).await.unwrap();
        (temp_dir, path)
    }

    #[test]
    fn test_parse_accepted_shapes() {
        assert_eq!(
            ByteRange::parse("bytes=0-99", 300).unwrap(),
            ByteRange { start: 0, end: 99 }
        );
        assert_eq!(
            ByteRange::parse("100-199", 300).unwrap(),
            ByteRange { start: 100, end: 199 }
        );
        // open-ended: everything from start
        assert_eq!(
            ByteRange::parse("100-", 300).unwrap(),
            ByteRange { start: 100, end: 299 }
        );
        // single byte
        assert_eq!(
            ByteRange::parse("bytes=0-0", 300).unwrap(),
            ByteRange { start: 0, end: 0 }
        );
    }

    #[test]
    fn test_parse_clamps_end_to_file_size() {
        let range = ByteRange::parse("bytes=250-1000", 300).unwrap();
        assert_eq!(range, ByteRange { start: 250, end: 299 });
        assert_eq!(range.len(), 50);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for header in ["", "abc", "bytes=", "-500", "10-5", "1-2,4-5", "bytes=a-b"] {
            let result = ByteRange::parse(header, 300);
            assert!(
                matches!(result, Err(TransferError::MalformedRange(_))),
                "expected malformed for {header:?}, got {result:?}"
            );
        }
    }

    #[test]
    fn test_parse_start_past_eof_not_satisfiable() {
        assert!(matches!(
            ByteRange::parse("bytes=300-400", 300),
            Err(TransferError::RangeNotSatisfiable { start: 300, size: 300 })
        ));
        assert!(matches!(
            ByteRange::parse("0-", 0),
            Err(TransferError::RangeNotSatisfiable { .. })
        ));
    }

    #[tokio::test]
    async fn test_file_info() {
        let (temp_dir, path) = sample_file(300).await;

        let info = file_info(&path).await;
        assert!(info.exists);
        assert_eq!(info.file_length, 300);

        let missing = file_info(&temp_dir.path().join("missing")).await;
        assert!(!missing.exists);
        assert_eq!(missing.file_length, 0);
    }

    #[tokio::test]
    async fn test_read_chunk_at_exact_and_tail() {
        let (_guard, path) = sample_file(300).await;
        let all = tokio::fs::read(&path).await.unwrap();

        // full middle chunk
        let chunk = read_chunk_at(&path, 100, 100).await.unwrap();
        assert_eq!(chunk, &all[100..200]);

        // short final chunk
        let tail = read_chunk_at(&path, 250, 100).await.unwrap();
        assert_eq!(tail, &all[250..]);

        // offset at EOF reads nothing
        let empty = read_chunk_at(&path, 300, 100).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_read_chunk_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = read_chunk_at(&temp_dir.path().join("missing"), 0, 10).await;
        assert!(matches!(result, Err(TransferError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_stream_range_exact_length() {
        let (_guard, path) = sample_file(300).await;
        let all = tokio::fs::read(&path).await.unwrap();

        // range smaller than, equal to and larger than the copy buffer
        for buffer_size in [7usize, 50, 4096] {
            let range = ByteRange::parse("bytes=250-1000", 300).unwrap();
            let mut sink = Vec::new();
            let written = stream_range(&path, range, buffer_size, &mut sink)
                .await
                .unwrap();

            assert_eq!(written, 50, "buffer_size={buffer_size}");
            assert_eq!(sink, &all[250..300], "buffer_size={buffer_size}");
        }
    }

    #[tokio::test]
    async fn test_stream_full_file() {
        let (_guard, path) = sample_file(300).await;
        let all = tokio::fs::read(&path).await.unwrap();

        let range = ByteRange::parse("0-", 300).unwrap();
        let mut sink = Vec::new();
        stream_range(&path, range, 64, &mut sink).await.unwrap();

        assert_eq!(sink, all);
    }
}
