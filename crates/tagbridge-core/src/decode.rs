//! Container sniffing and line decoding for downloaded exports.
//!
//! The annotation tool may hand back plain JSONL, gzip, or a zip archive
//! holding a single JSONL file. The container is detected from magic bytes
//! only; file names and content types are never consulted.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read, Seek};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use thiserror::Error;
use tracing::debug;
use zip::ZipArchive;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
/// Upper bound on the buffer reserved up front from a zip entry's declared size.
const ZIP_PREALLOC_LIMIT: u64 = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("I/O error reading export: {0}")]
    Io(#[from] io::Error),

    #[error("zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Outer encoding wrapping the line-delimited export content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Gzip,
    Zip,
    Plain,
}

impl ContainerFormat {
    /// Classify a file from its leading bytes.
    pub fn sniff(head: &[u8]) -> Self {
        if head.starts_with(GZIP_MAGIC) {
            Self::Gzip
        } else if head.starts_with(ZIP_MAGIC) {
            Self::Zip
        } else {
            Self::Plain
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Zip => "zip",
            Self::Plain => "plain",
        }
    }
}

/// Lines of an export file, decoded as UTF-8 with invalid sequences replaced.
///
/// Lines end at `\n`, `\r\n`, or a lone `\r`; terminators are stripped. The
/// underlying file is closed when the iterator is dropped.
pub struct ExportLines {
    format: ContainerFormat,
    reader: Box<dyn BufRead>,
    buf: Vec<u8>,
}

impl ExportLines {
    pub fn format(&self) -> ContainerFormat {
        self.format
    }
}

impl Iterator for ExportLines {
    type Item = Result<String, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match read_line(self.reader.as_mut(), &mut self.buf) {
            Ok(false) => None,
            Ok(true) => Some(Ok(String::from_utf8_lossy(&self.buf).into_owned())),
            Err(e) => Some(Err(e.into())),
        }
    }
}

/// Append one line to `buf`, terminator excluded. Returns `false` at end of input.
fn read_line(reader: &mut dyn BufRead, buf: &mut Vec<u8>) -> io::Result<bool> {
    let mut read_any = false;
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            return Ok(read_any);
        }
        read_any = true;
        match available.iter().position(|&b| b == b'\n' || b == b'\r') {
            Some(end) => {
                let carriage_return = available[end] == b'\r';
                buf.extend_from_slice(&available[..end]);
                reader.consume(end + 1);
                // \r\n is one terminator, even across a buffer boundary.
                if carriage_return && reader.fill_buf()?.first() == Some(&b'\n') {
                    reader.consume(1);
                }
                return Ok(true);
            }
            None => {
                let len = available.len();
                buf.extend_from_slice(available);
                reader.consume(len);
            }
        }
    }
}

/// Open an export file of unknown container format.
///
/// A zip archive with no file entries yields no lines.
pub fn open_export(path: &Path) -> Result<ExportLines, DecodeError> {
    let mut file = File::open(path)?;
    let mut head = Vec::with_capacity(ZIP_MAGIC.len());
    (&mut file).take(ZIP_MAGIC.len() as u64).read_to_end(&mut head)?;
    file.rewind()?;

    let format = ContainerFormat::sniff(&head);
    debug!(path = %path.display(), format = format.as_str(), "opening export");

    let reader: Box<dyn BufRead> = match format {
        ContainerFormat::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(file))),
        ContainerFormat::Zip => first_zip_entry(file)?,
        ContainerFormat::Plain => Box::new(BufReader::new(file)),
    };

    Ok(ExportLines {
        format,
        reader,
        buf: Vec::new(),
    })
}

/// Read the first non-directory entry of a zip archive into memory.
///
/// Entries borrow the archive, so the content is buffered rather than streamed.
fn first_zip_entry(file: File) -> Result<Box<dyn BufRead>, DecodeError> {
    let mut archive = ZipArchive::new(file)?;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        debug!(entry = entry.name(), size = entry.size(), "reading zip entry");
        let mut content = Vec::with_capacity(prealloc_hint(entry.size()));
        entry.read_to_end(&mut content)?;
        return Ok(Box::new(Cursor::new(content)));
    }
    debug!("zip archive has no file entries");
    Ok(Box::new(io::empty()))
}

/// Capacity to reserve for an entry declaring `size` bytes. The header is
/// untrusted, so the hint is clamped.
fn prealloc_hint(size: u64) -> usize {
    size.min(ZIP_PREALLOC_LIMIT) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    const CONTENT: &str = "{\"text\": \"a\", \"label\": \"YES\"}\r\n\n{\"text\": \"b\"}\n";

    fn expected() -> Vec<String> {
        vec![
            "{\"text\": \"a\", \"label\": \"YES\"}".to_string(),
            String::new(),
            "{\"text\": \"b\"}".to_string(),
        ]
    }

    fn collect(path: &Path) -> Vec<String> {
        open_export(path)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    fn write_plain(dir: &TempDir, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join("export.jsonl");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn write_gzip(dir: &TempDir, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join("export.bin");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(content).unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();
        path
    }

    fn write_zip(dir: &TempDir, entries: &[(&str, Option<&[u8]>)]) -> std::path::PathBuf {
        let path = dir.path().join("export.download");
        let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
        for (name, content) in entries {
            match content {
                Some(bytes) => {
                    zip.start_file(*name, SimpleFileOptions::default()).unwrap();
                    zip.write_all(bytes).unwrap();
                }
                None => zip.add_directory(*name, SimpleFileOptions::default()).unwrap(),
            }
        }
        zip.finish().unwrap();
        path
    }

    #[test]
    fn sniff_magic_bytes() {
        assert_eq!(ContainerFormat::sniff(&[0x1f, 0x8b, 0x08, 0x00]), ContainerFormat::Gzip);
        assert_eq!(ContainerFormat::sniff(b"PK\x03\x04"), ContainerFormat::Zip);
        assert_eq!(ContainerFormat::sniff(b"PK\x05\x06"), ContainerFormat::Plain);
        assert_eq!(ContainerFormat::sniff(b"{\"te"), ContainerFormat::Plain);
        assert_eq!(ContainerFormat::sniff(&[0x1f]), ContainerFormat::Plain);
        assert_eq!(ContainerFormat::sniff(&[]), ContainerFormat::Plain);
    }

    #[test]
    fn plain_lines() {
        let dir = TempDir::new().unwrap();
        let path = write_plain(&dir, CONTENT.as_bytes());
        let lines = open_export(&path).unwrap();
        assert_eq!(lines.format(), ContainerFormat::Plain);
        assert_eq!(collect(&path), expected());
    }

    #[test]
    fn gzip_lines_match_plain() {
        let dir = TempDir::new().unwrap();
        let path = write_gzip(&dir, CONTENT.as_bytes());
        assert_eq!(open_export(&path).unwrap().format(), ContainerFormat::Gzip);
        assert_eq!(collect(&path), expected());
    }

    #[test]
    fn zip_lines_match_plain() {
        let dir = TempDir::new().unwrap();
        let path = write_zip(&dir, &[("all.jsonl", Some(CONTENT.as_bytes()))]);
        assert_eq!(open_export(&path).unwrap().format(), ContainerFormat::Zip);
        assert_eq!(collect(&path), expected());
    }

    #[test]
    fn zip_skips_directory_entries() {
        let dir = TempDir::new().unwrap();
        let path = write_zip(
            &dir,
            &[
                ("export/", None),
                ("export/admin.jsonl", Some(CONTENT.as_bytes())),
                ("export/other.jsonl", Some(b"ignored\n".as_slice())),
            ],
        );
        assert_eq!(collect(&path), expected());
    }

    #[test]
    fn zip_without_files_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = write_zip(&dir, &[("only-a-dir/", None)]);
        assert!(collect(&path).is_empty());
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let dir = TempDir::new().unwrap();
        let path = write_gzip(&dir, b"caf\xff\n");
        assert_eq!(collect(&path), vec!["caf\u{fffd}".to_string()]);
    }

    #[test]
    fn last_line_without_newline() {
        let dir = TempDir::new().unwrap();
        let path = write_plain(&dir, b"one\ntwo");
        assert_eq!(collect(&path), vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn lone_carriage_return_ends_a_line() {
        let dir = TempDir::new().unwrap();
        let path = write_plain(&dir, b"one\rtwo\r\nthree\n\rfour\r");
        assert_eq!(collect(&path), vec!["one", "two", "three", "", "four"]);
    }

    #[test]
    fn crlf_split_across_reads_is_one_terminator() {
        let reader = BufReader::with_capacity(4, Cursor::new(b"abc\r\ndef".to_vec()));
        let lines = ExportLines {
            format: ContainerFormat::Plain,
            reader: Box::new(reader),
            buf: Vec::new(),
        };
        let lines: Vec<String> = lines.map(Result::unwrap).collect();
        assert_eq!(lines, vec!["abc", "def"]);
    }

    #[test]
    fn declared_zip_size_is_clamped() {
        assert_eq!(prealloc_hint(512), 512);
        assert_eq!(prealloc_hint(u64::MAX), ZIP_PREALLOC_LIMIT as usize);
    }

    #[test]
    fn empty_file_is_plain_and_empty() {
        let dir = TempDir::new().unwrap();
        let path = write_plain(&dir, b"");
        let lines = open_export(&path).unwrap();
        assert_eq!(lines.format(), ContainerFormat::Plain);
        assert_eq!(lines.count(), 0);
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = open_export(Path::new("/nonexistent/export.jsonl"));
        assert!(matches!(result, Err(DecodeError::Io(_))));
    }
}
