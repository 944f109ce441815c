use std::fs::{self, File};
use std::path::Path;

use tracing::{debug, info};
use zip::ZipArchive;

use crate::error::Result;

/// Fetches the raw bytes behind a URL.
pub trait Transport {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Blocking HTTP GET through reqwest.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpTransport;

impl Transport for HttpTransport {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        debug!(url, "sending GET");

        // a non-2xx body is an error page, never a dataset
        let response = reqwest::blocking::get(url)?.error_for_status()?;
        let bytes = response.bytes()?;

        Ok(bytes.to_vec())
    }
}

/// Downloads `url` into `path` unless the file already exists.
///
/// Returns whether a download happened.
pub fn ensure_archive(transport: &dyn Transport, url: &str, path: &Path) -> Result<bool> {
    if path.exists() {
        debug!(path = %path.display(), "archive already cached, skipping download");
        return Ok(false);
    }

    info!(url, "downloading archive");
    let bytes = transport.fetch(url)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, &bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), "archive written");

    Ok(true)
}

/// Unpacks every entry of the archive under `dest`, overwriting older copies.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;

    fs::create_dir_all(dest)?;
    archive.extract(dest)?;
    info!(
        entries = archive.len(),
        dest = %dest.display(),
        "archive extracted"
    );

    Ok(())
}

/// Fetch-if-missing followed by an unconditional extraction.
pub fn acquire(
    transport: &dyn Transport,
    url: &str,
    archive_path: &Path,
    dest: &Path,
) -> Result<bool> {
    let downloaded = ensure_archive(transport, url, archive_path)?;
    extract_archive(archive_path, dest)?;
    Ok(downloaded)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::io::{Cursor, Write};

    use zip::write::FileOptions;
    use zip::ZipWriter;

    use super::*;
    use crate::error::PipelineError;

    struct CountingTransport {
        body: Vec<u8>,
        calls: Cell<usize>,
    }

    impl CountingTransport {
        fn new(body: Vec<u8>) -> Self {
            Self {
                body,
                calls: Cell::new(0),
            }
        }
    }

    impl Transport for CountingTransport {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.body.clone())
        }
    }

    struct FailingTransport;

    impl Transport for FailingTransport {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
            Err(PipelineError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "offline",
            )))
        }
    }

    fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn downloads_only_when_archive_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("data.zip");
        let transport = CountingTransport::new(zip_bytes(&[("d/a.dat", "1::2")]));

        assert!(ensure_archive(&transport, "http://example.test/a.zip", &archive).unwrap());
        assert_eq!(transport.calls.get(), 1);

        let second = CountingTransport::new(Vec::new());
        assert!(!ensure_archive(&second, "http://example.test/a.zip", &archive).unwrap());
        assert_eq!(second.calls.get(), 0);
    }

    #[test]
    fn extraction_overwrites_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("data.zip");
        fs::write(&archive, zip_bytes(&[("d/a.dat", "fresh")])).unwrap();
        fs::create_dir_all(dir.path().join("d")).unwrap();
        fs::write(dir.path().join("d/a.dat"), "stale contents").unwrap();

        extract_archive(&archive, dir.path()).unwrap();

        let contents = fs::read_to_string(dir.path().join("d/a.dat")).unwrap();
        assert_eq!(contents, "fresh");
    }

    #[test]
    fn acquire_extracts_even_when_cached() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("nested/data.zip");
        let transport = CountingTransport::new(zip_bytes(&[("d/m.dat", "1::Toy::A")]));

        assert!(acquire(&transport, "u", &archive, dir.path()).unwrap());
        fs::remove_file(dir.path().join("d/m.dat")).unwrap();
        assert!(!acquire(&transport, "u", &archive, dir.path()).unwrap());

        assert_eq!(transport.calls.get(), 1);
        assert!(dir.path().join("d/m.dat").exists());
    }

    #[test]
    fn malformed_archive_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("data.zip");
        fs::write(&archive, b"definitely not a zip").unwrap();

        let err = extract_archive(&archive, dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Archive(_)));
    }

    #[test]
    fn transport_failure_leaves_no_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("data.zip");

        assert!(ensure_archive(&FailingTransport, "u", &archive).is_err());
        assert!(!archive.exists());
    }
}
