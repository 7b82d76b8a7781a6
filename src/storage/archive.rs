use anyhow::{Context, Result};
use std::fmt;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Mutex;
use zip::ZipArchive;

/// Random-access view over a zip held in memory.
///
/// Entries stay compressed until read and can be read any number of
/// times. Entry names are cached in central-directory order, which is
/// the enumeration order every caller relies on.
pub struct ArchiveReader {
    names: Vec<String>,
    inner: Mutex<ZipArchive<Cursor<Vec<u8>>>>,
}

impl ArchiveReader {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let mut archive =
            ZipArchive::new(Cursor::new(bytes)).context("not a valid zip archive")?;

        let mut names = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let entry = archive
                .by_index_raw(i)
                .with_context(|| format!("unreadable zip entry at index {i}"))?;
            names.push(entry.name().to_string());
        }

        Ok(Self {
            names,
            inner: Mutex::new(archive),
        })
    }

    pub async fn open(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read archive: {}", path.display()))?;
        Self::from_bytes(bytes)
    }

    /// Entry names in central-directory order, directory markers included
    pub fn entry_names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn read_bytes(&self, name: &str) -> Result<Vec<u8>> {
        let mut archive = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut entry = archive
            .by_name(name)
            .with_context(|| format!("no such archive entry: {name}"))?;
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut buf)
            .with_context(|| format!("failed to decompress entry: {name}"))?;
        Ok(buf)
    }

    pub fn read_string(&self, name: &str) -> Result<String> {
        let bytes = self.read_bytes(name)?;
        String::from_utf8(bytes).with_context(|| format!("entry is not UTF-8: {name}"))
    }
}

impl fmt::Debug for ArchiveReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveReader")
            .field("entries", &self.names.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn sample_zip() -> Vec<u8> {
        let mut zw = ZipWriter::new(Cursor::new(Vec::new()));
        zw.add_directory("mods/", FileOptions::default()).unwrap();
        zw.start_file("mods/a.jar", FileOptions::default()).unwrap();
        zw.write_all(b"jar bytes").unwrap();
        zw.start_file("config/a.toml", FileOptions::default())
            .unwrap();
        zw.write_all(b"key = 1").unwrap();
        zw.finish().unwrap().into_inner()
    }

    #[test]
    fn test_entry_names_in_order() {
        let archive = ArchiveReader::from_bytes(sample_zip()).unwrap();
        assert_eq!(
            archive.entry_names(),
            &["mods/", "mods/a.jar", "config/a.toml"]
        );
        assert!(archive.contains("mods/a.jar"));
        assert!(!archive.contains("mods/b.jar"));
    }

    #[test]
    fn test_entries_readable_repeatedly() {
        let archive = ArchiveReader::from_bytes(sample_zip()).unwrap();
        assert_eq!(archive.read_bytes("mods/a.jar").unwrap(), b"jar bytes");
        assert_eq!(archive.read_bytes("mods/a.jar").unwrap(), b"jar bytes");
        assert_eq!(archive.read_string("config/a.toml").unwrap(), "key = 1");
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(ArchiveReader::from_bytes(b"not a zip".to_vec()).is_err());
    }
}
