//! Change detection for file-backed tables

use std::fs::{File, Metadata};
use std::io;
use std::time::SystemTime;

/// Change token of a file-backed table.
///
/// Keeps the file open and remembers its modification time and link count
/// at open time. The file is only ever used for `fstat`.
#[derive(Debug)]
pub struct FileWatch {
    file: File,
    mtime: SystemTime,
    nlink: u64,
}

impl FileWatch {
    pub fn new(file: File) -> io::Result<Self> {
        let meta = file.metadata()?;
        Ok(Self {
            mtime: meta.modified()?,
            nlink: link_count(&meta),
            file,
        })
    }

    /// True when the file was modified, replaced or removed since open.
    /// A failing `fstat` counts as changed.
    pub fn changed(&self) -> bool {
        match self.file.metadata() {
            Ok(meta) => {
                let mtime = meta.modified().ok();
                mtime != Some(self.mtime) || link_count(&meta) != self.nlink
            }
            Err(_) => true,
        }
    }
}

#[cfg(unix)]
fn link_count(meta: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    meta.nlink()
}

#[cfg(not(unix))]
fn link_count(_meta: &Metadata) -> u64 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_unchanged_file() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let watch = FileWatch::new(tmp.reopen().unwrap()).unwrap();
        assert!(!watch.changed());
    }

    #[test]
    fn test_mtime_change_detected() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let watch = FileWatch::new(tmp.reopen().unwrap()).unwrap();

        let later = SystemTime::now() + Duration::from_secs(10);
        tmp.as_file().set_modified(later).unwrap();
        assert!(watch.changed());
    }

    #[cfg(unix)]
    #[test]
    fn test_unlink_detected() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let watch = FileWatch::new(tmp.reopen().unwrap()).unwrap();
        tmp.close().unwrap();
        assert!(watch.changed());
    }
}
