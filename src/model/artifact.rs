//! Memory-mapped artifact access.

use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

use crate::error::HandlerError;

/// Read-only memory-mapped view of an artifact file (zero-copy).
pub struct MappedArtifact {
    mmap: Mmap,
}

impl MappedArtifact {
    /// Memory-map an artifact file.
    pub fn open(path: &Path) -> Result<Self, HandlerError> {
        let file = File::open(path)?;
        // SAFETY: the file is opened read-only and artifacts are immutable
        // for the process lifetime once the handler starts.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { mmap })
    }

    /// Artifact contents as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn maps_file_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{\"ops\":[]}").unwrap();
        file.flush().unwrap();

        let mapped = MappedArtifact::open(file.path()).unwrap();
        assert_eq!(mapped.as_bytes(), b"{\"ops\":[]}");
        assert_eq!(mapped.len(), 10);
        assert!(!mapped.is_empty());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = MappedArtifact::open(Path::new("/nonexistent/model.pt"));
        assert!(matches!(result, Err(HandlerError::Io(_))));
    }
}
