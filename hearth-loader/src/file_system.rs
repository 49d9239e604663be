use hearth_base::hashing::HashMap;
use hearth_base::{ResourceError, ResourceResult};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Byte-blob access used by the streaming worker and the blocking load path. Paths are resource
/// paths ('/' separated, relative to whatever root the implementation uses).
pub trait ResourceFileSystem: Send + Sync {
    fn read_bytes(
        &self,
        path: &str,
    ) -> ResourceResult<Vec<u8>>;
}

/// Reads resources from a directory on disk
pub struct DiskFileSystem {
    root_path: PathBuf,
}

impl DiskFileSystem {
    pub fn new<T: Into<PathBuf>>(root_path: T) -> Self {
        DiskFileSystem {
            root_path: root_path.into(),
        }
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn full_path(
        &self,
        path: &str,
    ) -> PathBuf {
        let mut full_path = self.root_path.clone();
        full_path.extend(path.split(|c| c == '/' || c == '\\').filter(|x| !x.is_empty()));
        full_path
    }
}

impl ResourceFileSystem for DiskFileSystem {
    fn read_bytes(
        &self,
        path: &str,
    ) -> ResourceResult<Vec<u8>> {
        profiling::scope!("DiskFileSystem::read_bytes");
        let full_path = self.full_path(path);
        log::trace!("Read {:?}", full_path);
        std::fs::read(&full_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ResourceError::NotFound(path.to_string()),
            _ => e.into(),
        })
    }
}

/// Keeps resources in memory. Useful for tests and for content generated at runtime.
#[derive(Default)]
pub struct MemoryFileSystem {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryFileSystem {
    pub fn add_file<P: Into<String>>(
        &self,
        path: P,
        data: Vec<u8>,
    ) {
        self.files
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.into(), data);
    }

    pub fn remove_file(
        &self,
        path: &str,
    ) -> Option<Vec<u8>> {
        self.files
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(path)
    }

    pub fn contains(
        &self,
        path: &str,
    ) -> bool {
        self.files
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(path)
    }
}

impl ResourceFileSystem for MemoryFileSystem {
    fn read_bytes(
        &self,
        path: &str,
    ) -> ResourceResult<Vec<u8>> {
        self.files
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .cloned()
            .ok_or_else(|| ResourceError::NotFound(path.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn memory_file_system() {
        let fs = MemoryFileSystem::default();
        fs.add_file("a.mesh", vec![1, 2, 3]);
        assert!(fs.contains("a.mesh"));
        assert_eq!(fs.read_bytes("a.mesh").unwrap(), vec![1, 2, 3]);

        assert_eq!(fs.remove_file("a.mesh"), Some(vec![1, 2, 3]));
        match fs.read_bytes("a.mesh") {
            Err(ResourceError::NotFound(path)) => assert_eq!(path, "a.mesh"),
            _ => panic!("expected NotFound"),
        }
    }

    #[test]
    fn disk_file_system() {
        let root = std::env::temp_dir().join(format!("hearth-fs-test-{}", std::process::id()));
        std::fs::create_dir_all(root.join("meshes")).unwrap();
        std::fs::write(root.join("meshes").join("cube.mesh"), b"cube").unwrap();

        let fs = DiskFileSystem::new(&root);
        assert_eq!(fs.full_path("meshes/cube.mesh"), root.join("meshes").join("cube.mesh"));
        assert_eq!(fs.read_bytes("meshes/cube.mesh").unwrap(), b"cube".to_vec());
        match fs.read_bytes("meshes/missing.mesh") {
            Err(ResourceError::NotFound(_)) => {}
            _ => panic!("expected NotFound"),
        }

        std::fs::remove_dir_all(&root).unwrap();
    }
}
