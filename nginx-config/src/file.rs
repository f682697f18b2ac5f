//! Writes generated files to disk. The manager records what it wrote in a
//! manifest under the output root, so files dropped from the configuration
//! are removed on the next run, even by a new process.

use std::fmt;
use std::fs::{self, Permissions};
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const REGULAR_FILE_MODE: u32 = 0o644;
const SECRET_FILE_MODE: u32 = 0o640;

/// Paths written by the last run, as a JSON array. Not matched by any nginx
/// include.
pub const MANIFEST_FILE: &str = "/etc/nginx/.confgen-manifest.json";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileType {
    /// Configuration readable by everyone.
    Regular,
    /// Key material, readable by the owner and group only.
    Secret,
}

impl FileType {
    pub fn mode(&self) -> u32 {
        match self {
            FileType::Regular => REGULAR_FILE_MODE,
            FileType::Secret => SECRET_FILE_MODE,
        }
    }
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Regular => "Regular",
            FileType::Secret => "Secret",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file of nginx configuration, with the absolute path nginx expects it at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct File {
    pub path: String,
    pub content: Vec<u8>,
    pub file_type: FileType,
}

#[derive(thiserror::Error, Debug)]
pub enum FileError {
    #[error("failed to delete file {path:?}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create file {path:?}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to set file mode to {mode:#o} for {path:?}: {source}")]
    Chmod {
        path: PathBuf,
        mode: u32,
        #[source]
        source: io::Error,
    },

    #[error("failed to write file {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read manifest {path:?}: {source}")]
    ReadManifest {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid manifest {path:?}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Not thread safe. Owns the set of paths written by the previous run.
pub struct FileManager {
    root: PathBuf,
    last_written_paths: Vec<String>,
}

impl FileManager {
    /// Files are written below `root`. Use `/` to write to the real locations.
    /// Paths recorded by an earlier run under the same root are picked up from
    /// its manifest.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, FileError> {
        let root = root.into();
        let manifest = root.join(MANIFEST_FILE.trim_start_matches('/'));

        let last_written_paths = match fs::read(&manifest) {
            Ok(data) => {
                serde_json::from_slice(&data).map_err(|source| FileError::Manifest {
                    path: manifest.clone(),
                    source,
                })?
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(source) => {
                return Err(FileError::ReadManifest {
                    path: manifest,
                    source,
                });
            }
        };

        Ok(FileManager {
            root,
            last_written_paths,
        })
    }

    /// Where a generated file lands on disk.
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    /// Removes everything written by the previous call, then writes `files`
    /// and records them in the manifest.
    pub fn replace_files(&mut self, files: &[File]) -> Result<(), FileError> {
        for written in &self.last_written_paths {
            let path = self.resolve(written);
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "Deleted file"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    debug!(
                        path = %path.display(),
                        error = %err,
                        "File not found when attempting to delete"
                    );
                }
                Err(source) => return Err(FileError::Remove { path, source }),
            }
        }

        self.last_written_paths = Vec::with_capacity(files.len());

        for file in files {
            let path = self.resolve(&file.path);
            write_file(&path, file)?;
            debug!(path = %path.display(), file_type = %file.file_type, "Wrote file");
            self.last_written_paths.push(file.path.clone());
        }

        self.write_manifest()?;

        info!(
            count = files.len(),
            root = %self.root.display(),
            "Replaced nginx configuration files"
        );
        Ok(())
    }

    fn write_manifest(&self) -> Result<(), FileError> {
        let path = self.resolve(MANIFEST_FILE);
        let content = serde_json::to_vec(&self.last_written_paths)
            .map_err(|source| FileError::Manifest {
                path: path.clone(),
                source,
            })?;

        let manifest = File {
            path: MANIFEST_FILE.to_string(),
            content,
            file_type: FileType::Regular,
        };
        write_file(&path, &manifest)
    }
}

/// Creates the file, sets its mode by type, then writes the content. The
/// handle is closed on every path out of this function.
pub fn write_file(path: &Path, file: &File) -> Result<(), FileError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| FileError::Create {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let mut f = fs::File::create(path).map_err(|source| FileError::Create {
        path: path.to_path_buf(),
        source,
    })?;

    let mode = file.file_type.mode();
    f.set_permissions(Permissions::from_mode(mode))
        .map_err(|source| FileError::Chmod {
            path: path.to_path_buf(),
            mode,
            source,
        })?;

    f.write_all(&file.content)
        .and_then(|()| f.sync_all())
        .map_err(|source| FileError::Write {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, content: &str, file_type: FileType) -> File {
        File {
            path: path.into(),
            content: content.as_bytes().to_vec(),
            file_type,
        }
    }

    fn mode_of(path: &Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[test]
    fn test_write_by_type() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = FileManager::new(dir.path()).unwrap();

        let files = vec![
            file("/etc/nginx/conf.d/http.conf", "server {}", FileType::Regular),
            file("/etc/nginx/secrets/key.pem", "secret", FileType::Secret),
        ];
        manager.replace_files(&files).unwrap();

        let http = dir.path().join("etc/nginx/conf.d/http.conf");
        let secret = dir.path().join("etc/nginx/secrets/key.pem");
        assert_eq!(fs::read_to_string(&http).unwrap(), "server {}");
        assert_eq!(fs::read_to_string(&secret).unwrap(), "secret");
        assert_eq!(mode_of(&http), 0o644);
        assert_eq!(mode_of(&secret), 0o640);
    }

    #[test]
    fn test_replace_removes_previous_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = FileManager::new(dir.path()).unwrap();

        manager
            .replace_files(&[
                file("/a.conf", "a", FileType::Regular),
                file("/b.conf", "b", FileType::Regular),
            ])
            .unwrap();
        manager
            .replace_files(&[file("/a.conf", "a2", FileType::Regular)])
            .unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("a.conf")).unwrap(), "a2");
        assert!(!dir.path().join("b.conf").exists());
    }

    #[test]
    fn test_missing_previous_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = FileManager::new(dir.path()).unwrap();

        manager
            .replace_files(&[file("/gone.conf", "x", FileType::Regular)])
            .unwrap();
        fs::remove_file(dir.path().join("gone.conf")).unwrap();

        manager.replace_files(&[]).unwrap();
    }

    #[test]
    fn test_new_manager_removes_files_of_previous_run() {
        let dir = tempfile::tempdir().unwrap();

        FileManager::new(dir.path())
            .unwrap()
            .replace_files(&[
                file("/etc/nginx/secrets/old.pem", "old", FileType::Secret),
                file("/etc/nginx/conf.d/http.conf", "a", FileType::Regular),
            ])
            .unwrap();

        let mut manager = FileManager::new(dir.path()).unwrap();
        manager
            .replace_files(&[file("/etc/nginx/conf.d/http.conf", "b", FileType::Regular)])
            .unwrap();

        assert!(!dir.path().join("etc/nginx/secrets/old.pem").exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("etc/nginx/conf.d/http.conf")).unwrap(),
            "b"
        );
        let manifest =
            fs::read_to_string(dir.path().join("etc/nginx/.confgen-manifest.json")).unwrap();
        assert_eq!(manifest, r#"["/etc/nginx/conf.d/http.conf"]"#);
    }

    #[test]
    fn test_invalid_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("etc/nginx")).unwrap();
        fs::write(dir.path().join("etc/nginx/.confgen-manifest.json"), "{").unwrap();

        let err = FileManager::new(dir.path()).err().unwrap();
        assert!(matches!(err, FileError::Manifest { .. }));
    }

    #[test]
    fn test_create_error_carries_path() {
        let dir = tempfile::tempdir().unwrap();
        // a regular file where a directory is expected
        fs::write(dir.path().join("blocker"), "").unwrap();
        let target = dir.path().join("blocker/http.conf");

        let err = write_file(&target, &file("/http.conf", "", FileType::Regular)).unwrap_err();
        match err {
            FileError::Create { path, .. } => assert_eq!(path, target),
            other => panic!("unexpected error: {other}"),
        }
    }
}
