//! Class artifacts and the locations they are enumerated from.

use std::borrow::Cow;
use std::ffi::OsStr;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

/// Failure to enumerate an artifact source. Fatal for the whole import.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// IO error on a directory or archive.
    #[error("IO error on {path}: {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The archive is not a readable zip file.
    #[error("Invalid archive {path}: {source}")]
    Zip {
        /// Archive path.
        path: PathBuf,
        /// Underlying error.
        source: zip::result::ZipError,
    },

    /// Exclude pattern could not be compiled.
    #[error("Invalid glob pattern: {0}")]
    Glob(#[from] glob::PatternError),
}

/// Location of a single class file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Origin {
    /// A `.class` file on disk.
    File(PathBuf),
    /// An entry inside a jar or zip archive.
    JarEntry {
        /// Archive path.
        jar: PathBuf,
        /// Entry name, e.g. `com/example/Foo.class`.
        entry: String,
    },
    /// Bytes handed over by the caller, identified by a name.
    Memory(String),
}

impl Origin {
    /// URI rendering: `file:///…`, `jar:file:///…!/entry`, `memory:name`.
    #[must_use]
    pub fn uri(&self) -> String {
        match self {
            Self::File(path) => format!("file://{}", uri_path(path)),
            Self::JarEntry { jar, entry } => format!("jar:file://{}!/{entry}", uri_path(jar)),
            Self::Memory(name) => format!("memory:{name}"),
        }
    }

    /// Reads the bytes behind this origin from disk.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file or archive entry cannot be read;
    /// in-memory origins cannot be re-read and always fail.
    pub fn read(&self) -> std::io::Result<Vec<u8>> {
        match self {
            Self::File(path) => std::fs::read(path),
            Self::JarEntry { jar, entry } => {
                let file = std::fs::File::open(jar)?;
                let mut archive = zip::ZipArchive::new(file).map_err(std::io::Error::other)?;
                let mut zipped = archive.by_name(entry).map_err(std::io::Error::other)?;
                let mut bytes = Vec::with_capacity(usize::try_from(zipped.size()).unwrap_or(0));
                zipped.read_to_end(&mut bytes)?;
                Ok(bytes)
            }
            Self::Memory(name) => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("in-memory artifact '{name}' has no backing location"),
            )),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

fn uri_path(path: &Path) -> String {
    let s = path.to_string_lossy().replace('\\', "/");
    if s.starts_with('/') {
        s
    } else {
        format!("/{s}")
    }
}

/// One class file: where it came from and, when already loaded, its bytes.
#[derive(Debug, Clone)]
pub struct Artifact {
    origin: Origin,
    bytes: Option<Arc<[u8]>>,
}

impl Artifact {
    /// An artifact read lazily from disk.
    #[must_use]
    pub fn on_disk(path: impl Into<PathBuf>) -> Self {
        Self {
            origin: Origin::File(path.into()),
            bytes: None,
        }
    }

    /// An artifact whose bytes are already loaded.
    #[must_use]
    pub fn loaded(origin: Origin, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            origin,
            bytes: Some(bytes.into()),
        }
    }

    /// In-memory bytes identified by `name`.
    #[must_use]
    pub fn in_memory(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::loaded(Origin::Memory(name.into()), bytes)
    }

    /// Where the artifact came from.
    #[must_use]
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// The class file bytes, reading from disk if not yet loaded.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the backing file cannot be read.
    pub fn bytes(&self) -> std::io::Result<Cow<'_, [u8]>> {
        match &self.bytes {
            Some(bytes) => Ok(Cow::Borrowed(&bytes[..])),
            None => self.origin.read().map(Cow::Owned),
        }
    }
}

/// An input location that yields class artifacts.
#[derive(Debug, Clone)]
pub enum ArtifactSource {
    /// A directory searched recursively for `.class` files.
    Directory(PathBuf),
    /// A jar or zip archive.
    Jar(PathBuf),
    /// A single `.class` file.
    File(PathBuf),
    /// Class file bytes held in memory.
    Bytes {
        /// Identifying name (becomes the `memory:` URI).
        name: String,
        /// Class file contents.
        bytes: Arc<[u8]>,
    },
}

impl ArtifactSource {
    /// Classifies a path: directories, `.jar`/`.zip` archives, anything else
    /// is treated as a single class file.
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.is_dir() {
            Self::Directory(path)
        } else if is_archive(&path) {
            Self::Jar(path)
        } else {
            Self::File(path)
        }
    }

    /// Enumerates the artifacts of this source.
    ///
    /// Directory files are not read yet; archive entries are read eagerly
    /// because the archive is open anyway. Paths (relative to a directory)
    /// and entry names matching `exclude` are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError`] if the location itself is unreadable.
    pub fn artifacts(&self, exclude: &[glob::Pattern]) -> Result<Vec<Artifact>, ArtifactError> {
        match self {
            Self::Directory(dir) => directory_artifacts(dir, exclude),
            Self::Jar(jar) => jar_artifacts(jar, exclude),
            Self::File(path) => {
                if !path.is_file() {
                    return Err(ArtifactError::Io {
                        path: path.clone(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            "no such class file",
                        ),
                    });
                }
                Ok(vec![Artifact::on_disk(path.clone())])
            }
            Self::Bytes { name, bytes } => Ok(vec![Artifact::in_memory(name.clone(), bytes.clone())]),
        }
    }
}

impl fmt::Display for ArtifactSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory(p) | Self::Jar(p) | Self::File(p) => write!(f, "{}", p.display()),
            Self::Bytes { name, .. } => write!(f, "memory:{name}"),
        }
    }
}

pub(crate) fn is_archive(path: &Path) -> bool {
    matches!(
        path.extension().and_then(OsStr::to_str),
        Some("jar" | "zip")
    )
}

fn is_class_file(name: &str) -> bool {
    Path::new(name).extension() == Some(OsStr::new("class"))
}

/// `module-info` and `package-info` carry no types worth importing.
fn is_descriptor_class(name: &str) -> bool {
    name.ends_with("module-info.class") || name.ends_with("package-info.class")
}

fn excluded(name: &str, exclude: &[glob::Pattern]) -> bool {
    exclude.iter().any(|p| p.matches(name))
}

fn directory_artifacts(
    dir: &Path,
    exclude: &[glob::Pattern],
) -> Result<Vec<Artifact>, ArtifactError> {
    if !dir.is_dir() {
        return Err(ArtifactError::Io {
            path: dir.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such directory"),
        });
    }

    let mut out = Vec::new();
    for entry in walkdir::WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| ArtifactError::Io {
            path: e.path().map_or_else(|| dir.to_path_buf(), Path::to_path_buf),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        let rel = rel.to_string_lossy().replace('\\', "/");
        if !is_class_file(&rel) || is_descriptor_class(&rel) {
            continue;
        }
        if excluded(&rel, exclude) {
            debug!("Excluding: {}", entry.path().display());
            continue;
        }
        out.push(Artifact::on_disk(entry.into_path()));
    }
    Ok(out)
}

fn jar_artifacts(jar: &Path, exclude: &[glob::Pattern]) -> Result<Vec<Artifact>, ArtifactError> {
    let io_err = |source| ArtifactError::Io {
        path: jar.to_path_buf(),
        source,
    };
    let zip_err = |source| ArtifactError::Zip {
        path: jar.to_path_buf(),
        source,
    };

    let file = std::fs::File::open(jar).map_err(io_err)?;
    let mut archive = zip::ZipArchive::new(file).map_err(zip_err)?;

    let mut out = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(zip_err)?;
        if !entry.is_file() {
            continue;
        }
        let name = entry.name().to_owned();
        if !is_class_file(&name) || is_descriptor_class(&name) || name.starts_with("META-INF/") {
            continue;
        }
        if excluded(&name, exclude) {
            debug!("Excluding: {name}");
            continue;
        }
        let mut bytes = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry.read_to_end(&mut bytes).map_err(io_err)?;
        out.push(Artifact::loaded(
            Origin::JarEntry {
                jar: jar.to_path_buf(),
                entry: name,
            },
            bytes,
        ));
    }
    Ok(out)
}
