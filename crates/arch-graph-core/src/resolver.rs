//! Capability for locating classes outside the import set.
//!
//! The importer never touches a classpath on its own. Missing supertypes
//! and access owners are only pulled in through a [`ClassResolver`] the
//! caller hands over explicitly.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use zip::ZipArchive;

use crate::artifact::{is_archive, Artifact, Origin};
use crate::descriptor::{DescriptorError, JavaType};

/// Failure to locate a class.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Primitive types have no class file.
    #[error("'{0}' is a primitive type and has no class file")]
    Primitive(String),

    /// Array types have no class file.
    #[error("'{0}' is an array type and has no class file")]
    Array(String),

    /// No classpath entry contains the class.
    #[error("class '{0}' not found on the classpath")]
    NotFound(String),

    /// The name is not a valid type name.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// A classpath entry could not be read.
    #[error("IO error on {path}: {source}")]
    Io {
        /// Entry that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// Locates the class file for a binary class name.
pub trait ClassResolver: Send + Sync {
    /// Returns the artifact for `class_name`, `Ok(None)` if it is not known.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] if a classpath entry cannot be read.
    fn locate(&self, class_name: &str) -> Result<Option<Artifact>, ResolveError>;
}

/// Resolves nothing: every missing class stays a stub.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClasspath;

impl ClassResolver for NoClasspath {
    fn locate(&self, _class_name: &str) -> Result<Option<Artifact>, ResolveError> {
        Ok(None)
    }
}

/// Searches class directories and jars in order.
///
/// Each jar is opened once and its central directory kept for later
/// lookups.
#[derive(Debug, Default)]
pub struct ClasspathResolver {
    entries: Vec<PathBuf>,
    archives: Mutex<HashMap<PathBuf, ZipArchive<File>>>,
}

impl ClasspathResolver {
    /// Creates a resolver over the given directories and archives.
    pub fn new<I, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
            archives: Mutex::default(),
        }
    }

    /// Classpath entries in search order.
    #[must_use]
    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    fn locate_in(&self, entry: &Path, relative: &str) -> Result<Option<Artifact>, ResolveError> {
        if entry.is_dir() {
            let path = entry.join(relative);
            return Ok(path.is_file().then(|| Artifact::on_disk(path)));
        }
        if !is_archive(entry) || !entry.is_file() {
            return Ok(None);
        }

        let io_err = |source| ResolveError::Io {
            path: entry.to_path_buf(),
            source,
        };
        let mut archives = self
            .archives
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let archive = match archives.entry(entry.to_path_buf()) {
            Entry::Occupied(open) => open.into_mut(),
            Entry::Vacant(slot) => {
                let file = File::open(entry).map_err(io_err)?;
                let archive =
                    ZipArchive::new(file).map_err(|e| io_err(std::io::Error::other(e)))?;
                slot.insert(archive)
            }
        };
        let mut zipped = match archive.by_name(relative) {
            Ok(zipped) => zipped,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(io_err(std::io::Error::other(e))),
        };
        let mut bytes = Vec::new();
        zipped.read_to_end(&mut bytes).map_err(io_err)?;
        Ok(Some(Artifact::loaded(
            Origin::JarEntry {
                jar: entry.to_path_buf(),
                entry: relative.to_string(),
            },
            bytes,
        )))
    }

    #[cfg(test)]
    fn open_archives(&self) -> usize {
        self.archives
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl ClassResolver for ClasspathResolver {
    fn locate(&self, class_name: &str) -> Result<Option<Artifact>, ResolveError> {
        let relative = match JavaType::class(class_name)? {
            ty @ JavaType::Object(_) => match ty.internal_name() {
                Some(internal) => format!("{internal}.class"),
                None => return Ok(None),
            },
            _ => return Ok(None),
        };
        for entry in &self.entries {
            if let Some(artifact) = self.locate_in(entry, &relative)? {
                return Ok(Some(artifact));
            }
        }
        Ok(None)
    }
}

/// Checks that `name` could have a class file at all. One-letter names are
/// classes in the default package, not primitive descriptors.
pub(crate) fn ensure_class_type(name: &str) -> Result<(), ResolveError> {
    match JavaType::class(name)? {
        JavaType::Primitive(_) => Err(ResolveError::Primitive(name.to_string())),
        JavaType::Array(_) => Err(ResolveError::Array(name.to_string())),
        JavaType::Object(_) => Ok(()),
    }
}
