//! Import pipeline: enumerate artifacts, read them in parallel, complete
//! the pool, link.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::artifact::{Artifact, ArtifactError, ArtifactSource};
use crate::classfile::{read_class, RawClass};
use crate::graph::DomainGraph;
use crate::linker::link;
use crate::pool::ClassPool;
use crate::resolver::{ClassResolver, NoClasspath};
use crate::source::Source;

/// Catastrophic import failures. Per-class problems are diagnostics instead.
#[derive(Debug, Error)]
pub enum ImportError {
    /// An input location could not be enumerated.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    /// The read worker pool could not be started.
    #[error("Cannot start read workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// What went wrong with a single artifact or reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// The artifact bytes could not be read.
    Read,
    /// The bytes are not a usable class file.
    Parse,
    /// A class with the same name was already imported.
    DuplicateClass,
    /// The resolver failed while locating a missing class.
    Resolve,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Parse => "parse",
            Self::DuplicateClass => "duplicate",
            Self::Resolve => "resolve",
        })
    }
}

/// A non-fatal problem recorded during import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDiagnostic {
    /// Category.
    pub kind: DiagnosticKind,
    /// Origin URI of the artifact, or `class:<name>` for resolver failures.
    pub uri: String,
    /// Human-readable description.
    pub message: String,
}

impl ImportDiagnostic {
    /// Creates a diagnostic.
    pub fn new(kind: DiagnosticKind, uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            uri: uri.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ImportDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.uri, self.message)
    }
}

/// Settings read once before an import starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    /// Compute SHA-256 checksums of imported artifacts.
    pub checksums: bool,
    /// Pull missing supertypes and access owners in through the resolver.
    pub resolve_missing_dependencies: bool,
    /// Number of read workers; `None` uses one per core.
    pub parallelism: Option<usize>,
    /// Glob patterns for artifact paths to skip.
    pub exclude: Vec<String>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            checksums: true,
            resolve_missing_dependencies: true,
            parallelism: None,
            exclude: Vec::new(),
        }
    }
}

/// The outcome of an import: the graph plus everything that was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportResult {
    /// The linked graph.
    pub graph: DomainGraph,
    /// Per-artifact problems, in the order they were found.
    pub diagnostics: Vec<ImportDiagnostic>,
}

impl ImportResult {
    /// Whether any artifact was skipped or any pull-in failed.
    #[must_use]
    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Imports class files into a [`DomainGraph`].
///
/// ```no_run
/// use arch_graph_core::{ClassFileImporter, ClasspathResolver};
///
/// let result = ClassFileImporter::new()
///     .resolver(ClasspathResolver::new(["lib/runtime.jar"]))
///     .parallelism(4)
///     .import_path("build/classes")?;
/// println!("{} classes", result.graph.len());
/// # Ok::<(), arch_graph_core::ImportError>(())
/// ```
#[derive(Clone)]
pub struct ClassFileImporter {
    options: ImportOptions,
    resolver: Arc<dyn ClassResolver>,
}

impl Default for ClassFileImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ClassFileImporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassFileImporter")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ClassFileImporter {
    /// Creates an importer with default options and no classpath.
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: ImportOptions::default(),
            resolver: Arc::new(NoClasspath),
        }
    }

    /// Replaces all options.
    #[must_use]
    pub fn options(mut self, options: ImportOptions) -> Self {
        self.options = options;
        self
    }

    /// Turns checksum computation on or off.
    #[must_use]
    pub fn checksums(mut self, enabled: bool) -> Self {
        self.options.checksums = enabled;
        self
    }

    /// Turns pulling in missing classes on or off.
    #[must_use]
    pub fn resolve_missing_dependencies(mut self, enabled: bool) -> Self {
        self.options.resolve_missing_dependencies = enabled;
        self
    }

    /// Bounds the number of read workers.
    #[must_use]
    pub fn parallelism(mut self, workers: usize) -> Self {
        self.options.parallelism = Some(workers);
        self
    }

    /// Adds an exclude glob pattern.
    #[must_use]
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.options.exclude.push(pattern.into());
        self
    }

    /// Sets the resolver consulted for classes outside the import set.
    #[must_use]
    pub fn resolver<R: ClassResolver + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Current options.
    #[must_use]
    pub fn import_options(&self) -> &ImportOptions {
        &self.options
    }

    /// Imports a directory, archive or single class file.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError`] if the location cannot be enumerated.
    pub fn import_path(&self, path: impl Into<PathBuf>) -> Result<ImportResult, ImportError> {
        self.import_sources(&[ArtifactSource::from_path(path)])
    }

    /// Imports several locations as one set.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError`] if any location cannot be enumerated.
    pub fn import_paths<I, P>(&self, paths: I) -> Result<ImportResult, ImportError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let sources: Vec<ArtifactSource> = paths.into_iter().map(ArtifactSource::from_path).collect();
        self.import_sources(&sources)
    }

    /// Imports class files held in memory, each identified by a name.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::ThreadPool`] if the workers cannot start.
    pub fn import_bytes<I, N, B>(&self, classes: I) -> Result<ImportResult, ImportError>
    where
        I: IntoIterator<Item = (N, B)>,
        N: Into<String>,
        B: Into<Arc<[u8]>>,
    {
        let artifacts = classes
            .into_iter()
            .map(|(name, bytes)| Artifact::in_memory(name, bytes))
            .collect();
        self.import_artifacts(artifacts)
    }

    /// Imports every artifact of the given sources.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError`] if an exclude pattern is invalid or a
    /// location cannot be enumerated.
    pub fn import_sources(&self, sources: &[ArtifactSource]) -> Result<ImportResult, ImportError> {
        let exclude = self
            .options
            .exclude
            .iter()
            .map(|p| glob::Pattern::new(p).map_err(ArtifactError::from))
            .collect::<Result<Vec<_>, _>>()?;

        let mut artifacts = Vec::new();
        for source in sources {
            let found = source.artifacts(&exclude)?;
            debug!("{source}: {} artifacts", found.len());
            artifacts.extend(found);
        }
        self.import_artifacts(artifacts)
    }

    /// Imports already enumerated artifacts.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::ThreadPool`] if the workers cannot start.
    pub fn import_artifacts(&self, artifacts: Vec<Artifact>) -> Result<ImportResult, ImportError> {
        info!("Importing {} artifacts", artifacts.len());

        let workers = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.parallelism.unwrap_or(0))
            .build()?;
        let checksums = self.options.checksums;
        let read: Vec<Result<(RawClass, Source), ImportDiagnostic>> = workers.install(|| {
            artifacts
                .par_iter()
                .map(|artifact| read_artifact(artifact, checksums))
                .collect()
        });

        let mut pool = ClassPool::new(checksums);
        for outcome in read {
            match outcome {
                Ok((raw, source)) => {
                    pool.add_imported(raw, source);
                }
                Err(diagnostic) => {
                    warn!("Skipping {}: {}", diagnostic.uri, diagnostic.message);
                    pool.report(diagnostic);
                }
            }
        }

        if self.options.resolve_missing_dependencies {
            pool.complete(self.resolver.as_ref());
        } else {
            pool.complete_without_resolver();
        }

        let (graph, diagnostics) = link(pool);
        info!(
            "Import complete: {} classes ({} stubs), {} diagnostics",
            graph.len(),
            graph.classes().filter(|c| c.is_stub()).count(),
            diagnostics.len()
        );
        Ok(ImportResult { graph, diagnostics })
    }
}

fn read_artifact(
    artifact: &Artifact,
    checksums: bool,
) -> Result<(RawClass, Source), ImportDiagnostic> {
    let origin = artifact.origin();
    let bytes = artifact
        .bytes()
        .map_err(|e| ImportDiagnostic::new(DiagnosticKind::Read, origin.uri(), e.to_string()))?;
    let raw = read_class(&bytes)
        .map_err(|e| ImportDiagnostic::new(DiagnosticKind::Parse, origin.uri(), e.to_string()))?;
    let source = Source::from_bytes(origin, &bytes, raw.source_file.clone(), checksums);
    Ok((raw, source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_become_parse_diagnostics() {
        let result = ClassFileImporter::new()
            .import_bytes([("Broken", vec![0xde, 0xad, 0xbe, 0xef])])
            .unwrap();
        assert!(result.graph.is_empty());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::Parse);
        assert_eq!(result.diagnostics[0].uri, "memory:Broken");
    }

    #[test]
    fn missing_directory_fails_the_import() {
        let err = ClassFileImporter::new()
            .import_path("/definitely/not/here")
            .unwrap_err();
        assert!(matches!(err, ImportError::Artifact(ArtifactError::Io { .. })));
    }

    #[test]
    fn invalid_exclude_pattern_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClassFileImporter::new()
            .exclude("[")
            .import_path(dir.path())
            .unwrap_err();
        assert!(matches!(err, ImportError::Artifact(ArtifactError::Glob(_))));
    }

    #[test]
    fn diagnostic_display() {
        let d = ImportDiagnostic::new(DiagnosticKind::DuplicateClass, "memory:A", "seen before");
        insta::assert_snapshot!(d.to_string(), @"[duplicate] memory:A: seen before");
    }
}
