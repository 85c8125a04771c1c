//! # arch-graph-core
//!
//! Imports compiled JVM class files into an immutable, fully linked domain
//! graph and checks architecture rules against it.
//!
//! - [`ClassFileImporter`] reads directories, jars and in-memory bytes in
//!   parallel and links them into a [`DomainGraph`]
//! - [`DomainGraph`] answers lookups, predicate filters and reverse
//!   queries (subtypes, incoming accesses, dependencies)
//! - [`ArchRule`] and [`Analyzer`] evaluate rules over the graph
//!
//! ## Example
//!
//! ```no_run
//! use arch_graph_core::{predicate, ClassFileImporter};
//!
//! let result = ClassFileImporter::new().import_path("build/classes")?;
//! let domain = predicate::resides_in_package("..domain..").unwrap();
//! for class in result.graph.filter(&domain) {
//!     println!("{} ({} dependencies)", class.name(), result.graph.dependencies_from(class.id()).count());
//! }
//! # Ok::<(), arch_graph_core::ImportError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod analyzer;
mod artifact;
pub mod classfile;
mod config;
pub mod descriptor;
mod graph;
mod importer;
mod linker;
mod model;
mod pool;
pub mod predicate;
mod resolver;
mod rule;
mod source;
mod types;

pub use analyzer::{Analyzer, AnalyzerBuilder, AnalyzerError};
pub use artifact::{Artifact, ArtifactError, ArtifactSource, Origin};
pub use classfile::AccessKind;
pub use config::{Config, ConfigError, ImportConfig, RuleConfig};
pub use descriptor::{JavaType, PrimitiveKind};
pub use graph::DomainGraph;
pub use importer::{
    ClassFileImporter, DiagnosticKind, ImportDiagnostic, ImportError, ImportOptions, ImportResult,
};
pub use linker::link;
pub use model::{
    AccessId, AccessTarget, AnnotationValue, ClassId, ClassKind, Dependency, DependencyKind,
    JavaAccess, JavaAnnotation, JavaClass, JavaMember, MemberId, MemberKind, MethodRef, Modifiers,
    Resolution, TypeRef, TypeReference,
};
pub use pool::{ClassPool, PoolState};
pub use predicate::{ClassPredicate, PredicateBox, PredicateExt};
pub use resolver::{ClassResolver, ClasspathResolver, NoClasspath, ResolveError};
pub use rule::{ArchRule, RuleBox};
pub use source::{Checksum, Source};
pub use types::{LintResult, Location, Severity, Violation, ViolationDiagnostic};
