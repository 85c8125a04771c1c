//! Mutable registry of everything discovered during one import.

use std::collections::{BTreeMap, VecDeque};

use tracing::debug;

use crate::artifact::Artifact;
use crate::classfile::{read_class, RawClass};
use crate::descriptor::JavaType;
use crate::importer::{DiagnosticKind, ImportDiagnostic};
use crate::resolver::ClassResolver;
use crate::source::Source;

/// How a name entered the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Parsed from the requested artifacts.
    Imported,
    /// Parsed from an artifact the resolver located.
    PulledIn,
    /// Referenced, but no class file is available.
    Missing,
}

#[derive(Debug)]
pub(crate) struct PoolRecord {
    pub(crate) raw: RawClass,
    pub(crate) source: Source,
    pub(crate) pulled_in: bool,
}

#[derive(Debug)]
pub(crate) enum Slot {
    Record(Box<PoolRecord>),
    Missing,
}

/// Class records of one import run, keyed by binary name.
///
/// A name is registered at most once: the first record wins, later
/// duplicates are reported and dropped.
#[derive(Debug, Default)]
pub struct ClassPool {
    slots: BTreeMap<String, Slot>,
    diagnostics: Vec<ImportDiagnostic>,
    checksums: bool,
}

impl ClassPool {
    /// Creates an empty pool; `checksums` applies to classes pulled in later.
    #[must_use]
    pub fn new(checksums: bool) -> Self {
        Self {
            checksums,
            ..Self::default()
        }
    }

    /// Registers an imported class. Returns `false` if the name was already
    /// registered, in which case the record is dropped.
    pub fn add_imported(&mut self, raw: RawClass, source: Source) -> bool {
        match self.slots.get(&raw.name) {
            Some(Slot::Record(existing)) => {
                debug!(
                    "Duplicate class {} in {} (keeping {})",
                    raw.name,
                    source.uri(),
                    existing.source.uri()
                );
                self.diagnostics.push(ImportDiagnostic::new(
                    DiagnosticKind::DuplicateClass,
                    source.uri(),
                    format!(
                        "class {} already imported from {}",
                        raw.name,
                        existing.source.uri()
                    ),
                ));
                false
            }
            _ => {
                let name = raw.name.clone();
                self.slots.insert(
                    name,
                    Slot::Record(Box::new(PoolRecord {
                        raw,
                        source,
                        pulled_in: false,
                    })),
                );
                true
            }
        }
    }

    /// Records a diagnostic raised outside the pool.
    pub(crate) fn report(&mut self, diagnostic: ImportDiagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// State of a registered name.
    #[must_use]
    pub fn state(&self, name: &str) -> Option<PoolState> {
        self.slots.get(name).map(|slot| match slot {
            Slot::Record(r) if r.pulled_in => PoolState::PulledIn,
            Slot::Record(_) => PoolState::Imported,
            Slot::Missing => PoolState::Missing,
        })
    }

    /// Number of registered names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Pulls in every missing supertype (transitively) and the owners of
    /// member accesses of imported classes through `resolver`.
    ///
    /// Names the resolver cannot provide are marked missing and become
    /// stubs when linked.
    pub fn complete(&mut self, resolver: &dyn ClassResolver) {
        let mut queue: VecDeque<String> = VecDeque::new();
        for slot in self.slots.values() {
            if let Slot::Record(record) = slot {
                queue.extend(record.raw.supertype_names().filter_map(class_name_of));
                queue.extend(record.raw.access_owner_names().filter_map(class_name_of));
            }
        }

        let mut pulled = 0usize;
        while let Some(name) = queue.pop_front() {
            if self.slots.contains_key(&name) {
                continue;
            }
            match self.pull(&name, resolver) {
                Some(record) => {
                    queue.extend(record.raw.supertype_names().filter_map(class_name_of));
                    self.slots.insert(name, Slot::Record(record));
                    pulled += 1;
                }
                None => {
                    self.slots.insert(name, Slot::Missing);
                }
            }
        }
        if pulled > 0 {
            debug!("Pulled in {pulled} classes through the resolver");
        }
    }

    /// Marks every referenced supertype and access owner as missing without
    /// consulting any resolver.
    pub fn complete_without_resolver(&mut self) {
        let names: Vec<String> = self
            .slots
            .values()
            .filter_map(|slot| match slot {
                Slot::Record(r) => Some(r),
                Slot::Missing => None,
            })
            .flat_map(|r| {
                r.raw
                    .supertype_names()
                    .chain(r.raw.access_owner_names())
                    .filter_map(class_name_of)
                    .collect::<Vec<_>>()
            })
            .collect();
        for name in names {
            self.slots.entry(name).or_insert(Slot::Missing);
        }
    }

    fn pull(&mut self, name: &str, resolver: &dyn ClassResolver) -> Option<Box<PoolRecord>> {
        let artifact: Artifact = match resolver.locate(name) {
            Ok(Some(artifact)) => artifact,
            Ok(None) => return None,
            Err(err) => {
                self.diagnostics.push(ImportDiagnostic::new(
                    DiagnosticKind::Resolve,
                    format!("class:{name}"),
                    err.to_string(),
                ));
                return None;
            }
        };

        let uri = artifact.origin().uri();
        let bytes = match artifact.bytes() {
            Ok(bytes) => bytes,
            Err(err) => {
                self.diagnostics
                    .push(ImportDiagnostic::new(DiagnosticKind::Read, uri, err.to_string()));
                return None;
            }
        };
        let raw = match read_class(&bytes) {
            Ok(raw) => raw,
            Err(err) => {
                self.diagnostics
                    .push(ImportDiagnostic::new(DiagnosticKind::Parse, uri, err.to_string()));
                return None;
            }
        };
        if raw.name != name {
            self.diagnostics.push(ImportDiagnostic::new(
                DiagnosticKind::Resolve,
                uri,
                format!("expected class {name}, found {}", raw.name),
            ));
            return None;
        }

        debug!("Pulled in {name} from {uri}");
        let source = Source::from_bytes(
            artifact.origin(),
            &bytes,
            raw.source_file.clone(),
            self.checksums,
        );
        Some(Box::new(PoolRecord {
            raw,
            source,
            pulled_in: true,
        }))
    }

    pub(crate) fn into_parts(self) -> (BTreeMap<String, Slot>, Vec<ImportDiagnostic>) {
        (self.slots, self.diagnostics)
    }
}

/// Name of the class file behind a type name; arrays map to their innermost
/// component, primitives and malformed names to nothing.
pub(crate) fn class_name_of(name: &str) -> Option<String> {
    match JavaType::class(name).ok()?.base_component_type() {
        JavaType::Object(object) => Some(object.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::Nesting;
    use crate::resolver::NoClasspath;
    use crate::source::Checksum;

    fn raw(name: &str, super_class: Option<&str>) -> RawClass {
        RawClass {
            name: name.to_string(),
            access_flags: 0x0021,
            major_version: 52,
            minor_version: 0,
            super_class: super_class.map(str::to_string),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            annotations: Vec::new(),
            source_file: None,
            nesting: Nesting::default(),
        }
    }

    fn source(uri: &str) -> Source {
        Source::new(uri, None, Checksum::Disabled)
    }

    #[test]
    fn first_record_wins() {
        let mut pool = ClassPool::new(false);
        assert!(pool.add_imported(raw("a.A", None), source("memory:first")));
        assert!(!pool.add_imported(raw("a.A", None), source("memory:second")));
        assert_eq!(pool.len(), 1);

        let (slots, diagnostics) = pool.into_parts();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::DuplicateClass);
        match &slots["a.A"] {
            Slot::Record(r) => assert_eq!(r.source.uri(), "memory:first"),
            Slot::Missing => panic!("expected a record"),
        }
    }

    #[test]
    fn missing_supertypes_become_markers() {
        let mut pool = ClassPool::new(false);
        pool.add_imported(raw("a.B", Some("a.A")), source("memory:B"));
        pool.complete(&NoClasspath);
        assert_eq!(pool.state("a.B"), Some(PoolState::Imported));
        assert_eq!(pool.state("a.A"), Some(PoolState::Missing));
    }

    #[test]
    fn complete_without_resolver_marks_names() {
        let mut pool = ClassPool::new(false);
        pool.add_imported(raw("a.B", Some("java.lang.Object")), source("memory:B"));
        pool.complete_without_resolver();
        assert_eq!(pool.state("java.lang.Object"), Some(PoolState::Missing));
    }

    #[test]
    fn array_names_map_to_component_class() {
        assert_eq!(
            class_name_of("[[Ljava.lang.String;").as_deref(),
            Some("java.lang.String")
        );
        assert_eq!(class_name_of("[I"), None);
        assert_eq!(class_name_of("int"), None);
    }
}
