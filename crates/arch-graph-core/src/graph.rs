//! The immutable domain graph and its query surface.

use std::collections::HashMap;

use crate::artifact::Artifact;
use crate::descriptor::JavaType;
use crate::model::{
    AccessId, AnnotationValue, ClassId, Dependency, DependencyKind, JavaAccess, JavaAnnotation,
    JavaClass, JavaMember, MemberId, TypeRef,
};
use crate::predicate::ClassPredicate;
use crate::resolver::{ensure_class_type, ClassResolver, ResolveError};

/// Every class, member and access of one import, fully linked.
///
/// Reverse views (subtypes, incoming accesses, dependencies) are computed
/// once at construction. The graph never changes afterwards and can be
/// shared across threads.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainGraph {
    classes: Vec<JavaClass>,
    members: Vec<JavaMember>,
    accesses: Vec<JavaAccess>,
    dependencies: Vec<Dependency>,
    by_name: HashMap<String, ClassId>,
    subtypes: Vec<Vec<ClassId>>,
    accesses_to_member: Vec<Vec<AccessId>>,
    accesses_to_class: Vec<Vec<AccessId>>,
    dependencies_from: Vec<Vec<usize>>,
    dependencies_to: Vec<Vec<usize>>,
}

impl Default for DomainGraph {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new(), Vec::new())
    }
}

impl DomainGraph {
    pub(crate) fn new(
        classes: Vec<JavaClass>,
        members: Vec<JavaMember>,
        accesses: Vec<JavaAccess>,
    ) -> Self {
        let by_name = classes
            .iter()
            .map(|c| (c.name().to_string(), c.id()))
            .collect();

        let mut subtypes = vec![Vec::new(); classes.len()];
        for class in &classes {
            for parent in class.superclass().iter().chain(class.interfaces()) {
                subtypes[parent.index()].push(class.id());
            }
        }

        let mut accesses_to_member = vec![Vec::new(); members.len()];
        let mut accesses_to_class = vec![Vec::new(); classes.len()];
        for access in &accesses {
            accesses_to_class[access.target().owner.index()].push(access.id());
            if let Some(member) = access.target().resolved {
                accesses_to_member[member.index()].push(access.id());
                let declaring = members[member.index()].owner();
                if declaring != access.target().owner {
                    accesses_to_class[declaring.index()].push(access.id());
                }
            }
        }

        let mut graph = Self {
            classes,
            members,
            accesses,
            dependencies: Vec::new(),
            by_name,
            subtypes,
            accesses_to_member,
            accesses_to_class,
            dependencies_from: Vec::new(),
            dependencies_to: Vec::new(),
        };
        graph.index_dependencies();
        graph
    }

    fn index_dependencies(&mut self) {
        let mut dependencies = Vec::new();
        for class in &self.classes {
            let mut collector = DependencyCollector {
                graph: self,
                origin: class.id(),
                out: Vec::new(),
            };
            collector.collect(class);
            let mut found = collector.out;
            found.sort_unstable();
            found.dedup();
            dependencies.extend(found);
        }

        let mut from = vec![Vec::new(); self.classes.len()];
        let mut to = vec![Vec::new(); self.classes.len()];
        for (index, dependency) in dependencies.iter().enumerate() {
            from[dependency.origin.index()].push(index);
            to[dependency.target.index()].push(index);
        }
        self.dependencies = dependencies;
        self.dependencies_from = from;
        self.dependencies_to = to;
    }

    /// Number of class nodes, stubs and arrays included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the graph has no classes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Looks a class up by name.
    ///
    /// Accepts binary names (`a.B$C`), internal names (`a/B$C`), canonical
    /// array names (`a.B[]`) and array descriptors (`[La.B;`).
    #[must_use]
    pub fn class(&self, name: &str) -> Option<&JavaClass> {
        if let Some(id) = self.by_name.get(name) {
            return Some(self.get(*id));
        }
        let ty = JavaType::class(name).ok()?;
        self.by_name.get(ty.name()).map(|id| self.get(*id))
    }

    /// Whether a class with that name is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.class(name).is_some()
    }

    /// Class node by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not come from this graph.
    #[must_use]
    pub fn get(&self, id: ClassId) -> &JavaClass {
        &self.classes[id.index()]
    }

    /// Member node by id.
    #[must_use]
    pub fn member(&self, id: MemberId) -> &JavaMember {
        &self.members[id.index()]
    }

    /// Access edge by id.
    #[must_use]
    pub fn access(&self, id: AccessId) -> &JavaAccess {
        &self.accesses[id.index()]
    }

    /// All classes in id order.
    pub fn classes(&self) -> impl Iterator<Item = &JavaClass> {
        self.classes.iter()
    }

    /// Classes built from class files, stubs excluded.
    pub fn resolved_classes(&self) -> impl Iterator<Item = &JavaClass> {
        self.classes.iter().filter(|c| !c.is_stub())
    }

    /// Classes that were imported, excluding stubs and classes pulled in
    /// through a resolver.
    pub fn imported_classes(&self) -> impl Iterator<Item = &JavaClass> {
        self.classes
            .iter()
            .filter(|c| !c.is_stub() && !c.is_pulled_in())
    }

    /// Lazily yields the classes matching `predicate`.
    pub fn filter<'a, P>(&'a self, predicate: &'a P) -> impl Iterator<Item = &'a JavaClass> + 'a
    where
        P: ClassPredicate + ?Sized,
    {
        self.classes.iter().filter(move |c| predicate.test(c, self))
    }

    /// All access edges in id order.
    pub fn accesses(&self) -> impl Iterator<Item = &JavaAccess> {
        self.accesses.iter()
    }

    /// Outgoing accesses of every member of `class`.
    pub fn accesses_from_class(&self, class: ClassId) -> impl Iterator<Item = &JavaAccess> {
        self.get(class)
            .members()
            .flat_map(move |m| self.member(m).accesses().iter())
            .map(move |a| self.access(*a))
    }

    /// Accesses that resolved to `member`.
    pub fn accesses_to_member(&self, member: MemberId) -> impl Iterator<Item = &JavaAccess> {
        self.accesses_to_member[member.index()]
            .iter()
            .map(move |a| self.access(*a))
    }

    /// Accesses naming `class` as owner or resolving to one of its members.
    pub fn accesses_to_class(&self, class: ClassId) -> impl Iterator<Item = &JavaAccess> {
        self.accesses_to_class[class.index()]
            .iter()
            .map(move |a| self.access(*a))
    }

    /// Classes whose superclass or direct interfaces include `class`.
    #[must_use]
    pub fn direct_subtypes(&self, class: ClassId) -> &[ClassId] {
        &self.subtypes[class.index()]
    }

    /// Every class-level dependency, grouped by origin.
    #[must_use]
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Dependencies originating in `class`.
    pub fn dependencies_from(&self, class: ClassId) -> impl Iterator<Item = &Dependency> {
        self.dependencies_from[class.index()]
            .iter()
            .map(move |i| &self.dependencies[*i])
    }

    /// Dependencies targeting `class`.
    pub fn dependencies_to(&self, class: ClassId) -> impl Iterator<Item = &Dependency> {
        self.dependencies_to[class.index()]
            .iter()
            .map(move |i| &self.dependencies[*i])
    }

    /// Whether `class` is `target` or has it among its ancestors.
    #[must_use]
    pub fn is_assignable_to(&self, class: ClassId, target: &str) -> bool {
        let Some(target) = self.class(target) else {
            return false;
        };
        class == target.id() || self.get(class).ancestors().contains(&target.id())
    }

    /// Finds a member declared in `class` by name, and by descriptor when given.
    #[must_use]
    pub fn find_member(
        &self,
        class: ClassId,
        name: &str,
        descriptor: Option<&str>,
    ) -> Option<&JavaMember> {
        self.get(class)
            .members()
            .map(|m| self.member(m))
            .find(|m| m.name() == name && descriptor.map_or(true, |d| m.descriptor() == d))
    }

    /// `Owner.name(descriptor)` rendering of a member for messages.
    #[must_use]
    pub fn describe_member(&self, member: MemberId) -> String {
        let m = self.member(member);
        let owner = self.get(m.owner()).name();
        if m.descriptor().starts_with('(') {
            format!("{owner}.{}{}", m.name(), m.descriptor())
        } else {
            format!("{owner}.{}", m.name())
        }
    }

    /// Locates the class file behind `class` again through `resolver`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Primitive`] or [`ResolveError::Array`] for
    /// types without a class file, [`ResolveError::NotFound`] if the
    /// resolver does not know the class, and any resolver failure.
    pub fn load_artifact(
        &self,
        class: ClassId,
        resolver: &dyn ClassResolver,
    ) -> Result<Artifact, ResolveError> {
        let name = self.get(class).name();
        ensure_class_type(name)?;
        resolver
            .locate(name)?
            .ok_or_else(|| ResolveError::NotFound(name.to_string()))
    }
}

/// Gathers the dependencies of one class.
struct DependencyCollector<'g> {
    graph: &'g DomainGraph,
    origin: ClassId,
    out: Vec<Dependency>,
}

impl DependencyCollector<'_> {
    fn collect(&mut self, class: &JavaClass) {
        if let Some(superclass) = class.superclass() {
            self.push(superclass, DependencyKind::Extends, None);
        }
        for interface in class.interfaces() {
            self.push(*interface, DependencyKind::Implements, None);
        }
        self.annotations(class.annotations());

        for member in class.members().map(|m| self.graph.member(m)) {
            self.annotations(member.annotations());
            match member.kind() {
                crate::model::MemberKind::Field => {
                    self.push_type(member.value_type(), DependencyKind::FieldType);
                }
                _ => {
                    for parameter in member.parameters() {
                        self.push_type(*parameter, DependencyKind::ParameterType);
                    }
                    self.push_type(member.value_type(), DependencyKind::ReturnType);
                    for thrown in member.throws() {
                        self.push(*thrown, DependencyKind::Throws, None);
                    }
                }
            }
            for access in member.accesses().iter().map(|a| self.graph.access(*a)) {
                self.push(
                    access.target().owner,
                    DependencyKind::Access(access.kind()),
                    Some(access.line()),
                );
            }
        }

        for reference in class.type_references() {
            self.push(
                reference.target,
                DependencyKind::TypeReference,
                Some(reference.line),
            );
        }
    }

    fn annotations(&mut self, annotations: &[JavaAnnotation]) {
        for annotation in annotations {
            self.push(annotation.annotation_type, DependencyKind::Annotation, None);
            for (_, value) in &annotation.values {
                self.annotation_value(value);
            }
        }
    }

    fn annotation_value(&mut self, value: &AnnotationValue) {
        match value {
            AnnotationValue::Const(_) => {}
            AnnotationValue::Enum { enum_type, .. } => {
                self.push(*enum_type, DependencyKind::Annotation, None);
            }
            AnnotationValue::Class(ty) => self.push_type(*ty, DependencyKind::Annotation),
            AnnotationValue::Annotation(nested) => {
                self.annotations(std::slice::from_ref(nested.as_ref()));
            }
            AnnotationValue::Array(values) => {
                for v in values {
                    self.annotation_value(v);
                }
            }
        }
    }

    fn push_type(&mut self, ty: TypeRef, kind: DependencyKind) {
        if let TypeRef::Class(id) = ty {
            self.push(id, kind, None);
        }
    }

    /// Records a dependency on the innermost component of `target`, unless
    /// that is a primitive array or the origin itself.
    fn push(&mut self, target: ClassId, kind: DependencyKind, line: Option<u32>) {
        let mut target = self.graph.get(target);
        while let Some(component) = target.component_type() {
            target = self.graph.get(component);
        }
        if target.is_array() || target.id() == self.origin {
            return;
        }
        self.out.push(Dependency {
            origin: self.origin,
            target: target.id(),
            kind,
            line,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn graph_is_shareable_across_threads() {
        assert_send_sync::<DomainGraph>();
    }

    #[test]
    fn empty_graph_has_no_classes() {
        let graph = DomainGraph::default();
        assert!(graph.is_empty());
        assert!(graph.class("java.lang.Object").is_none());
        assert!(graph.dependencies().is_empty());
    }
}
