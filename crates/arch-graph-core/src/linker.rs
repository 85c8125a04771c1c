//! Turns a completed [`ClassPool`] into the immutable [`DomainGraph`].
//!
//! Linking runs in three passes over the pool, which is ordered by name:
//!
//! 1. type every record (descriptors resolved through one
//!    [`DescriptorCache`]); records with malformed descriptors are dropped
//!    with a diagnostic,
//! 2. create one node per name and wire hierarchy, members and nesting,
//!    creating stubs for every referenced name without a record,
//! 3. compute ancestors, then resolve every access against them.
//!
//! Node ids follow the traversal order, so the same pool always yields the
//! same graph.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::warn;

use crate::classfile::{
    AccessKind, ConstValue, RawAnnotation, RawClass, RawElementValue, RawMethod,
};
use crate::descriptor::{
    parameter_descriptor, DescriptorCache, DescriptorError, JavaType, MethodDescriptor,
};
use crate::graph::DomainGraph;
use crate::importer::{DiagnosticKind, ImportDiagnostic};
use crate::model::{
    AccessId, AccessTarget, AnnotationValue, ClassId, ClassKind, JavaAccess, JavaAnnotation,
    JavaClass, JavaMember, MemberId, MemberKind, MethodRef, Modifiers, Resolution, TypeRef,
    TypeReference,
};
use crate::pool::{ClassPool, PoolRecord, Slot};

const OBJECT: &str = "java.lang.Object";
const CONSTRUCTOR_NAME: &str = "<init>";
const STATIC_INITIALIZER_NAME: &str = "<clinit>";

/// Links the pool. Returns the graph and every diagnostic collected since
/// the pool was created.
#[must_use]
pub fn link(pool: ClassPool) -> (DomainGraph, Vec<ImportDiagnostic>) {
    let (slots, mut diagnostics) = pool.into_parts();
    let mut cache = DescriptorCache::new();

    let mut typed = Vec::new();
    let mut missing = Vec::new();
    for (name, slot) in slots {
        match slot {
            Slot::Record(record) => match TypedClass::new(&record.raw, &mut cache) {
                Ok(types) => typed.push((record, types)),
                Err(err) => {
                    warn!("Dropping {name}: {err}");
                    diagnostics.push(ImportDiagnostic::new(
                        DiagnosticKind::Parse,
                        record.source.uri(),
                        format!("class {name}: {err}"),
                    ));
                }
            },
            Slot::Missing => missing.push(name),
        }
    }

    let mut linker = Linker::default();
    for (_, types) in &typed {
        linker.node(&types.this);
    }
    for name in &missing {
        if let Ok(ty) = JavaType::class(name) {
            linker.intern(&ty);
        }
    }

    let mut bodies = Vec::with_capacity(typed.len());
    for (record, types) in typed {
        let (id, methods) = linker.fill_class(&record, &types);
        bodies.push(Body {
            id,
            record,
            types,
            methods,
        });
    }

    linker.compute_ancestors();
    linker.wire_nesting(&bodies);
    for body in &bodies {
        linker.link_bodies(body);
    }

    let graph = DomainGraph::new(linker.classes, linker.members, linker.accesses);
    (graph, diagnostics)
}

/// A resolved class waiting for its method bodies to be linked.
struct Body {
    id: ClassId,
    record: Box<PoolRecord>,
    types: TypedClass,
    methods: Vec<MemberId>,
}

/// Every type a class file mentions, resolved before any node exists.
struct TypedClass {
    this: JavaType,
    superclass: Option<JavaType>,
    interfaces: Vec<JavaType>,
    enclosing: Option<JavaType>,
    annotations: Vec<TypedAnnotation>,
    fields: Vec<TypedField>,
    methods: Vec<TypedMethod>,
}

struct TypedField {
    value: JavaType,
    annotations: Vec<TypedAnnotation>,
}

struct TypedMethod {
    descriptor: MethodDescriptor,
    throws: Vec<JavaType>,
    access_owners: Vec<JavaType>,
    type_refs: Vec<JavaType>,
    annotations: Vec<TypedAnnotation>,
}

struct TypedAnnotation {
    ty: JavaType,
    values: Vec<(String, TypedValue)>,
}

enum TypedValue {
    Const(ConstValue),
    Enum(JavaType, String),
    Class(JavaType),
    Annotation(Box<TypedAnnotation>),
    Array(Vec<TypedValue>),
}

impl TypedClass {
    fn new(raw: &RawClass, cache: &mut DescriptorCache) -> Result<Self, DescriptorError> {
        let class = |name: &str| JavaType::class(name);
        let this = class(&raw.name)?;
        if !matches!(this, JavaType::Object(_)) {
            return Err(DescriptorError::Invalid(raw.name.clone()));
        }
        Ok(Self {
            this,
            superclass: raw.super_class.as_deref().map(class).transpose()?,
            interfaces: raw
                .interfaces
                .iter()
                .map(|i| class(i))
                .collect::<Result<_, _>>()?,
            enclosing: raw
                .nesting
                .enclosing_class
                .as_deref()
                .map(class)
                .transpose()?,
            annotations: typed_annotations(&raw.annotations, cache)?,
            fields: raw
                .fields
                .iter()
                .map(|f| {
                    Ok(TypedField {
                        value: cache.field(&f.descriptor)?,
                        annotations: typed_annotations(&f.annotations, cache)?,
                    })
                })
                .collect::<Result<_, DescriptorError>>()?,
            methods: raw
                .methods
                .iter()
                .map(|m| TypedMethod::new(m, cache))
                .collect::<Result<_, _>>()?,
        })
    }
}

impl TypedMethod {
    fn new(raw: &RawMethod, cache: &mut DescriptorCache) -> Result<Self, DescriptorError> {
        Ok(Self {
            descriptor: cache.method(&raw.descriptor)?,
            throws: raw
                .throws
                .iter()
                .map(|t| JavaType::class(t))
                .collect::<Result<_, _>>()?,
            access_owners: raw
                .accesses
                .iter()
                .map(|a| JavaType::class(&a.owner))
                .collect::<Result<_, _>>()?,
            type_refs: raw
                .type_refs
                .iter()
                .map(|t| JavaType::class(&t.name))
                .collect::<Result<_, _>>()?,
            annotations: typed_annotations(&raw.annotations, cache)?,
        })
    }
}

fn typed_annotations(
    raw: &[RawAnnotation],
    cache: &mut DescriptorCache,
) -> Result<Vec<TypedAnnotation>, DescriptorError> {
    raw.iter().map(|a| typed_annotation(a, cache)).collect()
}

fn typed_annotation(
    raw: &RawAnnotation,
    cache: &mut DescriptorCache,
) -> Result<TypedAnnotation, DescriptorError> {
    Ok(TypedAnnotation {
        ty: reference_type(&raw.type_descriptor, cache)?,
        values: raw
            .elements
            .iter()
            .map(|(name, value)| Ok((name.clone(), typed_value(value, cache)?)))
            .collect::<Result<_, DescriptorError>>()?,
    })
}

fn typed_value(
    raw: &RawElementValue,
    cache: &mut DescriptorCache,
) -> Result<TypedValue, DescriptorError> {
    Ok(match raw {
        RawElementValue::Const(c) => TypedValue::Const(c.clone()),
        RawElementValue::Enum {
            type_descriptor,
            constant,
        } => TypedValue::Enum(reference_type(type_descriptor, cache)?, constant.clone()),
        RawElementValue::Class(desc) => TypedValue::Class(cache.field(desc)?),
        RawElementValue::Annotation(nested) => {
            TypedValue::Annotation(Box::new(typed_annotation(nested, cache)?))
        }
        RawElementValue::Array(values) => TypedValue::Array(
            values
                .iter()
                .map(|v| typed_value(v, cache))
                .collect::<Result<_, _>>()?,
        ),
    })
}

/// Field descriptor that must name an object or array type.
fn reference_type(desc: &str, cache: &mut DescriptorCache) -> Result<JavaType, DescriptorError> {
    let ty = cache.field(desc)?;
    if ty.is_primitive() {
        return Err(DescriptorError::Invalid(desc.to_string()));
    }
    Ok(ty)
}

#[derive(Default)]
struct Linker {
    ids: HashMap<String, ClassId>,
    classes: Vec<JavaClass>,
    members: Vec<JavaMember>,
    accesses: Vec<JavaAccess>,
}

impl Linker {
    /// Node for an object or array type, created as a stub on first sight.
    /// Primitives have no node.
    fn intern(&mut self, ty: &JavaType) -> Option<ClassId> {
        (!ty.is_primitive()).then(|| self.node(ty))
    }

    /// Same as [`Linker::intern`] for types known not to be primitive.
    fn node(&mut self, ty: &JavaType) -> ClassId {
        if let Some(id) = self.ids.get(ty.name()) {
            return *id;
        }

        let (component_type, superclass) = match ty.component_type() {
            Some(component) => (
                self.intern(component),
                Some(self.node(&JavaType::Object(OBJECT.into()))),
            ),
            None => (None, None),
        };

        let id = ClassId(u32::try_from(self.classes.len()).unwrap_or(u32::MAX));
        self.ids.insert(ty.name().to_string(), id);
        self.classes.push(JavaClass {
            id,
            ty: ty.clone(),
            simple_name: ty.simple_name(),
            kind: ClassKind::Class,
            modifiers: Modifiers::empty(),
            resolution: Resolution::Stub,
            superclass,
            interfaces: Vec::new(),
            component_type,
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            static_initializer: None,
            enclosing_class: None,
            enclosing_method: None,
            nested_classes: Vec::new(),
            annotations: Vec::new(),
            type_references: Vec::new(),
            ancestors: Vec::new(),
        });
        id
    }

    fn type_ref(&mut self, ty: &JavaType) -> TypeRef {
        match ty {
            JavaType::Primitive(kind) => TypeRef::Primitive(*kind),
            other => TypeRef::Class(self.node(other)),
        }
    }

    fn intern_all(&mut self, types: &[JavaType]) -> Vec<ClassId> {
        types.iter().filter_map(|t| self.intern(t)).collect()
    }

    /// Wires hierarchy, annotations and member declarations of a resolved class.
    /// Returns the node id and the member ids of `raw.methods`, in order.
    fn fill_class(&mut self, record: &PoolRecord, types: &TypedClass) -> (ClassId, Vec<MemberId>) {
        let raw = &record.raw;
        let id = self.node(&types.this);

        let superclass = types.superclass.as_ref().and_then(|t| self.intern(t));
        let interfaces = self.intern_all(&types.interfaces);
        let enclosing_class = types.enclosing.as_ref().and_then(|t| self.intern(t));
        let annotations = self.annotations(&types.annotations);

        let mut fields = Vec::with_capacity(raw.fields.len());
        for (field, typed) in raw.fields.iter().zip(&types.fields) {
            let value_type = self.type_ref(&typed.value);
            let annotations = self.annotations(&typed.annotations);
            fields.push(self.add_member(JavaMember {
                id: MemberId(0),
                owner: id,
                kind: MemberKind::Field,
                name: field.name.clone(),
                descriptor: field.descriptor.clone(),
                modifiers: Modifiers::from_field_flags(field.access_flags),
                value_type,
                parameters: Vec::new(),
                throws: Vec::new(),
                annotations,
                accesses: Vec::new(),
                first_line: None,
            }));
        }

        let mut declared = Vec::with_capacity(raw.methods.len());
        let mut methods = Vec::new();
        let mut constructors = Vec::new();
        let mut static_initializer = None;
        for (method, typed) in raw.methods.iter().zip(&types.methods) {
            let kind = match method.name.as_str() {
                CONSTRUCTOR_NAME => MemberKind::Constructor,
                STATIC_INITIALIZER_NAME => MemberKind::StaticInitializer,
                _ => MemberKind::Method,
            };
            let value_type = self.type_ref(&typed.descriptor.return_type);
            let parameters = typed
                .descriptor
                .parameters
                .iter()
                .map(|p| self.type_ref(p))
                .collect();
            let throws = self.intern_all(&typed.throws);
            // Body references get their nodes now so ancestors cover them.
            self.intern_all(&typed.access_owners);
            self.intern_all(&typed.type_refs);
            let annotations = self.annotations(&typed.annotations);
            let member = self.add_member(JavaMember {
                id: MemberId(0),
                owner: id,
                kind,
                name: method.name.clone(),
                descriptor: method.descriptor.clone(),
                modifiers: Modifiers::from_method_flags(method.access_flags),
                value_type,
                parameters,
                throws,
                annotations,
                accesses: Vec::new(),
                first_line: method.first_line,
            });
            declared.push(member);
            match kind {
                MemberKind::Constructor => constructors.push(member),
                MemberKind::StaticInitializer => static_initializer = Some(member),
                _ => methods.push(member),
            }
        }

        let simple_name = if raw.nesting.is_nested() {
            raw.nesting.inner_name.clone().unwrap_or_default()
        } else {
            types.this.simple_name()
        };
        let modifier_flags = raw.nesting.inner_access_flags.unwrap_or(raw.access_flags);

        let class = &mut self.classes[id.index()];
        class.simple_name = simple_name;
        class.kind = ClassKind::from_flags(raw.access_flags);
        class.modifiers = Modifiers::from_class_flags(modifier_flags);
        class.resolution = Resolution::Resolved {
            source: record.source.clone(),
            pulled_in: record.pulled_in,
        };
        class.superclass = superclass;
        class.interfaces = interfaces;
        class.enclosing_class = enclosing_class;
        class.annotations = annotations;
        class.fields = fields;
        class.methods = methods;
        class.constructors = constructors;
        class.static_initializer = static_initializer;
        (id, declared)
    }

    fn add_member(&mut self, mut member: JavaMember) -> MemberId {
        let id = MemberId(u32::try_from(self.members.len()).unwrap_or(u32::MAX));
        member.id = id;
        self.members.push(member);
        id
    }

    fn annotations(&mut self, typed: &[TypedAnnotation]) -> Vec<JavaAnnotation> {
        typed.iter().map(|a| self.annotation(a)).collect()
    }

    fn annotation(&mut self, typed: &TypedAnnotation) -> JavaAnnotation {
        let annotation_type = self.node(&typed.ty);
        let values = typed
            .values
            .iter()
            .map(|(name, value)| (name.clone(), self.annotation_value(value)))
            .collect();
        JavaAnnotation {
            annotation_type,
            values,
        }
    }

    fn annotation_value(&mut self, typed: &TypedValue) -> AnnotationValue {
        match typed {
            TypedValue::Const(c) => AnnotationValue::Const(c.clone()),
            TypedValue::Enum(ty, constant) => AnnotationValue::Enum {
                enum_type: self.node(ty),
                constant: constant.clone(),
            },
            TypedValue::Class(ty) => AnnotationValue::Class(self.type_ref(ty)),
            TypedValue::Annotation(nested) => {
                AnnotationValue::Annotation(Box::new(self.annotation(nested)))
            }
            TypedValue::Array(values) => {
                AnnotationValue::Array(values.iter().map(|v| self.annotation_value(v)).collect())
            }
        }
    }

    /// Superclass chain first, then every reachable interface breadth-first.
    /// Each walk keeps its own visited set, so cyclic hierarchies terminate.
    fn compute_ancestors(&mut self) {
        let mut all = Vec::with_capacity(self.classes.len());
        for class in &self.classes {
            let mut seen = HashSet::from([class.id]);
            let mut ancestors = Vec::new();

            let mut current = class.superclass;
            while let Some(id) = current {
                if !seen.insert(id) {
                    break;
                }
                ancestors.push(id);
                current = self.classes[id.index()].superclass;
            }

            let mut queue: VecDeque<ClassId> = std::iter::once(class.id)
                .chain(ancestors.iter().copied())
                .flat_map(|c| self.classes[c.index()].interfaces.iter().copied())
                .collect();
            while let Some(id) = queue.pop_front() {
                if !seen.insert(id) {
                    continue;
                }
                ancestors.push(id);
                queue.extend(self.classes[id.index()].interfaces.iter().copied());
                if let Some(superclass) = self.classes[id.index()].superclass {
                    queue.push_back(superclass);
                }
            }
            all.push(ancestors);
        }
        for (class, ancestors) in self.classes.iter_mut().zip(all) {
            class.ancestors = ancestors;
        }
    }

    fn wire_nesting(&mut self, bodies: &[Body]) {
        let mut nested: Vec<(ClassId, ClassId)> = self
            .classes
            .iter()
            .filter_map(|c| c.enclosing_class.map(|outer| (outer, c.id)))
            .collect();
        nested.sort_unstable();
        for (outer, inner) in nested {
            self.classes[outer.index()].nested_classes.push(inner);
        }

        for body in bodies {
            let nesting = &body.record.raw.nesting;
            if !nesting.local {
                continue;
            }
            let Some(owner) = self.classes[body.id.index()].enclosing_class else {
                continue;
            };
            let resolved = nesting.enclosing_method.as_ref().and_then(|(name, descriptor)| {
                self.classes[owner.index()]
                    .members()
                    .find(|m| {
                        let m = &self.members[m.index()];
                        m.kind != MemberKind::Field && m.name == *name && m.descriptor == *descriptor
                    })
            });
            let (name, descriptor) = nesting.enclosing_method.clone().unzip();
            self.classes[body.id.index()].enclosing_method = Some(MethodRef {
                owner,
                name,
                descriptor,
                resolved,
            });
        }
    }

    /// Creates access edges and type references for every code-bearing member.
    fn link_bodies(&mut self, body: &Body) {
        let raw = &body.record.raw;
        let mut type_references = Vec::new();
        for ((method, typed), &origin) in raw
            .methods
            .iter()
            .zip(&body.types.methods)
            .zip(&body.methods)
        {
            let mut outgoing = Vec::with_capacity(method.accesses.len());
            for (access, owner_ty) in method.accesses.iter().zip(&typed.access_owners) {
                let Some(owner) = self.intern(owner_ty) else {
                    continue;
                };
                let resolved = self.resolve(owner, access.kind, &access.name, &access.descriptor);
                let id = AccessId(u32::try_from(self.accesses.len()).unwrap_or(u32::MAX));
                self.accesses.push(JavaAccess {
                    id,
                    origin,
                    kind: access.kind,
                    target: AccessTarget {
                        owner,
                        name: access.name.clone(),
                        descriptor: access.descriptor.clone(),
                        resolved,
                    },
                    line: access.line,
                });
                outgoing.push(id);
            }
            self.members[origin.index()].accesses = outgoing;

            for (type_ref, ty) in method.type_refs.iter().zip(&typed.type_refs) {
                if let Some(target) = self.intern(ty) {
                    type_references.push(TypeReference {
                        origin,
                        target,
                        line: type_ref.line,
                    });
                }
            }
        }
        self.classes[body.id.index()].type_references = type_references;
    }

    /// Most specific declaration of the accessed member: the owner, then its
    /// superclass chain, then interfaces. Among several interface
    /// declarations the most derived declaring type wins, then a
    /// non-abstract (default) method, then the first found breadth-first.
    fn resolve(
        &self,
        owner: ClassId,
        kind: AccessKind,
        name: &str,
        descriptor: &str,
    ) -> Option<MemberId> {
        let matches = |member: &JavaMember| match kind {
            AccessKind::GetField | AccessKind::SetField => {
                member.kind == MemberKind::Field && member.name == name
            }
            AccessKind::ConstructorCall => {
                member.kind == MemberKind::Constructor && member.descriptor == descriptor
            }
            AccessKind::MethodCall => {
                member.kind == MemberKind::Method
                    && member.name == name
                    && parameter_descriptor(&member.descriptor) == parameter_descriptor(descriptor)
            }
        };
        let declared_in = |class: ClassId| {
            self.classes[class.index()]
                .members()
                .find(|m| matches(&self.members[m.index()]))
        };

        if let Some(found) = declared_in(owner) {
            return Some(found);
        }
        if kind == AccessKind::ConstructorCall {
            return None;
        }

        let owner_class = &self.classes[owner.index()];
        let mut chain_len = 0;
        let mut current = owner_class.superclass;
        while let Some(id) = current {
            if owner_class.ancestors.get(chain_len) != Some(&id) {
                break;
            }
            if let Some(found) = declared_in(id) {
                return Some(found);
            }
            chain_len += 1;
            current = self.classes[id.index()].superclass;
        }

        let candidates: Vec<MemberId> = owner_class.ancestors[chain_len..]
            .iter()
            .filter_map(|&id| declared_in(id))
            .collect();
        self.pick_interface_candidate(&candidates)
    }

    fn pick_interface_candidate(&self, candidates: &[MemberId]) -> Option<MemberId> {
        if candidates.len() <= 1 {
            return candidates.first().copied();
        }
        let owner_of = |m: &MemberId| self.members[m.index()].owner;
        let most_derived: Vec<MemberId> = candidates
            .iter()
            .copied()
            .filter(|candidate| {
                let declaring = owner_of(candidate);
                !candidates.iter().any(|other| {
                    let other_owner = owner_of(other);
                    other_owner != declaring
                        && self.classes[other_owner.index()]
                            .ancestors
                            .contains(&declaring)
                })
            })
            .collect();
        most_derived
            .iter()
            .copied()
            .find(|m| !self.members[m.index()].is_abstract())
            .or_else(|| most_derived.first().copied())
    }
}
