//! Domain objects of the finished graph.
//!
//! Nodes reference each other through arena ids ([`ClassId`], [`MemberId`],
//! [`AccessId`]) that index into the owning [`DomainGraph`](crate::DomainGraph).

use std::fmt;

use crate::classfile::{AccessKind, ConstValue};
use crate::descriptor::{JavaType, PrimitiveKind};
use crate::source::Source;

/// Index of a class node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub(crate) u32);

/// Index of a member node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(pub(crate) u32);

/// Index of an access edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccessId(pub(crate) u32);

impl ClassId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl MemberId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl AccessId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

bitflags::bitflags! {
    /// Source-level modifiers of classes and members.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u16 {
        /// `public`
        const PUBLIC = 1;
        /// `private`
        const PRIVATE = 1 << 1;
        /// `protected`
        const PROTECTED = 1 << 2;
        /// `static`
        const STATIC = 1 << 3;
        /// `final`
        const FINAL = 1 << 4;
        /// `abstract`
        const ABSTRACT = 1 << 5;
        /// `synchronized`
        const SYNCHRONIZED = 1 << 6;
        /// `volatile`
        const VOLATILE = 1 << 7;
        /// `transient`
        const TRANSIENT = 1 << 8;
        /// `native`
        const NATIVE = 1 << 9;
        /// `strictfp`
        const STRICT = 1 << 10;
        /// Compiler generated.
        const SYNTHETIC = 1 << 11;
        /// Compiler generated bridge method.
        const BRIDGE = 1 << 12;
        /// Variable arity method.
        const VARARGS = 1 << 13;
    }
}

// JVM access flag bits (JVMS 4.1, 4.5, 4.6).
const ACC_PUBLIC: u16 = 0x0001;
const ACC_PRIVATE: u16 = 0x0002;
const ACC_PROTECTED: u16 = 0x0004;
const ACC_STATIC: u16 = 0x0008;
const ACC_FINAL: u16 = 0x0010;
const ACC_SYNCHRONIZED: u16 = 0x0020;
const ACC_VOLATILE_OR_BRIDGE: u16 = 0x0040;
const ACC_TRANSIENT_OR_VARARGS: u16 = 0x0080;
const ACC_NATIVE: u16 = 0x0100;
const ACC_INTERFACE: u16 = 0x0200;
const ACC_ABSTRACT: u16 = 0x0400;
const ACC_STRICT: u16 = 0x0800;
const ACC_SYNTHETIC: u16 = 0x1000;
const ACC_ANNOTATION: u16 = 0x2000;
const ACC_ENUM: u16 = 0x4000;

impl Modifiers {
    fn common(flags: u16) -> Self {
        let mut m = Self::empty();
        m.set(Self::PUBLIC, flags & ACC_PUBLIC != 0);
        m.set(Self::PRIVATE, flags & ACC_PRIVATE != 0);
        m.set(Self::PROTECTED, flags & ACC_PROTECTED != 0);
        m.set(Self::STATIC, flags & ACC_STATIC != 0);
        m.set(Self::FINAL, flags & ACC_FINAL != 0);
        m.set(Self::ABSTRACT, flags & ACC_ABSTRACT != 0);
        m.set(Self::SYNTHETIC, flags & ACC_SYNTHETIC != 0);
        m
    }

    /// Modifiers of a class from its `access_flags` (0x0020 is `ACC_SUPER` here).
    #[must_use]
    pub fn from_class_flags(flags: u16) -> Self {
        Self::common(flags)
    }

    /// Modifiers of a field.
    #[must_use]
    pub fn from_field_flags(flags: u16) -> Self {
        let mut m = Self::common(flags);
        m.set(Self::VOLATILE, flags & ACC_VOLATILE_OR_BRIDGE != 0);
        m.set(Self::TRANSIENT, flags & ACC_TRANSIENT_OR_VARARGS != 0);
        m
    }

    /// Modifiers of a method or constructor.
    #[must_use]
    pub fn from_method_flags(flags: u16) -> Self {
        let mut m = Self::common(flags);
        m.set(Self::SYNCHRONIZED, flags & ACC_SYNCHRONIZED != 0);
        m.set(Self::BRIDGE, flags & ACC_VOLATILE_OR_BRIDGE != 0);
        m.set(Self::VARARGS, flags & ACC_TRANSIENT_OR_VARARGS != 0);
        m.set(Self::NATIVE, flags & ACC_NATIVE != 0);
        m.set(Self::STRICT, flags & ACC_STRICT != 0);
        m
    }
}

/// What kind of type a class node declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    /// Ordinary class, also used for stubs and arrays.
    Class,
    /// Interface.
    Interface,
    /// Enum.
    Enum,
    /// Annotation type.
    Annotation,
}

impl ClassKind {
    pub(crate) fn from_flags(flags: u16) -> Self {
        if flags & ACC_ANNOTATION != 0 {
            Self::Annotation
        } else if flags & ACC_INTERFACE != 0 {
            Self::Interface
        } else if flags & ACC_ENUM != 0 {
            Self::Enum
        } else {
            Self::Class
        }
    }
}

impl fmt::Display for ClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Enum => "enum",
            Self::Annotation => "annotation",
        })
    }
}

/// Whether a class node was built from a class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Built from a class file, imported or pulled in through the resolver.
    Resolved {
        /// Where the class file came from.
        source: Source,
        /// `true` if the class was pulled in to complete the hierarchy.
        pulled_in: bool,
    },
    /// Only the name is known.
    Stub,
}

/// A type as referenced from a member signature or annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// Primitive types have no node.
    Primitive(PrimitiveKind),
    /// Object and array types.
    Class(ClassId),
}

/// A class, interface, enum, annotation or array type.
#[derive(Debug, Clone, PartialEq)]
pub struct JavaClass {
    pub(crate) id: ClassId,
    pub(crate) ty: JavaType,
    pub(crate) simple_name: String,
    pub(crate) kind: ClassKind,
    pub(crate) modifiers: Modifiers,
    pub(crate) resolution: Resolution,
    pub(crate) superclass: Option<ClassId>,
    pub(crate) interfaces: Vec<ClassId>,
    pub(crate) component_type: Option<ClassId>,
    pub(crate) fields: Vec<MemberId>,
    pub(crate) methods: Vec<MemberId>,
    pub(crate) constructors: Vec<MemberId>,
    pub(crate) static_initializer: Option<MemberId>,
    pub(crate) enclosing_class: Option<ClassId>,
    pub(crate) enclosing_method: Option<MethodRef>,
    pub(crate) nested_classes: Vec<ClassId>,
    pub(crate) annotations: Vec<JavaAnnotation>,
    pub(crate) type_references: Vec<TypeReference>,
    pub(crate) ancestors: Vec<ClassId>,
}

impl JavaClass {
    /// Arena id.
    #[must_use]
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Binary name, e.g. `com.example.Outer$Inner` or `[Ljava.lang.Object;`.
    #[must_use]
    pub fn name(&self) -> &str {
        self.ty.name()
    }

    /// Simple name as declared; empty for anonymous classes.
    #[must_use]
    pub fn simple_name(&self) -> &str {
        &self.simple_name
    }

    /// Package name; empty for the default package and arrays.
    #[must_use]
    pub fn package(&self) -> &str {
        self.ty.package()
    }

    /// The type descriptor this node stands for.
    #[must_use]
    pub fn java_type(&self) -> &JavaType {
        &self.ty
    }

    /// Declared kind.
    #[must_use]
    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    /// Declared modifiers (nested classes use the `InnerClasses` flags).
    #[must_use]
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Resolution state.
    #[must_use]
    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    /// Whether only the name of this class is known.
    #[must_use]
    pub fn is_stub(&self) -> bool {
        matches!(self.resolution, Resolution::Stub)
    }

    /// Whether this class was pulled in through the resolver rather than imported.
    #[must_use]
    pub fn is_pulled_in(&self) -> bool {
        matches!(
            self.resolution,
            Resolution::Resolved {
                pulled_in: true,
                ..
            }
        )
    }

    /// Provenance, for resolved classes.
    #[must_use]
    pub fn source(&self) -> Option<&Source> {
        match &self.resolution {
            Resolution::Resolved { source, .. } => Some(source),
            Resolution::Stub => None,
        }
    }

    /// Whether the class is an interface (annotation types included).
    #[must_use]
    pub fn is_interface(&self) -> bool {
        matches!(self.kind, ClassKind::Interface | ClassKind::Annotation)
    }

    /// Whether the class is an array type.
    #[must_use]
    pub fn is_array(&self) -> bool {
        self.ty.is_array()
    }

    /// Direct superclass.
    #[must_use]
    pub fn superclass(&self) -> Option<ClassId> {
        self.superclass
    }

    /// Direct superinterfaces in declaration order.
    #[must_use]
    pub fn interfaces(&self) -> &[ClassId] {
        &self.interfaces
    }

    /// Component type for arrays, one dimension stripped.
    #[must_use]
    pub fn component_type(&self) -> Option<ClassId> {
        self.component_type
    }

    /// Declared fields.
    #[must_use]
    pub fn fields(&self) -> &[MemberId] {
        &self.fields
    }

    /// Declared methods (constructors and the static initializer excluded).
    #[must_use]
    pub fn methods(&self) -> &[MemberId] {
        &self.methods
    }

    /// Declared constructors.
    #[must_use]
    pub fn constructors(&self) -> &[MemberId] {
        &self.constructors
    }

    /// The `<clinit>` method, if any.
    #[must_use]
    pub fn static_initializer(&self) -> Option<MemberId> {
        self.static_initializer
    }

    /// Every declared member: fields, constructors, methods and the static initializer.
    pub fn members(&self) -> impl Iterator<Item = MemberId> + '_ {
        self.fields
            .iter()
            .chain(&self.constructors)
            .chain(&self.methods)
            .copied()
            .chain(self.static_initializer)
    }

    /// Directly enclosing class for nested, local and anonymous classes.
    #[must_use]
    pub fn enclosing_class(&self) -> Option<ClassId> {
        self.enclosing_class
    }

    /// Enclosing method for local and anonymous classes.
    #[must_use]
    pub fn enclosing_method(&self) -> Option<&MethodRef> {
        self.enclosing_method.as_ref()
    }

    /// Classes directly nested in this one.
    #[must_use]
    pub fn nested_classes(&self) -> &[ClassId] {
        &self.nested_classes
    }

    /// Whether the class is declared inside another class.
    #[must_use]
    pub fn is_nested(&self) -> bool {
        self.enclosing_class.is_some()
    }

    /// Whether the class has no source name.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.is_nested() && self.simple_name.is_empty()
    }

    /// Class annotations.
    #[must_use]
    pub fn annotations(&self) -> &[JavaAnnotation] {
        &self.annotations
    }

    /// Class references from method bodies (`new`, casts, `instanceof`,
    /// class literals, caught exceptions).
    #[must_use]
    pub fn type_references(&self) -> &[TypeReference] {
        &self.type_references
    }

    /// Every transitive supertype, superclass chain first, then interfaces
    /// breadth-first. Never contains the class itself.
    #[must_use]
    pub fn ancestors(&self) -> &[ClassId] {
        &self.ancestors
    }
}

/// A method named by owner, name and descriptor, resolved or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRef {
    /// Declaring class.
    pub owner: ClassId,
    /// Method name, `None` when the class is declared in an initializer.
    pub name: Option<String>,
    /// Method descriptor.
    pub descriptor: Option<String>,
    /// The member, if the owner declares it.
    pub resolved: Option<MemberId>,
}

/// Kind of member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Field.
    Field,
    /// Method.
    Method,
    /// Constructor (`<init>`).
    Constructor,
    /// Static initializer (`<clinit>`).
    StaticInitializer,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Field => "field",
            Self::Method => "method",
            Self::Constructor => "constructor",
            Self::StaticInitializer => "static initializer",
        })
    }
}

/// A field, method, constructor or static initializer.
#[derive(Debug, Clone, PartialEq)]
pub struct JavaMember {
    pub(crate) id: MemberId,
    pub(crate) owner: ClassId,
    pub(crate) kind: MemberKind,
    pub(crate) name: String,
    pub(crate) descriptor: String,
    pub(crate) modifiers: Modifiers,
    pub(crate) value_type: TypeRef,
    pub(crate) parameters: Vec<TypeRef>,
    pub(crate) throws: Vec<ClassId>,
    pub(crate) annotations: Vec<JavaAnnotation>,
    pub(crate) accesses: Vec<AccessId>,
    pub(crate) first_line: Option<u32>,
}

impl JavaMember {
    /// Arena id.
    #[must_use]
    pub fn id(&self) -> MemberId {
        self.id
    }

    /// Declaring class.
    #[must_use]
    pub fn owner(&self) -> ClassId {
        self.owner
    }

    /// Member kind.
    #[must_use]
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Name as written (`<init>`, `<clinit>` for the special methods).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw field or method descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Declared modifiers.
    #[must_use]
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Field type, or method return type (`void` for constructors).
    #[must_use]
    pub fn value_type(&self) -> TypeRef {
        self.value_type
    }

    /// Parameter types; empty for fields.
    #[must_use]
    pub fn parameters(&self) -> &[TypeRef] {
        &self.parameters
    }

    /// Declared thrown exceptions.
    #[must_use]
    pub fn throws(&self) -> &[ClassId] {
        &self.throws
    }

    /// Member annotations.
    #[must_use]
    pub fn annotations(&self) -> &[JavaAnnotation] {
        &self.annotations
    }

    /// Outgoing accesses of the member body, in instruction order.
    #[must_use]
    pub fn accesses(&self) -> &[AccessId] {
        &self.accesses
    }

    /// First source line of the body.
    #[must_use]
    pub fn first_line(&self) -> Option<u32> {
        self.first_line
    }

    /// Whether the member is abstract.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.modifiers.contains(Modifiers::ABSTRACT)
    }
}

/// Symbolic target of an access plus the declaration it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTarget {
    /// Owner named by the instruction.
    pub owner: ClassId,
    /// Member name.
    pub name: String,
    /// Raw descriptor.
    pub descriptor: String,
    /// Most specific declaration found in the owner's hierarchy.
    pub resolved: Option<MemberId>,
}

/// An instruction-level access from one member to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaAccess {
    pub(crate) id: AccessId,
    pub(crate) origin: MemberId,
    pub(crate) kind: AccessKind,
    pub(crate) target: AccessTarget,
    pub(crate) line: u32,
}

impl JavaAccess {
    /// Arena id.
    #[must_use]
    pub fn id(&self) -> AccessId {
        self.id
    }

    /// Member whose body contains the access.
    #[must_use]
    pub fn origin(&self) -> MemberId {
        self.origin
    }

    /// Kind of instruction.
    #[must_use]
    pub fn kind(&self) -> AccessKind {
        self.kind
    }

    /// Target reference.
    #[must_use]
    pub fn target(&self) -> &AccessTarget {
        &self.target
    }

    /// Source line, 0 if unknown.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }
}

/// A class reference from a method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeReference {
    /// Method containing the reference.
    pub origin: MemberId,
    /// Referenced class.
    pub target: ClassId,
    /// Source line, 0 if unknown.
    pub line: u32,
}

/// An annotation with resolved types.
#[derive(Debug, Clone, PartialEq)]
pub struct JavaAnnotation {
    /// Annotation type.
    pub annotation_type: ClassId,
    /// Element values in declaration order.
    pub values: Vec<(String, AnnotationValue)>,
}

impl JavaAnnotation {
    /// Looks up an element value by name.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&AnnotationValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// An annotation element value.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    /// Primitive or string constant.
    Const(ConstValue),
    /// Enum constant.
    Enum {
        /// Enum type.
        enum_type: ClassId,
        /// Constant name.
        constant: String,
    },
    /// Class literal.
    Class(TypeRef),
    /// Nested annotation.
    Annotation(Box<JavaAnnotation>),
    /// Array of values.
    Array(Vec<AnnotationValue>),
}

/// Why one class depends on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DependencyKind {
    /// Superclass.
    Extends,
    /// Implemented or extended interface.
    Implements,
    /// Field type.
    FieldType,
    /// Method or constructor parameter type.
    ParameterType,
    /// Method return type.
    ReturnType,
    /// Declared thrown exception.
    Throws,
    /// Member access from a method body.
    Access(AccessKind),
    /// `new`, cast, `instanceof`, class literal or caught exception.
    TypeReference,
    /// Annotation type or annotation element type.
    Annotation,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Extends => "extends",
            Self::Implements => "implements",
            Self::FieldType => "has field of type",
            Self::ParameterType => "has parameter of type",
            Self::ReturnType => "has return type",
            Self::Throws => "throws",
            Self::Access(AccessKind::GetField) => "gets field of",
            Self::Access(AccessKind::SetField) => "sets field of",
            Self::Access(AccessKind::MethodCall) => "calls method of",
            Self::Access(AccessKind::ConstructorCall) => "calls constructor of",
            Self::TypeReference => "references",
            Self::Annotation => "is annotated with",
        })
    }
}

/// A class-level dependency.
///
/// Array targets are replaced by their innermost component; dependencies on
/// primitives and on the origin itself are not recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Dependency {
    /// Depending class.
    pub origin: ClassId,
    /// Class depended upon.
    pub target: ClassId,
    /// Why.
    pub kind: DependencyKind,
    /// Source line for dependencies from method bodies.
    pub line: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_flags_reuse_bits_differently_from_fields() {
        let flags = ACC_PUBLIC | ACC_VOLATILE_OR_BRIDGE | ACC_TRANSIENT_OR_VARARGS;
        assert_eq!(
            Modifiers::from_field_flags(flags),
            Modifiers::PUBLIC | Modifiers::VOLATILE | Modifiers::TRANSIENT
        );
        assert_eq!(
            Modifiers::from_method_flags(flags),
            Modifiers::PUBLIC | Modifiers::BRIDGE | Modifiers::VARARGS
        );
    }

    #[test]
    fn acc_super_is_not_synchronized_on_classes() {
        let m = Modifiers::from_class_flags(ACC_PUBLIC | ACC_SYNCHRONIZED);
        assert_eq!(m, Modifiers::PUBLIC);
    }

    #[test]
    fn class_kind_from_flags() {
        assert_eq!(ClassKind::from_flags(ACC_PUBLIC), ClassKind::Class);
        assert_eq!(
            ClassKind::from_flags(ACC_INTERFACE | ACC_ABSTRACT),
            ClassKind::Interface
        );
        assert_eq!(
            ClassKind::from_flags(ACC_INTERFACE | ACC_ABSTRACT | ACC_ANNOTATION),
            ClassKind::Annotation
        );
        assert_eq!(ClassKind::from_flags(ACC_FINAL | ACC_ENUM), ClassKind::Enum);
    }
}
