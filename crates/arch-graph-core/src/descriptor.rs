//! Type descriptor resolution.
//!
//! Turns raw type names as they appear in class files and configuration
//! (`java/lang/Object`, `Ljava/lang/Object;`, `[Ljava.lang.Object;`,
//! `java.lang.Object[]`, `I`, `int`) into canonical [`JavaType`] values.
//!
//! Identity is the binary class name: `java.lang.Object`, `int`,
//! `[Ljava.lang.Object;`, `[[I`. Both the internal and the canonical spelling
//! of a type resolve to the same identity.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Errors raised while resolving type names and descriptors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    /// A name was asserted to be primitive but is not one of the nine primitive names.
    #[error("'{0}' must be a primitive name")]
    NotPrimitive(String),

    /// The string is not a valid type name or descriptor.
    #[error("invalid type descriptor: `{0}`")]
    Invalid(String),

    /// The name mixes `[`-prefixed and `[]`-suffixed array notation.
    #[error("type name mixes internal and canonical array notation: `{0}`")]
    MixedArrayForms(String),
}

/// The closed set of primitive kinds, including `void`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveKind {
    /// `void` (`V`)
    Void,
    /// `boolean` (`Z`)
    Boolean,
    /// `byte` (`B`)
    Byte,
    /// `char` (`C`)
    Char,
    /// `short` (`S`)
    Short,
    /// `int` (`I`)
    Int,
    /// `long` (`J`)
    Long,
    /// `float` (`F`)
    Float,
    /// `double` (`D`)
    Double,
}

impl PrimitiveKind {
    /// All primitive kinds.
    pub const ALL: [PrimitiveKind; 9] = [
        Self::Void,
        Self::Boolean,
        Self::Byte,
        Self::Char,
        Self::Short,
        Self::Int,
        Self::Long,
        Self::Float,
        Self::Double,
    ];

    /// Source-level keyword (`int`, `void`, ...).
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Char => "char",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
        }
    }

    /// Single-letter descriptor (`I`, `V`, ...).
    #[must_use]
    pub fn descriptor(self) -> char {
        match self {
            Self::Void => 'V',
            Self::Boolean => 'Z',
            Self::Byte => 'B',
            Self::Char => 'C',
            Self::Short => 'S',
            Self::Int => 'I',
            Self::Long => 'J',
            Self::Float => 'F',
            Self::Double => 'D',
        }
    }

    /// Looks up a primitive by keyword.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Looks up a primitive by its one-letter descriptor.
    #[must_use]
    pub fn from_descriptor(descriptor: &str) -> Option<Self> {
        let mut chars = descriptor.chars();
        let (Some(c), None) = (chars.next(), chars.next()) else {
            return None;
        };
        Self::ALL.into_iter().find(|p| p.descriptor() == c)
    }

    fn from_name_or_descriptor(raw: &str) -> Option<Self> {
        Self::from_name(raw).or_else(|| Self::from_descriptor(raw))
    }
}

/// Array type: binary name plus the component type one dimension down.
#[derive(Debug, Clone)]
pub struct ArrayType {
    name: Arc<str>,
    component: Arc<JavaType>,
}

/// A structural type handle.
///
/// Equality and hashing use the binary name only.
#[derive(Debug, Clone)]
pub enum JavaType {
    /// One of the nine primitive kinds.
    Primitive(PrimitiveKind),
    /// A class, interface, enum or annotation type (dotted binary name).
    Object(Arc<str>),
    /// An array type.
    Array(ArrayType),
}

impl JavaType {
    /// Resolves any supported spelling of a type name.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError`] if the name is empty or malformed.
    pub fn parse(raw: &str) -> Result<Self, DescriptorError> {
        if raw.is_empty() {
            return Err(DescriptorError::Invalid(raw.to_string()));
        }
        if let Some(kind) = PrimitiveKind::from_name_or_descriptor(raw) {
            return Ok(Self::Primitive(kind));
        }

        let internal_array = raw.starts_with('[');
        let canonical_array = raw.ends_with("[]");
        match (internal_array, canonical_array) {
            (true, true) => Err(DescriptorError::MixedArrayForms(raw.to_string())),
            (true, false) => Self::from_array_name(&raw.replace('/', ".")),
            (false, true) => Self::from_canonical_array(raw),
            (false, false) => {
                let name = raw
                    .strip_prefix('L')
                    .and_then(|rest| rest.strip_suffix(';'))
                    .unwrap_or(raw);
                Self::object(name)
            }
        }
    }

    /// Creates an object type from a dotted or slashed class name.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Invalid`] for empty names or names containing
    /// descriptor punctuation.
    pub fn object(name: &str) -> Result<Self, DescriptorError> {
        if name.is_empty() || name.contains(['[', ']', ';', '(', ')']) {
            return Err(DescriptorError::Invalid(name.to_string()));
        }
        Ok(Self::Object(Arc::from(name.replace('/', ".").as_str())))
    }

    /// Resolves a class name: an object name, a `[`-prefixed array name or a
    /// canonical array name (`a.B[]`). Descriptor letters are not
    /// primitives here, so a class in the default package named `I` stays a
    /// class; primitive keywords (`int`) cannot name a class and stay
    /// primitives.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Invalid`] for malformed names and
    /// [`DescriptorError::MixedArrayForms`] for names using both array forms.
    pub fn class(name: &str) -> Result<Self, DescriptorError> {
        if let Some(kind) = PrimitiveKind::from_name(name) {
            return Ok(Self::Primitive(kind));
        }
        match (name.starts_with('['), name.ends_with("[]")) {
            (true, true) => Err(DescriptorError::MixedArrayForms(name.to_string())),
            (true, false) => Self::from_array_name(&name.replace('/', ".")),
            (false, true) => Self::from_canonical_array(name),
            (false, false) => Self::object(name),
        }
    }

    /// Creates a primitive type, asserting the name is primitive.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::NotPrimitive`] if the name (keyword or
    /// descriptor letter) is not in the primitive set.
    pub fn primitive(name: &str) -> Result<Self, DescriptorError> {
        PrimitiveKind::from_name_or_descriptor(name)
            .map(Self::Primitive)
            .ok_or_else(|| DescriptorError::NotPrimitive(name.to_string()))
    }

    /// Wraps a component type into a one-dimension-deeper array type.
    #[must_use]
    pub fn array_of(component: JavaType) -> Self {
        let name = format!("[{}", component.element_descriptor());
        Self::Array(ArrayType {
            name: Arc::from(name.as_str()),
            component: Arc::new(component),
        })
    }

    /// `name` is a dotted binary array name such as `[[Ljava.lang.Object;`.
    fn from_array_name(name: &str) -> Result<Self, DescriptorError> {
        let Some(rest) = name.strip_prefix('[') else {
            return Err(DescriptorError::Invalid(name.to_string()));
        };
        let component = if rest.starts_with('[') {
            Self::from_array_name(rest)?
        } else if let Some(kind) = PrimitiveKind::from_descriptor(rest) {
            if kind == PrimitiveKind::Void {
                return Err(DescriptorError::Invalid(name.to_string()));
            }
            Self::Primitive(kind)
        } else {
            let object = rest
                .strip_prefix('L')
                .and_then(|r| r.strip_suffix(';'))
                .ok_or_else(|| DescriptorError::Invalid(name.to_string()))?;
            Self::object(object)?
        };
        Ok(Self::Array(ArrayType {
            name: Arc::from(name),
            component: Arc::new(component),
        }))
    }

    fn from_canonical_array(raw: &str) -> Result<Self, DescriptorError> {
        let mut base = raw;
        let mut dimensions = 0usize;
        while let Some(stripped) = base.strip_suffix("[]") {
            base = stripped;
            dimensions += 1;
        }
        if base.contains('[') || base.contains(']') {
            return Err(DescriptorError::MixedArrayForms(raw.to_string()));
        }
        let element = match PrimitiveKind::from_name(base) {
            Some(PrimitiveKind::Void) => return Err(DescriptorError::Invalid(raw.to_string())),
            Some(kind) => Self::Primitive(kind),
            None => Self::object(base)?,
        };
        let mut ty = element;
        for _ in 0..dimensions {
            ty = Self::array_of(ty);
        }
        Ok(ty)
    }

    /// Binary name: `java.lang.Object`, `int`, `[Ljava.lang.Object;`.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Primitive(kind) => kind.name(),
            Self::Object(name) => name,
            Self::Array(array) => &array.name,
        }
    }

    /// Source-style name: `java.lang.Object[]` for arrays, otherwise [`Self::name`].
    #[must_use]
    pub fn canonical_name(&self) -> String {
        match self {
            Self::Array(array) => format!("{}[]", array.component.canonical_name()),
            other => other.name().to_string(),
        }
    }

    /// Simple name: `Object`, `int`, `Object[]`; empty for anonymous classes.
    #[must_use]
    pub fn simple_name(&self) -> String {
        match self {
            Self::Primitive(kind) => kind.name().to_string(),
            Self::Object(name) => simple_name_of(name).to_string(),
            Self::Array(array) => format!("{}[]", array.component.simple_name()),
        }
    }

    /// Package of an object type; empty for primitives and arrays.
    #[must_use]
    pub fn package(&self) -> &str {
        match self {
            Self::Object(name) => name.rsplit_once('.').map_or("", |(pkg, _)| pkg),
            _ => "",
        }
    }

    /// Component type with exactly one array dimension stripped.
    #[must_use]
    pub fn component_type(&self) -> Option<&JavaType> {
        match self {
            Self::Array(array) => Some(&array.component),
            _ => None,
        }
    }

    /// Innermost non-array element type.
    #[must_use]
    pub fn base_component_type(&self) -> &JavaType {
        let mut current = self;
        while let Some(component) = current.component_type() {
            current = component;
        }
        current
    }

    /// Number of array dimensions (0 for non-arrays).
    #[must_use]
    pub fn dimensions(&self) -> usize {
        let mut dims = 0;
        let mut current = self;
        while let Some(component) = current.component_type() {
            dims += 1;
            current = component;
        }
        dims
    }

    /// Whether this is a primitive type (including `void`).
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(self, Self::Primitive(_))
    }

    /// Whether this is an array type.
    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// Slash-separated class file path stem for object types (`java/lang/Object`).
    #[must_use]
    pub fn internal_name(&self) -> Option<String> {
        match self {
            Self::Object(name) => Some(name.replace('.', "/")),
            _ => None,
        }
    }

    /// JVM field descriptor: `I`, `Ljava/lang/Object;`, `[I`.
    #[must_use]
    pub fn descriptor(&self) -> String {
        self.element_descriptor().replace('.', "/")
    }

    /// Descriptor with dotted names, as used inside binary array names.
    fn element_descriptor(&self) -> String {
        match self {
            Self::Primitive(kind) => kind.descriptor().to_string(),
            Self::Object(name) => format!("L{name};"),
            Self::Array(array) => array.name.to_string(),
        }
    }
}

impl PartialEq for JavaType {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for JavaType {}

impl Hash for JavaType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name().hash(state);
    }
}

impl fmt::Display for JavaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Strips the package, the enclosing classes and anonymous-class digits.
pub(crate) fn simple_name_of(name: &str) -> &str {
    let after_package = name.rsplit_once('.').map_or(name, |(_, s)| s);
    let after_outer = after_package
        .rsplit_once('$')
        .map_or(after_package, |(_, s)| s);
    after_outer.trim_start_matches(|c: char| c.is_ascii_digit())
}

/// A parsed method descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Parameter types in declaration order.
    pub parameters: Vec<JavaType>,
    /// Return type (`void` for constructors and procedures).
    pub return_type: JavaType,
}

impl MethodDescriptor {
    /// Parses a descriptor such as `(ILjava/lang/String;)[I`.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Invalid`] if the descriptor is malformed.
    pub fn parse(desc: &str) -> Result<Self, DescriptorError> {
        let invalid = || DescriptorError::Invalid(desc.to_string());
        let mut rest = desc.strip_prefix('(').ok_or_else(invalid)?;
        let mut parameters = Vec::new();
        loop {
            if let Some(after) = rest.strip_prefix(')') {
                rest = after;
                break;
            }
            if rest.is_empty() {
                return Err(invalid());
            }
            let (param, after) = parse_field_type(rest).ok_or_else(invalid)?;
            if param == JavaType::Primitive(PrimitiveKind::Void) {
                return Err(invalid());
            }
            parameters.push(param);
            rest = after;
        }
        let (return_type, after) = parse_field_type(rest).ok_or_else(invalid)?;
        if !after.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            parameters,
            return_type,
        })
    }
}

/// Returns the parameter part of a method descriptor, `(I)` for `(I)V`.
#[must_use]
pub fn parameter_descriptor(desc: &str) -> &str {
    desc.find(')').map_or(desc, |end| &desc[..=end])
}

/// Parses a field descriptor such as `[Ljava/lang/String;`.
///
/// # Errors
///
/// Returns [`DescriptorError::Invalid`] if the descriptor is malformed or
/// has trailing characters.
pub fn parse_field_descriptor(desc: &str) -> Result<JavaType, DescriptorError> {
    match parse_field_type(desc) {
        Some((ty, "")) => Ok(ty),
        _ => Err(DescriptorError::Invalid(desc.to_string())),
    }
}

fn parse_field_type(input: &str) -> Option<(JavaType, &str)> {
    let first = input.chars().next()?;
    match first {
        'L' => {
            let end = input.find(';')?;
            let ty = JavaType::object(&input[1..end]).ok()?;
            Some((ty, &input[end + 1..]))
        }
        '[' => {
            let (component, rest) = parse_field_type(&input[1..])?;
            if component.is_primitive() && component.name() == "void" {
                return None;
            }
            Some((JavaType::array_of(component), rest))
        }
        _ => {
            let split = first.len_utf8();
            let kind = PrimitiveKind::from_descriptor(&input[..split])?;
            Some((JavaType::Primitive(kind), &input[split..]))
        }
    }
}

/// Per-import cache of resolved type descriptors.
///
/// Two requests for the same raw name return equal (and cheaply cloned)
/// values; the cache lives as long as one import run.
#[derive(Debug, Default)]
pub struct DescriptorCache {
    types: HashMap<String, JavaType>,
    fields: HashMap<String, JavaType>,
    methods: HashMap<String, MethodDescriptor>,
}

impl DescriptorCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a type name, caching the result.
    ///
    /// # Errors
    ///
    /// Propagates [`JavaType::parse`] errors; failures are not cached.
    pub fn resolve(&mut self, raw: &str) -> Result<JavaType, DescriptorError> {
        if let Some(ty) = self.types.get(raw) {
            return Ok(ty.clone());
        }
        let ty = JavaType::parse(raw)?;
        self.types.insert(raw.to_string(), ty.clone());
        Ok(ty)
    }

    /// Resolves a field descriptor, caching the result.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Invalid`] for malformed descriptors.
    pub fn field(&mut self, desc: &str) -> Result<JavaType, DescriptorError> {
        if let Some(ty) = self.fields.get(desc) {
            return Ok(ty.clone());
        }
        let ty = parse_field_descriptor(desc)?;
        self.fields.insert(desc.to_string(), ty.clone());
        Ok(ty)
    }

    /// Resolves a method descriptor, caching the result.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Invalid`] for malformed descriptors.
    pub fn method(&mut self, desc: &str) -> Result<MethodDescriptor, DescriptorError> {
        if let Some(md) = self.methods.get(desc) {
            return Ok(md.clone());
        }
        let md = MethodDescriptor::parse(desc)?;
        self.methods.insert(desc.to_string(), md.clone());
        Ok(md)
    }

    /// Number of cached entries across names and descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len() + self.fields.len() + self.methods.len()
    }

    /// Whether nothing has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(ty: &JavaType) -> Vec<String> {
        let mut names = vec![ty.name().to_string()];
        let mut current = ty;
        while let Some(c) = current.component_type() {
            names.push(c.name().to_string());
            current = c;
        }
        names
    }

    #[test]
    fn internal_and_canonical_array_forms_agree() {
        let internal = JavaType::parse("[Ljava.lang.Object;").unwrap();
        let canonical = JavaType::parse("java.lang.Object[]").unwrap();

        assert_eq!(internal, canonical);
        assert_eq!(internal.name(), "[Ljava.lang.Object;");
        assert_eq!(internal.simple_name(), canonical.simple_name());
        assert_eq!(internal.simple_name(), "Object[]");
        assert_eq!(chain(&internal), chain(&canonical));
    }

    #[test]
    fn slashed_array_names_are_normalized() {
        let ty = JavaType::parse("[Ljava/lang/String;").unwrap();
        assert_eq!(ty.name(), "[Ljava.lang.String;");
        assert_eq!(ty.descriptor(), "[Ljava/lang/String;");
    }

    #[test]
    fn multi_dimensional_component_strips_one_level() {
        let ty = JavaType::parse("int[][]").unwrap();
        assert_eq!(ty.name(), "[[I");
        assert_eq!(ty.dimensions(), 2);

        let component = ty.component_type().unwrap();
        assert_eq!(component.name(), "[I");
        assert_eq!(component.simple_name(), "int[]");
        assert_eq!(component.component_type().unwrap().name(), "int");
        assert_eq!(ty.base_component_type(), &JavaType::parse("I").unwrap());
    }

    #[test]
    fn primitive_spellings_map_to_same_type() {
        for kind in PrimitiveKind::ALL {
            let by_name = JavaType::parse(kind.name()).unwrap();
            let by_descriptor = JavaType::parse(&kind.descriptor().to_string()).unwrap();
            assert_eq!(by_name, by_descriptor);
            assert!(by_name.is_primitive());
            assert_eq!(by_name.package(), "");
        }
    }

    #[test]
    fn asserting_primitive_rejects_objects() {
        assert_eq!(
            JavaType::primitive("java.lang.String"),
            Err(DescriptorError::NotPrimitive("java.lang.String".to_string()))
        );
        assert!(JavaType::primitive("long").is_ok());
        assert!(JavaType::primitive("J").is_ok());
    }

    #[test]
    fn object_names_and_packages() {
        let ty = JavaType::parse("com/example/Outer$Inner").unwrap();
        assert_eq!(ty.name(), "com.example.Outer$Inner");
        assert_eq!(ty.simple_name(), "Inner");
        assert_eq!(ty.package(), "com.example");
        assert_eq!(ty.internal_name().as_deref(), Some("com/example/Outer$Inner"));

        let anonymous = JavaType::parse("com.example.Outer$1").unwrap();
        assert_eq!(anonymous.simple_name(), "");

        let default_pkg = JavaType::parse("Foo").unwrap();
        assert_eq!(default_pkg.package(), "");
    }

    #[test]
    fn rejects_mixed_and_malformed_arrays() {
        assert!(matches!(
            JavaType::parse("[Ljava.lang.Object;[]"),
            Err(DescriptorError::MixedArrayForms(_))
        ));
        assert!(JavaType::parse("[").is_err());
        assert!(JavaType::parse("[Ljava.lang.Object").is_err());
        assert!(JavaType::parse("[V").is_err());
        assert!(JavaType::parse("").is_err());
    }

    #[test]
    fn parses_method_descriptors() {
        let md = MethodDescriptor::parse("(ILjava/lang/String;[[J)[Ljava/util/List;").unwrap();
        let params: Vec<&str> = md.parameters.iter().map(JavaType::name).collect();
        assert_eq!(params, vec!["int", "java.lang.String", "[[J"]);
        assert_eq!(md.return_type.name(), "[Ljava.util.List;");

        let void = MethodDescriptor::parse("()V").unwrap();
        assert!(void.parameters.is_empty());
        assert_eq!(void.return_type.name(), "void");

        assert!(MethodDescriptor::parse("(V)V").is_err());
        assert!(MethodDescriptor::parse("(I").is_err());
        assert!(MethodDescriptor::parse("()VX").is_err());
    }

    #[test]
    fn parameter_descriptor_drops_return_type() {
        assert_eq!(parameter_descriptor("(IJ)Ljava/lang/Object;"), "(IJ)");
        assert_eq!(parameter_descriptor("()V"), "()");
    }

    #[test]
    fn cache_returns_equal_values() {
        let mut cache = DescriptorCache::new();
        let a = cache.resolve("java.lang.Object[]").unwrap();
        let b = cache.resolve("java.lang.Object[]").unwrap();
        let c = cache.field("[Ljava/lang/Object;").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(cache.len(), 2);
        assert!(cache.resolve("[").is_err());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn descriptor_letters_stay_class_names() {
        let ty = JavaType::class("I").unwrap();
        assert!(matches!(ty, JavaType::Object(_)));
        assert_eq!(JavaType::parse("I").unwrap().name(), "int");

        let array = JavaType::class("[Ljava/lang/String;").unwrap();
        assert_eq!(array.name(), "[Ljava.lang.String;");
        assert_eq!(array.base_component_type().name(), "java.lang.String");
    }

    #[test]
    fn class_names_accept_both_array_forms() {
        let internal = JavaType::class("[[Lp/A;").unwrap();
        let canonical = JavaType::class("p.A[][]").unwrap();
        assert_eq!(internal, canonical);
        assert_eq!(canonical.name(), "[[Lp.A;");
        assert_eq!(JavaType::class("I[]").unwrap().name(), "[LI;");
        assert_eq!(JavaType::class("int[]").unwrap().name(), "[I");
        assert!(matches!(
            JavaType::class("int").unwrap(),
            JavaType::Primitive(PrimitiveKind::Int)
        ));
        assert!(matches!(
            JavaType::class("[Lp.A;[]"),
            Err(DescriptorError::MixedArrayForms(_))
        ));
    }
}
