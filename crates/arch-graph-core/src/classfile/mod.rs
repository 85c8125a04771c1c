//! Class file reader.
//!
//! [`read_class`] turns the bytes of one `.class` file into a [`RawClass`]:
//! a flat, purely syntactic record. Names are converted to their dotted
//! binary form, but nothing is looked up in other classes.

mod annotation;
mod bytecode;
mod constant_pool;
mod reader;

pub use annotation::{ConstValue, RawAnnotation, RawElementValue};

use constant_pool::ConstantPool;
use reader::Reader;

use bytecode::binary_name;

const MAGIC: u32 = 0xCAFE_BABE;
const MIN_MAJOR_VERSION: u16 = 45;
/// Newest class file major version accepted (Java 26).
pub const MAX_MAJOR_VERSION: u16 = 70;

/// Errors raised while reading a class file.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClassFileError {
    /// Input ended in the middle of a structure.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// The file does not start with `0xCAFEBABE`.
    #[error("invalid class file magic: 0x{0:08x}")]
    InvalidMagic(u32),

    /// Major version outside the supported range.
    #[error("unsupported class file major version {0}")]
    UnsupportedVersion(u16),

    /// A constant pool index is zero, out of range or points into a long/double.
    #[error("invalid constant pool index: {0}")]
    InvalidConstantPoolIndex(u16),

    /// Unknown constant pool tag.
    #[error("invalid constant pool tag: {0}")]
    InvalidConstantPoolTag(u8),

    /// A constant pool entry has an unexpected type.
    #[error("constant pool type mismatch at index {index}: expected {expected}, found {found}")]
    ConstantPoolTypeMismatch {
        /// Index of the offending entry.
        index: u16,
        /// Expected entry kind.
        expected: &'static str,
        /// Actual entry kind.
        found: &'static str,
    },

    /// A `CONSTANT_Utf8` entry is not valid modified UTF-8.
    #[error("invalid modified UTF-8 constant")]
    InvalidModifiedUtf8,

    /// An attribute has an inconsistent layout.
    #[error("malformed {0} attribute")]
    MalformedAttribute(&'static str),

    /// The instruction stream of a method cannot be decoded.
    #[error("invalid bytecode at offset {offset}: {reason}")]
    InvalidBytecode {
        /// Offset of the instruction in the code array.
        offset: usize,
        /// What went wrong.
        reason: &'static str,
    },

    /// Data left after the last class file structure.
    #[error("{0} trailing bytes after class file")]
    TrailingBytes(usize),
}

/// Kind of an instruction-level access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AccessKind {
    /// `getfield` / `getstatic`
    GetField,
    /// `putfield` / `putstatic`
    SetField,
    /// `invokevirtual`, `invokestatic`, `invokeinterface`, non-constructor `invokespecial`
    MethodCall,
    /// `invokespecial` of `<init>`
    ConstructorCall,
}

impl AccessKind {
    /// Whether the access targets a field.
    #[must_use]
    pub fn is_field_access(self) -> bool {
        matches!(self, Self::GetField | Self::SetField)
    }
}

/// An unresolved member access from a method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAccess {
    /// What kind of instruction produced the access.
    pub kind: AccessKind,
    /// Binary name of the symbolic owner (may be an array type).
    pub owner: String,
    /// Member name.
    pub name: String,
    /// Raw field or method descriptor.
    pub descriptor: String,
    /// Source line, 0 if the method has no line table.
    pub line: u32,
}

/// A class reference from a method body (`new`, `checkcast`, `instanceof`,
/// class literals, caught exceptions).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTypeRef {
    /// Binary name of the referenced type.
    pub name: String,
    /// Source line, 0 if unknown.
    pub line: u32,
}

/// A field declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct RawField {
    /// Field name.
    pub name: String,
    /// Field descriptor.
    pub descriptor: String,
    /// `access_flags` as written.
    pub access_flags: u16,
    /// Visible and invisible annotations.
    pub annotations: Vec<RawAnnotation>,
}

/// A method, constructor or static initializer declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMethod {
    /// Method name (`<init>` for constructors, `<clinit>` for the static initializer).
    pub name: String,
    /// Method descriptor.
    pub descriptor: String,
    /// `access_flags` as written.
    pub access_flags: u16,
    /// Visible and invisible annotations.
    pub annotations: Vec<RawAnnotation>,
    /// Binary names from the `Exceptions` attribute.
    pub throws: Vec<String>,
    /// Accesses found in the method body.
    pub accesses: Vec<RawAccess>,
    /// Class references found in the method body.
    pub type_refs: Vec<RawTypeRef>,
    /// Lowest line number of the method body.
    pub first_line: Option<u32>,
}

/// Nesting metadata from `InnerClasses` and `EnclosingMethod`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Nesting {
    /// Binary name of the directly enclosing class.
    pub enclosing_class: Option<String>,
    /// Simple name as declared; `None` for anonymous classes.
    pub inner_name: Option<String>,
    /// Access flags as declared in source (the only place `static`,
    /// `private` and `protected` of nested classes are recorded).
    pub inner_access_flags: Option<u16>,
    /// Whether an `EnclosingMethod` attribute is present, i.e. the class
    /// is local or anonymous.
    pub local: bool,
    /// Enclosing method name and descriptor; `None` for classes declared
    /// in an initializer.
    pub enclosing_method: Option<(String, String)>,
}

impl Nesting {
    /// Whether the class is declared inside another class.
    #[must_use]
    pub fn is_nested(&self) -> bool {
        self.enclosing_class.is_some()
    }
}

/// The syntactic content of one class file.
#[derive(Debug, Clone, PartialEq)]
pub struct RawClass {
    /// Dotted binary name, e.g. `com.example.Outer$Inner`.
    pub name: String,
    /// `access_flags` as written.
    pub access_flags: u16,
    /// Class file major version.
    pub major_version: u16,
    /// Class file minor version.
    pub minor_version: u16,
    /// Superclass binary name; `None` only for `java.lang.Object` and `module-info`.
    pub super_class: Option<String>,
    /// Direct superinterfaces in declaration order.
    pub interfaces: Vec<String>,
    /// Declared fields.
    pub fields: Vec<RawField>,
    /// Declared methods, constructors and the static initializer.
    pub methods: Vec<RawMethod>,
    /// Visible and invisible class annotations.
    pub annotations: Vec<RawAnnotation>,
    /// `SourceFile` attribute.
    pub source_file: Option<String>,
    /// Nesting relationships.
    pub nesting: Nesting,
}

impl RawClass {
    /// Superclass followed by the interfaces.
    pub fn supertype_names(&self) -> impl Iterator<Item = &str> {
        self.super_class
            .as_deref()
            .into_iter()
            .chain(self.interfaces.iter().map(String::as_str))
    }

    /// Owners of every member access in any method body.
    pub fn access_owner_names(&self) -> impl Iterator<Item = &str> {
        self.methods
            .iter()
            .flat_map(|m| m.accesses.iter().map(|a| a.owner.as_str()))
    }
}

/// Reads one class file.
///
/// # Errors
///
/// Returns [`ClassFileError`] if the bytes are not a well-formed class file.
pub fn read_class(bytes: &[u8]) -> Result<RawClass, ClassFileError> {
    let mut reader = Reader::new(bytes);
    let magic = reader.read_u4()?;
    if magic != MAGIC {
        return Err(ClassFileError::InvalidMagic(magic));
    }
    let minor_version = reader.read_u2()?;
    let major_version = reader.read_u2()?;
    if !(MIN_MAJOR_VERSION..=MAX_MAJOR_VERSION).contains(&major_version) {
        return Err(ClassFileError::UnsupportedVersion(major_version));
    }

    let cp = ConstantPool::parse(&mut reader)?;
    let access_flags = reader.read_u2()?;
    let name = binary_name(cp.get_class_name(reader.read_u2()?)?);
    let super_class = match reader.read_u2()? {
        0 => None,
        index => Some(binary_name(cp.get_class_name(index)?)),
    };

    let interface_count = reader.read_u2()? as usize;
    let mut interfaces = Vec::with_capacity(interface_count);
    for _ in 0..interface_count {
        interfaces.push(binary_name(cp.get_class_name(reader.read_u2()?)?));
    }

    let field_count = reader.read_u2()? as usize;
    let mut fields = Vec::with_capacity(field_count);
    for _ in 0..field_count {
        let (access_flags, name, descriptor) = member_header(&mut reader, &cp)?;
        let attrs = parse_attributes(&mut reader, &cp, Target::Field)?;
        fields.push(RawField {
            name,
            descriptor,
            access_flags,
            annotations: attrs.annotations,
        });
    }

    let method_count = reader.read_u2()? as usize;
    let mut methods = Vec::with_capacity(method_count);
    for _ in 0..method_count {
        let (access_flags, name, descriptor) = member_header(&mut reader, &cp)?;
        let attrs = parse_attributes(&mut reader, &cp, Target::Method)?;
        let code = attrs.code.unwrap_or_default();
        methods.push(RawMethod {
            name,
            descriptor,
            access_flags,
            annotations: attrs.annotations,
            throws: attrs.throws,
            accesses: code.accesses,
            type_refs: code.type_refs,
            first_line: code.first_line,
        });
    }

    let attrs = parse_attributes(&mut reader, &cp, Target::Class(&name))?;
    reader.ensure_empty()?;

    Ok(RawClass {
        name,
        access_flags,
        major_version,
        minor_version,
        super_class,
        interfaces,
        fields,
        methods,
        annotations: attrs.annotations,
        source_file: attrs.source_file,
        nesting: attrs.nesting,
    })
}

fn member_header(
    reader: &mut Reader<'_>,
    cp: &ConstantPool,
) -> Result<(u16, String, String), ClassFileError> {
    let access_flags = reader.read_u2()?;
    let name = cp.get_utf8(reader.read_u2()?)?.to_string();
    let descriptor = cp.get_utf8(reader.read_u2()?)?.to_string();
    Ok((access_flags, name, descriptor))
}

#[derive(Clone, Copy)]
enum Target<'a> {
    Class(&'a str),
    Field,
    Method,
}

#[derive(Default)]
struct Attributes {
    annotations: Vec<RawAnnotation>,
    code: Option<bytecode::CodeScan>,
    throws: Vec<String>,
    source_file: Option<String>,
    nesting: Nesting,
}

fn parse_attributes(
    reader: &mut Reader<'_>,
    cp: &ConstantPool,
    target: Target<'_>,
) -> Result<Attributes, ClassFileError> {
    let count = reader.read_u2()? as usize;
    let mut attrs = Attributes::default();
    for _ in 0..count {
        let name = cp.get_utf8(reader.read_u2()?)?;
        let length = reader.read_u4()? as usize;
        let info = reader.read_bytes(length)?;
        let mut sub = Reader::new(info);

        match (name, target) {
            ("RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations", _) => {
                attrs
                    .annotations
                    .extend(annotation::parse_annotations(&mut sub, cp)?);
                sub.ensure_empty()?;
            }
            ("Code", Target::Method) => {
                attrs.code = Some(bytecode::scan_code(info, cp)?);
            }
            ("Exceptions", Target::Method) => {
                let n = sub.read_u2()? as usize;
                for _ in 0..n {
                    attrs
                        .throws
                        .push(binary_name(cp.get_class_name(sub.read_u2()?)?));
                }
                sub.ensure_empty()?;
            }
            ("SourceFile", Target::Class(_)) => {
                attrs.source_file = Some(cp.get_utf8(sub.read_u2()?)?.to_string());
                sub.ensure_empty()?;
            }
            ("InnerClasses", Target::Class(this)) => {
                read_inner_classes(&mut sub, cp, this, &mut attrs.nesting)?;
                sub.ensure_empty()?;
            }
            ("EnclosingMethod", Target::Class(_)) => {
                let class = binary_name(cp.get_class_name(sub.read_u2()?)?);
                let method = match sub.read_u2()? {
                    0 => None,
                    index => {
                        let (n, d) = cp.get_name_and_type(index)?;
                        Some((n.to_string(), d.to_string()))
                    }
                };
                sub.ensure_empty()?;
                attrs.nesting.enclosing_class.get_or_insert(class);
                attrs.nesting.local = true;
                attrs.nesting.enclosing_method = method;
            }
            _ => {}
        }
    }
    Ok(attrs)
}

/// Picks the entry describing `this` class; entries for other classes are
/// only references and are ignored.
fn read_inner_classes(
    sub: &mut Reader<'_>,
    cp: &ConstantPool,
    this: &str,
    nesting: &mut Nesting,
) -> Result<(), ClassFileError> {
    let n = sub.read_u2()? as usize;
    for _ in 0..n {
        let inner = sub.read_u2()?;
        let outer = sub.read_u2()?;
        let inner_name = sub.read_u2()?;
        let flags = sub.read_u2()?;
        if binary_name(cp.get_class_name(inner)?) != this {
            continue;
        }
        if outer != 0 {
            nesting.enclosing_class = Some(binary_name(cp.get_class_name(outer)?));
        }
        if inner_name != 0 {
            nesting.inner_name = Some(cp.get_utf8(inner_name)?.to_string());
        }
        nesting.inner_access_flags = Some(flags);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_magic() {
        let bytes = [0xDE, 0xAD, 0xBE, 0xEF, 0, 0, 0, 52];
        assert_eq!(
            read_class(&bytes),
            Err(ClassFileError::InvalidMagic(0xDEAD_BEEF))
        );
    }

    #[test]
    fn rejects_unsupported_version() {
        let bytes = [0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 99];
        assert_eq!(
            read_class(&bytes),
            Err(ClassFileError::UnsupportedVersion(99))
        );
    }

    #[test]
    fn truncated_input_is_eof() {
        let bytes = [0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 52, 0];
        assert_eq!(read_class(&bytes), Err(ClassFileError::UnexpectedEof));
    }

    #[test]
    fn error_messages() {
        insta::assert_snapshot!(
            ClassFileError::InvalidBytecode { offset: 7, reason: "truncated instruction" }.to_string(),
            @"invalid bytecode at offset 7: truncated instruction"
        );
        insta::assert_snapshot!(
            ClassFileError::InvalidMagic(0xCAFE_D00D).to_string(),
            @"invalid class file magic: 0xcafed00d"
        );
    }
}
