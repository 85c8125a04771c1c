//! `Runtime(In)VisibleAnnotations` parsing.

use super::constant_pool::{ConstantPool, CpInfo};
use super::reader::Reader;
use super::ClassFileError;

/// An annotation as written in the class file.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAnnotation {
    /// Field descriptor of the annotation type, e.g. `Lcom/example/Marker;`.
    pub type_descriptor: String,
    /// Element name/value pairs in declaration order.
    pub elements: Vec<(String, RawElementValue)>,
}

/// An annotation element value before type resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum RawElementValue {
    /// Primitive or string constant.
    Const(ConstValue),
    /// Enum constant: enum type descriptor and constant name.
    Enum {
        /// Field descriptor of the enum type.
        type_descriptor: String,
        /// Name of the constant.
        constant: String,
    },
    /// Class literal, stored as a return descriptor (`Ljava/lang/String;`, `V`, `[I`).
    Class(String),
    /// Nested annotation.
    Annotation(Box<RawAnnotation>),
    /// Array of values.
    Array(Vec<RawElementValue>),
}

/// A constant element value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    /// `byte`
    Byte(i8),
    /// `char`
    Char(char),
    /// `short`
    Short(i16),
    /// `int`
    Int(i32),
    /// `long`
    Long(i64),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
    /// `boolean`
    Boolean(bool),
    /// `java.lang.String`
    String(String),
}

pub(crate) fn parse_annotations(
    reader: &mut Reader<'_>,
    cp: &ConstantPool,
) -> Result<Vec<RawAnnotation>, ClassFileError> {
    let count = reader.read_u2()? as usize;
    let mut annotations = Vec::with_capacity(count);
    for _ in 0..count {
        annotations.push(parse_annotation(reader, cp)?);
    }
    Ok(annotations)
}

fn parse_annotation(
    reader: &mut Reader<'_>,
    cp: &ConstantPool,
) -> Result<RawAnnotation, ClassFileError> {
    let type_descriptor = cp.get_utf8(reader.read_u2()?)?.to_string();
    let pairs = reader.read_u2()? as usize;
    let mut elements = Vec::with_capacity(pairs);
    for _ in 0..pairs {
        let name = cp.get_utf8(reader.read_u2()?)?.to_string();
        elements.push((name, parse_element_value(reader, cp)?));
    }
    Ok(RawAnnotation {
        type_descriptor,
        elements,
    })
}

fn parse_element_value(
    reader: &mut Reader<'_>,
    cp: &ConstantPool,
) -> Result<RawElementValue, ClassFileError> {
    let tag = reader.read_u1()?;
    let value = match tag {
        b'B' | b'C' | b'I' | b'S' | b'Z' => {
            let index = reader.read_u2()?;
            let CpInfo::Integer(v) = *cp.get(index)? else {
                return Err(expected(cp, index, "Integer"));
            };
            RawElementValue::Const(match tag {
                b'B' => ConstValue::Byte(v as i8),
                b'C' => ConstValue::Char(
                    char::from_u32(v as u32).ok_or(ClassFileError::MalformedAttribute(
                        "RuntimeVisibleAnnotations",
                    ))?,
                ),
                b'S' => ConstValue::Short(v as i16),
                b'Z' => ConstValue::Boolean(v != 0),
                _ => ConstValue::Int(v),
            })
        }
        b'J' => {
            let index = reader.read_u2()?;
            let CpInfo::Long(v) = *cp.get(index)? else {
                return Err(expected(cp, index, "Long"));
            };
            RawElementValue::Const(ConstValue::Long(v))
        }
        b'F' => {
            let index = reader.read_u2()?;
            let CpInfo::Float(v) = *cp.get(index)? else {
                return Err(expected(cp, index, "Float"));
            };
            RawElementValue::Const(ConstValue::Float(v))
        }
        b'D' => {
            let index = reader.read_u2()?;
            let CpInfo::Double(v) = *cp.get(index)? else {
                return Err(expected(cp, index, "Double"));
            };
            RawElementValue::Const(ConstValue::Double(v))
        }
        b's' => RawElementValue::Const(ConstValue::String(
            cp.get_string_constant(reader.read_u2()?)?.to_string(),
        )),
        b'e' => {
            let type_descriptor = cp.get_utf8(reader.read_u2()?)?.to_string();
            let constant = cp.get_utf8(reader.read_u2()?)?.to_string();
            RawElementValue::Enum {
                type_descriptor,
                constant,
            }
        }
        b'c' => RawElementValue::Class(cp.get_utf8(reader.read_u2()?)?.to_string()),
        b'@' => RawElementValue::Annotation(Box::new(parse_annotation(reader, cp)?)),
        b'[' => {
            let count = reader.read_u2()? as usize;
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                values.push(parse_element_value(reader, cp)?);
            }
            RawElementValue::Array(values)
        }
        _ => return Err(ClassFileError::MalformedAttribute("RuntimeVisibleAnnotations")),
    };
    Ok(value)
}

fn expected(cp: &ConstantPool, index: u16, expected: &'static str) -> ClassFileError {
    match cp.get(index) {
        Ok(found) => ClassFileError::ConstantPoolTypeMismatch {
            index,
            expected,
            found: found.kind(),
        },
        Err(err) => err,
    }
}

