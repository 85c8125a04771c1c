//! Constant pool parsing and typed lookups.

use super::reader::Reader;
use super::ClassFileError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CpInfo {
    /// Index 0 and the second slot of long/double entries.
    Unusable,
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class { name_index: u16 },
    String { string_index: u16 },
    FieldRef { class_index: u16, name_and_type_index: u16 },
    MethodRef { class_index: u16, name_and_type_index: u16 },
    InterfaceMethodRef { class_index: u16, name_and_type_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    MethodHandle,
    MethodType,
    Dynamic,
    InvokeDynamic,
    Module,
    Package,
}

impl CpInfo {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Unusable => "Unusable",
            Self::Utf8(_) => "Utf8",
            Self::Integer(_) => "Integer",
            Self::Float(_) => "Float",
            Self::Long(_) => "Long",
            Self::Double(_) => "Double",
            Self::Class { .. } => "Class",
            Self::String { .. } => "String",
            Self::FieldRef { .. } => "Fieldref",
            Self::MethodRef { .. } => "Methodref",
            Self::InterfaceMethodRef { .. } => "InterfaceMethodref",
            Self::NameAndType { .. } => "NameAndType",
            Self::MethodHandle => "MethodHandle",
            Self::MethodType => "MethodType",
            Self::Dynamic => "Dynamic",
            Self::InvokeDynamic => "InvokeDynamic",
            Self::Module => "Module",
            Self::Package => "Package",
        }
    }
}

/// A symbolic field or method reference, still unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MemberRef<'a> {
    pub(crate) owner: &'a str,
    pub(crate) name: &'a str,
    pub(crate) descriptor: &'a str,
}

#[derive(Debug)]
pub(crate) struct ConstantPool {
    entries: Vec<CpInfo>,
}

impl ConstantPool {
    pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self, ClassFileError> {
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count.max(1));
        entries.push(CpInfo::Unusable);

        while entries.len() < count {
            let tag = reader.read_u1()?;
            let entry = match tag {
                1 => {
                    let len = reader.read_u2()? as usize;
                    CpInfo::Utf8(decode_modified_utf8(reader.read_bytes(len)?)?)
                }
                3 => CpInfo::Integer(reader.read_i4()?),
                4 => CpInfo::Float(f32::from_bits(reader.read_u4()?)),
                5 => CpInfo::Long(i64::from_be_bytes(reader.read_u8()?.to_be_bytes())),
                6 => CpInfo::Double(f64::from_bits(reader.read_u8()?)),
                7 => CpInfo::Class {
                    name_index: reader.read_u2()?,
                },
                8 => CpInfo::String {
                    string_index: reader.read_u2()?,
                },
                9 | 10 | 11 => {
                    let class_index = reader.read_u2()?;
                    let name_and_type_index = reader.read_u2()?;
                    match tag {
                        9 => CpInfo::FieldRef {
                            class_index,
                            name_and_type_index,
                        },
                        10 => CpInfo::MethodRef {
                            class_index,
                            name_and_type_index,
                        },
                        _ => CpInfo::InterfaceMethodRef {
                            class_index,
                            name_and_type_index,
                        },
                    }
                }
                12 => CpInfo::NameAndType {
                    name_index: reader.read_u2()?,
                    descriptor_index: reader.read_u2()?,
                },
                15 => {
                    reader.skip(3)?;
                    CpInfo::MethodHandle
                }
                16 => {
                    reader.skip(2)?;
                    CpInfo::MethodType
                }
                17 => {
                    reader.skip(4)?;
                    CpInfo::Dynamic
                }
                18 => {
                    reader.skip(4)?;
                    CpInfo::InvokeDynamic
                }
                19 => {
                    reader.skip(2)?;
                    CpInfo::Module
                }
                20 => {
                    reader.skip(2)?;
                    CpInfo::Package
                }
                other => return Err(ClassFileError::InvalidConstantPoolTag(other)),
            };

            let wide = matches!(entry, CpInfo::Long(_) | CpInfo::Double(_));
            entries.push(entry);
            if wide {
                entries.push(CpInfo::Unusable);
            }
        }

        if entries.len() != count.max(1) {
            return Err(ClassFileError::MalformedAttribute("constant pool"));
        }

        Ok(Self { entries })
    }

    pub(crate) fn get(&self, index: u16) -> Result<&CpInfo, ClassFileError> {
        match self.entries.get(index as usize) {
            Some(CpInfo::Unusable) | None => Err(ClassFileError::InvalidConstantPoolIndex(index)),
            Some(entry) => Ok(entry),
        }
    }

    pub(crate) fn get_utf8(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            CpInfo::Utf8(s) => Ok(s),
            other => Err(mismatch(index, "Utf8", other)),
        }
    }

    /// Internal (slash-separated) class name, or an array descriptor.
    pub(crate) fn get_class_name(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            CpInfo::Class { name_index } => self.get_utf8(*name_index),
            other => Err(mismatch(index, "Class", other)),
        }
    }

    pub(crate) fn get_name_and_type(&self, index: u16) -> Result<(&str, &str), ClassFileError> {
        match self.get(index)? {
            CpInfo::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.get_utf8(*name_index)?, self.get_utf8(*descriptor_index)?)),
            other => Err(mismatch(index, "NameAndType", other)),
        }
    }

    pub(crate) fn get_field_ref(&self, index: u16) -> Result<MemberRef<'_>, ClassFileError> {
        match self.get(index)? {
            CpInfo::FieldRef {
                class_index,
                name_and_type_index,
            } => self.member_ref(*class_index, *name_and_type_index),
            other => Err(mismatch(index, "Fieldref", other)),
        }
    }

    /// Accepts both `Methodref` and `InterfaceMethodref`.
    pub(crate) fn get_method_ref(&self, index: u16) -> Result<MemberRef<'_>, ClassFileError> {
        match self.get(index)? {
            CpInfo::MethodRef {
                class_index,
                name_and_type_index,
            }
            | CpInfo::InterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => self.member_ref(*class_index, *name_and_type_index),
            other => Err(mismatch(index, "Methodref", other)),
        }
    }

    pub(crate) fn get_string_constant(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            CpInfo::Utf8(s) => Ok(s),
            CpInfo::String { string_index } => self.get_utf8(*string_index),
            other => Err(mismatch(index, "String", other)),
        }
    }

    fn member_ref(
        &self,
        class_index: u16,
        name_and_type_index: u16,
    ) -> Result<MemberRef<'_>, ClassFileError> {
        let owner = self.get_class_name(class_index)?;
        let (name, descriptor) = self.get_name_and_type(name_and_type_index)?;
        Ok(MemberRef {
            owner,
            name,
            descriptor,
        })
    }
}

fn mismatch(index: u16, expected: &'static str, found: &CpInfo) -> ClassFileError {
    ClassFileError::ConstantPoolTypeMismatch {
        index,
        expected,
        found: found.kind(),
    }
}

/// Decodes the JVM's "modified UTF-8" (`\0` as two bytes, supplementary
/// characters as surrogate pairs).
fn decode_modified_utf8(bytes: &[u8]) -> Result<String, ClassFileError> {
    if bytes.iter().all(|b| *b != 0 && *b < 0x80) {
        return std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| ClassFileError::InvalidModifiedUtf8);
    }

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = u16::from(bytes[i]);
        let continuation = |offset: usize| -> Result<u16, ClassFileError> {
            match bytes.get(i + offset) {
                Some(b) if b & 0xC0 == 0x80 => Ok(u16::from(b & 0x3F)),
                _ => Err(ClassFileError::InvalidModifiedUtf8),
            }
        };
        if b0 == 0 {
            return Err(ClassFileError::InvalidModifiedUtf8);
        } else if b0 < 0x80 {
            units.push(b0);
            i += 1;
        } else if b0 & 0xE0 == 0xC0 {
            units.push(((b0 & 0x1F) << 6) | continuation(1)?);
            i += 2;
        } else if b0 & 0xF0 == 0xE0 {
            units.push(((b0 & 0x0F) << 12) | (continuation(1)? << 6) | continuation(2)?);
            i += 3;
        } else {
            return Err(ClassFileError::InvalidModifiedUtf8);
        }
    }

    String::from_utf16(&units).map_err(|_| ClassFileError::InvalidModifiedUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_bytes(entries: &[&[u8]], count: u16) -> Vec<u8> {
        let mut bytes = count.to_be_bytes().to_vec();
        for e in entries {
            bytes.extend_from_slice(e);
        }
        bytes
    }

    #[test]
    fn long_entries_take_two_slots() {
        let long = [5u8, 0, 0, 0, 0, 0, 0, 0, 42];
        let utf8 = [1u8, 0, 1, b'x'];
        let bytes = pool_bytes(&[&long, &utf8], 4);
        let cp = ConstantPool::parse(&mut Reader::new(&bytes)).unwrap();

        assert_eq!(cp.get(1).unwrap(), &CpInfo::Long(42));
        assert!(matches!(
            cp.get(2),
            Err(ClassFileError::InvalidConstantPoolIndex(2))
        ));
        assert_eq!(cp.get_utf8(3).unwrap(), "x");
    }

    #[test]
    fn type_mismatch_is_reported() {
        let int = [3u8, 0, 0, 0, 7];
        let bytes = pool_bytes(&[&int], 2);
        let cp = ConstantPool::parse(&mut Reader::new(&bytes)).unwrap();
        assert!(matches!(
            cp.get_utf8(1),
            Err(ClassFileError::ConstantPoolTypeMismatch {
                index: 1,
                expected: "Utf8",
                found: "Integer"
            })
        ));
    }

    #[test]
    fn rejects_unknown_tag() {
        let bytes = pool_bytes(&[&[99u8]], 2);
        assert!(matches!(
            ConstantPool::parse(&mut Reader::new(&bytes)),
            Err(ClassFileError::InvalidConstantPoolTag(99))
        ));
    }

    #[test]
    fn decodes_modified_utf8() {
        // "a\0é" in modified UTF-8
        let bytes = [b'a', 0xC0, 0x80, 0xC3, 0xA9];
        assert_eq!(decode_modified_utf8(&bytes).unwrap(), "a\0é");
        assert!(decode_modified_utf8(&[0x00]).is_err());
        assert!(decode_modified_utf8(&[0xE0, 0x80]).is_err());
    }
}
