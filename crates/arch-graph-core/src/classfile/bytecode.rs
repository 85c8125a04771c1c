//! `Code` attribute scanning.
//!
//! Walks the instruction stream once and records every field access,
//! method/constructor invocation and class reference together with the
//! source line it belongs to. Nothing is resolved here.

use super::constant_pool::{ConstantPool, CpInfo};
use super::reader::Reader;
use super::{AccessKind, ClassFileError, RawAccess, RawTypeRef};

const LDC: u8 = 0x12;
const LDC_W: u8 = 0x13;
const IINC: u8 = 0x84;
const TABLESWITCH: u8 = 0xaa;
const LOOKUPSWITCH: u8 = 0xab;
const GETSTATIC: u8 = 0xb2;
const PUTSTATIC: u8 = 0xb3;
const GETFIELD: u8 = 0xb4;
const PUTFIELD: u8 = 0xb5;
const INVOKEVIRTUAL: u8 = 0xb6;
const INVOKESPECIAL: u8 = 0xb7;
const INVOKESTATIC: u8 = 0xb8;
const INVOKEINTERFACE: u8 = 0xb9;
const NEW: u8 = 0xbb;
const ANEWARRAY: u8 = 0xbd;
const CHECKCAST: u8 = 0xc0;
const INSTANCEOF: u8 = 0xc1;
const WIDE: u8 = 0xc4;
const MULTIANEWARRAY: u8 = 0xc5;

/// What a method body references.
#[derive(Debug, Default)]
pub(crate) struct CodeScan {
    pub(crate) accesses: Vec<RawAccess>,
    pub(crate) type_refs: Vec<RawTypeRef>,
    pub(crate) first_line: Option<u32>,
}

/// Parses the body of a `Code` attribute.
pub(crate) fn scan_code(info: &[u8], cp: &ConstantPool) -> Result<CodeScan, ClassFileError> {
    let mut reader = Reader::new(info);
    reader.skip(4)?; // max_stack, max_locals
    let code_length = reader.read_u4()? as usize;
    let code = reader.read_bytes(code_length)?;

    let handlers = reader.read_u2()? as usize;
    let mut catch_types = Vec::new();
    for _ in 0..handlers {
        reader.skip(4)?; // start_pc, end_pc
        let handler_pc = reader.read_u2()?;
        let catch_type = reader.read_u2()?;
        if catch_type != 0 {
            catch_types.push((handler_pc, binary_name(cp.get_class_name(catch_type)?)));
        }
    }

    let mut lines = Vec::new();
    let attributes = reader.read_u2()? as usize;
    for _ in 0..attributes {
        let name = cp.get_utf8(reader.read_u2()?)?;
        let length = reader.read_u4()? as usize;
        let body = reader.read_bytes(length)?;
        if name == "LineNumberTable" {
            let mut sub = Reader::new(body);
            let count = sub.read_u2()? as usize;
            for _ in 0..count {
                let start_pc = sub.read_u2()?;
                let line = sub.read_u2()?;
                lines.push((start_pc, u32::from(line)));
            }
            sub.ensure_empty()?;
        }
    }
    reader.ensure_empty()?;
    lines.sort_unstable();

    let table = LineTable(lines);
    let mut scan = CodeScan {
        first_line: table.0.iter().map(|(_, line)| *line).min(),
        ..CodeScan::default()
    };

    for (handler_pc, name) in catch_types {
        scan.type_refs.push(RawTypeRef {
            name,
            line: table.line_at(usize::from(handler_pc)),
        });
    }

    let mut pc = 0usize;
    while pc < code.len() {
        let opcode = code[pc];
        let length = instruction_length(code, pc)?;
        if pc + length > code.len() {
            return Err(ClassFileError::InvalidBytecode {
                offset: pc,
                reason: "instruction runs past end of code",
            });
        }
        let line = table.line_at(pc);

        match opcode {
            GETSTATIC..=INVOKEINTERFACE => {
                let index = u16::from_be_bytes([code[pc + 1], code[pc + 2]]);
                let member = if opcode <= PUTFIELD {
                    cp.get_field_ref(index)?
                } else {
                    cp.get_method_ref(index)?
                };
                let kind = match opcode {
                    GETSTATIC | GETFIELD => AccessKind::GetField,
                    PUTSTATIC | PUTFIELD => AccessKind::SetField,
                    INVOKESPECIAL if member.name == "<init>" => AccessKind::ConstructorCall,
                    _ => AccessKind::MethodCall,
                };
                scan.accesses.push(RawAccess {
                    kind,
                    owner: binary_name(member.owner),
                    name: member.name.to_string(),
                    descriptor: member.descriptor.to_string(),
                    line,
                });
            }
            NEW | ANEWARRAY | CHECKCAST | INSTANCEOF | MULTIANEWARRAY => {
                let index = u16::from_be_bytes([code[pc + 1], code[pc + 2]]);
                scan.type_refs.push(RawTypeRef {
                    name: binary_name(cp.get_class_name(index)?),
                    line,
                });
            }
            LDC | LDC_W => {
                let index = if opcode == LDC {
                    u16::from(code[pc + 1])
                } else {
                    u16::from_be_bytes([code[pc + 1], code[pc + 2]])
                };
                if let CpInfo::Class { .. } = cp.get(index)? {
                    scan.type_refs.push(RawTypeRef {
                        name: binary_name(cp.get_class_name(index)?),
                        line,
                    });
                }
            }
            _ => {}
        }

        pc += length;
    }

    Ok(scan)
}

/// Converts a constant pool class name (`a/B`, `[La/B;`) to its dotted binary form.
pub(crate) fn binary_name(internal: &str) -> String {
    internal.replace('/', ".")
}

struct LineTable(Vec<(u16, u32)>);

impl LineTable {
    /// Line of the entry with the largest `start_pc <= pc`, or 0.
    fn line_at(&self, pc: usize) -> u32 {
        let idx = self.0.partition_point(|(start, _)| usize::from(*start) <= pc);
        if idx == 0 {
            0
        } else {
            self.0[idx - 1].1
        }
    }
}

fn instruction_length(code: &[u8], pc: usize) -> Result<usize, ClassFileError> {
    let opcode = code[pc];
    let length = match opcode {
        0x10 | LDC | 0x15..=0x19 | 0x36..=0x3a | 0xa9 | 0xbc => 2,
        0x11 | LDC_W | 0x14 | IINC | 0x99..=0xa8 | GETSTATIC..=INVOKESPECIAL | INVOKESTATIC
        | NEW | ANEWARRAY | CHECKCAST | INSTANCEOF | 0xc6 | 0xc7 => 3,
        MULTIANEWARRAY => 4,
        INVOKEINTERFACE | 0xba | 0xc8 | 0xc9 => 5,
        WIDE => match code.get(pc + 1) {
            Some(&IINC) => 6,
            Some(_) => 4,
            None => return Err(truncated(pc)),
        },
        TABLESWITCH => {
            let base = pc + 1 + padding(pc);
            let low = read_i32(code, base + 4).ok_or_else(|| truncated(pc))?;
            let high = read_i32(code, base + 8).ok_or_else(|| truncated(pc))?;
            let entries = i64::from(high) - i64::from(low) + 1;
            if entries < 0 {
                return Err(ClassFileError::InvalidBytecode {
                    offset: pc,
                    reason: "tableswitch high < low",
                });
            }
            (base - pc) + 12 + 4 * entries as usize
        }
        LOOKUPSWITCH => {
            let base = pc + 1 + padding(pc);
            let pairs = read_i32(code, base + 4).ok_or_else(|| truncated(pc))?;
            if pairs < 0 {
                return Err(ClassFileError::InvalidBytecode {
                    offset: pc,
                    reason: "lookupswitch with negative pair count",
                });
            }
            (base - pc) + 8 + 8 * pairs as usize
        }
        0xca..=0xff => {
            return Err(ClassFileError::InvalidBytecode {
                offset: pc,
                reason: "reserved or undefined opcode",
            })
        }
        _ => 1,
    };
    Ok(length)
}

/// Switch operands are aligned to a multiple of four from the start of the code.
fn padding(pc: usize) -> usize {
    (4 - (pc + 1) % 4) % 4
}

fn read_i32(code: &[u8], at: usize) -> Option<i32> {
    let bytes = code.get(at..at + 4)?;
    Some(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn truncated(pc: usize) -> ClassFileError {
    ClassFileError::InvalidBytecode {
        offset: pc,
        reason: "truncated instruction",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switch_padding_aligns_to_four() {
        assert_eq!(padding(0), 3);
        assert_eq!(padding(1), 2);
        assert_eq!(padding(2), 1);
        assert_eq!(padding(3), 0);
    }

    #[test]
    fn fixed_instruction_lengths() {
        assert_eq!(instruction_length(&[0x2a], 0).unwrap(), 1); // aload_0
        assert_eq!(instruction_length(&[0x10, 5], 0).unwrap(), 2); // bipush
        assert_eq!(instruction_length(&[INVOKEVIRTUAL, 0, 1], 0).unwrap(), 3);
        assert_eq!(instruction_length(&[INVOKEINTERFACE, 0, 1, 1, 0], 0).unwrap(), 5);
        assert_eq!(instruction_length(&[0xba, 0, 1, 0, 0], 0).unwrap(), 5);
        assert_eq!(instruction_length(&[WIDE, IINC, 0, 1, 0, 1], 0).unwrap(), 6);
        assert_eq!(instruction_length(&[WIDE, 0x15, 0, 1], 0).unwrap(), 4);
    }

    #[test]
    fn tableswitch_length_includes_padding() {
        // pc 0: opcode, 3 bytes padding, default, low=0, high=1, two offsets
        let mut code = vec![TABLESWITCH, 0, 0, 0];
        code.extend_from_slice(&0i32.to_be_bytes());
        code.extend_from_slice(&0i32.to_be_bytes());
        code.extend_from_slice(&1i32.to_be_bytes());
        code.extend_from_slice(&[0; 8]);
        assert_eq!(instruction_length(&code, 0).unwrap(), code.len());
    }

    #[test]
    fn lookupswitch_length_counts_pairs() {
        // pc 1 (after a nop): opcode, 2 bytes padding, default, npairs=1, one pair
        let mut code = vec![0x00, LOOKUPSWITCH, 0, 0];
        code.extend_from_slice(&0i32.to_be_bytes());
        code.extend_from_slice(&1i32.to_be_bytes());
        code.extend_from_slice(&[0; 8]);
        assert_eq!(instruction_length(&code, 1).unwrap(), code.len() - 1);
    }

    #[test]
    fn undefined_opcode_is_rejected() {
        assert!(matches!(
            instruction_length(&[0xcb], 0),
            Err(ClassFileError::InvalidBytecode { offset: 0, .. })
        ));
    }

    #[test]
    fn line_lookup_picks_greatest_start_at_or_before_pc() {
        let table = LineTable(vec![(0, 10), (4, 11), (9, 14)]);
        assert_eq!(table.line_at(0), 10);
        assert_eq!(table.line_at(3), 10);
        assert_eq!(table.line_at(4), 11);
        assert_eq!(table.line_at(100), 14);
        assert_eq!(LineTable(vec![]).line_at(5), 0);
    }
}
