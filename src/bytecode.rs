//! Stack bytecode: opcodes, instructions and compiled programs
//!
//! Wire format (little-endian): a 4-byte slot count followed by
//! single-byte opcodes. `Load` and `Store` carry a 4-byte slot index;
//! the logic opcodes carry nothing.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::SlotIndex;

// Opcodes
pub const OP_LOAD: u8 = 1;
pub const OP_AND: u8 = 2;
pub const OP_OR: u8 = 3;
pub const OP_XOR: u8 = 4;
pub const OP_NOT: u8 = 5;
pub const OP_STORE: u8 = 6;

/// Size of the slot count header
pub const HEADER_LEN: usize = 4;

/// Decoded instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instr {
    /// Push `current[slot]`
    Load(SlotIndex),
    And,
    Or,
    Xor,
    Not,
    /// Pop into `next[slot]`
    Store(SlotIndex),
}

impl Instr {
    pub fn opcode(self) -> u8 {
        match self {
            Instr::Load(_) => OP_LOAD,
            Instr::And => OP_AND,
            Instr::Or => OP_OR,
            Instr::Xor => OP_XOR,
            Instr::Not => OP_NOT,
            Instr::Store(_) => OP_STORE,
        }
    }

    /// Values popped and pushed by this instruction
    fn stack_effect(self) -> (usize, usize) {
        match self {
            Instr::Load(_) => (0, 1),
            Instr::And | Instr::Or | Instr::Xor => (2, 1),
            Instr::Not => (1, 1),
            Instr::Store(_) => (1, 0),
        }
    }

    fn encode(self, out: &mut Vec<u8>) {
        out.push(self.opcode());
        if let Instr::Load(slot) | Instr::Store(slot) = self {
            out.extend_from_slice(&slot.to_le_bytes());
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Load(slot) => write!(f, "Load {slot}"),
            Instr::And => f.write_str("And"),
            Instr::Or => f.write_str("Or"),
            Instr::Xor => f.write_str("Xor"),
            Instr::Not => f.write_str("Not"),
            Instr::Store(slot) => write!(f, "Store {slot}"),
        }
    }
}

/// Summary of a compiled program
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramStats {
    pub slot_count: usize,
    pub instruction_count: usize,
    pub load_count: usize,
    pub store_count: usize,
    pub byte_len: usize,
    pub max_stack_depth: usize,
}

/// A compiled program: the encoded bytes plus their decoded form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    bytes: Vec<u8>,
    instrs: Vec<Instr>,
}

impl Program {
    /// Empty program declaring `size` state slots
    pub(crate) fn with_size(size: SlotIndex) -> Self {
        Self {
            bytes: size.to_le_bytes().to_vec(),
            instrs: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, instr: Instr) {
        instr.encode(&mut self.bytes);
        self.instrs.push(instr);
    }

    /// Decode persisted bytes, validating every opcode and slot index
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() < HEADER_LEN {
            return Err(Error::MissingHeader { len: bytes.len() });
        }
        let size = read_u32(&bytes, 0) as usize;

        let mut instrs = Vec::new();
        let mut ip = HEADER_LEN;
        while ip < bytes.len() {
            let opcode = bytes[ip];
            let instr = match opcode {
                OP_LOAD | OP_STORE => {
                    if ip + 4 >= bytes.len() {
                        return Err(Error::Truncated { offset: ip, opcode });
                    }
                    let slot = read_u32(&bytes, ip + 1);
                    if slot as usize >= size {
                        return Err(Error::SlotOutOfRange {
                            slot: slot as usize,
                            size,
                        });
                    }
                    ip += 4;
                    if opcode == OP_LOAD {
                        Instr::Load(slot)
                    } else {
                        Instr::Store(slot)
                    }
                }
                OP_AND => Instr::And,
                OP_OR => Instr::Or,
                OP_XOR => Instr::Xor,
                OP_NOT => Instr::Not,
                _ => return Err(Error::UnknownOpcode { offset: ip, opcode }),
            };
            instrs.push(instr);
            ip += 1;
        }

        Ok(Self { bytes, instrs })
    }

    /// Declared state vector length
    pub fn size(&self) -> SlotIndex {
        read_u32(&self.bytes, 0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn instructions(&self) -> &[Instr] {
        &self.instrs
    }

    /// Human-readable listing, one instruction per line
    pub fn disassemble(&self) -> String {
        let mut out = format!("; {} slots\n", self.size());
        for instr in &self.instrs {
            out.push_str(&instr.to_string());
            out.push('\n');
        }
        out
    }

    /// Maximum evaluation stack depth, proving the stack discipline on the way
    ///
    /// Bytecode is straight-line, so the depth at every instruction does
    /// not depend on state values. Each `Store` must leave the stack empty.
    pub fn max_stack_depth(&self, limit: usize) -> Result<usize> {
        let mut depth = 0usize;
        let mut max_depth = 0usize;
        for (pc, instr) in self.instrs.iter().enumerate() {
            let (pops, pushes) = instr.stack_effect();
            depth = depth
                .checked_sub(pops)
                .ok_or(Error::StackUnderflow { pc })?;
            depth += pushes;
            if depth > limit {
                return Err(Error::StackOverflow { pc, limit });
            }
            max_depth = max_depth.max(depth);
            if matches!(instr, Instr::Store(_)) && depth != 0 {
                return Err(Error::UnbalancedStack { pc, depth });
            }
        }
        if depth != 0 {
            return Err(Error::UnbalancedStack {
                pc: self.instrs.len().saturating_sub(1),
                depth,
            });
        }
        Ok(max_depth)
    }

    /// Slots targeted by at least one `Store`
    ///
    /// Proportional to the instruction count, not to the declared size.
    pub fn stored_slots(&self) -> BTreeSet<SlotIndex> {
        self.instrs
            .iter()
            .filter_map(|instr| match *instr {
                Instr::Store(slot) => Some(slot),
                _ => None,
            })
            .collect()
    }

    pub fn stats(&self) -> Result<ProgramStats> {
        let load_count = self
            .instrs
            .iter()
            .filter(|i| matches!(i, Instr::Load(_)))
            .count();
        let store_count = self
            .instrs
            .iter()
            .filter(|i| matches!(i, Instr::Store(_)))
            .count();
        Ok(ProgramStats {
            slot_count: self.size() as usize,
            instruction_count: self.instrs.len(),
            load_count,
            store_count,
            byte_len: self.bytes.len(),
            max_stack_depth: self.max_stack_depth(usize::MAX)?,
        })
    }
}

#[inline(always)]
fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}
