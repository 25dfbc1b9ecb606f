// Copyright (c) 2026 Disasm-Helper Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Builds display records for single instructions.

use std::io::{self, Write};

use crate::decoder::{Decoded, DecodedOperand, DecodedOperandKind, InstructionDecoder};
use crate::eval::{SessionState, ValueResolver};
use crate::instr::{InstrClass, InstructionRecord, MemValue, Operand, OperandDetail};
use crate::memory::MemoryReader;
use crate::scan::{instr_size, MAX_INSTR_LEN};

/// At most this many operands are kept per record, however many the decoder
/// reports.
const MAX_OPERANDS: usize = 3;

/// Ties the decoder and the debug-session collaborators together for
/// per-address instruction inspection.
pub struct DisasmHelper<'a> {
    decoder: &'a dyn InstructionDecoder,
    memory: &'a dyn MemoryReader,
    resolver: &'a dyn ValueResolver,
    session: &'a dyn SessionState,
}

impl<'a> DisasmHelper<'a> {
    pub fn new(
        decoder: &'a dyn InstructionDecoder,
        memory: &'a dyn MemoryReader,
        resolver: &'a dyn ValueResolver,
        session: &'a dyn SessionState,
    ) -> Self {
        Self {
            decoder,
            memory,
            resolver,
            session,
        }
    }

    /// `"mnemonic operands"` for the instruction at `address`, `"???"` when
    /// the memory is unreadable or the bytes do not decode.
    pub fn instruction_text(&self, address: u64) -> String {
        let mut buffer = [0u8; MAX_INSTR_LEN];
        if !self.memory.read(address, &mut buffer) {
            return "???".to_string();
        }
        match self.decoder.decode_one(&buffer, address) {
            Some(ins) => join_text(&ins.mnemonic, &ins.op_str),
            None => "???".to_string(),
        }
    }

    /// Instruction length at `address`; 1 when the memory is unreadable or
    /// the bytes do not decode.
    pub fn size_at(&self, address: u64) -> usize {
        let mut buffer = [0u8; MAX_INSTR_LEN];
        if !self.memory.read(address, &mut buffer) {
            return 1;
        }
        instr_size(self.decoder, &buffer, address)
    }

    /// Build a display record for the instruction at `address`, reading its
    /// bytes from memory. A failed read leaves the buffer zeroed, matching a
    /// read of zero-filled memory.
    pub fn describe(&self, address: u64) -> InstructionRecord {
        let mut buffer = [0u8; MAX_INSTR_LEN];
        let _ = self.memory.read(address, &mut buffer);
        self.describe_bytes(&buffer, address)
    }

    /// Build a display record for the instruction encoded in `bytes` at
    /// `address`. Without an active session the record carries no operands;
    /// undecodable bytes yield a 1-byte `"???"` placeholder.
    pub fn describe_bytes(&self, bytes: &[u8], address: u64) -> InstructionRecord {
        if !self.session.is_debugging() {
            return InstructionRecord {
                address,
                size: 0,
                text: String::new(),
                class: InstrClass::Normal,
                operands: Vec::new(),
            };
        }

        let Some(ins) = self.decoder.decode_one(bytes, address) else {
            return InstructionRecord {
                address,
                size: 1,
                text: "???".to_string(),
                class: InstrClass::Normal,
                operands: Vec::new(),
            };
        };

        let class = if ins.groups.is_branch() {
            InstrClass::Branch
        } else if ins.op_str.contains("sp") || ins.op_str.contains("bp") {
            InstrClass::Stack
        } else {
            InstrClass::Normal
        };

        let operands = ins
            .operands
            .iter()
            .take(MAX_OPERANDS)
            .map(|op| self.build_operand(&ins, address, op))
            .collect();

        InstructionRecord {
            address,
            size: ins.size,
            text: join_text(&ins.mnemonic, &ins.op_str),
            class,
            operands,
        }
    }

    /// Write diagnostic lines for the instruction at `address`: class and
    /// text, then one line per operand with kind, constant, value and
    /// dereferenced memory content.
    pub fn print_description(&self, address: u64, out: &mut dyn Write) -> io::Result<()> {
        let instr = self.describe(address);
        writeln!(out, ">{}:\"{}\":", instr.class.as_str(), instr.text)?;
        for (i, op) in instr.operands.iter().enumerate() {
            match op.detail {
                OperandDetail::Normal { constant, value } => {
                    writeln!(out, " {}:normal:{:x}:{:x}", i, constant, value)?;
                }
                OperandDetail::Memory {
                    constant,
                    value,
                    contents,
                } => {
                    writeln!(
                        out,
                        " {}:memory:{:x}:{:x}:{:x}",
                        i,
                        constant,
                        value.unwrap_or(0),
                        contents.map(|m| m.value).unwrap_or(0)
                    )?;
                }
            }
        }
        Ok(())
    }

    fn build_operand(&self, ins: &Decoded, address: u64, op: &DecodedOperand) -> Operand {
        let detail = match op.kind {
            DecodedOperandKind::Reg => {
                let value = self.resolver.resolve(&op.text).unwrap_or(0);
                OperandDetail::Normal {
                    constant: value,
                    value,
                }
            }
            DecodedOperandKind::Imm(imm) => OperandDetail::Normal {
                constant: imm as u64,
                value: imm as u64,
            },
            DecodedOperandKind::Mem {
                ip_relative,
                disp,
                width,
            } => {
                let constant = if ip_relative {
                    address.wrapping_add(disp as u64).wrapping_add(ins.size as u64)
                } else {
                    disp as u64
                };
                let value = self.resolver.resolve(&op.text);
                let contents = value.and_then(|addr| self.deref(addr, width));
                OperandDetail::Memory {
                    constant,
                    value,
                    contents,
                }
            }
        };
        Operand {
            text: op.text.clone(),
            detail,
        }
    }

    fn deref(&self, addr: u64, width: u8) -> Option<MemValue> {
        if !self.memory.is_valid_read_ptr(addr) {
            return None;
        }
        if !matches!(width, 1 | 2 | 4 | 8) {
            return None;
        }
        let mut raw = [0u8; 8];
        if !self.memory.read(addr, &mut raw[..width as usize]) {
            return None;
        }
        Some(MemValue {
            width,
            value: u64::from_le_bytes(raw),
        })
    }
}

fn join_text(mnemonic: &str, op_str: &str) -> String {
    if op_str.is_empty() {
        mnemonic.to_string()
    } else {
        format!("{} {}", mnemonic, op_str)
    }
}
