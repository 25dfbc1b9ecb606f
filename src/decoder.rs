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

use capstone::arch::x86::{X86OpMem, X86OperandType, X86Reg};
use capstone::prelude::*;
use capstone::InsnGroupType;

/// Decodes exactly one instruction from a byte span.
///
/// The scanner and the operand extractor only ever see this trait, so they
/// can run against synthetic decoders in tests without a real architecture
/// backend.
pub trait InstructionDecoder {
    /// Decode one instruction from `bytes` at `address`. Returns `None` for
    /// malformed or truncated input.
    fn decode_one(&self, bytes: &[u8], address: u64) -> Option<Decoded>;
}

/// One decoded instruction as reported by an [`InstructionDecoder`].
#[derive(Debug, Clone)]
pub struct Decoded {
    pub size: usize,
    pub mnemonic: String,
    pub op_str: String,
    pub groups: InstrGroups,
    pub operands: Vec<DecodedOperand>,
}

/// Classification groups reported by the decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstrGroups {
    pub jump: bool,
    pub call: bool,
    pub ret: bool,
}

impl InstrGroups {
    pub fn is_branch(&self) -> bool {
        self.jump || self.call || self.ret
    }
}

#[derive(Debug, Clone)]
pub struct DecodedOperand {
    pub text: String,
    pub kind: DecodedOperandKind,
}

#[derive(Debug, Clone)]
pub enum DecodedOperandKind {
    Reg,
    Imm(i64),
    Mem {
        ip_relative: bool,
        disp: i64,
        width: u8,
    },
}

/// Capstone-backed x86-64 decoder.
pub struct CapstoneDecoder {
    cs: Capstone,
}

impl CapstoneDecoder {
    pub fn new() -> Result<Self, capstone::Error> {
        // x86-64 with details enabled; details are required for operand and
        // group introspection
        let cs = Capstone::new()
            .x86()
            .mode(arch::x86::ArchMode::Mode64)
            .detail(true)
            .build()?;

        Ok(Self { cs })
    }

    fn mem_text(&self, mem: &X86OpMem) -> String {
        let mut out = String::from("[");
        if mem.base().0 != 0 {
            if let Some(name) = self.cs.reg_name(mem.base()) {
                out.push_str(&name);
            }
        }
        if mem.index().0 != 0 {
            if out.len() > 1 {
                out.push('+');
            }
            if let Some(name) = self.cs.reg_name(mem.index()) {
                out.push_str(&name);
            }
            if mem.scale() != 1 {
                out.push_str(&format!("*{}", mem.scale()));
            }
        }
        let disp = mem.disp();
        if disp < 0 {
            out.push_str(&format!("-0x{:x}", disp.unsigned_abs()));
        } else if disp > 0 || out.len() == 1 {
            if out.len() > 1 {
                out.push('+');
            }
            out.push_str(&format!("0x{:x}", disp));
        }
        out.push(']');
        out
    }
}

impl InstructionDecoder for CapstoneDecoder {
    fn decode_one(&self, bytes: &[u8], address: u64) -> Option<Decoded> {
        let insns = self.cs.disasm_count(bytes, address, 1).ok()?;
        let ins = insns.iter().next()?;
        let detail = self.cs.insn_detail(ins).ok()?;

        let mut groups = InstrGroups::default();
        for g in detail.groups() {
            if g.0 == InsnGroupType::CS_GRP_JUMP as u8 {
                groups.jump = true;
            } else if g.0 == InsnGroupType::CS_GRP_CALL as u8 {
                groups.call = true;
            } else if g.0 == InsnGroupType::CS_GRP_RET as u8 {
                groups.ret = true;
            }
        }

        let mut operands = Vec::new();
        let arch_detail = detail.arch_detail();
        if let Some(x86) = arch_detail.x86() {
            for op in x86.operands() {
                let (text, kind) = match op.op_type {
                    X86OperandType::Reg(reg) => (
                        self.cs.reg_name(reg).unwrap_or_default(),
                        DecodedOperandKind::Reg,
                    ),
                    X86OperandType::Imm(imm) => {
                        (format!("{:#x}", imm), DecodedOperandKind::Imm(imm))
                    }
                    X86OperandType::Mem(mem) => (
                        self.mem_text(&mem),
                        DecodedOperandKind::Mem {
                            ip_relative: mem.base().0 == X86Reg::X86_REG_RIP as u16,
                            disp: mem.disp(),
                            width: op.size,
                        },
                    ),
                    X86OperandType::Invalid => continue,
                };
                operands.push(DecodedOperand { text, kind });
            }
        }

        Some(Decoded {
            size: ins.bytes().len(),
            mnemonic: ins.mnemonic().unwrap_or("").to_string(),
            op_str: ins.op_str().unwrap_or("").to_string(),
            groups,
            operands,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_single_push() {
        let dec = CapstoneDecoder::new().unwrap();
        // push rbp
        let ins = dec.decode_one(&[0x55], 0x1000).unwrap();
        assert_eq!(ins.size, 1);
        assert_eq!(ins.mnemonic, "push");
        assert_eq!(ins.op_str, "rbp");
    }

    #[test]
    fn decode_garbage_is_none() {
        let dec = CapstoneDecoder::new().unwrap();
        assert!(dec.decode_one(&[], 0).is_none());
        // lone REX prefix never forms an instruction
        assert!(dec.decode_one(&[0x48], 0).is_none());
    }

    #[test]
    fn call_reports_call_group() {
        let dec = CapstoneDecoder::new().unwrap();
        // call +0x100
        let ins = dec.decode_one(&[0xe8, 0x00, 0x01, 0x00, 0x00], 0x1000).unwrap();
        assert!(ins.groups.call);
        assert!(ins.groups.is_branch());
        assert_eq!(ins.size, 5);
    }

    #[test]
    fn ret_reports_ret_group() {
        let dec = CapstoneDecoder::new().unwrap();
        let ins = dec.decode_one(&[0xc3], 0x1000).unwrap();
        assert!(ins.groups.ret);
        assert!(!ins.groups.jump);
    }

    #[test]
    fn rip_relative_mem_operand() {
        let dec = CapstoneDecoder::new().unwrap();
        // mov rax, qword ptr [rip + 0x2000]
        let ins = dec
            .decode_one(&[0x48, 0x8b, 0x05, 0x00, 0x20, 0x00, 0x00], 0x1000)
            .unwrap();
        assert_eq!(ins.operands.len(), 2);
        match ins.operands[1].kind {
            DecodedOperandKind::Mem {
                ip_relative,
                disp,
                width,
            } => {
                assert!(ip_relative);
                assert_eq!(disp, 0x2000);
                assert_eq!(width, 8);
            }
            _ => panic!("expected memory operand"),
        }
        assert!(ins.operands[1].text.contains("rip"));
    }

    #[test]
    fn immediate_operand_value() {
        let dec = CapstoneDecoder::new().unwrap();
        // mov eax, 0x2a
        let ins = dec.decode_one(&[0xb8, 0x2a, 0x00, 0x00, 0x00], 0).unwrap();
        match ins.operands[1].kind {
            DecodedOperandKind::Imm(v) => assert_eq!(v, 0x2a),
            _ => panic!("expected immediate operand"),
        }
    }
}
