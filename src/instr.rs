//! Display records produced for the disassembly view.

/// How an instruction is grouped for display highlighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrClass {
    /// No special handling.
    Normal,
    /// Jump, call or return.
    Branch,
    /// Touches a stack- or frame-pointer register.
    Stack,
}

impl InstrClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrClass::Normal => "normal",
            InstrClass::Branch => "branch",
            InstrClass::Stack => "stack",
        }
    }
}

/// One instruction at one address, ready for display.
#[derive(Debug, Clone, serde::Serialize)]
pub struct InstructionRecord {
    pub address: u64,
    pub size: usize,
    pub text: String, // e.g., "mov rax, rbx"
    pub class: InstrClass,
    pub operands: Vec<Operand>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Operand {
    pub text: String,
    pub detail: OperandDetail,
}

/// Resolved operand values.
///
/// `constant` is the literal baked into the encoding (immediate value or
/// memory displacement); `value` is what the operand evaluates to right now
/// (register content or effective address).
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OperandDetail {
    /// Register or immediate.
    Normal { constant: u64, value: u64 },
    /// Memory reference. `value` is the effective address when the operand
    /// text resolved, and `contents` the dereferenced bytes when that
    /// address is readable.
    Memory {
        constant: u64,
        value: Option<u64>,
        contents: Option<MemValue>,
    },
}

/// Memory content behind a memory operand, 1/2/4/8 bytes wide.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MemValue {
    pub width: u8,
    pub value: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_operand_carries_kind_tag() {
        let record = InstructionRecord {
            address: 0x1000,
            size: 3,
            text: "mov rax, qword ptr [rbx]".to_string(),
            class: InstrClass::Normal,
            operands: vec![
                Operand {
                    text: "rax".to_string(),
                    detail: OperandDetail::Normal {
                        constant: 7,
                        value: 7,
                    },
                },
                Operand {
                    text: "[rbx]".to_string(),
                    detail: OperandDetail::Memory {
                        constant: 0,
                        value: Some(0x4000),
                        contents: Some(MemValue {
                            width: 8,
                            value: 0x2a,
                        }),
                    },
                },
            ],
        };
        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(v["class"], "normal");
        assert_eq!(v["operands"][0]["detail"]["kind"], "normal");
        assert_eq!(v["operands"][1]["detail"]["kind"], "memory");
        assert_eq!(v["operands"][1]["detail"]["contents"]["width"], 8);
    }
}
