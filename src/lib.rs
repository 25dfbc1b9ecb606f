// Crate root: declare modules and control visibility
pub mod decoder;
pub mod describe;
pub mod eval;
pub mod instr;
pub mod memory;
pub mod scan;
pub mod strings;

// Re-export commonly used API from the library for binaries/tests
pub use describe::DisasmHelper;
pub use instr::InstructionRecord;
pub use scan::{instr_size, scan_back, scan_next};
