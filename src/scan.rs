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

//! Instruction-boundary scans over a raw code window.
//!
//! Instruction lengths vary byte to byte, so "the Nth instruction before this
//! one" cannot be read off directly: [`scan_back`] estimates a safe earlier
//! point, decodes forward from there and remembers every boundary it visits.
//! The result is best-effort, since decoding forward from an arbitrary offset
//! may resynchronize onto a different valid instruction stream than the one
//! that actually executed.

use log::trace;

use crate::decoder::InstructionDecoder;

/// Maximum length of a single x86/x64 instruction.
pub const MAX_INSTR_LEN: usize = 16;

/// Largest backward-instruction count accepted by [`scan_back`].
pub const MAX_BACK_COUNT: usize = 127;

const RING_CAPACITY: usize = MAX_BACK_COUNT + 1;

/// Fixed-capacity ring of recently visited instruction start addresses.
/// Pushing past capacity overwrites the oldest entry.
struct BoundaryRing {
    slots: [u64; RING_CAPACITY],
    total: usize,
}

impl BoundaryRing {
    fn new() -> Self {
        Self {
            slots: [0; RING_CAPACITY],
            total: 0,
        }
    }

    fn push(&mut self, addr: u64) {
        self.slots[self.total % RING_CAPACITY] = addr;
        self.total += 1;
    }

    fn len(&self) -> usize {
        self.total
    }

    /// Oldest address still held.
    fn earliest(&self) -> u64 {
        if self.total <= RING_CAPACITY {
            self.slots[0]
        } else {
            self.slots[self.total % RING_CAPACITY]
        }
    }

    /// Address pushed `n` positions back; `n = 1` is the most recent push.
    fn nth_back(&self, n: usize) -> u64 {
        debug_assert!(n >= 1 && n <= self.total.min(RING_CAPACITY));
        self.slots[(self.total - n) % RING_CAPACITY]
    }
}

/// Length of the instruction at `address`, or 1 when the bytes do not
/// decode. Never returns 0, so scans always make forward progress.
pub fn instr_size(decoder: &dyn InstructionDecoder, bytes: &[u8], address: u64) -> usize {
    match decoder.decode_one(bytes, address) {
        Some(ins) if ins.size > 0 => ins.size,
        _ => 1,
    }
}

/// Address of the instruction `n` positions before `ip`.
///
/// `bytes` covers the addresses `[base, base + bytes.len())`. `n` is clamped
/// to `[0, MAX_BACK_COUNT]` and `ip` into the window; `n == 0` and `ip < n`
/// return `ip` unchanged. When the scanned window holds fewer than `n`
/// instructions (near the start of the buffer) the earliest boundary found is
/// returned instead.
pub fn scan_back(
    decoder: &dyn InstructionDecoder,
    bytes: &[u8],
    base: u64,
    ip: u64,
    n: usize,
) -> u64 {
    if bytes.is_empty() {
        return base;
    }

    let n = n.min(MAX_BACK_COUNT);
    let end = base + bytes.len() as u64;
    let ip = ip.min(end - 1).max(base);

    if n == 0 {
        return ip;
    }
    if ip < n as u64 {
        return ip;
    }

    let back = (MAX_INSTR_LEN * (n + 3)).min((ip - base) as usize);
    let mut addr = ip - back as u64;

    let mut ring = BoundaryRing::new();
    while addr < ip {
        ring.push(addr);
        let off = (addr - base) as usize;
        addr += instr_size(decoder, &bytes[off..], addr) as u64;
    }

    let found = ring.len();
    trace!("scan_back: ip={ip:#x} n={n} back={back} found={found}");
    if found < n {
        ring.earliest()
    } else {
        ring.nth_back(n)
    }
}

/// Address of the instruction `n` positions after `ip`, advancing one decoded
/// length at a time until `n` steps are taken or the window runs out.
pub fn scan_next(
    decoder: &dyn InstructionDecoder,
    bytes: &[u8],
    base: u64,
    ip: u64,
    n: usize,
) -> u64 {
    if bytes.is_empty() {
        return base;
    }

    let end = base + bytes.len() as u64;
    let mut ip = ip.min(end - 1).max(base);
    if n == 0 {
        return ip;
    }

    for _ in 0..n {
        if ip >= end {
            break;
        }
        let off = (ip - base) as usize;
        ip += instr_size(decoder, &bytes[off..], ip) as u64;
    }
    ip
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{Decoded, DecodedOperand, InstrGroups};

    /// Synthetic decoder: every instruction is `width` bytes.
    struct FixedWidth(usize);

    impl InstructionDecoder for FixedWidth {
        fn decode_one(&self, bytes: &[u8], _address: u64) -> Option<Decoded> {
            if bytes.len() < self.0 {
                return None;
            }
            Some(fake("nop.w", self.0))
        }
    }

    /// Synthetic decoder over a toy encoding: 0x90 is a 1-byte nop, 0xeb a
    /// 2-byte jump, anything else fails to decode.
    struct Toy;

    impl InstructionDecoder for Toy {
        fn decode_one(&self, bytes: &[u8], _address: u64) -> Option<Decoded> {
            match bytes.first()? {
                0x90 => Some(fake("nop", 1)),
                0xeb if bytes.len() >= 2 => Some(fake("jmp", 2)),
                _ => None,
            }
        }
    }

    /// Decoder that reports a zero length, which the size helper must reject.
    struct ZeroSize;

    impl InstructionDecoder for ZeroSize {
        fn decode_one(&self, _bytes: &[u8], _address: u64) -> Option<Decoded> {
            Some(fake("bad", 0))
        }
    }

    fn fake(mnemonic: &str, size: usize) -> Decoded {
        Decoded {
            size,
            mnemonic: mnemonic.to_string(),
            op_str: String::new(),
            groups: InstrGroups::default(),
            operands: Vec::<DecodedOperand>::new(),
        }
    }

    #[test]
    fn instr_size_is_never_zero() {
        assert_eq!(instr_size(&Toy, &[], 0), 1);
        assert_eq!(instr_size(&Toy, &[0xff, 0xff], 0), 1);
        assert_eq!(instr_size(&ZeroSize, &[0x00], 0), 1);
        assert_eq!(instr_size(&Toy, &[0x90], 0), 1);
        assert_eq!(instr_size(&Toy, &[0xeb, 0x01], 0), 2);
    }

    #[test]
    fn scan_back_zero_count_returns_ip() {
        let code = vec![0x90u8; 64];
        for ip in [0, 1, 17, 63] {
            assert_eq!(scan_back(&Toy, &code, 0, ip, 0), ip);
        }
    }

    #[test]
    fn scan_back_with_fewer_bytes_than_count_returns_ip() {
        let code = vec![0x90u8; 64];
        // ip below n: conservative guard near the buffer start
        assert_eq!(scan_back(&Toy, &code, 0, 3, 5), 3);
        assert_eq!(scan_back(&Toy, &code, 0, 9, 10), 9);
    }

    #[test]
    fn scan_back_clamps_ip_into_window() {
        let code = vec![0x90u8; 16];
        assert_eq!(scan_back(&Toy, &code, 0, 1000, 0), 15);
        assert_eq!(scan_back(&Toy, &code, 0, 1000, 1), 14);
    }

    #[test]
    fn scan_back_count_clamped_to_maximum() {
        let code = vec![0x90u8; 4096];
        let ip = 4000;
        assert_eq!(
            scan_back(&Toy, &code, 0, ip, 500),
            scan_back(&Toy, &code, 0, ip, MAX_BACK_COUNT)
        );
        assert_eq!(scan_back(&Toy, &code, 0, ip, 500), ip - 127);
    }

    #[test]
    fn scan_next_steps_over_variable_lengths() {
        // nop, nop, jmp, nop
        let code = [0x90, 0x90, 0xeb, 0x01, 0x90];
        assert_eq!(scan_next(&Toy, &code, 0, 0, 0), 0);
        assert_eq!(scan_next(&Toy, &code, 0, 0, 1), 1);
        assert_eq!(scan_next(&Toy, &code, 0, 0, 3), 4);
        assert_eq!(scan_next(&Toy, &code, 0, 0, 4), 5);
    }

    #[test]
    fn scan_next_stops_at_window_end() {
        let code = [0x90, 0x90, 0x90];
        assert_eq!(scan_next(&Toy, &code, 0, 0, 10), 3);
    }

    #[test]
    fn scan_back_then_next_round_trips_on_fixed_width() {
        let dec = FixedWidth(4);
        let code = vec![0u8; 512];
        let ip = 400;
        for n in 0..=MAX_BACK_COUNT.min(ip as usize / 4) {
            let prev = scan_back(&dec, &code, 0, ip, n);
            assert_eq!(prev, ip - 4 * n as u64, "n={n}");
            assert_eq!(scan_next(&dec, &code, 0, prev, n), ip, "n={n}");
        }
    }

    #[test]
    fn scan_back_mixed_width_scenario() {
        // nop, nop, nop, jmp rel8 at 100..105
        let code = [0x90, 0x90, 0x90, 0xeb, 0x01];
        let base = 100;
        assert_eq!(scan_back(&Toy, &code, base, 105, 1), 103);
        assert_eq!(scan_back(&Toy, &code, base, 105, 2), 102);
        assert_eq!(scan_back(&Toy, &code, base, 105, 4), 100);
        // more instructions requested than the window holds: earliest found
        assert_eq!(scan_back(&Toy, &code, base, 105, 10), 100);
    }

    #[test]
    fn scan_back_undecodable_bytes_step_one() {
        let code = vec![0xffu8; 64];
        assert_eq!(scan_back(&Toy, &code, 0, 60, 5), 55);
    }

    #[test]
    fn boundary_ring_overwrites_oldest() {
        let mut ring = BoundaryRing::new();
        for i in 0..RING_CAPACITY as u64 {
            ring.push(i);
        }
        assert_eq!(ring.earliest(), 0);
        assert_eq!(ring.nth_back(1), RING_CAPACITY as u64 - 1);
        assert_eq!(ring.nth_back(RING_CAPACITY), 0);

        ring.push(1000);
        assert_eq!(ring.len(), RING_CAPACITY + 1);
        assert_eq!(ring.nth_back(1), 1000);
        // slot 0 was overwritten; the oldest survivor is the second push
        assert_eq!(ring.earliest(), 1);
    }
}
