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

//! Printable-string heuristics for data addresses.
//!
//! A short probe read pre-screens an address; a word that is itself a valid
//! readable pointer is rejected outright, since import tables and pointer
//! chains otherwise pass the printable-byte test surprisingly often.

use serde::Serialize;

use crate::memory::MemoryReader;

/// Probe window used by [`might_be_string`]. Only the first
/// `PROBE_LEN - 3` bytes are read; the rest stays zeroed so a terminator is
/// always in bounds.
const PROBE_LEN: usize = 11;

/// Width of the candidate pointer at the front of a probe.
const PTR_WIDTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StringKind {
    Ascii,
    Utf16,
}

/// A detected string, escaped for display.
#[derive(Debug, Clone, Serialize)]
pub struct StringGuess {
    pub kind: StringKind,
    pub text: String,
}

fn is_display_byte(b: u8) -> bool {
    (0x20..0x7f).contains(&b) || matches!(b, b'\t' | b'\n' | 0x0b | 0x0c | b'\r')
}

/// Whether `data` starts with a NUL-terminated run of printable bytes.
///
/// The terminator must appear within `max_len` bytes and the run length must
/// satisfy `2 <= len <= max_len - 2`.
pub fn looks_like_ascii(data: &[u8], max_len: usize) -> bool {
    let len = match data.iter().take(max_len).position(|&b| b == 0) {
        Some(p) => p,
        None => return false,
    };
    if len < 2 || len + 1 >= max_len {
        return false;
    }
    data[..len].iter().all(|&b| is_display_byte(b))
}

/// Same scan over little-endian 16-bit units; `max_len` counts units. Units
/// with a non-zero high byte fail (extended-ASCII range only).
pub fn looks_like_utf16_ascii(data: &[u8], max_len: usize) -> bool {
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    let len = match units.iter().take(max_len).position(|&u| u == 0) {
        Some(p) => p,
        None => return false,
    };
    if len < 2 || len + 1 >= max_len {
        return false;
    }
    units[..len].iter().all(|&u| u <= 0xff && is_display_byte(u as u8))
}

/// Cheap pre-screen: does the memory at `addr` look like the start of a
/// printable string?
pub fn might_be_string(memory: &dyn MemoryReader, addr: u64) -> bool {
    let mut probe = [0u8; PROBE_LEN];
    if !memory.read(addr, &mut probe[..PROBE_LEN - 3]) {
        return false;
    }

    let mut word = [0u8; PTR_WIDTH];
    word.copy_from_slice(&probe[..PTR_WIDTH]);
    if memory.is_valid_read_ptr(u64::from_le_bytes(word)) {
        // imports/pointers
        return false;
    }

    looks_like_ascii(&probe, PROBE_LEN) || looks_like_utf16_ascii(&probe, PROBE_LEN)
}

/// Read up to `max_len` characters at `addr` and return them escaped, or
/// `None` when the content does not classify as a string.
pub fn string_at(memory: &dyn MemoryReader, addr: u64, max_len: usize) -> Option<StringGuess> {
    if !might_be_string(memory, addr) {
        return None;
    }

    let mut data = vec![0u8; (max_len + 1) * 2];
    if !memory.read(addr, &mut data) {
        return None;
    }
    if data.len() >= PTR_WIDTH {
        let mut word = [0u8; PTR_WIDTH];
        word.copy_from_slice(&data[..PTR_WIDTH]);
        if memory.is_valid_read_ptr(u64::from_le_bytes(word)) {
            return None;
        }
    }

    if looks_like_ascii(&data, max_len) {
        let mut text = String::new();
        for &b in data.iter().take_while(|&&b| b != 0) {
            escape_into(b, &mut text);
        }
        return Some(StringGuess {
            kind: StringKind::Ascii,
            text,
        });
    }

    if looks_like_utf16_ascii(&data, max_len) {
        let mut text = String::new();
        for chunk in data.chunks_exact(2) {
            let unit = u16::from_le_bytes([chunk[0], chunk[1]]);
            if unit == 0 {
                break;
            }
            escape_into(unit as u8, &mut text);
        }
        return Some(StringGuess {
            kind: StringKind::Utf16,
            text,
        });
    }

    None
}

fn escape_into(b: u8, out: &mut String) {
    match b {
        b'\t' => out.push_str("\\t"),
        0x0c => out.push_str("\\f"),
        0x0b => out.push_str("\\v"),
        b'\n' => out.push_str("\\n"),
        b'\r' => out.push_str("\\r"),
        b'\\' => out.push_str("\\\\"),
        b'"' => out.push_str("\\\""),
        _ => out.push(b as char),
    }
}
