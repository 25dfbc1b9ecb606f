//! Value resolution for register and memory-operand display text.

use std::collections::HashMap;

use regex::Regex;

/// Parses a register or expression display string into its current numeric
/// value. Backed by the debugger's expression evaluator in a live session.
pub trait ValueResolver {
    fn resolve(&self, expr: &str) -> Option<u64>;
}

/// Whether a debug session is currently active.
pub trait SessionState {
    fn is_debugging(&self) -> bool;
}

/// Session flag with a fixed answer, for tools and tests without a live
/// debug loop.
pub struct FixedSession(pub bool);

impl SessionState for FixedSession {
    fn is_debugging(&self) -> bool {
        self.0
    }
}

/// Resolver backed by a plain register table.
///
/// Understands bare register names, hex/decimal literals and single-register
/// effective addresses of the form `[reg]` / `[reg+0x10]` / `[reg-0x10]`.
/// Scaled-index forms are not evaluated and resolve to `None`, which callers
/// treat as "skip resolution".
pub struct RegisterResolver {
    regs: HashMap<String, u64>,
    mem_expr: Regex,
}

impl RegisterResolver {
    pub fn new() -> Self {
        Self {
            regs: HashMap::new(),
            mem_expr: Regex::new(r"^\[([a-z][a-z0-9]*)(?:\s*([+-])\s*(0x[0-9a-fA-F]+|\d+))?\]$")
                .unwrap(),
        }
    }

    pub fn set(&mut self, name: &str, value: u64) {
        self.regs.insert(name.to_string(), value);
    }

    fn literal(expr: &str) -> Option<u64> {
        if let Some(hex) = expr.strip_prefix("0x") {
            u64::from_str_radix(hex, 16).ok()
        } else {
            expr.parse().ok()
        }
    }
}

impl Default for RegisterResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueResolver for RegisterResolver {
    fn resolve(&self, expr: &str) -> Option<u64> {
        let expr = expr.trim();
        if let Some(&v) = self.regs.get(expr) {
            return Some(v);
        }
        if let Some(v) = Self::literal(expr) {
            return Some(v);
        }

        let caps = self.mem_expr.captures(expr)?;
        let mut value = *self.regs.get(&caps[1])?;
        if let (Some(sign), Some(disp)) = (caps.get(2), caps.get(3)) {
            let d = Self::literal(disp.as_str())?;
            value = if sign.as_str() == "-" {
                value.wrapping_sub(d)
            } else {
                value.wrapping_add(d)
            };
        }
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> RegisterResolver {
        let mut r = RegisterResolver::new();
        r.set("rax", 0x1000);
        r.set("rbx", 0x2000);
        r.set("rip", 0x7ff0_0000);
        r
    }

    #[test]
    fn resolves_bare_registers() {
        let r = resolver();
        assert_eq!(r.resolve("rax"), Some(0x1000));
        assert_eq!(r.resolve(" rbx "), Some(0x2000));
        assert_eq!(r.resolve("rcx"), None);
    }

    #[test]
    fn resolves_literals() {
        let r = resolver();
        assert_eq!(r.resolve("0x2a"), Some(0x2a));
        assert_eq!(r.resolve("42"), Some(42));
    }

    #[test]
    fn resolves_effective_addresses() {
        let r = resolver();
        assert_eq!(r.resolve("[rax]"), Some(0x1000));
        assert_eq!(r.resolve("[rax+0x10]"), Some(0x1010));
        assert_eq!(r.resolve("[rbx-0x8]"), Some(0x1ff8));
        assert_eq!(r.resolve("[rip+0x200]"), Some(0x7ff0_0200));
    }

    #[test]
    fn scaled_index_is_not_evaluated() {
        let r = resolver();
        assert_eq!(r.resolve("[rax+rbx*4+0x10]"), None);
        assert_eq!(r.resolve("[rcx]"), None);
    }
}
