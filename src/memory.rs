use serde_json::{json, Value};

/// Bounded access to debuggee memory.
///
/// Reads are all-or-nothing: a range that touches any unmapped byte fails as
/// a whole. String detection and operand dereferencing treat a failed read as
/// a negative answer, never as an error.
pub trait MemoryReader {
    /// Fill `buf` from `addr`. Returns false when any part of the range is
    /// unreadable.
    fn read(&self, addr: u64, buf: &mut [u8]) -> bool;

    /// Whether `addr` points into readable memory.
    fn is_valid_read_ptr(&self, addr: u64) -> bool;
}

pub struct MemoryRegion {
    pub name: String,
    pub start: u64,
    pub bytes: Vec<u8>,
}

impl MemoryRegion {
    pub fn new(name: impl Into<String>, start: u64, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            start,
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end()
    }

    pub fn end(&self) -> u64 {
        self.start + self.size()
    }

    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "start": format!("0x{:x}", self.start),
            "size": format!("0x{:x}", self.size()),
        })
    }
}

/// A set of disjoint regions standing in for a debuggee address space.
#[derive(Default)]
pub struct MemoryImage {
    regions: Vec<MemoryRegion>,
}

impl MemoryImage {
    pub fn new() -> Self {
        Self {
            regions: Vec::new(),
        }
    }

    pub fn add_region(&mut self, region: MemoryRegion) {
        self.regions.push(region);
    }

    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    fn region_at(&self, addr: u64) -> Option<&MemoryRegion> {
        self.regions.iter().find(|r| r.contains(addr))
    }
}

impl MemoryReader for MemoryImage {
    fn read(&self, addr: u64, buf: &mut [u8]) -> bool {
        let Some(region) = self.region_at(addr) else {
            return false;
        };
        let off = (addr - region.start) as usize;
        let Some(src) = region.bytes.get(off..off + buf.len()) else {
            return false;
        };
        buf.copy_from_slice(src);
        true
    }

    fn is_valid_read_ptr(&self, addr: u64) -> bool {
        self.region_at(addr).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> MemoryImage {
        let mut img = MemoryImage::new();
        img.add_region(MemoryRegion::new("code", 0x1000, vec![0xaa; 0x100]));
        img.add_region(MemoryRegion::new("data", 0x4000, vec![0xbb; 0x10]));
        img
    }

    #[test]
    fn read_inside_region() {
        let img = image();
        let mut buf = [0u8; 4];
        assert!(img.read(0x10fc, &mut buf));
        assert_eq!(buf, [0xaa; 4]);
    }

    #[test]
    fn read_crossing_region_end_fails() {
        let img = image();
        let mut buf = [0u8; 4];
        assert!(!img.read(0x10fd, &mut buf));
        assert!(!img.read(0x2000, &mut buf));
    }

    #[test]
    fn pointer_validity_is_region_membership() {
        let img = image();
        assert!(img.is_valid_read_ptr(0x1000));
        assert!(img.is_valid_read_ptr(0x400f));
        assert!(!img.is_valid_read_ptr(0x4010));
        assert!(!img.is_valid_read_ptr(0xfff));
    }

    #[test]
    fn region_json_shape() {
        let region = MemoryRegion::new("code", 0x1000, vec![0; 0x20]);
        let v = region.to_json();
        assert_eq!(v["name"], "code");
        assert_eq!(v["start"], "0x1000");
        assert_eq!(v["size"], "0x20");
    }
}
