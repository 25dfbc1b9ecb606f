use disasm_helper::decoder::CapstoneDecoder;
use disasm_helper::describe::DisasmHelper;
use disasm_helper::eval::{FixedSession, RegisterResolver};
use disasm_helper::memory::{MemoryImage, MemoryRegion};

fn main() {
    // push rbp; mov rbp, rsp; mov rax, qword ptr [rip + 0xff5]; ret
    let mut code = vec![
        0x55, 0x48, 0x89, 0xe5, 0x48, 0x8b, 0x05, 0xf5, 0x0f, 0x00, 0x00, 0xc3,
    ];
    code.resize(0x20, 0x90);

    let decoder = CapstoneDecoder::new().unwrap();
    let mut resolver = RegisterResolver::new();
    resolver.set("rsp", 0x7fff_0000);
    resolver.set("rbp", 0x7fff_0040);
    let mut image = MemoryImage::new();
    image.add_region(MemoryRegion::new("code", 0x1000, code));
    let session = FixedSession(true);
    let helper = DisasmHelper::new(&decoder, &image, &resolver, &session);

    let mut out = std::io::stdout();
    let mut addr = 0x1000;
    for _ in 0..4 {
        helper.print_description(addr, &mut out).unwrap();
        addr += helper.size_at(addr) as u64;
    }
}
