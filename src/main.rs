use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use disasm_helper::decoder::CapstoneDecoder;
use disasm_helper::describe::DisasmHelper;
use disasm_helper::eval::{FixedSession, RegisterResolver};
use disasm_helper::instr::OperandDetail;
use disasm_helper::memory::{MemoryImage, MemoryRegion};
use disasm_helper::scan::{scan_back, scan_next};
use disasm_helper::strings;

/// Inspect a raw x86-64 code image the way a debugger's disassembly view
/// would: pick an address, walk instruction boundaries around it and print
/// what is there.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Raw memory image holding machine code
    image: PathBuf,

    /// Load address of the image
    #[arg(long, value_parser = parse_hex, default_value = "0x1000")]
    base: u64,

    /// Address to center the window on; defaults to the load address
    #[arg(long, value_parser = parse_hex)]
    addr: Option<u64>,

    /// Instructions of context before and after the address
    #[arg(long, default_value_t = 8)]
    context: usize,

    /// Register values for operand resolution, e.g. --reg rax=0x4000
    #[arg(long = "reg", value_parser = parse_reg)]
    regs: Vec<(String, u64)>,

    /// Annotate memory-operand targets that look like printable strings
    #[arg(long)]
    strings: bool,

    /// Print full operand diagnostics instead of one line per instruction
    #[arg(long)]
    describe: bool,
}

fn parse_hex(s: &str) -> Result<u64, String> {
    let t = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(t, 16).map_err(|e| format!("bad address {s:?}: {e}"))
}

fn parse_reg(s: &str) -> Result<(String, u64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got {s:?}"))?;
    Ok((name.to_string(), parse_hex(value)?))
}

fn main() -> Result<()> {
    let _logger = flexi_logger::Logger::try_with_env_or_str("info")?.start()?;
    let args = Args::parse();

    let file = File::open(&args.image)
        .with_context(|| format!("failed to open image {}", args.image.display()))?;
    let mmap = unsafe { Mmap::map(&file)? };
    let bytes: &[u8] = &mmap;
    anyhow::ensure!(!bytes.is_empty(), "image is empty");

    let decoder = CapstoneDecoder::new()?;
    let mut resolver = RegisterResolver::new();
    for (name, value) in &args.regs {
        resolver.set(name, *value);
    }
    let mut image = MemoryImage::new();
    image.add_region(MemoryRegion::new("image", args.base, bytes.to_vec()));
    let session = FixedSession(true);
    let helper = DisasmHelper::new(&decoder, &image, &resolver, &session);

    let addr = args.addr.unwrap_or(args.base);
    let start = scan_back(&decoder, bytes, args.base, addr, args.context);
    let end = scan_next(&decoder, bytes, args.base, addr, args.context);
    info!(
        "window [{start:#x}, {end:#x}] around {addr:#x}, {} regions",
        image.regions().len()
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut at = start;
    while at <= end && at < args.base + bytes.len() as u64 {
        let record = helper.describe(at);
        if args.describe {
            helper.print_description(at, &mut out)?;
        } else {
            let marker = if at == addr { '>' } else { ' ' };
            writeln!(out, "{marker}{:>12x}  {}", record.address, record.text)?;
        }
        if args.strings {
            for op in &record.operands {
                if let OperandDetail::Memory { constant, .. } = op.detail {
                    if let Some(guess) = strings::string_at(&image, constant, 64) {
                        writeln!(out, "             ; {:?} \"{}\"", guess.kind, guess.text)?;
                    }
                }
            }
        }
        at += record.size.max(1) as u64;
    }

    Ok(())
}
