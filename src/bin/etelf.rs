//! `etelf` command-line entry point (spec.md §6, SPEC_FULL.md §C).
//!
//! `etelf [options] input-file output-file`. Mirrors `etelf.cpp`'s flag
//! semantics: `-u`/union is the default output mode unless `-m`/mirror is
//! given; `-v`/`-q` control the default log level (quiet wins if both are
//! given, matching spec.md's "suppress logging (default)"); an unknown
//! flag is a warning, not an abort; a missing output filename is a hard
//! usage error.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;

use etelf::elfmap::ElfMap;
use etelf::{OutputMode, Program};

/// Command-line options for `etelf`.
#[derive(Parser, Debug)]
#[command(name = "etelf", about = "Lift, rewrite, and re-emit an ELF executable")]
struct Cli {
    /// Input ELF executable.
    input: PathBuf,

    /// Output path for the rewritten ELF image.
    output: PathBuf,

    /// Preserve dynamic linking (mirror mode).
    #[arg(short = 'm', long = "mirror", conflicts_with = "union")]
    mirror: bool,

    /// Merge every module into one static executable (default).
    #[arg(short = 'u', long = "union")]
    union: bool,

    /// Enable debug-level logging.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Suppress logging below warnings (default).
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// Anything left over after `input`/`output`/the known flags are
    /// consumed: per spec.md §6 ("unknown option -> warning, continue"),
    /// logged rather than treated as a hard parse error.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    unknown: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose && !cli.quiet {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let settings = match etelf::debug_env::DebugSettings::from_env(default_level) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(1);
        }
    };
    etelf::debug_env::install(settings);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    for extra in &cli.unknown {
        log::warn!("ignoring unrecognized option {extra:?}");
    }
    let mode = if cli.mirror { OutputMode::Mirror } else { OutputMode::Union };

    let data = fs::read(&cli.input)
        .with_context(|| format!("reading input file {}", cli.input.display()))?;
    let elf = ElfMap::parse(&data).with_context(|| format!("parsing {}", cli.input.display()))?;

    let machine = machine_for(elf.architecture());

    let mut program = Program::new();
    let disassembler = NullDisassembler;
    let module = etelf::ingest::ingest_module(&mut program, &elf, &disassembler, "module-(executable)", &[]);

    let arch = etelf::arch::Arch::from_target(elf.architecture())
        .ok_or_else(|| anyhow::anyhow!("unsupported architecture: {:?}", elf.architecture()))?;
    let ctx = etelf::pass::conductor::ConductorContext::default();
    etelf::pass::conductor::run_with_context(&mut program, mode, arch, &ctx)
        .with_context(|| "running rewrite pipeline")?;

    let output_bytes = match mode {
        OutputMode::Mirror => etelf::emit::mirror::build(&program, module, &data, machine)?,
        OutputMode::Union => etelf::emit::union::build(&program, machine)?,
    };

    fs::write(&cli.output, output_bytes)
        .with_context(|| format!("writing output file {}", cli.output.display()))?;
    Ok(())
}

fn machine_for(arch: object::Architecture) -> u16 {
    match arch {
        object::Architecture::Aarch64 => etelf::gen::elf_types::EM_AARCH64,
        _ => etelf::gen::elf_types::EM_X86_64,
    }
}

/// Placeholder used until a real decoder (capstone, iced-x86, ...) is
/// wired in (spec.md §1 Non-goal: no disassembler is implemented here).
/// Treats every byte as an opaque, non-branching instruction so the
/// pipeline is exercisable end to end without one.
struct NullDisassembler;

impl etelf::elfmap::Disassembler for NullDisassembler {
    fn decode_range(&self, data: &[u8], base_address: u64) -> Vec<etelf::elfmap::DecodedInstruction> {
        data.iter()
            .enumerate()
            .map(|(i, &b)| etelf::elfmap::DecodedInstruction {
                address: base_address + i as u64,
                bytes: vec![b],
                is_return: b == 0xc3,
                is_indirect_jump: false,
                is_indirect_call: false,
                direct_target: None,
            })
            .collect()
    }

    fn find_jump_table(&self, _jump_address: u64) -> Option<(u64, u8, u32)> {
        None
    }
}
