use std::fs;
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use color_eyre::eyre::{Result, WrapErr};
use log::LevelFilter;
use simple_logger::SimpleLogger;

use zepa::assembler::{self, Image};
use zepa::memory::StdMem;
use zepa::processor::{Exit, LoadMode, Machine, MachineConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LoadArg {
    /// LOAD puts the address itself into the register
    Literal,
    /// LOAD reads the byte stored at the address
    Memory,
}

impl From<LoadArg> for LoadMode {
    fn from(arg: LoadArg) -> Self {
        match arg {
            LoadArg::Literal => LoadMode::Literal,
            LoadArg::Memory => LoadMode::Memory,
        }
    }
}

/// Assemble and run a zepa program
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Assembly source, or a raw image with `--binary`
    source: PathBuf,

    /// Treat SOURCE as an already assembled image
    #[arg(long)]
    binary: bool,

    /// Write the assembled image to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Stop after assembling
    #[arg(long)]
    assemble_only: bool,

    #[arg(long, value_enum, default_value = "literal")]
    load_mode: LoadArg,

    /// Stop after this many instructions
    #[arg(long)]
    max_steps: Option<u64>,

    /// More output, repeat for tracing every instruction
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn load(args: &Args) -> Result<Image> {
    if args.binary {
        let bytes = fs::read(&args.source)
            .wrap_err_with(|| format!("Failed to read image {}", args.source.display()))?;
        return Ok(Image::from_bytes(bytes));
    }

    Ok(assembler::assemble_file(&args.source)?)
}

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling

    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    SimpleLogger::new().with_level(level).init().unwrap(); // logging

    let image = load(&args)?;
    log::info!("Assembled {} instruction(s)", image.len() / 4);

    if let Some(output) = &args.output {
        fs::write(output, image.as_bytes())
            .wrap_err_with(|| format!("Failed to write image {}", output.display()))?;
    }

    if args.assemble_only {
        return Ok(());
    }

    let config = MachineConfig {
        load_mode: args.load_mode.into(),
        step_limit: args.max_steps,
    };
    let mem = StdMem::with_image(&image)?;
    let mut cpu = Machine::with_config(mem, config);

    let exit = cpu.run().wrap_err("Machine faulted")?;
    if let Exit::StepLimit { steps } = exit {
        log::warn!("Stopped after {} step(s) without halting", steps);
    }

    cpu.dump_registers();
    cpu.memory.dump();

    Ok(())
}
