use color_eyre::eyre::Result;

use log::LevelFilter;
use simple_logger::SimpleLogger;
use zepa::isa::{Instruction, Register};
use zepa::memory::{Address, StdMem};
use zepa::processor::{Exit, Machine, MachineConfig};
use zepa::write_instructions;

/// The loop starts here
const ENTRYPOINT: Address = 0x0000;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new().with_level(LevelFilter::Debug).init().unwrap(); // logging

    let mut mem = StdMem::default();

    // W0 counts down from 10 forever; there is no conditional branch, so the
    // step limit stops it
    write_instructions!(mem : ENTRYPOINT =>
        Instruction::Mv { rd: Register::W0, imm: 10 },
        Instruction::Mv { rd: Register::W1, imm: 1 },
        Instruction::Sub { rd: Register::W0, rs1: Register::W0, rs2: Register::W1 },
        Instruction::Jump { addr: 8 }
    )?;

    let config = MachineConfig {
        step_limit: Some(2 + 2 * 10),
        ..MachineConfig::default()
    };
    let mut cpu = Machine::with_config(mem, config);

    let exit = cpu.run()?;
    assert_eq!(exit, Exit::StepLimit { steps: 22 });
    assert_eq!(cpu.registers[Register::W0], 0);

    Ok(())
}
