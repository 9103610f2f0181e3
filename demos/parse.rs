use color_eyre::eyre::Result;

use log::LevelFilter;
use simple_logger::SimpleLogger;
use zepa::memory::StdMem;
use zepa::processor::Machine;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new().with_level(LevelFilter::Info).init().unwrap(); // logging

    let mem = StdMem::from_file("demos/programs/jump.asm")?;
    mem.dump();
    let mut cpu = Machine::new(mem);

    cpu.execute_until_halt()?;
    cpu.dump_registers();

    Ok(())
}
