use std::str::FromStr;

use color_eyre::eyre::Result;

use simple_logger::SimpleLogger;
use zepa::isa::Register;
use zepa::memory::StdMem;
use zepa::processor::Machine;

const PROGRAM: &str = r#"
    MV  W1, #42
    MV  W2, #58
    ADD W0, W1, W2
"#;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new().init().unwrap(); // logging

    let mem = StdMem::from_str(PROGRAM)?;
    let mut cpu = Machine::new(mem);

    cpu.execute_until_halt()?;
    assert_eq!(cpu.registers[Register::W0], 100);

    Ok(())
}
