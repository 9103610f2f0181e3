use std::cmp::Ordering;
use std::ops::{Index, IndexMut};

use crate::isa::{Instruction, Register, Word, HALT_WORD};
use crate::memory::{Address, Memory, StdMem, STD_MEM_SIZE};
use crate::Fault;
use log::*;

/// How `LOAD reg, addr` is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadMode {
    /// `reg <- addr`. The address itself is loaded, memory is not read.
    Literal,
    /// `reg <- memory[addr]`, the zero-extended byte at `addr`. Mirrors STORE.
    Memory,
}

impl Default for LoadMode {
    fn default() -> Self {
        Self::Literal
    }
}

/// Runtime options of a [`Machine`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MachineConfig {
    pub load_mode: LoadMode,
    /// Maximum number of instructions [`Machine::run`] executes before giving
    /// up. `None` runs until the machine halts.
    pub step_limit: Option<u64>,
}

/// Phase of the fetch-decode-execute cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Fetching,
    Decoding,
    /// Holds the decoded instruction until it is executed
    Executing(Instruction),
    Halted,
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exit {
    /// The machine fetched the halt word after `steps` instructions
    Halted { steps: u64 },
    /// The step limit was reached before the machine halted
    StepLimit { steps: u64 },
}

/// The register file, indexed by [`Register`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Registers {
    values: [u32; Register::COUNT],
}

impl Registers {
    pub fn iter(&self) -> impl Iterator<Item = (Register, u32)> + '_ {
        Register::ALL
            .iter()
            .map(move |register| (*register, self[*register]))
    }
}

impl Index<Register> for Registers {
    type Output = u32;

    fn index(&self, register: Register) -> &u32 {
        &self.values[register.index()]
    }
}

impl IndexMut<Register> for Registers {
    fn index_mut(&mut self, register: Register) -> &mut u32 {
        &mut self.values[register.index()]
    }
}

/// Emulates the zepa CPU together with the memory it owns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine<const S: usize> {
    pub registers: Registers,
    pub memory: Memory<S>,
    state: State,
    config: MachineConfig,
    /// Number of executed instructions
    steps: u64,
}

/// Machine with default memory
pub type StdMachine = Machine<STD_MEM_SIZE>;

impl Default for StdMachine {
    /// Initializes a machine with empty default memory
    fn default() -> Self {
        Self::new(StdMem::default())
    }
}

impl<const S: usize> Machine<S> {
    /// Initializes a machine around already loaded memory. Every register
    /// starts at zero, so execution begins at address zero.
    pub fn new(memory: Memory<S>) -> Self {
        Self::with_config(memory, MachineConfig::default())
    }

    pub fn with_config(memory: Memory<S>, config: MachineConfig) -> Self {
        Self {
            registers: Registers::default(),
            memory,
            state: State::Fetching,
            config,
            steps: 0,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_halted(&self) -> bool {
        self.state == State::Halted
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Number of instructions executed so far
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Reads the word at PC into IR and advances PC by four.
    pub fn fetch(&mut self) -> Result<Word, Fault> {
        let pc = self.registers[Register::PC];
        let word = self.memory.read_word(pc)?;

        self.registers[Register::IR] = word;
        self.registers[Register::PC] = pc.wrapping_add(4);

        Ok(word)
    }

    /// Decodes the word held in IR.
    pub fn decode(&self) -> Result<Instruction, Fault> {
        Ok(Instruction::decode(self.registers[Register::IR])?)
    }

    /// Executes a single decoded instruction
    pub fn execute_instruction(&mut self, instruction: Instruction) -> Result<(), Fault> {
        match instruction {
            Instruction::Mv { rd, imm } => {
                self.registers[rd] = imm as u32;

                debug!("MV {} {}", rd, imm);
            }
            Instruction::Add { rd, rs1, rs2 } => {
                let a = self.registers[rs1];
                let b = self.registers[rs2];
                let result = a.wrapping_add(b);
                self.registers[rd] = result;

                debug!("ADD {} {}: {}", a, b, result);
            }
            Instruction::Sub { rd, rs1, rs2 } => {
                let a = self.registers[rs1];
                let b = self.registers[rs2];
                let result = a.wrapping_sub(b);
                self.registers[rd] = result;

                debug!("SUB {} {}: {}", a, b, result);
            }
            Instruction::Cmp { rs1, rs2 } => {
                let a = self.registers[rs1];
                let b = self.registers[rs2];
                let status = match a.cmp(&b) {
                    Ordering::Equal => 0,
                    Ordering::Less => 1,
                    Ordering::Greater => 2,
                };
                self.registers[Register::SR] = status;

                debug!("CMP {} {}: {}", a, b, status);
            }
            Instruction::Jump { addr } => {
                self.registers[Register::PC] = addr as u32;

                debug!("JUMP {}", addr);
            }
            Instruction::Load { rd, addr } => {
                let value = match self.config.load_mode {
                    LoadMode::Literal => addr as u32,
                    LoadMode::Memory => self.memory.read_byte(addr as Address)? as u32,
                };
                self.registers[rd] = value;

                debug!("LOAD {} {}: {}", rd, addr, value);
            }
            Instruction::Store { rs, addr } => {
                let value = self.registers[rs] as u8;
                self.memory.write_byte(addr as Address, value)?;

                debug!("STORE {} {}: {}", rs, addr, value);
            }
        }

        Ok(())
    }

    /// Advances the machine by one phase and returns the phase it is in
    /// afterwards.
    ///
    /// # Errors
    ///
    /// On a fault the machine stays in the phase that failed.
    pub fn tick(&mut self) -> Result<State, Fault> {
        self.state = match self.state {
            State::Fetching => {
                let word = self.fetch()?;
                if word == HALT_WORD {
                    // leave PC on the halt word
                    self.registers[Register::PC] = self.registers[Register::PC].wrapping_sub(4);
                    info!(
                        "Halted at 0x{:04X} after {} step(s)",
                        self.registers[Register::PC],
                        self.steps
                    );
                    State::Halted
                } else {
                    State::Decoding
                }
            }
            State::Decoding => State::Executing(self.decode()?),
            State::Executing(instruction) => {
                self.execute_instruction(instruction)?;
                self.steps += 1;
                State::Fetching
            }
            State::Halted => State::Halted,
        };

        Ok(self.state)
    }

    /// Runs one execution step: fetch, decode and execute a single
    /// instruction, or halt.
    pub fn execute(&mut self) -> Result<State, Fault> {
        loop {
            match self.tick()? {
                State::Fetching | State::Halted => return Ok(self.state),
                State::Decoding | State::Executing(_) => {}
            }
        }
    }

    /// Run program until the halt word is fetched. Returns the number of
    /// instructions executed by this call.
    pub fn execute_until_halt(&mut self) -> Result<u64, Fault> {
        let start = self.steps;
        while !self.is_halted() {
            self.execute()?;
        }

        let result = self.registers[Register::W0];
        info!("Program terminated. W0: 0x{:08X} / {}", result, result);

        Ok(self.steps - start)
    }

    /// Like [`Machine::execute_until_halt`], but gives up after `limit`
    /// instructions.
    pub fn execute_with_limit(&mut self, limit: u64) -> Result<Exit, Fault> {
        let start = self.steps;
        while !self.is_halted() {
            if self.steps - start >= limit {
                // fetching the halt word executes nothing, so it still fits
                let at_halt = self.state == State::Fetching
                    && self.memory.read_word(self.registers[Register::PC]) == Ok(HALT_WORD);
                if !at_halt {
                    warn!("Step limit of {} reached", limit);
                    return Ok(Exit::StepLimit { steps: limit });
                }
            }
            self.execute()?;
        }

        Ok(Exit::Halted {
            steps: self.steps - start,
        })
    }

    /// Runs with the step limit from the machine's config.
    pub fn run(&mut self) -> Result<Exit, Fault> {
        match self.config.step_limit {
            Some(limit) => self.execute_with_limit(limit),
            None => self
                .execute_until_halt()
                .map(|steps| Exit::Halted { steps }),
        }
    }

    /// Logs every register except IR.
    pub fn dump_registers(&self) {
        info!("----------Registers----------");
        for (register, value) in self.registers.iter() {
            if register == Register::IR {
                continue;
            }
            info!("{}: {}", register, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use crate::isa::DecodeFault;
    use crate::memory::MemoryFault;
    use crate::write_instructions;

    use super::*;
    use color_eyre::eyre::Result;

    fn machine(source: &str) -> Result<StdMachine> {
        Ok(StdMachine::new(StdMem::from_str(source)?))
    }

    #[test]
    fn test_fetch() -> Result<()> {
        let mut mem = StdMem::default();
        mem.write_array(0, &[0b00110100, 0b01000011, 0b00001000, 0b00000000])?;
        let mut cpu = Machine::new(mem);

        let word = cpu.fetch()?;

        assert_eq!(word, 0b00110100010000110000100000000000);
        assert_eq!(cpu.registers[Register::IR], word);
        assert_eq!(cpu.registers[Register::PC], 4);

        Ok(())
    }

    #[test]
    fn test_decode() -> Result<()> {
        let mut mem = StdMem::default();
        mem.write_array(0, &[0b00110100, 0b01000011, 0b00001000, 0b00000000])?;
        let mut cpu = Machine::new(mem);

        cpu.fetch()?;

        assert_eq!(
            cpu.decode()?,
            Instruction::Add {
                rd: Register::W2,
                rs1: Register::W3,
                rs2: Register::W1
            }
        );

        Ok(())
    }

    #[test]
    fn test_phases() -> Result<()> {
        let mut cpu = machine("MV W3, #9")?;

        assert_eq!(cpu.state(), State::Fetching);
        assert_eq!(cpu.tick()?, State::Decoding);
        let mv = Instruction::Mv {
            rd: Register::W3,
            imm: 9,
        };
        assert_eq!(cpu.tick()?, State::Executing(mv));
        assert_eq!(cpu.registers[Register::W3], 0);
        assert_eq!(cpu.tick()?, State::Fetching);
        assert_eq!(cpu.registers[Register::W3], 9);
        assert_eq!(cpu.tick()?, State::Halted);
        assert_eq!(cpu.tick()?, State::Halted);
        assert_eq!(cpu.steps(), 1);

        Ok(())
    }

    #[test]
    fn test_mv() -> Result<()> {
        let mut cpu = StdMachine::default();
        cpu.execute_instruction(Instruction::Mv {
            rd: Register::W0,
            imm: 0xFF,
        })?;

        assert_eq!(cpu.registers[Register::W0], 0xFF);

        Ok(())
    }

    #[test]
    fn test_add() -> Result<()> {
        let mut cpu = StdMachine::default();
        cpu.registers[Register::W1] = 66;
        cpu.registers[Register::W2] = 3000;
        cpu.execute_instruction(Instruction::Add {
            rd: Register::W0,
            rs1: Register::W1,
            rs2: Register::W2,
        })?;

        assert_eq!(cpu.registers[Register::W0], 3066);

        Ok(())
    }

    #[test]
    fn test_add_wraps() -> Result<()> {
        let mut cpu = StdMachine::default();
        cpu.registers[Register::W1] = u32::MAX;
        cpu.registers[Register::W2] = 2;
        cpu.execute_instruction(Instruction::Add {
            rd: Register::W0,
            rs1: Register::W1,
            rs2: Register::W2,
        })?;

        assert_eq!(cpu.registers[Register::W0], 1);
        assert_eq!(cpu.registers[Register::SR], 0);

        Ok(())
    }

    #[test]
    fn test_sub() -> Result<()> {
        let mut cpu = StdMachine::default();
        cpu.registers[Register::W1] = 30;
        cpu.registers[Register::W2] = 10;
        let sub = |rd, rs1, rs2| Instruction::Sub { rd, rs1, rs2 };

        cpu.execute_instruction(sub(Register::W0, Register::W1, Register::W2))?;
        assert_eq!(cpu.registers[Register::W0], 20);

        cpu.execute_instruction(sub(Register::W3, Register::W2, Register::W1))?;
        assert_eq!(cpu.registers[Register::W3], 10u32.wrapping_sub(30));

        Ok(())
    }

    #[test]
    fn test_cmp() -> Result<()> {
        let values = [0, 1, 5, 0x8000_0000, u32::MAX];
        let mut cpu = StdMachine::default();

        for &a in &values {
            for &b in &values {
                cpu.registers[Register::W4] = a;
                cpu.registers[Register::W5] = b;
                cpu.execute_instruction(Instruction::Cmp {
                    rs1: Register::W4,
                    rs2: Register::W5,
                })?;

                let expected = if a == b {
                    0
                } else if a < b {
                    1
                } else {
                    2
                };
                assert_eq!(cpu.registers[Register::SR], expected, "CMP {} {}", a, b);
            }
        }

        Ok(())
    }

    #[test]
    fn test_jump() -> Result<()> {
        let mut cpu = StdMachine::default();
        cpu.execute_instruction(Instruction::Jump { addr: 0xA })?;

        assert_eq!(cpu.registers[Register::PC], 0xA);

        Ok(())
    }

    #[test]
    fn test_load_literal() -> Result<()> {
        let mut cpu = StdMachine::default();
        cpu.memory.write_byte(256, 42)?;
        cpu.execute_instruction(Instruction::Load {
            rd: Register::W1,
            addr: 256,
        })?;

        assert_eq!(cpu.registers[Register::W1], 256);

        Ok(())
    }

    #[test]
    fn test_load_memory() -> Result<()> {
        let config = MachineConfig {
            load_mode: LoadMode::Memory,
            ..MachineConfig::default()
        };
        let mut cpu = Machine::with_config(StdMem::default(), config);
        cpu.memory.write_byte(256, 42)?;
        cpu.execute_instruction(Instruction::Load {
            rd: Register::W1,
            addr: 256,
        })?;

        assert_eq!(cpu.registers[Register::W1], 42);
        assert_eq!(cpu.config().load_mode, LoadMode::Memory);

        assert_eq!(
            cpu.execute_instruction(Instruction::Load {
                rd: Register::W1,
                addr: 4096,
            }),
            Err(Fault::Memory(MemoryFault::OutOfBounds {
                address: 4096,
                len: 1,
                size: 1024
            }))
        );

        Ok(())
    }

    #[test]
    fn test_store() -> Result<()> {
        let mut cpu = StdMachine::default();
        cpu.registers[Register::W1] = 0x1241;
        cpu.execute_instruction(Instruction::Store {
            rs: Register::W1,
            addr: 100,
        })?;

        // only the low byte is stored
        assert_eq!(cpu.memory.data[100], 0x41);
        assert_eq!(cpu.memory.data[101], 0);

        assert!(cpu
            .execute_instruction(Instruction::Store {
                rs: Register::W1,
                addr: 0xFFFF,
            })
            .is_err());

        Ok(())
    }

    #[test]
    fn test_add_program() -> Result<()> {
        let mut cpu = machine("MV W1,#5\nMV W2,#3\nADD W0,W1,W2")?;

        assert_eq!(cpu.execute_until_halt()?, 3);
        assert_eq!(cpu.registers[Register::W0], 8);
        assert_eq!(cpu.registers[Register::PC], 12);
        assert_eq!(cpu.registers[Register::IR], 0);
        assert!(cpu.is_halted());

        Ok(())
    }

    #[test]
    fn test_halt_word_only() -> Result<()> {
        let mut cpu = StdMachine::default();
        let fresh = cpu.clone();

        assert_eq!(cpu.execute()?, State::Halted);
        assert_eq!(cpu.registers, fresh.registers);
        assert_eq!(cpu.memory, fresh.memory);
        assert_eq!(cpu.steps(), 0);

        Ok(())
    }

    #[test]
    fn test_halt_mnemonic() -> Result<()> {
        let mut cpu = machine("MV W1, #1\nHALT\nMV W1, #2")?;

        assert_eq!(cpu.execute_until_halt()?, 1);
        assert_eq!(cpu.registers[Register::W1], 1);
        assert_eq!(cpu.registers[Register::PC], 4);

        Ok(())
    }

    #[test]
    fn test_mv_zero_is_not_halt() -> Result<()> {
        let mut cpu = machine("MV W0, #0\nMV W1, #7")?;

        assert_eq!(cpu.execute_until_halt()?, 2);
        assert_eq!(cpu.registers[Register::W1], 7);

        Ok(())
    }

    #[test]
    fn test_jump_program() -> Result<()> {
        let mut mem = StdMem::default();
        write_instructions!(mem : 0 => Instruction::Jump { addr: 0x0010 })?;
        write_instructions!(mem : 0x10 => Instruction::Mv { rd: Register::W1, imm: 7 })?;
        let mut cpu = Machine::new(mem);

        assert_eq!(cpu.execute()?, State::Fetching);
        assert_eq!(cpu.registers[Register::PC], 16);

        cpu.execute()?;
        assert_eq!(cpu.registers[Register::IR], 0x3020_00E0);
        assert_eq!(cpu.registers[Register::W1], 7);
        assert_eq!(cpu.registers[Register::PC], 20);

        Ok(())
    }

    #[test]
    fn test_step_limit() -> Result<()> {
        let mut cpu = machine("MV W1, #1\nJUMP 0")?;

        assert_eq!(cpu.execute_with_limit(10)?, Exit::StepLimit { steps: 10 });
        assert!(!cpu.is_halted());
        assert_eq!(cpu.steps(), 10);

        let config = MachineConfig {
            step_limit: Some(3),
            ..MachineConfig::default()
        };
        let mut cpu = Machine::with_config(StdMem::from_str("MV W1, #1")?, config);
        assert_eq!(cpu.run()?, Exit::Halted { steps: 1 });

        Ok(())
    }

    #[test]
    fn test_step_limit_equal_to_program_length() -> Result<()> {
        let mut cpu = machine("MV W1, #1")?;
        assert_eq!(cpu.execute_with_limit(1)?, Exit::Halted { steps: 1 });
        assert!(cpu.is_halted());
        assert_eq!(cpu.registers[Register::PC], 4);
        assert_eq!(cpu.registers[Register::IR], 0);

        let config = MachineConfig {
            step_limit: Some(3),
            ..MachineConfig::default()
        };
        let source = include_str!("../demos/programs/add.asm");
        let mut cpu = Machine::with_config(StdMem::from_str(source)?, config);
        assert_eq!(cpu.run()?, Exit::Halted { steps: 3 });
        assert_eq!(cpu.registers[Register::W0], 8);

        // one short of the program length still stops before the last
        // instruction and leaves PC/IR untouched
        let mut cpu = machine(source)?;
        assert_eq!(cpu.execute_with_limit(2)?, Exit::StepLimit { steps: 2 });
        assert!(!cpu.is_halted());
        assert_eq!(cpu.registers[Register::PC], 8);
        assert_eq!(cpu.registers[Register::W0], 0);

        // an empty program halts even with a zero limit
        let mut cpu = StdMachine::default();
        assert_eq!(cpu.execute_with_limit(0)?, Exit::Halted { steps: 0 });

        Ok(())
    }

    #[test]
    fn test_decode_fault() -> Result<()> {
        let mut mem = StdMem::default();
        mem.write_word(0, 0xFC00_0000)?;
        let mut cpu = Machine::new(mem);

        assert_eq!(
            cpu.execute(),
            Err(Fault::Decode(DecodeFault::InvalidOpcode {
                opcode: 0x3F,
                word: 0xFC00_0000
            }))
        );
        assert_eq!(cpu.state(), State::Decoding);
        assert_eq!(cpu.registers[Register::PC], 4);

        Ok(())
    }

    #[test]
    fn test_fetch_past_memory() -> Result<()> {
        let mut cpu = Machine::new(Memory::<8>::from_str("MV W1, #1\nMV W2, #2")?);

        assert_eq!(
            cpu.execute_until_halt(),
            Err(Fault::Memory(MemoryFault::OutOfBounds {
                address: 8,
                len: 4,
                size: 8
            }))
        );
        assert_eq!(cpu.registers[Register::W2], 2);
        assert_eq!(cpu.state(), State::Fetching);

        Ok(())
    }

    #[test]
    fn test_deterministic() -> Result<()> {
        let source = include_str!("../demos/programs/store.asm");

        let mut a = machine(source)?;
        let mut b = machine(source)?;
        a.execute_until_halt()?;
        b.execute_until_halt()?;

        assert_eq!(a, b);

        Ok(())
    }

    #[test]
    fn test_sample_programs() -> Result<()> {
        let mut cpu = machine(include_str!("../demos/programs/add.asm"))?;
        cpu.execute_until_halt()?;
        assert_eq!(cpu.registers[Register::W0], 8);

        let mut cpu = machine(include_str!("../demos/programs/store.asm"))?;
        cpu.execute_until_halt()?;
        assert_eq!(cpu.memory.data[0x40], 42);
        assert_eq!(cpu.memory.data[0x41], 0xFF);

        let mut cpu = machine(include_str!("../demos/programs/compare.asm"))?;
        cpu.execute_until_halt()?;
        assert_eq!(cpu.registers[Register::SR], 1);
        assert_eq!(cpu.registers[Register::W3], 7);

        Ok(())
    }
}
