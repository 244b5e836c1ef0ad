//! One-instruction-at-a-time execution.

use crate::image::ProcessImage;
use crate::instruction::{Instruction, Operand, PrintPart};
use core_types::{Pid, ProcessStatus, Word};
use thiserror::Error;

/// An address outside the process's address space (or one the memory
/// subsystem refuses to service). Terminates the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("memory access violation at 0x{address:X}")]
pub struct AccessViolation {
    pub address: u32,
}

/// The interpreter's view of process memory.
///
/// Implementations perform demand paging internally: a page fault is resolved
/// before the call returns and never surfaces here. Only genuine access
/// violations (address beyond the process's address space) come back as
/// errors.
pub trait DataMemory {
    fn read(&mut self, pid: Pid, address: u32) -> Result<Word, AccessViolation>;
    fn write(&mut self, pid: Pid, address: u32, value: Word) -> Result<(), AccessViolation>;
}

/// What a single step did to the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Instruction executed; the process remains runnable.
    Continue,
    /// The process executed SLEEP and relinquished its core.
    Slept,
    /// The program counter reached the end of the program.
    Finished,
    /// An access violation terminated the process.
    Faulted,
}

/// Executes one instruction per call.
///
/// The scheduler owns all pacing; the interpreter's only timing concern is
/// the optional per-instruction busy-wait.
#[derive(Debug, Clone, Copy, Default)]
pub struct Interpreter {
    /// Wall-clock milliseconds to spin after each step (0 = none).
    delay_per_exec_ms: u64,
}

impl Interpreter {
    pub fn new(delay_per_exec_ms: u64) -> Self {
        Self { delay_per_exec_ms }
    }

    /// Executes `instructions[pc]`, advances the program counter, and applies
    /// any status transition to the image.
    pub fn step(&self, image: &mut ProcessImage, mem: &mut dyn DataMemory) -> StepOutcome {
        if image.status().is_terminal() {
            return match image.status() {
                ProcessStatus::Faulted => StepOutcome::Faulted,
                _ => StepOutcome::Finished,
            };
        }
        if image.pc >= image.instruction_count() {
            image.set_status(ProcessStatus::Finished);
            return StepOutcome::Finished;
        }

        let instruction = image.instructions()[image.pc].clone();
        let mut outcome = StepOutcome::Continue;

        let result = match instruction {
            Instruction::Print(parts) => self.exec_print(image, mem, &parts),
            Instruction::Declare { var, value } => self.exec_declare(image, mem, &var, value),
            Instruction::Add { dst, lhs, rhs } => {
                self.exec_arith(image, mem, &dst, &lhs, &rhs, Word::add)
            }
            Instruction::Subtract { dst, lhs, rhs } => {
                self.exec_arith(image, mem, &dst, &lhs, &rhs, Word::sub)
            }
            Instruction::Sleep { ticks } => {
                image.sleep_remaining = ticks;
                image.set_status(ProcessStatus::Sleeping);
                outcome = StepOutcome::Slept;
                Ok(Advance::Next)
            }
            Instruction::ForStart { count } => {
                image.for_stack.push(crate::image::ForFrame {
                    return_pc: image.pc,
                    remaining: count,
                });
                Ok(Advance::Next)
            }
            Instruction::ForEnd => {
                let jump = match image.for_stack.last_mut() {
                    Some(frame) => {
                        frame.remaining = frame.remaining.saturating_sub(1);
                        if frame.remaining > 0 {
                            Some(frame.return_pc + 1)
                        } else {
                            image.for_stack.pop();
                            None
                        }
                    }
                    None => None,
                };
                Ok(match jump {
                    Some(target) => Advance::Jump(target),
                    None => Advance::Next,
                })
            }
            Instruction::Read { var, address } => match mem.read(image.id(), address) {
                Ok(value) => self.assign(image, mem, &var, value).map(|_| Advance::Next),
                Err(violation) => Err(violation),
            },
            Instruction::Write { address, value } => self
                .operand_value(image, mem, &value)
                .and_then(|v| mem.write(image.id(), address, v))
                .map(|_| Advance::Next),
        };

        match result {
            Ok(Advance::Next) => image.pc += 1,
            Ok(Advance::Jump(target)) => image.pc = target,
            Err(violation) => {
                image.record_fault(violation.address);
                return StepOutcome::Faulted;
            }
        }
        image.steps_executed += 1;

        if outcome == StepOutcome::Continue && image.pc >= image.instruction_count() {
            image.set_status(ProcessStatus::Finished);
            outcome = StepOutcome::Finished;
        }

        if self.delay_per_exec_ms > 0 {
            busy_wait_ms(self.delay_per_exec_ms);
        }

        outcome
    }

    fn exec_print(
        &self,
        image: &mut ProcessImage,
        mem: &mut dyn DataMemory,
        parts: &[PrintPart],
    ) -> Result<Advance, AccessViolation> {
        let mut text = String::new();
        for part in parts {
            match part {
                PrintPart::Literal(literal) => text.push_str(literal),
                PrintPart::Var(name) => {
                    let value = self.var_value(image, mem, name)?;
                    text.push_str(&value.to_string());
                }
            }
        }
        image.log(format!("\"{}\"", text));
        Ok(Advance::Next)
    }

    fn exec_declare(
        &self,
        image: &mut ProcessImage,
        mem: &mut dyn DataMemory,
        var: &str,
        value: Word,
    ) -> Result<Advance, AccessViolation> {
        match image.symbols.declare(var) {
            Some(addr) => mem.write(image.id(), addr, value)?,
            None => image.log(format!("Warning: symbol table full; DECLARE {} ignored", var)),
        }
        Ok(Advance::Next)
    }

    fn exec_arith(
        &self,
        image: &mut ProcessImage,
        mem: &mut dyn DataMemory,
        dst: &str,
        lhs: &str,
        rhs: &Operand,
        op: fn(Word, Word) -> Word,
    ) -> Result<Advance, AccessViolation> {
        let left = self.var_value(image, mem, lhs)?;
        let right = self.operand_value(image, mem, rhs)?;
        self.assign(image, mem, dst, op(left, right))?;
        Ok(Advance::Next)
    }

    /// Current value of a variable, auto-declaring it at 0 when new.
    ///
    /// When the symbol table is full an undeclared variable reads as 0 with a
    /// warning on the process log.
    fn var_value(
        &self,
        image: &mut ProcessImage,
        mem: &mut dyn DataMemory,
        name: &str,
    ) -> Result<Word, AccessViolation> {
        if let Some(addr) = image.symbols.lookup(name) {
            return mem.read(image.id(), addr);
        }
        match image.symbols.declare(name) {
            Some(addr) => {
                mem.write(image.id(), addr, Word::zero())?;
                Ok(Word::zero())
            }
            None => {
                image.log(format!(
                    "Warning: symbol table full; {} reads as 0",
                    name
                ));
                Ok(Word::zero())
            }
        }
    }

    fn operand_value(
        &self,
        image: &mut ProcessImage,
        mem: &mut dyn DataMemory,
        operand: &Operand,
    ) -> Result<Word, AccessViolation> {
        match operand {
            Operand::Imm(value) => Ok(*value),
            Operand::Var(name) => self.var_value(image, mem, name),
        }
    }

    fn assign(
        &self,
        image: &mut ProcessImage,
        mem: &mut dyn DataMemory,
        name: &str,
        value: Word,
    ) -> Result<(), AccessViolation> {
        match image.symbols.declare(name) {
            Some(addr) => mem.write(image.id(), addr, value),
            None => {
                image.log(format!(
                    "Warning: symbol table full; assignment to {} ignored",
                    name
                ));
                Ok(())
            }
        }
    }
}

/// Spins until `ms` wall-clock milliseconds elapse.
fn busy_wait_ms(ms: u64) {
    let deadline = std::time::Instant::now() + std::time::Duration::from_millis(ms);
    while std::time::Instant::now() < deadline {
        std::hint::spin_loop();
    }
}

enum Advance {
    Next,
    Jump(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_script;
    use core_types::Pid;
    use std::collections::HashMap;

    /// Flat test memory: no paging, bounds-checked against a fixed size.
    struct FlatMemory {
        size: u32,
        words: HashMap<(Pid, u32), Word>,
    }

    impl FlatMemory {
        fn new(size: u32) -> Self {
            Self {
                size,
                words: HashMap::new(),
            }
        }
    }

    impl DataMemory for FlatMemory {
        fn read(&mut self, pid: Pid, address: u32) -> Result<Word, AccessViolation> {
            if address >= self.size {
                return Err(AccessViolation { address });
            }
            Ok(self.words.get(&(pid, address)).copied().unwrap_or_default())
        }

        fn write(&mut self, pid: Pid, address: u32, value: Word) -> Result<(), AccessViolation> {
            if address >= self.size {
                return Err(AccessViolation { address });
            }
            self.words.insert((pid, address), value);
            Ok(())
        }
    }

    fn run_to_completion(image: &mut ProcessImage, mem: &mut FlatMemory) -> StepOutcome {
        let interp = Interpreter::default();
        for _ in 0..10_000 {
            match interp.step(image, mem) {
                StepOutcome::Continue => {}
                outcome => return outcome,
            }
        }
        panic!("program did not terminate");
    }

    fn image_from(script: &str, memory_size: usize) -> ProcessImage {
        ProcessImage::new(
            Pid::new(1),
            "p01".to_string(),
            memory_size,
            parse_script(script).unwrap(),
        )
    }

    #[test]
    fn test_arithmetic_and_print() {
        let mut image = image_from("DECLARE x 5; ADD x x 3; PRINT(\"v=\" + x)", 4096);
        let mut mem = FlatMemory::new(4096);
        assert_eq!(run_to_completion(&mut image, &mut mem), StepOutcome::Finished);
        assert_eq!(image.status(), ProcessStatus::Finished);
        assert_eq!(image.pc(), image.instruction_count());
        assert!(image.logs().last().unwrap().contains("\"v=8\""));
    }

    #[test]
    fn test_subtract_saturates() {
        let mut image = image_from(
            "DECLARE b 3; DECLARE c 5; SUBTRACT a b c; PRINT(\"a=\" + a)",
            4096,
        );
        let mut mem = FlatMemory::new(4096);
        run_to_completion(&mut image, &mut mem);
        assert!(image.logs().last().unwrap().contains("\"a=0\""));
    }

    #[test]
    fn test_add_wraps() {
        let mut image = image_from("DECLARE x 65535; ADD x x 1; PRINT(\"x=\" + x)", 4096);
        let mut mem = FlatMemory::new(4096);
        run_to_completion(&mut image, &mut mem);
        assert!(image.logs().last().unwrap().contains("\"x=0\""));
    }

    #[test]
    fn test_for_loop_repeats_body() {
        let mut image = image_from("FOR_START 3; ADD x x 2; FOR_END; PRINT(\"x=\" + x)", 4096);
        let mut mem = FlatMemory::new(4096);
        run_to_completion(&mut image, &mut mem);
        assert!(image.logs().last().unwrap().contains("\"x=6\""));
        assert_eq!(image.for_depth(), 0);
    }

    #[test]
    fn test_nested_for_loops() {
        let mut image = image_from(
            "FOR_START 2; FOR_START 3; ADD x x 1; FOR_END; FOR_END; PRINT(\"x=\" + x)",
            4096,
        );
        let mut mem = FlatMemory::new(4096);
        run_to_completion(&mut image, &mut mem);
        assert!(image.logs().last().unwrap().contains("\"x=6\""));
    }

    #[test]
    fn test_for_zero_runs_body_once() {
        let mut image = image_from("FOR_START 0; ADD x x 1; FOR_END; PRINT(\"x=\" + x)", 4096);
        let mut mem = FlatMemory::new(4096);
        run_to_completion(&mut image, &mut mem);
        assert!(image.logs().last().unwrap().contains("\"x=1\""));
    }

    #[test]
    fn test_sleep_sets_status_and_counter() {
        let mut image = image_from("SLEEP 4; PRINT(\"awake\")", 4096);
        let mut mem = FlatMemory::new(4096);
        let interp = Interpreter::default();
        assert_eq!(interp.step(&mut image, &mut mem), StepOutcome::Slept);
        assert_eq!(image.status(), ProcessStatus::Sleeping);
        assert_eq!(image.sleep_remaining(), 4);
        assert_eq!(image.pc(), 1);
    }

    #[test]
    fn test_write_out_of_range_faults() {
        let mut image = image_from("WRITE 0x200000 1", 4096);
        let mut mem = FlatMemory::new(4096);
        let interp = Interpreter::default();
        assert_eq!(interp.step(&mut image, &mut mem), StepOutcome::Faulted);
        assert_eq!(image.status(), ProcessStatus::Faulted);
        let fault = image.fault().unwrap();
        assert_eq!(fault.address, 0x200000);
    }

    #[test]
    fn test_round_trip_write_read() {
        let mut image = image_from("WRITE 0x200 42; READ y 0x200; PRINT(\"y=\" + y)", 4096);
        let mut mem = FlatMemory::new(4096);
        run_to_completion(&mut image, &mut mem);
        assert!(image.logs().last().unwrap().contains("\"y=42\""));
    }

    #[test]
    fn test_read_of_unwritten_address_is_zero() {
        let mut image = image_from("READ y 0x300; PRINT(\"y=\" + y)", 4096);
        let mut mem = FlatMemory::new(4096);
        run_to_completion(&mut image, &mut mem);
        assert!(image.logs().last().unwrap().contains("\"y=0\""));
    }

    #[test]
    fn test_symbol_cap_declare_is_noop_with_warning() {
        let declares: Vec<String> = (0..33).map(|i| format!("DECLARE v{} {}", i, i)).collect();
        let script = format!("{}; PRINT(\"v0=\" + v0 + \" v31=\" + v31)", declares.join("; "));
        let mut image = image_from(&script, 4096);
        let mut mem = FlatMemory::new(4096);
        run_to_completion(&mut image, &mut mem);

        assert_eq!(image.symbol_table().len(), 32);
        assert!(image
            .logs()
            .iter()
            .any(|line| line.contains("symbol table full")));
        // The first 32 values stay reachable.
        assert!(image.logs().last().unwrap().contains("v0=0"));
        assert!(image.logs().last().unwrap().contains("v31=31"));
    }

    #[test]
    fn test_step_past_end_finishes() {
        let mut image = image_from("SLEEP 1", 4096);
        let mut mem = FlatMemory::new(4096);
        let interp = Interpreter::default();
        assert_eq!(interp.step(&mut image, &mut mem), StepOutcome::Slept);
        image.set_status(ProcessStatus::Waiting);
        image.tick_sleep();
        // Dispatched again with pc at the end of the program.
        assert_eq!(interp.step(&mut image, &mut mem), StepOutcome::Finished);
        assert_eq!(image.status(), ProcessStatus::Finished);
    }
}
