//! # Process Image
//!
//! The per-process state machine and its tiny imperative instruction set.
//!
//! ## Philosophy
//!
//! - **Parse once**: scripts are decoded into [`Instruction`] values at
//!   process creation; the interpreter never touches strings.
//! - **One instruction per step**: [`Interpreter::step`] executes exactly one
//!   instruction and advances the program counter; the scheduler owns all
//!   pacing.
//! - **Memory behind a trait**: the interpreter reads and writes words
//!   through [`DataMemory`]; demand paging happens on the other side of that
//!   seam and never surfaces here.
//! - **Deterministic synthesis**: generated workloads come from an explicitly
//!   seeded generator; same seed, same programs.

pub mod generator;
pub mod image;
pub mod instruction;
pub mod interpreter;
pub mod parser;

pub use generator::{
    is_valid_memory_size, round_up_memory_size, ProgramGenerator, ProgramLimits,
    MAX_PROCESS_MEMORY, MIN_PROCESS_MEMORY,
};
pub use image::{ProcessImage, SymbolTable, SYMBOL_CAPACITY, SYMBOL_TABLE_START};
pub use instruction::{Instruction, Operand, PrintPart};
pub use interpreter::{AccessViolation, DataMemory, Interpreter, StepOutcome};
pub use parser::{parse_script, ParseError, MAX_SCRIPT_INSTRUCTIONS};
