//! The nine-opcode instruction set.

use core_types::Word;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Right-hand operand of an arithmetic instruction: a variable or a literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Var(String),
    Imm(Word),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Var(name) => write!(f, "{}", name),
            Operand::Imm(value) => write!(f, "{}", value),
        }
    }
}

/// One segment of a PRINT concatenation expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrintPart {
    Literal(String),
    Var(String),
}

/// A decoded instruction.
///
/// All arithmetic is on unsigned 16-bit words: ADD wraps modulo 2^16,
/// SUBTRACT saturates at zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Evaluate a concatenation of literals and variables, emit a
    /// timestamped log line.
    Print(Vec<PrintPart>),
    /// Allocate a symbol-table slot for `var` and store `value` there.
    Declare { var: String, value: Word },
    /// `dst := lhs + rhs` (wrapping).
    Add {
        dst: String,
        lhs: String,
        rhs: Operand,
    },
    /// `dst := max(lhs - rhs, 0)`.
    Subtract {
        dst: String,
        lhs: String,
        rhs: Operand,
    },
    /// Relinquish the core for `ticks` ticks.
    Sleep { ticks: u32 },
    /// Begin a counted loop; the body repeats `count` times.
    ForStart { count: u32 },
    /// End of the innermost counted loop.
    ForEnd,
    /// Load the word at `address` into `var`.
    Read { var: String, address: u32 },
    /// Store `value` at `address`.
    Write { address: u32, value: Operand },
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Print(parts) => {
                write!(f, "PRINT(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " + ")?;
                    }
                    match part {
                        PrintPart::Literal(text) => write!(f, "\"{}\"", text)?,
                        PrintPart::Var(name) => write!(f, "{}", name)?,
                    }
                }
                write!(f, ")")
            }
            Instruction::Declare { var, value } => write!(f, "DECLARE {} {}", var, value),
            Instruction::Add { dst, lhs, rhs } => write!(f, "ADD {} {} {}", dst, lhs, rhs),
            Instruction::Subtract { dst, lhs, rhs } => {
                write!(f, "SUBTRACT {} {} {}", dst, lhs, rhs)
            }
            Instruction::Sleep { ticks } => write!(f, "SLEEP {}", ticks),
            Instruction::ForStart { count } => write!(f, "FOR_START {}", count),
            Instruction::ForEnd => write!(f, "FOR_END"),
            Instruction::Read { var, address } => write!(f, "READ {} 0x{:X}", var, address),
            Instruction::Write { address, value } => write!(f, "WRITE 0x{:X} {}", address, value),
        }
    }
}
