//! Deterministic synthesis of test workloads.
//!
//! No randomness unless explicitly seeded: the generator owns a SplitMix64
//! state seeded at construction, so a given seed always yields the same
//! sequence of programs.

use crate::instruction::{Instruction, Operand, PrintPart};
use core_types::Word;
use serde::{Deserialize, Serialize};

/// Smallest accepted process address space, bytes.
pub const MIN_PROCESS_MEMORY: usize = 64;

/// Largest accepted process address space, bytes.
pub const MAX_PROCESS_MEMORY: usize = 65536;

/// True when `bytes` is a power of two in the accepted range.
pub fn is_valid_memory_size(bytes: usize) -> bool {
    bytes.is_power_of_two() && (MIN_PROCESS_MEMORY..=MAX_PROCESS_MEMORY).contains(&bytes)
}

/// Rounds up to the next power of two, clamped to the accepted range.
pub fn round_up_memory_size(bytes: usize) -> usize {
    bytes
        .next_power_of_two()
        .clamp(MIN_PROCESS_MEMORY, MAX_PROCESS_MEMORY)
}

/// Bounds for synthesized workloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramLimits {
    /// Inclusive instruction-count range.
    pub min_ins: usize,
    pub max_ins: usize,
    /// Inclusive memory-size range, rounded up to a power of two.
    pub min_mem: usize,
    pub max_mem: usize,
}

/// SplitMix64: tiny, fast, and good enough for workload synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform-ish value in `[lo, hi]`.
    fn range(&mut self, lo: u64, hi: u64) -> u64 {
        if hi <= lo {
            return lo;
        }
        lo + self.next() % (hi - lo + 1)
    }
}

/// Seeded source of synthetic programs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramGenerator {
    rng: SplitMix64,
}

impl ProgramGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SplitMix64::new(seed),
        }
    }

    /// Produces a program for `name` plus the address-space size to give it.
    pub fn synthesize(&mut self, name: &str, limits: &ProgramLimits) -> (Vec<Instruction>, usize) {
        let target = self.rng.range(limits.min_ins as u64, limits.max_ins as u64) as usize;
        let memory_size = round_up_memory_size(
            self.rng.range(limits.min_mem as u64, limits.max_mem as u64) as usize,
        );

        let mut program = Vec::with_capacity(target);
        while program.len() < target {
            let remaining = target - program.len();
            match self.rng.range(0, 9) {
                // A FOR block needs room for FOR_START, a body and FOR_END.
                0 if remaining >= 4 => {
                    program.push(Instruction::ForStart {
                        count: self.rng.range(2, 4) as u32,
                    });
                    let body = self.rng.range(1, 2.min(remaining as u64 - 2));
                    for _ in 0..body {
                        program.push(self.simple_instruction(name, memory_size));
                    }
                    program.push(Instruction::ForEnd);
                }
                _ => program.push(self.simple_instruction(name, memory_size)),
            }
        }
        (program, memory_size)
    }

    fn simple_instruction(&mut self, name: &str, memory_size: usize) -> Instruction {
        let var = |n: u64| format!("v{}", n);
        match self.rng.range(0, 6) {
            0 => Instruction::Print(vec![PrintPart::Literal(format!(
                "Hello world from {}!",
                name
            ))]),
            1 => Instruction::Declare {
                var: var(self.rng.range(0, 7)),
                value: Word(self.rng.range(0, 100) as u16),
            },
            2 => Instruction::Add {
                dst: var(self.rng.range(0, 7)),
                lhs: var(self.rng.range(0, 7)),
                rhs: Operand::Imm(Word(self.rng.range(1, 10) as u16)),
            },
            3 => Instruction::Subtract {
                dst: var(self.rng.range(0, 7)),
                lhs: var(self.rng.range(0, 7)),
                rhs: Operand::Imm(Word(self.rng.range(1, 10) as u16)),
            },
            4 => Instruction::Sleep {
                ticks: self.rng.range(1, 3) as u32,
            },
            5 if memory_size > MIN_PROCESS_MEMORY => Instruction::Write {
                address: self.data_address(memory_size),
                value: Operand::Imm(Word(self.rng.range(0, 500) as u16)),
            },
            6 if memory_size > MIN_PROCESS_MEMORY => Instruction::Read {
                var: var(self.rng.range(0, 7)),
                address: self.data_address(memory_size),
            },
            _ => Instruction::Print(vec![PrintPart::Literal(format!(
                "Hello world from {}!",
                name
            ))]),
        }
    }

    /// A word-aligned address above the symbol-table region.
    fn data_address(&mut self, memory_size: usize) -> u32 {
        let words = (memory_size as u64 - MIN_PROCESS_MEMORY as u64) / 2;
        (MIN_PROCESS_MEMORY as u64 + 2 * self.rng.range(0, words - 1)) as u32
    }
}
