//! One-shot script parser.
//!
//! Submitted programs are semicolon-separated statements in the opcode
//! syntax, e.g. `DECLARE x 5; ADD x x 3; PRINT("v=" + x)`. Parsing happens
//! once at process creation; a script that fails here is rejected as an
//! invalid command and no process is created.

use crate::instruction::{Instruction, Operand, PrintPart};
use core_types::Word;
use thiserror::Error;

/// Upper bound on instructions in a submitted script.
pub const MAX_SCRIPT_INSTRUCTIONS: usize = 50;

/// Script rejection reasons.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty program")]
    EmptyProgram,
    #[error("program exceeds {MAX_SCRIPT_INSTRUCTIONS} instructions ({0})")]
    TooManyInstructions(usize),
    #[error("unknown opcode: {0}")]
    UnknownOpcode(String),
    #[error("malformed statement: {0}")]
    MalformedStatement(String),
    #[error("bad immediate value: {0}")]
    BadImmediate(String),
    #[error("bad hex address: {0}")]
    BadAddress(String),
    #[error("unterminated string literal")]
    UnterminatedString,
}

/// Parses a full script into instructions, enforcing the length bound.
pub fn parse_script(script: &str) -> Result<Vec<Instruction>, ParseError> {
    let mut instructions = Vec::new();
    for statement in split_statements(script) {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        instructions.push(parse_statement(statement)?);
    }
    if instructions.is_empty() {
        return Err(ParseError::EmptyProgram);
    }
    if instructions.len() > MAX_SCRIPT_INSTRUCTIONS {
        return Err(ParseError::TooManyInstructions(instructions.len()));
    }
    Ok(instructions)
}

/// Splits on semicolons, but not inside string literals.
fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    for ch in script.chars() {
        match ch {
            '"' => {
                in_string = !in_string;
                current.push(ch);
            }
            ';' if !in_string => {
                statements.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    statements.push(current);
    statements
}

fn parse_statement(statement: &str) -> Result<Instruction, ParseError> {
    if let Some(rest) = statement.strip_prefix("PRINT") {
        return parse_print(rest.trim());
    }

    let mut tokens = statement.split_whitespace();
    let opcode = tokens
        .next()
        .ok_or_else(|| ParseError::MalformedStatement(statement.to_string()))?;
    let rest: Vec<&str> = tokens.collect();

    match opcode {
        "DECLARE" => {
            let [var, value] = two(statement, &rest)?;
            Ok(Instruction::Declare {
                var: identifier(var)?,
                value: immediate(value)?,
            })
        }
        "ADD" => {
            let [dst, lhs, rhs] = three(statement, &rest)?;
            Ok(Instruction::Add {
                dst: identifier(dst)?,
                lhs: identifier(lhs)?,
                rhs: operand(rhs)?,
            })
        }
        "SUBTRACT" => {
            let [dst, lhs, rhs] = three(statement, &rest)?;
            Ok(Instruction::Subtract {
                dst: identifier(dst)?,
                lhs: identifier(lhs)?,
                rhs: operand(rhs)?,
            })
        }
        "SLEEP" => {
            let [ticks] = one(statement, &rest)?;
            let ticks = ticks
                .parse::<u32>()
                .map_err(|_| ParseError::BadImmediate(ticks.to_string()))?;
            Ok(Instruction::Sleep { ticks })
        }
        "FOR_START" => {
            let [count] = one(statement, &rest)?;
            let count = count
                .parse::<u32>()
                .map_err(|_| ParseError::BadImmediate(count.to_string()))?;
            Ok(Instruction::ForStart { count })
        }
        "FOR_END" => {
            if !rest.is_empty() {
                return Err(ParseError::MalformedStatement(statement.to_string()));
            }
            Ok(Instruction::ForEnd)
        }
        "READ" => {
            let [var, address] = two(statement, &rest)?;
            Ok(Instruction::Read {
                var: identifier(var)?,
                address: hex_address(address)?,
            })
        }
        "WRITE" => {
            let [address, value] = two(statement, &rest)?;
            Ok(Instruction::Write {
                address: hex_address(address)?,
                value: operand(value)?,
            })
        }
        other => Err(ParseError::UnknownOpcode(other.to_string())),
    }
}

/// Parses the parenthesized PRINT argument: literals and variables joined
/// with `+`.
fn parse_print(args: &str) -> Result<Instruction, ParseError> {
    let inner = args
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| ParseError::MalformedStatement(format!("PRINT{}", args)))?;

    let mut parts = Vec::new();
    for piece in split_concat(inner)? {
        let piece = piece.trim();
        if piece.is_empty() {
            return Err(ParseError::MalformedStatement(format!("PRINT{}", args)));
        }
        if let Some(stripped) = piece.strip_prefix('"') {
            let literal = stripped
                .strip_suffix('"')
                .ok_or(ParseError::UnterminatedString)?;
            parts.push(PrintPart::Literal(literal.to_string()));
        } else {
            parts.push(PrintPart::Var(identifier(piece)?));
        }
    }
    Ok(Instruction::Print(parts))
}

/// Splits a concatenation expression on `+`, but not inside string literals.
fn split_concat(expr: &str) -> Result<Vec<String>, ParseError> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    for ch in expr.chars() {
        match ch {
            '"' => {
                in_string = !in_string;
                current.push(ch);
            }
            '+' if !in_string => pieces.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    if in_string {
        return Err(ParseError::UnterminatedString);
    }
    pieces.push(current);
    Ok(pieces)
}

fn one<'a>(statement: &str, rest: &[&'a str]) -> Result<[&'a str; 1], ParseError> {
    match rest {
        &[a] => Ok([a]),
        _ => Err(ParseError::MalformedStatement(statement.to_string())),
    }
}

fn two<'a>(statement: &str, rest: &[&'a str]) -> Result<[&'a str; 2], ParseError> {
    match rest {
        &[a, b] => Ok([a, b]),
        _ => Err(ParseError::MalformedStatement(statement.to_string())),
    }
}

fn three<'a>(statement: &str, rest: &[&'a str]) -> Result<[&'a str; 3], ParseError> {
    match rest {
        &[a, b, c] => Ok([a, b, c]),
        _ => Err(ParseError::MalformedStatement(statement.to_string())),
    }
}

fn identifier(token: &str) -> Result<String, ParseError> {
    let valid = !token.is_empty()
        && token
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false)
        && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(token.to_string())
    } else {
        Err(ParseError::MalformedStatement(token.to_string()))
    }
}

fn immediate(token: &str) -> Result<Word, ParseError> {
    token
        .parse::<u16>()
        .map(Word)
        .map_err(|_| ParseError::BadImmediate(token.to_string()))
}

fn operand(token: &str) -> Result<Operand, ParseError> {
    if token
        .chars()
        .next()
        .map(|c| c.is_ascii_digit())
        .unwrap_or(false)
    {
        immediate(token).map(Operand::Imm)
    } else {
        identifier(token).map(Operand::Var)
    }
}

fn hex_address(token: &str) -> Result<u32, ParseError> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .ok_or_else(|| ParseError::BadAddress(token.to_string()))?;
    u32::from_str_radix(digits, 16).map_err(|_| ParseError::BadAddress(token.to_string()))
}
