//! Compilation errors.

use crate::compiler::Fragment;
use crate::instruction::{Instruction, Opcode};
use crate::program::Statement;
use neural_core::NodeId;
use thiserror::Error;

/// What went wrong while interpreting the instruction sequence
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuralErrorKind {
    #[error("unknown opcode `{0}`")]
    UnknownOpcode(String),

    #[error("invalid operand `{operand}` for `{opcode}`")]
    InvalidOperand { opcode: Opcode, operand: String },

    #[error("`{0}` requires an operand")]
    MissingOperand(Opcode),

    #[error("`{opcode}` needs {expected} operand(s) on the stack, found {found}")]
    StackUnderflow {
        opcode: Opcode,
        expected: usize,
        found: usize,
    },

    #[error("`{0}` expected a scalar operand but found a bundle")]
    ExpectedScalar(Opcode),

    #[error("`{0}` expected a bundle operand but found a scalar")]
    ExpectedBundle(Opcode),

    #[error("`{0}` found a finished statement where an operand was expected")]
    UnexpectedStatement(Opcode),

    #[error("unable to find a bundle to pair with the other `mul` operand")]
    MissingBundle,

    #[error("bundle shapes differ: {left} vs {right}")]
    ShapeMismatch { left: usize, right: usize },

    #[error("bundle `concat-{0}` was never set")]
    UnknownBundle(NodeId),

    #[error("{0} staged value(s) were never stored")]
    DanglingValues(usize),
}

/// Compilation failure. Carries everything built up to the offending
/// instruction; no partial evaluator is ever produced.
#[derive(Error, Debug, Clone)]
#[error(
    "Unable to build model at instruction {position}{}: {kind} [{} statement(s), {} stack fragment(s)]",
    describe(.instruction),
    .statements.len(),
    .stack.len()
)]
pub struct StructuralError {
    #[source]
    pub kind: StructuralErrorKind,
    /// Index of the offending instruction. Equals the sequence length when the
    /// failure happens while assembling the final body.
    pub position: usize,
    pub instruction: Option<Instruction>,
    /// Statements finalized before the failure
    pub statements: Vec<Statement>,
    /// Compile-time stack at the moment of failure
    pub stack: Vec<Fragment>,
}

impl StructuralError {
    pub fn new(kind: StructuralErrorKind, position: usize) -> Self {
        Self {
            kind,
            position,
            instruction: None,
            statements: Vec::new(),
            stack: Vec::new(),
        }
    }
}

fn describe(instruction: &Option<Instruction>) -> String {
    match instruction {
        Some(instruction) => format!(" (`{}`)", instruction),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Instruction;

    #[test]
    fn test_error_message() {
        let mut err = StructuralError::new(StructuralErrorKind::MissingBundle, 4);
        err.instruction = Some(Instruction::mul());
        let message = err.to_string();
        assert!(message.contains("instruction 4"));
        assert!(message.contains("`mul`"));
        assert!(message.contains("pair"));
    }

    #[test]
    fn test_kind_messages() {
        let kind = StructuralErrorKind::StackUnderflow {
            opcode: Opcode::Mul,
            expected: 2,
            found: 1,
        };
        assert_eq!(
            kind.to_string(),
            "`mul` needs 2 operand(s) on the stack, found 1"
        );
        assert_eq!(
            StructuralErrorKind::UnknownBundle(NodeId(9)).to_string(),
            "bundle `concat-9` was never set"
        );
    }
}
