//! Stack-machine instruction set emitted from an ordered vertex list.

use crate::error::{StructuralError, StructuralErrorKind};
use neural_core::{Activation, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opcode of the stack machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Opcode {
    /// Finalize staged statements
    Drop,
    /// Declare an id as input-sourced
    Var,
    /// Push a previously produced value (input, bundle or durable value)
    Pick,
    /// Push a literal
    Arg,
    /// Multiply the top two operands, element-wise for bundles
    Mul,
    /// Group all staged operands into one bundle
    Concat,
    /// Fold all staged operands additively
    Sum,

    // Activations
    Sigmoid,
    Tanh,
    Linear,
    Relu,

    /// Store the top operand under a slot
    Set,
}

impl Opcode {
    pub fn name(&self) -> &'static str {
        match self {
            Opcode::Drop => "drop",
            Opcode::Var => "var",
            Opcode::Pick => "pick",
            Opcode::Arg => "arg",
            Opcode::Mul => "mul",
            Opcode::Concat => "concat",
            Opcode::Sum => "sum",
            Opcode::Sigmoid => "sigmoid",
            Opcode::Tanh => "tanh",
            Opcode::Linear => "linear",
            Opcode::Relu => "relu",
            Opcode::Set => "set",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let opcode = match name {
            "drop" => Opcode::Drop,
            "var" => Opcode::Var,
            "pick" => Opcode::Pick,
            "arg" => Opcode::Arg,
            "mul" => Opcode::Mul,
            "concat" => Opcode::Concat,
            "sum" => Opcode::Sum,
            "set" => Opcode::Set,
            other => Opcode::from_activation(Activation::from_name(other)?),
        };
        Some(opcode)
    }

    pub fn from_activation(activation: Activation) -> Self {
        match activation {
            Activation::Sigmoid => Opcode::Sigmoid,
            Activation::Tanh => Opcode::Tanh,
            Activation::Linear => Opcode::Linear,
            Activation::Relu => Opcode::Relu,
        }
    }

    /// The activation applied by this opcode, if it is one
    pub fn activation(&self) -> Option<Activation> {
        match self {
            Opcode::Sigmoid => Some(Activation::Sigmoid),
            Opcode::Tanh => Some(Activation::Tanh),
            Opcode::Linear => Some(Activation::Linear),
            Opcode::Relu => Some(Activation::Relu),
            _ => None,
        }
    }

    /// Returns the kind of immediate operand this opcode carries
    pub fn operand_kind(&self) -> OperandKind {
        match self {
            Opcode::Var => OperandKind::Node,
            Opcode::Pick | Opcode::Set => OperandKind::Slot,
            Opcode::Arg => OperandKind::Literal,
            _ => OperandKind::None,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    None,
    Node,
    Slot,
    Literal,
}

/// Storage slot addressed by `pick` and `set`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    /// Durable per-vertex value, written to the output map
    Node(NodeId),
    /// Transient bundle staging the sources of a multi-link sum
    Bundle(NodeId),
}

const BUNDLE_PREFIX: &str = "concat-";

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Node(id) => write!(f, "{}", id),
            Slot::Bundle(id) => write!(f, "{}{}", BUNDLE_PREFIX, id),
        }
    }
}

impl FromStr for Slot {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix(BUNDLE_PREFIX) {
            Some(id) => Ok(Slot::Bundle(NodeId(id.parse()?))),
            None => Ok(Slot::Node(NodeId(s.parse()?))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    None,
    Node(NodeId),
    Slot(Slot),
    Literal(f64),
}

/// A single instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operand: Operand,
}

impl Instruction {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            operand: Operand::None,
        }
    }

    pub fn with_operand(mut self, operand: Operand) -> Self {
        self.operand = operand;
        self
    }

    pub fn drop() -> Self {
        Self::new(Opcode::Drop)
    }

    pub fn var(id: NodeId) -> Self {
        Self::new(Opcode::Var).with_operand(Operand::Node(id))
    }

    pub fn pick(slot: Slot) -> Self {
        Self::new(Opcode::Pick).with_operand(Operand::Slot(slot))
    }

    pub fn arg(value: f64) -> Self {
        Self::new(Opcode::Arg).with_operand(Operand::Literal(value))
    }

    pub fn mul() -> Self {
        Self::new(Opcode::Mul)
    }

    pub fn concat() -> Self {
        Self::new(Opcode::Concat)
    }

    pub fn sum() -> Self {
        Self::new(Opcode::Sum)
    }

    pub fn activation(activation: Activation) -> Self {
        Self::new(Opcode::from_activation(activation))
    }

    pub fn set(slot: Slot) -> Self {
        Self::new(Opcode::Set).with_operand(Operand::Slot(slot))
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Operand::None => write!(f, "{}", self.opcode),
            Operand::Node(id) => write!(f, "{} {}", self.opcode, id),
            Operand::Slot(slot) => write!(f, "{} {}", self.opcode, slot),
            Operand::Literal(value) => write!(f, "{} {}", self.opcode, value),
        }
    }
}

impl FromStr for Instruction {
    type Err = StructuralErrorKind;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let opcode =
            Opcode::from_name(name).ok_or_else(|| StructuralErrorKind::UnknownOpcode(name.to_string()))?;
        let raw = parts.next();

        let invalid = |operand: &str| StructuralErrorKind::InvalidOperand {
            opcode,
            operand: operand.to_string(),
        };

        if let Some(extra) = parts.next() {
            return Err(invalid(extra));
        }

        let operand = match (opcode.operand_kind(), raw) {
            (OperandKind::None, None) => Operand::None,
            (OperandKind::None, Some(raw)) => return Err(invalid(raw)),
            (_, None) => return Err(StructuralErrorKind::MissingOperand(opcode)),
            (OperandKind::Node, Some(raw)) => {
                Operand::Node(NodeId(raw.parse().map_err(|_| invalid(raw))?))
            }
            (OperandKind::Slot, Some(raw)) => Operand::Slot(raw.parse().map_err(|_| invalid(raw))?),
            (OperandKind::Literal, Some(raw)) => {
                Operand::Literal(raw.parse().map_err(|_| invalid(raw))?)
            }
        };

        Ok(Self { opcode, operand })
    }
}

/// Parse the textual form, one instruction per line. Blank lines are skipped
/// but still count towards the reported position.
pub fn parse_instructions(text: &str) -> Result<Vec<Instruction>, StructuralError> {
    let mut instructions = Vec::new();
    for (position, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let instruction = line
            .parse()
            .map_err(|kind| StructuralError::new(kind, position))?;
        instructions.push(instruction);
    }
    Ok(instructions)
}

/// Render instructions in the textual form accepted by [`parse_instructions`]
pub fn format_instructions(instructions: &[Instruction]) -> String {
    let mut text = String::new();
    for instruction in instructions {
        text.push_str(&instruction.to_string());
        text.push('\n');
    }
    text
}
