//! Compiler from the instruction sequence to an expression program.

use crate::error::{StructuralError, StructuralErrorKind};
use crate::instruction::{Instruction, Opcode, Operand, Slot};
use crate::program::{Expr, Program, Statement};
use neural_core::{Activation, JitConfig, NodeId};
use std::collections::{HashMap, HashSet};

/// Entry of the compile-time stack
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Scalar(Expr),
    Bundle(Vec<Expr>),
    /// Assignment waiting for the next `drop`
    Statement(Statement),
}

impl Fragment {
    fn describe(&self) -> &'static str {
        match self {
            Fragment::Scalar(_) => "scalar",
            Fragment::Bundle(_) => "bundle",
            Fragment::Statement(_) => "statement",
        }
    }
}

pub struct Compiler {
    config: JitConfig,
}

impl Compiler {
    pub fn new(config: JitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &JitConfig {
        &self.config
    }

    /// Interpret `instructions` and assemble a program. Any malformed stack
    /// state aborts the whole compilation.
    pub fn compile(&self, instructions: &[Instruction]) -> Result<Program, StructuralError> {
        let mut state = CompileState::new(self.config.optimize);

        for (position, instruction) in instructions.iter().enumerate() {
            if let Err(kind) = state.step(instruction) {
                return Err(state.into_error(kind, position, Some(instruction.clone())));
            }
        }

        if let Err(kind) = state.flush() {
            return Err(state.into_error(kind, instructions.len(), None));
        }

        tracing::trace!(
            statements = state.statements.len(),
            outputs = state.output_keys.len(),
            "assembled program"
        );

        Ok(Program {
            statements: state.statements,
            inputs: state.input_keys,
            outputs: state.output_keys,
        })
    }
}

struct CompileState {
    optimize: bool,
    stack: Vec<Fragment>,
    statements: Vec<Statement>,
    declared_inputs: HashSet<NodeId>,
    input_keys: Vec<NodeId>,
    /// Durable values set so far, with their value when it folded to a constant
    durable: HashMap<NodeId, Option<f64>>,
    output_keys: Vec<NodeId>,
    bundles: HashMap<NodeId, Vec<Expr>>,
}

impl CompileState {
    fn new(optimize: bool) -> Self {
        Self {
            optimize,
            stack: Vec::new(),
            statements: Vec::new(),
            declared_inputs: HashSet::new(),
            input_keys: Vec::new(),
            durable: HashMap::new(),
            output_keys: Vec::new(),
            bundles: HashMap::new(),
        }
    }

    fn into_error(
        self,
        kind: StructuralErrorKind,
        position: usize,
        instruction: Option<Instruction>,
    ) -> StructuralError {
        StructuralError {
            kind,
            position,
            instruction,
            statements: self.statements,
            stack: self.stack,
        }
    }

    fn step(&mut self, instruction: &Instruction) -> Result<(), StructuralErrorKind> {
        let opcode = instruction.opcode;

        match opcode {
            Opcode::Drop => self.flush(),
            Opcode::Var => {
                let id = node_operand(instruction)?;
                if self.declared_inputs.insert(id) {
                    self.input_keys.push(id);
                }
                Ok(())
            }
            Opcode::Pick => {
                let fragment = self.pick(slot_operand(instruction)?)?;
                self.stack.push(fragment);
                Ok(())
            }
            Opcode::Arg => {
                let value = literal_operand(instruction)?;
                self.stack.push(Fragment::Scalar(Expr::Literal(value)));
                Ok(())
            }
            Opcode::Mul => self.mul(),
            Opcode::Concat => {
                let operands = self.take_staged(opcode)?;
                self.stack.push(Fragment::Bundle(operands));
                Ok(())
            }
            Opcode::Sum => {
                let operands = self.take_staged(opcode)?;
                let sum = self.sum(operands);
                self.stack.push(Fragment::Scalar(sum));
                Ok(())
            }
            Opcode::Sigmoid | Opcode::Tanh | Opcode::Linear | Opcode::Relu => {
                let activation = opcode
                    .activation()
                    .ok_or_else(|| StructuralErrorKind::UnknownOpcode(opcode.to_string()))?;
                let x = self.pop_scalar(opcode)?;
                let value = self.activate(activation, x);
                self.stack.push(Fragment::Scalar(value));
                Ok(())
            }
            Opcode::Set => self.set(slot_operand(instruction)?),
        }
    }

    /// Move staged statements into the finished list
    fn flush(&mut self) -> Result<(), StructuralErrorKind> {
        let dangling = self
            .stack
            .iter()
            .filter(|fragment| !matches!(fragment, Fragment::Statement(_)))
            .count();
        if dangling > 0 {
            return Err(StructuralErrorKind::DanglingValues(dangling));
        }

        for fragment in self.stack.drain(..) {
            if let Fragment::Statement(statement) = fragment {
                self.statements.push(statement);
            }
        }
        Ok(())
    }

    fn pick(&self, slot: Slot) -> Result<Fragment, StructuralErrorKind> {
        match slot {
            Slot::Node(id) if self.declared_inputs.contains(&id) => {
                Ok(Fragment::Scalar(Expr::Input(id)))
            }
            Slot::Node(id) => match self.durable.get(&id) {
                Some(Some(constant)) if self.optimize => {
                    Ok(Fragment::Scalar(Expr::Literal(*constant)))
                }
                Some(_) => Ok(Fragment::Scalar(Expr::Output(id))),
                // Not set earlier in this pass: feedback edges and body nodes read 0.0,
                // never what a previous exec left in the output map
                None => Ok(Fragment::Scalar(Expr::Literal(0.0))),
            },
            Slot::Bundle(id) => self
                .bundles
                .get(&id)
                .map(|values| Fragment::Bundle(values.clone()))
                .ok_or(StructuralErrorKind::UnknownBundle(id)),
        }
    }

    fn mul(&mut self) -> Result<(), StructuralErrorKind> {
        let found = self.stack.len();
        if found < 2 {
            return Err(StructuralErrorKind::StackUnderflow {
                opcode: Opcode::Mul,
                expected: 2,
                found,
            });
        }

        match (&self.stack[found - 2], &self.stack[found - 1]) {
            (Fragment::Scalar(_), Fragment::Scalar(_)) => {}
            (Fragment::Bundle(left), Fragment::Bundle(right)) => {
                if left.len() != right.len() {
                    return Err(StructuralErrorKind::ShapeMismatch {
                        left: left.len(),
                        right: right.len(),
                    });
                }
            }
            (Fragment::Statement(_), _) | (_, Fragment::Statement(_)) => {
                return Err(StructuralErrorKind::UnexpectedStatement(Opcode::Mul));
            }
            _ => return Err(StructuralErrorKind::MissingBundle),
        }

        let (right, left) = match (self.stack.pop(), self.stack.pop()) {
            (Some(right), Some(left)) => (right, left),
            _ => unreachable!("stack length checked above"),
        };

        match (left, right) {
            (Fragment::Bundle(left), Fragment::Bundle(right)) => {
                for (a, b) in left.into_iter().zip(right) {
                    let product = self.multiply(a, b);
                    self.stack.push(Fragment::Scalar(product));
                }
            }
            (Fragment::Scalar(a), Fragment::Scalar(b)) => {
                let product = self.multiply(a, b);
                self.stack.push(Fragment::Scalar(product));
            }
            _ => unreachable!("operand shapes checked above"),
        }
        Ok(())
    }

    fn multiply(&self, a: Expr, b: Expr) -> Expr {
        if self.optimize {
            if a.is_zero() || b.is_zero() {
                return Expr::Literal(0.0);
            }
            if let (Some(x), Some(y)) = (a.literal(), b.literal()) {
                return Expr::Literal(x * y);
            }
        }
        Expr::Mul(Box::new(a), Box::new(b))
    }

    fn sum(&self, operands: Vec<Expr>) -> Expr {
        if !self.optimize {
            return Expr::Sum(operands);
        }

        let mut constant = 0.0;
        let mut terms = Vec::with_capacity(operands.len());
        for operand in operands {
            match operand.literal() {
                Some(value) => constant += value,
                None => terms.push(operand),
            }
        }

        if constant != 0.0 {
            terms.push(Expr::Literal(constant));
        }

        match terms.len() {
            0 => Expr::Literal(0.0),
            1 => terms.pop().unwrap_or(Expr::Literal(0.0)),
            _ => Expr::Sum(terms),
        }
    }

    fn activate(&self, activation: Activation, x: Expr) -> Expr {
        if self.optimize {
            if x.is_zero() {
                return Expr::Literal(activation.at_zero());
            }
            if let Some(value) = x.literal() {
                return Expr::Literal(activation.apply(value));
            }
        }
        Expr::Activation(activation, Box::new(x))
    }

    fn set(&mut self, slot: Slot) -> Result<(), StructuralErrorKind> {
        match slot {
            Slot::Bundle(id) => match self.stack.last() {
                Some(Fragment::Bundle(_)) => {
                    if let Some(Fragment::Bundle(values)) = self.stack.pop() {
                        self.bundles.insert(id, values);
                    }
                    Ok(())
                }
                Some(Fragment::Scalar(_)) => Err(StructuralErrorKind::ExpectedBundle(Opcode::Set)),
                Some(Fragment::Statement(_)) => {
                    Err(StructuralErrorKind::UnexpectedStatement(Opcode::Set))
                }
                None => Err(StructuralErrorKind::StackUnderflow {
                    opcode: Opcode::Set,
                    expected: 1,
                    found: 0,
                }),
            },
            Slot::Node(id) => {
                let value = self.pop_scalar(Opcode::Set)?;

                if !self.durable.contains_key(&id) {
                    self.output_keys.push(id);
                }

                let constant = if self.optimize { value.literal() } else { None };
                self.durable.insert(id, constant);

                // Output keys are seeded with 0.0, so a zero needs no statement
                if constant == Some(0.0) {
                    return Ok(());
                }

                self.stack.push(Fragment::Statement(Statement { target: id, value }));
                Ok(())
            }
        }
    }

    fn pop_scalar(&mut self, opcode: Opcode) -> Result<Expr, StructuralErrorKind> {
        match self.stack.last() {
            Some(Fragment::Scalar(_)) => match self.stack.pop() {
                Some(Fragment::Scalar(value)) => Ok(value),
                _ => unreachable!("top of stack checked above"),
            },
            Some(Fragment::Bundle(_)) => Err(StructuralErrorKind::ExpectedScalar(opcode)),
            Some(Fragment::Statement(_)) => Err(StructuralErrorKind::UnexpectedStatement(opcode)),
            None => Err(StructuralErrorKind::StackUnderflow {
                opcode,
                expected: 1,
                found: 0,
            }),
        }
    }

    /// Take every staged operand. All of them must be scalars.
    fn take_staged(&mut self, opcode: Opcode) -> Result<Vec<Expr>, StructuralErrorKind> {
        if self.stack.is_empty() {
            return Err(StructuralErrorKind::StackUnderflow {
                opcode,
                expected: 1,
                found: 0,
            });
        }

        if let Some(other) = self
            .stack
            .iter()
            .find(|fragment| !matches!(fragment, Fragment::Scalar(_)))
        {
            tracing::debug!(%opcode, found = other.describe(), "non-scalar operand staged");
            return Err(match other {
                Fragment::Statement(_) => StructuralErrorKind::UnexpectedStatement(opcode),
                _ => StructuralErrorKind::ExpectedScalar(opcode),
            });
        }

        Ok(self
            .stack
            .drain(..)
            .filter_map(|fragment| match fragment {
                Fragment::Scalar(expr) => Some(expr),
                _ => None,
            })
            .collect())
    }
}

fn node_operand(instruction: &Instruction) -> Result<NodeId, StructuralErrorKind> {
    match instruction.operand {
        Operand::Node(id) => Ok(id),
        _ => Err(StructuralErrorKind::MissingOperand(instruction.opcode)),
    }
}

fn slot_operand(instruction: &Instruction) -> Result<Slot, StructuralErrorKind> {
    match instruction.operand {
        Operand::Slot(slot) => Ok(slot),
        _ => Err(StructuralErrorKind::MissingOperand(instruction.opcode)),
    }
}

fn literal_operand(instruction: &Instruction) -> Result<f64, StructuralErrorKind> {
    match instruction.operand {
        Operand::Literal(value) => Ok(value),
        _ => Err(StructuralErrorKind::MissingOperand(instruction.opcode)),
    }
}
