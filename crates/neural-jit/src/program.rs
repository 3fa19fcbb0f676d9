//! Compiled expression program: the body of an evaluator.

use neural_core::{Activation, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Expression tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(f64),
    /// Read from the caller-supplied input map
    Input(NodeId),
    /// Read a durable value written earlier in the same pass
    Output(NodeId),
    Mul(Box<Expr>, Box<Expr>),
    Sum(Vec<Expr>),
    Activation(Activation, Box<Expr>),
}

impl Expr {
    pub fn literal(&self) -> Option<f64> {
        match self {
            Expr::Literal(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.literal() == Some(0.0)
    }

    /// Evaluate against the current maps. Inputs must already be checked by
    /// the caller; an output slot that is absent reads as 0.0.
    pub fn eval(&self, inputs: &HashMap<NodeId, f64>, outputs: &HashMap<NodeId, f64>) -> f64 {
        match self {
            Expr::Literal(value) => *value,
            Expr::Input(id) => inputs.get(id).copied().unwrap_or(f64::NAN),
            Expr::Output(id) => outputs.get(id).copied().unwrap_or(0.0),
            Expr::Mul(a, b) => a.eval(inputs, outputs) * b.eval(inputs, outputs),
            Expr::Sum(terms) => terms.iter().map(|t| t.eval(inputs, outputs)).sum(),
            Expr::Activation(activation, x) => activation.apply(x.eval(inputs, outputs)),
        }
    }

    /// Number of tree nodes
    pub fn size(&self) -> usize {
        match self {
            Expr::Literal(_) | Expr::Input(_) | Expr::Output(_) => 1,
            Expr::Mul(a, b) => 1 + a.size() + b.size(),
            Expr::Sum(terms) => 1 + terms.iter().map(Expr::size).sum::<usize>(),
            Expr::Activation(_, x) => 1 + x.size(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(value) => write!(f, "{}", value),
            Expr::Input(id) => write!(f, "i[{}]", id),
            Expr::Output(id) => write!(f, "o[{}]", id),
            Expr::Mul(a, b) => write!(f, "{} * {}", a, b),
            Expr::Sum(terms) => {
                f.write_str("(")?;
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" + ")?;
                    }
                    write!(f, "{}", term)?;
                }
                f.write_str(")")
            }
            Expr::Activation(Activation::Sigmoid, x) => write!(f, "1 / (1 + exp(-({})))", x),
            Expr::Activation(Activation::Tanh, x) => write!(f, "tanh({})", x),
            Expr::Activation(Activation::Linear, x) => write!(f, "{}", x),
            Expr::Activation(Activation::Relu, x) => write!(f, "max(0, {})", x),
        }
    }
}

/// Assignment of an expression into the output map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub target: NodeId,
    pub value: Expr,
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "o[{}] = {}", self.target, self.value)
    }
}

/// A compiled program
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub statements: Vec<Statement>,
    /// Input ids read by the program, in declaration order
    pub inputs: Vec<NodeId>,
    /// Output ids registered by the program, in registration order
    pub outputs: Vec<NodeId>,
}

impl Program {
    pub fn num_statements(&self) -> usize {
        self.statements.len()
    }

    /// Count expression nodes across all statements
    pub fn total_nodes(&self) -> usize {
        self.statements.iter().map(|s| s.value.size()).sum()
    }

    /// Run every statement once, writing results into `outputs`
    pub fn run(&self, inputs: &HashMap<NodeId, f64>, outputs: &mut HashMap<NodeId, f64>) {
        for statement in &self.statements {
            let value = statement.value.eval(inputs, outputs);
            outputs.insert(statement.target, value);
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            writeln!(f, "{};", statement)?;
        }
        Ok(())
    }
}
