//! The compiled artifact handed to callers.

use crate::program::Program;
use neural_core::{Error, NodeId, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Counters collected while building an evaluator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileStats {
    /// Vertices in the evaluation order
    pub vertices: usize,
    pub active_nodes: usize,
    pub active_links: usize,
    /// Links ignored because an endpoint is not part of the genotype
    pub dropped_links: usize,
    pub instructions: usize,
    pub statements: usize,
    /// Expression tree nodes across all statements
    pub expression_nodes: usize,
}

/// Immutable compiled network. Each call to [`Evaluator::exec`] runs the
/// statement list once without touching the genotype again.
#[derive(Debug, Clone)]
pub struct Evaluator {
    program: Program,
    stats: CompileStats,
}

impl Evaluator {
    pub fn new(program: Program, stats: CompileStats) -> Self {
        Self { program, stats }
    }

    /// Run one pass. Every input the program reads must be present in
    /// `inputs`, otherwise nothing is written to `outputs`.
    pub fn exec(
        &self,
        inputs: &HashMap<NodeId, f64>,
        outputs: &mut HashMap<NodeId, f64>,
    ) -> Result<()> {
        if let Some(&id) = self
            .program
            .inputs
            .iter()
            .find(|id| !inputs.contains_key(id))
        {
            return Err(Error::MissingInput { id });
        }

        self.program.run(inputs, outputs);
        Ok(())
    }

    /// Fresh output map with every registered key seeded to 0.0
    pub fn outputs(&self) -> HashMap<NodeId, f64> {
        self.program.outputs.iter().map(|&id| (id, 0.0)).collect()
    }

    pub fn output_keys(&self) -> &[NodeId] {
        &self.program.outputs
    }

    pub fn input_keys(&self) -> &[NodeId] {
        &self.program.inputs
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn stats(&self) -> &CompileStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{Expr, Statement};

    fn doubling() -> Evaluator {
        let program = Program {
            statements: vec![Statement {
                target: NodeId(2),
                value: Expr::Mul(Box::new(Expr::Input(NodeId(1))), Box::new(Expr::Literal(2.0))),
            }],
            inputs: vec![NodeId(1)],
            outputs: vec![NodeId(2), NodeId(3)],
        };
        Evaluator::new(program, CompileStats::default())
    }

    #[test]
    fn test_exec() {
        let evaluator = doubling();
        let mut outputs = evaluator.outputs();
        assert_eq!(outputs.len(), 2);

        let inputs = HashMap::from([(NodeId(1), 1.5)]);
        evaluator.exec(&inputs, &mut outputs).unwrap();
        assert_eq!(outputs[&NodeId(2)], 3.0);
        assert_eq!(outputs[&NodeId(3)], 0.0);
    }

    #[test]
    fn test_missing_input_leaves_outputs_untouched() {
        let evaluator = doubling();
        let mut outputs = HashMap::from([(NodeId(2), 7.0)]);

        let err = evaluator.exec(&HashMap::new(), &mut outputs).unwrap_err();
        assert!(matches!(err, Error::MissingInput { id } if id == NodeId(1)));
        assert_eq!(outputs, HashMap::from([(NodeId(2), 7.0)]));
    }

    #[test]
    fn test_elided_output_keeps_caller_value() {
        let evaluator = doubling();
        let mut outputs = HashMap::from([(NodeId(3), 4.0)]);
        let inputs = HashMap::from([(NodeId(1), 1.0)]);
        evaluator.exec(&inputs, &mut outputs).unwrap();
        assert_eq!(outputs[&NodeId(3)], 4.0);
    }

    #[test]
    fn test_evaluator_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Evaluator>();
    }
}
