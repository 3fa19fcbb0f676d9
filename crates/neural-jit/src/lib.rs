//! Compiler from genotype-encoded neural networks to reusable evaluators.
//!
//! The pipeline runs once per genome:
//! - [`graph`] orders the vertices reachable from the outputs, cutting feedback edges
//! - [`emitter`] lowers that order into a flat stack-machine [`instruction`] sequence
//! - [`compiler`] interprets the sequence, folds constants and builds a [`program`]
//! - [`evaluator`] wraps the program so it can be executed every tick

pub mod compiler;
pub mod emitter;
pub mod error;
pub mod evaluator;
pub mod graph;
pub mod instruction;
pub mod program;
pub mod reference;

pub use compiler::{Compiler, Fragment};
pub use emitter::{Emission, InstructionEmitter};
pub use error::{StructuralError, StructuralErrorKind};
pub use evaluator::{CompileStats, Evaluator};
pub use graph::NetworkGraph;
pub use instruction::{format_instructions, parse_instructions, Instruction, Opcode, Operand, Slot};
pub use program::{Expr, Program, Statement};
pub use reference::ReferenceNetwork;

use neural_core::{Genotype, JitConfig};
use tracing::{debug, instrument};

/// Entry point tying the pipeline stages together
pub struct NeuralJit {
    compiler: Compiler,
}

impl NeuralJit {
    pub fn new(config: JitConfig) -> Self {
        Self {
            compiler: Compiler::new(config),
        }
    }

    pub fn config(&self) -> &JitConfig {
        self.compiler.config()
    }

    /// Analyze the genotype and emit its instruction sequence
    pub fn structure(&self, genotype: &Genotype) -> Emission {
        self.lower(genotype).0
    }

    /// Compile an instruction sequence into a program
    pub fn build(&self, instructions: &[Instruction]) -> Result<Program, StructuralError> {
        self.compiler.compile(instructions)
    }

    /// Run the whole pipeline
    #[instrument(skip(self, genotype), fields(genes = genotype.len()))]
    pub fn load(&self, genotype: &Genotype) -> Result<Evaluator, StructuralError> {
        let (emission, vertices, dropped_links) = self.lower(genotype);
        let program = self.build(&emission.instructions)?;

        let stats = CompileStats {
            vertices,
            active_nodes: emission.active_nodes,
            active_links: emission.active_links,
            dropped_links,
            instructions: emission.instructions.len(),
            statements: program.num_statements(),
            expression_nodes: program.total_nodes(),
        };
        debug!(
            vertices = stats.vertices,
            active_nodes = stats.active_nodes,
            active_links = stats.active_links,
            instructions = stats.instructions,
            statements = stats.statements,
            expression_nodes = stats.expression_nodes,
            optimize = self.config().optimize,
            "compiled network"
        );

        Ok(Evaluator::new(program, stats))
    }

    fn lower(&self, genotype: &Genotype) -> (Emission, usize, usize) {
        let graph = NetworkGraph::new(genotype);
        let order = graph.evaluation_order();
        let emission = InstructionEmitter::new(&graph).emit_all(&order);
        (emission, order.len(), graph.dropped_links())
    }
}

impl Default for NeuralJit {
    fn default() -> Self {
        Self::new(JitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neural_core::{
        random_genotype, Activation, BodyKind, Gene, InnovationId, NodeId, SampleConfig,
    };
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;

    const TOLERANCE: f64 = 1e-9;

    fn jit(optimize: bool) -> NeuralJit {
        NeuralJit::new(JitConfig { optimize })
    }

    fn example_a() -> Genotype {
        let mut genotype = Genotype::new();
        genotype.add_body(0, BodyKind::Blob);
        genotype.add_body(1, BodyKind::FoodRaySensor);
        genotype.add_node(2, Activation::Relu);
        genotype.add_body(3, BodyKind::MovementEffector);
        genotype.add_link(10, 1, 2, 2.0);
        genotype.add_link(11, 2, 3, 1.0);
        genotype
    }

    fn sensor_inputs(genotype: &Genotype, value: f64) -> HashMap<NodeId, f64> {
        genotype.sensors().map(|node| (node.id, value)).collect()
    }

    fn run(jit: &NeuralJit, genotype: &Genotype, inputs: &HashMap<NodeId, f64>) -> HashMap<NodeId, f64> {
        let evaluator = jit.load(genotype).unwrap();
        let mut outputs = evaluator.outputs();
        evaluator.exec(inputs, &mut outputs).unwrap();
        outputs
    }

    /// Straightforward recursion over enabled links, valid for acyclic genomes
    fn naive(genotype: &Genotype, id: NodeId, inputs: &HashMap<NodeId, f64>) -> f64 {
        if let Some(body) = genotype.body_nodes().find(|node| node.id == id) {
            if body.kind.is_sensor() {
                return inputs[&id];
            }
            if body.kind.is_blob() {
                return 0.0;
            }
        }

        let total: f64 = genotype
            .links()
            .filter(|link| link.is_enabled() && link.to == id)
            .map(|link| naive(genotype, link.from, inputs) * link.weight)
            .sum();

        match genotype.hidden_nodes().find(|node| node.id == id) {
            Some(node) => node.activation.apply(total),
            None => total,
        }
    }

    fn sample(seed: u64, allow_recurrent: bool) -> Genotype {
        let config = SampleConfig {
            num_hidden: 8,
            num_links: 30,
            allow_recurrent,
            ..SampleConfig::default()
        };
        random_genotype(&config, &mut ChaCha8Rng::seed_from_u64(seed))
    }

    #[test]
    fn test_example_a() {
        let genotype = example_a();
        let inputs = HashMap::from([(NodeId(1), 0.5)]);

        for optimize in [true, false] {
            let evaluator = jit(optimize).load(&genotype).unwrap();
            assert_eq!(evaluator.output_keys(), &[NodeId(2), NodeId(3)]);
            assert_eq!(evaluator.input_keys(), &[NodeId(1)]);
            assert_eq!(evaluator.stats().statements, 2);
            assert_eq!(evaluator.stats().expression_nodes, 7);

            let mut outputs = evaluator.outputs();
            evaluator.exec(&inputs, &mut outputs).unwrap();
            assert_eq!(outputs[&NodeId(2)], 1.0);
            assert_eq!(outputs[&NodeId(3)], 1.0);
        }
    }

    #[test]
    fn test_example_b() {
        let mut genotype = example_a();
        genotype.set_link_disabled(InnovationId(10), true);

        let optimized = jit(true).load(&genotype).unwrap();
        assert_eq!(optimized.program().num_statements(), 0);
        assert!(optimized.input_keys().is_empty());

        let plain = jit(false).load(&genotype).unwrap();
        assert_eq!(
            plain.program().to_string(),
            "o[2] = max(0, 0);\no[3] = o[2] * 1;\n"
        );

        for evaluator in [optimized, plain] {
            let mut outputs = evaluator.outputs();
            evaluator.exec(&HashMap::new(), &mut outputs).unwrap();
            assert_eq!(outputs[&NodeId(3)], 0.0);
        }
    }

    #[test]
    fn test_example_c() {
        let mut genotype = Genotype::new();
        genotype.add_body(1, BodyKind::FoodRaySensor);
        genotype.add_body(4, BodyKind::EnergySensor);
        genotype.add_node(2, Activation::Tanh);
        genotype.add_body(3, BodyKind::RotationEffector);
        genotype.add_link(10, 1, 2, 3.0);
        genotype.add_link(11, 4, 2, -1.0);
        genotype.add_link(12, 2, 3, 1.0);

        let inputs = HashMap::from([(NodeId(1), 1.0), (NodeId(4), 1.0)]);
        let outputs = run(&jit(true), &genotype, &inputs);
        assert!((outputs[&NodeId(2)] - 0.964_027_580_075_8).abs() < 1e-9);
        assert!((outputs[&NodeId(3)] - 2.0f64.tanh()).abs() < TOLERANCE);
    }

    #[test]
    fn test_zero_incoming_vertex_is_activation_at_zero() {
        for activation in Activation::all() {
            let mut genotype = Genotype::new();
            genotype.add_node(2, activation);
            genotype.add_body(3, BodyKind::MovementEffector);
            genotype.add_link(10, 2, 3, 1.0);

            for optimize in [true, false] {
                let outputs = run(&jit(optimize), &genotype, &HashMap::new());
                assert_eq!(outputs[&NodeId(2)], activation.at_zero(), "{}", activation);
                assert_eq!(outputs[&NodeId(3)], activation.at_zero(), "{}", activation);
            }
        }
    }

    #[test]
    fn test_missing_input_is_reported() {
        let evaluator = jit(true).load(&example_a()).unwrap();
        let mut outputs = evaluator.outputs();
        let err = evaluator.exec(&HashMap::new(), &mut outputs).unwrap_err();
        assert!(matches!(err, neural_core::Error::MissingInput { id } if id == NodeId(1)));
        assert!(outputs.values().all(|&v| v == 0.0));
    }

    #[test]
    fn test_unknown_endpoint_links_are_dropped() {
        let mut genotype = example_a();
        genotype.add_link(12, 99, 3, 5.0);
        genotype.add_link(13, 1, 98, 5.0);

        let evaluator = jit(true).load(&genotype).unwrap();
        assert_eq!(evaluator.stats().dropped_links, 2);

        let outputs = run(&jit(true), &genotype, &HashMap::from([(NodeId(1), 0.5)]));
        assert_eq!(outputs[&NodeId(3)], 1.0);
    }

    #[test]
    fn test_feedback_loop_terminates() {
        let mut genotype = Genotype::new();
        genotype.add_body(1, BodyKind::FoodRaySensor);
        genotype.add_node(2, Activation::Tanh);
        genotype.add_node(5, Activation::Tanh);
        genotype.add_body(3, BodyKind::MovementEffector);
        genotype.add_link(10, 1, 2, 1.0);
        genotype.add_link(11, 2, 5, 1.0);
        genotype.add_link(12, 5, 2, 1.0);
        genotype.add_link(13, 2, 3, 1.0);

        let evaluator = jit(true).load(&genotype).unwrap();
        assert_eq!(evaluator.stats().vertices, 3);

        let inputs = HashMap::from([(NodeId(1), 0.5)]);
        let mut first = evaluator.outputs();
        evaluator.exec(&inputs, &mut first).unwrap();
        let mut second = evaluator.outputs();
        evaluator.exec(&inputs, &mut second).unwrap();
        assert_eq!(first, second);

        // 5 runs first and sees no value for 2 in a fresh map
        assert_eq!(first[&NodeId(5)], 0.0);
        assert_eq!(first[&NodeId(2)], 0.5f64.tanh());
    }

    #[test]
    fn test_reused_output_map_gives_same_result_every_tick() {
        let mut genotype = Genotype::new();
        genotype.add_body(1, BodyKind::FoodRaySensor);
        genotype.add_node(2, Activation::Tanh);
        genotype.add_node(5, Activation::Tanh);
        genotype.add_body(3, BodyKind::MovementEffector);
        genotype.add_link(10, 1, 2, 1.0);
        genotype.add_link(11, 2, 5, 1.0);
        genotype.add_link(12, 5, 2, 1.0);
        genotype.add_link(13, 2, 3, 1.0);

        let inputs = HashMap::from([(NodeId(1), 0.5)]);
        for optimize in [true, false] {
            let evaluator = jit(optimize).load(&genotype).unwrap();
            let mut outputs = evaluator.outputs();
            for _ in 0..3 {
                evaluator.exec(&inputs, &mut outputs).unwrap();
                assert_eq!(outputs[&NodeId(5)], 0.0);
                assert_eq!(outputs[&NodeId(3)], 0.5f64.tanh());
            }
        }
    }

    #[test]
    fn test_bot_demo_outputs() {
        let genotype = Genotype::from_json(include_str!("../../../demos/bot.json")).unwrap();
        let inputs = sensor_inputs(&genotype, 0.5);

        // Order 9, 11, 10, 8, 13, 12: node 9 reads 8 before it is set and sees 0.0
        let n9 = 1.0 / (1.0 + (-1.0f64).exp());
        let n8 = (0.75 - 0.375 - n9).tanh();
        let expected_12 = n8 + n9 * 0.25;
        let expected_13 = 0.625 * -0.5 + 0.2 * 3.0;
        assert!((expected_12 - -0.158_972_965_912_090_67).abs() < 1e-12);

        for optimize in [true, false] {
            let evaluator = jit(optimize).load(&genotype).unwrap();
            let mut outputs = evaluator.outputs();
            for _ in 0..3 {
                evaluator.exec(&inputs, &mut outputs).unwrap();
                assert!((outputs[&NodeId(9)] - n9).abs() < 1e-12);
                assert!((outputs[&NodeId(8)] - n8).abs() < 1e-12);
                assert!((outputs[&NodeId(12)] - expected_12).abs() < 1e-12);
                assert!((outputs[&NodeId(13)] - expected_13).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_structure_and_build_match_load() {
        let genotype = example_a();
        let jit = jit(true);
        let emission = jit.structure(&genotype);
        let program = jit.build(&emission.instructions).unwrap();
        assert_eq!(&program, jit.load(&genotype).unwrap().program());
    }

    #[test]
    fn test_genotype_json_compiles() {
        let json = r#"[
            {"type": "body", "id": 1, "kind": "energy_sensor"},
            {"type": "nn_node", "id": 2, "activation": "linear"},
            {"type": "body", "id": 3, "kind": "movement_effector"},
            {"type": "nn_link", "id": 4, "from": 1, "to": 2, "weight": 0.25},
            {"type": "nn_link", "id": 5, "from": 2, "to": 3, "weight": 4.0}
        ]"#;
        let genotype = Genotype::from_json(json).unwrap();
        assert!(matches!(genotype.genes[0], Gene::Body(_)));

        let outputs = run(&jit(true), &genotype, &HashMap::from([(NodeId(1), 2.0)]));
        assert_eq!(outputs[&NodeId(3)], 2.0);
    }

    proptest! {
        #[test]
        fn prop_acyclic_matches_naive_recursion(seed in any::<u64>(), value in -1.0f64..1.0) {
            let genotype = sample(seed, false);
            let inputs = sensor_inputs(&genotype, value);
            let outputs = run(&jit(true), &genotype, &inputs);

            for effector in genotype.effectors() {
                let expected = naive(&genotype, effector.id, &inputs);
                prop_assert!((outputs[&effector.id] - expected).abs() < TOLERANCE);
            }
        }

        #[test]
        fn prop_compilation_is_idempotent(seed in any::<u64>(), recurrent in any::<bool>()) {
            let genotype = sample(seed, recurrent);
            let jit = jit(true);
            let first = jit.load(&genotype).unwrap();
            let second = jit.load(&genotype).unwrap();
            prop_assert_eq!(first.program(), second.program());
            prop_assert_eq!(first.stats(), second.stats());
        }

        #[test]
        fn prop_optimizer_preserves_results(seed in any::<u64>(), recurrent in any::<bool>()) {
            let genotype = sample(seed, recurrent);
            let inputs = sensor_inputs(&genotype, 0.5);
            let optimized = run(&jit(true), &genotype, &inputs);
            let plain = run(&jit(false), &genotype, &inputs);

            prop_assert_eq!(optimized.len(), plain.len());
            for (id, value) in &plain {
                prop_assert!((optimized[id] - value).abs() < TOLERANCE);
            }
        }

        #[test]
        fn prop_matches_reference_network(seed in any::<u64>(), recurrent in any::<bool>()) {
            let genotype = sample(seed, recurrent);
            let inputs = sensor_inputs(&genotype, -0.25);
            let outputs = run(&jit(true), &genotype, &inputs);
            let state = ReferenceNetwork::new(&genotype).activate(&inputs).unwrap();

            for (id, value) in &state {
                prop_assert!((outputs[id] - value).abs() < TOLERANCE);
            }
        }

        #[test]
        fn prop_disabling_inbound_links_zeroes_effector(seed in any::<u64>()) {
            let mut genotype = sample(seed, true);
            let effector = genotype.effectors().next().map(|node| node.id).unwrap();
            let inbound: Vec<InnovationId> = genotype
                .links()
                .filter(|link| link.to == effector)
                .map(|link| link.id)
                .collect();
            for id in inbound {
                genotype.set_link_disabled(id, true);
            }

            let outputs = run(&jit(true), &genotype, &sensor_inputs(&genotype, 1.0));
            prop_assert_eq!(outputs[&effector], 0.0);
        }
    }
}
