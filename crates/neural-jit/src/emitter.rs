//! Lowering of an ordered vertex list into stack-machine instructions.

use crate::graph::NetworkGraph;
use crate::instruction::{Instruction, Slot};
use neural_core::{NnLink, NodeId};

/// Emits instructions vertex by vertex. Vertices must be fed in evaluation
/// order so every `pick` resolves against an input, a bundle, or a value that
/// was already `set`.
pub struct InstructionEmitter<'a, 'g> {
    graph: &'a NetworkGraph<'g>,
    instructions: Vec<Instruction>,
    active_nodes: usize,
    active_links: usize,
}

/// Instruction sequence plus the counters gathered while emitting it
#[derive(Debug, Clone, Default)]
pub struct Emission {
    pub instructions: Vec<Instruction>,
    /// Hidden nodes that made it into the sequence
    pub active_nodes: usize,
    /// Links feeding those vertices
    pub active_links: usize,
}

impl<'a, 'g> InstructionEmitter<'a, 'g> {
    pub fn new(graph: &'a NetworkGraph<'g>) -> Self {
        Self {
            graph,
            instructions: Vec::new(),
            active_nodes: 0,
            active_links: 0,
        }
    }

    pub fn emit_all(mut self, order: &[NodeId]) -> Emission {
        for &vertex in order {
            self.emit_vertex(vertex);
        }
        self.finish()
    }

    pub fn emit_vertex(&mut self, vertex: NodeId) {
        let links: Vec<&NnLink> = self.graph.incoming(vertex).collect();
        self.active_links += links.len();

        self.push(Instruction::drop());
        for link in &links {
            if self.graph.is_input(link.from) {
                self.push(Instruction::var(link.from));
            }
        }

        match links.as_slice() {
            [] => self.push(Instruction::arg(0.0)),
            [link] => {
                self.push(Instruction::pick(Slot::Node(link.from)));
                self.push(Instruction::arg(link.weight));
                self.push(Instruction::mul());
            }
            links => {
                for link in links {
                    self.push(Instruction::pick(Slot::Node(link.from)));
                }
                self.push(Instruction::concat());
                self.push(Instruction::set(Slot::Bundle(vertex)));
                self.push(Instruction::drop());
                for link in links {
                    self.push(Instruction::arg(link.weight));
                }
                self.push(Instruction::concat());
                self.push(Instruction::pick(Slot::Bundle(vertex)));
                self.push(Instruction::mul());
                self.push(Instruction::sum());
            }
        }

        if let Some(activation) = self.graph.activation(vertex) {
            self.active_nodes += 1;
            self.push(Instruction::activation(activation));
        }

        self.push(Instruction::set(Slot::Node(vertex)));
    }

    pub fn finish(self) -> Emission {
        Emission {
            instructions: self.instructions,
            active_nodes: self.active_nodes,
            active_links: self.active_links,
        }
    }

    fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }
}
