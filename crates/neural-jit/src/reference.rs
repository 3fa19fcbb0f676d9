//! Direct interpretation of a genotype, used to cross-check compiled results.

use crate::graph::NetworkGraph;
use neural_core::{Activation, Error, Genotype, NodeId, Result};
use std::collections::{HashMap, HashSet};

struct Neuron {
    id: NodeId,
    activation: Option<Activation>,
    /// (source, weight) pairs
    inputs: Vec<(NodeId, f64)>,
}

/// Slow interpreter walking the same evaluation order as the compiler
pub struct ReferenceNetwork {
    neurons: Vec<Neuron>,
    sensors: HashSet<NodeId>,
    outputs: Vec<NodeId>,
}

impl ReferenceNetwork {
    pub fn new(genotype: &Genotype) -> Self {
        let graph = NetworkGraph::new(genotype);
        let mut sensors = HashSet::new();

        let neurons = graph
            .evaluation_order()
            .into_iter()
            .map(|id| {
                let inputs: Vec<(NodeId, f64)> = graph
                    .incoming(id)
                    .map(|link| (link.from, link.weight))
                    .collect();
                sensors.extend(
                    inputs
                        .iter()
                        .map(|&(from, _)| from)
                        .filter(|&from| graph.is_input(from)),
                );
                Neuron {
                    id,
                    activation: graph.activation(id),
                    inputs,
                }
            })
            .collect();

        Self {
            neurons,
            sensors,
            outputs: graph.outputs().to_vec(),
        }
    }

    pub fn outputs(&self) -> &[NodeId] {
        &self.outputs
    }

    /// Compute every vertex once. Sources not yet computed in this pass read 0.0.
    pub fn activate(&self, inputs: &HashMap<NodeId, f64>) -> Result<HashMap<NodeId, f64>> {
        let mut state: HashMap<NodeId, f64> = HashMap::with_capacity(self.neurons.len());

        for neuron in &self.neurons {
            let mut total = 0.0;
            for &(from, weight) in &neuron.inputs {
                let value = if self.sensors.contains(&from) {
                    *inputs.get(&from).ok_or(Error::MissingInput { id: from })?
                } else {
                    state.get(&from).copied().unwrap_or(0.0)
                };
                total += value * weight;
            }

            let value = match neuron.activation {
                Some(activation) => activation.apply(total),
                None => total,
            };
            state.insert(neuron.id, value);
        }

        Ok(state)
    }
}
