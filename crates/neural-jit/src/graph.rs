//! Dependency analysis over a genotype.
//!
//! Vertices live in an arena keyed by id and links are referenced by index,
//! so cycles in the genotype never turn into cycles of ownership.

use neural_core::{Activation, BodyNode, Genotype, NnLink, NnNode, NodeId};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{trace, warn};

/// Role of a vertex in the compiled network
#[derive(Debug, Clone, Copy)]
pub enum Vertex<'g> {
    Input(&'g BodyNode),
    Output(&'g BodyNode),
    Hidden(&'g NnNode),
    /// Body nodes that are neither sensor nor effector (the blob)
    Body(&'g BodyNode),
}

impl<'g> Vertex<'g> {
    pub fn id(&self) -> NodeId {
        match self {
            Vertex::Input(node) | Vertex::Output(node) | Vertex::Body(node) => node.id,
            Vertex::Hidden(node) => node.id,
        }
    }

    pub fn activation(&self) -> Option<Activation> {
        match self {
            Vertex::Hidden(node) => Some(node.activation),
            _ => None,
        }
    }
}

/// Classified view of a genotype, built once per compilation
pub struct NetworkGraph<'g> {
    vertices: HashMap<NodeId, Vertex<'g>>,
    inputs: Vec<NodeId>,
    outputs: Vec<NodeId>,
    hidden: Vec<NodeId>,
    /// Enabled links whose endpoints both exist, in genotype order
    links: Vec<&'g NnLink>,
    incoming: HashMap<NodeId, Vec<usize>>,
    outgoing: HashMap<NodeId, Vec<usize>>,
    dropped_links: usize,
}

impl<'g> NetworkGraph<'g> {
    pub fn new(genotype: &'g Genotype) -> Self {
        let mut vertices = HashMap::new();
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        let mut hidden = Vec::new();

        for node in genotype.body_nodes() {
            let vertex = if node.kind.is_sensor() {
                Vertex::Input(node)
            } else if node.kind.is_effector() {
                Vertex::Output(node)
            } else {
                Vertex::Body(node)
            };
            if vertices.contains_key(&node.id) {
                warn!(id = %node.id, "duplicate vertex id, keeping the first gene");
                continue;
            }
            match vertex {
                Vertex::Input(_) => inputs.push(node.id),
                Vertex::Output(_) => outputs.push(node.id),
                _ => {}
            }
            vertices.insert(node.id, vertex);
        }

        for node in genotype.hidden_nodes() {
            if vertices.contains_key(&node.id) {
                warn!(id = %node.id, "duplicate vertex id, keeping the first gene");
                continue;
            }
            hidden.push(node.id);
            vertices.insert(node.id, Vertex::Hidden(node));
        }

        let mut links = Vec::new();
        let mut incoming: HashMap<NodeId, Vec<usize>> = HashMap::new();
        let mut outgoing: HashMap<NodeId, Vec<usize>> = HashMap::new();
        let mut dropped_links = 0;

        for link in genotype.links().filter(|link| link.is_enabled()) {
            if !vertices.contains_key(&link.from) || !vertices.contains_key(&link.to) {
                dropped_links += 1;
                continue;
            }
            let index = links.len();
            links.push(link);
            incoming.entry(link.to).or_default().push(index);
            outgoing.entry(link.from).or_default().push(index);
        }

        if dropped_links > 0 {
            warn!(dropped_links, "ignoring links with unknown endpoints");
        }

        Self {
            vertices,
            inputs,
            outputs,
            hidden,
            links,
            incoming,
            outgoing,
            dropped_links,
        }
    }

    pub fn vertex(&self, id: NodeId) -> Option<&Vertex<'g>> {
        self.vertices.get(&id)
    }

    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[NodeId] {
        &self.outputs
    }

    pub fn hidden(&self) -> &[NodeId] {
        &self.hidden
    }

    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    pub fn dropped_links(&self) -> usize {
        self.dropped_links
    }

    pub fn is_input(&self, id: NodeId) -> bool {
        matches!(self.vertices.get(&id), Some(Vertex::Input(_)))
    }

    pub fn is_hidden(&self, id: NodeId) -> bool {
        matches!(self.vertices.get(&id), Some(Vertex::Hidden(_)))
    }

    pub fn activation(&self, id: NodeId) -> Option<Activation> {
        self.vertices.get(&id).and_then(Vertex::activation)
    }

    /// Enabled links ending at `id`, in genotype order
    pub fn incoming(&self, id: NodeId) -> impl Iterator<Item = &'g NnLink> + '_ {
        self.incoming
            .get(&id)
            .into_iter()
            .flatten()
            .map(move |&index| self.links[index])
    }

    /// Hidden-node sources of the enabled links ending at `id`
    pub fn direct_dependencies(&self, id: NodeId) -> Vec<NodeId> {
        self.incoming(id)
            .map(|link| link.from)
            .filter(|&from| self.is_hidden(from))
            .collect()
    }

    /// True if a directed path of one or more enabled links leads from `from` to `to`
    pub fn has_path(&self, from: NodeId, to: NodeId) -> bool {
        let mut visited = HashSet::new();
        let mut frontier = VecDeque::from([from]);

        while let Some(current) = frontier.pop_front() {
            for &index in self.outgoing.get(&current).into_iter().flatten() {
                let next = self.links[index].to;
                if next == to {
                    return true;
                }
                if visited.insert(next) {
                    frontier.push_back(next);
                }
            }
        }

        false
    }

    /// Evaluation order over the vertices reachable from the outputs.
    ///
    /// Every vertex appears once and after the vertices it depends on, except
    /// across a feedback edge: a dependency that is already visited and
    /// reachable forward from the dependent vertex is not expanded again.
    ///
    /// A dependency is queued once per path that reaches it, so the visitation
    /// sequence grows with the number of output-reaching paths, not with the
    /// vertex count.
    pub fn evaluation_order(&self) -> Vec<NodeId> {
        let mut dependencies: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut visits: Vec<NodeId> = self.outputs.clone();
        let mut cursor = 0;

        while cursor < visits.len() {
            let vertex = visits[cursor];
            cursor += 1;

            let direct = dependencies
                .entry(vertex)
                .or_insert_with(|| self.direct_dependencies(vertex))
                .clone();

            for dependency in direct {
                if dependency == vertex {
                    continue;
                }
                if dependencies.contains_key(&dependency) && self.has_path(vertex, dependency) {
                    trace!(%vertex, %dependency, "feedback edge resolved in current pass");
                    continue;
                }
                visits.push(dependency);
            }
        }

        let mut seen = HashSet::new();
        visits
            .into_iter()
            .rev()
            .filter(|id| seen.insert(*id))
            .collect()
    }
}
