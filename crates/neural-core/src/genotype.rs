//! Genotype structure: body nodes, hidden nodes and the links between them.

use crate::types::{Activation, BodyKind, InnovationId, NodeId};
use crate::Result;
use serde::{Deserialize, Serialize};

/// A node of the organism body. Sensors feed the network, effectors read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyNode {
    pub id: NodeId,
    pub kind: BodyKind,
    #[serde(default)]
    pub value: f64,
}

/// Hidden computing node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NnNode {
    pub id: NodeId,
    pub activation: Activation,
}

/// Weighted connection between two vertices. `id` is the innovation number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NnLink {
    pub id: InnovationId,
    pub from: NodeId,
    pub to: NodeId,
    pub weight: f64,
    #[serde(default)]
    pub disabled: bool,
}

impl NnLink {
    pub fn is_enabled(&self) -> bool {
        !self.disabled
    }
}

/// A single gene of a genotype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Gene {
    Body(BodyNode),
    NnNode(NnNode),
    NnLink(NnLink),
}

impl Gene {
    /// Raw innovation number, unique across every gene of a genotype
    pub fn innovation(&self) -> u32 {
        match self {
            Gene::Body(node) => node.id.0,
            Gene::NnNode(node) => node.id.0,
            Gene::NnLink(link) => link.id.0,
        }
    }
}

/// The full set of genes describing one network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Genotype {
    pub genes: Vec<Gene>,
}

impl Genotype {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_body(&mut self, id: u32, kind: BodyKind) -> NodeId {
        let id = NodeId(id);
        self.genes.push(Gene::Body(BodyNode {
            id,
            kind,
            value: 0.0,
        }));
        id
    }

    pub fn add_node(&mut self, id: u32, activation: Activation) -> NodeId {
        let id = NodeId(id);
        self.genes.push(Gene::NnNode(NnNode { id, activation }));
        id
    }

    pub fn add_link(&mut self, id: u32, from: u32, to: u32, weight: f64) -> InnovationId {
        let id = InnovationId(id);
        self.genes.push(Gene::NnLink(NnLink {
            id,
            from: NodeId(from),
            to: NodeId(to),
            weight,
            disabled: false,
        }));
        id
    }

    pub fn body_nodes(&self) -> impl Iterator<Item = &BodyNode> {
        self.genes.iter().filter_map(|gene| match gene {
            Gene::Body(node) => Some(node),
            _ => None,
        })
    }

    pub fn hidden_nodes(&self) -> impl Iterator<Item = &NnNode> {
        self.genes.iter().filter_map(|gene| match gene {
            Gene::NnNode(node) => Some(node),
            _ => None,
        })
    }

    pub fn links(&self) -> impl Iterator<Item = &NnLink> {
        self.genes.iter().filter_map(|gene| match gene {
            Gene::NnLink(link) => Some(link),
            _ => None,
        })
    }

    pub fn sensors(&self) -> impl Iterator<Item = &BodyNode> {
        self.body_nodes().filter(|node| node.kind.is_sensor())
    }

    pub fn effectors(&self) -> impl Iterator<Item = &BodyNode> {
        self.body_nodes().filter(|node| node.kind.is_effector())
    }

    pub fn link_mut(&mut self, id: InnovationId) -> Option<&mut NnLink> {
        self.genes.iter_mut().find_map(|gene| match gene {
            Gene::NnLink(link) if link.id == id => Some(link),
            _ => None,
        })
    }

    /// Toggle a link. Returns false if no link carries that innovation number.
    pub fn set_link_disabled(&mut self, id: InnovationId, disabled: bool) -> bool {
        match self.link_mut(id) {
            Some(link) => {
                link.disabled = disabled;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
