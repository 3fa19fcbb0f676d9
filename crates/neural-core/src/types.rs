//! Core type definitions for genotype networks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Innovation number identifying a gene (node or link) within a genotype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Innovation number of a link gene. Links share the numbering with nodes
/// but are never addressed as vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InnovationId(pub u32);

impl fmt::Display for InnovationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for InnovationId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Kind of a body node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyKind {
    /// Main body of the organism
    Blob,
    MovementEffector,
    RotationEffector,
    FoodRaySensor,
    WallRaySensor,
    BotRaySensor,
    EnergySensor,
    SlowZoneSensor,
    DrainZoneSensor,
    KillBallSensor,
}

impl BodyKind {
    /// Returns true if this kind feeds a value into the network
    pub fn is_sensor(&self) -> bool {
        matches!(
            self,
            BodyKind::FoodRaySensor
                | BodyKind::WallRaySensor
                | BodyKind::BotRaySensor
                | BodyKind::EnergySensor
                | BodyKind::SlowZoneSensor
                | BodyKind::DrainZoneSensor
                | BodyKind::KillBallSensor
        )
    }

    /// Returns true if this kind reads a value out of the network
    pub fn is_effector(&self) -> bool {
        matches!(self, BodyKind::MovementEffector | BodyKind::RotationEffector)
    }

    pub fn is_blob(&self) -> bool {
        matches!(self, BodyKind::Blob)
    }

    pub fn sensors() -> [BodyKind; 7] {
        [
            BodyKind::FoodRaySensor,
            BodyKind::WallRaySensor,
            BodyKind::BotRaySensor,
            BodyKind::EnergySensor,
            BodyKind::SlowZoneSensor,
            BodyKind::DrainZoneSensor,
            BodyKind::KillBallSensor,
        ]
    }

    pub fn effectors() -> [BodyKind; 2] {
        [BodyKind::MovementEffector, BodyKind::RotationEffector]
    }
}

/// Activation function of a hidden node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Sigmoid,
    Tanh,
    Linear,
    Relu,
}

impl Activation {
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
            Activation::Linear => x,
            Activation::Relu => x.max(0.0),
        }
    }

    /// Closed-form value for a zero input
    pub fn at_zero(&self) -> f64 {
        match self {
            Activation::Sigmoid => 0.5,
            Activation::Tanh | Activation::Linear | Activation::Relu => 0.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
            Activation::Linear => "linear",
            Activation::Relu => "relu",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sigmoid" => Some(Activation::Sigmoid),
            "tanh" => Some(Activation::Tanh),
            "linear" => Some(Activation::Linear),
            "relu" => Some(Activation::Relu),
            _ => None,
        }
    }

    pub fn all() -> [Activation; 4] {
        [
            Activation::Sigmoid,
            Activation::Tanh,
            Activation::Linear,
            Activation::Relu,
        ]
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
