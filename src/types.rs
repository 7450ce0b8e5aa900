// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Flowgame Engine - Type Definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ─── NodeId ──────────────────────────────────────────────────────────────────

/// Opaque 16-byte identifier shared by every node and wallet contributor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Zeroed identifier (for defaults/tests)
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(NodeId)
    }
}

impl From<Uuid> for NodeId {
    fn from(u: Uuid) -> Self { NodeId(u) }
}

/// Position of an edge inside the network arena.
pub type EdgeIndex = usize;

// ─── Tick Report ─────────────────────────────────────────────────────────────

/// Accounting summary of one tick (or one standalone pipeline phase).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: u64,
    /// Funds in the network before the tick started.
    pub opening_total: f64,
    /// Funds in the network after the tick finished.
    pub closing_total: f64,
    /// Funds destroyed by leak (decay and negative edges).
    pub leaked: f64,
    /// Funds moved from players into their pledged targets.
    pub injected: f64,
    /// Funds destroyed by capacity overflow.
    pub burned: f64,
    /// Absolute conservation error for this tick.
    #[serde(default)]
    pub conservation_error: f64,
    #[serde(default)]
    pub balanced: bool,
}

// ─── Funding ─────────────────────────────────────────────────────────────────

/// One pledge as exposed to outer layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingEntry {
    pub from_id: NodeId,
    pub to_id: NodeId,
    pub amount: f64,
}

// ─── Holdings / League Table ─────────────────────────────────────────────────

/// Balance a single owner holds at a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub owner: NodeId,
    pub location: NodeId,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeagueEntry {
    pub id: NodeId,
    pub name: String,
    pub goal: String,
    pub goal_contribution: f64,
    pub goal_total: f64,
}

/// Public view of a player. The token is only handed out on creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerData {
    pub id: NodeId,
    pub name: String,
    pub balance: f64,
    pub max_outflow: f64,
    pub goal: Option<NodeRef>,
    pub goal_funded: f64,
    /// Every policy the player pledges to, zero-rate placeholders included.
    pub policies: Vec<NodeRef>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRef {
    pub id: NodeId,
    pub name: String,
}

// ─── Network Interchange ─────────────────────────────────────────────────────

/// Import/export shape of a whole network. Player nodes are not part of it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkData {
    #[serde(alias = "Goals", default)]
    pub goals: Vec<NodeData>,
    #[serde(alias = "Policies", default)]
    pub policies: Vec<NodeData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(alias = "Id")]
    pub id: NodeId,
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "ShortName", default)]
    pub short_name: String,
    /// Display group used by clients to colour nodes.
    #[serde(alias = "Group", default)]
    pub group: u32,
    #[serde(alias = "Leakage", default)]
    pub leakage: f64,
    #[serde(alias = "MaxAmount", default)]
    pub max_amount: f64,
    #[serde(alias = "ActivationAmount", default)]
    pub activation_amount: f64,
    #[serde(default)]
    pub balance: f64,
    /// Incoming connections of this node.
    #[serde(alias = "Connections", default)]
    pub connections: Vec<ConnectionData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionData {
    #[serde(alias = "FromId")]
    pub from_id: NodeId,
    #[serde(alias = "ToId")]
    pub to_id: NodeId,
    #[serde(alias = "Weight")]
    pub weight: f64,
}
