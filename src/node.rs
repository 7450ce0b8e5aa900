// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Flowgame Engine - Graph Nodes

use serde::{Deserialize, Serialize};

use crate::edge::Edge;
use crate::types::{EdgeIndex, NodeId};
use crate::wallet::{Wallet, WalletError};

// ─── Node Kind ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Policy,
    Goal,
    Player(PlayerState),
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Policy => "policy",
            Self::Goal => "goal",
            Self::Player(_) => "player",
        }
    }
}

/// Fields only a player carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Cap on the sum of outgoing pledge rates.
    pub max_outflow: f64,
    /// Goal the player is scored against.
    pub goal: Option<NodeId>,
    /// Secret salt for offer checksums.
    pub token: String,
    /// Player's own contribution currently sitting in its goal.
    pub goal_funded: f64,
}

impl PlayerState {
    pub fn new(token: String) -> Self {
        Self {
            max_outflow: 0.0,
            goal: None,
            token,
            goal_funded: 0.0,
        }
    }
}

// ─── Propagation Outcome ─────────────────────────────────────────────────────

/// What one node did during a propagation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Propagation {
    pub received: f64,
    pub burned: f64,
    pub forwarded: f64,
}

// ─── Node ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    /// Abbreviation and display group, carried through import and export.
    pub short_name: String,
    pub group: u32,
    pub kind: NodeKind,
    /// Fraction of the balance destroyed each tick.
    pub leak: f64,
    /// Minimum normalized inflow before the node forwards anything.
    pub activation: f64,
    /// Balance ceiling, 0 = unbounded.
    pub capacity: f64,
    /// Normalized inflow seen on the last propagation pass.
    pub active_level: f64,
    pub rank: u32,
    pub wallet: Wallet,
    /// Player injections waiting for this node's propagation step.
    pub(crate) pending: Wallet,
    pub(crate) incoming: Vec<EdgeIndex>,
    pub(crate) outgoing: Vec<EdgeIndex>,
}

impl Node {
    fn with_kind(id: NodeId, name: &str, kind: NodeKind, leak: f64) -> Self {
        Self {
            id,
            name: name.to_string(),
            short_name: String::new(),
            group: 0,
            kind,
            leak,
            activation: 0.0,
            capacity: 0.0,
            active_level: 0.0,
            rank: 0,
            wallet: Wallet::new(),
            pending: Wallet::new(),
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    pub fn new_policy(id: NodeId, name: &str, leak: f64) -> Self {
        Self::with_kind(id, name, NodeKind::Policy, leak)
    }

    pub fn new_goal(id: NodeId, name: &str, leak: f64) -> Self {
        Self::with_kind(id, name, NodeKind::Goal, leak)
    }

    /// Players never leak through the tick; their budget is replenished instead.
    pub fn new_player(id: NodeId, name: &str, token: String) -> Self {
        Self::with_kind(id, name, NodeKind::Player(PlayerState::new(token)), 0.0)
    }

    pub fn balance(&self) -> f64 {
        self.wallet.total()
    }

    /// Replace the wallet with `amount` owned by this node itself.
    pub fn set_balance(&mut self, amount: f64) {
        self.wallet = Wallet::single(self.id, amount);
    }

    pub fn is_player(&self) -> bool {
        matches!(self.kind, NodeKind::Player(_))
    }

    pub fn player(&self) -> Option<&PlayerState> {
        match &self.kind {
            NodeKind::Player(state) => Some(state),
            _ => None,
        }
    }

    pub fn player_mut(&mut self) -> Option<&mut PlayerState> {
        match &mut self.kind {
            NodeKind::Player(state) => Some(state),
            _ => None,
        }
    }

    pub fn incoming_edges(&self) -> &[EdgeIndex] {
        &self.incoming
    }

    pub fn outgoing_edges(&self) -> &[EdgeIndex] {
        &self.outgoing
    }

    pub fn pending_total(&self) -> f64 {
        self.pending.total()
    }

    pub fn active(&self) -> bool {
        self.is_player() || self.active_level >= self.activation
    }

    /// Own leak plus the magnitude of every negative incoming edge.
    pub fn effective_leak(&self, edges: &[Edge]) -> f64 {
        self.leak
            + self
                .incoming
                .iter()
                .map(|&e| &edges[e])
                .filter(|e| e.drains())
                .map(|e| e.weight.abs())
                .sum::<f64>()
    }

    /// Apply one tick of decay. Returns the amount destroyed.
    pub fn do_leak(&mut self, edges: &[Edge]) -> f64 {
        let leak = self.effective_leak(edges);
        if self.balance() > 0.0 && leak > 0.0 {
            self.wallet.leak(leak)
        } else {
            0.0
        }
    }

    pub fn total_children_weight(&self, edges: &[Edge]) -> f64 {
        self.outgoing
            .iter()
            .map(|&e| edges[e].weight.max(0.0))
            .sum()
    }

    /// Collect inflow, enforce capacity, then forward along positive edges
    /// if the normalized inflow reaches the activation threshold.
    ///
    /// `baseline` is the network's total player inflow; with no inflow the
    /// node counts as fully active.
    pub fn do_propagate_funds(
        &mut self,
        edges: &mut [Edge],
        baseline: f64,
    ) -> Result<Propagation, WalletError> {
        let mut out = Propagation::default();
        let previous = self.balance();

        let pending = std::mem::take(&mut self.pending);
        out.received += pending.total();
        self.wallet.merge(&pending);
        for &e in &self.incoming {
            if let Some(parcel) = edges[e].wallet.take() {
                out.received += parcel.total();
                self.wallet.merge(&parcel);
            }
        }

        let inflowed = self.balance();
        if self.capacity > 0.0 && inflowed > self.capacity {
            out.burned = self.wallet.debit(inflowed - self.capacity);
        }

        self.active_level = if baseline > 0.0 {
            (inflowed - previous) / baseline
        } else {
            1.0
        };
        if self.active_level < self.activation {
            return Ok(out);
        }

        let balance = self.balance();
        if balance <= 0.0 {
            return Ok(out);
        }
        let children_weight = self.total_children_weight(edges);
        if children_weight <= 0.0 {
            return Ok(out);
        }

        let factor = (balance / children_weight).min(1.0);
        for &e in &self.outgoing {
            let edge = &mut edges[e];
            if !edge.carries_flow() {
                continue;
            }
            // float rounding can overdraw by ~1e-15
            let amount = (edge.weight * factor).min(self.wallet.total());
            let parcel = edge.wallet.get_or_insert_with(Wallet::new);
            out.forwarded += self.wallet.transfer(parcel, amount)?;
        }
        Ok(out)
    }
}
