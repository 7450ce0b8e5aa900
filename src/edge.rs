// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Flowgame Engine - Edges

use crate::wallet::Wallet;

/// Directed, weighted link held in the network arena.
///
/// `from` funds `to`. A positive weight is a flow rate; a negative weight is
/// extra leak applied to `to`. Edges are never removed; a pledge dropped to
/// zero stays as a placeholder and still marks ownership.
#[derive(Debug, Clone)]
pub struct Edge {
    pub from: usize,
    pub to: usize,
    pub weight: f64,
    /// Funds pushed by `from` this tick, waiting for `to` to collect them.
    pub(crate) wallet: Option<Wallet>,
}

impl Edge {
    pub fn new(from: usize, to: usize, weight: f64) -> Self {
        Self { from, to, weight, wallet: None }
    }

    /// Amount currently in flight on this edge.
    pub fn in_flight(&self) -> f64 {
        self.wallet.as_ref().map_or(0.0, Wallet::total)
    }

    pub fn carries_flow(&self) -> bool {
        self.weight > 0.0
    }

    pub fn drains(&self) -> bool {
        self.weight < 0.0
    }
}
