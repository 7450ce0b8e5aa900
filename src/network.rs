// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Flowgame Engine - Network Arena & Tick Pipeline

//! The network owns every node and edge. Cross references are arena
//! indices: a node lists the indices of its incoming and outgoing edges, an
//! edge names the indices of its endpoints.
//!
//! One tick runs, in order:
//!
//! 1. leak on every policy and goal,
//! 2. injection of player pledges into their targets' pending wallets,
//! 3. propagation over non-player nodes in ascending rank,
//! 4. goal attribution for every player.
//!
//! Single-pass propagation is only sound on a DAG, so every structural
//! change re-ranks the graph and a cycle is rejected.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::edge::Edge;
use crate::error::{EngineError, EngineResult};
use crate::node::{Node, NodeKind};
use crate::types::{ConnectionData, EdgeIndex, Holding, NodeData, NodeId, TickReport};
use crate::wallet::Wallet;

/// Totals of one propagation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PassSummary {
    pub burned: f64,
    pub forwarded: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Network {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: HashMap<NodeId, usize>,
    /// Non-player nodes sorted by `(rank, id)`.
    ranked: Vec<usize>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.index.contains_key(id)
    }

    pub fn index_of(&self, id: &NodeId) -> EngineResult<usize> {
        self.index.get(id).copied().ok_or(EngineError::NodeNotFound(*id))
    }

    pub fn node(&self, id: &NodeId) -> EngineResult<&Node> {
        let idx = self.index_of(id)?;
        Ok(&self.nodes[idx])
    }

    pub fn node_mut(&mut self, id: &NodeId) -> EngineResult<&mut Node> {
        let idx = self.index_of(id)?;
        Ok(&mut self.nodes[idx])
    }

    pub fn node_at(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    pub(crate) fn node_at_mut(&mut self, idx: usize) -> &mut Node {
        &mut self.nodes[idx]
    }

    pub fn edge(&self, idx: EdgeIndex) -> Option<&Edge> {
        self.edges.get(idx)
    }

    pub fn players(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_player())
    }

    /// Non-player nodes in propagation order.
    pub fn ranked_nodes(&self) -> impl Iterator<Item = &Node> {
        self.ranked.iter().map(|&i| &self.nodes[i])
    }

    // ─── Structure ───────────────────────────────────────────────────────────

    /// Add a node and re-rank. Ids must be unique.
    pub fn add_node(&mut self, node: Node) -> EngineResult<usize> {
        let idx = self.push_node(node)?;
        self.rank()?;
        Ok(idx)
    }

    /// Add a directed edge and re-rank. An edge that would close a cycle is
    /// rolled back and reported as [`EngineError::CyclicGraph`]. Players only
    /// fund, so an edge into a player is refused.
    pub fn add_edge(&mut self, from: &NodeId, to: &NodeId, weight: f64) -> EngineResult<EdgeIndex> {
        let from = self.index_of(from)?;
        let to = self.link_target(to)?;
        let e = self.push_edge(from, to, weight);
        if let Err(err) = self.rank() {
            self.nodes[from].outgoing.pop();
            self.nodes[to].incoming.pop();
            self.edges.pop();
            return Err(err);
        }
        Ok(e)
    }

    /// Arena index of a node that may receive an edge.
    pub(crate) fn link_target(&self, id: &NodeId) -> EngineResult<usize> {
        let idx = self.index_of(id)?;
        let node = &self.nodes[idx];
        if node.is_player() {
            return Err(EngineError::WrongNodeKind {
                id: *id,
                expected: "policy or goal",
                actual: node.kind.label(),
            });
        }
        Ok(idx)
    }

    /// Insert without ranking; callers building a graph in bulk must call
    /// [`rank`](Self::rank) once they are done.
    pub(crate) fn push_node(&mut self, node: Node) -> EngineResult<usize> {
        if self.index.contains_key(&node.id) {
            return Err(EngineError::DuplicateNode(node.id));
        }
        let idx = self.nodes.len();
        self.index.insert(node.id, idx);
        self.nodes.push(node);
        Ok(idx)
    }

    pub(crate) fn push_edge(&mut self, from: usize, to: usize, weight: f64) -> EdgeIndex {
        let e = self.edges.len();
        self.edges.push(Edge::new(from, to, weight));
        self.nodes[from].outgoing.push(e);
        self.nodes[to].incoming.push(e);
        e
    }

    /// First edge running `from -> to`, if any.
    pub fn find_edge(&self, from: usize, to: usize) -> Option<EdgeIndex> {
        self.nodes[from]
            .outgoing
            .iter()
            .copied()
            .find(|&e| self.edges[e].to == to)
    }

    pub fn edge_between(&self, from: &NodeId, to: &NodeId) -> Option<&Edge> {
        let from = self.index.get(from)?;
        let to = self.index.get(to)?;
        self.find_edge(*from, *to).map(|e| &self.edges[e])
    }

    /// Changing a weight is not a structural change: no re-rank.
    pub(crate) fn set_edge_weight(&mut self, e: EdgeIndex, weight: f64) {
        self.edges[e].weight = weight;
    }

    pub fn parents(&self, id: &NodeId) -> EngineResult<Vec<NodeId>> {
        let idx = self.index_of(id)?;
        Ok(self.nodes[idx]
            .incoming
            .iter()
            .map(|&e| self.nodes[self.edges[e].from].id)
            .collect())
    }

    pub fn children(&self, id: &NodeId) -> EngineResult<Vec<NodeId>> {
        let idx = self.index_of(id)?;
        Ok(self.nodes[idx]
            .outgoing
            .iter()
            .map(|&e| self.nodes[self.edges[e].to].id)
            .collect())
    }

    /// Drop every node and edge.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.index.clear();
        self.ranked.clear();
    }

    /// Kahn's algorithm. Sources get rank 0, every other node one more than
    /// its highest-ranked parent. Ranks are only written back when the whole
    /// graph is acyclic.
    pub fn rank(&mut self) -> EngineResult<()> {
        let n = self.nodes.len();
        let mut in_degree: Vec<usize> = self.nodes.iter().map(|node| node.incoming.len()).collect();
        let mut ranks = vec![0u32; n];
        let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut visited = 0usize;

        while let Some(current) = queue.pop_front() {
            visited += 1;
            for &e in &self.nodes[current].outgoing {
                let child = self.edges[e].to;
                ranks[child] = ranks[child].max(ranks[current] + 1);
                in_degree[child] -= 1;
                if in_degree[child] == 0 {
                    queue.push_back(child);
                }
            }
        }

        if visited < n {
            return Err(EngineError::CyclicGraph(n - visited));
        }

        for (node, rank) in self.nodes.iter_mut().zip(ranks) {
            node.rank = rank;
        }
        let mut ranked: Vec<usize> = (0..n).filter(|&i| !self.nodes[i].is_player()).collect();
        ranked.sort_by_key(|&i| (self.nodes[i].rank, self.nodes[i].id));
        self.ranked = ranked;
        Ok(())
    }

    // ─── Accounting ──────────────────────────────────────────────────────────

    /// Σ of every player's max outflow; the activation baseline.
    pub fn total_player_inflow(&self) -> f64 {
        self.players()
            .filter_map(Node::player)
            .map(|p| p.max_outflow)
            .sum()
    }

    /// Funds anywhere in the network: wallets, pending injections and edges.
    pub fn total_funds(&self) -> f64 {
        let held: f64 = self.nodes.iter().map(|n| n.balance() + n.pending_total()).sum();
        let in_flight: f64 = self.edges.iter().map(Edge::in_flight).sum();
        held + in_flight
    }

    /// Per-owner balances held at `id`.
    pub fn holdings(&self, id: &NodeId) -> EngineResult<Vec<Holding>> {
        let node = self.node(id)?;
        Ok(node
            .wallet
            .iter()
            .map(|(owner, amount)| Holding {
                owner: *owner,
                location: node.id,
                balance: *amount,
            })
            .collect())
    }

    /// Export shape of one non-player node. Connections are its incoming
    /// edges from other non-player nodes.
    pub fn node_data(&self, idx: usize) -> NodeData {
        let node = &self.nodes[idx];
        let connections = node
            .incoming
            .iter()
            .map(|&e| &self.edges[e])
            .filter(|edge| !self.nodes[edge.from].is_player())
            .map(|edge| ConnectionData {
                from_id: self.nodes[edge.from].id,
                to_id: node.id,
                weight: edge.weight,
            })
            .collect();
        NodeData {
            id: node.id,
            name: node.name.clone(),
            short_name: node.short_name.clone(),
            group: node.group,
            leakage: node.leak,
            max_amount: node.capacity,
            activation_amount: node.activation,
            balance: node.balance(),
            connections,
        }
    }

    // ─── Tick Pipeline ───────────────────────────────────────────────────────

    /// Decay every policy and goal. Returns the amount destroyed.
    pub fn leak(&mut self) -> f64 {
        let edges = &self.edges;
        self.nodes
            .iter_mut()
            .filter(|n| !n.is_player())
            .map(|n| n.do_leak(edges))
            .sum()
    }

    /// Move each positive pledge (capped by the player's balance) into the
    /// target's pending wallet. Returns the amount injected.
    pub fn inject(&mut self) -> EngineResult<f64> {
        let mut injected = 0.0;
        for p in 0..self.nodes.len() {
            if !self.nodes[p].is_player() {
                continue;
            }
            for k in 0..self.nodes[p].outgoing.len() {
                let edge = &self.edges[self.nodes[p].outgoing[k]];
                let (target, rate) = (edge.to, edge.weight);
                if rate <= 0.0 || self.nodes[target].is_player() {
                    continue;
                }
                let amount = rate.min(self.nodes[p].balance());
                if amount <= 0.0 {
                    continue;
                }
                let mut parcel = Wallet::new();
                injected += self.nodes[p].wallet.transfer(&mut parcel, amount)?;
                self.nodes[target].pending.merge(&parcel);
            }
        }
        Ok(injected)
    }

    /// One downstream pass in rank order, so every node is settled before its
    /// children collect from it.
    pub fn propagate(&mut self) -> EngineResult<PassSummary> {
        let baseline = self.total_player_inflow();
        let mut summary = PassSummary::default();
        for k in 0..self.ranked.len() {
            let idx = self.ranked[k];
            let outcome = self.nodes[idx].do_propagate_funds(&mut self.edges, baseline)?;
            summary.burned += outcome.burned;
            summary.forwarded += outcome.forwarded;
        }
        Ok(summary)
    }

    /// Refresh each player's own contribution sitting in its goal.
    pub fn update_goal_funding(&mut self) {
        let scores: Vec<(usize, f64)> = self
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| {
                let goal = n.player()?.goal?;
                let funded = self
                    .index
                    .get(&goal)
                    .map_or(0.0, |&g| self.nodes[g].wallet.get(&n.id));
                Some((i, funded))
            })
            .collect();
        for (i, funded) in scores {
            if let NodeKind::Player(state) = &mut self.nodes[i].kind {
                state.goal_funded = funded;
            }
        }
    }

    /// Full tick: leak, inject, propagate, attribute.
    pub fn tick(&mut self) -> EngineResult<TickReport> {
        let opening_total = self.total_funds();
        let leaked = self.leak();
        let injected = self.inject()?;
        let pass = self.propagate()?;
        self.update_goal_funding();
        let closing_total = self.total_funds();

        debug!(leaked, injected, burned = pass.burned, closing_total, "network tick");

        Ok(TickReport {
            tick: 0,
            opening_total,
            closing_total,
            leaked,
            injected,
            burned: pass.burned,
            conservation_error: 0.0,
            balanced: true,
        })
    }
}
