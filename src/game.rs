// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Flowgame Engine - Game Coordinator

//! `Game` is the handle an outer layer (scheduler, API, WASM front end)
//! drives. It owns the network, the seeded RNG used for ids, tokens and
//! random assignments, and the conservation audit that checks every tick.

use std::collections::BTreeSet;

use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::config::GameConfig;
use crate::conservation::{to_decimal, ConservationError, ConservationLaw};
use crate::error::{EngineError, EngineResult};
use crate::network::Network;
use crate::node::{Node, NodeKind};
use crate::player::Offer;
use crate::types::{
    EdgeIndex, FundingEntry, Holding, LeagueEntry, NetworkData, NodeId, NodeRef, PlayerData, TickReport,
};
use crate::wallet::{Wallet, WalletError};

pub struct Game {
    config: GameConfig,
    rng: ChaCha8Rng,
    network: Network,
    conservation: ConservationLaw,
    tick: u64,
}

impl Game {
    pub fn new(config: GameConfig) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            conservation: ConservationLaw::new(config.conservation_threshold),
            network: Network::new(),
            tick: 0,
            config,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Direct access for callers that drive the tick phases one by one.
    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn conservation(&self) -> &ConservationLaw {
        &self.conservation
    }

    /// Fresh random (v4) id drawn from the game's seeded RNG.
    pub fn next_id(&mut self) -> NodeId {
        let mut bytes = [0u8; 16];
        self.rng.fill_bytes(&mut bytes);
        NodeId(uuid::Builder::from_random_bytes(bytes).into_uuid())
    }

    fn next_token(&mut self) -> String {
        self.next_id().to_string()
    }

    // ─── Tick ────────────────────────────────────────────────────────────────

    /// Advance one tick and audit it. Fails without touching the network
    /// once the conservation breaker has tripped.
    pub fn tick(&mut self) -> EngineResult<TickReport> {
        if self.conservation.is_tripped() {
            let cumulative = to_decimal(self.conservation.cumulative_error());
            return Err(ConservationError::CircuitBreakerTripped(cumulative).into());
        }

        self.tick += 1;
        let cycle = self.config.budget_cycle_ticks;
        if cycle > 0 && self.tick % cycle == 0 {
            self.replenish_budgets();
        }

        let mut report = self.network.tick()?;
        report.tick = self.tick;

        let check = self.conservation.verify_tick(
            report.opening_total,
            report.closing_total,
            report.leaked,
            report.burned,
        )?;
        report.conservation_error = check.error;
        report.balanced = check.balanced;
        if !check.balanced {
            warn!(
                tick = self.tick,
                error = check.error,
                cumulative = self.conservation.cumulative_error(),
                "conservation imbalance"
            );
        }
        Ok(report)
    }

    /// Reset every player's wallet to the per-cycle budget.
    pub fn replenish_budgets(&mut self) {
        let money = self.config.money_per_budget_cycle;
        let ids: Vec<NodeId> = self.network.players().map(|p| p.id).collect();
        for id in &ids {
            if let Ok(node) = self.network.node_mut(id) {
                node.set_balance(money);
            }
        }
        info!(players = ids.len(), money, "budgets replenished");
    }

    // ─── Nodes ───────────────────────────────────────────────────────────────

    pub fn add_policy(&mut self, name: &str, leak: f64) -> EngineResult<NodeId> {
        let id = self.next_id();
        self.network.add_node(Node::new_policy(id, name, leak))?;
        debug!(%id, name, leak, "policy added");
        Ok(id)
    }

    pub fn add_goal(&mut self, name: &str, leak: f64) -> EngineResult<NodeId> {
        let id = self.next_id();
        self.network.add_node(Node::new_goal(id, name, leak))?;
        debug!(%id, name, leak, "goal added");
        Ok(id)
    }

    /// Insert a fully built node, keeping its id.
    pub fn insert_node(&mut self, node: Node) -> EngineResult<NodeId> {
        let id = node.id;
        self.network.add_node(node)?;
        Ok(id)
    }

    pub fn add_link(&mut self, from: &NodeId, to: &NodeId, weight: f64) -> EngineResult<EdgeIndex> {
        self.network.add_edge(from, to, weight)
    }

    /// New player with the standard budget and outflow cap, a random goal
    /// and zero-rate pledges to a random handful of policies.
    pub fn create_player(&mut self, name: &str) -> EngineResult<NodeId> {
        let id = self.next_id();
        let token = self.next_token();
        let mut player = Node::new_player(id, name, token);
        player.set_balance(self.config.money_per_budget_cycle);

        let goals: Vec<NodeId> = self.goals().iter().map(|g| g.id).collect();
        let goal = goals.choose(&mut self.rng).copied();
        if let Some(state) = player.player_mut() {
            state.max_outflow = self.config.standard_max_player_outflow;
            state.goal = goal;
        }
        self.network.add_node(player)?;

        let policies: Vec<NodeId> = self.policies().iter().map(|p| p.id).collect();
        let picks: Vec<NodeId> = policies
            .choose_multiple(&mut self.rng, self.config.policies_per_player)
            .copied()
            .collect();
        for policy in &picks {
            self.network.fund(&id, policy, 0.0)?;
        }

        info!(%id, name, policies = picks.len(), "player created");
        Ok(id)
    }

    pub fn get_node(&self, id: &NodeId) -> EngineResult<&Node> {
        self.network.node(id)
    }

    pub fn get_player(&self, id: &NodeId) -> EngineResult<&Node> {
        let idx = self.network.player_index(id)?;
        Ok(self.network.node_at(idx))
    }

    /// Player view with its goal and policies resolved to names.
    pub fn player_data(&self, id: &NodeId) -> EngineResult<PlayerData> {
        let player = self.get_player(id)?;
        let state = player
            .player()
            .ok_or(EngineError::PlayerNotFound(*id))?;
        let node_ref = |node: &Node| NodeRef {
            id: node.id,
            name: node.name.clone(),
        };

        let goal = match state.goal {
            Some(goal) => Some(node_ref(self.network.node(&goal)?)),
            None => None,
        };
        let policies = player
            .outgoing_edges()
            .iter()
            .filter_map(|&e| self.network.edge(e))
            .map(|edge| self.network.node_at(edge.to))
            .filter(|n| n.kind == NodeKind::Policy)
            .map(node_ref)
            .collect();

        Ok(PlayerData {
            id: player.id,
            name: player.name.clone(),
            balance: player.balance(),
            max_outflow: state.max_outflow,
            goal,
            goal_funded: state.goal_funded,
            policies,
            token: None,
        })
    }

    /// Set a node's wallet to `amount` owned by the node itself.
    pub fn set_balance(&mut self, id: &NodeId, amount: f64) -> EngineResult<()> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(WalletError::InvalidAmount(amount).into());
        }
        self.network.node_mut(id)?.set_balance(amount);
        Ok(())
    }

    fn sorted_by_name<'a>(mut nodes: Vec<&'a Node>) -> Vec<&'a Node> {
        nodes.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        nodes
    }

    pub fn players(&self) -> Vec<&Node> {
        Self::sorted_by_name(self.network.players().collect())
    }

    pub fn policies(&self) -> Vec<&Node> {
        Self::sorted_by_name(
            self.network
                .nodes()
                .filter(|n| n.kind == NodeKind::Policy)
                .collect(),
        )
    }

    pub fn goals(&self) -> Vec<&Node> {
        Self::sorted_by_name(
            self.network
                .nodes()
                .filter(|n| n.kind == NodeKind::Goal)
                .collect(),
        )
    }

    // ─── Funding ─────────────────────────────────────────────────────────────

    pub fn fund(&mut self, player: &NodeId, target: &NodeId, rate: f64) -> EngineResult<EdgeIndex> {
        self.network.fund(player, target, rate)
    }

    pub fn set_funding(&mut self, player: &NodeId, funding: &[FundingEntry]) -> EngineResult<()> {
        let pairs: Vec<(NodeId, f64)> = funding.iter().map(|f| (f.to_id, f.amount)).collect();
        self.network.set_funding(player, &pairs)
    }

    pub fn get_funding(&self, player: &NodeId) -> EngineResult<Vec<FundingEntry>> {
        self.network.funding(player)
    }

    /// One-off transfer from a player straight into a node's wallet.
    pub fn transfer_funds_to_node(&mut self, player: &NodeId, node: &NodeId, amount: f64) -> EngineResult<f64> {
        let p = self.network.player_index(player)?;
        let t = self.network.index_of(node)?;
        if p == t {
            return Ok(0.0);
        }
        let mut parcel = Wallet::new();
        let moved = self.network.node_at_mut(p).wallet.transfer(&mut parcel, amount)?;
        self.network.node_at_mut(t).wallet.merge(&parcel);
        Ok(moved)
    }

    pub fn total_player_inflow(&self) -> f64 {
        self.network.total_player_inflow()
    }

    // ─── Trading ─────────────────────────────────────────────────────────────

    pub fn offer_policy(&self, seller: &NodeId, policy: &NodeId, price: f64) -> EngineResult<Offer> {
        self.network.offer_policy(seller, policy, price)
    }

    pub fn buy_policy(&mut self, buyer: &NodeId, offer: &Offer) -> EngineResult<()> {
        self.network.buy_policy(buyer, offer)
    }

    /// Issue a fresh token, revoking the player's outstanding offers.
    pub fn rotate_token(&mut self, player: &NodeId) -> EngineResult<String> {
        self.network.player_index(player)?;
        let token = self.next_token();
        self.network.rotate_token(player, token.clone())?;
        Ok(token)
    }

    // ─── Scoring ─────────────────────────────────────────────────────────────

    /// Players by own contribution to their goal, highest first.
    pub fn top_players(&self) -> Vec<&Node> {
        let mut players = self.players();
        players.sort_by(|a, b| {
            let fa = a.player().map_or(0.0, |p| p.goal_funded);
            let fb = b.player().map_or(0.0, |p| p.goal_funded);
            fb.total_cmp(&fa)
        });
        players
    }

    /// Ranked rows for players that have a goal.
    pub fn league_table(&self) -> Vec<LeagueEntry> {
        self.top_players()
            .into_iter()
            .filter_map(|player| {
                let state = player.player()?;
                let goal = self.network.node(&state.goal?).ok()?;
                Some(LeagueEntry {
                    id: player.id,
                    name: player.name.clone(),
                    goal: goal.name.clone(),
                    goal_contribution: goal.wallet.get(&player.id),
                    goal_total: goal.balance(),
                })
            })
            .collect()
    }

    pub fn wallet_holdings(&self, node: &NodeId) -> EngineResult<Vec<Holding>> {
        self.network.holdings(node)
    }

    // ─── Network (Re)Construction ────────────────────────────────────────────

    /// Import goals, policies and their connections, keeping the given ids.
    /// The import is all-or-nothing.
    pub fn create_network(&mut self, data: &NetworkData) -> EngineResult<()> {
        let mut net = self.network.clone();

        let described = data
            .policies
            .iter()
            .map(|d| (d, Node::new_policy(d.id, &d.name, d.leakage)))
            .chain(
                data.goals
                    .iter()
                    .map(|d| (d, Node::new_goal(d.id, &d.name, d.leakage))),
            );
        for (d, mut node) in described {
            node.short_name = d.short_name.clone();
            node.group = d.group;
            node.capacity = d.max_amount;
            node.activation = d.activation_amount;
            if d.balance > 0.0 {
                node.set_balance(d.balance);
            }
            net.push_node(node)?;
        }

        let mut links = 0usize;
        for conn in data
            .policies
            .iter()
            .chain(data.goals.iter())
            .flat_map(|d| d.connections.iter())
        {
            let from = net.index_of(&conn.from_id)?;
            let to = net.link_target(&conn.to_id)?;
            if net.find_edge(from, to).is_none() {
                net.push_edge(from, to, conn.weight);
                links += 1;
            }
        }
        net.rank()?;

        self.network = net;
        info!(
            goals = data.goals.len(),
            policies = data.policies.len(),
            links,
            "network created"
        );
        Ok(())
    }

    /// Export goals and policies. With players given, only their goals and
    /// the policies reachable from them.
    pub fn get_network(&self, players: Option<&[NodeId]>) -> EngineResult<NetworkData> {
        let mut goals: BTreeSet<usize> = BTreeSet::new();
        let mut policies: BTreeSet<usize> = BTreeSet::new();

        match players {
            Some(ids) if !ids.is_empty() => {
                for id in ids {
                    let p = self.network.player_index(id)?;
                    if let Some(goal) = self.network.node_at(p).player().and_then(|s| s.goal) {
                        goals.insert(self.network.index_of(&goal)?);
                    }
                    let mut stack = vec![p];
                    let mut seen = BTreeSet::from([p]);
                    while let Some(current) = stack.pop() {
                        for &e in self.network.node_at(current).outgoing_edges() {
                            let Some(edge) = self.network.edge(e) else { continue };
                            if seen.insert(edge.to) {
                                if self.network.node_at(edge.to).kind == NodeKind::Policy {
                                    policies.insert(edge.to);
                                }
                                stack.push(edge.to);
                            }
                        }
                    }
                }
            }
            _ => {
                for (idx, node) in self.network.nodes().enumerate() {
                    match node.kind {
                        NodeKind::Goal => {
                            goals.insert(idx);
                        }
                        NodeKind::Policy => {
                            policies.insert(idx);
                        }
                        NodeKind::Player(_) => {}
                    }
                }
            }
        }

        let export = |set: BTreeSet<usize>| {
            let mut rows: Vec<_> = set.into_iter().map(|i| self.network.node_data(i)).collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
            rows
        };
        Ok(NetworkData {
            goals: export(goals),
            policies: export(policies),
        })
    }

    /// Drop every node and edge (players included) and start a fresh audit.
    pub fn clear_network(&mut self) {
        self.network.clear();
        self.conservation.reset_circuit_breaker();
        self.tick = 0;
        info!("network cleared");
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new(GameConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    fn game() -> Game {
        Game::new(GameConfig {
            seed: 7,
            ..GameConfig::default()
        })
    }

    #[test]
    fn create_player_gets_defaults() {
        let mut g = game();
        let goal = g.add_goal("Goal 1", 0.0).expect("test: goal");
        for i in 0..7 {
            g.add_policy(&format!("Policy {i}"), 0.0).expect("test: policy");
        }
        let id = g.create_player("Matt").expect("test: player");

        let player = g.get_player(&id).expect("test: get player");
        let state = player.player().expect("test: state");
        assert_eq!(player.balance(), 150_000.0);
        assert_eq!(state.max_outflow, 100.0);
        assert_eq!(state.goal, Some(goal));
        assert_eq!(state.token.len(), 36);

        let funding = g.get_funding(&id).expect("test: funding");
        assert_eq!(funding.len(), 5);
        assert!(funding.iter().all(|f| f.amount == 0.0));
    }

    #[test]
    fn same_seed_same_game() {
        let build = || {
            let mut g = game();
            g.add_goal("Goal", 0.0).expect("test: goal");
            g.add_policy("Policy", 0.0).expect("test: policy");
            g.create_player("Matt").expect("test: player")
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn get_player_rejects_policies() {
        let mut g = game();
        let policy = g.add_policy("Policy", 0.0).expect("test: policy");
        assert!(g.get_node(&policy).is_ok());
        assert!(matches!(g.get_player(&policy), Err(EngineError::PlayerNotFound(_))));
    }

    #[test]
    fn replenish_resets_wallets_to_self() {
        let mut g = game();
        let policy = g.add_policy("Policy", 0.0).expect("test: policy");
        let id = g.create_player("Matt").expect("test: player");
        g.transfer_funds_to_node(&id, &policy, 1000.0).expect("test: transfer");
        assert!(close(g.get_node(&policy).expect("test: policy").wallet.get(&id), 1000.0));

        g.replenish_budgets();
        let player = g.get_player(&id).expect("test: player");
        assert_eq!(player.balance(), 150_000.0);
        assert_eq!(player.wallet.len(), 1);
        assert_eq!(player.wallet.get(&id), 150_000.0);
    }

    #[test]
    fn automatic_budget_cycle() {
        let mut g = Game::new(GameConfig {
            budget_cycle_ticks: 2,
            ..GameConfig::default()
        });
        let policy = g.add_policy("Policy", 0.0).expect("test: policy");
        let id = g.create_player("Matt").expect("test: player");
        g.fund(&id, &policy, 100.0).expect("test: fund");

        g.tick().expect("test: tick 1");
        assert!(close(g.get_player(&id).expect("test: player").balance(), 149_900.0));
        g.tick().expect("test: tick 2");
        assert!(close(g.get_player(&id).expect("test: player").balance(), 149_900.0));
    }

    #[test]
    fn rotate_token_changes_token() {
        let mut g = game();
        let id = g.create_player("Matt").expect("test: player");
        let before = g.get_player(&id).expect("test: player").player().expect("test: state").token.clone();
        let after = g.rotate_token(&id).expect("test: rotate");
        assert_ne!(before, after);
    }

    #[test]
    fn league_table_skips_goalless_players() {
        let mut g = game();
        g.create_player("No goal").expect("test: player");
        assert!(g.league_table().is_empty());
        assert_eq!(g.top_players().len(), 1);
    }

    #[test]
    fn clear_network_empties_everything() {
        let mut g = game();
        g.add_goal("Goal", 0.0).expect("test: goal");
        g.create_player("Matt").expect("test: player");
        g.tick().expect("test: tick");
        g.clear_network();
        assert!(g.network().is_empty());
        assert_eq!(g.current_tick(), 0);
    }
}
