// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Flowgame Engine - Players: Pledges & Policy Trading

//! Player-side operations on the network.
//!
//! A player's pledge map is the set of its outgoing edges: the edge weight is
//! the per-tick rate, and the mere existence of an edge (even at rate 0) is
//! what "owning" a policy means.
//!
//! Ownership changes hands through signed offers. The seller signs
//! `(seller, policy, price)` with its secret token; the buyer's purchase is
//! only honoured if the checksum still verifies against the seller's
//! *current* token, so rotating the token revokes every outstanding offer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::network::Network;
use crate::node::{NodeKind, PlayerState};
use crate::types::{EdgeIndex, FundingEntry, NodeId};
use crate::wallet::{WalletError, WALLET_EPSILON};

// ─── Offer ───────────────────────────────────────────────────────────────────

/// Signed voucher for one policy at one price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub seller_id: NodeId,
    pub policy_id: NodeId,
    pub price: f64,
    pub checksum: String,
}

/// Price as the 4 bytes of a little-endian f32, independent of any textual
/// formatting.
pub fn pack_amount(amount: f64) -> [u8; 4] {
    (amount as f32).to_le_bytes()
}

pub fn unpack_amount(bytes: [u8; 4]) -> f64 {
    f64::from(f32::from_le_bytes(bytes))
}

/// 40-char hex SHA-1 of `seller ∥ policy ∥ hex(pack(price)) ∥ salt`.
pub fn checksum(seller_id: &str, policy_id: &str, price: f64, salt: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(seller_id.as_bytes());
    hasher.update(policy_id.as_bytes());
    hasher.update(hex::encode(pack_amount(price)).as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

// ─── Pledges & Trades ────────────────────────────────────────────────────────

impl Network {
    /// Arena index of a player; any other node kind counts as not found.
    pub fn player_index(&self, id: &NodeId) -> EngineResult<usize> {
        match self.index_of(id) {
            Ok(idx) if self.node_at(idx).is_player() => Ok(idx),
            _ => Err(EngineError::PlayerNotFound(*id)),
        }
    }

    pub fn player_state(&self, id: &NodeId) -> EngineResult<&PlayerState> {
        let idx = self.player_index(id)?;
        self.node_at(idx)
            .player()
            .ok_or(EngineError::PlayerNotFound(*id))
    }

    pub fn player_state_mut(&mut self, id: &NodeId) -> EngineResult<&mut PlayerState> {
        let idx = self.player_index(id)?;
        self.node_at_mut(idx)
            .player_mut()
            .ok_or(EngineError::PlayerNotFound(*id))
    }

    /// Σ of the player's pledge rates.
    pub fn total_funding(&self, player: usize) -> f64 {
        self.node_at(player)
            .outgoing_edges()
            .iter()
            .filter_map(|&e| self.edge(e))
            .map(|e| e.weight)
            .sum()
    }

    /// Pledge map: target id → rate, placeholders included.
    pub fn pledges(&self, player: &NodeId) -> EngineResult<BTreeMap<NodeId, f64>> {
        let p = self.player_index(player)?;
        Ok(self
            .node_at(p)
            .outgoing_edges()
            .iter()
            .filter_map(|&e| self.edge(e))
            .map(|e| (self.node_at(e.to).id, e.weight))
            .collect())
    }

    pub fn funding(&self, player: &NodeId) -> EngineResult<Vec<FundingEntry>> {
        Ok(self
            .pledges(player)?
            .into_iter()
            .map(|(to_id, amount)| FundingEntry {
                from_id: *player,
                to_id,
                amount,
            })
            .collect())
    }

    /// Whether `player` holds a pledge edge (any rate) to `target`.
    pub fn owns(&self, player: &NodeId, target: &NodeId) -> bool {
        self.edge_between(player, target).is_some()
    }

    /// Create or update one pledge, keeping the player's total within
    /// `max_outflow`.
    pub fn fund(&mut self, player: &NodeId, target: &NodeId, rate: f64) -> EngineResult<EdgeIndex> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(EngineError::NegativePledge(rate));
        }
        let p = self.player_index(player)?;
        let t = self.link_target(target)?;
        let max_outflow = self.player_state(player)?.max_outflow;

        let existing = self.find_edge(p, t);
        let current = existing.and_then(|e| self.edge(e)).map_or(0.0, |e| e.weight);
        let requested = self.total_funding(p) - current + rate;
        if requested > max_outflow + WALLET_EPSILON {
            return Err(EngineError::ExceededOutflowBudget { requested, max_outflow });
        }

        match existing {
            Some(e) => {
                self.set_edge_weight(e, rate);
                Ok(e)
            }
            None => self.add_edge(player, target, rate),
        }
    }

    /// Re-weight the player's existing pledges. Pledges not mentioned drop
    /// to zero and stay as placeholders. Only policies the player already
    /// owns can be funded this way; ownership comes from creation or
    /// [`buy_policy`](Self::buy_policy). Nothing is changed unless every
    /// entry is valid.
    pub fn set_funding(&mut self, player: &NodeId, funding: &[(NodeId, f64)]) -> EngineResult<()> {
        let p = self.player_index(player)?;
        let max_outflow = self.player_state(player)?.max_outflow;

        let mut wanted: BTreeMap<EdgeIndex, f64> = BTreeMap::new();
        for (target, rate) in funding {
            if !rate.is_finite() || *rate < 0.0 {
                return Err(EngineError::NegativePledge(*rate));
            }
            let t = self.link_target(target)?;
            let e = self.find_edge(p, t).ok_or(EngineError::PolicyNotOwned {
                player: *player,
                policy: *target,
            })?;
            *wanted.entry(e).or_insert(0.0) += rate;
        }
        let requested: f64 = wanted.values().sum();
        if requested > max_outflow + WALLET_EPSILON {
            return Err(EngineError::ExceededOutflowBudget { requested, max_outflow });
        }

        let existing: Vec<EdgeIndex> = self.node_at(p).outgoing_edges().to_vec();
        for e in existing {
            let rate = wanted.get(&e).copied().unwrap_or(0.0);
            self.set_edge_weight(e, rate);
        }
        Ok(())
    }

    /// Sign an offer to sell `policy`. The seller must own it.
    pub fn offer_policy(&self, seller: &NodeId, policy: &NodeId, price: f64) -> EngineResult<Offer> {
        let state = self.player_state(seller)?;
        let target = self.node(policy)?;
        if target.kind != NodeKind::Policy {
            return Err(EngineError::WrongNodeKind {
                id: *policy,
                expected: "policy",
                actual: target.kind.label(),
            });
        }
        if !price.is_finite() || price < 0.0 {
            return Err(WalletError::InvalidAmount(price).into());
        }
        if !self.owns(seller, policy) {
            return Err(EngineError::PolicyNotOwned {
                player: *seller,
                policy: *policy,
            });
        }

        Ok(Offer {
            seller_id: *seller,
            policy_id: *policy,
            price,
            checksum: checksum(&seller.to_string(), &policy.to_string(), price, &state.token),
        })
    }

    /// Redeem an offer: verify it against the seller's current token, move
    /// the price from buyer to seller and give the buyer a zero-rate pledge.
    pub fn buy_policy(&mut self, buyer: &NodeId, offer: &Offer) -> EngineResult<()> {
        let b = self.player_index(buyer)?;
        let seller_token = self.player_state(&offer.seller_id)?.token.clone();
        self.node(&offer.policy_id)?;

        let expected = checksum(
            &offer.seller_id.to_string(),
            &offer.policy_id.to_string(),
            offer.price,
            &seller_token,
        );
        if expected != offer.checksum {
            return Err(EngineError::ChecksumMismatch);
        }
        if self.owns(buyer, &offer.policy_id) {
            return Err(EngineError::DuplicateOwnership {
                player: *buyer,
                policy: offer.policy_id,
            });
        }
        if !offer.price.is_finite() || offer.price < 0.0 {
            return Err(WalletError::InvalidAmount(offer.price).into());
        }
        let available = self.node_at(b).balance();
        if available < offer.price {
            return Err(EngineError::InsufficientFunds {
                needed: offer.price,
                available,
            });
        }

        // ownership first: the only step that can still fail
        self.add_edge(buyer, &offer.policy_id, 0.0)?;

        self.node_at_mut(b).wallet.debit(offer.price);
        let seller = self.node_mut(&offer.seller_id)?;
        let seller_id = seller.id;
        seller.wallet.add(seller_id, offer.price);

        info!(
            buyer = %buyer,
            seller = %offer.seller_id,
            policy = %offer.policy_id,
            price = offer.price,
            "policy sold"
        );
        Ok(())
    }

    /// Replace a player's signing token, revoking its outstanding offers.
    pub fn rotate_token(&mut self, player: &NodeId, token: String) -> EngineResult<()> {
        self.player_state_mut(player)?.token = token;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    fn id(n: u8) -> NodeId {
        NodeId::from_bytes([n; 16])
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    /// Two players with 150000 each and one unowned policy.
    fn market() -> (Network, NodeId, NodeId, NodeId) {
        let mut net = Network::new();
        for (n, name) in [(1u8, "Matt"), (2u8, "Simon")] {
            let mut p = Node::new_player(id(n), name, format!("token-{n}"));
            p.set_balance(150_000.0);
            if let Some(state) = p.player_mut() {
                state.max_outflow = 100.0;
            }
            net.add_node(p).expect("test: player");
        }
        net.add_node(Node::new_policy(id(10), "Policy 1", 0.0))
            .expect("test: policy");
        (net, id(1), id(2), id(10))
    }

    #[test]
    fn pack_amount_round_trips() {
        assert!((unpack_amount(pack_amount(1.4567)) - 1.4567).abs() < 1e-3);
    }

    #[test]
    fn checksum_is_stable_and_price_sensitive() {
        let c1 = checksum("1", "2", 3.14, "salt");
        assert_eq!(c1.len(), 40);
        assert_eq!(c1, checksum("1", "2", 3.14, "salt"));
        assert_ne!(c1, checksum("1", "2", 3.15, "salt"));
        assert_ne!(c1, checksum("1", "2", 3.14, "pepper"));
    }

    #[test]
    fn fund_respects_max_outflow() {
        let (mut net, matt, _, policy) = market();
        net.fund(&matt, &policy, 60.0).expect("test: fund");
        net.fund(&matt, &policy, 100.0).expect("test: raise to cap");

        let goal = id(11);
        net.add_node(Node::new_goal(goal, "Goal", 0.0)).expect("test: goal");
        let err = net.fund(&matt, &goal, 1.0);
        assert!(
            matches!(err, Err(EngineError::ExceededOutflowBudget { .. })),
            "expected budget error, got {err:?}"
        );
        assert!(!net.owns(&matt, &goal));
        assert!(matches!(
            net.fund(&matt, &policy, -1.0),
            Err(EngineError::NegativePledge(_))
        ));
    }

    #[test]
    fn set_funding_zeroes_unmentioned_pledges() {
        let (mut net, matt, _, policy) = market();
        let goal = id(11);
        net.add_node(Node::new_goal(goal, "Goal", 0.0)).expect("test: goal");
        net.fund(&matt, &policy, 30.0).expect("test: fund");
        net.fund(&matt, &goal, 0.0).expect("test: placeholder");

        net.set_funding(&matt, &[(goal, 40.0)]).expect("test: set funding");
        let pledges = net.pledges(&matt).expect("test: pledges");
        assert_eq!(pledges.len(), 2);
        assert!(close(pledges[&policy], 0.0));
        assert!(close(pledges[&goal], 40.0));

        let err = net.set_funding(&matt, &[(goal, 60.0), (policy, 60.0)]);
        assert!(matches!(err, Err(EngineError::ExceededOutflowBudget { .. })));
        assert!(close(net.pledges(&matt).expect("test: pledges")[&goal], 40.0));
    }

    #[test]
    fn set_funding_cannot_take_an_unowned_policy() {
        let (mut net, seller, buyer, policy) = market();
        net.fund(&seller, &policy, 0.0).expect("test: seller owns");

        let err = net.set_funding(&buyer, &[(policy, 0.0)]);
        assert!(
            matches!(err, Err(EngineError::PolicyNotOwned { .. })),
            "expected PolicyNotOwned, got {err:?}"
        );
        assert!(!net.owns(&buyer, &policy));
        assert!(net.offer_policy(&buyer, &policy, 10.0).is_err());

        let offer = net.offer_policy(&seller, &policy, 5_000.0).expect("test: offer");
        net.buy_policy(&buyer, &offer).expect("test: buy");
        net.set_funding(&buyer, &[(policy, 25.0)]).expect("test: set funding");
        assert!(close(net.pledges(&buyer).expect("test: pledges")[&policy], 25.0));
    }

    #[test]
    fn offer_needs_a_valid_price() {
        let (mut net, seller, _, policy) = market();
        net.fund(&seller, &policy, 0.0).expect("test: seller owns");
        for price in [-1.0, f64::NAN, f64::INFINITY] {
            let err = net.offer_policy(&seller, &policy, price);
            assert!(
                matches!(err, Err(EngineError::Wallet(WalletError::InvalidAmount(_)))),
                "expected InvalidAmount, got {err:?}"
            );
        }
    }

    #[test]
    fn offer_requires_ownership() {
        let (net, matt, _, policy) = market();
        let err = net.offer_policy(&matt, &policy, 20_000.0);
        assert!(
            matches!(err, Err(EngineError::PolicyNotOwned { .. })),
            "expected PolicyNotOwned, got {err:?}"
        );
    }

    #[test]
    fn buy_succeeds_exactly_once() {
        let (mut net, seller, buyer, policy) = market();
        net.fund(&seller, &policy, 0.0).expect("test: seller owns");

        let offer = net.offer_policy(&seller, &policy, 20_000.0).expect("test: offer");
        assert_eq!(offer.checksum.len(), 40);
        net.buy_policy(&buyer, &offer).expect("test: buy");

        assert!(net.owns(&buyer, &policy));
        assert!(net.owns(&seller, &policy));
        assert!(close(net.node(&seller).expect("test: seller").balance(), 170_000.0));
        assert!(close(net.node(&buyer).expect("test: buyer").balance(), 130_000.0));

        let again = net.buy_policy(&buyer, &offer);
        assert!(matches!(again, Err(EngineError::DuplicateOwnership { .. })));
        assert!(close(net.node(&buyer).expect("test: buyer").balance(), 130_000.0));
    }

    #[test]
    fn tampered_or_revoked_offer_is_rejected() {
        let (mut net, seller, buyer, policy) = market();
        net.fund(&seller, &policy, 0.0).expect("test: seller owns");
        let offer = net.offer_policy(&seller, &policy, 20_000.0).expect("test: offer");

        let cheaper = Offer { price: 1.0, ..offer.clone() };
        assert!(matches!(net.buy_policy(&buyer, &cheaper), Err(EngineError::ChecksumMismatch)));

        let other = id(12);
        net.add_node(Node::new_policy(other, "Policy 2", 0.0)).expect("test: policy");
        let swapped = Offer { policy_id: other, ..offer.clone() };
        assert!(matches!(net.buy_policy(&buyer, &swapped), Err(EngineError::ChecksumMismatch)));

        net.rotate_token(&seller, "fresh".to_string()).expect("test: rotate");
        assert!(matches!(net.buy_policy(&buyer, &offer), Err(EngineError::ChecksumMismatch)));

        assert!(!net.owns(&buyer, &policy));
        assert!(close(net.node(&buyer).expect("test: buyer").balance(), 150_000.0));
        assert!(close(net.node(&seller).expect("test: seller").balance(), 150_000.0));
    }

    #[test]
    fn buyer_without_funds_gets_nothing() {
        let (mut net, seller, buyer, policy) = market();
        net.fund(&seller, &policy, 0.0).expect("test: seller owns");
        let offer = net.offer_policy(&seller, &policy, 200_000.0).expect("test: offer");

        let err = net.buy_policy(&buyer, &offer);
        assert!(matches!(err, Err(EngineError::InsufficientFunds { .. })));
        assert!(!net.owns(&buyer, &policy));
        assert!(close(net.node(&seller).expect("test: seller").balance(), 150_000.0));
    }
}
