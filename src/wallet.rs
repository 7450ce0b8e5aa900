// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Flowgame Engine - Provenance Ledger

//! Provenance-tracked balance.
//!
//! A [`Wallet`] maps each contributor (the player who originally put the
//! funds into play) to the amount of that contributor's funds held at one
//! location. Every operation that moves or destroys funds does so
//! proportionally across contributors, so shares survive decay and transfer.
//!
//! Invariant: `total == Σ entries` (up to float rounding), and no entry is
//! at or below [`WALLET_EPSILON`].

use std::collections::BTreeMap;

use crate::types::NodeId;

/// Entries at or below this amount are pruned.
pub const WALLET_EPSILON: f64 = 1e-9;

/// Tolerance used by wallet equality.
const EQ_TOLERANCE: f64 = 1e-6;

const HEADER_LEN: usize = 4;
const RECORD_LEN: usize = 16 + 4;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WalletError {
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: f64, available: f64 },

    #[error("invalid amount: {0}")]
    InvalidAmount(f64),

    #[error("malformed wallet encoding ({0} bytes)")]
    Malformed(usize),
}

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

/// Only the binary codec persists a wallet; decoding rebuilds `total` from
/// the records.
#[derive(Debug, Clone, Default)]
pub struct Wallet {
    entries: BTreeMap<NodeId, f64>,
    total: f64,
}

impl Wallet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wallet holding `amount` owned entirely by `owner`.
    pub fn single(owner: NodeId, amount: f64) -> Self {
        let mut w = Self::new();
        w.add(owner, amount);
        w
    }

    /// Build a wallet from `(owner, amount)` pairs; repeated owners are summed.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (NodeId, f64)>,
    {
        let mut w = Self::new();
        for (owner, amount) in entries {
            w.add(owner, amount);
        }
        w
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Amount held for `owner`, zero if absent.
    pub fn get(&self, owner: &NodeId) -> f64 {
        self.entries.get(owner).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &f64)> {
        self.entries.iter()
    }

    pub fn to_map(&self) -> BTreeMap<NodeId, f64> {
        self.entries.clone()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total = 0.0;
    }

    /// Set or increment `owner`'s entry. A result at or below epsilon
    /// removes the entry, so a negative amount can clear a contribution.
    pub fn add(&mut self, owner: NodeId, amount: f64) {
        if !amount.is_finite() {
            return;
        }
        let previous = self.get(&owner);
        let updated = previous + amount;
        if updated <= WALLET_EPSILON {
            if self.entries.remove(&owner).is_some() {
                self.total -= previous;
            }
        } else {
            self.entries.insert(owner, updated);
            self.total += amount;
        }
        if self.entries.is_empty() {
            self.total = 0.0;
        }
    }

    /// Decay every entry by `factor` (clamped to `0..=1`). Returns the amount
    /// destroyed.
    pub fn leak(&mut self, factor: f64) -> f64 {
        let factor = if factor.is_nan() { 0.0 } else { factor.clamp(0.0, 1.0) };
        if factor == 0.0 || self.is_empty() {
            return 0.0;
        }
        let before = self.total;
        self.scale_entries(1.0 - factor);
        before - self.total
    }

    /// Move `amount` into `dest`, withdrawing from each contributor in
    /// proportion to their share. Fails without touching either wallet when
    /// `amount` exceeds the balance.
    pub fn transfer(&mut self, dest: &mut Wallet, amount: f64) -> Result<f64, WalletError> {
        if !amount.is_finite() {
            return Err(WalletError::InvalidAmount(amount));
        }
        if amount > self.total + WALLET_EPSILON {
            return Err(WalletError::InsufficientFunds {
                requested: amount,
                available: self.total,
            });
        }
        if amount <= 0.0 || self.is_empty() {
            return Ok(0.0);
        }

        // Full drain: hand every entry over verbatim so the source ends at zero.
        if amount >= self.total {
            let moved = self.total;
            for (owner, value) in std::mem::take(&mut self.entries) {
                dest.add(owner, value);
            }
            self.total = 0.0;
            return Ok(moved);
        }

        let ratio = amount / self.total;
        for (owner, value) in self.entries.iter_mut() {
            let part = *value * ratio;
            *value -= part;
            dest.add(*owner, part);
        }
        self.prune();
        Ok(amount)
    }

    /// Sum `other` into this wallet, contributor by contributor.
    pub fn merge(&mut self, other: &Wallet) {
        for (owner, amount) in other.iter() {
            self.add(*owner, *amount);
        }
    }

    /// Union of both wallets, summed per contributor.
    pub fn merged(&self, other: &Wallet) -> Wallet {
        let mut out = self.clone();
        out.merge(other);
        out
    }

    /// Scale every entry uniformly.
    pub fn multiply(&mut self, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            self.clear();
            return;
        }
        self.scale_entries(factor);
    }

    /// Flat increase spread across existing contributors by share. An empty
    /// wallet has nobody to attribute funds to and is left unchanged.
    pub fn credit(&mut self, amount: f64) -> f64 {
        if amount <= 0.0 || self.total <= 0.0 || !amount.is_finite() {
            return 0.0;
        }
        let before = self.total;
        self.scale_entries((self.total + amount) / self.total);
        self.total - before
    }

    /// Flat decrease spread across existing contributors by share, floored at
    /// zero. Returns the amount removed.
    pub fn debit(&mut self, amount: f64) -> f64 {
        if amount <= 0.0 || self.is_empty() || amount.is_nan() {
            return 0.0;
        }
        if amount >= self.total {
            let removed = self.total;
            self.clear();
            return removed;
        }
        let before = self.total;
        self.scale_entries((self.total - amount) / self.total);
        before - self.total
    }

    /// Binary form: `[f32 total][N x (16-byte id, f32 amount)]`, little-endian.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + RECORD_LEN * self.len());
        out.extend_from_slice(&(self.total as f32).to_le_bytes());
        for (owner, amount) in &self.entries {
            out.extend_from_slice(owner.as_bytes());
            out.extend_from_slice(&(*amount as f32).to_le_bytes());
        }
        out
    }

    /// Decode the binary form. The stored total is ignored and recomputed
    /// from the records.
    pub fn from_bytes(data: &[u8]) -> Result<Wallet, WalletError> {
        if data.len() < HEADER_LEN || (data.len() - HEADER_LEN) % RECORD_LEN != 0 {
            return Err(WalletError::Malformed(data.len()));
        }
        let mut wallet = Wallet::new();
        for record in data[HEADER_LEN..].chunks_exact(RECORD_LEN) {
            let mut id = [0u8; 16];
            id.copy_from_slice(&record[..16]);
            let amount = f32::from_le_bytes([record[16], record[17], record[18], record[19]]);
            if !amount.is_finite() {
                return Err(WalletError::Malformed(data.len()));
            }
            wallet.add(NodeId::from_bytes(id), f64::from(amount));
        }
        Ok(wallet)
    }

    /// Total as written in the header of an encoded wallet.
    pub fn header_total(data: &[u8]) -> Result<f32, WalletError> {
        match data.get(..HEADER_LEN) {
            Some(hdr) => Ok(f32::from_le_bytes([hdr[0], hdr[1], hdr[2], hdr[3]])),
            None => Err(WalletError::Malformed(data.len())),
        }
    }

    fn scale_entries(&mut self, factor: f64) {
        self.entries.values_mut().for_each(|v| *v *= factor);
        self.prune();
    }

    /// Drop dust entries and recompute the total from scratch.
    fn prune(&mut self) {
        self.entries.retain(|_, v| *v > WALLET_EPSILON);
        self.total = self.entries.values().sum();
    }
}

impl PartialEq for Wallet {
    fn eq(&self, other: &Self) -> bool {
        (self.total - other.total).abs() <= EQ_TOLERANCE
            && self.entries.len() == other.entries.len()
            && self.entries.iter().all(|(owner, amount)| {
                other
                    .entries
                    .get(owner)
                    .is_some_and(|theirs| (amount - theirs).abs() <= EQ_TOLERANCE)
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(n: u8) -> NodeId {
        NodeId::from_bytes([n; 16])
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    fn sum_of(w: &Wallet) -> f64 {
        w.iter().map(|(_, v)| *v).sum()
    }

    #[test]
    fn empty_wallet() {
        let w = Wallet::new();
        assert_eq!(w.len(), 0);
        assert!(w.total().abs() < f64::EPSILON);
    }

    #[test]
    fn add_accumulates_per_contributor() {
        let mut w = Wallet::new();
        w.add(id(1), 23.3);
        w.add(id(2), 10.0);
        assert_eq!(w.len(), 2);
        assert!(close(w.total(), 33.3));

        w.add(id(1), 6.7);
        assert_eq!(w.len(), 2);
        assert!(close(w.get(&id(1)), 30.0));
        assert!(close(w.total(), 40.0));
    }

    #[test]
    fn add_net_zero_clears_entry() {
        let mut w = Wallet::from_entries([(id(1), 5.0), (id(2), 1.0)]);
        w.add(id(1), -5.0);
        assert_eq!(w.len(), 1);
        assert!(close(w.total(), 1.0));

        w.add(id(2), -3.0);
        assert!(w.is_empty());
        assert!(w.total().abs() < f64::EPSILON);
    }

    #[test]
    fn leak_preserves_shares() {
        let mut w = Wallet::from_entries([(id(1), 100.0), (id(2), 200.0)]);
        let leaked = w.leak(0.1);
        assert!(close(w.get(&id(1)), 90.0));
        assert!(close(w.get(&id(2)), 180.0));
        assert!(close(w.total(), 270.0));
        assert!(close(leaked, 30.0));
    }

    #[test]
    fn leak_full_and_none() {
        let mut w = Wallet::from_entries([(id(1), 5.0), (id(2), 10.0)]);
        w.leak(0.0);
        assert!(close(w.total(), 15.0));
        w.leak(1.0);
        assert!(w.is_empty());
        assert!(w.total().abs() < f64::EPSILON);
    }

    #[test]
    fn transfer_single_to_empty() {
        let mut w1 = Wallet::single(id(1), 10.0);
        let mut w2 = Wallet::new();
        w1.transfer(&mut w2, 4.0).expect("test: transfer");
        assert!(close(w1.total(), 6.0));
        assert!(close(w2.total(), 4.0));
        assert_eq!(w2.len(), 1);
    }

    #[test]
    fn transfer_multiple_to_non_empty() {
        let mut w1 = Wallet::from_entries([(id(1), 10.0), (id(2), 8.0), (id(3), 6.0)]);
        let mut w2 = Wallet::single(id(1), 20.0);
        w1.transfer(&mut w2, 6.0).expect("test: transfer");

        assert_eq!(
            w1,
            Wallet::from_entries([(id(1), 7.5), (id(2), 6.0), (id(3), 4.5)])
        );
        assert_eq!(
            w2,
            Wallet::from_entries([(id(1), 22.5), (id(2), 2.0), (id(3), 1.5)])
        );
    }

    #[test]
    fn transfer_too_much_leaves_both_untouched() {
        let mut w1 = Wallet::single(id(1), 10.0);
        let mut w2 = Wallet::single(id(2), 3.0);
        let err = w1.transfer(&mut w2, 10.5);
        assert!(
            matches!(err, Err(WalletError::InsufficientFunds { .. })),
            "expected InsufficientFunds, got {err:?}"
        );
        assert_eq!(w1, Wallet::single(id(1), 10.0));
        assert_eq!(w2, Wallet::single(id(2), 3.0));
    }

    #[test]
    fn transfer_total_empties_source() {
        let mut w1 = Wallet::from_entries([(id(1), 1.0 / 3.0), (id(2), 2.0 / 7.0)]);
        let mut w2 = Wallet::new();
        let total = w1.total();
        w1.transfer(&mut w2, total).expect("test: full transfer");
        assert!(w1.is_empty());
        assert_eq!(w1.total(), 0.0);
        assert!(close(w2.total(), total));
    }

    #[test]
    fn merge_sums_per_key() {
        let a = Wallet::from_entries([(id(1), 1.0), (id(2), 2.0)]);
        let b = Wallet::from_entries([(id(2), 3.0), (id(3), 4.0)]);
        let m = a.merged(&b);
        assert_eq!(m, Wallet::from_entries([(id(1), 1.0), (id(2), 5.0), (id(3), 4.0)]));
        assert!(close(m.total(), b.merged(&a).total()));
    }

    #[test]
    fn scalar_ops_redistribute_by_share() {
        let mut w = Wallet::from_entries([(id(1), 10.0), (id(2), 30.0)]);
        w.multiply(0.5);
        assert!(close(w.get(&id(1)), 5.0));
        assert!(close(w.total(), 20.0));

        w.credit(20.0);
        assert!(close(w.get(&id(1)), 10.0));
        assert!(close(w.get(&id(2)), 30.0));

        let removed = w.debit(4.0);
        assert!(close(removed, 4.0));
        assert!(close(w.get(&id(1)), 9.0));
        assert!(close(w.get(&id(2)), 27.0));

        let removed = w.debit(100.0);
        assert!(close(removed, 36.0));
        assert!(w.is_empty());
    }

    #[test]
    fn credit_on_empty_wallet_is_noop() {
        let mut w = Wallet::new();
        assert_eq!(w.credit(5.0), 0.0);
        assert!(w.is_empty());
    }

    #[test]
    fn bytes_round_trip() {
        let w1 = Wallet::from_entries([(id(1), 10.0), (id(2), 20.0), (id(3), 30.0)]);
        let bytes = w1.to_bytes();
        assert_eq!(bytes.len(), 64);
        assert!((Wallet::header_total(&bytes).expect("test: header") - 60.0).abs() < 1e-4);

        let w2 = Wallet::from_bytes(&bytes).expect("test: decode");
        assert_eq!(w1, w2);
    }

    #[test]
    fn decode_recomputes_total() {
        let mut bytes = Wallet::from_entries([(id(1), 2.0), (id(2), 3.0)]).to_bytes();
        bytes[..4].copy_from_slice(&999.0f32.to_le_bytes());
        let w = Wallet::from_bytes(&bytes).expect("test: decode");
        assert!(close(w.total(), 5.0));
    }

    #[test]
    fn decode_rejects_truncated_input() {
        let bytes = Wallet::single(id(1), 2.0).to_bytes();
        let err = Wallet::from_bytes(&bytes[..bytes.len() - 3]);
        assert_eq!(err, Err(WalletError::Malformed(21)));
        assert!(Wallet::from_bytes(&[]).is_err());
    }

    fn wallet_strategy() -> impl Strategy<Value = Wallet> {
        prop::collection::vec((0u8..8, 0.0f64..1000.0), 0..8)
            .prop_map(|pairs| Wallet::from_entries(pairs.into_iter().map(|(k, v)| (id(k), v))))
    }

    proptest! {
        #[test]
        fn total_tracks_entries_after_any_op(
            mut a in wallet_strategy(),
            mut b in wallet_strategy(),
            factor in 0.0f64..1.0,
            share in 0.0f64..1.0,
        ) {
            a.leak(factor);
            prop_assert!((a.total() - sum_of(&a)).abs() < 1e-6);

            let amount = a.total() * share;
            a.transfer(&mut b, amount).expect("test: in-budget transfer");
            prop_assert!((a.total() - sum_of(&a)).abs() < 1e-6);
            prop_assert!((b.total() - sum_of(&b)).abs() < 1e-6);

            let m = a.merged(&b);
            prop_assert!((m.total() - sum_of(&m)).abs() < 1e-6);
            prop_assert!(m.iter().all(|(_, v)| *v > WALLET_EPSILON));
        }

        #[test]
        fn transfer_conserves_funds(
            mut a in wallet_strategy(),
            mut b in wallet_strategy(),
            share in 0.0f64..1.0,
        ) {
            let before = a.total() + b.total();
            let amount = a.total() * share;
            a.transfer(&mut b, amount).expect("test: in-budget transfer");
            prop_assert!((a.total() + b.total() - before).abs() < 1e-6);
        }

        #[test]
        fn merge_is_commutative_and_associative(
            a in wallet_strategy(),
            b in wallet_strategy(),
            c in wallet_strategy(),
        ) {
            prop_assert!((a.merged(&b).total() - b.merged(&a).total()).abs() < 1e-6);
            let left = a.merged(&b).merged(&c);
            let right = a.merged(&b.merged(&c));
            prop_assert_eq!(left, right);
        }
    }
}
