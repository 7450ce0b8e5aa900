// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Flowgame Engine - Error Types

use crate::conservation::ConservationError;
use crate::types::NodeId;
use crate::wallet::WalletError;

/// Errors raised by graph, tick and trade operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("insufficient funds: needed {needed}, available {available}")]
    InsufficientFunds { needed: f64, available: f64 },

    #[error("pledges of {requested} exceed max outflow {max_outflow}")]
    ExceededOutflowBudget { requested: f64, max_outflow: f64 },

    #[error("pledge rate must not be negative (got {0})")]
    NegativePledge(f64),

    #[error("player {player} already owns policy {policy}")]
    DuplicateOwnership { player: NodeId, policy: NodeId },

    #[error("offer checksum mismatch")]
    ChecksumMismatch,

    #[error("player {player} does not own policy {policy}")]
    PolicyNotOwned { player: NodeId, policy: NodeId },

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("player not found: {0}")]
    PlayerNotFound(NodeId),

    #[error("node {id} is a {actual}, expected a {expected}")]
    WrongNodeKind {
        id: NodeId,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("graph contains a cycle through {0} node(s); rank is undefined")]
    CyclicGraph(usize),

    #[error("duplicate node id: {0}")]
    DuplicateNode(NodeId),

    #[error(transparent)]
    Wallet(WalletError),

    #[error(transparent)]
    Conservation(#[from] ConservationError),

    #[error("config error: {0}")]
    Config(String),
}

// Wallet overdraws surface as the engine's own funds error.
impl From<WalletError> for EngineError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::InsufficientFunds { requested, available } => {
                EngineError::InsufficientFunds { needed: requested, available }
            }
            other => EngineError::Wallet(other),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
