// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Flowgame Engine - Provenance-Tracked Fund-Flow Simulation

pub mod types;
pub mod error;
pub mod wallet;
pub mod edge;
pub mod node;
pub mod network;
pub mod player;
pub mod conservation;
pub mod config;
pub mod game;

pub use config::GameConfig;
pub use error::{EngineError, EngineResult};
pub use game::Game;
pub use network::Network;
pub use node::{Node, NodeKind, PlayerState};
pub use player::{checksum, Offer};
pub use types::*;
pub use wallet::{Wallet, WalletError, WALLET_EPSILON};

use wasm_bindgen::prelude::*;

// ─── WASM Interface ──────────────────────────────────────────────────────────

/// Browser handle on a [`Game`]. Ids cross the boundary as hyphenated
/// strings, structured values as plain JS objects.
#[wasm_bindgen]
pub struct WasmGame {
    inner: Game,
}

fn js_err(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn parse_id(id: &str) -> Result<NodeId, JsValue> {
    id.parse().map_err(js_err)
}

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(js_err)
}

#[wasm_bindgen]
impl WasmGame {
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u32) -> Self {
        #[cfg(target_arch = "wasm32")]
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));

        Self {
            inner: Game::new(GameConfig {
                seed: u64::from(seed),
                ..GameConfig::default()
            }),
        }
    }

    /// Build from a JSON config; missing fields take their defaults.
    pub fn with_config(config_json: &str) -> Result<WasmGame, JsValue> {
        #[cfg(target_arch = "wasm32")]
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));

        let config = GameConfig::from_json_str(config_json).map_err(js_err)?;
        Ok(Self { inner: Game::new(config) })
    }

    pub fn tick(&mut self) -> Result<JsValue, JsValue> {
        let report = self.inner.tick().map_err(js_err)?;
        to_js(&report)
    }

    /// Run N ticks without returning reports.
    pub fn run_batch(&mut self, ticks: u32) -> Result<(), JsValue> {
        for _ in 0..ticks {
            self.inner.tick().map_err(js_err)?;
        }
        Ok(())
    }

    pub fn current_tick(&self) -> f64 {
        self.inner.current_tick() as f64
    }

    pub fn replenish_budgets(&mut self) {
        self.inner.replenish_budgets();
    }

    // ── nodes ──

    pub fn add_policy(&mut self, name: &str, leak: f64) -> Result<String, JsValue> {
        self.inner.add_policy(name, leak).map(|id| id.to_string()).map_err(js_err)
    }

    pub fn add_goal(&mut self, name: &str, leak: f64) -> Result<String, JsValue> {
        self.inner.add_goal(name, leak).map(|id| id.to_string()).map_err(js_err)
    }

    pub fn add_link(&mut self, from: &str, to: &str, weight: f64) -> Result<(), JsValue> {
        let (from, to) = (parse_id(from)?, parse_id(to)?);
        self.inner.add_link(&from, &to, weight).map(|_| ()).map_err(js_err)
    }

    /// Returns the new player's view including its token.
    pub fn create_player(&mut self, name: &str) -> Result<JsValue, JsValue> {
        let id = self.inner.create_player(name).map_err(js_err)?;
        let mut data = self.inner.player_data(&id).map_err(js_err)?;
        data.token = self
            .inner
            .get_player(&id)
            .ok()
            .and_then(Node::player)
            .map(|p| p.token.clone());
        to_js(&data)
    }

    pub fn get_player(&self, id: &str) -> Result<JsValue, JsValue> {
        let data = self.inner.player_data(&parse_id(id)?).map_err(js_err)?;
        to_js(&data)
    }

    pub fn get_players(&self) -> Result<JsValue, JsValue> {
        let players: Vec<PlayerData> = self
            .inner
            .players()
            .iter()
            .filter_map(|p| self.inner.player_data(&p.id).ok())
            .collect();
        to_js(&players)
    }

    pub fn get_node(&self, id: &str) -> Result<JsValue, JsValue> {
        let id = parse_id(id)?;
        let idx = self.inner.network().index_of(&id).map_err(js_err)?;
        to_js(&self.inner.network().node_data(idx))
    }

    pub fn set_balance(&mut self, id: &str, amount: f64) -> Result<(), JsValue> {
        self.inner.set_balance(&parse_id(id)?, amount).map_err(js_err)
    }

    pub fn wallet_holdings(&self, id: &str) -> Result<JsValue, JsValue> {
        let holdings = self.inner.wallet_holdings(&parse_id(id)?).map_err(js_err)?;
        to_js(&holdings)
    }

    // ── funding ──

    pub fn fund(&mut self, player: &str, target: &str, rate: f64) -> Result<(), JsValue> {
        let (player, target) = (parse_id(player)?, parse_id(target)?);
        self.inner.fund(&player, &target, rate).map(|_| ()).map_err(js_err)
    }

    /// `funding` is a list of `{from_id, to_id, amount}`.
    pub fn set_funding(&mut self, player: &str, funding: JsValue) -> Result<(), JsValue> {
        let funding: Vec<FundingEntry> = serde_wasm_bindgen::from_value(funding).map_err(js_err)?;
        self.inner.set_funding(&parse_id(player)?, &funding).map_err(js_err)
    }

    pub fn get_funding(&self, player: &str) -> Result<JsValue, JsValue> {
        let funding = self.inner.get_funding(&parse_id(player)?).map_err(js_err)?;
        to_js(&funding)
    }

    pub fn transfer_funds_to_node(&mut self, player: &str, node: &str, amount: f64) -> Result<f64, JsValue> {
        let (player, node) = (parse_id(player)?, parse_id(node)?);
        self.inner.transfer_funds_to_node(&player, &node, amount).map_err(js_err)
    }

    // ── trading ──

    pub fn offer_policy(&self, seller: &str, policy: &str, price: f64) -> Result<JsValue, JsValue> {
        let (seller, policy) = (parse_id(seller)?, parse_id(policy)?);
        let offer = self.inner.offer_policy(&seller, &policy, price).map_err(js_err)?;
        to_js(&offer)
    }

    pub fn buy_policy(&mut self, buyer: &str, offer: JsValue) -> Result<(), JsValue> {
        let offer: Offer = serde_wasm_bindgen::from_value(offer).map_err(js_err)?;
        self.inner.buy_policy(&parse_id(buyer)?, &offer).map_err(js_err)
    }

    pub fn rotate_token(&mut self, player: &str) -> Result<String, JsValue> {
        self.inner.rotate_token(&parse_id(player)?).map_err(js_err)
    }

    // ── scoring & network ──

    pub fn league_table(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.league_table())
    }

    pub fn create_network(&mut self, data: JsValue) -> Result<(), JsValue> {
        let data: NetworkData = serde_wasm_bindgen::from_value(data).map_err(js_err)?;
        self.inner.create_network(&data).map_err(js_err)
    }

    pub fn get_network(&self) -> Result<JsValue, JsValue> {
        let data = self.inner.get_network(None).map_err(js_err)?;
        to_js(&data)
    }

    pub fn clear_network(&mut self) {
        self.inner.clear_network();
    }

    /// Reset to an empty game with the same config.
    pub fn reset(&mut self) {
        self.inner = Game::new(self.inner.config().clone());
    }
}
