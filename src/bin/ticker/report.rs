// Ticker Run Report Types
// Structured JSON output of one ticker run

use flowgame_engine::{GameConfig, LeagueEntry, NetworkData, TickReport};
use serde::Serialize;

// ─── Run Summary ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub ticks: u64,
    pub players: usize,
    pub total_leaked: f64,
    pub total_injected: f64,
    pub total_burned: f64,
    pub max_conservation_error: f64,
    pub unbalanced_ticks: usize,
    pub final_total: f64,
}

impl Summary {
    pub fn from_ticks(ticks: &[TickReport], players: usize) -> Self {
        Self {
            ticks: ticks.len() as u64,
            players,
            total_leaked: ticks.iter().map(|t| t.leaked).sum(),
            total_injected: ticks.iter().map(|t| t.injected).sum(),
            total_burned: ticks.iter().map(|t| t.burned).sum(),
            max_conservation_error: ticks
                .iter()
                .map(|t| t.conservation_error)
                .fold(0.0_f64, f64::max),
            unbalanced_ticks: ticks.iter().filter(|t| !t.balanced).count(),
            final_total: ticks.last().map_or(0.0, |t| t.closing_total),
        }
    }
}

// ─── Top-Level Report ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct TickerReport {
    pub timestamp: String,
    pub version: &'static str,
    pub prng: &'static str,
    pub config: GameConfig,
    pub summary: Summary,
    pub league_table: Vec<LeagueEntry>,
    pub network: NetworkData,
    pub ticks: Vec<TickReport>,
}
