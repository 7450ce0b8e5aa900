// Built-in demo network used when no --network file is given

use flowgame_engine::{EngineResult, Game};

// ─── Layout ─────────────────────────────────────────────────────────────────

/// (name, leak, capacity, activation)
const POLICIES: &[(&str, f64, f64, f64)] = &[
    ("Free School Meals", 0.02, 0.0, 0.0),
    ("Adult Skills", 0.05, 5000.0, 0.0),
    ("Rural Broadband", 0.03, 0.0, 0.1),
    ("Bus Subsidy", 0.04, 2000.0, 0.0),
    ("Clean Energy Grants", 0.01, 0.0, 0.2),
    ("Flood Defences", 0.02, 8000.0, 0.0),
];

const GOALS: &[(&str, f64)] = &[
    ("Educated Population", 0.01),
    ("Connected Communities", 0.01),
    ("Net Zero", 0.005),
];

/// (policy index, policy index, weight)
const POLICY_LINKS: &[(usize, usize, f64)] = &[(1, 0, 10.0), (2, 3, 5.0), (4, 5, 8.0)];

/// (policy index, goal index, weight)
const GOAL_LINKS: &[(usize, usize, f64)] = &[
    (0, 0, 20.0),
    (1, 0, 15.0),
    (2, 1, 20.0),
    (3, 1, 10.0),
    (3, 2, 5.0),
    (4, 2, 25.0),
    (5, 2, -0.05),
];

pub fn build(game: &mut Game) -> EngineResult<()> {
    let mut policies = Vec::with_capacity(POLICIES.len());
    for &(name, leak, capacity, activation) in POLICIES {
        let id = game.add_policy(name, leak)?;
        let node = game.network_mut().node_mut(&id)?;
        node.capacity = capacity;
        node.activation = activation;
        policies.push(id);
    }

    let mut goals = Vec::with_capacity(GOALS.len());
    for &(name, leak) in GOALS {
        goals.push(game.add_goal(name, leak)?);
    }

    for &(from, to, weight) in POLICY_LINKS {
        game.add_link(&policies[from], &policies[to], weight)?;
    }
    for &(from, to, weight) in GOAL_LINKS {
        game.add_link(&policies[from], &goals[to], weight)?;
    }
    Ok(())
}
