#![cfg(target_arch = "wasm32")]

use flowgame_engine::WasmGame;
use wasm_bindgen_test::*;

#[wasm_bindgen_test]
fn wasm_game_ticks_and_trades() {
    let mut game = WasmGame::new(7);
    let policy = game.add_policy("Policy 1", 0.1).expect("test: policy");
    let goal = game.add_goal("Goal 1", 0.0).expect("test: goal");
    game.add_link(&policy, &goal, 5.0).expect("test: link");

    let seller: flowgame_engine::PlayerData =
        serde_wasm_bindgen::from_value(game.create_player("Matt").expect("test: player"))
            .expect("test: player data");
    let seller_id = seller.id.to_string();
    assert!(seller.token.is_some());

    game.fund(&seller_id, &policy, 10.0).expect("test: fund");
    game.run_batch(3).expect("test: batch");
    assert_eq!(game.current_tick(), 3.0);

    let offer = game.offer_policy(&seller_id, &policy, 100.0).expect("test: offer");
    let buyer: flowgame_engine::PlayerData =
        serde_wasm_bindgen::from_value(game.create_player("Simon").expect("test: player"))
            .expect("test: player data");
    let buyer_id = buyer.id.to_string();
    if !buyer.policies.iter().any(|p| p.id.to_string() == policy) {
        game.buy_policy(&buyer_id, offer).expect("test: buy");
    }
    assert!(game.add_link(&goal, &policy, 1.0).is_err());
}
