use proptest::prelude::*;

use tictactoe_wasm::{AiAgent, AiConfig, GameState, RuleEngine, Side};

/// 从空棋盘开始，每步在合法落点中按下标选择，直到终局或用完选择。
fn play(choices: &[usize]) -> Vec<GameState> {
    let mut states = vec![GameState::default()];
    for choice in choices {
        let Some(current) = states.last() else {
            break;
        };
        if RuleEngine::is_terminal(current) {
            break;
        }
        let moves = RuleEngine::legal_moves(current);
        let coord = moves[choice % moves.len()];
        let next = RuleEngine::apply(current, coord).expect("legal move applies");
        states.push(next);
    }
    states
}

proptest! {
    #[test]
    fn turns_alternate_along_any_game(choices in prop::collection::vec(0usize..9, 0..9)) {
        let states = play(&choices);
        for (index, state) in states.iter().enumerate() {
            let expected = if index % 2 == 0 { Side::A } else { Side::B };
            prop_assert_eq!(RuleEngine::next_side(state), expected);
        }
    }

    #[test]
    fn legal_moves_and_filled_cells_cover_the_board(choices in prop::collection::vec(0usize..9, 0..9)) {
        for state in play(&choices) {
            prop_assert_eq!(
                RuleEngine::legal_moves(&state).len() + state.board().filled_count(),
                9
            );
        }
    }

    #[test]
    fn terminal_exactly_when_won_or_full(choices in prop::collection::vec(0usize..9, 0..9)) {
        for state in play(&choices) {
            let expected =
                RuleEngine::winner(&state).is_some() || RuleEngine::legal_moves(&state).is_empty();
            prop_assert_eq!(RuleEngine::is_terminal(&state), expected);
        }
    }

    #[test]
    fn applying_a_move_leaves_the_original_untouched(choices in prop::collection::vec(0usize..9, 1..9)) {
        let states = play(&choices);
        for pair in states.windows(2) {
            let (before, after) = (&pair[0], &pair[1]);
            prop_assert_eq!(before.board().filled_count() + 1, after.board().filled_count());
            let replayed = RuleEngine::legal_moves(before)
                .into_iter()
                .map(|coord| RuleEngine::apply(before, coord).expect("legal move applies"))
                .find(|candidate| candidate == after);
            let replayed = replayed.expect("successor is reachable from its predecessor");
            prop_assert_eq!(RuleEngine::winner(&replayed), RuleEngine::winner(after));
            prop_assert_eq!(RuleEngine::is_terminal(&replayed), RuleEngine::is_terminal(after));
        }
    }

    #[test]
    fn best_move_is_always_legal(
        choices in prop::collection::vec(0usize..9, 0..8),
        seed in any::<u64>(),
    ) {
        let states = play(&choices);
        let state = states.last().expect("at least the initial state");
        let mut agent = AiAgent::with_seed(AiConfig::default(), seed);
        match agent.best_move(state) {
            Some(coord) => prop_assert!(RuleEngine::legal_moves(state).contains(&coord)),
            None => prop_assert!(RuleEngine::is_terminal(state)),
        }
    }
}
