use std::collections::HashMap;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::game::{Coord, GameState, RuleEngine, Side};

/// 不完美 AI 每步随机落子的概率。
pub const DEFAULT_IMPERFECT_CHANCE: f64 = 0.3;
/// 电脑落子前的停顿，让电脑对电脑的对局能被看清。
pub const DEFAULT_MOVE_DELAY_MS: u32 = 200;
/// 搜索深度上限。3x3 棋盘最多 9 步，10 足以搜到所有终局。
pub const SEARCH_DEPTH: u8 = 10;
/// 外部配置允许的最小深度，再浅就搜不到所有终局。
pub const MIN_EXACT_DEPTH: u8 = 9;

const INFINITY: i32 = i32::MAX / 2;

/// 置换表：棋盘键 -> 精确值。
type Memo = HashMap<String, i32>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AiStrategy {
    Optimal,
    Random,
}

/// 搜索配置。从 JS 反序列化时会校验：概率截断到 `[0, 1]`，深度不得低于
/// [`MIN_EXACT_DEPTH`]。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", try_from = "AiConfigRepr")]
pub struct AiConfig {
    pub imperfect_chance: f64,
    pub move_delay_ms: u32,
    pub depth_limit: u8,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AiConfigError {
    #[error("imperfect chance must be a finite number, got {0}")]
    NonFiniteChance(f64),
    #[error("depth limit {depth_limit} is below {minimum}, the search would miss terminal positions")]
    ShallowSearch { depth_limit: u8, minimum: u8 },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AiConfigRepr {
    imperfect_chance: f64,
    move_delay_ms: u32,
    depth_limit: u8,
}

impl Default for AiConfigRepr {
    fn default() -> Self {
        let config = AiConfig::default();
        Self {
            imperfect_chance: config.imperfect_chance,
            move_delay_ms: config.move_delay_ms,
            depth_limit: config.depth_limit,
        }
    }
}

impl TryFrom<AiConfigRepr> for AiConfig {
    type Error = AiConfigError;

    fn try_from(repr: AiConfigRepr) -> Result<Self, Self::Error> {
        if !repr.imperfect_chance.is_finite() {
            return Err(AiConfigError::NonFiniteChance(repr.imperfect_chance));
        }
        if repr.depth_limit < MIN_EXACT_DEPTH {
            return Err(AiConfigError::ShallowSearch {
                depth_limit: repr.depth_limit,
                minimum: MIN_EXACT_DEPTH,
            });
        }
        Ok(AiConfig {
            imperfect_chance: 0.0,
            move_delay_ms: repr.move_delay_ms,
            depth_limit: repr.depth_limit,
        }
        .with_imperfect_chance(repr.imperfect_chance))
    }
}

impl AiConfig {
    pub fn with_imperfect_chance(mut self, chance: f64) -> Self {
        self.imperfect_chance = chance.clamp(0.0, 1.0);
        self
    }

    pub fn with_move_delay(mut self, delay: Duration) -> Self {
        self.move_delay_ms = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
        self
    }

    /// 低于 [`MIN_EXACT_DEPTH`] 时搜索只给出估计值，不再保证最优。
    pub fn with_depth_limit(mut self, depth: u8) -> Self {
        self.depth_limit = depth;
        self
    }

    pub fn move_delay(&self) -> Duration {
        Duration::from_millis(u64::from(self.move_delay_ms))
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            imperfect_chance: DEFAULT_IMPERFECT_CHANCE,
            move_delay_ms: DEFAULT_MOVE_DELAY_MS,
            depth_limit: SEARCH_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AiDecision {
    pub coord: Coord,
    /// 从 A 方视角的估值：+1 A 必胜，-1 B 必胜，0 和棋。随机落子时为 0。
    pub value: i32,
    pub strategy: AiStrategy,
    pub nodes: u64,
    pub memo_entries: usize,
    pub memo_hits: u64,
}

#[derive(Default)]
struct SearchStats {
    nodes: u64,
    memo_hits: u64,
}

/// 一次 alpha-beta 的结果。发生剪枝或深度截断时 `exact` 为 false。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Evaluation {
    value: i32,
    exact: bool,
}

impl Evaluation {
    fn exact(value: i32) -> Self {
        Self { value, exact: true }
    }

    fn estimate(value: i32) -> Self {
        Self {
            value,
            exact: false,
        }
    }
}

/// 置换表使用的棋盘键，与玩家对象无关。
pub fn hash(state: &GameState) -> String {
    state.board().key()
}

pub struct AiAgent {
    config: AiConfig,
    rng: SmallRng,
}

impl AiAgent {
    pub fn new(config: AiConfig) -> Self {
        Self {
            config,
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(config: AiConfig, seed: u64) -> Self {
        Self {
            config,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    /// `[0, 1)` 上的均匀随机数，用于决定不完美 AI 是否随机落子。
    pub fn roll(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    pub fn best_move(&mut self, state: &GameState) -> Option<Coord> {
        self.search(state).map(|decision| decision.coord)
    }

    /// 完整搜索当前行棋方的最优落子。
    ///
    /// 候选先洗牌再按严格比较取第一个最优值，等价的几步之间每次调用都随机选择。
    /// 置换表只在本次调用内有效。终局或无子可下时返回 `None`。
    pub fn search(&mut self, state: &GameState) -> Option<AiDecision> {
        if RuleEngine::is_terminal(state) {
            return None;
        }

        let maximizing = RuleEngine::next_side(state) == Side::A;
        let mut memo = Memo::new();
        let mut stats = SearchStats::default();
        let mut best_value = if maximizing { -INFINITY } else { INFINITY };
        let mut best_move = None;

        for coord in self.shuffled_moves(state) {
            let Ok(child) = RuleEngine::apply(state, coord) else {
                continue;
            };
            let evaluation = self.alphabeta(
                &child,
                self.config.depth_limit,
                -INFINITY,
                INFINITY,
                !maximizing,
                &mut memo,
                &mut stats,
            );
            let improves = if maximizing {
                evaluation.value > best_value
            } else {
                evaluation.value < best_value
            };
            if improves {
                best_value = evaluation.value;
                best_move = Some(coord);
            }
        }

        let coord = best_move?;
        debug!(
            nodes = stats.nodes,
            memo_entries = memo.len(),
            memo_hits = stats.memo_hits,
            value = best_value,
            %coord,
            "minimax search finished"
        );

        Some(AiDecision {
            coord,
            value: best_value,
            strategy: AiStrategy::Optimal,
            nodes: stats.nodes,
            memo_entries: memo.len(),
            memo_hits: stats.memo_hits,
        })
    }

    /// 在合法落子中均匀随机选一步，不做任何搜索。
    pub fn random_move(&mut self, state: &GameState) -> Option<Coord> {
        self.shuffled_moves(state).into_iter().next()
    }

    pub fn random_decision(&mut self, state: &GameState) -> Option<AiDecision> {
        let coord = self.random_move(state)?;
        debug!(%coord, "playing a random move");
        Some(AiDecision {
            coord,
            value: 0,
            strategy: AiStrategy::Random,
            nodes: 0,
            memo_entries: 0,
            memo_hits: 0,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn alphabeta(
        &mut self,
        state: &GameState,
        depth_remaining: u8,
        mut alpha: i32,
        mut beta: i32,
        maximizing: bool,
        memo: &mut Memo,
        stats: &mut SearchStats,
    ) -> Evaluation {
        stats.nodes += 1;

        if depth_remaining == 0 {
            return Evaluation::estimate(RuleEngine::utility(state));
        }
        if RuleEngine::is_terminal(state) {
            return Evaluation::exact(RuleEngine::utility(state));
        }

        let key = hash(state);
        if let Some(&value) = memo.get(&key) {
            stats.memo_hits += 1;
            return Evaluation::exact(value);
        }

        let mut exact = true;
        let mut value = if maximizing { -INFINITY } else { INFINITY };
        for coord in self.shuffled_moves(state) {
            let Ok(child) = RuleEngine::apply(state, coord) else {
                continue;
            };
            let child_eval = self.alphabeta(
                &child,
                depth_remaining - 1,
                alpha,
                beta,
                !maximizing,
                memo,
                stats,
            );
            exact &= child_eval.exact;

            if maximizing {
                value = value.max(child_eval.value);
                alpha = alpha.max(value);
            } else {
                value = value.min(child_eval.value);
                beta = beta.min(value);
            }
            if alpha >= beta {
                // 剩余分支未展开，结果只是一个界。
                exact = false;
                break;
            }
        }

        if exact {
            memo.insert(key, value);
        }
        Evaluation { value, exact }
    }

    /// Fisher-Yates 洗牌后的合法落子。
    fn shuffled_moves(&mut self, state: &GameState) -> Vec<Coord> {
        let mut moves = RuleEngine::legal_moves(state);
        moves.shuffle(&mut self.rng);
        moves
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::board::board_from;
    use crate::game::{Control, Player, Skill, Symbol};

    fn state_from(rows: [&str; 3]) -> GameState {
        GameState::new(
            board_from(rows),
            Player::new("Ann", Symbol::from("X"), Control::Computer, Skill::Optimal),
            Player::new("Ben", Symbol::from("O"), Control::Computer, Skill::Optimal),
        )
        .expect("test board should be consistent")
    }

    fn coord(x: usize, y: usize) -> Coord {
        Coord::new(x, y).expect("in range")
    }

    /// 不剪枝、不截断的极小化极大，记录每个可达局面的真实值。
    fn exact_values(state: &GameState, table: &mut HashMap<String, i32>) -> i32 {
        let key = hash(state);
        if let Some(&value) = table.get(&key) {
            return value;
        }
        let value = if RuleEngine::is_terminal(state) {
            RuleEngine::utility(state)
        } else {
            let children = RuleEngine::legal_moves(state)
                .into_iter()
                .map(|c| RuleEngine::apply(state, c).expect("legal move"))
                .map(|child| exact_values(&child, table));
            if RuleEngine::next_side(state) == Side::A {
                children.max().expect("non-terminal has moves")
            } else {
                children.min().expect("non-terminal has moves")
            }
        };
        table.insert(key, value);
        value
    }

    #[test]
    fn completes_the_open_row() {
        let state = state_from(["XX_", "OO_", "___"]);
        for seed in 0..20 {
            let mut agent = AiAgent::with_seed(AiConfig::default(), seed);
            let decision = agent.search(&state).expect("moves available");
            assert_eq!(decision.coord, coord(2, 0));
            assert_eq!(decision.value, 1);

            let next = RuleEngine::apply(&state, decision.coord).expect("legal");
            let result = RuleEngine::winner(&next).expect("row completed");
            assert_eq!(result.side, Side::A);
            for cell in [coord(0, 0), coord(1, 0), coord(2, 0)] {
                assert!(result.involved_cells.contains(&cell));
            }
        }
    }

    #[test]
    fn second_player_blocks_immediate_threat() {
        let state = state_from(["XX_", "_O_", "___"]);
        let mut agent = AiAgent::with_seed(AiConfig::default(), 3);
        assert_eq!(agent.best_move(&state), Some(coord(2, 0)));
    }

    #[test]
    fn self_play_from_empty_board_is_always_a_draw() {
        for seed in 0..6 {
            let mut agent = AiAgent::with_seed(AiConfig::default(), seed);
            let mut state = GameState::default();
            while !RuleEngine::is_terminal(&state) {
                let next = agent.best_move(&state).expect("non-terminal has a move");
                state = RuleEngine::apply(&state, next).expect("best move is legal");
            }
            assert!(RuleEngine::winner(&state).is_none(), "seed {seed} ended in a win");
        }
    }

    #[test]
    fn optimal_play_never_loses_to_random_play() {
        for seed in 0..10 {
            let mut optimal = AiAgent::with_seed(AiConfig::default(), seed);
            let mut random = AiAgent::with_seed(AiConfig::default(), seed + 100);
            let mut state = GameState::default();
            while !RuleEngine::is_terminal(&state) {
                let next = if RuleEngine::next_side(&state) == Side::A {
                    optimal.best_move(&state)
                } else {
                    random.random_move(&state)
                }
                .expect("non-terminal has a move");
                state = RuleEngine::apply(&state, next).expect("legal");
            }
            assert_ne!(RuleEngine::utility(&state), -1, "seed {seed} lost");
        }
    }

    #[test]
    fn tie_breaking_varies_across_calls() {
        let state = GameState::default();
        let mut agent = AiAgent::with_seed(AiConfig::default(), 11);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..30 {
            seen.insert(agent.best_move(&state).expect("opening move"));
        }
        assert!(seen.len() > 1, "every opening move is a draw, choice should vary");
    }

    #[test]
    fn memo_only_holds_exact_values() {
        let mut truth = HashMap::new();
        exact_values(&GameState::default(), &mut truth);

        let mut agent = AiAgent::with_seed(AiConfig::default(), 5);
        let state = state_from(["X__", "___", "___"]);
        let mut memo = Memo::new();
        let mut stats = SearchStats::default();
        let evaluation = agent.alphabeta(
            &state,
            SEARCH_DEPTH,
            -INFINITY,
            INFINITY,
            false,
            &mut memo,
            &mut stats,
        );

        assert!(!memo.is_empty());
        for (key, value) in &memo {
            assert_eq!(truth.get(key), Some(value), "memo entry {key:?} is not exact");
        }
        assert_eq!(evaluation.value, 0);
        assert!(stats.nodes > 0);
    }

    #[test]
    fn depth_cutoff_is_inexact_and_not_cached() {
        let mut agent = AiAgent::with_seed(AiConfig::default(), 1);
        let state = GameState::default();
        let mut memo = Memo::new();
        let mut stats = SearchStats::default();

        let evaluation =
            agent.alphabeta(&state, 0, -INFINITY, INFINITY, true, &mut memo, &mut stats);
        assert_eq!(evaluation, Evaluation::estimate(0));

        agent.alphabeta(&state, 2, -INFINITY, INFINITY, true, &mut memo, &mut stats);
        assert!(memo.is_empty());
    }

    #[test]
    fn terminal_node_is_exact() {
        let mut agent = AiAgent::with_seed(AiConfig::default(), 1);
        let state = state_from(["OOO", "XX_", "X__"]);
        let mut memo = Memo::new();
        let mut stats = SearchStats::default();
        let evaluation =
            agent.alphabeta(&state, 5, -INFINITY, INFINITY, true, &mut memo, &mut stats);
        assert_eq!(evaluation, Evaluation::exact(-1));
    }

    #[test]
    fn finished_game_has_no_move() {
        let mut agent = AiAgent::with_seed(AiConfig::default(), 2);
        let won = state_from(["XXX", "OO_", "___"]);
        assert!(agent.search(&won).is_none());

        let drawn = state_from(["XOX", "XOO", "OXX"]);
        assert!(agent.best_move(&drawn).is_none());
        assert!(agent.random_move(&drawn).is_none());
    }

    #[test]
    fn random_move_is_always_legal() {
        let state = state_from(["X_O", "_X_", "O__"]);
        let legal = RuleEngine::legal_moves(&state);
        let mut agent = AiAgent::with_seed(AiConfig::default(), 9);
        for _ in 0..50 {
            let pick = agent.random_move(&state).expect("moves available");
            assert!(legal.contains(&pick));
        }
    }

    #[test]
    fn config_builders_clamp_and_convert() {
        let config = AiConfig::default()
            .with_imperfect_chance(1.7)
            .with_move_delay(Duration::from_millis(50))
            .with_depth_limit(4);
        assert_eq!(config.imperfect_chance, 1.0);
        assert_eq!(config.move_delay(), Duration::from_millis(50));
        assert_eq!(config.depth_limit, 4);
        assert_eq!(AiConfig::default().imperfect_chance, DEFAULT_IMPERFECT_CHANCE);
    }

    #[test]
    fn deserialized_config_is_validated() {
        let config: AiConfig = serde_json::from_str("{}").expect("all fields default");
        assert_eq!(config, AiConfig::default());

        let config: AiConfig =
            serde_json::from_str(r#"{"imperfectChance": 4.0, "moveDelayMs": 0}"#)
                .expect("chance is clamped");
        assert_eq!(config.imperfect_chance, 1.0);
        assert_eq!(config.move_delay(), Duration::ZERO);

        let config: AiConfig =
            serde_json::from_str(r#"{"imperfectChance": -0.5}"#).expect("chance is clamped");
        assert_eq!(config.imperfect_chance, 0.0);

        assert!(serde_json::from_str::<AiConfig>(r#"{"depthLimit": 1}"#).is_err());
        assert!(serde_json::from_str::<AiConfig>(r#"{"depthLimit": 9}"#).is_ok());
    }

    #[test]
    fn deserialized_config_keeps_optimal_play() {
        let config: AiConfig =
            serde_json::from_str(r#"{"depthLimit": 9}"#).expect("full-depth config");
        for seed in 0..3 {
            let mut agent = AiAgent::with_seed(config.clone(), seed);
            let mut state = GameState::default();
            while let Some(coord) = agent.best_move(&state) {
                state = RuleEngine::apply(&state, coord).expect("legal move");
            }
            assert!(RuleEngine::winner(&state).is_none());
        }
    }
}
