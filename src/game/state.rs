use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::board::{Board, Coord, Symbol, CELL_SEPARATOR, EMPTY_CELL};
use super::player::Player;
use super::rules::RuleEngine;

/// 玩家所在的一侧。A 侧总是在空棋盘上先手。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn opponent(self) -> Self {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// 状态不一致时的错误。任何一条都会让胜负判定失去意义，因此直接拒绝构造。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum IntegrityError {
    #[error("both players use the symbol `{symbol}`")]
    DuplicateSymbol { symbol: Symbol },
    #[error("player on side {side:?} has an empty symbol")]
    EmptySymbol { side: Side },
    #[error("symbol `{symbol}` is reserved by the board encoding")]
    ReservedSymbol { symbol: Symbol },
    #[error("cell ({x}, {y}) holds `{symbol}`, which belongs to neither player")]
    ForeignSymbol { symbol: Symbol, x: usize, y: usize },
    #[error("side A leads side B by {difference} marks, alternating play allows 0 or 1")]
    TurnImbalance { difference: isize },
    #[error("both players have completed a line")]
    ConflictingWinners,
}

/// 一局游戏的完整状态：棋盘加上双方玩家。
///
/// 轮到谁下不单独存储，由 [`RuleEngine::next_side`] 根据双方记号数量推导。
/// 只能经由 [`GameState::new`] 构造（反序列化也会走同样的校验），
/// 因此拿到的 `GameState` 总是满足 [`GameState::integrity_check`]。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", try_from = "GameStateRepr")]
pub struct GameState {
    board: Board,
    player_a: Player,
    player_b: Player,
}

/// 未经校验的状态，用于反序列化后再交给 [`GameState::new`]。
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GameStateRepr {
    #[serde(default)]
    board: Board,
    player_a: Player,
    player_b: Player,
}

impl TryFrom<GameStateRepr> for GameState {
    type Error = IntegrityError;

    fn try_from(repr: GameStateRepr) -> Result<Self, Self::Error> {
        GameState::new(repr.board, repr.player_a, repr.player_b)
    }
}

impl GameState {
    pub fn new(board: Board, player_a: Player, player_b: Player) -> Result<Self, IntegrityError> {
        let state = Self {
            board,
            player_a,
            player_b,
        };
        state.integrity_check()?;
        Ok(state)
    }

    /// 空棋盘上的新对局。
    pub fn initial(player_a: Player, player_b: Player) -> Result<Self, IntegrityError> {
        Self::new(Board::empty(), player_a, player_b)
    }

    /// 换一块棋盘，玩家不变。调用方负责保证新棋盘来自合法落子。
    pub(crate) fn with_board(&self, board: Board) -> Self {
        Self {
            board,
            player_a: self.player_a.clone(),
            player_b: self.player_b.clone(),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn player_a(&self) -> &Player {
        &self.player_a
    }

    pub fn player_b(&self) -> &Player {
        &self.player_b
    }

    pub fn player(&self, side: Side) -> &Player {
        match side {
            Side::A => &self.player_a,
            Side::B => &self.player_b,
        }
    }

    pub fn side_of(&self, symbol: &Symbol) -> Option<Side> {
        if self.player_a.symbol() == symbol {
            Some(Side::A)
        } else if self.player_b.symbol() == symbol {
            Some(Side::B)
        } else {
            None
        }
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        for side in [Side::A, Side::B] {
            let symbol = self.player(side).symbol();
            if symbol.as_str().is_empty() {
                return Err(IntegrityError::EmptySymbol { side });
            }
            if symbol.as_str() == EMPTY_CELL || symbol.as_str().contains(CELL_SEPARATOR) {
                return Err(IntegrityError::ReservedSymbol {
                    symbol: symbol.clone(),
                });
            }
        }

        if self.player_a.symbol() == self.player_b.symbol() {
            return Err(IntegrityError::DuplicateSymbol {
                symbol: self.player_a.symbol().clone(),
            });
        }

        for (coord, cell) in self.board.cells() {
            if let Some(symbol) = cell {
                if self.side_of(symbol).is_none() {
                    return Err(IntegrityError::ForeignSymbol {
                        symbol: symbol.clone(),
                        x: coord.x(),
                        y: coord.y(),
                    });
                }
            }
        }

        let difference = self.board.count(self.player_a.symbol()) as isize
            - self.board.count(self.player_b.symbol()) as isize;
        // A 先手，A 的记号数只能与 B 相等或多一个。
        if !(0..=1).contains(&difference) {
            return Err(IntegrityError::TurnImbalance { difference });
        }

        let mut line_owners = RuleEngine::completed_lines(&self.board)
            .into_iter()
            .map(|(symbol, _, _)| symbol);
        if let Some(first) = line_owners.next() {
            if line_owners.any(|symbol| symbol != first) {
                return Err(IntegrityError::ConflictingWinners);
            }
        }

        Ok(())
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            board: Board::empty(),
            player_a: Player::default_for(Side::A),
            player_b: Player::default_for(Side::B),
        }
    }
}

/// 胜局信息，供界面高亮与画线使用。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WinResult {
    pub winner: Player,
    pub side: Side,
    /// 每条胜利线的两个端点。
    pub winning_lines: Vec<(Coord, Coord)>,
    /// 所有胜利线经过的格子，按坐标去重。
    pub involved_cells: Vec<Coord>,
}

/// 推送给界面的通知。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GameEvent {
    BoardUpdated { state: GameState },
    GameStarted,
    NextPlayerUpdated { player: Player },
    GameWon { result: WinResult },
    GameDrawn,
    GameReset,
    AiTurnStarted,
}
