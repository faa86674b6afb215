use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    board::{Board, Coord, Symbol},
    player::Player,
    state::{GameState, IntegrityError, Side, WinResult},
};

/// 全部 8 条胜利线：3 行、3 列、2 条对角线。每条线的首尾即其端点。
const LINES: [[Coord; 3]; 8] = [
    // Rows
    [Coord::at(0, 0), Coord::at(1, 0), Coord::at(2, 0)],
    [Coord::at(0, 1), Coord::at(1, 1), Coord::at(2, 1)],
    [Coord::at(0, 2), Coord::at(1, 2), Coord::at(2, 2)],
    // Columns
    [Coord::at(0, 0), Coord::at(0, 1), Coord::at(0, 2)],
    [Coord::at(1, 0), Coord::at(1, 1), Coord::at(1, 2)],
    [Coord::at(2, 0), Coord::at(2, 1), Coord::at(2, 2)],
    // Diagonals
    [Coord::at(0, 0), Coord::at(1, 1), Coord::at(2, 2)],
    [Coord::at(0, 2), Coord::at(1, 1), Coord::at(2, 0)],
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum RuleError {
    #[error("coordinate ({x}, {y}) is outside the 3x3 board")]
    OutOfRange { x: usize, y: usize },
    #[error("cell ({x}, {y}) is already occupied")]
    CellOccupied { x: usize, y: usize },
    #[error("invalid game state: {error}")]
    IntegrityViolation { error: IntegrityError },
}

impl From<IntegrityError> for RuleError {
    fn from(error: IntegrityError) -> Self {
        RuleError::IntegrityViolation { error }
    }
}

/// 井字棋规则。全部是纯函数，不持有任何状态。
pub struct RuleEngine;

impl RuleEngine {
    /// A 的记号数减去 B 的记号数，不大于 0 时轮到 A，否则轮到 B。
    pub fn next_side(state: &GameState) -> Side {
        let board = state.board();
        let difference = board.count(state.player_a().symbol()) as isize
            - board.count(state.player_b().symbol()) as isize;
        if difference <= 0 {
            Side::A
        } else {
            Side::B
        }
    }

    pub fn next_player(state: &GameState) -> &Player {
        state.player(Self::next_side(state))
    }

    /// 所有空格子，行优先顺序。
    pub fn legal_moves(state: &GameState) -> Vec<Coord> {
        state
            .board()
            .cells()
            .filter(|(_, cell)| cell.is_none())
            .map(|(coord, _)| coord)
            .collect()
    }

    pub fn apply_move(state: &GameState, x: usize, y: usize) -> Result<GameState, RuleError> {
        let coord = Coord::new(x, y)?;
        Self::apply(state, coord)
    }

    /// 当前行棋方在 `coord` 落子后的新状态。
    pub fn apply(state: &GameState, coord: Coord) -> Result<GameState, RuleError> {
        let symbol = Self::next_player(state).symbol().clone();
        let board = state.board().with_move_at(coord, symbol)?;
        Ok(state.with_board(board))
    }

    /// 棋盘上已连成的线：(记号, 起点, 终点)。
    pub(crate) fn completed_lines(board: &Board) -> Vec<(&Symbol, Coord, Coord)> {
        LINES
            .iter()
            .filter_map(|[a, b, c]| {
                let symbol = board.cell(*a)?;
                (board.cell(*b) == Some(symbol) && board.cell(*c) == Some(symbol))
                    .then_some((symbol, *a, *c))
            })
            .collect()
    }

    pub fn winning_side(state: &GameState) -> Option<Side> {
        let lines = Self::completed_lines(state.board());
        let (symbol, _, _) = lines.first()?;
        state.side_of(symbol)
    }

    pub fn winner(state: &GameState) -> Option<WinResult> {
        let lines = Self::completed_lines(state.board());
        let (symbol, _, _) = lines.first()?;
        let side = state.side_of(symbol)?;
        let winning_lines: Vec<(Coord, Coord)> =
            lines.iter().map(|(_, start, end)| (*start, *end)).collect();
        let involved_cells = Self::involved_cells(&winning_lines);

        Some(WinResult {
            winner: state.player(side).clone(),
            side,
            winning_lines,
            involved_cells,
        })
    }

    /// 每条线取起点、中点、终点，按坐标去重并保持首次出现的顺序。
    pub fn involved_cells(lines: &[(Coord, Coord)]) -> Vec<Coord> {
        let mut cells: Vec<Coord> = Vec::with_capacity(lines.len() * 3);
        for &(start, end) in lines {
            for cell in [start, Coord::midpoint(start, end), end] {
                if !cells.contains(&cell) {
                    cells.push(cell);
                }
            }
        }
        cells
    }

    pub fn is_terminal(state: &GameState) -> bool {
        Self::winning_side(state).is_some() || state.board().is_full()
    }

    /// A 胜为 +1，B 胜为 -1，其余为 0。
    pub fn utility(state: &GameState) -> i32 {
        match Self::winning_side(state) {
            Some(Side::A) => 1,
            Some(Side::B) => -1,
            None => 0,
        }
    }
}
