use std::fmt;

use serde::{Deserialize, Serialize};

use super::rules::RuleError;

/// 棋盘边长，只支持 3x3。
pub const BOARD_SIZE: usize = 3;
/// 空格子在棋盘键中的占位符。
pub const EMPTY_CELL: &str = "_";
/// 棋盘键中格子之间的分隔符，避免多字符符号首尾相连后产生歧义。
pub const CELL_SEPARATOR: char = '\u{1f}';

/// 玩家落子使用的记号，可以是任意字符串（"X"、"O"、emoji 等）。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Symbol {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// 棋盘坐标，x 为列、y 为行，均在 `0..3` 内。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "CoordRepr")]
pub struct Coord {
    x: u8,
    y: u8,
}

#[derive(Deserialize)]
struct CoordRepr {
    x: usize,
    y: usize,
}

impl TryFrom<CoordRepr> for Coord {
    type Error = RuleError;

    fn try_from(repr: CoordRepr) -> Result<Self, Self::Error> {
        Coord::new(repr.x, repr.y)
    }
}

impl Coord {
    pub fn new(x: usize, y: usize) -> Result<Self, RuleError> {
        if x >= BOARD_SIZE || y >= BOARD_SIZE {
            return Err(RuleError::OutOfRange { x, y });
        }
        Ok(Self::at(x as u8, y as u8))
    }

    /// 不做范围检查，仅用于编译期常量表。
    pub(crate) const fn at(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> usize {
        self.x as usize
    }

    pub fn y(&self) -> usize {
        self.y as usize
    }

    /// 两端点连线的中点。只对同一条胜利线的两端有意义。
    pub fn midpoint(start: Coord, end: Coord) -> Coord {
        Coord::at((start.x + end.x) / 2, (start.y + end.y) / 2)
    }

    /// 行优先（先 y 后 x）遍历全部 9 个坐标。
    pub fn all() -> impl Iterator<Item = Coord> {
        (0..BOARD_SIZE as u8).flat_map(|y| (0..BOARD_SIZE as u8).map(move |x| Coord::at(x, y)))
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// 3x3 棋盘，按行存储（`rows[y][x]`）。
///
/// 落子不会修改原棋盘，[`Board::with_move`] 总是返回一个新的棋盘；
/// `Clone` 是深拷贝，新旧棋盘之间不共享任何格子。
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    rows: [[Option<Symbol>; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: [[Option<Symbol>; BOARD_SIZE]; BOARD_SIZE]) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[[Option<Symbol>; BOARD_SIZE]; BOARD_SIZE] {
        &self.rows
    }

    pub fn get(&self, x: usize, y: usize) -> Result<Option<&Symbol>, RuleError> {
        let coord = Coord::new(x, y)?;
        Ok(self.cell(coord))
    }

    pub fn cell(&self, coord: Coord) -> Option<&Symbol> {
        self.rows[coord.y()][coord.x()].as_ref()
    }

    pub fn with_move(&self, x: usize, y: usize, symbol: Symbol) -> Result<Board, RuleError> {
        let coord = Coord::new(x, y)?;
        self.with_move_at(coord, symbol)
    }

    pub fn with_move_at(&self, coord: Coord, symbol: Symbol) -> Result<Board, RuleError> {
        if self.cell(coord).is_some() {
            return Err(RuleError::CellOccupied {
                x: coord.x(),
                y: coord.y(),
            });
        }
        let mut next = self.clone();
        next.rows[coord.y()][coord.x()] = Some(symbol);
        Ok(next)
    }

    /// 行优先遍历每个格子及其坐标。
    pub fn cells(&self) -> impl Iterator<Item = (Coord, Option<&Symbol>)> + '_ {
        Coord::all().map(move |coord| (coord, self.cell(coord)))
    }

    pub fn count(&self, symbol: &Symbol) -> usize {
        self.cells()
            .filter(|(_, cell)| *cell == Some(symbol))
            .count()
    }

    pub fn filled_count(&self) -> usize {
        self.cells().filter(|(_, cell)| cell.is_some()).count()
    }

    pub fn is_full(&self) -> bool {
        self.filled_count() == BOARD_SIZE * BOARD_SIZE
    }

    /// 置换表使用的规范键：行优先拼接 9 个格子，空格子写作 `_`。
    ///
    /// 只依赖格子内容，与玩家对象无关。
    pub fn key(&self) -> String {
        let mut key = String::with_capacity(BOARD_SIZE * BOARD_SIZE * 2);
        for (index, (_, cell)) in self.cells().enumerate() {
            if index > 0 {
                key.push(CELL_SEPARATOR);
            }
            key.push_str(cell.map(Symbol::as_str).unwrap_or(EMPTY_CELL));
        }
        key
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (y, row) in self.rows.iter().enumerate() {
            if y > 0 {
                writeln!(f)?;
            }
            for (x, cell) in row.iter().enumerate() {
                if x > 0 {
                    f.write_str(" ")?;
                }
                f.write_str(cell.as_ref().map(Symbol::as_str).unwrap_or(EMPTY_CELL))?;
            }
        }
        Ok(())
    }
}

/// 测试辅助：用三行单字符字符串构造棋盘，`_` 表示空格子。
#[cfg(test)]
pub(crate) fn board_from(rows: [&str; BOARD_SIZE]) -> Board {
    let mut cells: [[Option<Symbol>; BOARD_SIZE]; BOARD_SIZE] = Default::default();
    for (y, row) in rows.iter().enumerate() {
        for (x, ch) in row.chars().enumerate() {
            if ch != '_' {
                cells[y][x] = Some(Symbol::new(ch.to_string()));
            }
        }
    }
    Board::from_rows(cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_board_has_nine_free_cells() {
        let board = Board::empty();
        assert_eq!(board.cells().count(), 9);
        assert_eq!(board.filled_count(), 0);
        assert!(!board.is_full());
    }

    #[test]
    fn get_rejects_coordinates_off_the_board() {
        let board = Board::empty();
        assert_eq!(board.get(3, 0), Err(RuleError::OutOfRange { x: 3, y: 0 }));
        assert_eq!(board.get(0, 7), Err(RuleError::OutOfRange { x: 0, y: 7 }));
        assert_eq!(board.get(2, 2), Ok(None));
    }

    #[test]
    fn with_move_leaves_source_board_untouched() {
        let board = Board::empty();
        let next = board
            .with_move(1, 2, Symbol::from("X"))
            .expect("empty cell should accept a move");

        assert_eq!(board.get(1, 2), Ok(None));
        assert_eq!(next.get(1, 2), Ok(Some(&Symbol::from("X"))));
        assert_eq!(next.filled_count(), 1);
    }

    #[test]
    fn with_move_rejects_occupied_cell() {
        let board = board_from(["X__", "___", "___"]);
        assert_eq!(
            board.with_move(0, 0, Symbol::from("O")),
            Err(RuleError::CellOccupied { x: 0, y: 0 })
        );
    }

    #[test]
    fn mutating_a_clone_never_reaches_the_original() {
        let original = board_from(["X__", "_O_", "___"]);
        let snapshot = original.clone();
        let mut copy = original.clone();
        copy = copy
            .with_move(2, 2, Symbol::from("X"))
            .expect("free cell");
        copy.rows[0][0] = Some(Symbol::from("O"));

        assert_eq!(original, snapshot);
        assert_ne!(copy, original);
    }

    #[test]
    fn key_is_row_major_with_sentinels() {
        let board = board_from(["X__", "_O_", "__X"]);
        let expected = ["X", "_", "_", "_", "O", "_", "_", "_", "X"].join("\u{1f}");
        assert_eq!(board.key(), expected);
    }

    #[test]
    fn key_keeps_multi_character_glyphs_apart() {
        let mut left: [[Option<Symbol>; 3]; 3] = Default::default();
        left[0][0] = Some(Symbol::from("a"));
        left[0][1] = Some(Symbol::from("aa"));
        let mut right: [[Option<Symbol>; 3]; 3] = Default::default();
        right[0][0] = Some(Symbol::from("aa"));
        right[0][1] = Some(Symbol::from("a"));

        assert_ne!(Board::from_rows(left).key(), Board::from_rows(right).key());
    }

    #[test]
    fn coords_iterate_row_major() {
        let coords: Vec<(usize, usize)> = Coord::all().map(|c| (c.x(), c.y())).collect();
        assert_eq!(coords[0], (0, 0));
        assert_eq!(coords[1], (1, 0));
        assert_eq!(coords[3], (0, 1));
        assert_eq!(coords[8], (2, 2));
    }

    #[test]
    fn coord_deserialization_is_range_checked() {
        let ok: Coord = serde_json::from_str(r#"{"x":2,"y":1}"#).expect("valid coord");
        assert_eq!((ok.x(), ok.y()), (2, 1));
        assert!(serde_json::from_str::<Coord>(r#"{"x":3,"y":1}"#).is_err());
    }
}
