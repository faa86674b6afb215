//! 游戏核心逻辑模块（棋盘、玩家、规则引擎、对局编排）。

pub mod board;
pub mod player;
pub mod rules;
pub mod session;
pub mod state;

pub use board::{Board, Coord, Symbol, BOARD_SIZE};
pub use player::{Control, GameConfig, Player, PlayerConfig, Skill, DEMO_PAIRS};
pub use rules::{RuleEngine, RuleError};
pub use session::{GameObserver, GameSession, ManualScheduler, Scheduler, Ticket};
pub use state::{GameEvent, GameState, IntegrityError, Side, WinResult};
