//! AI 算法模块（带置换表的 alpha-beta 极小化极大搜索）。

pub mod minimax;

pub use minimax::{
    hash, AiAgent, AiConfig, AiConfigError, AiDecision, AiStrategy, DEFAULT_IMPERFECT_CHANCE,
    DEFAULT_MOVE_DELAY_MS, MIN_EXACT_DEPTH, SEARCH_DEPTH,
};
