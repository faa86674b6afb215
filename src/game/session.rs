use std::collections::VecDeque;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{
    board::Coord,
    player::{GameConfig, Player},
    rules::{RuleEngine, RuleError},
    state::{GameEvent, GameState},
};
use crate::ai::{AiAgent, AiConfig, AiDecision};

/// 延迟落子的凭据。每次排队都会分配新的编号，过期的编号不会被执行。
pub type Ticket = u64;

/// 宿主环境的延时回调。到时间后宿主应调用 [`GameSession::fire`]。
pub trait Scheduler {
    fn schedule(&mut self, ticket: Ticket, delay: Duration);

    /// 取消尚未触发的回调。即使宿主无法真正取消，过期凭据也会被 `fire` 忽略。
    fn cancel(&mut self, _ticket: Ticket) {}
}

/// 手动驱动的调度器：只记录排队的凭据，由调用方决定何时触发。
#[derive(Debug, Default)]
pub struct ManualScheduler {
    queued: VecDeque<(Ticket, Duration)>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pop(&mut self) -> Option<Ticket> {
        self.queued.pop_front().map(|(ticket, _)| ticket)
    }

    pub fn queued(&self) -> impl Iterator<Item = &(Ticket, Duration)> {
        self.queued.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, ticket: Ticket, delay: Duration) {
        self.queued.push_back((ticket, delay));
    }

    fn cancel(&mut self, ticket: Ticket) {
        self.queued.retain(|(queued, _)| *queued != ticket);
    }
}

/// 接收对局通知的观察者。
pub trait GameObserver {
    fn notify(&mut self, event: &GameEvent);
}

impl<F> GameObserver for F
where
    F: FnMut(&GameEvent),
{
    fn notify(&mut self, event: &GameEvent) {
        self(event)
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingMove {
    ticket: Ticket,
    coord: Coord,
}

/// 对局编排：持有当前状态，串联回合，为电脑玩家调用搜索并延时落子。
///
/// 状态只会被整体替换。排队中的电脑落子总是针对当前状态计算的，
/// 任何新状态（落子、开局、重置）都会作废它。
pub struct GameSession<S: Scheduler> {
    state: Option<GameState>,
    agent: AiAgent,
    scheduler: S,
    observers: Vec<Box<dyn GameObserver>>,
    pending: Option<PendingMove>,
    next_ticket: Ticket,
}

impl<S: Scheduler> GameSession<S> {
    pub fn new(scheduler: S, config: AiConfig) -> Self {
        Self::with_agent(scheduler, AiAgent::new(config))
    }

    pub fn with_agent(scheduler: S, agent: AiAgent) -> Self {
        Self {
            state: None,
            agent,
            scheduler,
            observers: Vec::new(),
            pending: None,
            next_ticket: 0,
        }
    }

    pub fn subscribe(&mut self, observer: impl GameObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// 当前状态；尚未开局时为 `None`。
    pub fn state(&self) -> Option<&GameState> {
        self.state.as_ref()
    }

    pub fn pending_move(&self) -> Option<Coord> {
        self.pending.map(|pending| pending.coord)
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn start(&mut self, config: &GameConfig) -> Result<Vec<GameEvent>, RuleError> {
        let (player_a, player_b) = config.players();
        let state = GameState::initial(player_a, player_b)?;
        info!(
            player_a = state.player_a().name(),
            player_b = state.player_b().name(),
            "game started"
        );

        self.cancel_pending();
        self.state = Some(state.clone());

        let mut events = Vec::new();
        self.emit(&mut events, GameEvent::BoardUpdated {
            state: state.clone(),
        });
        self.emit(&mut events, GameEvent::GameStarted);
        self.emit(&mut events, GameEvent::NextPlayerUpdated {
            player: RuleEngine::next_player(&state).clone(),
        });
        self.queue_ai_move(&mut events);
        Ok(events)
    }

    /// 重置后用随机演示角色开一局电脑对电脑。
    pub fn start_demo(&mut self) -> Result<Vec<GameEvent>, RuleError> {
        let previous = self
            .state
            .as_ref()
            .map(|state| (state.player_a().name().to_string(), state.player_b().name().to_string()));
        let config = GameConfig::demo(
            self.agent.rng(),
            previous.as_ref().map(|(a, b)| (a.as_str(), b.as_str())),
        );

        let mut events = self.reset_game();
        events.extend(self.start(&config)?);
        Ok(events)
    }

    /// 界面点击入口：轮到电脑时忽略人类的点击。
    pub fn submit_human_move(&mut self, x: usize, y: usize) -> Result<Vec<GameEvent>, RuleError> {
        Coord::new(x, y)?;
        let computer_turn = self
            .state
            .as_ref()
            .map(|state| RuleEngine::next_player(state).is_computer())
            .unwrap_or(false);
        if computer_turn {
            debug!(x, y, "ignoring click during computer turn");
            return Ok(Vec::new());
        }
        self.submit_move(x, y)
    }

    /// 落子。占用的格子、未开局或已结束的对局都静默忽略；越界坐标返回错误。
    pub fn submit_move(&mut self, x: usize, y: usize) -> Result<Vec<GameEvent>, RuleError> {
        let coord = Coord::new(x, y)?;
        let Some(state) = self.state.as_ref() else {
            warn!(x, y, "move submitted before a game was started");
            return Ok(Vec::new());
        };
        if RuleEngine::is_terminal(state) {
            debug!(x, y, "ignoring move after the game ended");
            return Ok(Vec::new());
        }

        let next = match RuleEngine::apply(state, coord) {
            Ok(next) => next,
            Err(RuleError::CellOccupied { .. }) => {
                debug!(x, y, "ignoring move on occupied cell");
                return Ok(Vec::new());
            }
            Err(error) => return Err(error),
        };

        self.cancel_pending();
        self.state = Some(next.clone());

        let mut events = Vec::new();
        self.emit(&mut events, GameEvent::BoardUpdated {
            state: next.clone(),
        });
        self.emit(&mut events, GameEvent::NextPlayerUpdated {
            player: RuleEngine::next_player(&next).clone(),
        });

        if let Some(result) = RuleEngine::winner(&next) {
            info!(winner = result.winner.name(), "game won");
            self.emit(&mut events, GameEvent::GameWon { result });
        } else if RuleEngine::is_terminal(&next) {
            info!("game drawn");
            self.emit(&mut events, GameEvent::GameDrawn);
        } else {
            self.queue_ai_move(&mut events);
        }
        Ok(events)
    }

    pub fn reset_game(&mut self) -> Vec<GameEvent> {
        self.cancel_pending();
        let state = GameState::default();
        self.state = Some(state.clone());
        info!("game reset");

        let mut events = Vec::new();
        self.emit(&mut events, GameEvent::BoardUpdated { state });
        self.emit(&mut events, GameEvent::GameReset);
        events
    }

    /// 调度器到时回调。凭据已过期（被重置或新状态取代）时什么也不做。
    pub fn fire(&mut self, ticket: Ticket) -> Result<Vec<GameEvent>, RuleError> {
        match self.pending {
            Some(pending) if pending.ticket == ticket => {
                self.pending = None;
                self.submit_move(pending.coord.x(), pending.coord.y())
            }
            _ => {
                debug!(ticket, "dropping stale computer move");
                Ok(Vec::new())
            }
        }
    }

    fn queue_ai_move(&mut self, events: &mut Vec<GameEvent>) {
        let Some(state) = self.state.clone() else {
            return;
        };
        if RuleEngine::is_terminal(&state) {
            return;
        }
        let player = RuleEngine::next_player(&state).clone();
        if !player.is_computer() {
            return;
        }

        self.emit(events, GameEvent::AiTurnStarted);
        let Some(decision) = self.plan_ai_move(&state, &player) else {
            return;
        };

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.pending = Some(PendingMove {
            ticket,
            coord: decision.coord,
        });
        debug!(
            ticket,
            player = player.name(),
            coord = %decision.coord,
            strategy = ?decision.strategy,
            "computer move queued"
        );
        let delay = self.agent.config().move_delay();
        self.scheduler.schedule(ticket, delay);
    }

    /// 不完美的电脑玩家按配置的概率随机落子，其余情况走完整搜索。
    fn plan_ai_move(&mut self, state: &GameState, player: &Player) -> Option<AiDecision> {
        let chance = self.agent.config().imperfect_chance;
        if player.is_imperfect() && self.agent.roll() < chance {
            self.agent.random_decision(state)
        } else {
            self.agent.search(state)
        }
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!(ticket = pending.ticket, "cancelling queued computer move");
            self.scheduler.cancel(pending.ticket);
        }
    }

    fn emit(&mut self, events: &mut Vec<GameEvent>, event: GameEvent) {
        for observer in &mut self.observers {
            observer.notify(&event);
        }
        events.push(event);
    }
}
