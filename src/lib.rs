pub mod ai;
pub mod game;
pub mod utils;

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use gloo_timers::callback::Timeout;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use tracing::{debug, error, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::js_sys::Function;

use game::state::GameStateRepr;

pub use ai::{AiAgent, AiConfig, AiDecision, AiStrategy};
pub use game::{
    Board, Control, Coord, GameConfig, GameEvent, GameObserver, GameSession, GameState,
    IntegrityError, ManualScheduler, Player, PlayerConfig, RuleEngine, RuleError, Scheduler,
    Side, Skill, Symbol, Ticket, WinResult,
};

#[cfg(all(feature = "wee_alloc", target_arch = "wasm32"))]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    utils::set_panic_hook();
    utils::init_logging(tracing::Level::INFO);
}

fn to_js_error(error: RuleError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

/// `undefined`/`null` 视为未提供，使用默认值。
fn from_optional<T: DeserializeOwned + Default>(value: JsValue) -> Result<T, JsValue> {
    if value.is_undefined() || value.is_null() {
        Ok(T::default())
    } else {
        from_value(value).map_err(JsValue::from)
    }
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    to_value(value).map_err(JsValue::from)
}

type BrowserSession = GameSession<TimeoutScheduler>;

/// 浏览器端共享的对局：会话本身与 JS 订阅者。
struct Shared {
    session: RefCell<BrowserSession>,
    listeners: RefCell<Vec<Function>>,
}

impl Shared {
    /// 会话借用释放之后才回调 JS，订阅者可以在回调里再次调用对局方法。
    fn dispatch(&self, events: &[GameEvent]) {
        let listeners = self.listeners.borrow().clone();
        if listeners.is_empty() {
            return;
        }
        for event in events {
            let payload = match to_value(event) {
                Ok(payload) => payload,
                Err(error) => {
                    warn!(%error, "failed to serialize game event");
                    continue;
                }
            };
            for listener in &listeners {
                if let Err(thrown) = listener.call1(&JsValue::NULL, &payload) {
                    error!(error = ?thrown, "game listener threw");
                }
            }
        }
    }
}

/// 用浏览器定时器延时触发电脑落子。同一时间最多只有一个待触发的定时器，
/// `cancel` 会丢弃它并清除对应的 `setTimeout`。
struct TimeoutScheduler {
    shared: Weak<Shared>,
    timer: Option<(Ticket, Timeout)>,
}

impl TimeoutScheduler {
    fn new(shared: Weak<Shared>) -> Self {
        Self {
            shared,
            timer: None,
        }
    }

    fn armed(&self) -> Option<Ticket> {
        self.timer.as_ref().map(|(ticket, _)| *ticket)
    }
}

impl Scheduler for TimeoutScheduler {
    fn schedule(&mut self, ticket: Ticket, delay: Duration) {
        let shared = self.shared.clone();
        let millis = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
        // 回调里只派发任务，落子在定时器回调返回之后执行。
        let timeout = Timeout::new(millis, move || {
            spawn_local(async move {
                let Some(shared) = shared.upgrade() else {
                    return;
                };
                let fired = match shared.session.try_borrow_mut() {
                    Ok(mut session) => session.fire(ticket),
                    Err(_) => {
                        warn!(ticket, "session busy, dropping computer move");
                        return;
                    }
                };
                match fired {
                    Ok(events) => shared.dispatch(&events),
                    Err(error) => warn!(%error, ticket, "computer move rejected"),
                }
            });
        });
        self.timer = Some((ticket, timeout));
    }

    fn cancel(&mut self, ticket: Ticket) {
        if self.armed() == Some(ticket) {
            // 丢弃 `Timeout` 即清除 `setTimeout`。
            self.timer = None;
            debug!(ticket, "browser timer cleared");
        }
    }
}

/// 浏览器使用的井字棋对局。
#[wasm_bindgen]
pub struct TicTacToe {
    shared: Rc<Shared>,
}

#[wasm_bindgen]
impl TicTacToe {
    /// `ai_config` 可省略，字段与 `AiConfig` 一致（camelCase）。
    #[wasm_bindgen(constructor)]
    pub fn new(ai_config: JsValue) -> Result<TicTacToe, JsValue> {
        let config: AiConfig = from_optional(ai_config)?;
        let shared = Rc::new_cyclic(|weak: &Weak<Shared>| Shared {
            session: RefCell::new(GameSession::new(
                TimeoutScheduler::new(weak.clone()),
                config,
            )),
            listeners: RefCell::new(Vec::new()),
        });
        Ok(TicTacToe { shared })
    }

    /// 注册通知回调，每个事件调用一次，参数为带 `type` 字段的对象。
    pub fn subscribe(&self, listener: Function) {
        self.shared.listeners.borrow_mut().push(listener);
    }

    pub fn start(&self, config: JsValue) -> Result<JsValue, JsValue> {
        let config: GameConfig = from_optional(config)?;
        self.run(|session| session.start(&config))
    }

    #[wasm_bindgen(js_name = "startDemo")]
    pub fn start_demo(&self) -> Result<JsValue, JsValue> {
        self.run(|session| session.start_demo())
    }

    /// 人类点击入口。占用的格子与电脑回合内的点击被忽略，越界坐标抛出错误。
    #[wasm_bindgen(js_name = "submitMove")]
    pub fn submit_move(&self, x: usize, y: usize) -> Result<JsValue, JsValue> {
        self.run(|session| session.submit_human_move(x, y))
    }

    #[wasm_bindgen(js_name = "resetGame")]
    pub fn reset_game(&self) -> Result<JsValue, JsValue> {
        self.run(|session| Ok(session.reset_game()))
    }

    pub fn state(&self) -> Result<JsValue, JsValue> {
        let session = self.session()?;
        match session.state() {
            Some(state) => to_js(state),
            None => Ok(JsValue::NULL),
        }
    }

    #[wasm_bindgen(js_name = "stateJson")]
    pub fn state_json(&self) -> Result<String, JsValue> {
        let session = self.session()?;
        serde_json::to_string(&session.state()).map_err(serde_to_js_error)
    }

    #[wasm_bindgen(js_name = "pendingMove")]
    pub fn pending_move(&self) -> Result<JsValue, JsValue> {
        let session = self.session()?;
        to_js(&session.pending_move())
    }

    fn session(&self) -> Result<std::cell::Ref<'_, BrowserSession>, JsValue> {
        self.shared
            .session
            .try_borrow()
            .map_err(serde_to_js_error)
    }

    fn run<F>(&self, command: F) -> Result<JsValue, JsValue>
    where
        F: FnOnce(&mut BrowserSession) -> Result<Vec<GameEvent>, RuleError>,
    {
        let events = {
            let mut session = self
                .shared
                .session
                .try_borrow_mut()
                .map_err(serde_to_js_error)?;
            command(&mut session).map_err(to_js_error)?
        };
        self.shared.dispatch(&events);
        to_js(&events)
    }
}

#[wasm_bindgen(js_name = "nextPlayer")]
pub fn next_player(state: JsValue) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    to_js(RuleEngine::next_player(&state))
}

#[wasm_bindgen(js_name = "legalMoves")]
pub fn legal_moves(state: JsValue) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    to_js(&RuleEngine::legal_moves(&state))
}

#[wasm_bindgen(js_name = "applyMove")]
pub fn apply_move(state: JsValue, x: usize, y: usize) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    match RuleEngine::apply_move(&state, x, y) {
        Ok(next) => to_js(&next),
        Err(error) => Err(to_js_error(error)),
    }
}

/// 返回胜利结果；没有胜者时返回 `null`。
#[wasm_bindgen(js_name = "winner")]
pub fn winner(state: JsValue) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    to_js(&RuleEngine::winner(&state))
}

#[wasm_bindgen(js_name = "isTerminal")]
pub fn is_terminal(state: JsValue) -> Result<bool, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    Ok(RuleEngine::is_terminal(&state))
}

/// 完整搜索的结果（含统计）；终局时返回 `null`。
#[wasm_bindgen(js_name = "computeBestMove")]
pub fn compute_best_move(state: JsValue, ai_config: JsValue) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    let config: AiConfig = from_optional(ai_config)?;
    let mut agent = AiAgent::new(config);
    to_js(&agent.search(&state))
}

#[wasm_bindgen(js_name = "computeRandomMove")]
pub fn compute_random_move(state: JsValue) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    let mut agent = AiAgent::new(AiConfig::default());
    to_js(&agent.random_move(&state))
}

/// 校验外部传入的状态，不合法时以 `IntegrityViolation` 形式抛出具体原因。
#[wasm_bindgen(js_name = "validateState")]
pub fn validate_state(state: JsValue) -> Result<(), JsValue> {
    let repr: GameStateRepr = from_value(state).map_err(JsValue::from)?;
    GameState::try_from(repr).map_err(|error| to_js_error(RuleError::from(error)))?;
    Ok(())
}
