use std::str::FromStr;

use rand::Rng;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use super::board::Symbol;
use super::state::Side;

/// 演示对局使用的角色名与记号，每组两人分别坐 A、B 两侧。
pub const DEMO_PAIRS: [[(&str, &str); 2]; 9] = [
    [("Alice", "🔑"), ("Bob", "🔒")],
    [("Dipper", "🧢"), ("Mabel", "🌈")],
    [("Wallace", "🧀"), ("Gromit", "🦴")],
    [("Fry", "🚀"), ("Bender", "🤖")],
    [("Tom", "🐱"), ("Jerry", "🐭")],
    [("Finn", "🎒"), ("Jake", "🐶")],
    [("Ralph", "🏅"), ("Vanellope", "🦄")],
    [("Buzz", "🧑‍🚀"), ("Woody", "🤠")],
    [("Sven", "🦌"), ("Olaf", "☃️")],
];

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Control {
    #[default]
    Human,
    #[serde(alias = "ai")]
    Computer,
}

impl FromStr for Control {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" => Ok(Control::Human),
            "computer" | "ai" | "cpu" => Ok(Control::Computer),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Skill {
    #[default]
    Optimal,
    Imperfect,
}

impl FromStr for Skill {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "optimal" | "perfect" => Ok(Skill::Optimal),
            "imperfect" => Ok(Skill::Imperfect),
            _ => Err(()),
        }
    }
}

/// 一局游戏中的玩家，创建后不可修改。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    name: String,
    symbol: Symbol,
    #[serde(default)]
    control: Control,
    #[serde(default)]
    skill: Skill,
}

impl Player {
    pub fn new(name: impl Into<String>, symbol: Symbol, control: Control, skill: Skill) -> Self {
        Self {
            name: name.into(),
            symbol,
            control,
            skill,
        }
    }

    /// 某一侧的默认玩家：A 为 "Player 1"/"X"，B 为 "Player 2"/"O"，均为人类。
    pub fn default_for(side: Side) -> Self {
        Self::from_config(side, &PlayerConfig::default())
    }

    /// 按配置构造玩家，缺失或为空的字段使用该侧的默认值。
    pub fn from_config(side: Side, config: &PlayerConfig) -> Self {
        let (default_name, default_symbol) = match side {
            Side::A => ("Player 1", "X"),
            Side::B => ("Player 2", "O"),
        };
        Self {
            name: config
                .name
                .clone()
                .unwrap_or_else(|| default_name.to_string()),
            symbol: config
                .symbol
                .clone()
                .map(Symbol::from)
                .unwrap_or_else(|| Symbol::from(default_symbol)),
            control: config.control.unwrap_or_default(),
            skill: config.skill.unwrap_or_default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn control(&self) -> Control {
        self.control
    }

    pub fn skill(&self) -> Skill {
        self.skill
    }

    pub fn is_computer(&self) -> bool {
        self.control == Control::Computer
    }

    pub fn is_imperfect(&self) -> bool {
        self.skill == Skill::Imperfect
    }
}

/// 单个玩家的开局配置。所有字段都可以缺省或留空。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerConfig {
    #[serde(deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub control: Option<Control>,
    #[serde(deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub skill: Option<Skill>,
}

impl PlayerConfig {
    pub fn computer(skill: Skill) -> Self {
        Self {
            control: Some(Control::Computer),
            skill: Some(skill),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }
}

/// `start` 接收的开局配置。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct GameConfig {
    pub player_a: PlayerConfig,
    pub player_b: PlayerConfig,
}

impl GameConfig {
    pub fn new(player_a: PlayerConfig, player_b: PlayerConfig) -> Self {
        Self { player_a, player_b }
    }

    pub fn players(&self) -> (Player, Player) {
        (
            Player::from_config(Side::A, &self.player_a),
            Player::from_config(Side::B, &self.player_b),
        )
    }

    /// 随机挑选一组演示角色，双方都是不完美的电脑玩家。
    ///
    /// `previous` 为当前对局的双方名字，抽到同一组时重新抽取。
    pub fn demo<R: Rng + ?Sized>(rng: &mut R, previous: Option<(&str, &str)>) -> Self {
        let pair = loop {
            let candidate = &DEMO_PAIRS[rng.gen_range(0..DEMO_PAIRS.len())];
            let repeats = previous
                .map(|(a, b)| a == candidate[0].0 && b == candidate[1].0)
                .unwrap_or(false);
            if !repeats {
                break candidate;
            }
        };

        let [(name_a, symbol_a), (name_b, symbol_b)] = *pair;
        Self {
            player_a: PlayerConfig::computer(Skill::Imperfect)
                .with_name(name_a)
                .with_symbol(symbol_a),
            player_b: PlayerConfig::computer(Skill::Imperfect)
                .with_name(name_b)
                .with_symbol(symbol_b),
        }
    }
}

/// 把缺失、`null` 或空白字符串都当作未填写。
fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("unrecognized value `{value}`"))),
    }
}
