//! Leveled alert events and the bus that carries them to notifiers

pub mod bus;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use bus::{EventBus, EventHandler, SubscriptionId};

/// Severity tag carried by an event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Level {
    /// Count at or below the alert limit
    Info,
    /// Count above the alert limit
    Breach,
    /// Any other level a custom alert chooses to emit
    Custom(String),
}

impl Level {
    pub fn as_str(&self) -> &str {
        match self {
            Level::Info => "info",
            Level::Breach => "breach",
            Level::Custom(name) => name,
        }
    }
}

impl From<String> for Level {
    /// Level names are case-insensitive and stored lowercase
    fn from(s: String) -> Self {
        let name = s.to_ascii_lowercase();
        match name.as_str() {
            "info" => Level::Info,
            "breach" => Level::Breach,
            _ => Level::Custom(name),
        }
    }
}

impl From<&str> for Level {
    fn from(s: &str) -> Self {
        Level::from(s.to_string())
    }
}

impl From<Level> for String {
    fn from(level: Level) -> Self {
        level.as_str().to_string()
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry in a notification binding's `levels` list.
///
/// `"all"` is a wildcard marker, never a level an event carries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LevelFilter {
    All,
    Level(Level),
}

impl LevelFilter {
    /// Whether an event with this level passes a binding holding `filters`
    pub fn admits(filters: &[LevelFilter], level: Option<&Level>) -> bool {
        if filters.contains(&LevelFilter::All) {
            return true;
        }
        match level {
            Some(level) => filters.iter().any(|f| match f {
                LevelFilter::Level(l) => l.as_str().eq_ignore_ascii_case(level.as_str()),
                LevelFilter::All => false,
            }),
            None => false,
        }
    }
}

impl From<String> for LevelFilter {
    fn from(s: String) -> Self {
        if s.eq_ignore_ascii_case("all") {
            LevelFilter::All
        } else {
            LevelFilter::Level(Level::from(s))
        }
    }
}

impl From<&str> for LevelFilter {
    fn from(s: &str) -> Self {
        LevelFilter::from(s.to_string())
    }
}

impl From<LevelFilter> for String {
    fn from(filter: LevelFilter) -> Self {
        match filter {
            LevelFilter::All => "all".to_string(),
            LevelFilter::Level(level) => level.into(),
        }
    }
}

/// Payload published once per tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
    pub info: EventDetails,
}

/// Body of an event: the error count plus free-form context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDetails {
    pub errors: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EventInfo {
    pub fn new(level: Level, errors: u64) -> Self {
        Self {
            level: Some(level),
            info: EventDetails {
                errors,
                extra: Map::new(),
            },
        }
    }

    /// Attach a context field to `info`
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.info.extra.insert(key.into(), value.into());
        self
    }
}
