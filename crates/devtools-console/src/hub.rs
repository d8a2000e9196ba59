use crossbeam_channel::{unbounded, Receiver as CbReceiver, Sender as CbSender};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

use crate::value::Value;

pub const EVENT_LOG: &str = "log";
pub const EVENT_INFO: &str = "info";
pub const EVENT_WARN: &str = "warn";
pub const EVENT_ERROR: &str = "error";
pub const EVENT_CLEAR: &str = "console-clear";

/// A named event as published by the sandboxed runner.
#[derive(Debug, Clone, PartialEq)]
pub struct HubEvent {
    pub name: String,
    pub detail: Vec<Value>,
}

/// Named-event publish/subscribe surface between the runner and the console.
///
/// Every subscriber receives every event in emission order.
#[derive(Clone, Default)]
pub struct EventHub {
    subscribers: Arc<RwLock<Vec<CbSender<HubEvent>>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> CbReceiver<HubEvent> {
        let (tx, rx) = unbounded();
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn emit(&self, name: &str, detail: Vec<Value>) {
        let event = HubEvent {
            name: name.to_string(),
            detail,
        };
        let mut closed = Vec::new();
        {
            let subscribers = self.subscribers.read().unwrap_or_else(PoisonError::into_inner);
            for tx in subscribers.iter() {
                if tx.send(event.clone()).is_err() {
                    closed.push(tx.clone());
                }
            }
        }
        if !closed.is_empty() {
            self.subscribers
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|tx| !closed.iter().any(|gone| gone.same_channel(tx)));
        }
    }

    pub fn log(&self, args: Vec<Value>) {
        self.emit(EVENT_LOG, args);
    }

    pub fn info(&self, args: Vec<Value>) {
        self.emit(EVENT_INFO, args);
    }

    pub fn warn(&self, args: Vec<Value>) {
        self.emit(EVENT_WARN, args);
    }

    pub fn error(&self, args: Vec<Value>) {
        self.emit(EVENT_ERROR, args);
    }

    pub fn clear(&self) {
        self.emit(EVENT_CLEAR, Vec::new());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Severity of a console message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConsoleLevel {
    #[default]
    Log,
    Info,
    Warn,
    Error,
}

impl ConsoleLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsoleLevel::Log => EVENT_LOG,
            ConsoleLevel::Info => EVENT_INFO,
            ConsoleLevel::Warn => EVENT_WARN,
            ConsoleLevel::Error => EVENT_ERROR,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            EVENT_LOG => Some(ConsoleLevel::Log),
            EVENT_INFO => Some(ConsoleLevel::Info),
            EVENT_WARN => Some(ConsoleLevel::Warn),
            EVENT_ERROR => Some(ConsoleLevel::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ConsoleLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ConsoleLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ConsoleLevel::from_name(&s).ok_or_else(|| serde::de::Error::custom("invalid console level"))
    }
}

/// Console-relevant hub events.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleEvent {
    Message { level: ConsoleLevel, args: Vec<Value> },
    Clear,
}

impl ConsoleEvent {
    /// Maps a hub event, ignoring names the console does not listen to.
    ///
    /// Arguments pass through untouched; the log decides how an empty call is
    /// stored.
    pub fn from_hub(event: &HubEvent) -> Option<Self> {
        if event.name == EVENT_CLEAR {
            return Some(ConsoleEvent::Clear);
        }
        let level = ConsoleLevel::from_name(&event.name)?;
        Some(ConsoleEvent::Message {
            level,
            args: event.detail.clone(),
        })
    }
}
