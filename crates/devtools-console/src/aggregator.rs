use crossbeam_channel::{bounded, select, unbounded, Sender as CbSender};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use crate::hub::{ConsoleEvent, ConsoleLevel, EventHub, HubEvent};
use crate::value::Value;

static UNDEFINED: Value = Value::Undefined;

/// One line of console output.
///
/// `repeat` counts how many more times the same single-primitive message
/// arrived right after the first one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: u64,
    pub level: ConsoleLevel,
    pub args: Vec<Value>,
    pub repeat: u32,
}

impl LogEntry {
    /// The value the console displays, the first argument.
    pub fn value(&self) -> &Value {
        self.args.first().unwrap_or(&UNDEFINED)
    }

    pub fn occurrences(&self) -> u32 {
        self.repeat + 1
    }

    fn repeated(&self) -> Self {
        Self {
            repeat: self.repeat + 1,
            ..self.clone()
        }
    }
}

/// The last single-primitive message, used to extend a run.
#[derive(Debug, Clone)]
struct RunTracker {
    level: ConsoleLevel,
    value: Value,
}

impl RunTracker {
    fn continues(&self, level: ConsoleLevel, value: &Value) -> bool {
        self.level == level && self.value.strict_eq(value)
    }
}

/// Ordered, deduplicated console log.
///
/// Entries are never mutated in place: a repeat swaps the last entry for a new
/// `Arc`, so observers can detect changes with [`Arc::ptr_eq`].
#[derive(Debug, Default)]
pub struct ConsoleLog {
    entries: Vec<Arc<LogEntry>>,
    run: Option<RunTracker>,
    next_id: u64,
    revision: u64,
}

impl ConsoleLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: ConsoleEvent, timestamp: u64) {
        match event {
            ConsoleEvent::Message { level, args } => self.push(level, args, timestamp),
            ConsoleEvent::Clear => self.clear(),
        }
    }

    /// Appends a message, or extends the current run.
    ///
    /// A message without arguments is stored as a single `undefined` and
    /// always starts a new entry.
    pub fn push(&mut self, level: ConsoleLevel, args: Vec<Value>, timestamp: u64) {
        if args.is_empty() {
            self.run = None;
            self.append(level, vec![Value::Undefined], timestamp);
            return;
        }

        let single_primitive = match args.as_slice() {
            [value] if value.is_primitive() => Some(value),
            _ => None,
        };

        if let Some(value) = single_primitive {
            let continues = self
                .run
                .as_ref()
                .is_some_and(|run| run.continues(level, value));
            if continues {
                if let Some(last) = self.entries.last_mut() {
                    *last = Arc::new(last.repeated());
                    self.revision += 1;
                    tracing::trace!(id = last.id, repeat = last.repeat, "console run extended");
                    return;
                }
            }
            self.run = Some(RunTracker {
                level,
                value: value.clone(),
            });
        } else {
            self.run = None;
        }

        self.append(level, args, timestamp);
    }

    fn append(&mut self, level: ConsoleLevel, args: Vec<Value>, timestamp: u64) {
        let entry = LogEntry {
            id: self.next_id,
            timestamp,
            level,
            args,
            repeat: 0,
        };
        self.next_id += 1;
        self.revision += 1;
        tracing::trace!(id = entry.id, level = %entry.level, "console entry appended");
        self.entries.push(Arc::new(entry));
    }

    /// Empties the log and ends the current run.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.run = None;
        self.revision += 1;
        tracing::debug!("console cleared");
    }

    pub fn entries(&self) -> &[Arc<LogEntry>] {
        &self.entries
    }

    pub fn get(&self, id: u64) -> Option<&Arc<LogEntry>> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Increments on every change to the log.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

enum Control {
    Flush(CbSender<()>),
    Clear,
}

struct Shared {
    log: RwLock<ConsoleLog>,
    control: CbSender<Control>,
    started: Instant,
}

/// Applies hub events to a shared [`ConsoleLog`] on a `console-collector`
/// thread. Cheap to clone.
#[derive(Clone)]
pub struct ConsoleAggregator {
    shared: Arc<Shared>,
}

impl ConsoleAggregator {
    /// Subscribes to `hub` and starts collecting.
    pub fn spawn(hub: &EventHub) -> std::io::Result<Self> {
        let events = hub.subscribe();
        let (control_tx, control_rx) = unbounded::<Control>();

        let shared = Arc::new(Shared {
            log: RwLock::new(ConsoleLog::new()),
            control: control_tx,
            started: Instant::now(),
        });

        // The thread only holds a weak reference so dropping every
        // aggregator handle closes the control channel and stops it.
        let weak = Arc::downgrade(&shared);
        let started = shared.started;

        std::thread::Builder::new()
            .name("console-collector".into())
            .spawn(move || {
                let apply = |event: HubEvent| {
                    let Some(event) = ConsoleEvent::from_hub(&event) else {
                        return;
                    };
                    if let Some(shared) = weak.upgrade() {
                        let timestamp = started.elapsed().as_nanos() as u64;
                        write(&shared.log).apply(event, timestamp);
                    }
                };

                loop {
                    select! {
                        recv(events) -> msg => match msg {
                            Ok(event) => apply(event),
                            Err(_) => break,
                        },
                        recv(control_rx) -> msg => match msg {
                            Ok(Control::Flush(ack)) => {
                                while let Ok(event) = events.try_recv() {
                                    apply(event);
                                }
                                let _ = ack.send(());
                            }
                            Ok(Control::Clear) => {
                                while let Ok(event) = events.try_recv() {
                                    apply(event);
                                }
                                if let Some(shared) = weak.upgrade() {
                                    write(&shared.log).clear();
                                }
                            }
                            Err(_) => break,
                        },
                    }
                }
                tracing::debug!("console collector stopped");
            })?;

        Ok(Self { shared })
    }

    /// Waits until every event emitted so far has been applied.
    pub fn flush(&self, timeout: Duration) -> bool {
        let (ack_tx, ack_rx) = bounded(1);
        if self.shared.control.send(Control::Flush(ack_tx)).is_err() {
            return false;
        }
        ack_rx.recv_timeout(timeout).is_ok()
    }

    /// Clears the log after applying events already emitted.
    pub fn clear(&self) {
        let _ = self.shared.control.send(Control::Clear);
    }

    pub fn snapshot(&self) -> Vec<Arc<LogEntry>> {
        read(&self.shared.log).entries().to_vec()
    }

    pub fn entry(&self, id: u64) -> Option<Arc<LogEntry>> {
        read(&self.shared.log).get(id).cloned()
    }

    pub fn revision(&self) -> u64 {
        read(&self.shared.log).revision()
    }

    pub fn uptime(&self) -> Duration {
        self.shared.started.elapsed()
    }
}

/// Entries as served over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleJson {
    pub revision: u64,
    pub current_elapsed_ns: u64,
    pub entries: Vec<LogEntry>,
}

impl ConsoleAggregator {
    pub fn to_json(&self) -> ConsoleJson {
        let log = read(&self.shared.log);
        ConsoleJson {
            revision: log.revision(),
            current_elapsed_ns: self.uptime().as_nanos() as u64,
            entries: log.entries().iter().map(|e| LogEntry::clone(e)).collect(),
        }
    }
}

fn read(lock: &RwLock<ConsoleLog>) -> RwLockReadGuard<'_, ConsoleLog> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(lock: &RwLock<ConsoleLog>) -> RwLockWriteGuard<'_, ConsoleLog> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
