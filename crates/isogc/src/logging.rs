//! Region Logging and Diagnostics
//!
//! Diagnostics flow through an explicitly injected [`GcEventSink`]: a heap
//! built with [`Heap::with_sink`](crate::Heap::with_sink) reports every
//! region event to it, a heap built without one reports nothing. The `log`
//! facade is emitted alongside for ordinary application logging.
//!
//! Log Levels:
//! - ERROR: Allocation failures
//! - INFO: Collections, merges, root swaps, region creation and release
//! - DEBUG: Cycle starts, subregion discovery and release
//! - TRACE: Per-object finalisation and deallocation

use crate::object::ObjectId;
use crate::region::RegionKind;
use crate::stats::GcCycleStats;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Log level for region events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

/// Region event types
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GcEvent {
    /// A region was created with `root` as its iso
    RegionCreated {
        region: ObjectId,
        root: ObjectId,
        kind: RegionKind,
    },

    /// Trace region collection started
    CycleStart {
        region: ObjectId,
        root: ObjectId,
        bytes: usize,
    },

    /// Trace region collection completed
    CycleEnd { stats: GcCycleStats },

    /// A finaliser ran
    Finalised {
        object: ObjectId,
        type_name: &'static str,
    },

    /// A heap node was freed
    Deallocated {
        object: ObjectId,
        type_name: &'static str,
    },

    /// A dead object was found owning a subregion
    SubregionDiscovered { owner: ObjectId, subregion: ObjectId },

    /// An unreachable subregion was released
    SubregionReleased { root: ObjectId, kind: RegionKind },

    /// A whole region was released through `Region::release`
    RegionReleased {
        root: ObjectId,
        objects_freed: usize,
        subregions_released: usize,
    },

    /// The region of `absorbed` was merged into the region of `into`
    Merged {
        into: ObjectId,
        absorbed: ObjectId,
        bytes: usize,
    },

    /// The root of a region changed
    RootSwapped {
        region: ObjectId,
        old_root: ObjectId,
        new_root: ObjectId,
        rings_swapped: bool,
    },

    /// Allocation refused by the heap budget
    AllocationFailure { requested: usize, available: usize },
}

impl GcEvent {
    /// Severity of the event
    pub fn level(&self) -> LogLevel {
        match self {
            GcEvent::AllocationFailure { .. } => LogLevel::Error,
            GcEvent::RegionCreated { .. }
            | GcEvent::CycleEnd { .. }
            | GcEvent::RegionReleased { .. }
            | GcEvent::Merged { .. }
            | GcEvent::RootSwapped { .. } => LogLevel::Info,
            GcEvent::CycleStart { .. }
            | GcEvent::SubregionDiscovered { .. }
            | GcEvent::SubregionReleased { .. } => LogLevel::Debug,
            GcEvent::Finalised { .. } | GcEvent::Deallocated { .. } => LogLevel::Trace,
        }
    }
}

impl fmt::Display for GcEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GcEvent::RegionCreated { region, root, kind } => {
                write!(f, "[GC] {:?} region {} created, root {}", kind, region, root)
            },
            GcEvent::CycleStart {
                region,
                root,
                bytes,
            } => write!(
                f,
                "[GC] Region {} collection started from {} ({} bytes)",
                region, root, bytes
            ),
            GcEvent::CycleEnd { stats } => write!(
                f,
                "[GC] Region collection completed: marked {}, swept {}, {} -> {} bytes, {} subregions released ({} ns)",
                stats.objects_marked,
                stats.objects_swept,
                stats.bytes_before,
                stats.bytes_after,
                stats.subregions_released,
                stats.duration_ns
            ),
            GcEvent::Finalised { object, type_name } => {
                write!(f, "[GC] Finalised {} ({})", object, type_name)
            },
            GcEvent::Deallocated { object, type_name } => {
                write!(f, "[GC] Deallocated {} ({})", object, type_name)
            },
            GcEvent::SubregionDiscovered { owner, subregion } => {
                write!(f, "[GC] Dead {} owns subregion {}", owner, subregion)
            },
            GcEvent::SubregionReleased { root, kind } => {
                write!(f, "[GC] Released unreachable {:?} subregion {}", kind, root)
            },
            GcEvent::RegionReleased {
                root,
                objects_freed,
                subregions_released,
            } => write!(
                f,
                "[GC] Region {} released: {} objects, {} subregions",
                root, objects_freed, subregions_released
            ),
            GcEvent::Merged {
                into,
                absorbed,
                bytes,
            } => write!(
                f,
                "[GC] Merged region of {} into region of {} ({} bytes)",
                absorbed, into, bytes
            ),
            GcEvent::RootSwapped {
                region,
                old_root,
                new_root,
                rings_swapped,
            } => write!(
                f,
                "[GC] Region {} root {} -> {}{}",
                region,
                old_root,
                new_root,
                if *rings_swapped { " (rings swapped)" } else { "" }
            ),
            GcEvent::AllocationFailure {
                requested,
                available,
            } => write!(
                f,
                "[GC] Allocation failure: {} bytes requested, {} available",
                requested, available
            ),
        }
    }
}

/// Receiver of region events
///
/// Implementations must tolerate being called from the owner of a heap while
/// observers on other threads read what was recorded.
pub trait GcEventSink: Send + Sync {
    fn record(&self, event: &GcEvent);
}

/// GC Logger configuration
#[derive(Debug, Clone)]
pub struct GcLoggerConfig {
    /// Minimum log level
    pub level: LogLevel,

    /// Enable console output
    pub console: bool,

    /// Enable JSON format
    pub json: bool,

    /// Enable timestamps
    pub timestamps: bool,
}

impl Default for GcLoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            console: true,
            json: false,
            timestamps: true,
        }
    }
}

impl GcLoggerConfig {
    /// Record everything, print nothing
    pub fn recording() -> Self {
        Self {
            level: LogLevel::Trace,
            console: false,
            json: false,
            timestamps: false,
        }
    }
}

/// GC Logger - recording event sink with optional console echo
pub struct GcLogger {
    config: GcLoggerConfig,
    events: Mutex<Vec<(Instant, GcEvent)>>,
    enabled: AtomicBool,
}

impl GcLogger {
    /// Create new GC logger
    pub fn new(config: GcLoggerConfig) -> Self {
        Self {
            config,
            events: Mutex::new(Vec::new()),
            enabled: AtomicBool::new(true),
        }
    }

    /// Enable logging
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    /// Disable logging
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    /// Check if logging is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Log a region event
    pub fn log(&self, event: GcEvent) {
        if !self.is_enabled() || event.level() > self.config.level {
            return;
        }

        if self.config.console {
            self.output_console(&event);
        }

        self.events.lock().push((Instant::now(), event));
    }

    /// Output to console
    fn output_console(&self, event: &GcEvent) {
        let line = if self.config.json {
            match serde_json::to_string(event) {
                Ok(json) => json,
                Err(_) => return,
            }
        } else {
            event.to_string()
        };

        if self.config.timestamps {
            let now = chrono::Local::now();
            print!("[{}] ", now.format("%Y-%m-%d %H:%M:%S%.3f"));
        }

        if event.level() == LogLevel::Error {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }

    /// Get all events
    pub fn events(&self) -> Vec<GcEvent> {
        self.events.lock().iter().map(|(_, e)| e.clone()).collect()
    }

    /// Get all events with the instant they were recorded
    pub fn timed_events(&self) -> Vec<(Instant, GcEvent)> {
        self.events.lock().clone()
    }

    /// Clear all events
    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    /// Get event count
    pub fn event_count(&self) -> usize {
        self.events.lock().len()
    }

    /// Objects whose finaliser ran, in order
    pub fn finalised(&self) -> Vec<ObjectId> {
        self.events
            .lock()
            .iter()
            .filter_map(|(_, e)| match e {
                GcEvent::Finalised { object, .. } => Some(*object),
                _ => None,
            })
            .collect()
    }

    /// Freed heap nodes, in order
    pub fn deallocated(&self) -> Vec<ObjectId> {
        self.events
            .lock()
            .iter()
            .filter_map(|(_, e)| match e {
                GcEvent::Deallocated { object, .. } => Some(*object),
                _ => None,
            })
            .collect()
    }

    /// Export recorded events as a JSON array
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.events())
    }
}

impl Default for GcLogger {
    fn default() -> Self {
        Self::new(GcLoggerConfig::default())
    }
}

impl GcEventSink for GcLogger {
    fn record(&self, event: &GcEvent) {
        self.log(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(i: u32) -> ObjectId {
        ObjectId::new(i, 0)
    }

    #[test]
    fn test_gc_logger_basic() {
        let logger = GcLogger::new(GcLoggerConfig::recording());

        logger.log(GcEvent::Finalised {
            object: id(1),
            type_name: "node",
        });
        logger.log(GcEvent::Deallocated {
            object: id(1),
            type_name: "node",
        });

        assert_eq!(logger.event_count(), 2);
        assert_eq!(logger.finalised(), vec![id(1)]);
        assert_eq!(logger.deallocated(), vec![id(1)]);

        logger.clear_events();
        assert_eq!(logger.event_count(), 0);
    }

    #[test]
    fn test_gc_logger_disable() {
        let logger = GcLogger::new(GcLoggerConfig::recording());

        logger.disable();
        logger.log(GcEvent::SubregionReleased {
            root: id(2),
            kind: RegionKind::Trace,
        });
        assert_eq!(logger.event_count(), 0);

        logger.enable();
        logger.record(&GcEvent::SubregionReleased {
            root: id(2),
            kind: RegionKind::Trace,
        });
        assert_eq!(logger.event_count(), 1);
    }

    #[test]
    fn test_level_filter() {
        let logger = GcLogger::new(GcLoggerConfig {
            level: LogLevel::Info,
            ..GcLoggerConfig::recording()
        });

        logger.log(GcEvent::Deallocated {
            object: id(3),
            type_name: "node",
        });
        logger.log(GcEvent::AllocationFailure {
            requested: 64,
            available: 0,
        });

        assert_eq!(logger.event_count(), 1);
    }

    #[test]
    fn test_json_export() {
        let logger = GcLogger::new(GcLoggerConfig::recording());
        logger.log(GcEvent::Merged {
            into: id(1),
            absorbed: id(2),
            bytes: 48,
        });

        let json = logger.to_json().unwrap();
        assert!(json.contains("\"type\":\"merged\""));
        assert!(json.contains("\"bytes\":48"));
    }

    #[test]
    fn test_human_format() {
        let event = GcEvent::RootSwapped {
            region: id(1),
            old_root: id(2),
            new_root: id(3),
            rings_swapped: true,
        };
        assert_eq!(
            event.to_string(),
            "[GC] Region #1.0 root #2.0 -> #3.0 (rings swapped)"
        );
    }
}
