//! Common types for the transport layer

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Number of axis values in every control message
pub const AXIS_COUNT: usize = 8;

/// Number of button states in every control message
pub const BUTTON_COUNT: usize = 13;

/// Topic name used when none is configured
pub const DEFAULT_TOPIC: &str = "joy";

/// Wall-clock timestamp, seconds + nanoseconds since the Unix epoch
///
/// Field order matters: the derived `Ord` compares `sec` first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Stamp {
    pub sec: i32,
    pub nanosec: u32,
}

impl Stamp {
    /// Build a stamp from a duration since the epoch, saturating at `i32::MAX` seconds
    pub fn from_duration(d: Duration) -> Self {
        Self {
            sec: i32::try_from(d.as_secs()).unwrap_or(i32::MAX),
            nanosec: d.subsec_nanos(),
        }
    }

    /// Current wall-clock time (the zero stamp if the clock is before 1970)
    pub fn now() -> Self {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(Self::from_duration)
            .unwrap_or_default()
    }
}

/// Message header
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub stamp: Stamp,
    pub frame_id: String,
}

/// Joystick-shaped control message
///
/// Axis and button counts are fixed by the array types, so every emitted
/// message carries exactly [`AXIS_COUNT`] axes and [`BUTTON_COUNT`] buttons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlMessage {
    pub header: Header,
    pub axes: [f32; AXIS_COUNT],
    pub buttons: [i32; BUTTON_COUNT],
}

impl ControlMessage {
    /// All axes at 0.0, all buttons released
    pub fn new(frame_id: impl Into<String>) -> Self {
        Self {
            header: Header {
                stamp: Stamp::default(),
                frame_id: frame_id.into(),
            },
            axes: [0.0; AXIS_COUNT],
            buttons: [0; BUTTON_COUNT],
        }
    }
}

impl Default for ControlMessage {
    fn default() -> Self {
        Self::new("")
    }
}
