use serde::Serialize;
use std::collections::VecDeque;

pub const DEFAULT_HISTORY_CAPACITY: usize = 5;
pub const DEFAULT_LABEL_STEP_MS: u64 = 60_000;

const MS_PER_SECOND: u64 = 1_000;
const MS_PER_MINUTE: u64 = 60_000;
const MS_PER_HOUR: u64 = 3_600_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuePoint {
    pub timestamp_ms: i64,
    pub value: f64,
}

impl ValuePoint {
    pub fn new(timestamp_ms: i64, value: f64) -> Self {
        Self {
            timestamp_ms,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayPoint {
    pub label: String,
    pub value: f64,
}

/// Bounded FIFO of observed values, oldest first.
///
/// Labels are derived from position: the newest point is `"Now"` and the
/// point `k` places older is `k * label_step_ms` ago.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySeries {
    points: VecDeque<ValuePoint>,
    capacity: usize,
    label_step_ms: u64,
}

impl Default for HistorySeries {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY, DEFAULT_LABEL_STEP_MS)
    }
}

impl HistorySeries {
    /// A zero capacity is raised to one so the latest value is always kept.
    pub fn new(capacity: usize, label_step_ms: u64) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
            label_step_ms,
        }
    }

    pub fn append(&mut self, point: ValuePoint) {
        self.points.push_back(point);
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    pub fn to_display_sequence(&self) -> impl Iterator<Item = DisplayPoint> + '_ {
        let newest_index = self.points.len().saturating_sub(1);
        self.points.iter().enumerate().map(move |(index, point)| {
            let steps_back = (newest_index - index) as u64;
            DisplayPoint {
                label: relative_label(steps_back.saturating_mul(self.label_step_ms)),
                value: point.value,
            }
        })
    }

    pub fn points(&self) -> impl ExactSizeIterator<Item = &ValuePoint> + '_ {
        self.points.iter()
    }

    pub fn latest(&self) -> Option<&ValuePoint> {
        self.points.back()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

fn relative_label(offset_ms: u64) -> String {
    if offset_ms == 0 {
        return "Now".to_string();
    }
    if offset_ms % MS_PER_HOUR == 0 {
        format!("{}h ago", offset_ms / MS_PER_HOUR)
    } else if offset_ms % MS_PER_MINUTE == 0 {
        format!("{}m ago", offset_ms / MS_PER_MINUTE)
    } else if offset_ms % MS_PER_SECOND == 0 {
        format!("{}s ago", offset_ms / MS_PER_SECOND)
    } else {
        format!("{offset_ms}ms ago")
    }
}
