//! Filament usage extraction and the append-only usage record.
//!
//! Slicers embed per-extruder consumption in print files as a comment such
//! as `; filament used [g] = 12.50, 0.00, 3.20`. Position `i` in the list is
//! toolhead `i`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{DeviceId, SpoolId, ToolheadIndex};

/// Marker token introducing the per-toolhead mass list.
pub const USAGE_MARKER: &str = "filament used [g]";

/// Consumed mass in grams keyed by toolhead. Only strictly positive, finite
/// values are kept.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UsageByToolhead(BTreeMap<ToolheadIndex, f64>);

impl UsageByToolhead {
    /// Empty usage map.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Record usage for a toolhead, ignoring non-positive or non-finite mass.
    pub fn insert(&mut self, toolhead: ToolheadIndex, grams: f64) {
        if grams.is_finite() && grams > 0.0 {
            self.0.insert(toolhead, grams);
        }
    }

    /// Mass recorded for a toolhead.
    #[must_use]
    pub fn get(&self, toolhead: ToolheadIndex) -> Option<f64> {
        self.0.get(&toolhead).copied()
    }

    /// Whether no usage was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of toolheads with usage.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate toolheads in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (ToolheadIndex, f64)> + '_ {
        self.0.iter().map(|(toolhead, grams)| (*toolhead, *grams))
    }

    /// Drop toolheads for which `keep` returns false.
    #[must_use]
    pub fn filtered(mut self, mut keep: impl FnMut(ToolheadIndex) -> bool) -> Self {
        self.0.retain(|toolhead, _| keep(*toolhead));
        self
    }
}

impl FromIterator<(ToolheadIndex, f64)> for UsageByToolhead {
    fn from_iter<T: IntoIterator<Item = (ToolheadIndex, f64)>>(iter: T) -> Self {
        let mut usage = Self::new();
        for (toolhead, grams) in iter {
            usage.insert(toolhead, grams);
        }
        usage
    }
}

/// Extract per-toolhead filament usage from a print-file payload.
///
/// Returns an empty map when the marker is absent; callers treat that as
/// "no usage data" rather than a failure. When several marker lines exist the
/// last one wins, matching slicers that append the summary at the end of the
/// file. Lines starting with `total filament used [g]` are not matched.
///
/// # Examples
/// ```
/// use spoolkeeper::domain::{extract_usage, ToolheadIndex};
///
/// let usage = extract_usage(b"G1 X0\n; filament used [g]=12.5,0,3.2\n");
/// assert_eq!(usage.get(ToolheadIndex::new(0)), Some(12.5));
/// assert_eq!(usage.get(ToolheadIndex::new(1)), None);
/// assert_eq!(usage.get(ToolheadIndex::new(2)), Some(3.2));
/// ```
#[must_use]
pub fn extract_usage(payload: &[u8]) -> UsageByToolhead {
    payload
        .split(|byte| *byte == b'\n')
        .filter_map(parse_marker_line)
        .last()
        .unwrap_or_default()
}

fn parse_marker_line(line: &[u8]) -> Option<UsageByToolhead> {
    let text = String::from_utf8_lossy(line);
    let body = text.trim_start().trim_start_matches(';').trim_start();
    let rest = body.strip_prefix(USAGE_MARKER)?;
    let values = rest.trim_start().strip_prefix('=')?;
    Some(parse_mass_list(values))
}

fn parse_mass_list(values: &str) -> UsageByToolhead {
    let mut usage = UsageByToolhead::new();
    for (position, raw) in values.split(',').enumerate() {
        let Ok(index) = u16::try_from(position) else {
            break;
        };
        if let Ok(grams) = raw.trim().parse::<f64>() {
            usage.insert(ToolheadIndex::new(index), grams);
        }
    }
    usage
}

/// One successfully applied consumption delta.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageEvent {
    /// Event identifier.
    pub id: Uuid,
    /// Device that consumed the filament.
    pub device_id: DeviceId,
    /// Toolhead that consumed the filament.
    pub toolhead: ToolheadIndex,
    /// Spool the mass was deducted from.
    pub spool_id: SpoolId,
    /// Consumed mass in grams.
    pub grams: f64,
    /// File label of the print (or the manual trigger label).
    pub job_label: String,
    /// When the delta was applied.
    pub recorded_at: DateTime<Utc>,
}

/// Filter for listing usage history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageEventFilter {
    /// Restrict to one device.
    pub device_id: Option<DeviceId>,
    /// Maximum number of events, newest first.
    pub limit: usize,
}

impl Default for UsageEventFilter {
    fn default() -> Self {
        Self {
            device_id: None,
            limit: DEFAULT_USAGE_LIMIT,
        }
    }
}

/// Default page size for usage history.
pub const DEFAULT_USAGE_LIMIT: usize = 50;
/// Upper bound on usage history page size.
pub const MAX_USAGE_LIMIT: usize = 500;
