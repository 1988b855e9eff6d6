//! Shared data structures for the mesh latency dashboard.

use std::collections::HashMap;
use std::fmt;

/// Number of probe rounds each peer is sampled for.
pub const ROUNDS: usize = 10;

pub const LOCAL_PATH: &str = "Local Machine";
pub const NO_PATH: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub name: String,
    pub address: String,
}

impl Peer {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathTag {
    Idle,
    Direct,
    Relay,
}

impl PathTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathTag::Idle => "Idle",
            PathTag::Direct => "Direct",
            PathTag::Relay => "Relay",
        }
    }
}

impl fmt::Display for PathTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayColor {
    Gray,
    Green,
    Red,
    Yellow,
    White,
}

/// Outcome of classifying one round's transport path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathClass {
    pub tag: PathTag,
    /// Replacement path descriptor; `None` keeps whatever was shown before.
    pub detail: Option<String>,
}

/// Live sampling record for one peer.
///
/// `latencies` holds one entry per finished round: `Some(ms)` for a reply,
/// `None` for a lost round.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub latencies: Vec<Option<u32>>,
    pub done: bool,
    pub last_latency: Option<u32>,
    pub tag: PathTag,
    pub path: String,
}

impl Default for ProbeResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbeResult {
    pub fn new() -> Self {
        Self {
            latencies: Vec::with_capacity(ROUNDS),
            done: false,
            last_latency: None,
            tag: PathTag::Idle,
            path: NO_PATH.to_string(),
        }
    }

    /// Record for the machine running the dashboard: complete from the start.
    pub fn local() -> Self {
        Self {
            latencies: vec![Some(0); ROUNDS],
            done: true,
            last_latency: Some(0),
            tag: PathTag::Direct,
            path: LOCAL_PATH.to_string(),
        }
    }

    pub fn is_local(&self) -> bool {
        self.path == LOCAL_PATH
    }

    pub fn rounds(&self) -> usize {
        self.latencies.len()
    }

    /// Appends one round. Returns false once the campaign is full or finished.
    pub fn record_round(&mut self, sample: Option<u32>) -> bool {
        if self.done || self.latencies.len() >= ROUNDS {
            return false;
        }
        self.latencies.push(sample);
        self.last_latency = sample;
        true
    }

    /// Marks the record complete. Only the first call has an effect.
    pub fn finish(&mut self) -> bool {
        if self.done {
            return false;
        }
        self.done = true;
        true
    }

    pub fn apply_path(&mut self, class: PathClass) {
        self.tag = class.tag;
        if let Some(detail) = class.detail {
            self.path = detail;
        }
    }

    pub fn last_round_failed(&self) -> bool {
        matches!(self.latencies.last(), Some(None))
    }

    pub fn display_color(&self) -> DisplayColor {
        if self.last_round_failed() {
            return DisplayColor::Red;
        }
        match self.tag {
            PathTag::Idle => DisplayColor::Gray,
            PathTag::Direct => DisplayColor::Green,
            PathTag::Relay => DisplayColor::Red,
        }
    }

    pub fn success_count(&self) -> usize {
        self.latencies.iter().filter(|sample| sample.is_some()).count()
    }

    pub fn success_percent(&self) -> f64 {
        if self.latencies.is_empty() {
            return 0.0;
        }
        self.success_count() as f64 / self.latencies.len() as f64 * 100.0
    }

    /// Truncated mean over the rounds that got a reply.
    pub fn average_latency(&self) -> Option<u32> {
        let ok: Vec<u64> = self
            .latencies
            .iter()
            .filter_map(|sample| sample.map(u64::from))
            .collect();
        if ok.is_empty() {
            return None;
        }
        let sum: u64 = ok.iter().sum();
        Some((sum / ok.len() as u64) as u32)
    }
}

/// Relay region code to display name, e.g. `nyc` -> `New York City`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelayTable {
    names: HashMap<String, String>,
}

impl RelayTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, code: impl Into<String>, name: impl Into<String>) {
        self.names.insert(code.into(), name.into());
    }

    /// Display name for `code`, or the code itself when unknown.
    pub fn resolve<'a>(&'a self, code: &'a str) -> &'a str {
        self.names.get(code).map(String::as_str).unwrap_or(code)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_record_is_complete() {
        let local = ProbeResult::local();
        assert!(local.done);
        assert_eq!(local.latencies, vec![Some(0); ROUNDS]);
        assert_eq!(local.tag, PathTag::Direct);
        assert_eq!(local.path, "Local Machine");
        assert_eq!(local.display_color(), DisplayColor::Green);
        assert!(local.is_local());
    }

    #[test]
    fn new_record_is_idle() {
        let result = ProbeResult::new();
        assert!(!result.done);
        assert!(result.latencies.is_empty());
        assert_eq!(result.tag, PathTag::Idle);
        assert_eq!(result.path, "-");
        assert_eq!(result.display_color(), DisplayColor::Gray);
    }

    #[test]
    fn record_round_stops_at_capacity() {
        let mut result = ProbeResult::new();
        for round in 0..ROUNDS {
            assert!(result.record_round(Some(round as u32)));
        }
        assert!(!result.record_round(Some(99)));
        assert_eq!(result.rounds(), ROUNDS);
        assert_eq!(result.latencies[0], Some(0));
        assert_eq!(result.latencies[ROUNDS - 1], Some(9));
    }

    #[test]
    fn no_writes_after_finish() {
        let mut result = ProbeResult::new();
        result.record_round(Some(5));
        assert!(result.finish());
        assert!(!result.finish());
        assert!(!result.record_round(Some(6)));
        assert_eq!(result.latencies, vec![Some(5)]);
    }

    #[test]
    fn failed_round_paints_red_even_when_direct() {
        let mut result = ProbeResult::new();
        result.apply_path(PathClass {
            tag: PathTag::Direct,
            detail: Some("192.168.1.20:41641".to_string()),
        });
        result.record_round(Some(3));
        assert_eq!(result.display_color(), DisplayColor::Green);
        result.record_round(None);
        assert_eq!(result.display_color(), DisplayColor::Red);
        assert_eq!(result.last_latency, None);
    }

    #[test]
    fn stats_skip_failed_rounds() {
        let mut result = ProbeResult::new();
        result.record_round(Some(10));
        result.record_round(None);
        result.record_round(Some(12));
        assert_eq!(result.success_count(), 2);
        assert!((result.success_percent() - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(result.average_latency(), Some(11));
    }

    #[test]
    fn stats_with_no_replies() {
        let mut result = ProbeResult::new();
        assert_eq!(result.success_percent(), 0.0);
        result.record_round(None);
        assert_eq!(result.average_latency(), None);
        assert_eq!(result.success_percent(), 0.0);
    }

    #[test]
    fn apply_path_without_detail_keeps_path() {
        let mut result = ProbeResult::new();
        result.apply_path(PathClass {
            tag: PathTag::Direct,
            detail: Some("10.0.0.4:41641".to_string()),
        });
        result.apply_path(PathClass {
            tag: PathTag::Relay,
            detail: None,
        });
        assert_eq!(result.tag, PathTag::Relay);
        assert_eq!(result.path, "10.0.0.4:41641");
    }

    #[test]
    fn relay_table_falls_back_to_code() {
        let mut table = RelayTable::new();
        table.insert("nyc", "New York City");
        assert_eq!(table.resolve("nyc"), "New York City");
        assert_eq!(table.resolve("fra"), "fra");
    }

    #[test]
    fn tag_display_respects_padding() {
        assert_eq!(format!("{:<8}|", PathTag::Relay), "Relay   |");
    }
}
