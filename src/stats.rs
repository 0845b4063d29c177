/*!
 * Download measures for an extraction run
 */

use serde::Serialize;
use std::time::{Duration, Instant};

use crate::extract::policy::PlannedObject;

/// Measures collected while a plan is materialized
#[derive(Debug, Clone, Serialize)]
pub struct ExtractStats {
    /// Objects in the finalized plan
    pub planned_objects: usize,
    /// Bytes the plan asks for
    pub planned_bytes: u64,
    /// Objects written to local files so far
    pub objects_fetched: usize,
    /// Bytes written to local files so far
    pub bytes_written: u64,
    /// Objects fetched whole
    pub full_fetches: usize,
    /// Objects fetched through a byte range
    pub partial_fetches: usize,
    /// Planned objects with nothing to fetch
    pub empty_plans: usize,
    /// Wall-clock time since the downloader started
    pub elapsed_ms: u64,

    #[serde(skip)]
    started: Option<Instant>,
}

impl ExtractStats {
    /// Start measuring a run over `items`
    pub fn start(items: &[PlannedObject]) -> Self {
        Self {
            planned_objects: items.len(),
            planned_bytes: items.iter().map(|i| i.planned_length()).sum(),
            started: Some(Instant::now()),
            ..Default::default()
        }
    }

    /// Record one materialized object
    pub fn record(&mut self, item: &PlannedObject, bytes: u64) {
        self.objects_fetched += 1;
        self.bytes_written += bytes;
        if item.planned_length() == 0 {
            self.empty_plans += 1;
        } else if item.plan.is_partial() {
            self.partial_fetches += 1;
        } else {
            self.full_fetches += 1;
        }
        self.touch();
    }

    /// Refresh `elapsed_ms`
    pub fn touch(&mut self) {
        if let Some(started) = self.started {
            self.elapsed_ms = started.elapsed().as_millis() as u64;
        }
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    /// Objects still to be fetched
    pub fn remaining(&self) -> usize {
        self.planned_objects.saturating_sub(self.objects_fetched)
    }

    /// Average throughput in bytes per second
    pub fn throughput_bps(&self) -> u64 {
        if self.elapsed_ms == 0 {
            return 0;
        }
        (self.bytes_written as f64 / self.elapsed_ms as f64 * 1000.0) as u64
    }

    /// One-line human readable summary
    pub fn summary(&self) -> String {
        format!(
            "{} of {} objects, {} in {} ({} full, {} partial, {} empty)",
            self.objects_fetched,
            self.planned_objects,
            format_bytes(self.bytes_written),
            format_duration(self.elapsed_ms),
            self.full_fetches,
            self.partial_fetches,
            self.empty_plans
        )
    }
}

impl Default for ExtractStats {
    fn default() -> Self {
        Self {
            planned_objects: 0,
            planned_bytes: 0,
            objects_fetched: 0,
            bytes_written: 0,
            full_fetches: 0,
            partial_fetches: 0,
            empty_plans: 0,
            elapsed_ms: 0,
            started: None,
        }
    }
}

/// Format bytes into human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let base = 1024.0_f64;
    let exp = (bytes_f.ln() / base.ln()).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);

    let value = bytes_f / base.powi(exp as i32);

    if exp == 0 {
        format!("{} {}", bytes, UNITS[exp])
    } else {
        format!("{:.2} {}", value, UNITS[exp])
    }
}

/// Format duration into human-readable format
pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        return format!("{}ms", ms);
    }

    let seconds = ms / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes % 60, seconds % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ByteRange, ListedObject};
    use crate::extract::policy::FetchPlan;

    #[test]
    fn test_record_classifies_plans() {
        let items = vec![
            PlannedObject::new(ListedObject::new("a", 100), FetchPlan::Full),
            PlannedObject::new(
                ListedObject::new("b", 100),
                FetchPlan::Range(ByteRange::new(0, 40)),
            ),
            PlannedObject::new(
                ListedObject::new("c", 100),
                FetchPlan::Range(ByteRange::new(0, 0)),
            ),
        ];
        let mut stats = ExtractStats::start(&items);
        assert_eq!(stats.planned_bytes, 140);
        assert_eq!(stats.remaining(), 3);

        stats.record(&items[0], 100);
        stats.record(&items[1], 40);
        stats.record(&items[2], 0);

        assert_eq!(stats.full_fetches, 1);
        assert_eq!(stats.partial_fetches, 1);
        assert_eq!(stats.empty_plans, 1);
        assert_eq!(stats.bytes_written, 140);
        assert_eq!(stats.remaining(), 0);
        assert!(stats.summary().starts_with("3 of 3 objects, 140 B"));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1073741824), "1.00 GB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(500), "500ms");
        assert_eq!(format_duration(60000), "1m 0s");
        assert_eq!(format_duration(3661000), "1h 1m 1s");
    }
}
