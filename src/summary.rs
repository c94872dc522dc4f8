//! Run summary: monotonic counters, warnings and elapsed time

use std::time::Instant;

/// Snapshot of a finished run.
#[derive(Debug, Clone)]
pub struct Summary {
    pub elapsed_seconds: f64,
    pub records_read: u64,
    pub records_dropped: u64,
    pub records_modified: u64,
    pub records_written: u64,
    pub records_unhandled: u64,
    pub warnings: Vec<String>,
    pub strict: bool,
}

impl Summary {
    pub fn records_per_second(&self) -> f64 {
        if self.elapsed_seconds == 0.0 {
            return 0.0;
        }
        self.records_read as f64 / self.elapsed_seconds
    }

    /// Render the fixed human-readable block.
    pub fn display(&self) -> String {
        let mut lines = vec![
            format!(
                "Time:      {} ({} records/sec)",
                format_duration(self.elapsed_seconds),
                group_thousands(self.records_per_second() as u64),
            ),
            format!("Read:      {}", group_thousands(self.records_read)),
            format!("Dropped:   {}", group_thousands(self.records_dropped)),
            format!("Modified:  {}", group_thousands(self.records_modified)),
            format!("Written:   {}", group_thousands(self.records_written)),
        ];
        if self.records_unhandled > 0 {
            lines.push(format!(
                "Unhandled: {}",
                group_thousands(self.records_unhandled)
            ));
        }
        lines.push(format!(
            "Strict:    {}",
            if self.strict { "Enabled" } else { "Disabled" }
        ));
        lines.join("\n")
    }
}

/// Collects counters while a run is in flight. The clock starts at
/// construction and stops at [`SummaryCollector::finish`].
#[derive(Debug)]
pub struct SummaryCollector {
    started: Instant,
    records_read: u64,
    records_dropped: u64,
    records_modified: u64,
    records_written: u64,
    records_unhandled: u64,
    warnings: Vec<String>,
    strict: bool,
}

impl SummaryCollector {
    pub fn new(strict: bool) -> Self {
        SummaryCollector {
            started: Instant::now(),
            records_read: 0,
            records_dropped: 0,
            records_modified: 0,
            records_written: 0,
            records_unhandled: 0,
            warnings: Vec::new(),
            strict,
        }
    }

    pub fn record_read(&mut self) {
        self.records_read += 1;
    }

    pub fn record_dropped(&mut self) {
        self.records_dropped += 1;
    }

    pub fn record_modified(&mut self) {
        self.records_modified += 1;
    }

    pub fn record_written(&mut self) {
        self.records_written += 1;
    }

    /// Count one unhandled event and keep its warning message.
    pub fn record_unhandled(&mut self, message: String) {
        self.records_unhandled += 1;
        self.warnings.push(message);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn finish(self) -> Summary {
        Summary {
            elapsed_seconds: self.started.elapsed().as_secs_f64(),
            records_read: self.records_read,
            records_dropped: self.records_dropped,
            records_modified: self.records_modified,
            records_written: self.records_written,
            records_unhandled: self.records_unhandled,
            warnings: self.warnings,
            strict: self.strict,
        }
    }
}

fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        return format!("{seconds:.1}s");
    }
    let total = seconds as u64;
    let (minutes, secs) = (total / 60, total % 60);
    if minutes < 60 {
        return format!("{minutes}m {secs}s");
    }
    let (hours, mins) = (minutes / 60, minutes % 60);
    format!("{hours}h {mins}m {secs}s")
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let mut collector = SummaryCollector::new(false);
        collector.record_read();
        collector.record_read();
        collector.record_dropped();
        collector.record_written();
        collector.record_unhandled("Unhandled in artist id=1: x".into());

        let summary = collector.finish();
        assert_eq!(summary.records_read, 2);
        assert_eq!(summary.records_dropped, 1);
        assert_eq!(summary.records_written, 1);
        assert_eq!(summary.records_unhandled, 1);
        assert_eq!(summary.records_unhandled as usize, summary.warnings.len());
    }

    #[test]
    fn test_display_block() {
        let summary = Summary {
            elapsed_seconds: 2.0,
            records_read: 1_234_567,
            records_dropped: 0,
            records_modified: 0,
            records_written: 1_234_567,
            records_unhandled: 0,
            warnings: Vec::new(),
            strict: false,
        };
        let block = summary.display();
        assert!(block.contains("Read:      1,234,567"));
        assert!(block.contains("records/sec"));
        assert!(block.contains("Strict:    Disabled"));
        // unhandled line only appears when non-zero
        assert!(!block.contains("Unhandled:"));
    }

    #[test]
    fn test_display_unhandled_line() {
        let summary = Summary {
            elapsed_seconds: 0.5,
            records_read: 10,
            records_dropped: 0,
            records_modified: 0,
            records_written: 9,
            records_unhandled: 1,
            warnings: vec!["Unhandled in artist id=1: x".into()],
            strict: true,
        };
        let block = summary.display();
        assert!(block.contains("Unhandled: 1"));
        assert!(block.contains("Strict:    Enabled"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(1.23), "1.2s");
        assert_eq!(format_duration(200.0), "3m 20s");
        assert_eq!(format_duration(3_723.0), "1h 2m 3s");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_000), "1,000");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }
}
