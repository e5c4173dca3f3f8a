//! Plain-text views of the long-format records.

use repcount_core::{AttemptLabel, LongRecord};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const MISSING: &str = "-";

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("{v:.0}"),
        Some(v) => v.to_string(),
        None => MISSING.to_string(),
    }
}

/// Renders `records` as an aligned `date | attempt | value` table.
pub fn render_table(records: &[LongRecord]) -> String {
    let rows: Vec<[String; 3]> = records
        .iter()
        .map(|record| {
            [
                record.date.format(DATE_FORMAT).to_string(),
                record.attempt_label.to_string(),
                format_value(record.value),
            ]
        })
        .collect();

    let header = ["date", "attempt", "value"];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let line = |cells: [&str; 3]| {
        format!(
            "{:<w0$} | {:<w1$} | {:>w2$}\n",
            cells[0],
            cells[1],
            cells[2],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2]
        )
    };

    let mut out = line(header);
    out.push_str(&format!(
        "{}-+-{}-+-{}\n",
        "-".repeat(widths[0]),
        "-".repeat(widths[1]),
        "-".repeat(widths[2])
    ));
    for row in &rows {
        out.push_str(&line([row[0].as_str(), row[1].as_str(), row[2].as_str()]));
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttemptSummary {
    pub label: AttemptLabel,
    pub sessions: usize,
    pub total: f64,
    pub best: Option<f64>,
}

impl AttemptSummary {
    pub fn mean(&self) -> Option<f64> {
        (self.sessions > 0).then(|| self.total / self.sessions as f64)
    }
}

/// Per-attempt totals over the records that carry a value.
pub fn summarize(records: &[LongRecord]) -> Vec<AttemptSummary> {
    AttemptLabel::ALL
        .iter()
        .map(|&label| {
            let values: Vec<f64> = records
                .iter()
                .filter(|record| record.attempt_label == label)
                .filter_map(|record| record.value)
                .collect();
            AttemptSummary {
                label,
                sessions: values.len(),
                total: values.iter().sum(),
                best: values.iter().copied().reduce(f64::max),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn records() -> Vec<LongRecord> {
        let date = Utc.with_ymd_and_hms(2021, 1, 2, 8, 30, 0).unwrap();
        vec![
            LongRecord {
                date,
                attempt_label: AttemptLabel::First,
                value: Some(10.0),
            },
            LongRecord {
                date,
                attempt_label: AttemptLabel::Second,
                value: Some(12.5),
            },
            LongRecord {
                date,
                attempt_label: AttemptLabel::Third,
                value: None,
            },
        ]
    }

    #[test]
    fn test_render_table() {
        let table = render_table(&records());
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "date                | attempt | value");
        assert_eq!(lines[1], "--------------------+---------+------");
        assert_eq!(lines[2], "2021-01-02 08:30:00 | First   |    10");
        assert_eq!(lines[3], "2021-01-02 08:30:00 | Second  |  12.5");
        assert_eq!(lines[4], "2021-01-02 08:30:00 | Third   |     -");
    }

    #[test]
    fn test_render_empty_table() {
        assert_eq!(render_table(&[]).lines().count(), 2);
    }

    #[test]
    fn test_summarize() {
        let summary = summarize(&records());

        assert_eq!(summary.len(), 3);
        assert_eq!(summary[0].sessions, 1);
        assert_eq!(summary[0].best, Some(10.0));
        assert_eq!(summary[1].mean(), Some(12.5));
        assert_eq!(summary[2].sessions, 0);
        assert_eq!(summary[2].best, None);
        assert_eq!(summary[2].mean(), None);
    }
}
