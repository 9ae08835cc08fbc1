use chrono::{
    DateTime,
    SecondsFormat,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt::{
    self,
    Write as _,
};
use strum::{
    Display,
    EnumString,
};

/// One named numeric sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    pub value: f64,
    /// Decimal places used when the value is rendered as text.
    pub precision: u8,
}

impl Record {
    pub fn new(name: impl AsRef<str>, value: f64, precision: u8) -> Self {
        Self {
            name: name.as_ref().to_lowercase(),
            value,
            precision,
        }
    }

    pub fn formatted_value(&self) -> String {
        format!("{:.*}", self.precision as usize, self.value)
    }

    /// The value rounded to its precision, for encoders that emit numbers.
    pub fn rounded_value(&self) -> f64 {
        let scale = 10f64.powi(self.precision as i32);
        (self.value * scale).round() / scale
    }
}

/// One timestamped batch of records produced by a single inlet invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub ts: DateTime<Utc>,
    pub records: Vec<Record>,
}

impl Report {
    pub fn new(ts: DateTime<Utc>, records: Vec<Record>) -> Self {
        Self { ts, records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `name,<epoch>,value` rows, one per record.
    pub fn to_csv(&self, time_format: TimeFormat) -> String {
        let epoch = time_format.epoch(&self.ts);
        let mut out = String::new();
        for record in &self.records {
            let _ = writeln!(out, "{},{},{}", record.name, epoch, record.formatted_value());
        }
        out
    }

    /// `[[name, epoch, value], ...]`
    pub fn to_json_rows(&self, time_format: TimeFormat) -> serde_json::Value {
        let epoch = time_format.epoch(&self.ts);
        self.records
            .iter()
            .map(|record| serde_json::json!([record.name, epoch, record.rounded_value()]))
            .collect::<Vec<_>>()
            .into()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ts.to_rfc3339_opts(SecondsFormat::Millis, true))?;
        for record in &self.records {
            write!(f, " {}={}", record.name, record.formatted_value())?;
        }
        Ok(())
    }
}

/// Resolution of the epoch timestamps written by the CSV and JSON encoders.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum TimeFormat {
    S,
    Ms,
    Us,
    #[default]
    Ns,
}

impl TimeFormat {
    pub fn epoch(&self, ts: &DateTime<Utc>) -> i64 {
        match self {
            TimeFormat::S => ts.timestamp(),
            TimeFormat::Ms => ts.timestamp_millis(),
            TimeFormat::Us => ts.timestamp_micros(),
            TimeFormat::Ns => ts
                .timestamp_nanos_opt()
                .unwrap_or_else(|| ts.timestamp_micros().saturating_mul(1000)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Report {
        let ts = DateTime::parse_from_rfc3339("2025-03-01T12:00:00.250Z")
            .unwrap()
            .with_timezone(&Utc);
        Report::new(
            ts,
            vec![Record::new("CPU_Percent", 12.3456, 2), Record::new("mem_total", 1024.0, 0)],
        )
    }

    #[test]
    fn record_names_are_lowercased() {
        assert_eq!(Record::new("Table_Rows_EXAMPLE", 1.0, 0).name, "table_rows_example");
    }

    #[test]
    fn line_format_honours_precision() {
        assert_eq!(
            sample().to_string(),
            "2025-03-01T12:00:00.250Z cpu_percent=12.35 mem_total=1024"
        );
    }

    #[test]
    fn csv_uses_requested_epoch() {
        let report = sample();
        assert_eq!(
            report.to_csv(TimeFormat::S),
            "cpu_percent,1740830400,12.35\nmem_total,1740830400,1024\n"
        );
        assert!(report.to_csv(TimeFormat::Ns).starts_with("cpu_percent,1740830400250000000,"));
    }

    #[test]
    fn json_rows_round_values() {
        assert_eq!(
            sample().to_json_rows(TimeFormat::Ms),
            serde_json::json!([["cpu_percent", 1740830400250i64, 12.35], ["mem_total", 1740830400250i64, 1024.0]])
        );
    }

    #[test]
    fn time_format_parses_query_values() {
        assert_eq!("s".parse::<TimeFormat>().unwrap(), TimeFormat::S);
        assert_eq!("us".parse::<TimeFormat>().unwrap(), TimeFormat::Us);
        assert!("minutes".parse::<TimeFormat>().is_err());
    }
}
