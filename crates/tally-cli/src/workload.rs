//! Workloads: sequences of instrument operations, from a file or generated.
//!
//! File format, one operation per line (blank lines and `#` comments skipped):
//!
//! ```text
//! counter,5,route=/;method=GET
//! up_down_counter,-2,queue=io
//! value_recorder,12.5,"route=/api"
//! ```

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tally_core::{Aggregation, Counter, LabelSet, Meter, UpDownCounter, ValueRecorder};

/// Errors raised while loading a workload.
#[derive(Debug, thiserror::Error)]
pub enum WorkloadError {
    #[error("failed to read workload: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// Instrument an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Counter,
    UpDownCounter,
    ValueRecorder,
}

impl std::str::FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "counter" | "ctr" => Ok(Target::Counter),
            "up_down_counter" | "updown" => Ok(Target::UpDownCounter),
            "value_recorder" | "recorder" => Ok(Target::ValueRecorder),
            other => Err(format!("unknown instrument '{other}'")),
        }
    }
}

/// One workload step.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub target: Target,
    pub value: f64,
    pub labels: LabelSet,
}

/// Parse `k=v;k2=v2`. Surrounding quotes are ignored.
pub fn parse_labels(raw: &str) -> Result<LabelSet, String> {
    let raw = raw.trim().trim_matches('"');
    let mut pairs = Vec::new();
    for pair in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("label '{pair}' is not key=value"))?;
        if key.trim().is_empty() {
            return Err(format!("label '{pair}' has an empty key"));
        }
        pairs.push((key.trim().to_string(), value.trim().to_string()));
    }
    Ok(LabelSet::new(pairs))
}

fn parse_line(line: &str) -> Result<Operation, String> {
    let mut fields = line.splitn(3, ',');
    let target: Target = fields
        .next()
        .map(str::trim)
        .ok_or("missing instrument")?
        .parse()?;
    let raw_value = fields.next().map(str::trim).ok_or("missing value")?;
    let value: f64 = raw_value
        .parse()
        .map_err(|_| format!("invalid value '{raw_value}'"))?;
    if !value.is_finite() {
        return Err(format!("value '{raw_value}' is not finite"));
    }
    if target != Target::ValueRecorder && value.fract() != 0.0 {
        return Err(format!("counter values must be integers, got '{raw_value}'"));
    }
    let labels = parse_labels(fields.next().unwrap_or(""))?;
    Ok(Operation {
        target,
        value,
        labels,
    })
}

/// Parse a whole workload.
pub fn parse(content: &str) -> Result<Vec<Operation>, WorkloadError> {
    content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line, text)| parse_line(text).map_err(|message| WorkloadError::Parse { line, message }))
        .collect()
}

/// Load a workload file.
pub fn load(path: &Path) -> Result<Vec<Operation>, WorkloadError> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

const ROUTES: [&str; 4] = ["/", "/api", "/login", "/static"];

/// Generate `count` random operations.
pub fn synthetic(count: usize, seed: Option<u64>) -> Vec<Operation> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    (0..count)
        .map(|i| {
            let route = ROUTES[rng.gen_range(0..ROUTES.len())];
            let labels = LabelSet::from([("route", route)]);
            match i % 3 {
                0 => Operation {
                    target: Target::Counter,
                    value: rng.gen_range(0..10) as f64,
                    labels,
                },
                1 => Operation {
                    target: Target::UpDownCounter,
                    value: rng.gen_range(-5..=5) as f64,
                    labels,
                },
                _ => Operation {
                    target: Target::ValueRecorder,
                    value: rng.gen_range(0.5..250.0),
                    labels,
                },
            }
        })
        .collect()
}

/// The instruments a workload drives.
pub struct Instruments {
    pub requests: Counter<i64>,
    pub in_flight: UpDownCounter<i64>,
    pub latency: ValueRecorder<f64>,
}

impl Instruments {
    /// Register the workload instruments on `meter`. Empty `boundaries` keep the
    /// recorder's default min/max/sum/count aggregation.
    pub fn register(meter: &Meter, boundaries: &[f64]) -> tally_core::Result<Self> {
        let aggregation = if boundaries.is_empty() {
            Aggregation::MinMaxSumCount
        } else {
            Aggregation::histogram(boundaries.to_vec())
        };
        Ok(Self {
            requests: meter.new_counter("requests", "Requests served", "1", true)?,
            in_flight: meter.new_up_down_counter("in_flight", "Requests in progress", "1", true)?,
            latency: meter.new_value_recorder_with_aggregation(
                "latency",
                "Request latency",
                "ms",
                true,
                aggregation,
            )?,
        })
    }

    pub fn apply(&self, op: &Operation) -> tally_core::Result<()> {
        match op.target {
            Target::Counter => self.requests.add(op.value as i64, &op.labels),
            Target::UpDownCounter => self.in_flight.add(op.value as i64, &op.labels),
            Target::ValueRecorder => self.latency.record(op.value, &op.labels),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tally_core::{AggregatorValue, Number};

    use super::*;

    #[test]
    fn test_parse_labels() {
        let labels = parse_labels("\"b=2; a=1\"").unwrap();
        assert_eq!(labels.canonical(), "a:1,b:2,");
        assert!(parse_labels("").unwrap().is_empty());
        assert!(parse_labels("novalue").is_err());
        assert!(parse_labels("=x").is_err());
    }

    #[test]
    fn test_parse_workload() {
        let ops = parse(
            "# warmup\n\
             counter,5,key=value\n\
             \n\
             ctr,1\n\
             recorder,2.5,\"route=/\"\n",
        )
        .unwrap();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0].target, Target::Counter);
        assert_eq!(ops[0].value, 5.0);
        assert_eq!(ops[0].labels.get("key"), Some("value"));
        assert!(ops[1].labels.is_empty());
        assert_eq!(ops[2].target, Target::ValueRecorder);
    }

    #[test]
    fn test_parse_errors_carry_line() {
        let err = parse("counter,1\nbogus,1\n").unwrap_err();
        assert!(matches!(err, WorkloadError::Parse { line: 2, .. }));

        assert!(parse("counter,abc").is_err());
        assert!(parse("counter,1.5").is_err());
        assert!(parse("counter").is_err());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "counter,3,key=value").unwrap();
        writeln!(file, "up_down_counter,-1,key=value").unwrap();
        let ops = load(file.path()).unwrap();
        assert_eq!(ops.len(), 2);

        let missing = load(Path::new("/nonexistent/tally/workload.csv"));
        assert!(matches!(missing, Err(WorkloadError::Io(_))));
    }

    #[test]
    fn test_synthetic_is_deterministic_with_seed() {
        let a = synthetic(30, Some(7));
        let b = synthetic(30, Some(7));
        assert_eq!(a, b);
        assert_eq!(a.len(), 30);
        assert!(a
            .iter()
            .filter(|op| op.target == Target::Counter)
            .all(|op| op.value >= 0.0));
    }

    #[test]
    fn test_apply() {
        let meter = Meter::new("test");
        let instruments = Instruments::register(&meter, &[]).unwrap();
        for op in parse("counter,5,key=value\ncounter,2,key=value\nrecorder,1.5").unwrap() {
            instruments.apply(&op).unwrap();
        }

        let records = meter.collect();
        let requests = records.iter().find(|r| r.name() == "requests").unwrap();
        assert_eq!(requests.value(), &AggregatorValue::Sum(Number::I64(7)));
        assert!(records.iter().any(|r| r.name() == "latency"));
    }
}
