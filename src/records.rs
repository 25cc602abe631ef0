//! Hop count test records and their JSON representation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};

use crate::{HopCountError, RecordError};

/// Parameters of a single hop count test
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestInputRecord {
    pub lang: String,
    pub source: String,
    pub target: String,
    pub expected: i32,
}

impl TestInputRecord {
    pub fn new(
        lang: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        expected: i32,
    ) -> Self {
        Self {
            lang: lang.into(),
            source: source.into(),
            target: target.into(),
            expected,
        }
    }
}

impl fmt::Display for TestInputRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"Lang="{}", Source="{}", Target="{}", Expected="{}""#,
            self.lang, self.source, self.target, self.expected
        )
    }
}

/// Verdict of a hop count test, serialized as `success`, `failure` or `error: <cause>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Outcome {
    Success,
    Failure,
    Error(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => f.write_str("success"),
            Outcome::Failure => f.write_str("failure"),
            Outcome::Error(cause) => write!(f, "error: {}", cause),
        }
    }
}

impl From<Outcome> for String {
    fn from(outcome: Outcome) -> Self {
        outcome.to_string()
    }
}

impl TryFrom<String> for Outcome {
    type Error = RecordError;

    fn try_from(text: String) -> Result<Self, RecordError> {
        match text.as_str() {
            "success" => Ok(Outcome::Success),
            "failure" => Ok(Outcome::Failure),
            _ => match text.strip_prefix("error: ") {
                Some(cause) => Ok(Outcome::Error(cause.to_string())),
                None => Err(RecordError::InvalidOutcome(text)),
            },
        }
    }
}

/// A hop count test together with its result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutputRecord {
    #[serde(flatten)]
    pub input: TestInputRecord,
    /// Hops actually counted, -1 if counting failed
    pub actual: i32,
    pub result: Outcome,
}

impl TestOutputRecord {
    /// Judge a finished hop count against the expectation of its test
    pub fn from_hop_count(input: TestInputRecord, counted: Result<u32, HopCountError>) -> Self {
        match counted {
            Ok(hops) => {
                let actual = i32::try_from(hops).unwrap_or(i32::MAX);
                let result = if actual == input.expected {
                    Outcome::Success
                } else {
                    Outcome::Failure
                };
                Self { input, actual, result }
            }
            Err(e) => Self::errored(input, e),
        }
    }

    pub fn errored(input: TestInputRecord, cause: impl fmt::Display) -> Self {
        Self {
            input,
            actual: -1,
            result: Outcome::Error(cause.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result == Outcome::Success
    }
}

impl fmt::Display for TestOutputRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, r#"{}, Actual="{}", Result="{}""#, self.input, self.actual, self.result)
    }
}

/// Read a JSON array of test input records
pub fn read_input_records<R: Read>(reader: R) -> Result<Vec<TestInputRecord>, RecordError> {
    Ok(serde_json::from_reader(reader)?)
}

/// Write test output records as a pretty-printed JSON array
pub fn write_output_records<W: Write>(
    records: &[TestOutputRecord],
    mut writer: W,
) -> Result<(), RecordError> {
    serde_json::to_writer_pretty(&mut writer, records)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
