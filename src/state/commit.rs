//! Per-commit build-state records and their JSON payload.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Build state of a single commit on a single platform.
///
/// `Unknown` is the implicit value of any commit without an annotation.
/// `Good` and `Bad` are real build outcomes; the `Assumed*` / `Possibly*`
/// labels are painted onto neighbors by the transition engine and may
/// overwrite each other, but never a real outcome. `Breaking` marks the
/// commit a bisect has pinned down as the exact regression point.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildState {
    Bad,
    Good,
    AssumedGood,
    AssumedBad,
    PossiblyBreaking,
    PossiblyFixing,
    Unknown,
    Running,
    Breaking,
}

/// Terminal result reported by a worker for a finished build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Good,
    Bad,
}

impl Outcome {
    pub fn to_state(self) -> BuildState {
        match self {
            Outcome::Good => BuildState::Good,
            Outcome::Bad => BuildState::Bad,
        }
    }
}

/// The annotation stored per commit per platform.
///
/// Serializes to a JSON object; time-typed fields use tagged arrays
/// (`["__datetime__", secs_since_epoch]`, `["__timedelta__", secs]`) so
/// decoding is unambiguous and values round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitState {
    pub state: BuildState,
    #[serde(default)]
    pub builder: Option<String>,
    #[serde(default, with = "tagged_datetime")]
    pub started: Option<DateTime<Utc>>,
    #[serde(default, with = "tagged_datetime")]
    pub finished: Option<DateTime<Utc>>,
    #[serde(default, with = "tagged_timedelta")]
    pub estimated_duration: Option<TimeDelta>,
    #[serde(default)]
    pub artifactreference: Option<String>,
}

impl CommitState {
    /// A fresh record carrying only a state, as written by range painting.
    pub fn with_state(state: BuildState) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }
}

impl Default for CommitState {
    fn default() -> Self {
        Self {
            state: BuildState::Unknown,
            builder: None,
            started: None,
            finished: None,
            estimated_duration: None,
            artifactreference: None,
        }
    }
}

impl std::fmt::Display for CommitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.state)?;
        if let Some(builder) = &self.builder {
            write!(f, " by {builder}")?;
        }
        if let Some(started) = self.started {
            write!(f, ", started {}", started.format("%Y-%m-%d %H:%M:%S"))?;
        }
        if let Some(finished) = self.finished {
            write!(f, ", finished {}", finished.format("%Y-%m-%d %H:%M:%S"))?;
        }
        if let (Some(started), Some(finished)) = (self.started, self.finished) {
            write!(f, " (took {})", format_delta(finished - started))?;
        }
        if let Some(estimate) = self.estimated_duration {
            write!(f, " (estimated {})", format_delta(estimate))?;
        }
        if let Some(artifacts) = &self.artifactreference {
            write!(f, " -- artifacts at {artifacts}")?;
        }
        Ok(())
    }
}

fn format_delta(delta: TimeDelta) -> String {
    let total = delta.num_seconds();
    let (hours, rest) = (total / 3600, total % 3600);
    format!("{}:{:02}:{:02}", hours, rest / 60, rest % 60)
}

mod tagged_datetime {
    use chrono::{DateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => {
                let secs =
                    ts.timestamp() as f64 + f64::from(ts.timestamp_subsec_nanos()) * 1e-9;
                ("__datetime__", secs).serialize(serializer)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<(String, f64)>::deserialize(deserializer)? {
            None => Ok(None),
            Some((tag, secs)) if tag == "__datetime__" => {
                let micros = (secs * 1_000_000.0).round() as i64;
                DateTime::<Utc>::from_timestamp_micros(micros)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {secs}")))
            }
            Some((tag, _)) => Err(D::Error::custom(format!(
                "expected '__datetime__' tag, found '{tag}'"
            ))),
        }
    }
}

mod tagged_timedelta {
    use chrono::TimeDelta;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<TimeDelta>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(delta) => {
                let secs =
                    delta.num_seconds() as f64 + f64::from(delta.subsec_nanos()) * 1e-9;
                ("__timedelta__", secs).serialize(serializer)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<TimeDelta>, D::Error> {
        match Option::<(String, f64)>::deserialize(deserializer)? {
            None => Ok(None),
            Some((tag, secs)) if tag == "__timedelta__" => {
                Ok(Some(TimeDelta::microseconds((secs * 1_000_000.0).round() as i64)))
            }
            Some((tag, _)) => Err(D::Error::custom(format!(
                "expected '__timedelta__' tag, found '{tag}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample() -> CommitState {
        CommitState {
            state: BuildState::Running,
            builder: Some("box-7".to_string()),
            started: DateTime::from_timestamp(1_700_000_000, 0),
            finished: None,
            estimated_duration: Some(TimeDelta::minutes(240)),
            artifactreference: None,
        }
    }

    #[rstest]
    #[case(BuildState::Bad)]
    #[case(BuildState::Good)]
    #[case(BuildState::AssumedGood)]
    #[case(BuildState::AssumedBad)]
    #[case(BuildState::PossiblyBreaking)]
    #[case(BuildState::PossiblyFixing)]
    #[case(BuildState::Unknown)]
    #[case(BuildState::Running)]
    #[case(BuildState::Breaking)]
    fn test_round_trip_every_state(#[case] state: BuildState) {
        let mut record = sample();
        record.state = state;
        record.finished = DateTime::from_timestamp(1_700_003_600, 0);
        let json = serde_json::to_string(&record).unwrap();
        let decoded: CommitState = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_time_fields_use_tagged_arrays() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["state"], "RUNNING");
        assert_eq!(value["started"][0], "__datetime__");
        assert_eq!(value["started"][1], 1_700_000_000.0);
        assert_eq!(value["estimated_duration"][0], "__timedelta__");
        assert_eq!(value["estimated_duration"][1], 14_400.0);
        assert_eq!(value["finished"], serde_json::Value::Null);
    }

    #[test]
    fn test_decode_rejects_mismatched_tag() {
        let json = r#"{"state": "GOOD", "started": ["__timedelta__", 12.0]}"#;
        assert!(serde_json::from_str::<CommitState>(json).is_err());
    }

    #[test]
    fn test_decode_tolerates_missing_fields() {
        let decoded: CommitState = serde_json::from_str(r#"{"state": "GOOD"}"#).unwrap();
        assert_eq!(decoded.state, BuildState::Good);
        assert_eq!(decoded.builder, None);
        assert_eq!(decoded.started, None);
    }

    #[test]
    fn test_default_record_is_unknown() {
        assert_eq!(CommitState::default().state, BuildState::Unknown);
    }

    #[test]
    fn test_state_names_are_screaming_snake() {
        assert_eq!(BuildState::AssumedGood.to_string(), "ASSUMED_GOOD");
        assert_eq!(BuildState::PossiblyBreaking.to_string(), "POSSIBLY_BREAKING");
    }

    #[test]
    fn test_display_includes_elapsed_time() {
        let mut record = sample();
        record.state = BuildState::Good;
        record.finished = record.started.map(|ts| ts + TimeDelta::seconds(3_723));
        let line = record.to_string();
        assert!(line.starts_with("GOOD by box-7"));
        assert!(line.contains("(took 1:02:03)"));
    }
}
