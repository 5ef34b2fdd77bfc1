//! Plaintext domain objects.
//!
//! These are the values that get serialized, encrypted and stored locally or
//! re-encrypted for sharing. Their JSON shape (camelCase fields, ISO-8601
//! dates with millisecond precision) is part of the published package format.

use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::defaults::{ENERGY_LEVEL_MAX, ENERGY_LEVEL_MIN};
use crate::error::{Error, Result};

/// Anything stored under a unique string id.
pub trait Identified {
    fn id(&self) -> &str;
}

// =============================================================================
// ENUMS
// =============================================================================

/// Menstrual flow intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowIntensity {
    Spotting,
    Light,
    Medium,
    Heavy,
}

/// Symptom tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symptom {
    Cramps,
    Headache,
    Bloating,
    BreastTenderness,
    MoodSwings,
    Fatigue,
    Nausea,
    BackPain,
    Acne,
    FoodCravings,
}

impl Symptom {
    /// Human-readable label.
    pub fn display_name(&self) -> &'static str {
        match self {
            Symptom::Cramps => "Cramps",
            Symptom::Headache => "Headache",
            Symptom::Bloating => "Bloating",
            Symptom::BreastTenderness => "Breast Tenderness",
            Symptom::MoodSwings => "Mood Swings",
            Symptom::Fatigue => "Fatigue",
            Symptom::Nausea => "Nausea",
            Symptom::BackPain => "Back Pain",
            Symptom::Acne => "Acne",
            Symptom::FoodCravings => "Food Cravings",
        }
    }
}

/// Mood tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Sad,
    Irritable,
    Anxious,
    Energetic,
    Tired,
    Calm,
}

/// Phase of the menstrual cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePhase {
    Menstrual,
    Follicular,
    Ovulation,
    Luteal,
}

// =============================================================================
// RECORD
// =============================================================================

/// One day's health log ("LogEntry" in the app layer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    #[serde(with = "iso8601")]
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<FlowIntensity>,
    #[serde(default)]
    pub symptoms: Vec<Symptom>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<Mood>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// 1-5 scale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_level: Option<u8>,
}

impl Record {
    /// New empty record with a fresh UUIDv4 id.
    ///
    /// The date is truncated to milliseconds so it survives the ISO-8601
    /// round trip exactly.
    pub fn new(date: DateTime<Utc>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), date)
    }

    /// New empty record with an explicit id.
    pub fn with_id(id: impl Into<String>, date: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            date: date.trunc_subsecs(3),
            flow: None,
            symptoms: Vec::new(),
            mood: None,
            notes: None,
            energy_level: None,
        }
    }

    pub fn flow(mut self, flow: FlowIntensity) -> Self {
        self.flow = Some(flow);
        self
    }

    /// Add a symptom; duplicates are ignored.
    pub fn symptom(mut self, symptom: Symptom) -> Self {
        if !self.symptoms.contains(&symptom) {
            self.symptoms.push(symptom);
        }
        self
    }

    pub fn mood(mut self, mood: Mood) -> Self {
        self.mood = Some(mood);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn energy_level(mut self, level: u8) -> Self {
        self.energy_level = Some(level);
        self
    }

    /// Check the record's own invariants.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidInput("record id cannot be empty".to_string()));
        }
        if let Some(level) = self.energy_level {
            if !(ENERGY_LEVEL_MIN..=ENERGY_LEVEL_MAX).contains(&level) {
                return Err(Error::InvalidInput(format!(
                    "energy level must be {}-{}, got {}",
                    ENERGY_LEVEL_MIN, ENERGY_LEVEL_MAX, level
                )));
            }
        }
        Ok(())
    }

    /// Date as Unix milliseconds, used for share entry timestamps.
    pub fn timestamp_millis(&self) -> i64 {
        self.date.timestamp_millis()
    }

    /// Merge a partial update into this record. The id never changes.
    pub fn apply(&mut self, patch: RecordPatch) {
        if let Some(date) = patch.date {
            self.date = date.trunc_subsecs(3);
        }
        if let Some(flow) = patch.flow {
            self.flow = flow;
        }
        if let Some(symptoms) = patch.symptoms {
            self.symptoms = symptoms;
        }
        if let Some(mood) = patch.mood {
            self.mood = mood;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        if let Some(level) = patch.energy_level {
            self.energy_level = level;
        }
    }
}

impl Identified for Record {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Partial update for a [`Record`].
///
/// Outer `None` leaves a field untouched; `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub date: Option<DateTime<Utc>>,
    pub flow: Option<Option<FlowIntensity>>,
    pub symptoms: Option<Vec<Symptom>>,
    pub mood: Option<Option<Mood>>,
    pub notes: Option<Option<String>>,
    pub energy_level: Option<Option<u8>>,
}

impl RecordPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    pub fn flow(mut self, flow: Option<FlowIntensity>) -> Self {
        self.flow = Some(flow);
        self
    }

    pub fn symptoms(mut self, symptoms: Vec<Symptom>) -> Self {
        self.symptoms = Some(symptoms);
        self
    }

    pub fn mood(mut self, mood: Option<Mood>) -> Self {
        self.mood = Some(mood);
        self
    }

    pub fn notes(mut self, notes: Option<String>) -> Self {
        self.notes = Some(notes);
        self
    }

    pub fn energy_level(mut self, level: Option<u8>) -> Self {
        self.energy_level = Some(level);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

// =============================================================================
// CYCLE DATA & PREDICTIONS
// =============================================================================

/// One tracked cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleData {
    pub id: String,
    pub user_id: String,
    #[serde(with = "iso8601")]
    pub start_date: DateTime<Utc>,
    #[serde(default, with = "iso8601::option", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    pub cycle_length: u32,
    pub period_length: u32,
    pub phase: CyclePhase,
    pub day_of_cycle: u32,
}

impl Identified for CycleData {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Fertile window bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FertileWindow {
    #[serde(with = "iso8601")]
    pub start: DateTime<Utc>,
    #[serde(with = "iso8601")]
    pub end: DateTime<Utc>,
}

/// Cycle prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub id: String,
    #[serde(with = "iso8601")]
    pub next_period_date: DateTime<Utc>,
    #[serde(with = "iso8601")]
    pub ovulation_date: DateTime<Utc>,
    pub fertile_window: FertileWindow,
    /// 0.0 - 1.0
    pub confidence: f64,
}

impl Identified for Prediction {
    fn id(&self) -> &str {
        &self.id
    }
}

// =============================================================================
// RECORD QUERIES
// =============================================================================

/// Sort newest first by date.
pub fn sort_newest_first(records: &mut [Record]) {
    records.sort_by(|a, b| b.date.cmp(&a.date));
}

/// Records whose date falls within `[start, end]` inclusive.
pub fn entries_in_range<'a>(
    records: &'a [Record],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<&'a Record> {
    records
        .iter()
        .filter(|r| r.date >= start && r.date <= end)
        .collect()
}

/// Records logged on the given UTC calendar day.
pub fn entries_on_day(records: &[Record], day: NaiveDate) -> Vec<&Record> {
    records.iter().filter(|r| r.date.date_naive() == day).collect()
}

/// Whether any record was logged on the given UTC calendar day.
pub fn has_entry_for_day(records: &[Record], day: NaiveDate) -> bool {
    records.iter().any(|r| r.date.date_naive() == day)
}

/// Most recent record by date.
pub fn latest_entry(records: &[Record]) -> Option<&Record> {
    records.iter().max_by_key(|r| r.date)
}

/// ISO-8601 with millisecond precision and a `Z` suffix.
pub mod iso8601 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(date: &DateTime<Utc>) -> String {
        date.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn parse(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(s).map(|d| d.with_timezone(&Utc))
    }

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format(date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            date: &Option<DateTime<Utc>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(d) => s.serialize_str(&super::format(d)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            let raw = Option::<String>::deserialize(d)?;
            raw.map(|s| super::parse(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
