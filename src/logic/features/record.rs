//! Feature Record - validated input measurements
//!
//! A [`RawRecord`] is whatever the client sent. It becomes a [`FeatureRecord`]
//! only after every canonical key is found with a numeric value.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use super::layout::{Feature, FEATURE_COUNT};

/// Inbound record as received on the wire
pub type RawRecord = serde_json::Map<String, Value>;

/// Client-caused schema violation
///
/// Lists every offending field (not just the first) in canonical order.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}", describe(.missing, .malformed))]
pub struct SchemaError {
    /// Required fields absent from the record
    pub missing: Vec<String>,
    /// Fields present but not numeric
    pub malformed: Vec<String>,
}

fn describe(missing: &[String], malformed: &[String]) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing required fields: {}", missing.join(", ")));
    }
    if !malformed.is_empty() {
        parts.push(format!("non-numeric fields: {}", malformed.join(", ")));
    }
    parts.join("; ")
}

/// Validated, immutable set of the 22 canonical measurements
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    values: [f64; FEATURE_COUNT],
}

impl FeatureRecord {
    /// Validate a raw record. Extra keys are ignored.
    pub fn from_raw(raw: &RawRecord) -> Result<Self, SchemaError> {
        let mut values = [0.0f64; FEATURE_COUNT];
        let mut missing = Vec::new();
        let mut malformed = Vec::new();

        for feature in Feature::ALL {
            match raw.get(feature.wire_name()) {
                None => missing.push(feature.wire_name().to_string()),
                Some(value) => match value.as_f64() {
                    Some(v) => values[feature.index()] = v,
                    None => malformed.push(feature.wire_name().to_string()),
                },
            }
        }

        if missing.is_empty() && malformed.is_empty() {
            Ok(Self { values })
        } else {
            Err(SchemaError { missing, malformed })
        }
    }

    /// Build from values already in canonical order
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.values
    }

    /// (feature, value) pairs in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        Feature::ALL.iter().map(move |f| (*f, self.values[f.index()]))
    }
}

impl Serialize for FeatureRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FEATURE_COUNT))?;
        for (feature, value) in self.iter() {
            map.serialize_entry(feature.wire_name(), &value)?;
        }
        map.end()
    }
}
