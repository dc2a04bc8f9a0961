use serde::{Deserialize, Serialize};

use super::record::{Record, MERCHANT_REQUIRED_FIELDS};

/// Ordered attribute names that must be non-blank for a record to be complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct RequiredFieldSet {
    names: Vec<String>,
}

impl RequiredFieldSet {
    /// Repeated names are collapsed so each one is counted once.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        Self { names: unique }
    }

    pub fn merchant_profile() -> Self {
        Self::new(MERCHANT_REQUIRED_FIELDS)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for RequiredFieldSet {
    fn default() -> Self {
        Self::merchant_profile()
    }
}

impl From<Vec<String>> for RequiredFieldSet {
    fn from(names: Vec<String>) -> Self {
        Self::new(names)
    }
}

impl From<RequiredFieldSet> for Vec<String> {
    fn from(set: RequiredFieldSet) -> Self {
        set.names
    }
}

/// Absent keys and whitespace-only values both count as missing.
fn is_missing(record: &Record, name: &str) -> bool {
    record.get(name).map_or(true, |value| value.trim().is_empty())
}

/// Count how many of `required` are absent or blank in `record`.
pub fn count_missing(record: &Record, required: &RequiredFieldSet) -> usize {
    required
        .names()
        .iter()
        .filter(|name| is_missing(record, name))
        .count()
}

/// Stateless checker bound to a fixed set of required attributes.
#[derive(Debug, Clone, Default)]
pub struct RequirementChecker {
    required: RequiredFieldSet,
}

impl RequirementChecker {
    pub fn new(required: RequiredFieldSet) -> Self {
        Self { required }
    }

    pub fn required(&self) -> &RequiredFieldSet {
        &self.required
    }

    pub fn count_missing(&self, record: &Record) -> usize {
        count_missing(record, &self.required)
    }

    /// Missing attribute names, in required order.
    pub fn missing_fields<'a>(&'a self, record: &Record) -> Vec<&'a str> {
        self.required
            .names()
            .iter()
            .filter(|name| is_missing(record, name))
            .map(String::as_str)
            .collect()
    }

    pub fn is_complete(&self, record: &Record) -> bool {
        self.count_missing(record) == 0
    }
}
