// Record snapshots and the merchant profile form model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MERCHANT_NAME: &str = "merchantName";
pub const BUSINESS_TYPE: &str = "businessType";
pub const CONTACT_EMAIL: &str = "contactEmail";
pub const PHONE_NUMBER: &str = "phoneNumber";
pub const ADDRESS: &str = "address";

/// Attributes a merchant profile needs before it counts as complete.
pub const MERCHANT_REQUIRED_FIELDS: [&str; 5] = [
    MERCHANT_NAME,
    BUSINESS_TYPE,
    CONTACT_EMAIL,
    PHONE_NUMBER,
    ADDRESS,
];

/// A set of named string attributes, possibly partially filled.
///
/// Records are plain values: the workflow clones the submitted record into the
/// run, so later edits to the caller's copy never reach an in-flight evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Merchant profile as captured by the evaluation form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantProfile {
    pub merchant_name: Option<String>,
    pub business_type: Option<String>,
    pub contact_email: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
}

impl MerchantProfile {
    /// Convert into a record; unset fields are left out rather than stored empty.
    pub fn to_record(&self) -> Record {
        [
            (MERCHANT_NAME, &self.merchant_name),
            (BUSINESS_TYPE, &self.business_type),
            (CONTACT_EMAIL, &self.contact_email),
            (PHONE_NUMBER, &self.phone_number),
            (ADDRESS, &self.address),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_ref().map(|v| (name, v.clone())))
        .collect()
    }
}

impl From<&MerchantProfile> for Record {
    fn from(profile: &MerchantProfile) -> Self {
        profile.to_record()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_to_record_skips_unset_fields() {
        let profile = MerchantProfile {
            merchant_name: Some("Acme".to_string()),
            address: Some(String::new()),
            ..Default::default()
        };

        let record = profile.to_record();
        assert_eq!(record.len(), 2);
        assert_eq!(record.get(MERCHANT_NAME), Some("Acme"));
        assert_eq!(record.get(ADDRESS), Some(""));
        assert_eq!(record.get(CONTACT_EMAIL), None);
    }

    #[test]
    fn test_profile_deserializes_camel_case_keys() {
        let profile: MerchantProfile =
            serde_json::from_str(r#"{"merchantName":"Acme","phoneNumber":"555-0100"}"#).unwrap();
        assert_eq!(profile.merchant_name.as_deref(), Some("Acme"));
        assert_eq!(profile.phone_number.as_deref(), Some("555-0100"));
        assert!(profile.business_type.is_none());
    }

    #[test]
    fn test_record_clone_is_independent_snapshot() {
        let mut form = Record::new().with("name", "Acme");
        let snapshot = form.clone();
        form.set("name", "Changed");
        form.set("email", "ops@acme.test");

        assert_eq!(snapshot.get("name"), Some("Acme"));
        assert_eq!(snapshot.get("email"), None);
    }
}
