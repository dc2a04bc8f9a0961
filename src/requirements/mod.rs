// Requirement completeness checks over merchant records

pub mod checker;
pub mod record;

pub use checker::{count_missing, RequiredFieldSet, RequirementChecker};
pub use record::{MerchantProfile, Record, MERCHANT_REQUIRED_FIELDS};
