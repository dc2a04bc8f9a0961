use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

use merchant_eval::{MerchantEvalConfig, RequirementChecker};

use super::build_record;

#[derive(Debug, Serialize)]
struct CheckReport<'a> {
    missing_count: usize,
    missing_fields: Vec<&'a str>,
    complete: bool,
}

pub struct CheckCommand {
    pub fields: Vec<(String, String)>,
    pub profile: Option<PathBuf>,
    pub json: bool,
}

impl CheckCommand {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self {
            fields,
            profile: None,
            json: false,
        }
    }

    pub fn with_profile(mut self, profile: Option<PathBuf>) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn execute(&self, config: &MerchantEvalConfig) -> Result<()> {
        let record = build_record(self.profile.as_deref(), &self.fields)?;
        let checker = RequirementChecker::new(config.evaluation.required_field_set());

        let missing_fields = checker.missing_fields(&record);
        let report = CheckReport {
            missing_count: missing_fields.len(),
            complete: missing_fields.is_empty(),
            missing_fields,
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        if report.complete {
            println!("✅ All {} required fields are present", checker.required().len());
        } else {
            println!("📋 Missing required fields: {}", report.missing_count);
            for field in &report.missing_fields {
                println!("   • {field}");
            }
        }
        Ok(())
    }
}
