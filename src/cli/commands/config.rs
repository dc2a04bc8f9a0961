use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use merchant_eval::MerchantEvalConfig;

pub const CONFIG_FILE: &str = "merchant-eval.toml";

pub struct ConfigShowCommand;

impl ConfigShowCommand {
    pub fn execute(&self, config: &MerchantEvalConfig) -> Result<()> {
        print!("{}", toml::to_string_pretty(config)?);
        Ok(())
    }
}

pub struct ConfigInitCommand {
    pub path: PathBuf,
    pub force: bool,
}

impl ConfigInitCommand {
    pub fn new(force: bool) -> Self {
        Self {
            path: PathBuf::from(CONFIG_FILE),
            force,
        }
    }

    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = path.as_ref().to_path_buf();
        self
    }

    pub fn execute(&self) -> Result<()> {
        if self.path.exists() && !self.force {
            bail!(
                "{} already exists (use --force to overwrite)",
                self.path.display()
            );
        }

        MerchantEvalConfig::default().save_to_file(&self.path)?;
        println!("✅ Wrote default configuration to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_refuses_to_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "# existing").unwrap();

        let err = ConfigInitCommand::new(false)
            .with_path(&path)
            .execute()
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# existing");
    }

    #[test]
    fn test_init_writes_loadable_defaults() {
        let dir = TempDir::new().unwrap();
        ConfigInitCommand::new(false)
            .with_path(dir.path().join(CONFIG_FILE))
            .execute()
            .unwrap();

        let loaded = MerchantEvalConfig::load_from(dir.path()).unwrap();
        assert_eq!(loaded.evaluation.delay_ms, 6000);
        assert_eq!(loaded.evaluation.required_fields.len(), 5);
    }
}
