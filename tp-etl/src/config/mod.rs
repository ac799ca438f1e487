//! Run configuration
//!
//! Settings come from a TOML file, with CLI flags layered on top. The file is
//! located in priority order:
//! 1. `--config <path>`
//! 2. the `TP_ETL_CONFIG` environment variable
//! 3. `<config dir>/tp-etl/config.toml`, if it exists
//! 4. built-in defaults

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const CONFIG_ENV_VAR: &str = "TP_ETL_CONFIG";

const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1900..=2200;

/// File format for the unmatched-record export
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }
}

/// Per-run lab metadata attached to every appended row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabMetadata {
    pub name: String,
    /// Lab procedure reference
    pub sop: String,
    pub lab_id: Option<String>,
    /// Method detection limit description
    pub mdl: String,
}

impl Default for LabMetadata {
    fn default() -> Self {
        Self {
            name: "Florida International University SERC".to_string(),
            sop: "FIU BCAL SERL TP methods 2019".to_string(),
            lab_id: None,
            mdl: "0.0003% P by dry weight".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    /// EDD workbook to load
    pub input: PathBuf,
    pub sheet: String,
    /// First-cell text that marks the header row
    pub header_sentinel: String,
    pub hydrologic_year: i32,
    /// SQLite database holding the reference and destination tables
    pub database: PathBuf,
    /// Directory for the run log and exports
    pub workspace: PathBuf,
    pub duplicate_type: String,
    pub export_format: ExportFormat,
    pub lab: LabMetadata,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            sheet: "datasheet".to_string(),
            header_sentinel: "Sampling".to_string(),
            hydrologic_year: 0,
            database: PathBuf::from("periphyton.db"),
            workspace: PathBuf::from("workspace"),
            duplicate_type: "Total Phosphorus".to_string(),
            export_format: ExportFormat::Csv,
            lab: LabMetadata::default(),
        }
    }
}

/// Values given on the command line, which win over the file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub input: Option<PathBuf>,
    pub hydrologic_year: Option<i32>,
    pub database: Option<PathBuf>,
    pub workspace: Option<PathBuf>,
    pub export_format: Option<ExportFormat>,
}

impl EtlConfig {
    /// Locate, read and validate the configuration
    pub fn load(cli_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let env_path = std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from);
        let default_path = dirs::config_dir().map(|d| d.join("tp-etl").join("config.toml"));

        let mut config = match resolve_config_path(cli_path, env_path, default_path)? {
            Some(path) => {
                log::debug!("Reading configuration from {}", path.display());
                Self::from_file(&path)?
            }
            None => {
                log::debug!("No configuration file found, using defaults");
                Self::default()
            }
        };

        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(input) = overrides.input {
            self.input = input;
        }
        if let Some(year) = overrides.hydrologic_year {
            self.hydrologic_year = year;
        }
        if let Some(database) = overrides.database {
            self.database = database;
        }
        if let Some(workspace) = overrides.workspace {
            self.workspace = workspace;
        }
        if let Some(format) = overrides.export_format {
            self.export_format = format;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.input.as_os_str().is_empty() {
            bail!("No input EDD given (set `input` in the config file or pass --input)");
        }
        if !YEAR_RANGE.contains(&self.hydrologic_year) {
            bail!(
                "Hydrologic year {} is outside {}..={} (set `hydrologic_year` or pass --year)",
                self.hydrologic_year,
                YEAR_RANGE.start(),
                YEAR_RANGE.end()
            );
        }
        for (field, value) in [
            ("sheet", &self.sheet),
            ("header_sentinel", &self.header_sentinel),
            ("duplicate_type", &self.duplicate_type),
            ("lab.name", &self.lab.name),
            ("lab.sop", &self.lab.sop),
            ("lab.mdl", &self.lab.mdl),
        ] {
            if value.trim().is_empty() {
                bail!("Config value `{}` must not be empty", field);
            }
        }
        Ok(())
    }
}

/// Pick the config file to read. Explicit paths must exist; the default
/// location is only used when present.
fn resolve_config_path(
    cli_path: Option<&Path>,
    env_path: Option<PathBuf>,
    default_path: Option<PathBuf>,
) -> Result<Option<PathBuf>> {
    if let Some(path) = cli_path {
        if !path.exists() {
            bail!("Config file does not exist: {}", path.display());
        }
        return Ok(Some(path.to_path_buf()));
    }

    if let Some(path) = env_path.filter(|p| !p.as_os_str().is_empty()) {
        if !path.exists() {
            bail!(
                "Config file from {} does not exist: {}",
                CONFIG_ENV_VAR,
                path.display()
            );
        }
        return Ok(Some(path));
    }

    Ok(default_path.filter(|p| p.exists()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn valid() -> EtlConfig {
        EtlConfig {
            input: PathBuf::from("BICY 2021 Periphyton.xls"),
            hydrologic_year: 2021,
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = EtlConfig::default();
        assert_eq!(config.sheet, "datasheet");
        assert_eq!(config.header_sentinel, "Sampling");
        assert_eq!(config.duplicate_type, "Total Phosphorus");
        assert_eq!(config.export_format, ExportFormat::Csv);
        assert_eq!(config.lab.name, "Florida International University SERC");
        assert_eq!(config.lab.sop, "FIU BCAL SERL TP methods 2019");
        assert_eq!(config.lab.lab_id, None);
        assert_eq!(config.lab.mdl, "0.0003% P by dry weight");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: EtlConfig = toml::from_str(
            r#"
            input = "edd.xlsx"
            hydrologic_year = 2022
            export_format = "xlsx"

            [lab]
            lab_id = "SERC-7"
            "#,
        )
        .unwrap();

        assert_eq!(config.input, PathBuf::from("edd.xlsx"));
        assert_eq!(config.hydrologic_year, 2022);
        assert_eq!(config.export_format, ExportFormat::Xlsx);
        assert_eq!(config.lab.lab_id.as_deref(), Some("SERC-7"));
        assert_eq!(config.lab.sop, "FIU BCAL SERL TP methods 2019");
        assert_eq!(config.sheet, "datasheet");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_win() {
        let mut config = valid();
        config.apply(ConfigOverrides {
            hydrologic_year: Some(2023),
            workspace: Some(PathBuf::from("/tmp/hy2023")),
            ..Default::default()
        });

        assert_eq!(config.hydrologic_year, 2023);
        assert_eq!(config.workspace, PathBuf::from("/tmp/hy2023"));
        assert_eq!(config.input, PathBuf::from("BICY 2021 Periphyton.xls"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(valid().validate().is_ok());

        let mut no_input = valid();
        no_input.input = PathBuf::new();
        assert!(no_input.validate().is_err());

        let mut bad_year = valid();
        bad_year.hydrologic_year = 21;
        assert!(bad_year.validate().is_err());

        let mut no_lab = valid();
        no_lab.lab.name = "  ".to_string();
        let err = no_lab.validate().unwrap_err();
        assert!(err.to_string().contains("lab.name"));
    }

    #[test]
    fn test_config_path_priority() {
        let dir = std::env::temp_dir();
        let cli = dir.join(format!("tp-etl-cli-{}.toml", Uuid::new_v4()));
        let env = dir.join(format!("tp-etl-env-{}.toml", Uuid::new_v4()));
        std::fs::write(&cli, "").unwrap();
        std::fs::write(&env, "").unwrap();

        let chosen = resolve_config_path(Some(&cli), Some(env.clone()), None).unwrap();
        assert_eq!(chosen, Some(cli.clone()));

        let chosen = resolve_config_path(None, Some(env.clone()), None).unwrap();
        assert_eq!(chosen, Some(env.clone()));

        let missing_default = dir.join(format!("tp-etl-none-{}.toml", Uuid::new_v4()));
        let chosen = resolve_config_path(None, None, Some(missing_default)).unwrap();
        assert_eq!(chosen, None);

        let missing = dir.join(format!("tp-etl-gone-{}.toml", Uuid::new_v4()));
        assert!(resolve_config_path(Some(&missing), None, None).is_err());
        assert!(resolve_config_path(None, Some(missing), None).is_err());

        std::fs::remove_file(&cli).ok();
        std::fs::remove_file(&env).ok();
    }

    #[test]
    fn test_from_file_reports_parse_errors() {
        let path = std::env::temp_dir().join(format!("tp-etl-bad-{}.toml", Uuid::new_v4()));
        std::fs::write(&path, "hydrologic_year = \"twenty\"").unwrap();

        let err = EtlConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));

        std::fs::remove_file(&path).ok();
    }
}
