use inverter_domain::domain::BucketWidth;
use serde::Deserialize;
use std::{fs, path::PathBuf, time::Duration};

const CONFIG_ENV: &str = "INVERTER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "inverter-config.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResampleConfig {
    pub bucket_minutes: u32,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self {
            bucket_minutes: BucketWidth::DEFAULT_MINUTES,
        }
    }
}

impl ResampleConfig {
    pub fn bucket_width(&self) -> anyhow::Result<BucketWidth> {
        BucketWidth::from_minutes(self.bucket_minutes)
            .map_err(|e| anyhow::anyhow!("invalid resample.bucket_minutes: {e}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("report"),
            format: OutputFormat::Csv,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Overrides the delimiter picked from the file extension.
    pub delimiter: Option<char>,
}

impl SourceConfig {
    pub fn delimiter_byte(&self) -> anyhow::Result<Option<u8>> {
        match self.delimiter {
            None => Ok(None),
            Some(c) if c.is_ascii() => Ok(Some(c as u8)),
            Some(c) => anyhow::bail!("invalid source.delimiter {c:?}: must be a single ASCII character"),
        }
    }
}

/// The CLI exits once the batch is written; `linger_secs` keeps `/metrics`
/// up that much longer so a scraper can collect the batch counters.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
    #[serde(default)]
    pub linger_secs: u64,
}

impl MetricsConfig {
    pub fn linger(&self) -> Option<Duration> {
        (self.linger_secs > 0).then(|| Duration::from_secs(self.linger_secs))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub resample: ResampleConfig,
    pub output: OutputConfig,
    pub source: SourceConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    /// Reads `$INVERTER_CONFIG`, or `inverter-config.toml` if that variable is
    /// unset. Only the default path may be absent, in which case defaults apply.
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let (path, explicit) = match env::var(CONFIG_ENV) {
            Ok(p) => (p, true),
            Err(_) => (DEFAULT_CONFIG_PATH.to_string(), false),
        };

        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path, "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(anyhow::anyhow!("failed to read config {path}: {e}")),
        };
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        cfg.resample.bucket_width()?;
        cfg.source.delimiter_byte()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = AppConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.resample.bucket_minutes, 15);
        assert_eq!(cfg.output.format, OutputFormat::Csv);
        assert_eq!(cfg.output.dir, PathBuf::from("report"));
        assert!(cfg.metrics.is_none());
        assert_eq!(cfg.source.delimiter_byte().unwrap(), None);
    }

    #[test]
    fn parses_all_sections() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [resample]
            bucket_minutes = 30

            [output]
            dir = "/tmp/out"
            format = "json"

            [source]
            delimiter = ";"

            [metrics]
            bind_addr = "127.0.0.1:9100"
            linger_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(cfg.resample.bucket_width().unwrap().minutes(), 30);
        assert_eq!(cfg.output.format, OutputFormat::Json);
        assert_eq!(cfg.source.delimiter_byte().unwrap(), Some(b';'));
        let metrics = cfg.metrics.unwrap();
        assert_eq!(metrics.bind_addr, "127.0.0.1:9100");
        assert_eq!(metrics.linger(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn metrics_exit_immediately_by_default() {
        let cfg = AppConfig::from_toml_str("[metrics]\nbind_addr = \"0.0.0.0:9100\"\n").unwrap();
        assert_eq!(cfg.metrics.unwrap().linger(), None);
    }

    #[test]
    fn rejects_bucket_width_that_breaks_alignment() {
        let err = AppConfig::from_toml_str("[resample]\nbucket_minutes = 7\n").unwrap_err();
        assert!(err.to_string().contains("bucket_minutes"));
    }

    #[test]
    fn rejects_non_ascii_delimiter() {
        assert!(AppConfig::from_toml_str("[source]\ndelimiter = \"§\"\n").is_err());
    }
}
