//! INI file configuration adapter.

use configparser::ini::Ini;
use std::path::Path;

use crate::ports::config_port::ConfigPort;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
[data]
base_path = ./data
pair = EURUSD
timeframe = H1

[backtest]
initial_balance = 10000.0
leverage = 30
commission = 2.5

[strategy]
name = ma_crossover
fast = 10
slow = 50
use_stop = yes
"#;

    #[test]
    fn from_string_reads_values() {
        let adapter = FileConfigAdapter::from_string(SAMPLE).unwrap();

        assert_eq!(
            adapter.get_string("data", "pair"),
            Some("EURUSD".to_string())
        );
        assert_eq!(adapter.get_int("strategy", "fast", 0), 10);
        assert!((adapter.get_double("backtest", "initial_balance", 0.0) - 10000.0).abs() < 1e-9);
        assert!(adapter.get_bool("strategy", "use_stop", false));
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let adapter = FileConfigAdapter::from_string(SAMPLE).unwrap();

        assert_eq!(adapter.get_string("data", "nope"), None);
        assert_eq!(adapter.get_int("strategy", "nope", 7), 7);
        assert!((adapter.get_double("backtest", "nope", 1.5) - 1.5).abs() < 1e-9);
        assert!(adapter.get_bool("strategy", "nope", true));
    }

    #[test]
    fn from_file_loads() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", SAMPLE).unwrap();

        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("strategy", "name"),
            Some("ma_crossover".to_string())
        );
    }

    #[test]
    fn bool_parsing_variants() {
        let adapter = FileConfigAdapter::from_string(
            "[flags]\na = true\nb = no\nc = 1\nd = maybe\n",
        )
        .unwrap();
        assert!(adapter.get_bool("flags", "a", false));
        assert!(!adapter.get_bool("flags", "b", true));
        assert!(adapter.get_bool("flags", "c", false));
        // unparseable value falls back to the default
        assert!(adapter.get_bool("flags", "d", true));
    }
}
