use std::{path::Path, str::FromStr};

use ahash::{HashMap, HashMapExt};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not read configuration file {0}: {1}")]
    Io(std::path::PathBuf, std::io::Error),

    #[error("Malformed configuration line {line}: \"{text}\"")]
    MalformedLine { line: usize, text: String },
}

/// Iterates the meaningful lines of a configuration file, skipping blank lines and comments.
struct ConfigLines<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
}

impl<'a> ConfigLines<'a> {
    fn new(data: &'a str) -> Self {
        Self {
            lines: data.lines().enumerate(),
        }
    }
}

impl<'a> Iterator for ConfigLines<'a> {
    /// (1-based line number, trimmed line)
    type Item = (usize, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (index, line) = self.lines.next()?;
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            return Some((index + 1, line));
        }
    }
}

/// Splits a `key=value` line, trimming whitespace around both halves.
fn split_setting(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}

/// Engine settings read from a `key=value` file.
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    settings: HashMap<String, String>,
}

impl Configuration {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        let configuration = Self::parse(&data)?;

        tracing::info!(
            "Loaded {} settings from {}",
            configuration.settings.len(),
            path.display()
        );

        Ok(configuration)
    }

    pub fn parse(data: &str) -> Result<Self, ConfigError> {
        let mut settings = HashMap::new();

        for (line, text) in ConfigLines::new(data) {
            let Some((key, value)) = split_setting(text) else {
                return Err(ConfigError::MalformedLine {
                    line,
                    text: text.to_string(),
                });
            };

            // Later settings override earlier ones.
            settings.insert(key.to_string(), value.to_string());
        }

        Ok(Self { settings })
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.settings.insert(key.into(), value.into());
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.settings
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Typed lookup. A value that is present but does not parse is reported and treated as
    /// missing.
    pub fn get<T: FromStr>(&self, key: &str) -> Option<T> {
        let value = self.get_str(key)?;
        match value.parse::<T>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Invalid value for setting \"{key}\": \"{value}\"");
                None
            }
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get_str(key).map(|value| value == "true" || value == "1")
    }
}
