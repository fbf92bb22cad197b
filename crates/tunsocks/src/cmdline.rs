//! A configuration source built from `-c` command-line options.

use config::{ConfigError, Source, Value};
use std::borrow::Cow;
use std::collections::HashMap;

/// Configuration overrides given on the command line.
///
/// Each one is a line of toml, such as `forward.target_port = 443`.  As
/// a convenience, `key=value` lines whose value isn't valid toml get the
/// value quoted, so that `-c forward.target_host=example.com` works.
#[derive(Debug, Clone, Default)]
pub(crate) struct CmdLine {
    /// The lines, in the order they were given.
    lines: Vec<String>,
}

impl CmdLine {
    /// Make a new, empty set of overrides.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add one line of toml.
    pub(crate) fn push_toml_line<S: Into<String>>(&mut self, line: S) {
        self.lines.push(line.into());
    }

    /// Turn all of our lines into a single toml document.
    fn build_toml(&self) -> Result<String, ConfigError> {
        let mut doc = String::new();
        for line in &self.lines {
            let line = quote_bare_value(line);
            if let Err(e) = toml::from_str::<toml::Value>(&line) {
                return Err(ConfigError::Message(format!(
                    "Couldn't parse command-line option {:?}: {}",
                    line, e
                )));
            }
            doc.push_str(&line);
            doc.push('\n');
        }
        Ok(doc)
    }
}

impl Source for CmdLine {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> Result<HashMap<String, Value>, ConfigError> {
        let doc = self.build_toml()?;
        let value: toml::Value =
            toml::from_str(&doc).map_err(|e| ConfigError::Foreign(Box::new(e)))?;
        value
            .try_into()
            .map_err(|e| ConfigError::Foreign(Box::new(e)))
    }
}

/// If `line` isn't valid toml, but looks like `key=value` with a bare
/// value, return it with the value in quotes.  Otherwise return `line`
/// unchanged.
fn quote_bare_value(line: &str) -> Cow<'_, str> {
    if toml::from_str::<toml::Value>(line).is_ok() {
        return Cow::Borrowed(line);
    }
    let (key, value) = match line.split_once('=') {
        Some((k, v)) => (k.trim(), v.trim()),
        None => return Cow::Borrowed(line),
    };
    let key_ok = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-.".contains(c));
    let value_ok = !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || "\"'[]{}#=".contains(c));
    if key_ok && value_ok {
        Cow::Owned(format!("{}=\"{}\"", key, value))
    } else {
        Cow::Borrowed(line)
    }
}
