//! Config value parsing.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigurationError;

/// Config value which consists of a name and optional options.
///
/// Example: `Random[seed=7]` has name `Random` and options `{seed: 7}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValue {
    name: String,
    options: BTreeMap<String, String>,
}

impl ConfigValue {
    /// Parses config value string. Options without `=` are ignored.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dslab_drs::core::config::ConfigValue;
    ///
    /// let value = ConfigValue::parse("Random[seed=7,limit=3]");
    /// assert_eq!(value.name(), "Random");
    /// assert_eq!(value.get::<u64>("seed").unwrap(), Some(7));
    /// assert_eq!(value.get::<u64>("other").unwrap(), None);
    /// ```
    pub fn parse(config_str: &str) -> Self {
        let (name, options_str) = match config_str.split_once('[') {
            Some((l, r)) => (l, r.trim_end_matches(']')),
            None => (config_str, ""),
        };
        let mut options = BTreeMap::new();
        for option_str in options_str.split(',') {
            if let Some((option, value)) = option_str.split_once('=') {
                options.insert(option.trim().to_string(), value.trim().to_string());
            }
        }
        Self {
            name: name.trim().to_string(),
            options,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns parsed option value, `None` if the option is absent.
    pub fn get<T: FromStr>(&self, option: &str) -> Result<Option<T>, ConfigurationError> {
        match self.options.get(option) {
            None => Ok(None),
            Some(value) => value
                .parse::<T>()
                .map(Some)
                .map_err(|_| ConfigurationError::InvalidOption {
                    name: self.name.clone(),
                    option: option.to_string(),
                    value: value.clone(),
                }),
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.options.is_empty() {
            return write!(f, "{}", self.name);
        }
        let options: Vec<String> = self.options.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}[{}]", self.name, options.join(","))
    }
}
