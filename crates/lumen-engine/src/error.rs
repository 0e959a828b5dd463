use std::fmt;

/// A rejected configuration value or engine parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    /// Name of the offending field or parameter key.
    pub key: String,
    pub message: String,
}

impl ConfigError {
    pub(crate) fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self { key: key.into(), message: message.into() }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid `{}`: {}", self.key, self.message)
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_key() {
        let err = ConfigError::new("far_clip", "must exceed near_clip");
        assert_eq!(err.to_string(), "invalid `far_clip`: must exceed near_clip");
    }

    #[test]
    fn converts_into_anyhow() {
        let err: anyhow::Error = ConfigError::new("threads", "not a number").into();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }
}
