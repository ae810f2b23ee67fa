//! Errors raised while binding a snapshot onto a typed record

use std::fmt::Display;

/// Error type for [`unmarshal`](crate::provider::AzureAppConfiguration::unmarshal).
///
/// `path` is the dotted location inside the settings tree where the failure
/// happened; it is empty at the root.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    /// A field without a default had no matching setting.
    #[error("missing required field '{}'", join(.path, .field))]
    MissingField { path: String, field: String },

    /// A setting value could not be coerced to the field's declared type.
    #[error("invalid value at '{}': got {value}, expected {expected}", location(.path))]
    InvalidValue {
        path: String,
        value: String,
        expected: String,
    },

    /// Any other error reported by the target type's deserializer.
    #[error("cannot bind '{}': {message}", location(.path))]
    Message { path: String, message: String },

    /// The configured key separator is not one of the supported ones.
    #[error("invalid key separator '{0}', expected one of . , ; - _ __ / :")]
    InvalidSeparator(String),

    /// The settings tree could not be encoded as JSON.
    #[error("cannot encode settings: {0}")]
    Encode(String),
}

impl BindError {
    /// Prefixes the error location with a parent segment.
    pub(crate) fn at(self, segment: &str) -> Self {
        match self {
            Self::MissingField { path, field } => Self::MissingField {
                path: prefix(segment, path),
                field,
            },
            Self::InvalidValue {
                path,
                value,
                expected,
            } => Self::InvalidValue {
                path: prefix(segment, path),
                value,
                expected,
            },
            Self::Message { path, message } => Self::Message {
                path: prefix(segment, path),
                message,
            },
            other => other,
        }
    }

    /// Creates a coercion failure at the current location.
    pub(crate) fn coercion(value: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::InvalidValue {
            path: String::new(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Returns the dotted location of the failure, empty at the root.
    pub fn path(&self) -> &str {
        match self {
            Self::MissingField { path, .. }
            | Self::InvalidValue { path, .. }
            | Self::Message { path, .. } => path,
            Self::InvalidSeparator(_) | Self::Encode(_) => "",
        }
    }
}

impl serde::de::Error for BindError {
    fn custom<T: Display>(msg: T) -> Self {
        Self::Message {
            path: String::new(),
            message: msg.to_string(),
        }
    }

    fn missing_field(field: &'static str) -> Self {
        Self::MissingField {
            path: String::new(),
            field: field.to_string(),
        }
    }

    fn invalid_type(unexp: serde::de::Unexpected, exp: &dyn serde::de::Expected) -> Self {
        Self::coercion(unexp.to_string(), exp.to_string())
    }

    fn invalid_value(unexp: serde::de::Unexpected, exp: &dyn serde::de::Expected) -> Self {
        Self::coercion(unexp.to_string(), exp.to_string())
    }
}

fn prefix(segment: &str, path: String) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", segment, path)
    }
}

fn join(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", path, field)
    }
}

fn location(path: &str) -> &str {
    if path.is_empty() { "<root>" } else { path }
}
