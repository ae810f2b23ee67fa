//! Key and label filters
//!
//! Both `key` and `label` query parameters share one grammar:
//!
//! | Filter        | Matches                                      |
//! |---------------|----------------------------------------------|
//! | `` / `*…`     | everything                                   |
//! | `\0`          | the null label (no label)                    |
//! | `a,b,\0`      | any of the listed values (at most 5)         |
//! | `app*`        | values starting with `app`                   |
//! | `app`         | exactly `app`                                |
//!
//! `\` escapes the reserved characters `*`, `,` and `\`.

use crate::error::Error;

/// Filter value selecting the null label.
pub const NULL_LABEL: &str = "\0";

const ESCAPE: char = '\\';
const WILDCARD: char = '*';
const SEPARATOR: char = ',';
const MAX_LIST_ITEMS: usize = 5;

// =============================================================================
// SettingSelector
// =============================================================================

/// Selects settings by key and label filter.
///
/// A `label_filter` of `None` leaves the label unconstrained on the wire (the
/// service then matches every label); use [`SettingSelector::null_label`] to
/// ask for unlabelled settings only.
///
/// # Example
///
/// ```
/// use appconfig_lib::api::SettingSelector;
///
/// let all = SettingSelector::all();
/// let app = SettingSelector::new("App.*").label("prod");
/// let unlabelled = SettingSelector::new("*").null_label();
///
/// assert_eq!(app.key_filter, "App.*");
/// assert_eq!(unlabelled.label_filter.as_deref(), Some("\0"));
/// # let _ = all;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingSelector {
    /// Key filter expression.
    pub key_filter: String,
    /// Label filter expression, `None` for any label.
    pub label_filter: Option<String>,
}

impl SettingSelector {
    /// Selects keys matching `key_filter` with any label.
    pub fn new(key_filter: impl Into<String>) -> Self {
        Self {
            key_filter: key_filter.into(),
            label_filter: None,
        }
    }

    /// Selects every setting.
    pub fn all() -> Self {
        Self::new("*")
    }

    /// Selects exactly one key, escaping reserved characters.
    pub fn exact_key(key: &str) -> Self {
        Self::new(escape(key))
    }

    /// Restricts the selector to a label filter.
    pub fn label(mut self, label_filter: impl Into<String>) -> Self {
        self.label_filter = Some(label_filter.into());
        self
    }

    /// Restricts the selector to the null label.
    pub fn null_label(self) -> Self {
        self.label(NULL_LABEL)
    }

    /// Parses both filters, rejecting malformed expressions.
    pub fn parse(&self) -> Result<(StringFilter, StringFilter), Error> {
        let key = StringFilter::parse(&self.key_filter)?;
        let label = match &self.label_filter {
            Some(label) => StringFilter::parse(label)?,
            None => StringFilter::Any,
        };
        Ok((key, label))
    }

    /// Returns `true` if a setting with this key and label would be selected.
    pub fn matches(&self, key: &str, label: Option<&str>) -> Result<bool, Error> {
        let (key_filter, label_filter) = self.parse()?;
        Ok(key_filter.matches(Some(key)) && label_filter.matches(label))
    }

    /// Query parameters for `GET /kv`.
    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![("key", self.key_filter.as_str())];
        if let Some(label) = &self.label_filter {
            pairs.push(("label", label.as_str()));
        }
        pairs
    }
}

impl Default for SettingSelector {
    fn default() -> Self {
        Self::all()
    }
}

// =============================================================================
// StringFilter
// =============================================================================

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringFilter {
    /// Matches everything, including the null value.
    Any,
    /// Matches only the null value.
    Null,
    /// Matches one exact value.
    Exact(String),
    /// Matches values starting with a prefix.
    Prefix(String),
    /// Matches any listed value; `None` stands for the null value.
    AnyOf(Vec<Option<String>>),
}

impl StringFilter {
    /// Parses a filter expression.
    pub fn parse(filter: &str) -> Result<Self, Error> {
        if filter.is_empty() || filter.starts_with(WILDCARD) {
            return Ok(Self::Any);
        }

        if filter == NULL_LABEL {
            return Ok(Self::Null);
        }

        let items = split_escaped(filter, SEPARATOR);
        if items.len() > 1 {
            if items.len() > MAX_LIST_ITEMS {
                return Err(Error::InvalidSelector(format!(
                    "'{}': too many values, maximum supported is {}",
                    filter, MAX_LIST_ITEMS
                )));
            }

            let mut values = Vec::with_capacity(items.len());
            let mut offset = 0;
            for item in items {
                if item == NULL_LABEL {
                    values.push(None);
                } else {
                    values.push(Some(unescape(filter, item, offset)?));
                }
                offset += item.len() + 1;
            }
            return Ok(Self::AnyOf(values));
        }

        if let Some(prefix) = filter.strip_suffix(WILDCARD) {
            if !is_escaped(filter, filter.len() - 1) {
                return Ok(Self::Prefix(unescape(filter, prefix, 0)?));
            }
        }

        Ok(Self::Exact(unescape(filter, filter, 0)?))
    }

    /// Returns `true` if `value` (`None` for null) passes the filter.
    pub fn matches(&self, value: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::Null => value.is_none(),
            Self::Exact(expected) => value == Some(expected.as_str()),
            Self::Prefix(prefix) => value.is_some_and(|v| v.starts_with(prefix.as_str())),
            Self::AnyOf(values) => values.iter().any(|v| v.as_deref() == value),
        }
    }
}

/// Escapes the reserved characters `*`, `,` and `\`.
pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if is_reserved(c) {
            escaped.push(ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

fn is_reserved(c: char) -> bool {
    matches!(c, WILDCARD | SEPARATOR | ESCAPE)
}

/// Byte index `index` is preceded by an odd number of escape characters.
fn is_escaped(value: &str, index: usize) -> bool {
    value.as_bytes()[..index]
        .iter()
        .rev()
        .take_while(|b| **b == ESCAPE as u8)
        .count()
        % 2
        == 1
}

/// Splits on unescaped `separator`, keeping escape sequences intact.
fn split_escaped(value: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut chars = value.char_indices();

    while let Some((i, c)) = chars.next() {
        if c == ESCAPE {
            chars.next();
        } else if c == separator {
            parts.push(&value[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&value[start..]);
    parts
}

/// Removes escapes, rejecting unescaped reserved characters.
fn unescape(filter: &str, value: &str, offset: usize) -> Result<String, Error> {
    let mut unescaped = String::with_capacity(value.len());
    let mut chars = value.char_indices();

    while let Some((i, c)) = chars.next() {
        if c == ESCAPE {
            if let Some((_, next)) = chars.next() {
                unescaped.push(next);
            }
        } else if is_reserved(c) {
            return Err(Error::InvalidSelector(format!(
                "'{}': invalid character '{}' at position {}",
                filter,
                c,
                offset + i
            )));
        } else {
            unescaped.push(c);
        }
    }

    Ok(unescaped)
}
