use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

/// A set of labels. Each key maps to exactly one value.
pub type LabelSet = BTreeMap<String, String>;

const QUALIFIED_NAME_MAX_LENGTH: usize = 63;
const LABEL_VALUE_MAX_LENGTH: usize = 63;
const DNS_SUBDOMAIN_MAX_LENGTH: usize = 253;

lazy_static! {
    static ref QUALIFIED_NAME_RE: Regex =
        Regex::new(r"^([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9]$").unwrap();
    static ref DNS_SUBDOMAIN_RE: Regex =
        Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$").unwrap();
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorParseError {
    #[error("invalid selector: {0:?}")]
    InvalidTerm(String),

    #[error("invalid label key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("invalid label value {value:?} for key {key:?}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Returns `true` when the two sets share at least one key with different values.
pub fn conflicts(a: &LabelSet, b: &LabelSet) -> bool {
    // iterate over the smaller set
    let (small, big) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    small
        .iter()
        .any(|(key, value)| big.get(key).is_some_and(|other| other != value))
}

/// Union of the two sets. Values from `b` take precedence over the ones of `a`.
///
/// Callers are expected to rule out conflicts with [`conflicts`] first. Should a
/// conflicting key reach this point anyway, the override is reported.
pub fn merge(a: &LabelSet, b: &LabelSet) -> LabelSet {
    let mut merged = a.clone();

    for (key, value) in b {
        if let Some(previous) = merged.insert(key.clone(), value.clone()) {
            if &previous != value {
                warn!(
                    key = key.as_str(),
                    previous = previous.as_str(),
                    value = value.as_str(),
                    "merging conflicting label sets, value overridden"
                );
            }
        }
    }

    merged
}

/// Parse a selector expression like `zone=east,tier=gpu` into a [`LabelSet`].
///
/// An empty string produces an empty set.
pub fn parse_selector(selector: &str) -> Result<LabelSet, SelectorParseError> {
    let mut labels = LabelSet::new();
    if selector.is_empty() {
        return Ok(labels);
    }

    for term in selector.split(',') {
        let parts: Vec<&str> = term.split('=').collect();
        if parts.len() != 2 {
            return Err(SelectorParseError::InvalidTerm(term.to_owned()));
        }

        let key = parts[0].trim();
        validate_label_key(key)?;

        let value = parts[1].trim();
        validate_label_value(key, value)?;

        labels.insert(key.to_owned(), value.to_owned());
    }

    Ok(labels)
}

fn validate_label_key(key: &str) -> Result<(), SelectorParseError> {
    let invalid = |reason: String| SelectorParseError::InvalidKey {
        key: key.to_owned(),
        reason,
    };

    let name = match key.split('/').collect::<Vec<&str>>().as_slice() {
        [name] => *name,
        [prefix, name] => {
            if prefix.is_empty() {
                return Err(invalid("prefix part must be non-empty".to_owned()));
            }
            if prefix.len() > DNS_SUBDOMAIN_MAX_LENGTH {
                return Err(invalid(format!(
                    "prefix part must be no more than {DNS_SUBDOMAIN_MAX_LENGTH} characters"
                )));
            }
            if !DNS_SUBDOMAIN_RE.is_match(prefix) {
                return Err(invalid(
                    "prefix part must be a lowercase RFC 1123 subdomain".to_owned(),
                ));
            }
            *name
        }
        _ => {
            return Err(invalid(
                "a qualified name must consist of an optional prefix and a name separated by '/'"
                    .to_owned(),
            ))
        }
    };

    if name.is_empty() {
        return Err(invalid("name part must be non-empty".to_owned()));
    }
    if name.len() > QUALIFIED_NAME_MAX_LENGTH {
        return Err(invalid(format!(
            "name part must be no more than {QUALIFIED_NAME_MAX_LENGTH} characters"
        )));
    }
    if !QUALIFIED_NAME_RE.is_match(name) {
        return Err(invalid(
            "name part must consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character".to_owned(),
        ));
    }

    Ok(())
}

fn validate_label_value(key: &str, value: &str) -> Result<(), SelectorParseError> {
    if value.is_empty() {
        return Ok(());
    }

    let invalid = |reason: String| SelectorParseError::InvalidValue {
        key: key.to_owned(),
        value: value.to_owned(),
        reason,
    };

    if value.len() > LABEL_VALUE_MAX_LENGTH {
        return Err(invalid(format!(
            "must be no more than {LABEL_VALUE_MAX_LENGTH} characters"
        )));
    }
    if !QUALIFIED_NAME_RE.is_match(value) {
        return Err(invalid(
            "must consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character".to_owned(),
        ));
    }

    Ok(())
}
