//! Ordered multimap of request and page parameters.

use std::collections::BTreeMap;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};

// `:` and `.` stay literal so component paths remain readable in URLs.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b':');

pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, QUERY_ENCODE_SET).to_string()
}

pub fn decode_component(value: &str) -> String {
    let spaced = value.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Parameters keyed by name, each holding every submitted value in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameters {
    entries: BTreeMap<String, Vec<String>>,
}

/// Parameters handed to a bookmarkable page's factory.
pub type PageParameters = Parameters;

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an `application/x-www-form-urlencoded` string (with or without
    /// a leading `?`).
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::new();
        for pair in query.trim_start_matches('?').split('&') {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode_component(key);
            if key.is_empty() {
                continue;
            }
            params.append(key, decode_component(value));
        }
        params
    }

    pub fn to_query(&self) -> String {
        let mut pairs = Vec::new();
        for (key, values) in &self.entries {
            for value in values {
                pairs.push(format!(
                    "{}={}",
                    encode_component(key),
                    encode_component(value)
                ));
            }
        }
        pairs.join("&")
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Replace all values for `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), vec![value.into()]);
    }

    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.entry(key.into()).or_default().push(value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.entries.remove(key)
    }

    /// Append every value of `other`, keeping existing values first.
    pub fn merge(&mut self, other: &Parameters) {
        for (key, values) in &other.entries {
            self.entries
                .entry(key.clone())
                .or_default()
                .extend(values.iter().cloned());
        }
    }

    #[must_use]
    pub fn without(&self, keys: &[&str]) -> Self {
        let entries = self
            .entries
            .iter()
            .filter(|(key, _)| !keys.contains(&key.as_str()))
            .map(|(key, values)| (key.clone(), values.clone()))
            .collect();
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Parameters
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.append(key, value);
        }
        params
    }
}
