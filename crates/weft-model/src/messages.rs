//! Message templates for validation and upload feedback.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MessageKey {
    Required,
    ConversionError,
    StringLength,
    Range,
    Pattern,
    Email,
    InvalidChoice,
    EqualInput,
    UploadTooLarge,
    UploadFailed,
}

impl MessageKey {
    pub const ALL: [MessageKey; 10] = [
        MessageKey::Required,
        MessageKey::ConversionError,
        MessageKey::StringLength,
        MessageKey::Range,
        MessageKey::Pattern,
        MessageKey::Email,
        MessageKey::InvalidChoice,
        MessageKey::EqualInput,
        MessageKey::UploadTooLarge,
        MessageKey::UploadFailed,
    ];

    fn default_template(self) -> &'static str {
        match self {
            Self::Required => "Field '${label}' is required.",
            Self::ConversionError => "'${input}' is not a valid ${type} for '${label}'.",
            Self::StringLength => "'${label}' must be between ${min} and ${max} characters long.",
            Self::Range => "'${label}' must be between ${min} and ${max}.",
            Self::Pattern => "'${input}' does not match the expected format for '${label}'.",
            Self::Email => "'${input}' is not a valid email address.",
            Self::InvalidChoice => "'${input}' is not a valid choice for '${label}'.",
            Self::EqualInput => "'${label0}' and '${label1}' must be equal.",
            Self::UploadTooLarge => "Upload must be less than ${limit} bytes (received ${actual}).",
            Self::UploadFailed => "Upload failed: ${reason}",
        }
    }
}

/// Message templates keyed by [`MessageKey`], with `${var}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageCatalog {
    overrides: BTreeMap<MessageKey, String>,
}

impl MessageCatalog {
    pub fn with_overrides(overrides: BTreeMap<MessageKey, String>) -> Self {
        Self { overrides }
    }

    pub fn template(&self, key: MessageKey) -> &str {
        self.overrides
            .get(&key)
            .map(String::as_str)
            .unwrap_or_else(|| key.default_template())
    }

    pub fn format(&self, key: MessageKey, vars: &[(&str, String)]) -> String {
        interpolate(self.template(key), vars)
    }
}

/// Replace `${name}` placeholders. Unknown names are left as written.
pub fn interpolate(template: &str, vars: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match vars.iter().find(|(var, _)| *var == name) {
                    Some((_, value)) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 1]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_known_vars_only() {
        let out = interpolate("${a} and ${b} ${", &[("a", "x".into())]);
        assert_eq!(out, "x and ${b} ${");
    }

    #[test]
    fn overrides_replace_defaults() {
        let mut overrides = BTreeMap::new();
        overrides.insert(MessageKey::Required, "${label} fehlt".to_string());
        let catalog = MessageCatalog::with_overrides(overrides);
        assert_eq!(
            catalog.format(MessageKey::Required, &[("label", "Name".into())]),
            "Name fehlt"
        );
        assert!(catalog.template(MessageKey::Range).contains("${min}"));
    }
}
