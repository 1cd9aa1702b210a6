//! The closed set of interfaces a URL may invoke on a component.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Listener interfaces invokable by URL.
///
/// Only these names decode; anything else is rejected before a page is
/// even looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerInterface {
    /// Form submission.
    Submit,
    /// Link click.
    Click,
    /// Immediate selection change on a choice component.
    SelectionChange,
    /// Re-render the addressed page.
    Redirect,
}

impl ListenerInterface {
    pub const ALL: [ListenerInterface; 4] = [
        ListenerInterface::Submit,
        ListenerInterface::Click,
        ListenerInterface::SelectionChange,
        ListenerInterface::Redirect,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Click => "click",
            Self::SelectionChange => "change",
            Self::Redirect => "redirect",
        }
    }

    /// Whether a request with this interface changes server-side state.
    pub fn is_mutating(self) -> bool {
        !matches!(self, Self::Redirect)
    }
}

impl fmt::Display for ListenerInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListenerInterface {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|interface| interface.as_str() == s)
            .ok_or_else(|| ModelError::UnknownInterface(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for interface in ListenerInterface::ALL {
            assert_eq!(interface.as_str().parse::<ListenerInterface>().unwrap(), interface);
        }
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!("getClass".parse::<ListenerInterface>().is_err());
        assert!("Submit".parse::<ListenerInterface>().is_err());
    }
}
