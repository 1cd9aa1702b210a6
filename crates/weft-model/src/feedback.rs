//! Feedback messages attached to components during a request.

use serde::Serialize;

use crate::ids::ComponentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackLevel {
    Info,
    Warning,
    Error,
}

impl FeedbackLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackMessage {
    /// Component the message is about; `None` for page-level messages.
    pub reporter: Option<ComponentId>,
    pub level: FeedbackLevel,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedbackMessages {
    messages: Vec<FeedbackMessage>,
}

impl FeedbackMessages {
    pub fn add(&mut self, reporter: Option<ComponentId>, level: FeedbackLevel, message: impl Into<String>) {
        self.messages.push(FeedbackMessage {
            reporter,
            level,
            message: message.into(),
        });
    }

    pub fn error(&mut self, reporter: ComponentId, message: impl Into<String>) {
        self.add(Some(reporter), FeedbackLevel::Error, message);
    }

    pub fn info(&mut self, reporter: Option<ComponentId>, message: impl Into<String>) {
        self.add(reporter, FeedbackLevel::Info, message);
    }

    pub fn has_error_for(&self, reporter: ComponentId) -> bool {
        self.messages
            .iter()
            .any(|m| m.reporter == Some(reporter) && m.level == FeedbackLevel::Error)
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|m| m.level == FeedbackLevel::Error)
    }

    pub fn messages(&self) -> &[FeedbackMessage] {
        &self.messages
    }

    pub fn messages_for(&self, reporter: ComponentId) -> impl Iterator<Item = &FeedbackMessage> {
        self.messages
            .iter()
            .filter(move |m| m.reporter == Some(reporter))
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
