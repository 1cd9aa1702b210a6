//! Per-component validators and cross-field form validators.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use weft_model::{ComponentId, MessageKey, Value};

use crate::tree::ComponentTree;

/// A rejected input: the message key plus the variables for its template.
///
/// `label` and `input` are filled in by form processing; validators only add
/// what is specific to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub key: MessageKey,
    pub vars: Vec<(&'static str, String)>,
}

impl ValidationError {
    pub fn new(key: MessageKey) -> Self {
        Self {
            key,
            vars: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_var(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.vars.push((name, value.into()));
        self
    }

    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(var, _)| *var == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Validates a single converted value.
pub trait Validator: Send + Sync + fmt::Debug {
    fn validate(&self, value: &Value) -> Result<(), ValidationError>;
}

#[derive(Debug, Clone, Copy)]
pub struct StringLengthValidator {
    min: usize,
    max: usize,
}

impl StringLengthValidator {
    pub fn between(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn maximum(max: usize) -> Self {
        Self::between(0, max)
    }
}

impl Validator for StringLengthValidator {
    fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        let length = value.to_input_string().chars().count();
        if (self.min..=self.max).contains(&length) {
            return Ok(());
        }
        Err(ValidationError::new(MessageKey::StringLength)
            .with_var("min", self.min.to_string())
            .with_var("max", self.max.to_string())
            .with_var("length", length.to_string()))
    }
}

/// Inclusive numeric range; applies to integer and decimal values.
#[derive(Debug, Clone, Copy)]
pub struct RangeValidator {
    min: i64,
    max: i64,
}

impl RangeValidator {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }
}

impl Validator for RangeValidator {
    fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        #[allow(clippy::cast_precision_loss)]
        let in_range = match value {
            Value::Integer(n) => (self.min..=self.max).contains(n),
            Value::Decimal(n) => *n >= self.min as f64 && *n <= self.max as f64,
            _ => true,
        };
        if in_range {
            return Ok(());
        }
        Err(ValidationError::new(MessageKey::Range)
            .with_var("min", self.min.to_string())
            .with_var("max", self.max.to_string()))
    }
}

/// The whole input must match the pattern.
#[derive(Debug, Clone)]
pub struct PatternValidator {
    regex: Regex,
    key: MessageKey,
}

impl PatternValidator {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{pattern})$"))?;
        Ok(Self {
            regex,
            key: MessageKey::Pattern,
        })
    }
}

impl Validator for PatternValidator {
    fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        let text = value.to_input_string();
        if self.regex.is_match(&text) {
            return Ok(());
        }
        Err(ValidationError::new(self.key).with_var("pattern", self.regex.as_str()))
    }
}

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("Invalid email regex")
});

#[derive(Debug, Clone, Copy, Default)]
pub struct EmailValidator;

impl Validator for EmailValidator {
    fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        if EMAIL_REGEX.is_match(&value.to_input_string()) {
            Ok(())
        } else {
            Err(ValidationError::new(MessageKey::Email))
        }
    }
}

/// Read-only view of converted input handed to form validators.
pub struct FormValidation<'a> {
    tree: &'a ComponentTree,
}

impl<'a> FormValidation<'a> {
    pub fn new(tree: &'a ComponentTree) -> Self {
        Self { tree }
    }

    pub fn converted(&self, id: ComponentId) -> Option<&'a Value> {
        self.tree.field(id).and_then(|field| field.converted())
    }

    pub fn raw_input(&self, id: ComponentId) -> Option<&'a [String]> {
        self.tree.field(id).and_then(|field| field.raw_input())
    }

    pub fn label(&self, id: ComponentId) -> String {
        self.tree.label_of(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormValidationError {
    /// The component the message is attached to.
    pub reporter: ComponentId,
    pub error: ValidationError,
}

/// A cross-field validator over a fixed set of form components.
///
/// The validator is not invoked at all when one of its dependencies failed
/// its own validation or is no longer visible on the page.
pub trait FormValidator: Send + Sync + fmt::Debug {
    fn dependencies(&self) -> &[ComponentId];

    fn validate(&self, form: &FormValidation<'_>) -> Result<(), FormValidationError>;
}

/// Both inputs must convert to the same value, e.g. password confirmation.
#[derive(Debug, Clone)]
pub struct EqualInputValidator {
    dependencies: [ComponentId; 2],
}

impl EqualInputValidator {
    pub fn new(first: ComponentId, second: ComponentId) -> Self {
        Self {
            dependencies: [first, second],
        }
    }
}

impl FormValidator for EqualInputValidator {
    fn dependencies(&self) -> &[ComponentId] {
        &self.dependencies
    }

    fn validate(&self, form: &FormValidation<'_>) -> Result<(), FormValidationError> {
        let [first, second] = self.dependencies;
        if form.converted(first) == form.converted(second) {
            return Ok(());
        }
        let input = |id| {
            form.converted(id)
                .map(Value::to_input_string)
                .unwrap_or_default()
        };
        Err(FormValidationError {
            reporter: second,
            error: ValidationError::new(MessageKey::EqualInput)
                .with_var("label0", form.label(first))
                .with_var("label1", form.label(second))
                .with_var("input0", input(first))
                .with_var("input1", input(second)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_length_counts_chars() {
        let validator = StringLengthValidator::between(2, 3);
        assert!(validator.validate(&Value::text("äöü")).is_ok());
        let err = validator.validate(&Value::text("abcd")).unwrap_err();
        assert_eq!(err.key, MessageKey::StringLength);
        assert_eq!(err.var("length"), Some("4"));
    }

    #[test]
    fn range_accepts_bounds() {
        let validator = RangeValidator::new(1, 10);
        assert!(validator.validate(&Value::Integer(1)).is_ok());
        assert!(validator.validate(&Value::Integer(10)).is_ok());
        assert!(validator.validate(&Value::Integer(11)).is_err());
        assert!(validator.validate(&Value::Decimal(0.5)).is_err());
    }

    #[test]
    fn pattern_matches_whole_input() {
        let validator = PatternValidator::new("[0-9]{4}").unwrap();
        assert!(validator.validate(&Value::text("1234")).is_ok());
        assert!(validator.validate(&Value::text("12345")).is_err());
    }

    #[test]
    fn email_shape() {
        assert!(EmailValidator.validate(&Value::text("ada@example.org")).is_ok());
        assert!(EmailValidator.validate(&Value::text("ada@localhost")).is_err());
        assert!(EmailValidator.validate(&Value::text("not an email")).is_err());
    }
}
