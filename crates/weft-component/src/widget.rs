//! Concrete form widget kinds and their input conversion.

use weft_model::{MessageKey, UploadedFile, Value, ValueType, value::parse_bool};

use crate::validator::ValidationError;

/// One option of a choice widget. `id` is what the browser submits.
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub id: String,
    pub label: String,
    pub value: Value,
}

impl Choice {
    pub fn new(id: impl Into<String>, label: impl Into<String>, value: Value) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            value,
        }
    }

    /// A choice whose id, label and value are all the same text.
    pub fn text(text: &str) -> Self {
        Self::new(text, text, Value::text(text))
    }
}

/// Map a submitted id back to its choice.
pub fn choice_for_id<'a>(choices: &'a [Choice], id: &str) -> Option<&'a Choice> {
    choices.iter().find(|choice| choice.id == id)
}

/// Id of the choice holding `value`, used when rendering the current selection.
pub fn id_for_value<'a>(choices: &'a [Choice], value: &Value) -> Option<&'a str> {
    choices
        .iter()
        .find(|choice| &choice.value == value)
        .map(|choice| choice.id.as_str())
}

#[derive(Debug, Clone, PartialEq)]
pub enum Widget {
    TextField { value_type: ValueType },
    TextArea,
    PasswordField,
    CheckBox,
    DropDownChoice {
        choices: Vec<Choice>,
        /// Submit a `change` request as soon as the selection changes.
        notify_selection_change: bool,
    },
    ListMultipleChoice { choices: Vec<Choice> },
    HiddenField { value_type: ValueType },
    FileUpload,
}

impl Widget {
    pub fn text() -> Self {
        Self::TextField {
            value_type: ValueType::Text,
        }
    }

    pub fn typed(value_type: ValueType) -> Self {
        Self::TextField { value_type }
    }

    pub fn drop_down(choices: Vec<Choice>) -> Self {
        Self::DropDownChoice {
            choices,
            notify_selection_change: false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TextField { .. } => "text field",
            Self::TextArea => "text area",
            Self::PasswordField => "password field",
            Self::CheckBox => "check box",
            Self::DropDownChoice { .. } => "drop-down choice",
            Self::ListMultipleChoice { .. } => "multiple choice",
            Self::HiddenField { .. } => "hidden field",
            Self::FileUpload => "file upload",
        }
    }

    pub fn choices(&self) -> &[Choice] {
        match self {
            Self::DropDownChoice { choices, .. } | Self::ListMultipleChoice { choices } => choices,
            _ => &[],
        }
    }

    pub fn is_multi_valued(&self) -> bool {
        matches!(self, Self::ListMultipleChoice { .. })
    }

    /// Convert raw request strings into a value.
    ///
    /// `Ok(None)` means "no input", which the required check and the
    /// validators treat specially.
    pub fn convert(
        &self,
        raw: &[String],
        upload: Option<&UploadedFile>,
    ) -> Result<Option<Value>, ValidationError> {
        let first = raw.first().map(String::as_str).unwrap_or_default();
        match self {
            Self::TextField { value_type } | Self::HiddenField { value_type } => {
                if first.trim().is_empty() {
                    return Ok(None);
                }
                value_type.parse(first).map(Some).ok_or_else(|| {
                    ValidationError::new(MessageKey::ConversionError)
                        .with_var("type", value_type.name())
                })
            }
            Self::TextArea | Self::PasswordField => {
                if first.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Value::text(first)))
                }
            }
            // Browsers omit unchecked boxes entirely.
            Self::CheckBox => {
                if first.is_empty() {
                    return Ok(Some(Value::Bool(false)));
                }
                parse_bool(first).map(|b| Some(Value::Bool(b))).ok_or_else(|| {
                    ValidationError::new(MessageKey::ConversionError)
                        .with_var("type", ValueType::Bool.name())
                })
            }
            Self::DropDownChoice { choices, .. } => {
                if first.is_empty() {
                    return Ok(None);
                }
                choice_for_id(choices, first)
                    .map(|choice| Some(choice.value.clone()))
                    .ok_or_else(|| ValidationError::new(MessageKey::InvalidChoice))
            }
            Self::ListMultipleChoice { choices } => {
                let mut values = Vec::new();
                for id in raw.iter().filter(|id| !id.is_empty()) {
                    let choice = choice_for_id(choices, id).ok_or_else(|| {
                        ValidationError::new(MessageKey::InvalidChoice)
                            .with_var("input", id.clone())
                    })?;
                    values.push(choice.value.clone());
                }
                if values.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Value::List(values)))
                }
            }
            Self::FileUpload => Ok(upload.cloned().map(Value::File)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn blank_text_is_no_input() {
        assert_eq!(Widget::text().convert(&raw(&["  "]), None), Ok(None));
        assert_eq!(Widget::text().convert(&[], None), Ok(None));
    }

    #[test]
    fn typed_field_reports_conversion_error() {
        let err = Widget::typed(ValueType::Integer)
            .convert(&raw(&["abc"]), None)
            .unwrap_err();
        assert_eq!(err.key, MessageKey::ConversionError);
        assert_eq!(err.var("type"), Some("integer"));
    }

    #[test]
    fn missing_checkbox_is_false() {
        assert_eq!(
            Widget::CheckBox.convert(&[], None),
            Ok(Some(Value::Bool(false)))
        );
        assert_eq!(
            Widget::CheckBox.convert(&raw(&["on"]), None),
            Ok(Some(Value::Bool(true)))
        );
    }

    #[test]
    fn choices_convert_by_id() {
        let choices = vec![
            Choice::new("1", "Red", Value::text("red")),
            Choice::new("2", "Blue", Value::text("blue")),
        ];
        let single = Widget::drop_down(choices.clone());
        assert_eq!(single.convert(&raw(&["2"]), None), Ok(Some(Value::text("blue"))));
        assert!(single.convert(&raw(&["9"]), None).is_err());

        let multi = Widget::ListMultipleChoice { choices };
        assert_eq!(
            multi.convert(&raw(&["2", "1"]), None),
            Ok(Some(Value::List(vec![Value::text("blue"), Value::text("red")])))
        );
        assert_eq!(multi.convert(&raw(&[""]), None), Ok(None));
    }
}
