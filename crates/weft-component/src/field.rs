//! Form components and the capabilities they expose to form processing.

use std::sync::Arc;

use weft_model::{ComponentId, MessageKey, UploadedFile, Value, value::LIST_SEPARATOR};

use crate::error::{ComponentError, Result};
use crate::handler::Handler;
use crate::model::{ModelRef, lock};
use crate::validator::{ValidationError, Validator};
use crate::widget::{Widget, id_for_value};

/// Holds submitted input, converts and validates it.
pub trait Validatable {
    fn clear_input(&mut self);

    /// Convert the raw input, then run the required check and validators.
    /// Stops at the first failure.
    fn validate_input(&mut self) -> std::result::Result<(), ValidationError>;

    /// Display flag set by the last processed submission.
    fn is_valid(&self) -> bool;

    fn set_valid(&mut self, valid: bool);
}

/// Pushes converted input into the backing model.
pub trait ModelBound {
    fn model_value(&self) -> Option<Value>;

    /// Returns true when a page-local model changed.
    fn update_model(&mut self, id: ComponentId) -> Result<bool>;
}

/// Can save its value between sessions through a value persister.
pub trait Persistable {
    fn is_persistent(&self) -> bool;

    /// String form of the value to save.
    fn persisted_value(&self) -> Option<String>;

    /// Apply a previously saved value to the model. Returns true when a
    /// page-local model changed.
    fn restore_persisted(&mut self, saved: &str) -> bool;
}

#[derive(Debug, Clone)]
pub struct FormField {
    pub widget: Widget,
    pub model: ModelRef,
    pub label: Option<String>,
    pub required: bool,
    pub persistent: bool,
    pub validators: Vec<Arc<dyn Validator>>,
    pub on_selection_changed: Option<Handler>,
    raw_input: Option<Vec<String>>,
    converted: Option<Value>,
    upload: Option<UploadedFile>,
    valid: bool,
}

impl FormField {
    pub fn new(widget: Widget) -> Self {
        Self {
            widget,
            model: ModelRef::default(),
            label: None,
            required: false,
            persistent: false,
            validators: Vec::new(),
            on_selection_changed: None,
            raw_input: None,
            converted: None,
            upload: None,
            valid: true,
        }
    }

    pub fn text() -> Self {
        Self::new(Widget::text())
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: ModelRef) -> Self {
        self.model = model;
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    #[must_use]
    pub fn on_selection_changed(mut self, handler: Handler) -> Self {
        self.on_selection_changed = Some(handler);
        self
    }

    pub fn set_raw_input(&mut self, raw: Vec<String>) {
        self.raw_input = Some(raw);
    }

    pub fn set_upload(&mut self, upload: Option<UploadedFile>) {
        self.upload = upload;
    }

    /// Input captured from the current submission, `None` once cleared.
    pub fn raw_input(&self) -> Option<&[String]> {
        self.raw_input.as_deref()
    }

    pub fn converted(&self) -> Option<&Value> {
        self.converted.as_ref()
    }

    /// Strings to render into the input element: the submitted input when
    /// there is one, otherwise the model value.
    pub fn input_values(&self) -> Vec<String> {
        if let Some(raw) = &self.raw_input {
            return raw.clone();
        }
        self.model_value()
            .map(|value| self.input_strings_for(&value))
            .unwrap_or_default()
    }

    /// Browser-facing strings for `value`; choice widgets use choice ids.
    pub fn input_strings_for(&self, value: &Value) -> Vec<String> {
        let choices = self.widget.choices();
        if choices.is_empty() {
            return value.to_input_strings();
        }
        let values = match value {
            Value::List(items) => items.iter().collect::<Vec<_>>(),
            single => vec![single],
        };
        values
            .into_iter()
            .filter_map(|v| id_for_value(choices, v).map(str::to_string))
            .collect()
    }

    fn set_model(&mut self, value: Option<Value>) -> bool {
        match &mut self.model {
            ModelRef::Local(current) => {
                if *current == value {
                    return false;
                }
                *current = value;
                true
            }
            ModelRef::Shared(model) => {
                if model.get() != value {
                    model.set(value);
                }
                false
            }
        }
    }
}

impl Validatable for FormField {
    fn clear_input(&mut self) {
        self.raw_input = None;
        self.converted = None;
        self.upload = None;
    }

    fn validate_input(&mut self) -> std::result::Result<(), ValidationError> {
        let raw = self.raw_input.clone().unwrap_or_default();
        let input = raw.join(&LIST_SEPARATOR.to_string());
        let with_input = |mut error: ValidationError| {
            if error.var("input").is_none() {
                error.vars.push(("input", input.clone()));
            }
            error
        };

        self.converted = None;
        let converted = self
            .widget
            .convert(&raw, self.upload.as_ref())
            .map_err(with_input)?;
        let Some(value) = converted else {
            return if self.required {
                Err(with_input(ValidationError::new(MessageKey::Required)))
            } else {
                Ok(())
            };
        };
        if self.required && value.is_empty() {
            return Err(with_input(ValidationError::new(MessageKey::Required)));
        }
        self.converted = Some(value);
        if let Some(value) = &self.converted {
            for validator in &self.validators {
                validator.validate(value).map_err(with_input)?;
            }
        }
        Ok(())
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }
}

impl ModelBound for FormField {
    fn model_value(&self) -> Option<Value> {
        self.model.get()
    }

    fn update_model(&mut self, id: ComponentId) -> Result<bool> {
        let converted = self.converted.clone();
        if let (true, ModelRef::Shared(model)) = (self.widget.is_multi_valued(), &self.model)
            && let Some(collection) = model.collection()
        {
            let again = model
                .collection()
                .ok_or(ComponentError::UnstableCollection(id))?;
            if !Arc::ptr_eq(&collection, &again) {
                return Err(ComponentError::UnstableCollection(id));
            }
            let items = match converted {
                Some(Value::List(items)) => items,
                Some(other) => vec![other],
                None => Vec::new(),
            };
            let mut current = lock(&collection);
            if *current != items {
                current.clear();
                current.extend(items);
                drop(current);
                model.touch();
            }
            return Ok(false);
        }
        Ok(self.set_model(converted))
    }
}

impl Persistable for FormField {
    fn is_persistent(&self) -> bool {
        self.persistent
    }

    fn persisted_value(&self) -> Option<String> {
        let value = self.converted.as_ref()?;
        Some(self.input_strings_for(value).join(&LIST_SEPARATOR.to_string()))
    }

    fn restore_persisted(&mut self, saved: &str) -> bool {
        let raw: Vec<String> = if self.widget.is_multi_valued() {
            saved.split(LIST_SEPARATOR).map(str::to_string).collect()
        } else {
            vec![saved.to_string()]
        };
        match self.widget.convert(&raw, None) {
            Ok(value) => self.set_model(value),
            Err(_) => {
                tracing::debug!(saved, "ignoring persisted value that no longer converts");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Model, SharedList, SharedValue};
    use crate::validator::StringLengthValidator;
    use crate::widget::Choice;
    use std::sync::Mutex;

    #[test]
    fn required_fails_before_validators() {
        let mut field = FormField::text()
            .required()
            .with_validator(StringLengthValidator::between(3, 5));
        field.set_raw_input(vec![String::new()]);
        let err = field.validate_input().unwrap_err();
        assert_eq!(err.key, MessageKey::Required);

        field.set_raw_input(vec!["ab".into()]);
        let err = field.validate_input().unwrap_err();
        assert_eq!(err.key, MessageKey::StringLength);
        assert_eq!(err.var("input"), Some("ab"));
    }

    #[test]
    fn clear_input_is_idempotent() {
        let mut field = FormField::text().with_model(ModelRef::local(Value::text("model")));
        field.set_raw_input(vec!["typed".into()]);
        field.validate_input().unwrap();
        field.clear_input();
        field.clear_input();
        assert_eq!(field.raw_input(), None);
        assert_eq!(field.converted(), None);
        assert_eq!(field.input_values(), vec!["model"]);
    }

    #[test]
    fn local_update_reports_change_once() {
        let id = ComponentId::new(1);
        let mut field = FormField::text();
        field.set_raw_input(vec!["x".into()]);
        field.validate_input().unwrap();
        assert!(field.update_model(id).unwrap());
        assert!(!field.update_model(id).unwrap());
    }

    #[test]
    fn shared_update_skips_equal_values() {
        let model = SharedValue::new(Some(Value::text("same")));
        let mut field = FormField::text().with_model(ModelRef::shared(model.clone()));
        field.set_raw_input(vec!["same".into()]);
        field.validate_input().unwrap();
        assert!(!field.update_model(ComponentId::new(1)).unwrap());
        assert_eq!(model.generation(), 0);
    }

    #[test]
    fn multi_select_mutates_collection_in_place() {
        let list = SharedList::new(vec![]);
        let before = list.collection().unwrap();
        let mut field = FormField::new(Widget::ListMultipleChoice {
            choices: vec![Choice::text("a"), Choice::text("b")],
        })
        .with_model(ModelRef::shared(list.clone()));
        field.set_raw_input(vec!["b".into(), "a".into()]);
        field.validate_input().unwrap();
        field.update_model(ComponentId::new(4)).unwrap();
        assert!(Arc::ptr_eq(&before, &list.collection().unwrap()));
        assert_eq!(list.items(), vec![Value::text("b"), Value::text("a")]);
        assert_eq!(list.generation(), 1);
    }

    #[derive(Debug, Default)]
    struct FreshEveryCall {
        generation: u64,
    }

    impl Model for FreshEveryCall {
        fn get(&self) -> Option<Value> {
            None
        }

        fn set(&self, _value: Option<Value>) {}

        fn collection(&self) -> Option<crate::model::SharedCollection> {
            Some(Arc::new(Mutex::new(Vec::new())))
        }

        fn generation(&self) -> u64 {
            self.generation
        }
    }

    #[test]
    fn unstable_collection_fails_loudly() {
        let mut field = FormField::new(Widget::ListMultipleChoice {
            choices: vec![Choice::text("a")],
        })
        .with_model(ModelRef::shared(Arc::new(FreshEveryCall::default())));
        field.set_raw_input(vec!["a".into()]);
        field.validate_input().unwrap();
        let err = field.update_model(ComponentId::new(9)).unwrap_err();
        assert!(matches!(err, ComponentError::UnstableCollection(id) if id == ComponentId::new(9)));
    }

    #[test]
    fn persisted_choice_uses_ids() {
        let mut field = FormField::new(Widget::drop_down(vec![Choice::new(
            "de",
            "Germany",
            Value::text("Germany"),
        )]));
        field.set_raw_input(vec!["de".into()]);
        field.validate_input().unwrap();
        assert_eq!(field.persisted_value().as_deref(), Some("de"));

        let mut fresh = FormField::new(field.widget.clone());
        assert!(fresh.restore_persisted("de"));
        assert_eq!(fresh.model_value(), Some(Value::text("Germany")));
        assert!(!fresh.restore_persisted("de"));
    }
}
