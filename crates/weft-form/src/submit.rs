//! The form submission state machine.
//!
//! ```text
//! Idle -> Submitted -> Invalid -> error hook
//!                   -> Valid   -> update models -> persist -> submit hooks
//! ```
//!
//! The submitted flag of every form is cleared when processing ends,
//! whichever branch was taken.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info, warn};
use weft_component::{
    FormValidation, Handler, ModelBound, Page, Persistable, RequestContext, Validatable,
    ValidationError,
};
use weft_model::{ComponentId, MessageCatalog, MessageKey, Parameters, UploadedFile, http};

use crate::error::{FormError, Result, UploadError};
use crate::multipart::decode_multipart;
use crate::persister::{ValuePersister, persistence_key};

/// Suffix of the hidden field carrying a deferred dispatch URL.
pub const HIDDEN_FIELD_SUFFIX: &str = "hf";

/// The parts of a request form processing reads.
#[derive(Debug, Clone, Copy)]
pub struct SubmitRequest<'a> {
    pub parameters: &'a Parameters,
    pub content_type: Option<&'a str>,
    pub body: &'a [u8],
}

impl SubmitRequest<'_> {
    fn is_multipart(&self) -> bool {
        self.content_type.is_some_and(|ct| {
            ct.trim_start()
                .to_ascii_lowercase()
                .starts_with(http::MULTIPART_FORM_DATA)
        })
    }

    fn boundary(&self) -> Option<&str> {
        self.content_type?.split(';').skip(1).find_map(|part| {
            let (key, value) = part.trim().split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("boundary")
                .then(|| value.trim().trim_matches('"'))
        })
    }
}

/// Collaborators form processing needs from the application.
#[derive(Clone, Copy)]
pub struct FormEnvironment<'a> {
    pub persister: &'a dyn ValuePersister,
    pub messages: &'a MessageCatalog,
    pub default_max_upload_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormOutcome {
    /// The hidden dispatch field named another URL to handle instead.
    Deferred(String),
    /// A submitter that skips default processing ran its handler only.
    SubmittedWithoutProcessing { submitter: ComponentId },
    /// Validation or upload failed; the error hook ran.
    Invalid { form: ComponentId },
    /// Models were updated and the submit hooks ran.
    Processed {
        form: ComponentId,
        submitter: Option<ComponentId>,
    },
}

/// Hidden field name of a root form, e.g. `form:hf`.
pub fn hidden_field_name(page: &Page, root_form: ComponentId) -> Option<String> {
    page.tree
        .input_name(root_form)
        .map(|name| format!("{name}:{HIDDEN_FIELD_SUFFIX}"))
}

/// Handle a submit request addressed to `form`.
///
/// # Errors
///
/// Validation and upload problems are not errors: they end in
/// [`FormOutcome::Invalid`] with feedback on the page. Errors are returned
/// for inconsistencies (an invisible submitter, an unstable collection model)
/// and for failing handlers.
pub fn on_form_submitted(
    page: &mut Page,
    form: ComponentId,
    request: &SubmitRequest<'_>,
    env: &FormEnvironment<'_>,
    cx: &mut dyn RequestContext,
) -> Result<FormOutcome> {
    page.tree
        .form_mut(form)
        .ok_or(FormError::NotAForm(form))?
        .set_submitted(true);
    let outcome = process(page, form, request, env, cx);
    clear_submitted_flags(page);
    outcome
}

fn clear_submitted_flags(page: &mut Page) {
    for id in page.tree.attached() {
        if let Some(form) = page.tree.form_mut(id) {
            form.set_submitted(false);
        }
    }
}

fn process(
    page: &mut Page,
    form: ComponentId,
    request: &SubmitRequest<'_>,
    env: &FormEnvironment<'_>,
    cx: &mut dyn RequestContext,
) -> Result<FormOutcome> {
    let root = page.tree.root_form(form).unwrap_or(form);
    let mut parameters = request.parameters.clone();
    let mut uploads = BTreeMap::new();

    // Only the root form is a real `<form>` element, so any multipart form
    // in its hierarchy makes the whole submission multipart.
    let multipart = page
        .tree
        .nested_forms_breadth_first(root)
        .into_iter()
        .any(|id| page.tree.form(id).is_some_and(|state| state.multipart));
    if multipart && request.is_multipart() {
        let limit = page
            .tree
            .form(form)
            .and_then(|state| state.max_upload_size)
            .unwrap_or(env.default_max_upload_size);
        match decode_multipart(request.body, request.boundary(), limit) {
            Ok(decoded) => {
                parameters.merge(&decoded.parameters);
                uploads = decoded.files;
            }
            Err(error) => {
                warn!(form = %form, %error, "upload failed");
                let message = upload_message(env.messages, &error);
                page.feedback.error(form, message);
                mark_validity(page, &visible_fields(page, form), false);
                run_hook(page, form, "error", |page| form_hook(page, form, Hook::Error), cx)?;
                return Ok(FormOutcome::Invalid { form });
            }
        }
    }

    if let Some(hidden) = hidden_field_name(page, root)
        && let Some(url) = parameters.get(&hidden).filter(|url| !url.is_empty())
    {
        debug!(form = %form, url, "deferred dispatch through hidden field");
        return Ok(FormOutcome::Deferred(url.to_string()));
    }

    let submitter = find_submitting_component(page, root, &parameters)?;
    if let Some(submitter) = submitter {
        let default_processing = page
            .tree
            .submitter(submitter)
            .is_some_and(|s| s.default_processing);
        if !default_processing {
            debug!(submitter = %submitter, "submitting without default processing");
            let handler = page.tree.submitter(submitter).and_then(|s| s.on_submit.clone());
            call_handler(page, submitter, "submit", handler.as_ref(), cx)?;
            return Ok(FormOutcome::SubmittedWithoutProcessing { submitter });
        }
    }

    let target = submitter
        .and_then(|s| page.tree.form_of(s))
        .unwrap_or(form);
    let fields = visible_fields(page, target);
    capture_input(page, &fields, &parameters, &mut uploads);

    validate_fields(page, &fields, env.messages);
    run_form_validators(page, root, env.messages);

    if has_error(page, target, &fields) {
        info!(form = %target, "form validation failed");
        mark_validity(page, &fields, false);
        run_hook(page, target, "error", |page| form_hook(page, target, Hook::Error), cx)?;
        return Ok(FormOutcome::Invalid { form: target });
    }

    mark_validity(page, &fields, true);
    run_hook(
        page,
        target,
        "validated",
        |page| form_hook(page, target, Hook::Validated),
        cx,
    )?;
    update_models(page, &fields)?;
    persist_values(page, &fields, env.persister, cx);
    clear_inputs(page, &fields);

    if let Some(submitter) = submitter {
        let handler = page.tree.submitter(submitter).and_then(|s| s.on_submit.clone());
        call_handler(page, submitter, "submit", handler.as_ref(), cx)?;
    }
    run_hook(page, target, "submit", |page| form_hook(page, target, Hook::Submit), cx)?;
    info!(form = %target, submitter = ?submitter, "form processed");
    Ok(FormOutcome::Processed {
        form: target,
        submitter,
    })
}

/// The submitter whose input name (or image-button `name.x`) is among the
/// parameters and that submits with `root`.
fn find_submitting_component(
    page: &Page,
    root: ComponentId,
    parameters: &Parameters,
) -> Result<Option<ComponentId>> {
    for id in page.tree.submitters() {
        if page.tree.root_form(id) != Some(root) {
            continue;
        }
        let Some(name) = page.tree.input_name(id) else {
            continue;
        };
        if !parameters.contains(&name) && !parameters.contains(&format!("{name}.x")) {
            continue;
        }
        if !page.tree.is_visible_in_hierarchy(id) {
            let path = page
                .tree
                .path_of(id)
                .map(|p| p.to_string())
                .unwrap_or_default();
            return Err(FormError::InvisibleSubmitter { path });
        }
        return Ok(Some(id));
    }
    Ok(None)
}

fn visible_fields(page: &Page, form: ComponentId) -> Vec<ComponentId> {
    page.tree
        .form_fields(form)
        .into_iter()
        .filter(|id| {
            page.tree.is_visible_in_hierarchy(*id) && page.tree.is_enabled_in_hierarchy(*id)
        })
        .collect()
}

fn capture_input(
    page: &mut Page,
    fields: &[ComponentId],
    parameters: &Parameters,
    uploads: &mut BTreeMap<String, UploadedFile>,
) {
    for id in fields {
        let Some(name) = page.tree.input_name(*id) else {
            continue;
        };
        if let Some(field) = page.tree.field_mut(*id) {
            field.clear_input();
            field.set_raw_input(parameters.get_all(&name).to_vec());
            field.set_upload(uploads.remove(&name));
        }
    }
}

fn validate_fields(page: &mut Page, fields: &[ComponentId], messages: &MessageCatalog) {
    for id in fields {
        let label = page.tree.label_of(*id);
        let Some(field) = page.tree.field_mut(*id) else {
            continue;
        };
        if let Err(error) = field.validate_input() {
            debug!(component = %id, key = ?error.key, "field rejected input");
            page.feedback.error(*id, format_error(messages, &label, &error));
        }
    }
}

/// Run the form validators of every form under `root`, breadth first.
///
/// Forms other than the one being processed are included; a validator is
/// skipped when a dependency already failed or is no longer on the page.
fn run_form_validators(page: &mut Page, root: ComponentId, messages: &MessageCatalog) {
    for form in page.tree.nested_forms_breadth_first(root) {
        let validators = page
            .tree
            .form(form)
            .map(|state| state.validators.clone())
            .unwrap_or_default();
        for validator in validators {
            let skip = validator.dependencies().iter().any(|dep| {
                page.feedback.has_error_for(*dep) || !page.tree.is_visible_in_hierarchy(*dep)
            });
            if skip {
                debug!(form = %form, ?validator, "skipping form validator");
                continue;
            }
            if let Err(failure) = validator.validate(&FormValidation::new(&page.tree)) {
                let label = page.tree.label_of(failure.reporter);
                let message = format_error(messages, &label, &failure.error);
                page.feedback.error(failure.reporter, message);
            }
        }
    }
}

fn has_error(page: &Page, target: ComponentId, fields: &[ComponentId]) -> bool {
    let mut scope: HashSet<ComponentId> = fields.iter().copied().collect();
    scope.extend(page.tree.form_fields(target));
    scope.extend(page.tree.nested_forms_breadth_first(target));
    scope.iter().any(|id| page.feedback.has_error_for(*id))
}

fn mark_validity(page: &mut Page, fields: &[ComponentId], valid: bool) {
    for id in fields {
        if let Some(field) = page.tree.field_mut(*id) {
            field.set_valid(valid);
        }
    }
}

/// Accepted input now lives in the models; the next render reads them.
fn clear_inputs(page: &mut Page, fields: &[ComponentId]) {
    for id in fields {
        if let Some(field) = page.tree.field_mut(*id) {
            field.clear_input();
        }
    }
}

fn update_models(page: &mut Page, fields: &[ComponentId]) -> Result<()> {
    let mut changed = false;
    for id in fields {
        if let Some(field) = page.tree.field_mut(*id) {
            changed |= field.update_model(*id)?;
        }
    }
    if changed {
        page.tree.mark_changed();
    }
    Ok(())
}

fn persist_values(
    page: &Page,
    fields: &[ComponentId],
    persister: &dyn ValuePersister,
    cx: &mut dyn RequestContext,
) {
    for id in fields {
        let (Some(field), Some(name)) = (page.tree.field(*id), page.tree.input_name(*id)) else {
            continue;
        };
        let key = persistence_key(page.class(), &name);
        match field.persisted_value() {
            Some(value) if field.is_persistent() => persister.save(&key, &value, cx.cookies()),
            _ => persister.clear(&key, cx.cookies()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Hook {
    Error,
    Validated,
    Submit,
}

fn form_hook(page: &Page, form: ComponentId, hook: Hook) -> Option<Handler> {
    let state = page.tree.form(form)?;
    match hook {
        Hook::Error => state.on_error.clone(),
        Hook::Validated => state.on_validated.clone(),
        Hook::Submit => state.on_submit.clone(),
    }
}

fn run_hook(
    page: &mut Page,
    component: ComponentId,
    hook: &'static str,
    select: impl FnOnce(&Page) -> Option<Handler>,
    cx: &mut dyn RequestContext,
) -> Result<()> {
    let handler = select(page);
    call_handler(page, component, hook, handler.as_ref(), cx)
}

fn call_handler(
    page: &mut Page,
    component: ComponentId,
    hook: &'static str,
    handler: Option<&Handler>,
    cx: &mut dyn RequestContext,
) -> Result<()> {
    let Some(handler) = handler else {
        return Ok(());
    };
    handler.call(page, cx).map_err(|source| FormError::Handler {
        hook,
        component: page
            .tree
            .path_of(component)
            .map(|p| p.to_string())
            .unwrap_or_else(|| component.to_string()),
        source,
    })
}

/// Render a validation error with the catalog, adding the component label.
pub fn format_error(messages: &MessageCatalog, label: &str, error: &ValidationError) -> String {
    let mut vars: Vec<(&str, String)> = vec![("label", label.to_string())];
    vars.extend(error.vars.iter().map(|(name, value)| (*name, value.clone())));
    messages.format(error.key, &vars)
}

fn upload_message(messages: &MessageCatalog, error: &UploadError) -> String {
    match error {
        UploadError::SizeLimitExceeded { limit, actual } => messages.format(
            MessageKey::UploadTooLarge,
            &[("limit", limit.to_string()), ("actual", actual.to_string())],
        ),
        other => messages.format(MessageKey::UploadFailed, &[("reason", other.to_string())]),
    }
}
