//! Turning a stored page into HTML.

use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use weft_component::{
    ComponentKind, FormField, FormState, Label, Link, Page, RenderInterrupt, SubmitStyle,
    Submitter, Validatable, Widget,
};
use weft_form::hidden_field_name;
use weft_model::value::parse_bool;
use weft_model::params::encode_component;
use weft_model::{ComponentId, ComponentPath, ListenerInterface, PageKey, RenderingNumber};

use crate::error::{Result, WeftError};
use crate::url::listener_url;

pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Result of one render pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered(Vec<u8>),
    /// The page asked for a redirect instead of being shown.
    RedirectTo(String),
    /// Another page must be shown first; the request URL is remembered.
    Intercepted(String),
}

/// Produces the markup of a page.
pub trait Renderer: Send + Sync {
    /// Render `page`, which must already be stored.
    ///
    /// A successful render starts a new rendering of the page, so URLs from
    /// earlier renders become stale.
    ///
    /// # Errors
    ///
    /// Returns [`WeftError::Render`] when the page has no key or the output
    /// cannot be written.
    fn render(&self, page: &mut Page) -> Result<RenderOutcome>;

    fn content_type(&self) -> &'static str {
        HTML_CONTENT_TYPE
    }
}

/// Minimal HTML for the component kinds weft knows about.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl Renderer for HtmlRenderer {
    fn render(&self, page: &mut Page) -> Result<RenderOutcome> {
        if let Some(interrupt) = page.before_render() {
            return Ok(match interrupt {
                RenderInterrupt::RedirectTo(url) => RenderOutcome::RedirectTo(url),
                RenderInterrupt::Intercept { page_class } => {
                    RenderOutcome::Intercepted(page_class)
                }
            });
        }
        let key = page
            .key()
            .cloned()
            .ok_or_else(|| WeftError::Render(format!("page {} is not stored", page.class())))?;
        let rendering = page.advance_rendering();
        let mut html = HtmlWriter {
            xml: Writer::new(Vec::new()),
            page: &*page,
            key: &key,
            rendering,
        };
        html.document()?;
        Ok(RenderOutcome::Rendered(html.xml.into_inner()))
    }
}

struct HtmlWriter<'a> {
    xml: Writer<Vec<u8>>,
    page: &'a Page,
    key: &'a PageKey,
    rendering: RenderingNumber,
}

impl<'a> HtmlWriter<'a> {
    fn emit(&mut self, event: Event<'_>) -> Result<()> {
        self.xml
            .write_event(event)
            .map_err(|e| WeftError::Render(e.to_string()))
    }

    fn start(&mut self, element: BytesStart<'_>) -> Result<()> {
        self.emit(Event::Start(element))
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.emit(Event::End(BytesEnd::new(name)))
    }

    fn empty(&mut self, element: BytesStart<'_>) -> Result<()> {
        self.emit(Event::Empty(element))
    }

    fn text(&mut self, text: &str) -> Result<()> {
        self.emit(Event::Text(BytesText::from_escaped(partial_escape(text))))
    }

    fn element(&mut self, element: BytesStart<'_>, text: &str) -> Result<()> {
        let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
        self.start(element)?;
        self.text(text)?;
        self.end(&name)
    }

    fn url(&self, path: &ComponentPath, interface: ListenerInterface) -> String {
        listener_url(self.key, path, interface, self.rendering)
    }

    fn document(&mut self) -> Result<()> {
        let page = self.page;
        self.emit(Event::DocType(BytesText::from_escaped("html")))?;
        self.start(BytesStart::new("html"))?;
        self.start(BytesStart::new("head"))?;
        self.empty(BytesStart::new("meta").with_attributes([("charset", "utf-8")]))?;
        self.element(BytesStart::new("title"), &page.title)?;
        self.end("head")?;
        self.start(BytesStart::new("body"))?;
        self.children(weft_component::ROOT)?;
        self.end("body")?;
        self.end("html")
    }

    fn children(&mut self, id: ComponentId) -> Result<()> {
        let page = self.page;
        for child in page.tree.children(id) {
            self.component(*child)?;
        }
        Ok(())
    }

    fn component(&mut self, id: ComponentId) -> Result<()> {
        let page = self.page;
        let (Some(node), Some(path)) = (page.tree.node(id), page.tree.path_of(id)) else {
            return Ok(());
        };
        if !node.is_visible() {
            return Ok(());
        }
        let dom_id = path.to_string();
        match &node.kind {
            ComponentKind::Container => self.wrapper(id, "div", &dom_id, None),
            ComponentKind::Border => self.wrapper(id, "div", &dom_id, Some("border")),
            ComponentKind::Label(label) => self.label(label, &dom_id),
            ComponentKind::Link(link) => self.link(id, link, &path),
            ComponentKind::Form(state) => self.form(id, state, &path),
            ComponentKind::Field(field) => self.field(id, field, &path),
            ComponentKind::Submitter(submitter) => self.submitter(id, submitter),
            ComponentKind::FeedbackPanel => self.feedback(&dom_id),
        }
    }

    fn wrapper(&mut self, id: ComponentId, tag: &str, dom_id: &str, class: Option<&str>) -> Result<()> {
        let mut element = BytesStart::new(tag);
        element.push_attribute(("id", dom_id));
        if let Some(class) = class {
            element.push_attribute(("class", class));
        }
        self.start(element)?;
        self.children(id)?;
        self.end(tag)
    }

    fn label(&mut self, label: &Label, dom_id: &str) -> Result<()> {
        let text = label
            .text
            .get()
            .map(|value| value.to_input_string())
            .unwrap_or_default();
        self.element(BytesStart::new("span").with_attributes([("id", dom_id)]), &text)
    }

    fn link(&mut self, id: ComponentId, link: &Link, path: &ComponentPath) -> Result<()> {
        let dom_id = path.to_string();
        if !self.page.tree.is_enabled_in_hierarchy(id) {
            return self.element(
                BytesStart::new("span").with_attributes([("id", dom_id.as_str())]),
                &link.label,
            );
        }
        let href = self.url(path, ListenerInterface::Click);
        let element = BytesStart::new("a")
            .with_attributes([("id", dom_id.as_str()), ("href", href.as_str())]);
        self.element(element, &link.label)
    }

    fn form(&mut self, id: ComponentId, state: &FormState, path: &ComponentPath) -> Result<()> {
        let page = self.page;
        let dom_id = path.to_string();
        if !page.tree.is_root_form(id) {
            // HTML forms cannot nest; inner forms become plain blocks.
            return self.wrapper(id, "div", &dom_id, Some("form"));
        }
        let action = self.url(path, ListenerInterface::Submit);
        let mut element = BytesStart::new("form");
        element.push_attribute(("id", dom_id.as_str()));
        element.push_attribute(("method", "post"));
        element.push_attribute(("action", action.as_str()));
        let multipart = page
            .tree
            .nested_forms_breadth_first(id)
            .into_iter()
            .any(|form| page.tree.form(form).is_some_and(|f| f.multipart));
        if multipart {
            element.push_attribute(("enctype", "multipart/form-data"));
        }
        self.start(element)?;
        self.hidden_controls(id, state)?;
        self.children(id)?;
        self.end("form")
    }

    /// The default button goes first so pressing enter submits with it; the
    /// dispatch field stays empty unless a script fills in a URL.
    fn hidden_controls(&mut self, id: ComponentId, state: &FormState) -> Result<()> {
        let page = self.page;
        self.start(BytesStart::new("div").with_attributes([("style", "display:none")]))?;
        if let Some(button) = state.default_button()
            && page.tree.is_visible_in_hierarchy(button)
            && let Some(name) = page.tree.input_name(button)
        {
            self.empty(BytesStart::new("input").with_attributes([
                ("type", "submit"),
                ("name", name.as_str()),
                ("tabindex", "-1"),
            ]))?;
        }
        if let Some(name) = hidden_field_name(page, id) {
            self.empty(BytesStart::new("input").with_attributes([
                ("type", "hidden"),
                ("name", name.as_str()),
                ("id", name.as_str()),
                ("value", ""),
            ]))?;
        }
        self.end("div")
    }

    fn field(&mut self, id: ComponentId, field: &FormField, path: &ComponentPath) -> Result<()> {
        let name = path.input_name();
        if let Some(label) = &field.label {
            self.element(
                BytesStart::new("label").with_attributes([("for", name.as_str())]),
                label,
            )?;
        }
        let values = field.input_values();
        let first = values.first().map(String::as_str).unwrap_or_default();
        let mut common = vec![("id", name.as_str()), ("name", name.as_str())];
        if !field.is_valid() {
            common.push(("class", "invalid"));
        }
        if !self.page.tree.is_enabled_in_hierarchy(id) {
            common.push(("disabled", "disabled"));
        }
        let with_common =
            |tag: &'static str| BytesStart::new(tag).with_attributes(common.iter().copied());

        match &field.widget {
            Widget::TextField { .. } | Widget::HiddenField { .. } => {
                let kind = if matches!(field.widget, Widget::HiddenField { .. }) {
                    "hidden"
                } else {
                    "text"
                };
                let element = with_common("input").with_attributes([("type", kind), ("value", first)]);
                self.empty(element)
            }
            // Passwords are never echoed back.
            Widget::PasswordField => {
                self.empty(with_common("input").with_attributes([("type", "password"), ("value", "")]))
            }
            Widget::TextArea => self.element(with_common("textarea"), first),
            Widget::CheckBox => {
                let mut element = with_common("input").with_attributes([("type", "checkbox")]);
                if parse_bool(first).unwrap_or(false) {
                    element.push_attribute(("checked", "checked"));
                }
                self.empty(element)
            }
            Widget::FileUpload => self.empty(with_common("input").with_attributes([("type", "file")])),
            Widget::DropDownChoice {
                choices,
                notify_selection_change,
            } => {
                let mut element = with_common("select");
                if *notify_selection_change {
                    let url = self.url(path, ListenerInterface::SelectionChange);
                    let script = format!(
                        "window.location.href='{url}&{}='+encodeURIComponent(this.value)",
                        encode_component(&name)
                    );
                    element.push_attribute(("onchange", script.as_str()));
                }
                self.start(element)?;
                self.option("", "", values.is_empty())?;
                for choice in choices {
                    self.option(&choice.id, &choice.label, values.contains(&choice.id))?;
                }
                self.end("select")
            }
            Widget::ListMultipleChoice { choices } => {
                let element = with_common("select").with_attributes([("multiple", "multiple")]);
                self.start(element)?;
                for choice in choices {
                    self.option(&choice.id, &choice.label, values.contains(&choice.id))?;
                }
                self.end("select")
            }
        }
    }

    fn option(&mut self, value: &str, label: &str, selected: bool) -> Result<()> {
        let mut element = BytesStart::new("option").with_attributes([("value", value)]);
        if selected {
            element.push_attribute(("selected", "selected"));
        }
        self.element(element, label)
    }

    fn submitter(&mut self, id: ComponentId, submitter: &Submitter) -> Result<()> {
        let Some(name) = self.page.tree.input_name(id) else {
            return Ok(());
        };
        let name = name.as_str();
        let label = submitter.label.as_str();
        match submitter.style {
            SubmitStyle::Button => self.empty(BytesStart::new("input").with_attributes([
                ("type", "submit"),
                ("name", name),
                ("value", label),
            ])),
            SubmitStyle::ImageButton => self.empty(BytesStart::new("input").with_attributes([
                ("type", "image"),
                ("name", name),
                ("alt", label),
            ])),
            SubmitStyle::SubmitLink => self.element(
                BytesStart::new("button").with_attributes([
                    ("type", "submit"),
                    ("class", "submit-link"),
                    ("name", name),
                    ("value", label),
                ]),
                label,
            ),
        }
    }

    fn feedback(&mut self, dom_id: &str) -> Result<()> {
        let page = self.page;
        let element = BytesStart::new("ul").with_attributes([("id", dom_id), ("class", "feedback")]);
        self.start(element)?;
        for message in page.feedback.messages() {
            let item = BytesStart::new("li").with_attributes([("class", message.level.as_str())]);
            self.element(item, &message.message)?;
        }
        self.end("ul")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;
    use weft_component::{FormField, FormState, Handler, ModelRef, ROOT, Submitter};
    use weft_model::{PageId, PageMapName, Value, VersionNumber};

    fn stored(mut page: Page) -> Page {
        page.set_key(PageKey {
            map: PageMapName::default(),
            id: PageId(0),
            version: VersionNumber::FIRST,
        });
        page
    }

    fn render(page: &mut Page) -> String {
        match HtmlRenderer.render(page).unwrap() {
            RenderOutcome::Rendered(bytes) => String::from_utf8(bytes).unwrap(),
            other => panic!("expected markup, got {other:?}"),
        }
    }

    #[test]
    fn renders_labels_and_links() {
        let mut page = Page::new("Home").with_title("Welcome");
        page.tree
            .add(
                ROOT,
                "greeting",
                Label {
                    text: ModelRef::local(Value::text("Hi & bye")),
                },
            )
            .unwrap();
        page.tree
            .add(ROOT, "next", Link::new("Next", Handler::new(|_, _| Ok(()))))
            .unwrap();
        let mut page = stored(page);

        assert_snapshot!(render(&mut page), @r#"<!DOCTYPE html><html><head><meta charset="utf-8"/><title>Welcome</title></head><body><span id="greeting">Hi &amp; bye</span><a id="next" href="/?component=0.next&amp;interface=click&amp;rendering=1&amp;version=1">Next</a></body></html>"#);
        assert_eq!(page.rendering(), RenderingNumber(1));
    }

    #[test]
    fn default_button_is_rendered_first_in_the_root_form() {
        let mut page = Page::new("Home");
        let form = page.tree.add(ROOT, "form", FormState::new()).unwrap();
        page.tree.add(form, "name", FormField::text()).unwrap();
        let save = page.tree.add(form, "save", Submitter::button("Save")).unwrap();
        page.tree.set_default_button(form, save).unwrap();
        let mut page = stored(page);

        let html = render(&mut page);
        let hidden = html.find(r#"<input type="submit" name="form:save" tabindex="-1"/>"#);
        let visible = html.find(r#"<input type="submit" name="form:save" value="Save"/>"#);
        assert!(hidden.is_some() && visible.is_some());
        assert!(hidden < visible);
        assert!(html.contains(r#"<input type="hidden" name="form:hf" id="form:hf" value=""/>"#));
        assert!(html.contains(r#"action="/?component=0.form&amp;interface=submit&amp;rendering=1&amp;version=1""#));
    }

    #[test]
    fn invisible_components_are_skipped() {
        let mut page = Page::new("Home");
        let secret = page.tree.add_container(ROOT, "secret").unwrap();
        page.tree.set_visible(secret, false).unwrap();
        let mut page = stored(page);
        assert!(!render(&mut page).contains("secret"));
    }

    #[test]
    fn intercepts_do_not_advance_the_rendering() {
        let page = Page::new("Account").with_before_render(|_| {
            Some(RenderInterrupt::Intercept {
                page_class: "SignIn".to_string(),
            })
        });
        let mut page = stored(page);
        assert_eq!(
            HtmlRenderer.render(&mut page).unwrap(),
            RenderOutcome::Intercepted("SignIn".to_string())
        );
        assert_eq!(page.rendering(), RenderingNumber::default());
    }
}
