//! Arena-backed component tree with path addressing.
//!
//! A page owns one flat table of nodes. Each node stores the index of its
//! parent and the ordered indices of its children, so every traversal
//! ("nearest enclosing form", "all fields of this form") is a walk over
//! indices.

use std::collections::VecDeque;

use weft_model::{ComponentId, ComponentPath, ids::is_valid_segment};

use crate::error::{ComponentError, Result};
use crate::field::FormField;
use crate::kind::{ComponentKind, FormState, Link, Submitter};
use crate::model::ModelRef;

/// The page itself. Never addressed by a path.
pub const ROOT: ComponentId = ComponentId::new(0);

/// Something that can be found by its id within its parent.
pub trait Addressable {
    fn component_id(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct Node {
    id: String,
    parent: Option<ComponentId>,
    children: Vec<ComponentId>,
    pub kind: ComponentKind,
    visible: bool,
    enabled: bool,
}

impl Node {
    pub fn parent(&self) -> Option<ComponentId> {
        self.parent
    }

    pub fn children(&self) -> &[ComponentId] {
        &self.children
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Addressable for Node {
    fn component_id(&self) -> &str {
        &self.id
    }
}

/// Outcome of resolving a path against a live tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathLookup {
    Found(ComponentId),
    /// The component exists but it or an ancestor is hidden.
    NotVisible(ComponentId),
    NotFound,
}

#[derive(Debug, Clone)]
pub struct ComponentTree {
    nodes: Vec<Node>,
    changed: bool,
}

impl Default for ComponentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                id: String::new(),
                parent: None,
                children: Vec::new(),
                kind: ComponentKind::Container,
                visible: true,
                enabled: true,
            }],
            changed: false,
        }
    }

    /// Add a child component under `parent`.
    ///
    /// # Errors
    ///
    /// Fails when `parent` is unknown or detached, when `id` is not a valid
    /// path segment, or when `parent` already has a child with that id.
    pub fn add(
        &mut self,
        parent: ComponentId,
        id: &str,
        kind: impl Into<ComponentKind>,
    ) -> Result<ComponentId> {
        if !is_valid_segment(id) {
            return Err(ComponentError::InvalidId(id.to_string()));
        }
        if self.node(parent).is_none() {
            return Err(ComponentError::UnknownComponent(parent));
        }
        if !self.is_attached(parent) {
            return Err(ComponentError::DetachedParent {
                parent,
                id: id.to_string(),
            });
        }
        if self.child_by_id(parent, id).is_some() {
            return Err(ComponentError::DuplicateId {
                parent: self.describe(parent),
                id: id.to_string(),
            });
        }
        let child = ComponentId::new(self.nodes.len());
        self.nodes.push(Node {
            id: id.to_string(),
            parent: Some(parent),
            children: Vec::new(),
            kind: kind.into(),
            visible: true,
            enabled: true,
        });
        self.nodes[parent.index()].children.push(child);
        self.changed = true;
        Ok(child)
    }

    pub fn add_container(&mut self, parent: ComponentId, id: &str) -> Result<ComponentId> {
        self.add(parent, id, ComponentKind::Container)
    }

    pub fn add_border(&mut self, parent: ComponentId, id: &str) -> Result<ComponentId> {
        self.add(parent, id, ComponentKind::Border)
    }

    pub fn add_feedback_panel(&mut self, parent: ComponentId, id: &str) -> Result<ComponentId> {
        self.add(parent, id, ComponentKind::FeedbackPanel)
    }

    pub fn node(&self, id: ComponentId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn node_mut(&mut self, id: ComponentId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    pub fn kind(&self, id: ComponentId) -> Option<&ComponentKind> {
        self.node(id).map(|node| &node.kind)
    }

    pub fn field(&self, id: ComponentId) -> Option<&FormField> {
        match self.kind(id)? {
            ComponentKind::Field(field) => Some(field),
            _ => None,
        }
    }

    pub fn field_mut(&mut self, id: ComponentId) -> Option<&mut FormField> {
        match &mut self.node_mut(id)?.kind {
            ComponentKind::Field(field) => Some(field),
            _ => None,
        }
    }

    pub fn form(&self, id: ComponentId) -> Option<&FormState> {
        match self.kind(id)? {
            ComponentKind::Form(form) => Some(form),
            _ => None,
        }
    }

    pub fn form_mut(&mut self, id: ComponentId) -> Option<&mut FormState> {
        match &mut self.node_mut(id)?.kind {
            ComponentKind::Form(form) => Some(form),
            _ => None,
        }
    }

    pub fn submitter(&self, id: ComponentId) -> Option<&Submitter> {
        match self.kind(id)? {
            ComponentKind::Submitter(submitter) => Some(submitter),
            _ => None,
        }
    }

    pub fn link(&self, id: ComponentId) -> Option<&Link> {
        match self.kind(id)? {
            ComponentKind::Link(link) => Some(link),
            _ => None,
        }
    }

    pub fn is_form(&self, id: ComponentId) -> bool {
        self.form(id).is_some()
    }

    /// Replace a label's text. A page-local text change counts as a tree change.
    pub fn set_label_text(&mut self, id: ComponentId, text: ModelRef) -> Result<()> {
        let node = self.nodes.get_mut(id.index()).ok_or(ComponentError::UnknownComponent(id))?;
        let actual = node.kind.name();
        let ComponentKind::Label(label) = &mut node.kind else {
            return Err(ComponentError::WrongKind {
                id,
                expected: "label",
                actual,
            });
        };
        label.text = text;
        if !label.text.is_shared() {
            self.changed = true;
        }
        Ok(())
    }

    pub fn parent(&self, id: ComponentId) -> Option<ComponentId> {
        self.node(id).and_then(Node::parent)
    }

    pub fn children(&self, id: ComponentId) -> &[ComponentId] {
        self.node(id).map(Node::children).unwrap_or_default()
    }

    pub fn child_by_id(&self, parent: ComponentId, id: &str) -> Option<ComponentId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|child| self.nodes[child.index()].id == id)
    }

    /// Walk the path segment by segment through container children.
    pub fn resolve(&self, path: &ComponentPath) -> Option<ComponentId> {
        path.segments()
            .iter()
            .try_fold(ROOT, |current, segment| self.child_by_id(current, segment))
    }

    pub fn lookup(&self, path: &ComponentPath) -> PathLookup {
        match self.resolve(path) {
            Some(id) if self.is_visible_in_hierarchy(id) => PathLookup::Found(id),
            Some(id) => PathLookup::NotVisible(id),
            None => PathLookup::NotFound,
        }
    }

    pub fn path_of(&self, id: ComponentId) -> Option<ComponentPath> {
        if !self.is_attached(id) || id == ROOT {
            return None;
        }
        let mut segments = vec![self.node(id)?.id.clone()];
        segments.extend(self.ancestors(id).filter(|a| *a != ROOT).map(|a| self.nodes[a.index()].id.clone()));
        segments.reverse();
        ComponentPath::from_segments(segments).ok()
    }

    /// HTML input name of a component, its path segments joined with `:`.
    pub fn input_name(&self, id: ComponentId) -> Option<String> {
        self.path_of(id).map(|path| path.input_name())
    }

    /// Parent, grandparent, ... up to and including the root.
    pub fn ancestors(&self, id: ComponentId) -> impl Iterator<Item = ComponentId> + '_ {
        std::iter::successors(self.parent(id), move |current| self.parent(*current))
    }

    pub fn is_attached(&self, id: ComponentId) -> bool {
        if id == ROOT {
            return true;
        }
        match self.node(id) {
            Some(node) => node.parent.is_some() && self.ancestors(id).any(|a| a == ROOT),
            None => false,
        }
    }

    /// Attached, and neither the component nor any ancestor is hidden.
    pub fn is_visible_in_hierarchy(&self, id: ComponentId) -> bool {
        self.is_attached(id)
            && std::iter::once(id)
                .chain(self.ancestors(id))
                .all(|c| self.nodes[c.index()].visible)
    }

    pub fn is_enabled_in_hierarchy(&self, id: ComponentId) -> bool {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .all(|c| self.node(c).is_some_and(Node::is_enabled))
    }

    pub fn set_visible(&mut self, id: ComponentId, visible: bool) -> Result<()> {
        let node = self.nodes.get_mut(id.index()).ok_or(ComponentError::UnknownComponent(id))?;
        if node.visible != visible {
            node.visible = visible;
            self.changed = true;
        }
        Ok(())
    }

    pub fn set_enabled(&mut self, id: ComponentId, enabled: bool) -> Result<()> {
        let node = self.nodes.get_mut(id.index()).ok_or(ComponentError::UnknownComponent(id))?;
        if node.enabled != enabled {
            node.enabled = enabled;
            self.changed = true;
        }
        Ok(())
    }

    /// Remove a component (and its subtree) from its parent. The ids stay
    /// valid but no longer resolve.
    pub fn detach(&mut self, id: ComponentId) -> Result<()> {
        if id == ROOT {
            return Err(ComponentError::UnknownComponent(id));
        }
        let parent = self
            .node(id)
            .ok_or(ComponentError::UnknownComponent(id))?
            .parent;
        if let Some(parent) = parent {
            self.nodes[parent.index()].children.retain(|child| *child != id);
            self.nodes[id.index()].parent = None;
            self.changed = true;
        }
        Ok(())
    }

    /// Nearest ancestor that is a form.
    pub fn enclosing_form(&self, id: ComponentId) -> Option<ComponentId> {
        self.ancestors(id).find(|a| self.is_form(*a))
    }

    /// The form a component submits with.
    ///
    /// Like [`Self::enclosing_form`], except that a component sitting next to
    /// a form inside a border belongs to that form. Forms never adopt a
    /// sibling form this way.
    pub fn form_of(&self, id: ComponentId) -> Option<ComponentId> {
        let is_form = self.is_form(id);
        for ancestor in self.ancestors(id) {
            match self.kind(ancestor) {
                Some(ComponentKind::Form(_)) => return Some(ancestor),
                Some(ComponentKind::Border) if !is_form => {
                    let form = self
                        .children(ancestor)
                        .iter()
                        .copied()
                        .find(|child| *child != id && self.is_form(*child));
                    if form.is_some() {
                        return form;
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Outermost form containing `id`; a form with no enclosing form is its
    /// own root.
    pub fn root_form(&self, id: ComponentId) -> Option<ComponentId> {
        let mut current = if self.is_form(id) {
            id
        } else {
            self.form_of(id)?
        };
        let mut seen = vec![current];
        while let Some(outer) = self.form_of(current) {
            if seen.contains(&outer) {
                break;
            }
            seen.push(outer);
            current = outer;
        }
        Some(current)
    }

    pub fn is_root_form(&self, form: ComponentId) -> bool {
        self.is_form(form) && self.form_of(form).is_none()
    }

    pub fn set_default_button(&mut self, form: ComponentId, button: ComponentId) -> Result<()> {
        if self.submitter(button).is_none() {
            return Err(self.wrong_kind(button, "submitter"));
        }
        if !self.is_form(form) {
            return Err(self.wrong_kind(form, "form"));
        }
        if !self.is_root_form(form) {
            return Err(ComponentError::NestedDefaultButton(form));
        }
        if let Some(state) = self.form_mut(form) {
            state.default_button = Some(button);
        }
        Ok(())
    }

    pub fn visit_pre_order(&self, start: ComponentId, visit: &mut impl FnMut(ComponentId)) {
        visit(start);
        for child in self.children(start) {
            self.visit_pre_order(*child, visit);
        }
    }

    /// Children before parents, deepest first.
    pub fn visit_post_order(&self, start: ComponentId, visit: &mut impl FnMut(ComponentId)) {
        for child in self.children(start) {
            self.visit_post_order(*child, visit);
        }
        visit(start);
    }

    /// Every form field processed with `form`, in post-order.
    ///
    /// Includes the fields of nested forms. When the form's parent is a
    /// border, the border's other direct children that are fields are
    /// included too, although they are not descendants of the form.
    pub fn form_fields(&self, form: ComponentId) -> Vec<ComponentId> {
        let mut fields = Vec::new();
        self.visit_post_order(form, &mut |id| {
            if self.field(id).is_some() {
                fields.push(id);
            }
        });
        if let Some(parent) = self.parent(form)
            && matches!(self.kind(parent), Some(ComponentKind::Border))
        {
            fields.extend(
                self.children(parent)
                    .iter()
                    .copied()
                    .filter(|sibling| *sibling != form && self.field(*sibling).is_some()),
            );
        }
        fields
    }

    /// `form` and every form nested in it, level by level.
    pub fn nested_forms_breadth_first(&self, form: ComponentId) -> Vec<ComponentId> {
        let mut forms = Vec::new();
        let mut queue = VecDeque::from([form]);
        while let Some(id) = queue.pop_front() {
            if self.is_form(id) {
                forms.push(id);
            }
            queue.extend(self.children(id).iter().copied());
        }
        forms
    }

    /// Attached components in pre-order, starting with the root.
    pub fn attached(&self) -> Vec<ComponentId> {
        let mut ids = Vec::new();
        self.visit_pre_order(ROOT, &mut |id| ids.push(id));
        ids
    }

    pub fn submitters(&self) -> Vec<ComponentId> {
        self.attached()
            .into_iter()
            .filter(|id| self.submitter(*id).is_some())
            .collect()
    }

    /// Display label of a component: the field label if set, else its id.
    pub fn label_of(&self, id: ComponentId) -> String {
        self.field(id)
            .and_then(|field| field.label.clone())
            .or_else(|| self.node(id).map(|node| node.id.clone()))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn mark_changed(&mut self) {
        self.changed = true;
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    fn describe(&self, id: ComponentId) -> String {
        self.path_of(id)
            .map(|path| path.to_string())
            .unwrap_or_else(|| "page".to_string())
    }

    fn wrong_kind(&self, id: ComponentId, expected: &'static str) -> ComponentError {
        match self.kind(id) {
            Some(kind) => ComponentError::WrongKind {
                id,
                expected,
                actual: kind.name(),
            },
            None => ComponentError::UnknownComponent(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FormField;
    use crate::kind::{FormState, Submitter};

    fn path(s: &str) -> ComponentPath {
        ComponentPath::parse(s).unwrap()
    }

    #[test]
    fn resolves_and_reports_paths() {
        let mut tree = ComponentTree::new();
        let form = tree.add(ROOT, "form", FormState::new()).unwrap();
        let name = tree.add(form, "name", FormField::text()).unwrap();
        assert_eq!(tree.resolve(&path("form.name")), Some(name));
        assert_eq!(tree.path_of(name).unwrap().to_string(), "form.name");
        assert_eq!(tree.input_name(name).as_deref(), Some("form:name"));
        assert_eq!(tree.lookup(&path("form.missing")), PathLookup::NotFound);
    }

    #[test]
    fn hidden_ancestor_is_not_visible() {
        let mut tree = ComponentTree::new();
        let panel = tree.add_container(ROOT, "panel").unwrap();
        let link = tree.add_container(panel, "inner").unwrap();
        tree.set_visible(panel, false).unwrap();
        assert_eq!(tree.lookup(&path("panel.inner")), PathLookup::NotVisible(link));
    }

    #[test]
    fn duplicate_and_invalid_ids_are_rejected() {
        let mut tree = ComponentTree::new();
        tree.add_container(ROOT, "a").unwrap();
        assert!(matches!(
            tree.add_container(ROOT, "a"),
            Err(ComponentError::DuplicateId { .. })
        ));
        assert!(matches!(
            tree.add_container(ROOT, "a.b"),
            Err(ComponentError::InvalidId(_))
        ));
    }

    #[test]
    fn detached_components_stop_resolving() {
        let mut tree = ComponentTree::new();
        let panel = tree.add_container(ROOT, "panel").unwrap();
        let child = tree.add_container(panel, "child").unwrap();
        tree.take_changed();
        tree.detach(panel).unwrap();
        assert!(tree.is_changed());
        assert!(!tree.is_attached(child));
        assert!(!tree.is_visible_in_hierarchy(child));
        assert_eq!(tree.resolve(&path("panel.child")), None);
        assert!(tree.path_of(child).is_none());
    }

    #[test]
    fn border_siblings_belong_to_the_form() {
        let mut tree = ComponentTree::new();
        let border = tree.add_border(ROOT, "border").unwrap();
        let form = tree.add(border, "form", FormState::new()).unwrap();
        let inside = tree.add(form, "inside", FormField::text()).unwrap();
        let beside = tree.add(border, "beside", FormField::text()).unwrap();
        let button = tree.add(border, "go", Submitter::button("Go")).unwrap();

        assert_eq!(tree.form_fields(form), vec![inside, beside]);
        assert_eq!(tree.enclosing_form(beside), None);
        assert_eq!(tree.form_of(beside), Some(form));
        assert_eq!(tree.root_form(button), Some(form));
    }

    #[test]
    fn sibling_forms_in_a_border_are_both_root_forms() {
        let mut tree = ComponentTree::new();
        let border = tree.add_border(ROOT, "border").unwrap();
        let a = tree.add(border, "a", FormState::new()).unwrap();
        let b = tree.add(border, "b", FormState::new()).unwrap();
        let f = tree.add(a, "f", FormField::text()).unwrap();

        assert_eq!(tree.form_of(a), None);
        assert_eq!(tree.form_of(b), None);
        assert_eq!(tree.root_form(f), Some(a));
        assert_eq!(tree.root_form(b), Some(b));
        assert!(tree.is_root_form(a));
        assert!(tree.is_root_form(b));
    }

    #[test]
    fn fields_are_post_order_and_forms_breadth_first() {
        let mut tree = ComponentTree::new();
        let root = tree.add(ROOT, "root", FormState::new()).unwrap();
        let a = tree.add(root, "a", FormField::text()).unwrap();
        let nested = tree.add(root, "nested", FormState::new()).unwrap();
        let deep = tree.add(nested, "deep", FormState::new()).unwrap();
        let b = tree.add(nested, "b", FormField::text()).unwrap();
        let sibling = tree.add(root, "sibling", FormState::new()).unwrap();

        assert_eq!(tree.form_fields(root), vec![a, b]);
        assert_eq!(
            tree.nested_forms_breadth_first(root),
            vec![root, nested, sibling, deep]
        );
        assert_eq!(tree.root_form(deep), Some(root));
        assert!(tree.is_root_form(root));
        assert!(!tree.is_root_form(nested));
    }

    #[test]
    fn default_button_only_on_root_form() {
        let mut tree = ComponentTree::new();
        let root = tree.add(ROOT, "root", FormState::new()).unwrap();
        let nested = tree.add(root, "nested", FormState::new()).unwrap();
        let button = tree.add(nested, "save", Submitter::button("Save")).unwrap();
        assert!(matches!(
            tree.set_default_button(nested, button),
            Err(ComponentError::NestedDefaultButton(_))
        ));
        tree.set_default_button(root, button).unwrap();
        assert_eq!(tree.form(root).unwrap().default_button(), Some(button));
    }
}
