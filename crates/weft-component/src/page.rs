//! Page instances: a component tree plus per-instance lifecycle state.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use weft_model::{
    ComponentId, ComponentPath, FeedbackMessages, PageId, PageKey, PageMapName, PageParameters,
    PagePath, RenderingNumber,
};

use crate::tree::{ComponentTree, PathLookup};

/// Why rendering a page stopped before producing output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderInterrupt {
    RedirectTo(String),
    /// Show another page first, then come back to the original URL.
    Intercept { page_class: String },
}

type BeforeRenderFn = dyn Fn(&Page) -> Option<RenderInterrupt> + Send + Sync;

#[derive(Clone)]
pub struct BeforeRender(Arc<BeforeRenderFn>);

impl fmt::Debug for BeforeRender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BeforeRender(..)")
    }
}

#[derive(Debug, Clone)]
pub struct Page {
    class: String,
    map: PageMapName,
    key: Option<PageKey>,
    parameters: PageParameters,
    pub title: String,
    pub tree: ComponentTree,
    pub feedback: FeedbackMessages,
    rendering: RenderingNumber,
    stale: bool,
    /// Generations of shared models as of the last render.
    model_generations: BTreeMap<ComponentId, u64>,
    before_render: Option<BeforeRender>,
}

impl Page {
    pub fn new(class: impl Into<String>) -> Self {
        let class = class.into();
        Self {
            title: class.clone(),
            class,
            map: PageMapName::default(),
            key: None,
            parameters: PageParameters::new(),
            tree: ComponentTree::new(),
            feedback: FeedbackMessages::default(),
            rendering: RenderingNumber::default(),
            stale: false,
            model_generations: BTreeMap::new(),
            before_render: None,
        }
    }

    #[must_use]
    pub fn with_parameters(mut self, parameters: PageParameters) -> Self {
        self.parameters = parameters;
        self
    }

    #[must_use]
    pub fn in_page_map(mut self, map: PageMapName) -> Self {
        self.map = map;
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn with_before_render<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Page) -> Option<RenderInterrupt> + Send + Sync + 'static,
    {
        self.before_render = Some(BeforeRender(Arc::new(hook)));
        self
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn page_map(&self) -> &PageMapName {
        &self.map
    }

    pub fn parameters(&self) -> &PageParameters {
        &self.parameters
    }

    /// Set once the page has been stored.
    pub fn key(&self) -> Option<&PageKey> {
        self.key.as_ref()
    }

    pub fn id(&self) -> Option<PageId> {
        self.key.as_ref().map(|key| key.id)
    }

    pub fn path(&self) -> Option<PagePath> {
        self.key.as_ref().map(PageKey::path)
    }

    pub fn set_key(&mut self, key: PageKey) {
        self.map = key.map.clone();
        self.key = Some(key);
    }

    pub fn find(&self, path: &ComponentPath) -> PathLookup {
        self.tree.lookup(path)
    }

    pub fn rendering(&self) -> RenderingNumber {
        self.rendering
    }

    /// True when a request carries a rendering number other than the one
    /// this page was last rendered with.
    pub fn is_rendering_stale(&self, rendering: RenderingNumber) -> bool {
        rendering != self.rendering
    }

    /// Start a new render pass. Links rendered from now on carry the
    /// returned number.
    pub fn advance_rendering(&mut self) -> RenderingNumber {
        self.rendering = self.rendering.next();
        self.acknowledge_model_changes();
        self.rendering
    }

    /// Accept the current generations of all shared models as seen.
    ///
    /// Called after each render and after the page itself processed a
    /// request, so that changes the page made do not make it stale.
    pub fn acknowledge_model_changes(&mut self) {
        self.model_generations = self.shared_generations().collect();
    }

    /// Explicitly marked, or a shared model changed since it was last seen.
    pub fn is_stale(&self) -> bool {
        self.stale
            || self.shared_generations().any(|(id, generation)| {
                self.model_generations
                    .get(&id)
                    .is_some_and(|seen| *seen != generation)
            })
    }

    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    /// Whether the tree or a page-local model changed since the last call.
    pub fn take_changed(&mut self) -> bool {
        self.tree.take_changed()
    }

    pub fn before_render(&self) -> Option<RenderInterrupt> {
        self.before_render.as_ref().and_then(|hook| (hook.0)(self))
    }

    fn shared_generations(&self) -> impl Iterator<Item = (ComponentId, u64)> + '_ {
        self.tree.attached().into_iter().filter_map(|id| {
            let generation = self.tree.kind(id)?.model()?.generation()?;
            Some((id, generation))
        })
    }
}
