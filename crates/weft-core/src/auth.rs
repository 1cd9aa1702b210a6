//! Authorization checks consulted before pages are built and listeners run.

use weft_component::Page;
use weft_model::{ComponentId, ListenerInterface};

/// Decides whether a page may be constructed and whether a listener may be
/// invoked on a component.
pub trait AuthorizationStrategy: Send + Sync {
    fn is_instantiation_authorized(&self, class: &str) -> bool;

    fn is_action_authorized(
        &self,
        page: &Page,
        component: ComponentId,
        interface: ListenerInterface,
    ) -> bool;
}

/// Permits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AuthorizationStrategy for AllowAll {
    fn is_instantiation_authorized(&self, _class: &str) -> bool {
        true
    }

    fn is_action_authorized(
        &self,
        _page: &Page,
        _component: ComponentId,
        _interface: ListenerInterface,
    ) -> bool {
        true
    }
}
