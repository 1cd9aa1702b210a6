//! Saving form values between visits.

use tracing::debug;
use weft_component::{Page, Persistable};
use weft_model::CookieJar;

/// Storage for persistent form component values.
///
/// Implementations get the request's cookie jar so that a value saved while
/// processing a submission is visible to a load later in the same request.
pub trait ValuePersister: Send + Sync {
    fn save(&self, key: &str, value: &str, cookies: &mut CookieJar);

    fn load(&self, key: &str, cookies: &CookieJar) -> Option<String>;

    fn clear(&self, key: &str, cookies: &mut CookieJar);
}

/// Persistence key of a component: page class and input name, with every
/// character that is not alphanumeric replaced by `_`.
pub fn persistence_key(page_class: &str, input_name: &str) -> String {
    format!("{page_class}_{input_name}")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Keeps values in cookies.
#[derive(Debug, Clone, Copy)]
pub struct CookieValuePersister {
    max_age: u64,
}

impl CookieValuePersister {
    pub const DEFAULT_MAX_AGE: u64 = 30 * 24 * 60 * 60;

    pub fn new(max_age: u64) -> Self {
        Self { max_age }
    }
}

impl Default for CookieValuePersister {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_AGE)
    }
}

impl ValuePersister for CookieValuePersister {
    fn save(&self, key: &str, value: &str, cookies: &mut CookieJar) {
        cookies.set(key, value, Some(self.max_age));
    }

    fn load(&self, key: &str, cookies: &CookieJar) -> Option<String> {
        cookies.get(key).map(str::to_string)
    }

    fn clear(&self, key: &str, cookies: &mut CookieJar) {
        cookies.clear(key);
    }
}

/// Re-populate persistent fields of `page` from saved values.
///
/// Fields that hold input from the current submission are left alone.
/// Returns the number of fields whose model received a saved value.
pub fn restore_persisted_values(
    page: &mut Page,
    persister: &dyn ValuePersister,
    cookies: &CookieJar,
) -> usize {
    let class = page.class().to_string();
    let mut restored = 0;
    let mut changed = false;
    for id in page.tree.attached() {
        let Some(input_name) = page.tree.input_name(id) else {
            continue;
        };
        let Some(field) = page.tree.field_mut(id) else {
            continue;
        };
        if !field.is_persistent() || field.raw_input().is_some() {
            continue;
        }
        let Some(saved) = persister.load(&persistence_key(&class, &input_name), cookies) else {
            continue;
        };
        changed |= field.restore_persisted(&saved);
        restored += 1;
    }
    if changed {
        page.tree.mark_changed();
    }
    if restored > 0 {
        debug!(page = %class, restored, "restored persisted values");
    }
    restored
}
