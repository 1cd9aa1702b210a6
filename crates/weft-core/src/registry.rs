//! Bookmarkable page classes and their factories.

use std::collections::HashMap;
use std::fmt;

use weft_component::{BoxError, Page};
use weft_model::PageParameters;

use crate::error::{Result, WeftError};

type PageFactory = dyn Fn(&PageParameters) -> std::result::Result<Page, BoxError> + Send + Sync;

/// Maps page class names to the functions that build fresh instances.
#[derive(Default)]
pub struct PageRegistry {
    factories: HashMap<String, Box<PageFactory>>,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory for a page class.
    ///
    /// If a factory for this class is already registered, it is replaced.
    pub fn register<F>(&mut self, class: impl Into<String>, factory: F)
    where
        F: Fn(&PageParameters) -> std::result::Result<Page, BoxError> + Send + Sync + 'static,
    {
        self.factories.insert(class.into(), Box::new(factory));
    }

    pub fn contains(&self, class: &str) -> bool {
        self.factories.contains_key(class)
    }

    /// Builds a new instance of `class` with the given page parameters.
    ///
    /// # Errors
    ///
    /// [`WeftError::UnknownPage`] when nothing is registered under `class`,
    /// [`WeftError::PageConstruction`] when the factory fails.
    pub fn create(&self, class: &str, parameters: &PageParameters) -> Result<Page> {
        let factory = self
            .factories
            .get(class)
            .ok_or_else(|| WeftError::UnknownPage(class.to_string()))?;
        let page = factory(parameters).map_err(|source| WeftError::PageConstruction {
            class: class.to_string(),
            source,
        })?;
        Ok(page.with_parameters(parameters.clone()))
    }

    /// Registered class names, sorted.
    pub fn classes(&self) -> Vec<&str> {
        let mut classes: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        classes.sort_unstable();
        classes
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for PageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageRegistry")
            .field("classes", &self.classes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_pages_with_their_parameters() {
        let mut registry = PageRegistry::new();
        registry.register("Home", |_| Ok(Page::new("Home")));
        let mut parameters = PageParameters::new();
        parameters.insert("a", "1");

        let page = registry.create("Home", &parameters).unwrap();
        assert_eq!(page.class(), "Home");
        assert_eq!(page.parameters().get("a"), Some("1"));
        assert!(matches!(
            registry.create("Missing", &parameters),
            Err(WeftError::UnknownPage(class)) if class == "Missing"
        ));
    }
}
