#![deny(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::ModelError;

/// Name of the page map used when a path does not carry one.
pub const DEFAULT_PAGE_MAP: &str = "default";

const RESERVED_CHARS: [char; 8] = ['.', ':', '&', '=', '?', '/', '#', '%'];

fn is_valid_token(value: &str) -> bool {
    !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || RESERVED_CHARS.contains(&c))
}

/// A named history lane of pages, one per browser window or tab.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageMapName(String);

impl PageMapName {
    pub fn new(value: impl Into<String>) -> Result<Self, ModelError> {
        let value = value.into();
        let trimmed = value.trim();
        if !is_valid_token(trimmed) {
            return Err(ModelError::InvalidPageMapName(value));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_PAGE_MAP
    }
}

impl Default for PageMapName {
    fn default() -> Self {
        Self(DEFAULT_PAGE_MAP.to_string())
    }
}

impl fmt::Display for PageMapName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PageId(pub u32);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct VersionNumber(pub u32);

impl VersionNumber {
    pub const FIRST: Self = Self(1);

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VersionNumber {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(Self)
            .map_err(|_| ModelError::InvalidNumber {
                field: "version",
                value: s.to_string(),
            })
    }
}

/// Identifies one render pass of a page instance.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RenderingNumber(pub u64);

impl RenderingNumber {
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for RenderingNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RenderingNumber {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| ModelError::InvalidNumber {
                field: "rendering",
                value: s.to_string(),
            })
    }
}

/// Index of a node in a page's component arena.
///
/// Indices are never reused while the page lives, so an id stays valid
/// even after the node is detached from the tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ComponentId(usize);

impl ComponentId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Dotted path of a component relative to its page root, e.g. `form.address.city`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentPath(Vec<String>);

impl ComponentPath {
    pub fn parse(value: &str) -> Result<Self, ModelError> {
        let segments: Vec<String> = value.split('.').map(str::to_string).collect();
        Self::from_segments(segments).map_err(|_| ModelError::InvalidComponentPath(value.to_string()))
    }

    pub fn from_segments<I, S>(segments: I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() || !segments.iter().all(|s| is_valid_segment(s)) {
            return Err(ModelError::InvalidComponentPath(segments.join(".")));
        }
        Ok(Self(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn last(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    #[must_use]
    pub fn child(&self, segment: &str) -> Option<Self> {
        if !is_valid_segment(segment) {
            return None;
        }
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Some(Self(segments))
    }

    /// Name used for the component's HTML input, segments joined with `:`.
    pub fn input_name(&self) -> String {
        self.0.join(":")
    }
}

impl fmt::Display for ComponentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl FromStr for ComponentPath {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Returns true when `segment` can be used as a component id.
pub fn is_valid_segment(segment: &str) -> bool {
    is_valid_token(segment)
}

/// Identity of one stored page version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageKey {
    pub map: PageMapName,
    pub id: PageId,
    pub version: VersionNumber,
}

impl PageKey {
    pub fn path(&self) -> PagePath {
        PagePath {
            map: self.map.clone(),
            id: self.id,
            component: None,
        }
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}v{}", self.map, self.id, self.version)
    }
}

/// Wire form `[map:]id[.component.path]` used by the `component` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PagePath {
    pub map: PageMapName,
    pub id: PageId,
    pub component: Option<ComponentPath>,
}

impl PagePath {
    pub fn new(map: PageMapName, id: PageId) -> Self {
        Self {
            map,
            id,
            component: None,
        }
    }

    #[must_use]
    pub fn with_component(mut self, component: ComponentPath) -> Self {
        self.component = Some(component);
        self
    }

    #[must_use]
    pub fn page_only(&self) -> Self {
        Self {
            map: self.map.clone(),
            id: self.id,
            component: None,
        }
    }
}

impl FromStr for PagePath {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ModelError::InvalidPagePath(s.to_string());
        let (map, rest) = match s.split_once(':') {
            Some((map, rest)) => (PageMapName::new(map).map_err(|_| invalid())?, rest),
            None => (PageMapName::default(), s),
        };
        let (id, component) = match rest.split_once('.') {
            Some((id, path)) => (id, Some(ComponentPath::parse(path).map_err(|_| invalid())?)),
            None => (rest, None),
        };
        let id = id.trim().parse::<u32>().map_err(|_| invalid())?;
        Ok(Self {
            map,
            id: PageId(id),
            component,
        })
    }
}

impl fmt::Display for PagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.map.is_default() {
            write!(f, "{}:", self.map)?;
        }
        write!(f, "{}", self.id)?;
        if let Some(component) = &self.component {
            write!(f, ".{component}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of a buffered response awaiting its redirect GET.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BufferId(String);

impl BufferId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn generate() -> Self {
        Self(Ulid::new().to_string().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
