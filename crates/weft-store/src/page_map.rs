//! Versioned page storage for one session.
//!
//! Pages live in named page maps (one per browser window). Each stored
//! version remembers when it was last stored, which orders the map's history
//! for expiry and for the freshest-page fallback.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;
use weft_component::Page;
use weft_model::{PageId, PageKey, PageMapName, PagePath, VersionNumber};

#[derive(Debug, Clone)]
struct Entry {
    page: Page,
    seq: u64,
}

impl Entry {
    fn key(&self) -> Option<&PageKey> {
        self.page.key()
    }

    fn is(&self, id: PageId, version: VersionNumber) -> bool {
        self.key().is_some_and(|key| key.id == id && key.version == version)
    }
}

/// History lane of one browser window.
#[derive(Debug, Clone)]
pub struct PageMap {
    name: PageMapName,
    capacity: usize,
    entries: Vec<Entry>,
}

impl PageMap {
    pub fn new(name: PageMapName, capacity: usize) -> Self {
        Self {
            name,
            capacity: capacity.max(1),
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &PageMapName {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A specific version, or the highest stored version when `version` is `None`.
    pub fn get(&self, id: PageId, version: Option<VersionNumber>) -> Option<&Page> {
        self.find(id, version).map(|n| &self.entries[n].page)
    }

    /// Keys ordered from least to most recently stored.
    pub fn keys(&self) -> Vec<PageKey> {
        let mut entries: Vec<&Entry> = self.entries.iter().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries
            .into_iter()
            .filter_map(|entry| entry.key().cloned())
            .collect()
    }

    /// Most recently stored page that is not stale.
    pub fn freshest(&self) -> Option<&Page> {
        self.entries
            .iter()
            .filter(|entry| !entry.page.is_stale())
            .max_by_key(|entry| entry.seq)
            .map(|entry| &entry.page)
    }

    /// Store `page` (which must carry a key), replacing the same version.
    /// Returns the keys evicted to stay within capacity.
    fn insert(&mut self, page: Page, seq: u64) -> Vec<PageKey> {
        let Some(key) = page.key().cloned() else {
            return Vec::new();
        };
        self.entries.retain(|entry| !entry.is(key.id, key.version));
        self.entries.push(Entry { page, seq });

        let mut evicted = Vec::new();
        while self.entries.len() > self.capacity {
            let Some((oldest, _)) = self
                .entries
                .iter()
                .enumerate()
                .min_by_key(|(_, entry)| entry.seq)
            else {
                break;
            };
            let entry = self.entries.remove(oldest);
            evicted.extend(entry.key().cloned());
        }
        evicted
    }

    /// Drop every entry stored after `key`, plus later versions of the same
    /// page. Returns the expired keys.
    fn expire_newer_than(&mut self, key: &PageKey) -> Vec<PageKey> {
        let Some(target) = self.find(key.id, Some(key.version)).map(|n| self.entries[n].seq) else {
            return Vec::new();
        };
        let mut expired = Vec::new();
        self.entries.retain(|entry| {
            let Some(entry_key) = entry.key() else {
                return true;
            };
            let newer = entry.seq > target
                || (entry_key.id == key.id && entry_key.version > key.version);
            if newer {
                expired.push(entry_key.clone());
            }
            !newer
        });
        expired
    }

    fn mark_stale(&mut self, id: PageId) -> bool {
        let mut found = false;
        for entry in &mut self.entries {
            if entry.key().is_some_and(|key| key.id == id) {
                entry.page.mark_stale();
                found = true;
            }
        }
        found
    }

    fn find(&self, id: PageId, version: Option<VersionNumber>) -> Option<usize> {
        let candidates = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(n, entry)| entry.key().map(|key| (n, key)))
            .filter(|(_, key)| key.id == id);
        match version {
            Some(version) => candidates
                .filter(|(_, key)| key.version == version)
                .map(|(n, _)| n)
                .next(),
            None => candidates.max_by_key(|(_, key)| key.version).map(|(n, _)| n),
        }
    }
}

/// All page maps of a session.
#[derive(Debug, Clone)]
pub struct PageStore {
    maps: BTreeMap<PageMapName, PageMap>,
    max_pages_per_map: usize,
    next_id: u32,
    seq: u64,
    /// Highest version ever assigned per page, so expired versions are never reused.
    latest_versions: HashMap<(PageMapName, PageId), VersionNumber>,
}

impl PageStore {
    pub fn new(max_pages_per_map: usize) -> Self {
        Self {
            maps: BTreeMap::new(),
            max_pages_per_map,
            next_id: 0,
            seq: 0,
            latest_versions: HashMap::new(),
        }
    }

    /// Store a page and return the key it is stored under.
    ///
    /// A page without a key gets a new id at version 1. A stored page whose
    /// tree changed since it was checked out gets the next version number;
    /// otherwise its current version is overwritten.
    pub fn put(&mut self, mut page: Page) -> PageKey {
        let changed = page.take_changed();
        let key = match page.key().cloned() {
            None => {
                let id = PageId(self.next_id);
                self.next_id += 1;
                PageKey {
                    map: page.page_map().clone(),
                    id,
                    version: VersionNumber::FIRST,
                }
            }
            Some(key) if changed => {
                let latest = self
                    .latest_versions
                    .get(&(key.map.clone(), key.id))
                    .copied()
                    .unwrap_or(key.version)
                    .max(key.version);
                PageKey {
                    version: latest.next(),
                    ..key
                }
            }
            Some(key) => key,
        };
        self.latest_versions
            .entry((key.map.clone(), key.id))
            .and_modify(|latest| *latest = (*latest).max(key.version))
            .or_insert(key.version);

        page.set_key(key.clone());
        self.seq += 1;
        let capacity = self.max_pages_per_map;
        let map = self
            .maps
            .entry(key.map.clone())
            .or_insert_with(|| PageMap::new(key.map.clone(), capacity));
        let evicted = map.insert(page, self.seq);
        debug!(page = %key, changed, evicted = evicted.len(), "stored page");
        key
    }

    pub fn get(&self, path: &PagePath, version: Option<VersionNumber>) -> Option<&Page> {
        self.maps.get(&path.map)?.get(path.id, version)
    }

    /// Working copy of a stored page; changes are kept only when it is put back.
    pub fn checkout(&self, path: &PagePath, version: Option<VersionNumber>) -> Option<Page> {
        self.get(path, version).cloned()
    }

    pub fn contains(&self, key: &PageKey) -> bool {
        self.get(&key.path(), Some(key.version)).is_some()
    }

    /// Expire everything stored after `key` in its page map.
    pub fn expire_newer_than(&mut self, key: &PageKey) -> Vec<PageKey> {
        let Some(map) = self.maps.get_mut(&key.map) else {
            return Vec::new();
        };
        let expired = map.expire_newer_than(key);
        if !expired.is_empty() {
            debug!(page = %key, expired = expired.len(), "expired newer pages");
        }
        expired
    }

    pub fn freshest_page(&self, map: &PageMapName) -> Option<&Page> {
        self.maps.get(map)?.freshest()
    }

    /// Mark every stored version of a page stale.
    pub fn mark_stale(&mut self, path: &PagePath) -> bool {
        self.maps
            .get_mut(&path.map)
            .is_some_and(|map| map.mark_stale(path.id))
    }

    pub fn page_map(&self, name: &PageMapName) -> Option<&PageMap> {
        self.maps.get(name)
    }

    pub fn page_maps(&self) -> impl Iterator<Item = &PageMap> {
        self.maps.values()
    }

    pub fn len(&self) -> usize {
        self.maps.values().map(PageMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
