use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock, RwLock};
use tracing::info;

use ragkit_core::error::{Error, Result};

use crate::definition::StrategyDefinition;
use crate::loader::StrategyLoader;

type Snapshot = Arc<HashMap<String, Arc<StrategyDefinition>>>;

/// Loaded strategy definitions.
///
/// Readers take a snapshot `Arc` and release the lock immediately; a reload
/// swaps the whole map, so definitions are never edited in place.
#[derive(Default)]
pub struct StrategyRegistry {
    inner: RwLock<Snapshot>,
}

static GLOBAL: OnceLock<StrategyRegistry> = OnceLock::new();

impl StrategyRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn from_definitions(defs: HashMap<String, Arc<StrategyDefinition>>) -> Self {
        Self { inner: RwLock::new(Arc::new(defs)) }
    }

    /// Process-wide registry, empty until first `replace`/`reload`.
    pub fn global() -> &'static StrategyRegistry {
        GLOBAL.get_or_init(StrategyRegistry::new)
    }

    pub fn snapshot(&self) -> Snapshot {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn replace(&self, defs: HashMap<String, Arc<StrategyDefinition>>) {
        let next = Arc::new(defs);
        match self.inner.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Load `paths` and swap them in. On error the current contents stay.
    pub fn reload(&self, loader: &StrategyLoader, paths: &[PathBuf]) -> Result<usize> {
        let defs = loader.load_files(paths)?;
        let n = defs.len();
        self.replace(defs);
        info!(strategies = n, "strategy registry reloaded");
        Ok(n)
    }

    pub fn get(&self, name: &str) -> Result<Arc<StrategyDefinition>> {
        self.snapshot().get(name).cloned().ok_or_else(|| Error::StrategyNotFound(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.snapshot().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize { self.snapshot().len() }

    pub fn is_empty(&self) -> bool { self.snapshot().is_empty() }

    pub fn by_tag(&self, tag: &str) -> Vec<Arc<StrategyDefinition>> {
        self.select(|d| d.has_tag(tag))
    }

    pub fn by_use_case(&self, text: &str) -> Vec<Arc<StrategyDefinition>> {
        self.select(|d| d.matches_use_case(text))
    }

    fn select(&self, pred: impl Fn(&StrategyDefinition) -> bool) -> Vec<Arc<StrategyDefinition>> {
        let mut out: Vec<_> = self.snapshot().values().filter(|d| pred(d)).cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}
