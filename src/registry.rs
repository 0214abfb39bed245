//! Name to factory directory of site adapters.
//!
//! Built once at startup and shared with whoever orchestrates collection.
//! Every lookup constructs a fresh adapter.

use crate::adapter::Standard;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Zero-argument adapter constructor.
pub type Factory = Arc<dyn Fn() -> Box<dyn Standard> + Send + Sync>;

/// Adapter directory guarded by a single mutex.
#[derive(Default)]
pub struct Registry {
    factories: Mutex<HashMap<String, Factory>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("names", &self.names())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Factory>> {
        // a panicking factory never runs under the lock, so the map is intact
        self.factories
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds or replaces the factory under `name`; the last writer wins.
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Standard> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(adapter = %name, "Registering adapter");
        self.lock().insert(name, Arc::new(factory));
    }

    /// Builds a new adapter.
    ///
    /// Every call runs the factory again, so callers never share adapter
    /// state.
    ///
    /// # Arguments
    ///
    /// * `name` - Name the adapter was registered under
    ///
    /// # Returns
    ///
    /// A fresh adapter, or `None` when `name` was never registered.
    pub fn lookup(&self, name: &str) -> Option<Box<dyn Standard>> {
        let factory = self.lock().get(name).cloned()?;
        Some(factory())
    }

    /// Registered names in no particular order.
    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::models::{Article, Tag};
    use async_trait::async_trait;
    use std::thread;

    struct Fake(&'static str);

    #[async_trait]
    impl Standard for Fake {
        fn name(&self) -> &str {
            self.0
        }

        fn tags(&self) -> Vec<Tag> {
            vec![Tag::Commerce]
        }

        async fn article_list(&self, _tag: Tag, _page: u32) -> Result<Vec<Article>> {
            Ok(Vec::new())
        }

        async fn article_detail(&self, _article: &mut Article) -> Result<()> {
            Err(Error::UndefinedArticleHref)
        }

        fn detail_url(&self, article: &Article) -> Result<String> {
            Ok(article.href.clone())
        }

        async fn has_snapshot(&self, _article: &Article) -> bool {
            false
        }
    }

    #[test]
    fn test_lookup_uses_registered_factory() {
        let reg = Registry::new();
        reg.register("fake", || Box::new(Fake("fake")));
        let adapter = reg.lookup("fake").expect("registered");
        assert_eq!(adapter.name(), "fake");
    }

    #[test]
    fn test_unknown_name_is_none() {
        let reg = Registry::new();
        assert!(reg.lookup("nope").is_none());
    }

    #[test]
    fn test_last_registration_wins() {
        let reg = Registry::new();
        reg.register("site", || Box::new(Fake("first")));
        reg.register("site", || Box::new(Fake("second")));
        assert_eq!(reg.lookup("site").unwrap().name(), "second");
        assert_eq!(reg.names(), vec!["site".to_string()]);
    }

    #[test]
    fn test_each_lookup_constructs() {
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let reg = Registry::new();
        reg.register("count", move || {
            *counter.lock().unwrap() += 1;
            Box::new(Fake("count"))
        });
        reg.lookup("count");
        reg.lookup("count");
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[test]
    fn test_concurrent_registration() {
        let reg = Arc::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let reg = Arc::clone(&reg);
                thread::spawn(move || {
                    let name: &'static str = Box::leak(format!("site_{i}").into_boxed_str());
                    reg.register(name, move || Box::new(Fake(name)));
                    assert!(reg.lookup(name).is_some());
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let mut names = reg.names();
        names.sort();
        assert_eq!(names.len(), 8);
        assert_eq!(names[0], "site_0");
    }
}
