//! Built-in site adapters.
//!
//! Each adapter follows the same two-phase pattern:
//!
//! 1. **Listing**: fetch a tag's listing page with the spider identity and
//!    return stubs (`title`, `href`, sometimes `post_time` and tags)
//! 2. **Detail**: fetch the article through the snapshot cache, localize
//!    its images, and render sanitized content into the stub
//!
//! # Supported Sites
//!
//! | Site | Module | Listing | Notes |
//! |------|--------|---------|-------|
//! | techsir.com | [`techsir`] | HTML | Page 1 has no page segment |
//! | nbtimes.net | [`nbtimes`] | HTML search | Href is an absolute URL |
//! | sohu.com | [`sohu`] | JSON feed | Encrypted image sources; 900 char minimum |

use crate::adapter::Engine;
use crate::registry::Registry;
use std::sync::Arc;

pub mod nbtimes;
pub mod sohu;
pub mod techsir;

/// Registers every built-in adapter under its site name.
pub fn register_builtin(registry: &Registry, engine: Arc<Engine>) {
    let e = Arc::clone(&engine);
    registry.register(techsir::NAME, move || Box::new(techsir::Techsir::new(Arc::clone(&e))));
    let e = Arc::clone(&engine);
    registry.register(nbtimes::NAME, move || Box::new(nbtimes::Nbtimes::new(Arc::clone(&e))));
    registry.register(sohu::NAME, move || Box::new(sohu::Sohu::new(Arc::clone(&engine))));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::Tag;

    #[test]
    fn test_register_builtin() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = Config {
            image_root: tmp.path().join("img"),
            snapshot_root: tmp.path().join("snap"),
            ..Config::default()
        };
        let registry = Registry::new();
        register_builtin(&registry, Arc::new(Engine::new(config).unwrap()));

        let mut names = registry.names();
        names.sort();
        assert_eq!(names, vec!["nbtimes_net", "techsir_com", "v2_sohu_com"]);

        let sohu = registry.lookup("v2_sohu_com").unwrap();
        assert_eq!(sohu.name(), "v2_sohu_com");
        assert!(sohu.tags().contains(&Tag::Fashion));
        assert!(registry.lookup("unknown").is_none());
    }
}
