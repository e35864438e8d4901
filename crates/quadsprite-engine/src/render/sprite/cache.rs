use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;

use anyhow::{Context, Result};

use super::{Image, ImageKey, TextureFactory, TextureHandle};

/// Decides which cached textures to drop.
///
/// The cache reports every hit (`touch`), every new entry (`admit`) and every
/// removal it performs on its own (`forget`). `admit` returns the keys to evict.
pub trait EvictionPolicy {
    fn touch(&mut self, key: &ImageKey);
    fn admit(&mut self, key: &ImageKey) -> Vec<ImageKey>;
    fn forget(&mut self, key: &ImageKey);
}

/// Never evicts. Entries live as long as the cache.
#[derive(Debug, Default)]
pub struct Unbounded;

impl EvictionPolicy for Unbounded {
    fn touch(&mut self, _key: &ImageKey) {}

    fn admit(&mut self, _key: &ImageKey) -> Vec<ImageKey> {
        Vec::new()
    }

    fn forget(&mut self, _key: &ImageKey) {}
}

/// Keeps at most `capacity` textures, evicting the least recently used.
#[derive(Debug)]
pub struct Lru {
    capacity: NonZeroUsize,
    // front = least recently used
    order: VecDeque<ImageKey>,
}

impl Lru {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity.get()),
        }
    }

    fn remove(&mut self, key: &ImageKey) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
    }
}

impl EvictionPolicy for Lru {
    fn touch(&mut self, key: &ImageKey) {
        self.remove(key);
        self.order.push_back(key.clone());
    }

    fn admit(&mut self, key: &ImageKey) -> Vec<ImageKey> {
        self.touch(key);
        let excess = self.order.len().saturating_sub(self.capacity.get());
        self.order.drain(..excess).collect()
    }

    fn forget(&mut self, key: &ImageKey) {
        self.remove(key);
    }
}

/// Built-in eviction strategies, selectable from configuration.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum CachePolicy {
    /// One texture per distinct image for the cache's lifetime.
    #[default]
    Unbounded,
    /// Bounded least-recently-used.
    Lru { capacity: NonZeroUsize },
}

impl CachePolicy {
    pub fn build(self) -> Box<dyn EvictionPolicy> {
        match self {
            CachePolicy::Unbounded => Box::new(Unbounded),
            CachePolicy::Lru { capacity } => Box::new(Lru::new(capacity)),
        }
    }
}

/// Maps image identity to an uploaded texture, uploading on first use.
///
/// With the default [`Unbounded`] policy at most one texture is created per
/// distinct key, and growth is bounded only by the caller's sprite set.
pub struct TextureCache {
    entries: HashMap<ImageKey, TextureHandle>,
    policy: Box<dyn EvictionPolicy>,
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new(CachePolicy::Unbounded)
    }
}

impl TextureCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self::with_policy(policy.build())
    }

    pub fn with_policy(policy: Box<dyn EvictionPolicy>) -> Self {
        Self {
            entries: HashMap::new(),
            policy,
        }
    }

    /// Returns the texture for `image`, uploading it through `factory` on a miss.
    ///
    /// Upload failures propagate; nothing is cached for a failed upload.
    pub fn resolve<F>(&mut self, image: &Image, factory: &mut F) -> Result<TextureHandle>
    where
        F: TextureFactory + ?Sized,
    {
        let key = image.key();
        if let Some(&handle) = self.entries.get(key) {
            self.policy.touch(key);
            return Ok(handle);
        }

        let handle = factory
            .create_texture(image)
            .with_context(|| format!("failed to upload texture for {key}"))?;
        log::debug!(
            "texture cache miss: {key} ({}x{}) -> {handle:?}",
            image.natural_width(),
            image.natural_height()
        );
        self.entries.insert(key.clone(), handle);

        for evicted in self.policy.admit(key) {
            if let Some(old) = self.entries.remove(&evicted) {
                log::debug!("texture cache evict: {evicted} ({old:?})");
                factory.release_texture(old);
            }
        }

        Ok(handle)
    }

    /// Cached handle for `key`, without uploading or touching recency.
    pub fn handle(&self, key: &ImageKey) -> Option<TextureHandle> {
        self.entries.get(key).copied()
    }

    pub fn contains(&self, key: &ImageKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Drops one entry, releasing its texture. Returns whether it was cached.
    pub fn remove<F>(&mut self, key: &ImageKey, factory: &mut F) -> bool
    where
        F: TextureFactory + ?Sized,
    {
        let Some(handle) = self.entries.remove(key) else { return false };
        self.policy.forget(key);
        factory.release_texture(handle);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::sprite::testing::{RecordingBackend, image};

    fn lru(capacity: usize) -> TextureCache {
        TextureCache::new(CachePolicy::Lru {
            capacity: NonZeroUsize::new(capacity).unwrap(),
        })
    }

    // ── unbounded ─────────────────────────────────────────────────────────

    #[test]
    fn same_key_resolves_to_same_handle_with_one_upload() {
        let mut backend = RecordingBackend::default();
        let mut cache = TextureCache::default();

        // Distinct Image values, same identity.
        let a = image("player.png", 192, 32);
        let b = image("player.png", 192, 32);

        let h1 = cache.resolve(&a, &mut backend).unwrap();
        let h2 = cache.resolve(&b, &mut backend).unwrap();

        assert_eq!(h1, h2);
        assert_eq!(backend.uploads(), ["player.png"]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_keys_get_distinct_textures() {
        let mut backend = RecordingBackend::default();
        let mut cache = TextureCache::default();

        let h1 = cache.resolve(&image("a.png", 8, 8), &mut backend).unwrap();
        let h2 = cache.resolve(&image("b.png", 8, 8), &mut backend).unwrap();

        assert_ne!(h1, h2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn unbounded_never_releases() {
        let mut backend = RecordingBackend::default();
        let mut cache = TextureCache::default();
        for i in 0..64 {
            cache.resolve(&image(&format!("{i}.png"), 1, 1), &mut backend).unwrap();
        }
        assert_eq!(cache.len(), 64);
        assert!(backend.released().is_empty());
    }

    #[test]
    fn failed_upload_is_not_cached() {
        let mut backend = RecordingBackend::default();
        backend.fail_uploads(true);
        let mut cache = TextureCache::default();

        let img = image("broken.png", 4, 4);
        let err = cache.resolve(&img, &mut backend).unwrap_err();
        assert!(format!("{err:#}").contains("broken.png"));
        assert!(cache.is_empty());

        backend.fail_uploads(false);
        cache.resolve(&img, &mut backend).unwrap();
        assert!(cache.contains(img.key()));
    }

    #[test]
    fn remove_releases_texture() {
        let mut backend = RecordingBackend::default();
        let mut cache = TextureCache::default();
        let img = image("a.png", 2, 2);
        let handle = cache.resolve(&img, &mut backend).unwrap();

        assert!(cache.remove(img.key(), &mut backend));
        assert!(!cache.remove(img.key(), &mut backend));
        assert_eq!(backend.released(), [handle]);
    }

    // ── lru ───────────────────────────────────────────────────────────────

    #[test]
    fn lru_evicts_least_recently_used() {
        let mut backend = RecordingBackend::default();
        let mut cache = lru(2);
        let (a, b, c) = (image("a", 1, 1), image("b", 1, 1), image("c", 1, 1));

        let ha = cache.resolve(&a, &mut backend).unwrap();
        cache.resolve(&b, &mut backend).unwrap();
        cache.resolve(&a, &mut backend).unwrap(); // a is now most recent
        cache.resolve(&c, &mut backend).unwrap(); // evicts b

        assert!(cache.contains(a.key()));
        assert!(!cache.contains(b.key()));
        assert!(cache.contains(c.key()));
        assert_eq!(cache.handle(a.key()), Some(ha));
        assert_eq!(backend.released().len(), 1);
    }

    #[test]
    fn lru_reuploads_after_eviction() {
        let mut backend = RecordingBackend::default();
        let mut cache = lru(1);
        let (a, b) = (image("a", 1, 1), image("b", 1, 1));

        let first = cache.resolve(&a, &mut backend).unwrap();
        cache.resolve(&b, &mut backend).unwrap();
        let second = cache.resolve(&a, &mut backend).unwrap();

        assert_ne!(first, second);
        assert_eq!(backend.uploads(), ["a", "b", "a"]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn lru_policy_reports_overflow_in_age_order() {
        let mut policy = Lru::new(NonZeroUsize::new(2).unwrap());
        let keys: Vec<ImageKey> = ["a", "b", "c"].into_iter().map(ImageKey::from).collect();

        assert!(policy.admit(&keys[0]).is_empty());
        assert!(policy.admit(&keys[1]).is_empty());
        assert_eq!(policy.admit(&keys[2]), vec![keys[0].clone()]);

        policy.forget(&keys[1]);
        assert!(policy.admit(&keys[0]).is_empty());
    }
}
