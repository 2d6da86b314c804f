//! Downloaded post images, kept as an offline fallback.

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::RngCore;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::http::HttpClient;
use crate::store::FileStore;

pub const IMAGES_DIR: &str = "images";

static IMAGE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)/([A-Za-z0-9_\-.]+?)\.(?:jpe?g|png|webp|heic)(?:[?#]|$)")
        .expect("image name pattern is valid")
});

/// Identifier used as the cached file name for an image URL
pub fn cache_key(url: &str) -> String {
    if let Some(caps) = IMAGE_NAME.captures(url) {
        return caps[1].to_string();
    }
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn image_key(url: &str) -> String {
    format!("{}/{}.jpg", IMAGES_DIR, cache_key(url))
}

pub struct ImageCache<'a> {
    store: &'a dyn FileStore,
    verbose: bool,
}

impl<'a> ImageCache<'a> {
    pub fn new(store: &'a dyn FileStore, verbose: bool) -> Self {
        Self { store, verbose }
    }

    /// Save image bytes. Failures are reported and otherwise ignored.
    pub fn store(&self, url: &str, bytes: &[u8]) {
        if let Err(e) = self.store.write(&image_key(url), bytes) {
            if self.verbose {
                eprintln!("[VERBOSE] failed to cache image: {}", e);
            }
        }
    }

    pub fn load(&self, url: &str) -> Option<Vec<u8>> {
        self.store.read(&image_key(url)).ok()
    }

    /// Path of the cached file for `url`, if present
    pub fn path_of(&self, url: &str) -> Option<std::path::PathBuf> {
        let key = image_key(url);
        self.store
            .exists(&key)
            .then(|| self.store.root().join(key))
    }

    /// A uniformly chosen cached image, with its key
    pub fn random_cached(&self, rng: &mut dyn RngCore) -> Option<(String, Vec<u8>)> {
        let keys = self
            .store
            .list(&format!("{}/*.jpg", IMAGES_DIR))
            .ok()?;
        let key = keys.choose(rng)?;
        let bytes = self.store.read(key).ok()?;
        Some((key.clone(), bytes))
    }

    /// Download an image and cache it; falls back to the cached copy
    pub fn fetch(&self, http: &dyn HttpClient, url: &str) -> Option<Vec<u8>> {
        match http.get(url, &[]) {
            Ok(resp) if resp.is_success() && !resp.body.is_empty() => {
                self.store(url, &resp.body);
                Some(resp.body)
            }
            Ok(resp) => {
                if self.verbose {
                    eprintln!("[VERBOSE] image download returned {}", resp.status);
                }
                self.load(url)
            }
            Err(e) => {
                if self.verbose {
                    eprintln!("[VERBOSE] {}", e);
                }
                self.load(url)
            }
        }
    }
}
