use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

/// Providers whose credentials are read from the environment
pub const PROVIDER_NAMES: [&str; 7] = [
    "FIRECRAWL", "JINA", "GOOGLE", "EXA", "SERPER", "YOUTUBE", "SUPADATA",
];

#[derive(Debug)]
struct Rotation {
    keys: Vec<String>,
    cursor: usize,
    issued: u64,
}

/// Round-robin API key rotation, one ring per provider.
///
/// The key list and cursor are never exposed. Each call to
/// [`CredentialPool::next_credential`] reads and advances the cursor under a
/// single lock, so concurrent callers never observe the same index.
#[derive(Debug, Default)]
pub struct CredentialPool {
    rings: HashMap<String, Mutex<Rotation>>,
}

impl CredentialPool {
    /// Build a pool from explicit key lists. Empty lists are dropped, which
    /// leaves that provider disabled.
    pub fn new<I, P, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (P, Vec<K>)>,
        P: Into<String>,
        K: Into<String>,
    {
        let mut rings = HashMap::new();
        for (provider, keys) in entries {
            let keys: Vec<String> = keys
                .into_iter()
                .map(Into::into)
                .filter(|k: &String| !k.trim().is_empty())
                .collect();
            if keys.is_empty() {
                continue;
            }
            rings.insert(
                provider.into(),
                Mutex::new(Rotation {
                    keys,
                    cursor: 0,
                    issued: 0,
                }),
            );
        }
        Self { rings }
    }

    /// Load `<P>_API_KEY` followed by `<P>_API_KEY_1`, `<P>_API_KEY_2`, ...
    /// for every provider in `providers`.
    pub fn from_env(providers: &[&str]) -> Self {
        Self::from_lookup(providers, |name| std::env::var(name).ok())
    }

    /// Same as [`CredentialPool::from_env`] with a custom variable lookup
    pub fn from_lookup<F>(providers: &[&str], lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut entries = Vec::new();
        for provider in providers {
            let mut keys = Vec::new();
            if let Some(key) = lookup(&format!("{provider}_API_KEY")) {
                keys.push(key);
            }
            let mut counter = 1;
            while let Some(key) = lookup(&format!("{provider}_API_KEY_{counter}")) {
                keys.push(key);
                counter += 1;
            }
            if !keys.is_empty() {
                ::log::info!("{}: {} credential(s) loaded", provider, keys.len());
            }
            entries.push((provider.to_string(), keys));
        }
        Self::new(entries)
    }

    /// Issue the next credential for `provider`, advancing its cursor exactly once.
    /// Returns `None` when the provider has no credentials.
    pub fn next_credential(&self, provider: &str) -> Option<String> {
        let ring = self.rings.get(provider)?;
        let mut rotation = ring.lock();
        let index = rotation.cursor;
        let key = rotation.keys[index].clone();
        rotation.cursor = (index + 1) % rotation.keys.len();
        rotation.issued += 1;
        ::log::debug!(
            "{}: using credential {}/{}",
            provider,
            index + 1,
            rotation.keys.len()
        );
        Some(key)
    }

    /// Whether `provider` has at least one credential
    pub fn is_enabled(&self, provider: &str) -> bool {
        self.rings.contains_key(provider)
    }

    /// Number of keys configured for `provider`
    pub fn key_count(&self, provider: &str) -> usize {
        self.rings
            .get(provider)
            .map(|ring| ring.lock().keys.len())
            .unwrap_or(0)
    }

    /// Credentials issued so far, per provider
    pub fn rotation_counts(&self) -> BTreeMap<String, u64> {
        self.rings
            .iter()
            .map(|(provider, ring)| (provider.clone(), ring.lock().issued))
            .collect()
    }
}

/// Difference between two snapshots of [`CredentialPool::rotation_counts`]
pub fn rotation_delta(
    before: &BTreeMap<String, u64>,
    after: &BTreeMap<String, u64>,
) -> BTreeMap<String, u64> {
    after
        .iter()
        .filter_map(|(provider, count)| {
            let delta = count.saturating_sub(before.get(provider).copied().unwrap_or(0));
            (delta > 0).then(|| (provider.clone(), delta))
        })
        .collect()
}
