use xxhash_rust::xxh32::xxh32;

use crate::models::Identity;

/// Seeded 32-bit string hash. Only used to namespace and obfuscate keys.
pub trait Hash32 {
    fn hash32(&self, input: &str, seed: u32) -> u32;
}

/// xxHash32, the same digest the browser script got from xxhashjs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Xxh32;

impl Hash32 for Xxh32 {
    fn hash32(&self, input: &str, seed: u32) -> u32 {
        xxh32(input.as_bytes(), seed)
    }
}

/// Turns an identity into `"<prefix>.<hexA><hexB>"`.
#[derive(Debug, Clone)]
pub struct KeyDeriver<H = Xxh32> {
    hasher: H,
    prefix: String,
    seed: u32,
}

impl KeyDeriver<Xxh32> {
    pub fn new(prefix: impl Into<String>, seed: u32) -> Self {
        Self::with_hasher(Xxh32, prefix, seed)
    }
}

impl<H: Hash32> KeyDeriver<H> {
    pub fn with_hasher(hasher: H, prefix: impl Into<String>, seed: u32) -> Self {
        Self {
            hasher,
            prefix: prefix.into(),
            seed,
        }
    }

    pub fn derive_key(&self, identity: &Identity) -> String {
        let subreddit = identity.subreddit.as_deref().unwrap_or_default();
        let thread_id = identity.thread_id.as_deref().unwrap_or_default();

        let container = self.hex_hash(&format!("{}{}", identity.viewer_name, subreddit));
        let thread = self.hex_hash(&format!("{}{}", identity.viewer_id, thread_id));
        format!("{}.{}{}", self.prefix, container, thread)
    }

    // Unpadded lowercase hex, as Number.toString(16) produced
    fn hex_hash(&self, input: &str) -> String {
        format!("{:x}", self.hasher.hash32(input, self.seed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(name: &str, id: &str, sub: &str, thread: &str) -> Identity {
        Identity {
            viewer_name: name.to_string(),
            viewer_id: id.to_string(),
            subreddit: Some(sub.to_string()),
            thread_id: Some(thread.to_string()),
        }
    }

    #[test]
    fn derive_key_is_deterministic() {
        let deriver = KeyDeriver::new("µRCH", 0x499602D2);
        let who = identity("ferris", "42", "rust", "abc123");
        let first = deriver.derive_key(&who);
        for _ in 0..10 {
            assert_eq!(deriver.derive_key(&who.clone()), first);
        }
        assert!(first.starts_with("µRCH."));
    }

    #[test]
    fn different_threads_get_different_keys() {
        let deriver = KeyDeriver::new("µRCH", 0x499602D2);
        let a = deriver.derive_key(&identity("ferris", "42", "rust", "abc123"));
        let b = deriver.derive_key(&identity("ferris", "42", "rust", "abc124"));
        let c = deriver.derive_key(&identity("crab", "42", "rust", "abc123"));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn seed_changes_the_key() {
        let who = identity("ferris", "42", "rust", "abc123");
        let a = KeyDeriver::new("µRCH", 1).derive_key(&who);
        let b = KeyDeriver::new("µRCH", 2).derive_key(&who);
        assert_ne!(a, b);
    }

    struct Concat;

    impl Hash32 for Concat {
        fn hash32(&self, input: &str, _seed: u32) -> u32 {
            input.len() as u32
        }
    }

    #[test]
    fn key_layout_is_prefix_dot_two_hex_digests() {
        let deriver = KeyDeriver::with_hasher(Concat, "ns", 0);
        // "ferrisrust" is 10 chars, "42abc123" is 8
        let key = deriver.derive_key(&identity("ferris", "42", "rust", "abc123"));
        assert_eq!(key, "ns.a8");
    }
}
