//! In-process cache backend.
//!
//! Used when no Redis is configured and throughout the test suite.
//! Expiry runs on the Tokio clock so paused-time tests can step past a TTL.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::backend::{human_bytes, BackendError, BackendInfo, CacheBackend};

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Concurrent map with per-key expiry and Redis-like counters.
#[derive(Debug)]
pub struct MemoryBackend {
    entries: DashMap<String, MemoryEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
    commands: AtomicU64,
    started: Instant,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            commands: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Number of live (unexpired) keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store raw bytes, bypassing serialization. Lets tests plant corrupt values.
    pub fn insert_raw(&self, key: &str, value: impl Into<Vec<u8>>, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.into(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn command(&self) {
        self.commands.fetch_add(1, Ordering::Relaxed);
    }

    /// Read a live value, lazily evicting it if expired.
    fn read(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        let value = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.value.clone()),
            Some(_) => None,
            None => return None,
        };
        if value.is_none() {
            self.entries.remove_if(key, |_, e| e.is_expired(now));
        }
        value
    }

    fn track(&self, found: bool) {
        if found {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), BackendError> {
        self.command();
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        self.command();
        let value = self.read(key);
        self.track(value.is_some());
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool, BackendError> {
        self.command();
        self.insert_raw(key, value, ttl);
        Ok(true)
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, BackendError> {
        self.command();
        let now = Instant::now();
        let removed = keys
            .iter()
            .filter_map(|k| self.entries.remove(k))
            .filter(|(_, e)| !e.is_expired(now))
            .count();
        Ok(removed as u64)
    }

    async fn exists(&self, key: &str) -> Result<bool, BackendError> {
        self.command();
        Ok(self.read(key).is_some())
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, BackendError> {
        self.command();
        Ok(keys
            .iter()
            .map(|k| {
                let value = self.read(k);
                self.track(value.is_some());
                value
            })
            .collect())
    }

    async fn set_ex_many(
        &self,
        entries: Vec<(String, Vec<u8>)>,
        ttl: Duration,
    ) -> Result<usize, BackendError> {
        self.command();
        let written = entries.len();
        for (key, value) in entries {
            self.insert_raw(&key, value, ttl);
        }
        Ok(written)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, BackendError> {
        self.command();
        let now = Instant::now();
        Ok(self
            .entries
            .iter()
            .filter(|e| !e.is_expired(now) && glob_match(pattern, e.key()))
            .map(|e| e.key().clone())
            .collect())
    }

    async fn info(&self) -> Result<BackendInfo, BackendError> {
        self.command();
        let now = Instant::now();
        let used_memory: u64 = self
            .entries
            .iter()
            .filter(|e| !e.is_expired(now))
            .map(|e| (e.key().len() + e.value.len()) as u64)
            .sum();

        Ok(BackendInfo {
            connected_clients: 1,
            used_memory,
            used_memory_human: human_bytes(used_memory),
            keyspace_hits: self.hits.load(Ordering::Relaxed),
            keyspace_misses: self.misses.load(Ordering::Relaxed),
            total_commands_processed: self.commands.load(Ordering::Relaxed),
            uptime_in_seconds: self.started.elapsed().as_secs(),
            redis_version: format!("memory-{}", env!("CARGO_PKG_VERSION")),
        })
    }
}

/// Redis KEYS glob semantics: `*`, `?`, `[abc]`, `[^a]`, `[a-z]` and `\` escapes.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    glob_match_bytes(pattern.as_bytes(), text.as_bytes())
}

fn glob_match_bytes(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    // Backtrack point for the most recent `*`.
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() {
            match pattern[p] {
                b'*' => {
                    star = Some((p, t));
                    p += 1;
                    continue;
                }
                b'?' => {
                    p += 1;
                    t += 1;
                    continue;
                }
                b'[' => {
                    if let Some((matched, next)) = match_class(pattern, p, text[t]) {
                        if matched {
                            p = next;
                            t += 1;
                            continue;
                        }
                    }
                }
                b'\\' if p + 1 < pattern.len() => {
                    if pattern[p + 1] == text[t] {
                        p += 2;
                        t += 1;
                        continue;
                    }
                }
                c if c == text[t] => {
                    p += 1;
                    t += 1;
                    continue;
                }
                _ => {}
            }
        }

        match star {
            Some((sp, st)) => {
                p = sp + 1;
                t = st + 1;
                star = Some((sp, st + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}

/// Match `c` against the class starting at `pattern[start] == b'['`.
/// Returns whether it matched and the index just past the closing `]`.
fn match_class(pattern: &[u8], start: usize, c: u8) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negate = i < pattern.len() && pattern[i] == b'^';
    if negate {
        i += 1;
    }

    let mut matched = false;
    while i < pattern.len() && pattern[i] != b']' {
        if pattern[i] == b'\\' && i + 1 < pattern.len() {
            matched |= pattern[i + 1] == c;
            i += 2;
        } else if i + 2 < pattern.len() && pattern[i + 1] == b'-' && pattern[i + 2] != b']' {
            let (lo, hi) = (pattern[i].min(pattern[i + 2]), pattern[i].max(pattern[i + 2]));
            matched |= (lo..=hi).contains(&c);
            i += 3;
        } else {
            matched |= pattern[i] == c;
            i += 1;
        }
    }

    if i >= pattern.len() {
        // Unterminated class: treat '[' literally.
        return Some((c == b'[', start + 1));
    }
    Some((matched != negate, i + 1))
}
