//! The name dictionary page.

use std::collections::{BTreeMap, HashMap};

use bytes::{Buf, BufMut};

use strata_common::{StoreError, StoreResult};

/// Dictionary of interned names for one revision.
///
/// Keys are dense and append-only: interning a known name returns its
/// existing key, interning a new one assigns the next key. Names are never
/// removed, so a key handed out in one revision resolves in every later
/// revision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamePage {
    next_key: u32,
    by_key: BTreeMap<u32, String>,
    by_name: HashMap<String, u32>,
}

impl NamePage {
    /// Creates an empty dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the key of `name`, interning it if unseen.
    pub fn intern(&mut self, name: &str) -> u32 {
        if let Some(&key) = self.by_name.get(name) {
            return key;
        }
        let key = self.next_key;
        self.next_key += 1;
        self.by_key.insert(key, name.to_string());
        self.by_name.insert(name.to_string(), key);
        key
    }

    /// Name bound to `key`, if any.
    #[must_use]
    pub fn name(&self, key: u32) -> Option<&str> {
        self.by_key.get(&key).map(String::as_str)
    }

    /// Key bound to `name`, if it was interned.
    #[must_use]
    pub fn key(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    /// Number of interned names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Whether no names were interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Writes the dictionary to `buf`, entries in key order.
    pub fn serialize(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.next_key);
        buf.put_u32(self.by_key.len() as u32);
        for (key, name) in &self.by_key {
            buf.put_u32(*key);
            buf.put_u32(name.len() as u32);
            buf.put_slice(name.as_bytes());
        }
    }

    /// Reads a dictionary from `buf`.
    pub fn deserialize(buf: &mut impl Buf) -> StoreResult<Self> {
        if buf.remaining() < 8 {
            return Err(StoreError::decode("truncated name page header"));
        }
        let next_key = buf.get_u32();
        let count = buf.get_u32();

        let mut by_key = BTreeMap::new();
        let mut by_name = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            if buf.remaining() < 8 {
                return Err(StoreError::decode("truncated name entry header"));
            }
            let key = buf.get_u32();
            let len = buf.get_u32() as usize;
            if buf.remaining() < len {
                return Err(StoreError::decode("truncated name entry"));
            }
            let raw = buf.copy_to_bytes(len);
            let name = String::from_utf8(raw.to_vec())
                .map_err(|_| StoreError::decode(format!("name for key {key} is not utf-8")))?;
            by_name.insert(name.clone(), key);
            by_key.insert(key, name);
        }

        Ok(Self {
            next_key,
            by_key,
            by_name,
        })
    }
}
