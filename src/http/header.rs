//! Ordered header multimap.
//!
//! Keys and values are either borrowed `'static` strings or owned heap
//! copies. The distinction lives in the type (`Cow`), so removing an entry
//! releases exactly the strings it owns.

use std::borrow::Cow;

/// A header key or value: borrowed static text or an owned copy.
pub type HeaderStr = Cow<'static, str>;

/// Where a new entry goes in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub key: HeaderStr,
    pub value: HeaderStr,
}

/// Ordered `(key, value)` pairs with case-insensitive lookup.
///
/// Duplicate keys coexist; inserting never replaces an existing entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderTable {
    entries: Vec<Header>,
}

impl HeaderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry.
    ///
    /// `&'static str` arguments are stored borrowed; `String` arguments are
    /// stored owned. Use [`HeaderTable::insert_copy`] to duplicate borrowed
    /// text with a shorter lifetime.
    pub fn insert(
        &mut self,
        key: impl Into<HeaderStr>,
        value: impl Into<HeaderStr>,
        position: Position,
    ) {
        let header = Header {
            key: key.into(),
            value: value.into(),
        };
        match position {
            Position::Start => self.entries.insert(0, header),
            Position::End => self.entries.push(header),
        }
    }

    /// Inserts owned copies of `key` and `value`.
    pub fn insert_copy(&mut self, key: &str, value: &str, position: Position) {
        self.insert(key.to_owned(), value.to_owned(), position);
    }

    /// Appends an entry at the end.
    pub fn append(&mut self, key: impl Into<HeaderStr>, value: impl Into<HeaderStr>) {
        self.insert(key, value, Position::End);
    }

    /// First value whose key matches `key`, ignoring ASCII case.
    pub fn find(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|h| h.key.eq_ignore_ascii_case(key))
            .map(|h| h.value.as_ref())
    }

    /// Every value stored under `key`, in table order.
    pub fn find_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |h| h.key.eq_ignore_ascii_case(key))
            .map(|h| h.value.as_ref())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Removes every entry under `key`, returning how many were dropped.
    pub fn remove(&mut self, key: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|h| !h.key.eq_ignore_ascii_case(key));
        before - self.entries.len()
    }

    /// `(key, value)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|h| (h.key.as_ref(), h.value.as_ref()))
    }

    /// Appends a copy of every entry of `other`, preserving its order.
    ///
    /// Owned strings are duplicated; borrowed ones are `'static` and shared.
    pub fn merge_from(&mut self, other: &HeaderTable) {
        self.entries.extend(other.entries.iter().cloned());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Serializes the table as `Key: Value\r\n` lines.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        for (key, value) in self.iter() {
            out.extend_from_slice(key.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
    }
}
