use std::borrow::Cow;

/// A request target split into path and query.
///
/// The split happens at the *last* `?` of the raw target. A path that still
/// contains a `?` after the split is reported by [`Url::is_ambiguous`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Url {
    raw: String,
    split: Option<usize>,
}

impl Url {
    pub fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_owned(),
            split: raw.rfind('?'),
        }
    }

    /// The target exactly as received.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn path(&self) -> &str {
        match self.split {
            Some(i) => &self.raw[..i],
            None => &self.raw,
        }
    }

    /// Query string without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.split.map(|i| &self.raw[i + 1..])
    }

    /// Decoded `key=value` pairs of the query string.
    pub fn query_pairs(&self) -> Vec<(Cow<'_, str>, Cow<'_, str>)> {
        match self.query() {
            Some(q) => url::form_urlencoded::parse(q.as_bytes()).collect(),
            None => Vec::new(),
        }
    }

    /// First decoded query value under `key`.
    pub fn query_param(&self, key: &str) -> Option<String> {
        self.query_pairs()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// True when the target holds more than one `?`.
    pub fn is_ambiguous(&self) -> bool {
        self.path().contains('?')
    }
}
