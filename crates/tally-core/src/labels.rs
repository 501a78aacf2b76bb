//! Label sets identifying a time series.
//!
//! A label set is an unordered string map. Equality is decided on the
//! canonical form, which is built from the pairs sorted by key, so the order
//! in which a caller supplies labels never changes which series they hit.

use std::collections::BTreeMap;
use std::fmt;

/// Sorted, canonicalized key/value labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LabelSet {
    pairs: BTreeMap<String, String>,
    canonical: String,
}

impl LabelSet {
    /// The empty label set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a label set from key/value pairs. Later duplicates of a key win.
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let pairs: BTreeMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let canonical = canonicalize(&pairs);
        Self { pairs, canonical }
    }

    /// The canonical string used as the series key (`k1:v1,k2:v2,`), with
    /// `:`, `,` and `\` inside keys and values escaped by a backslash.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Look up a label value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.get(key).map(String::as_str)
    }

    /// Iterate the labels in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether there are no labels.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

fn canonicalize(pairs: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in pairs {
        push_escaped(&mut out, key);
        out.push(':');
        push_escaped(&mut out, value);
        out.push(',');
    }
    out
}

/// Backslash-escape the separators so distinct label sets never share a key.
fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        if matches!(c, ':' | ',' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
}

impl<K, V> FromIterator<(K, V)> for LabelSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        LabelSet::new(iter)
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for LabelSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        LabelSet::new(pairs)
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}
