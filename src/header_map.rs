//! Ordered, case-insensitive-by-name multimap of header fields.

/// An ordered collection of header name/value pairs.
///
/// Names compare case-insensitively; values are opaque byte sequences up to
/// a final UTF-8 decode the caller may perform. Entries are kept sorted
/// lexicographic case-insensitive by name; repeated names keep their
/// relative insertion order within their own run.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    /// Constructs an empty header map.
    pub fn new() -> HeaderMap {
        HeaderMap { entries: Vec::new() }
    }

    /// Appends a header, without replacing any existing header of the same
    /// name. Inserted in name order, after any existing entries sharing the
    /// same name, so iteration stays lexicographic case-insensitive by name
    /// across distinct names while duplicate names keep insertion order.
    pub fn append<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        let name = name.into();
        let value = value.into();
        let idx = self.entries.iter()
            .position(|&(ref n, _)| header_name_cmp(n, &name) == ::std::cmp::Ordering::Greater)
            .unwrap_or(self.entries.len());
        self.entries.insert(idx, (name, value));
    }

    /// Returns the first value for `name`, if any, comparing case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.iter()
            .find(|&&(ref n, _)| header_name_eq(n, name))
            .map(|&(_, ref v)| v.as_str())
    }

    /// Iterates over all values for `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item=&'a str> + 'a {
        self.entries.iter()
            .filter(move |&&(ref n, _)| header_name_eq(n, name))
            .map(|&(_, ref v)| v.as_str())
    }

    /// Returns true if any header with this name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|&(ref n, _)| header_name_eq(n, name))
    }

    /// Number of header fields (each repeated name counts individually).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all header fields in insertion order.
    pub fn iter(&self) -> ::std::slice::Iter<(String, String)> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Case-insensitive comparison of two header names (ASCII only, per the
/// token grammar in RFC 7230 §3.2.6 — header names cannot contain non-ASCII
/// bytes in the first place).
fn header_name_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Orders two header names byte-wise, lower-cased, shorter-is-less on a
/// common prefix.
fn header_name_cmp(a: &str, b: &str) -> ::std::cmp::Ordering {
    let an = a.bytes().map(|b| b.to_ascii_lowercase());
    let bn = b.bytes().map(|b| b.to_ascii_lowercase());
    an.cmp(bn)
}

impl PartialEq for HeaderMap {
    /// Two header maps are equal when they hold the same multiset of
    /// `(case-insensitive-name, exact-value)` pairs, with each distinct
    /// name's own values in the same per-name insertion order — the order
    /// of *distinct* names relative to each other does not matter.
    fn eq(&self, other: &HeaderMap) -> bool {
        if self.entries.len() != other.entries.len() {
            return false;
        }
        let mut a: Vec<(String, &str)> = self.entries.iter()
            .map(|&(ref n, ref v)| (n.to_ascii_lowercase(), v.as_str()))
            .collect();
        let mut b: Vec<(String, &str)> = other.entries.iter()
            .map(|&(ref n, ref v)| (n.to_ascii_lowercase(), v.as_str()))
            .collect();
        a.sort_by(|x, y| x.0.cmp(&y.0));
        b.sort_by(|x, y| x.0.cmp(&y.0));
        a == b
    }
}
impl Eq for HeaderMap {}

impl PartialOrd for HeaderMap {
    fn partial_cmp(&self, other: &HeaderMap) -> Option<::std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeaderMap {
    fn cmp(&self, other: &HeaderMap) -> ::std::cmp::Ordering {
        use std::cmp::Ordering::*;
        for (a, b) in self.entries.iter().zip(other.entries.iter()) {
            match header_name_cmp(&a.0, &b.0) {
                Equal => match a.1.cmp(&b.1) {
                    Equal => continue,
                    other => return other,
                },
                other => return other,
            }
        }
        self.entries.len().cmp(&other.entries.len())
    }
}

/// Canonicalizes a header name for output, e.g. `content-type` becomes
/// `Content-Type`: the first byte and every byte following a hyphen are
/// upper-cased, all others lower-cased. Used only when serializing headers;
/// parsing and lookups never depend on canonical casing.
pub fn canonicalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut start_of_word = true;
    for ch in name.chars() {
        if start_of_word {
            out.extend(ch.to_uppercase());
        } else {
            out.extend(ch.to_lowercase());
        }
        start_of_word = ch == '-';
    }
    out
}

#[cfg(test)]
mod test {
    use super::{HeaderMap, canonicalize_name};

    #[test]
    fn case_insensitive_get() {
        let mut h = HeaderMap::new();
        h.append("Content-Type", "text/plain");
        assert_eq!(h.get("content-type"), Some("text/plain"));
        assert_eq!(h.get("CONTENT-TYPE"), Some("text/plain"));
    }

    #[test]
    fn repeated_names_preserve_order() {
        let mut h = HeaderMap::new();
        h.append("Set-Cookie", "a=1");
        h.append("Set-Cookie", "b=2");
        let vals: Vec<_> = h.get_all("set-cookie").collect();
        assert_eq!(vals, vec!["a=1", "b=2"]);
    }

    #[test]
    fn equality_is_case_insensitive_on_names() {
        let mut a = HeaderMap::new();
        a.append("Host", "example.com");
        let mut b = HeaderMap::new();
        b.append("HOST", "example.com");
        assert_eq!(a, b);
    }

    #[test]
    fn canonicalize() {
        assert_eq!(canonicalize_name("content-length"), "Content-Length");
        assert_eq!(canonicalize_name("X-MY-HEADER"), "X-My-Header");
    }

    #[test]
    fn iteration_is_sorted_case_insensitive_by_name() {
        let mut h = HeaderMap::new();
        h.append("Zebra", "1");
        h.append("alpha", "2");
        h.append("Mango", "3");
        let names: Vec<&str> = h.iter().map(|&(ref n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["alpha", "Mango", "Zebra"]);
    }

    #[test]
    fn equality_ignores_distinct_name_order() {
        let mut a = HeaderMap::new();
        a.append("Host", "example.com");
        a.append("Accept", "*/*");
        let mut b = HeaderMap::new();
        b.append("Accept", "*/*");
        b.append("Host", "example.com");
        assert_eq!(a, b);
    }
}
