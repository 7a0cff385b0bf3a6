//! Ordered, case-insensitive header map

use std::fmt;

/// Ordered multimap of header names to values
///
/// Lookups ignore ASCII case while the names are stored exactly as given, so
/// headers read off the wire keep their original spelling. A name never maps
/// to zero values: removing a name drops every value it had.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all values of `name` with a single `value`
    ///
    /// The new entry takes the slot of the first value it replaces, otherwise
    /// it is appended.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        match self.position(&name) {
            Some(first) => {
                let mut index = 0;
                self.entries.retain(|(existing, _)| {
                    let keep = index <= first || !existing.eq_ignore_ascii_case(&name);
                    index += 1;
                    keep
                });
                self.entries[first] = (name, value);
            }
            None => self.entries.push((name, value)),
        }
    }

    /// Append a value to `name`, keeping existing values
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value of `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).next()
    }

    /// All values of `name` in insertion order
    pub fn get_all<'a, 'n>(&'a self, name: &'n str) -> GetAll<'a, 'n> {
        GetAll {
            entries: self.entries.iter(),
            name,
        }
    }

    /// Remove every value of `name`, returning whether any was present
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        before != self.entries.len()
    }

    /// Whether `name` has at least one value
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Distinct names in order of first appearance
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for (name, _) in &self.entries {
            if !names.iter().any(|seen| seen.eq_ignore_ascii_case(name)) {
                names.push(name);
            }
        }
        names
    }

    /// Append every entry of `other`
    pub fn extend(&mut self, other: &HeaderMap) {
        self.entries.extend(other.entries.iter().cloned());
    }

    /// Number of entries, counting repeated names separately
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }
}

/// Iterator over the values of one header name
///
/// Cloning the iterator restarts it from its current position without
/// touching the map.
#[derive(Debug, Clone)]
pub struct GetAll<'a, 'n> {
    entries: std::slice::Iter<'a, (String, String)>,
    name: &'n str,
}

impl<'a> Iterator for GetAll<'a, '_> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let name = self.name;
        self.entries
            .by_ref()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Debug for HeaderMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V> FromIterator<(K, V)> for HeaderMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = HeaderMap::new();
        for (name, value) in iter {
            map.add(name, value);
        }
        map
    }
}

impl IntoIterator for HeaderMap {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Whether `name` is a valid HTTP header field name (RFC 7230 token)
pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#'
                        | b'$'
                        | b'%'
                        | b'&'
                        | b'\''
                        | b'*'
                        | b'+'
                        | b'-'
                        | b'.'
                        | b'^'
                        | b'_'
                        | b'`'
                        | b'|'
                        | b'~'
                )
        })
}

/// Whether `value` can be written on a header line
pub(crate) fn is_valid_value(value: &str) -> bool {
    !value.bytes().any(|b| b == b'\r' || b == b'\n' || b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.set("Content-Type", "text/plain");

        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain"));
        assert!(headers.contains("content-TYPE"));
        assert_eq!(headers.get("accept"), None);
    }

    #[test]
    fn test_add_preserves_order() {
        let mut headers = HeaderMap::new();
        headers.add("Accept", "text/html");
        headers.add("X-Trace", "1");
        headers.add("accept", "application/json");

        let values: Vec<&str> = headers.get_all("ACCEPT").collect();
        assert_eq!(values, vec!["text/html", "application/json"]);
        assert_eq!(headers.get("accept"), Some("text/html"));
        assert_eq!(headers.len(), 3);
    }

    #[test]
    fn test_set_replaces_all_values() {
        let mut headers = HeaderMap::new();
        headers.add("Accept", "text/html");
        headers.add("X-Trace", "1");
        headers.add("accept", "application/json");
        headers.set("ACCEPT", "*/*");

        let entries: Vec<(&str, &str)> = headers.iter().collect();
        assert_eq!(entries, vec![("ACCEPT", "*/*"), ("X-Trace", "1")]);
    }

    #[test]
    fn test_remove_drops_every_value() {
        let mut headers = HeaderMap::new();
        headers.add("Cookie", "a=1");
        headers.add("cookie", "b=2");
        headers.add("Host", "example.com");

        assert!(headers.remove("COOKIE"));
        assert!(!headers.remove("cookie"));
        assert_eq!(headers.get_all("cookie").count(), 0);
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_get_all_is_restartable() {
        let headers: HeaderMap = vec![("Via", "a"), ("Via", "b")].into_iter().collect();
        let values = headers.get_all("via");

        let first: Vec<&str> = values.clone().collect();
        let second: Vec<&str> = values.collect();
        assert_eq!(first, second);
        assert_eq!(first, vec!["a", "b"]);
    }

    #[test]
    fn test_names_are_distinct() {
        let headers: HeaderMap = vec![("Via", "a"), ("Host", "h"), ("via", "b")]
            .into_iter()
            .collect();
        assert_eq!(headers.names(), vec!["Via", "Host"]);
    }

    #[test]
    fn test_header_validation() {
        assert!(is_valid_name("X-Custom_Header"));
        assert!(!is_valid_name("Bad Header"));
        assert!(!is_valid_name(""));
        assert!(is_valid_value("plain value"));
        assert!(!is_valid_value("evil\r\nInjected: yes"));
    }
}
