use tracing::warn;

/// An ordered multimap of request parameters.
///
/// Holds query parameters and decoded form attributes. Duplicate names are kept
/// in arrival order, so `a=1&a=2` yields two entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the query component of a uri, without the leading `?`.
    pub fn from_query(query: &str) -> Self {
        Self::from_urlencoded(query.as_bytes())
    }

    /// Parses an `application/x-www-form-urlencoded` payload.
    ///
    /// Malformed input is logged and yields no parameters.
    pub fn from_urlencoded(bytes: &[u8]) -> Self {
        match serde_urlencoded::from_bytes::<Vec<(String, String)>>(bytes) {
            Ok(entries) => Self { entries },
            Err(e) => {
                warn!(cause = %e, "can't decode url encoded parameters, ignore them");
                Self::default()
            }
        }
    }

    /// Returns the first value stored under `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    /// Returns every value stored under `name`, in arrival order
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries.iter().filter(move |(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn append<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        self.entries.push((name.into(), value.into()));
    }

    /// Appends every entry of `other`, keeping existing ones.
    pub fn extend_from(&mut self, other: &Params) {
        self.entries.extend(other.entries.iter().cloned());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self { entries: iter.into_iter().map(|(key, value)| (key.into(), value.into())).collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_query() {
        let params = Params::from_query("a=1&b=hello%20world&a=3");

        assert_eq!(params.len(), 3);
        assert_eq!(params.get("a"), Some("1"));
        assert_eq!(params.get("b"), Some("hello world"));
        assert_eq!(params.get_all("a").collect::<Vec<_>>(), vec!["1", "3"]);
        assert_eq!(params.get("c"), None);
    }

    #[test]
    fn parse_form_with_plus() {
        let params = Params::from_urlencoded(b"name=micro+body&empty=");

        assert_eq!(params.get("name"), Some("micro body"));
        assert_eq!(params.get("empty"), Some(""));
    }

    #[test]
    fn extend_keeps_duplicates() {
        let mut params: Params = [("a", "1")].into_iter().collect();
        let form: Params = [("a", "2"), ("b", "3")].into_iter().collect();

        params.extend_from(&form);

        assert_eq!(params.iter().collect::<Vec<_>>(), vec![("a", "1"), ("a", "2"), ("b", "3")]);
    }
}
