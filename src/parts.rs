//! In-memory store of package parts.

use std::collections::HashMap;

/// Ordered mapping from part name to raw bytes.
///
/// Part names are stored without a leading `/` (`xl/workbook.xml`). Insertion order is the
/// order the parts are written back to the container, and replacing an existing part keeps
/// its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartStore {
    entries: Vec<(String, Vec<u8>)>,
    index: HashMap<String, usize>,
}

impl PartStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the bytes of a part.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        let name = canonical_name(name);
        self.index
            .get(name)
            .map(|&idx| self.entries[idx].1.as_slice())
    }

    /// Insert a part, or replace the bytes of an existing one in place.
    pub fn put(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        let name = name.into();
        let name = canonical_name(&name).to_string();
        match self.index.get(&name) {
            Some(&idx) => self.entries[idx].1 = bytes,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, bytes));
            }
        }
    }

    /// Remove a part, returning its bytes.
    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        let name = canonical_name(name);
        let idx = self.index.remove(name)?;
        let (_, bytes) = self.entries.remove(idx);
        for slot in self.index.values_mut() {
            if *slot > idx {
                *slot -= 1;
            }
        }
        Some(bytes)
    }

    /// Check if a part exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(canonical_name(name))
    }

    /// Part names in store order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Parts in store order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
    }

    /// Number of parts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store has no parts.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total size of all parts in bytes.
    pub fn total_bytes(&self) -> usize {
        self.entries.iter().map(|(_, bytes)| bytes.len()).sum()
    }
}

fn canonical_name(name: &str) -> &str {
    name.strip_prefix('/').unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_preserves_insertion_order() {
        let mut store = PartStore::new();
        store.put("[Content_Types].xml", b"a".to_vec());
        store.put("xl/workbook.xml", b"b".to_vec());
        store.put("customXml/item1.xml", b"c".to_vec());
        store.put("xl/workbook.xml", b"B".to_vec());

        let names: Vec<_> = store.names().collect();
        assert_eq!(
            names,
            vec!["[Content_Types].xml", "xl/workbook.xml", "customXml/item1.xml"]
        );
        assert_eq!(store.get("xl/workbook.xml"), Some(&b"B"[..]));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_leading_slash_is_ignored() {
        let mut store = PartStore::new();
        store.put("/xl/styles.xml", b"s".to_vec());
        assert!(store.contains("xl/styles.xml"));
        assert_eq!(store.get("/xl/styles.xml"), Some(&b"s"[..]));
        assert!(store.get("xl/missing.xml").is_none());
    }

    #[test]
    fn test_remove_reindexes() {
        let mut store = PartStore::new();
        store.put("a", vec![1]);
        store.put("b", vec![2]);
        store.put("c", vec![3]);

        assert_eq!(store.remove("a"), Some(vec![1]));
        assert_eq!(store.get("c"), Some(&[3u8][..]));
        store.put("c", vec![4]);
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["b", "c"]);
        assert_eq!(store.total_bytes(), 2);
    }
}
