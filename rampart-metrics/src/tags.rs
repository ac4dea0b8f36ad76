use ahash::AHashMap;
use parking_lot::RwLock;
use smallvec::SmallVec;
use std::sync::Arc;

/// Interned symbol. Tag keys, tag values, and metric names all share one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sym(u32);

impl From<Sym> for u32 {
    fn from(s: Sym) -> Self {
        s.0
    }
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    by_str: RwLock<AHashMap<Arc<str>, u32>>,
    by_id: RwLock<Vec<Arc<str>>>,
}

impl SymbolTable {
    pub fn intern(&self, s: &str) -> Sym {
        {
            let map = self.by_str.read();
            if let Some(&id) = map.get(s) {
                return Sym(id);
            }
        }

        let mut map = self.by_str.write();
        let mut vec = self.by_id.write();

        // Re-check under the write lock; another writer may have won.
        if let Some(&id) = map.get(s) {
            return Sym(id);
        }

        let id = vec.len() as u32;
        let owned: Arc<str> = Arc::from(s);
        vec.push(owned.clone());
        map.insert(owned, id);
        Sym(id)
    }

    pub fn resolve(&self, sym: Sym) -> Option<Arc<str>> {
        self.by_id.read().get(sym.0 as usize).cloned()
    }
}

/// A small, sorted set of (key, value) symbol pairs identifying one series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TagSet {
    pairs: SmallVec<[(Sym, Sym); 4]>,
}

impl TagSet {
    /// The untagged base series key.
    pub fn empty() -> TagSet {
        TagSet::default()
    }

    /// Build from unsorted pairs; sorts so equal sets hash equally.
    pub fn from_pairs(iter: impl IntoIterator<Item = (Sym, Sym)>) -> Self {
        let mut pairs: SmallVec<[(Sym, Sym); 4]> = iter.into_iter().collect();
        pairs.sort_unstable();
        pairs.dedup();
        Self { pairs }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Sym, Sym)> + '_ {
        self.pairs.iter().copied()
    }

    pub fn get(&self, key: Sym) -> Option<Sym> {
        let idx = self.pairs.partition_point(|(k, _)| *k < key);
        self.pairs
            .get(idx)
            .and_then(|(k, v)| (*k == key).then_some(*v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_stable_and_resolvable() {
        let table = SymbolTable::default();
        let a = table.intern("scenario");
        let b = table.intern("status");
        let a2 = table.intern("scenario");

        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(table.resolve(a).as_deref(), Some("scenario"));
        assert_eq!(table.resolve(b).as_deref(), Some("status"));
    }

    #[test]
    fn tagset_sorts_and_looks_up() {
        let table = SymbolTable::default();
        let k1 = table.intern("scenario");
        let k2 = table.intern("status");
        let v1 = table.intern("browse_products");
        let v2 = table.intern("200");

        let set = TagSet::from_pairs([(k2, v2), (k1, v1)]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(k1), Some(v1));
        assert_eq!(set.get(k2), Some(v2));
        assert_eq!(set.get(v1), None);

        let same = TagSet::from_pairs([(k1, v1), (k2, v2)]);
        assert_eq!(set, same);
    }
}
