use crate::hash::Hash;
use crate::list::List;
use crate::set::Set;
use crate::zset::SortedSet;

/// A typed value in the keyspace: the type tag and encoding tag are
/// implicit in the enum structure, so an impossible (type, encoding)
/// combination cannot be constructed and dispatch stays monomorphic.
pub enum Value {
    Hash(Hash),
    List(List),
    SortedSet(SortedSet),
    Set(Set),
}

/// Value type tag, as wrong-type checks and event hooks see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Hash,
    List,
    SortedSet,
    Set,
}

/// Physical representation currently backing a value.
///
/// `IntSet` appears for completeness of the (type, encoding) table; the
/// int-set primitive itself is an external container, so sets built by
/// this engine always report `HashTable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Packed,
    HashTable,
    SkipListPlusHash,
    Segmented,
    IntSet,
}

impl Value {
    pub fn type_tag(&self) -> ValueType {
        match self {
            Value::Hash(_) => ValueType::Hash,
            Value::List(_) => ValueType::List,
            Value::SortedSet(_) => ValueType::SortedSet,
            Value::Set(_) => ValueType::Set,
        }
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            Value::Hash(h) if h.is_packed() => Encoding::Packed,
            Value::Hash(_) => Encoding::HashTable,
            Value::List(_) => Encoding::Segmented,
            Value::SortedSet(z) if z.is_packed() => Encoding::Packed,
            Value::SortedSet(_) => Encoding::SkipListPlusHash,
            Value::Set(_) => Encoding::HashTable,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Value::Hash(h) => h.len(),
            Value::List(l) => l.len(),
            Value::SortedSet(z) => z.len(),
            Value::Set(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
