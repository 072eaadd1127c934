//! Merge collaborator seam.
//!
//! Document assembly and the `inject` operator both fold one mapping into
//! another. The concrete merge policy lives behind [`Merger`] so hosts
//! can swap in their own semantics; [`DeepMerger`] is the default the
//! engine ships: maps merge recursively, sequences and scalars replace.

use indexmap::IndexMap;

use weft_util::Result;

use crate::value::Value;

/// Folds an overlay value into a base value, in place.
pub trait Merger: Send + Sync {
    /// Merge `overlay` into `base`.
    fn merge(&self, base: &mut Value, overlay: Value) -> Result<()>;

    /// Merge a mapping's entries into a base mapping, preserving the
    /// base's key order for keys present in both.
    fn merge_map(&self, base: &mut IndexMap<String, Value>, overlay: IndexMap<String, Value>) -> Result<()> {
        for (key, value) in overlay {
            match base.get_mut(&key) {
                Some(slot) => self.merge(slot, value)?,
                None => {
                    base.insert(key, value);
                }
            }
        }
        Ok(())
    }
}

/// Recursive map merge; everything else replaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeepMerger;

impl Merger for DeepMerger {
    fn merge(&self, base: &mut Value, overlay: Value) -> Result<()> {
        match (base, overlay) {
            (Value::Map(b), Value::Map(o)) => self.merge_map(b, o),
            (slot, other) => {
                *slot = other;
                Ok(())
            }
        }
    }
}

/// Merge a series of documents into one tree with the given merger.
pub fn merge_documents<M: Merger>(merger: &M, documents: Vec<Value>) -> Result<Value> {
    let mut iter = documents.into_iter();
    let mut base = iter.next().unwrap_or(Value::Null);
    for overlay in iter {
        merger.merge(&mut base, overlay)?;
    }
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn test_maps_merge_recursively() {
        let mut base = yaml("a:\n  x: 1\n  y: 2\nb: keep\n");
        let overlay = yaml("a:\n  y: 3\n  z: 4\n");
        DeepMerger.merge(&mut base, overlay).unwrap();
        assert_eq!(base, yaml("a:\n  x: 1\n  y: 3\n  z: 4\nb: keep\n"));
    }

    #[test]
    fn test_lists_replace() {
        let mut base = yaml("l:\n  - 1\n  - 2\n");
        let overlay = yaml("l:\n  - 9\n");
        DeepMerger.merge(&mut base, overlay).unwrap();
        assert_eq!(base, yaml("l:\n  - 9\n"));
    }

    #[test]
    fn test_scalar_replaces_map() {
        let mut base = yaml("a:\n  x: 1\n");
        let overlay = yaml("a: flat\n");
        DeepMerger.merge(&mut base, overlay).unwrap();
        assert_eq!(base, yaml("a: flat\n"));
    }

    #[test]
    fn test_merge_documents_order() {
        let merged = merge_documents(
            &DeepMerger,
            vec![yaml("a: 1\n"), yaml("b: 2\n"), yaml("a: 3\n")],
        )
        .unwrap();
        assert_eq!(merged, yaml("a: 3\nb: 2\n"));
    }

    #[test]
    fn test_merge_no_documents() {
        let merged = merge_documents(&DeepMerger, vec![]).unwrap();
        assert_eq!(merged, Value::Null);
    }
}
