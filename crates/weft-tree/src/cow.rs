//! Copy-on-write shared tree for the parallel evaluator.
//!
//! Workers in a wave read a consistent snapshot while results are written
//! back through a single lock. [`SharedTree::snapshot`] is an O(1) Arc
//! clone; the first write after a snapshot was taken copies the tree once
//! (`Arc::make_mut`), and writers serialize on the lock.

use std::sync::Arc;

use parking_lot::RwLock;

use weft_util::Result;

use crate::cursor::Cursor;
use crate::value::Value;

/// A thread-safe document tree with snapshot semantics.
///
/// # Examples
///
/// ```
/// use weft_tree::{Cursor, SharedTree, Value};
///
/// let tree = SharedTree::new(Value::Map(Default::default()));
/// let before = tree.snapshot();
/// tree.set(&Cursor::parse("x").unwrap(), Value::Int(1)).unwrap();
/// // The earlier snapshot is unaffected by the write.
/// assert!(Cursor::parse("x").unwrap().resolve(&before).is_err());
/// ```
pub struct SharedTree {
    root: RwLock<Arc<Value>>,
}

impl SharedTree {
    /// Wrap a tree for shared access.
    pub fn new(root: Value) -> Self {
        Self {
            root: RwLock::new(Arc::new(root)),
        }
    }

    /// An O(1) structurally shared snapshot of the current tree.
    pub fn snapshot(&self) -> Arc<Value> {
        Arc::clone(&self.root.read())
    }

    /// Resolve a cursor against the current tree.
    pub fn find(&self, cursor: &Cursor) -> Result<Value> {
        let snapshot = self.snapshot();
        cursor.resolve(&snapshot).cloned()
    }

    /// Replace the value at a cursor.
    pub fn set(&self, cursor: &Cursor, value: Value) -> Result<()> {
        let mut guard = self.root.write();
        let root = Arc::make_mut(&mut guard);
        cursor.set(root, value)
    }

    /// Remove the value at a cursor.
    pub fn delete(&self, cursor: &Cursor) -> Result<()> {
        let mut guard = self.root.write();
        let root = Arc::make_mut(&mut guard);
        cursor.delete(root)
    }

    /// Apply an arbitrary mutation to the tree under the write lock.
    pub fn update<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut Value) -> T,
    {
        let mut guard = self.root.write();
        let root = Arc::make_mut(&mut guard);
        f(root)
    }

    /// Swap in a whole new tree.
    pub fn replace(&self, root: Value) {
        *self.root.write() = Arc::new(root);
    }

    /// Take the tree back out, consuming the wrapper.
    pub fn into_inner(self) -> Value {
        let arc = self.root.into_inner();
        Arc::try_unwrap(arc).unwrap_or_else(|shared| (*shared).clone())
    }
}
