//! weft-tree - The document tree and its addressing.
//!
//! Documents are order-preserving maps, sequences, and scalars
//! ([`Value`]); positions inside a document are canonical [`Cursor`]
//! paths. [`SharedTree`] adds the copy-on-write snapshot discipline the
//! parallel evaluator needs, and [`Merger`] is the seam through which
//! mappings are folded together.

pub mod cow;
pub mod cursor;
pub mod merge;
pub mod value;

pub use cow::SharedTree;
pub use cursor::{Cursor, Step};
pub use merge::{merge_documents, DeepMerger, Merger};
pub use value::{format_float, Value};
