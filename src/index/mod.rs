//! B+Tree index over fixed-size keys.
//!
//! Pages are read and written through the buffer pool using the page views in
//! [`crate::storage::page`]; keys are ordered by a [`KeyComparator`].

mod b_plus_tree;
mod index_iterator;
mod key_comparator;
mod key_manager;

pub use b_plus_tree::BPlusTree;
pub use index_iterator::IndexIterator;
pub use key_comparator::{BytewiseComparator, IntegerComparator, KeyComparator};
pub use key_manager::KeyManager;
