//! Undo/redo history.
//!
//! A store keeps one linear history of full snapshots. Recording a change
//! while not at the tail discards the redo branch.

mod stack;

pub use stack::HistoryStack;
