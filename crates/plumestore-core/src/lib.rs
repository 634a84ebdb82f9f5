//! Core engine for `plumestore`, an embedded partitioned table store.
//!
//! A table is persisted as an ordered run of immutable Arrow IPC partition
//! files plus two small JSON metadata documents. The engine keeps partitions
//! contiguous, sorted, and schema-consistent across five mutation shapes
//! (append, insert, update, drop, astype) without rewriting the whole table
//! on every change.
//!
//! The crate is organized as:
//!
//! - A boundary trait for converting external tabular types to and from
//!   canonical record batches (`adapter` module).
//! - Database and store handles for directory bookkeeping (`database`
//!   module).
//! - Canonical batch shaping: index normalization, sorting, uniqueness,
//!   IPC encode/decode (`frame` module).
//! - On-disk names and path helpers (`layout` module).
//! - Durable table/partition metadata and its persistence (`metadata`
//!   module).
//! - Partition identifiers and row-count splitting (`partition` module).
//! - Row/column selectors, partition pruning, and selection masks
//!   (`selector` module).
//! - Local filesystem primitives: atomic writes, mmap reads (`storage`
//!   module).
//! - The table handle and its operation protocols (`table` module).
//!
//! Embedders are expected to go through the `plumestore` facade crate
//! rather than depending on these modules directly.
#![deny(missing_docs)]

pub mod adapter;
pub mod database;
pub mod frame;
pub mod layout;
pub mod metadata;
pub mod partition;
pub mod selector;
pub mod storage;
pub mod table;
