//! Store Module
//!
//! The in-memory object map shared by every connection.
//!
//! ## Responsibilities
//! - Insert-if-absent puts, existence-checked removes
//! - Reads that never observe a half-applied write
//! - A consistent snapshot of the key set for LIST
//!
//! ## Data Structure Choice
//! A BTreeMap behind one coarse RwLock:
//! - Every operation is atomic on its own, with no cross-operation isolation
//! - Many concurrent readers, one writer at a time
//! - Listing comes out in key order without a sort
//!
//! Objects are held as `Bytes`, so a GET hands out a reference-counted view
//! instead of copying the payload under the lock.

mod table;

pub use table::ObjectStore;
