//!  Storage is organized through [kv_store::FileStore].
//!  The basic idea is:
//!   - There is a directory with one JSON document per key.
//!   - Keys are typed ([entities::StoreKey]) and always read and written as a whole.
//!   - [accounting::AccountingStore] puts the domain operations and defaults on top.

pub mod accounting;
pub mod entities;
pub mod kv_store;
