//! Native-side owned resources: UTF-16 strings, string arrays and the
//! allocation ledger that accounts for them.

pub mod array;
pub mod ledger;
pub mod string;

pub use array::StringArrayHandle;
pub use ledger::{AllocKind, LedgerSnapshot};
pub use string::{raw_or_null, NativeString};
