pub mod dict;
pub mod intset;
pub mod object;
pub mod sds;
pub mod set;

pub use dict::{Dict, DictIter};
pub use intset::{IntSet, IntSetIter};
pub use object::{shared_int, ObjRef, Object, StrValue, Value};
pub use sds::Sds;
pub use set::{SetIter, SetMember, SetValue};
