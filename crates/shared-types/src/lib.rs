//! # Shared Types Crate
//!
//! Domain entities, audit/event/history/change-request records and the ports
//! the core is written against.
//!
//! ## Design Principles
//!
//! - **Opaque entities**: the core sees an entity as a class name, a row key
//!   and a [`FieldMap`]. Typed budget entities convert through
//!   [`AuditedEntity`].
//! - **Ports, not backends**: [`UnitOfWork`], [`RecordStore`] and
//!   [`CurrentActor`] are implemented by the storage layer; nothing here
//!   assumes a particular database.
//! - **One error taxonomy**: every fallible core operation returns
//!   [`CoreResult`].

pub mod display;
pub mod entities;
pub mod errors;
pub mod observer;
pub mod records;
pub mod security;
pub mod unit_of_work;

pub use entities::*;
pub use errors::*;
pub use observer::{FailureObserver, NoopObserver};
pub use records::*;
pub use security::*;
pub use unit_of_work::*;

/// Build a [`FieldMap`] from `name => value` pairs.
///
/// ```
/// use shared_types::{field_map, FieldValue};
///
/// let fields = field_map! { "amount" => 100_i64, "notes" => "first draw" };
/// assert_eq!(fields.get("amount"), Some(&FieldValue::Int(100)));
/// ```
#[macro_export]
macro_rules! field_map {
    () => { $crate::FieldMap::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::FieldMap::new();
        $( map.insert(::std::string::String::from($name), $crate::FieldValue::from($value)); )+
        map
    }};
}
