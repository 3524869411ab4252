//! A localization-string engine.
//!
//! Source documents declare translatable entities, attributes,
//! pluralization hashes, and parametrized macros in a small DSL:
//!
//! ```text
//! <brandName {
//!   short: "Firefox",
//!   long: "Mozilla {{ ~ }}"
//! }>
//! <about "About {{ brandName.long }}">
//! <unread[plural($n)] {
//!   one: "{{ $n }} unread message",
//!  *other: "{{ $n }} unread messages"
//! }>
//! ```
//!
//! A [`Context`] owns an ordered list of locales, resolves entity lookups by
//! walking the list in priority order (falling back on misses and
//! evaluation errors), and re-fires live [`Context::localize`]
//! subscriptions when the locale list changes or an environment global
//! (`@hour`, `@screen`, `@os`) they depend on fires.

pub mod compiler;
pub mod context;
pub mod events;
pub mod global;
pub mod loader;
pub mod parser;
pub mod platform;
pub mod types;

pub use compiler::{
    CompilationError, Entity, EntityValue, IndexError, RuntimeError, ValueError,
};
pub use context::{
    Context, ContextError, EntityError, ErrorEvent, GetError, Locale, LocalizeHandle, Localized,
    Reason, Resource,
};
pub use global::{Global, GlobalError, GlobalRegistry};
pub use loader::{FileLoader, IoError, Loader, MemoryLoader};
pub use parser::ParserError;
pub use types::Data;

/// Creates a `BTreeMap<String, Data>` from key-value pairs.
///
/// Values are converted via `Into<Data>`, so you can pass numbers, strings,
/// booleans, or nested maps directly.
///
/// # Example
///
/// ```
/// use l20n::{Data, data};
///
/// let args = data! { "unread" => 3, "user" => "Alice" };
/// assert_eq!(args.len(), 2);
/// assert_eq!(args["unread"].as_num(), Some(3.0));
/// ```
#[macro_export]
macro_rules! data {
    {} => {
        ::std::collections::BTreeMap::<::std::string::String, $crate::Data>::new()
    };
    { $($key:expr => $value:expr),+ $(,)? } => {
        {
            let mut map = ::std::collections::BTreeMap::<::std::string::String, $crate::Data>::new();
            $(
                map.insert($key.to_string(), ::std::convert::Into::<$crate::Data>::into($value));
            )+
            map
        }
    };
}
