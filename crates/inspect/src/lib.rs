//! Position-driven inspection over the syntax layer's node graph: active
//! node and ancestry, lexical scope, type inference, and keyword
//! autocomplete. Everything here operates on XOR nodes, so partially parsed
//! documents inspect the same way complete ones do.

#![warn(clippy::pedantic)]
#![allow(
    clippy::single_match,
    clippy::wildcard_imports,
    clippy::too_many_lines,
    clippy::enum_glob_use,
    clippy::cast_possible_truncation,
    clippy::cast_lossless,
    clippy::module_name_repetitions,
    clippy::single_match_else,
    clippy::missing_errors_doc
)]

pub mod active_node;
pub mod autocomplete;
pub mod scope;
pub mod settings;
pub mod ty;

pub type IndexMap<K, V> = indexmap::IndexMap<K, V, ahash::RandomState>;
pub type HashMap<K, V> = ahash::AHashMap<K, V>;
pub type HashSet<V> = ahash::AHashSet<V>;

static_assertions::assert_impl_all!(ty::Type: Send, Sync);
static_assertions::assert_impl_all!(settings::InspectionSettings: Send, Sync);

pub use active_node::{active_node, ActiveNode, CursorRelation, TrailingToken};
pub use autocomplete::autocomplete_keyword;
pub use scope::{try_node_scope, ScopeByKey, ScopeById, ScopeItem};
pub use settings::{ExternalTypeRequest, ExternalTypeResolver, InspectionSettings};
pub use ty::{any_union, try_type, ExtendedType, FunctionParameter, Type, TypeCache, TypeKind};
