//! Syntax layer of the Power Query language services: the line-aware
//! incremental lexer, the flattened token snapshot, and the partial-context
//! recursive-descent parser together with the node-id map it populates.

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

pub mod keyword;
pub mod lexer;
pub mod node;
pub mod node_id_map;
pub mod parser;
pub mod token;
pub mod util;

pub type HashMap<K, V> = ahash::AHashMap<K, V>;
pub type HashSet<V> = ahash::AHashSet<V>;

pub use keyword::KeywordKind;
pub use node::{AstNode, ContextNode, NodeId, NodeKind, XorNode};
pub use node_id_map::NodeIdMap;
pub use token::{Position, Range, Token, TokenKind, TokenPosition};
