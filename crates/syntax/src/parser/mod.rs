//! The recursive-descent parser with partial-context retention.
//!
//! Parsing either yields a document root or the first error it hit; in both
//! cases the returned [`NodeIdMap`] holds every node that was opened, so a
//! failed parse still supports position-driven inspection.

use pq_common::Settings;

use crate::lexer::Snapshot;
use crate::node::NodeId;
use crate::node_id_map::NodeIdMap;

mod context;
pub mod error;
pub mod parsers;

pub use context::ParseState;
pub use error::{CsvContinuationKind, ParseError, SequenceKind};

/// The result of parsing: a root when the document parsed, the first error
/// otherwise, and the node graph either way.
#[derive(Debug, Clone)]
pub struct Parse {
    pub root: Option<NodeId>,
    pub node_id_map: NodeIdMap,
    pub error: Option<ParseError>,
}

impl Parse {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// The parsed root, or the error that stopped the parse.
    pub fn into_result(self) -> Result<(NodeId, NodeIdMap), (ParseError, NodeIdMap)> {
        match (self.root, self.error) {
            (Some(root), None) => Ok((root, self.node_id_map)),
            (_, Some(error)) => Err((error, self.node_id_map)),
            (None, None) => Err((
                ParseError::Common(pq_common::CommonError::invariant(
                    "parse finished without a root or an error",
                )),
                self.node_id_map,
            )),
        }
    }
}

/// Parse a snapshot into a document.
#[must_use]
pub fn parse(settings: &Settings, snapshot: &Snapshot) -> Parse {
    let mut state = ParseState::new(settings, snapshot);

    match parsers::read_document(&mut state) {
        Ok(root) => Parse {
            root: Some(root),
            node_id_map: state.into_node_id_map(),
            error: None,
        },
        Err(error) => {
            tracing::trace!(%error, "parse failed, keeping partial context");
            Parse {
                root: None,
                node_id_map: state.into_node_id_map(),
                error: Some(error),
            }
        }
    }
}
