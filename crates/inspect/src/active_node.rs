//! Cursor queries: find the leaf the cursor touches, classify the relation,
//! and expose the ancestry plus any trailing partial-keyword token.

use std::cmp::Ordering;

use pq_syntax::node::AstNode;
use pq_syntax::{NodeIdMap, Position, Token, TokenKind, TokenPosition, XorNode};

/// Where the cursor sits relative to the chosen leaf's token range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorRelation {
    /// Strictly before the leaf's first code unit.
    Before,
    /// Exactly on the range's start or end boundary.
    On,
    /// Strictly inside the range.
    Inside,
    /// At or past the range's end.
    After,
}

/// An identifier-like token the cursor is on or just past, exposed so
/// autocomplete can filter candidates by prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct TrailingToken {
    pub token: Token,
    /// The token's data up to the cursor.
    pub text_under_cursor: String,
}

/// The innermost (or nearest) leaf under the cursor together with its
/// ancestry up to the document root.
#[derive(Debug, Clone)]
pub struct ActiveNode {
    pub position: Position,
    /// Leaf first, document root last; consecutive entries are parent-child
    /// edges in the node-id map.
    pub ancestry: Vec<XorNode>,
    pub relation: CursorRelation,
    pub maybe_trailing_token: Option<TrailingToken>,
}

impl ActiveNode {
    #[must_use]
    pub fn leaf(&self) -> Option<&XorNode> {
        self.ancestry.first()
    }
}

fn cmp_position(position: Position, token_position: TokenPosition) -> Ordering {
    (position.line_number, position.line_code_unit).cmp(&(
        token_position.line_number,
        token_position.line_code_unit,
    ))
}

/// Locate the active node for a cursor position.
///
/// The cursor snaps to the leaf containing it; between leaves it snaps to
/// the next leaf (`Before`), and at end of input to the rightmost leaf
/// (`After`). Empty input has no active node.
#[must_use]
pub fn active_node(
    node_id_map: &NodeIdMap,
    tokens: &[Token],
    position: Position,
) -> Option<ActiveNode> {
    let leaves: Vec<AstNode> = node_id_map
        .leaf_ids()
        .iter()
        .filter_map(|id| node_id_map.ast_node(*id).cloned())
        .collect();

    let containing = leaves.iter().find(|leaf| {
        cmp_position(position, leaf.token_range.position_start) != Ordering::Less
            && cmp_position(position, leaf.token_range.position_end) == Ordering::Less
    });

    let (leaf, relation) = if let Some(leaf) = containing {
        let relation = if cmp_position(position, leaf.token_range.position_start)
            == Ordering::Equal
        {
            CursorRelation::On
        } else {
            CursorRelation::Inside
        };
        (leaf.clone(), relation)
    } else if let Some(next) = leaves
        .iter()
        .filter(|leaf| cmp_position(position, leaf.token_range.position_start) == Ordering::Less)
        .min_by_key(|leaf| leaf.token_range.token_index_start)
    {
        (next.clone(), CursorRelation::Before)
    } else if let Some(previous) = leaves
        .iter()
        .filter(|leaf| cmp_position(position, leaf.token_range.position_end) != Ordering::Less)
        .max_by_key(|leaf| leaf.token_range.token_index_end)
    {
        (previous.clone(), CursorRelation::After)
    } else {
        return None;
    };

    Some(ActiveNode {
        position,
        ancestry: node_id_map.ancestry(leaf.id),
        relation,
        maybe_trailing_token: trailing_token(tokens, position),
    })
}

/// The last identifier-like token whose range the cursor is in or right at
/// the end of. Unconsumed tokens count too, which is what makes `try true o`
/// autocomplete work: `o` never became a leaf.
#[must_use]
pub fn trailing_token(tokens: &[Token], position: Position) -> Option<TrailingToken> {
    let token = tokens
        .iter()
        .rev()
        .find(|token| {
            cmp_position(position, token.position_start) == Ordering::Greater
                && cmp_position(position, token.position_end) != Ordering::Greater
        })?
        .clone();

    if token.kind != TokenKind::Identifier && !token.kind.is_keyword() {
        return None;
    }

    let text_under_cursor = if position.line_number == token.position_start.line_number
        && position.line_code_unit >= token.position_start.line_code_unit
    {
        let length = (position.line_code_unit - token.position_start.line_code_unit) as usize;
        token.data.get(..length).unwrap_or(&token.data).to_string()
    } else {
        token.data.clone()
    };

    Some(TrailingToken {
        token,
        text_under_cursor,
    })
}
