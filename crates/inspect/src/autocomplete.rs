//! Keyword autocomplete: candidates come from the innermost enclosing
//! construct, then get narrowed by the trailing partial-keyword token.

use itertools::Itertools;
use pq_syntax::keyword::{KeywordKind, EXPRESSION_KEYWORDS};
use pq_syntax::node::{ConstantKind, NodeData};
use pq_syntax::{NodeIdMap, NodeKind, TokenKind, XorNode};

use crate::active_node::{ActiveNode, CursorRelation};

/// Keywords that can continue a finished expression, keyed off one-letter
/// prefixes (`a`, `i`, `m`, `o`).
const CONJUNCTION_KEYWORDS: &[KeywordKind] = &[
    KeywordKind::And,
    KeywordKind::As,
    KeywordKind::Is,
    KeywordKind::Meta,
    KeywordKind::Or,
];

/// The ordered set of keywords valid at the active node's position.
#[must_use]
pub fn autocomplete_keyword(
    node_id_map: &NodeIdMap,
    active_node: &ActiveNode,
) -> Vec<KeywordKind> {
    let mut candidates = dispatch(node_id_map, active_node);

    if let Some(trailing) = &active_node.maybe_trailing_token {
        if trailing.token.kind == TokenKind::Identifier {
            let prefix = trailing.text_under_cursor.as_str();
            candidates.retain(|keyword| keyword.as_str().starts_with(prefix));
        }
    }

    candidates.into_iter().sorted().dedup().collect()
}

fn dispatch(node_id_map: &NodeIdMap, active_node: &ActiveNode) -> Vec<KeywordKind> {
    for node in &active_node.ancestry {
        match node.kind() {
            NodeKind::ErrorHandlingExpression => {
                return error_handling_candidates(node_id_map, node, active_node);
            }
            NodeKind::LetExpression => {
                return let_candidates(active_node);
            }
            NodeKind::ListExpression
            | NodeKind::RecordExpression
            | NodeKind::InvokeExpression
            | NodeKind::ParenthesizedExpression => {
                return item_slot_candidates(active_node);
            }
            _ => {}
        }
    }

    // No construct claimed the position: expression starters before the
    // current node's tokens; past them only a trailing partial keyword can
    // still continue the finished expression.
    match active_node.relation {
        CursorRelation::Before => EXPRESSION_KEYWORDS.to_vec(),
        CursorRelation::After => trailing_conjunctions(active_node),
        _ => Vec::new(),
    }
}

/// Conjunction candidates after a complete expression, offered only when a
/// trailing partial keyword could be starting one.
fn trailing_conjunctions(active_node: &ActiveNode) -> Vec<KeywordKind> {
    if active_node.maybe_trailing_token.is_some() {
        CONJUNCTION_KEYWORDS.to_vec()
    } else {
        Vec::new()
    }
}

fn leaf_constant(active_node: &ActiveNode) -> Option<ConstantKind> {
    match active_node.leaf()?.as_ast()?.data {
        NodeData::Constant(constant) => Some(constant),
        _ => None,
    }
}

fn error_handling_candidates(
    node_id_map: &NodeIdMap,
    node: &XorNode,
    active_node: &ActiveNode,
) -> Vec<KeywordKind> {
    // On or before the `try` keyword itself.
    if leaf_constant(active_node) == Some(ConstantKind::Try)
        && active_node.relation != CursorRelation::After
    {
        return vec![KeywordKind::Try];
    }

    let has_otherwise = node_id_map
        .first_child_of_kind(node.id(), NodeKind::OtherwiseExpression)
        .is_some();
    if has_otherwise {
        return Vec::new();
    }

    // A complete protected expression with nothing (or a partial keyword)
    // trailing; a lone `o` could begin either `or` or `otherwise`.
    let mut candidates = vec![KeywordKind::Otherwise];
    if active_node.maybe_trailing_token.is_some() {
        candidates.push(KeywordKind::Or);
    }
    candidates
}

fn let_candidates(active_node: &ActiveNode) -> Vec<KeywordKind> {
    match leaf_constant(active_node) {
        // After `in` or after `=`: an empty expression slot.
        Some(ConstantKind::In | ConstantKind::Equal)
            if active_node.relation == CursorRelation::After =>
        {
            return EXPRESSION_KEYWORDS.to_vec();
        }
        // After a comma the next token is a variable name, not a keyword.
        Some(ConstantKind::Comma) => return Vec::new(),
        _ => {}
    }

    if active_node.relation == CursorRelation::After {
        // A complete value with no trailing comma also admits `in`, and a
        // trailing partial keyword may be continuing the value instead.
        let mut candidates = vec![KeywordKind::In];
        candidates.extend(trailing_conjunctions(active_node));
        return candidates;
    }

    Vec::new()
}

fn item_slot_candidates(active_node: &ActiveNode) -> Vec<KeywordKind> {
    match leaf_constant(active_node) {
        Some(
            ConstantKind::LeftBrace
            | ConstantKind::LeftBracket
            | ConstantKind::LeftParenthesis
            | ConstantKind::Comma
            | ConstantKind::Equal,
        ) if active_node.relation == CursorRelation::After => EXPRESSION_KEYWORDS.to_vec(),
        _ => match active_node.relation {
            CursorRelation::Before => EXPRESSION_KEYWORDS.to_vec(),
            // A complete item with a partial keyword trailing it.
            CursorRelation::After => trailing_conjunctions(active_node),
            _ => Vec::new(),
        },
    }
}
