//! The parse state and its context discipline.
//!
//! Every production opens a context node before reading tokens and either
//! closes it (promoting it to an AST node with a fixed token range) or leaves
//! it open when an error unwinds past it. Pass-through productions delete
//! their unused wrapper, and left-folded chains interpose a fresh context
//! above an already-closed node.

use pq_common::{CommonError, Settings};

use crate::lexer::Snapshot;
use crate::node::{
    AstNode, ConstantKind, ContextNode, NodeData, NodeId, NodeKind, TokenRange,
};
use crate::node_id_map::NodeIdMap;
use crate::token::{Token, TokenKind, TokenPosition};

use super::error::ParseError;

pub struct ParseState<'a> {
    settings: &'a Settings,
    tokens: &'a [Token],
    text: &'a str,
    pub(crate) token_index: usize,
    pub(crate) node_id_map: NodeIdMap,
    open_nodes: Vec<NodeId>,
    next_id: u32,
}

impl<'a> ParseState<'a> {
    #[must_use]
    pub fn new(settings: &'a Settings, snapshot: &'a Snapshot) -> Self {
        Self {
            settings,
            tokens: &snapshot.tokens,
            text: &snapshot.text,
            token_index: 0,
            node_id_map: NodeIdMap::default(),
            open_nodes: Vec::new(),
            next_id: 1,
        }
    }

    /// The exact source slice between two token boundaries.
    #[must_use]
    pub(crate) fn text_between(&self, start: TokenPosition, end: TokenPosition) -> &'a str {
        &self.text[start.code_unit as usize..end.code_unit as usize]
    }

    #[must_use]
    pub fn into_node_id_map(self) -> NodeIdMap {
        self.node_id_map
    }

    pub(crate) fn check_cancel(&self) -> Result<(), ParseError> {
        self.settings.check_cancel().map_err(ParseError::Common)
    }

    #[must_use]
    pub(crate) fn maybe_current(&self) -> Option<&Token> {
        self.tokens.get(self.token_index)
    }

    #[must_use]
    pub(crate) fn current_kind(&self) -> Option<TokenKind> {
        self.maybe_current().map(|token| token.kind)
    }

    #[must_use]
    pub(crate) fn nth_kind(&self, n: usize) -> Option<TokenKind> {
        self.tokens.get(self.token_index + n).map(|token| token.kind)
    }

    #[must_use]
    pub(crate) fn remaining(&self) -> &[Token] {
        &self.tokens[self.token_index.min(self.tokens.len())..]
    }

    #[must_use]
    pub(crate) fn is_on(&self, kind: TokenKind) -> bool {
        self.current_kind() == Some(kind)
    }

    /// Contextual keywords (`optional`, `nullable`, `table`, `function`) lex
    /// as identifiers; they only become constants where the grammar says so.
    #[must_use]
    pub(crate) fn is_on_identifier_constant(&self, text: &str) -> bool {
        self.maybe_current()
            .map_or(false, |token| token.kind == TokenKind::Identifier && token.data == text)
    }

    #[must_use]
    pub(crate) fn current_position(&self) -> Option<TokenPosition> {
        self.maybe_current().map(|token| token.position_start)
    }

    pub(crate) fn read_token(&mut self, expected: TokenKind) -> Result<Token, ParseError> {
        match self.tokens.get(self.token_index) {
            Some(token) if token.kind == expected => {
                self.token_index += 1;
                Ok(token.clone())
            }
            other => Err(ParseError::ExpectedTokenKind {
                expected,
                found: other.map(|token| token.kind),
                position: other.map(|token| token.position_start),
            }),
        }
    }

    pub(crate) fn read_any_token(
        &mut self,
        expected: &'static [TokenKind],
    ) -> Result<Token, ParseError> {
        match self.tokens.get(self.token_index) {
            Some(token) if expected.contains(&token.kind) => {
                self.token_index += 1;
                Ok(token.clone())
            }
            other => Err(ParseError::ExpectedAnyTokenKind {
                expected,
                found: other.map(|token| token.kind),
                position: other.map(|token| token.position_start),
            }),
        }
    }
}

/// Context discipline.
impl ParseState<'_> {
    pub(crate) fn open_context(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;

        let parent = self.open_nodes.last().copied();
        let attribute_index = parent.and_then(|parent_id| {
            self.node_id_map.context_node_mut(parent_id).map(|parent| {
                let index = parent.attribute_counter;
                parent.attribute_counter += 1;
                index
            })
        });

        let node = ContextNode {
            id,
            kind,
            attribute_index,
            attribute_counter: 0,
            token_index_start: self.token_index as u32,
            maybe_position_start: self.current_position(),
        };
        self.node_id_map.insert_context(node, parent);
        self.open_nodes.push(id);
        id
    }

    /// Close the innermost open context, promoting it to an AST node whose
    /// token range spans everything read since it was opened.
    pub(crate) fn close_context(&mut self, data: NodeData) -> Result<NodeId, ParseError> {
        let id = self
            .open_nodes
            .pop()
            .ok_or_else(|| CommonError::invariant("closing a context with none open"))?;
        let context = self
            .node_id_map
            .context_node(id)
            .cloned()
            .ok_or_else(|| CommonError::invariant(format!("open node {id} is not a context")))?;

        let start = context.token_index_start as usize;
        let end = self.token_index;
        let (position_start, position_end) = if start < end {
            (
                self.tokens[start].position_start,
                self.tokens[end - 1].position_end,
            )
        } else {
            // A node that consumed no tokens, e.g. an empty array wrapper;
            // pin it to the position it was opened at.
            let position = self
                .tokens
                .get(start)
                .map(|token| token.position_start)
                .or_else(|| self.tokens.last().map(|token| token.position_end))
                .unwrap_or_default();
            (position, position)
        };

        let ast = AstNode {
            id,
            kind: context.kind,
            attribute_index: context.attribute_index,
            token_range: TokenRange {
                token_index_start: start as u32,
                token_index_end: end as u32,
                position_start,
                position_end,
            },
            data,
        };
        self.node_id_map.promote(ast);
        Ok(id)
    }

    /// Drop the innermost open context, promoting its lone child (if any)
    /// into the vacated slot. Used by pass-through productions that turned
    /// out not to need their wrapper.
    pub(crate) fn delete_context(&mut self) -> Result<Option<NodeId>, ParseError> {
        let id = self
            .open_nodes
            .pop()
            .ok_or_else(|| CommonError::invariant("deleting a context with none open"))?;
        let context = self
            .node_id_map
            .context_node(id)
            .cloned()
            .ok_or_else(|| CommonError::invariant(format!("open node {id} is not a context")))?;

        let child = self.node_id_map.children_ids(id).first().copied();
        let parent = self.node_id_map.parent_id(id);
        self.node_id_map.remove_context(id);

        match child {
            Some(child_id) => {
                self.node_id_map
                    .set_attribute_index(child_id, context.attribute_index);
            }
            None => {
                // Give the vacated attribute slot back so indices stay dense.
                if let Some(parent_context) =
                    parent.and_then(|parent_id| self.node_id_map.context_node_mut(parent_id))
                {
                    parent_context.attribute_counter -= 1;
                }
            }
        }

        Ok(child)
    }

    /// Interpose a fresh context between `child` and its parent, adopting the
    /// child as attribute 0. This is how left-folded binary-operator chains
    /// and recursive-primary chains grow after their head already closed.
    pub(crate) fn wrap_context(
        &mut self,
        kind: NodeKind,
        child: NodeId,
    ) -> Result<NodeId, ParseError> {
        let child_ast = self
            .node_id_map
            .ast_node(child)
            .cloned()
            .ok_or_else(|| CommonError::invariant(format!("wrapping unclosed node {child}")))?;

        let id = NodeId(self.next_id);
        self.next_id += 1;

        let node = ContextNode {
            id,
            kind,
            attribute_index: child_ast.attribute_index,
            attribute_counter: 1,
            token_index_start: child_ast.token_range.token_index_start,
            maybe_position_start: Some(child_ast.token_range.position_start),
        };
        self.node_id_map.insert_context(node, None);
        self.node_id_map.interpose(child, id);
        self.node_id_map.set_attribute_index(child, Some(0));
        self.open_nodes.push(id);
        Ok(id)
    }
}

/// Leaf helpers.
impl ParseState<'_> {
    pub(crate) fn read_constant(
        &mut self,
        token_kind: TokenKind,
        constant: ConstantKind,
    ) -> Result<NodeId, ParseError> {
        self.open_context(NodeKind::Constant);
        self.read_token(token_kind)?;
        self.close_context(NodeData::Constant(constant))
    }

    pub(crate) fn maybe_read_constant(
        &mut self,
        token_kind: TokenKind,
        constant: ConstantKind,
    ) -> Result<Option<NodeId>, ParseError> {
        if self.is_on(token_kind) {
            self.read_constant(token_kind, constant).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Read a contextual keyword spelled as an identifier token.
    pub(crate) fn read_identifier_constant(
        &mut self,
        text: &str,
        constant: ConstantKind,
    ) -> Result<NodeId, ParseError> {
        debug_assert_eq!(constant.as_str(), text);
        self.open_context(NodeKind::Constant);
        match self.maybe_current() {
            Some(token) if token.kind == TokenKind::Identifier && token.data == text => {
                self.token_index += 1;
                self.close_context(NodeData::Constant(constant))
            }
            other => Err(ParseError::ExpectedTokenKind {
                expected: TokenKind::Identifier,
                found: other.map(|token| token.kind),
                position: other.map(|token| token.position_start),
            }),
        }
    }

    pub(crate) fn maybe_read_identifier_constant(
        &mut self,
        text: &str,
        constant: ConstantKind,
    ) -> Result<Option<NodeId>, ParseError> {
        if self.is_on_identifier_constant(text) {
            self.read_identifier_constant(text, constant).map(Some)
        } else {
            Ok(None)
        }
    }

    pub(crate) fn read_identifier_leaf(&mut self) -> Result<NodeId, ParseError> {
        self.open_context(NodeKind::Identifier);
        let token = self.read_token(TokenKind::Identifier)?;
        self.close_context(NodeData::Identifier(token.data))
    }
}
