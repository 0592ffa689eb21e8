//! The unified node model: closed AST nodes, still-open context nodes, and
//! the id-addressed XOR handle inspection traverses.

use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::token::TokenPosition;

/// Monotonic id assigned when a node is opened; stable for the lifetime of a
/// parse. Consumers hold ids, never references, so a partially built graph
/// has no ownership cycles.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Every grammar production that materializes as a node.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum NodeKind {
    ArithmeticExpression,
    ArrayWrapper,
    AsExpression,
    AsNullablePrimitiveType,
    AsType,
    Constant,
    Csv,
    EachExpression,
    EqualityExpression,
    ErrorHandlingExpression,
    ErrorRaisingExpression,
    FieldProjection,
    FieldSelector,
    FieldSpecification,
    FieldSpecificationList,
    FieldTypeSpecification,
    FunctionExpression,
    FunctionType,
    GeneralizedIdentifier,
    GeneralizedIdentifierPairedAnyLiteral,
    GeneralizedIdentifierPairedExpression,
    Identifier,
    IdentifierExpression,
    IdentifierPairedExpression,
    IfExpression,
    InvokeExpression,
    IsExpression,
    ItemAccessExpression,
    LetExpression,
    ListExpression,
    ListLiteral,
    ListType,
    LiteralExpression,
    LogicalExpression,
    MetadataExpression,
    NotImplementedExpression,
    NullCoalescingExpression,
    NullablePrimitiveType,
    NullableType,
    OtherwiseExpression,
    Parameter,
    ParameterList,
    ParenthesizedExpression,
    PrimitiveType,
    RangeExpression,
    RecordExpression,
    RecordLiteral,
    RecordType,
    RecursivePrimaryExpression,
    RelationalExpression,
    Section,
    SectionMember,
    TableType,
    TypePrimaryType,
    UnaryExpression,
}

impl NodeKind {
    /// Leaves carry token text and are the targets of active-node search.
    #[must_use]
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            NodeKind::Constant
                | NodeKind::GeneralizedIdentifier
                | NodeKind::Identifier
                | NodeKind::LiteralExpression
                | NodeKind::PrimitiveType
        )
    }
}

/// Constants are leaf nodes for keywords and punctuation that carry no data
/// beyond their spelling.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    IntoStaticStr,
)]
pub enum ConstantKind {
    #[strum(serialize = "&")]
    Ampersand,
    #[strum(serialize = "and")]
    And,
    #[strum(serialize = "as")]
    As,
    #[strum(serialize = "*")]
    Asterisk,
    #[strum(serialize = "@")]
    AtSign,
    #[strum(serialize = ",")]
    Comma,
    #[strum(serialize = "/")]
    Division,
    #[strum(serialize = "..")]
    DotDot,
    #[strum(serialize = "each")]
    Each,
    #[strum(serialize = "...")]
    Ellipsis,
    #[strum(serialize = "else")]
    Else,
    #[strum(serialize = "=")]
    Equal,
    #[strum(serialize = "error")]
    Error,
    #[strum(serialize = "=>")]
    FatArrow,
    #[strum(serialize = "function")]
    Function,
    #[strum(serialize = ">")]
    GreaterThan,
    #[strum(serialize = ">=")]
    GreaterThanEqualTo,
    #[strum(serialize = "if")]
    If,
    #[strum(serialize = "in")]
    In,
    #[strum(serialize = "is")]
    Is,
    #[strum(serialize = "{")]
    LeftBrace,
    #[strum(serialize = "[")]
    LeftBracket,
    #[strum(serialize = "(")]
    LeftParenthesis,
    #[strum(serialize = "<")]
    LessThan,
    #[strum(serialize = "<=")]
    LessThanEqualTo,
    #[strum(serialize = "let")]
    Let,
    #[strum(serialize = "meta")]
    Meta,
    #[strum(serialize = "-")]
    Minus,
    #[strum(serialize = "not")]
    Not,
    #[strum(serialize = "<>")]
    NotEqual,
    #[strum(serialize = "??")]
    NullCoalescing,
    #[strum(serialize = "nullable")]
    Nullable,
    #[strum(serialize = "optional")]
    Optional,
    #[strum(serialize = "or")]
    Or,
    #[strum(serialize = "otherwise")]
    Otherwise,
    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "?")]
    QuestionMark,
    #[strum(serialize = "}")]
    RightBrace,
    #[strum(serialize = "]")]
    RightBracket,
    #[strum(serialize = ")")]
    RightParenthesis,
    #[strum(serialize = "section")]
    Section,
    #[strum(serialize = ";")]
    Semicolon,
    #[strum(serialize = "shared")]
    Shared,
    #[strum(serialize = "table")]
    Table,
    #[strum(serialize = "then")]
    Then,
    #[strum(serialize = "try")]
    Try,
    #[strum(serialize = "type")]
    Type,
}

impl ConstantKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// The operator a binary-operator node folds over; also recorded as a
/// [`ConstantKind`] leaf child at attribute index 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Operator {
    Addition,
    And,
    As,
    Concatenation,
    Division,
    Equal,
    GreaterThan,
    GreaterThanEqualTo,
    Is,
    LessThan,
    LessThanEqualTo,
    Meta,
    Multiplication,
    NotEqual,
    NullCoalescing,
    Or,
    Subtraction,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum LiteralKind {
    Logical,
    Null,
    Numeric,
    Text,
}

/// The nineteen primitive type names of the type sub-language.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    IntoStaticStr,
    strum::EnumIter,
)]
pub enum PrimitiveTypeKind {
    #[strum(serialize = "action")]
    Action,
    #[strum(serialize = "any")]
    Any,
    #[strum(serialize = "anynonnull")]
    AnyNonNull,
    #[strum(serialize = "binary")]
    Binary,
    #[strum(serialize = "date")]
    Date,
    #[strum(serialize = "datetime")]
    DateTime,
    #[strum(serialize = "datetimezone")]
    DateTimeZone,
    #[strum(serialize = "duration")]
    Duration,
    #[strum(serialize = "function")]
    Function,
    #[strum(serialize = "list")]
    List,
    #[strum(serialize = "logical")]
    Logical,
    #[strum(serialize = "none")]
    None,
    #[strum(serialize = "null")]
    Null,
    #[strum(serialize = "number")]
    Number,
    #[strum(serialize = "record")]
    Record,
    #[strum(serialize = "table")]
    Table,
    #[strum(serialize = "text")]
    Text,
    #[strum(serialize = "time")]
    Time,
    #[strum(serialize = "type")]
    Type,
}

impl PrimitiveTypeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    #[must_use]
    pub fn from_text(text: &str) -> Option<Self> {
        use strum::IntoEnumIterator;
        Self::iter().find(|kind| kind.as_str() == text)
    }
}

/// Per-node payload; most nodes carry nothing beyond their children.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeData {
    #[default]
    None,
    Constant(ConstantKind),
    GeneralizedIdentifier(String),
    Identifier(String),
    Literal {
        kind: LiteralKind,
        text: String,
    },
    Operator(Operator),
    PrimitiveType(PrimitiveTypeKind),
}

/// The token span a closed node covers; `[start, end)` over the snapshot's
/// token indices, with the matching source positions cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRange {
    pub token_index_start: u32,
    pub token_index_end: u32,
    pub position_start: TokenPosition,
    pub position_end: TokenPosition,
}

/// A node that closed successfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AstNode {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Index of this node in its parent's ordered children; `None` for the
    /// root.
    pub attribute_index: Option<u32>,
    pub token_range: TokenRange,
    pub data: NodeData,
}

impl AstNode {
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.kind.is_leaf()
    }
}

/// A node that was opened but has not (yet) closed; the parser leaves these
/// behind when it unwinds on an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub attribute_index: Option<u32>,
    /// How many children have been attached so far; attribute indices are
    /// dense below this.
    pub attribute_counter: u32,
    pub token_index_start: u32,
    pub maybe_position_start: Option<TokenPosition>,
}

/// The uniform handle over both node flavors. All inspection APIs accept XOR
/// nodes so partial and complete syntax are interchangeable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum XorNode {
    Ast(AstNode),
    Context(ContextNode),
}

impl XorNode {
    #[must_use]
    pub fn id(&self) -> NodeId {
        match self {
            XorNode::Ast(node) => node.id,
            XorNode::Context(node) => node.id,
        }
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            XorNode::Ast(node) => node.kind,
            XorNode::Context(node) => node.kind,
        }
    }

    #[must_use]
    pub fn attribute_index(&self) -> Option<u32> {
        match self {
            XorNode::Ast(node) => node.attribute_index,
            XorNode::Context(node) => node.attribute_index,
        }
    }

    #[must_use]
    pub fn is_ast(&self) -> bool {
        matches!(self, XorNode::Ast(_))
    }

    #[must_use]
    pub fn as_ast(&self) -> Option<&AstNode> {
        match self {
            XorNode::Ast(node) => Some(node),
            XorNode::Context(_) => None,
        }
    }

    #[must_use]
    pub fn as_context(&self) -> Option<&ContextNode> {
        match self {
            XorNode::Ast(_) => None,
            XorNode::Context(node) => Some(node),
        }
    }
}
