//! The type model: a primitive-kind lattice with structural extensions, and
//! the any-union folding rule that keeps unions flat and deduplicated.

use enum_as_inner::EnumAsInner;
use pq_syntax::node::PrimitiveTypeKind;

use crate::IndexMap;

mod infer;

pub use infer::{try_type, TypeCache};

/// Power Query's primitive kinds plus the inspection-only markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeKind {
    Action,
    Any,
    AnyNonNull,
    Binary,
    Date,
    DateTime,
    DateTimeZone,
    Duration,
    Function,
    List,
    Logical,
    None,
    NotApplicable,
    Null,
    Number,
    Record,
    Table,
    Text,
    Time,
    Type,
    Unknown,
}

impl From<PrimitiveTypeKind> for TypeKind {
    fn from(kind: PrimitiveTypeKind) -> Self {
        match kind {
            PrimitiveTypeKind::Action => TypeKind::Action,
            PrimitiveTypeKind::Any => TypeKind::Any,
            PrimitiveTypeKind::AnyNonNull => TypeKind::AnyNonNull,
            PrimitiveTypeKind::Binary => TypeKind::Binary,
            PrimitiveTypeKind::Date => TypeKind::Date,
            PrimitiveTypeKind::DateTime => TypeKind::DateTime,
            PrimitiveTypeKind::DateTimeZone => TypeKind::DateTimeZone,
            PrimitiveTypeKind::Duration => TypeKind::Duration,
            PrimitiveTypeKind::Function => TypeKind::Function,
            PrimitiveTypeKind::List => TypeKind::List,
            PrimitiveTypeKind::Logical => TypeKind::Logical,
            PrimitiveTypeKind::None => TypeKind::None,
            PrimitiveTypeKind::Null => TypeKind::Null,
            PrimitiveTypeKind::Number => TypeKind::Number,
            PrimitiveTypeKind::Record => TypeKind::Record,
            PrimitiveTypeKind::Table => TypeKind::Table,
            PrimitiveTypeKind::Text => TypeKind::Text,
            PrimitiveTypeKind::Time => TypeKind::Time,
            PrimitiveTypeKind::Type => TypeKind::Type,
        }
    }
}

/// A type: primitive kind, nullability, and an optional structural
/// extension. Structural equality is the `union`/`equal` notion the folding
/// laws are defined over.
#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    pub kind: TypeKind,
    pub is_nullable: bool,
    pub extended: Option<ExtendedType>,
}

#[derive(Debug, Clone, PartialEq, EnumAsInner)]
pub enum ExtendedType {
    /// A flat union of structurally distinct member types.
    AnyUnion(Vec<Type>),
    DefinedFunction {
        parameters: Vec<FunctionParameter>,
        return_type: Box<Type>,
    },
    DefinedList(Vec<Type>),
    DefinedRecord {
        fields: IndexMap<String, Type>,
        is_open: bool,
    },
    DefinedTable {
        fields: IndexMap<String, Type>,
        is_open: bool,
    },
    FunctionType {
        parameters: Vec<FunctionParameter>,
        return_type: Box<Type>,
    },
    ListType(Box<Type>),
    LogicalLiteral(bool),
    NullableType(Box<Type>),
    NumberLiteral(String),
    RecordType {
        fields: IndexMap<String, Type>,
        is_open: bool,
    },
    TableType {
        fields: IndexMap<String, Type>,
        is_open: bool,
    },
    TextLiteral(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionParameter {
    pub name: String,
    pub is_optional: bool,
    pub is_nullable: bool,
    pub maybe_type: Option<TypeKind>,
}

impl Type {
    #[must_use]
    pub fn primitive(kind: TypeKind, is_nullable: bool) -> Self {
        Self {
            kind,
            is_nullable,
            extended: None,
        }
    }

    #[must_use]
    pub fn any() -> Self {
        Self::primitive(TypeKind::Any, true)
    }

    #[must_use]
    pub fn unknown() -> Self {
        Self::primitive(TypeKind::Unknown, false)
    }

    #[must_use]
    pub fn none() -> Self {
        Self::primitive(TypeKind::None, false)
    }

    #[must_use]
    pub fn not_applicable() -> Self {
        Self::primitive(TypeKind::NotApplicable, false)
    }

    #[must_use]
    pub fn null() -> Self {
        Self::primitive(TypeKind::Null, true)
    }

    #[must_use]
    pub fn logical() -> Self {
        Self::primitive(TypeKind::Logical, false)
    }

    #[must_use]
    pub fn number() -> Self {
        Self::primitive(TypeKind::Number, false)
    }

    #[must_use]
    pub fn text() -> Self {
        Self::primitive(TypeKind::Text, false)
    }

    #[must_use]
    pub fn with_nullability(mut self, is_nullable: bool) -> Self {
        self.is_nullable = is_nullable;
        self
    }

    /// The non-nullable projection used by `??`.
    #[must_use]
    pub fn non_nullable(self) -> Self {
        self.with_nullability(false)
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.kind == TypeKind::Unknown
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        self.kind == TypeKind::None
    }

    /// A bare `any` with no structure; dominates unions.
    #[must_use]
    pub fn is_plain_any(&self) -> bool {
        self.kind == TypeKind::Any && self.extended.is_none()
    }

    #[must_use]
    pub fn defined_list(elements: Vec<Type>) -> Self {
        Self {
            kind: TypeKind::List,
            is_nullable: false,
            extended: Some(ExtendedType::DefinedList(elements)),
        }
    }

    #[must_use]
    pub fn defined_record(fields: IndexMap<String, Type>, is_open: bool) -> Self {
        Self {
            kind: TypeKind::Record,
            is_nullable: false,
            extended: Some(ExtendedType::DefinedRecord { fields, is_open }),
        }
    }

    #[must_use]
    pub fn defined_table(fields: IndexMap<String, Type>, is_open: bool) -> Self {
        Self {
            kind: TypeKind::Table,
            is_nullable: false,
            extended: Some(ExtendedType::DefinedTable { fields, is_open }),
        }
    }

    #[must_use]
    pub fn defined_function(parameters: Vec<FunctionParameter>, return_type: Type) -> Self {
        Self {
            kind: TypeKind::Function,
            is_nullable: false,
            extended: Some(ExtendedType::DefinedFunction {
                parameters,
                return_type: Box::new(return_type),
            }),
        }
    }
}

/// Fold a collection of types into one.
///
/// Nested unions are flattened on construction, structural duplicates are
/// removed, a plain `any` member dominates, and a singleton collapses to its
/// only member, which makes the fold idempotent.
#[must_use]
pub fn any_union(types: Vec<Type>) -> Type {
    let mut members: Vec<Type> = Vec::new();
    for ty in types {
        match ty.extended {
            Some(ExtendedType::AnyUnion(inner)) => {
                for member in inner {
                    push_unique(&mut members, member);
                }
            }
            _ => push_unique(&mut members, ty),
        }
    }

    if members.iter().any(Type::is_plain_any) {
        return Type::any();
    }

    match members.len() {
        0 => Type::unknown(),
        1 => members.swap_remove(0),
        _ => {
            let is_nullable = members.iter().any(|member| member.is_nullable);
            Type {
                kind: TypeKind::Any,
                is_nullable,
                extended: Some(ExtendedType::AnyUnion(members)),
            }
        }
    }
}

fn push_unique(members: &mut Vec<Type>, ty: Type) {
    if !members.contains(&ty) {
        members.push(ty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_dedupes_structural_duplicates() {
        let folded = any_union(vec![Type::number(), Type::number(), Type::text()]);
        assert_eq!(
            folded.extended,
            Some(ExtendedType::AnyUnion(vec![Type::number(), Type::text()]))
        );
    }

    #[test]
    fn union_is_idempotent() {
        let once = any_union(vec![Type::number(), Type::text()]);
        let twice = any_union(vec![once.clone(), Type::text()]);
        assert_eq!(once, twice);
    }

    #[test]
    fn union_singleton_collapses() {
        assert_eq!(any_union(vec![Type::text(), Type::text()]), Type::text());
    }

    #[test]
    fn plain_any_dominates() {
        assert_eq!(any_union(vec![Type::number(), Type::any()]), Type::any());
    }

    #[test]
    fn members_are_never_nested_unions() {
        let inner = any_union(vec![Type::number(), Type::text()]);
        let folded = any_union(vec![inner, Type::logical()]);
        let members = folded.extended.unwrap().into_any_union().unwrap();
        assert!(members.iter().all(|member| {
            !matches!(member.extended, Some(ExtendedType::AnyUnion(_)))
        }));
        assert_eq!(members.len(), 3);
    }
}
