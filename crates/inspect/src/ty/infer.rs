//! `typeOf` over the node graph: structural recursion dispatched on node
//! kind, guarded against reference cycles by a per-request resolving set.

use pq_common::CommonError;
use pq_syntax::node::{ConstantKind, LiteralKind, NodeData, NodeId, Operator, PrimitiveTypeKind};
use pq_syntax::{NodeIdMap, NodeKind, XorNode};
use tracing::instrument;

use crate::scope::{self, ScopeById, ScopeItem};
use crate::settings::{ExternalTypeRequest, InspectionSettings};
use crate::{HashMap, HashSet, IndexMap};

use super::{any_union, ExtendedType, FunctionParameter, Type, TypeKind};

/// Memoized inspection results; reusable across queries against the same
/// node-id map.
#[derive(Debug, Default)]
pub struct TypeCache {
    pub scopes: ScopeById,
    types: HashMap<NodeId, Type>,
}

/// Infer the type of `node_id`.
///
/// Inspection never fails on malformed input; missing structure yields
/// `Unknown` and contradictory structure yields `None`.
#[instrument(level = "trace", skip(settings, node_id_map, cache))]
pub fn try_type(
    settings: &InspectionSettings,
    node_id_map: &NodeIdMap,
    node_id: NodeId,
    cache: &mut TypeCache,
) -> Result<Type, CommonError> {
    InferState {
        settings,
        node_id_map,
        cache,
        resolving: HashSet::default(),
    }
    .infer(node_id)
}

struct InferState<'a, 'b> {
    settings: &'a InspectionSettings,
    node_id_map: &'a NodeIdMap,
    cache: &'b mut TypeCache,
    /// Ids whose values are currently being resolved; re-entering one means
    /// a reference cycle.
    resolving: HashSet<NodeId>,
}

impl InferState<'_, '_> {
    fn infer(&mut self, node_id: NodeId) -> Result<Type, CommonError> {
        self.settings.settings.check_cancel()?;

        if let Some(hit) = self.cache.types.get(&node_id) {
            return Ok(hit.clone());
        }

        let Some(node) = self.node_id_map.xor_node(node_id) else {
            return Ok(Type::unknown());
        };

        let ty = self.infer_xor(&node)?;

        // Results computed mid-resolution may depend on the cycle guard;
        // only settled results are memoized.
        if self.resolving.is_empty() {
            self.cache.types.insert(node_id, ty.clone());
        }
        Ok(ty)
    }

    fn infer_xor(&mut self, node: &XorNode) -> Result<Type, CommonError> {
        let id = node.id();
        match node.kind() {
            NodeKind::Constant => Ok(Type::not_applicable()),
            NodeKind::LiteralExpression => Ok(self.literal_type(node)),
            NodeKind::Identifier | NodeKind::GeneralizedIdentifier => {
                match self.node_id_map.parent_xor(id) {
                    Some(parent) if parent.kind() == NodeKind::IdentifierExpression => {
                        self.infer(parent.id())
                    }
                    _ => Ok(Type::unknown()),
                }
            }
            NodeKind::PrimitiveType
            | NodeKind::AsNullablePrimitiveType
            | NodeKind::NullablePrimitiveType => self.declared_primitive(node),
            NodeKind::IdentifierExpression => self.infer_identifier_expression(id),
            NodeKind::UnaryExpression => self.infer_unary(id),
            NodeKind::ArithmeticExpression
            | NodeKind::AsExpression
            | NodeKind::EqualityExpression
            | NodeKind::IsExpression
            | NodeKind::LogicalExpression
            | NodeKind::MetadataExpression
            | NodeKind::NullCoalescingExpression
            | NodeKind::RelationalExpression => self.infer_bin_op(node),
            NodeKind::IfExpression => self.infer_if(id),
            NodeKind::EachExpression => self.infer_each(id),
            NodeKind::FunctionExpression => self.infer_function(id),
            NodeKind::LetExpression => self.infer_child_or_unknown(id, 3),
            NodeKind::ParenthesizedExpression => self.infer_child_or_unknown(id, 1),
            NodeKind::Csv => self.infer_child_or_unknown(id, 0),
            NodeKind::ListExpression | NodeKind::ListLiteral => self.infer_list(id),
            NodeKind::RangeExpression => self.infer_range(id),
            NodeKind::RecordExpression | NodeKind::RecordLiteral => self.infer_record(id),
            NodeKind::RecursivePrimaryExpression => self.infer_recursive_primary(id),
            NodeKind::InvokeExpression
            | NodeKind::ItemAccessExpression
            | NodeKind::FieldSelector
            | NodeKind::FieldProjection => self.infer_chain_suffix(id),
            NodeKind::ErrorHandlingExpression => self.infer_error_handling(id),
            NodeKind::ErrorRaisingExpression | NodeKind::NotImplementedExpression => {
                Ok(Type::none())
            }
            NodeKind::TypePrimaryType => {
                let Some(primary) = self.child(id, 1) else {
                    return Ok(Type::unknown());
                };
                self.type_value(&primary)
            }
            NodeKind::AsType => match self.child(id, 1) {
                Some(inner) => self.denoted(&inner),
                None => Ok(Type::unknown()),
            },
            NodeKind::SectionMember => {
                match self
                    .node_id_map
                    .first_child_of_kind(id, NodeKind::Identifier)
                    .and_then(|key| scope::member_value_id(self.node_id_map, id, &key))
                {
                    Some(value) => self.infer(value),
                    None => Ok(Type::unknown()),
                }
            }
            NodeKind::Section => Ok(Type::not_applicable()),
            _ => Ok(Type::unknown()),
        }
    }

    // region: leaves

    fn literal_type(&self, node: &XorNode) -> Type {
        let Some(NodeData::Literal { kind, text }) = node.as_ast().map(|ast| &ast.data) else {
            return Type::unknown();
        };

        let refine = self.settings.refine_literals;
        match kind {
            LiteralKind::Null => Type::null(),
            LiteralKind::Logical => Type {
                kind: TypeKind::Logical,
                is_nullable: false,
                extended: refine.then(|| ExtendedType::LogicalLiteral(text.as_str() == "true")),
            },
            LiteralKind::Numeric => Type {
                kind: TypeKind::Number,
                is_nullable: false,
                extended: refine.then(|| ExtendedType::NumberLiteral(text.clone())),
            },
            LiteralKind::Text => Type {
                kind: TypeKind::Text,
                is_nullable: false,
                extended: refine.then(|| ExtendedType::TextLiteral(text.clone())),
            },
        }
    }

    /// The value type declared by a `[as] [nullable] <primitive>` node.
    fn declared_primitive(&mut self, node: &XorNode) -> Result<Type, CommonError> {
        match node.kind() {
            NodeKind::PrimitiveType => {
                let Some(NodeData::PrimitiveType(kind)) =
                    node.as_ast().map(|ast| &ast.data)
                else {
                    return Ok(Type::unknown());
                };
                Ok(primitive_value(*kind))
            }
            NodeKind::NullablePrimitiveType => {
                match self
                    .node_id_map
                    .first_child_of_kind(node.id(), NodeKind::PrimitiveType)
                {
                    Some(primitive) => {
                        Ok(self.declared_primitive(&primitive)?.with_nullability(true))
                    }
                    None => Ok(Type::unknown()),
                }
            }
            NodeKind::AsNullablePrimitiveType => match self.child(node.id(), 1) {
                Some(inner) => self.declared_primitive(&inner),
                None => Ok(Type::unknown()),
            },
            _ => Ok(Type::unknown()),
        }
    }

    // endregion

    // region: identifiers and scope

    fn infer_identifier_expression(&mut self, id: NodeId) -> Result<Type, CommonError> {
        let Some(name) = self
            .node_id_map
            .first_child_of_kind(id, NodeKind::Identifier)
            .and_then(|ident| scope::leaf_text(self.node_id_map, ident.id()))
        else {
            return Ok(Type::unknown());
        };

        let scope = scope::try_node_scope(
            self.settings,
            self.node_id_map,
            id,
            &mut self.cache.scopes,
        )?;

        match scope.get(&name) {
            Some(ScopeItem::KeyValuePair(item)) => {
                let maybe_value = item.maybe_value_id;
                self.resolve_binding(maybe_value)
            }
            Some(ScopeItem::SectionMember(item)) => {
                let maybe_value = item.maybe_value_id;
                self.resolve_binding(maybe_value)
            }
            Some(ScopeItem::Parameter(parameter)) => Ok(parameter_value_type(parameter)),
            Some(ScopeItem::Each(_) | ScopeItem::Undefined(_)) => Ok(Type::unknown()),
            None => Ok(self.external_value(&name)),
        }
    }

    fn resolve_binding(&mut self, maybe_value: Option<NodeId>) -> Result<Type, CommonError> {
        let Some(value) = maybe_value else {
            return Ok(Type::unknown());
        };
        if !self.resolving.insert(value) {
            // A binding that (transitively) references itself.
            return Ok(Type::unknown());
        }
        let result = self.infer(value);
        self.resolving.remove(&value);
        result
    }

    fn external_value(&self, name: &str) -> Type {
        self.resolve_external(&ExternalTypeRequest::Value {
            literal: name.to_string(),
        })
    }

    fn resolve_external(&self, request: &ExternalTypeRequest) -> Type {
        match &self.settings.maybe_external_type_resolver {
            Some(resolver) => resolver(request).unwrap_or_else(Type::unknown),
            None => Type::unknown(),
        }
    }

    // endregion

    // region: operators

    fn infer_unary(&mut self, id: NodeId) -> Result<Type, CommonError> {
        let operators: Vec<ConstantKind> = match self.child(id, 0) {
            Some(wrapper) => self
                .node_id_map
                .children_ids(wrapper.id())
                .iter()
                .filter_map(|child| self.node_id_map.ast_node(*child))
                .filter_map(|ast| match ast.data {
                    NodeData::Constant(constant) => Some(constant),
                    _ => None,
                })
                .collect(),
            None => Vec::new(),
        };

        let mut ty = match self.child(id, 1) {
            Some(operand) => self.infer(operand.id())?,
            None => Type::unknown(),
        };

        for op in operators.iter().rev() {
            if ty.is_unknown() {
                return Ok(ty);
            }
            ty = match op {
                ConstantKind::Not => match ty.kind {
                    TypeKind::Logical => {
                        let extended = match ty.extended {
                            Some(ExtendedType::LogicalLiteral(value)) => {
                                Some(ExtendedType::LogicalLiteral(!value))
                            }
                            other => other,
                        };
                        Type {
                            kind: TypeKind::Logical,
                            is_nullable: ty.is_nullable,
                            extended,
                        }
                    }
                    _ => Type::none(),
                },
                ConstantKind::Minus => match ty.kind {
                    TypeKind::Number => {
                        let extended = match ty.extended {
                            Some(ExtendedType::NumberLiteral(text)) => {
                                Some(ExtendedType::NumberLiteral(negate_literal(&text)))
                            }
                            other => other,
                        };
                        Type {
                            kind: TypeKind::Number,
                            is_nullable: ty.is_nullable,
                            extended,
                        }
                    }
                    _ => Type::none(),
                },
                ConstantKind::Plus => match ty.kind {
                    TypeKind::Number => ty,
                    _ => Type::none(),
                },
                _ => Type::unknown(),
            };
        }

        Ok(ty)
    }

    fn infer_bin_op(&mut self, node: &XorNode) -> Result<Type, CommonError> {
        let Some(NodeData::Operator(op)) = node.as_ast().map(|ast| &ast.data) else {
            // A binop context that never closed has no recorded operator.
            return Ok(Type::unknown());
        };
        let op = *op;
        let id = node.id();

        let left = match self.child(id, 0) {
            Some(left) => self.infer(left.id())?,
            None => Type::unknown(),
        };

        if op == Operator::Meta {
            return Ok(left);
        }
        if op == Operator::Is {
            return Ok(Type::logical());
        }

        let right_node = self.child(id, 2);
        if op == Operator::As {
            return match right_node {
                Some(right) => self.declared_primitive(&right),
                None => Ok(Type::unknown()),
            };
        }

        let right = match right_node {
            Some(right) => self.infer(right.id())?,
            None => Type::unknown(),
        };

        Ok(match op {
            Operator::NullCoalescing => any_union(vec![left.non_nullable(), right]),
            Operator::And | Operator::Or => logical_op(&left, &right),
            Operator::Equal | Operator::NotEqual => equality_op(&left, &right),
            Operator::LessThan
            | Operator::LessThanEqualTo
            | Operator::GreaterThan
            | Operator::GreaterThanEqualTo => relational_op(&left, &right),
            Operator::Addition
            | Operator::Subtraction
            | Operator::Multiplication
            | Operator::Division => arithmetic_op(op, &left, &right),
            Operator::Concatenation => concatenation_op(&left, &right),
            Operator::As | Operator::Is | Operator::Meta => Type::unknown(),
        })
    }

    // endregion

    // region: structured expressions

    fn infer_if(&mut self, id: NodeId) -> Result<Type, CommonError> {
        let condition = match self.child(id, 1) {
            Some(condition) => self.infer(condition.id())?,
            None => Type::unknown(),
        };
        match condition.kind {
            TypeKind::Logical | TypeKind::Any => {}
            TypeKind::Unknown => return Ok(Type::unknown()),
            _ => return Ok(Type::none()),
        }

        let then_type = self.infer_child_or_unknown(id, 3)?;
        let else_type = self.infer_child_or_unknown(id, 5)?;
        Ok(any_union(vec![then_type, else_type]))
    }

    fn infer_each(&mut self, id: NodeId) -> Result<Type, CommonError> {
        let body = self.infer_child_or_unknown(id, 1)?;
        Ok(Type::defined_function(
            vec![FunctionParameter {
                name: "_".to_string(),
                is_optional: false,
                is_nullable: true,
                maybe_type: None,
            }],
            body,
        ))
    }

    fn infer_function(&mut self, id: NodeId) -> Result<Type, CommonError> {
        let parameters = match self
            .node_id_map
            .first_child_of_kind(id, NodeKind::ParameterList)
        {
            Some(list) => scope::parameters_of(self.node_id_map, list.id())
                .into_iter()
                .map(|(name, item)| FunctionParameter {
                    name,
                    is_optional: item.is_optional,
                    is_nullable: item.is_nullable,
                    maybe_type: item.maybe_type.map(TypeKind::from),
                })
                .collect(),
            None => Vec::new(),
        };

        let return_type = match self
            .node_id_map
            .first_child_of_kind(id, NodeKind::AsNullablePrimitiveType)
        {
            Some(annotation) => self.declared_primitive(&annotation)?,
            None => {
                let body = self
                    .node_id_map
                    .children_ids(id)
                    .last()
                    .copied()
                    .and_then(|child| self.node_id_map.xor_node(child))
                    .filter(|child| child.kind() != NodeKind::Constant);
                match body {
                    Some(body) => self.infer(body.id())?,
                    None => Type::unknown(),
                }
            }
        };

        Ok(Type::defined_function(parameters, return_type))
    }

    fn infer_list(&mut self, id: NodeId) -> Result<Type, CommonError> {
        let mut elements = Vec::new();
        if let Some(wrapper) = self.child_of_kind(id, NodeKind::ArrayWrapper) {
            for csv in self.node_id_map.children_ids(wrapper.id()).to_vec() {
                let Some(item) = self.child(csv, 0) else { continue };
                elements.push(self.infer(item.id())?);
            }
        }
        Ok(Type::defined_list(elements))
    }

    fn infer_range(&mut self, id: NodeId) -> Result<Type, CommonError> {
        let left = self.infer_child_or_unknown(id, 0)?;
        let right = self.infer_child_or_unknown(id, 2)?;
        if left.is_unknown() || right.is_unknown() {
            return Ok(Type::unknown());
        }
        if left.kind == TypeKind::Number && right.kind == TypeKind::Number {
            return Ok(Type::number());
        }
        Ok(Type::none())
    }

    fn infer_record(&mut self, id: NodeId) -> Result<Type, CommonError> {
        let mut fields: IndexMap<String, Type> = IndexMap::default();
        if let Some(wrapper) = self.child_of_kind(id, NodeKind::ArrayWrapper) {
            for csv in self.node_id_map.children_ids(wrapper.id()).to_vec() {
                let Some(pair) = self.child(csv, 0) else { continue };
                let Some(key) = self.child(pair.id(), 0) else { continue };
                let Some(name) = scope::leaf_text(self.node_id_map, key.id()) else {
                    continue;
                };
                let value = self.infer_child_or_unknown(pair.id(), 2)?;
                fields.insert(name, value);
            }
        }
        Ok(Type::defined_record(fields, false))
    }

    fn infer_error_handling(&mut self, id: NodeId) -> Result<Type, CommonError> {
        let protected = self.infer_child_or_unknown(id, 1)?;

        match self.child_of_kind(id, NodeKind::OtherwiseExpression) {
            Some(otherwise) => {
                let fallback = self.infer_child_or_unknown(otherwise.id(), 1)?;
                Ok(any_union(vec![protected, fallback]))
            }
            None => {
                let mut fields: IndexMap<String, Type> = IndexMap::default();
                fields.insert("HasError".to_string(), Type::logical());
                fields.insert("Value".to_string(), protected);
                fields.insert(
                    "Error".to_string(),
                    Type::primitive(TypeKind::Record, false),
                );
                Ok(Type::defined_record(fields, false))
            }
        }
    }

    // endregion

    // region: recursive-primary chains

    fn infer_recursive_primary(&mut self, id: NodeId) -> Result<Type, CommonError> {
        let (Some(head), Some(wrapper)) = (self.child(id, 0), self.child(id, 1)) else {
            return Ok(Type::unknown());
        };

        let head_name = self.head_identifier_name(&head);
        let mut ty = self.infer(head.id())?;
        for (index, suffix) in self
            .node_id_map
            .children_ids(wrapper.id())
            .to_vec()
            .into_iter()
            .enumerate()
        {
            let hint = if index == 0 { head_name.as_deref() } else { None };
            ty = self.apply_suffix(ty, suffix, hint)?;
        }
        Ok(ty)
    }

    /// Type a chain suffix on its own by folding the chain up to it; a
    /// suffix outside any chain (a standalone field selector) works on the
    /// implicit `each` target, which inspection does not know the shape of.
    fn infer_chain_suffix(&mut self, id: NodeId) -> Result<Type, CommonError> {
        let chain = self
            .node_id_map
            .parent_xor(id)
            .filter(|wrapper| wrapper.kind() == NodeKind::ArrayWrapper)
            .and_then(|wrapper| {
                let rpe = self.node_id_map.parent_xor(wrapper.id())?;
                (rpe.kind() == NodeKind::RecursivePrimaryExpression)
                    .then_some((wrapper.id(), rpe.id()))
            });

        let Some((wrapper_id, rpe_id)) = chain else {
            return self.apply_suffix(Type::unknown(), id, None);
        };

        let Some(head) = self.child(rpe_id, 0) else {
            return Ok(Type::unknown());
        };
        let head_name = self.head_identifier_name(&head);
        let mut ty = self.infer(head.id())?;
        for (index, suffix) in self
            .node_id_map
            .children_ids(wrapper_id)
            .to_vec()
            .into_iter()
            .enumerate()
        {
            let hint = if index == 0 { head_name.as_deref() } else { None };
            ty = self.apply_suffix(ty, suffix, hint)?;
            if suffix == id {
                break;
            }
        }
        Ok(ty)
    }

    /// The head's identifier literal, used for external invocation requests
    /// when the name is not bound in source.
    fn head_identifier_name(&self, head: &XorNode) -> Option<String> {
        if head.kind() != NodeKind::IdentifierExpression {
            return None;
        }
        self.node_id_map
            .first_child_of_kind(head.id(), NodeKind::Identifier)
            .and_then(|ident| scope::leaf_text(self.node_id_map, ident.id()))
    }

    fn apply_suffix(
        &mut self,
        base: Type,
        suffix_id: NodeId,
        head_name: Option<&str>,
    ) -> Result<Type, CommonError> {
        let Some(suffix) = self.node_id_map.xor_node(suffix_id) else {
            return Ok(Type::unknown());
        };

        match suffix.kind() {
            NodeKind::InvokeExpression => self.apply_invoke(base, suffix_id, head_name),
            NodeKind::ItemAccessExpression => Ok(self.apply_item_access(&base, suffix_id)),
            NodeKind::FieldSelector => Ok(self.apply_field_selector(&base, suffix_id)),
            NodeKind::FieldProjection => Ok(self.apply_field_projection(&base, suffix_id)),
            _ => Ok(Type::unknown()),
        }
    }

    fn apply_invoke(
        &mut self,
        callee: Type,
        invoke_id: NodeId,
        head_name: Option<&str>,
    ) -> Result<Type, CommonError> {
        let mut args = Vec::new();
        if let Some(wrapper) = self.child_of_kind(invoke_id, NodeKind::ArrayWrapper) {
            for csv in self.node_id_map.children_ids(wrapper.id()).to_vec() {
                let Some(item) = self.child(csv, 0) else { continue };
                args.push(self.infer(item.id())?);
            }
        }

        if callee.is_unknown() {
            if let Some(name) = head_name {
                return Ok(self.resolve_external(&ExternalTypeRequest::Invocation {
                    literal: name.to_string(),
                    args,
                }));
            }
            return Ok(Type::unknown());
        }

        if let Some(ExtendedType::DefinedFunction {
            parameters,
            return_type,
        }) = &callee.extended
        {
            let required = parameters
                .iter()
                .filter(|parameter| !parameter.is_optional)
                .count();
            if args.len() < required || args.len() > parameters.len() {
                return Ok(Type::none());
            }
            for (arg, parameter) in args.iter().zip(parameters) {
                let Some(expected) = parameter.maybe_type else {
                    continue;
                };
                let compatible = arg.kind == expected
                    || matches!(arg.kind, TypeKind::Any | TypeKind::Unknown)
                    || expected == TypeKind::Any
                    || (arg.kind == TypeKind::Null && parameter.is_nullable);
                if !compatible {
                    return Ok(Type::none());
                }
            }
            return Ok((**return_type).clone());
        }

        Ok(match callee.kind {
            TypeKind::Function | TypeKind::Any => Type::any(),
            _ => Type::none(),
        })
    }

    fn apply_item_access(&mut self, base: &Type, access_id: NodeId) -> Type {
        let optional = scope::has_constant(self.node_id_map, access_id, ConstantKind::QuestionMark);

        if base.is_unknown() {
            return Type::unknown();
        }
        let ty = match &base.extended {
            Some(ExtendedType::DefinedList(elements)) => any_union(elements.clone()),
            _ => match base.kind {
                TypeKind::List | TypeKind::Any => Type::any(),
                _ => return Type::none(),
            },
        };
        if optional {
            ty.with_nullability(true)
        } else {
            ty
        }
    }

    fn apply_field_selector(&mut self, base: &Type, selector_id: NodeId) -> Type {
        let Some(name) = self
            .node_id_map
            .first_child_of_kind(selector_id, NodeKind::GeneralizedIdentifier)
            .and_then(|key| scope::leaf_text(self.node_id_map, key.id()))
        else {
            return Type::unknown();
        };
        let optional =
            scope::has_constant(self.node_id_map, selector_id, ConstantKind::QuestionMark);

        if base.is_unknown() {
            return Type::unknown();
        }
        match &base.extended {
            Some(
                ExtendedType::DefinedRecord { fields, is_open }
                | ExtendedType::DefinedTable { fields, is_open },
            ) => match fields.get(&name) {
                Some(field) => field.clone(),
                None if *is_open => Type::any(),
                None if optional => Type::null(),
                None => Type::none(),
            },
            _ => match base.kind {
                TypeKind::Record | TypeKind::Table | TypeKind::Any => Type::any(),
                _ => Type::none(),
            },
        }
    }

    fn apply_field_projection(&mut self, base: &Type, projection_id: NodeId) -> Type {
        let optional =
            scope::has_constant(self.node_id_map, projection_id, ConstantKind::QuestionMark);
        let names = self.projection_names(projection_id);

        if base.is_unknown() {
            return Type::unknown();
        }

        let subset = |fields: &IndexMap<String, Type>| -> Option<IndexMap<String, Type>> {
            let mut projected: IndexMap<String, Type> = IndexMap::default();
            for name in &names {
                match fields.get(name) {
                    Some(field) => {
                        projected.insert(name.clone(), field.clone());
                    }
                    None if optional => {
                        projected.insert(name.clone(), Type::null());
                    }
                    None => return None,
                }
            }
            Some(projected)
        };

        let any_fields = || -> IndexMap<String, Type> {
            names
                .iter()
                .map(|name| (name.clone(), Type::any()))
                .collect()
        };

        match &base.extended {
            Some(ExtendedType::DefinedRecord { fields, .. }) => match subset(fields) {
                Some(projected) => Type::defined_record(projected, false),
                None => Type::none(),
            },
            Some(ExtendedType::DefinedTable { fields, .. }) => match subset(fields) {
                Some(projected) => Type::defined_table(projected, false),
                None => Type::none(),
            },
            _ => match base.kind {
                TypeKind::Record => Type::defined_record(any_fields(), false),
                TypeKind::Table => Type::defined_table(any_fields(), false),
                TypeKind::Any => any_union(vec![
                    Type::defined_record(any_fields(), false),
                    Type::defined_table(any_fields(), false),
                ]),
                _ => Type::none(),
            },
        }
    }

    fn projection_names(&self, projection_id: NodeId) -> Vec<String> {
        let Some(wrapper) = self.child_of_kind(projection_id, NodeKind::ArrayWrapper) else {
            return Vec::new();
        };
        self.node_id_map
            .children_ids(wrapper.id())
            .iter()
            .filter_map(|csv| self.child(*csv, 0))
            .filter(|selector| selector.kind() == NodeKind::FieldSelector)
            .filter_map(|selector| {
                self.node_id_map
                    .first_child_of_kind(selector.id(), NodeKind::GeneralizedIdentifier)
            })
            .filter_map(|key| scope::leaf_text(self.node_id_map, key.id()))
            .collect()
    }

    // endregion

    // region: the type sub-language as values

    /// The type value a `type <primary-type>` expression evaluates to.
    fn type_value(&mut self, node: &XorNode) -> Result<Type, CommonError> {
        let id = node.id();
        Ok(match node.kind() {
            NodeKind::PrimitiveType => Type::primitive(TypeKind::Type, false),
            NodeKind::RecordType => {
                let (fields, is_open) = self.field_specification_fields(id)?;
                Type {
                    kind: TypeKind::Type,
                    is_nullable: false,
                    extended: Some(ExtendedType::RecordType { fields, is_open }),
                }
            }
            NodeKind::TableType => match self.child_of_kind(id, NodeKind::FieldSpecificationList)
            {
                Some(_) => {
                    let (fields, is_open) = self.field_specification_fields(id)?;
                    Type {
                        kind: TypeKind::Type,
                        is_nullable: false,
                        extended: Some(ExtendedType::TableType { fields, is_open }),
                    }
                }
                None => Type::primitive(TypeKind::Type, false),
            },
            NodeKind::ListType => {
                let item = match self.child(id, 1) {
                    Some(item) => self.denoted(&item)?,
                    None => Type::unknown(),
                };
                Type {
                    kind: TypeKind::Type,
                    is_nullable: false,
                    extended: Some(ExtendedType::ListType(Box::new(item))),
                }
            }
            NodeKind::FunctionType => {
                let (parameters, return_type) = self.function_type_parts(id)?;
                Type {
                    kind: TypeKind::Type,
                    is_nullable: false,
                    extended: Some(ExtendedType::FunctionType {
                        parameters,
                        return_type: Box::new(return_type),
                    }),
                }
            }
            NodeKind::NullableType => {
                let inner = match self.child(id, 1) {
                    Some(inner) => self.denoted(&inner)?,
                    None => Type::unknown(),
                };
                Type {
                    kind: TypeKind::Type,
                    is_nullable: false,
                    extended: Some(ExtendedType::NullableType(Box::new(inner))),
                }
            }
            _ => Type::unknown(),
        })
    }

    /// The value-level reading of a primary-type node: what values of this
    /// type look like. Field types inside record/table types read this way.
    fn denoted(&mut self, node: &XorNode) -> Result<Type, CommonError> {
        let id = node.id();
        Ok(match node.kind() {
            NodeKind::PrimitiveType => match node.as_ast().map(|ast| &ast.data) {
                Some(NodeData::PrimitiveType(kind)) => primitive_value(*kind),
                _ => Type::unknown(),
            },
            NodeKind::NullableType => match self.child(id, 1) {
                Some(inner) => self.denoted(&inner)?.with_nullability(true),
                None => Type::unknown(),
            },
            NodeKind::RecordType => {
                let (fields, is_open) = self.field_specification_fields(id)?;
                Type {
                    kind: TypeKind::Record,
                    is_nullable: false,
                    extended: Some(ExtendedType::DefinedRecord { fields, is_open }),
                }
            }
            NodeKind::TableType => match self.child_of_kind(id, NodeKind::FieldSpecificationList)
            {
                Some(_) => {
                    let (fields, is_open) = self.field_specification_fields(id)?;
                    Type {
                        kind: TypeKind::Table,
                        is_nullable: false,
                        extended: Some(ExtendedType::DefinedTable { fields, is_open }),
                    }
                }
                None => Type::primitive(TypeKind::Table, false),
            },
            NodeKind::ListType => {
                let item = match self.child(id, 1) {
                    Some(item) => self.denoted(&item)?,
                    None => Type::unknown(),
                };
                Type {
                    kind: TypeKind::List,
                    is_nullable: false,
                    extended: Some(ExtendedType::ListType(Box::new(item))),
                }
            }
            NodeKind::FunctionType => {
                let (parameters, return_type) = self.function_type_parts(id)?;
                Type::defined_function(parameters, return_type)
            }
            _ => Type::unknown(),
        })
    }

    fn function_type_parts(
        &mut self,
        id: NodeId,
    ) -> Result<(Vec<FunctionParameter>, Type), CommonError> {
        let parameters = match self.child_of_kind(id, NodeKind::ParameterList) {
            Some(list) => scope::parameters_of(self.node_id_map, list.id())
                .into_iter()
                .map(|(name, item)| FunctionParameter {
                    name,
                    is_optional: item.is_optional,
                    is_nullable: item.is_nullable,
                    maybe_type: item.maybe_type.map(TypeKind::from),
                })
                .collect(),
            None => Vec::new(),
        };

        let return_type = match self.child_of_kind(id, NodeKind::AsType) {
            Some(as_type) => match self.child(as_type.id(), 1) {
                Some(inner) => self.denoted(&inner)?,
                None => Type::unknown(),
            },
            None => Type::unknown(),
        };

        Ok((parameters, return_type))
    }

    /// Field names and denoted field types of the field-specification list
    /// under `parent_id`, plus whether the record/table type is open.
    fn field_specification_fields(
        &mut self,
        parent_id: NodeId,
    ) -> Result<(IndexMap<String, Type>, bool), CommonError> {
        let Some(list) = self.child_of_kind(parent_id, NodeKind::FieldSpecificationList) else {
            return Ok((IndexMap::default(), false));
        };
        let list_id = list.id();
        let is_open = scope::has_constant(self.node_id_map, list_id, ConstantKind::Ellipsis);

        let mut fields: IndexMap<String, Type> = IndexMap::default();
        if let Some(wrapper) = self.child_of_kind(list_id, NodeKind::ArrayWrapper) {
            for csv in self.node_id_map.children_ids(wrapper.id()).to_vec() {
                let Some(spec) = self
                    .node_id_map
                    .first_child_of_kind(csv, NodeKind::FieldSpecification)
                else {
                    continue;
                };
                let Some(name) = self
                    .node_id_map
                    .first_child_of_kind(spec.id(), NodeKind::GeneralizedIdentifier)
                    .and_then(|key| scope::leaf_text(self.node_id_map, key.id()))
                else {
                    continue;
                };

                let field_type = match self
                    .node_id_map
                    .first_child_of_kind(spec.id(), NodeKind::FieldTypeSpecification)
                {
                    Some(spec_type) => match self.child(spec_type.id(), 1) {
                        Some(inner) => self.denoted(&inner)?,
                        None => Type::any(),
                    },
                    None => Type::any(),
                };
                fields.insert(name, field_type);
            }
        }

        Ok((fields, is_open))
    }

    // endregion

    // region: small helpers

    fn child(&self, id: NodeId, attribute_index: u32) -> Option<XorNode> {
        self.node_id_map
            .child_by_attribute_index(id, attribute_index, None)
    }

    fn child_of_kind(&self, id: NodeId, kind: NodeKind) -> Option<XorNode> {
        self.node_id_map.first_child_of_kind(id, kind)
    }

    fn infer_child_or_unknown(
        &mut self,
        id: NodeId,
        attribute_index: u32,
    ) -> Result<Type, CommonError> {
        match self.child(id, attribute_index) {
            Some(child) => self.infer(child.id()),
            None => Ok(Type::unknown()),
        }
    }

    // endregion
}

fn primitive_value(kind: PrimitiveTypeKind) -> Type {
    Type::primitive(kind.into(), kind == PrimitiveTypeKind::Null)
}

fn parameter_value_type(parameter: &crate::scope::ParameterScopeItem) -> Type {
    match parameter.maybe_type {
        Some(kind) => Type::primitive(kind.into(), parameter.is_nullable),
        None => Type::any(),
    }
}

fn negate_literal(text: &str) -> String {
    match text.strip_prefix('-') {
        Some(positive) => positive.to_string(),
        None => format!("-{text}"),
    }
}

fn logical_op(left: &Type, right: &Type) -> Type {
    if left.is_unknown() || right.is_unknown() {
        return Type::unknown();
    }
    let logicalish =
        |ty: &Type| matches!(ty.kind, TypeKind::Logical | TypeKind::Any);
    if logicalish(left) && logicalish(right) {
        Type::logical()
    } else {
        Type::none()
    }
}

fn equality_op(left: &Type, right: &Type) -> Type {
    if left.is_unknown() || right.is_unknown() {
        return Type::unknown();
    }
    if left.kind == right.kind
        || left.kind == TypeKind::Any
        || right.kind == TypeKind::Any
        || left.kind == TypeKind::Null
        || right.kind == TypeKind::Null
    {
        Type::logical()
    } else {
        Type::none()
    }
}

const ORDERABLE: &[TypeKind] = &[
    TypeKind::Date,
    TypeKind::DateTime,
    TypeKind::DateTimeZone,
    TypeKind::Duration,
    TypeKind::Logical,
    TypeKind::Number,
    TypeKind::Text,
    TypeKind::Time,
];

fn relational_op(left: &Type, right: &Type) -> Type {
    if left.is_unknown() || right.is_unknown() {
        return Type::unknown();
    }
    if left.kind == TypeKind::Any || right.kind == TypeKind::Any {
        return Type::logical();
    }
    if left.kind == right.kind && ORDERABLE.contains(&left.kind) {
        Type::logical()
    } else {
        Type::none()
    }
}

const DATE_LIKE: &[TypeKind] = &[
    TypeKind::Date,
    TypeKind::DateTime,
    TypeKind::DateTimeZone,
    TypeKind::Time,
];

fn arithmetic_op(op: Operator, left: &Type, right: &Type) -> Type {
    if left.is_unknown() || right.is_unknown() {
        return Type::unknown();
    }
    if left.kind == TypeKind::Any || right.kind == TypeKind::Any {
        return Type::any();
    }

    let (l, r) = (left.kind, right.kind);
    let number = l == TypeKind::Number && r == TypeKind::Number;

    match op {
        Operator::Addition => {
            if number {
                Type::number()
            } else if DATE_LIKE.contains(&l) && r == TypeKind::Duration {
                Type::primitive(l, false)
            } else if l == TypeKind::Duration && DATE_LIKE.contains(&r) {
                Type::primitive(r, false)
            } else if l == TypeKind::Duration && r == TypeKind::Duration {
                Type::primitive(TypeKind::Duration, false)
            } else {
                Type::none()
            }
        }
        Operator::Subtraction => {
            if number {
                Type::number()
            } else if DATE_LIKE.contains(&l) && r == TypeKind::Duration {
                Type::primitive(l, false)
            } else if l == TypeKind::Duration && r == TypeKind::Duration {
                Type::primitive(TypeKind::Duration, false)
            } else if DATE_LIKE.contains(&l) && l == r {
                Type::primitive(TypeKind::Duration, false)
            } else {
                Type::none()
            }
        }
        Operator::Multiplication => {
            if number {
                Type::number()
            } else if (l == TypeKind::Duration && r == TypeKind::Number)
                || (l == TypeKind::Number && r == TypeKind::Duration)
            {
                Type::primitive(TypeKind::Duration, false)
            } else {
                Type::none()
            }
        }
        Operator::Division => {
            if number {
                Type::number()
            } else if l == TypeKind::Duration && r == TypeKind::Number {
                Type::primitive(TypeKind::Duration, false)
            } else {
                Type::none()
            }
        }
        _ => Type::none(),
    }
}

fn concatenation_op(left: &Type, right: &Type) -> Type {
    if left.is_unknown() || right.is_unknown() {
        return Type::unknown();
    }
    if left.kind == TypeKind::Any || right.kind == TypeKind::Any {
        return Type::any();
    }
    if left.kind != right.kind {
        return Type::none();
    }

    match left.kind {
        TypeKind::Text => Type::text(),
        TypeKind::List => match (&left.extended, &right.extended) {
            (
                Some(ExtendedType::DefinedList(first)),
                Some(ExtendedType::DefinedList(second)),
            ) => {
                let mut elements = first.clone();
                elements.extend(second.iter().cloned());
                Type::defined_list(elements)
            }
            _ => Type::primitive(TypeKind::List, false),
        },
        TypeKind::Record => match (&left.extended, &right.extended) {
            (
                Some(ExtendedType::DefinedRecord {
                    fields: first,
                    is_open: first_open,
                }),
                Some(ExtendedType::DefinedRecord {
                    fields: second,
                    is_open: second_open,
                }),
            ) => {
                // Right operand wins on key collisions.
                let mut fields = first.clone();
                for (name, ty) in second {
                    fields.insert(name.clone(), ty.clone());
                }
                Type::defined_record(fields, *first_open || *second_open)
            }
            _ => Type::primitive(TypeKind::Record, false),
        },
        TypeKind::Table => match (&left.extended, &right.extended) {
            (
                Some(ExtendedType::DefinedTable {
                    fields: first,
                    is_open: first_open,
                }),
                Some(ExtendedType::DefinedTable {
                    fields: second,
                    is_open: second_open,
                }),
            ) => {
                let mut fields = first.clone();
                for (name, ty) in second {
                    fields.insert(name.clone(), ty.clone());
                }
                Type::defined_table(fields, *first_open || *second_open)
            }
            _ => Type::primitive(TypeKind::Table, false),
        },
        _ => Type::none(),
    }
}
