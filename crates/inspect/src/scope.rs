//! Lexical scope: walk the ancestry from the root toward a target node,
//! pushing bindings for every enclosing `let`, function, `each`, record and
//! section. Later pushes shadow earlier ones, so the innermost binding wins.

use enum_as_inner::EnumAsInner;
use pq_common::CommonError;
use pq_syntax::node::{ConstantKind, NodeData, PrimitiveTypeKind};
use pq_syntax::{NodeId, NodeIdMap, NodeKind, XorNode};
use tracing::instrument;

use crate::settings::InspectionSettings;
use crate::{HashSet, IndexMap};

/// Name to scope item, in binding order.
pub type ScopeByKey = IndexMap<String, ScopeItem>;

/// Scope cache keyed by the node id the scope was computed for.
pub type ScopeById = crate::HashMap<NodeId, ScopeByKey>;

#[derive(Debug, Clone, PartialEq, Eq, EnumAsInner)]
pub enum ScopeItem {
    Each(EachScopeItem),
    KeyValuePair(KeyValuePairScopeItem),
    Parameter(ParameterScopeItem),
    SectionMember(SectionMemberScopeItem),
    Undefined(UndefinedScopeItem),
}

impl ScopeItem {
    /// Whether the binding is visible from within its own value expression.
    #[must_use]
    pub fn is_recursive(&self) -> bool {
        match self {
            ScopeItem::Each(_) => false,
            ScopeItem::KeyValuePair(item) => item.is_recursive,
            ScopeItem::Parameter(_) => false,
            ScopeItem::SectionMember(item) => item.is_recursive,
            ScopeItem::Undefined(item) => item.is_recursive,
        }
    }
}

/// The implicit `_` bound by an `each` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EachScopeItem {
    pub each_expression_id: NodeId,
}

/// A `let` or record binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValuePairScopeItem {
    pub pair_id: NodeId,
    pub key_id: NodeId,
    pub maybe_value_id: Option<NodeId>,
    pub is_recursive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionMemberScopeItem {
    pub member_id: NodeId,
    pub key_id: NodeId,
    pub maybe_value_id: Option<NodeId>,
    pub is_recursive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterScopeItem {
    pub parameter_id: NodeId,
    pub name_id: NodeId,
    /// Tracks the `optional` keyword.
    pub is_optional: bool,
    /// Derived from the declared type; an unannotated parameter is nullable.
    pub is_nullable: bool,
    pub maybe_type: Option<PrimitiveTypeKind>,
}

/// Fallback for a binding whose shape could not be recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndefinedScopeItem {
    pub id: NodeId,
    pub is_recursive: bool,
}

/// Compute the scope visible at `node_id`.
///
/// Results are memoized in `cache`; recomputation is idempotent.
#[instrument(level = "trace", skip(settings, node_id_map, cache))]
pub fn try_node_scope(
    settings: &InspectionSettings,
    node_id_map: &NodeIdMap,
    node_id: NodeId,
    cache: &mut ScopeById,
) -> Result<ScopeByKey, CommonError> {
    if let Some(hit) = cache.get(&node_id) {
        return Ok(hit.clone());
    }

    let ancestry = node_id_map.ancestry(node_id);
    let ancestry_ids: HashSet<NodeId> = ancestry.iter().map(XorNode::id).collect();

    let mut scope = ScopeByKey::default();
    // Root to target, so inner bindings overwrite outer ones.
    let root_first: Vec<&XorNode> = ancestry.iter().rev().collect();

    for (index, node) in root_first.iter().enumerate() {
        settings.settings.check_cancel()?;
        let toward = root_first.get(index + 1).map(|next| next.id());

        match node.kind() {
            NodeKind::EachExpression => {
                scope.insert(
                    "_".to_string(),
                    ScopeItem::Each(EachScopeItem {
                        each_expression_id: node.id(),
                    }),
                );
            }
            NodeKind::FunctionExpression => {
                inspect_function(node_id_map, node.id(), &ancestry_ids, &mut scope);
            }
            NodeKind::LetExpression => {
                inspect_let(node_id_map, node.id(), toward, &ancestry_ids, &mut scope);
            }
            NodeKind::RecordExpression | NodeKind::RecordLiteral => {
                inspect_record(node_id_map, node.id(), &ancestry_ids, &mut scope);
            }
            NodeKind::Section => {
                inspect_section(node_id_map, node.id(), &ancestry_ids, &mut scope);
            }
            _ => {}
        }
    }

    cache.insert(node_id, scope.clone());
    Ok(scope)
}

fn inspect_function(
    node_id_map: &NodeIdMap,
    function_id: NodeId,
    ancestry_ids: &HashSet<NodeId>,
    scope: &mut ScopeByKey,
) {
    let Some(parameter_list) =
        node_id_map.first_child_of_kind(function_id, NodeKind::ParameterList)
    else {
        return;
    };
    // Parameters are not visible from inside the parameter list itself.
    if ancestry_ids.contains(&parameter_list.id()) {
        return;
    }

    for (name, item) in parameters_of(node_id_map, parameter_list.id()) {
        scope.insert(name, ScopeItem::Parameter(item));
    }
}

/// Extract every parameter of a parameter-list node.
pub(crate) fn parameters_of(
    node_id_map: &NodeIdMap,
    parameter_list_id: NodeId,
) -> Vec<(String, ParameterScopeItem)> {
    let Some(wrapper) =
        node_id_map.first_child_of_kind(parameter_list_id, NodeKind::ArrayWrapper)
    else {
        return Vec::new();
    };

    let mut parameters = Vec::new();
    for csv_id in node_id_map.children_ids(wrapper.id()) {
        let Some(parameter) = node_id_map.first_child_of_kind(*csv_id, NodeKind::Parameter)
        else {
            continue;
        };
        let parameter_id = parameter.id();

        let Some(name_node) = node_id_map.first_child_of_kind(parameter_id, NodeKind::Identifier)
        else {
            continue;
        };
        let Some(name) = node_id_map.ast_node(name_node.id()).and_then(|ast| {
            match &ast.data {
                NodeData::Identifier(text) => Some(text.clone()),
                _ => None,
            }
        }) else {
            continue;
        };

        let is_optional = has_constant(node_id_map, parameter_id, ConstantKind::Optional);
        let declared = declared_parameter_type(node_id_map, parameter_id);
        let (maybe_type, declared_nullable) = match declared {
            Some((kind, nullable)) => (Some(kind), nullable),
            None => (None, true),
        };

        parameters.push((
            name,
            ParameterScopeItem {
                parameter_id,
                name_id: name_node.id(),
                is_optional,
                is_nullable: declared_nullable,
                maybe_type,
            },
        ));
    }
    parameters
}

/// The `as [nullable] <primitive>` annotation of a parameter, if present.
fn declared_parameter_type(
    node_id_map: &NodeIdMap,
    parameter_id: NodeId,
) -> Option<(PrimitiveTypeKind, bool)> {
    let annotation =
        node_id_map.first_child_of_kind(parameter_id, NodeKind::AsNullablePrimitiveType)?;

    if let Some(nullable) =
        node_id_map.first_child_of_kind(annotation.id(), NodeKind::NullablePrimitiveType)
    {
        let primitive = primitive_kind_of(node_id_map, nullable.id())?;
        return Some((primitive, true));
    }

    let primitive = primitive_kind_of(node_id_map, annotation.id())?;
    Some((primitive, primitive == PrimitiveTypeKind::Null))
}

fn primitive_kind_of(node_id_map: &NodeIdMap, parent_id: NodeId) -> Option<PrimitiveTypeKind> {
    let node = node_id_map.first_child_of_kind(parent_id, NodeKind::PrimitiveType)?;
    match node_id_map.ast_node(node.id())?.data {
        NodeData::PrimitiveType(kind) => Some(kind),
        _ => None,
    }
}

pub(crate) fn has_constant(
    node_id_map: &NodeIdMap,
    parent_id: NodeId,
    constant: ConstantKind,
) -> bool {
    node_id_map
        .children_ids(parent_id)
        .iter()
        .filter_map(|child| node_id_map.ast_node(*child))
        .any(|child| child.data == NodeData::Constant(constant))
}

fn inspect_let(
    node_id_map: &NodeIdMap,
    let_id: NodeId,
    toward: Option<NodeId>,
    ancestry_ids: &HashSet<NodeId>,
    scope: &mut ScopeByKey,
) {
    let Some(wrapper) = node_id_map.child_by_attribute_index(
        let_id,
        1,
        Some(&[NodeKind::ArrayWrapper]),
    ) else {
        return;
    };

    // When the target is the variable list itself (not inside a pair's key
    // or value), only preceding siblings are visible.
    let mut preceding_limit: Option<u32> = None;
    if toward == Some(wrapper.id()) {
        let path_csv = node_id_map
            .children_ids(wrapper.id())
            .iter()
            .find(|csv| ancestry_ids.contains(*csv))
            .and_then(|csv| node_id_map.xor_node(*csv));
        let enters_pair = node_id_map
            .children_ids(wrapper.id())
            .iter()
            .filter_map(|csv| {
                node_id_map.first_child_of_kind(
                    *csv,
                    NodeKind::IdentifierPairedExpression,
                )
            })
            .any(|pair| ancestry_ids.contains(&pair.id()));
        if let (Some(csv), false) = (path_csv, enters_pair) {
            preceding_limit = csv.attribute_index();
        }
    }

    for csv_id in node_id_map.children_ids(wrapper.id()) {
        let Some(csv) = node_id_map.xor_node(*csv_id) else {
            continue;
        };
        if let Some(limit) = preceding_limit {
            if csv.attribute_index().map_or(true, |index| index >= limit) {
                continue;
            }
        }

        let Some(pair) =
            node_id_map.first_child_of_kind(*csv_id, NodeKind::IdentifierPairedExpression)
        else {
            continue;
        };
        bind_pair(node_id_map, pair.id(), ancestry_ids, scope);
    }
}

fn inspect_record(
    node_id_map: &NodeIdMap,
    record_id: NodeId,
    ancestry_ids: &HashSet<NodeId>,
    scope: &mut ScopeByKey,
) {
    let Some(wrapper) = node_id_map.first_child_of_kind(record_id, NodeKind::ArrayWrapper)
    else {
        return;
    };

    for csv_id in node_id_map.children_ids(wrapper.id()) {
        let pair = node_id_map
            .first_child_of_kind(*csv_id, NodeKind::GeneralizedIdentifierPairedExpression)
            .or_else(|| {
                node_id_map.first_child_of_kind(
                    *csv_id,
                    NodeKind::GeneralizedIdentifierPairedAnyLiteral,
                )
            });
        let Some(pair) = pair else { continue };
        bind_pair(node_id_map, pair.id(), ancestry_ids, scope);
    }
}

fn inspect_section(
    node_id_map: &NodeIdMap,
    section_id: NodeId,
    ancestry_ids: &HashSet<NodeId>,
    scope: &mut ScopeByKey,
) {
    let Some(wrapper) = node_id_map.first_child_of_kind(section_id, NodeKind::ArrayWrapper)
    else {
        return;
    };

    for member_id in node_id_map.children_ids(wrapper.id()) {
        let Some(member) = node_id_map.xor_node(*member_id) else {
            continue;
        };
        if member.kind() != NodeKind::SectionMember {
            continue;
        }

        let Some(key) = node_id_map.first_child_of_kind(*member_id, NodeKind::Identifier)
        else {
            continue;
        };
        let Some(name) = leaf_text(node_id_map, key.id()) else {
            continue;
        };

        let maybe_value_id = member_value_id(node_id_map, *member_id, &key);
        let is_recursive =
            maybe_value_id.map_or(false, |value| ancestry_ids.contains(&value));

        scope.insert(
            name,
            ScopeItem::SectionMember(SectionMemberScopeItem {
                member_id: *member_id,
                key_id: key.id(),
                maybe_value_id,
                is_recursive,
            }),
        );
    }
}

/// The member's value sits two attributes after its name (`name = value`).
pub(crate) fn member_value_id(
    node_id_map: &NodeIdMap,
    member_id: NodeId,
    key: &XorNode,
) -> Option<NodeId> {
    let key_index = key.attribute_index()?;
    let value = node_id_map.child_by_attribute_index(member_id, key_index + 2, None)?;
    match value.kind() {
        NodeKind::Constant => None,
        _ => Some(value.id()),
    }
}

/// Bind one key-value pair, skipping it when the target sits in its key and
/// marking it recursive when the target sits in its own value.
fn bind_pair(
    node_id_map: &NodeIdMap,
    pair_id: NodeId,
    ancestry_ids: &HashSet<NodeId>,
    scope: &mut ScopeByKey,
) {
    let Some(key) = node_id_map.child_by_attribute_index(
        pair_id,
        0,
        Some(&[NodeKind::Identifier, NodeKind::GeneralizedIdentifier]),
    ) else {
        return;
    };
    let Some(name) = leaf_text(node_id_map, key.id()) else {
        return;
    };

    let maybe_value_id = node_id_map
        .child_by_attribute_index(pair_id, 2, None)
        .map(|value| value.id());
    let in_pair = ancestry_ids.contains(&pair_id);
    let in_key = ancestry_ids.contains(&key.id());

    if in_pair && in_key {
        // The target is the name being defined; the binding is not in scope.
        return;
    }

    // Anywhere else inside the pair counts as its value slot, even when the
    // value node does not exist yet.
    scope.insert(
        name,
        ScopeItem::KeyValuePair(KeyValuePairScopeItem {
            pair_id,
            key_id: key.id(),
            maybe_value_id,
            is_recursive: in_pair,
        }),
    );
}

pub(crate) fn leaf_text(node_id_map: &NodeIdMap, id: NodeId) -> Option<String> {
    match &node_id_map.ast_node(id)?.data {
        NodeData::Identifier(text) | NodeData::GeneralizedIdentifier(text) => Some(text.clone()),
        _ => None,
    }
}
