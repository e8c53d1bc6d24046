use std::{fmt, str::FromStr};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, EnumString};

use crate::error::{Result, SdbError};

/// Id of an AST node. Ids assigned by the compiler are non-negative; nodes without one get a
/// negative id when they are loaded.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NodeId(pub i64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The `nodeType` tag of the nodes the debugger cares about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumString, AsRefStr)]
pub enum NodeKind {
    SourceUnit,
    PragmaDirective,
    ImportDirective,
    ContractDefinition,
    InheritanceSpecifier,
    UsingForDirective,
    StructDefinition,
    EnumDefinition,
    EnumValue,
    EventDefinition,
    ErrorDefinition,
    ModifierDefinition,
    ModifierInvocation,
    FunctionDefinition,
    ParameterList,
    VariableDeclaration,
    ElementaryTypeName,
    UserDefinedTypeName,
    ArrayTypeName,
    Mapping,
    FunctionTypeName,
    IdentifierPath,
    Block,
    UncheckedBlock,
    PlaceholderStatement,
    VariableDeclarationStatement,
    ExpressionStatement,
    IfStatement,
    ForStatement,
    WhileStatement,
    DoWhileStatement,
    Continue,
    Break,
    Return,
    EmitStatement,
    RevertStatement,
    TryStatement,
    Throw,
    InlineAssembly,
    Assignment,
    BinaryOperation,
    UnaryOperation,
    Conditional,
    FunctionCall,
    FunctionCallOptions,
    NewExpression,
    MemberAccess,
    IndexAccess,
    IndexRangeAccess,
    Identifier,
    ElementaryTypeNameExpression,
    TupleExpression,
    Literal,
    /// Any tag not listed above.
    Other,
}

impl NodeKind {
    fn from_tag(tag: &str) -> Self {
        Self::from_str(tag).unwrap_or(Self::Other)
    }

    pub fn is_type_name(self) -> bool {
        matches!(
            self,
            Self::ElementaryTypeName |
                Self::UserDefinedTypeName |
                Self::ArrayTypeName |
                Self::Mapping |
                Self::FunctionTypeName
        )
    }
}

/// A node of a compiler AST.
///
/// Scalar and plain-object fields are kept verbatim in `attributes`; fields holding nodes are
/// replaced by the ids of those nodes in `children`, in document order.
#[derive(Clone, Debug)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    /// The raw `nodeType` tag.
    pub tag: String,
    /// `offset:length:fileIndex`.
    pub src: String,
    pub attributes: Map<String, Value>,
    pub children: Vec<(String, Vec<NodeId>)>,
}

impl Node {
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attr(key).and_then(Value::as_str)
    }

    pub fn attr_bool(&self, key: &str) -> bool {
        self.attr(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn attr_ids(&self, key: &str) -> Vec<NodeId> {
        self.attr(key)
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_i64).map(NodeId).collect())
            .unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.attr_str("name").unwrap_or_default()
    }

    /// `scope` field, if present.
    pub fn scope(&self) -> Option<NodeId> {
        self.attr("scope").and_then(Value::as_i64).map(NodeId)
    }

    /// `typeDescriptions.typeString`, if present.
    pub fn type_string(&self) -> Option<&str> {
        self.attr("typeDescriptions")?.get("typeString")?.as_str()
    }

    /// The node(s) stored under `field`.
    pub fn field(&self, field: &str) -> &[NodeId] {
        self.children
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, ids)| ids.as_slice())
            .unwrap_or_default()
    }

    /// The single node stored under `field`.
    pub fn child(&self, field: &str) -> Option<NodeId> {
        self.field(field).first().copied()
    }

    pub fn all_children(&self) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.children.iter().flat_map(|(_, ids)| ids.iter().copied())
    }
}

/// An arena of AST nodes indexed by id, together with the parent index computed while loading.
#[derive(Clone, Debug, Default)]
pub struct Ast {
    nodes: FxHashMap<NodeId, Node>,
    parents: FxHashMap<NodeId, NodeId>,
    roots: Vec<NodeId>,
    next_synthetic: i64,
}

fn is_node(value: &Value) -> bool {
    value.get("nodeType").is_some_and(Value::is_string)
}

impl Ast {
    pub fn new() -> Self {
        Self { next_synthetic: -1, ..Default::default() }
    }

    /// Loads a JSON AST (typically a `SourceUnit`) into the arena and returns the id of its root.
    pub fn insert(&mut self, json: &Value) -> Result<NodeId> {
        if !is_node(json) {
            return Err(SdbError::Ast("root is not a node".to_string()));
        }

        let root = self.assign_id(json);
        self.roots.push(root);

        let mut stack = vec![(json, root, None)];
        while let Some((value, id, parent)) = stack.pop() {
            let Some(object) = value.as_object() else { continue };

            let mut attributes = Map::new();
            let mut children: Vec<(String, Vec<NodeId>)> = Vec::new();
            let mut pending = Vec::new();
            for (key, field) in object {
                match field {
                    v if is_node(v) => {
                        let child = self.assign_id(v);
                        children.push((key.clone(), vec![child]));
                        pending.push((v, child));
                    }
                    Value::Array(items) if items.iter().any(is_node) => {
                        let mut ids = Vec::new();
                        for item in items.iter().filter(|item| is_node(item)) {
                            let child = self.assign_id(item);
                            ids.push(child);
                            pending.push((item, child));
                        }
                        children.push((key.clone(), ids));
                    }
                    _ => {
                        attributes.insert(key.clone(), field.clone());
                    }
                }
            }

            // Children are pushed in reverse so they are popped in document order.
            for (child_value, child) in pending.into_iter().rev() {
                stack.push((child_value, child, Some(id)));
            }

            if let Some(parent) = parent {
                self.parents.insert(id, parent);
            }

            let tag = object.get("nodeType").and_then(Value::as_str).unwrap_or_default();
            let src = object.get("src").and_then(Value::as_str).unwrap_or_default();
            attributes.remove("nodeType");
            attributes.remove("src");
            attributes.remove("id");

            self.nodes.insert(
                id,
                Node {
                    id,
                    kind: NodeKind::from_tag(tag),
                    tag: tag.to_string(),
                    src: src.to_string(),
                    attributes,
                    children,
                },
            );
        }

        Ok(root)
    }

    fn assign_id(&mut self, value: &Value) -> NodeId {
        match value.get("id").and_then(Value::as_i64) {
            Some(id) => NodeId(id),
            None => {
                let id = NodeId(self.next_synthetic);
                self.next_synthetic -= 1;
                id
            }
        }
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.get(id).ok_or(SdbError::NodeNotFound(id))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(&id).copied()
    }

    pub fn parents(&self) -> &FxHashMap<NodeId, NodeId> {
        &self.parents
    }

    /// Iterates over `id` and its ancestors, innermost first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), move |id| self.parent(*id))
    }

    /// Pre-order traversal of the subtree rooted at `id`, children in field order.
    pub fn walk(&self, id: NodeId) -> Vec<&Node> {
        let mut res = Vec::new();
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let Some(node) = self.get(id) else { continue };
            res.push(node);
            stack.extend(node.all_children().rev());
        }
        res
    }

    /// All nodes of the given kind in the subtree rooted at `id`, in traversal order.
    pub fn walk_and_find(&self, id: NodeId, kind: NodeKind) -> Vec<&Node> {
        self.walk(id).into_iter().filter(|node| node.kind == kind).collect()
    }

    /// The closest enclosing node of the given kind, including `id` itself.
    pub fn enclosing(&self, id: NodeId, kind: NodeKind) -> Option<&Node> {
        self.ancestors(id).filter_map(|id| self.get(id)).find(|node| node.kind == kind)
    }

    /// Ids of the `VariableDeclaration`s of a `ParameterList`, in declaration order.
    pub fn parameters(&self, list: Option<NodeId>) -> Vec<&Node> {
        list.map(|list| self.walk_and_find(list, NodeKind::VariableDeclaration))
            .unwrap_or_default()
    }
}

/// The callable name of a function definition: its name, or its kind for constructors,
/// fallback and receive functions.
pub fn function_name(node: &Node) -> String {
    match node.name() {
        "" => node.attr_str("kind").unwrap_or("fallback").to_string(),
        name => name.to_string(),
    }
}
