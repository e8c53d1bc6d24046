//! Solidity types as seen by the debugger, resolved from AST type names.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    analysis::{
        ast::{Ast, Node, NodeId, NodeKind},
        storage,
    },
    error::{Result, SdbError},
};

/// Where a variable lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataLocation {
    Storage,
    Memory,
    Stack,
    Calldata,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mutability {
    #[default]
    Mutable,
    Constant,
    Immutable,
}

/// A variable declaration: state variable, local, parameter or struct member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub id: NodeId,
    pub name: String,
    pub location: DataLocation,
    pub ty: TypeName,
    pub scope: NodeId,
    pub state: bool,
    pub bytes: usize,
    pub mutability: Mutability,
    /// Literal initial value of a constant.
    pub value: Option<String>,
}

impl Variable {
    /// Unnamed return values are registered as `<n>`.
    pub fn is_return(&self) -> bool {
        self.name.starts_with('<')
    }
}

/// A resolved type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeName {
    Elementary { name: String },
    Array { base: Box<TypeName>, length: Option<u64> },
    Mapping { key: Box<TypeName>, value: Box<TypeName> },
    UserDefined(UserDefinedType),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserDefinedType {
    Struct { name: String, members: Vec<Variable> },
    Enum { name: String, values: Vec<String> },
}

/// Classification of an elementary type name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Elementary {
    Bool,
    Address,
    Uint(usize),
    Int(usize),
    FixedBytes(usize),
    Bytes,
    String,
    /// Width of the function pointer: 24 for external, 8 for internal functions.
    Function(usize),
    Fixed(usize),
}

impl Elementary {
    pub fn parse(name: &str) -> Option<Self> {
        let bits = |rest: &str| -> Option<usize> {
            if rest.is_empty() {
                return Some(32);
            }
            let bits: usize = rest.parse().ok()?;
            (bits % 8 == 0 && (8..=256).contains(&bits)).then_some(bits / 8)
        };

        Some(match name {
            "bool" => Self::Bool,
            "string" => Self::String,
            "bytes" => Self::Bytes,
            "byte" => Self::FixedBytes(1),
            "function" => Self::Function(24),
            "function internal" => Self::Function(8),
            _ if name.starts_with("address") => Self::Address,
            _ if name.starts_with("uint") => Self::Uint(bits(&name[4..])?),
            _ if name.starts_with("int") => Self::Int(bits(&name[3..])?),
            _ if name.starts_with("ufixed") || name.starts_with("fixed") => {
                let rest = name.trim_start_matches('u').trim_start_matches("fixed");
                match rest.split_once('x') {
                    Some((m, _)) => Self::Fixed(bits(m)?),
                    None if rest.is_empty() => Self::Fixed(16),
                    None => return None,
                }
            }
            _ if name.starts_with("bytes") => {
                let n: usize = name[5..].parse().ok()?;
                if !(1..=32).contains(&n) {
                    return None;
                }
                Self::FixedBytes(n)
            }
            _ => return None,
        })
    }

    pub fn width(self) -> usize {
        match self {
            Self::Bool => 1,
            Self::Address => 20,
            Self::Uint(n) | Self::Int(n) | Self::FixedBytes(n) | Self::Function(n) | Self::Fixed(n) => n,
            Self::Bytes | Self::String => 32,
        }
    }
}

impl TypeName {
    pub fn elementary(name: impl Into<String>) -> Self {
        Self::Elementary { name: name.into() }
    }

    /// The elementary kind, if this is an elementary type.
    pub fn as_elementary(&self) -> Option<Elementary> {
        match self {
            Self::Elementary { name } => Elementary::parse(name),
            _ => None,
        }
    }

    /// Whether values of this type span a whole word-aligned region (or more) rather than
    /// a packed byte range.
    pub fn is_reference(&self) -> bool {
        match self {
            Self::Elementary { .. } => {
                matches!(self.as_elementary(), Some(Elementary::Bytes | Elementary::String))
            }
            Self::UserDefined(UserDefinedType::Enum { .. }) => false,
            _ => true,
        }
    }

    /// Packed width in bytes.
    pub fn bytes(&self) -> usize {
        match self {
            // names are validated when the type is resolved
            Self::Elementary { .. } => self.as_elementary().map_or(32, Elementary::width),
            Self::UserDefined(UserDefinedType::Enum { values, .. }) => enum_width(values.len()),
            _ => 32,
        }
    }

    /// Number of storage slots a value of this type occupies.
    pub fn slots(&self) -> usize {
        match self {
            Self::UserDefined(UserDefinedType::Struct { members, .. }) => {
                storage::parse_storage(members).slots.max(1)
            }
            Self::Array { base, length: Some(length) } => {
                let length = *length as usize;
                if base.is_reference() {
                    length.saturating_mul(base.slots())
                } else {
                    let per_slot = 32 / base.bytes().max(1);
                    length.div_ceil(per_slot)
                }
            }
            _ => 1,
        }
    }
}

/// Smallest number of bytes able to index `n` members, at least one.
fn enum_width(n: usize) -> usize {
    let mut bytes = 1;
    while bytes < 32 && (n as u128) > 1u128 << (8 * bytes).min(127) {
        bytes += 1;
    }
    bytes
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Elementary { name } => f.write_str(name),
            Self::Array { base, length: Some(n) } => write!(f, "{base}[{n}]"),
            Self::Array { base, length: None } => write!(f, "{base}[]"),
            Self::Mapping { key, value } => write!(f, "mapping({key} => {value})"),
            Self::UserDefined(UserDefinedType::Struct { name, .. }) => write!(f, "struct {name}"),
            Self::UserDefined(UserDefinedType::Enum { name, .. }) => write!(f, "enum {name}"),
        }
    }
}

/// Structs and enums, keyed by their qualified name (`Contract.Name`, or `Name` at file level).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserTypes {
    pub structs: BTreeMap<String, Vec<Variable>>,
    pub enums: BTreeMap<String, Vec<String>>,
}

impl UserTypes {
    /// Collects and resolves every struct and enum defined under `roots`.
    ///
    /// Structs may reference structs declared later or in other contracts, so they are resolved
    /// until no more progress is made. What is left refers to itself (through a mapping or a
    /// dynamic array) and is resolved with empty placeholders for the recursive references.
    pub fn build(ast: &Ast, roots: &[NodeId]) -> Result<Self> {
        let mut user_types = Self::default();
        let mut pending = BTreeMap::new();

        for root in roots {
            for node in ast.walk_and_find(*root, NodeKind::EnumDefinition) {
                let values = node
                    .field("members")
                    .iter()
                    .map(|id| ast.node(*id).map(|value| value.name().to_string()))
                    .collect::<Result<_>>()?;
                user_types.enums.insert(qualified_name(ast, node), values);
            }
            for node in ast.walk_and_find(*root, NodeKind::StructDefinition) {
                pending.insert(qualified_name(ast, node), node.id);
            }
        }

        loop {
            let mut progress = false;
            for (name, id) in pending.clone() {
                let resolver = TypeResolver::new(ast, &user_types);
                match resolver.struct_members(id) {
                    Ok(members) => {
                        user_types.structs.insert(name.clone(), members);
                        pending.remove(&name);
                        progress = true;
                    }
                    Err(SdbError::UnknownUserType(_)) => {}
                    Err(err) => return Err(err),
                }
            }
            if !progress {
                break;
            }
        }

        for (name, id) in pending {
            debug!(%name, "resolving recursive struct with placeholders");
            let members = TypeResolver::new(ast, &user_types).with_placeholders().struct_members(id)?;
            user_types.structs.insert(name, members);
        }

        Ok(user_types)
    }

    /// The subset declared in the given contracts.
    pub fn filter(&self, contracts: &[&str]) -> Self {
        let keep = |name: &String| {
            name.split_once('.').is_some_and(|(contract, _)| contracts.contains(&contract))
        };
        Self {
            structs: self.structs.iter().filter(|(n, _)| keep(n)).map(|(n, m)| (n.clone(), m.clone())).collect(),
            enums: self.enums.iter().filter(|(n, _)| keep(n)).map(|(n, v)| (n.clone(), v.clone())).collect(),
        }
    }
}

fn qualified_name(ast: &Ast, node: &Node) -> String {
    match ast.enclosing(node.id, NodeKind::ContractDefinition) {
        Some(contract) => format!("{}.{}", contract.name(), node.name()),
        None => node.name().to_string(),
    }
}

/// Resolves AST type names into [`TypeName`]s.
#[derive(Clone, Copy, Debug)]
pub struct TypeResolver<'a> {
    ast: &'a Ast,
    user_types: &'a UserTypes,
    placeholders: bool,
}

impl<'a> TypeResolver<'a> {
    pub fn new(ast: &'a Ast, user_types: &'a UserTypes) -> Self {
        Self { ast, user_types, placeholders: false }
    }

    /// Unknown structs resolve to empty structs instead of failing.
    fn with_placeholders(mut self) -> Self {
        self.placeholders = true;
        self
    }

    fn struct_members(&self, id: NodeId) -> Result<Vec<Variable>> {
        let node = self.ast.node(id)?;
        node.field("members").iter().map(|id| self.variable(self.ast.node(*id)?)).collect()
    }

    /// Converts a `VariableDeclaration` node into a [`Variable`].
    pub fn variable(&self, node: &Node) -> Result<Variable> {
        let state = node.attr_bool("stateVariable");
        let location = if state {
            DataLocation::Storage
        } else {
            match node.attr_str("storageLocation") {
                Some("memory") => DataLocation::Memory,
                Some("storage") => DataLocation::Storage,
                Some("calldata") => DataLocation::Calldata,
                _ => DataLocation::Stack,
            }
        };

        let mutability = match node.attr_str("mutability") {
            Some("constant") => Mutability::Constant,
            Some("immutable") => Mutability::Immutable,
            Some(_) => Mutability::Mutable,
            None if node.attr_bool("constant") => Mutability::Constant,
            None => Mutability::Mutable,
        };

        let ty = match node.child("typeName") {
            Some(type_name) => self.resolve(type_name)?,
            None => return Err(SdbError::UnknownType(format!("untyped declaration {}", node.id))),
        };

        let value = if mutability == Mutability::Constant {
            node.child("value")
                .and_then(|id| self.ast.get(id))
                .filter(|value| value.kind == NodeKind::Literal)
                .and_then(|literal| literal.attr_str("value").map(str::to_string))
        } else {
            None
        };

        Ok(Variable {
            id: node.id,
            name: node.name().to_string(),
            location,
            bytes: ty.bytes(),
            ty,
            scope: node.scope().unwrap_or_default(),
            state,
            mutability,
            value,
        })
    }

    /// Converts a type name node into a [`TypeName`].
    pub fn resolve(&self, id: NodeId) -> Result<TypeName> {
        let node = self.ast.node(id)?;
        match node.kind {
            NodeKind::ElementaryTypeName => {
                let name = node
                    .attr_str("name")
                    .or_else(|| node.type_string())
                    .ok_or_else(|| SdbError::UnknownType(format!("unnamed type {id}")))?;
                // `address payable` and friends
                let name = if name.starts_with("address") { "address" } else { name };
                Elementary::parse(name).ok_or_else(|| SdbError::UnknownType(name.to_string()))?;
                Ok(TypeName::elementary(name))
            }
            NodeKind::ArrayTypeName => {
                let base = node
                    .child("baseType")
                    .ok_or_else(|| SdbError::Ast(format!("array type {id} without base type")))?;
                Ok(TypeName::Array { base: Box::new(self.resolve(base)?), length: self.array_length(node) })
            }
            NodeKind::Mapping => {
                let key = node.child("keyType");
                let value = node.child("valueType");
                match (key, value) {
                    (Some(key), Some(value)) => Ok(TypeName::Mapping {
                        key: Box::new(self.resolve(key)?),
                        value: Box::new(self.resolve(value)?),
                    }),
                    _ => Err(SdbError::Ast(format!("mapping {id} without key or value type"))),
                }
            }
            NodeKind::FunctionTypeName => {
                let internal = node.attr_str("visibility") == Some("internal");
                Ok(TypeName::elementary(if internal { "function internal" } else { "function" }))
            }
            NodeKind::UserDefinedTypeName => {
                let type_string = node
                    .type_string()
                    .ok_or_else(|| SdbError::UnknownUserType(format!("node {id}")))?;
                self.user_defined(type_string)
            }
            _ => Err(SdbError::UnknownType(node.tag.clone())),
        }
    }

    fn user_defined(&self, type_string: &str) -> Result<TypeName> {
        let (kind, rest) = type_string.split_once(' ').unwrap_or((type_string, ""));
        let name = rest.split(' ').next().unwrap_or_default();
        match kind {
            "struct" => match self.user_types.structs.get(name) {
                Some(members) => Ok(TypeName::UserDefined(UserDefinedType::Struct {
                    name: name.to_string(),
                    members: members.clone(),
                })),
                None if self.placeholders => Ok(TypeName::UserDefined(UserDefinedType::Struct {
                    name: name.to_string(),
                    members: Vec::new(),
                })),
                None => Err(SdbError::UnknownUserType(type_string.to_string())),
            },
            "enum" => match self.user_types.enums.get(name) {
                Some(values) => Ok(TypeName::UserDefined(UserDefinedType::Enum {
                    name: name.to_string(),
                    values: values.clone(),
                })),
                None => Err(SdbError::UnknownUserType(type_string.to_string())),
            },
            // Contract typed variables are addresses for packing and decoding purposes.
            "contract" | "interface" => Ok(TypeName::elementary("address")),
            _ => Err(SdbError::UnknownUserType(type_string.to_string())),
        }
    }

    fn array_length(&self, node: &Node) -> Option<u64> {
        if let Some(length) = node.child("length").and_then(|id| self.ast.get(id)) {
            let literal = length.attr("value").and_then(Value::as_str).and_then(|v| v.parse().ok());
            if literal.is_some() {
                return literal;
            }
        } else {
            return None;
        }

        // `uint256[N] storage ref`, with N a constant expression
        let type_string = node.type_string()?;
        let head = type_string.split(' ').next()?;
        let inner = head.strip_suffix(']')?;
        inner[inner.rfind('[')? + 1..].parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn elementary(id: i64, name: &str) -> Value {
        json!({ "id": id, "nodeType": "ElementaryTypeName", "src": "0:0:0", "name": name })
    }

    fn declaration(id: i64, name: &str, type_name: Value) -> Value {
        json!({
            "id": id, "nodeType": "VariableDeclaration", "src": "0:0:0", "name": name,
            "scope": 1, "storageLocation": "default", "typeName": type_name
        })
    }

    #[test]
    fn test_widths() {
        let width = |name: &str| TypeName::elementary(name).bytes();
        assert_eq!(width("bool"), 1);
        assert_eq!(width("address"), 20);
        assert_eq!(width("uint8"), 1);
        assert_eq!(width("int128"), 16);
        assert_eq!(width("uint"), 32);
        assert_eq!(width("bytes4"), 4);
        assert_eq!(width("byte"), 1);
        assert_eq!(width("string"), 32);
        assert_eq!(width("function"), 24);
        assert!(Elementary::parse("uint7").is_none());
        assert!(Elementary::parse("bytes33").is_none());
        assert!(Elementary::parse("widget").is_none());
    }

    #[test]
    fn test_enum_width() {
        assert_eq!(enum_width(1), 1);
        assert_eq!(enum_width(2), 1);
        assert_eq!(enum_width(256), 1);
        assert_eq!(enum_width(257), 2);
        assert_eq!(enum_width(65536), 2);
        assert_eq!(enum_width(65537), 3);
    }

    #[test]
    fn test_fixed_array_slots() {
        let array = |base: TypeName, n| TypeName::Array { base: Box::new(base), length: Some(n) };
        assert_eq!(array(TypeName::elementary("uint8"), 33).slots(), 2);
        assert_eq!(array(TypeName::elementary("uint256"), 3).slots(), 3);
        assert_eq!(array(TypeName::elementary("address"), 3).slots(), 3);
        assert_eq!(array(array(TypeName::elementary("uint128"), 3), 2).slots(), 4);
        assert_eq!(TypeName::Array { base: Box::new(TypeName::elementary("uint8")), length: None }.slots(), 1);
    }

    #[test]
    fn test_resolve_user_types() {
        let mut ast = Ast::new();
        let root = ast
            .insert(&json!({
                "id": 1, "nodeType": "ContractDefinition", "src": "0:0:0", "name": "A",
                "nodes": [
                    {
                        "id": 2, "nodeType": "StructDefinition", "src": "0:0:0", "name": "Outer",
                        "members": [
                            declaration(3, "inner", json!({
                                "id": 4, "nodeType": "UserDefinedTypeName", "src": "0:0:0",
                                "typeDescriptions": { "typeString": "struct A.Inner storage pointer" }
                            })),
                            declaration(5, "flag", elementary(6, "bool")),
                        ]
                    },
                    {
                        "id": 7, "nodeType": "StructDefinition", "src": "0:0:0", "name": "Inner",
                        "members": [
                            declaration(8, "a", elementary(9, "uint128")),
                            declaration(10, "b", elementary(11, "uint128")),
                            declaration(12, "c", elementary(13, "address")),
                        ]
                    },
                    {
                        "id": 14, "nodeType": "EnumDefinition", "src": "0:0:0", "name": "E",
                        "members": [
                            { "id": 15, "nodeType": "EnumValue", "src": "0:0:0", "name": "X" },
                            { "id": 16, "nodeType": "EnumValue", "src": "0:0:0", "name": "Y" }
                        ]
                    },
                    declaration(17, "owner", json!({
                        "id": 18, "nodeType": "UserDefinedTypeName", "src": "0:0:0",
                        "typeDescriptions": { "typeString": "contract B" }
                    })),
                    declaration(19, "e", json!({
                        "id": 20, "nodeType": "UserDefinedTypeName", "src": "0:0:0",
                        "typeDescriptions": { "typeString": "enum A.E" }
                    })),
                ]
            }))
            .unwrap();

        let user_types = UserTypes::build(&ast, &[root]).unwrap();
        assert_eq!(user_types.enums["A.E"], vec!["X", "Y"]);

        let resolver = TypeResolver::new(&ast, &user_types);
        let outer = resolver.user_defined("struct A.Outer memory").unwrap();
        assert_eq!(outer.bytes(), 32);
        // inner takes two slots, the bool its own
        assert_eq!(outer.slots(), 3);

        let owner = resolver.variable(ast.node(NodeId(17)).unwrap()).unwrap();
        assert_eq!(owner.ty, TypeName::elementary("address"));
        assert_eq!(owner.bytes, 20);
        assert_eq!(owner.location, DataLocation::Stack);

        let e = resolver.variable(ast.node(NodeId(19)).unwrap()).unwrap();
        assert_eq!(e.bytes, 1);
        assert!(matches!(resolver.user_defined("struct A.Missing"), Err(SdbError::UnknownUserType(_))));
    }

    #[test]
    fn test_recursive_struct() {
        let mut ast = Ast::new();
        let root = ast
            .insert(&json!({
                "id": 1, "nodeType": "ContractDefinition", "src": "0:0:0", "name": "A",
                "nodes": [{
                    "id": 2, "nodeType": "StructDefinition", "src": "0:0:0", "name": "Node",
                    "members": [
                        declaration(3, "children", json!({
                            "id": 4, "nodeType": "ArrayTypeName", "src": "0:0:0",
                            "baseType": {
                                "id": 5, "nodeType": "UserDefinedTypeName", "src": "0:0:0",
                                "typeDescriptions": { "typeString": "struct A.Node storage ref" }
                            }
                        })),
                    ]
                }]
            }))
            .unwrap();

        let user_types = UserTypes::build(&ast, &[root]).unwrap();
        let members = &user_types.structs["A.Node"];
        assert_eq!(members.len(), 1);
        assert!(matches!(members[0].ty, TypeName::Array { length: None, .. }));
    }

    #[test]
    fn test_unknown_type_tag() {
        let mut ast = Ast::new();
        let root = ast.insert(&json!({ "id": 1, "nodeType": "Identifier", "src": "0:0:0" })).unwrap();
        let user_types = UserTypes::default();
        assert!(matches!(
            TypeResolver::new(&ast, &user_types).resolve(root),
            Err(SdbError::UnknownType(tag)) if tag == "Identifier"
        ));
    }
}
