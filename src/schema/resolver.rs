// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Name resolution: turns a raw [`MessageDefinition`] into a schema tree
//! with every type reference replaced by a shared [`ObjectSchema`].
//!
//! Bare type names resolve in this order: exact `<root-scope>/Name`, then
//! the first sub-type block whose unqualified name matches, then the
//! `Header` shorthand for `std_msgs/Header`. Qualified names must match a
//! block exactly. Anything else is an [`BagError::UnknownType`].

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{BagError, Result};
use crate::schema::ast::{Constant, FieldType, MessageDefinition, PrimitiveType};

/// A resolved message type: ordered fields with fully resolved child
/// schemas. Shared by `Arc` so that repeated references (every `Header`,
/// every array element) point at one instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSchema {
    /// Full type name
    pub name: String,
    /// Value-carrying fields in wire order
    pub fields: Vec<SchemaField>,
    /// Constants declared by the type (not serialized)
    pub constants: Vec<Constant>,
    fixed_size: Option<usize>,
}

/// A resolved field.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaField {
    /// Field name
    pub name: String,
    /// Resolved field schema
    pub node: SchemaNode,
}

/// A node in the resolved schema tree.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    /// A single primitive value
    Primitive(PrimitiveType),
    /// A nested message
    Object(Arc<ObjectSchema>),
    /// An array of primitives; `len: None` means length-prefixed
    PrimitiveArray {
        /// Element type
        elem: PrimitiveType,
        /// Fixed element count, or `None` for length-prefixed
        len: Option<usize>,
    },
    /// An array of nested messages; `len: None` means length-prefixed
    ObjectArray {
        /// Element schema
        elem: Arc<ObjectSchema>,
        /// Fixed element count, or `None` for length-prefixed
        len: Option<usize>,
    },
}

impl ObjectSchema {
    /// Fields in wire order.
    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    /// Position of a field by name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.field_index(name).map(|i| &self.fields[i])
    }

    /// Serialized size when every field is fixed-width, `None` otherwise.
    pub fn fixed_size(&self) -> Option<usize> {
        self.fixed_size
    }
}

impl SchemaNode {
    /// Serialized size when fixed, `None` when it depends on the message.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            SchemaNode::Primitive(p) => p.size(),
            SchemaNode::Object(obj) => obj.fixed_size(),
            SchemaNode::PrimitiveArray {
                elem,
                len: Some(n),
            } => elem.size().map(|s| s * n),
            SchemaNode::ObjectArray { elem, len: Some(n) } => {
                elem.fixed_size().map(|s| s * n)
            }
            SchemaNode::PrimitiveArray { len: None, .. }
            | SchemaNode::ObjectArray { len: None, .. } => None,
        }
    }

    /// Primitive kind, when this node is a primitive.
    pub fn primitive(&self) -> Option<PrimitiveType> {
        match self {
            SchemaNode::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    /// Nested message schema, when this node is an object.
    pub fn object(&self) -> Option<&Arc<ObjectSchema>> {
        match self {
            SchemaNode::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// True for either array shape.
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            SchemaNode::PrimitiveArray { .. } | SchemaNode::ObjectArray { .. }
        )
    }

    /// Fixed element count of an array node; `None` also for
    /// length-prefixed arrays.
    pub fn array_len(&self) -> Option<usize> {
        match self {
            SchemaNode::PrimitiveArray { len, .. } | SchemaNode::ObjectArray { len, .. } => *len,
            _ => None,
        }
    }

    /// Human-readable kind label, used in error messages and display.
    pub fn kind_name(&self) -> &'static str {
        match self {
            SchemaNode::Primitive(p) => p.name(),
            SchemaNode::Object(_) => "object",
            SchemaNode::PrimitiveArray { .. } | SchemaNode::ObjectArray { .. } => "array",
        }
    }
}

/// Resolve a parsed definition into the root type's schema.
pub fn resolve(def: &MessageDefinition) -> Result<Arc<ObjectSchema>> {
    let root_scope = def
        .root
        .split_once('/')
        .map(|(scope, _)| scope)
        .unwrap_or("");

    let mut resolver = Resolver {
        def,
        root_scope,
        cache: HashMap::new(),
    };
    let mut stack = Vec::new();
    resolver.resolve_block(0, &mut stack)
}

struct Resolver<'a> {
    def: &'a MessageDefinition,
    root_scope: &'a str,
    cache: HashMap<usize, Arc<ObjectSchema>>,
}

impl Resolver<'_> {
    fn resolve_block(&mut self, idx: usize, stack: &mut Vec<usize>) -> Result<Arc<ObjectSchema>> {
        if let Some(cached) = self.cache.get(&idx) {
            return Ok(cached.clone());
        }
        let block = &self.def.blocks[idx];
        if stack.contains(&idx) {
            return Err(BagError::parse(
                &self.def.root,
                format!("recursive type reference through '{}'", block.name),
            ));
        }
        stack.push(idx);

        let mut fields = Vec::with_capacity(block.fields.len());
        for field in &block.fields {
            let node = self.resolve_field_type(&field.ty, stack)?;
            fields.push(SchemaField {
                name: field.name.clone(),
                node,
            });
        }
        stack.pop();

        let fixed_size = fields
            .iter()
            .try_fold(0usize, |acc, f| f.node.fixed_size().map(|s| acc + s));
        let schema = Arc::new(ObjectSchema {
            name: block.name.clone(),
            fields,
            constants: block.constants.clone(),
            fixed_size,
        });
        self.cache.insert(idx, schema.clone());
        Ok(schema)
    }

    fn resolve_field_type(&mut self, ty: &FieldType, stack: &mut Vec<usize>) -> Result<SchemaNode> {
        match ty {
            FieldType::Primitive(p) => Ok(SchemaNode::Primitive(*p)),
            FieldType::Named(name) => {
                let idx = self.lookup(name)?;
                Ok(SchemaNode::Object(self.resolve_block(idx, stack)?))
            }
            FieldType::Array { elem, len } => match elem.as_ref() {
                FieldType::Primitive(p) => Ok(SchemaNode::PrimitiveArray {
                    elem: *p,
                    len: *len,
                }),
                FieldType::Named(name) => {
                    let idx = self.lookup(name)?;
                    Ok(SchemaNode::ObjectArray {
                        elem: self.resolve_block(idx, stack)?,
                        len: *len,
                    })
                }
                FieldType::Array { .. } => Err(BagError::parse(
                    &self.def.root,
                    "nested array types are not representable in .msg",
                )),
            },
        }
    }

    fn lookup(&self, name: &str) -> Result<usize> {
        let blocks = &self.def.blocks;
        if name.contains('/') {
            return blocks
                .iter()
                .position(|b| b.name == name)
                .ok_or_else(|| BagError::unknown_type(name));
        }

        let scoped = format!("{}/{}", self.root_scope, name);
        if let Some(idx) = blocks.iter().position(|b| b.name == scoped) {
            return Ok(idx);
        }
        if let Some(idx) = blocks.iter().position(|b| b.unqualified_name() == name) {
            return Ok(idx);
        }
        if name == "Header" {
            if let Some(idx) = blocks.iter().position(|b| b.name == "std_msgs/Header") {
                return Ok(idx);
            }
        }
        Err(BagError::unknown_type(name))
    }
}
