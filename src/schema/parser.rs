// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Pest-driven parser for ROS .msg definitions.
//!
//! The grammar lives in `msg.pest`. Connection records carry the root type's
//! field list concatenated with every transitively referenced sub-type, each
//! introduced by a `MSG: pkg/Type` header behind a separator line. Comments
//! and blank lines are tolerated anywhere. Constant declarations are kept
//! apart from fields; they never appear on the wire.

use std::mem;

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::core::{BagError, Result};
use crate::schema::ast::{Constant, Field, FieldType, MessageDefinition, PrimitiveType, TypeBlock};

#[derive(Parser)]
#[grammar = "schema/msg.pest"] // Path relative to src/ directory
struct MsgParser;

/// Parse a connection's `message_definition` text.
///
/// `root_type` names the first block (e.g. "nav_msgs/Odometry"); it comes
/// from the connection record, not from the definition text itself.
pub fn parse_definition(root_type: &str, text: &str) -> Result<MessageDefinition> {
    let mut parsed = MsgParser::parse(Rule::schema, text)
        .map_err(|e| BagError::parse(root_type, e.to_string()))?;
    let schema = parsed
        .next()
        .ok_or_else(|| BagError::parse(root_type, "empty parse result"))?;

    let mut blocks = Vec::new();
    let mut current = TypeBlock::new(root_type);

    for item in schema.into_inner() {
        match item.as_rule() {
            Rule::separator | Rule::EOI => {}
            Rule::msg_header => {
                let name = item
                    .into_inner()
                    .next()
                    .ok_or_else(|| BagError::parse(root_type, "MSG header without a type name"))?
                    .as_str();
                blocks.push(mem::replace(&mut current, TypeBlock::new(name)));
            }
            Rule::statement => match parse_statement(item, root_type)? {
                Decl::Field(field) => current.fields.push(field),
                Decl::Constant(constant) => current.constants.push(constant),
            },
            _ => {}
        }
    }
    blocks.push(current);

    Ok(MessageDefinition {
        root: root_type.to_string(),
        blocks,
    })
}

enum Decl {
    Field(Field),
    Constant(Constant),
}

fn parse_statement(pair: Pair<'_, Rule>, context: &str) -> Result<Decl> {
    let mut inner = pair.into_inner();

    let type_spec = inner
        .next()
        .ok_or_else(|| BagError::parse(context, "declaration without a type"))?;
    let (base, array_len, is_array) = parse_type_spec(type_spec, context)?;

    let name = inner
        .next()
        .ok_or_else(|| BagError::parse(context, "declaration without a name"))?
        .as_str()
        .to_string();

    if let Some(value) = inner.next() {
        // Constant declaration: `TYPE NAME = VALUE`
        let value = value.as_str().trim().to_string();
        if value.is_empty() {
            return Err(BagError::parse(
                context,
                format!("constant '{name}' has no value"),
            ));
        }
        if is_array {
            return Err(BagError::parse(
                context,
                format!("constant '{name}' cannot be an array"),
            ));
        }
        let ty = match base {
            FieldType::Primitive(p) => p,
            FieldType::Named(ty) => {
                return Err(BagError::parse(
                    context,
                    format!("constant '{name}' must have a primitive type, found '{ty}'"),
                ))
            }
            FieldType::Array { .. } => {
                return Err(BagError::parse(
                    context,
                    format!("constant '{name}' cannot be an array"),
                ))
            }
        };
        return Ok(Decl::Constant(Constant { name, ty, value }));
    }

    let ty = if is_array {
        FieldType::Array {
            elem: Box::new(base),
            len: array_len,
        }
    } else {
        base
    };
    Ok(Decl::Field(Field { name, ty }))
}

fn parse_type_spec(
    pair: Pair<'_, Rule>,
    context: &str,
) -> Result<(FieldType, Option<usize>, bool)> {
    let mut inner = pair.into_inner();
    let path = inner
        .next()
        .ok_or_else(|| BagError::parse(context, "empty type specifier"))?
        .as_str();

    let base = match PrimitiveType::try_from_str(path) {
        Some(p) => FieldType::Primitive(p),
        None => FieldType::Named(path.to_string()),
    };

    match inner.next() {
        Some(suffix) => {
            let len = match suffix.into_inner().next() {
                Some(digits) => Some(digits.as_str().parse::<usize>().map_err(|e| {
                    BagError::parse(context, format!("bad array length for '{path}': {e}"))
                })?),
                None => None,
            };
            Ok((base, len, true))
        }
        None => Ok((base, None, false)),
    }
}
