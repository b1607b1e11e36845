// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! ROS .msg schema parsing and resolution.
//!
//! Two stages: [`parser`] turns a connection's `message_definition` text
//! into a raw [`ast::MessageDefinition`], and [`resolver`] turns that into
//! a tree of shared [`ObjectSchema`] nodes the value walker can drive.

pub mod ast;
pub mod parser;
pub mod resolver;

use std::sync::Arc;

use crate::core::Result;

pub use ast::{Constant, Field, FieldType, MessageDefinition, PrimitiveType, TypeBlock};
pub use parser::parse_definition;
pub use resolver::{resolve, ObjectSchema, SchemaField, SchemaNode};

/// Parse and resolve a message definition in one step.
pub fn parse_and_resolve(root_type: &str, text: &str) -> Result<Arc<ObjectSchema>> {
    let def = parse_definition(root_type, text)?;
    resolve(&def)
}
