// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # Lazybag CLI
//!
//! Inspect ROS1 bag files from the command line.
//!
//! ## Usage
//!
//! ```sh
//! # Show bag summary
//! lazybag info drive.bag
//!
//! # List topics
//! lazybag topics drive.bag
//!
//! # Show the resolved schema of a topic
//! lazybag schema drive.bag /base_scan
//!
//! # Stream decoded messages
//! lazybag cat drive.bag --topics /base_scan,/odom --limit 10
//! ```

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use lazybag::{Bag, ObjectSchema, SchemaNode};

/// Lazybag - ROS1 bag inspection tool
#[derive(Parser)]
#[command(name = "lazybag")]
#[command(about = "Inspect ROS1 bag files", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show bag summary: counts, time range, connections
    Info {
        /// Input bag file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// List topics with type and message count
    Topics {
        /// Input bag file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Show the resolved schema of a topic
    Schema {
        /// Input bag file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Topic name
        #[arg(value_name = "TOPIC")]
        topic: String,
    },

    /// Stream decoded messages to stdout
    Cat {
        /// Input bag file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Comma-separated topic filter
        #[arg(short, long)]
        topics: Option<String>,

        /// Stop after this many messages
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Info { input } => cmd_info(input),
        Commands::Topics { input } => cmd_topics(input),
        Commands::Schema { input, topic } => cmd_schema(input, topic),
        Commands::Cat {
            input,
            topics,
            limit,
        } => cmd_cat(input, topics, limit),
    };
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn open(input: &Path) -> Result<Bag> {
    Bag::open(input).with_context(|| format!("failed to open {}", input.display()))
}

fn cmd_info(input: PathBuf) -> Result<()> {
    let bag = open(&input)?;

    println!("=== {} ===", input.display());
    println!("Index: {}", if bag.is_indexed() { "present" } else { "rebuilt from scan" });
    println!("Topics: {}", bag.topics().len());
    println!("Chunks: {}", bag.chunk_count());
    println!("Messages: {}", bag.message_count());
    if let (Some(start), Some(end)) = (bag.start_time(), bag.end_time()) {
        println!("Start: {start}");
        println!("End: {end}");
        println!("Duration: {}", end - start);
    }

    println!();
    println!("Connections:");
    for (topic, conns) in bag.connections_by_topic() {
        for conn in conns {
            println!(
                "  [{}] {} | {} | {} messages{}",
                conn.id,
                topic,
                conn.datatype,
                conn.message_count,
                if conn.latching { " | latching" } else { "" }
            );
        }
    }
    Ok(())
}

fn cmd_topics(input: PathBuf) -> Result<()> {
    let bag = open(&input)?;
    for (topic, conns) in bag.connections_by_topic() {
        let count: u64 = conns.iter().map(|c| c.message_count).sum();
        let datatype = conns
            .first()
            .map(|c| c.datatype.as_str())
            .unwrap_or("<unknown>");
        println!("{topic}  {datatype}  {count}");
    }
    Ok(())
}

fn cmd_schema(input: PathBuf, topic: String) -> Result<()> {
    let bag = open(&input)?;
    let schema = bag
        .schema(&topic)
        .with_context(|| format!("no schema for topic {topic}"))?;
    println!("{}", schema.name);
    print_object(&schema, 1);
    Ok(())
}

fn print_object(schema: &ObjectSchema, depth: usize) {
    let pad = "  ".repeat(depth);
    for field in schema.fields() {
        match &field.node {
            SchemaNode::Primitive(p) => println!("{pad}{} {}", p, field.name),
            SchemaNode::Object(obj) => {
                println!("{pad}{} {}", obj.name, field.name);
                print_object(obj, depth + 1);
            }
            SchemaNode::PrimitiveArray { elem, len } => {
                println!("{pad}{}[{}] {}", elem, fmt_len(*len), field.name)
            }
            SchemaNode::ObjectArray { elem, len } => {
                println!("{pad}{}[{}] {}", elem.name, fmt_len(*len), field.name);
                print_object(elem, depth + 1);
            }
        }
    }
}

fn fmt_len(len: Option<usize>) -> String {
    len.map(|n| n.to_string()).unwrap_or_default()
}

fn cmd_cat(input: PathBuf, topics: Option<String>, limit: Option<usize>) -> Result<()> {
    let bag = open(&input)?;
    let iter = match &topics {
        Some(list) => {
            let wanted: Vec<&str> = list.split(',').map(str::trim).collect();
            bag.read_messages_on(&wanted)?
        }
        None => bag.read_messages()?,
    };

    let limit = limit.unwrap_or(usize::MAX);
    for message in iter.take(limit) {
        let message = message?;
        let value = message.value()?;
        println!("{} @ {}: {}", message.topic(), message.timestamp(), value);
    }
    Ok(())
}
