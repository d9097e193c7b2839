//! Resolve, validate and invoke versioned agent tool packages.
//!
//! A tool is an installed package directory holding an `agent.json` manifest
//! and the files its entrypoint needs. This crate finds the right installed
//! version for a specifier, validates the interpreter it asks for, and runs it
//! as an isolated child process that reads one JSON request on stdin and
//! prints one JSON result object on stdout.
//!
//! - [`PackageSpec`] / [`VersionToken`]: specifier parsing and version matching
//! - [`ToolLocator`]: search-root and name-directory discovery
//! - [`Manifest`]: the `agent.json` reader
//! - [`InterpreterResolver`]: whitelist, `PATH` lookup and runtime checks
//! - [`ProcessExecutor`]: sandboxed execution with output cap and deadline
//! - [`extract_json`]: trailing result extraction
//! - [`load`] / [`Tool`]: the facade tying it all together
//! - [`AgentTool`]: adapter for agent-orchestration frameworks
//!
//! # Example
//!
//! ```no_run
//! # async fn demo() -> agentool::ToolResult<()> {
//! use agentool::{LoadOptions, load_with_meta};
//! use serde_json::json;
//!
//! let loaded = load_with_meta("@zack/summarize@^0.1", LoadOptions::new()).await?;
//! println!("{} {}", loaded.meta.name, loaded.meta.version);
//! let result = loaded.tool.call(json!({"text": "hello world"})).await?;
//! println!("{result}");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod adapter;
pub mod dirs;
pub mod env;
pub mod error;
pub mod executor;
pub mod extract;
pub mod interpreter;
pub mod locator;
pub mod manifest;
mod platform;
pub mod sandbox;
pub mod settings;
pub mod spec;
pub mod tool;
pub mod truncate;
pub mod version;

pub use adapter::{AdapterOptions, AgentTool, FrameworkTool};
pub use dirs::{ToolHome, search_roots};
pub use env::RuntimeEnv;
pub use error::{ToolError, ToolResult};
pub use executor::ProcessExecutor;
pub use extract::extract_json;
pub use interpreter::{InterpreterFamily, InterpreterResolver, is_interpreter_match};
pub use locator::{DirLister, FsLister, LocatedTool, ToolLocator};
pub use manifest::{Entrypoint, Manifest, RuntimeDecl};
pub use settings::{ExecutionLimits, Settings};
pub use spec::PackageSpec;
pub use tool::{
    LoadOptions, LoadedTool, Tool, ToolMeta, ToolWithMeta, inspect, load, load_tool,
    load_with_meta, resolve,
};
pub use version::{VersionRange, VersionToken};
