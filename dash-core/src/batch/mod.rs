//! ## dash-core::batch
//! **SAI-style command batches**
//!
//! A batch is the JSON array a scenario pushes to the device-under-test:
//!
//! ```json
//! [
//!   { "name": "vip_entry", "op": "create", "type": "SAI_OBJECT_TYPE_VIP_ENTRY",
//!     "key": { "switch_id": "$SWITCH_ID", "vip": "221.0.0.2" },
//!     "attributes": ["SAI_VIP_ENTRY_ATTR_ACTION", "SAI_VIP_ENTRY_ACTION_ACCEPT"] }
//! ]
//! ```
//!
//! Later commands may reference objects created by earlier ones, so a batch is
//! torn down by removing its objects in reverse order.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BatchError;

pub mod applier;

/// Operation carried by a [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Remove,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => f.write_str("create"),
            Operation::Remove => f.write_str("remove"),
        }
    }
}

/// One record of a command batch.
///
/// Fields the harness does not interpret are kept in `extra` so a batch
/// survives a load/serialize cycle unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    pub op: Operation,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Value>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub attributes: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Command {
    pub fn create(name: impl Into<String>) -> Self {
        Self::with_op(name, Operation::Create)
    }

    pub fn remove(name: impl Into<String>) -> Self {
        Self::with_op(name, Operation::Remove)
    }

    fn with_op(name: impl Into<String>, op: Operation) -> Self {
        Self {
            name: name.into(),
            op,
            object_type: None,
            key: None,
            attributes: Value::Null,
            extra: Map::new(),
        }
    }

    pub fn with_type(mut self, object_type: impl Into<String>) -> Self {
        self.object_type = Some(object_type.into());
        self
    }

    pub fn with_attributes(mut self, attributes: Value) -> Self {
        self.attributes = attributes;
        self
    }

    /// Returns the same command with its operation set to `remove`.
    pub fn to_remove(&self) -> Self {
        Self {
            op: Operation::Remove,
            ..self.clone()
        }
    }
}

/// An ordered sequence of commands submitted to the device as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandBatch {
    name: String,
    commands: Vec<Command>,
}

impl CommandBatch {
    pub fn new(name: impl Into<String>, commands: Vec<Command>) -> Self {
        Self {
            name: name.into(),
            commands,
        }
    }

    /// Parses a JSON array of commands.
    pub fn from_json_str(name: impl Into<String>, json: &str) -> Result<Self, BatchError> {
        let commands: Vec<Command> = serde_json::from_str(json)?;
        Ok(Self::new(name, commands))
    }

    /// Loads a batch from a JSON file; the batch is named after the file stem.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, BatchError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BatchError::FileNotFound(path.to_path_buf()));
        }
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "batch".into());
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(name, &content)
    }

    pub fn to_json_string(&self) -> Result<String, BatchError> {
        Ok(serde_json::to_string_pretty(&self.commands)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Command> {
        self.commands.iter()
    }

    /// Builds the teardown image of this batch: same commands, reverse order,
    /// every operation set to `remove`.
    pub fn reverted(&self) -> CommandBatch {
        CommandBatch {
            name: format!("{}-revert", self.name),
            commands: self.commands.iter().rev().map(Command::to_remove).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a CommandBatch {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}
