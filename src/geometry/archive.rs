// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Serialization sink for geometries

use crate::error::{GeomResult, GeometryError};
use serde_json::{Map, Value};

/// Bidirectional archive: writing when [`is_output`](Archive::is_output),
/// reading otherwise.
pub trait Archive {
    fn is_output(&self) -> bool;

    /// Exchange a named entry. Output archives store `value`; input
    /// archives overwrite it with the stored entry.
    fn exchange(&mut self, key: &str, value: &mut Value) -> GeomResult<()>;
}

/// In-memory archive backed by a JSON object
#[derive(Debug, Clone, Default)]
pub struct JsonArchive {
    output: bool,
    entries: Map<String, Value>,
}

impl JsonArchive {
    pub fn writer() -> Self {
        Self {
            output: true,
            entries: Map::new(),
        }
    }

    /// Input archive over a previously written JSON object
    pub fn reader(json: Value) -> GeomResult<Self> {
        match json {
            Value::Object(entries) => Ok(Self {
                output: false,
                entries,
            }),
            other => Err(GeometryError::Archive(format!(
                "expected a JSON object, found {other}"
            ))),
        }
    }

    pub fn into_json(self) -> Value {
        Value::Object(self.entries)
    }
}

impl Archive for JsonArchive {
    fn is_output(&self) -> bool {
        self.output
    }

    fn exchange(&mut self, key: &str, value: &mut Value) -> GeomResult<()> {
        if self.output {
            self.entries.insert(key.to_string(), value.clone());
            return Ok(());
        }
        *value = self
            .entries
            .get(key)
            .cloned()
            .ok_or_else(|| GeometryError::Archive(format!("missing entry '{key}'")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_then_read() -> GeomResult<()> {
        let mut out = JsonArchive::writer();
        out.exchange("answer", &mut json!(42))?;

        let mut input = JsonArchive::reader(out.into_json())?;
        assert!(!input.is_output());
        let mut value = Value::Null;
        input.exchange("answer", &mut value)?;
        assert_eq!(value, json!(42));

        assert!(input.exchange("missing", &mut value).is_err());
        Ok(())
    }

    #[test]
    fn test_reader_requires_object() {
        assert!(JsonArchive::reader(json!([1, 2])).is_err());
    }
}
