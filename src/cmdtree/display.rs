//! Renders the value an action returned, per `--format`.

use serde_json::Value;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Text,
    Json,
    None,
}

impl Format {
    pub fn from_flag(value: Option<&str>) -> Self {
        match value {
            Some("json") => Format::Json,
            Some("none") => Format::None,
            _ => Format::Text,
        }
    }
}

pub fn display(value: &Value, format: Format, out: &mut dyn Write) -> io::Result<()> {
    match format {
        Format::None => Ok(()),
        Format::Json => {
            let text = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
            writeln!(out, "{text}")
        }
        Format::Text => write_text(value, out),
    }
}

fn write_text(value: &Value, out: &mut dyn Write) -> io::Result<()> {
    match value {
        Value::Null => Ok(()),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                if index > 0 && item.is_object() {
                    writeln!(out, "---")?;
                }
                write_text(item, out)?;
            }
            Ok(())
        }
        Value::Object(map) => {
            for (key, item) in map {
                writeln!(out, "{key}: {}", scalar(item))?;
            }
            Ok(())
        }
        other => writeln!(out, "{}", scalar(other)),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
