//! JSON I/O handling for CLI
//!
//! - Input: single JSON object via stdin
//! - Output: single JSON envelope via stdout

use std::io::{self, Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Read one JSON request from stdin
pub fn read_request<T: DeserializeOwned>() -> CliResult<T> {
    let mut input = String::new();
    io::stdin().lock().read_to_string(&mut input)?;
    parse_request(&input)
}

fn parse_request<T: DeserializeOwned>(input: &str) -> CliResult<T> {
    if input.trim().is_empty() {
        return Err(CliError::io_error("Empty input"));
    }
    Ok(serde_json::from_str(input)?)
}

/// Success envelope around `data`
pub fn ok_envelope<T: Serialize>(data: &T) -> CliResult<Value> {
    Ok(serde_json::json!({
        "status": "ok",
        "data": serde_json::to_value(data)?
    }))
}

/// Error envelope for `error`
pub fn error_envelope(error: &CliError) -> Value {
    serde_json::json!({
        "status": "error",
        "code": error.code_str(),
        "message": error.message()
    })
}

/// Write a success response to stdout
pub fn write_response<T: Serialize>(data: &T) -> CliResult<()> {
    write_value(&ok_envelope(data)?)
}

/// Write an error response to stdout
pub fn write_error(error: &CliError) -> CliResult<()> {
    write_value(&error_envelope(error))
}

fn write_value(value: &Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}
