#![deny(clippy::all, clippy::pedantic)]

use serde_json::Value;

use crate::client::CliError;

/// Split `users/byId` or `users.byId` into route segments.
pub fn parse_path(path: &str) -> Result<Vec<String>, CliError> {
    let segments: Vec<String> = path
        .split(['/', '.'])
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect();
    if segments.is_empty() {
        return Err(CliError::InvalidInput(format!("empty route `{path}`")));
    }
    Ok(segments)
}

pub fn parse_input(input: Option<&str>) -> Result<Option<Value>, CliError> {
    input
        .map(|text| {
            serde_json::from_str(text)
                .map_err(|e| CliError::InvalidInput(format!("input is not JSON: {e}")))
        })
        .transpose()
}

/// JSON when it parses, otherwise the raw text as a string.
pub fn parse_cursor(cursor: Option<&str>) -> Option<Value> {
    cursor.map(|text| {
        serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
    })
}

/// `path` or `path=JSON`.
pub fn parse_call(spec: &str) -> Result<(&str, Option<Value>), CliError> {
    match spec.split_once('=') {
        Some((path, input)) => Ok((path, parse_input(Some(input))?)),
        None => Ok((spec, None)),
    }
}

pub fn parse_headers(headers: &[String]) -> Result<Vec<(String, String)>, CliError> {
    headers
        .iter()
        .map(|header| {
            let (name, value) = header.split_once(':').ok_or_else(|| {
                CliError::InvalidInput(format!("header `{header}` must be NAME:VALUE"))
            })?;
            Ok((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}
