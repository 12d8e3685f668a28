//! Line-delimited JSON messages between a pool and its worker processes

use std::io::{BufRead, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::task::{Arguments, TaskError, TaskOutcome};

/// Parent → child: run `function` with `arguments`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub index: usize,
    pub function: String,
    pub arguments: Arguments,
}

/// Child → parent: outcome for the request with the same index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReply {
    pub index: usize,
    pub outcome: WireOutcome,
}

/// Serializable [`TaskOutcome`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireOutcome {
    Ok(Value),
    Err(TaskError),
}

impl From<TaskOutcome> for WireOutcome {
    fn from(outcome: TaskOutcome) -> Self {
        match outcome {
            Ok(value) => WireOutcome::Ok(value),
            Err(error) => WireOutcome::Err(error),
        }
    }
}

impl From<WireOutcome> for TaskOutcome {
    fn from(outcome: WireOutcome) -> Self {
        match outcome {
            WireOutcome::Ok(value) => Ok(value),
            WireOutcome::Err(error) => Err(error),
        }
    }
}

/// Write one message followed by a newline, then flush
pub fn write_message<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<()> {
    serde_json::to_writer(&mut *writer, message)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Read the next non-blank line as a message. `None` at end of stream.
pub fn read_message<R: BufRead, T: DeserializeOwned>(reader: &mut R) -> Result<Option<T>> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        return serde_json::from_str(trimmed).map(Some).map_err(|e| {
            Error::protocol(format!("{} in line '{}'", e, preview(trimmed)))
        });
    }
}

fn preview(line: &str) -> String {
    const LIMIT: usize = 80;
    match line.char_indices().nth(LIMIT) {
        Some((cut, _)) => format!("{}...", &line[..cut]),
        None => line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    #[test]
    fn test_reply_wire_format() {
        let reply = JobReply {
            index: 2,
            outcome: WireOutcome::Ok(json!(4)),
        };
        let mut buffer = Vec::new();
        write_message(&mut buffer, &reply).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), "{\"index\":2,\"outcome\":{\"ok\":4}}\n");
    }

    #[test]
    fn test_error_outcome_wire_format() {
        let outcome = WireOutcome::from(TaskOutcome::Err(TaskError::failed("boom")));
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"err": {"kind": "failed", "message": "boom"}})
        );
    }

    #[test]
    fn test_read_skips_blank_lines_and_stops_at_eof() {
        let input = "\n{\"index\":0,\"function\":\"square\",\"arguments\":{\"number\":3}}\n\n";
        let mut reader = Cursor::new(input);

        let request: JobRequest = read_message(&mut reader).unwrap().unwrap();
        assert_eq!(request.function, "square");
        assert_eq!(request.arguments.get::<i64>("number").unwrap(), 3);

        assert!(read_message::<_, JobRequest>(&mut reader).unwrap().is_none());
    }

    #[test]
    fn test_malformed_line() {
        let mut reader = Cursor::new("not json\n");
        let err = read_message::<_, JobReply>(&mut reader).unwrap_err();
        assert!(matches!(err, Error::ProtocolMalformed { .. }));
        assert!(err.to_string().contains("not json"));
    }
}
