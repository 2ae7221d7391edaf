//! Length-prefixed JSON-RPC 2.0 framing, exactly as LSP specifies it: a
//! bit-exact compatibility boundary, not a place for local shortcuts
//! (§6). `Content-Length: N\r\n\r\n<body>`.

use crate::error::{ForgeError, Result};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, value: &Value) -> Result<()> {
    let body = serde_json::to_vec(value)?;
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    writer
        .write_all(header.as_bytes())
        .await
        .map_err(|e| ForgeError::ProcessFailure(format!("lsp write failed: {e}")))?;
    writer
        .write_all(&body)
        .await
        .map_err(|e| ForgeError::ProcessFailure(format!("lsp write failed: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| ForgeError::ProcessFailure(format!("lsp flush failed: {e}")))?;
    Ok(())
}

/// Returns `Ok(None)` on a clean EOF (the subprocess exited).
pub async fn read_message<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<Value>> {
    let mut content_length: Option<usize> = None;
    loop {
        let mut line = String::new();
        let read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| ForgeError::ServerClosed(format!("lsp read failed: {e}")))?;
        if read == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some(value) = trimmed.strip_prefix("Content-Length: ") {
            content_length = value.trim().parse().ok();
        }
    }

    let Some(len) = content_length else {
        return Err(ForgeError::ServerClosed("lsp message missing Content-Length".to_string()));
    };

    let mut body = vec![0u8; len];
    tokio::io::AsyncReadExt::read_exact(reader, &mut body)
        .await
        .map_err(|e| ForgeError::ServerClosed(format!("lsp body read failed: {e}")))?;

    let value = serde_json::from_slice(&body)?;
    Ok(Some(value))
}

pub fn request(id: u64, method: &str, params: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}

pub fn notification(method: &str, params: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn round_trips_a_message() {
        let value = serde_json::json!({"jsonrpc": "2.0", "id": 1, "result": "ok"});
        let mut buf = Vec::new();
        write_message(&mut buf, &value).await.unwrap();

        let mut reader = tokio::io::BufReader::new(Cursor::new(buf));
        let decoded = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(decoded, value);
    }

    #[tokio::test]
    async fn eof_yields_none() {
        let mut reader = tokio::io::BufReader::new(Cursor::new(Vec::new()));
        assert!(read_message(&mut reader).await.unwrap().is_none());
    }
}
