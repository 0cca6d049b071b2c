//! Streaming scanner for multi-document YAML manifests
//!
//! Splits a byte stream of `---`-separated YAML documents and hands each
//! parsed document to a callback, without buffering the whole stream.
//! Empty documents (consecutive, leading, or trailing separators) are
//! skipped silently. Iteration is cooperatively cancellable and aborts on
//! the first callback error.

use std::future::Future;

use kube::api::DynamicObject;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;

use crate::error::{CertopsError, Result};

/// The YAML document separator; only lines that are exactly this split
const DOCUMENT_SEPARATOR: &str = "---";

/// Scan a stream of concatenated YAML documents, invoking `callback` for
/// each non-empty document in stream order.
///
/// The cancellation token is checked before each line read; cancellation
/// returns [`CertopsError::Cancelled`] without invoking the callback for a
/// partially read buffer. A callback error aborts iteration and propagates
/// verbatim.
pub async fn for_each<R, F, Fut>(
    reader: R,
    token: &CancellationToken,
    mut callback: F,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(DynamicObject) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut lines = reader.lines();
    let mut buffer = String::new();
    let mut index = 0usize;

    loop {
        if token.is_cancelled() {
            return Err(CertopsError::Cancelled);
        }

        match lines.next_line().await? {
            Some(line) => {
                if line == DOCUMENT_SEPARATOR {
                    if let Some(doc) = parse_document(&buffer, index)? {
                        index += 1;
                        callback(doc).await?;
                    }
                    buffer.clear();
                } else {
                    buffer.push_str(&line);
                    buffer.push('\n');
                }
            }
            None => {
                // EOF: flush whatever is left in the buffer
                if let Some(doc) = parse_document(&buffer, index)? {
                    callback(doc).await?;
                }
                return Ok(());
            }
        }
    }
}

/// Parse one buffered document; blank and comment-only buffers yield `None`
fn parse_document(buffer: &str, index: usize) -> Result<Option<DynamicObject>> {
    if buffer.trim().is_empty() {
        return Ok(None);
    }

    let value: Value = serde_yaml::from_str(buffer)
        .map_err(|e| CertopsError::InvalidDocument(format!("document {}: {}", index, e)))?;
    if value.is_null() {
        return Ok(None);
    }

    let doc: DynamicObject = serde_json::from_value(value)
        .map_err(|e| CertopsError::InvalidDocument(format!("document {}: {}", index, e)))?;
    Ok(Some(doc))
}
