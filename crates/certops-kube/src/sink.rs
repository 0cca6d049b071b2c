//! Sinks for installation manifest streams
//!
//! The surrounding CLI hands the same byte stream of concatenated YAML
//! documents to one of two sinks: a cluster sink that reconciles every
//! document against the API server, or a writer sink that copies the
//! stream verbatim for dry-run/GitOps workflows. Both share the contract
//! "consume the stream; error if any document fails to apply or write".

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};

use crate::apply::{ApplyClient, ApplyEngine, ApplySummary};
use crate::error::Result;

/// A consumer of a manifest byte stream
#[async_trait]
pub trait ManifestSink {
    /// Consume the whole stream; the first failing document is fatal
    async fn consume<R>(&mut self, reader: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin + Send;
}

/// Applies every document to the cluster through an [`ApplyEngine`]
pub struct ClusterSink<C: ApplyClient> {
    engine: ApplyEngine<C>,
    last_summary: Option<ApplySummary>,
}

impl<C: ApplyClient> ClusterSink<C> {
    pub fn new(engine: ApplyEngine<C>) -> Self {
        Self {
            engine,
            last_summary: None,
        }
    }

    /// Summary of the most recent consumed stream, if any
    pub fn summary(&self) -> Option<&ApplySummary> {
        self.last_summary.as_ref()
    }
}

#[async_trait]
impl<C: ApplyClient> ManifestSink for ClusterSink<C> {
    async fn consume<R>(&mut self, reader: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        let summary = self.engine.apply_stream(reader).await?;
        self.last_summary = Some(summary);
        Ok(())
    }
}

/// Copies the stream verbatim to a writer (stdout in the CLI), without
/// parsing or reordering anything
pub struct WriterSink<W> {
    writer: W,
}

impl<W> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Recover the inner writer (used by tests)
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W> ManifestSink for WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn consume<R>(&mut self, reader: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        let mut reader = reader;
        tokio::io::copy_buf(&mut reader, &mut self.writer).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::MockApplyClient;

    const MANIFEST: &str = "\
apiVersion: v1
kind: Secret
metadata:
  name: creds
  namespace: certops
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: agent
  namespace: certops
";

    #[tokio::test]
    async fn test_writer_sink_copies_stream_verbatim() {
        let mut sink = WriterSink::new(Vec::new());
        sink.consume(MANIFEST.as_bytes()).await.unwrap();
        let written = sink.into_inner();
        assert_eq!(written, MANIFEST.as_bytes());
    }

    #[tokio::test]
    async fn test_cluster_sink_applies_every_document() {
        let engine = ApplyEngine::new(MockApplyClient::new());
        let mut sink = ClusterSink::new(engine);
        sink.consume(MANIFEST.as_bytes()).await.unwrap();
        let summary = sink.summary().unwrap();
        assert_eq!(summary.total(), 2);
    }
}
