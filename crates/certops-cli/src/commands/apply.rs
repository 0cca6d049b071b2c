//! Apply command - reconcile a manifest stream against the cluster

use std::path::Path;

use console::style;
use miette::{IntoDiagnostic, Result};
use tokio::io::{AsyncBufRead, BufReader};

use certops_kube::{ApplyEngine, ClusterApplyClient, ClusterSink, ManifestSink, WriterSink};

/// Run the apply command
pub async fn run(file: &Path, stdout: bool) -> Result<()> {
    let reader = open_manifest(file).await?;

    // Two sinks share one contract: consume the document stream, fail on
    // the first document that cannot be applied or written.
    if stdout {
        let mut sink = WriterSink::new(tokio::io::stdout());
        sink.consume(reader).await.into_diagnostic()?;
        return Ok(());
    }

    let client = kube::Client::try_default().await.into_diagnostic()?;
    let engine = ApplyEngine::new(ClusterApplyClient::new(client).await.into_diagnostic()?);
    let mut sink = ClusterSink::new(engine);
    sink.consume(reader).await.into_diagnostic()?;

    if let Some(summary) = sink.summary() {
        for name in &summary.created {
            println!("{} {} created", style("✓").green().bold(), name);
        }
        for name in &summary.patched {
            println!("{} {} configured", style("✓").green().bold(), name);
        }
        println!(
            "{} Applied {} resource(s): {}",
            style("→").blue().bold(),
            summary.total(),
            summary.summary()
        );
    }

    Ok(())
}

/// Open the manifest source; `-` means stdin
async fn open_manifest(file: &Path) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    if file.as_os_str() == "-" {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    let handle = tokio::fs::File::open(file).await.into_diagnostic()?;
    Ok(Box::new(BufReader::new(handle)))
}
