//! Backup command - export installed cert-manager resources

use std::path::Path;

use console::style;
use miette::{IntoDiagnostic, Result};

use certops_kube::{BackupExporter, BackupFormat, BackupOptions};

/// Run the backup command
pub async fn run(
    format: BackupFormat,
    output: Option<&Path>,
    options: &BackupOptions,
) -> Result<()> {
    let client = kube::Client::try_default().await.into_diagnostic()?;
    let exporter = BackupExporter::new(client);

    let backup = exporter.export(options).await.into_diagnostic()?;

    // Advisory findings go to stderr so the bundle on stdout stays clean
    for cert in &backup.skipped_certificates {
        eprintln!(
            "{} skipping ingress-managed certificate {} (regenerated automatically)",
            style("⚠").yellow(),
            style(cert).cyan()
        );
    }

    let serialized = backup.bundle.serialize(format).into_diagnostic()?;
    match output {
        Some(path) => {
            tokio::fs::write(path, &serialized).await.into_diagnostic()?;
            eprintln!(
                "{} Exported {} resource(s) to {}",
                style("✓").green().bold(),
                backup.bundle.len(),
                path.display()
            );
        }
        None => {
            print!("{}", serialized);
            eprintln!(
                "{} Exported {} resource(s)",
                style("✓").green().bold(),
                backup.bundle.len()
            );
        }
    }

    Ok(())
}
