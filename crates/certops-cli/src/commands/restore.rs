//! Restore command - re-type issuers from a backup file

use std::path::Path;

use console::style;
use miette::{IntoDiagnostic, Result};
use serde_json::Value;

use certops_kube::RestoredIssuers;

/// Run the restore command
pub async fn run(file: &Path) -> Result<()> {
    let restored = certops_kube::extract(file).await.into_diagnostic()?;

    if restored.is_empty() {
        eprintln!("{} No issuers found in {}", style("⚠").yellow(), file.display());
        return Ok(());
    }

    // The re-typed issuers go to stdout as a YAML stream ready for
    // `certops apply -`.
    let manifest = render_manifest(&restored)?;
    print!("{}", manifest);

    eprintln!(
        "{} Restored {} issuer(s)",
        style("✓").green().bold(),
        restored.restored_count()
    );

    // Issuers the tooling cannot convert are advisory, not errors; list
    // them so the operator can migrate manually.
    if !restored.missed_issuers.is_empty() {
        eprintln!(
            "{} {} issuer(s) could not be converted and need manual migration:",
            style("⚠").yellow(),
            restored.missed_issuers.len()
        );
        for missed in &restored.missed_issuers {
            eprintln!("    {}", style(missed).cyan());
        }
    }

    Ok(())
}

/// Serialize every restored issuer as one `---`-joined YAML stream
fn render_manifest(restored: &RestoredIssuers) -> Result<String> {
    let mut documents: Vec<Value> = Vec::new();
    for issuer in &restored.cert_manager_issuers {
        documents.push(serde_json::to_value(issuer).into_diagnostic()?);
    }
    for issuer in &restored.cert_manager_cluster_issuers {
        documents.push(serde_json::to_value(issuer).into_diagnostic()?);
    }
    for issuer in &restored.venafi_issuers {
        documents.push(serde_json::to_value(issuer).into_diagnostic()?);
    }
    for issuer in &restored.venafi_cluster_issuers {
        documents.push(serde_json::to_value(issuer).into_diagnostic()?);
    }

    let mut out = String::new();
    for (i, doc) in documents.iter().enumerate() {
        if i > 0 {
            out.push_str("---\n");
        }
        out.push_str(&serde_yaml::to_string(doc).into_diagnostic()?);
    }
    Ok(out)
}
