//! Certops CLI - manage cluster-resident certificate tooling

use clap::{Parser, Subcommand, ValueEnum};
use miette::Result;
use std::path::PathBuf;

use certops_kube::BackupFormat;

mod commands;

#[derive(Parser)]
#[command(name = "certops")]
#[command(author = "Certops Contributors")]
#[command(version)]
#[command(about = "Manage cluster-resident certificate tooling", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

/// Serialization format for exported backups
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// `---`-separated YAML document stream
    Yaml,
    /// JSON List envelope
    Json,
}

impl From<OutputFormat> for BackupFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Yaml => BackupFormat::Yaml,
            OutputFormat::Json => BackupFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a manifest stream to the cluster (or print it verbatim)
    Apply {
        /// Manifest file to apply; `-` reads from stdin
        file: PathBuf,

        /// Write the manifest stream to stdout instead of the cluster
        /// (dry-run / GitOps mode)
        #[arg(long)]
        stdout: bool,
    },

    /// Export installed issuers, certificates and policies
    Backup {
        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: OutputFormat,

        /// Write the backup to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip issuers of every installed kind
        #[arg(long)]
        skip_issuers: bool,

        /// Skip Certificates
        #[arg(long)]
        skip_certificates: bool,

        /// Skip CertificateRequestPolicies
        #[arg(long)]
        skip_policies: bool,

        /// Keep server-managed fields (uid, resourceVersion, status, ...)
        #[arg(long)]
        no_redact: bool,
    },

    /// Re-type issuers from a backup file for operator migration
    Restore {
        /// Backup file (YAML stream or JSON List envelope)
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();

    if cli.debug {
        // SAFETY: We're the only thread touching the environment at this
        // point (start of main)
        unsafe { std::env::set_var("RUST_BACKTRACE", "1") };
        tracing_subscriber::fmt()
            .with_env_filter("certops=debug,certops_kube=debug")
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Apply { file, stdout } => commands::apply::run(&file, stdout).await,

        Commands::Backup {
            format,
            output,
            skip_issuers,
            skip_certificates,
            skip_policies,
            no_redact,
        } => {
            let options = certops_kube::BackupOptions {
                include_issuers: !skip_issuers,
                include_certificates: !skip_certificates,
                include_policies: !skip_policies,
                redact: !no_redact,
            };
            commands::backup::run(format.into(), output.as_deref(), &options).await
        }

        Commands::Restore { file } => commands::restore::run(&file).await,
    }
}
