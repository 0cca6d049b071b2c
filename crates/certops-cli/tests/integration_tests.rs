//! Integration tests for CLI commands
//!
//! Only the cluster-free paths are exercised here: the stdout apply sink
//! and the restore classifier. Cluster-backed paths are covered by the
//! library's mock-client tests.

use std::io::Write;
use std::process::{Command, Stdio};

/// Helper to run the certops binary
fn certops(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_certops"))
        .args(args)
        .output()
        .expect("Failed to execute certops")
}

const MANIFEST: &str = "\
apiVersion: v1
kind: Secret
metadata:
  name: operator-credentials
  namespace: certops
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: operator
  namespace: certops
";

mod apply_command {
    use super::*;

    #[test]
    fn test_apply_stdout_copies_stream_verbatim() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MANIFEST.as_bytes()).unwrap();

        let output = certops(&["apply", file.path().to_str().unwrap(), "--stdout"]);
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout), MANIFEST);
    }

    #[test]
    fn test_apply_stdout_reads_stdin() {
        let mut child = Command::new(env!("CARGO_BIN_EXE_certops"))
            .args(["apply", "-", "--stdout"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .expect("Failed to spawn certops");
        child
            .stdin
            .as_mut()
            .unwrap()
            .write_all(MANIFEST.as_bytes())
            .unwrap();
        let output = child.wait_with_output().unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout), MANIFEST);
    }

    #[test]
    fn test_apply_missing_file_fails() {
        let output = certops(&["apply", "/no/such/manifest.yaml", "--stdout"]);
        assert!(!output.status.success());
    }
}

mod restore_command {
    use super::*;

    const BACKUP: &str = "\
apiVersion: cert-manager.io/v1
kind: Issuer
metadata:
  name: letsencrypt
  namespace: default
spec:
  selfSigned: {}
---
apiVersion: awspca.cert-manager.io/v1beta1
kind: AWSPCAIssuer
metadata:
  name: pca
  namespace: default
spec: {}
";

    #[test]
    fn test_restore_prints_typed_issuers_and_missed_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(BACKUP.as_bytes()).unwrap();

        let output = certops(&["restore", file.path().to_str().unwrap()]);
        assert!(output.status.success());

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("kind: Issuer"));
        assert!(stdout.contains("name: letsencrypt"));
        // The unconvertible issuer is surfaced on stderr, not exported
        assert!(!stdout.contains("AWSPCAIssuer"));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("AWSPCAIssuer/pca"));
    }

    #[test]
    fn test_restore_empty_backup_reports_nothing_found() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"---\n").unwrap();

        let output = certops(&["restore", file.path().to_str().unwrap()]);
        assert!(output.status.success());
        assert!(output.stdout.is_empty());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("No issuers found"));
    }
}
