//! Integration tests for upkeep
//!
//! These tests verify:
//! - Full update cycles against a mock distribution server
//! - Installation atomicity under download and install failures
//! - Per-target isolation and serialization of duplicate targets
//! - Extension-style targets with a local manifest

use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use upkeep::domain::{UpdateOutcome, UpdateTarget};
use upkeep::orchestrator::{Orchestrator, OrchestratorConfig};
use upkeep::remote::{HttpClient, RetryPolicy};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::write::SimpleFileOptions;

/// Build a zip whose single root directory holds `files`
fn archive(root: &str, files: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in files {
        zip.start_file(format!("{root}/{name}"), options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Snapshot of every file below `dir`, relative path → content
fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    fn walk(base: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(base, &path, out);
            } else {
                let rel = path.strip_prefix(base).unwrap().to_path_buf();
                out.insert(rel, fs::read(&path).unwrap());
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(dir, dir, &mut out);
    out
}

fn orchestrator() -> Orchestrator {
    let config = OrchestratorConfig {
        retry: RetryPolicy::fixed(3, Duration::ZERO),
        manifest_timeout: Duration::from_secs(5),
        download_idle_timeout: Duration::from_secs(5),
        keep_failed_scratch: false,
        ..OrchestratorConfig::default()
    };
    Orchestrator::with_client(config, HttpClient::new().unwrap())
}

async fn mount_json(server: &MockServer, route: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_zip(server: &MockServer, route: &str, body: Vec<u8>, expected: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .expect(expected)
        .mount(server)
        .await;
}

/// Main application target with an existing 1.0.0 installation
fn installed_python(root: &Path, server: &MockServer) -> UpdateTarget {
    let install = root.join("Programme-main");
    fs::create_dir_all(install.join("Python")).unwrap();
    fs::write(install.join("Python").join("version.txt"), "1.0.0").unwrap();
    fs::write(install.join("main.py"), "print('v1.0.0')").unwrap();
    fs::write(install.join("legacy.py"), "removed in 1.0.1").unwrap();

    UpdateTarget::new(
        "python",
        &install,
        install.join("Python").join("version.txt"),
        "version_python",
        format!("{}/version.json", server.uri()),
        format!("{}/main.zip", server.uri()),
    )
}

mod update_cycle {
    use super::*;

    #[tokio::test]
    async fn test_update_replaces_tree_and_records_version() {
        let server = MockServer::start().await;
        mount_json(&server, "/version.json", json!({"version_python": "1.0.1"})).await;
        mount_zip(
            &server,
            "/main.zip",
            archive(
                "Programme-main-release",
                &[("main.py", "print('v1.0.1')"), ("Python/version.txt", "1.0.0")],
            ),
            1,
        )
        .await;

        let dir = TempDir::new().unwrap();
        let target = installed_python(dir.path(), &server);

        let report = orchestrator().check_and_update(&[target.clone()]).await;

        assert_eq!(report.outcome("python"), Some(&UpdateOutcome::updated("1.0.1")));
        assert_eq!(report.targets[0].previous.as_deref(), Some("1.0.0"));

        let files = snapshot(&target.install_dir);
        let names: Vec<_> = files.keys().cloned().collect();
        assert_eq!(
            names,
            vec![PathBuf::from("Python/version.txt"), PathBuf::from("main.py")]
        );
        assert_eq!(files[&PathBuf::from("main.py")], b"print('v1.0.1')");
        assert_eq!(fs::read_to_string(&target.version_file).unwrap(), "1.0.1");
    }

    #[tokio::test]
    async fn test_second_cycle_is_idempotent() {
        let server = MockServer::start().await;
        mount_json(&server, "/version.json", json!({"version_python": "1.0.1"})).await;
        mount_zip(
            &server,
            "/main.zip",
            archive("root", &[("main.py", "print('v1.0.1')")]),
            1,
        )
        .await;

        let dir = TempDir::new().unwrap();
        let target = installed_python(dir.path(), &server);
        let orchestrator = orchestrator();

        let first = orchestrator.check_and_update(&[target.clone()]).await;
        assert_eq!(first.updated(), 1);
        let before = snapshot(&target.install_dir);

        let second = orchestrator.check_and_update(&[target.clone()]).await;
        assert_eq!(second.outcome("python"), Some(&UpdateOutcome::UpToDate));
        assert_eq!(snapshot(&target.install_dir), before);
    }

    #[tokio::test]
    async fn test_bundle_with_two_versions_settles_after_one_install() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/version.json",
            json!({"version_python": "1.0.1", "version_interface": "1.0.1"}),
        )
        .await;
        mount_zip(
            &server,
            "/main.zip",
            archive("root", &[("main.py", "print('v1.0.1')"), ("interface/ui.js", "ui")]),
            1,
        )
        .await;

        let dir = TempDir::new().unwrap();
        let python = installed_python(dir.path(), &server);
        let interface_file = python.install_dir.join("interface").join("version.txt");
        let bundle = python.with_extra_version("version_interface", &interface_file);
        let orchestrator = orchestrator();

        let first = orchestrator.check_and_update(&[bundle.clone()]).await;
        assert_eq!(first.outcome("python"), Some(&UpdateOutcome::updated("1.0.1")));
        assert_eq!(fs::read_to_string(&bundle.version_file).unwrap(), "1.0.1");
        assert_eq!(fs::read_to_string(&interface_file).unwrap(), "1.0.1");

        for _ in 0..2 {
            let next = orchestrator.check_and_update(&[bundle.clone()]).await;
            assert_eq!(next.outcome("python"), Some(&UpdateOutcome::UpToDate));
        }
    }

    #[tokio::test]
    async fn test_bundle_updates_when_only_second_version_changes() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/version.json",
            json!({"version_python": "1.0.0", "version_interface": "2.0.0"}),
        )
        .await;
        mount_zip(&server, "/main.zip", archive("root", &[("main.py", "new")]), 1).await;

        let dir = TempDir::new().unwrap();
        let python = installed_python(dir.path(), &server);
        let interface_file = python.install_dir.join("interface").join("version.txt");
        fs::create_dir_all(interface_file.parent().unwrap()).unwrap();
        fs::write(&interface_file, "1.9.9").unwrap();
        let bundle = python.with_extra_version("version_interface", &interface_file);

        let report = orchestrator().check_and_update(&[bundle.clone()]).await;

        assert_eq!(report.outcome("python"), Some(&UpdateOutcome::updated("1.0.0")));
        assert_eq!(fs::read_to_string(&interface_file).unwrap(), "2.0.0");
        assert_eq!(fs::read_to_string(&bundle.version_file).unwrap(), "1.0.0");
    }

    #[tokio::test]
    async fn test_remote_downgrade_is_installed() {
        let server = MockServer::start().await;
        mount_json(&server, "/version.json", json!({"version_python": "0.9.9"})).await;
        mount_zip(&server, "/main.zip", archive("root", &[("main.py", "old")]), 1).await;

        let dir = TempDir::new().unwrap();
        let target = installed_python(dir.path(), &server);

        let report = orchestrator().check_and_update(&[target.clone()]).await;

        assert_eq!(report.outcome("python"), Some(&UpdateOutcome::updated("0.9.9")));
        assert_eq!(fs::read_to_string(&target.version_file).unwrap(), "0.9.9");
    }

    #[tokio::test]
    async fn test_numeric_manifest_values_are_compared_as_strings() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/check",
            json!({"version_Extention": "2.0.1", "manifest_version": 3}),
        )
        .await;
        mount_zip(&server, "/download", Vec::new(), 0).await;

        let dir = TempDir::new().unwrap();
        let install = dir.path().join("Ext1");
        fs::create_dir_all(&install).unwrap();
        fs::write(install.join("version.txt"), "2.0.1").unwrap();
        fs::write(install.join("manifest.json"), r#"{"version": "3"}"#).unwrap();

        let target = UpdateTarget::new(
            "ext1",
            &install,
            install.join("version.txt"),
            "version_Extention",
            format!("{}/check", server.uri()),
            format!("{}/download", server.uri()),
        )
        .with_local_manifest(install.join("manifest.json"), "manifest_version");

        let report = orchestrator().check_and_update(&[target]).await;
        assert_eq!(report.outcome("ext1"), Some(&UpdateOutcome::UpToDate));
    }

    #[tokio::test]
    async fn test_stale_local_manifest_triggers_update() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/check",
            json!({"version_Extention": "2.0.1", "manifest_version": "4"}),
        )
        .await;
        mount_zip(
            &server,
            "/download",
            archive("Ext1", &[("manifest.json", r#"{"version": "4"}"#)]),
            1,
        )
        .await;

        let dir = TempDir::new().unwrap();
        let install = dir.path().join("Ext1");
        fs::create_dir_all(&install).unwrap();
        fs::write(install.join("manifest.json"), r#"{"version": "3"}"#).unwrap();
        let version_file = dir.path().join("ext1.version");
        fs::write(&version_file, "2.0.1").unwrap();

        let target = UpdateTarget::new(
            "ext1",
            &install,
            &version_file,
            "version_Extention",
            format!("{}/check", server.uri()),
            format!("{}/download", server.uri()),
        )
        .with_local_manifest(install.join("manifest.json"), "manifest_version");

        let report = orchestrator().check_and_update(&[target]).await;

        assert_eq!(report.outcome("ext1"), Some(&UpdateOutcome::updated("2.0.1")));
        assert_eq!(
            fs::read_to_string(install.join("manifest.json")).unwrap(),
            r#"{"version": "4"}"#
        );
    }
}

mod atomicity {
    use super::*;

    #[tokio::test]
    async fn test_download_failure_leaves_tree_byte_for_byte() {
        let server = MockServer::start().await;
        mount_json(&server, "/version.json", json!({"version_python": "1.0.1"})).await;
        Mock::given(method("GET"))
            .and(path("/main.zip"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let target = installed_python(dir.path(), &server);
        let before = snapshot(&target.install_dir);

        let report = orchestrator().check_and_update(&[target.clone()]).await;

        let outcome = report.outcome("python").unwrap();
        assert!(matches!(outcome, UpdateOutcome::DownloadFailed { .. }));
        assert!(outcome.reason().unwrap().contains("503"));
        assert_eq!(snapshot(&target.install_dir), before);
    }

    #[tokio::test]
    async fn test_multi_root_archive_leaves_tree_untouched() {
        let server = MockServer::start().await;
        mount_json(&server, "/version.json", json!({"version_python": "1.0.1"})).await;

        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        zip.start_file("a/main.py", options).unwrap();
        zip.write_all(b"a").unwrap();
        zip.start_file("b/main.py", options).unwrap();
        zip.write_all(b"b").unwrap();
        let body = zip.finish().unwrap().into_inner();
        mount_zip(&server, "/main.zip", body, 1).await;

        let dir = TempDir::new().unwrap();
        let target = installed_python(dir.path(), &server);
        let before = snapshot(&target.install_dir);

        let report = orchestrator().check_and_update(&[target.clone()]).await;

        let outcome = report.outcome("python").unwrap();
        assert!(matches!(outcome, UpdateOutcome::InstallFailed { .. }));
        assert!(outcome.reason().unwrap().contains("malformed archive"));
        assert_eq!(snapshot(&target.install_dir), before);
        // no scratch left next to the installation
        let siblings: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(siblings.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_archive_is_install_failure() {
        let server = MockServer::start().await;
        mount_json(&server, "/version.json", json!({"version_python": "1.0.1"})).await;
        mount_zip(&server, "/main.zip", b"PK\x03\x04 definitely not a zip".to_vec(), 1).await;

        let dir = TempDir::new().unwrap();
        let target = installed_python(dir.path(), &server);
        let before = snapshot(&target.install_dir);

        let report = orchestrator().check_and_update(&[target.clone()]).await;

        assert!(matches!(
            report.outcome("python"),
            Some(UpdateOutcome::InstallFailed { .. })
        ));
        assert_eq!(snapshot(&target.install_dir), before);
    }
}

mod isolation {
    use super::*;

    #[tokio::test]
    async fn test_one_failing_manifest_does_not_block_others() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken/version.json"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;
        mount_json(
            &server,
            "/version.json",
            json!({"version_python": "1.0.1", "version_interface": "1.4.2"}),
        )
        .await;
        mount_zip(&server, "/main.zip", archive("root", &[("main.py", "v2")]), 1).await;

        let dir = TempDir::new().unwrap();
        let python = installed_python(dir.path(), &server);

        let interface_dir = dir.path().join("Interface");
        fs::create_dir_all(&interface_dir).unwrap();
        fs::write(interface_dir.join("version.txt"), "1.4.2").unwrap();
        let interface = UpdateTarget::new(
            "interface",
            &interface_dir,
            interface_dir.join("version.txt"),
            "version_interface",
            format!("{}/version.json", server.uri()),
            format!("{}/interface.zip", server.uri()),
        );

        let broken = UpdateTarget::new(
            "broken",
            dir.path().join("Broken"),
            dir.path().join("Broken").join("version.txt"),
            "version_broken",
            format!("{}/broken/version.json", server.uri()),
            format!("{}/broken.zip", server.uri()),
        );

        let report = orchestrator()
            .check_and_update(&[broken, python, interface])
            .await;

        let ids: Vec<_> = report.targets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["broken", "python", "interface"]);
        assert!(matches!(
            report.outcome("broken"),
            Some(UpdateOutcome::CheckFailed { .. })
        ));
        assert_eq!(report.outcome("python"), Some(&UpdateOutcome::updated("1.0.1")));
        assert_eq!(report.outcome("interface"), Some(&UpdateOutcome::UpToDate));
        assert_eq!(report.failed(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_targets_are_serialized() {
        let server = MockServer::start().await;
        mount_json(&server, "/version.json", json!({"version_python": "1.0.1"})).await;
        mount_zip(&server, "/main.zip", archive("root", &[("main.py", "v2")]), 1).await;

        let dir = TempDir::new().unwrap();
        let target = installed_python(dir.path(), &server);

        let report = orchestrator()
            .check_and_update(&[target.clone(), target.clone()])
            .await;

        let outcomes: Vec<_> = report.targets.iter().map(|t| t.outcome.clone()).collect();
        assert!(outcomes.contains(&UpdateOutcome::updated("1.0.1")));
        assert!(outcomes.contains(&UpdateOutcome::UpToDate));
        assert_eq!(fs::read_to_string(&target.version_file).unwrap(), "1.0.1");
    }
}
