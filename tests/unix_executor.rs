/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! The Unix executor running shell scripts that stand in for omreport

#![cfg(unix)]

use dellhw_exporter::{
    CommandTimeout, ExporterConfig, MetricsService, OmReport, ParseMode, ServiceContainer,
    UnixCommandExecutor,
};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn fake_omreport(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("omreport");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn reader(path: &Path, timeout: Duration) -> OmReport {
    let executor = Arc::new(UnixCommandExecutor::new(CommandTimeout::new(timeout)));
    OmReport::new(executor, path.to_str().unwrap())
}

#[tokio::test]
async fn test_reads_and_parses_script_output() {
    let dir = TempDir::new().unwrap();
    let path = fake_omreport(
        &dir,
        r#"[ "$*" = "chassis -fmt ssv" ] || { echo "unexpected args: $*" >&2; exit 3; }
cat <<'EOF'
Health

Main System Chassis

SEVERITY;COMPONENT
Ok;Fans
Critical;Power Supplies
EOF"#,
    );

    let output = reader(&path, Duration::from_secs(5))
        .read(&["chassis"], ParseMode::Dynamic)
        .await
        .unwrap();

    assert_eq!(output.len(), 1);
    assert_eq!(output[0].title.as_deref(), Some("Health"));
    assert_eq!(output[0].lines.len(), 2);
    assert_eq!(output[0].lines[1].get("component"), Some("Power Supplies"));
}

#[tokio::test]
async fn test_idle_exit_code_gives_empty_output() {
    let dir = TempDir::new().unwrap();
    let path = fake_omreport(&dir, "echo 'Health'\nexit 255");

    let output = reader(&path, Duration::from_secs(5))
        .read(&["chassis"], ParseMode::Dynamic)
        .await
        .unwrap();
    assert!(output.is_empty());
}

#[tokio::test]
async fn test_failing_script_reports_stderr() {
    let dir = TempDir::new().unwrap();
    let path = fake_omreport(&dir, "echo 'Error! Invalid command' >&2\nexit 1");

    let err = reader(&path, Duration::from_secs(5))
        .read(&["chassis", "volts"], ParseMode::Dynamic)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Error! Invalid command"));
    assert!(!err.is_timeout());
}

#[tokio::test]
async fn test_hanging_script_times_out() {
    let dir = TempDir::new().unwrap();
    let path = fake_omreport(&dir, "exec sleep 30");

    let started = Instant::now();
    let err = reader(&path, Duration::from_millis(200))
        .read(&["chassis"], ParseMode::Dynamic)
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    assert!(started.elapsed() < Duration::from_secs(10));
}

/// Whether `pid` is a live process; zombies count as gone
#[cfg(target_os = "linux")]
fn is_running(pid: u32) -> bool {
    fs::read_to_string(format!("/proc/{pid}/stat"))
        .ok()
        .and_then(|stat| {
            let (_, rest) = stat.rsplit_once(')')?;
            rest.trim_start().chars().next()
        })
        .is_some_and(|state| !matches!(state, 'Z' | 'X'))
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_timed_out_wrapper_leaves_nothing_running() {
    let dir = TempDir::new().unwrap();
    let pids = dir.path().join("pids");
    let path = fake_omreport(
        &dir,
        &format!("sleep 30 &\necho $$ $! > '{}'\nwait", pids.display()),
    );

    let err = reader(&path, Duration::from_millis(500))
        .read(&["chassis", "fans"], ParseMode::Dynamic)
        .await
        .unwrap_err();
    assert!(err.is_timeout());

    let pids: Vec<u32> = fs::read_to_string(&pids)
        .unwrap()
        .split_whitespace()
        .map(|pid| pid.parse().unwrap())
        .collect();
    assert_eq!(pids.len(), 2);

    for _ in 0..100 {
        if pids.iter().all(|&pid| !is_running(pid)) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("omreport wrapper {pids:?} still running after timeout");
}

#[tokio::test]
async fn test_timed_out_collector_reports_failure() {
    let dir = TempDir::new().unwrap();
    let path = fake_omreport(&dir, "exec sleep 30");

    let config = ExporterConfig {
        collectors_enabled: vec!["fans".to_string()],
        omreport_executable: path.to_str().unwrap().to_string(),
        cmd_timeout: 1,
        ..Default::default()
    };
    let container = ServiceContainer::new(config);
    assert!(container.validate_dependencies().await);
    container.command_timeout().set(Duration::from_millis(200));

    let service = container.create_collection_service().unwrap();
    let metrics = service.collect_all().await;

    assert_eq!(metrics.len(), 2);
    let success = metrics
        .iter()
        .find(|m| m.name == "dell_hw_scrape_collector_success")
        .unwrap();
    assert_eq!(success.value, 0.0);
}
