#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use kiln_solve::progress::SolveStatus;
use kiln_solve::{BuildOptions, EngineConfig, Error, Orchestrator, ProcessEngine, preflight};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const SOLVER: &str = r#"#!/bin/sh
# --state-dir <dir> --backend <name> <command> [session-id]
case "$5" in
  session)
    exec sleep 30
    ;;
  solve)
    read -r request
    case "$request" in
      *'"target":"broken"'*)
        echo '{"error":"target stage broken could not be found"}'
        ;;
      *)
        echo '{"status":{"vertexes":[{"digest":"v1","name":"[1/1] FROM scratch"}]}}'
        echo '{"status":{"logs":[{"vertex":"v1","stream":"stderr","data":[111,107],"timestamp":"2024-01-01T00:00:00Z"}]}}'
        echo '{"done":{}}'
        ;;
    esac
    ;;
esac
"#;

fn install_solver(dir: &Path) -> PathBuf {
    let path = dir.join("fake-solver");
    std::fs::write(&path, SOLVER).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

async fn solve(config: &EngineConfig, target: Option<&str>) -> (kiln_solve::Result<()>, Vec<SolveStatus>) {
    let ready = preflight::check(config).unwrap();
    let request = BuildOptions::new(config.state_dir.clone())
        .tag("scratch-test")
        .target(target.map(String::from))
        .build()
        .unwrap();

    let orchestrator = Orchestrator::new(ProcessEngine::new(config));
    let (tx, mut rx) = mpsc::channel(8);
    let collector = tokio::spawn(async move {
        let mut out = Vec::new();
        while let Some(status) = rx.recv().await {
            out.push(status);
        }
        out
    });
    let result = orchestrator
        .run(&CancellationToken::new(), &request, tx, &ready)
        .await;
    (result, collector.await.unwrap())
}

// Scripts are installed and run from a single test so no concurrent fork can
// hold the script open for writing while it is executed.
#[tokio::test]
async fn solver_program_over_stdio() {
    let root = tempfile::tempdir().unwrap();
    let config = EngineConfig {
        state_dir: root.path().join("state"),
        engine_program: install_solver(root.path()).display().to_string(),
        runtime: "sh".into(),
        ..Default::default()
    };

    let (result, statuses) = solve(&config, None).await;
    result.unwrap();
    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[0].vertexes[0].name, "[1/1] FROM scratch");
    assert_eq!(statuses[1].logs[0].stream, 2);
    assert_eq!(statuses[1].logs[0].data, b"ok");

    let (result, _) = solve(&config, Some("broken")).await;
    assert!(matches!(result, Err(Error::Solve(msg)) if msg.contains("could not be found")));

    let missing = EngineConfig {
        engine_program: root.path().join("absent").display().to_string(),
        ..config
    };
    let (result, _) = solve(&missing, None).await;
    assert!(matches!(result, Err(Error::Session(_))));
}
