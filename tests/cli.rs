//! End-to-end tests of the gopkgview binary against a module on disk
//!
//! The Go environment is faked: GOROOT and GOMODCACHE point into a temp dir,
//! so the `go` tool is never needed.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

struct Workspace {
    _tmp: TempDir,
    module: PathBuf,
    goroot: PathBuf,
    modcache: PathBuf,
}

fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn workspace() -> Workspace {
    let tmp = TempDir::new().unwrap();
    let module = tmp.path().join("app");
    let goroot = tmp.path().join("goroot");
    let modcache = tmp.path().join("modcache");

    write(&goroot.join("src/fmt/print.go"), "package fmt\n\nimport \"io\"\n");
    write(&goroot.join("src/strings/builder.go"), "package strings\n");
    write(
        &modcache.join("github.com/spf13/cobra@v1.8.0/command.go"),
        "package cobra\n\nimport \"github.com/spf13/pflag\"\n",
    );

    write(
        &module.join("go.mod"),
        "module example.com/app\n\ngo 1.22\n\nrequire github.com/spf13/cobra v1.8.0\n",
    );
    write(
        &module.join("main.go"),
        r#"package main

import (
	"fmt"

	"example.com/app/internal/store"
	"github.com/spf13/cobra"
)

func main() {
	fmt.Println(store.Name, cobra.Command{})
}
"#,
    );
    write(
        &module.join("internal/store/store.go"),
        "package store\n\nimport (\n\t\"strings\"\n\t\"example.com/app/internal/broken\"\n)\n",
    );
    write(
        &module.join("internal/store/store_windows.go"),
        "package store\n\nimport \"syscall\"\n",
    );

    Workspace {
        _tmp: tmp,
        module,
        goroot,
        modcache,
    }
}

fn gopkgview(ws: &Workspace) -> Command {
    let mut cmd = Command::cargo_bin("gopkgview").unwrap();
    cmd.env("GOROOT", &ws.goroot)
        .env("GOMODCACHE", &ws.modcache)
        .env("GOOS", "linux")
        .env("GOARCH", "amd64")
        .env_remove("GO_PKGVIEW_ROOT")
        .env_remove("GO_PKGVIEW_GOMOD")
        .env_remove("GO_PKGVIEW_MAX_WORKERS")
        .arg("--no-color");
    cmd
}

fn sorted_nodes(doc: &Value) -> Vec<(String, String, String)> {
    let mut nodes: Vec<(String, String, String)> = doc["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| {
            (
                n["ImportPath"].as_str().unwrap().to_string(),
                n["Name"].as_str().unwrap().to_string(),
                n["PkgType"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    nodes.sort();
    nodes
}

fn sorted_edges(doc: &Value) -> Vec<(String, String)> {
    let mut edges: Vec<(String, String)> = doc["edges"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| {
            (
                e["From"].as_str().unwrap().to_string(),
                e["To"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    edges.sort();
    edges
}

fn owned(items: &[(&str, &str, &str)]) -> Vec<(String, String, String)> {
    items
        .iter()
        .map(|(a, b, c)| (a.to_string(), b.to_string(), c.to_string()))
        .collect()
}

#[test]
fn test_graph_json() {
    let ws = workspace();
    let output = gopkgview(&ws)
        .args(["graph", "--root"])
        .arg(&ws.module)
        .output()
        .unwrap();
    assert!(output.status.success());

    let doc: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        sorted_nodes(&doc),
        owned(&[
            ("example.com/app", "main", "loc"),
            (
                "example.com/app/internal/broken",
                "[err] example.com/app/internal/broken",
                "err"
            ),
            ("example.com/app/internal/store", "store", "loc"),
            ("fmt", "fmt", "std"),
            ("github.com/spf13/cobra", "cobra", "ext"),
            ("strings", "strings", "std"),
        ])
    );

    let edges = sorted_edges(&doc);
    let expected: Vec<(String, String)> = [
        ("example.com/app", "example.com/app/internal/store"),
        ("example.com/app", "fmt"),
        ("example.com/app", "github.com/spf13/cobra"),
        ("example.com/app/internal/store", "example.com/app/internal/broken"),
        ("example.com/app/internal/store", "strings"),
    ]
    .iter()
    .map(|(a, b)| (a.to_string(), b.to_string()))
    .collect();
    assert_eq!(edges, expected);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("1 package(s) could not be resolved"));
}

#[test]
fn test_graph_hide_std_and_err() {
    let ws = workspace();
    let output = gopkgview(&ws)
        .args(["graph", "--hide", "std,err", "--root"])
        .arg(&ws.module)
        .output()
        .unwrap();
    assert!(output.status.success());

    let doc: Value = serde_json::from_slice(&output.stdout).unwrap();
    let nodes: Vec<String> = sorted_nodes(&doc).into_iter().map(|n| n.0).collect();
    assert_eq!(
        nodes,
        vec![
            "example.com/app",
            "example.com/app/internal/store",
            "github.com/spf13/cobra"
        ]
    );
    assert_eq!(sorted_edges(&doc).len(), 2);
}

#[test]
fn test_graph_single_worker_matches() {
    let ws = workspace();
    let run = |workers: &str| {
        let output = gopkgview(&ws)
            .env("GO_PKGVIEW_MAX_WORKERS", workers)
            .arg("graph")
            .current_dir(&ws.module)
            .output()
            .unwrap();
        assert!(output.status.success());
        let doc: Value = serde_json::from_slice(&output.stdout).unwrap();
        (sorted_nodes(&doc), sorted_edges(&doc))
    };

    assert_eq!(run("1"), run("20"));
}

#[test]
fn test_graph_dot_to_file() {
    let ws = workspace();
    let out = ws.module.join("deps.dot");
    gopkgview(&ws)
        .args(["graph", "--format", "dot", "--output"])
        .arg(&out)
        .arg("--root")
        .arg(&ws.module)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let dot = std::fs::read_to_string(&out).unwrap();
    assert!(dot.starts_with("digraph packages {"));
    assert!(dot.contains("\"example.com/app\" -> \"fmt\";"));
}

#[test]
fn test_graph_text() {
    let ws = workspace();
    gopkgview(&ws)
        .args(["graph", "--format", "text", "--root"])
        .arg(&ws.module)
        .assert()
        .success()
        .stdout(predicate::str::contains("Packages: 6"))
        .stdout(predicate::str::contains("  failed:   1"));
}

#[test]
fn test_graph_settings_file() {
    let ws = workspace();
    write(
        &ws.module.join("gopkgview.toml"),
        "[graph]\nmax_workers = 2\nhide = [\"ext\"]\n",
    );

    let output = gopkgview(&ws)
        .args(["graph", "--root"])
        .arg(&ws.module)
        .output()
        .unwrap();
    assert!(output.status.success());
    let doc: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(sorted_nodes(&doc).iter().all(|n| n.2 != "ext"));
}

#[test]
fn test_graph_zero_workers_rejected() {
    let ws = workspace();
    gopkgview(&ws)
        .args(["graph", "--max-workers", "0", "--root"])
        .arg(&ws.module)
        .assert()
        .failure()
        .stderr(predicate::str::contains("max workers must be at least 1"));
}

#[test]
fn test_missing_gomod() {
    let ws = workspace();
    let empty = ws.module.join("internal");
    gopkgview(&ws)
        .args(["graph", "--root"])
        .arg(&empty)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid module descriptor"))
        .stderr(predicate::str::contains("HINT:"));
}

#[test]
fn test_requires_tree() {
    let ws = workspace();
    gopkgview(&ws)
        .args(["requires", "--root"])
        .arg(&ws.module)
        .assert()
        .success()
        .stdout(predicate::str::contains("└── (root)"))
        .stdout(predicate::str::contains("/cobra"))
        .stdout(predicate::str::contains("4 nodes"));
}

#[test]
fn test_requires_paths() {
    let ws = workspace();
    gopkgview(&ws)
        .args(["requires", "--root"])
        .arg(&ws.module)
        .args(["github.com/spf13/cobra/doc", "fmt"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "github.com/spf13/cobra/doc: covered by github.com/spf13/cobra v1.8.0",
        ))
        .stdout(predicate::str::contains("fmt: not covered"));
}
