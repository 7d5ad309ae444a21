//! Resolution of Go import paths to package directories
//!
//! Lookup order for a non-relative import path:
//!
//! 1. the standard library in `GOROOT/src` (first element has no dot)
//! 2. the main module
//! 3. `vendor/`, when the module is vendored
//! 4. the module providing the path according to go.mod, honoring `replace`

use std::path::{Path, PathBuf};

use crate::config::{is_path_prefix, GoMod};
use crate::dependency::{ImportResolver, PackageInfo, ResolutionError};
use crate::utils::paths::{normalize, to_slash};

use super::env::GoEnv;
use super::source::scan_dir;

/// Resolves imports of one Go module
#[derive(Debug, Clone)]
pub struct GoResolver {
    root: PathBuf,
    module: GoMod,
    env: GoEnv,
    vendored: bool,
}

/// Directory an import path was located in
struct Location {
    import_path: String,
    dir: PathBuf,
    goroot: bool,
}

impl GoResolver {
    /// Create a resolver for the module rooted at `root`
    pub fn new(root: &Path, module: GoMod, env: GoEnv) -> Self {
        let root = normalize(root);
        let vendored = root.join("vendor").join("modules.txt").is_file();
        Self {
            root,
            module,
            env,
            vendored,
        }
    }

    /// The parsed go.mod this resolver works from
    pub fn module(&self) -> &GoMod {
        &self.module
    }

    fn locate(&self, identifier: &str, src_dir: &Path) -> Result<Location, ResolutionError> {
        if is_relative(identifier) {
            let dir = normalize(&src_dir.join(identifier));
            return Ok(Location {
                import_path: self.import_path_for_dir(&dir),
                dir,
                goroot: false,
            });
        }

        validate_import_path(identifier).map_err(|reason| ResolutionError::new(identifier, reason))?;

        if is_std_candidate(identifier) {
            let dir = self.env.std_src().join(identifier);
            if dir.is_dir() {
                return Ok(Location {
                    import_path: identifier.to_string(),
                    dir,
                    goroot: true,
                });
            }
        }

        let located = |dir: PathBuf| Location {
            import_path: identifier.to_string(),
            dir,
            goroot: false,
        };

        if is_path_prefix(&self.module.module, identifier) {
            let rest = &identifier[self.module.module.len()..];
            return Ok(located(join_rest(&self.root, rest)));
        }

        if self.vendored {
            let dir = self.root.join("vendor").join(identifier);
            if dir.is_dir() {
                return Ok(located(dir));
            }
        }

        if let Some(require) = self.module.requirement_for(identifier) {
            let module_dir = self.module_dir(&require.path, &require.version);
            let rest = &identifier[require.path.len()..];
            return Ok(located(join_rest(&module_dir, rest)));
        }

        Err(ResolutionError::new(
            identifier,
            format!("cannot find package \"{}\"", identifier),
        ))
    }

    /// Directory holding the sources of `path@version`
    fn module_dir(&self, path: &str, version: &str) -> PathBuf {
        match self.module.replacement_for(path, version) {
            Some(replace) if replace.is_local() => normalize(&self.root.join(&replace.new_path)),
            Some(replace) => self.cache_dir(
                &replace.new_path,
                replace.new_version.as_deref().unwrap_or(version),
            ),
            None => self.cache_dir(path, version),
        }
    }

    fn cache_dir(&self, path: &str, version: &str) -> PathBuf {
        self.env
            .gomodcache
            .join(format!("{}@{}", escape_path(path), escape_path(version)))
    }

    /// Import path of a directory reached through a relative import
    fn import_path_for_dir(&self, dir: &Path) -> String {
        match dir.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => self.module.module.clone(),
            Ok(rel) => format!("{}/{}", self.module.module, to_slash(rel)),
            Err(_) => dir.display().to_string(),
        }
    }
}

impl ImportResolver for GoResolver {
    fn resolve(&self, identifier: &str, src_dir: &Path) -> Result<PackageInfo, ResolutionError> {
        let location = self.locate(identifier, src_dir)?;

        if !location.dir.is_dir() {
            return Err(ResolutionError::new(
                identifier,
                format!(
                    "cannot find package \"{}\" in {}",
                    location.import_path,
                    location.dir.display()
                ),
            ));
        }

        let package = scan_dir(&location.dir, &self.env)
            .map_err(|e| ResolutionError::new(identifier, e.to_string()))?;

        Ok(PackageInfo {
            import_path: location.import_path,
            name: package.name,
            dir: location.dir,
            goroot: location.goroot,
            imports: package.imports,
        })
    }

    fn canonical(&self, identifier: &str, src_dir: &Path) -> String {
        if is_relative(identifier) {
            self.import_path_for_dir(&normalize(&src_dir.join(identifier)))
        } else {
            identifier.to_string()
        }
    }
}

fn is_relative(identifier: &str) -> bool {
    identifier == "."
        || identifier == ".."
        || identifier.starts_with("./")
        || identifier.starts_with("../")
}

/// Standard library paths have no dot in their first element
fn is_std_candidate(import_path: &str) -> bool {
    let first = import_path.split('/').next().unwrap_or(import_path);
    !first.contains('.')
}

fn validate_import_path(import_path: &str) -> Result<(), String> {
    if import_path.is_empty() {
        return Err("invalid import path: empty".to_string());
    }
    if import_path.starts_with('/') || import_path.contains('\\') {
        return Err(format!("invalid import path: {:?}", import_path));
    }
    if import_path
        .split('/')
        .any(|elem| elem.is_empty() || elem == "." || elem == "..")
    {
        return Err(format!("invalid import path: {:?}", import_path));
    }
    Ok(())
}

/// Append the slash-separated remainder `rest` (empty or starting with `/`)
fn join_rest(base: &Path, rest: &str) -> PathBuf {
    rest.split('/')
        .filter(|elem| !elem.is_empty())
        .fold(base.to_path_buf(), |dir, elem| dir.join(elem))
}

/// Module cache escaping: each upper-case letter becomes `!` + lower case
pub fn escape_path(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            escaped.push('!');
            escaped.push(c.to_ascii_lowercase());
        } else {
            escaped.push(c);
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::{GraphBuilder, PackageType, PathTrie};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        root: PathBuf,
        env: GoEnv,
    }

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    /// Module with a fake GOROOT and module cache
    fn fixture(gomod: &str) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().to_path_buf();
        let root = base.join("work");
        let goroot = base.join("goroot");
        let cache = base.join("modcache");

        write(&goroot.join("src/fmt/print.go"), "package fmt\n\nimport \"os\"\n");
        write(&goroot.join("src/os/file.go"), "package os\n");
        write(
            &cache.join("github.com/!burnt!sushi/toml@v1.3.2/decode.go"),
            "package toml\n\nimport \"io\"\n",
        );
        write(
            &cache.join("golang.org/x/sync@v0.6.0/errgroup/errgroup.go"),
            "package errgroup\n\nimport \"context\"\n",
        );

        write(&root.join("go.mod"), gomod);
        write(
            &root.join("main.go"),
            r#"package main

import (
    "fmt"

    "github.com/BurntSushi/toml"
    "example.com/app/internal/util"
    "example.com/app/missing"
)

func main() {}
"#,
        );
        write(
            &root.join("internal/util/util.go"),
            "package util\n\nimport (\n    \"fmt\"\n    \"golang.org/x/sync/errgroup\"\n)\n",
        );

        let env = GoEnv {
            goroot,
            gomodcache: cache,
            goos: "linux".to_string(),
            goarch: "amd64".to_string(),
        };
        Fixture {
            _tmp: tmp,
            root,
            env,
        }
    }

    const GOMOD: &str = "module example.com/app\n\ngo 1.22\n\nrequire (\n\tgithub.com/BurntSushi/toml v1.3.2\n\tgolang.org/x/sync v0.6.0 // indirect\n)\n";

    fn resolver(f: &Fixture) -> GoResolver {
        let module = GoMod::parse("go.mod", GOMOD).unwrap();
        GoResolver::new(&f.root, module, f.env.clone())
    }

    #[test]
    fn test_resolve_root_package() {
        let f = fixture(GOMOD);
        let pkg = resolver(&f).resolve(".", &f.root).unwrap();

        assert_eq!(pkg.import_path, "example.com/app");
        assert_eq!(pkg.name, "main");
        assert_eq!(pkg.dir, f.root);
        assert!(!pkg.goroot);
        assert_eq!(
            pkg.imports,
            vec![
                "example.com/app/internal/util",
                "example.com/app/missing",
                "fmt",
                "github.com/BurntSushi/toml",
            ]
        );
    }

    #[test]
    fn test_resolve_relative_subdirectory() {
        let f = fixture(GOMOD);
        let pkg = resolver(&f)
            .resolve("./util", &f.root.join("internal"))
            .unwrap();
        assert_eq!(pkg.import_path, "example.com/app/internal/util");
    }

    #[test]
    fn test_resolve_std() {
        let f = fixture(GOMOD);
        let pkg = resolver(&f).resolve("fmt", &f.root).unwrap();
        assert!(pkg.goroot);
        assert_eq!(pkg.dir, f.env.goroot.join("src/fmt"));
        assert_eq!(pkg.imports, vec!["os"]);
    }

    #[test]
    fn test_resolve_module_cache_escaped() {
        let f = fixture(GOMOD);
        let r = resolver(&f);

        let pkg = r.resolve("github.com/BurntSushi/toml", &f.root).unwrap();
        assert_eq!(pkg.name, "toml");
        assert!(!pkg.goroot);

        let pkg = r.resolve("golang.org/x/sync/errgroup", &f.root).unwrap();
        assert_eq!(pkg.name, "errgroup");
    }

    #[test]
    fn test_resolve_unknown_package() {
        let f = fixture(GOMOD);
        let err = resolver(&f)
            .resolve("example.org/nowhere", &f.root)
            .unwrap_err();
        assert_eq!(err.identifier, "example.org/nowhere");
        assert_eq!(err.reason, "cannot find package \"example.org/nowhere\"");

        let err = resolver(&f).resolve("notstd", &f.root).unwrap_err();
        assert_eq!(err.reason, "cannot find package \"notstd\"");
    }

    #[test]
    fn test_resolve_missing_module_dir() {
        let f = fixture(GOMOD);
        let err = resolver(&f)
            .resolve("example.com/app/missing", &f.root)
            .unwrap_err();
        assert!(err
            .reason
            .starts_with("cannot find package \"example.com/app/missing\" in "));
    }

    #[test]
    fn test_resolve_local_replace() {
        let gomod = format!("{}\nreplace github.com/BurntSushi/toml => ./third_party/toml\n", GOMOD);
        let f = fixture(&gomod);
        write(
            &f.root.join("third_party/toml/toml.go"),
            "package forked\n",
        );

        let module = GoMod::parse("go.mod", &gomod).unwrap();
        let r = GoResolver::new(&f.root, module, f.env.clone());
        let pkg = r.resolve("github.com/BurntSushi/toml", &f.root).unwrap();
        assert_eq!(pkg.name, "forked");
        assert_eq!(pkg.dir, f.root.join("third_party/toml"));
    }

    #[test]
    fn test_resolve_vendor() {
        let f = fixture(GOMOD);
        write(&f.root.join("vendor/modules.txt"), "# github.com/BurntSushi/toml v1.3.2\n");
        write(
            &f.root.join("vendor/github.com/BurntSushi/toml/toml.go"),
            "package vendored\n",
        );

        let pkg = resolver(&f)
            .resolve("github.com/BurntSushi/toml", &f.root)
            .unwrap();
        assert_eq!(pkg.name, "vendored");
    }

    #[test]
    fn test_invalid_import_paths() {
        let f = fixture(GOMOD);
        let r = resolver(&f);
        assert!(r.resolve("", &f.root).is_err());
        assert!(r.resolve("/abs/path", &f.root).is_err());
        assert!(r.resolve("a//b", &f.root).is_err());
    }

    #[test]
    fn test_canonical_relative_imports() {
        let f = fixture(GOMOD);
        let r = resolver(&f);

        assert_eq!(r.canonical(".", &f.root), "example.com/app");
        assert_eq!(
            r.canonical("./util", &f.root.join("internal")),
            "example.com/app/internal/util"
        );
        assert_eq!(r.canonical("../x", &f.root.join("internal")), "example.com/app/x");
        assert_eq!(r.canonical("fmt", &f.root.join("internal")), "fmt");
    }

    #[test]
    fn test_same_relative_import_from_two_packages() {
        let f = fixture(GOMOD);
        write(
            &f.root.join("main.go"),
            "package main\n\nimport (\n    \"./a\"\n    \"./b\"\n)\n",
        );
        write(&f.root.join("a/a.go"), "package a\n\nimport \"./util\"\n");
        write(&f.root.join("b/b.go"), "package b\n\nimport \"./util\"\n");
        write(&f.root.join("a/util/util.go"), "package ua\n");
        write(&f.root.join("b/util/util.go"), "package ub\n");

        let graph = GraphBuilder::new(Arc::new(resolver(&f)), PathTrie::new())
            .max_workers(4)
            .build(&f.root)
            .unwrap();

        let mut nodes: Vec<(&str, &str)> = graph
            .nodes()
            .iter()
            .map(|n| (n.import_path.as_str(), n.name.as_str()))
            .collect();
        nodes.sort_unstable();
        assert_eq!(
            nodes,
            vec![
                ("example.com/app", "main"),
                ("example.com/app/a", "a"),
                ("example.com/app/a/util", "ua"),
                ("example.com/app/b", "b"),
                ("example.com/app/b/util", "ub"),
            ]
        );

        let mut edges: Vec<(&str, &str)> = graph
            .edges()
            .iter()
            .map(|e| (e.from.as_str(), e.to.as_str()))
            .collect();
        edges.sort_unstable();
        assert_eq!(
            edges,
            vec![
                ("example.com/app", "example.com/app/a"),
                ("example.com/app", "example.com/app/b"),
                ("example.com/app/a", "example.com/app/a/util"),
                ("example.com/app/b", "example.com/app/b/util"),
            ]
        );
    }

    #[test]
    fn test_escape_path() {
        assert_eq!(escape_path("github.com/BurntSushi/toml"), "github.com/!burnt!sushi/toml");
        assert_eq!(escape_path("v1.0.0-RC1"), "v1.0.0-!r!c1");
        assert_eq!(escape_path("golang.org/x/sync"), "golang.org/x/sync");
    }

    #[test]
    fn test_build_graph_of_module() {
        let f = fixture(GOMOD);
        let r = resolver(&f);
        let index = r.module().requirement_index();
        let graph = GraphBuilder::new(Arc::new(r), index)
            .max_workers(4)
            .build(&f.root)
            .unwrap();

        let kind = |path: &str| graph.node(path).map(|n| n.pkg_type);
        assert_eq!(kind("example.com/app"), Some(PackageType::Local));
        assert_eq!(kind("example.com/app/internal/util"), Some(PackageType::Local));
        assert_eq!(kind("fmt"), Some(PackageType::StdLib));
        assert_eq!(kind("github.com/BurntSushi/toml"), Some(PackageType::ExtLib));
        assert_eq!(kind("golang.org/x/sync/errgroup"), Some(PackageType::ExtLib));
        assert_eq!(kind("example.com/app/missing"), Some(PackageType::Err));

        // Leaves are never expanded
        assert!(graph.node("os").is_none());
        assert!(graph.node("io").is_none());
        assert!(graph.node("context").is_none());

        let mut edges: Vec<(&str, &str)> = graph
            .edges()
            .iter()
            .map(|e| (e.from.as_str(), e.to.as_str()))
            .collect();
        edges.sort();
        assert_eq!(
            edges,
            vec![
                ("example.com/app", "example.com/app/internal/util"),
                ("example.com/app", "example.com/app/missing"),
                ("example.com/app", "fmt"),
                ("example.com/app", "github.com/BurntSushi/toml"),
                ("example.com/app/internal/util", "fmt"),
                ("example.com/app/internal/util", "golang.org/x/sync/errgroup"),
            ]
        );
        assert_eq!(graph.nodes().len(), 6);
        assert_eq!(graph.failures().len(), 1);
    }
}
