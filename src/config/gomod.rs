//! go.mod parsing
//!
//! Only what the graph needs is kept: the module path, the `go` and
//! `toolchain` directives, requirements and replacements. `exclude`,
//! `retract`, `godebug`, `tool` and `ignore` are accepted and skipped.
//!
//! ```text
//! module example.com/app
//!
//! go 1.22
//!
//! require (
//!     github.com/sirupsen/logrus v1.9.3
//!     golang.org/x/sys v0.15.0 // indirect
//! )
//!
//! replace example.com/fork => ../fork
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::dependency::PathTrie;

/// go.mod could not be read or understood; fatal to a build
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}:{line}: {message}")]
    Syntax {
        file: String,
        line: usize,
        message: String,
    },

    #[error("{file}: no module directive found")]
    MissingModule { file: String },
}

/// A `require` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub path: String,
    pub version: String,
    /// Marked `// indirect`
    pub indirect: bool,
}

/// A `replace` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replace {
    pub old_path: String,
    /// Only this version is replaced when set
    pub old_version: Option<String>,
    pub new_path: String,
    /// `None` for filesystem replacements
    pub new_version: Option<String>,
}

impl Replace {
    /// Replacement points at a directory rather than another module
    pub fn is_local(&self) -> bool {
        self.new_path.starts_with("./")
            || self.new_path.starts_with("../")
            || Path::new(&self.new_path).is_absolute()
    }
}

/// Parsed go.mod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoMod {
    pub module: String,
    pub go_version: Option<String>,
    pub toolchain: Option<String>,
    pub requires: Vec<Requirement>,
    pub replaces: Vec<Replace>,
}

impl GoMod {
    /// Load and parse a go.mod file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&path.display().to_string(), &content)
    }

    /// Parse go.mod content; `file` is only used in error messages
    pub fn parse(file: &str, content: &str) -> Result<Self, ManifestError> {
        let mut parser = Parser {
            file,
            module: None,
            go_version: None,
            toolchain: None,
            requires: Vec::new(),
            replaces: Vec::new(),
        };

        let mut block: Option<(String, usize)> = None;
        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx + 1;
            let (code, comment) = split_comment(raw);
            let tokens = tokenize(code).map_err(|message| parser.error(line_no, message))?;
            let indirect = is_indirect(comment);

            if let Some(verb) = block.as_ref().map(|(verb, _)| verb.clone()) {
                if tokens.len() == 1 && tokens[0] == ")" {
                    block = None;
                } else if !tokens.is_empty() {
                    parser.directive(line_no, &verb, &tokens, indirect)?;
                }
                continue;
            }

            let Some((verb, args)) = tokens.split_first() else {
                continue;
            };

            if args.len() == 1 && args[0] == "(" {
                if !BLOCK_DIRECTIVES.contains(&verb.as_str()) {
                    return Err(parser.error(line_no, format!("{} does not take a block", verb)));
                }
                block = Some((verb.clone(), line_no));
                continue;
            }

            parser.directive(line_no, verb, args, indirect)?;
        }

        if let Some((verb, line)) = block {
            return Err(parser.error(line, format!("unterminated {} block", verb)));
        }

        let module = parser.module.ok_or_else(|| ManifestError::MissingModule {
            file: file.to_string(),
        })?;

        Ok(GoMod {
            module,
            go_version: parser.go_version,
            toolchain: parser.toolchain,
            requires: parser.requires,
            replaces: parser.replaces,
        })
    }

    /// Prefix index over every required module path
    pub fn requirement_index(&self) -> PathTrie {
        let mut index = PathTrie::new();
        for require in &self.requires {
            index.put(&require.path);
        }
        index
    }

    /// Requirement whose module path is the longest prefix of `import_path`
    pub fn requirement_for(&self, import_path: &str) -> Option<&Requirement> {
        self.requires
            .iter()
            .filter(|r| is_path_prefix(&r.path, import_path))
            .max_by_key(|r| r.path.len())
    }

    /// Replacement applying to the module `path` at `version`
    pub fn replacement_for(&self, path: &str, version: &str) -> Option<&Replace> {
        // A versioned replacement wins over one for all versions
        self.replaces
            .iter()
            .filter(|r| r.old_path == path)
            .find(|r| r.old_version.as_deref() == Some(version))
            .or_else(|| {
                self.replaces
                    .iter()
                    .find(|r| r.old_path == path && r.old_version.is_none())
            })
    }
}

/// `prefix` equals `path` or is a whole-component prefix of it
pub fn is_path_prefix(prefix: &str, path: &str) -> bool {
    path == prefix
        || (path.len() > prefix.len()
            && path.starts_with(prefix)
            && path.as_bytes()[prefix.len()] == b'/')
}

const BLOCK_DIRECTIVES: &[&str] = &[
    "require", "replace", "exclude", "retract", "godebug", "tool", "ignore",
];

struct Parser<'a> {
    file: &'a str,
    module: Option<String>,
    go_version: Option<String>,
    toolchain: Option<String>,
    requires: Vec<Requirement>,
    replaces: Vec<Replace>,
}

impl<'a> Parser<'a> {
    fn error(&self, line: usize, message: impl Into<String>) -> ManifestError {
        ManifestError::Syntax {
            file: self.file.to_string(),
            line,
            message: message.into(),
        }
    }

    fn directive(
        &mut self,
        line: usize,
        verb: &str,
        args: &[String],
        indirect: bool,
    ) -> Result<(), ManifestError> {
        match verb {
            "module" => {
                let [path] = args else {
                    return Err(self.error(line, "usage: module module/path"));
                };
                if self.module.is_some() {
                    return Err(self.error(line, "repeated module statement"));
                }
                self.module = Some(path.clone());
            }
            "go" => {
                let [version] = args else {
                    return Err(self.error(line, "usage: go 1.23"));
                };
                self.go_version = Some(version.clone());
            }
            "toolchain" => {
                let [name] = args else {
                    return Err(self.error(line, "usage: toolchain go1.23.0"));
                };
                self.toolchain = Some(name.clone());
            }
            "require" => {
                let [path, version] = args else {
                    return Err(self.error(line, "usage: require module/path v1.2.3"));
                };
                self.requires.push(Requirement {
                    path: path.clone(),
                    version: version.clone(),
                    indirect,
                });
            }
            "replace" => {
                let replace = parse_replace(args).ok_or_else(|| {
                    self.error(line, "usage: replace module/path [v1.2.3] => other/module v1.4")
                })?;
                self.replaces.push(replace);
            }
            "exclude" | "retract" | "godebug" | "tool" | "ignore" => {}
            other => return Err(self.error(line, format!("unknown directive: {}", other))),
        }
        Ok(())
    }
}

fn parse_replace(args: &[String]) -> Option<Replace> {
    let arrow = args.iter().position(|a| a == "=>")?;
    let (old, new) = (&args[..arrow], &args[arrow + 1..]);

    let (old_path, old_version) = match old {
        [path] => (path.clone(), None),
        [path, version] => (path.clone(), Some(version.clone())),
        _ => return None,
    };
    let (new_path, new_version) = match new {
        [path] => (path.clone(), None),
        [path, version] => (path.clone(), Some(version.clone())),
        _ => return None,
    };

    Some(Replace {
        old_path,
        old_version,
        new_path,
        new_version,
    })
}

/// Split a line into code and the text of a trailing `//` comment
fn split_comment(line: &str) -> (&str, &str) {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' && q == '"' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => {
                if c == '"' || c == '`' {
                    quote = Some(c);
                } else if line[i..].starts_with("//") {
                    return (&line[..i], &line[i + 2..]);
                }
            }
        }
    }
    (line, "")
}

fn is_indirect(comment: &str) -> bool {
    let comment = comment.trim();
    comment == "indirect" || comment.starts_with("indirect;")
}

/// Whitespace separated tokens; quoted tokens are unquoted
fn tokenize(code: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut chars = code.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let mut token = String::new();
        if c == '"' || c == '`' {
            chars.next();
            let mut closed = false;
            while let Some(ch) = chars.next() {
                if ch == c {
                    closed = true;
                    break;
                }
                if ch == '\\' && c == '"' {
                    match chars.next() {
                        Some(escaped) => token.push(escaped),
                        None => break,
                    }
                    continue;
                }
                token.push(ch);
            }
            if !closed {
                return Err("unterminated quoted string".to_string());
            }
        } else {
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                token.push(ch);
                chars.next();
            }
        }
        tokens.push(token);
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_minimal() {
        let gomod = GoMod::parse("go.mod", "module example.com/myproject\ngo 1.16\n").unwrap();
        assert_eq!(gomod.module, "example.com/myproject");
        assert_eq!(gomod.go_version.as_deref(), Some("1.16"));
        assert!(gomod.requires.is_empty());
        assert!(gomod.requirement_index().is_empty());
    }

    #[test]
    fn test_parse_full() {
        let content = r#"
// The app module
module "example.com/app"

go 1.22.1

toolchain go1.22.4

require github.com/sirupsen/logrus v1.9.3

require (
	golang.org/x/sys v0.15.0 // indirect
	gopkg.in/yaml.v3 v3.0.1

	github.com/Azure/azure-sdk v1.0.0 // indirect; pinned
)

replace github.com/sirupsen/logrus v1.9.3 => ../logrus

replace (
	gopkg.in/yaml.v3 => gopkg.in/yaml.v3 v3.0.0
)

exclude golang.org/x/net v0.1.0

retract [v1.0.0, v1.0.5]
"#;
        let gomod = GoMod::parse("go.mod", content).unwrap();
        assert_eq!(gomod.module, "example.com/app");
        assert_eq!(gomod.go_version.as_deref(), Some("1.22.1"));
        assert_eq!(gomod.toolchain.as_deref(), Some("go1.22.4"));

        let paths: Vec<&str> = gomod.requires.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "github.com/sirupsen/logrus",
                "golang.org/x/sys",
                "gopkg.in/yaml.v3",
                "github.com/Azure/azure-sdk",
            ]
        );
        assert!(!gomod.requires[0].indirect);
        assert!(gomod.requires[1].indirect);
        assert!(!gomod.requires[2].indirect);
        assert!(gomod.requires[3].indirect);

        assert_eq!(gomod.replaces.len(), 2);
        assert_eq!(gomod.replaces[0].old_version.as_deref(), Some("v1.9.3"));
        assert_eq!(gomod.replaces[0].new_path, "../logrus");
        assert!(gomod.replaces[0].is_local());
        assert_eq!(gomod.replaces[1].new_version.as_deref(), Some("v3.0.0"));
        assert!(!gomod.replaces[1].is_local());
    }

    #[test]
    fn test_requirement_index() {
        let content = "module example.com/app\nrequire (\n\tgithub.com/dep/lib v1.0.0\n\tgolang.org/x/tools v0.1.0\n)\n";
        let index = GoMod::parse("go.mod", content).unwrap().requirement_index();

        assert!(index.has_prefix("github.com/dep/lib"));
        assert!(index.has_prefix("github.com/dep/lib/sub"));
        assert!(index.has_prefix("golang.org/x/tools/go/packages"));
        assert!(!index.has_prefix("example.com/app"));
        assert!(!index.has_prefix("fmt"));
    }

    #[test]
    fn test_requirement_for_picks_longest_prefix() {
        let content = "module m\nrequire (\n\tcloud.google.com/go v0.110.0\n\tcloud.google.com/go/storage v1.30.0\n)\n";
        let gomod = GoMod::parse("go.mod", content).unwrap();

        let req = gomod.requirement_for("cloud.google.com/go/storage/internal").unwrap();
        assert_eq!(req.path, "cloud.google.com/go/storage");
        let req = gomod.requirement_for("cloud.google.com/go/pubsub").unwrap();
        assert_eq!(req.path, "cloud.google.com/go");
        assert!(gomod.requirement_for("cloud.google.com/gopher").is_none());
    }

    #[test]
    fn test_replacement_for_prefers_versioned() {
        let content = "module m\nreplace a.io/x => ../any\nreplace a.io/x v1.2.0 => ../pinned\n";
        let gomod = GoMod::parse("go.mod", content).unwrap();

        assert_eq!(gomod.replacement_for("a.io/x", "v1.2.0").unwrap().new_path, "../pinned");
        assert_eq!(gomod.replacement_for("a.io/x", "v1.3.0").unwrap().new_path, "../any");
        assert!(gomod.replacement_for("a.io/y", "v1.2.0").is_none());
    }

    #[test]
    fn test_missing_module() {
        let err = GoMod::parse("go.mod", "go 1.21\n").unwrap_err();
        assert!(matches!(err, ManifestError::MissingModule { .. }));
    }

    #[test]
    fn test_unknown_directive_reports_line() {
        let err = GoMod::parse("go.mod", "module m\n\nfrobnicate x\n").unwrap_err();
        match err {
            ManifestError::Syntax { line, message, .. } => {
                assert_eq!(line, 3);
                assert!(message.contains("frobnicate"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_require() {
        let err = GoMod::parse("go.mod", "module m\nrequire github.com/dep/lib\n").unwrap_err();
        assert!(matches!(err, ManifestError::Syntax { line: 2, .. }));
    }

    #[test]
    fn test_unterminated_block() {
        let err = GoMod::parse("go.mod", "module m\nrequire (\n\ta.io/b v1.0.0\n").unwrap_err();
        assert!(matches!(err, ManifestError::Syntax { line: 2, .. }));
    }

    #[test]
    fn test_module_does_not_take_block() {
        let err = GoMod::parse("go.mod", "module (\n)\n").unwrap_err();
        assert!(matches!(err, ManifestError::Syntax { line: 1, .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = GoMod::load(tmp.path().join("go.mod")).unwrap_err();
        assert!(matches!(err, ManifestError::Read { .. }));
    }

    #[test]
    fn test_load_from_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("go.mod");
        std::fs::write(&path, "module example.com/disk\n").unwrap();
        assert_eq!(GoMod::load(&path).unwrap().module, "example.com/disk");
    }

    #[test]
    fn test_is_path_prefix() {
        assert!(is_path_prefix("a/b", "a/b"));
        assert!(is_path_prefix("a/b", "a/b/c"));
        assert!(!is_path_prefix("a/b", "a/bc"));
        assert!(!is_path_prefix("a/b/c", "a/b"));
    }

    #[test]
    fn test_split_comment_ignores_quoted_slashes() {
        assert_eq!(split_comment(r#"module "a//b" // c"#), (r#"module "a//b" "#, " c"));
        assert_eq!(split_comment("require x v1 // indirect"), ("require x v1 ", " indirect"));
        assert_eq!(split_comment("go 1.21"), ("go 1.21", ""));
    }
}
