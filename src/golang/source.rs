//! Go source scanning
//!
//! Reads just enough of each `.go` file to learn its package name and its
//! imports, and decides which files take part in the build for the target
//! platform. Bodies are never parsed.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use super::env::{GoEnv, KNOWN_ARCH, KNOWN_OS};

/// Pseudo-package enabling cgo
const CGO_IMPORT: &str = "C";

/// Errors raised while scanning a package directory
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no buildable Go source files in {}", dir.display())]
    NoGoFiles { dir: PathBuf },

    #[error("found packages {first} ({first_file}) and {second} ({second_file}) in {}", dir.display())]
    MultiplePackages {
        dir: PathBuf,
        first: String,
        first_file: String,
        second: String,
        second_file: String,
    },

    #[error("{file}: {message}")]
    Syntax { file: String, message: String },
}

/// Package name and imports of one directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePackage {
    pub name: String,
    /// Imported paths, sorted and deduplicated
    pub imports: Vec<String>,
}

/// Scan the buildable `.go` files of `dir` for the target in `env`
pub fn scan_dir(dir: &Path, env: &GoEnv) -> Result<SourcePackage, ScanError> {
    let entries = std::fs::read_dir(dir).map_err(|source| ScanError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| is_candidate(name) && good_os_arch_file(name, env))
        .collect();
    names.sort();

    let mut package: Option<(String, String)> = None;
    let mut imports = BTreeSet::new();

    for name in names {
        let path = dir.join(&name);
        let content = std::fs::read_to_string(&path).map_err(|source| ScanError::Io {
            path: path.clone(),
            source,
        })?;

        let Some(file) = parse_file(&name, &content, env)? else {
            continue;
        };

        match &package {
            None => package = Some((file.package.clone(), name.clone())),
            Some((first, first_file)) if *first != file.package => {
                return Err(ScanError::MultiplePackages {
                    dir: dir.to_path_buf(),
                    first: first.clone(),
                    first_file: first_file.clone(),
                    second: file.package,
                    second_file: name,
                });
            }
            Some(_) => {}
        }

        imports.extend(file.imports);
    }

    let (name, _) = package.ok_or_else(|| ScanError::NoGoFiles {
        dir: dir.to_path_buf(),
    })?;

    Ok(SourcePackage {
        name,
        imports: imports.into_iter().collect(),
    })
}

/// `.go` file that is neither a test nor hidden
fn is_candidate(name: &str) -> bool {
    name.ends_with(".go")
        && !name.ends_with("_test.go")
        && !name.starts_with('_')
        && !name.starts_with('.')
}

/// Header of a single source file
#[derive(Debug, PartialEq, Eq)]
struct SourceFile {
    package: String,
    imports: Vec<String>,
}

/// Parse one file, returning `None` when it is excluded from the build
fn parse_file(name: &str, content: &str, env: &GoEnv) -> Result<Option<SourceFile>, ScanError> {
    let syntax = |message: String| ScanError::Syntax {
        file: name.to_string(),
        message,
    };

    if !header_constraint(content)
        .map_err(syntax)?
        .map_or(true, |constraint| constraint.eval(&|tag| match_tag(tag, env)))
    {
        return Ok(None);
    }

    let code = strip_comments(content);
    let package = package_re()
        .captures(&code)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| syntax("expected 'package' clause".to_string()))?;

    let imports = parse_imports(&code);
    // cgo is never enabled
    if imports.iter().any(|import| import == CGO_IMPORT) {
        return Ok(None);
    }

    Ok(Some(SourceFile { package, imports }))
}

fn package_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*package\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap())
}

fn import_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*import\s*\(([^)]*)\)").unwrap())
}

fn import_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^\s*import\s+(?:[A-Za-z_.][A-Za-z0-9_]*\s+)?["`]([^"`]+)["`]"#).unwrap()
    })
}

fn import_spec_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^\s*(?:[A-Za-z_.][A-Za-z0-9_]*\s+)?["`]([^"`]+)["`]"#).unwrap()
    })
}

fn decl_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*(?:func|type|var|const)\b").unwrap())
}

/// Import paths declared before the first top-level declaration
fn parse_imports(code: &str) -> Vec<String> {
    let head = match decl_re().find(code) {
        Some(decl) => &code[..decl.start()],
        None => code,
    };

    let mut imports = Vec::new();
    for block in import_block_re().captures_iter(head) {
        imports.extend(
            import_spec_re()
                .captures_iter(&block[1])
                .map(|spec| spec[1].to_string()),
        );
    }
    imports.extend(
        import_line_re()
            .captures_iter(head)
            .map(|caps| caps[1].to_string()),
    );
    imports.sort();
    imports.dedup();
    imports
}

/// Replace comments with whitespace, keeping string literals and line breaks
pub fn strip_comments(src: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        Line,
        Block,
        Str,
        Raw,
        Rune,
    }

    let mut out = String::with_capacity(src.len());
    let mut state = State::Code;
    let mut chars = src.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = State::Line;
                    out.push(' ');
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::Block;
                    out.push(' ');
                }
                '"' => {
                    state = State::Str;
                    out.push(c);
                }
                '`' => {
                    state = State::Raw;
                    out.push(c);
                }
                '\'' => {
                    state = State::Rune;
                    out.push(c);
                }
                _ => out.push(c),
            },
            State::Line => {
                if c == '\n' {
                    state = State::Code;
                    out.push(c);
                }
            }
            State::Block => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Code;
                } else if c == '\n' {
                    out.push(c);
                }
            }
            State::Str | State::Rune => {
                out.push(c);
                let close = if state == State::Str { '"' } else { '\'' };
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == close || c == '\n' {
                    state = State::Code;
                }
            }
            State::Raw => {
                out.push(c);
                if c == '`' {
                    state = State::Code;
                }
            }
        }
    }

    out
}

// ============================================================================
// Build constraints
// ============================================================================

/// A build constraint expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    Tag(String),
    Not(Box<Constraint>),
    And(Box<Constraint>, Box<Constraint>),
    Or(Box<Constraint>, Box<Constraint>),
}

impl Constraint {
    /// Evaluate with `has_tag` deciding each tag
    pub fn eval(&self, has_tag: &dyn Fn(&str) -> bool) -> bool {
        match self {
            Constraint::Tag(tag) => has_tag(tag),
            Constraint::Not(inner) => !inner.eval(has_tag),
            Constraint::And(a, b) => a.eval(has_tag) && b.eval(has_tag),
            Constraint::Or(a, b) => a.eval(has_tag) || b.eval(has_tag),
        }
    }

    /// Parse a `//go:build` expression
    pub fn parse(expr: &str) -> Result<Self, String> {
        let tokens = lex_constraint(expr)?;
        let mut parser = ConstraintParser { tokens, pos: 0 };
        let constraint = parser.or()?;
        match parser.tokens.get(parser.pos) {
            None => Ok(constraint),
            Some(token) => Err(format!("unexpected {} in build constraint", token)),
        }
    }

    /// Parse the lines of a legacy `// +build` constraint
    ///
    /// Lines are ANDed, space-separated options ORed, comma-separated
    /// terms ANDed.
    pub fn parse_plus_build<'a>(lines: impl IntoIterator<Item = &'a str>) -> Result<Self, String> {
        let mut result: Option<Constraint> = None;
        for line in lines {
            let mut line_expr: Option<Constraint> = None;
            for option in line.split_whitespace() {
                let mut option_expr: Option<Constraint> = None;
                for term in option.split(',') {
                    let (negated, tag) = match term.strip_prefix('!') {
                        Some(tag) => (true, tag),
                        None => (false, term),
                    };
                    if tag.is_empty() || !tag.chars().all(is_tag_char) {
                        return Err(format!("invalid +build term {:?}", term));
                    }
                    let mut expr = Constraint::Tag(tag.to_string());
                    if negated {
                        expr = Constraint::Not(Box::new(expr));
                    }
                    option_expr = Some(and(option_expr, expr));
                }
                if let Some(option_expr) = option_expr {
                    line_expr = Some(match line_expr {
                        Some(prev) => Constraint::Or(Box::new(prev), Box::new(option_expr)),
                        None => option_expr,
                    });
                }
            }
            if let Some(line_expr) = line_expr {
                result = Some(and(result, line_expr));
            }
        }
        result.ok_or_else(|| "empty +build constraint".to_string())
    }
}

fn and(prev: Option<Constraint>, next: Constraint) -> Constraint {
    match prev {
        Some(prev) => Constraint::And(Box::new(prev), Box::new(next)),
        None => next,
    }
}

fn is_tag_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

fn lex_constraint(expr: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' | ')' | '!' => {
                chars.next();
                tokens.push(c.to_string());
            }
            '&' | '|' => {
                chars.next();
                if chars.next() != Some(c) {
                    return Err(format!("invalid operator {:?} in build constraint", c));
                }
                tokens.push(format!("{}{}", c, c));
            }
            c if is_tag_char(c) => {
                let mut tag = String::new();
                while let Some(&c) = chars.peek().filter(|c| is_tag_char(**c)) {
                    tag.push(c);
                    chars.next();
                }
                tokens.push(tag);
            }
            other => return Err(format!("invalid character {:?} in build constraint", other)),
        }
    }
    Ok(tokens)
}

struct ConstraintParser {
    tokens: Vec<String>,
    pos: usize,
}

impl ConstraintParser {
    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn or(&mut self) -> Result<Constraint, String> {
        let mut left = self.and()?;
        while self.peek() == Some("||") {
            self.pos += 1;
            left = Constraint::Or(Box::new(left), Box::new(self.and()?));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Constraint, String> {
        let mut left = self.not()?;
        while self.peek() == Some("&&") {
            self.pos += 1;
            left = Constraint::And(Box::new(left), Box::new(self.not()?));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Constraint, String> {
        if self.peek() == Some("!") {
            self.pos += 1;
            return Ok(Constraint::Not(Box::new(self.not()?)));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Constraint, String> {
        let token = self
            .peek()
            .ok_or_else(|| "unexpected end of build constraint".to_string())?
            .to_string();
        self.pos += 1;
        match token.as_str() {
            "(" => {
                let inner = self.or()?;
                if self.peek() != Some(")") {
                    return Err("missing ) in build constraint".to_string());
                }
                self.pos += 1;
                Ok(inner)
            }
            ")" | "&&" | "||" => Err(format!("unexpected {} in build constraint", token)),
            _ => Ok(Constraint::Tag(token)),
        }
    }
}

/// Constraint declared in the file header, before the package clause
///
/// A `//go:build` line wins over `// +build` lines.
fn header_constraint(content: &str) -> Result<Option<Constraint>, String> {
    let mut go_build: Option<&str> = None;
    let mut plus_build = Vec::new();
    let mut in_block = false;

    for line in content.lines() {
        let line = line.trim();
        if in_block {
            if line.contains("*/") {
                in_block = false;
            }
            continue;
        }
        if let Some(comment) = line.strip_prefix("//") {
            if let Some(expr) = comment.strip_prefix("go:build") {
                if go_build.is_none() {
                    go_build = Some(expr);
                }
            } else if let Some(expr) = comment.trim_start().strip_prefix("+build") {
                plus_build.push(expr);
            }
            continue;
        }
        if line.starts_with("/*") {
            in_block = !line.contains("*/");
            continue;
        }
        if !line.is_empty() {
            break;
        }
    }

    match go_build {
        Some(expr) => Constraint::parse(expr).map(Some),
        None if plus_build.is_empty() => Ok(None),
        None => Constraint::parse_plus_build(plus_build).map(Some),
    }
}

/// Whether `tag` is satisfied when building for `env`
pub fn match_tag(tag: &str, env: &GoEnv) -> bool {
    if tag == env.goos || tag == env.goarch {
        return true;
    }
    match tag {
        "gc" => true,
        "unix" => env.is_unix(),
        "linux" => env.goos == "android",
        "solaris" => env.goos == "illumos",
        "darwin" => env.goos == "ios",
        _ => is_release_tag(tag),
    }
}

/// `go1.N` release tags
fn is_release_tag(tag: &str) -> bool {
    tag.strip_prefix("go1.")
        .is_some_and(|minor| !minor.is_empty() && minor.chars().all(|c| c.is_ascii_digit()))
}

/// Filename `_GOOS`, `_GOARCH` and `_GOOS_GOARCH` suffixes match the target
pub fn good_os_arch_file(name: &str, env: &GoEnv) -> bool {
    let stem = match name.find('.') {
        Some(dot) => &name[..dot],
        None => name,
    };
    let stem = stem.strip_suffix("_test").unwrap_or(stem);

    // The first element never counts: linux.go builds everywhere
    let Some(underscore) = stem.find('_') else {
        return true;
    };
    let parts: Vec<&str> = stem[underscore..].split('_').collect();
    let n = parts.len();

    if n >= 2 && KNOWN_OS.contains(&parts[n - 2]) && KNOWN_ARCH.contains(&parts[n - 1]) {
        return match_tag(parts[n - 2], env) && match_tag(parts[n - 1], env);
    }
    let last = parts[n - 1];
    if KNOWN_OS.contains(&last) || KNOWN_ARCH.contains(&last) {
        return match_tag(last, env);
    }
    true
}
