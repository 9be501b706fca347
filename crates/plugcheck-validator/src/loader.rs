//! # Entry-Point Module Loading
//!
//! Checking an entry point needs two things from the plugin's source tree:
//! find the module named on the left of `module:symbol`, and ask whether it
//! binds the symbol on the right. [`ModuleLoader`] is that capability. The
//! search path is an argument to every call, so a load never changes
//! process-wide state and two validations can run side by side.
//!
//! [`PythonSourceLoader`] is the default. It locates `a.b.c` as
//! `<src>/a/b/c/__init__.py` or `<src>/a/b/c.py`, parses it with
//! `rustpython-parser` and collects the module-level bindings from the
//! syntax tree, following `from ... import *` into sibling modules. A file
//! that does not parse is a [`ModuleLoadError::Syntax`]. Plugin code is never
//! executed, so a plugin that does blocking work at import time cannot hang
//! validation.
//!
//! [`StaticModuleLoader`] serves modules from memory for tests and for
//! pipelines that already know a plugin's exports.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use plugcheck_core::ModuleLoadError;
use rustpython_parser::{ast, Parse};

/// A module handle that can be asked which names it binds.
pub trait LoadedModule: fmt::Debug + Send + Sync {
    /// The dotted module path it was loaded as.
    fn name(&self) -> &str;

    /// Whether the module binds `attribute` at top level.
    fn has_attribute(&self, attribute: &str) -> bool;

    /// Every top-level name, sorted.
    fn attributes(&self) -> Vec<&str>;

    /// The file the module was read from, when it came from disk.
    fn origin(&self) -> Option<&Path> {
        None
    }
}

/// Loads a module by dotted path from a single search location.
pub trait ModuleLoader: Send + Sync {
    /// Load `module` with `search_path` as the only place to look.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleLoadError`] when the name is invalid, nothing matches
    /// under `search_path`, or the module file cannot be read.
    fn load(&self, search_path: &Path, module: &str) -> Result<Box<dyn LoadedModule>, ModuleLoadError>;
}

impl<T: ModuleLoader + ?Sized> ModuleLoader for Arc<T> {
    fn load(&self, search_path: &Path, module: &str) -> Result<Box<dyn LoadedModule>, ModuleLoadError> {
        (**self).load(search_path, module)
    }
}

impl<T: ModuleLoader + ?Sized> ModuleLoader for Box<T> {
    fn load(&self, search_path: &Path, module: &str) -> Result<Box<dyn LoadedModule>, ModuleLoadError> {
        (**self).load(search_path, module)
    }
}

/// A module and the names it binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceModule {
    name: String,
    origin: Option<PathBuf>,
    attributes: BTreeSet<String>,
}

impl SourceModule {
    /// Build a module from a known set of names.
    pub fn new<I, S>(name: impl Into<String>, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            origin: None,
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }
}

impl LoadedModule for SourceModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.contains(attribute)
    }

    fn attributes(&self) -> Vec<&str> {
        self.attributes.iter().map(String::as_str).collect()
    }

    fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }
}

/// Resolves modules inside a Python plugin source tree.
///
/// `a.b.c` is found as `<src>/a/b/c/__init__.py`, falling back to
/// `<src>/a/b/c.py`. Every parent package (`a`, `a.b`) must hold an
/// `__init__.py`; Python 2.7 has no namespace packages. Star imports whose
/// target lives in the same tree are followed, so a package that re-exports
/// its implementation through `from .impl import *` binds those names.
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonSourceLoader;

/// A module read from disk together with what it exports to star imports.
#[derive(Debug)]
struct ResolvedModule {
    path: PathBuf,
    names: BTreeSet<String>,
    exported: BTreeSet<String>,
}

impl PythonSourceLoader {
    /// Create a loader.
    pub fn new() -> Self {
        Self
    }

    /// The file `module` would be loaded from under `search_path`.
    ///
    /// # Errors
    ///
    /// `InvalidName` when a segment is not a Python identifier, `NotFound`
    /// when a parent package has no `__init__.py` or no module file exists.
    pub fn locate(&self, search_path: &Path, module: &str) -> Result<PathBuf, ModuleLoadError> {
        let segments: Vec<&str> = module.split('.').collect();
        if segments.iter().any(|segment| !is_identifier(segment)) {
            return Err(ModuleLoadError::InvalidName {
                module: module.to_string(),
            });
        }
        let not_found = || ModuleLoadError::NotFound {
            module: module.to_string(),
            search_path: search_path.to_path_buf(),
        };

        let (leaf, parents) = segments.split_last().ok_or_else(not_found)?;
        let mut base = search_path.to_path_buf();
        for parent in parents {
            base.push(parent);
            if !base.join("__init__.py").is_file() {
                tracing::debug!(package = %base.display(), "parent package has no __init__.py");
                return Err(not_found());
            }
        }

        let package = base.join(leaf).join("__init__.py");
        if package.is_file() {
            return Ok(package);
        }
        let plain = base.join(format!("{leaf}.py"));
        if plain.is_file() {
            return Ok(plain);
        }
        Err(not_found())
    }

    /// Read, parse and bind `module`, following star imports. `active`
    /// holds the modules currently being resolved so import cycles end.
    fn resolve(
        &self,
        search_path: &Path,
        module: &str,
        active: &mut Vec<String>,
    ) -> Result<ResolvedModule, ModuleLoadError> {
        let path = self.locate(search_path, module)?;
        let bytes = std::fs::read(&path).map_err(|source| ModuleLoadError::Io {
            module: module.to_string(),
            path: path.clone(),
            source,
        })?;
        let source = String::from_utf8_lossy(&bytes);
        let ModuleBindings {
            mut names,
            public,
            star_imports,
        } = scan_module(&source, &path.to_string_lossy()).map_err(|err| {
            ModuleLoadError::Syntax {
                module: module.to_string(),
                path: path.clone(),
                line: err.line,
                column: err.column,
                message: err.message,
            }
        })?;

        let is_package = path.file_name().is_some_and(|name| name == "__init__.py");
        active.push(module.to_string());
        for star in &star_imports {
            if let Some(imported) = self.resolve_star(search_path, module, is_package, star, active)? {
                names.extend(imported);
            }
        }
        active.pop();

        let exported = match public {
            Some(listed) => listed.into_iter().collect(),
            None => names
                .iter()
                .filter(|name| !name.starts_with('_'))
                .cloned()
                .collect(),
        };
        Ok(ResolvedModule {
            path,
            names,
            exported,
        })
    }

    /// The names `star` brings into `importer`, or `None` when its target is
    /// outside the source tree or already being resolved.
    fn resolve_star(
        &self,
        search_path: &Path,
        importer: &str,
        importer_is_package: bool,
        star: &StarImport,
        active: &mut Vec<String>,
    ) -> Result<Option<BTreeSet<String>>, ModuleLoadError> {
        let mut package: Vec<&str> = importer.split('.').collect();
        if !importer_is_package {
            package.pop();
        }

        let candidates = if star.level == 0 {
            let Some(target) = star.module.as_deref() else {
                return Ok(None);
            };
            // Python 2 tries the importer's own package before the top level.
            let mut candidates = Vec::with_capacity(2);
            if !package.is_empty() {
                candidates.push(format!("{}.{target}", package.join(".")));
            }
            candidates.push(target.to_string());
            candidates
        } else {
            let up = star.level as usize - 1;
            let base = match package.len().checked_sub(up) {
                Some(len) if len > 0 => package[..len].join("."),
                _ => {
                    return Err(ModuleLoadError::NotFound {
                        module: star.dotted(),
                        search_path: search_path.to_path_buf(),
                    })
                }
            };
            vec![match star.module.as_deref() {
                Some(target) => format!("{base}.{target}"),
                None => base,
            }]
        };

        for candidate in &candidates {
            match self.locate(search_path, candidate) {
                Ok(_) => {}
                Err(ModuleLoadError::NotFound { .. }) => continue,
                Err(other) => return Err(other),
            }
            if active.contains(candidate) {
                tracing::debug!(importer, module = %candidate, "star import cycle; skipping");
                return Ok(None);
            }
            return self
                .resolve(search_path, candidate, active)
                .map(|resolved| Some(resolved.exported));
        }

        if star.level == 0 {
            tracing::debug!(
                importer,
                module = %star.dotted(),
                "star import target is outside the source tree; its names are unknown"
            );
            Ok(None)
        } else {
            Err(ModuleLoadError::NotFound {
                module: star.dotted(),
                search_path: search_path.to_path_buf(),
            })
        }
    }
}

impl ModuleLoader for PythonSourceLoader {
    fn load(&self, search_path: &Path, module: &str) -> Result<Box<dyn LoadedModule>, ModuleLoadError> {
        let resolved = self.resolve(search_path, module, &mut Vec::new())?;
        tracing::debug!(
            module,
            path = %resolved.path.display(),
            names = resolved.names.len(),
            "loaded module source"
        );
        Ok(Box::new(SourceModule {
            name: module.to_string(),
            origin: Some(resolved.path),
            attributes: resolved.names,
        }))
    }
}

/// Serves modules from an in-memory table; the search path is ignored.
#[derive(Debug, Clone, Default)]
pub struct StaticModuleLoader {
    modules: BTreeMap<String, BTreeSet<String>>,
}

impl StaticModuleLoader {
    /// An empty table; every load fails with `NotFound`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `module` binding `attributes`.
    pub fn with_module<I, S>(mut self, module: impl Into<String>, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modules.insert(
            module.into(),
            attributes.into_iter().map(Into::into).collect(),
        );
        self
    }
}

impl ModuleLoader for StaticModuleLoader {
    fn load(&self, search_path: &Path, module: &str) -> Result<Box<dyn LoadedModule>, ModuleLoadError> {
        let attributes = self
            .modules
            .get(module)
            .ok_or_else(|| ModuleLoadError::NotFound {
                module: module.to_string(),
                search_path: search_path.to_path_buf(),
            })?;
        Ok(Box::new(SourceModule {
            name: module.to_string(),
            origin: None,
            attributes: attributes.clone(),
        }))
    }
}

// ── Python source scanning ──────────────────────────────────────────

/// Python 2.7 reserved words; none of them can name a module.
const KEYWORDS: &[&str] = &[
    "and", "as", "assert", "break", "class", "continue", "def", "del", "elif", "else", "except",
    "exec", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda", "not", "or",
    "pass", "print", "raise", "return", "try", "while", "with", "yield", "None", "True", "False",
];

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first == '_' || first.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        && !KEYWORDS.contains(&segment)
}

/// What a module binds at module level, read from its syntax tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleBindings {
    /// Names bound by the module's own statements.
    pub names: BTreeSet<String>,
    /// The literal `__all__` list, when the module declares one.
    pub public: Option<Vec<String>>,
    /// `from ... import *` statements in source order.
    pub star_imports: Vec<StarImport>,
}

/// One `from ... import *` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StarImport {
    /// Number of leading dots; 0 for an absolute import.
    pub level: u32,
    /// The dotted module after the dots, if any.
    pub module: Option<String>,
}

impl StarImport {
    /// The import target as written, e.g. `..impl`.
    pub fn dotted(&self) -> String {
        format!("{}{}", ".".repeat(self.level as usize), self.module.as_deref().unwrap_or_default())
    }
}

/// A module source that does not parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSyntaxError {
    /// 1-based line.
    pub line: usize,
    /// 1-based column, counted in characters.
    pub column: usize,
    /// The parser's description.
    pub message: String,
}

/// Parse `source` and collect its module-level bindings.
///
/// Bodies of `if`, `try`, `with`, `for` and `while` at module level are
/// walked; function and class bodies are not. The body of an
/// `if __name__ == "__main__":` guard is skipped because it never runs on
/// import.
///
/// # Errors
///
/// Returns [`SourceSyntaxError`] when the source is not valid Python.
pub fn scan_module(source: &str, source_path: &str) -> Result<ModuleBindings, SourceSyntaxError> {
    let suite = ast::Suite::parse(source, source_path).map_err(|err| {
        let (line, column) = line_column(source, u32::from(err.offset) as usize);
        SourceSyntaxError {
            line,
            column,
            message: err.error.to_string(),
        }
    })?;
    let mut bindings = ModuleBindings::default();
    collect_block(&suite, &mut bindings);
    Ok(bindings)
}

fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let before = source.get(..offset).unwrap_or(source);
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |idx| idx + 1);
    (line, before[line_start..].chars().count() + 1)
}

fn collect_block(body: &[ast::Stmt], out: &mut ModuleBindings) {
    for stmt in body {
        match stmt {
            ast::Stmt::FunctionDef(def) => bind(&mut out.names, def.name.as_str()),
            ast::Stmt::AsyncFunctionDef(def) => bind(&mut out.names, def.name.as_str()),
            ast::Stmt::ClassDef(def) => bind(&mut out.names, def.name.as_str()),
            ast::Stmt::Assign(assign) => {
                for target in &assign.targets {
                    bind_target(target, &mut out.names);
                    if is_name(target, "__all__") {
                        out.public = string_list(&assign.value);
                    }
                }
            }
            ast::Stmt::AnnAssign(assign) if assign.value.is_some() => {
                bind_target(&assign.target, &mut out.names);
            }
            ast::Stmt::AugAssign(assign) if is_name(&assign.target, "__all__") => {
                if let (Some(public), Some(extra)) = (out.public.as_mut(), string_list(&assign.value)) {
                    public.extend(extra);
                }
            }
            ast::Stmt::Import(import) => {
                for alias in &import.names {
                    let bound = match &alias.asname {
                        Some(asname) => asname.as_str(),
                        None => alias.name.as_str().split('.').next().unwrap_or_default(),
                    };
                    bind(&mut out.names, bound);
                }
            }
            ast::Stmt::ImportFrom(import) => {
                for alias in &import.names {
                    if alias.name.as_str() == "*" {
                        out.star_imports.push(StarImport {
                            level: import.level.as_ref().map_or(0, |level| level.to_u32()),
                            module: import.module.as_ref().map(|m| m.as_str().to_string()),
                        });
                        continue;
                    }
                    let bound = alias.asname.as_ref().unwrap_or(&alias.name);
                    bind(&mut out.names, bound.as_str());
                }
            }
            ast::Stmt::If(branch) => {
                if !is_main_guard(&branch.test) {
                    collect_block(&branch.body, out);
                }
                collect_block(&branch.orelse, out);
            }
            ast::Stmt::For(repeat) => {
                bind_target(&repeat.target, &mut out.names);
                collect_block(&repeat.body, out);
                collect_block(&repeat.orelse, out);
            }
            ast::Stmt::While(repeat) => {
                collect_block(&repeat.body, out);
                collect_block(&repeat.orelse, out);
            }
            ast::Stmt::With(with) => {
                for item in &with.items {
                    if let Some(vars) = &item.optional_vars {
                        bind_target(vars, &mut out.names);
                    }
                }
                collect_block(&with.body, out);
            }
            ast::Stmt::Try(attempt) => {
                collect_block(&attempt.body, out);
                for handler in &attempt.handlers {
                    match handler {
                        ast::ExceptHandler::ExceptHandler(handler) => {
                            if let Some(name) = &handler.name {
                                bind(&mut out.names, name.as_str());
                            }
                            collect_block(&handler.body, out);
                        }
                    }
                }
                collect_block(&attempt.orelse, out);
                collect_block(&attempt.finalbody, out);
            }
            _ => {}
        }
    }
}

fn bind(names: &mut BTreeSet<String>, name: &str) {
    names.insert(name.to_string());
}

fn bind_target(target: &ast::Expr, names: &mut BTreeSet<String>) {
    match target {
        ast::Expr::Name(name) => bind(names, name.id.as_str()),
        ast::Expr::Tuple(tuple) => tuple.elts.iter().for_each(|elt| bind_target(elt, names)),
        ast::Expr::List(list) => list.elts.iter().for_each(|elt| bind_target(elt, names)),
        ast::Expr::Starred(starred) => bind_target(&starred.value, names),
        // Attribute and subscript targets mutate other objects.
        _ => {}
    }
}

fn is_name(expr: &ast::Expr, expected: &str) -> bool {
    matches!(expr, ast::Expr::Name(name) if name.id.as_str() == expected)
}

fn string_list(expr: &ast::Expr) -> Option<Vec<String>> {
    let elts = match expr {
        ast::Expr::List(list) => &list.elts,
        ast::Expr::Tuple(tuple) => &tuple.elts,
        _ => return None,
    };
    elts.iter()
        .map(|elt| match elt {
            ast::Expr::Constant(constant) => match &constant.value {
                ast::Constant::Str(value) => Some(value.clone()),
                _ => None,
            },
            _ => None,
        })
        .collect()
}

fn is_main_guard(test: &ast::Expr) -> bool {
    let ast::Expr::Compare(compare) = test else {
        return false;
    };
    matches!(compare.ops.as_slice(), [ast::CmpOp::Eq])
        && is_name(&compare.left, "__name__")
        && matches!(
            compare.comparators.as_slice(),
            [ast::Expr::Constant(constant)]
                if matches!(&constant.value, ast::Constant::Str(value) if value == "__main__")
        )
}
