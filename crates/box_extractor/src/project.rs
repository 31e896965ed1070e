use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use box_extractor_swc_runner::{parse_module, ParseError, ParseOptions, ParsedModule};
use indexmap::IndexMap;
use serde::Serialize;
use swc_core::common::sync::Lrc;
use swc_core::common::{BytePos, SourceMap, SourceMapper, Span, Spanned};
use swc_core::ecma::ast::{CallExpr, Expr, JSXAttr, JSXOpeningElement, Module, Prop, TaggedTpl};
use swc_core::ecma::visit::{noop_visit_type, Visit, VisitWith};

use crate::node_ref::{NodeKind, NodeRef};

/// Extensions probed, in order, when an import specifier has none.
pub const DEFAULT_CODE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs"];

/// Supplies parsed files and resolves imports between them.
///
/// The index owns every syntax tree. Extraction only borrows them for the
/// duration of a run.
pub trait ProjectIndex {
  fn file(&self, path: &Path) -> Option<&SourceFile>;

  /// Resolve `specifier` imported from `from` into the path of an indexed file.
  fn resolve_import(&self, from: &Path, specifier: &str) -> Option<PathBuf>;
}

/// Line and column of a node, both 1-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Location {
  pub line: usize,
  pub column: usize,
}

/// A node re-resolved from a `NodeRef`.
#[derive(Clone, Copy, Debug)]
pub enum NodeHandle<'n> {
  Expr(&'n Expr),
  JsxOpeningElement(&'n JSXOpeningElement),
  JsxAttr(&'n JSXAttr),
  CallExpr(&'n CallExpr),
  TaggedTpl(&'n TaggedTpl),
  Prop(&'n Prop),
}

/// A parsed source file.
pub struct SourceFile {
  path: Arc<Path>,
  module: Module,
  source_map: Lrc<SourceMap>,
}

impl SourceFile {
  pub fn parse(path: impl Into<PathBuf>, code: &str) -> Result<Self, ParseError> {
    let path = path.into();
    let parsed = parse_module(ParseOptions {
      path: &path,
      code,
      syntax: None,
    })?;
    Ok(SourceFile::from_parsed(path, parsed))
  }

  pub fn from_parsed(path: impl Into<PathBuf>, parsed: ParsedModule) -> Self {
    SourceFile {
      path: Arc::from(path.into()),
      module: parsed.module,
      source_map: parsed.source_map,
    }
  }

  pub fn path(&self) -> &Arc<Path> {
    &self.path
  }

  pub fn module(&self) -> &Module {
    &self.module
  }

  /// Find the node referenced by `node` and hand it to `f`.
  ///
  /// Returns `None` when the reference points into another file or no longer
  /// matches a node of this tree.
  pub fn with_node<R>(&self, node: &NodeRef, f: impl FnOnce(NodeHandle<'_>) -> R) -> Option<R> {
    if *node.file != *self.path {
      return None;
    }

    let mut finder = NodeFinder {
      target: node,
      callback: Some(f),
      result: None,
    };
    self.module.visit_with(&mut finder);
    finder.result
  }

  /// Source text covered by `span`.
  pub fn snippet(&self, span: Span) -> Option<String> {
    self.source_map.span_to_snippet(span).ok()
  }

  /// Line and column of `node`, or `None` for references into other files and
  /// dummy spans.
  pub fn location(&self, node: &NodeRef) -> Option<Location> {
    if *node.file != *self.path || node.start == 0 {
      return None;
    }

    let pos = BytePos(node.start);
    let file = self.source_map.lookup_source_file(pos);
    let src = file.src.as_ref();

    if pos.0 < file.start_pos.0 {
      return None;
    }

    // Spans that do not land on a char boundary would make `lookup_char_pos` panic
    let rel = (pos.0 - file.start_pos.0) as usize;
    if rel > src.len() || !src.is_char_boundary(rel) {
      return None;
    }

    let loc = self.source_map.lookup_char_pos(pos);
    Some(Location {
      line: loc.line,
      column: loc.col.0 + 1,
    })
  }
}

struct NodeFinder<'t, F, R> {
  target: &'t NodeRef,
  callback: Option<F>,
  result: Option<R>,
}

impl<F, R> NodeFinder<'_, F, R>
where
  F: FnOnce(NodeHandle<'_>) -> R,
{
  fn matches(&self, kind: NodeKind, node: &impl Spanned) -> bool {
    let span = node.span();
    self.target.kind == kind && self.target.start == span.lo.0 && self.target.end == span.hi.0
  }

  fn found(&mut self, handle: NodeHandle<'_>) {
    if let Some(callback) = self.callback.take() {
      self.result = Some(callback(handle));
    }
  }

  fn is_done(&self) -> bool {
    self.callback.is_none()
  }

  fn covers(&self, node: &impl Spanned) -> bool {
    let span = node.span();
    span.lo.0 <= self.target.start && self.target.end <= span.hi.0
  }
}

impl<F, R> Visit for NodeFinder<'_, F, R>
where
  F: FnOnce(NodeHandle<'_>) -> R,
{
  noop_visit_type!();

  fn visit_expr(&mut self, node: &Expr) {
    if self.is_done() || !self.covers(node) {
      return;
    }
    if self.matches(NodeKind::Expr, node) {
      return self.found(NodeHandle::Expr(node));
    }
    node.visit_children_with(self);
  }

  fn visit_call_expr(&mut self, node: &CallExpr) {
    if self.is_done() {
      return;
    }
    if self.matches(NodeKind::CallExpr, node) {
      return self.found(NodeHandle::CallExpr(node));
    }
    node.visit_children_with(self);
  }

  fn visit_tagged_tpl(&mut self, node: &TaggedTpl) {
    if self.is_done() {
      return;
    }
    if self.matches(NodeKind::TaggedTpl, node) {
      return self.found(NodeHandle::TaggedTpl(node));
    }
    node.visit_children_with(self);
  }

  fn visit_jsx_opening_element(&mut self, node: &JSXOpeningElement) {
    if self.is_done() {
      return;
    }
    if self.matches(NodeKind::JsxOpeningElement, node) {
      return self.found(NodeHandle::JsxOpeningElement(node));
    }
    node.visit_children_with(self);
  }

  fn visit_jsx_attr(&mut self, node: &JSXAttr) {
    if self.is_done() {
      return;
    }
    if self.matches(NodeKind::JsxAttr, node) {
      return self.found(NodeHandle::JsxAttr(node));
    }
    node.visit_children_with(self);
  }

  fn visit_prop(&mut self, node: &Prop) {
    if self.is_done() {
      return;
    }
    if self.matches(NodeKind::Prop, node) {
      return self.found(NodeHandle::Prop(node));
    }
    node.visit_children_with(self);
  }
}

/// Project index over files parsed in memory.
///
/// Relative specifiers resolve against the importing file, trying the exact
/// path, then each of `DEFAULT_CODE_EXTENSIONS`, then `index.*` files.
/// Aliases map a specifier prefix (`@/`) to a directory.
#[derive(Default)]
pub struct InMemoryProject {
  files: IndexMap<PathBuf, SourceFile>,
  aliases: IndexMap<String, PathBuf>,
}

impl InMemoryProject {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_file(&mut self, path: impl Into<PathBuf>, code: &str) -> Result<(), ParseError> {
    let path = normalize_path(&path.into());
    let file = SourceFile::parse(path.clone(), code)?;
    self.files.insert(path, file);
    Ok(())
  }

  pub fn insert(&mut self, file: SourceFile) {
    self.files.insert(file.path.to_path_buf(), file);
  }

  pub fn with_alias(mut self, prefix: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
    self.aliases.insert(prefix.into(), directory.into());
    self
  }

  pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
    self.files.keys()
  }

  fn probe(&self, candidate: &Path) -> Option<PathBuf> {
    if self.files.contains_key(candidate) {
      return Some(candidate.to_path_buf());
    }

    let with_extension = DEFAULT_CODE_EXTENSIONS.iter().map(|ext| {
      let mut name = candidate.as_os_str().to_owned();
      name.push(".");
      name.push(ext);
      PathBuf::from(name)
    });
    let index_files = DEFAULT_CODE_EXTENSIONS
      .iter()
      .map(|ext| candidate.join(format!("index.{ext}")));

    with_extension
      .chain(index_files)
      .find(|path| self.files.contains_key(path))
  }
}

impl ProjectIndex for InMemoryProject {
  fn file(&self, path: &Path) -> Option<&SourceFile> {
    self.files.get(path)
  }

  fn resolve_import(&self, from: &Path, specifier: &str) -> Option<PathBuf> {
    let base = if specifier.starts_with("./") || specifier.starts_with("../") {
      from.parent().unwrap_or(Path::new("")).join(specifier)
    } else if specifier.starts_with('/') {
      PathBuf::from(specifier)
    } else {
      let (prefix, directory) = self
        .aliases
        .iter()
        .find(|(prefix, _)| specifier.starts_with(prefix.as_str()))?;
      directory.join(&specifier[prefix.len()..])
    };

    self.probe(&normalize_path(&base))
  }
}

/// Lexically resolve `.` and `..` components.
fn normalize_path(path: &Path) -> PathBuf {
  let mut normalized = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        if !normalized.pop() {
          normalized.push("..");
        }
      }
      other => normalized.push(other.as_os_str()),
    }
  }
  normalized
}
