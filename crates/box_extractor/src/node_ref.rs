use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

/// Coarse category of a referenced syntax node.
///
/// Used together with the span to re-resolve the node, since several nodes can
/// share the same span (e.g. an expression statement and its expression).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
  Expr,
  JsxOpeningElement,
  JsxAttr,
  CallExpr,
  TaggedTpl,
  Prop,
}

/// Stable reference to a node of a caller-owned syntax tree.
///
/// Holds no reference to the tree itself: `start` and `end` are the byte
/// positions of the node's span within the source map of `file`. Use
/// `SourceFile::with_node` to get the node back.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct NodeRef {
  pub file: Arc<Path>,
  pub start: u32,
  pub end: u32,
  pub kind: NodeKind,
}

impl NodeRef {
  pub fn new(file: Arc<Path>, span: swc_core::common::Span, kind: NodeKind) -> Self {
    NodeRef {
      file,
      start: span.lo.0,
      end: span.hi.0,
      kind,
    }
  }

  pub fn span(&self) -> swc_core::common::Span {
    swc_core::common::Span::new(
      swc_core::common::BytePos(self.start),
      swc_core::common::BytePos(self.end),
    )
  }
}

impl Display for NodeRef {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}@{}..{}", self.file.display(), self.start, self.end)
  }
}
