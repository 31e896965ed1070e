//! Static extraction of style values from JSX elements, function calls and
//! tagged templates.
//!
//! Matched occurrences are reduced to [`BoxNode`] trees without executing any
//! code. Whatever cannot be determined statically degrades to an
//! `Unresolvable` leaf instead of failing the file.

pub mod box_node;
pub mod context;
pub mod errors;
pub mod evaluate;
pub mod extract;
pub mod matchers;
pub mod node_ref;
pub mod project;
pub mod scope;

pub use box_node::{
  BoxNode, ConditionalBox, ListBox, LiteralBox, MapBox, Primitive, UnresolvableBox,
  UnresolvableReason,
};
pub use context::{EvaluateOptions, EvaluationContext, EvaluationFlags, PureHelpers};
pub use errors::ExtractError;
pub use evaluate::Evaluator;
pub use extract::{
  Diagnostic, ExtractResult, ExtractResultItem, ExtractResultKind, ExtractedInstance, Extractor,
  InstanceKind,
};
pub use matchers::{
  ComponentMatcher, FactoryResolver, FunctionMatcher, JsxFactory, ListOrAll, MatcherSet,
  NameMatchers, TaggedTemplateMatcher,
};
pub use node_ref::{NodeKind, NodeRef};
pub use project::{InMemoryProject, Location, NodeHandle, ProjectIndex, SourceFile};
