//! Static evaluation of expressions into boxes.
//!
//! The evaluator reduces an expression bottom-up. Identifiers are followed to
//! their constant bindings, across files when imports resolve through the
//! project index. Nothing here panics or returns an error: whatever cannot be
//! reduced becomes an `Unresolvable` box carrying the reason.

mod bindings;
mod literals;
mod operators;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use swc_core::atoms::Atom;
use swc_core::common::{Span, Spanned};
use swc_core::ecma::ast::*;
use swc_core::ecma::utils::stack_size::maybe_grow_default;

use crate::box_node::{BoxNode, UnresolvableReason};
use crate::context::{EvaluateOptions, EvaluationContext, HelperFn};
use crate::node_ref::{NodeKind, NodeRef};
use crate::project::ProjectIndex;
use crate::scope::ModuleScope;

/// A binding whose value is cached and guarded against cycles.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum BindingKey {
  Local(Arc<Path>, Id),
  Export(Arc<Path>, Atom),
  Namespace(Arc<Path>),
}

/// Reduces expressions of the files of one project.
///
/// Holds the per-run state: collected scopes, resolved binding values and the
/// set of bindings currently being evaluated. One evaluator is meant to be
/// used for one extraction run and then dropped.
pub struct Evaluator<'p> {
  project: &'p dyn ProjectIndex,
  context: &'p EvaluationContext,
  scopes: HashMap<PathBuf, Rc<ModuleScope>>,
  cache: HashMap<BindingKey, BoxNode>,
  in_progress: HashSet<BindingKey>,
  /// Number of cycles detected so far
  cycles: usize,
  /// Expressions being reduced, outermost first
  stack: Vec<NodeRef>,
  /// Overrides returned by `evaluate_options`, innermost last
  options: Vec<EvaluateOptions>,
}

impl<'p> Evaluator<'p> {
  pub fn new(project: &'p dyn ProjectIndex, context: &'p EvaluationContext) -> Self {
    Evaluator {
      project,
      context,
      scopes: HashMap::new(),
      cache: HashMap::new(),
      in_progress: HashSet::new(),
      cycles: 0,
      stack: Vec::new(),
      options: Vec::new(),
    }
  }

  pub fn context(&self) -> &EvaluationContext {
    self.context
  }

  /// Reduce `expr`, an expression found in the file at `path`.
  pub fn evaluate(&mut self, path: &Path, expr: &Expr) -> BoxNode {
    let scope = self.scope(path);
    self.eval(&scope, expr)
  }

  /// Run `f` with `node` pushed on the ancestor stack handed to `can_eval`
  /// and `evaluate_options`.
  pub fn within<R>(&mut self, node: NodeRef, f: impl FnOnce(&mut Self) -> R) -> R {
    self.stack.push(node);
    let result = f(self);
    self.stack.pop();
    result
  }

  fn scope(&mut self, path: &Path) -> Rc<ModuleScope> {
    if let Some(scope) = self.scopes.get(path) {
      return scope.clone();
    }

    let scope = Rc::new(match self.project.file(path) {
      Some(file) => ModuleScope::collect(file.path().clone(), file.module()),
      None => ModuleScope::empty(Arc::from(path)),
    });
    self.scopes.insert(path.to_path_buf(), scope.clone());
    scope
  }

  fn eval(&mut self, scope: &Rc<ModuleScope>, expr: &Expr) -> BoxNode {
    let expr = skip_wrappers(expr);
    let node = NodeRef::new(scope.path().clone(), expr.span(), NodeKind::Expr);

    if self.context.flags.skip_evaluate {
      return BoxNode::unresolvable(UnresolvableReason::NotEvaluated, Some(node));
    }
    if !self.context.can_eval(expr, &self.stack) {
      return BoxNode::unresolvable(UnresolvableReason::PolicyDenied, Some(node));
    }

    let options = self.context.evaluate_options(expr, &self.stack);
    let has_options = options.is_some();
    self.options.extend(options);
    self.stack.push(node.clone());

    let value = maybe_grow_default(|| self.reduce(scope, expr, node));

    self.stack.pop();
    if has_options {
      self.options.pop();
    }
    value
  }

  fn reduce(&mut self, scope: &Rc<ModuleScope>, expr: &Expr, node: NodeRef) -> BoxNode {
    match expr {
      Expr::Lit(lit) => literals::literal(lit, node),
      Expr::Tpl(tpl) => self.template(scope, tpl, node),
      Expr::TaggedTpl(tagged) => self.template(scope, &tagged.tpl, node),
      Expr::Array(array) => self.array(scope, array, node),
      Expr::Object(object) => self.object(scope, object, node),
      Expr::Ident(ident) => self.identifier(scope, ident, node),
      Expr::Member(member) => self.member(scope, member, node),
      Expr::OptChain(chain) => match &*chain.base {
        OptChainBase::Member(member) => self.member(scope, member, node),
        OptChainBase::Call(_) => BoxNode::unresolvable(UnresolvableReason::Call, Some(node)),
      },
      Expr::Cond(cond) => self.conditional(scope, cond, node),
      Expr::Bin(bin) => match bin.op {
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr | BinaryOp::NullishCoalescing => {
          self.logical(scope, bin, node)
        }
        _ => self.binary(scope, bin, node),
      },
      Expr::Unary(unary) => self.unary(scope, unary, node),
      Expr::Call(call) => self.call(scope, call, node),
      _ => BoxNode::unresolvable(UnresolvableReason::UnsupportedSyntax, Some(node)),
    }
  }

  /// Calls fold only through a helper supplied by an active override.
  fn call(&mut self, scope: &Rc<ModuleScope>, call: &CallExpr, node: NodeRef) -> BoxNode {
    let unresolvable = || BoxNode::unresolvable(UnresolvableReason::Call, Some(node.clone()));

    let Callee::Expr(callee) = &call.callee else {
      return unresolvable();
    };
    let Some(helper) = expr_path(callee).and_then(|name| self.helper(&name)) else {
      return unresolvable();
    };

    let mut args = Vec::with_capacity(call.args.len());
    for arg in &call.args {
      if arg.spread.is_some() {
        return unresolvable();
      }
      match self.eval(scope, &arg.expr) {
        BoxNode::Literal(literal) => args.push(literal.value().clone()),
        _ => return unresolvable(),
      }
    }

    match helper(args.as_slice()) {
      Some(value) => BoxNode::literal(value, Some(node)),
      None => unresolvable(),
    }
  }

  fn helper(&self, name: &str) -> Option<Arc<HelperFn>> {
    self
      .options
      .iter()
      .rev()
      .find_map(|options| options.helpers.get(name).cloned())
  }

  fn source_text(&self, scope: &ModuleScope, span: Span) -> Option<String> {
    self.project.file(scope.path())?.snippet(span)
  }

  fn node_ref(&self, scope: &ModuleScope, span: Span) -> NodeRef {
    NodeRef::new(scope.path().clone(), span, NodeKind::Expr)
  }
}

/// Strip parentheses and TypeScript-only wrappers.
pub(crate) fn skip_wrappers(expr: &Expr) -> &Expr {
  match expr {
    Expr::Paren(paren) => skip_wrappers(&paren.expr),
    Expr::TsAs(ts_as) => skip_wrappers(&ts_as.expr),
    Expr::TsTypeAssertion(assertion) => skip_wrappers(&assertion.expr),
    Expr::TsConstAssertion(assertion) => skip_wrappers(&assertion.expr),
    Expr::TsNonNull(non_null) => skip_wrappers(&non_null.expr),
    Expr::TsSatisfies(satisfies) => skip_wrappers(&satisfies.expr),
    Expr::TsInstantiation(instantiation) => skip_wrappers(&instantiation.expr),
    _ => expr,
  }
}

/// Dotted name of an identifier or a static member chain, e.g. `styled.div`.
pub(crate) fn expr_path(expr: &Expr) -> Option<String> {
  match skip_wrappers(expr) {
    Expr::Ident(ident) => Some(ident.sym.to_string()),
    Expr::Member(member) => {
      let object = expr_path(&member.obj)?;
      let prop = match &member.prop {
        MemberProp::Ident(ident) => ident.sym.to_string(),
        MemberProp::Computed(computed) => match &*computed.expr {
          Expr::Lit(Lit::Str(s)) => s.value.to_string(),
          _ => return None,
        },
        MemberProp::PrivateName(_) => return None,
      };
      Some(format!("{object}.{prop}"))
    }
    _ => None,
  }
}
