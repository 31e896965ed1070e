use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;
use swc_core::ecma::ast::Expr;

use crate::box_node::{BoxNode, Primitive};
use crate::node_ref::NodeRef;

/// Global switches bounding evaluation cost.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluationFlags {
  /// Do not reduce anything: every matched position is `not-evaluated`
  pub skip_evaluate: bool,
  /// Produce `Unresolvable` instead of `Conditional` boxes
  pub skip_conditions: bool,
  /// Do not follow imports into other files
  pub skip_traverse_files: bool,
}

pub type CanEvalFn = dyn Fn(&Expr, &[NodeRef]) -> bool + Send + Sync;
pub type EvaluateOptionsFn = dyn Fn(&Expr, &[NodeRef]) -> Option<EvaluateOptions> + Send + Sync;
pub type HelperFn = dyn Fn(&[Primitive]) -> Option<Primitive> + Send + Sync;

/// Pure functions the evaluator may fold when every argument is a literal.
///
/// Keys are callee paths such as `rem` or `Math.max`.
#[derive(Clone, Default)]
pub struct PureHelpers {
  helpers: IndexMap<String, Arc<HelperFn>>,
}

impl PureHelpers {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(
    mut self,
    name: impl Into<String>,
    helper: impl Fn(&[Primitive]) -> Option<Primitive> + Send + Sync + 'static,
  ) -> Self {
    self.helpers.insert(name.into(), Arc::new(helper));
    self
  }

  pub fn get(&self, name: &str) -> Option<&Arc<HelperFn>> {
    self.helpers.get(name)
  }

  /// `Math.min`, `Math.max`, `Math.abs`, `Math.ceil`, `Math.floor` and `Math.round`.
  pub fn math() -> Self {
    fn numbers(args: &[Primitive]) -> Vec<f64> {
      args.iter().map(Primitive::to_number).collect()
    }

    fn unary(args: &[Primitive], op: fn(f64) -> f64) -> Option<Primitive> {
      args.first().map(|arg| Primitive::Num(op(arg.to_number())))
    }

    PureHelpers::new()
      .with("Math.max", |args| {
        Some(Primitive::Num(
          numbers(args).into_iter().fold(f64::NEG_INFINITY, f64::max),
        ))
      })
      .with("Math.min", |args| {
        Some(Primitive::Num(
          numbers(args).into_iter().fold(f64::INFINITY, f64::min),
        ))
      })
      .with("Math.abs", |args| unary(args, f64::abs))
      .with("Math.ceil", |args| unary(args, f64::ceil))
      .with("Math.floor", |args| unary(args, f64::floor))
      // Halves round towards +Infinity
      .with("Math.round", |args| {
        unary(args, |n| {
          let rounded = n.round();
          if rounded - n == -0.5 {
            rounded + 1.0
          } else {
            rounded
          }
        })
      })
  }
}

impl Debug for PureHelpers {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_list().entries(self.helpers.keys()).finish()
  }
}

/// Per-subexpression override returned by `EvaluationContext::evaluate_options`.
///
/// Active while the subexpression and its children are reduced.
#[derive(Clone, Debug, Default)]
pub struct EvaluateOptions {
  /// Bindings consulted before scope lookup
  pub environment: IndexMap<String, BoxNode>,
  pub helpers: PureHelpers,
}

impl EvaluateOptions {
  pub fn with_binding(mut self, name: impl Into<String>, value: BoxNode) -> Self {
    self.environment.insert(name.into(), value);
    self
  }

  pub fn with_helpers(mut self, helpers: PureHelpers) -> Self {
    self.helpers = helpers;
    self
  }
}

/// Read-only configuration of one extraction run.
#[derive(Clone, Default)]
pub struct EvaluationContext {
  pub flags: EvaluationFlags,
  can_eval: Option<Arc<CanEvalFn>>,
  evaluate_options: Option<Arc<EvaluateOptionsFn>>,
}

impl EvaluationContext {
  pub fn new(flags: EvaluationFlags) -> Self {
    EvaluationContext {
      flags,
      ..Default::default()
    }
  }

  pub fn with_can_eval(
    mut self,
    can_eval: impl Fn(&Expr, &[NodeRef]) -> bool + Send + Sync + 'static,
  ) -> Self {
    self.can_eval = Some(Arc::new(can_eval));
    self
  }

  pub fn with_evaluate_options(
    mut self,
    evaluate_options: impl Fn(&Expr, &[NodeRef]) -> Option<EvaluateOptions> + Send + Sync + 'static,
  ) -> Self {
    self.evaluate_options = Some(Arc::new(evaluate_options));
    self
  }

  /// Whether `node` may be reduced. Defaults to `true` without a gate.
  pub fn can_eval(&self, node: &Expr, stack: &[NodeRef]) -> bool {
    self
      .can_eval
      .as_ref()
      .map(|can_eval| can_eval(node, stack))
      .unwrap_or(true)
  }

  /// Whether results may depend on where an expression is evaluated from.
  pub(crate) fn is_stack_sensitive(&self) -> bool {
    self.can_eval.is_some() || self.evaluate_options.is_some()
  }

  pub fn evaluate_options(&self, node: &Expr, stack: &[NodeRef]) -> Option<EvaluateOptions> {
    self
      .evaluate_options
      .as_ref()
      .and_then(|evaluate_options| evaluate_options(node, stack))
  }
}

impl Debug for EvaluationContext {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("EvaluationContext")
      .field("flags", &self.flags)
      .field("can_eval", &self.can_eval.is_some())
      .field("evaluate_options", &self.evaluate_options.is_some())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_flags_deserialize_camel_case() {
    let flags: EvaluationFlags =
      serde_json::from_str(r#"{ "skipConditions": true, "skipTraverseFiles": true }"#).unwrap();
    assert_eq!(
      flags,
      EvaluationFlags {
        skip_evaluate: false,
        skip_conditions: true,
        skip_traverse_files: true,
      }
    );
  }

  #[test]
  fn test_flags_default_when_missing() {
    let flags: EvaluationFlags = serde_json::from_str("{}").unwrap();
    assert_eq!(flags, EvaluationFlags::default());
  }

  #[test]
  fn test_math_helpers() {
    let math = PureHelpers::math();
    let max = math.get("Math.max").unwrap();
    assert_eq!(
      max(&[Primitive::Num(1.0), Primitive::from("4"), Primitive::Num(2.0)]),
      Some(Primitive::Num(4.0))
    );
    let round = math.get("Math.round").unwrap();
    assert_eq!(round(&[Primitive::Num(-1.5)]), Some(Primitive::Num(-1.0)));
    assert_eq!(round(&[Primitive::Num(2.5)]), Some(Primitive::Num(3.0)));
    assert_eq!(round(&[Primitive::Num(-2.5)]), Some(Primitive::Num(-2.0)));
    assert_eq!(round(&[Primitive::Num(-2.6)]), Some(Primitive::Num(-3.0)));
    assert_eq!(
      round(&[Primitive::Num(0.49999999999999994)]),
      Some(Primitive::Num(0.0))
    );
    assert!(math.get("Math.random").is_none());
  }

  #[test]
  fn test_can_eval_defaults_to_true() {
    let context = EvaluationContext::default();
    let expr = Expr::Invalid(swc_core::ecma::ast::Invalid {
      span: swc_core::common::DUMMY_SP,
    });
    assert!(context.can_eval(&expr, &[]));
    assert!(context.evaluate_options(&expr, &[]).is_none());
  }
}
