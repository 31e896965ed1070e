use std::cmp::Ordering;
use std::rc::Rc;

use swc_core::common::Spanned;
use swc_core::ecma::ast::{BinExpr, BinaryOp, CondExpr, UnaryExpr, UnaryOp};
use tracing::trace;

use super::Evaluator;
use crate::box_node::{BoxNode, Primitive, UnresolvableReason};
use crate::node_ref::NodeRef;
use crate::scope::ModuleScope;

/// Most alternatives a binary operator may produce by distributing over
/// conditional operands.
const MAX_ALTERNATIVES: usize = 64;

impl Evaluator<'_> {
  pub(super) fn conditional(
    &mut self,
    scope: &Rc<ModuleScope>,
    cond: &CondExpr,
    node: NodeRef,
  ) -> BoxNode {
    let test = self.eval(scope, &cond.test);
    match decide(&test) {
      Some(true) => self.eval(scope, &cond.cons),
      Some(false) => self.eval(scope, &cond.alt),
      None if self.context.flags.skip_conditions => not_evaluated(node),
      None => {
        let when_true = self.eval(scope, &cond.cons);
        let when_false = self.eval(scope, &cond.alt);
        let condition = self.node_ref(scope, cond.test.span());
        BoxNode::conditional(when_true, when_false, Some(condition), Some(node))
      }
    }
  }

  pub(super) fn logical(
    &mut self,
    scope: &Rc<ModuleScope>,
    bin: &BinExpr,
    node: NodeRef,
  ) -> BoxNode {
    let left = self.eval(scope, &bin.left);
    let decision = match bin.op {
      BinaryOp::LogicalAnd => decide(&left).map(|truthy| !truthy),
      BinaryOp::LogicalOr => decide(&left),
      _ => is_nullish(&left).map(|nullish| !nullish),
    };

    // `Some(true)` short-circuits to the left operand
    match decision {
      Some(true) => left,
      Some(false) => self.eval(scope, &bin.right),
      None if self.context.flags.skip_conditions => not_evaluated(node),
      None => {
        let right = self.eval(scope, &bin.right);
        let condition = Some(self.node_ref(scope, bin.left.span()));
        match bin.op {
          BinaryOp::LogicalAnd => BoxNode::conditional(
            right,
            BoxNode::literal(Primitive::Undefined, None),
            condition,
            Some(node),
          ),
          _ => BoxNode::conditional(left, right, condition, Some(node)),
        }
      }
    }
  }

  pub(super) fn binary(
    &mut self,
    scope: &Rc<ModuleScope>,
    bin: &BinExpr,
    node: NodeRef,
  ) -> BoxNode {
    let left = self.eval(scope, &bin.left);
    let right = self.eval(scope, &bin.right);

    let alternatives = left
      .possible_values()
      .len()
      .saturating_mul(right.possible_values().len());
    if alternatives > MAX_ALTERNATIVES {
      trace!(alternatives, "too many alternatives to distribute over");
      return BoxNode::unresolvable(UnresolvableReason::UnsupportedSyntax, Some(node));
    }
    combine(&left, &right, &node, &|a, b| binary_op(bin.op, a, b))
  }

  pub(super) fn unary(
    &mut self,
    scope: &Rc<ModuleScope>,
    unary: &UnaryExpr,
    node: NodeRef,
  ) -> BoxNode {
    if unary.op == UnaryOp::Void {
      return BoxNode::literal(Primitive::Undefined, Some(node));
    }
    let value = self.eval(scope, &unary.arg);
    apply_unary(unary.op, &value, &node)
  }
}

fn not_evaluated(node: NodeRef) -> BoxNode {
  BoxNode::unresolvable(UnresolvableReason::NotEvaluated, Some(node))
}

/// Truthiness of a box, when every alternative agrees.
pub(super) fn decide(value: &BoxNode) -> Option<bool> {
  agree(value, &|value| match value {
    BoxNode::Literal(literal) => Some(literal.value().is_truthy()),
    BoxNode::List(_) | BoxNode::Map(_) => Some(true),
    _ => None,
  })
}

fn is_nullish(value: &BoxNode) -> Option<bool> {
  agree(value, &|value| match value {
    BoxNode::Literal(literal) => Some(literal.value().is_nullish()),
    BoxNode::List(_) | BoxNode::Map(_) => Some(false),
    _ => None,
  })
}

fn agree(value: &BoxNode, test: &dyn Fn(&BoxNode) -> Option<bool>) -> Option<bool> {
  let mut decisions = value.possible_values().into_iter().map(test);
  let first = decisions.next()??;
  decisions
    .all(|decision| decision == Some(first))
    .then_some(first)
}

/// Read `key` from a reduced object, list or string.
///
/// Missing keys read as `undefined`. Conditional objects are indexed per branch.
pub(super) fn index(object: &BoxNode, key: &Primitive, node: &NodeRef) -> BoxNode {
  let undefined = || BoxNode::literal(Primitive::Undefined, Some(node.clone()));
  let is_length = matches!(key, Primitive::Str(s) if s == "length");

  match object {
    BoxNode::Map(map) => map
      .get(&key.to_js_string())
      .cloned()
      .unwrap_or_else(undefined),
    BoxNode::List(list) if is_length => {
      BoxNode::literal(list.items().len() as f64, Some(node.clone()))
    }
    BoxNode::List(list) => array_index(key)
      .and_then(|index| list.items().get(index))
      .cloned()
      .unwrap_or_else(undefined),
    BoxNode::Literal(literal) => match literal.value() {
      Primitive::Str(s) if is_length => {
        BoxNode::literal(s.encode_utf16().count() as f64, Some(node.clone()))
      }
      Primitive::Str(s) => array_index(key)
        .and_then(|index| s.chars().nth(index))
        .map(|c| BoxNode::literal(c.to_string(), Some(node.clone())))
        .unwrap_or_else(undefined),
      _ => undefined(),
    },
    BoxNode::Conditional(conditional) => BoxNode::conditional(
      index(conditional.when_true(), key, node),
      index(conditional.when_false(), key, node),
      conditional.condition().cloned(),
      Some(node.clone()),
    ),
    BoxNode::Unresolvable(_) => object.clone(),
  }
}

fn array_index(key: &Primitive) -> Option<usize> {
  match key {
    Primitive::Num(n) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as usize),
    Primitive::Str(s) => s.parse().ok(),
    _ => None,
  }
}

/// Apply a primitive operation to two boxes, distributing over conditionals.
fn combine(
  left: &BoxNode,
  right: &BoxNode,
  node: &NodeRef,
  op: &dyn Fn(&Primitive, &Primitive) -> Option<Primitive>,
) -> BoxNode {
  match (left, right) {
    (BoxNode::Unresolvable(_), _) => left.clone(),
    (_, BoxNode::Unresolvable(_)) => right.clone(),
    (BoxNode::Conditional(conditional), _) => BoxNode::conditional(
      combine(conditional.when_true(), right, node, op),
      combine(conditional.when_false(), right, node, op),
      conditional.condition().cloned(),
      Some(node.clone()),
    ),
    (_, BoxNode::Conditional(conditional)) => BoxNode::conditional(
      combine(left, conditional.when_true(), node, op),
      combine(left, conditional.when_false(), node, op),
      conditional.condition().cloned(),
      Some(node.clone()),
    ),
    (BoxNode::Literal(a), BoxNode::Literal(b)) => match op(a.value(), b.value()) {
      Some(value) => BoxNode::literal(value, Some(node.clone())),
      None => BoxNode::unresolvable(UnresolvableReason::UnsupportedSyntax, Some(node.clone())),
    },
    _ => BoxNode::unresolvable(UnresolvableReason::UnsupportedSyntax, Some(node.clone())),
  }
}

fn binary_op(op: BinaryOp, a: &Primitive, b: &Primitive) -> Option<Primitive> {
  use BinaryOp::*;

  let value = match op {
    Add => match (a, b) {
      (Primitive::Str(_), _) | (_, Primitive::Str(_)) => {
        Primitive::Str(format!("{}{}", a.to_js_string(), b.to_js_string()))
      }
      _ => Primitive::Num(a.to_number() + b.to_number()),
    },
    Sub => Primitive::Num(a.to_number() - b.to_number()),
    Mul => Primitive::Num(a.to_number() * b.to_number()),
    Div => Primitive::Num(a.to_number() / b.to_number()),
    Mod => Primitive::Num(a.to_number() % b.to_number()),
    Exp => Primitive::Num(a.to_number().powf(b.to_number())),
    EqEqEq => Primitive::Bool(a.strict_equals(b)),
    NotEqEq => Primitive::Bool(!a.strict_equals(b)),
    EqEq => Primitive::Bool(a.loose_equals(b)),
    NotEq => Primitive::Bool(!a.loose_equals(b)),
    Lt => Primitive::Bool(compare(a, b) == Some(Ordering::Less)),
    Gt => Primitive::Bool(compare(a, b) == Some(Ordering::Greater)),
    LtEq => Primitive::Bool(matches!(
      compare(a, b),
      Some(Ordering::Less | Ordering::Equal)
    )),
    GtEq => Primitive::Bool(matches!(
      compare(a, b),
      Some(Ordering::Greater | Ordering::Equal)
    )),
    _ => return None,
  };
  Some(value)
}

/// Relational comparison: strings by code units, everything else as numbers.
fn compare(a: &Primitive, b: &Primitive) -> Option<Ordering> {
  match (a, b) {
    (Primitive::Str(a), Primitive::Str(b)) => Some(a.encode_utf16().cmp(b.encode_utf16())),
    _ => a.to_number().partial_cmp(&b.to_number()),
  }
}

fn apply_unary(op: UnaryOp, value: &BoxNode, node: &NodeRef) -> BoxNode {
  let unsupported =
    || BoxNode::unresolvable(UnresolvableReason::UnsupportedSyntax, Some(node.clone()));

  match value {
    BoxNode::Literal(literal) => {
      let value = literal.value();
      let result = match op {
        UnaryOp::Bang => Primitive::Bool(!value.is_truthy()),
        UnaryOp::Minus => Primitive::Num(-value.to_number()),
        UnaryOp::Plus => Primitive::Num(value.to_number()),
        UnaryOp::Tilde => Primitive::Num(!(value.to_number() as i64 as i32) as f64),
        UnaryOp::TypeOf => Primitive::Str(value.type_of().to_string()),
        _ => return unsupported(),
      };
      BoxNode::literal(result, Some(node.clone()))
    }
    BoxNode::List(_) | BoxNode::Map(_) => match op {
      UnaryOp::Bang => BoxNode::literal(false, Some(node.clone())),
      UnaryOp::TypeOf => BoxNode::literal("object", Some(node.clone())),
      _ => unsupported(),
    },
    BoxNode::Conditional(conditional) => BoxNode::conditional(
      apply_unary(op, conditional.when_true(), node),
      apply_unary(op, conditional.when_false(), node),
      conditional.condition().cloned(),
      Some(node.clone()),
    ),
    BoxNode::Unresolvable(_) => value.clone(),
  }
}
