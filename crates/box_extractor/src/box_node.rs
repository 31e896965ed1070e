use std::fmt::{Display, Formatter};

use indexmap::IndexMap;
use serde::Serialize;

use crate::node_ref::NodeRef;

/// A primitive JavaScript value.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Primitive {
  Str(String),
  Num(f64),
  Bool(bool),
  Null,
  Undefined,
}

impl Primitive {
  /// JavaScript truthiness.
  pub fn is_truthy(&self) -> bool {
    match self {
      Primitive::Str(s) => !s.is_empty(),
      Primitive::Num(n) => *n != 0.0 && !n.is_nan(),
      Primitive::Bool(b) => *b,
      Primitive::Null | Primitive::Undefined => false,
    }
  }

  pub fn is_nullish(&self) -> bool {
    matches!(self, Primitive::Null | Primitive::Undefined)
  }

  /// JavaScript `ToNumber`.
  pub fn to_number(&self) -> f64 {
    match self {
      Primitive::Str(s) => {
        let trimmed = s.trim();
        if trimmed.is_empty() {
          0.0
        } else {
          trimmed.parse().unwrap_or(f64::NAN)
        }
      }
      Primitive::Num(n) => *n,
      Primitive::Bool(b) => {
        if *b {
          1.0
        } else {
          0.0
        }
      }
      Primitive::Null => 0.0,
      Primitive::Undefined => f64::NAN,
    }
  }

  /// JavaScript `ToString`.
  pub fn to_js_string(&self) -> String {
    match self {
      Primitive::Str(s) => s.clone(),
      Primitive::Num(n) => number_to_string(*n),
      Primitive::Bool(b) => b.to_string(),
      Primitive::Null => "null".to_string(),
      Primitive::Undefined => "undefined".to_string(),
    }
  }

  pub fn type_of(&self) -> &'static str {
    match self {
      Primitive::Str(_) => "string",
      Primitive::Num(_) => "number",
      Primitive::Bool(_) => "boolean",
      Primitive::Null => "object",
      Primitive::Undefined => "undefined",
    }
  }

  /// `===`
  pub fn strict_equals(&self, other: &Primitive) -> bool {
    match (self, other) {
      (Primitive::Str(a), Primitive::Str(b)) => a == b,
      (Primitive::Num(a), Primitive::Num(b)) => a == b,
      (Primitive::Bool(a), Primitive::Bool(b)) => a == b,
      (Primitive::Null, Primitive::Null) => true,
      (Primitive::Undefined, Primitive::Undefined) => true,
      _ => false,
    }
  }

  /// `==`, restricted to primitives.
  pub fn loose_equals(&self, other: &Primitive) -> bool {
    match (self, other) {
      (a, b) if a.is_nullish() && b.is_nullish() => true,
      (a, b) if a.is_nullish() || b.is_nullish() => false,
      (Primitive::Str(a), Primitive::Str(b)) => a == b,
      (a, b) => a.to_number() == b.to_number(),
    }
  }

  pub fn to_json(&self) -> serde_json::Value {
    match self {
      Primitive::Str(s) => serde_json::Value::String(s.clone()),
      Primitive::Num(n) => {
        if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
          serde_json::Value::from(*n as i64)
        } else {
          serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
        }
      }
      Primitive::Bool(b) => serde_json::Value::Bool(*b),
      Primitive::Null | Primitive::Undefined => serde_json::Value::Null,
    }
  }
}

fn number_to_string(n: f64) -> String {
  if n.is_nan() {
    "NaN".to_string()
  } else if n.is_infinite() {
    if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
  } else if n == 0.0 {
    "0".to_string()
  } else if n.abs() >= 1e21 || n.abs() < 1e-6 {
    // Exponent notation outside [1e-6, 1e21), with an explicit `+` sign
    let formatted = format!("{n:e}");
    match formatted.split_once('e') {
      Some((mantissa, exponent)) if !exponent.starts_with('-') => {
        format!("{mantissa}e+{exponent}")
      }
      _ => formatted,
    }
  } else {
    format!("{n}")
  }
}

impl PartialEq for Primitive {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      // NaN literals compare equal so that boxes stay structurally comparable
      (Primitive::Num(a), Primitive::Num(b)) => a == b || (a.is_nan() && b.is_nan()),
      _ => self.strict_equals(other),
    }
  }
}

impl Display for Primitive {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Primitive::Str(s) => write!(f, "{s:?}"),
      other => f.write_str(&other.to_js_string()),
    }
  }
}

impl From<&str> for Primitive {
  fn from(value: &str) -> Self {
    Primitive::Str(value.to_string())
  }
}

impl From<String> for Primitive {
  fn from(value: String) -> Self {
    Primitive::Str(value)
  }
}

impl From<f64> for Primitive {
  fn from(value: f64) -> Self {
    Primitive::Num(value)
  }
}

impl From<i32> for Primitive {
  fn from(value: i32) -> Self {
    Primitive::Num(value as f64)
  }
}

impl From<bool> for Primitive {
  fn from(value: bool) -> Self {
    Primitive::Bool(value)
  }
}

/// Why an expression could not be reduced statically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnresolvableReason {
  /// No constant binding reachable for an identifier
  Unbound,
  /// Call to a function that is not a whitelisted helper
  Call,
  /// Binding resolution re-entered a binding that was still being evaluated
  Cycle,
  /// Evaluation was skipped by policy flags
  NotEvaluated,
  UnsupportedSyntax,
  /// `can_eval` refused the expression
  PolicyDenied,
}

impl UnresolvableReason {
  pub fn as_str(&self) -> &'static str {
    match self {
      UnresolvableReason::Unbound => "unbound",
      UnresolvableReason::Call => "call",
      UnresolvableReason::Cycle => "cycle",
      UnresolvableReason::NotEvaluated => "not-evaluated",
      UnresolvableReason::UnsupportedSyntax => "unsupported-syntax",
      UnresolvableReason::PolicyDenied => "policy-denied",
    }
  }
}

impl Display for UnresolvableReason {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiteralBox {
  value: Primitive,
  node: Option<NodeRef>,
}

impl LiteralBox {
  pub fn value(&self) -> &Primitive {
    &self.value
  }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBox {
  items: Vec<BoxNode>,
  node: Option<NodeRef>,
}

impl ListBox {
  pub fn items(&self) -> &[BoxNode] {
    &self.items
  }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapBox {
  entries: IndexMap<String, BoxNode>,
  node: Option<NodeRef>,
}

impl MapBox {
  pub fn entries(&self) -> &IndexMap<String, BoxNode> {
    &self.entries
  }

  pub fn get(&self, key: &str) -> Option<&BoxNode> {
    self.entries.get(key)
  }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalBox {
  when_true: Box<BoxNode>,
  when_false: Box<BoxNode>,
  condition: Option<NodeRef>,
  node: Option<NodeRef>,
}

impl ConditionalBox {
  pub fn when_true(&self) -> &BoxNode {
    &self.when_true
  }

  pub fn when_false(&self) -> &BoxNode {
    &self.when_false
  }

  /// The condition expression that could not be decided.
  pub fn condition(&self) -> Option<&NodeRef> {
    self.condition.as_ref()
  }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvableBox {
  reason: UnresolvableReason,
  node: Option<NodeRef>,
}

impl UnresolvableBox {
  pub fn reason(&self) -> UnresolvableReason {
    self.reason
  }

  pub fn node(&self) -> Option<&NodeRef> {
    self.node.as_ref()
  }
}

/// Result of statically evaluating an expression.
///
/// Boxes are immutable. Equality is structural and ignores node references, so
/// two runs over the same input compare equal.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BoxNode {
  Literal(LiteralBox),
  List(ListBox),
  Map(MapBox),
  Conditional(ConditionalBox),
  Unresolvable(UnresolvableBox),
}

impl BoxNode {
  pub fn literal(value: impl Into<Primitive>, node: Option<NodeRef>) -> Self {
    BoxNode::Literal(LiteralBox {
      value: value.into(),
      node,
    })
  }

  pub fn list(items: Vec<BoxNode>, node: Option<NodeRef>) -> Self {
    BoxNode::List(ListBox { items, node })
  }

  pub fn map(entries: IndexMap<String, BoxNode>, node: Option<NodeRef>) -> Self {
    BoxNode::Map(MapBox { entries, node })
  }

  pub fn conditional(
    when_true: BoxNode,
    when_false: BoxNode,
    condition: Option<NodeRef>,
    node: Option<NodeRef>,
  ) -> Self {
    BoxNode::Conditional(ConditionalBox {
      when_true: Box::new(when_true),
      when_false: Box::new(when_false),
      condition,
      node,
    })
  }

  pub fn unresolvable(reason: UnresolvableReason, node: Option<NodeRef>) -> Self {
    BoxNode::Unresolvable(UnresolvableBox { reason, node })
  }

  /// Back-reference to the originating node, `None` for synthetic boxes.
  pub fn node(&self) -> Option<&NodeRef> {
    match self {
      BoxNode::Literal(b) => b.node.as_ref(),
      BoxNode::List(b) => b.node.as_ref(),
      BoxNode::Map(b) => b.node.as_ref(),
      BoxNode::Conditional(b) => b.node.as_ref(),
      BoxNode::Unresolvable(b) => b.node.as_ref(),
    }
  }

  pub fn as_literal(&self) -> Option<&Primitive> {
    match self {
      BoxNode::Literal(b) => Some(&b.value),
      _ => None,
    }
  }

  pub fn as_list(&self) -> Option<&ListBox> {
    match self {
      BoxNode::List(b) => Some(b),
      _ => None,
    }
  }

  pub fn as_map(&self) -> Option<&MapBox> {
    match self {
      BoxNode::Map(b) => Some(b),
      _ => None,
    }
  }

  pub fn as_conditional(&self) -> Option<&ConditionalBox> {
    match self {
      BoxNode::Conditional(b) => Some(b),
      _ => None,
    }
  }

  pub fn unresolvable_reason(&self) -> Option<UnresolvableReason> {
    match self {
      BoxNode::Unresolvable(b) => Some(b.reason),
      _ => None,
    }
  }

  pub fn is_unresolvable(&self) -> bool {
    matches!(self, BoxNode::Unresolvable(_))
  }

  /// Flatten a fully static box into plain JSON.
  ///
  /// Returns `None` as soon as any part is conditional or unresolvable.
  pub fn to_literal_value(&self) -> Option<serde_json::Value> {
    match self {
      BoxNode::Literal(b) => Some(b.value.to_json()),
      BoxNode::List(b) => b
        .items
        .iter()
        .map(BoxNode::to_literal_value)
        .collect::<Option<Vec<_>>>()
        .map(serde_json::Value::Array),
      BoxNode::Map(b) => {
        let mut object = serde_json::Map::with_capacity(b.entries.len());
        for (key, value) in &b.entries {
          object.insert(key.clone(), value.to_literal_value()?);
        }
        Some(serde_json::Value::Object(object))
      }
      BoxNode::Conditional(_) | BoxNode::Unresolvable(_) => None,
    }
  }

  /// Every alternative this box may take, following conditional branches.
  ///
  /// Non-conditional boxes yield themselves.
  pub fn possible_values(&self) -> Vec<&BoxNode> {
    let mut values = Vec::new();
    self.collect_possible_values(&mut values);
    values
  }

  fn collect_possible_values<'a>(&'a self, values: &mut Vec<&'a BoxNode>) {
    match self {
      BoxNode::Conditional(b) => {
        b.when_true.collect_possible_values(values);
        b.when_false.collect_possible_values(values);
      }
      other => values.push(other),
    }
  }

  /// Every unresolvable leaf within this box, depth-first.
  pub fn unresolvables(&self) -> Vec<&UnresolvableBox> {
    let mut found = Vec::new();
    self.collect_unresolvables(&mut found);
    found
  }

  fn collect_unresolvables<'a>(&'a self, found: &mut Vec<&'a UnresolvableBox>) {
    match self {
      BoxNode::Literal(_) => {}
      BoxNode::List(b) => b
        .items
        .iter()
        .for_each(|item| item.collect_unresolvables(found)),
      BoxNode::Map(b) => b
        .entries
        .values()
        .for_each(|value| value.collect_unresolvables(found)),
      BoxNode::Conditional(b) => {
        b.when_true.collect_unresolvables(found);
        b.when_false.collect_unresolvables(found);
      }
      BoxNode::Unresolvable(b) => found.push(b),
    }
  }
}

impl PartialEq for BoxNode {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (BoxNode::Literal(a), BoxNode::Literal(b)) => a.value == b.value,
      (BoxNode::List(a), BoxNode::List(b)) => a.items == b.items,
      (BoxNode::Map(a), BoxNode::Map(b)) => {
        a.entries.len() == b.entries.len()
          && a
            .entries
            .iter()
            .zip(b.entries.iter())
            .all(|((ka, va), (kb, vb))| ka == kb && va == vb)
      }
      (BoxNode::Conditional(a), BoxNode::Conditional(b)) => {
        a.when_true == b.when_true && a.when_false == b.when_false
      }
      (BoxNode::Unresolvable(a), BoxNode::Unresolvable(b)) => a.reason == b.reason,
      _ => false,
    }
  }
}

#[cfg(test)]
mod tests {
  use indexmap::indexmap;
  use pretty_assertions::assert_eq;
  use serde_json::json;

  use super::*;

  fn lit(value: impl Into<Primitive>) -> BoxNode {
    BoxNode::literal(value, None)
  }

  #[test]
  fn test_truthiness() {
    assert!(Primitive::from("a").is_truthy());
    assert!(!Primitive::from("").is_truthy());
    assert!(!Primitive::Num(f64::NAN).is_truthy());
    assert!(!Primitive::Num(0.0).is_truthy());
    assert!(!Primitive::Null.is_truthy());
    assert!(Primitive::Bool(true).is_truthy());
  }

  #[test]
  fn test_js_string_conversion() {
    assert_eq!(Primitive::Num(1.0).to_js_string(), "1");
    assert_eq!(Primitive::Num(1.5).to_js_string(), "1.5");
    assert_eq!(Primitive::Num(f64::NAN).to_js_string(), "NaN");
    assert_eq!(Primitive::Num(-0.0).to_js_string(), "0");
    assert_eq!(Primitive::Num(1e20).to_js_string(), "100000000000000000000");
    assert_eq!(Primitive::Num(1e19).to_js_string(), "10000000000000000000");
    assert_eq!(
      Primitive::Num(123456789012345680000.0).to_js_string(),
      "123456789012345680000"
    );
    assert_eq!(Primitive::Num(1e21).to_js_string(), "1e+21");
    assert_eq!(Primitive::Num(-2.5e25).to_js_string(), "-2.5e+25");
    assert_eq!(Primitive::Num(1.5e-7).to_js_string(), "1.5e-7");
    assert_eq!(Primitive::Num(0.000001).to_js_string(), "0.000001");
    assert_eq!(Primitive::Undefined.to_js_string(), "undefined");
  }

  #[test]
  fn test_loose_equality() {
    assert!(Primitive::Null.loose_equals(&Primitive::Undefined));
    assert!(Primitive::from("1").loose_equals(&Primitive::Num(1.0)));
    assert!(!Primitive::Null.loose_equals(&Primitive::Num(0.0)));
    assert!(!Primitive::from("1").strict_equals(&Primitive::Num(1.0)));
  }

  #[test]
  fn test_to_literal_value() {
    let value = BoxNode::map(
      indexmap! {
        "color".to_string() => lit("red"),
        "sizes".to_string() => BoxNode::list(vec![lit(1), lit(2.5)], None),
      },
      None,
    );

    assert_eq!(
      value.to_literal_value(),
      Some(json!({ "color": "red", "sizes": [1, 2.5] }))
    );
  }

  #[test]
  fn test_to_literal_value_rejects_partial_boxes() {
    let value = BoxNode::list(
      vec![
        lit("red"),
        BoxNode::unresolvable(UnresolvableReason::Unbound, None),
      ],
      None,
    );
    assert_eq!(value.to_literal_value(), None);
  }

  #[test]
  fn test_possible_values_follows_nested_conditionals() {
    let value = BoxNode::conditional(
      lit("a"),
      BoxNode::conditional(lit("b"), lit("c"), None, None),
      None,
      None,
    );

    let values: Vec<_> = value
      .possible_values()
      .into_iter()
      .filter_map(|v| v.as_literal().cloned())
      .collect();
    assert_eq!(values, vec!["a".into(), "b".into(), "c".into()]);
  }

  #[test]
  fn test_unresolvables() {
    let value = BoxNode::map(
      indexmap! {
        "a".to_string() => BoxNode::unresolvable(UnresolvableReason::Call, None),
        "b".to_string() => BoxNode::conditional(
          lit(1),
          BoxNode::unresolvable(UnresolvableReason::Cycle, None),
          None,
          None,
        ),
      },
      None,
    );

    let reasons: Vec<_> = value.unresolvables().iter().map(|u| u.reason()).collect();
    assert_eq!(
      reasons,
      vec![UnresolvableReason::Call, UnresolvableReason::Cycle]
    );
  }

  #[test]
  fn test_map_equality_is_order_sensitive() {
    let a = BoxNode::map(
      indexmap! { "a".to_string() => lit(1), "b".to_string() => lit(2) },
      None,
    );
    let b = BoxNode::map(
      indexmap! { "b".to_string() => lit(2), "a".to_string() => lit(1) },
      None,
    );
    assert_ne!(a, b);
  }

  #[test]
  fn test_serialize() {
    let value = BoxNode::conditional(lit("a"), lit(false), None, None);
    assert_eq!(
      serde_json::to_value(&value).unwrap(),
      json!({
        "type": "conditional",
        "whenTrue": { "type": "literal", "value": "a", "node": null },
        "whenFalse": { "type": "literal", "value": false, "node": null },
        "condition": null,
        "node": null
      })
    );
  }
}
