use indexmap::IndexMap;
use serde::Serialize;

use crate::box_node::{BoxNode, UnresolvableReason};
use crate::node_ref::NodeRef;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractResultKind {
  Component,
  /// Function calls and tagged templates
  Function,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceKind {
  JsxElement,
  CallExpression,
  TaggedTemplate,
}

impl InstanceKind {
  pub fn result_kind(&self) -> ExtractResultKind {
    match self {
      InstanceKind::JsxElement => ExtractResultKind::Component,
      InstanceKind::CallExpression | InstanceKind::TaggedTemplate => ExtractResultKind::Function,
    }
  }
}

/// One occurrence of a matched pattern.
///
/// `value` is a `Map` of props for JSX elements, a `List` with one box per
/// positional argument for calls, and a single box for tagged templates.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedInstance {
  pub name: String,
  pub kind: InstanceKind,
  /// The JSX opening element, call or tagged template
  pub node: NodeRef,
  #[serde(rename = "box")]
  pub value: BoxNode,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResultItem {
  pub kind: ExtractResultKind,
  pub query_list: Vec<ExtractedInstance>,
  /// Every box seen for a prop across all instances, in source order
  pub nodes_by_prop: IndexMap<String, Vec<BoxNode>>,
}

impl ExtractResultItem {
  fn new(kind: ExtractResultKind) -> Self {
    ExtractResultItem {
      kind,
      query_list: Vec::new(),
      nodes_by_prop: IndexMap::new(),
    }
  }

  fn index_prop(&mut self, prop: &str, value: &BoxNode) {
    self
      .nodes_by_prop
      .entry(prop.to_string())
      .or_default()
      .push(value.clone());
  }
}

/// A value that could not be statically determined.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
  pub name: String,
  /// `None` for positional arguments and tagged templates
  pub prop: Option<String>,
  pub reason: UnresolvableReason,
  pub node: Option<NodeRef>,
}

/// Instances of one file grouped by display name, in first-seen order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ExtractResult {
  items: IndexMap<String, ExtractResultItem>,
}

impl ExtractResult {
  pub fn get(&self, name: &str) -> Option<&ExtractResultItem> {
    self.items.get(name)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &ExtractResultItem)> {
    self.items.iter()
  }

  pub fn names(&self) -> impl Iterator<Item = &String> {
    self.items.keys()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub(crate) fn push(&mut self, instance: ExtractedInstance) {
    let item = self
      .items
      .entry(instance.name.clone())
      .or_insert_with(|| ExtractResultItem::new(instance.kind.result_kind()));

    match instance.kind {
      InstanceKind::JsxElement => {
        if let Some(map) = instance.value.as_map() {
          for (prop, value) in map.entries() {
            item.index_prop(prop, value);
          }
        }
      }
      InstanceKind::CallExpression => {
        let args = instance.value.as_list().map(|list| list.items()).unwrap_or_default();
        for arg in args {
          for map in arg.possible_values().into_iter().filter_map(BoxNode::as_map) {
            for (prop, value) in map.entries() {
              item.index_prop(prop, value);
            }
          }
        }
      }
      InstanceKind::TaggedTemplate => {}
    }

    item.query_list.push(instance);
  }

  /// Every unresolvable leaf, reported per instance and prop.
  pub fn diagnostics(&self) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for (name, item) in &self.items {
      for instance in &item.query_list {
        let values: Vec<&BoxNode> = match instance.kind {
          InstanceKind::CallExpression => instance
            .value
            .as_list()
            .map(|list| list.items().iter().collect())
            .unwrap_or_default(),
          _ => vec![&instance.value],
        };

        for value in values {
          match value.as_map() {
            Some(map) => {
              for (prop, entry) in map.entries() {
                report(&mut diagnostics, name, Some(prop), entry);
              }
            }
            None => report(&mut diagnostics, name, None, value),
          }
        }
      }
    }
    diagnostics
  }
}

fn report(diagnostics: &mut Vec<Diagnostic>, name: &str, prop: Option<&String>, value: &BoxNode) {
  for unresolvable in value.unresolvables() {
    diagnostics.push(Diagnostic {
      name: name.to_string(),
      prop: prop.cloned(),
      reason: unresolvable.reason(),
      node: unresolvable.node().cloned(),
    });
  }
}

#[cfg(test)]
mod tests {
  use std::path::Path;

  use indexmap::indexmap;
  use pretty_assertions::assert_eq;
  use swc_core::common::DUMMY_SP;

  use super::*;
  use crate::node_ref::NodeKind;

  fn node() -> NodeRef {
    NodeRef::new(Path::new("/test.tsx").into(), DUMMY_SP, NodeKind::CallExpr)
  }

  fn lit(value: &str) -> BoxNode {
    BoxNode::literal(value, None)
  }

  fn call(name: &str, args: Vec<BoxNode>) -> ExtractedInstance {
    ExtractedInstance {
      name: name.to_string(),
      kind: InstanceKind::CallExpression,
      node: node(),
      value: BoxNode::list(args, None),
    }
  }

  #[test]
  fn test_groups_by_name_and_indexes_props() {
    let mut result = ExtractResult::default();
    result.push(call(
      "css",
      vec![BoxNode::map(indexmap! { "color".to_string() => lit("red") }, None)],
    ));
    result.push(call(
      "cva",
      vec![BoxNode::map(indexmap! { "base".to_string() => lit("x") }, None)],
    ));
    result.push(call(
      "css",
      vec![BoxNode::conditional(
        BoxNode::map(indexmap! { "color".to_string() => lit("blue") }, None),
        BoxNode::map(indexmap! { "color".to_string() => lit("green") }, None),
        None,
        None,
      )],
    ));

    assert_eq!(result.names().collect::<Vec<_>>(), vec!["css", "cva"]);
    let css = result.get("css").unwrap();
    assert_eq!(css.kind, ExtractResultKind::Function);
    assert_eq!(css.query_list.len(), 2);
    assert_eq!(
      css.nodes_by_prop.get("color").unwrap(),
      &vec![lit("red"), lit("blue"), lit("green")]
    );
  }

  #[test]
  fn test_diagnostics() {
    let mut result = ExtractResult::default();
    result.push(call(
      "css",
      vec![
        BoxNode::map(
          indexmap! {
            "color".to_string() => BoxNode::unresolvable(UnresolvableReason::Unbound, None),
            "margin".to_string() => lit("1"),
          },
          None,
        ),
        BoxNode::unresolvable(UnresolvableReason::Call, None),
      ],
    ));

    assert_eq!(
      result.diagnostics(),
      vec![
        Diagnostic {
          name: "css".to_string(),
          prop: Some("color".to_string()),
          reason: UnresolvableReason::Unbound,
          node: None,
        },
        Diagnostic {
          name: "css".to_string(),
          prop: None,
          reason: UnresolvableReason::Call,
          node: None,
        },
      ]
    );
  }
}
