use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;
use swc_core::ecma::ast::{CallExpr, Expr, JSXAttr, JSXOpeningElement, Prop, TaggedTpl};

use crate::box_node::Primitive;

pub struct MatchTagArgs<'n> {
  pub tag_name: &'n str,
  pub tag_node: &'n JSXOpeningElement,
  /// Whether the tag was produced by the configured JSX factory (`<styled.div />`)
  pub is_factory: bool,
}

pub struct MatchPropArgs<'n> {
  pub tag_name: &'n str,
  pub tag_node: &'n JSXOpeningElement,
  pub prop_name: &'n str,
  /// `None` for default props and for entries coming from spread attributes
  pub prop_node: Option<&'n JSXAttr>,
}

pub struct MatchFnArgs<'n> {
  pub fn_name: &'n str,
  pub fn_node: &'n CallExpr,
}

pub struct MatchFnArgArgs<'n> {
  pub fn_name: &'n str,
  pub fn_node: &'n CallExpr,
  pub arg_node: &'n Expr,
  pub index: usize,
}

pub struct MatchFnPropArgs<'n> {
  pub fn_name: &'n str,
  pub fn_node: &'n CallExpr,
  pub prop_name: &'n str,
  /// `None` when the property does not come from an inline object literal
  pub prop_node: Option<&'n Prop>,
}

pub struct MatchTaggedTemplateArgs<'n> {
  pub fn_name: &'n str,
  pub tagged_template_node: &'n TaggedTpl,
}

/// Selects JSX elements and their props.
///
/// Matchers must be pure: they are called any number of times per node. An
/// `Err` aborts extraction of the current file.
pub trait ComponentMatcher: Send + Sync {
  fn match_tag(&self, args: &MatchTagArgs<'_>) -> anyhow::Result<bool>;

  fn match_prop(&self, args: &MatchPropArgs<'_>) -> anyhow::Result<bool>;

  /// Props considered present with a default value when absent from the element.
  fn default_props(&self, _tag_name: &str) -> IndexMap<String, Primitive> {
    IndexMap::new()
  }
}

/// Selects function calls, their positional arguments and object properties.
pub trait FunctionMatcher: Send + Sync {
  fn match_fn(&self, args: &MatchFnArgs<'_>) -> anyhow::Result<bool>;

  fn match_arg(&self, args: &MatchFnArgArgs<'_>) -> anyhow::Result<bool>;

  fn match_prop(&self, args: &MatchFnPropArgs<'_>) -> anyhow::Result<bool>;
}

pub trait TaggedTemplateMatcher: Send + Sync {
  fn match_tagged_template(&self, args: &MatchTaggedTemplateArgs<'_>) -> anyhow::Result<bool>;
}

/// Decides whether a JSX tag comes from a JSX factory.
pub trait FactoryResolver: Send + Sync {
  fn is_factory(&self, tag_name: &str, tag_node: &JSXOpeningElement) -> bool;
}

/// Factory detection by name: `<styled.div />` and `<styled />` are factory tags
/// of the `styled` factory.
#[derive(Clone, Debug)]
pub struct JsxFactory {
  name: String,
}

impl JsxFactory {
  pub fn new(name: impl Into<String>) -> Self {
    JsxFactory { name: name.into() }
  }
}

impl Default for JsxFactory {
  fn default() -> Self {
    JsxFactory::new("styled")
  }
}

impl FactoryResolver for JsxFactory {
  fn is_factory(&self, tag_name: &str, _tag_node: &JSXOpeningElement) -> bool {
    tag_name == self.name
      || tag_name
        .strip_prefix(self.name.as_str())
        .is_some_and(|rest| rest.starts_with('.'))
  }
}

/// Immutable bundle of matchers for one extraction run.
#[derive(Clone, Default)]
pub struct MatcherSet {
  pub components: Option<Arc<dyn ComponentMatcher>>,
  pub functions: Option<Arc<dyn FunctionMatcher>>,
  pub tagged_templates: Option<Arc<dyn TaggedTemplateMatcher>>,
  pub factory: Option<Arc<dyn FactoryResolver>>,
}

impl MatcherSet {
  pub fn with_components(mut self, matcher: impl ComponentMatcher + 'static) -> Self {
    self.components = Some(Arc::new(matcher));
    self
  }

  pub fn with_functions(mut self, matcher: impl FunctionMatcher + 'static) -> Self {
    self.functions = Some(Arc::new(matcher));
    self
  }

  pub fn with_tagged_templates(mut self, matcher: impl TaggedTemplateMatcher + 'static) -> Self {
    self.tagged_templates = Some(Arc::new(matcher));
    self
  }

  pub fn with_factory(mut self, factory: impl FactoryResolver + 'static) -> Self {
    self.factory = Some(Arc::new(factory));
    self
  }
}

/// Either every name, or an explicit list of names.
///
/// Deserializes from `"all"` or from an array of names.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ListOrAll {
  #[default]
  All,
  List(Vec<String>),
}

impl<'de> Deserialize<'de> for ListOrAll {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: serde::Deserializer<'de>,
  {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
      Keyword(String),
      List(Vec<String>),
    }

    match Raw::deserialize(deserializer)? {
      Raw::Keyword(keyword) if keyword == "all" => Ok(ListOrAll::All),
      Raw::Keyword(keyword) => Err(serde::de::Error::custom(format!(
        "expected \"all\" or a list of names, got {keyword:?}"
      ))),
      Raw::List(names) => Ok(ListOrAll::List(names)),
    }
  }
}

impl ListOrAll {
  pub fn contains(&self, name: &str) -> bool {
    match self {
      ListOrAll::All => true,
      ListOrAll::List(names) => names.iter().any(|n| n == name),
    }
  }
}

impl<S: Into<String>> FromIterator<S> for ListOrAll {
  fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
    ListOrAll::List(iter.into_iter().map(Into::into).collect())
  }
}

/// Name-based matcher usable for every category.
///
/// Components, functions and tagged templates are selected by their display
/// name; props by their name. Every positional argument of a matched function
/// is extracted.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NameMatchers {
  pub names: ListOrAll,
  pub props: ListOrAll,
  #[serde(skip)]
  pub defaults: IndexMap<String, IndexMap<String, Primitive>>,
}

impl NameMatchers {
  pub fn new(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
    NameMatchers {
      names: names.into_iter().collect(),
      ..Default::default()
    }
  }

  pub fn with_props(mut self, props: impl IntoIterator<Item = impl Into<String>>) -> Self {
    self.props = props.into_iter().collect();
    self
  }

  pub fn with_default_prop(
    mut self,
    tag_name: impl Into<String>,
    prop_name: impl Into<String>,
    value: impl Into<Primitive>,
  ) -> Self {
    self
      .defaults
      .entry(tag_name.into())
      .or_default()
      .insert(prop_name.into(), value.into());
    self
  }
}

impl ComponentMatcher for NameMatchers {
  fn match_tag(&self, args: &MatchTagArgs<'_>) -> anyhow::Result<bool> {
    Ok(args.is_factory || self.names.contains(args.tag_name))
  }

  fn match_prop(&self, args: &MatchPropArgs<'_>) -> anyhow::Result<bool> {
    Ok(self.props.contains(args.prop_name))
  }

  fn default_props(&self, tag_name: &str) -> IndexMap<String, Primitive> {
    self.defaults.get(tag_name).cloned().unwrap_or_default()
  }
}

impl FunctionMatcher for NameMatchers {
  fn match_fn(&self, args: &MatchFnArgs<'_>) -> anyhow::Result<bool> {
    Ok(self.names.contains(args.fn_name))
  }

  fn match_arg(&self, _args: &MatchFnArgArgs<'_>) -> anyhow::Result<bool> {
    Ok(true)
  }

  fn match_prop(&self, args: &MatchFnPropArgs<'_>) -> anyhow::Result<bool> {
    Ok(self.props.contains(args.prop_name))
  }
}

impl TaggedTemplateMatcher for NameMatchers {
  fn match_tagged_template(&self, args: &MatchTaggedTemplateArgs<'_>) -> anyhow::Result<bool> {
    Ok(self.names.contains(args.fn_name))
  }
}

#[cfg(test)]
mod tests {
  use swc_core::common::DUMMY_SP;
  use swc_core::ecma::ast::{Ident, JSXElementName};

  use super::*;

  fn opening_element(name: &str) -> JSXOpeningElement {
    JSXOpeningElement {
      name: JSXElementName::Ident(Ident::new_no_ctxt(name.into(), DUMMY_SP)),
      span: DUMMY_SP,
      attrs: vec![],
      self_closing: true,
      type_args: None,
    }
  }

  #[test]
  fn test_jsx_factory() {
    let factory = JsxFactory::default();
    let node = opening_element("styled");
    assert!(factory.is_factory("styled", &node));
    assert!(factory.is_factory("styled.div", &node));
    assert!(!factory.is_factory("styledDiv", &node));
    assert!(!factory.is_factory("Box", &node));
  }

  #[test]
  fn test_list_or_all_deserialize() {
    let all: ListOrAll = serde_json::from_str("\"all\"").unwrap();
    assert_eq!(all, ListOrAll::All);

    let list: ListOrAll = serde_json::from_str("[\"css\", \"cva\"]").unwrap();
    assert!(list.contains("css"));
    assert!(!list.contains("sva"));

    assert!(serde_json::from_str::<ListOrAll>("\"some\"").is_err());
  }

  #[test]
  fn test_name_matchers_deserialize() {
    let matchers: NameMatchers =
      serde_json::from_str(r#"{ "names": ["Box"], "props": ["color"] }"#).unwrap();
    let node = opening_element("Box");

    let tag = MatchTagArgs {
      tag_name: "Box",
      tag_node: &node,
      is_factory: false,
    };
    assert!(matchers.match_tag(&tag).unwrap());

    let prop = MatchPropArgs {
      tag_name: "Box",
      tag_node: &node,
      prop_name: "onClick",
      prop_node: None,
    };
    assert!(!ComponentMatcher::match_prop(&matchers, &prop).unwrap());
  }

  #[test]
  fn test_name_matchers_factory_tags_always_match() {
    let matchers = NameMatchers::new(["Box"]);
    let node = opening_element("styled");
    let tag = MatchTagArgs {
      tag_name: "styled.div",
      tag_node: &node,
      is_factory: true,
    };
    assert!(matchers.match_tag(&tag).unwrap());
  }

  #[test]
  fn test_default_props() {
    let matchers = NameMatchers::new(["Stack"]).with_default_prop("Stack", "gap", "10px");
    assert_eq!(
      matchers.default_props("Stack").get("gap"),
      Some(&Primitive::from("10px"))
    );
    assert!(matchers.default_props("Box").is_empty());
  }
}
