//! Traversal of a file, matching and aggregation of extracted instances.

mod result;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use swc_core::common::Spanned;
use swc_core::ecma::ast::*;
use swc_core::ecma::visit::{noop_visit_type, Visit, VisitWith};
use tracing::debug;

pub use self::result::{
  Diagnostic, ExtractResult, ExtractResultItem, ExtractResultKind, ExtractedInstance, InstanceKind,
};
use crate::box_node::{BoxNode, UnresolvableReason};
use crate::context::EvaluationContext;
use crate::errors::ExtractError;
use crate::evaluate::{expr_path, Evaluator};
use crate::matchers::{
  ComponentMatcher, FunctionMatcher, MatchFnArgArgs, MatchFnArgs, MatchFnPropArgs, MatchPropArgs,
  MatchTagArgs, MatchTaggedTemplateArgs, MatcherSet, TaggedTemplateMatcher,
};
use crate::node_ref::{NodeKind, NodeRef};
use crate::project::{ProjectIndex, SourceFile};

/// Runs extraction over files of a project.
///
/// Holds no state between files: each call to `extract` starts from a fresh
/// evaluator.
pub struct Extractor<'p> {
  project: &'p dyn ProjectIndex,
  matchers: &'p MatcherSet,
  context: &'p EvaluationContext,
}

impl<'p> Extractor<'p> {
  pub fn new(
    project: &'p dyn ProjectIndex,
    matchers: &'p MatcherSet,
    context: &'p EvaluationContext,
  ) -> Self {
    Extractor {
      project,
      matchers,
      context,
    }
  }

  #[tracing::instrument(level = "debug", skip_all, fields(path = %path.display()))]
  pub fn extract(&self, path: &Path) -> Result<ExtractResult, ExtractError> {
    let file = self
      .project
      .file(path)
      .ok_or_else(|| ExtractError::FileNotFound {
        file: path.to_path_buf(),
      })?;

    let mut visitor = ExtractVisitor {
      file,
      matchers: self.matchers,
      evaluator: Evaluator::new(self.project, self.context),
      result: ExtractResult::default(),
      error: None,
    };
    file.module().visit_with(&mut visitor);

    match visitor.error {
      Some(error) => Err(error),
      None => {
        debug!(names = visitor.result.len(), "extracted");
        Ok(visitor.result)
      }
    }
  }

  /// Extract every file independently. A failing file does not affect the
  /// others.
  pub fn extract_files<'a>(
    &self,
    paths: impl IntoIterator<Item = &'a Path>,
  ) -> IndexMap<PathBuf, Result<ExtractResult, ExtractError>> {
    paths
      .into_iter()
      .map(|path| (path.to_path_buf(), self.extract(path)))
      .collect()
  }
}

struct ExtractVisitor<'a> {
  file: &'a SourceFile,
  matchers: &'a MatcherSet,
  evaluator: Evaluator<'a>,
  result: ExtractResult,
  /// First matcher failure; stops the traversal
  error: Option<ExtractError>,
}

impl ExtractVisitor<'_> {
  fn node_ref(&self, span: swc_core::common::Span, kind: NodeKind) -> NodeRef {
    NodeRef::new(self.file.path().clone(), span, kind)
  }

  fn failure(
    &self,
    matcher: &'static str,
    node: &NodeRef,
  ) -> impl FnOnce(anyhow::Error) -> ExtractError {
    let file = self.file.path().to_path_buf();
    let node = node.clone();
    move |source| ExtractError::MatcherFailure {
      matcher,
      file,
      node,
      source,
    }
  }

  /// Reduce `expr` with `ancestor` on the evaluation stack.
  fn evaluate(&mut self, ancestor: &NodeRef, expr: &Expr) -> BoxNode {
    let path: Arc<Path> = self.file.path().clone();
    self
      .evaluator
      .within(ancestor.clone(), |evaluator| evaluator.evaluate(&path, expr))
  }

  fn component(
    &mut self,
    matcher: &dyn ComponentMatcher,
    element: &JSXOpeningElement,
  ) -> Result<(), ExtractError> {
    let tag_name = jsx_tag_name(&element.name);
    let element_ref = self.node_ref(element.span, NodeKind::JsxOpeningElement);
    let is_factory = self
      .matchers
      .factory
      .as_ref()
      .is_some_and(|factory| factory.is_factory(&tag_name, element));

    let matched = matcher
      .match_tag(&MatchTagArgs {
        tag_name: &tag_name,
        tag_node: element,
        is_factory,
      })
      .map_err(self.failure("match_tag", &element_ref))?;
    if !matched {
      return Ok(());
    }

    let mut props = IndexMap::new();
    let mut present = HashSet::new();

    for attr in &element.attrs {
      match attr {
        JSXAttrOrSpread::JSXAttr(attr) => {
          let prop_name = jsx_attr_name(&attr.name);
          present.insert(prop_name.clone());

          let attr_ref = self.node_ref(attr.span, NodeKind::JsxAttr);
          let matched = matcher
            .match_prop(&MatchPropArgs {
              tag_name: &tag_name,
              tag_node: element,
              prop_name: &prop_name,
              prop_node: Some(attr),
            })
            .map_err(self.failure("match_prop", &attr_ref))?;
          if matched {
            let value = self.attr_value(&element_ref, attr);
            props.insert(prop_name, value);
          }
        }
        JSXAttrOrSpread::SpreadElement(spread) => {
          // Reduced as `{ ...expr }` so conditional spreads merge per key
          let object = Expr::Object(ObjectLit {
            span: spread.expr.span(),
            props: vec![PropOrSpread::Spread(spread.clone())],
          });
          let value = self.evaluate(&element_ref, &object);
          let Some(map) = value.as_map() else {
            debug!(
              %tag_name,
              reason = ?value.unresolvable_reason(),
              "skipping spread attribute that is not an object"
            );
            continue;
          };

          for (prop_name, value) in map.entries() {
            if prop_name.starts_with("...") {
              debug!(%tag_name, %prop_name, "skipping unresolvable spread");
              continue;
            }
            present.insert(prop_name.clone());
            let matched = matcher
              .match_prop(&MatchPropArgs {
                tag_name: &tag_name,
                tag_node: element,
                prop_name,
                prop_node: None,
              })
              .map_err(self.failure("match_prop", &element_ref))?;
            if matched {
              props.insert(prop_name.clone(), value.clone());
            }
          }
        }
      }
    }

    for (prop_name, default) in matcher.default_props(&tag_name) {
      if present.contains(&prop_name) {
        continue;
      }
      let matched = matcher
        .match_prop(&MatchPropArgs {
          tag_name: &tag_name,
          tag_node: element,
          prop_name: &prop_name,
          prop_node: None,
        })
        .map_err(self.failure("match_prop", &element_ref))?;
      if matched {
        props.insert(prop_name, BoxNode::literal(default, Some(element_ref.clone())));
      }
    }

    debug!(%tag_name, props = props.len(), "matched component");
    self.result.push(ExtractedInstance {
      name: tag_name,
      kind: InstanceKind::JsxElement,
      node: element_ref.clone(),
      value: BoxNode::map(props, Some(element_ref)),
    });
    Ok(())
  }

  fn attr_value(&mut self, element_ref: &NodeRef, attr: &JSXAttr) -> BoxNode {
    let unsupported = || {
      BoxNode::unresolvable(
        UnresolvableReason::UnsupportedSyntax,
        Some(NodeRef::new(element_ref.file.clone(), attr.span, NodeKind::JsxAttr)),
      )
    };

    match &attr.value {
      // `<Box hidden />`
      None => {
        let value = Expr::Lit(Lit::Bool(Bool {
          span: attr.span,
          value: true,
        }));
        self.evaluate(element_ref, &value)
      }
      Some(JSXAttrValue::Lit(lit)) => self.evaluate(element_ref, &Expr::Lit(lit.clone())),
      Some(JSXAttrValue::JSXExprContainer(container)) => match &container.expr {
        JSXExpr::Expr(expr) => self.evaluate(element_ref, expr),
        JSXExpr::JSXEmptyExpr(_) => unsupported(),
      },
      Some(_) => unsupported(),
    }
  }

  fn call(&mut self, matcher: &dyn FunctionMatcher, call: &CallExpr) -> Result<(), ExtractError> {
    let Callee::Expr(callee) = &call.callee else {
      return Ok(());
    };
    let Some(fn_name) = expr_path(callee) else {
      return Ok(());
    };
    let call_ref = self.node_ref(call.span, NodeKind::CallExpr);

    let matched = matcher
      .match_fn(&MatchFnArgs {
        fn_name: &fn_name,
        fn_node: call,
      })
      .map_err(self.failure("match_fn", &call_ref))?;
    if !matched {
      return Ok(());
    }

    let mut args = Vec::with_capacity(call.args.len());
    for (index, arg) in call.args.iter().enumerate() {
      let arg_ref = self.node_ref(arg.expr.span(), NodeKind::Expr);
      let matched = matcher
        .match_arg(&MatchFnArgArgs {
          fn_name: &fn_name,
          fn_node: call,
          arg_node: &arg.expr,
          index,
        })
        .map_err(self.failure("match_arg", &arg_ref))?;

      // Placeholders keep argument positions stable
      if !matched {
        args.push(BoxNode::unresolvable(
          UnresolvableReason::NotEvaluated,
          Some(arg_ref),
        ));
        continue;
      }

      let value = self.evaluate(&call_ref, &arg.expr);
      args.push(self.filter_props(matcher, &fn_name, call, &arg.expr, value)?);
    }

    debug!(%fn_name, args = args.len(), "matched function");
    self.result.push(ExtractedInstance {
      name: fn_name,
      kind: InstanceKind::CallExpression,
      node: call_ref.clone(),
      value: BoxNode::list(args, Some(call_ref)),
    });
    Ok(())
  }

  /// Keep the entries of an object argument accepted by `match_prop`.
  fn filter_props(
    &self,
    matcher: &dyn FunctionMatcher,
    fn_name: &str,
    call: &CallExpr,
    arg: &Expr,
    value: BoxNode,
  ) -> Result<BoxNode, ExtractError> {
    let node = value.node().cloned();
    match value {
      BoxNode::Map(ref map) => {
        let mut entries = IndexMap::new();
        for (prop_name, entry) in map.entries() {
          let prop_node = inline_prop(arg, prop_name);
          let prop_ref = match prop_node {
            Some(prop) => self.node_ref(prop.span(), NodeKind::Prop),
            None => self.node_ref(arg.span(), NodeKind::Expr),
          };
          let matched = matcher
            .match_prop(&MatchFnPropArgs {
              fn_name,
              fn_node: call,
              prop_name,
              prop_node,
            })
            .map_err(self.failure("match_prop", &prop_ref))?;
          if matched {
            entries.insert(prop_name.clone(), entry.clone());
          }
        }
        Ok(BoxNode::map(entries, node))
      }
      BoxNode::Conditional(ref conditional) => Ok(BoxNode::conditional(
        self.filter_props(matcher, fn_name, call, arg, conditional.when_true().clone())?,
        self.filter_props(matcher, fn_name, call, arg, conditional.when_false().clone())?,
        conditional.condition().cloned(),
        node,
      )),
      other => Ok(other),
    }
  }

  fn tagged_template(
    &mut self,
    matcher: &dyn TaggedTemplateMatcher,
    tagged: &TaggedTpl,
  ) -> Result<(), ExtractError> {
    let Some(fn_name) = expr_path(&tagged.tag) else {
      return Ok(());
    };
    let tagged_ref = self.node_ref(tagged.span, NodeKind::TaggedTpl);

    let matched = matcher
      .match_tagged_template(&MatchTaggedTemplateArgs {
        fn_name: &fn_name,
        tagged_template_node: tagged,
      })
      .map_err(self.failure("match_tagged_template", &tagged_ref))?;
    if !matched {
      return Ok(());
    }

    let value = self.evaluate(&tagged_ref, &Expr::TaggedTpl(tagged.clone()));
    debug!(%fn_name, "matched tagged template");
    self.result.push(ExtractedInstance {
      name: fn_name,
      kind: InstanceKind::TaggedTemplate,
      node: tagged_ref,
      value,
    });
    Ok(())
  }

  fn record(&mut self, outcome: Result<(), ExtractError>) {
    if let Err(error) = outcome {
      self.error = Some(error);
    }
  }
}

impl Visit for ExtractVisitor<'_> {
  noop_visit_type!();

  fn visit_jsx_opening_element(&mut self, node: &JSXOpeningElement) {
    if self.error.is_some() {
      return;
    }
    if let Some(matcher) = self.matchers.components.clone() {
      let outcome = self.component(&*matcher, node);
      self.record(outcome);
    }
    node.visit_children_with(self);
  }

  fn visit_call_expr(&mut self, node: &CallExpr) {
    if self.error.is_some() {
      return;
    }
    if let Some(matcher) = self.matchers.functions.clone() {
      let outcome = self.call(&*matcher, node);
      self.record(outcome);
    }
    node.visit_children_with(self);
  }

  fn visit_tagged_tpl(&mut self, node: &TaggedTpl) {
    if self.error.is_some() {
      return;
    }
    if let Some(matcher) = self.matchers.tagged_templates.clone() {
      let outcome = self.tagged_template(&*matcher, node);
      self.record(outcome);
    }
    node.visit_children_with(self);
  }
}

/// Display name of a JSX tag: `Box`, `styled.div` or `svg:path`.
fn jsx_tag_name(name: &JSXElementName) -> String {
  fn object_name(object: &JSXObject) -> String {
    match object {
      JSXObject::Ident(ident) => ident.sym.to_string(),
      JSXObject::JSXMemberExpr(member) => {
        format!("{}.{}", object_name(&member.obj), member.prop.sym)
      }
    }
  }

  match name {
    JSXElementName::Ident(ident) => ident.sym.to_string(),
    JSXElementName::JSXMemberExpr(member) => {
      format!("{}.{}", object_name(&member.obj), member.prop.sym)
    }
    JSXElementName::JSXNamespacedName(name) => format!("{}:{}", name.ns.sym, name.name.sym),
  }
}

fn jsx_attr_name(name: &JSXAttrName) -> String {
  match name {
    JSXAttrName::Ident(ident) => ident.sym.to_string(),
    JSXAttrName::JSXNamespacedName(name) => format!("{}:{}", name.ns.sym, name.name.sym),
  }
}

/// The property of an inline object literal argument that defines `name`.
fn inline_prop<'e>(arg: &'e Expr, name: &str) -> Option<&'e Prop> {
  let Expr::Object(object) = crate::evaluate::skip_wrappers(arg) else {
    return None;
  };

  object
    .props
    .iter()
    .rev()
    .filter_map(|prop| match prop {
      PropOrSpread::Prop(prop) => Some(&**prop),
      PropOrSpread::Spread(_) => None,
    })
    .find(|prop| {
      let key = match prop {
        Prop::Shorthand(ident) => return &*ident.sym == name,
        Prop::KeyValue(kv) => &kv.key,
        Prop::Getter(getter) => &getter.key,
        Prop::Setter(setter) => &setter.key,
        Prop::Method(method) => &method.key,
        Prop::Assign(_) => return false,
      };
      match key {
        PropName::Ident(ident) => &*ident.sym == name,
        PropName::Str(s) => &*s.value == name,
        _ => false,
      }
    })
}
