use std::path::{Path, PathBuf};
use std::rc::Rc;

use indexmap::IndexMap;
use swc_core::atoms::Atom;
use swc_core::ecma::ast::{Expr, Id, Ident, MemberExpr, MemberProp};
use tracing::trace;

use super::operators::index;
use super::{skip_wrappers, BindingKey, Evaluator};
use crate::box_node::{BoxNode, Primitive, UnresolvableReason};
use crate::node_ref::NodeRef;
use crate::scope::{
  Binding, ExportEntry, ImportBinding, ImportedName, ModuleScope, PatternStep, VariableBinding,
};

impl Evaluator<'_> {
  pub(super) fn identifier(
    &mut self,
    scope: &Rc<ModuleScope>,
    ident: &Ident,
    node: NodeRef,
  ) -> BoxNode {
    if let Some(value) = self.environment(&ident.sym) {
      return value;
    }

    let id = ident.to_id();
    if scope.binding(&id).is_some() {
      return self.resolve_id(scope, &id, node);
    }

    match &*ident.sym {
      "undefined" => BoxNode::literal(Primitive::Undefined, Some(node)),
      "NaN" => BoxNode::literal(f64::NAN, Some(node)),
      "Infinity" => BoxNode::literal(f64::INFINITY, Some(node)),
      _ => BoxNode::unresolvable(UnresolvableReason::Unbound, Some(node)),
    }
  }

  pub(super) fn member(
    &mut self,
    scope: &Rc<ModuleScope>,
    member: &MemberExpr,
    node: NodeRef,
  ) -> BoxNode {
    let key = match &member.prop {
      MemberProp::Ident(ident) => Primitive::Str(ident.sym.to_string()),
      MemberProp::Computed(computed) => match self.eval(scope, &computed.expr) {
        BoxNode::Literal(literal) => literal.value().clone(),
        value @ BoxNode::Unresolvable(_) => return value,
        _ => return BoxNode::unresolvable(UnresolvableReason::UnsupportedSyntax, Some(node)),
      },
      MemberProp::PrivateName(_) => {
        return BoxNode::unresolvable(UnresolvableReason::UnsupportedSyntax, Some(node))
      }
    };

    if let Some(value) = self.namespace_member(scope, &member.obj, &key, &node) {
      return value;
    }

    let object = self.eval(scope, &member.obj);
    index(&object, &key, &node)
  }

  /// `ns.name` on a namespace import reads the single export.
  fn namespace_member(
    &mut self,
    scope: &Rc<ModuleScope>,
    object: &Expr,
    key: &Primitive,
    node: &NodeRef,
  ) -> Option<BoxNode> {
    let Expr::Ident(ident) = skip_wrappers(object) else {
      return None;
    };
    if self.environment(&ident.sym).is_some() {
      return None;
    }
    let Some(Binding::Import(ImportBinding {
      source,
      imported: ImportedName::Namespace,
      ..
    })) = scope.binding(&ident.to_id())
    else {
      return None;
    };

    let Some(target) = self.import_target(scope, source) else {
      return Some(BoxNode::unresolvable(
        UnresolvableReason::Unbound,
        Some(node.clone()),
      ));
    };
    Some(self.resolve_export(&target, &Atom::from(key.to_js_string()), node.clone()))
  }

  fn environment(&self, name: &str) -> Option<BoxNode> {
    self
      .options
      .iter()
      .rev()
      .find_map(|options| options.environment.get(name).cloned())
  }

  fn resolve_id(&mut self, scope: &Rc<ModuleScope>, id: &Id, node: NodeRef) -> BoxNode {
    match scope.binding(id) {
      Some(Binding::Variable(variable)) => {
        if scope.is_reassigned(id) {
          trace!("{} is reassigned, not a constant", id.0);
          return BoxNode::unresolvable(UnresolvableReason::Unbound, Some(node));
        }
        let key = BindingKey::Local(scope.path().clone(), id.clone());
        self.with_binding(key, node.clone(), |this| this.variable(scope, variable, node))
      }
      Some(Binding::Import(import)) => {
        self.resolve_import(scope, &import.source, &import.imported, node)
      }
      Some(Binding::Opaque) | None => BoxNode::unresolvable(UnresolvableReason::Unbound, Some(node)),
    }
  }

  fn variable(
    &mut self,
    scope: &Rc<ModuleScope>,
    variable: &VariableBinding,
    node: NodeRef,
  ) -> BoxNode {
    let mut value = match &variable.init {
      Some(init) => self.eval(scope, init),
      None => BoxNode::literal(Primitive::Undefined, Some(node.clone())),
    };

    for step in &variable.path {
      let key = match step {
        PatternStep::Key(key) => Primitive::Str(key.clone()),
        PatternStep::Index(index) => Primitive::Num(*index as f64),
      };
      value = index(&value, &key, &node);
    }

    match (&variable.default, value.as_literal()) {
      (Some(default), Some(Primitive::Undefined)) => self.eval(scope, default),
      _ => value,
    }
  }

  fn import_target(&self, scope: &ModuleScope, source: &str) -> Option<PathBuf> {
    if self.context.flags.skip_traverse_files {
      return None;
    }
    let target = self.project.resolve_import(scope.path(), source);
    if target.is_none() {
      trace!("could not resolve {source} from {}", scope.path().display());
    }
    target
  }

  fn resolve_import(
    &mut self,
    scope: &ModuleScope,
    source: &str,
    imported: &ImportedName,
    node: NodeRef,
  ) -> BoxNode {
    let Some(target) = self.import_target(scope, source) else {
      return BoxNode::unresolvable(UnresolvableReason::Unbound, Some(node));
    };

    match imported.export_name() {
      Some(name) => self.resolve_export(&target, &name, node),
      None => self.resolve_namespace(&target, node),
    }
  }

  fn resolve_export(&mut self, path: &Path, name: &Atom, node: NodeRef) -> BoxNode {
    let scope = self.scope(path);
    let key = BindingKey::Export(scope.path().clone(), name.clone());

    self.with_binding(key, node.clone(), |this| {
      match scope.export(name) {
        Some(ExportEntry::Local(id)) => this.resolve_id(&scope, id, node),
        Some(ExportEntry::ReExport { source, imported }) => {
          this.resolve_import(&scope, source, imported, node)
        }
        Some(ExportEntry::Expr(expr)) => this.eval(&scope, expr),
        // `export *` never forwards the default export
        None if &**name == "default" => {
          BoxNode::unresolvable(UnresolvableReason::Unbound, Some(node))
        }
        None => {
          for source in scope.export_all() {
            let Some(target) = this.import_target(&scope, source) else {
              continue;
            };
            let value = this.resolve_export(&target, name, node.clone());
            if value.unresolvable_reason() != Some(UnresolvableReason::Unbound) {
              return value;
            }
          }
          BoxNode::unresolvable(UnresolvableReason::Unbound, Some(node))
        }
      }
    })
  }

  /// Every named export of `path` as one map.
  fn resolve_namespace(&mut self, path: &Path, node: NodeRef) -> BoxNode {
    let scope = self.scope(path);
    let key = BindingKey::Namespace(scope.path().clone());

    self.with_binding(key, node.clone(), |this| {
      let mut entries = IndexMap::new();
      for name in scope.exports().keys() {
        let value = this.resolve_export(scope.path(), name, node.clone());
        entries.insert(name.to_string(), value);
      }
      BoxNode::map(entries, Some(node))
    })
  }

  /// Evaluate a binding at most once per run, detecting cycles.
  ///
  /// Values computed while any cycle was detected are not cached: they depend
  /// on which binding of the cycle was entered first.
  fn with_binding(
    &mut self,
    key: BindingKey,
    node: NodeRef,
    f: impl FnOnce(&mut Self) -> BoxNode,
  ) -> BoxNode {
    if let Some(value) = self.cache.get(&key) {
      trace!(?key, "binding cache hit");
      return value.clone();
    }
    if self.in_progress.contains(&key) {
      trace!(?key, "binding cycle detected");
      self.cycles += 1;
      return BoxNode::unresolvable(UnresolvableReason::Cycle, Some(node));
    }

    self.in_progress.insert(key.clone());
    let cycles = self.cycles;
    let value = f(self);
    self.in_progress.remove(&key);

    if self.cycles == cycles && !self.context.is_stack_sensitive() {
      self.cache.insert(key, value.clone());
    }
    value
  }
}

#[cfg(test)]
mod tests {
  use indoc::indoc;
  use pretty_assertions::assert_eq;
  use tracing_test::traced_test;

  use super::*;
  use crate::context::{EvaluationContext, EvaluationFlags};
  use crate::project::{InMemoryProject, ProjectIndex};

  fn lit(value: impl Into<Primitive>) -> BoxNode {
    BoxNode::literal(value, None)
  }

  fn unbound() -> BoxNode {
    BoxNode::unresolvable(UnresolvableReason::Unbound, None)
  }

  fn project(files: &[(&str, &str)]) -> InMemoryProject {
    let mut project = InMemoryProject::new();
    for (path, code) in files {
      project.add_file(*path, code).unwrap();
    }
    project
  }

  /// Evaluate the default export of `path`.
  fn evaluate_default(project: &InMemoryProject, context: &EvaluationContext, path: &str) -> BoxNode {
    let mut evaluator = Evaluator::new(project, context);
    evaluator.resolve_export(Path::new(path), &Atom::from("default"), test_node(path))
  }

  fn test_node(path: &str) -> NodeRef {
    NodeRef::new(
      Path::new(path).into(),
      swc_core::common::DUMMY_SP,
      crate::node_ref::NodeKind::Expr,
    )
  }

  fn tokens_project() -> InMemoryProject {
    project(&[
      (
        "/src/tokens.ts",
        indoc! {r#"
          export const colors = { primary: "red" };
          const weight = "bold";
          export default weight;
          export * from "./spacing";
          export { radius as rounded } from "./radius";
        "#},
      ),
      ("/src/spacing.ts", "export const size = 2;"),
      ("/src/radius.ts", "export const radius = '4px';"),
      (
        "/src/index.tsx",
        indoc! {r#"
          import { colors, size, rounded } from "./tokens";
          import weight from "./tokens";
          import * as tokens from "./tokens";
          export default [colors.primary, weight, tokens.colors.primary, size, rounded, tokens.missing];
        "#},
      ),
    ])
  }

  #[test]
  fn test_follows_imports_across_files() {
    let project = tokens_project();
    let value = evaluate_default(&project, &EvaluationContext::default(), "/src/index.tsx");

    assert_eq!(
      value,
      BoxNode::list(
        vec![
          lit("red"),
          lit("bold"),
          lit("red"),
          lit(2),
          lit("4px"),
          unbound(),
        ],
        None
      )
    );

    let primary = &value.as_list().unwrap().items()[0];
    assert_eq!(&*primary.node().unwrap().file, Path::new("/src/tokens.ts"));
  }

  #[test]
  fn test_skip_traverse_files() {
    let project = tokens_project();
    let context = EvaluationContext::new(EvaluationFlags {
      skip_traverse_files: true,
      ..Default::default()
    });
    let value = evaluate_default(&project, &context, "/src/index.tsx");

    assert_eq!(value, BoxNode::list(vec![unbound(); 6], None));
  }

  #[test]
  fn test_namespace_import_as_value() {
    let project = project(&[
      ("/src/tokens.ts", "export const a = 1; export const b = 'x';"),
      (
        "/src/index.ts",
        "import * as tokens from './tokens'; export default tokens;",
      ),
    ]);
    let value = evaluate_default(&project, &EvaluationContext::default(), "/src/index.ts");

    assert_eq!(
      value.to_literal_value(),
      Some(serde_json::json!({ "a": 1, "b": "x" }))
    );
  }

  #[test]
  fn test_cross_file_cycle() {
    let project = project(&[
      ("/src/a.ts", "import { b } from './b'; export const a = b; export default a;"),
      ("/src/b.ts", "import { a } from './a'; export const b = a;"),
    ]);
    let value = evaluate_default(&project, &EvaluationContext::default(), "/src/a.ts");
    assert_eq!(
      value,
      BoxNode::unresolvable(UnresolvableReason::Cycle, None)
    );
  }

  #[test]
  fn test_unresolved_import_is_unbound() {
    let project = project(&[(
      "/src/index.ts",
      "import { brand } from '@acme/tokens'; export default brand;",
    )]);
    assert!(project.resolve_import(Path::new("/src/index.ts"), "@acme/tokens").is_none());

    let value = evaluate_default(&project, &EvaluationContext::default(), "/src/index.ts");
    assert_eq!(value, unbound());
  }

  #[test]
  #[traced_test]
  fn test_cache_hits_are_traced() {
    let project = project(&[(
      "/src/index.ts",
      "const color = 'red'; export default [color, color];",
    )]);
    let value = evaluate_default(&project, &EvaluationContext::default(), "/src/index.ts");
    assert_eq!(value, BoxNode::list(vec![lit("red"), lit("red")], None));
    assert!(logs_contain("binding cache hit"));
  }
}
