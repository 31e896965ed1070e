use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;
use swc_core::atoms::Atom;
use swc_core::ecma::ast::*;
use swc_core::ecma::visit::{noop_visit_type, Visit, VisitWith};

/// One step from a destructuring pattern's initializer to a bound value.
#[derive(Clone, Debug, PartialEq)]
pub enum PatternStep {
  Key(String),
  Index(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub enum ImportedName {
  Named(Atom),
  Default,
  Namespace,
}

impl ImportedName {
  fn from_export_name(name: &ModuleExportName) -> Self {
    let sym = match name {
      ModuleExportName::Ident(ident) => ident.sym.clone(),
      ModuleExportName::Str(s) => s.value.clone(),
    };
    if &*sym == "default" {
      ImportedName::Default
    } else {
      ImportedName::Named(sym)
    }
  }

  /// Name under which the target module exports the binding.
  pub fn export_name(&self) -> Option<Atom> {
    match self {
      ImportedName::Named(name) => Some(name.clone()),
      ImportedName::Default => Some("default".into()),
      ImportedName::Namespace => None,
    }
  }
}

#[derive(Clone, Debug)]
pub struct VariableBinding {
  /// Initializer of the whole declarator; shared by every destructured binding
  pub init: Option<Rc<Expr>>,
  pub path: Vec<PatternStep>,
  /// Default value from the pattern (`{ a = 1 }`)
  pub default: Option<Rc<Expr>>,
}

#[derive(Clone, Debug)]
pub struct ImportBinding {
  pub source: Atom,
  pub imported: ImportedName,
}

#[derive(Clone, Debug)]
pub enum Binding {
  Variable(VariableBinding),
  Import(ImportBinding),
  /// Bound to something the evaluator never reduces (functions, classes,
  /// computed or rest patterns)
  Opaque,
}

#[derive(Clone, Debug)]
pub enum ExportEntry {
  Local(Id),
  ReExport { source: Atom, imported: ImportedName },
  Expr(Rc<Expr>),
}

/// Bindings and exports of one file.
///
/// Relies on the hygiene contexts assigned by the SWC resolver: shadowed names
/// have distinct `Id`s, so a flat map gives "nearest enclosing binding" lookup.
#[derive(Debug)]
pub struct ModuleScope {
  path: Arc<Path>,
  bindings: HashMap<Id, Binding>,
  reassigned: HashSet<Id>,
  exports: IndexMap<Atom, ExportEntry>,
  export_all: Vec<Atom>,
}

impl ModuleScope {
  pub fn collect(path: Arc<Path>, module: &Module) -> Self {
    let mut collector = ScopeCollector::default();
    module.visit_with(&mut collector);

    let mut scope = ModuleScope {
      path,
      bindings: collector.bindings,
      reassigned: collector.reassigned,
      exports: IndexMap::new(),
      export_all: Vec::new(),
    };
    scope.collect_exports(module);
    scope
  }

  /// Scope of a file missing from the project: every identifier is unbound.
  pub fn empty(path: Arc<Path>) -> Self {
    ModuleScope {
      path,
      bindings: HashMap::new(),
      reassigned: HashSet::new(),
      exports: IndexMap::new(),
      export_all: Vec::new(),
    }
  }

  pub fn path(&self) -> &Arc<Path> {
    &self.path
  }

  pub fn binding(&self, id: &Id) -> Option<&Binding> {
    self.bindings.get(id)
  }

  /// Whether the binding is assigned to, updated, or has members assigned after
  /// its declaration.
  pub fn is_reassigned(&self, id: &Id) -> bool {
    self.reassigned.contains(id)
  }

  pub fn export(&self, name: &str) -> Option<&ExportEntry> {
    self.exports.get(&Atom::from(name))
  }

  pub fn exports(&self) -> &IndexMap<Atom, ExportEntry> {
    &self.exports
  }

  /// Sources of `export * from '...'` declarations, in source order.
  pub fn export_all(&self) -> &[Atom] {
    &self.export_all
  }

  fn collect_exports(&mut self, module: &Module) {
    for item in &module.body {
      let ModuleItem::ModuleDecl(decl) = item else {
        continue;
      };

      match decl {
        ModuleDecl::ExportDecl(export) => match &export.decl {
          Decl::Var(var) => {
            for declarator in &var.decls {
              let mut ids = Vec::new();
              pattern_ids(&declarator.name, &mut ids);
              for ident in ids {
                self
                  .exports
                  .insert(ident.sym.clone(), ExportEntry::Local(ident.to_id()));
              }
            }
          }
          Decl::Fn(func) => {
            self.exports.insert(
              func.ident.sym.clone(),
              ExportEntry::Local(func.ident.to_id()),
            );
          }
          Decl::Class(class) => {
            self.exports.insert(
              class.ident.sym.clone(),
              ExportEntry::Local(class.ident.to_id()),
            );
          }
          _ => {}
        },
        ModuleDecl::ExportNamed(named) => {
          if named.type_only {
            continue;
          }
          for specifier in &named.specifiers {
            match (specifier, &named.src) {
              (ExportSpecifier::Named(spec), None) => {
                let ModuleExportName::Ident(orig) = &spec.orig else {
                  continue;
                };
                let exported = spec
                  .exported
                  .as_ref()
                  .map(export_name_sym)
                  .unwrap_or_else(|| orig.sym.clone());
                self
                  .exports
                  .insert(exported, ExportEntry::Local(orig.to_id()));
              }
              (ExportSpecifier::Named(spec), Some(src)) => {
                let exported = spec.exported.as_ref().unwrap_or(&spec.orig);
                self.exports.insert(
                  export_name_sym(exported),
                  ExportEntry::ReExport {
                    source: src.value.clone(),
                    imported: ImportedName::from_export_name(&spec.orig),
                  },
                );
              }
              (ExportSpecifier::Namespace(spec), Some(src)) => {
                self.exports.insert(
                  export_name_sym(&spec.name),
                  ExportEntry::ReExport {
                    source: src.value.clone(),
                    imported: ImportedName::Namespace,
                  },
                );
              }
              _ => {}
            }
          }
        }
        ModuleDecl::ExportDefaultExpr(export) => {
          let entry = match &*export.expr {
            Expr::Ident(ident) => ExportEntry::Local(ident.to_id()),
            expr => ExportEntry::Expr(Rc::new(expr.clone())),
          };
          self.exports.insert("default".into(), entry);
        }
        ModuleDecl::ExportAll(export) => {
          if !export.type_only {
            self.export_all.push(export.src.value.clone());
          }
        }
        _ => {}
      }
    }
  }
}

fn export_name_sym(name: &ModuleExportName) -> Atom {
  match name {
    ModuleExportName::Ident(ident) => ident.sym.clone(),
    ModuleExportName::Str(s) => s.value.clone(),
  }
}

fn pattern_ids<'a>(pat: &'a Pat, ids: &mut Vec<&'a Ident>) {
  match pat {
    Pat::Ident(binding) => ids.push(&binding.id),
    Pat::Array(array) => array.elems.iter().flatten().for_each(|p| pattern_ids(p, ids)),
    Pat::Object(object) => {
      for prop in &object.props {
        match prop {
          ObjectPatProp::KeyValue(kv) => pattern_ids(&kv.value, ids),
          ObjectPatProp::Assign(assign) => ids.push(&assign.key.id),
          ObjectPatProp::Rest(rest) => pattern_ids(&rest.arg, ids),
        }
      }
    }
    Pat::Assign(assign) => pattern_ids(&assign.left, ids),
    Pat::Rest(rest) => pattern_ids(&rest.arg, ids),
    _ => {}
  }
}

fn prop_name_key(key: &PropName) -> Option<String> {
  match key {
    PropName::Ident(ident) => Some(ident.sym.to_string()),
    PropName::Str(s) => Some(s.value.to_string()),
    PropName::Num(n) => Some(crate::box_node::Primitive::Num(n.value).to_js_string()),
    _ => None,
  }
}

#[derive(Default)]
struct ScopeCollector {
  bindings: HashMap<Id, Binding>,
  reassigned: HashSet<Id>,
}

impl ScopeCollector {
  fn insert_opaque(&mut self, pat: &Pat) {
    let mut ids = Vec::new();
    pattern_ids(pat, &mut ids);
    for ident in ids {
      self.bindings.insert(ident.to_id(), Binding::Opaque);
    }
  }

  fn collect_pattern(
    &mut self,
    pat: &Pat,
    init: &Option<Rc<Expr>>,
    path: Vec<PatternStep>,
    default: Option<Rc<Expr>>,
  ) {
    match pat {
      Pat::Ident(binding) => {
        self.bindings.insert(
          binding.id.to_id(),
          Binding::Variable(VariableBinding {
            init: init.clone(),
            path,
            default,
          }),
        );
      }
      Pat::Object(object) => {
        for prop in &object.props {
          match prop {
            ObjectPatProp::KeyValue(kv) => match prop_name_key(&kv.key) {
              Some(key) => {
                let mut path = path.clone();
                path.push(PatternStep::Key(key));
                self.collect_pattern(&kv.value, init, path, None);
              }
              None => self.insert_opaque(&kv.value),
            },
            ObjectPatProp::Assign(assign) => {
              let mut path = path.clone();
              path.push(PatternStep::Key(assign.key.id.sym.to_string()));
              self.bindings.insert(
                assign.key.id.to_id(),
                Binding::Variable(VariableBinding {
                  init: init.clone(),
                  path,
                  default: assign.value.as_ref().map(|value| Rc::new((**value).clone())),
                }),
              );
            }
            ObjectPatProp::Rest(rest) => self.insert_opaque(&rest.arg),
          }
        }
      }
      Pat::Array(array) => {
        for (index, elem) in array.elems.iter().enumerate() {
          let Some(elem) = elem else {
            continue;
          };
          if let Pat::Rest(rest) = elem {
            self.insert_opaque(&rest.arg);
            continue;
          }
          let mut path = path.clone();
          path.push(PatternStep::Index(index));
          self.collect_pattern(elem, init, path, None);
        }
      }
      Pat::Assign(assign) => {
        let default = Some(Rc::new((*assign.right).clone()));
        self.collect_pattern(&assign.left, init, path, default);
      }
      other => self.insert_opaque(other),
    }
  }

  /// Loop variables change on every iteration, so they never hold a constant.
  fn collect_loop_head(&mut self, head: &ForHead) {
    match head {
      ForHead::VarDecl(var) => {
        for declarator in &var.decls {
          self.insert_opaque(&declarator.name);
        }
      }
      ForHead::UsingDecl(using) => {
        for declarator in &using.decls {
          self.insert_opaque(&declarator.name);
        }
      }
      ForHead::Pat(pat) => {
        let mut collector = AssignedIdents::default();
        pat.visit_with(&mut collector);
        self.reassigned.extend(collector.ids);
      }
    }
  }

  fn mark_reassigned_root(&mut self, expr: &Expr) {
    match expr {
      Expr::Ident(ident) => {
        self.reassigned.insert(ident.to_id());
      }
      Expr::Member(member) => self.mark_reassigned_root(&member.obj),
      Expr::Paren(paren) => self.mark_reassigned_root(&paren.expr),
      _ => {}
    }
  }
}

impl Visit for ScopeCollector {
  noop_visit_type!();

  fn visit_var_decl(&mut self, node: &VarDecl) {
    for declarator in &node.decls {
      let init = match declarator.init.as_deref() {
        Some(Expr::Fn(_)) | Some(Expr::Arrow(_)) | Some(Expr::Class(_)) => {
          self.insert_opaque(&declarator.name);
          continue;
        }
        Some(init) => Some(Rc::new(init.clone())),
        None => None,
      };
      self.collect_pattern(&declarator.name, &init, Vec::new(), None);
    }
    node.visit_children_with(self);
  }

  fn visit_for_of_stmt(&mut self, node: &ForOfStmt) {
    self.collect_loop_head(&node.left);
    node.right.visit_with(self);
    node.body.visit_with(self);
  }

  fn visit_for_in_stmt(&mut self, node: &ForInStmt) {
    self.collect_loop_head(&node.left);
    node.right.visit_with(self);
    node.body.visit_with(self);
  }

  fn visit_import_decl(&mut self, node: &ImportDecl) {
    if node.type_only {
      return;
    }

    for specifier in &node.specifiers {
      let (local, imported) = match specifier {
        ImportSpecifier::Named(named) => (
          &named.local,
          named
            .imported
            .as_ref()
            .map(ImportedName::from_export_name)
            .unwrap_or_else(|| ImportedName::Named(named.local.sym.clone())),
        ),
        ImportSpecifier::Default(default) => (&default.local, ImportedName::Default),
        ImportSpecifier::Namespace(namespace) => (&namespace.local, ImportedName::Namespace),
      };
      self.bindings.insert(
        local.to_id(),
        Binding::Import(ImportBinding {
          source: node.src.value.clone(),
          imported,
        }),
      );
    }
  }

  fn visit_fn_decl(&mut self, node: &FnDecl) {
    self.bindings.insert(node.ident.to_id(), Binding::Opaque);
    node.visit_children_with(self);
  }

  fn visit_class_decl(&mut self, node: &ClassDecl) {
    self.bindings.insert(node.ident.to_id(), Binding::Opaque);
    node.visit_children_with(self);
  }

  fn visit_assign_expr(&mut self, node: &AssignExpr) {
    match &node.left {
      AssignTarget::Simple(SimpleAssignTarget::Ident(binding)) => {
        self.reassigned.insert(binding.id.to_id());
      }
      AssignTarget::Simple(SimpleAssignTarget::Member(member)) => {
        self.mark_reassigned_root(&member.obj);
      }
      AssignTarget::Pat(pat) => {
        let mut collector = AssignedIdents::default();
        pat.visit_with(&mut collector);
        self.reassigned.extend(collector.ids);
      }
      _ => {}
    }
    node.visit_children_with(self);
  }

  fn visit_update_expr(&mut self, node: &UpdateExpr) {
    self.mark_reassigned_root(&node.arg);
    node.visit_children_with(self);
  }
}

#[derive(Default)]
struct AssignedIdents {
  ids: Vec<Id>,
}

impl Visit for AssignedIdents {
  noop_visit_type!();

  fn visit_binding_ident(&mut self, node: &BindingIdent) {
    self.ids.push(node.id.to_id());
  }

  fn visit_ident(&mut self, node: &Ident) {
    self.ids.push(node.to_id());
  }
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use box_extractor_swc_runner::test_utils::parse_test_module;
  use indoc::indoc;

  use super::*;

  fn collect(code: &str) -> (ModuleScope, Module) {
    let parsed = parse_test_module(code);
    let scope = ModuleScope::collect(Arc::from(PathBuf::from("test.tsx")), &parsed.module);
    (scope, parsed.module)
  }

  /// Find the id of the first declaration of `name` in the scope.
  fn find_id(scope: &ModuleScope, name: &str) -> Id {
    let mut ids: Vec<_> = scope
      .bindings
      .keys()
      .filter(|(sym, _)| &**sym == name)
      .cloned()
      .collect();
    ids.sort_by_key(|(_, ctxt)| ctxt.as_u32());
    ids.into_iter().next().unwrap()
  }

  #[test]
  fn test_collects_variables_and_imports() {
    let (scope, _) = collect(indoc! {r#"
      import { tokens as t } from './tokens';
      import theme from './theme';
      import * as all from './all';
      const color = "red";
      let size;
    "#});

    let Some(Binding::Import(import)) = scope.binding(&find_id(&scope, "t")) else {
      panic!("expected an import binding");
    };
    assert_eq!(&*import.source, "./tokens");
    assert_eq!(import.imported, ImportedName::Named("tokens".into()));

    let Some(Binding::Import(import)) = scope.binding(&find_id(&scope, "theme")) else {
      panic!("expected an import binding");
    };
    assert_eq!(import.imported, ImportedName::Default);

    let Some(Binding::Import(import)) = scope.binding(&find_id(&scope, "all")) else {
      panic!("expected an import binding");
    };
    assert_eq!(import.imported, ImportedName::Namespace);

    let Some(Binding::Variable(var)) = scope.binding(&find_id(&scope, "color")) else {
      panic!("expected a variable binding");
    };
    assert!(var.init.is_some());

    let Some(Binding::Variable(var)) = scope.binding(&find_id(&scope, "size")) else {
      panic!("expected a variable binding");
    };
    assert!(var.init.is_none());
  }

  #[test]
  fn test_destructuring_paths() {
    let (scope, _) = collect(indoc! {r#"
      const { a, b: { c }, d = 1, ...rest } = obj;
      const [x, , y] = list;
    "#});

    let path_of = |name: &str| match scope.binding(&find_id(&scope, name)) {
      Some(Binding::Variable(var)) => var.path.clone(),
      _ => panic!("expected a variable binding for {name}"),
    };

    assert_eq!(path_of("a"), vec![PatternStep::Key("a".into())]);
    assert_eq!(
      path_of("c"),
      vec![PatternStep::Key("b".into()), PatternStep::Key("c".into())]
    );
    assert_eq!(path_of("x"), vec![PatternStep::Index(0)]);
    assert_eq!(path_of("y"), vec![PatternStep::Index(2)]);
    assert!(matches!(
      scope.binding(&find_id(&scope, "d")),
      Some(Binding::Variable(VariableBinding {
        default: Some(_),
        ..
      }))
    ));
    assert!(matches!(
      scope.binding(&find_id(&scope, "rest")),
      Some(Binding::Opaque)
    ));
  }

  #[test]
  fn test_reassignments() {
    let (scope, _) = collect(indoc! {r#"
      let a = 1;
      a = 2;
      let b = 1;
      b++;
      const c = {};
      c.color = "red";
      let d = 1;
      [d] = [2];
      const e = 1;
    "#});

    for name in ["a", "b", "c", "d"] {
      assert!(scope.is_reassigned(&find_id(&scope, name)), "{name}");
    }
    assert!(!scope.is_reassigned(&find_id(&scope, "e")));
  }

  #[test]
  fn test_loop_variables_are_opaque() {
    let (scope, _) = collect(indoc! {r#"
      for (const size of ["sm", "lg"]) {}
      for (const { key } of entries) {}
      for (const name in variants) {}
      let current = "sm";
      for (current of sizes) {}
    "#});

    for name in ["size", "key", "name"] {
      assert!(
        matches!(scope.binding(&find_id(&scope, name)), Some(Binding::Opaque)),
        "{name}"
      );
    }
    assert!(scope.is_reassigned(&find_id(&scope, "current")));
  }

  #[test]
  fn test_shadowed_bindings_are_distinct() {
    let (scope, _) = collect(indoc! {r#"
      const color = "red";
      function Component(color) {
        const inner = color;
      }
    "#});

    let ids: Vec<_> = scope
      .bindings
      .keys()
      .filter(|(sym, _)| &**sym == "color")
      .collect();
    // The parameter is not recorded, only the module-level constant
    assert_eq!(ids.len(), 1);
  }

  #[test]
  fn test_exports() {
    let (scope, _) = collect(indoc! {r#"
      const local = 1;
      export const tokens = { color: "red" };
      export { local as renamed };
      export { other as forwarded, default as fallback } from './other';
      export * as ns from './ns';
      export * from './all';
      export default { size: 1 };
    "#});

    assert!(matches!(scope.export("tokens"), Some(ExportEntry::Local(_))));
    assert!(matches!(
      scope.export("renamed"),
      Some(ExportEntry::Local((sym, _))) if &**sym == "local"
    ));
    assert!(matches!(
      scope.export("forwarded"),
      Some(ExportEntry::ReExport { imported: ImportedName::Named(name), .. }) if &**name == "other"
    ));
    assert!(matches!(
      scope.export("fallback"),
      Some(ExportEntry::ReExport {
        imported: ImportedName::Default,
        ..
      })
    ));
    assert!(matches!(
      scope.export("ns"),
      Some(ExportEntry::ReExport {
        imported: ImportedName::Namespace,
        ..
      })
    ));
    assert!(matches!(scope.export("default"), Some(ExportEntry::Expr(_))));
    assert_eq!(scope.export_all(), &[Atom::from("./all")]);
  }
}
