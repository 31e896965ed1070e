use std::rc::Rc;

use indexmap::IndexMap;
use swc_core::common::Spanned;
use swc_core::ecma::ast::{ArrayLit, Lit, ObjectLit, Prop, PropName, PropOrSpread, Tpl};

use super::Evaluator;
use crate::box_node::{BoxNode, Primitive, UnresolvableReason};
use crate::node_ref::NodeRef;
use crate::scope::ModuleScope;

pub(super) fn literal(lit: &Lit, node: NodeRef) -> BoxNode {
  let value = match lit {
    Lit::Str(s) => Primitive::Str(s.value.to_string()),
    Lit::Num(n) => Primitive::Num(n.value),
    Lit::Bool(b) => Primitive::Bool(b.value),
    Lit::Null(_) => Primitive::Null,
    _ => return BoxNode::unresolvable(UnresolvableReason::UnsupportedSyntax, Some(node)),
  };
  BoxNode::literal(value, Some(node))
}

impl Evaluator<'_> {
  /// Concatenate a template when every interpolation is a literal.
  pub(super) fn template(
    &mut self,
    scope: &Rc<ModuleScope>,
    tpl: &Tpl,
    node: NodeRef,
  ) -> BoxNode {
    let mut out = String::new();
    for (index, quasi) in tpl.quasis.iter().enumerate() {
      let text = quasi.cooked.as_ref().unwrap_or(&quasi.raw);
      out.push_str(text);

      let Some(expr) = tpl.exprs.get(index) else {
        continue;
      };
      match self.eval(scope, expr) {
        BoxNode::Literal(literal) => out.push_str(&literal.value().to_js_string()),
        value @ BoxNode::Unresolvable(_) => return value,
        _ => return BoxNode::unresolvable(UnresolvableReason::UnsupportedSyntax, Some(node)),
      }
    }
    BoxNode::literal(out, Some(node))
  }

  pub(super) fn array(
    &mut self,
    scope: &Rc<ModuleScope>,
    array: &ArrayLit,
    node: NodeRef,
  ) -> BoxNode {
    let mut items = Vec::with_capacity(array.elems.len());

    for elem in &array.elems {
      let Some(elem) = elem else {
        items.push(BoxNode::literal(Primitive::Undefined, Some(node.clone())));
        continue;
      };

      let value = self.eval(scope, &elem.expr);
      if elem.spread.is_none() {
        items.push(value);
        continue;
      }

      let origin = value.node().cloned();
      match value {
        BoxNode::List(list) => items.extend(list.items().iter().cloned()),
        BoxNode::Literal(literal) => match literal.value() {
          Primitive::Str(s) => items.extend(
            s.chars()
              .map(|c| BoxNode::literal(c.to_string(), origin.clone())),
          ),
          _ => items.push(BoxNode::unresolvable(
            UnresolvableReason::UnsupportedSyntax,
            origin,
          )),
        },
        value @ BoxNode::Unresolvable(_) => items.push(value),
        _ => items.push(BoxNode::unresolvable(
          UnresolvableReason::UnsupportedSyntax,
          Some(self.node_ref(scope, elem.expr.span())),
        )),
      }
    }

    BoxNode::list(items, Some(node))
  }

  /// Reduce an object literal entry by entry.
  ///
  /// Keys keep their first position when overridden, as in JavaScript. Entries
  /// that cannot be reduced degrade alone; unresolvable keys and spreads are
  /// stored under their source text.
  pub(super) fn object(
    &mut self,
    scope: &Rc<ModuleScope>,
    object: &ObjectLit,
    node: NodeRef,
  ) -> BoxNode {
    let mut entries = IndexMap::new();

    for prop in &object.props {
      let prop = match prop {
        PropOrSpread::Spread(spread) => {
          let value = self.eval(scope, &spread.expr);
          let fallback_key = self
            .source_text(scope, spread.span())
            .unwrap_or_else(|| "...".to_string());
          spread_into(&mut entries, value, &fallback_key, &node);
          continue;
        }
        PropOrSpread::Prop(prop) => &**prop,
      };

      match prop {
        Prop::Shorthand(ident) => {
          let value = self.eval(scope, &ident.clone().into());
          entries.insert(ident.sym.to_string(), value);
        }
        Prop::KeyValue(kv) => match self.prop_key(scope, &kv.key) {
          Ok(key) => {
            let value = self.eval(scope, &kv.value);
            entries.insert(key, value);
          }
          Err((key, value)) => {
            entries.insert(key, value);
          }
        },
        Prop::Getter(_) | Prop::Setter(_) | Prop::Method(_) => {
          let key = match prop {
            Prop::Getter(getter) => &getter.key,
            Prop::Setter(setter) => &setter.key,
            Prop::Method(method) => &method.key,
            _ => continue,
          };
          let unsupported = BoxNode::unresolvable(
            UnresolvableReason::UnsupportedSyntax,
            Some(self.node_ref(scope, prop.span())),
          );
          let key = match self.prop_key(scope, key) {
            Ok(key) | Err((key, _)) => key,
          };
          entries.insert(key, unsupported);
        }
        // Only valid inside patterns
        Prop::Assign(_) => {}
      }
    }

    BoxNode::map(entries, Some(node))
  }

  /// Static key of a property, or the source text of a computed key with the
  /// box to store under it.
  fn prop_key(
    &mut self,
    scope: &Rc<ModuleScope>,
    key: &PropName,
  ) -> Result<String, (String, BoxNode)> {
    match key {
      PropName::Ident(ident) => Ok(ident.sym.to_string()),
      PropName::Str(s) => Ok(s.value.to_string()),
      PropName::Num(n) => Ok(Primitive::Num(n.value).to_js_string()),
      PropName::BigInt(b) => Ok(b.value.to_string()),
      PropName::Computed(computed) => {
        let value = match self.eval(scope, &computed.expr) {
          BoxNode::Literal(literal) => return Ok(literal.value().to_js_string()),
          value @ BoxNode::Unresolvable(_) => value,
          _ => BoxNode::unresolvable(
            UnresolvableReason::UnsupportedSyntax,
            Some(self.node_ref(scope, computed.span)),
          ),
        };
        let text = self
          .source_text(scope, computed.span)
          .unwrap_or_else(|| "[computed]".to_string());
        Err((text, value))
      }
    }
  }
}

/// Merge the entries a spread contributes.
///
/// A conditional spread merges each branch separately, then keeps a
/// conditional for every key whose value differs between branches.
fn spread_into(
  entries: &mut IndexMap<String, BoxNode>,
  value: BoxNode,
  fallback_key: &str,
  node: &NodeRef,
) {
  match value {
    BoxNode::Map(map) => {
      for (key, value) in map.entries() {
        entries.insert(key.clone(), value.clone());
      }
    }
    BoxNode::List(list) => {
      for (index, item) in list.items().iter().enumerate() {
        entries.insert(index.to_string(), item.clone());
      }
    }
    BoxNode::Literal(ref literal) => {
      if let Primitive::Str(s) = literal.value() {
        for (index, c) in s.chars().enumerate() {
          let item = BoxNode::literal(c.to_string(), value.node().cloned());
          entries.insert(index.to_string(), item);
        }
      }
    }
    BoxNode::Conditional(conditional) => {
      let mut when_true = entries.clone();
      spread_into(&mut when_true, conditional.when_true().clone(), fallback_key, node);
      let mut when_false = entries.clone();
      spread_into(&mut when_false, conditional.when_false().clone(), fallback_key, node);

      let mut merged = IndexMap::with_capacity(when_true.len().max(when_false.len()));
      for key in when_true.keys().chain(when_false.keys()) {
        if merged.contains_key(key) {
          continue;
        }
        let undefined = || BoxNode::literal(Primitive::Undefined, None);
        let a = when_true.get(key).cloned().unwrap_or_else(undefined);
        let b = when_false.get(key).cloned().unwrap_or_else(undefined);
        let value = if a == b {
          a
        } else {
          BoxNode::conditional(a, b, conditional.condition().cloned(), Some(node.clone()))
        };
        merged.insert(key.clone(), value);
      }
      *entries = merged;
    }
    BoxNode::Unresolvable(_) => {
      entries.insert(fallback_key.to_string(), value);
    }
  }
}
