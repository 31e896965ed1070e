use std::path::Path;

use box_extractor::{
  BoxNode, Diagnostic, EvaluationContext, EvaluationFlags, ExtractError, ExtractResultKind,
  Extractor, InMemoryProject, JsxFactory, MatcherSet, NameMatchers, Primitive, UnresolvableReason,
};
use indoc::indoc;
use pretty_assertions::assert_eq;
use serde_json::json;

fn project(files: &[(&str, &str)]) -> InMemoryProject {
  let mut project = InMemoryProject::new();
  for (path, code) in files {
    project.add_file(*path, code).unwrap();
  }
  project
}

fn panda_matchers() -> MatcherSet {
  MatcherSet::default()
    .with_components(NameMatchers::new(["Box", "Stack"]))
    .with_functions(NameMatchers::new(["css", "cva"]))
    .with_tagged_templates(NameMatchers::new(["css"]))
    .with_factory(JsxFactory::default())
}

fn lit(value: impl Into<Primitive>) -> BoxNode {
  BoxNode::literal(value, None)
}

#[test]
fn test_jsx_props_are_indexed() {
  let project = project(&[("/src/app.tsx", r#"const a = <Box color="red" />;"#)]);
  let matchers = panda_matchers();
  let context = EvaluationContext::default();

  let result = Extractor::new(&project, &matchers, &context)
    .extract(Path::new("/src/app.tsx"))
    .unwrap();

  let item = result.get("Box").unwrap();
  assert_eq!(item.kind, ExtractResultKind::Component);
  assert_eq!(item.query_list.len(), 1);
  assert_eq!(item.query_list[0].name, "Box");
  assert_eq!(item.nodes_by_prop.get("color").unwrap(), &vec![lit("red")]);
}

#[test]
fn test_unresolved_import_without_traversal_is_unbound() {
  let project = project(&[
    (
      "/src/app.tsx",
      indoc! {r#"
        import { external } from "./theme";
        css({ color: external });
      "#},
    ),
    ("/src/theme.ts", r#"export const external = "red";"#),
  ]);
  let matchers = panda_matchers();
  let context = EvaluationContext::new(EvaluationFlags {
    skip_traverse_files: true,
    ..Default::default()
  });

  let result = Extractor::new(&project, &matchers, &context)
    .extract(Path::new("/src/app.tsx"))
    .unwrap();

  let color = result.get("css").unwrap().nodes_by_prop.get("color").unwrap();
  assert_eq!(
    color,
    &vec![BoxNode::unresolvable(UnresolvableReason::Unbound, None)]
  );
  assert_eq!(
    result.diagnostics(),
    vec![Diagnostic {
      name: "css".to_string(),
      prop: Some("color".to_string()),
      reason: UnresolvableReason::Unbound,
      node: color[0].node().cloned(),
    }]
  );
}

#[test]
fn test_imports_are_followed_across_files() {
  let project = project(&[
    (
      "/src/app.tsx",
      indoc! {r#"
        import tokens, { spacing } from "@/tokens";
        import * as colors from "./colors";

        export const App = () => (
          <Stack gap={spacing.md} color={colors.primary} bg={tokens.surface}>
            <Box padding={spacing.sm} />
          </Stack>
        );
      "#},
    ),
    (
      "/src/tokens/index.ts",
      indoc! {r#"
        export const spacing = { sm: "4px", md: "8px" };
        export default { surface: "white" };
      "#},
    ),
    ("/src/colors.ts", r#"export * from "./palette";"#),
    ("/src/palette.ts", r#"export const primary = "tomato";"#),
  ])
  .with_alias("@/", "/src");
  let matchers = panda_matchers();
  let context = EvaluationContext::default();

  let result = Extractor::new(&project, &matchers, &context)
    .extract(Path::new("/src/app.tsx"))
    .unwrap();

  assert_eq!(result.names().collect::<Vec<_>>(), vec!["Stack", "Box"]);
  assert_eq!(
    result.get("Stack").unwrap().query_list[0].value.to_literal_value(),
    Some(json!({ "gap": "8px", "color": "tomato", "bg": "white" }))
  );
  assert_eq!(
    result.get("Box").unwrap().query_list[0].value.to_literal_value(),
    Some(json!({ "padding": "4px" }))
  );
  assert!(result.diagnostics().is_empty());
}

#[test]
fn test_all_categories_in_one_file() {
  let project = project(&[(
    "/src/button.tsx",
    indoc! {r#"
      const size = "lg";
      const button = cva({
        base: { display: "flex" },
        variants: { size: { [size]: { padding: 4 } } },
      });
      const title = css`color: red;`;
      const Link = (props) => <styled.a {...props} color={props.active ? "blue" : "gray"} />;
    "#},
  )]);
  let matchers = panda_matchers();
  let context = EvaluationContext::default();

  let result = Extractor::new(&project, &matchers, &context)
    .extract(Path::new("/src/button.tsx"))
    .unwrap();

  assert_eq!(
    result.names().collect::<Vec<_>>(),
    vec!["cva", "css", "styled.a"]
  );

  let cva = result.get("cva").unwrap();
  assert_eq!(
    cva.query_list[0].value.to_literal_value(),
    Some(json!([{
      "base": { "display": "flex" },
      "variants": { "size": { "lg": { "padding": 4 } } },
    }]))
  );

  let css = result.get("css").unwrap();
  assert_eq!(css.kind, ExtractResultKind::Function);
  assert_eq!(css.query_list[0].value, lit("color: red;"));
  assert!(css.nodes_by_prop.is_empty());

  let link = result.get("styled.a").unwrap();
  assert_eq!(link.kind, ExtractResultKind::Component);
  let colors = link.nodes_by_prop.get("color").unwrap();
  assert_eq!(colors.len(), 1);
  let conditional = colors[0].as_conditional().unwrap();
  assert_eq!(conditional.when_true(), &lit("blue"));
  assert_eq!(conditional.when_false(), &lit("gray"));
}

#[test]
fn test_extraction_is_idempotent() {
  let project = project(&[
    (
      "/src/app.tsx",
      indoc! {r#"
        import { a } from "./a";
        const local = { color: a, ...unknown };
        css(local, cond ? { margin: 1 } : { margin: 2 });
      "#},
    ),
    ("/src/a.ts", r#"import { b } from "./b"; export const a = b;"#),
    ("/src/b.ts", r#"import { a } from "./a"; export const b = a;"#),
  ]);
  let matchers = panda_matchers();
  let context = EvaluationContext::default();
  let extractor = Extractor::new(&project, &matchers, &context);

  let first = extractor.extract(Path::new("/src/app.tsx")).unwrap();
  let second = extractor.extract(Path::new("/src/app.tsx")).unwrap();

  assert_eq!(first, second);
  assert_eq!(
    serde_json::to_value(&first).unwrap(),
    serde_json::to_value(&second).unwrap()
  );

  let reasons: Vec<_> = first.diagnostics().iter().map(|d| d.reason).collect();
  assert_eq!(
    reasons,
    vec![UnresolvableReason::Cycle, UnresolvableReason::Unbound]
  );
}

#[test]
fn test_files_are_extracted_independently() {
  let project = project(&[
    ("/src/a.tsx", r#"const a = <Box color="red" />;"#),
    ("/src/b.tsx", r#"css({ color: "blue" });"#),
  ]);
  let matchers = panda_matchers();
  let context = EvaluationContext::default();

  let results = Extractor::new(&project, &matchers, &context).extract_files([
    Path::new("/src/a.tsx"),
    Path::new("/src/missing.tsx"),
    Path::new("/src/b.tsx"),
  ]);

  assert_eq!(results.len(), 3);
  let a = results[Path::new("/src/a.tsx")].as_ref().unwrap();
  assert_eq!(a.names().collect::<Vec<_>>(), vec!["Box"]);
  assert!(matches!(
    results[Path::new("/src/missing.tsx")],
    Err(ExtractError::FileNotFound { .. })
  ));
  let b = results[Path::new("/src/b.tsx")].as_ref().unwrap();
  assert_eq!(b.names().collect::<Vec<_>>(), vec!["css"]);
}

#[test]
fn test_result_serializes_by_name() {
  let project = project(&[("/src/app.tsx", r#"css({ color: "red" });"#)]);
  let matchers = panda_matchers();
  let context = EvaluationContext::default();

  let result = Extractor::new(&project, &matchers, &context)
    .extract(Path::new("/src/app.tsx"))
    .unwrap();
  let value = serde_json::to_value(&result).unwrap();

  assert_eq!(value["css"]["kind"], json!("function"));
  assert_eq!(value["css"]["queryList"][0]["kind"], json!("call-expression"));
  assert_eq!(
    value["css"]["nodesByProp"]["color"][0]["value"],
    json!("red")
  );
}
