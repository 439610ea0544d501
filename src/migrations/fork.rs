use std::ops::Range;

use tree_sitter::Node;

use crate::error::KitmigError;
use crate::matchers::{self, FORK_SYMBOL};
use crate::tree::{Edit, SourceTree};

const TEST_KIT_IMPORT: &str = "import { createTestKit } from \"&test_utils/test_kit\";\n";
const TEST_KIT_DECLARATION: &str =
    "const testKit = await createTestKit({\n\timportMetaUrl: import.meta.url\n});\n";

/// Replaces direct `fork()` scope creation with the shared test kit:
/// injects the `testKit` binding when missing, rewrites
/// `const scope = fork(...)` call sites into `testKit.fork` destructurings,
/// and drops the now-unused `fork` named import.
pub fn migrate(tree: &mut SourceTree) -> Result<bool, KitmigError> {
    let mut changed = false;

    if !has_test_kit_binding(tree) {
        inject_test_kit(tree)?;
        changed = true;
    }

    changed |= rewrite_fork_call_sites(tree)?;
    changed |= remove_fork_import(tree)?;
    Ok(changed)
}

fn has_test_kit_binding(tree: &SourceTree) -> bool {
    let root = tree.root();
    let mut cursor = root.walk();

    root.named_children(&mut cursor).any(|statement| {
        if statement.kind() != "lexical_declaration" {
            return false;
        }
        let mut declarators = statement.walk();
        statement.named_children(&mut declarators).any(|declarator| {
            declarator.kind() == "variable_declarator"
                && declarator
                    .child_by_field_name("name")
                    .is_some_and(|name| {
                        name.kind() == "identifier" && tree.node_text(name) == "testKit"
                    })
        })
    })
}

fn inject_test_kit(tree: &mut SourceTree) -> Result<(), KitmigError> {
    let import_edit = plan_import_insertion(tree);
    tree.apply(vec![import_edit])?;

    // Re-snapshot: the kit import is now part of the import block.
    let declaration_edit = match matchers::import_snapshots(tree).last() {
        Some(last) => Edit::insert(
            last.statement_range.end,
            format!("\n{TEST_KIT_DECLARATION}"),
        ),
        None => Edit::insert(0, format!("{TEST_KIT_DECLARATION}\n")),
    };
    tree.apply(vec![declaration_edit])?;
    Ok(())
}

/// The kit import goes in front of the first `&`-prefixed import, else in
/// front of the first relative import, else after the import block. Blank
/// lines are added so it visually groups with other `&`-imports: a leading
/// one when package imports precede, a trailing one when it starts its own
/// group right before relative imports.
fn plan_import_insertion(tree: &SourceTree) -> Edit {
    let imports = matchers::import_snapshots(tree);

    let is_internal = |specifier: &str| specifier.starts_with('&');
    let is_relative = |specifier: &str| specifier.starts_with('.');

    let has_internal = imports.iter().any(|import| is_internal(&import.specifier));
    let has_relative = imports.iter().any(|import| is_relative(&import.specifier));
    let has_outer = imports
        .iter()
        .any(|import| !is_internal(&import.specifier) && !is_relative(&import.specifier));

    let offset = imports
        .iter()
        .find(|import| is_internal(&import.specifier))
        .or_else(|| imports.iter().find(|import| is_relative(&import.specifier)))
        .map(|anchor| anchor.statement_range.start)
        .unwrap_or_else(|| {
            imports
                .last()
                .map(|import| import.statement_range.end)
                .unwrap_or(0)
        });

    let mut text = String::new();
    if has_outer {
        text.push('\n');
    }
    text.push_str(TEST_KIT_IMPORT);
    if !has_internal && has_relative {
        text.push('\n');
    }

    Edit::insert(offset, text)
}

fn rewrite_fork_call_sites(tree: &mut SourceTree) -> Result<bool, KitmigError> {
    let edits: Vec<Edit> = matchers::test_case_bodies(tree)
        .into_iter()
        .filter_map(|block| fork_call_site(tree, block))
        .map(|site| {
            let replacement = rewritten_declarator(tree, site.call);
            Edit::replace(site.declarator_range, replacement)
        })
        .collect();

    tree.apply(edits)
}

struct ForkCallSite<'t> {
    declarator_range: Range<usize>,
    call: Node<'t>,
}

/// A not-yet-migrated scope declaration directly inside `block`. The site
/// must still bind a plain `scope` identifier (a destructuring pattern means
/// it was already rewritten) and the callee must still be the bare `fork`
/// (`testKit.fork` is the marker of migrated code).
fn fork_call_site<'t>(tree: &'t SourceTree, block: Node<'t>) -> Option<ForkCallSite<'t>> {
    let mut cursor = block.walk();

    for statement in block.named_children(&mut cursor) {
        if statement.kind() != "lexical_declaration" {
            continue;
        }
        let mut declarators = statement.walk();
        for declarator in statement.named_children(&mut declarators) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name) = declarator.child_by_field_name("name") else {
                continue;
            };
            let Some(value) = declarator.child_by_field_name("value") else {
                continue;
            };
            if name.kind() != "identifier" || tree.node_text(name) != "scope" {
                continue;
            }
            if value.kind() != "call_expression" {
                continue;
            }
            let Some(callee) = value.child_by_field_name("function") else {
                continue;
            };
            if tree.node_text(callee) != FORK_SYMBOL {
                continue;
            }
            return Some(ForkCallSite {
                declarator_range: declarator.byte_range(),
                call: value,
            });
        }
    }

    None
}

fn rewritten_declarator(tree: &SourceTree, call: Node<'_>) -> String {
    match fork_arguments_text(tree, call) {
        Some(mocks) => format!(
            "{{ scope }} = testKit.fork({{\n\tmocks: () => [\n\t\t{mocks}\n\t]\n}})"
        ),
        None => "{ scope } = testKit.fork()".to_string(),
    }
}

/// Text of the original fork arguments with every `new Map(entries)` below
/// them flattened to its bare `entries`, ready for the kit's mocks provider.
fn fork_arguments_text(tree: &SourceTree, call: Node<'_>) -> Option<String> {
    let arguments = call.child_by_field_name("arguments")?;
    let span = inner_span(arguments)?;

    let mut flattened: Vec<(Range<usize>, String)> = Vec::new();
    for node in matchers::descendants(arguments) {
        if node.kind() != "new_expression" {
            continue;
        }
        let Some(constructor) = node.child_by_field_name("constructor") else {
            continue;
        };
        if tree.node_text(constructor) != "Map" {
            continue;
        }
        // Outermost construction wins; a map nested in another map's entries
        // is covered by the outer flattening.
        if flattened
            .iter()
            .any(|(range, _)| range.contains(&node.start_byte()))
        {
            continue;
        }
        let entries = node
            .child_by_field_name("arguments")
            .and_then(inner_span)
            .map(|entries_span| tree.source()[entries_span].to_string())
            .unwrap_or_default();
        flattened.push((node.byte_range(), entries));
    }

    let mut text = tree.source()[span.clone()].to_string();
    flattened.sort_by_key(|(range, _)| range.start);
    for (range, entries) in flattened.iter().rev() {
        text.replace_range(range.start - span.start..range.end - span.start, entries);
    }

    Some(text)
}

/// Span from the first to the last named child, i.e. an argument list without
/// its parentheses. None when the list is empty.
fn inner_span(arguments: Node<'_>) -> Option<Range<usize>> {
    let mut cursor = arguments.walk();
    let children: Vec<Node<'_>> = arguments.named_children(&mut cursor).collect();
    let first = children.first()?;
    let last = children.last()?;
    Some(first.start_byte()..last.end_byte())
}

fn remove_fork_import(tree: &mut SourceTree) -> Result<bool, KitmigError> {
    let edit = matchers::effector_import(tree)
        .and_then(|import| matchers::remove_named_import_edit(&import, FORK_SYMBOL));

    match edit {
        Some(edit) => tree.apply(vec![edit]),
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::migrate;
    use crate::tree::SourceTree;

    fn parse(text: &str) -> SourceTree {
        SourceTree::parse(Path::new("fixture.test.ts"), text.to_string())
            .expect("fixture should parse")
    }

    fn migrated(text: &str) -> String {
        let mut tree = parse(text);
        migrate(&mut tree).expect("migration should apply");
        tree.into_source()
    }

    #[test]
    fn bare_fork_call_site_becomes_test_kit_fork() {
        let output = migrated(concat!(
            "import { fork } from \"effector\";\n\n",
            "it(\"works\", async () => {\n",
            "  const scope = fork();\n",
            "});\n",
        ));

        // The blank line that grouped the kit import away from the (now
        // removed) effector import survives at the top; the prettier
        // post-pass collapses it on real runs.
        assert_eq!(
            output,
            concat!(
                "\n",
                "import { createTestKit } from \"&test_utils/test_kit\";\n",
                "\n",
                "const testKit = await createTestKit({\n",
                "\timportMetaUrl: import.meta.url\n",
                "});\n\n",
                "it(\"works\", async () => {\n",
                "  const { scope } = testKit.fork();\n",
                "});\n",
            )
        );
    }

    #[test]
    fn map_arguments_are_flattened_into_the_mocks_provider() {
        let output = migrated(concat!(
            "import { fork } from \"effector\";\n\n",
            "it(\"works\", async () => {\n",
            "  const scope = fork(new Map([[loadFx, () => []]]));\n",
            "});\n",
        ));

        assert!(
            output.contains(
                "const { scope } = testKit.fork({\n\tmocks: () => [\n\t\t[[loadFx, () => []]]\n\t]\n});"
            ),
            "got:\n{output}"
        );
        assert!(!output.contains("new Map"));
    }

    #[test]
    fn typed_map_arguments_keep_their_entries_only() {
        let output = migrated(concat!(
            "import { fork } from \"effector\";\n\n",
            "it(\"works\", async () => {\n",
            "  const scope = fork({ handlers: new Map<Effect, Handler>([[loadFx, mock]]) });\n",
            "});\n",
        ));

        assert!(
            output.contains("mocks: () => [\n\t\t{ handlers: [[loadFx, mock]] }\n\t]"),
            "got:\n{output}"
        );
    }

    #[test]
    fn fork_import_is_removed_and_other_named_imports_survive() {
        let output = migrated(concat!(
            "import { allSettled, fork } from \"effector\";\n\n",
            "it(\"works\", async () => {\n",
            "  const scope = fork();\n",
            "});\n",
        ));

        assert!(output.contains("import { allSettled } from \"effector\";"));
        assert!(!output.contains("fork } from \"effector\""));
    }

    #[test]
    fn kit_import_groups_with_internal_imports() {
        let output = migrated(concat!(
            "import { allSettled, fork } from \"effector\";\n",
            "import { api } from \"&shared/api\";\n",
            "import { helper } from \"./helper\";\n\n",
            "it(\"works\", async () => {\n",
            "  const scope = fork();\n",
            "});\n",
        ));

        assert!(
            output.contains(concat!(
                "import { allSettled } from \"effector\";\n",
                "\n",
                "import { createTestKit } from \"&test_utils/test_kit\";\n",
                "import { api } from \"&shared/api\";\n",
                "import { helper } from \"./helper\";\n",
            )),
            "got:\n{output}"
        );
    }

    #[test]
    fn kit_import_starts_its_own_group_before_relative_imports() {
        let output = migrated(concat!(
            "import { allSettled, fork } from \"effector\";\n",
            "import { helper } from \"./helper\";\n\n",
            "it(\"works\", async () => {\n",
            "  const scope = fork();\n",
            "});\n",
        ));

        assert!(
            output.contains(concat!(
                "import { allSettled } from \"effector\";\n",
                "\n",
                "import { createTestKit } from \"&test_utils/test_kit\";\n",
                "\n",
                "import { helper } from \"./helper\";\n",
            )),
            "got:\n{output}"
        );
    }

    #[test]
    fn migrating_twice_is_a_structural_no_op() {
        let input = concat!(
            "import { fork } from \"effector\";\n\n",
            "it(\"works\", async () => {\n",
            "  const scope = fork();\n",
            "});\n",
        );
        let first = migrated(input);

        let mut tree = parse(&first);
        let changed = migrate(&mut tree).expect("second pass should run");

        assert!(!changed, "second pass must not edit the tree");
        assert_eq!(tree.source(), first);
    }

    #[test]
    fn unrelated_statements_and_comments_are_untouched() {
        let output = migrated(concat!(
            "import { fork } from \"effector\";\n\n",
            "// aligns the clock before every case\n",
            "beforeEach(() => {\n",
            "  vi.useFakeTimers();\n",
            "});\n\n",
            "it(\"works\", async () => {\n",
            "  const scope = fork();\n",
            "  expect(scope).toBeDefined();\n",
            "});\n",
        ));

        assert!(output.contains("// aligns the clock before every case\n"));
        assert!(output.contains("beforeEach(() => {\n  vi.useFakeTimers();\n});"));
        assert!(output.contains("expect(scope).toBeDefined();"));
    }

    #[test]
    fn declaration_bound_to_another_name_is_left_alone() {
        let input = concat!(
            "import { fork } from \"effector\";\n\n",
            "it(\"works\", async () => {\n",
            "  const context = fork();\n",
            "});\n",
        );
        let output = migrated(input);

        // The kit is still injected and the import still removed, but the
        // unrecognized call site is preserved for manual follow-up.
        assert!(output.contains("const context = fork();"));
        assert!(output.contains("const testKit = await createTestKit"));
    }
}
