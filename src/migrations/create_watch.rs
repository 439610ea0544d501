use tree_sitter::Node;

use crate::error::KitmigError;
use crate::matchers::{self, CREATE_WATCH_SYMBOL};
use crate::tree::{Edit, SourceTree};

/// Replaces `createWatch({ unit, fn })` registrations with derived watcher
/// bindings: `watcher` is appended to the test-kit fork destructuring, the
/// separate `vi.fn()` declaration disappears, and each registration becomes
/// `const <fn> = watcher(<unit>);` right after the fork declaration.
pub fn migrate(tree: &mut SourceTree) -> Result<bool, KitmigError> {
    if matchers::effector_import(tree).is_none() {
        return Ok(false);
    }

    // Rewrites never add or remove test cases, so indices stay stable across
    // mutation batches.
    let total_cases = matchers::test_case_bodies(tree).len();
    let mut rewritten_any = false;
    for case_index in 0..total_cases {
        rewritten_any |= migrate_test_case(tree, case_index)?;
    }

    // The import goes away only once no registration is left anywhere;
    // occurrences this rule could not resolve keep it as a manual-follow-up
    // signal.
    if rewritten_any
        && !has_remaining_create_watch(tree)
        && let Some(import) = matchers::effector_import(tree)
        && let Some(edit) = matchers::remove_named_import_edit(&import, CREATE_WATCH_SYMBOL)
    {
        tree.apply(vec![edit])?;
    }

    Ok(rewritten_any)
}

fn migrate_test_case(tree: &mut SourceTree, case_index: usize) -> Result<bool, KitmigError> {
    let mut skipped = 0usize;
    let mut inserted = 0usize;

    loop {
        let plan = {
            let Some(block) = nth_test_case_block(tree, case_index) else {
                break;
            };
            let statements = create_watch_statements(tree, block);
            let Some(statement) = statements.get(skipped).copied() else {
                break;
            };
            let is_last = statements.len() - skipped == 1;
            plan_occurrence(tree, block, statement, inserted == 0, is_last)
        };

        match plan {
            Some(edits) => {
                tree.apply(edits)?;
                inserted += 1;
            }
            None => skipped += 1,
        }
    }

    if inserted > 0 && skipped == 0 {
        remove_unused_scope_binding(tree, case_index)?;
    }

    Ok(inserted > 0)
}

/// Edits for one registration, or None when the occurrence deviates from the
/// expected shape (missing `unit`/`fn` field, `fn` not a plain identifier,
/// no enclosing test-kit fork declaration).
fn plan_occurrence(
    tree: &SourceTree,
    block: Node<'_>,
    statement: Node<'_>,
    is_first: bool,
    is_last: bool,
) -> Option<Vec<Edit>> {
    let call = statement.named_child(0)?;
    let arguments = call.child_by_field_name("arguments")?;
    let mut cursor = arguments.walk();
    let object = arguments
        .named_children(&mut cursor)
        .find(|argument| argument.kind() == "object")?;

    let unit = tree.node_text(matchers::object_field_value(tree, object, "unit")?);
    let tracker = matchers::object_field_value(tree, object, "fn")?;
    if tracker.kind() != "identifier" {
        return None;
    }
    let tracker_name = tree.node_text(tracker);

    let fork = matchers::test_kit_fork_declaration(tree, block)?;

    let mut edits = Vec::new();
    if let Some(edit) = append_watcher_binding(tree, fork.pattern) {
        edits.push(edit);
    }
    if let Some(declaration) = mock_factory_declaration(tree, block, tracker_name) {
        edits.push(Edit::remove(tree.statement_lines(declaration)));
    }
    edits.push(Edit::remove(tree.statement_lines(statement)));

    let anchor = last_watcher_declaration(tree, block).unwrap_or(fork.statement);
    let offset = tree.line_end(anchor.end_byte());
    let indent = tree.indentation_of(anchor.start_byte());

    let mut text = String::new();
    if is_first {
        text.push('\n');
    }
    text.push_str(&format!("{indent}const {tracker_name} = watcher({unit});\n"));
    if is_last {
        text.push('\n');
    }
    edits.push(Edit::insert(offset, text));

    Some(edits)
}

/// `, watcher` appended to the binding pattern, unless already bound.
fn append_watcher_binding(tree: &SourceTree, pattern: Node<'_>) -> Option<Edit> {
    let mut cursor = pattern.walk();
    let bindings: Vec<Node<'_>> = pattern.named_children(&mut cursor).collect();

    if bindings
        .iter()
        .any(|binding| tree.node_text(*binding) == "watcher")
    {
        return None;
    }

    match bindings.last() {
        Some(last) => Some(Edit::insert(last.end_byte(), ", watcher")),
        None => Some(Edit::replace(pattern.byte_range(), "{ watcher }")),
    }
}

/// Direct `createWatch(...)` expression statements of a test body.
fn create_watch_statements<'t>(tree: &'t SourceTree, block: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = block.walk();
    block
        .named_children(&mut cursor)
        .filter(|statement| {
            statement.kind() == "expression_statement"
                && statement.named_child(0).is_some_and(|expression| {
                    expression.kind() == "call_expression"
                        && expression
                            .child_by_field_name("function")
                            .is_some_and(|callee| tree.node_text(callee) == CREATE_WATCH_SYMBOL)
                })
        })
        .collect()
}

/// The redundant `const <name> = vi.fn();` (or `vitest.fn()`) declaration
/// for a tracker the new idiom derives implicitly.
fn mock_factory_declaration<'t>(
    tree: &'t SourceTree,
    block: Node<'t>,
    name: &str,
) -> Option<Node<'t>> {
    let mut cursor = block.walk();

    block.named_children(&mut cursor).find(|statement| {
        if statement.kind() != "lexical_declaration"
            || !tree.node_text(*statement).starts_with("const ")
        {
            return false;
        }
        let mut declarators = statement.walk();
        statement.named_children(&mut declarators).any(|declarator| {
            if declarator.kind() != "variable_declarator" {
                return false;
            }
            let named = declarator
                .child_by_field_name("name")
                .is_some_and(|binding| {
                    binding.kind() == "identifier" && tree.node_text(binding) == name
                });
            let factory_call = declarator.child_by_field_name("value").is_some_and(|value| {
                value.kind() == "call_expression"
                    && value.child_by_field_name("function").is_some_and(|callee| {
                        matches!(tree.node_text(callee), "vi.fn" | "vitest.fn")
                    })
                    && value
                        .child_by_field_name("arguments")
                        .is_some_and(|arguments| arguments.named_child_count() == 0)
            });
            named && factory_call
        })
    })
}

/// The last `const <name> = watcher(...)` declaration already in the block,
/// used to keep newly derived trackers in registration order.
fn last_watcher_declaration<'t>(tree: &'t SourceTree, block: Node<'t>) -> Option<Node<'t>> {
    let mut cursor = block.walk();

    block
        .named_children(&mut cursor)
        .filter(|statement| {
            if statement.kind() != "lexical_declaration" {
                return false;
            }
            let mut declarators = statement.walk();
            statement.named_children(&mut declarators).any(|declarator| {
                declarator.kind() == "variable_declarator"
                    && declarator.child_by_field_name("value").is_some_and(|value| {
                        value.kind() == "call_expression"
                            && value
                                .child_by_field_name("function")
                                .is_some_and(|callee| tree.node_text(callee) == "watcher")
                    })
            })
        })
        .last()
}

/// Drops `scope` from the fork destructuring once nothing in the test body
/// references it anymore.
fn remove_unused_scope_binding(
    tree: &mut SourceTree,
    case_index: usize,
) -> Result<bool, KitmigError> {
    let edit = {
        let Some(block) = nth_test_case_block(tree, case_index) else {
            return Ok(false);
        };
        let Some(fork) = matchers::test_kit_fork_declaration(tree, block) else {
            return Ok(false);
        };

        let mut cursor = fork.pattern.walk();
        let bindings: Vec<String> = fork
            .pattern
            .named_children(&mut cursor)
            .map(|binding| tree.node_text(binding).to_string())
            .collect();
        if !bindings.iter().any(|binding| binding == "scope") {
            return Ok(false);
        }

        let pattern_range = fork.pattern.byte_range();
        let referenced = matchers::descendants(block).into_iter().any(|node| {
            !pattern_range.contains(&node.start_byte())
                && matches!(node.kind(), "identifier" | "shorthand_property_identifier")
                && tree.node_text(node) == "scope"
        });
        if referenced {
            return Ok(false);
        }

        let remaining: Vec<String> = bindings
            .into_iter()
            .filter(|binding| binding != "scope")
            .collect();
        let replacement = if remaining.is_empty() {
            "{}".to_string()
        } else {
            format!("{{ {} }}", remaining.join(", "))
        };
        Edit::replace(pattern_range, replacement)
    };

    tree.apply(vec![edit])
}

fn nth_test_case_block<'t>(tree: &'t SourceTree, case_index: usize) -> Option<Node<'t>> {
    matchers::test_case_bodies(tree).into_iter().nth(case_index)
}

fn has_remaining_create_watch(tree: &SourceTree) -> bool {
    matchers::descendants(tree.root()).into_iter().any(|node| {
        node.kind() == "call_expression"
            && node
                .child_by_field_name("function")
                .is_some_and(|callee| tree.node_text(callee) == CREATE_WATCH_SYMBOL)
    })
}
