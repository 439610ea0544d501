use std::ops::Range;

use tree_sitter::Node;

use crate::tree::{Edit, SourceTree};

pub const EFFECTOR_MODULE: &str = "effector";
pub const FORK_SYMBOL: &str = "fork";
pub const CREATE_WATCH_SYMBOL: &str = "createWatch";

const TEST_CASE_CALLEES: [&str; 6] = [
    "it",
    "test",
    "it.skip",
    "test.skip",
    "it.concurrent",
    "test.concurrent",
];

const TEST_CASE_EACH_PREFIXES: [&str; 4] = [
    "it.each",
    "test.each",
    "it.concurrent.each",
    "test.concurrent.each",
];

/// True for the callee of a test-case registration call: the plain, `.skip`
/// and `.concurrent` spellings match exactly, the `.each` spellings only when
/// actually invoked with a chained call (strictly longer than the prefix).
pub fn is_test_case_callee(text: &str) -> bool {
    TEST_CASE_CALLEES.contains(&text)
        || TEST_CASE_EACH_PREFIXES
            .iter()
            .any(|prefix| text.starts_with(prefix) && text != *prefix)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedImport {
    /// Full specifier text, alias included, so `fork as f` does not match
    /// a lookup for `fork`.
    pub name: String,
    pub range: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSnapshot {
    /// Full-line span of the import statement, trailing newline included.
    pub statement_range: Range<usize>,
    /// Module specifier with the quote delimiters stripped.
    pub specifier: String,
    pub named: Vec<NamedImport>,
}

impl ImportSnapshot {
    pub fn has_named(&self, name: &str) -> bool {
        self.named.iter().any(|import| import.name == name)
    }
}

/// Owned snapshots of every top-level import declaration, in source order.
pub fn import_snapshots(tree: &SourceTree) -> Vec<ImportSnapshot> {
    let root = tree.root();
    let mut cursor = root.walk();
    let mut snapshots = Vec::new();

    for statement in root.named_children(&mut cursor) {
        if statement.kind() != "import_statement" {
            continue;
        }
        let Some(source) = statement.child_by_field_name("source") else {
            continue;
        };

        let mut named = Vec::new();
        for node in descendants(statement) {
            if node.kind() == "import_specifier" {
                named.push(NamedImport {
                    name: tree.node_text(node).to_string(),
                    range: node.byte_range(),
                });
            }
        }

        snapshots.push(ImportSnapshot {
            statement_range: tree.statement_lines(statement),
            specifier: unquote(tree.node_text(source)).to_string(),
            named,
        });
    }

    snapshots
}

/// The effector import declaration, or none.
pub fn effector_import(tree: &SourceTree) -> Option<ImportSnapshot> {
    import_snapshots(tree)
        .into_iter()
        .find(|import| import.specifier == EFFECTOR_MODULE)
}

/// Edit removing one named import. Removing the sole remaining specifier
/// removes the entire statement line instead of leaving `import {} from ...`.
pub fn remove_named_import_edit(import: &ImportSnapshot, name: &str) -> Option<Edit> {
    let position = import.named.iter().position(|named| named.name == name)?;

    if import.named.len() == 1 {
        return Some(Edit::remove(import.statement_range.clone()));
    }

    let target = &import.named[position];
    let range = match import.named.get(position + 1) {
        // Take the separating comma on the right, or on the left for the
        // last specifier.
        Some(next) => target.range.start..next.range.start,
        None => import.named[position - 1].range.end..target.range.end,
    };
    Some(Edit::remove(range))
}

/// The statement body of every test-case registration call in the file.
pub fn test_case_bodies<'t>(tree: &'t SourceTree) -> Vec<Node<'t>> {
    let mut bodies = Vec::new();

    for node in descendants(tree.root()) {
        if node.kind() != "call_expression" {
            continue;
        }
        let Some(callee) = node.child_by_field_name("function") else {
            continue;
        };
        if !is_test_case_callee(tree.node_text(callee)) {
            continue;
        }
        if let Some(block) = test_callback_block(node) {
            bodies.push(block);
        }
    }

    bodies
}

fn test_callback_block(call: Node<'_>) -> Option<Node<'_>> {
    let arguments = call.child_by_field_name("arguments")?;
    let mut cursor = arguments.walk();

    for argument in arguments.named_children(&mut cursor) {
        if !matches!(argument.kind(), "arrow_function" | "function_expression") {
            continue;
        }
        let body = argument.child_by_field_name("body")?;
        if body.kind() == "statement_block" {
            return Some(body);
        }
    }

    None
}

#[derive(Debug, Clone, Copy)]
pub struct ForkDeclaration<'t> {
    pub statement: Node<'t>,
    pub pattern: Node<'t>,
    pub call: Node<'t>,
}

/// The `const { ... } = testKit.fork(...)` declaration directly inside a test
/// body block, if present.
pub fn test_kit_fork_declaration<'t>(
    tree: &'t SourceTree,
    block: Node<'t>,
) -> Option<ForkDeclaration<'t>> {
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
            let Some(pattern) = declarator.child_by_field_name("name") else {
                continue;
            };
            let Some(value) = declarator.child_by_field_name("value") else {
                continue;
            };
            if pattern.kind() != "object_pattern" || value.kind() != "call_expression" {
                continue;
            }
            let Some(callee) = value.child_by_field_name("function") else {
                continue;
            };
            if tree.node_text(callee).eq_ignore_ascii_case("testkit.fork") {
                return Some(ForkDeclaration {
                    statement,
                    pattern,
                    call: value,
                });
            }
        }
    }

    None
}

/// Value text of a `key: value` property inside an object literal.
pub fn object_field_value<'t>(
    tree: &'t SourceTree,
    object: Node<'t>,
    key: &str,
) -> Option<Node<'t>> {
    let mut cursor = object.walk();

    for entry in object.named_children(&mut cursor) {
        if entry.kind() != "pair" {
            continue;
        }
        let Some(key_node) = entry.child_by_field_name("key") else {
            continue;
        };
        if tree.node_text(key_node) == key {
            return entry.child_by_field_name("value");
        }
    }

    None
}

/// Pre-order traversal of a subtree, root included.
pub fn descendants(root: Node<'_>) -> Vec<Node<'_>> {
    let mut stack = vec![root];
    let mut nodes = Vec::new();

    while let Some(node) = stack.pop() {
        nodes.push(node);
        for index in (0..node.child_count()).rev() {
            if let Some(child) = node.child(index as u32) {
                stack.push(child);
            }
        }
    }

    nodes
}

fn unquote(text: &str) -> &str {
    text.trim_matches(|character| character == '"' || character == '\'')
}
