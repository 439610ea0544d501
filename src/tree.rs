use std::ops::Range;
use std::path::Path;

use tree_sitter::{Node, Parser, Tree};

use crate::error::KitmigError;

/// Grammar selected from the file extension; anything that is not TypeScript
/// falls back to the JavaScript grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grammar {
    TypeScript,
    Tsx,
    JavaScript,
}

impl Grammar {
    fn for_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|value| value.to_str())
            .map(|value| value.to_ascii_lowercase());

        match extension.as_deref() {
            Some("ts" | "mts" | "cts") => Self::TypeScript,
            Some("tsx") => Self::Tsx,
            _ => Self::JavaScript,
        }
    }

    fn language(self) -> tree_sitter::Language {
        match self {
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        }
    }
}

/// A single byte-span replacement against the owned source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub range: Range<usize>,
    pub replacement: String,
}

impl Edit {
    pub fn replace(range: Range<usize>, replacement: impl Into<String>) -> Self {
        Self {
            range,
            replacement: replacement.into(),
        }
    }

    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self {
            range: at..at,
            replacement: text.into(),
        }
    }

    pub fn remove(range: Range<usize>) -> Self {
        Self {
            range,
            replacement: String::new(),
        }
    }
}

/// One file's parsed source, owned together with the parser used to refresh
/// the tree after every mutation batch. Serialization is reading the text
/// back out.
pub struct SourceTree {
    path: String,
    text: String,
    tree: Tree,
    parser: Parser,
}

impl SourceTree {
    pub fn parse(path: &Path, text: String) -> Result<Self, KitmigError> {
        let mut parser = Parser::new();
        parser
            .set_language(&Grammar::for_path(path).language())
            .map_err(|error| KitmigError::LanguageSetup {
                message: error.to_string(),
            })?;

        let path = path.display().to_string();
        let tree = parse_source(&mut parser, &text, &path)?;

        Ok(Self {
            path,
            text,
            tree,
            parser,
        })
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn source(&self) -> &str {
        &self.text
    }

    pub fn into_source(self) -> String {
        self.text
    }

    pub fn node_text(&self, node: Node<'_>) -> &str {
        &self.text[node.byte_range()]
    }

    /// Applies a batch of non-overlapping edits in reverse offset order and
    /// reparses. Returns true iff the batch was non-empty.
    pub fn apply(&mut self, mut edits: Vec<Edit>) -> Result<bool, KitmigError> {
        if edits.is_empty() {
            return Ok(false);
        }

        edits.sort_by_key(|edit| (edit.range.start, edit.range.end));
        for pair in edits.windows(2) {
            if pair[0].range.end > pair[1].range.start {
                return Err(KitmigError::InvalidEdit {
                    message: format!(
                        "spans [{}, {}) and [{}, {}) overlap",
                        pair[0].range.start,
                        pair[0].range.end,
                        pair[1].range.start,
                        pair[1].range.end
                    ),
                });
            }
        }

        for edit in edits.iter().rev() {
            if self.text.get(edit.range.clone()).is_none() {
                return Err(KitmigError::InvalidEdit {
                    message: format!(
                        "span [{}, {}) is not a valid UTF-8 boundary range",
                        edit.range.start, edit.range.end
                    ),
                });
            }
            self.text.replace_range(edit.range.clone(), &edit.replacement);
        }

        self.tree = parse_source(&mut self.parser, &self.text, &self.path)?;
        Ok(true)
    }

    /// Offset of the first byte of the line containing `offset`.
    pub fn line_start(&self, offset: usize) -> usize {
        self.text[..offset]
            .rfind('\n')
            .map(|index| index + 1)
            .unwrap_or(0)
    }

    /// Offset just past the newline that ends the line containing `offset`,
    /// or the end of the text on the final line.
    pub fn line_end(&self, offset: usize) -> usize {
        self.text[offset..]
            .find('\n')
            .map(|index| offset + index + 1)
            .unwrap_or(self.text.len())
    }

    /// Full-line span of a statement, trailing newline included, so removal
    /// does not leave an empty line behind.
    pub fn statement_lines(&self, node: Node<'_>) -> Range<usize> {
        self.line_start(node.start_byte())..self.line_end(node.end_byte())
    }

    /// Leading whitespace of the line containing `offset`.
    pub fn indentation_of(&self, offset: usize) -> &str {
        let start = self.line_start(offset);
        let line = &self.text[start..];
        let indent_len = line
            .find(|character: char| character != ' ' && character != '\t')
            .unwrap_or(line.len());
        &line[..indent_len]
    }
}

fn parse_source(parser: &mut Parser, text: &str, path: &str) -> Result<Tree, KitmigError> {
    let tree = parser
        .parse(text, None)
        .ok_or_else(|| KitmigError::ParseFailure {
            path: path.to_string(),
            message: "Tree-sitter returned no syntax tree".to_string(),
        })?;

    if tree.root_node().has_error() {
        return Err(KitmigError::ParseFailure {
            path: path.to_string(),
            message: "source contains syntax errors".to_string(),
        });
    }

    Ok(tree)
}
