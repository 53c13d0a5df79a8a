/// Whitespace-insensitive content hashing of markdown documents via tree-sitter.
use std::path::Path;

use sha2::{Digest as _, Sha256};
use tree_sitter::{Node, Parser};

use crate::error::Error;
use crate::grammar;

/// A content hash: 64 hex chars, always lowercase.
/// Newtype prevents mixing with arbitrary strings.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContentHash(
    /// The hex-encoded SHA-256 digest string.
    pub String,
);

/// Recursively collect leaf token text, skipping HTML comments and
/// collapsing internal whitespace.
fn collect_content_tokens(node: Node<'_>, source: &str, tokens: &mut Vec<String>) {
    let text = node.utf8_text(source.as_bytes()).unwrap_or("");

    // Editorial comments never change what readers see.
    if node.kind() == "html_block" && text.trim_start().starts_with("<!--") {
        return;
    }

    // Inline and code content are opaque to the block grammar; only zero-width
    // continuation markers hang off them.
    if node.child_count() == 0 || matches!(node.kind(), "code_fence_content" | "inline") {
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !normalized.is_empty() {
            tokens.push(normalized);
        }
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_content_tokens(child, source, tokens);
    }
}

/// Compute the content hash of a markdown document.
///
/// Normalization: parse the whole file, walk leaf nodes, drop HTML comment
/// blocks, collapse whitespace inside each leaf, join the leaves with single
/// spaces, then SHA-256 the result. Reflowing a paragraph or changing blank
/// lines does not change the hash.
///
/// # Errors
///
/// Returns `Error::ParseFailed` if tree-sitter cannot parse the document.
pub fn hash_document(path: &Path, source: &str) -> Result<ContentHash, Error> {
    let mut parser = Parser::new();
    parser.set_language(&grammar::markdown()).map_err(|err| {
        return Error::ParseFailed {
            file: path.to_path_buf(),
            reason: err.to_string(),
        };
    })?;

    let tree = parser.parse(source, None).ok_or_else(|| {
        return Error::ParseFailed {
            file: path.to_path_buf(),
            reason: "hash parse failed".to_string(),
        };
    })?;

    let mut tokens = Vec::new();
    collect_content_tokens(tree.root_node(), source, &mut tokens);
    let hash = Sha256::digest(tokens.join(" ").as_bytes());

    return Ok(ContentHash(format!("{hash:x}")));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(source: &str) -> ContentHash {
        return hash_document(Path::new("doc.md"), source).unwrap();
    }

    #[test]
    fn hash_is_lowercase_hex() {
        let h = hash("# Title\n");
        assert_eq!(h.0.len(), 64);
        assert!(h.0.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn reflowing_prose_keeps_hash() {
        let a = hash("# Promises\n\nA promise is a value\nthat settles later.\n");
        let b = hash("# Promises\n\n\nA promise is a value that settles later.\n");
        assert_eq!(a, b);
    }

    #[test]
    fn html_comments_are_ignored() {
        let a = hash("# Promises\n\nBody.\n");
        let b = hash("# Promises\n\n<!-- TODO: add diagrams -->\n\nBody.\n");
        assert_eq!(a, b);
    }

    #[test]
    fn wording_changes_hash() {
        assert_ne!(hash("# Promises\n\nBody.\n"), hash("# Promises\n\nOther body.\n"));
    }
}
