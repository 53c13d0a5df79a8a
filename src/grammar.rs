/// Tree-sitter grammar resolution for markdown and fenced code languages.
use tree_sitter::Language;

/// Display names of the languages `language_for_fence` can check, with their tags.
pub const CHECKED_LANGUAGES: [(&str, &str); 6] = [
    ("JavaScript / JSX", "javascript js jsx mjs cjs tsx"),
    ("TypeScript", "typescript ts"),
    ("Bash", "bash sh shell zsh"),
    ("Go", "go golang"),
    ("Python", "python py"),
    ("Rust", "rust rs"),
];

/// The markdown block grammar used to parse every corpus file.
pub fn markdown() -> Language {
    return tree_sitter_md::LANGUAGE.into();
}

/// Map a fence language tag to the grammar used to syntax-check its examples.
/// Returns `None` for tags without a grammar (json, yaml, html, text, ...),
/// which are never syntax-checked.
pub fn language_for_fence(tag: &str) -> Option<Language> {
    return match tag.to_lowercase().as_str() {
        // Plain JavaScript snippets often contain JSX, which only the TSX grammar accepts.
        "cjs" | "javascript" | "js" | "jsx" | "mjs" | "tsx" => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
        "bash" | "sh" | "shell" | "zsh" => Some(tree_sitter_bash::LANGUAGE.into()),
        "go" | "golang" => Some(tree_sitter_go::LANGUAGE.into()),
        "py" | "python" => Some(tree_sitter_python::LANGUAGE.into()),
        "rs" | "rust" => Some(tree_sitter_rust::LANGUAGE.into()),
        "ts" | "typescript" => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        _ => None,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tags_have_grammars() {
        for tag in ["javascript", "JS", "ts", "bash", "python", "rust", "go"] {
            assert!(language_for_fence(tag).is_some(), "{tag} should have a grammar");
        }
    }

    #[test]
    fn data_formats_are_not_checked() {
        for tag in ["json", "yaml", "html", "text", ""] {
            assert!(language_for_fence(tag).is_none(), "{tag} should not have a grammar");
        }
    }
}
