//! Finding compilable documents in a working copy.

use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use intexration_utils::segment::validate_segment;

static DOCUMENT_CLASS: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*\\documentclass\s*[\[{]"));

/// Names of the top-level `*.tex` files in `dir` that declare a `\documentclass`.
///
/// Commented-out declarations do not count. Names that are not valid identifier
/// segments are skipped. The result is sorted.
#[must_use]
pub fn discover_documents(dir: &Path) -> Vec<String> {
    let pattern = match &*DOCUMENT_CLASS {
        Ok(re) => re,
        Err(e) => {
            tracing::error!(error = %e, "Document pattern failed to compile");
            return Vec::new();
        }
    };

    let Ok(entries) = fs::read_dir(dir) else {
        tracing::warn!(path = %dir.display(), "Working copy is not readable");
        return Vec::new();
    };

    let mut names: Vec<String> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "tex"))
        .filter_map(|p| {
            let content = fs::read_to_string(&p).ok()?;
            if !pattern.is_match(&content) {
                return None;
            }
            let stem = p.file_stem()?.to_str()?;
            match validate_segment(stem) {
                Ok(name) => Some(name),
                Err(e) => {
                    tracing::warn!(path = %p.display(), error = %e, "Skipping document");
                    None
                }
            }
        })
        .collect();

    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_discovers_only_root_documents() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("main.tex"),
            "\\documentclass[a4paper]{article}\n\\begin{document}x\\end{document}\n",
        )
        .unwrap();
        fs::write(
            temp.path().join("slides.tex"),
            "  \\documentclass{beamer}\n",
        )
        .unwrap();
        fs::write(temp.path().join("chapter1.tex"), "\\section{Intro}\n").unwrap();
        fs::write(temp.path().join("notes.md"), "\\documentclass{article}\n").unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        fs::write(
            temp.path().join("sub/other.tex"),
            "\\documentclass{article}\n",
        )
        .unwrap();

        assert_eq!(discover_documents(temp.path()), vec!["main", "slides"]);
    }

    #[test]
    fn test_commented_declaration_ignored() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("draft.tex"),
            "% \\documentclass{article}\n",
        )
        .unwrap();

        assert!(discover_documents(temp.path()).is_empty());
    }

    #[test]
    fn test_option_like_file_name_is_not_a_document() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("-pdflatex=sh pwn.sh;true.tex"),
            "\\documentclass{article}\n",
        )
        .unwrap();
        fs::write(temp.path().join("main.tex"), "\\documentclass{article}\n").unwrap();

        assert_eq!(discover_documents(temp.path()), vec!["main"]);
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let temp = TempDir::new().unwrap();
        assert!(discover_documents(&temp.path().join("nope")).is_empty());
    }
}
