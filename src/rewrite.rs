//! Case-variant token rewriting over a working tree.
//!
//! A single [`RenameConfig`] rule expands into three word-bounded rewrite
//! rules (lower, Capitalized, UPPER), applied by one generic engine to file
//! contents, filenames, and directory names. The engine is best-effort and
//! regex-based: word boundaries keep it from touching unrelated tokens in
//! the common cases, but no semantic correctness is guaranteed.
use log::*;
use regex::{NoExpand, Regex};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::{config::RenameConfig, result::Result};

/// Extensions never rewritten (binary or archive content).
const DENYLIST_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "ico", "blend", "whl", "zip", "gz", "tar",
    "exe", "dll", "so", "dylib", "pyc", "ttf", "woff", "woff2", "pdf",
];

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RewriteStats {
    pub files_changed: usize,
    pub entries_renamed: usize,
}

struct Rule {
    pattern: Regex,
    replacement: String,
}

/// Token rewrite engine built from a rename rule.
pub struct Rewriter {
    /// Word-bounded token → token+suffix rules, one per case variant.
    rules: Vec<Rule>,
    /// Collapses double-application artifacts (token+suffix+suffix).
    cleanups: Vec<Rule>,
    /// Lowercased rewritten token, used as the idempotence guard.
    guard: String,
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            first.to_uppercase().collect::<String>()
                + &chars.as_str().to_lowercase()
        }
        None => String::new(),
    }
}

impl Rewriter {
    pub fn new(rule: &RenameConfig) -> Result<Self> {
        let token = rule.token.to_lowercase();
        let suffix = rule.suffix.clone();

        let variants = [
            (token.clone(), suffix.clone()),
            (capitalize(&token), suffix.clone()),
            (token.to_uppercase(), suffix.to_uppercase()),
        ];

        let mut rules = vec![];
        let mut cleanups = vec![];

        for (variant_token, variant_suffix) in variants {
            let replacement = format!("{variant_token}{variant_suffix}");

            rules.push(Rule {
                pattern: Regex::new(&format!(
                    r"\b{}\b",
                    regex::escape(&variant_token)
                ))?,
                replacement: replacement.clone(),
            });

            cleanups.push(Rule {
                pattern: Regex::new(&regex::escape(&format!(
                    "{replacement}{variant_suffix}"
                )))?,
                replacement,
            });
        }

        Ok(Self {
            rules,
            cleanups,
            guard: format!("{token}{}", suffix.to_lowercase()),
        })
    }

    /// Rewrite a string of file content. Returns None when nothing changed.
    ///
    /// The cleanup pass always runs; the rewrite pass is skipped for content
    /// that already contains the rewritten token, which makes a second
    /// application a no-op.
    pub fn rewrite_content(&self, content: &str) -> Option<String> {
        let mut result = content.to_string();

        for cleanup in &self.cleanups {
            result = cleanup
                .pattern
                .replace_all(&result, NoExpand(&cleanup.replacement))
                .to_string();
        }

        if !result.to_lowercase().contains(&self.guard) {
            for rule in &self.rules {
                result = rule
                    .pattern
                    .replace_all(&result, NoExpand(&rule.replacement))
                    .to_string();
            }
        }

        if result == content { None } else { Some(result) }
    }

    /// Rewrite a single path component. Returns None when nothing changed.
    pub fn rewrite_name(&self, name: &str) -> Option<String> {
        let mut result = name.to_string();

        for cleanup in &self.cleanups {
            result = cleanup
                .pattern
                .replace_all(&result, NoExpand(&cleanup.replacement))
                .to_string();
        }

        for rule in &self.rules {
            result = rule
                .pattern
                .replace_all(&result, NoExpand(&rule.replacement))
                .to_string();
        }

        if result == name { None } else { Some(result) }
    }

    /// Rewrite file contents, then filenames and directory names, under the
    /// given root. Renames are processed deepest-path-first so parent paths
    /// stay valid throughout the walk. Unreadable entries are skipped.
    pub fn rewrite_tree(&self, root: &Path) -> Result<RewriteStats> {
        let mut stats = RewriteStats::default();

        for entry in WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();

            if let Some(ext) = path.extension().and_then(|e| e.to_str())
                && DENYLIST_EXTENSIONS.contains(&ext.to_lowercase().as_str())
            {
                continue;
            }

            let bytes = match fs::read(path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    debug!("skipping unreadable file {}: {err}", path.display());
                    continue;
                }
            };

            let Ok(content) = String::from_utf8(bytes) else {
                debug!("skipping non-utf8 file {}", path.display());
                continue;
            };

            if let Some(rewritten) = self.rewrite_content(&content) {
                fs::write(path, rewritten)?;
                stats.files_changed += 1;
            }
        }

        // contents_first yields children before their parents, so renaming
        // a directory never invalidates paths still waiting in the walk
        for entry in WalkDir::new(root)
            .contents_first(true)
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git")
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path == root {
                continue;
            }

            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if let Some(new_name) = self.rewrite_name(name) {
                let new_path = path.with_file_name(&new_name);
                debug!(
                    "renaming {} -> {}",
                    path.display(),
                    new_path.display()
                );
                fs::rename(path, new_path)?;
                stats.entries_renamed += 1;
            }
        }

        info!(
            "token rewrite complete: {} file(s) changed, {} entr(ies) renamed",
            stats.files_changed, stats.entries_renamed
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rewriter() -> Rewriter {
        Rewriter::new(&RenameConfig {
            token: "bonsai".into(),
            suffix: "PR".into(),
        })
        .unwrap()
    }

    #[test]
    fn rewrites_all_case_variants() {
        let result = rewriter()
            .rewrite_content("bonsai Bonsai BONSAI")
            .unwrap();
        assert_eq!(result, "bonsaiPR BonsaiPR BONSAIPR");
    }

    #[test]
    fn respects_word_boundaries() {
        assert!(rewriter().rewrite_content("bonsais and unbonsai").is_none());
    }

    #[test]
    fn is_idempotent_on_content() {
        let rewriter = rewriter();
        let first = rewriter.rewrite_content("the bonsai module").unwrap();
        assert_eq!(first, "the bonsaiPR module");
        assert!(rewriter.rewrite_content(&first).is_none());
    }

    #[test]
    fn collapses_double_application_artifacts() {
        let result = rewriter()
            .rewrite_content("bonsaiPRPR BonsaiPRPR BONSAIPRPR")
            .unwrap();
        assert_eq!(result, "bonsaiPR BonsaiPR BONSAIPR");
    }

    #[test]
    fn guard_blocks_rewrite_when_new_token_present() {
        // mixed content: the already-rewritten token suppresses the pass
        assert!(
            rewriter()
                .rewrite_content("bonsai next to bonsaiPR")
                .is_none()
        );
    }

    #[test]
    fn renames_names_idempotently() {
        let rewriter = rewriter();
        assert_eq!(
            rewriter.rewrite_name("bonsai").unwrap(),
            "bonsaiPR".to_string()
        );
        assert!(rewriter.rewrite_name("bonsaiPR").is_none());
        assert_eq!(
            rewriter.rewrite_name("bonsaiPRPR").unwrap(),
            "bonsaiPR".to_string()
        );
    }

    #[test]
    fn rewrites_tree_contents_and_paths() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        std::fs::create_dir_all(root.join("src/bonsai")).unwrap();
        std::fs::write(
            root.join("src/bonsai/bonsai.py"),
            "import bonsai\n",
        )
        .unwrap();
        std::fs::write(root.join("README.md"), "The Bonsai add-on\n")
            .unwrap();
        // deny-listed extension keeps its content
        std::fs::write(root.join("logo.png"), "bonsai").unwrap();

        let stats = rewriter().rewrite_tree(root).unwrap();

        assert_eq!(stats.files_changed, 2);
        assert_eq!(stats.entries_renamed, 2);

        let moved = root.join("src/bonsaiPR/bonsaiPR.py");
        assert_eq!(
            std::fs::read_to_string(&moved).unwrap(),
            "import bonsaiPR\n"
        );
        assert_eq!(
            std::fs::read_to_string(root.join("README.md")).unwrap(),
            "The BonsaiPR add-on\n"
        );
        assert_eq!(
            std::fs::read_to_string(root.join("logo.png")).unwrap(),
            "bonsai"
        );
    }

    #[test]
    fn second_tree_pass_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        std::fs::create_dir_all(root.join("bonsai")).unwrap();
        std::fs::write(root.join("bonsai/core.py"), "from bonsai import x\n")
            .unwrap();

        let rewriter = rewriter();
        rewriter.rewrite_tree(root).unwrap();
        let stats = rewriter.rewrite_tree(root).unwrap();

        assert_eq!(stats, RewriteStats::default());
    }
}
