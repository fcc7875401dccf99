//! Build report rendering and parsing.
//!
//! The report is a plain-text document with a fixed section order: header,
//! summary, merged PRs, failed PRs (with reasons), skipped PRs (with
//! reasons), developer instructions. [`pr_numbers_in_section`] reads PR
//! numbers back out of a section, which the release publisher uses to
//! summarize a previous build.
use chrono::{DateTime, Local};
use log::*;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::{
    merge::{MergeOutcome, MergeSummary},
    result::Result,
    retest::RetestOutcome,
};

pub const MERGED_SECTION: &str = "Successfully Merged PRs";
pub const FAILED_SECTION: &str = "Failed to Merge PRs";
pub const SKIPPED_SECTION: &str = "Skipped PRs";

/// Everything needed to render a build report. Created once after the merge
/// and retest phases complete; never mutated after.
pub struct BuildReport<'a> {
    pub branch: String,
    pub source_commit: String,
    pub fork_url: String,
    pub clone_url: String,
    pub base_ref: String,
    pub generated_at: DateTime<Local>,
    pub summary: &'a MergeSummary,
    pub retests: &'a HashMap<u64, RetestOutcome>,
}

impl BuildReport<'_> {
    /// Render the full report document.
    pub fn render(&self) -> String {
        let applied = self.summary.applied();
        let failed = self.summary.failed();
        let skipped = self.summary.skipped();
        let total = self.summary.records.len();

        let mut out = String::new();

        let _ = writeln!(out, "# Weekly Integration Build Report");
        let _ = writeln!(
            out,
            "Generated: {}",
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        );
        let _ = writeln!(out, "Branch: {}", self.branch);
        let _ = writeln!(out, "Source commit: {}", self.source_commit);
        let _ = writeln!(out, "Fork repository: {}", self.fork_url);
        let _ = writeln!(out);

        let conflicts_with_others = failed
            .iter()
            .filter(|r| {
                self.retests.get(&r.pr.number)
                    == Some(&RetestOutcome::ConflictsWithOthers)
            })
            .count();
        let fails_against_base = failed
            .iter()
            .filter(|r| {
                self.retests.get(&r.pr.number)
                    == Some(&RetestOutcome::FailsAgainstBase)
            })
            .count();
        let not_retested =
            failed.len() - conflicts_with_others - fails_against_base;

        let _ = writeln!(out, "## Summary");
        let _ = writeln!(out, "- Total PRs processed: {total}");
        let _ = writeln!(out, "- Successfully merged: {}", applied.len());
        let _ = writeln!(out, "- Failed to merge: {}", failed.len());
        let _ = writeln!(
            out,
            "- Skipped (draft/repo issues): {}",
            skipped.len()
        );
        let _ = writeln!(
            out,
            "- Failed to merge (conflicts with other PRs): {conflicts_with_others}"
        );
        let _ = writeln!(
            out,
            "- Failed to merge (fails against base {}): {fails_against_base}",
            self.base_ref
        );
        let _ = writeln!(
            out,
            "- Failed to merge (not retested): {not_retested}"
        );
        let _ = writeln!(out, "- Success Rate: {}", success_rate(applied.len(), total));
        let _ = writeln!(out);

        if !applied.is_empty() {
            let _ = writeln!(
                out,
                "## {MERGED_SECTION} ({})\n",
                applied.len()
            );
            for record in &applied {
                let pr = &record.pr;
                let _ = writeln!(out, "- **PR #{}**: {}", pr.number, pr.title);
                let _ = writeln!(out, "  - Author: {}", pr.user.login);
                let _ = writeln!(out, "  - URL: {}", pr.html_url);
                let _ = writeln!(
                    out,
                    "  - Created: {}\n",
                    created_date(&pr.created_at)
                );
            }
        }

        if !failed.is_empty() {
            let _ =
                writeln!(out, "## {FAILED_SECTION} ({})\n", failed.len());
            for record in &failed {
                let pr = &record.pr;
                let reason = match self.retests.get(&pr.number) {
                    Some(outcome)
                        if *outcome != RetestOutcome::Unknown =>
                    {
                        outcome.to_string()
                    }
                    _ => match &record.outcome {
                        MergeOutcome::Failed { reason } => reason.clone(),
                        _ => "Unknown error".to_string(),
                    },
                };
                let _ = writeln!(out, "- **PR #{}**: {}", pr.number, pr.title);
                let _ = writeln!(out, "  - Author: {}", pr.user.login);
                let _ = writeln!(out, "  - URL: {}", pr.html_url);
                let _ = writeln!(out, "  - Reason: {reason}\n");
            }
        }

        if !skipped.is_empty() {
            let _ =
                writeln!(out, "## {SKIPPED_SECTION} ({})\n", skipped.len());
            for record in &skipped {
                let pr = &record.pr;
                let reason = match &record.outcome {
                    MergeOutcome::Skipped(reason) => reason.to_string(),
                    _ => "Unknown".to_string(),
                };
                let _ = writeln!(out, "- **PR #{}**: {}", pr.number, pr.title);
                let _ = writeln!(out, "  - Author: {}", pr.user.login);
                let _ = writeln!(out, "  - URL: {}", pr.html_url);
                let _ = writeln!(out, "  - Reason: {reason}\n");
            }
        }

        let _ = writeln!(out, "## Developer Instructions\n");
        let _ = writeln!(out, "To use this branch for development:\n");
        let _ = writeln!(out, "```bash");
        let _ = writeln!(out, "git clone {}", self.clone_url);
        let _ = writeln!(out, "git checkout {}", self.branch);
        let _ = writeln!(out, "```\n");
        let _ = writeln!(
            out,
            "This branch contains {} with {} merged community pull requests. \
             PR authors can use it to test their changes against each other.",
            self.base_ref,
            applied.len()
        );

        out
    }

    /// Render and write the report to the given path, creating parent
    /// directories as needed.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        info!("writing report to {}", path.display());
        fs::write(path, self.render())?;
        Ok(())
    }
}

/// Date portion of an RFC 3339 timestamp.
fn created_date(timestamp: &str) -> &str {
    timestamp.get(..10).unwrap_or(timestamp)
}

/// Success rate as a percentage string, or "N/A" when nothing was processed.
fn success_rate(applied: usize, total: usize) -> String {
    if total == 0 {
        return "N/A".to_string();
    }
    format!("{:.1}%", applied as f64 / total as f64 * 100.0)
}

/// Extract the PR numbers listed in a named report section. Reading stops at
/// the next section header.
pub fn pr_numbers_in_section(
    content: &str,
    section_title: &str,
) -> BTreeSet<u64> {
    let pr_line = Regex::new(r"\*\*PR #(\d+)\*\*").expect("valid regex");
    let mut numbers = BTreeSet::new();
    let mut in_section = false;

    for line in content.lines() {
        if line.starts_with("## ") {
            in_section = line[3..].starts_with(section_title);
            continue;
        }

        if in_section
            && let Some(captures) = pr_line.captures(line)
            && let Ok(number) = captures[1].parse::<u64>()
        {
            numbers.insert(number);
        }
    }

    numbers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::types::PullRequest;
    use crate::merge::{MergeRecord, SkipReason};
    use crate::test_helpers;

    fn record(pr: PullRequest, outcome: MergeOutcome) -> MergeRecord {
        MergeRecord { pr, outcome }
    }

    fn fixture_summary() -> MergeSummary {
        let fixture = test_helpers::MergeFixture::new();
        MergeSummary {
            records: vec![
                record(
                    fixture.pull_request(10, "pr-10"),
                    MergeOutcome::Applied,
                ),
                record(
                    fixture.pull_request(11, "pr-11"),
                    MergeOutcome::Failed {
                        reason: "Merge conflict or git error".into(),
                    },
                ),
                record(
                    fixture.pull_request(12, "pr-12"),
                    MergeOutcome::Applied,
                ),
                record(
                    test_helpers::pull_request_without_fork(14),
                    MergeOutcome::Skipped(SkipReason::InaccessibleFork),
                ),
            ],
        }
    }

    fn report<'a>(
        summary: &'a MergeSummary,
        retests: &'a HashMap<u64, RetestOutcome>,
    ) -> BuildReport<'a> {
        BuildReport {
            branch: "weekly-build-0.8.4-alpha260808".into(),
            source_commit: "abc123def456".into(),
            fork_url: "https://github.com/fork/repo/tree/weekly-build".into(),
            clone_url: "https://github.com/fork/repo.git".into(),
            base_ref: "v0.8.0".into(),
            generated_at: Local::now(),
            summary,
            retests,
        }
    }

    #[test]
    fn sections_appear_in_fixed_order() {
        let summary = fixture_summary();
        let retests = HashMap::new();
        let rendered = report(&summary, &retests).render();

        let header = rendered.find("# Weekly Integration Build Report");
        let summary_idx = rendered.find("## Summary");
        let merged = rendered.find(&format!("## {MERGED_SECTION}"));
        let failed = rendered.find(&format!("## {FAILED_SECTION}"));
        let skipped = rendered.find(&format!("## {SKIPPED_SECTION}"));
        let instructions = rendered.find("## Developer Instructions");

        let order = [header, summary_idx, merged, failed, skipped, instructions];
        assert!(order.iter().all(|i| i.is_some()));
        assert!(order.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn failed_reason_comes_from_retest_outcome() {
        let summary = fixture_summary();
        let retests =
            HashMap::from([(11, RetestOutcome::ConflictsWithOthers)]);
        let rendered = report(&summary, &retests).render();

        assert!(rendered.contains(
            "Reason: Merges cleanly against base (conflict with other PRs)"
        ));
        assert!(rendered.contains(
            "- Failed to merge (conflicts with other PRs): 1"
        ));
    }

    #[test]
    fn success_rate_handles_empty_and_zero_cases() {
        assert_eq!(success_rate(0, 0), "N/A");
        assert_eq!(success_rate(0, 4), "0.0%");
        assert_eq!(success_rate(2, 4), "50.0%");
        assert_eq!(success_rate(2, 3), "66.7%");
    }

    #[test]
    fn renders_na_rate_for_empty_run() {
        let summary = MergeSummary::default();
        let retests = HashMap::new();
        let rendered = report(&summary, &retests).render();

        assert!(rendered.contains("- Total PRs processed: 0"));
        assert!(rendered.contains("- Success Rate: N/A"));
        // no empty section headers
        assert!(!rendered.contains(MERGED_SECTION));
        assert!(!rendered.contains(FAILED_SECTION));
    }

    #[test]
    fn parses_pr_numbers_back_out_of_sections() {
        let summary = fixture_summary();
        let retests =
            HashMap::from([(11, RetestOutcome::ConflictsWithOthers)]);
        let rendered = report(&summary, &retests).render();

        let merged = pr_numbers_in_section(&rendered, MERGED_SECTION);
        let failed = pr_numbers_in_section(&rendered, FAILED_SECTION);
        let skipped = pr_numbers_in_section(&rendered, SKIPPED_SECTION);

        assert_eq!(merged, BTreeSet::from([10, 12]));
        assert_eq!(failed, BTreeSet::from([11]));
        assert_eq!(skipped, BTreeSet::from([14]));
    }

    #[test]
    fn section_parse_stops_at_next_header() {
        let content = "\
## Successfully Merged PRs (1)

- **PR #100**: First

## Failed to Merge PRs (1)

- **PR #101**: Second
";
        let merged = pr_numbers_in_section(content, MERGED_SECTION);
        assert_eq!(merged, BTreeSet::from([100]));
    }
}
