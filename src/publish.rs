//! Publishing: branch retention on the fork and release uploads.
use chrono::Local;
use log::*;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{
    forge::{
        traits::Forge,
        types::{CreateReleaseRequest, Release},
    },
    report::{self, FAILED_SECTION, MERGED_SECTION},
    result::Result,
};

/// Select generated branches to delete, keeping the newest `keep`.
///
/// Only branches starting with `{prefix}-` are considered. The embedded
/// date suffix is zero-padded, so sorting the full name lexicographically
/// orders the matching branches chronologically.
pub fn select_branches_to_prune(
    names: &[String],
    prefix: &str,
    keep: usize,
) -> Vec<String> {
    let pattern = format!("{prefix}-");

    let mut matching: Vec<String> = names
        .iter()
        .filter(|name| name.starts_with(&pattern))
        .cloned()
        .collect();

    matching.sort();

    if matching.len() <= keep {
        return vec![];
    }

    let cutoff = matching.len() - keep;
    matching.truncate(cutoff);
    matching
}

/// Delete generated branches on the fork beyond the retention count.
/// Individual delete failures are logged and do not abort the batch.
pub async fn prune_branches(
    forge: &dyn Forge,
    prefix: &str,
    keep: usize,
) -> Result<usize> {
    let branches = forge.list_branches().await?;
    let names: Vec<String> =
        branches.into_iter().map(|branch| branch.name).collect();

    let doomed = select_branches_to_prune(&names, prefix, keep);

    if doomed.is_empty() {
        info!("no generated branches beyond retention of {keep}");
        return Ok(0);
    }

    info!(
        "pruning {} generated branch(es) beyond retention of {keep}",
        doomed.len()
    );

    let mut deleted = 0;
    for name in doomed {
        match forge.delete_branch(&name).await {
            Ok(()) => {
                info!("deleted old branch: {name}");
                deleted += 1;
            }
            Err(err) => warn!("could not delete branch {name}: {err}"),
        }
    }

    Ok(deleted)
}

/// Find the artifact files to attach to a release: `*.zip` files in the
/// dist directory, optionally filtered by a platform substring.
pub fn collect_artifacts(
    dist_dir: &Path,
    platform: Option<&str>,
) -> Result<Vec<PathBuf>> {
    let mut artifacts: Vec<PathBuf> = fs::read_dir(dist_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension().and_then(|ext| ext.to_str()) == Some("zip")
        })
        .filter(|path| match platform {
            Some(platform) => path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.contains(platform)),
            None => true,
        })
        .collect();

    artifacts.sort();
    Ok(artifacts)
}

/// Markdown body for the release, summarizing the build report.
pub fn release_body(tag: &str, report_content: Option<&str>) -> String {
    let date = Local::now().format("%Y-%m-%d");
    let mut body = format!(
        "# Weekly Integration Build {tag} - {date}\n\n\
         Automated build with the latest open pull requests merged onto the \
         integration branch.\n"
    );

    if let Some(content) = report_content {
        let merged = report::pr_numbers_in_section(content, MERGED_SECTION);
        let failed = report::pr_numbers_in_section(content, FAILED_SECTION);

        body.push_str(&format!(
            "\n## Build Statistics\n\
             - Successfully merged: {}\n\
             - Failed to merge: {}\n",
            merged.len(),
            failed.len()
        ));

        if !merged.is_empty() {
            body.push_str("\n## Included Pull Requests\n");
            for number in &merged {
                body.push_str(&format!("- PR #{number}\n"));
            }
        }

        body.push_str(
            "\nThe full merge report is attached as a release asset.\n",
        );
    }

    body.push_str(
        "\nThis is a development build and may contain experimental \
         features. Use at your own risk.\n",
    );

    body
}

/// Create the release for the given tag, or reuse it if it already exists.
pub async fn ensure_release(
    forge: &dyn Forge,
    tag: &str,
    name: &str,
    body: String,
) -> Result<Release> {
    if let Some(existing) = forge.get_release_by_tag(tag).await? {
        info!("release already exists: {}", existing.html_url);
        return Ok(existing);
    }

    let release = forge
        .create_release(CreateReleaseRequest {
            tag_name: tag.to_string(),
            target_commitish: "main".to_string(),
            name: name.to_string(),
            body,
            draft: false,
            prerelease: true,
        })
        .await?;

    info!("created release: {}", release.html_url);
    Ok(release)
}

/// Upload files as release assets, skipping any that already exist.
/// Returns the number of assets uploaded.
pub async fn upload_assets(
    forge: &dyn Forge,
    release_id: u64,
    files: &[PathBuf],
) -> Result<usize> {
    let existing: BTreeSet<String> = forge
        .list_release_assets(release_id)
        .await?
        .into_iter()
        .map(|asset| asset.name)
        .collect();

    let mut uploaded = 0;

    for file in files {
        let Some(name) = file.file_name().and_then(|name| name.to_str())
        else {
            continue;
        };

        if existing.contains(name) {
            info!("asset {name} already exists, skipping upload");
            continue;
        }

        forge.upload_release_asset(release_id, name, file).await?;
        uploaded += 1;
    }

    Ok(uploaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::traits::MockForge;
    use crate::forge::types::{Branch, ReleaseAsset};
    use mockall::predicate::eq;
    use tempfile::TempDir;

    fn branch_names(range: std::ops::Range<u32>) -> Vec<String> {
        range
            .map(|i| format!("weekly-build-0.8.4-alpha2608{i:02}"))
            .collect()
    }

    #[test]
    fn keeps_newest_branches_by_embedded_date() {
        let names = branch_names(1..36);
        let doomed = select_branches_to_prune(&names, "weekly-build", 30);

        assert_eq!(doomed.len(), names.len() - 30);
        // oldest dates go first
        assert_eq!(doomed[0], "weekly-build-0.8.4-alpha260801");
        assert!(doomed.iter().all(|name| name < &names[5]));
    }

    #[test]
    fn ignores_branches_outside_the_pattern() {
        let mut names = branch_names(1..5);
        names.push("main".to_string());
        names.push("feature/something".to_string());

        let doomed = select_branches_to_prune(&names, "weekly-build", 2);
        assert_eq!(doomed.len(), 2);
        assert!(doomed.iter().all(|name| name.starts_with("weekly-build-")));
    }

    #[test]
    fn prunes_nothing_at_or_below_retention() {
        let names = branch_names(1..31);
        assert!(
            select_branches_to_prune(&names, "weekly-build", 30).is_empty()
        );
    }

    #[tokio::test]
    async fn prune_tolerates_individual_delete_failures() {
        let names = branch_names(1..34);

        let mut mock_forge = MockForge::new();
        let listed = names.clone();
        mock_forge.expect_list_branches().times(1).returning(move || {
            Ok(listed
                .iter()
                .map(|name| Branch { name: name.clone() })
                .collect())
        });

        mock_forge
            .expect_delete_branch()
            .with(eq("weekly-build-0.8.4-alpha260801"))
            .times(1)
            .returning(|_| {
                Err(color_eyre::eyre::eyre!("reference does not exist"))
            });
        mock_forge
            .expect_delete_branch()
            .times(2)
            .returning(|_| Ok(()));

        let deleted =
            prune_branches(&mock_forge, "weekly-build", 30).await.unwrap();
        assert_eq!(deleted, 2);
    }

    #[test]
    fn collects_only_matching_zip_artifacts() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("addon-linux-x64.zip"), "a").unwrap();
        fs::write(dir.path().join("addon-windows-x64.zip"), "b").unwrap();
        fs::write(dir.path().join("notes.txt"), "c").unwrap();

        let all = collect_artifacts(dir.path(), None).unwrap();
        assert_eq!(all.len(), 2);

        let linux =
            collect_artifacts(dir.path(), Some("linux-x64")).unwrap();
        assert_eq!(linux.len(), 1);
        assert!(linux[0].to_string_lossy().contains("linux-x64"));
    }

    #[test]
    fn release_body_summarizes_report() {
        let report_content = "\
## Successfully Merged PRs (2)

- **PR #10**: A
- **PR #12**: B

## Failed to Merge PRs (1)

- **PR #11**: C
";
        let body =
            release_body("v0.8.4-alpha260808", Some(report_content));
        assert!(body.contains("- Successfully merged: 2"));
        assert!(body.contains("- Failed to merge: 1"));
        assert!(body.contains("- PR #10"));
        assert!(body.contains("- PR #12"));
    }

    #[tokio::test]
    async fn upload_skips_existing_assets() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("one.zip");
        let second = dir.path().join("two.zip");
        fs::write(&first, "1").unwrap();
        fs::write(&second, "2").unwrap();

        let mut mock_forge = MockForge::new();
        mock_forge
            .expect_list_release_assets()
            .with(eq(7))
            .times(1)
            .returning(|_| {
                Ok(vec![ReleaseAsset {
                    name: "one.zip".into(),
                }])
            });
        mock_forge
            .expect_upload_release_asset()
            .withf(|_, name, _| name == "two.zip")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let uploaded = upload_assets(
            &mock_forge,
            7,
            &[first, second],
        )
        .await
        .unwrap();
        assert_eq!(uploaded, 1);
    }
}
