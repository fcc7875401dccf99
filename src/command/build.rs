//! Full pipeline command: sync, merge, retest, report, publish.
use chrono::Local;
use log::*;

use crate::{
    cli::Args,
    config::Config,
    forge::{github::Github, traits::Forge},
    merge,
    publish,
    repo::Repository,
    report::BuildReport,
    result::Result,
    retest,
    rewrite::Rewriter,
    state,
};

/// Run the full integration build.
///
/// Phase order matters: the working tree is a single shared resource, and
/// every phase starts from a branch this function checked out explicitly.
pub async fn execute(
    args: &Args,
    reverse: bool,
    force: bool,
    no_push: bool,
) -> Result<()> {
    let config = Config::load(&args.config)?;
    let upstream = args.upstream_remote()?;
    let fork = args.fork_remote()?;

    let forge = Github::new(upstream.clone())?;

    info!(
        "starting integration build for {} (base {})",
        upstream.path, config.base_ref
    );

    let prs = forge.list_open_prs(&config.authors).await?;

    if !force {
        let changed = state::check_and_update(
            &config.state_file,
            &prs,
            &config.excluded_prs,
        )?;
        if !changed {
            info!("no PR changes since last run: nothing to do");
            return Ok(());
        }
    } else {
        info!("forced build: skipping change detection");
    }

    let date_stamp = Local::now().format("%y%m%d").to_string();
    let branch = config.branch_name(&date_stamp);
    let report_path = config.report_path(&date_stamp);

    // phase: repository sync
    let repo = Repository::open_or_clone(
        &config.clone_dir,
        fork.clone(),
        &upstream.clone_url(),
    )?;
    repo.sync_to_base(&config.base_ref)?;
    let base_branch = ensure_local_base(&repo, &config.base_ref)?;
    let source_commit = repo.head_sha()?;

    // phase: sequential merge onto the integration branch
    let mut prs = prs;
    prs.sort_by_key(|pr| pr.number);
    if reverse {
        prs.reverse();
    }

    let summary =
        merge::apply_prs(&repo, &branch, &prs, &config.excluded_prs)?;

    // phase: isolation retest of the failures
    let failed: Vec<&crate::forge::types::PullRequest> =
        summary.failed().iter().map(|record| &record.pr).collect();
    let retests = retest::retest_failed(&repo, &base_branch, &failed)?;

    // retesting leaves the tree on base; the remaining phases work on the
    // integration branch
    repo.switch_branch(&branch)?;

    // phase: optional token rename, committed onto the integration branch
    if let Some(rename) = &config.rename {
        let rewriter = Rewriter::new(rename)?;
        rewriter.rewrite_tree(repo.workdir()?)?;
        repo.add_all()?;
        repo.commit(&format!(
            "Apply {} -> {}{} rename",
            rename.token, rename.token, rename.suffix
        ))?;
    }

    // phase: report
    let build_report = BuildReport {
        branch: branch.clone(),
        source_commit,
        fork_url: fork.branch_url(&branch),
        clone_url: fork.clone_url(),
        base_ref: config.base_ref.clone(),
        generated_at: Local::now(),
        summary: &summary,
        retests: &retests,
    };
    build_report.write(&report_path)?;

    if no_push {
        info!("skipping push and prune (--no-push)");
        return Ok(());
    }

    // phase: publish
    repo.push_branch(&branch)?;
    info!("pushed branch {branch} to {}", fork.branch_url(&branch));

    let fork_forge = Github::new(fork)?;
    publish::prune_branches(
        &fork_forge,
        &config.branch_prefix,
        config.branch_retention,
    )
    .await?;

    info!(
        "build complete: {} merged, {} failed, {} skipped; report at {}",
        summary.applied().len(),
        summary.failed().len(),
        summary.skipped().len(),
        report_path.display()
    );

    Ok(())
}

/// Make sure a local branch exists at the synced base state and return its
/// name. Works for tag bases too, which have no branch of their own.
fn ensure_local_base(repo: &Repository, base_ref: &str) -> Result<String> {
    let base_branch = format!("base-{base_ref}");
    // force-moves the branch to HEAD, so a leftover from a previous run is
    // simply repositioned
    repo.create_branch(&base_branch)?;
    repo.switch_branch(&base_branch)?;
    Ok(base_branch)
}
