//! The high-level command API: one method per Mercurial operation, mapping
//! typed options to an argv (via [`crate::args`]) and a typed return value
//! (via [`crate::parsers`]).
//!
//! Every method here follows the same shape: build an argv starting with
//! the command name, append flags, call
//! [`Session::get_command_output`](crate::session::Session::get_command_output),
//! apply the operation's exit-code policy, then parse.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};

use crate::args::{add_date_if, add_if, add_pair_if_nonempty};
use crate::error::HgError;
use crate::parsers;
use crate::session::{apply_exit_policy, Session};
use crate::types::{ArchiveType, FileStatus, Revision};

/// Options for [`Session::status`].
#[derive(Debug, Clone, Default)]
pub struct StatusOptions {
    /// Status categories to include. An empty vector requests the
    /// server's default set; [`FileStatus::All`] requests every status.
    pub types: Vec<FileStatus>,
    /// Restrict the report to these paths. Empty means the whole tree.
    pub files: Vec<String>,
}

/// Options for [`Session::log`], [`Session::heads`], [`Session::incoming`],
/// [`Session::outgoing`] and [`Session::parents`].
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// `--rev` revision set expression.
    pub rev: Option<String>,
    /// `--branch` filter.
    pub branch: Option<String>,
    /// `--user` filter.
    pub user: Option<String>,
    /// `--limit` cap on the number of entries returned.
    pub limit: Option<u32>,
    /// Restrict the report to these paths.
    pub files: Vec<String>,
    /// `--follow`: follow renames/copies.
    pub follow: bool,
}

/// Options for [`Session::commit`].
#[derive(Debug, Clone, Default)]
pub struct CommitOptions {
    /// Commit message. Empty means the server will prompt (only sensible
    /// with an input provider registered).
    pub message: String,
    /// `--user` override.
    pub user: Option<String>,
    /// `--date` override.
    pub date: Option<DateTime<FixedOffset>>,
    /// `--addremove`: automatically track new/missing files.
    pub addremove: bool,
    /// `--close-branch`.
    pub close_branch: bool,
    /// Restrict the commit to these paths.
    pub files: Vec<String>,
}

/// Options for [`Session::merge`].
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// `--rev` to merge with. Defaults to the server picking automatically.
    pub rev: Option<String>,
    /// `--force`.
    pub force: bool,
    /// `--tool` override.
    pub tool: Option<String>,
}

/// Options for [`Session::pull`].
#[derive(Debug, Clone, Default)]
pub struct PullOptions {
    /// Source to pull from. Defaults to the repository's configured path.
    pub source: Option<String>,
    /// `--rev` to pull up to.
    pub rev: Option<String>,
    /// `--update`: update the working copy after pulling.
    pub update: bool,
    /// `--force`.
    pub force: bool,
}

/// Options for [`Session::push`].
#[derive(Debug, Clone, Default)]
pub struct PushOptions {
    /// Destination to push to. Defaults to the repository's configured
    /// path.
    pub destination: Option<String>,
    /// `--rev` to push up to.
    pub rev: Option<String>,
    /// `--force`.
    pub force: bool,
    /// `--new-branch`.
    pub new_branch: bool,
}

/// Options for [`Session::update`].
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// `--rev` to update to. Defaults to the tipmost head of the current
    /// branch.
    pub rev: Option<String>,
    /// `--clean`: discard uncommitted changes.
    pub clean: bool,
    /// `--check`: abort instead of merging if there are uncommitted
    /// changes.
    pub check: bool,
}

/// Options for [`Session::revert`].
#[derive(Debug, Clone, Default)]
pub struct RevertOptions {
    /// `--rev` to revert to. Defaults to the parent revision.
    pub rev: Option<String>,
    /// `--all`.
    pub all: bool,
    /// `--no-backup`: don't save `.orig` files.
    pub no_backup: bool,
}

/// Options for [`Session::rename`].
#[derive(Debug, Clone, Default)]
pub struct RenameOptions {
    /// `--force`: overwrite an existing destination.
    pub force: bool,
    /// `--after`: record a rename that already happened on disk.
    pub after: bool,
}

/// Options for [`Session::export`].
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// `--output` filename pattern. Defaults to stdout.
    pub output: Option<String>,
    /// `--git`: use the git extended diff format.
    pub git: bool,
}

/// Options for [`Session::diff`].
#[derive(Debug, Clone, Default)]
pub struct DiffOptions {
    /// `--rev` entries (zero, one, or two).
    pub rev: Vec<String>,
    /// `--change`: show the diff for a single changeset.
    pub change: Option<String>,
    /// `--git`.
    pub git: bool,
    /// Restrict the diff to these paths.
    pub files: Vec<String>,
}

/// Options for [`Session::archive`].
#[derive(Debug, Clone, Default)]
pub struct ArchiveOptions {
    /// `--rev` to archive. Defaults to the working copy's parent.
    pub rev: Option<String>,
    /// `--type`.
    pub archive_type: ArchiveType,
    /// `--prefix`.
    pub prefix: Option<String>,
}

/// Options for [`Session::cat`].
#[derive(Debug, Clone, Default)]
pub struct CatOptions {
    /// `--rev` to read the files at. Defaults to the working copy.
    pub rev: Option<String>,
}

/// Options for [`Session::annotate`].
#[derive(Debug, Clone, Default)]
pub struct AnnotateOptions {
    /// `--rev` to annotate at.
    pub rev: Option<String>,
    /// `--user`: annotate with the author instead of the revision.
    pub user: bool,
    /// `--date`: annotate with the commit date.
    pub date: bool,
}

/// Options for [`Session::resolve`].
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// `--mark`: mark files as resolved without merging.
    pub mark: bool,
    /// `--unmark`: mark files as unresolved.
    pub unmark: bool,
    /// `--tool` override.
    pub tool: Option<String>,
    /// Restrict to these paths. Empty means every outstanding conflict.
    pub files: Vec<String>,
}

impl Session {
    /// `hg status`. Returns a map of path to [`FileStatus`].
    pub fn status(&self, options: StatusOptions) -> Result<HashMap<String, FileStatus>, HgError> {
        let mut argv = vec!["status".to_string()];
        for status in &options.types {
            if let Some(flag) = status.flag() {
                add_if(&mut argv, true, flag);
            }
        }
        add_if(
            &mut argv,
            options.types.contains(&FileStatus::All),
            "--all",
        );
        argv.extend(options.files.iter().cloned());

        let result = self.get_command_output(&argv)?;
        apply_exit_policy(&result, &[0])?;
        Ok(parsers::parse_status(&result.stdout))
    }

    /// `hg log --style xml`. Returns revisions in document (newest-first by
    /// default) order.
    pub fn log(&self, options: LogOptions) -> Result<Vec<Revision>, HgError> {
        let result = self.run_xml_log("log", &options)?;
        apply_exit_policy(&result, &[0])?;
        parsers::parse_log(&result.stdout)
    }

    /// `hg heads --style xml`.
    pub fn heads(&self, options: LogOptions) -> Result<Vec<Revision>, HgError> {
        let result = self.run_xml_log("heads", &options)?;
        apply_exit_policy(&result, &[0, 1])?;
        parsers::parse_log(&result.stdout)
    }

    /// `hg parents --style xml`.
    pub fn parents(&self, options: LogOptions) -> Result<Vec<Revision>, HgError> {
        let result = self.run_xml_log("parents", &options)?;
        apply_exit_policy(&result, &[0])?;
        parsers::parse_log(&result.stdout)
    }

    /// `hg incoming --style xml`.
    pub fn incoming(&self, options: LogOptions) -> Result<Vec<Revision>, HgError> {
        let result = self.run_xml_log("incoming", &options)?;
        apply_exit_policy(&result, &[0, 1])?;
        if result.exit_code == 1 {
            return Ok(Vec::new());
        }
        parsers::parse_log(&result.stdout)
    }

    /// `hg outgoing --style xml`.
    pub fn outgoing(&self, options: LogOptions) -> Result<Vec<Revision>, HgError> {
        let result = self.run_xml_log("outgoing", &options)?;
        apply_exit_policy(&result, &[0])?;
        parsers::parse_log(&result.stdout)
    }

    fn run_xml_log(
        &self,
        command: &str,
        options: &LogOptions,
    ) -> Result<crate::types::CommandResult, HgError> {
        let mut argv = vec![command.to_string(), "--style".to_string(), "xml".to_string()];
        add_pair_if_nonempty(&mut argv, "--rev", options.rev.as_deref().unwrap_or(""));
        add_pair_if_nonempty(
            &mut argv,
            "--branch",
            options.branch.as_deref().unwrap_or(""),
        );
        add_pair_if_nonempty(&mut argv, "--user", options.user.as_deref().unwrap_or(""));
        if let Some(limit) = options.limit {
            argv.push("--limit".to_string());
            argv.push(limit.to_string());
        }
        add_if(&mut argv, options.follow, "--follow");
        argv.extend(options.files.iter().cloned());

        self.get_command_output(&argv)
    }

    /// `hg add`.
    pub fn add(&self, files: &[String]) -> Result<(), HgError> {
        let mut argv = vec!["add".to_string()];
        argv.extend(files.iter().cloned());

        let result = self.get_command_output(&argv)?;
        apply_exit_policy(&result, &[0])
    }

    /// `hg forget`. `files` must be non-empty.
    pub fn forget(&self, files: &[String]) -> Result<(), HgError> {
        require_nonempty(files, "forget requires at least one file")?;

        let mut argv = vec!["forget".to_string()];
        argv.extend(files.iter().cloned());

        let result = self.get_command_output(&argv)?;
        apply_exit_policy(&result, &[0])
    }

    /// `hg remove`. `files` must be non-empty.
    pub fn remove(&self, files: &[String], force: bool) -> Result<(), HgError> {
        require_nonempty(files, "remove requires at least one file")?;

        let mut argv = vec!["remove".to_string()];
        add_if(&mut argv, force, "--force");
        argv.extend(files.iter().cloned());

        let result = self.get_command_output(&argv)?;
        apply_exit_policy(&result, &[0])
    }

    /// `hg revert`.
    pub fn revert(&self, files: &[String], options: RevertOptions) -> Result<(), HgError> {
        let mut argv = vec!["revert".to_string()];
        add_pair_if_nonempty(&mut argv, "--rev", options.rev.as_deref().unwrap_or(""));
        add_if(&mut argv, options.all, "--all");
        add_if(&mut argv, options.no_backup, "--no-backup");
        argv.extend(files.iter().cloned());

        let result = self.get_command_output(&argv)?;
        apply_exit_policy(&result, &[0])
    }

    /// `hg rename`/`hg move`.
    pub fn rename(
        &self,
        source: &str,
        destination: &str,
        options: RenameOptions,
    ) -> Result<(), HgError> {
        let mut argv = vec!["rename".to_string()];
        add_if(&mut argv, options.force, "--force");
        add_if(&mut argv, options.after, "--after");
        argv.push(source.to_string());
        argv.push(destination.to_string());

        let result = self.get_command_output(&argv)?;
        apply_exit_policy(&result, &[0])
    }

    /// `hg export`. `revisions` must be non-empty. Returns the patch text.
    pub fn export(&self, revisions: &[String], options: ExportOptions) -> Result<String, HgError> {
        require_nonempty(revisions, "export requires at least one revision")?;

        let mut argv = vec!["export".to_string()];
        add_pair_if_nonempty(&mut argv, "--output", options.output.as_deref().unwrap_or(""));
        add_if(&mut argv, options.git, "--git");
        argv.extend(revisions.iter().cloned());

        let result = self.get_command_output(&argv)?;
        apply_exit_policy(&result, &[0])?;
        Ok(result.stdout)
    }

    /// `hg annotate`. Returns the raw annotated text.
    pub fn annotate(&self, files: &[String], options: AnnotateOptions) -> Result<String, HgError> {
        let mut argv = vec!["annotate".to_string()];
        add_pair_if_nonempty(&mut argv, "--rev", options.rev.as_deref().unwrap_or(""));
        add_if(&mut argv, options.user, "--user");
        add_if(&mut argv, options.date, "--date");
        argv.extend(files.iter().cloned());

        let result = self.get_command_output(&argv)?;
        apply_exit_policy(&result, &[0])?;
        Ok(result.stdout)
    }

    /// `hg diff`. Returns the raw unified-diff text.
    pub fn diff(&self, options: DiffOptions) -> Result<String, HgError> {
        let mut argv = vec!["diff".to_string()];
        for rev in &options.rev {
            add_pair_if_nonempty(&mut argv, "--rev", rev);
        }
        add_pair_if_nonempty(&mut argv, "--change", options.change.as_deref().unwrap_or(""));
        add_if(&mut argv, options.git, "--git");
        argv.extend(options.files.iter().cloned());

        let result = self.get_command_output(&argv)?;
        apply_exit_policy(&result, &[0])?;
        Ok(result.stdout)
    }

    /// `hg archive`. `destination` must be non-empty.
    pub fn archive(&self, destination: &str, options: ArchiveOptions) -> Result<(), HgError> {
        if destination.is_empty() {
            return Err(HgError::InvalidArgument(
                "archive requires a non-empty destination".to_string(),
            ));
        }

        let mut argv = vec!["archive".to_string()];
        add_pair_if_nonempty(&mut argv, "--rev", options.rev.as_deref().unwrap_or(""));
        add_pair_if_nonempty(
            &mut argv,
            "--type",
            options.archive_type.as_arg().unwrap_or(""),
        );
        add_pair_if_nonempty(&mut argv, "--prefix", options.prefix.as_deref().unwrap_or(""));
        argv.push(destination.to_string());

        let result = self.get_command_output(&argv)?;
        apply_exit_policy(&result, &[0])
    }

    /// `hg cat`, issued once per file. `files` must be non-empty. Returns a
    /// map of path to file content at the requested revision.
    pub fn cat(
        &self,
        files: &[String],
        options: CatOptions,
    ) -> Result<HashMap<String, String>, HgError> {
        require_nonempty(files, "cat requires at least one file")?;

        let mut contents = HashMap::with_capacity(files.len());
        for file in files {
            let mut argv = vec!["cat".to_string()];
            add_pair_if_nonempty(&mut argv, "--rev", options.rev.as_deref().unwrap_or(""));
            argv.push(file.clone());

            let result = self.get_command_output(&argv)?;
            apply_exit_policy(&result, &[0])?;
            contents.insert(file.clone(), result.stdout);
        }
        Ok(contents)
    }

    /// `hg summary`. Returns the raw summary text.
    pub fn summary(&self) -> Result<String, HgError> {
        let result = self.get_command_output(&["summary".to_string()])?;
        apply_exit_policy(&result, &[0])?;
        Ok(result.stdout)
    }

    /// `hg commit`. Returns `true` if a changeset was created, `false` if
    /// exit code 1 ("nothing changed") was reported.
    pub fn commit(&self, options: CommitOptions) -> Result<bool, HgError> {
        let mut argv = vec!["commit".to_string()];
        add_pair_if_nonempty(&mut argv, "--message", &options.message);
        add_pair_if_nonempty(&mut argv, "--user", options.user.as_deref().unwrap_or(""));
        add_date_if(&mut argv, "--date", options.date.as_ref());
        add_if(&mut argv, options.addremove, "--addremove");
        add_if(&mut argv, options.close_branch, "--close-branch");
        argv.extend(options.files.iter().cloned());

        let result = self.get_command_output(&argv)?;
        apply_exit_policy(&result, &[0, 1])?;
        Ok(result.exit_code == 0)
    }

    /// `hg merge`. Returns `true` on a clean merge, `false` if exit code 1
    /// (unresolved conflicts) was reported.
    pub fn merge(&self, options: MergeOptions) -> Result<bool, HgError> {
        let mut argv = vec!["merge".to_string()];
        add_pair_if_nonempty(&mut argv, "--rev", options.rev.as_deref().unwrap_or(""));
        add_if(&mut argv, options.force, "--force");
        add_pair_if_nonempty(&mut argv, "--tool", options.tool.as_deref().unwrap_or(""));

        let result = self.get_command_output(&argv)?;
        apply_exit_policy(&result, &[0, 1])?;
        Ok(result.exit_code == 0)
    }

    /// `hg pull`. Returns `true` on exit code 0, `false` on exit code 1
    /// (nothing to pull).
    pub fn pull(&self, options: PullOptions) -> Result<bool, HgError> {
        let mut argv = vec!["pull".to_string()];
        add_pair_if_nonempty(&mut argv, "--rev", options.rev.as_deref().unwrap_or(""));
        add_if(&mut argv, options.update, "--update");
        add_if(&mut argv, options.force, "--force");
        if let Some(source) = options.source.filter(|s| !s.is_empty()) {
            argv.push(source);
        }

        let result = self.get_command_output(&argv)?;
        apply_exit_policy(&result, &[0, 1])?;
        Ok(result.exit_code == 0)
    }

    /// `hg push`. Returns `true` on exit code 0, `false` on exit code 1
    /// (nothing to push).
    pub fn push(&self, options: PushOptions) -> Result<bool, HgError> {
        let mut argv = vec!["push".to_string()];
        add_pair_if_nonempty(&mut argv, "--rev", options.rev.as_deref().unwrap_or(""));
        add_if(&mut argv, options.force, "--force");
        add_if(&mut argv, options.new_branch, "--new-branch");
        if let Some(destination) = options.destination.filter(|d| !d.is_empty()) {
            argv.push(destination);
        }

        let result = self.get_command_output(&argv)?;
        apply_exit_policy(&result, &[0, 1])?;
        Ok(result.exit_code == 0)
    }

    /// `hg update`. Returns `true` on exit code 0, `false` on exit code 1
    /// (unresolved files after the update).
    pub fn update(&self, options: UpdateOptions) -> Result<bool, HgError> {
        let mut argv = vec!["update".to_string()];
        add_pair_if_nonempty(&mut argv, "--rev", options.rev.as_deref().unwrap_or(""));
        add_if(&mut argv, options.clean, "--clean");
        add_if(&mut argv, options.check, "--check");

        let result = self.get_command_output(&argv)?;
        apply_exit_policy(&result, &[0, 1])?;
        Ok(result.exit_code == 0)
    }

    /// `hg rollback`. Returns whether the rollback succeeded, regardless of
    /// exit code.
    pub fn rollback(&self) -> Result<bool, HgError> {
        let result = self.get_command_output(&["rollback".to_string()])?;
        Ok(result.exit_code == 0)
    }

    /// `hg paths`. Returns a map of path alias to URL.
    pub fn paths(&self) -> Result<HashMap<String, String>, HgError> {
        let result = self.get_command_output(&["paths".to_string()])?;
        apply_exit_policy(&result, &[0])?;
        Ok(parsers::parse_kv(&result.stdout, &["="]))
    }

    /// `hg resolve --list`. Returns a map of path to resolved state.
    pub fn resolve(&self, options: ResolveOptions) -> Result<HashMap<String, bool>, HgError> {
        let mut argv = vec!["resolve".to_string(), "--list".to_string()];
        add_if(&mut argv, options.mark, "--mark");
        add_if(&mut argv, options.unmark, "--unmark");
        add_pair_if_nonempty(&mut argv, "--tool", options.tool.as_deref().unwrap_or(""));
        argv.extend(options.files.iter().cloned());

        let result = self.get_command_output(&argv)?;
        apply_exit_policy(&result, &[0])?;
        Ok(parsers::parse_resolve(&result.stdout))
    }
}

fn require_nonempty(items: &[String], message: &str) -> Result<(), HgError> {
    if items.is_empty() {
        Err(HgError::InvalidArgument(message.to_string()))
    } else {
        Ok(())
    }
}
