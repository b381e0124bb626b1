// crates/sqlcell-core/src/backup.rs
// ============================================================================
// Module: sqlcell Online Backup
// Description: Page-by-page copy of a live database into another handle.
// Purpose: Produce a consistent snapshot while the source stays usable.
// Dependencies: rusqlite, serde, tracing
// ============================================================================

//! ## Overview
//! A [`BackupJob`] borrows its source immutably and its destination mutably
//! for as long as it runs, so neither handle can be closed mid-copy. Each
//! [`BackupJob::step`] copies up to `pages_per_step` pages. When the engine
//! reports the source busy or locked, [`BackupJob::run`] sleeps with a
//! doubling backoff and resumes from the page it stopped at.
//!
//! Success is reported only after the engine reports the copy complete.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::thread;
use std::time::Instant;

use rusqlite::backup::Backup;
use rusqlite::backup::StepResult;
use serde::Serialize;
use tracing::info;
use tracing::warn;

use crate::config::BackupPolicy;
use crate::config::DatabaseConfig;
use crate::database::Database;
use crate::error::EngineCode;
use crate::error::Result;
use crate::error::SqlcellError;

// ============================================================================
// SECTION: Progress
// ============================================================================

/// Outcome of a single backup step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupStatus {
    /// Every page has been copied.
    Done,
    /// Pages remain to be copied.
    More,
    /// The source was busy or locked; the step copied nothing.
    Busy,
}

/// Snapshot of backup progress.
///
/// # Invariants
/// - `pages_copied` never decreases across steps of one job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackupProgress {
    /// Pages copied so far.
    pub pages_copied: u32,
    /// Pages still to copy.
    pub remaining: u32,
    /// Total pages in the source.
    pub page_count: u32,
    /// Steps performed, busy steps included.
    pub steps: u32,
    /// Busy or locked steps retried.
    pub retries: u32,
}

// ============================================================================
// SECTION: Backup Job
// ============================================================================

/// An in-flight online backup.
pub struct BackupJob<'src, 'dst> {
    /// Engine backup handle.
    backup: Backup<'src, 'dst>,
    /// Pacing and retry policy.
    policy: BackupPolicy,
    /// Consecutive busy steps since the last progress.
    stalls: u32,
    /// Job start time, for the wall-clock limit.
    started: Instant,
    /// Latest progress snapshot.
    progress: BackupProgress,
}

impl<'src, 'dst> BackupJob<'src, 'dst> {
    /// Starts a backup from `source` into `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Invalid`] for an unusable policy,
    /// [`SqlcellError::Interface`] when either handle is closed, and
    /// [`SqlcellError::Operational`] when the engine refuses to start.
    pub fn new(
        source: &'src Database,
        destination: &'dst mut Database,
        policy: BackupPolicy,
    ) -> Result<Self> {
        policy.validate()?;
        let from = source.connection()?;
        let to = destination.connection_mut()?;
        let backup = Backup::new(from, to)?;
        Ok(Self {
            backup,
            policy,
            stalls: 0,
            started: Instant::now(),
            progress: BackupProgress::default(),
        })
    }

    /// Returns the latest progress snapshot.
    #[must_use]
    pub const fn progress(&self) -> BackupProgress {
        self.progress
    }

    /// Copies one batch of pages.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Operational`] when the engine fails the step
    /// with a non-transient error.
    pub fn step(&mut self) -> Result<BackupStatus> {
        self.progress.steps = self.progress.steps.saturating_add(1);
        let status = match self.backup.step(self.policy.pages_per_step) {
            Ok(StepResult::Done) => BackupStatus::Done,
            Ok(StepResult::More) => BackupStatus::More,
            Ok(_) => BackupStatus::Busy,
            Err(err) => {
                let err = SqlcellError::from(err);
                if !err.is_transient() {
                    return Err(err);
                }
                BackupStatus::Busy
            }
        };
        self.refresh_progress();
        Ok(status)
    }

    /// Runs the job to completion.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Operational`] with [`EngineCode::Busy`] once
    /// busy retries are exhausted, with [`EngineCode::Interrupted`] when the
    /// wall-clock limit passes, or with the engine's code on other failures.
    pub fn run(&mut self) -> Result<BackupProgress> {
        self.run_with_observer(|_| {})
    }

    /// Runs the job to completion, calling `observer` after every step.
    ///
    /// # Errors
    ///
    /// See [`BackupJob::run`].
    pub fn run_with_observer<F>(&mut self, mut observer: F) -> Result<BackupProgress>
    where
        F: FnMut(&BackupProgress),
    {
        loop {
            let status = self.step()?;
            observer(&self.progress);
            match status {
                BackupStatus::Done => {
                    info!(
                        pages = self.progress.page_count,
                        steps = self.progress.steps,
                        retries = self.progress.retries,
                        "backup completed"
                    );
                    return Ok(self.progress);
                }
                BackupStatus::More => {
                    self.stalls = 0;
                    self.check_deadline()?;
                }
                BackupStatus::Busy => {
                    self.stalls = self.stalls.saturating_add(1);
                    if self.stalls > self.policy.max_busy_retries {
                        return Err(SqlcellError::operational(
                            EngineCode::Busy,
                            format!("backup stayed busy for {} steps", self.stalls),
                        ));
                    }
                    self.check_deadline()?;
                    let delay = self.policy.backoff(self.stalls);
                    self.progress.retries = self.progress.retries.saturating_add(1);
                    warn!(
                        attempt = self.stalls,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        remaining = self.progress.remaining,
                        "backup step busy, retrying"
                    );
                    thread::sleep(delay);
                }
            }
        }
    }

    /// Updates the progress snapshot from the engine counters.
    fn refresh_progress(&mut self) {
        let counters = self.backup.progress();
        let remaining = u32::try_from(counters.remaining).unwrap_or(0);
        let page_count = u32::try_from(counters.pagecount).unwrap_or(0);
        let copied = page_count.saturating_sub(remaining);
        self.progress.remaining = remaining;
        self.progress.page_count = page_count;
        self.progress.pages_copied = self.progress.pages_copied.max(copied);
    }

    /// Fails once the wall-clock limit has passed.
    fn check_deadline(&self) -> Result<()> {
        let Some(limit) = self.policy.timeout() else {
            return Ok(());
        };
        if self.started.elapsed() > limit {
            return Err(SqlcellError::operational(
                EngineCode::Interrupted,
                format!("backup exceeded {} ms", limit.as_millis()),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Handle Entry Points
// ============================================================================

impl Database {
    /// Copies this database into `destination` with the default policy.
    ///
    /// # Errors
    ///
    /// See [`BackupJob::run`].
    pub fn backup_to(&self, destination: &mut Self) -> Result<BackupProgress> {
        self.backup_to_with(destination, BackupPolicy::default())
    }

    /// Copies this database into `destination` under `policy`.
    ///
    /// # Errors
    ///
    /// See [`BackupJob::new`] and [`BackupJob::run`].
    pub fn backup_to_with(
        &self,
        destination: &mut Self,
        policy: BackupPolicy,
    ) -> Result<BackupProgress> {
        BackupJob::new(self, destination, policy)?.run()
    }

    /// Copies this database into a new handle opened at `path`, then closes
    /// that handle.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError`] when the target cannot be opened, the copy
    /// fails, or the target fails to close.
    pub fn backup_to_file(&self, path: impl AsRef<Path>) -> Result<BackupProgress> {
        self.backup_to_file_with(path, BackupPolicy::default())
    }

    /// Copies this database into a new file handle under `policy`.
    ///
    /// # Errors
    ///
    /// See [`Database::backup_to_file`].
    pub fn backup_to_file_with(
        &self,
        path: impl AsRef<Path>,
        policy: BackupPolicy,
    ) -> Result<BackupProgress> {
        let mut target = Self::open(DatabaseConfig::new(path.as_ref()))?;
        let progress = self.backup_to_with(&mut target, policy)?;
        target.close()?;
        Ok(progress)
    }
}
