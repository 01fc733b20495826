use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;

/// What happened to one source playlist during a run.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PlaylistOutcome {
    Completed {
        total: usize,
        found: usize,
        not_found: usize,
        skipped: usize,
    },
    /// Skipped by the sync-only short circuit.
    AlreadySynced,
    /// Completed in a previous run's checkpoint; no work this run.
    PreviouslyCompleted,
    /// Empty source playlist.
    SkippedEmpty,
    Error {
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaylistReport {
    pub name: String,
    pub outcome: PlaylistOutcome,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub playlists: Vec<PlaylistReport>,
    pub playlists_processed: usize,
    pub playlists_already_synced: usize,
    pub playlists_errored: usize,
    pub tracks_found: usize,
    pub tracks_not_found: usize,
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            playlists: Vec::new(),
            playlists_processed: 0,
            playlists_already_synced: 0,
            playlists_errored: 0,
            tracks_found: 0,
            tracks_not_found: 0,
        }
    }

    pub fn push(&mut self, report: PlaylistReport) {
        match &report.outcome {
            PlaylistOutcome::Completed {
                found, not_found, ..
            } => {
                self.playlists_processed += 1;
                self.tracks_found += found;
                self.tracks_not_found += not_found;
            }
            PlaylistOutcome::AlreadySynced => self.playlists_already_synced += 1,
            PlaylistOutcome::PreviouslyCompleted | PlaylistOutcome::SkippedEmpty => {
                self.playlists_processed += 1;
            }
            PlaylistOutcome::Error { .. } => {
                self.playlists_processed += 1;
                self.playlists_errored += 1;
            }
        }
        self.playlists.push(report);
    }

    pub fn total_writes(&self) -> usize {
        self.tracks_found
    }

    pub fn print(&self) {
        let elapsed = Utc::now() - self.started_at;

        println!();
        println!("{}", "=".repeat(60));
        println!("{}", "TRANSFER COMPLETE".bold());
        println!("{}", "=".repeat(60));
        println!("Time elapsed: {}s", elapsed.num_seconds());
        println!("Playlists processed: {}", self.playlists_processed);
        if self.playlists_already_synced > 0 {
            println!(
                "Playlists already synced (skipped): {}",
                self.playlists_already_synced
            );
        }
        if self.playlists_errored > 0 {
            println!(
                "Playlists with errors: {}",
                self.playlists_errored.to_string().red()
            );
        }
        println!("Total tracks found: {}", self.tracks_found.to_string().green());
        println!(
            "Total tracks not found: {}",
            self.tracks_not_found.to_string().red()
        );

        let transferred: Vec<&PlaylistReport> = self
            .playlists
            .iter()
            .filter(|r| matches!(r.outcome, PlaylistOutcome::Completed { .. }))
            .collect();

        if !transferred.is_empty() {
            println!("\nSuccessfully transferred:");
            for report in transferred {
                if let PlaylistOutcome::Completed {
                    total,
                    found,
                    not_found,
                    skipped,
                } = &report.outcome
                {
                    let rate = if *total > 0 {
                        *found as f64 / *total as f64 * 100.0
                    } else {
                        0.0
                    };
                    let rate_str = if rate >= 90.0 {
                        format!("{:.1}%", rate).green()
                    } else if rate >= 70.0 {
                        format!("{:.1}%", rate).yellow()
                    } else {
                        format!("{:.1}%", rate).red()
                    };
                    let mut line = format!(
                        "  - {}: {}/{} tracks ({})",
                        report.name, found, total, rate_str
                    );
                    if *skipped > 0 {
                        line.push_str(&format!(", {} already present", skipped));
                    }
                    if *not_found > 0 {
                        line.push_str(&format!(", {} not found", not_found));
                    }
                    println!("{}", line);
                }
            }
        }

        for report in &self.playlists {
            if let PlaylistOutcome::Error { reason } = &report.outcome {
                println!("  {} {}: {}", "!".red(), report.name, reason);
            }
        }
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_aggregates_counts() {
        let mut summary = RunSummary::new();

        summary.push(PlaylistReport {
            name: "A".into(),
            outcome: PlaylistOutcome::Completed {
                total: 10,
                found: 8,
                not_found: 2,
                skipped: 0,
            },
        });
        summary.push(PlaylistReport {
            name: "B".into(),
            outcome: PlaylistOutcome::AlreadySynced,
        });
        summary.push(PlaylistReport {
            name: "C".into(),
            outcome: PlaylistOutcome::Error {
                reason: "fetch failed".into(),
            },
        });
        summary.push(PlaylistReport {
            name: "D".into(),
            outcome: PlaylistOutcome::SkippedEmpty,
        });

        assert_eq!(summary.playlists_processed, 3);
        assert_eq!(summary.playlists_already_synced, 1);
        assert_eq!(summary.playlists_errored, 1);
        assert_eq!(summary.tracks_found, 8);
        assert_eq!(summary.tracks_not_found, 2);
    }
}
