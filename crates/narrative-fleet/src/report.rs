//! Team aggregates and fleet reports.

use std::collections::BTreeSet;

use narrative_types::{AgentSnapshot, TeamSummary};

use crate::coordination::trending_union;

/// Aggregate agent snapshots into team totals.
///
/// Counters are summed over every snapshot given. Unique targets are the size
/// of the union of every agent's engaged set, so an account engaged by two
/// agents counts once.
pub fn summarize(
    snapshots: &[AgentSnapshot],
    active_agents: u32,
    lost_agents: u32,
    coordination_cycles: u64,
) -> TeamSummary {
    let mut summary = TeamSummary {
        active_agents,
        lost_agents,
        trending_topics: trending_union(snapshots),
        coordination_cycles,
        ..TeamSummary::default()
    };

    let mut targets = BTreeSet::new();
    for snapshot in snapshots {
        let stats = &snapshot.stats;
        summary.total_posts = summary.total_posts.saturating_add(stats.total_posts());
        summary.total_engagements = summary
            .total_engagements
            .saturating_add(stats.total_engagements());
        summary.actions_attempted = summary
            .actions_attempted
            .saturating_add(stats.actions_attempted);
        summary.actions_succeeded = summary
            .actions_succeeded
            .saturating_add(stats.actions_succeeded);
        targets.extend(snapshot.engaged_targets.iter());
    }

    summary.unique_targets = u64::try_from(targets.len()).unwrap_or(u64::MAX);
    summary.success_rate = success_rate(summary.actions_succeeded, summary.actions_attempted);
    summary
}

/// `succeeded / attempted`, or `None` before any attempt.
#[allow(clippy::cast_precision_loss)]
pub fn success_rate(succeeded: u64, attempted: u64) -> Option<f64> {
    if attempted == 0 {
        None
    } else {
        Some(succeeded as f64 / attempted as f64)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use narrative_types::{AgentId, AgentLifecycle, AgentStats, Phase, TargetId};

    use super::*;

    fn snapshot(targets: &[&str], stats: AgentStats) -> AgentSnapshot {
        AgentSnapshot {
            id: AgentId::new(),
            username: "agent".to_owned(),
            persona: "persona".to_owned(),
            lifecycle: AgentLifecycle::Active,
            phase: Phase::AudienceBuilding,
            started_at: Utc::now(),
            last_action_at: None,
            action_count: 0,
            stats,
            engaged_targets: targets.iter().map(|t| TargetId::new(*t)).collect(),
            followed_targets: BTreeSet::new(),
            trending_topics: Vec::new(),
            active_npcs: Vec::new(),
        }
    }

    #[test]
    fn unique_targets_is_a_set_union() {
        let snapshots = vec![
            snapshot(&["A", "B"], AgentStats::default()),
            snapshot(&["B", "C"], AgentStats::default()),
            snapshot(&["C", "D"], AgentStats::default()),
        ];
        let summary = summarize(&snapshots, 3, 0, 0);
        assert_eq!(summary.unique_targets, 4);
    }

    #[test]
    fn totals_combine_posts_and_engagements() {
        let first = AgentStats {
            posts_created: 2,
            replies_made: 1,
            likes_given: 4,
            reposts_made: 1,
            actions_attempted: 10,
            actions_succeeded: 8,
            ..AgentStats::default()
        };
        let second = AgentStats {
            posts_created: 1,
            likes_given: 2,
            actions_attempted: 6,
            actions_succeeded: 4,
            ..AgentStats::default()
        };
        let summary = summarize(&[snapshot(&[], first), snapshot(&[], second)], 1, 1, 5);

        assert_eq!(summary.total_posts, 4);
        assert_eq!(summary.total_engagements, 7);
        assert_eq!(summary.actions_attempted, 16);
        assert_eq!(summary.actions_succeeded, 12);
        assert_eq!(summary.active_agents, 1);
        assert_eq!(summary.lost_agents, 1);
        assert_eq!(summary.coordination_cycles, 5);
        let rate = summary.success_rate.unwrap_or_default();
        assert!((rate - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn success_rate_is_absent_without_attempts() {
        let summary = summarize(&[snapshot(&[], AgentStats::default())], 1, 0, 0);
        assert_eq!(summary.success_rate, None);
        assert_eq!(summary.unique_targets, 0);
    }
}
