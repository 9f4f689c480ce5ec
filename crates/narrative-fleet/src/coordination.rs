//! Team-level coordination.
//!
//! A coordination cycle reads copies of every active agent's state, finds
//! opportunities no single agent would act on by itself, and hands each
//! opportunity to a rotating subset of agents as a [`CoordinationDirective`].
//! Everything here is a pure function of the snapshots so the supervisor can
//! compute directives without holding any lock.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use narrative_types::{
    AgentSnapshot, CampaignObjective, CoordinationDirective, DirectiveKind, Phase, Priority,
    TargetId,
};

use crate::config::SupervisorConfig;

/// One team opportunity and how many agents should act on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamOpportunity {
    /// The directive each selected agent receives.
    pub directive: CoordinationDirective,
    /// Agents to assign.
    pub agent_count: usize,
}

/// Union of every agent's trending topics, in first-seen order.
pub fn trending_union(snapshots: &[AgentSnapshot]) -> Vec<String> {
    let mut topics: Vec<String> = Vec::new();
    for topic in snapshots.iter().flat_map(|s| &s.trending_topics) {
        if !topics.contains(topic) {
            topics.push(topic.clone());
        }
    }
    topics
}

/// NPCs seen across the team with the number of agents that saw each,
/// most-sighted first. Ties keep first-seen order.
pub fn npc_sightings(snapshots: &[AgentSnapshot]) -> Vec<(TargetId, usize)> {
    let mut order: Vec<TargetId> = Vec::new();
    let mut counts: HashMap<TargetId, usize> = HashMap::new();
    for npc in snapshots.iter().flat_map(|s| &s.active_npcs) {
        let count = counts.entry(npc.clone()).or_insert_with(|| {
            order.push(npc.clone());
            0
        });
        *count = count.saturating_add(1);
    }

    let mut sightings: Vec<(TargetId, usize)> = order
        .into_iter()
        .map(|npc| {
            let count = counts.get(&npc).copied().unwrap_or_default();
            (npc, count)
        })
        .collect();
    sightings.sort_by(|a, b| b.1.cmp(&a.1));
    sightings
}

/// Derive this cycle's team opportunities.
///
/// - Trending topics present: amplify the first `amplify_topics` with
///   `amplify_agents` agents at high priority.
/// - NPCs sighted: engage the `npc_targets` most-sighted with `npc_agents`
///   agents at medium priority.
/// - Political phase: a high-priority campaign push for every agent.
pub fn derive_opportunities(
    snapshots: &[AgentSnapshot],
    phase: Phase,
    objective: CampaignObjective,
    config: &SupervisorConfig,
    now: DateTime<Utc>,
) -> Vec<TeamOpportunity> {
    let active = snapshots.len();
    let expires_at = now
        .checked_add_signed(config.directive_ttl())
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    let directive = |kind, targets, priority, objective| CoordinationDirective {
        kind,
        targets,
        priority,
        objective,
        issued_at: now,
        expires_at,
    };

    let mut opportunities = Vec::new();

    let topics: Vec<String> = trending_union(snapshots)
        .into_iter()
        .take(config.amplify_topics)
        .collect();
    if !topics.is_empty() {
        opportunities.push(TeamOpportunity {
            directive: directive(DirectiveKind::AmplifyTrending, topics, Priority::High, None),
            agent_count: config.amplify_agents.min(active),
        });
    }

    let npcs: Vec<String> = npc_sightings(snapshots)
        .into_iter()
        .take(config.npc_targets)
        .map(|(npc, _)| npc.as_str().to_owned())
        .collect();
    if !npcs.is_empty() {
        opportunities.push(TeamOpportunity {
            directive: directive(
                DirectiveKind::CoordinatedNpcEngagement,
                npcs,
                Priority::Medium,
                None,
            ),
            agent_count: config.npc_agents.min(active),
        });
    }

    if phase == Phase::PoliticalInfluence {
        opportunities.push(TeamOpportunity {
            directive: directive(
                DirectiveKind::CampaignPush,
                Vec::new(),
                Priority::High,
                Some(objective),
            ),
            agent_count: active,
        });
    }

    opportunities
}

/// Assign opportunities round-robin.
///
/// Each opportunity takes the first `agent_count` agents of a rotating list,
/// which then rotates past them, so consecutive opportunities land on
/// different agents while the list lasts.
pub fn distribute<'a, T>(
    opportunities: &[TeamOpportunity],
    agents: &'a [T],
) -> Vec<(&'a T, CoordinationDirective)> {
    let mut available: Vec<&T> = agents.iter().collect();
    let mut assignments = Vec::new();

    for opportunity in opportunities {
        let count = opportunity.agent_count.min(available.len());
        if count == 0 {
            continue;
        }
        assignments.extend(
            available
                .iter()
                .take(count)
                .map(|agent| (*agent, opportunity.directive.clone())),
        );
        available.rotate_left(count);
    }

    assignments
}
