use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, Mutex, PoisonError},
};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::{
    database::{
        models::{GroupId, PlayerId},
        Database,
    },
    utils::error::SeedingError,
    SeedError,
};

use super::{
    completion::is_complete,
    standings::{player_at, rank, Ranking},
};

/// One async mutex per destination group.
///
/// Two syncs of the same group must not interleave their reads and writes; syncs of different
/// groups never wait on each other.
#[derive(Debug, Default)]
pub struct SyncLocks {
    locks: Mutex<HashMap<GroupId, Arc<tokio::sync::Mutex<()>>>>,
}

impl SyncLocks {
    pub fn for_group(&self, group_id: GroupId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(group_id).or_default().clone()
    }
}

/// What a single sync did.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SyncReport {
    pub group_id: GroupId,
    /// The group has no usable seeding declaration and nothing was written.
    pub skipped: bool,
    /// The player each slot resolved to, in declaration order.
    pub resolved: Vec<Option<PlayerId>>,
    /// Slot participants overwritten, whether or not their value changed.
    pub patched: usize,
    pub added: Vec<PlayerId>,
    pub removed: Vec<PlayerId>,
}

impl SyncReport {
    fn skipped(group_id: GroupId) -> Self {
        Self {
            group_id,
            skipped: true,
            ..Default::default()
        }
    }

    /// Whether the sync moved any player into or out of the group.
    pub fn changed_membership(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Final rankings of source groups, computed at most once per sync.
///
/// `None` marks a group that is still being played.
type RankingCache = HashMap<GroupId, Option<Ranking>>;

/// Keeps a destination group's slot participants and members in line with the standings of
/// the groups seeding it.
#[derive(Debug)]
pub struct PropagationEngine<DB> {
    database: DB,
    locks: SyncLocks,
}

impl<DB> PropagationEngine<DB>
where
    DB: Database,
{
    pub fn new(database: DB) -> Self {
        Self {
            database,
            locks: SyncLocks::default(),
        }
    }

    pub fn database(&self) -> &DB {
        &self.database
    }

    /// Resolves every seed slot of `group_id` and reconciles its matches and members.
    ///
    /// Every slot participant is rewritten on every call, so running it twice is harmless and
    /// a slot whose source stopped being complete goes back to unresolved. A failure part way
    /// leaves earlier writes in place; calling `sync` again finishes the job.
    #[instrument(skip(self))]
    pub async fn sync(&self, group_id: GroupId) -> Result<SyncReport, SeedError> {
        let lock = self.locks.for_group(group_id);
        let _guard = lock.lock().await;

        let group = self
            .database
            .get_group(group_id)
            .await?
            .ok_or(SeedingError::GroupNotExists(group_id))?;
        let slots = match group.seed_slots() {
            Some(slots) if !slots.is_empty() => slots,
            Some(_) => {
                debug!("Group {} has no seed slots, nothing to sync", group_id);
                return Ok(SyncReport::skipped(group_id));
            }
            None => {
                warn!(
                    "Group {} has a malformed seeding declaration, not syncing it: {}",
                    group_id, group.seeding
                );
                return Ok(SyncReport::skipped(group_id));
            }
        };

        let mut rankings = RankingCache::new();
        let mut resolved = Vec::with_capacity(slots.len());
        for slot in &slots {
            if !rankings.contains_key(&slot.source_group_id) {
                let ranking = self.final_ranking(slot.source_group_id).await?;
                rankings.insert(slot.source_group_id, ranking);
            }
            let player = rankings
                .get(&slot.source_group_id)
                .and_then(Option::as_ref)
                .and_then(|ranking| player_at(ranking, slot.position));
            resolved.push(player);
        }

        let mut report = SyncReport {
            group_id,
            resolved,
            ..Default::default()
        };

        let matches = self.database.list_matches(group_id).await?;
        let members = self.database.list_players(group_id).await?;

        for game in &matches {
            for (side, position) in game.slot_sides() {
                let player = slot_player(&report.resolved, position);
                if game.player(side) != player {
                    info!(
                        "Match {} side {}: slot {} now {:?} (was {:?})",
                        game.match_id,
                        side,
                        position,
                        player,
                        game.player(side)
                    );
                }
                self.database
                    .patch_match_participant(game.match_id, side, player)
                    .await?;
                report.patched += 1;
            }
        }

        let desired: BTreeSet<PlayerId> = report.resolved.iter().flatten().copied().collect();
        let current: BTreeSet<PlayerId> = members.iter().map(|p| p.player_id).collect();

        for player_id in desired.difference(&current) {
            info!("Adding player {} to group {}", player_id, group_id);
            self.database.add_player_to_group(*player_id, group_id).await?;
            report.added.push(*player_id);
        }
        for player_id in current.difference(&desired) {
            info!("Removing player {} from group {}", player_id, group_id);
            self.database
                .remove_player_from_group(*player_id, group_id)
                .await?;
            report.removed.push(*player_id);
        }

        Ok(report)
    }

    /// The ranking of a source group, or `None` while its round robin is unfinished.
    async fn final_ranking(&self, group_id: GroupId) -> Result<Option<Ranking>, SeedError> {
        let players = self.database.list_players(group_id).await?;
        let matches = self.database.list_matches(group_id).await?;
        if !is_complete(&players, &matches) {
            debug!("Source group {} is not complete yet", group_id);
            return Ok(None);
        }
        Ok(Some(rank(&players, &matches)))
    }
}

/// The player bound to a 1-indexed slot position. Positions without a declared slot stay empty.
fn slot_player(resolved: &[Option<PlayerId>], position: i32) -> Option<PlayerId> {
    let index = usize::try_from(position).ok()?.checked_sub(1)?;
    resolved.get(index).copied().flatten()
}
