use std::collections::{BTreeMap, BTreeSet};

use tokio::sync::RwLock;

use crate::{utils::error::SeedingError, SeedError};

use super::{models::*, GroupDatabase, MatchDatabase, PlayerDatabase};

#[derive(Debug, Default)]
struct MemoryState {
    players: BTreeMap<PlayerId, Player>,
    groups: BTreeMap<GroupId, Group>,
    matches: BTreeMap<MatchId, Match>,
    failing_matches: BTreeSet<MatchId>,
    /// Result to store right after the next listing of a group's matches.
    pending_edit: Option<(GroupId, MatchId, serde_json::Value)>,
    writes: usize,
}

/// A database kept entirely in memory.
///
/// Behaves like [`super::PgDatabase`], including failing on unknown ids, and can be told to
/// fail writes to particular matches.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    state: RwLock<MemoryState>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_player(&self, player: Player) {
        self.state.write().await.players.insert(player.player_id, player);
    }

    pub async fn insert_group(&self, group: Group) {
        self.state.write().await.groups.insert(group.group_id, group);
    }

    pub async fn insert_match(&self, game: Match) {
        self.state.write().await.matches.insert(game.match_id, game);
    }

    /// Stores a result, as the surrounding application would before notifying the engine.
    pub async fn set_result(&self, match_id: MatchId, result: serde_json::Value) -> Result<Match, SeedError> {
        let mut state = self.state.write().await;
        let game = state
            .matches
            .get_mut(&match_id)
            .ok_or(SeedingError::MatchNotExists(match_id))?;
        game.result = result;
        Ok(game.clone())
    }

    pub async fn player(&self, player_id: PlayerId) -> Option<Player> {
        self.state.read().await.players.get(&player_id).cloned()
    }

    pub async fn get_match(&self, match_id: MatchId) -> Option<Match> {
        self.state.read().await.matches.get(&match_id).cloned()
    }

    /// Every later patch of this match fails until [`MemoryDatabase::heal`] is called.
    pub async fn fail_match_writes(&self, match_id: MatchId) {
        self.state.write().await.failing_matches.insert(match_id);
    }

    /// Once the matches of `group_id` are next listed, stores `result` for `match_id` and
    /// yields to other tasks before the listing returns.
    pub async fn edit_after_next_listing(
        &self,
        group_id: GroupId,
        match_id: MatchId,
        result: serde_json::Value,
    ) {
        self.state.write().await.pending_edit = Some((group_id, match_id, result));
    }

    pub async fn heal(&self) {
        self.state.write().await.failing_matches.clear();
    }

    /// Number of successful writes so far.
    pub async fn writes(&self) -> usize {
        self.state.read().await.writes
    }
}

impl PlayerDatabase for MemoryDatabase {
    type Error = SeedError;

    async fn list_players(&self, group_id: GroupId) -> Result<Vec<Player>, Self::Error> {
        let state = self.state.read().await;
        Ok(state
            .players
            .values()
            .filter(|player| player.is_member_of(group_id))
            .cloned()
            .collect())
    }

    async fn add_player_to_group(
        &self,
        player_id: PlayerId,
        group_id: GroupId,
    ) -> Result<(), Self::Error> {
        let mut state = self.state.write().await;
        state
            .players
            .get_mut(&player_id)
            .ok_or(SeedingError::PlayerNotExists(player_id))?
            .groups
            .insert(group_id);
        state.writes += 1;
        Ok(())
    }

    async fn remove_player_from_group(
        &self,
        player_id: PlayerId,
        group_id: GroupId,
    ) -> Result<(), Self::Error> {
        let mut state = self.state.write().await;
        state
            .players
            .get_mut(&player_id)
            .ok_or(SeedingError::PlayerNotExists(player_id))?
            .groups
            .remove(&group_id);
        state.writes += 1;
        Ok(())
    }
}

impl GroupDatabase for MemoryDatabase {
    type Error = SeedError;

    async fn get_group(&self, group_id: GroupId) -> Result<Option<Group>, Self::Error> {
        Ok(self.state.read().await.groups.get(&group_id).cloned())
    }

    async fn list_groups(&self, tournament_id: TournamentId) -> Result<Vec<Group>, Self::Error> {
        let state = self.state.read().await;
        Ok(state
            .groups
            .values()
            .filter(|group| group.tournament_id == tournament_id)
            .cloned()
            .collect())
    }

    async fn set_seeding(
        &self,
        group_id: GroupId,
        seeding: &serde_json::Value,
    ) -> Result<(), Self::Error> {
        let mut state = self.state.write().await;
        state
            .groups
            .get_mut(&group_id)
            .ok_or(SeedingError::GroupNotExists(group_id))?
            .seeding = seeding.clone();
        state.writes += 1;
        Ok(())
    }
}

impl MatchDatabase for MemoryDatabase {
    type Error = SeedError;

    async fn list_matches(&self, group_id: GroupId) -> Result<Vec<Match>, Self::Error> {
        let mut state = self.state.write().await;
        let matches: Vec<Match> = state
            .matches
            .values()
            .filter(|game| game.group_id == group_id)
            .cloned()
            .collect();

        let edit = match state.pending_edit.take() {
            Some((group, match_id, result)) if group == group_id => Some((match_id, result)),
            other => {
                state.pending_edit = other;
                None
            }
        };
        let Some((match_id, result)) = edit else {
            return Ok(matches);
        };
        if let Some(game) = state.matches.get_mut(&match_id) {
            game.result = result;
        }
        drop(state);
        tokio::task::yield_now().await;
        Ok(matches)
    }

    async fn patch_match_participant(
        &self,
        match_id: MatchId,
        side: Side,
        player_id: Option<PlayerId>,
    ) -> Result<(), Self::Error> {
        let mut state = self.state.write().await;
        if state.failing_matches.contains(&match_id) {
            return Err(SeedingError::InjectedFailure(format!("patch of match {}", match_id)).into());
        }
        let game = state
            .matches
            .get_mut(&match_id)
            .ok_or(SeedingError::MatchNotExists(match_id))?;
        match game.participant_mut(side) {
            Participant::Slot { player_id: slot, .. } => *slot = player_id,
            other => *other = player_id.map(Participant::Player).unwrap_or_default(),
        }
        state.writes += 1;
        Ok(())
    }
}
