use futures::future::join_all;
use tracing::{error, info, instrument, warn};

use crate::{
    config::Config,
    database::{
        models::{GroupId, Match, TournamentId},
        Database,
    },
    utils::error::SeedingError,
    SeedError,
};

use super::{
    completion::is_complete,
    graph::{seeding_value, QualificationGraph, SeedSlot},
    propagation::{PropagationEngine, SyncReport},
    standings::{placements, rank, Placement},
};

/// Outcome of pushing one change through the tournament.
#[derive(Debug, Default)]
pub struct RunReport {
    /// The group whose change started the run, if any.
    pub source_group_id: Option<GroupId>,
    pub source_complete: Option<bool>,
    pub synced: Vec<SyncReport>,
    pub failed: Vec<(GroupId, SeedError)>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn synced_groups(&self) -> Vec<GroupId> {
        self.synced.iter().map(|report| report.group_id).collect()
    }
}

/// Decides which groups need a sync after a change and drives the engine over them.
#[derive(Debug)]
pub struct Orchestrator<DB> {
    engine: PropagationEngine<DB>,
    config: Config,
}

impl<DB> Orchestrator<DB>
where
    DB: Database,
{
    pub fn new(database: DB, config: Config) -> Self {
        Self {
            engine: PropagationEngine::new(database),
            config,
        }
    }

    pub fn engine(&self) -> &PropagationEngine<DB> {
        &self.engine
    }

    pub fn database(&self) -> &DB {
        self.engine.database()
    }

    /// Call after a match result was stored, changed or cleared.
    ///
    /// Every group seeded from the match's group is synced whether or not that group is
    /// complete, so that clearing a result retracts the players it had qualified. The change
    /// then cascades down to `max_cascade_depth` layers.
    #[instrument(skip(self, game), fields(match_id = game.match_id, group_id = game.group_id))]
    pub async fn on_match_result_saved(&self, game: &Match) -> Result<RunReport, SeedError> {
        let database = self.database();
        let group = database
            .get_group(game.group_id)
            .await?
            .ok_or(SeedingError::GroupNotExists(game.group_id))?;

        let players = database.list_players(group.group_id).await?;
        let matches = database.list_matches(group.group_id).await?;
        let complete = is_complete(&players, &matches);
        info!(
            "Result of match {} saved, group {} is {}",
            game.match_id,
            group.group_id,
            if complete { "complete" } else { "still being played" }
        );

        let graph = QualificationGraph::build(&database.list_groups(group.tournament_id).await?);
        let layers = graph.downstream_layers(group.group_id, self.config.max_cascade_depth);

        let mut report = RunReport {
            source_group_id: Some(group.group_id),
            source_complete: Some(complete),
            ..Default::default()
        };
        self.run_layers(layers, &mut report).await;
        Ok(report)
    }

    /// Replaces the seeding declaration of `group_id` and re-syncs it along with everything
    /// downstream.
    ///
    /// A declaration that would close a seeding cycle fails with
    /// [`SeedingError::CyclicSeeding`] unless cycle rejection is turned off.
    #[instrument(skip(self, slots))]
    pub async fn update_seeding(
        &self,
        group_id: GroupId,
        slots: &[SeedSlot],
    ) -> Result<RunReport, SeedError> {
        let database = self.database();
        let group = database
            .get_group(group_id)
            .await?
            .ok_or(SeedingError::GroupNotExists(group_id))?;

        let graph = QualificationGraph::build(&database.list_groups(group.tournament_id).await?)
            .with_seeding(group_id, slots);
        let sources: Vec<GroupId> = slots.iter().map(|slot| slot.source_group_id).collect();
        if let Some(cycle) = graph.cycle_through(group_id, &sources) {
            if self.config.reject_cycles {
                return Err(SeedingError::CyclicSeeding(cycle).into());
            }
            warn!("Accepting seeding of group {} despite cycle {:?}", group_id, cycle);
        }

        database.set_seeding(group_id, &seeding_value(slots)).await?;
        info!("Group {} is now seeded from {} slots", group_id, slots.len());

        let mut layers = vec![vec![group_id]];
        layers.extend(graph.downstream_layers(group_id, self.config.max_cascade_depth));

        let mut report = RunReport {
            source_group_id: Some(group_id),
            ..Default::default()
        };
        self.run_layers(layers, &mut report).await;
        Ok(report)
    }

    /// Re-syncs every seeded group of a tournament, sources first.
    #[instrument(skip(self))]
    pub async fn resync_tournament(&self, tournament_id: TournamentId) -> Result<RunReport, SeedError> {
        let groups = self.database().list_groups(tournament_id).await?;
        let layers = QualificationGraph::build(&groups).sync_layers();
        info!(
            "Re-syncing {} seeded groups of tournament {}",
            layers.iter().map(Vec::len).sum::<usize>(),
            tournament_id
        );

        let mut report = RunReport::default();
        self.run_layers(layers, &mut report).await;
        Ok(report)
    }

    /// Final placements across every complete group that has a highest position, best first.
    pub async fn leaderboard(&self, tournament_id: TournamentId) -> Result<Vec<Placement>, SeedError> {
        let database = self.database();
        let mut leaderboard = Vec::new();
        for group in database.list_groups(tournament_id).await? {
            if group.highest_position.is_none() {
                continue;
            }
            let players = database.list_players(group.group_id).await?;
            let matches = database.list_matches(group.group_id).await?;
            if !is_complete(&players, &matches) {
                continue;
            }
            leaderboard.extend(placements(&group, &rank(&players, &matches)));
        }
        leaderboard.sort_by_key(|place| (place.placement, place.group_id));
        Ok(leaderboard)
    }

    /// Syncs the groups of each layer concurrently, one layer after the other. A failing group
    /// is recorded and does not stop the others.
    async fn run_layers(&self, layers: Vec<Vec<GroupId>>, report: &mut RunReport) {
        for layer in layers {
            let results = join_all(layer.iter().map(|group_id| self.engine.sync(*group_id))).await;
            for (group_id, result) in layer.into_iter().zip(results) {
                match result {
                    Ok(synced) => report.synced.push(synced),
                    Err(e) => {
                        error!("Failed to sync group {}: {:#}", group_id, e);
                        report.failed.push((group_id, e));
                    }
                }
            }
        }
    }
}
