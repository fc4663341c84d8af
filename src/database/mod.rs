use std::collections::BTreeSet;

use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use tracing::info;

use crate::{config::Config, utils::error::SeedingError, SeedError};

use models::*;

/// In-memory storage, used by the tests and by embedders that keep their own persistence.
pub mod memory;
/// Models for the database.
///
/// Players, groups and matches are the only records the seeding engine reads or writes.
pub mod models;

/// Read and write access to players and their group memberships.
#[allow(async_fn_in_trait)]
pub trait PlayerDatabase {
    type Error;

    /// Retrieves every player whose membership set contains the group.
    async fn list_players(&self, group_id: GroupId) -> Result<Vec<Player>, Self::Error>;

    /// Adds the group to the player's membership set. Adding an existing membership is a no-op.
    async fn add_player_to_group(
        &self,
        player_id: PlayerId,
        group_id: GroupId,
    ) -> Result<(), Self::Error>;

    /// Removes the group from the player's membership set.
    async fn remove_player_from_group(
        &self,
        player_id: PlayerId,
        group_id: GroupId,
    ) -> Result<(), Self::Error>;
}

/// Read and write access to groups.
#[allow(async_fn_in_trait)]
pub trait GroupDatabase {
    type Error;

    /// Retrieves a group by its id.
    async fn get_group(&self, group_id: GroupId) -> Result<Option<Group>, Self::Error>;

    /// Retrieves all groups of a tournament.
    async fn list_groups(&self, tournament_id: TournamentId) -> Result<Vec<Group>, Self::Error>;

    /// Replaces the stored seeding declaration of a group.
    async fn set_seeding(
        &self,
        group_id: GroupId,
        seeding: &serde_json::Value,
    ) -> Result<(), Self::Error>;
}

/// Read and write access to matches.
#[allow(async_fn_in_trait)]
pub trait MatchDatabase {
    type Error;

    /// Retrieves all matches of a group.
    async fn list_matches(&self, group_id: GroupId) -> Result<Vec<Match>, Self::Error>;

    /// Sets the player of one side of a match. Only meaningful for slot participants.
    async fn patch_match_participant(
        &self,
        match_id: MatchId,
        side: Side,
        player_id: Option<PlayerId>,
    ) -> Result<(), Self::Error>;
}

/// Everything the seeding engine needs from storage.
pub trait Database:
    PlayerDatabase<Error = SeedError> + GroupDatabase<Error = SeedError> + MatchDatabase<Error = SeedError>
{
}

impl<T> Database for T where
    T: PlayerDatabase<Error = SeedError>
        + GroupDatabase<Error = SeedError>
        + MatchDatabase<Error = SeedError>
{
}

/// The Postgres database backing a tournament.
#[derive(Debug, Clone)]
pub struct PgDatabase {
    pub pool: PgPool,
}

impl PgDatabase {
    pub async fn connect(config: &Config) -> Result<Self, SeedError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(config.database_url()?)
            .await?;
        info!("Successfully connected to the database.");

        Ok(PgDatabase { pool })
    }

    pub async fn migrate(&self) -> Result<(), SeedError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[derive(FromRow)]
struct PlayerRow {
    player_id: i32,
    first_name: String,
    last_name: String,
    club: String,
    groups: Vec<i32>,
}

impl From<PlayerRow> for Player {
    fn from(row: PlayerRow) -> Self {
        Player {
            player_id: row.player_id,
            first_name: row.first_name,
            last_name: row.last_name,
            club: row.club,
            groups: row.groups.into_iter().collect::<BTreeSet<_>>(),
        }
    }
}

#[derive(FromRow)]
struct MatchRow {
    match_id: i32,
    group_id: i32,
    player_a_id: Option<i32>,
    slot_a: Option<i32>,
    player_b_id: Option<i32>,
    slot_b: Option<i32>,
    result: serde_json::Value,
}

impl From<MatchRow> for Match {
    fn from(row: MatchRow) -> Self {
        Match {
            match_id: row.match_id,
            group_id: row.group_id,
            player_a: Participant::from_columns(row.player_a_id, row.slot_a),
            player_b: Participant::from_columns(row.player_b_id, row.slot_b),
            result: row.result,
        }
    }
}

impl PlayerDatabase for PgDatabase {
    type Error = SeedError;

    async fn list_players(&self, group_id: GroupId) -> Result<Vec<Player>, Self::Error> {
        let players = sqlx::query_as::<_, PlayerRow>(
            r#"
            SELECT p.player_id, p.first_name, p.last_name, p.club,
                COALESCE(
                    ARRAY_AGG(m.group_id ORDER BY m.group_id) FILTER (WHERE m.group_id IS NOT NULL),
                    '{}'::INT4[]
                ) AS groups
            FROM players p
            LEFT JOIN group_members m ON m.player_id = p.player_id
            WHERE p.player_id IN (SELECT player_id FROM group_members WHERE group_id = $1)
            GROUP BY p.player_id
            ORDER BY p.player_id
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(players.into_iter().map(Player::from).collect())
    }

    async fn add_player_to_group(
        &self,
        player_id: PlayerId,
        group_id: GroupId,
    ) -> Result<(), Self::Error> {
        sqlx::query(
            r#"
            INSERT INTO group_members (player_id, group_id)
            VALUES ($1, $2)
            ON CONFLICT (player_id, group_id) DO NOTHING
            "#,
        )
        .bind(player_id)
        .bind(group_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove_player_from_group(
        &self,
        player_id: PlayerId,
        group_id: GroupId,
    ) -> Result<(), Self::Error> {
        sqlx::query(
            r#"
            DELETE FROM group_members
            WHERE player_id = $1 AND group_id = $2
            "#,
        )
        .bind(player_id)
        .bind(group_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl GroupDatabase for PgDatabase {
    type Error = SeedError;

    async fn get_group(&self, group_id: GroupId) -> Result<Option<Group>, Self::Error> {
        let group = sqlx::query_as::<_, Group>(
            r#"
            SELECT group_id, tournament_id, name, category, seeding, highest_position
            FROM tournament_groups
            WHERE group_id = $1
            "#,
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(group)
    }

    async fn list_groups(&self, tournament_id: TournamentId) -> Result<Vec<Group>, Self::Error> {
        let groups = sqlx::query_as::<_, Group>(
            r#"
            SELECT group_id, tournament_id, name, category, seeding, highest_position
            FROM tournament_groups
            WHERE tournament_id = $1
            ORDER BY group_id
            "#,
        )
        .bind(tournament_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(groups)
    }

    async fn set_seeding(
        &self,
        group_id: GroupId,
        seeding: &serde_json::Value,
    ) -> Result<(), Self::Error> {
        let updated = sqlx::query(
            r#"
            UPDATE tournament_groups
            SET seeding = $2
            WHERE group_id = $1
            "#,
        )
        .bind(group_id)
        .bind(seeding)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(SeedingError::GroupNotExists(group_id).into());
        }
        Ok(())
    }
}

impl MatchDatabase for PgDatabase {
    type Error = SeedError;

    async fn list_matches(&self, group_id: GroupId) -> Result<Vec<Match>, Self::Error> {
        let matches = sqlx::query_as::<_, MatchRow>(
            r#"
            SELECT match_id, group_id, player_a_id, slot_a, player_b_id, slot_b, result
            FROM matches
            WHERE group_id = $1
            ORDER BY match_id
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(matches.into_iter().map(Match::from).collect())
    }

    async fn patch_match_participant(
        &self,
        match_id: MatchId,
        side: Side,
        player_id: Option<PlayerId>,
    ) -> Result<(), Self::Error> {
        let query = match side {
            Side::A => "UPDATE matches SET player_a_id = $2 WHERE match_id = $1",
            Side::B => "UPDATE matches SET player_b_id = $2 WHERE match_id = $1",
        };
        let updated = sqlx::query(query)
            .bind(match_id)
            .bind(player_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if updated == 0 {
            return Err(SeedingError::MatchNotExists(match_id).into());
        }
        Ok(())
    }
}
