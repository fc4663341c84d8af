use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::seeding::{
    graph::{self, SeedSlot},
    result,
};

pub type PlayerId = i32;
pub type GroupId = i32;
pub type MatchId = i32;
pub type TournamentId = i32;

/// A registered player within the database.
///
/// `groups` is the set of groups the player currently plays in. Only the propagation engine
/// writes to it once the tournament is running.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Player {
    pub player_id: PlayerId,
    pub first_name: String,
    pub last_name: String,
    pub club: String,
    pub groups: BTreeSet<GroupId>,
}

impl Player {
    pub fn new(player_id: PlayerId, first_name: &str, last_name: &str, club: &str) -> Self {
        Self {
            player_id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            club: club.to_string(),
            groups: BTreeSet::new(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_member_of(&self, group_id: GroupId) -> bool {
        self.groups.contains(&group_id)
    }
}

/// A round robin group within a tournament.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, sqlx::FromRow)]
pub struct Group {
    pub group_id: GroupId,
    pub tournament_id: TournamentId,
    pub name: String,
    /// Display only. Never used to decide anything.
    pub category: String,
    /// The seeding declaration exactly as stored. See [`Group::seed_slots`].
    pub seeding: serde_json::Value,
    /// Absolute placement of this group's winner on the tournament leaderboard.
    pub highest_position: Option<i32>,
}

impl Group {
    pub fn new(group_id: GroupId, tournament_id: TournamentId, name: &str) -> Self {
        Self {
            group_id,
            tournament_id,
            name: name.to_string(),
            seeding: serde_json::Value::Null,
            ..Default::default()
        }
    }

    /// Parses the seeding declaration.
    ///
    /// Returns `None` when the declaration is malformed. A root group yields an empty list.
    pub fn seed_slots(&self) -> Option<Vec<SeedSlot>> {
        graph::parse_seeding(&self.seeding)
    }
}

/// Which side of a match a participant plays on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter,
)]
pub enum Side {
    #[strum(to_string = "A")]
    A,
    #[strum(to_string = "B")]
    B,
}

impl Side {
    pub fn opponent(self) -> Self {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// One side of a match.
///
/// A slot participant refers to the 1-indexed position in the owning group's seeding
/// declaration and carries the player it currently resolves to, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Participant {
    Player(PlayerId),
    Slot {
        position: i32,
        player_id: Option<PlayerId>,
    },
    /// Nobody, e.g. a bye.
    #[default]
    Vacant,
}

impl Participant {
    /// Builds a participant from its two storage columns. The slot column wins when both are set.
    pub fn from_columns(player_id: Option<PlayerId>, slot: Option<i32>) -> Self {
        match (player_id, slot) {
            (player_id, Some(position)) => Participant::Slot {
                position,
                player_id,
            },
            (Some(player_id), None) => Participant::Player(player_id),
            (None, None) => Participant::Vacant,
        }
    }

    /// The player currently playing this side, if known.
    pub fn player_id(&self) -> Option<PlayerId> {
        match self {
            Participant::Player(player_id) => Some(*player_id),
            Participant::Slot { player_id, .. } => *player_id,
            Participant::Vacant => None,
        }
    }

    pub fn slot_position(&self) -> Option<i32> {
        match self {
            Participant::Slot { position, .. } => Some(*position),
            _ => None,
        }
    }
}

/// A match within a group.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Match {
    pub match_id: MatchId,
    pub group_id: GroupId,
    pub player_a: Participant,
    pub player_b: Participant,
    /// The result exactly as stored. See [`Match::scores`].
    pub result: serde_json::Value,
}

impl Match {
    pub fn new(match_id: MatchId, group_id: GroupId, player_a: Participant, player_b: Participant) -> Self {
        Self {
            match_id,
            group_id,
            player_a,
            player_b,
            result: serde_json::Value::Null,
        }
    }

    pub fn participant(&self, side: Side) -> &Participant {
        match side {
            Side::A => &self.player_a,
            Side::B => &self.player_b,
        }
    }

    pub fn participant_mut(&mut self, side: Side) -> &mut Participant {
        match side {
            Side::A => &mut self.player_a,
            Side::B => &mut self.player_b,
        }
    }

    pub fn player(&self, side: Side) -> Option<PlayerId> {
        self.participant(side).player_id()
    }

    /// The normalized flat score sequence, alternating side A and side B per set.
    pub fn scores(&self) -> Vec<i32> {
        result::parse_result(&self.result)
    }

    pub fn has_result(&self) -> bool {
        !self.scores().is_empty()
    }

    /// Every side that is seeded from a slot, with the slot position.
    pub fn slot_sides(&self) -> Vec<(Side, i32)> {
        Side::iter()
            .filter_map(|side| self.participant(side).slot_position().map(|p| (side, p)))
            .collect()
    }
}
