use std::collections::BTreeSet;

use strum::IntoEnumIterator;

use crate::database::models::{Match, Player, PlayerId, Side};

/// Number of matches in a single round robin between `players` players.
pub fn expected_matches(players: usize) -> usize {
    players * players.saturating_sub(1) / 2
}

/// Matches between two of the given players that carry a result.
pub fn played_matches(players: &[Player], matches: &[Match]) -> usize {
    let members: BTreeSet<PlayerId> = players.iter().map(|p| p.player_id).collect();
    matches
        .iter()
        .filter(|game| {
            Side::iter().all(|side| game.player(side).is_some_and(|id| members.contains(&id)))
        })
        .filter(|game| game.has_result())
        .count()
}

/// Whether the round robin among `players` has been fully played.
///
/// Until this holds, a ranking of the group is provisional and must not seed anyone.
pub fn is_complete(players: &[Player], matches: &[Match]) -> bool {
    let members: BTreeSet<PlayerId> = players.iter().map(|p| p.player_id).collect();
    played_matches(players, matches) == expected_matches(members.len())
}
