//! Round robin standings and the tie-break policy.
//!
//! Order of keys, strongest first:
//! 1. wins
//! 2. for a two- or three-way tie on wins, set and point difference counting only the
//!    matches among the tied players
//! 3. overall set difference, then overall point difference
//! 4. surname, first name (case-insensitive), then player id

use std::{
    cmp::Reverse,
    collections::{BTreeMap, BTreeSet, HashMap},
};

use serde::{Deserialize, Serialize};

use crate::database::models::{Group, GroupId, Match, Player, PlayerId, Side};

use super::result::set_pairs;

/// A player's aggregated record within one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Standing {
    pub player_id: PlayerId,
    pub wins: u32,
    pub sets_won: u32,
    pub sets_lost: u32,
    pub points_for: u32,
    pub points_against: u32,
}

impl Standing {
    pub fn new(player_id: PlayerId) -> Self {
        Self {
            player_id,
            ..Default::default()
        }
    }

    pub fn set_difference(&self) -> i64 {
        i64::from(self.sets_won) - i64::from(self.sets_lost)
    }

    pub fn point_difference(&self) -> i64 {
        i64::from(self.points_for) - i64::from(self.points_against)
    }
}

/// Standings of one group, best first.
pub type Ranking = Vec<Standing>;

/// The outcome of a single match from the perspective of both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct MatchTally {
    sets: [u32; 2],
    points: [u32; 2],
}

impl MatchTally {
    fn from_match(game: &Match) -> Self {
        let mut tally = Self::default();
        for (a, b) in set_pairs(&game.scores()) {
            // Scores are validated non-negative by the parser.
            tally.points[0] = tally.points[0].saturating_add(a.unsigned_abs());
            tally.points[1] = tally.points[1].saturating_add(b.unsigned_abs());
            if a > b {
                tally.sets[0] += 1;
            } else if b > a {
                tally.sets[1] += 1;
            }
        }
        tally
    }

    fn winner(&self) -> Option<Side> {
        let by_sets = self.sets[0].cmp(&self.sets[1]);
        let by_points = self.points[0].cmp(&self.points[1]);
        match by_sets.then(by_points) {
            std::cmp::Ordering::Greater => Some(Side::A),
            std::cmp::Ordering::Less => Some(Side::B),
            std::cmp::Ordering::Equal => None,
        }
    }

    fn index(side: Side) -> usize {
        match side {
            Side::A => 0,
            Side::B => 1,
        }
    }

    fn apply(&self, side: Side, standing: &mut Standing) {
        let (own, other) = (Self::index(side), Self::index(side.opponent()));
        standing.sets_won += self.sets[own];
        standing.sets_lost += self.sets[other];
        standing.points_for = standing.points_for.saturating_add(self.points[own]);
        standing.points_against = standing.points_against.saturating_add(self.points[other]);
        if self.winner() == Some(side) {
            standing.wins += 1;
        }
    }
}

/// Every match with its result parsed, so a ranking reads each result once.
fn score_matches(matches: &[Match]) -> Vec<(&Match, MatchTally)> {
    matches
        .iter()
        .map(|game| (game, MatchTally::from_match(game)))
        .collect()
}

/// Aggregates the given matches for every member.
///
/// A match only counts for the sides that are members. With `require_both` a match counts
/// only when both sides are members.
fn tally(
    members: &BTreeSet<PlayerId>,
    scored: &[(&Match, MatchTally)],
    require_both: bool,
) -> BTreeMap<PlayerId, Standing> {
    let mut standings: BTreeMap<PlayerId, Standing> = members
        .iter()
        .map(|id| (*id, Standing::new(*id)))
        .collect();

    for (game, result) in scored {
        let sides: Vec<(Side, PlayerId)> = [Side::A, Side::B]
            .into_iter()
            .filter_map(|side| game.player(side).map(|id| (side, id)))
            .filter(|(_, id)| members.contains(id))
            .collect();
        if sides.is_empty() || (require_both && sides.len() < 2) {
            continue;
        }
        // A player cannot score against themselves.
        if game.player(Side::A) == game.player(Side::B) {
            continue;
        }

        for (side, id) in sides {
            if let Some(standing) = standings.get_mut(&id) {
                result.apply(side, standing);
            }
        }
    }

    standings
}

/// Aggregated records for the given players, unsorted.
pub fn compute_standings(players: &[Player], matches: &[Match]) -> BTreeMap<PlayerId, Standing> {
    let members = players.iter().map(|p| p.player_id).collect();
    tally(&members, &score_matches(matches), false)
}

/// Ranks a group's players. The result does not depend on the order of either input.
pub fn rank(players: &[Player], matches: &[Match]) -> Ranking {
    let names: HashMap<PlayerId, &Player> = players.iter().map(|p| (p.player_id, p)).collect();
    let members: BTreeSet<PlayerId> = players.iter().map(|p| p.player_id).collect();
    let scored = score_matches(matches);
    let overall = tally(&members, &scored, false);

    let mut by_wins: BTreeMap<u32, BTreeSet<PlayerId>> = BTreeMap::new();
    for standing in overall.values() {
        by_wins
            .entry(standing.wins)
            .or_default()
            .insert(standing.player_id);
    }

    let mut head_to_head: HashMap<PlayerId, (i64, i64)> = HashMap::new();
    for tied in by_wins.values().filter(|tied| matches!(tied.len(), 2 | 3)) {
        for (id, standing) in tally(tied, &scored, true) {
            head_to_head.insert(id, (standing.set_difference(), standing.point_difference()));
        }
    }

    let mut ranking: Ranking = overall.into_values().collect();
    ranking.sort_by_cached_key(|standing| {
        let id = standing.player_id;
        let (h2h_sets, h2h_points) = head_to_head.get(&id).copied().unwrap_or_default();
        let (last, first) = names
            .get(&id)
            .map(|p| (p.last_name.to_lowercase(), p.first_name.to_lowercase()))
            .unwrap_or_default();
        (
            Reverse(standing.wins),
            Reverse(h2h_sets),
            Reverse(h2h_points),
            Reverse(standing.set_difference()),
            Reverse(standing.point_difference()),
            last,
            first,
            id,
        )
    });
    ranking
}

/// The player finishing at `position` (1-indexed).
pub fn player_at(ranking: &[Standing], position: i32) -> Option<PlayerId> {
    let index = usize::try_from(position).ok()?.checked_sub(1)?;
    ranking.get(index).map(|standing| standing.player_id)
}

/// An absolute finishing place on the tournament-wide leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub placement: i32,
    pub group_id: GroupId,
    pub standing: Standing,
}

/// Maps a group's ranking onto absolute placements starting at the group's
/// `highest_position`. Groups without one contribute nothing.
pub fn placements(group: &Group, ranking: &[Standing]) -> Vec<Placement> {
    let Some(highest) = group.highest_position else {
        return Vec::new();
    };
    ranking
        .iter()
        .zip(highest..)
        .map(|(standing, placement)| Placement {
            placement,
            group_id: group.group_id,
            standing: *standing,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{placements, player_at, rank, Ranking};
    use crate::{
        database::models::Group,
        seeding::fixtures::{played, player, scenario_a_matches, scenario_a_players},
    };

    fn order(ranking: &Ranking) -> Vec<i32> {
        ranking.iter().map(|s| s.player_id).collect()
    }

    #[test]
    fn scenario_a_ranks_by_wins() {
        let ranking = rank(&scenario_a_players(10), &scenario_a_matches(10));
        assert_eq!(order(&ranking), vec![1, 2, 3, 4]);
        let wins: Vec<u32> = ranking.iter().map(|s| s.wins).collect();
        assert_eq!(wins, vec![3, 2, 1, 0]);

        let p1 = ranking[0];
        assert_eq!((p1.sets_won, p1.sets_lost), (6, 1));
        assert_eq!((p1.points_for, p1.points_against), (75, 47));
    }

    #[test]
    fn input_order_does_not_matter() {
        let players = scenario_a_players(10);
        let matches = scenario_a_matches(10);
        let expected = rank(&players, &matches);

        for shift in 0..matches.len() {
            let mut players = players.clone();
            let mut matches = matches.clone();
            let len = players.len();
            players.rotate_left(shift % len);
            matches.rotate_left(shift);
            if shift % 2 == 1 {
                players.reverse();
                matches.reverse();
            }
            assert_eq!(rank(&players, &matches), expected);
        }
    }

    #[test]
    fn two_way_tie_uses_head_to_head() {
        let players: Vec<_> = (1..=4).map(|id| player(id, "P", &format!("Player{}", id), 1)).collect();
        let matches = vec![
            played(1, 1, 2, 1, json!([11, 9, 9, 11, 11, 9])),
            played(2, 1, 1, 3, json!([11, 0, 11, 0])),
            played(3, 1, 1, 4, json!([11, 0, 11, 0])),
            played(4, 1, 2, 3, json!([11, 9, 9, 11, 11, 9])),
            played(5, 1, 4, 2, json!([11, 9, 11, 9])),
            played(6, 1, 3, 4, json!([11, 0, 11, 0])),
        ];

        let ranking = rank(&players, &matches);
        // Player 1 has the better overall set difference but lost to player 2.
        assert!(ranking[1].set_difference() > ranking[0].set_difference());
        assert_eq!(order(&ranking), vec![2, 1, 3, 4]);
    }

    #[test]
    fn three_way_tie_ignores_matches_against_others() {
        let players: Vec<_> = (1..=4).map(|id| player(id, "P", &format!("Player{}", id), 1)).collect();
        let mut matches = vec![
            played(1, 1, 1, 2, json!([11, 5, 5, 11, 11, 5])),
            played(2, 1, 2, 3, json!([11, 7, 7, 11, 11, 7])),
            played(3, 1, 3, 1, json!([11, 8, 8, 11, 11, 8])),
        ];
        let against_four = [
            played(4, 1, 1, 4, json!([12, 10, 12, 10])),
            played(5, 1, 2, 4, json!([11, 5, 11, 5])),
            played(6, 1, 3, 4, json!([11, 0, 11, 0])),
        ];
        matches.extend(against_four.iter().cloned());

        let ranking = rank(&players, &matches);
        assert_eq!(order(&ranking), vec![1, 3, 2, 4]);
        // Overall point difference alone would have ranked them 3, 2, 1.
        assert!(ranking[0].point_difference() < ranking[2].point_difference());
        assert!(ranking[2].point_difference() < ranking[1].point_difference());

        let flattened: Vec<_> = matches
            .iter()
            .map(|m| {
                let mut m = m.clone();
                if m.match_id >= 4 {
                    m.result = json!([11, 9, 11, 9]);
                }
                m
            })
            .collect();
        assert_eq!(order(&rank(&players, &flattened)), vec![1, 3, 2, 4]);
    }

    #[test]
    fn scenario_c_falls_through_to_surname() {
        let players = vec![
            player(1, "Zoe", "Carter", 1),
            player(2, "Yann", "adams", 1),
            player(3, "Xia", "Baker", 1),
        ];
        let matches = vec![
            played(1, 1, 1, 2, json!([11, 9, 9, 11, 11, 9])),
            played(2, 1, 2, 3, json!([11, 9, 9, 11, 11, 9])),
            played(3, 1, 3, 1, json!([11, 9, 9, 11, 11, 9])),
        ];

        let first = rank(&players, &matches);
        assert!(first.iter().all(|s| s.wins == 1 && s.set_difference() == 0));
        assert!(first.iter().all(|s| s.point_difference() == 0));
        assert_eq!(order(&first), vec![2, 3, 1]);

        for _ in 0..5 {
            let mut reversed = players.clone();
            reversed.reverse();
            assert_eq!(rank(&reversed, &matches), first);
        }
    }

    #[test]
    fn same_surname_falls_back_to_first_name_then_id() {
        let players = vec![
            player(9, "Ann", "Lee", 1),
            player(3, "Ann", "Lee", 1),
            player(5, "Aaron", "Lee", 1),
        ];
        assert_eq!(order(&rank(&players, &[])), vec![5, 3, 9]);
    }

    #[test]
    fn level_match_awards_no_win() {
        let players = vec![player(1, "A", "Alpha", 1), player(2, "B", "Beta", 1)];
        let matches = vec![played(1, 1, 1, 2, json!([11, 9, 9, 11]))];
        let ranking = rank(&players, &matches);
        assert!(ranking.iter().all(|s| s.wins == 0 && s.sets_won == 1));
    }

    #[test]
    fn equal_sets_decided_by_points() {
        let players = vec![player(1, "A", "Alpha", 1), player(2, "B", "Beta", 1)];
        let matches = vec![played(1, 1, 1, 2, json!([11, 3, 9, 11]))];
        let ranking = rank(&players, &matches);
        assert_eq!(order(&ranking), vec![1, 2]);
        assert_eq!(ranking[0].wins, 1);
    }

    #[test]
    fn outsiders_do_not_count() {
        let players = vec![player(1, "A", "Alpha", 1), player(2, "B", "Beta", 1)];
        let matches = vec![
            played(1, 1, 1, 2, json!([11, 3, 11, 3])),
            played(2, 2, 7, 8, json!([11, 3, 11, 3])),
            played(3, 2, 2, 7, json!([11, 3, 11, 3])),
        ];
        let ranking = rank(&players, &matches);
        assert_eq!(ranking.len(), 2);
        assert_eq!(ranking[1].player_id, 2);
        // The match against player 7 still counts for player 2.
        assert_eq!(ranking[1].wins, 1);
    }

    #[test]
    fn huge_scores_saturate_instead_of_overflowing() {
        let max = i32::MAX;
        let players = vec![player(1, "A", "Alpha", 1), player(2, "B", "Beta", 1)];
        let matches = vec![
            played(1, 1, 1, 2, json!([max, 0, max, 0, max, 0])),
            played(2, 1, 1, 2, json!([max, 0])),
        ];
        let ranking = rank(&players, &matches);
        assert_eq!(order(&ranking), vec![1, 2]);
        assert_eq!(ranking[0].wins, 2);
        assert_eq!(ranking[0].sets_won, 4);
        assert_eq!(ranking[0].points_for, u32::MAX);
        assert_eq!(ranking[1].points_against, u32::MAX);
    }

    #[test]
    fn unreadable_result_counts_as_unplayed() {
        let players = vec![player(1, "A", "Alpha", 1), player(2, "B", "Beta", 1)];
        let matches = vec![played(1, 1, 2, 1, json!("garbage"))];
        assert_eq!(rank(&players, &matches), rank(&players, &[]));
    }

    #[test]
    fn positions_are_one_indexed() {
        let ranking = rank(&scenario_a_players(10), &scenario_a_matches(10));
        assert_eq!(player_at(&ranking, 1), Some(1));
        assert_eq!(player_at(&ranking, 4), Some(4));
        assert_eq!(player_at(&ranking, 0), None);
        assert_eq!(player_at(&ranking, 5), None);
        assert_eq!(player_at(&ranking, -1), None);
    }

    #[test]
    fn placements_offset_by_highest_position() {
        let ranking = rank(&scenario_a_players(10), &scenario_a_matches(10));
        let mut group = Group::new(10, 1, "A");
        assert!(placements(&group, &ranking).is_empty());

        group.highest_position = Some(5);
        let places: Vec<(i32, i32)> = placements(&group, &ranking)
            .iter()
            .map(|p| (p.placement, p.standing.player_id))
            .collect();
        assert_eq!(places, vec![(5, 1), (6, 2), (7, 3), (8, 4)]);
    }
}
