//! Builders shared by the unit tests.

use serde_json::{json, Value};

use crate::database::models::{GroupId, Match, MatchId, Participant, Player, PlayerId};

pub fn player(player_id: PlayerId, first_name: &str, last_name: &str, group_id: GroupId) -> Player {
    let mut player = Player::new(player_id, first_name, last_name, "TTC Test");
    player.groups.insert(group_id);
    player
}

pub fn played(match_id: MatchId, group_id: GroupId, a: PlayerId, b: PlayerId, result: Value) -> Match {
    let mut game = Match::new(
        match_id,
        group_id,
        Participant::Player(a),
        Participant::Player(b),
    );
    game.result = result;
    game
}

pub fn slotted(match_id: MatchId, group_id: GroupId, slot_a: i32, slot_b: i32) -> Match {
    Match::new(
        match_id,
        group_id,
        Participant::Slot {
            position: slot_a,
            player_id: None,
        },
        Participant::Slot {
            position: slot_b,
            player_id: None,
        },
    )
}

/// Players 1 to 4, all in `group_id`.
pub fn scenario_a_players(group_id: GroupId) -> Vec<Player> {
    vec![
        player(1, "Ada", "Lovelace", group_id),
        player(2, "Alan", "Turing", group_id),
        player(3, "Grace", "Hopper", group_id),
        player(4, "Edsger", "Dijkstra", group_id),
    ]
}

/// A full round robin in which player 1 beats everyone, player 2 beats 3 and 4, and 3 beats 4.
pub fn scenario_a_matches(group_id: GroupId) -> Vec<Match> {
    let base = group_id * 100;
    vec![
        played(base + 1, group_id, 1, 2, json!([11, 5, 11, 7])),
        played(base + 2, group_id, 1, 3, json!([11, 9, 9, 11, 11, 8])),
        played(base + 3, group_id, 1, 4, json!([11, 3, 11, 4])),
        played(base + 4, group_id, 2, 3, json!([11, 6, 11, 6])),
        played(base + 5, group_id, 2, 4, json!([11, 9, 11, 2])),
        played(base + 6, group_id, 3, 4, json!([11, 5, 11, 7])),
    ]
}
