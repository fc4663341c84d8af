use std::collections::HashMap;

use prettytable::{row, Table};
use tracing::{error, info, info_span, warn};

use seedsync::{
    config::Config,
    database::{models::Player, PgDatabase, PlayerDatabase},
    log::setup_tracing,
    seeding::orchestrator::Orchestrator,
    utils::error::SeedingError,
    SeedError,
};

#[tokio::main]
async fn main() {
    if let Err(e) = setup_tracing() {
        panic!("Error trying to setup tracing: {}", e);
    }

    if let Err(e) = run().await {
        error!("{:#}", e);
        panic!("Error trying to sync the tournament: {}", e);
    }
}

/// Re-syncs every seeded group of `TOURNAMENT_ID` and prints the resulting leaderboard.
async fn run() -> Result<(), SeedError> {
    let setup_span = info_span!("seedsync_setup");
    let guard = setup_span.enter();

    let config = Config::from_env()?;
    let tournament_id: i32 = std::env::var("TOURNAMENT_ID")
        .map_err(|_| SeedingError::MissingConfig("TOURNAMENT_ID".to_string()))
        .and_then(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| SeedingError::InvalidConfig("TOURNAMENT_ID".to_string(), raw))
        })?;

    let database = PgDatabase::connect(&config).await?;
    database.migrate().await?;
    info!("Migrations are up to date");
    drop(guard);

    let orchestrator = Orchestrator::new(database, config);
    let report = orchestrator.resync_tournament(tournament_id).await?;
    info!(
        "Synced {} groups, {} failed",
        report.synced.len(),
        report.failed.len()
    );
    for (group_id, e) in &report.failed {
        warn!("Group {} could not be synced: {:#}", group_id, e);
    }

    let leaderboard = orchestrator.leaderboard(tournament_id).await?;
    let mut names: HashMap<i32, Player> = HashMap::new();
    for place in &leaderboard {
        if names.contains_key(&place.standing.player_id) {
            continue;
        }
        for player in orchestrator.database().list_players(place.group_id).await? {
            names.insert(player.player_id, player);
        }
    }

    let mut table = Table::new();
    table.set_titles(row!["Place", "Name", "Club", "Wins", "Sets", "Points"]);
    for place in &leaderboard {
        let standing = &place.standing;
        let (name, club) = names
            .get(&standing.player_id)
            .map(|player| (player.full_name(), player.club.clone()))
            .unwrap_or_else(|| (format!("Player {}", standing.player_id), String::new()));
        table.add_row(row![
            place.placement,
            name,
            club,
            standing.wins,
            format!("{}:{}", standing.sets_won, standing.sets_lost),
            format!("{}:{}", standing.points_for, standing.points_against)
        ]);
    }
    table.printstd();

    if !report.is_success() {
        return Err(anyhow::anyhow!(
            "{} of {} groups failed to sync",
            report.failed.len(),
            report.synced.len() + report.failed.len()
        ));
    }
    Ok(())
}
