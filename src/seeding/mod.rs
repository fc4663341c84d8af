/// Normalizes the many encodings a stored match result may come in.
pub mod result;
/// Ranks the players of a round robin group.
pub mod standings;
pub mod completion;
/// Seeding declarations and the graph they form across a tournament.
pub mod graph;
/// Resolves seed slots and reconciles a destination group.
pub mod propagation;
/// Drives propagation after results or seeding declarations change.
pub mod orchestrator;

#[cfg(test)]
pub(crate) mod fixtures;
