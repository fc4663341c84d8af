//! Which groups seed which.
//!
//! Every group may declare an ordered list of seed slots, each naming a finishing position in
//! a source group. Read in reverse, the declarations form a directed graph from source groups
//! to the groups they qualify players into.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::{
    database::models::{Group, GroupId},
    utils::error::SeedingError,
};

/// "The player finishing at `position` in `source_group_id`".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeedSlot {
    pub position: i32,
    pub source_group_id: GroupId,
}

impl SeedSlot {
    pub fn new(position: i32, source_group_id: GroupId) -> Self {
        Self {
            position,
            source_group_id,
        }
    }
}

/// One slot of a destination group fed by a given source group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotTarget {
    pub destination_group_id: GroupId,
    /// 1-indexed place of the slot in the destination's declaration.
    pub slot_index: usize,
    pub slot_position: i32,
}

/// Parses a stored seeding declaration.
///
/// Accepts `[[position, group], ...]`, `[{"position": p, "group": g}, ...]` (or the
/// `slotPosition`/`sourceGroupId` keys) and `"p:g, p:g"`. `None` means malformed: one bad
/// entry spoils the whole declaration.
pub fn parse_seeding(raw: &Value) -> Option<Vec<SeedSlot>> {
    let slots = match raw {
        Value::Null => Vec::new(),
        Value::Array(entries) => entries.iter().map(parse_entry).collect::<Option<Vec<_>>>()?,
        Value::String(text) if text.trim().starts_with('[') => {
            return parse_seeding(&serde_json::from_str(text.trim()).ok()?);
        }
        Value::String(text) => text
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (position, group) = entry.split_once(':')?;
                Some(SeedSlot::new(
                    position.trim().parse().ok()?,
                    group.trim().parse().ok()?,
                ))
            })
            .collect::<Option<Vec<_>>>()?,
        _ => return None,
    };

    slots.iter().all(|slot| slot.position >= 1).then_some(slots)
}

/// The canonical stored form of a declaration.
pub fn seeding_value(slots: &[SeedSlot]) -> Value {
    Value::Array(
        slots
            .iter()
            .map(|slot| json!([slot.position, slot.source_group_id]))
            .collect(),
    )
}

fn parse_entry(entry: &Value) -> Option<SeedSlot> {
    match entry {
        Value::Array(pair) if pair.len() == 2 => Some(SeedSlot::new(int(&pair[0])?, int(&pair[1])?)),
        Value::Object(_) => {
            let position = entry.get("position").or_else(|| entry.get("slotPosition"))?;
            let group = entry.get("group").or_else(|| entry.get("sourceGroupId"))?;
            Some(SeedSlot::new(int(position)?, int(group)?))
        }
        _ => None,
    }
}

fn int(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Reverse index from source groups to the slots they feed.
#[derive(Debug, Default, Clone)]
pub struct QualificationGraph {
    targets: BTreeMap<GroupId, Vec<SlotTarget>>,
    sources: BTreeMap<GroupId, BTreeSet<GroupId>>,
    groups: BTreeSet<GroupId>,
    malformed: BTreeSet<GroupId>,
}

impl QualificationGraph {
    /// Builds the graph of one tournament. Groups with malformed declarations are left out as
    /// destinations; everything else is unaffected.
    pub fn build(groups: &[Group]) -> Self {
        let mut graph = Self::default();
        for group in groups {
            graph.groups.insert(group.group_id);
            let Some(slots) = group.seed_slots() else {
                warn!(
                    "Group {} has a malformed seeding declaration, skipping it: {}",
                    group.group_id, group.seeding
                );
                graph.malformed.insert(group.group_id);
                continue;
            };
            graph.add_slots(group.group_id, &slots);
        }
        graph
    }

    fn add_slots(&mut self, destination: GroupId, slots: &[SeedSlot]) {
        for (index, slot) in slots.iter().enumerate() {
            self.groups.insert(slot.source_group_id);
            self.targets
                .entry(slot.source_group_id)
                .or_default()
                .push(SlotTarget {
                    destination_group_id: destination,
                    slot_index: index + 1,
                    slot_position: slot.position,
                });
            self.sources
                .entry(destination)
                .or_default()
                .insert(slot.source_group_id);
        }
    }

    /// The same graph with `destination`'s declaration replaced by `slots`.
    pub fn with_seeding(&self, destination: GroupId, slots: &[SeedSlot]) -> Self {
        let mut graph = self.clone();
        for targets in graph.targets.values_mut() {
            targets.retain(|target| target.destination_group_id != destination);
        }
        graph.targets.retain(|_, targets| !targets.is_empty());
        graph.sources.remove(&destination);
        graph.malformed.remove(&destination);
        graph.groups.insert(destination);
        graph.add_slots(destination, slots);
        graph
    }

    pub fn targets_of(&self, source: GroupId) -> &[SlotTarget] {
        self.targets.get(&source).map(Vec::as_slice).unwrap_or_default()
    }

    /// Groups with at least one slot fed by `source`.
    pub fn destinations_of(&self, source: GroupId) -> BTreeSet<GroupId> {
        self.targets_of(source)
            .iter()
            .map(|target| target.destination_group_id)
            .collect()
    }

    pub fn sources_of(&self, destination: GroupId) -> BTreeSet<GroupId> {
        self.sources.get(&destination).cloned().unwrap_or_default()
    }

    /// Every group that declares at least one seed slot.
    pub fn seeded_groups(&self) -> BTreeSet<GroupId> {
        self.sources.keys().copied().collect()
    }

    pub fn is_malformed(&self, group: GroupId) -> bool {
        self.malformed.contains(&group)
    }

    /// A seeding cycle, listed from its first group back to that same group.
    pub fn find_cycle(&self) -> Option<Vec<GroupId>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit(
            graph: &QualificationGraph,
            group: GroupId,
            marks: &mut BTreeMap<GroupId, Mark>,
            path: &mut Vec<GroupId>,
        ) -> Option<Vec<GroupId>> {
            match marks.get(&group) {
                Some(Mark::Done) => return None,
                Some(Mark::Visiting) => {
                    let start = path.iter().position(|g| *g == group)?;
                    let mut cycle = path[start..].to_vec();
                    cycle.push(group);
                    return Some(cycle);
                }
                None => {}
            }

            marks.insert(group, Mark::Visiting);
            path.push(group);
            for next in graph.destinations_of(group) {
                if let Some(cycle) = visit(graph, next, marks, path) {
                    return Some(cycle);
                }
            }
            path.pop();
            marks.insert(group, Mark::Done);
            None
        }

        let mut marks = BTreeMap::new();
        self.groups
            .iter()
            .find_map(|group| visit(self, *group, &mut marks, &mut Vec::new()))
    }

    /// The shortest chain of seedings leading from `from` to `to`, both included.
    pub fn path(&self, from: GroupId, to: GroupId) -> Option<Vec<GroupId>> {
        let mut parents: BTreeMap<GroupId, GroupId> = BTreeMap::new();
        let mut queue = VecDeque::from([from]);
        while let Some(group) = queue.pop_front() {
            if group == to {
                let mut path = vec![to];
                let mut current = to;
                while let Some(parent) = parents.get(&current) {
                    path.push(*parent);
                    current = *parent;
                }
                path.reverse();
                return Some(path);
            }
            for next in self.destinations_of(group) {
                if next != from && !parents.contains_key(&next) {
                    parents.insert(next, group);
                    queue.push_back(next);
                }
            }
        }
        None
    }

    /// The cycle that seeding `destination` from `sources` would close, if any.
    pub fn cycle_through(&self, destination: GroupId, sources: &[GroupId]) -> Option<Vec<GroupId>> {
        sources.iter().find_map(|source| {
            let mut cycle = self.path(destination, *source)?;
            cycle.push(destination);
            Some(cycle)
        })
    }

    /// Seeded groups split into layers that can be synced one after another. Groups caught in a
    /// cycle end up together in a last layer.
    pub fn sync_layers(&self) -> Vec<Vec<GroupId>> {
        let seeded = self.seeded_groups();
        let mut layers: Vec<Vec<GroupId>> = self
            .layers(&self.groups, None)
            .into_iter()
            .map(|layer| layer.into_iter().filter(|g| seeded.contains(g)).collect::<Vec<_>>())
            .filter(|layer| !layer.is_empty())
            .collect();
        let placed: BTreeSet<GroupId> = layers.iter().flatten().copied().collect();
        let stuck: Vec<GroupId> = seeded.difference(&placed).copied().collect();
        if !stuck.is_empty() {
            warn!("Groups {:?} are part of a seeding cycle", stuck);
            layers.push(stuck);
        }
        layers
    }

    /// All groups, every source before the groups it seeds.
    pub fn topological_order(&self) -> Result<Vec<GroupId>, SeedingError> {
        let layers = self.layers(&self.groups, None);
        let ordered: Vec<GroupId> = layers.into_iter().flatten().collect();
        if ordered.len() < self.groups.len() {
            return Err(SeedingError::CyclicSeeding(
                self.find_cycle().unwrap_or_default(),
            ));
        }
        Ok(ordered)
    }

    /// The groups downstream of `source`, at most `max_depth` hops away, split into layers that
    /// can be synced one after another. Groups caught in a cycle end up together in a last layer.
    pub fn downstream_layers(&self, source: GroupId, max_depth: usize) -> Vec<Vec<GroupId>> {
        let mut reached = BTreeSet::new();
        let mut queue = VecDeque::from([(source, 0)]);
        while let Some((group, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for next in self.destinations_of(group) {
                if next != source && reached.insert(next) {
                    queue.push_back((next, depth + 1));
                }
            }
        }

        let mut layers = self.layers(&reached, Some(source));
        let placed: BTreeSet<GroupId> = layers.iter().flatten().copied().collect();
        let stuck: Vec<GroupId> = reached.difference(&placed).copied().collect();
        if !stuck.is_empty() {
            warn!(
                "Groups {:?} are part of a seeding cycle downstream of group {}",
                stuck, source
            );
            layers.push(stuck);
        }
        layers
    }

    /// Kahn's algorithm over the subgraph induced by `nodes`, ignoring edges from `ignore`.
    fn layers(&self, nodes: &BTreeSet<GroupId>, ignore: Option<GroupId>) -> Vec<Vec<GroupId>> {
        let mut in_degree: BTreeMap<GroupId, usize> = nodes
            .iter()
            .map(|group| {
                let degree = self
                    .sources_of(*group)
                    .iter()
                    .filter(|source| nodes.contains(source) && Some(**source) != ignore)
                    .count();
                (*group, degree)
            })
            .collect();

        let mut layers = Vec::new();
        loop {
            let ready: Vec<GroupId> = in_degree
                .iter()
                .filter(|(_, degree)| **degree == 0)
                .map(|(group, _)| *group)
                .collect();
            if ready.is_empty() {
                break;
            }
            for group in &ready {
                in_degree.remove(group);
                for next in self.destinations_of(*group) {
                    if let Some(degree) = in_degree.get_mut(&next) {
                        *degree -= 1;
                    }
                }
            }
            layers.push(ready);
        }
        layers
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{parse_seeding, seeding_value, QualificationGraph, SeedSlot, SlotTarget};
    use crate::{database::models::Group, utils::error::SeedingError};

    fn group(id: i32, seeding: serde_json::Value) -> Group {
        let mut group = Group::new(id, 1, &format!("Group {}", id));
        group.seeding = seeding;
        group
    }

    #[test]
    fn parses_every_declaration_shape() {
        let expected = Some(vec![SeedSlot::new(1, 7), SeedSlot::new(2, 8)]);
        for raw in [
            json!([[1, 7], [2, 8]]),
            json!([{"position": 1, "group": 7}, {"slotPosition": 2, "sourceGroupId": "8"}]),
            json!("1:7, 2:8"),
            json!("[[1, 7], [2, 8]]"),
        ] {
            assert_eq!(parse_seeding(&raw), expected, "declaration {}", raw);
        }
        assert_eq!(parse_seeding(&json!(null)), Some(vec![]));
        assert_eq!(parse_seeding(&json!([])), Some(vec![]));
    }

    #[test]
    fn rejects_malformed_declarations() {
        for raw in [
            json!([[1, 7], [2]]),
            json!([[0, 7]]),
            json!("1-7"),
            json!({"position": 1}),
            json!(12),
        ] {
            assert_eq!(parse_seeding(&raw), None, "declaration {}", raw);
        }
    }

    #[test]
    fn canonical_form_round_trips() {
        let slots = vec![SeedSlot::new(1, 3), SeedSlot::new(4, 2)];
        assert_eq!(parse_seeding(&seeding_value(&slots)), Some(slots));
    }

    #[test]
    fn indexes_destinations_by_source() {
        let graph = QualificationGraph::build(&[
            group(1, json!(null)),
            group(2, json!(null)),
            group(3, json!([[1, 1], [1, 2], [2, 1]])),
            group(4, json!([[3, 1]])),
            group(5, json!("broken")),
        ]);

        assert_eq!(
            graph.targets_of(1),
            &[
                SlotTarget {
                    destination_group_id: 3,
                    slot_index: 1,
                    slot_position: 1
                },
                SlotTarget {
                    destination_group_id: 3,
                    slot_index: 3,
                    slot_position: 2
                },
                SlotTarget {
                    destination_group_id: 4,
                    slot_index: 1,
                    slot_position: 3
                },
            ]
        );
        assert_eq!(graph.destinations_of(1).into_iter().collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(graph.destinations_of(2).into_iter().collect::<Vec<_>>(), vec![3]);
        assert!(graph.destinations_of(3).is_empty());
        assert_eq!(graph.seeded_groups().into_iter().collect::<Vec<_>>(), vec![3, 4]);
        assert!(graph.is_malformed(5));
        assert!(!graph.is_malformed(3));
    }

    #[test]
    fn orders_sources_first() {
        let graph = QualificationGraph::build(&[
            group(4, json!([[1, 3], [1, 2]])),
            group(3, json!([[1, 1]])),
            group(2, json!([[2, 1]])),
            group(1, json!(null)),
        ]);
        assert_eq!(graph.find_cycle(), None);
        assert_eq!(graph.topological_order().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn detects_cycles() {
        let graph = QualificationGraph::build(&[
            group(1, json!([[1, 3]])),
            group(2, json!([[1, 1]])),
            group(3, json!([[1, 2]])),
        ]);
        assert_eq!(graph.find_cycle(), Some(vec![1, 2, 3, 1]));
        assert_eq!(
            graph.topological_order(),
            Err(SeedingError::CyclicSeeding(vec![1, 2, 3, 1]))
        );

        let self_seeded = QualificationGraph::build(&[group(1, json!([[2, 1]]))]);
        assert_eq!(self_seeded.find_cycle(), Some(vec![1, 1]));
    }

    #[test]
    fn replacing_a_declaration_can_close_a_cycle() {
        let graph = QualificationGraph::build(&[group(1, json!(null)), group(2, json!([[1, 1]]))]);
        assert_eq!(graph.find_cycle(), None);

        let edited = graph.with_seeding(1, &[SeedSlot::new(1, 2)]);
        assert_eq!(edited.find_cycle(), Some(vec![1, 2, 1]));

        let cleared = edited.with_seeding(1, &[]);
        assert_eq!(cleared.find_cycle(), None);
        assert!(cleared.destinations_of(2).is_empty());
    }

    #[test]
    fn downstream_layers_respect_depth_and_order() {
        // 1 -> 2 -> 3 -> 4 and 1 -> 3.
        let graph = QualificationGraph::build(&[
            group(1, json!(null)),
            group(2, json!([[1, 1]])),
            group(3, json!([[1, 1], [1, 2]])),
            group(4, json!([[1, 3]])),
        ]);
        assert_eq!(graph.downstream_layers(1, 8), vec![vec![2], vec![3], vec![4]]);
        // Group 3 is one hop away but still waits for group 2.
        assert_eq!(graph.downstream_layers(1, 1), vec![vec![2], vec![3]]);
        assert_eq!(graph.downstream_layers(4, 8), Vec::<Vec<i32>>::new());
        assert_eq!(graph.downstream_layers(1, 0), Vec::<Vec<i32>>::new());
    }

    #[test]
    fn downstream_layers_terminate_on_cycles() {
        let graph = QualificationGraph::build(&[
            group(1, json!(null)),
            group(2, json!([[1, 1], [1, 3]])),
            group(3, json!([[1, 2]])),
        ]);
        assert_eq!(graph.downstream_layers(1, 8), vec![vec![2, 3]]);
    }

    #[test]
    fn finds_the_cycle_an_edit_would_close() {
        let graph = QualificationGraph::build(&[
            group(1, json!(null)),
            group(2, json!([[1, 1]])),
            group(3, json!([[1, 2]])),
        ]);
        assert_eq!(graph.path(1, 3), Some(vec![1, 2, 3]));
        assert_eq!(graph.path(3, 1), None);

        assert_eq!(graph.cycle_through(1, &[3]), Some(vec![1, 2, 3, 1]));
        assert_eq!(graph.cycle_through(2, &[2]), Some(vec![2, 2]));
        assert_eq!(graph.cycle_through(3, &[1, 2]), None);
    }

    #[test]
    fn sync_layers_hold_only_seeded_groups() {
        let graph = QualificationGraph::build(&[
            group(1, json!(null)),
            group(2, json!([[1, 1]])),
            group(3, json!([[2, 1]])),
            group(4, json!([[1, 2], [1, 3]])),
            group(5, json!([[1, 6]])),
            group(6, json!([[1, 5]])),
        ]);
        assert_eq!(graph.sync_layers(), vec![vec![2, 3], vec![4], vec![5, 6]]);
    }
}
