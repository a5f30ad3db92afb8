// In-memory assembly of plan trees from flat, batch-fetched rows.

use std::collections::HashMap;

use uuid::Uuid;

use crate::models::{
    Exercise, Macrocycle, MacrocycleNode, Mesocycle, MesocycleNode, Microcycle, MicrocycleNode,
    Preset, PresetDetail, PresetGroup, PresetGroupNode, PresetNode,
};

/// Flat rows below some root, as returned by the `IN`-filtered store reads.
#[derive(Debug, Default)]
pub struct PlanRows {
    pub mesocycles: Vec<Mesocycle>,
    pub microcycles: Vec<Microcycle>,
    pub preset_groups: Vec<PresetGroup>,
    pub presets: Vec<Preset>,
    pub details: Vec<PresetDetail>,
    pub exercises: Vec<Exercise>,
}

/// Children bucketed by parent id, each bucket already in display order.
pub struct TreeBuilder {
    mesocycles: HashMap<Uuid, Vec<Mesocycle>>,
    microcycles: HashMap<Uuid, Vec<Microcycle>>,
    preset_groups: HashMap<Uuid, Vec<PresetGroup>>,
    presets: HashMap<Uuid, Vec<Preset>>,
    details: HashMap<Uuid, Vec<PresetDetail>>,
    exercises: HashMap<Uuid, Exercise>,
}

fn bucket<T, F>(rows: Vec<T>, parent: F) -> HashMap<Uuid, Vec<T>>
where
    F: Fn(&T) -> Option<Uuid>,
{
    let mut map: HashMap<Uuid, Vec<T>> = HashMap::new();
    for row in rows {
        if let Some(parent_id) = parent(&row) {
            map.entry(parent_id).or_default().push(row);
        }
    }
    map
}

impl TreeBuilder {
    pub fn new(rows: PlanRows) -> Self {
        let mut mesocycles = bucket(rows.mesocycles, |m| Some(m.macrocycle_id));
        for children in mesocycles.values_mut() {
            children.sort_by_key(|m| (m.ordinal, m.start_date));
        }

        let mut microcycles = bucket(rows.microcycles, |m| m.mesocycle_id);
        for children in microcycles.values_mut() {
            children.sort_by_key(|m| (m.week_index, m.start_date));
        }

        let mut preset_groups = bucket(rows.preset_groups, |g| g.microcycle_id);
        for children in preset_groups.values_mut() {
            children.sort_by_key(|g| (g.week, g.day, g.target_date, g.created_at));
        }

        let mut presets = bucket(rows.presets, |p| Some(p.preset_group_id));
        for children in presets.values_mut() {
            children.sort_by_key(|p| (p.preset_order, p.id));
        }

        let mut details = bucket(rows.details, |d| Some(d.preset_id));
        for children in details.values_mut() {
            children.sort_by_key(|d| d.set_index);
        }

        let exercises = rows.exercises.into_iter().map(|e| (e.id, e)).collect();

        Self {
            mesocycles,
            microcycles,
            preset_groups,
            presets,
            details,
            exercises,
        }
    }

    pub fn macrocycle(&mut self, macrocycle: Macrocycle) -> MacrocycleNode {
        let mesocycles = self
            .mesocycles
            .remove(&macrocycle.id)
            .unwrap_or_default()
            .into_iter()
            .map(|m| self.mesocycle(m))
            .collect();
        MacrocycleNode {
            macrocycle,
            mesocycles,
        }
    }

    pub fn mesocycle(&mut self, mesocycle: Mesocycle) -> MesocycleNode {
        let microcycles = self
            .microcycles
            .remove(&mesocycle.id)
            .unwrap_or_default()
            .into_iter()
            .map(|m| self.microcycle(m))
            .collect();
        MesocycleNode {
            mesocycle,
            microcycles,
        }
    }

    pub fn microcycle(&mut self, microcycle: Microcycle) -> MicrocycleNode {
        let preset_groups = self
            .preset_groups
            .remove(&microcycle.id)
            .unwrap_or_default()
            .into_iter()
            .map(|g| self.preset_group(g))
            .collect();
        MicrocycleNode {
            microcycle,
            preset_groups,
        }
    }

    pub fn preset_group(&mut self, group: PresetGroup) -> PresetGroupNode {
        let presets = self
            .presets
            .remove(&group.id)
            .unwrap_or_default()
            .into_iter()
            .map(|preset| {
                let details = self.details.remove(&preset.id).unwrap_or_default();
                let exercise = self.exercises.get(&preset.exercise_id).cloned();
                PresetNode {
                    preset,
                    exercise,
                    details,
                }
            })
            .collect();
        PresetGroupNode { group, presets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SessionMode, SetMetrics};
    use chrono::{NaiveDate, Utc};
    use pretty_assertions::assert_eq;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn mesocycle(macrocycle_id: Uuid, ordinal: i32) -> Mesocycle {
        Mesocycle {
            id: Uuid::new_v4(),
            macrocycle_id,
            owner_id: Uuid::nil(),
            name: format!("Block {}", ordinal),
            start_date: date(1),
            end_date: date(28),
            ordinal,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn microcycle(mesocycle_id: Uuid, week_index: i32) -> Microcycle {
        Microcycle {
            id: Uuid::new_v4(),
            mesocycle_id: Some(mesocycle_id),
            owner_id: Uuid::nil(),
            name: None,
            start_date: date(1),
            end_date: date(7),
            week_index,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn preset_group(microcycle_id: Uuid, day: i32) -> PresetGroup {
        PresetGroup {
            id: Uuid::new_v4(),
            owner_id: Uuid::nil(),
            microcycle_id: Some(microcycle_id),
            name: format!("Day {}", day),
            description: None,
            target_date: None,
            week: Some(1),
            day: Some(day),
            session_mode: SessionMode::Individual,
            athlete_group_id: None,
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn preset(group_id: Uuid, order: i32, exercise_id: Uuid) -> Preset {
        Preset {
            id: Uuid::new_v4(),
            preset_group_id: group_id,
            exercise_id,
            preset_order: order,
            superset_id: None,
            notes: None,
        }
    }

    fn detail(preset_id: Uuid, set_index: i32) -> PresetDetail {
        PresetDetail {
            id: Uuid::new_v4(),
            preset_id,
            set_index,
            planned: SetMetrics {
                reps: Some(5),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_children_come_back_in_ordering_field_order() {
        let macrocycle_id = Uuid::new_v4();
        let second = mesocycle(macrocycle_id, 2);
        let first = mesocycle(macrocycle_id, 1);

        let week_two = microcycle(first.id, 2);
        let week_one = microcycle(first.id, 1);

        let thursday = preset_group(week_one.id, 4);
        let monday = preset_group(week_one.id, 1);

        let exercise_id = Uuid::new_v4();
        let accessory = preset(monday.id, 2, exercise_id);
        let main_lift = preset(monday.id, 1, exercise_id);

        let rows = PlanRows {
            mesocycles: vec![second.clone(), first.clone()],
            microcycles: vec![week_two.clone(), week_one.clone()],
            preset_groups: vec![thursday.clone(), monday.clone()],
            presets: vec![accessory.clone(), main_lift.clone()],
            details: vec![
                detail(main_lift.id, 3),
                detail(main_lift.id, 1),
                detail(main_lift.id, 2),
            ],
            exercises: vec![],
        };

        let macrocycle = Macrocycle {
            id: macrocycle_id,
            owner_id: Uuid::nil(),
            name: "Season".to_string(),
            start_date: date(1),
            end_date: date(28),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let tree = TreeBuilder::new(rows).macrocycle(macrocycle);

        let meso_ids: Vec<Uuid> = tree.mesocycles.iter().map(|m| m.mesocycle.id).collect();
        assert_eq!(meso_ids, vec![first.id, second.id]);

        let weeks: Vec<i32> = tree.mesocycles[0]
            .microcycles
            .iter()
            .map(|m| m.microcycle.week_index)
            .collect();
        assert_eq!(weeks, vec![1, 2]);

        let days: Vec<Option<i32>> = tree.mesocycles[0].microcycles[0]
            .preset_groups
            .iter()
            .map(|g| g.group.day)
            .collect();
        assert_eq!(days, vec![Some(1), Some(4)]);

        let monday_node = &tree.mesocycles[0].microcycles[0].preset_groups[0];
        let orders: Vec<i32> = monday_node.presets.iter().map(|p| p.preset.preset_order).collect();
        assert_eq!(orders, vec![1, 2]);

        let sets: Vec<i32> = monday_node.presets[0].details.iter().map(|d| d.set_index).collect();
        assert_eq!(sets, vec![1, 2, 3]);
        assert!(monday_node.presets[1].details.is_empty());
        assert!(tree.mesocycles[1].microcycles.is_empty());
    }

    #[test]
    fn test_preset_carries_resolved_exercise() {
        let group = preset_group(Uuid::new_v4(), 1);
        let exercise = Exercise {
            id: Uuid::new_v4(),
            name: "Back squat".to_string(),
            exercise_type_id: Some(Uuid::new_v4()),
            unit_id: None,
            description: None,
            media_url: None,
            created_by: Uuid::nil(),
            created_at: Utc::now(),
        };
        let squat = preset(group.id, 0, exercise.id);

        let rows = PlanRows {
            presets: vec![squat],
            exercises: vec![exercise.clone()],
            ..Default::default()
        };

        let node = TreeBuilder::new(rows).preset_group(group);
        assert_eq!(node.presets.len(), 1);
        assert_eq!(node.presets[0].exercise, Some(exercise));
    }
}
