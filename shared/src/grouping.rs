//! Folds flat task lists into applicator-facing groups

use std::collections::HashMap;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{GroupLocation, Task, TaskGroup};
use crate::week::week_start_date;

const DEFAULT_METHOD: &str = "spray";

/// Display grouping key: the tank-mix group id, else `product-week-method`
pub fn display_key(task: &Task) -> String {
    match task.tank_mix_group_id {
        Some(id) => id.to_string(),
        None => format!(
            "{}-{}-{}",
            task.product_id,
            task.calendar_week,
            task.method.as_deref().unwrap_or("")
        ),
    }
}

/// Week-independent key an applicator job is matched on.
///
/// `tankmix:<id>` for tank mixes, otherwise
/// `product:<id>-rate:<rate|default>-method:<method|spray>`.
pub fn canonical_group_key(
    tank_mix_group_id: Option<Uuid>,
    product_id: Uuid,
    rate: Option<Decimal>,
    method: Option<&str>,
) -> String {
    if let Some(id) = tank_mix_group_id {
        return format!("tankmix:{}", id);
    }
    let rate = rate
        .map(|r| r.normalize().to_string())
        .unwrap_or_else(|| "default".to_string());
    let method = method.filter(|m| !m.is_empty()).unwrap_or(DEFAULT_METHOD);
    format!("product:{}-rate:{}-method:{}", product_id, rate, method)
}

struct GroupBuilder {
    group: TaskGroup,
    location_index: HashMap<Uuid, usize>,
}

impl GroupBuilder {
    fn start(id: String, first: &Task) -> Self {
        Self {
            group: TaskGroup {
                id,
                group_key: canonical_group_key(
                    first.tank_mix_group_id,
                    first.product_id,
                    first.rate,
                    first.method.as_deref(),
                ),
                product_id: first.product_id,
                product_name: first.product_name.clone(),
                rate: first.rate,
                rate_unit: first.rate_unit.clone(),
                method: first.method.clone(),
                calendar_week: first.calendar_week,
                week_start_date: week_start_date(first.scheduled_date),
                is_tank_mix: first.tank_mix_group_id.is_some(),
                tank_mix_group_id: first.tank_mix_group_id,
                tank_mix_products: Vec::new(),
                locations: Vec::new(),
                total_batches: 0,
                tasks: Vec::new(),
            },
            location_index: HashMap::new(),
        }
    }

    fn add(&mut self, task: Task) {
        if self.group.is_tank_mix && !self.group.tank_mix_products.contains(&task.product_name) {
            self.group.tank_mix_products.push(task.product_name.clone());
        }

        // one count per member task, so a tank mix counts each product's application
        self.group.total_batches += 1;

        if let Some(location_id) = task.location_id() {
            let idx = match self.location_index.get(&location_id) {
                Some(idx) => *idx,
                None => {
                    self.group.locations.push(GroupLocation {
                        location_id,
                        location_name: task.location_name.clone(),
                        batch_count: 0,
                    });
                    let idx = self.group.locations.len() - 1;
                    self.location_index.insert(location_id, idx);
                    idx
                }
            };
            self.group.locations[idx].batch_count += 1;
        }

        self.group.tasks.push(task);
    }
}

/// Group tasks by tank mix or by product, week and method.
///
/// Output is ordered by calendar week, then product name.
pub fn group_tasks(tasks: impl IntoIterator<Item = Task>) -> Vec<TaskGroup> {
    let mut order: Vec<String> = Vec::new();
    let mut builders: HashMap<String, GroupBuilder> = HashMap::new();

    for task in tasks {
        let key = display_key(&task);
        let builder = builders.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            GroupBuilder::start(key, &task)
        });
        builder.add(task);
    }

    let mut groups: Vec<TaskGroup> = order
        .into_iter()
        .filter_map(|key| builders.remove(&key))
        .map(|b| b.group)
        .collect();

    groups.sort_by(|a, b| {
        a.calendar_week
            .cmp(&b.calendar_week)
            .then_with(|| a.product_name.cmp(&b.product_name))
    });
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComplianceData, TaskOrigin, TaskStatus, TaskTarget};
    use chrono::{NaiveDate, Utc};
    use proptest::prelude::*;
    use std::str::FromStr;

    fn task(product: Uuid, name: &str, date: NaiveDate, location: Uuid) -> Task {
        Task {
            id: Uuid::new_v4(),
            org_id: Uuid::nil(),
            scheduled_date: date,
            week_number: 1,
            calendar_week: crate::week::iso_week(date),
            product_id: product,
            product_name: name.to_string(),
            rate: None,
            rate_unit: None,
            method: Some("spray".to_string()),
            is_tank_mix: false,
            tank_mix_group_id: None,
            target: TaskTarget::Batch {
                batch_id: Uuid::new_v4(),
                location_id: Some(location),
            },
            origin: TaskOrigin::Program {
                program_id: Uuid::new_v4(),
                program_step_id: Uuid::new_v4(),
            },
            location_name: Some("Tunnel 1".to_string()),
            batch_number: None,
            status: TaskStatus::Pending,
            completed_at: None,
            completed_by: None,
            skip_reason: None,
            compliance: ComplianceData::default(),
            created_at: Utc::now(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_canonical_key_formats() {
        let product = Uuid::from_str("5f3e2c1a-0000-4000-8000-000000000001").unwrap();
        assert_eq!(
            canonical_group_key(None, product, None, None),
            format!("product:{}-rate:default-method:spray", product)
        );
        assert_eq!(
            canonical_group_key(None, product, Some(Decimal::from_str("1.50").unwrap()), Some("drench")),
            format!("product:{}-rate:1.5-method:drench", product)
        );
        let mix = Uuid::new_v4();
        assert_eq!(
            canonical_group_key(Some(mix), product, None, None),
            format!("tankmix:{}", mix)
        );
    }

    #[test]
    fn test_tank_mix_merges_products() {
        let mix = Uuid::new_v4();
        let batch = Uuid::new_v4();
        let location = Uuid::new_v4();
        let day = date(2024, 1, 8);
        let mut tasks = Vec::new();
        for name in ["Alpha", "Beta", "Alpha"] {
            let mut t = task(Uuid::new_v4(), name, day, location);
            t.is_tank_mix = true;
            t.tank_mix_group_id = Some(mix);
            t.target = TaskTarget::Batch {
                batch_id: batch,
                location_id: Some(location),
            };
            tasks.push(t);
        }

        let groups = group_tasks(tasks);
        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.id, mix.to_string());
        assert_eq!(group.group_key, format!("tankmix:{}", mix));
        assert_eq!(group.tank_mix_products, vec!["Alpha", "Beta"]);
        assert_eq!(group.tasks.len(), 3);
        assert_eq!(group.total_batches, 3);
        assert_eq!(group.locations.len(), 1);
        assert_eq!(group.locations[0].batch_count, 3);
        assert_eq!(group.week_start_date, date(2024, 1, 8));
    }

    #[test]
    fn test_product_groups_split_by_week() {
        let product = Uuid::new_v4();
        let location = Uuid::new_v4();
        let tasks = vec![
            task(product, "Alpha", date(2024, 1, 8), location),
            task(product, "Alpha", date(2024, 1, 9), location),
            task(product, "Alpha", date(2024, 1, 15), location),
        ];

        let groups = group_tasks(tasks);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].calendar_week, 2);
        assert_eq!(groups[0].total_batches, 2);
        assert_eq!(groups[0].locations[0].batch_count, 2);
        assert_eq!(groups[1].calendar_week, 3);
        // jobs match across weeks
        assert_eq!(groups[0].group_key, groups[1].group_key);
        assert!(groups[0].tank_mix_products.is_empty());
    }

    #[test]
    fn test_ordering_week_then_name() {
        let location = Uuid::new_v4();
        let tasks = vec![
            task(Uuid::new_v4(), "Zeta", date(2024, 1, 8), location),
            task(Uuid::new_v4(), "Beta", date(2024, 1, 15), location),
            task(Uuid::new_v4(), "Alpha", date(2024, 1, 8), location),
        ];

        let names: Vec<_> = group_tasks(tasks)
            .into_iter()
            .map(|g| g.product_name)
            .collect();
        assert_eq!(names, vec!["Alpha", "Zeta", "Beta"]);
    }

    #[test]
    fn test_locations_aggregate_per_location() {
        let product = Uuid::new_v4();
        let north = Uuid::new_v4();
        let south = Uuid::new_v4();
        let day = date(2024, 2, 5);
        let tasks = vec![
            task(product, "Alpha", day, north),
            task(product, "Alpha", day, north),
            task(product, "Alpha", day, south),
        ];

        let group = group_tasks(tasks).remove(0);
        assert_eq!(group.locations.len(), 2);
        assert_eq!(group.locations[0].location_id, north);
        assert_eq!(group.locations[0].batch_count, 2);
        assert_eq!(group.locations[1].batch_count, 1);
        assert_eq!(group.total_batches, 3);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Grouping never loses or duplicates tasks
        #[test]
        fn prop_grouping_preserves_tasks(
            picks in proptest::collection::vec((0usize..3, 0i64..21, proptest::bool::ANY), 0..40)
        ) {
            let products = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
            let mix = Uuid::new_v4();
            let location = Uuid::new_v4();
            let tasks: Vec<Task> = picks
                .iter()
                .map(|(p, offset, mixed)| {
                    let day = date(2024, 3, 4) + chrono::Duration::days(*offset);
                    let mut t = task(products[*p], &format!("P{}", p), day, location);
                    if *mixed {
                        t.is_tank_mix = true;
                        t.tank_mix_group_id = Some(mix);
                    }
                    t
                })
                .collect();
            let total = tasks.len();
            let any_mixed = picks.iter().any(|(_, _, m)| *m);

            let groups = group_tasks(tasks);
            let grouped: usize = groups.iter().map(|g| g.tasks.len()).sum();
            prop_assert_eq!(grouped, total);
            prop_assert_eq!(groups.iter().filter(|g| g.is_tank_mix).count(), usize::from(any_mixed));
            for pair in groups.windows(2) {
                prop_assert!(pair[0].calendar_week <= pair[1].calendar_week);
            }
        }
    }
}
