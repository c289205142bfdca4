use std::collections::BTreeMap;

use crate::pipeline::types::{GroupKey, GroupMean, JoinedRecord, Measures};
use crate::pipeline::utility::RunningMean;

/// Groups rows by date, time and full hierarchy and averages every measured
/// quantity, skipping missing values.
///
/// Rows with missing key parts (unmatched rows of the outer join) form
/// groups of their own. Groups come back ordered by key.
pub fn aggregate(rows: &[JoinedRecord]) -> Vec<GroupMean> {
    let mut groups: BTreeMap<GroupKey, (usize, [RunningMean; Measures::COUNT])> = BTreeMap::new();

    for row in rows {
        let key = GroupKey {
            date: row.date.clone(),
            time: row.time.clone(),
            admin: row.admin.clone(),
        };
        let (count, means) = groups.entry(key).or_default();
        *count += 1;
        for (mean, value) in means.iter_mut().zip(row.measures.to_array()) {
            mean.push(value);
        }
    }

    groups
        .into_iter()
        .map(|(key, (rows, means))| GroupMean {
            key,
            rows,
            means: Measures::from_array(means.map(|m| m.value())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::AdminHierarchy;

    fn village(name: &str) -> AdminHierarchy {
        AdminHierarchy {
            province_name: Some("충청남도".into()),
            city_name: Some("논산시".into()),
            town_name: Some("강경읍".into()),
            village_name: Some(name.into()),
            ..Default::default()
        }
    }

    fn row(time: &str, admin: AdminHierarchy, nh3: Option<f64>, dir: Option<f64>) -> JoinedRecord {
        JoinedRecord {
            date: Some("20240912".into()),
            time: Some(time.into()),
            admin,
            measures: Measures {
                nh3,
                wind_direction: dir,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_mean_per_group() {
        let rows = vec![
            row("01", village("황산리"), Some(10.0), Some(350.0)),
            row("01", village("황산리"), Some(30.0), Some(10.0)),
            row("01", village("대흥리"), Some(5.0), None),
            row("02", village("황산리"), None, Some(90.0)),
        ];

        let groups = aggregate(&rows);
        assert_eq!(groups.len(), 3);

        let first = groups
            .iter()
            .find(|g| g.key.time.as_deref() == Some("01") && g.key.admin == village("황산리"))
            .unwrap();
        assert_eq!(first.rows, 2);
        assert_eq!(first.means.nh3, Some(20.0));
        // Plain arithmetic mean of degrees, not a circular mean.
        assert_eq!(first.means.wind_direction, Some(180.0));

        let later = groups
            .iter()
            .find(|g| g.key.time.as_deref() == Some("02"))
            .unwrap();
        assert_eq!(later.means.nh3, None);
    }

    #[test]
    fn test_unmatched_rows_form_their_own_groups() {
        let rows = vec![
            row("01", AdminHierarchy::default(), Some(1.0), None),
            row("01", AdminHierarchy::default(), Some(3.0), None),
            JoinedRecord {
                date: None,
                time: None,
                admin: village("황산리"),
                measures: Measures::default(),
            },
        ];

        let groups = aggregate(&rows);
        assert_eq!(groups.len(), 2);
        // Missing key parts sort first.
        assert_eq!(groups[0].key.date, None);
        assert_eq!(groups[0].means, Measures::default());
        assert_eq!(groups[1].means.nh3, Some(2.0));
    }

    #[test]
    fn test_groups_are_ordered_by_key() {
        let rows = vec![
            row("03", village("가"), Some(1.0), None),
            row("01", village("나"), Some(1.0), None),
            row("01", village("가"), Some(1.0), None),
        ];
        let keys: Vec<_> = aggregate(&rows)
            .into_iter()
            .map(|g| (g.key.time.unwrap(), g.key.admin.village_name.unwrap()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("01".to_string(), "가".to_string()),
                ("01".to_string(), "나".to_string()),
                ("03".to_string(), "가".to_string()),
            ]
        );
    }
}
