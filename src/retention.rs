use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::models::{RetentionRow, User, WeekCohort};
use crate::source::UserSource;

pub const TOTAL: &str = "Total";

/// Onboarding steps in completion order, each label paired with the minimum
/// onboarding percentage at which a user counts as having reached it.
pub const RETENTION_STEPS: [(&str, i32); 8] = [
    ("create account", 0),
    ("activate account", 20),
    ("provide profile information", 40),
    ("what jobs are you interested in?", 50),
    ("do you have relevant experience in these jobs?", 70),
    ("are you a freelancer?", 90),
    ("waiting for approval", 99),
    ("approval", 100),
];

const SLOTS: usize = RETENTION_STEPS.len() + 1;

/// Per-step user counts for one cohort. Slot 0 holds the Total count, the
/// remaining slots follow the step catalog order. Serializes as a JSON
/// object whose keys keep that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionCounts {
    counts: [u64; SLOTS],
}

impl RetentionCounts {
    pub fn zeroed() -> Self {
        Self { counts: [0; SLOTS] }
    }

    pub fn total(&self) -> u64 {
        self.counts[0]
    }

    pub fn get(&self, label: &str) -> Option<u64> {
        self.iter().find(|(l, _)| *l == label).map(|(_, count)| count)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        std::iter::once(TOTAL)
            .chain(RETENTION_STEPS.iter().map(|(label, _)| *label))
            .zip(self.counts.iter().copied())
    }
}

impl Serialize for RetentionCounts {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(SLOTS))?;
        for (label, count) in self.iter() {
            map.serialize_entry(label, &count)?;
        }
        map.end()
    }
}

/// ISO-8601 week number of a date as a zero-padded two-digit string.
pub fn week_key(date: NaiveDate) -> String {
    format!("{:02}", date.iso_week().week())
}

/// Groups users into weekly signup cohorts keyed by ISO week number.
/// Cohorts come back in first-occurrence order of their week key, each
/// keeping its users' relative input order. The key carries no year, so the
/// same week number from different years lands in one cohort.
pub fn group_by_week(users: &[User]) -> Vec<WeekCohort> {
    let mut slot_by_week: HashMap<String, usize> = HashMap::new();
    let mut cohorts: Vec<WeekCohort> = Vec::new();

    for user in users {
        let week = week_key(user.created_at);
        let slot = *slot_by_week.entry(week.clone()).or_insert_with(|| {
            cohorts.push(WeekCohort {
                week,
                users: Vec::new(),
            });
            cohorts.len() - 1
        });
        cohorts[slot].users.push(user.clone());
    }

    cohorts
}

/// Returns a new count mapping with the user added to Total and to every
/// step whose threshold their onboarding percentage meets. The input
/// mapping stays untouched.
pub fn add_user_to_retention(counts: &RetentionCounts, user: &User) -> RetentionCounts {
    let mut next = counts.clone();
    next.counts[0] += 1;
    for (slot, (_, threshold)) in RETENTION_STEPS.iter().enumerate() {
        if user.onboarding_percentage >= *threshold {
            next.counts[slot + 1] += 1;
        }
    }
    next
}

pub fn reduce_users_to_retention(users: &[User]) -> RetentionCounts {
    users.iter().fold(RetentionCounts::zeroed(), |counts, user| {
        add_user_to_retention(&counts, user)
    })
}

/// Builds one retention row per weekly cohort from the injected source, in
/// cohort first-occurrence order.
pub fn build_retention_graph_data(source: &dyn UserSource) -> anyhow::Result<Vec<RetentionRow>> {
    let users = source.load_users()?;
    Ok(group_by_week(&users)
        .into_iter()
        .map(|cohort| RetentionRow {
            number: cohort.week.clone(),
            title: format!("Week {}", cohort.week),
            data: reduce_users_to_retention(&cohort.users),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SampleData;

    fn test_user(created_at: NaiveDate, percentage: i32) -> User {
        User {
            id: format!("user-{percentage}"),
            created_at,
            onboarding_percentage: percentage,
            count_applications: 0,
            count_accepted_applications: 0,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct EmptySource;

    impl UserSource for EmptySource {
        fn load_users(&self) -> anyhow::Result<Vec<User>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn week_key_is_zero_padded_iso_week() {
        assert_eq!(week_key(date(2024, 1, 1)), "01");
        assert_eq!(week_key(date(2026, 2, 4)), "06");
        // Jan 1st 2021 belongs to the last ISO week of 2020.
        assert_eq!(week_key(date(2021, 1, 1)), "53");
    }

    #[test]
    fn counts_every_user_in_total() {
        let monday = date(2026, 2, 2);
        let users: Vec<User> = (0..=100)
            .step_by(10)
            .map(|p| test_user(monday, p))
            .collect();

        let counts = reduce_users_to_retention(&users);
        assert_eq!(counts.total(), users.len() as u64);
    }

    #[test]
    fn adds_user_at_each_reached_step() {
        let monday = date(2026, 2, 2);
        for (reached, (_, percentage)) in RETENTION_STEPS.iter().enumerate() {
            let counts =
                add_user_to_retention(&RetentionCounts::zeroed(), &test_user(monday, *percentage));

            assert_eq!(counts.get(TOTAL), Some(1));
            for (step, (label, _)) in RETENTION_STEPS.iter().enumerate() {
                let expected = if step <= reached { 1 } else { 0 };
                assert_eq!(counts.get(label), Some(expected), "step {label}");
            }
        }
    }

    #[test]
    fn accumulation_leaves_input_untouched() {
        let monday = date(2026, 2, 2);
        let base = add_user_to_retention(&RetentionCounts::zeroed(), &test_user(monday, 50));
        let before = base.clone();

        let first = add_user_to_retention(&base, &test_user(monday, 70));
        let second = add_user_to_retention(&base, &test_user(monday, 70));

        assert_eq!(base, before);
        assert_eq!(first, second);
        assert_eq!(first.total(), base.total() + 1);
    }

    #[test]
    fn fully_onboarded_user_counts_everywhere() {
        let counts =
            add_user_to_retention(&RetentionCounts::zeroed(), &test_user(date(2026, 2, 2), 100));
        for (label, count) in counts.iter() {
            assert_eq!(count, 1, "step {label}");
        }
    }

    #[test]
    fn fresh_signup_counts_only_account_creation() {
        let counts =
            add_user_to_retention(&RetentionCounts::zeroed(), &test_user(date(2026, 2, 2), 0));
        assert_eq!(counts.get(TOTAL), Some(1));
        assert_eq!(counts.get("create account"), Some(1));
        for (label, _) in RETENTION_STEPS.iter().skip(1) {
            assert_eq!(counts.get(label), Some(0), "step {label}");
        }
    }

    #[test]
    fn grouping_keeps_every_user_exactly_once() {
        let users = vec![
            test_user(date(2026, 2, 2), 0),
            test_user(date(2026, 1, 19), 20),
            test_user(date(2026, 2, 4), 40),
            test_user(date(2026, 1, 23), 100),
        ];

        let cohorts = group_by_week(&users);
        assert_eq!(cohorts.len(), 2);

        let regrouped: Vec<i32> = cohorts
            .iter()
            .flat_map(|c| c.users.iter().map(|u| u.onboarding_percentage))
            .collect();
        let mut sorted = regrouped.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 20, 40, 100]);

        // Relative input order survives within each cohort.
        assert_eq!(cohorts[0].week, "06");
        assert_eq!(
            cohorts[0]
                .users
                .iter()
                .map(|u| u.onboarding_percentage)
                .collect::<Vec<_>>(),
            vec![0, 40]
        );
    }

    #[test]
    fn cohort_order_follows_first_occurrence() {
        let users = vec![
            test_user(date(2026, 2, 2), 0),
            test_user(date(2026, 1, 19), 0),
            test_user(date(2026, 2, 3), 0),
            test_user(date(2026, 1, 20), 0),
        ];

        let weeks: Vec<String> = group_by_week(&users).into_iter().map(|c| c.week).collect();
        assert_eq!(weeks, vec!["06", "04"]);
    }

    #[test]
    fn same_week_number_across_years_shares_a_cohort() {
        let users = vec![
            test_user(date(2025, 1, 6), 0),
            test_user(date(2026, 1, 5), 0),
        ];

        let cohorts = group_by_week(&users);
        assert_eq!(cohorts.len(), 1);
        assert_eq!(cohorts[0].week, "02");
        assert_eq!(cohorts[0].users.len(), 2);
    }

    #[test]
    fn builds_one_row_per_week_with_full_totals() {
        let rows = build_retention_graph_data(&SampleData::new(100, 5)).unwrap();

        assert_eq!(rows.len(), 5);
        for row in &rows {
            assert_eq!(row.title, format!("Week {}", row.number));
            assert_eq!(row.data.total(), 20);
        }
    }

    #[test]
    fn empty_source_builds_empty_graph() {
        let rows = build_retention_graph_data(&EmptySource).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn row_serializes_with_catalog_key_order() {
        let row = RetentionRow {
            number: "06".to_string(),
            title: "Week 06".to_string(),
            data: add_user_to_retention(&RetentionCounts::zeroed(), &test_user(date(2026, 2, 2), 40)),
        };

        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(
            json,
            "{\"number\":\"06\",\"title\":\"Week 06\",\"data\":{\
             \"Total\":1,\
             \"create account\":1,\
             \"activate account\":1,\
             \"provide profile information\":1,\
             \"what jobs are you interested in?\":0,\
             \"do you have relevant experience in these jobs?\":0,\
             \"are you a freelancer?\":0,\
             \"waiting for approval\":0,\
             \"approval\":0}}"
        );
    }
}
