use chrono::NaiveDate;
use serde::Serialize;

use crate::retention::RetentionCounts;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub created_at: NaiveDate,
    pub onboarding_percentage: i32,
    pub count_applications: i32,
    pub count_accepted_applications: i32,
}

#[derive(Debug, Clone)]
pub struct WeekCohort {
    pub week: String,
    pub users: Vec<User>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetentionRow {
    pub number: String,
    pub title: String,
    pub data: RetentionCounts,
}
