//! Diesel model for background jobs.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::job::{Job as DomainJob, JobResult, JobStatus, JobType};
use crate::domain::period::DatePeriod;
use crate::domain::types::{JobId, TypeConstraintError};

#[derive(Debug, Clone, Identifiable, Queryable)]
#[diesel(table_name = crate::schema::jobs)]
pub struct Job {
    pub id: i32,
    pub job_type: String,
    pub enabled: bool,
    pub periodicity: Option<String>,
    pub last_run: Option<NaiveDateTime>,
    pub status: i32,
    pub error: Option<String>,
}

#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::jobs, treat_none_as_null = true)]
/// Columns rewritten after every run.
pub struct JobRun<'a> {
    pub last_run: Option<NaiveDateTime>,
    pub status: i32,
    pub error: Option<&'a str>,
}

impl TryFrom<Job> for DomainJob {
    type Error = TypeConstraintError;

    fn try_from(job: Job) -> Result<Self, Self::Error> {
        Ok(Self {
            id: JobId::new(job.id)?,
            job_type: JobType::try_from(job.job_type.as_str())?,
            enabled: job.enabled,
            periodicity: job.periodicity.as_deref().map(DatePeriod::from_json).transpose()?,
            last_run: job.last_run,
            status: JobStatus::try_from(job.status)?,
            error: job.error,
        })
    }
}

impl<'a> From<&'a JobResult> for JobRun<'a> {
    fn from(result: &'a JobResult) -> Self {
        Self {
            last_run: Some(result.ran_at),
            status: result.status.code(),
            error: result.error.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_job_row_parses() {
        let db = Job {
            id: 1,
            job_type: "recurrents_generator".into(),
            enabled: true,
            periodicity: Some(r#"{"unit":"hours","value":1}"#.into()),
            last_run: None,
            status: 1,
            error: None,
        };
        let job = DomainJob::try_from(db).expect("valid job");
        assert_eq!(job.job_type, JobType::RecurrentsGenerator);
        assert_eq!(job.periodicity, JobType::RecurrentsGenerator.default_periodicity());
    }
}
