//! Periodic background jobs run by `creme_jobs`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::period::{DatePeriod, PeriodUnit};
use crate::domain::types::{JobId, TypeConstraintError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    RecurrentsGenerator,
    CampaignEmailsSend,
    TrashCleaner,
}

impl JobType {
    pub const ALL: [JobType; 3] = [
        JobType::RecurrentsGenerator,
        JobType::CampaignEmailsSend,
        JobType::TrashCleaner,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobType::RecurrentsGenerator => "recurrents_generator",
            JobType::CampaignEmailsSend => "campaign_emails_send",
            JobType::TrashCleaner => "trash_cleaner",
        }
    }

    pub fn verbose_name(self) -> &'static str {
        match self {
            JobType::RecurrentsGenerator => "Generate recurrent documents",
            JobType::CampaignEmailsSend => "Send emails from campaigns",
            JobType::TrashCleaner => "Empty the trash",
        }
    }

    /// Periodicity of the seeded job.
    pub fn default_periodicity(self) -> Option<DatePeriod> {
        let (unit, value) = match self {
            JobType::RecurrentsGenerator => (PeriodUnit::Hours, 1),
            JobType::CampaignEmailsSend => (PeriodUnit::Minutes, 15),
            JobType::TrashCleaner => (PeriodUnit::Days, 1),
        };
        DatePeriod::new(unit, value).ok()
    }
}

impl TryFrom<&str> for JobType {
    type Error = TypeConstraintError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        JobType::ALL
            .into_iter()
            .find(|job_type| job_type.as_str() == value)
            .ok_or_else(|| TypeConstraintError::InvalidValue(format!("job type {value}")))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Wait,
    Error,
    Ok,
}

impl JobStatus {
    pub fn code(self) -> i32 {
        match self {
            JobStatus::Wait => 1,
            JobStatus::Error => 10,
            JobStatus::Ok => 20,
        }
    }
}

impl TryFrom<i32> for JobStatus {
    type Error = TypeConstraintError;

    fn try_from(value: i32) -> Result<Self, TypeConstraintError> {
        match value {
            1 => Ok(JobStatus::Wait),
            10 => Ok(JobStatus::Error),
            20 => Ok(JobStatus::Ok),
            other => Err(TypeConstraintError::InvalidValue(format!("job status {other}"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub job_type: JobType,
    pub enabled: bool,
    /// `None` for jobs run once.
    pub periodicity: Option<DatePeriod>,
    pub last_run: Option<NaiveDateTime>,
    pub status: JobStatus,
    pub error: Option<String>,
}

impl Job {
    /// Next planned run; `None` when the job will not run again.
    pub fn next_run(&self) -> Option<NaiveDateTime> {
        match (self.last_run, self.periodicity) {
            (None, _) => Some(NaiveDateTime::MIN),
            (Some(last_run), Some(period)) => period.add_to(last_run),
            (Some(_), None) => None,
        }
    }

    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        self.enabled && self.next_run().is_some_and(|next| next <= now)
    }
}

/// Outcome of one run, stored on the job.
#[derive(Clone, Debug, PartialEq)]
pub struct JobResult {
    pub ran_at: NaiveDateTime,
    pub status: JobStatus,
    pub error: Option<String>,
}

impl JobResult {
    pub fn ok(ran_at: NaiveDateTime) -> Self {
        Self {
            ran_at,
            status: JobStatus::Ok,
            error: None,
        }
    }

    pub fn failed(ran_at: NaiveDateTime, error: impl Into<String>) -> Self {
        Self {
            ran_at,
            status: JobStatus::Error,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 17)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .expect("valid datetime")
    }

    fn job(last_run: Option<NaiveDateTime>) -> Job {
        Job {
            id: JobId::new(1).expect("valid id"),
            job_type: JobType::RecurrentsGenerator,
            enabled: true,
            periodicity: JobType::RecurrentsGenerator.default_periodicity(),
            last_run,
            status: JobStatus::Wait,
            error: None,
        }
    }

    #[test]
    fn never_run_jobs_are_due() {
        assert!(job(None).is_due(at(0, 0)));
    }

    #[test]
    fn periodic_jobs_wait_for_their_period() {
        let job = job(Some(at(10, 0)));
        assert!(!job.is_due(at(10, 59)));
        assert!(job.is_due(at(11, 0)));
    }

    #[test]
    fn disabled_and_one_shot_jobs() {
        let mut disabled = job(None);
        disabled.enabled = false;
        assert!(!disabled.is_due(at(12, 0)));

        let mut one_shot = job(Some(at(1, 0)));
        one_shot.periodicity = None;
        assert!(!one_shot.is_due(at(23, 0)));
    }

    #[test]
    fn status_codes() {
        for status in [JobStatus::Wait, JobStatus::Error, JobStatus::Ok] {
            assert_eq!(JobStatus::try_from(status.code()), Ok(status));
        }
        assert_eq!(JobType::try_from("trash_cleaner"), Ok(JobType::TrashCleaner));
    }
}
