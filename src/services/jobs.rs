//! Background jobs: listing, toggling and running them.

use chrono::NaiveDateTime;

use crate::domain::job::{Job, JobResult, JobType};
use crate::domain::types::JobId;
use crate::domain::user::User;
use crate::repository::{
    ActivityReader, BillingReader, BillingWriter, EmailReader, EmailWriter, EntityReader,
    EntityWriter, JobReader, JobWriter, PropertyReader, RelationReader, RelationWriter,
    TrashQuery, UserReader,
};
use crate::services::emails::{MailTransport, send_due_sendings};
use crate::services::entities::purge_trash;
use crate::services::recurrents::generate_due_documents;
use crate::services::users::ensure_admin;
use crate::services::{ServiceError, ServiceResult};

/// Every capability a job may need.
pub trait JobsRepository:
    JobReader
    + JobWriter
    + UserReader
    + EntityReader
    + EntityWriter
    + ActivityReader
    + BillingReader
    + BillingWriter
    + RelationReader
    + RelationWriter
    + PropertyReader
    + EmailReader
    + EmailWriter
{
}

impl<T: ?Sized> JobsRepository for T where
    T: JobReader
        + JobWriter
        + UserReader
        + EntityReader
        + EntityWriter
        + ActivityReader
        + BillingReader
        + BillingWriter
        + RelationReader
        + RelationWriter
        + PropertyReader
        + EmailReader
        + EmailWriter
{
}

pub fn list_jobs<R>(repo: &R, user: &User) -> ServiceResult<Vec<Job>>
where
    R: JobReader + ?Sized,
{
    ensure_admin(user)?;
    Ok(repo.list_jobs()?)
}

pub fn set_job_enabled<R>(repo: &R, user: &User, id: JobId, enabled: bool) -> ServiceResult<()>
where
    R: JobReader + JobWriter + ?Sized,
{
    ensure_admin(user)?;
    repo.get_job(id)?.ok_or(ServiceError::NotFound)?;
    repo.set_job_enabled(id, enabled)?;
    log::info!("Job {id} enabled: {enabled}");
    Ok(())
}

/// Runs the job's work and returns a one-line summary.
fn execute<R, T>(repo: &R, transport: &T, job_type: JobType, now: NaiveDateTime) -> ServiceResult<String>
where
    R: JobsRepository + ?Sized,
    T: MailTransport + ?Sized,
{
    match job_type {
        JobType::RecurrentsGenerator => {
            let report = generate_due_documents(repo, now)?;
            Ok(format!(
                "{} documents generated, {} generators skipped",
                report.generated, report.skipped
            ))
        }
        JobType::CampaignEmailsSend => {
            let report = send_due_sendings(repo, transport, now)?;
            Ok(format!(
                "{} sendings, {} mails sent, {} failed",
                report.sendings, report.sent, report.failed
            ))
        }
        JobType::TrashCleaner => {
            let outcome = purge_trash(repo, TrashQuery::default())?;
            Ok(format!(
                "{} entities deleted, {} failed",
                outcome.deleted,
                outcome.errors.len()
            ))
        }
    }
}

/// Runs one job and records its outcome; failures are stored on the job.
pub fn run_job<R, T>(repo: &R, transport: &T, job: &Job, now: NaiveDateTime) -> ServiceResult<JobResult>
where
    R: JobsRepository + ?Sized,
    T: MailTransport + ?Sized,
{
    let result = match execute(repo, transport, job.job_type, now) {
        Ok(summary) => {
            log::info!("Job {} done: {summary}", job.job_type.as_str());
            JobResult::ok(now)
        }
        Err(err) => {
            log::error!("Job {} failed: {err}", job.job_type.as_str());
            JobResult::failed(now, err.to_string())
        }
    };
    repo.save_job_result(job.id, &result)?;
    Ok(result)
}

/// Runs every due job once.
pub fn run_due_jobs<R, T>(
    repo: &R,
    transport: &T,
    now: NaiveDateTime,
) -> ServiceResult<Vec<(JobType, JobResult)>>
where
    R: JobsRepository + ?Sized,
    T: MailTransport + ?Sized,
{
    let mut results = Vec::new();
    for job in repo.list_jobs()?.into_iter().filter(|job| job.is_due(now)) {
        let result = run_job(repo, transport, &job, now)?;
        results.push((job.job_type, result));
    }
    Ok(results)
}

/// Runs a job right away, due or not.
pub fn run_job_now<R, T>(
    repo: &R,
    transport: &T,
    user: &User,
    id: JobId,
    now: NaiveDateTime,
) -> ServiceResult<JobResult>
where
    R: JobsRepository + ?Sized,
    T: MailTransport + ?Sized,
{
    ensure_admin(user)?;
    let job = repo.get_job(id)?.ok_or(ServiceError::NotFound)?;
    run_job(repo, transport, &job, now)
}
