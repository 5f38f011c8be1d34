//! Repository implementation for background jobs.

use diesel::prelude::*;

use crate::{
    domain::{
        job::{Job, JobResult},
        types::JobId,
    },
    models::job::{Job as DbJob, JobRun},
    repository::{
        DieselRepository, JobReader, JobWriter,
        errors::{RepositoryError, RepositoryResult},
    },
};

impl JobReader for DieselRepository {
    fn list_jobs(&self) -> RepositoryResult<Vec<Job>> {
        use crate::schema::jobs;

        let mut conn = self.conn()?;
        jobs::table
            .order(jobs::id.asc())
            .load::<DbJob>(&mut conn)?
            .into_iter()
            .map(|job| Job::try_from(job).map_err(RepositoryError::from))
            .collect()
    }

    fn get_job(&self, id: JobId) -> RepositoryResult<Option<Job>> {
        use crate::schema::jobs;

        let mut conn = self.conn()?;
        let job = jobs::table
            .find(id.get())
            .first::<DbJob>(&mut conn)
            .optional()?;

        job.map(Job::try_from)
            .transpose()
            .map_err(RepositoryError::from)
    }
}

impl JobWriter for DieselRepository {
    fn save_job_result(&self, id: JobId, result: &JobResult) -> RepositoryResult<()> {
        use crate::schema::jobs;

        let mut conn = self.conn()?;
        let affected = diesel::update(jobs::table.find(id.get()))
            .set(&JobRun::from(result))
            .execute(&mut conn)?;
        if affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    fn set_job_enabled(&self, id: JobId, enabled: bool) -> RepositoryResult<()> {
        use crate::schema::jobs;

        let mut conn = self.conn()?;
        let affected = diesel::update(jobs::table.find(id.get()))
            .set(jobs::enabled.eq(enabled))
            .execute(&mut conn)?;
        if affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
