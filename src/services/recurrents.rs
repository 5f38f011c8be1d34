//! Recurrent generators and the generation job.

use chrono::NaiveDateTime;

use crate::domain::entity::{Entity, EntityKind};
use crate::domain::entity_data::{AnyEntity, EntityData};
use crate::domain::recurrent::RecurrentGenerator;
use crate::domain::user::User;
use crate::forms::recurrents::GeneratorPayload;
use crate::repository::{
    ActivityReader, BillingReader, BillingWriter, EntityReader, EntityWriter, PropertyReader,
    RelationReader, RelationWriter, UserReader,
};
use crate::services::billing::{copy_document, get_document};
use crate::services::entities::{get_entity, store_entity, store_new_entity};
use crate::services::{ServiceError, ServiceResult};

/// Outcome of one generation run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GenerationReport {
    pub generated: usize,
    /// Generators skipped because of a missing template or owner.
    pub skipped: usize,
}

/// Creates a generator and its template, copied from a billing document.
pub fn create_generator<R>(
    repo: &R,
    user: &User,
    payload: GeneratorPayload,
) -> ServiceResult<AnyEntity>
where
    R: EntityReader
        + EntityWriter
        + ActivityReader
        + BillingReader
        + BillingWriter
        + RelationReader
        + RelationWriter
        + PropertyReader
        + ?Sized,
{
    let source_id = payload.source_id.ok_or_else(|| {
        ServiceError::Form("the generator needs a document to use as template".to_string())
    })?;
    let source = get_document(repo, source_id)?;
    let mut template = copy_document(repo, user, &source, EntityKind::TemplateBase, None)?;
    if let EntityData::Document(document) = &mut template.data {
        document.template_target = Some(payload.target_kind);
    }
    let template = store_entity(repo, template)?;

    let generator = RecurrentGenerator {
        name: payload.name,
        first_generation: payload.first_generation,
        last_generation: None,
        periodicity: payload.periodicity,
        template_id: template.id(),
        target_kind: payload.target_kind,
        is_working: payload.is_working,
    };
    let created = store_new_entity(
        repo,
        user.id,
        EntityKind::RecurrentGenerator,
        &EntityData::RecurrentGenerator(generator),
        &payload.description,
    )?;
    log::info!(
        "Recurrent generator {} created from document {source_id}",
        created.id()
    );
    Ok(created)
}

fn run_generator<R>(
    repo: &R,
    generator: Entity<RecurrentGenerator>,
    now: NaiveDateTime,
) -> ServiceResult<Option<usize>>
where
    R: UserReader
        + EntityReader
        + EntityWriter
        + ActivityReader
        + BillingReader
        + BillingWriter
        + RelationReader
        + RelationWriter
        + PropertyReader
        + ?Sized,
{
    let dates = generator.data.due_generations(now);
    if dates.is_empty() {
        return Ok(Some(0));
    }
    let template = match get_document(repo, generator.data.template_id) {
        Ok(template) => template,
        Err(ServiceError::NotFound | ServiceError::Conflict(_)) => {
            log::warn!(
                "Generator {} skipped: its template {} is missing or trashed",
                generator.id(),
                generator.data.template_id
            );
            return Ok(None);
        }
        Err(err) => return Err(err),
    };
    let Some(owner) = repo.get_user_by_id(generator.base.user_id)? else {
        log::warn!("Generator {} skipped: its owner is unknown", generator.id());
        return Ok(None);
    };

    let mut entity = AnyEntity {
        base: generator.base,
        data: EntityData::RecurrentGenerator(generator.data.clone()),
    };
    for date in &dates {
        let document = copy_document(
            repo,
            &owner,
            &template,
            generator.data.target_kind,
            Some(date.date()),
        )?;
        log::info!(
            "Generator {} produced {} {}",
            entity.id(),
            generator.data.target_kind.verbose_name(),
            document.id()
        );
        if let EntityData::RecurrentGenerator(data) = &mut entity.data {
            data.last_generation = Some(*date);
        }
        // Stored after every document so a failure does not generate twice.
        entity = store_entity(repo, entity)?;
    }
    Ok(Some(dates.len()))
}

/// Generates every due document of the working generators.
///
/// A generator failing stops the run; the ones before it keep their
/// generations.
pub fn generate_due_documents<R>(repo: &R, now: NaiveDateTime) -> ServiceResult<GenerationReport>
where
    R: UserReader
        + EntityReader
        + EntityWriter
        + ActivityReader
        + BillingReader
        + BillingWriter
        + RelationReader
        + RelationWriter
        + PropertyReader
        + ?Sized,
{
    let mut report = GenerationReport::default();
    for generator in repo.list_working_generators()? {
        match run_generator(repo, generator, now)? {
            Some(generated) => report.generated += generated,
            None => report.skipped += 1,
        }
    }
    Ok(report)
}

/// A generator with its template, for the detail page.
pub fn generator_template<R>(repo: &R, generator: &AnyEntity) -> ServiceResult<Option<AnyEntity>>
where
    R: EntityReader + ?Sized,
{
    let Some(data) = generator.data.as_generator() else {
        return Err(ServiceError::NotFound);
    };
    match get_entity(repo, data.template_id) {
        Ok(template) => Ok(Some(template)),
        Err(ServiceError::NotFound) => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(all(test, feature = "test-mocks"))]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::billing::BillingDocument;
    use crate::domain::period::{DatePeriod, PeriodUnit};
    use crate::domain::types::EntityId;
    use crate::repository::mock::MockRepository;
    use crate::services::users::test_support::base;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2071, 1, day)
            .and_then(|date| date.and_hms_opt(8, 0, 0))
            .expect("valid datetime")
    }

    fn generator(template_id: i32) -> Entity<RecurrentGenerator> {
        Entity {
            base: base(20, EntityKind::RecurrentGenerator, 2, "Weekly fuel"),
            data: RecurrentGenerator {
                name: "Weekly fuel".into(),
                first_generation: at(1),
                last_generation: None,
                periodicity: DatePeriod::new(PeriodUnit::Weeks, 1).expect("valid period"),
                template_id: EntityId::new(template_id).expect("valid id"),
                target_kind: EntityKind::Invoice,
                is_working: true,
            },
        }
    }

    #[test]
    fn generators_with_a_trashed_template_are_skipped() {
        let mut repo = MockRepository::new();
        repo.expect_list_working_generators()
            .returning(|| Ok(vec![generator(30)]));
        repo.expect_get_entity().returning(|id| {
            let mut template = AnyEntity {
                base: base(id.get(), EntityKind::TemplateBase, 2, "Fuel"),
                data: EntityData::Document(BillingDocument::new("Fuel")),
            };
            template.base.is_deleted = true;
            Ok(Some(template))
        });
        repo.expect_create_entity().never();
        repo.expect_update_entity().never();

        let report = generate_due_documents(&repo, at(20)).expect("run");
        assert_eq!(
            report,
            GenerationReport {
                generated: 0,
                skipped: 1
            }
        );
    }

    #[test]
    fn nothing_happens_before_the_first_generation() {
        let mut repo = MockRepository::new();
        repo.expect_list_working_generators().returning(|| {
            let mut generator = generator(30);
            generator.data.first_generation = at(25);
            Ok(vec![generator])
        });
        repo.expect_get_entity().never();

        let report = generate_due_documents(&repo, at(20)).expect("run");
        assert_eq!(report, GenerationReport::default());
    }

    #[test]
    fn generators_need_a_source_document() {
        let repo = MockRepository::new();
        let user = crate::services::users::test_support::user_from(
            &crate::services::users::test_support::viewer_auth(),
            2,
        );
        let payload = GeneratorPayload {
            name: "Weekly fuel".into(),
            description: String::new(),
            first_generation: at(1),
            periodicity: DatePeriod::new(PeriodUnit::Weeks, 1).expect("valid period"),
            target_kind: EntityKind::Invoice,
            source_id: None,
            is_working: true,
        };
        assert!(matches!(
            create_generator(&repo, &user, payload),
            Err(ServiceError::Form(_))
        ));
    }
}
