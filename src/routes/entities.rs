//! Generic entity pages: list, detail, creation, edition, trash, relations
//! and properties.

use actix_multipart::form::MultipartForm;
use actix_web::http::header;
use actix_web::{HttpResponse, Responder, get, post, web};
use actix_web_flash_messages::{FlashMessage, IncomingFlashMessages};
use tera::Tera;

use crate::domain::auth::AuthenticatedUser;
use crate::domain::entity::EntityKind;
use crate::domain::types::{AddressId, EntityId, PropertyTypeId, RelationId};
use crate::domain::user::User;
use crate::forms::billing::DocumentParties;
use crate::forms::entities::{AddressForm, BulkEditForm, EntityForm, ListQuery};
use crate::forms::import::UploadCsvForm;
use crate::forms::parse_urlencoded;
use crate::forms::relations::{AddPropertiesForm, AddRelationsForm};
use crate::models::config::ServerConfig;
use crate::repository::DieselRepository;
use crate::routes::{
    Swappable, base_context, flash_error, page_error, parse_kind, redirect, render_template,
    user_or_return,
};
use crate::services::{
    ServiceError, ServiceResult, activities, billing, emails, entities, events, import, persons,
    recurrents, relations,
};

pub fn configure(swappable: &Swappable<'_>, cfg: &mut web::ServiceConfig) {
    swappable.register(cfg, "entities__list", list);
    swappable.register(cfg, "entities__export", export);
    swappable.register(cfg, "entities__bulk_edit", bulk_edit);
    swappable.register(cfg, "entities__import", import_csv);
    swappable.register(cfg, "entities__create_form", create_form);
    swappable.register(cfg, "entities__create", create);
    swappable.register(cfg, "entities__trash", trash_page);
    swappable.register(cfg, "entities__empty_trash", empty_trash);
    swappable.register(cfg, "entities__detail", detail);
    swappable.register(cfg, "entities__edit_form", edit_form);
    swappable.register(cfg, "entities__edit", edit);
    swappable.register(cfg, "entities__trash_entity", trash_entity);
    swappable.register(cfg, "entities__restore", restore);
    swappable.register(cfg, "entities__delete", delete);
    swappable.register(cfg, "entities__add_address", add_address);
    swappable.register(cfg, "entities__edit_address", edit_address);
    swappable.register(cfg, "entities__delete_address", delete_address);
    swappable.register(cfg, "relations__add", add_relations);
    swappable.register(cfg, "relations__delete", delete_relation);
    swappable.register(cfg, "properties__add", add_properties);
    swappable.register(cfg, "properties__remove", remove_property);
}

/// Kinds with a dedicated creation and edition page.
fn dedicated_form(kind: EntityKind) -> Option<&'static str> {
    match kind {
        EntityKind::Activity => Some("/activities/add"),
        EntityKind::RecurrentGenerator => Some("/recurrents/add"),
        _ => None,
    }
}

fn entity_url(id: EntityId) -> String {
    format!("/entity/{id}")
}

fn list_url(kind: EntityKind) -> String {
    format!("/list/{}", kind.slug())
}

#[get("/list/{kind}")]
pub async fn list(
    kind: web::Path<String>,
    query: web::Query<ListQuery>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    match entities::list_page(repo.get_ref(), &user, kind, query.into_inner()) {
        Ok(data) => {
            let mut context =
                base_context(&flash_messages, &user, kind.slug(), &server_config.auth_service_url);
            context.insert("page", &data);
            context.insert("verbose_name", kind.verbose_name());
            context.insert("can_import", &matches!(kind, EntityKind::Contact | EntityKind::Organisation));
            render_template(&tera, "entities/list.html", &context)
        }
        Err(err) => page_error(err, "the list view"),
    }
}

#[get("/list/{kind}/export")]
pub async fn export(
    kind: web::Path<String>,
    query: web::Query<ListQuery>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    match entities::export_csv(repo.get_ref(), &user, kind, &query) {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/csv; charset=utf-8")
            .insert_header((
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.csv\"", kind.slug()),
            ))
            .body(body),
        Err(err) => page_error(err, "the CSV export"),
    }
}

#[post("/list/{kind}/bulk")]
pub async fn bulk_edit(
    kind: web::Path<String>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    let back = list_url(kind);
    let result = (|| -> ServiceResult<_> {
        let form: BulkEditForm = parse_urlencoded(&body)?;
        entities::bulk_edit(repo.get_ref(), &user, kind, form.try_into()?)
    })();
    match result {
        Ok(outcome) => {
            FlashMessage::success(format!("{} entities updated.", outcome.updated)).send();
            for (label, error) in outcome.errors {
                FlashMessage::warning(format!("{label}: {error}")).send();
            }
            redirect(&back)
        }
        Err(err) => flash_error(err, "edit the entities", &back),
    }
}

#[post("/list/{kind}/import")]
pub async fn import_csv(
    kind: web::Path<String>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    MultipartForm(mut form): MultipartForm<UploadCsvForm>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    let back = list_url(kind);
    let result = form
        .parse()
        .map_err(ServiceError::from)
        .and_then(|table| import::import_csv(repo.get_ref(), &user, kind, &table));
    match result {
        Ok(report) => {
            FlashMessage::success(format!("{} entities imported.", report.created)).send();
            if !report.ignored_columns.is_empty() {
                FlashMessage::warning(format!(
                    "Ignored columns: {}",
                    report.ignored_columns.join(", ")
                ))
                .send();
            }
            for (line, error) in report.errors {
                FlashMessage::warning(format!("Line {line}: {error}")).send();
            }
            redirect(&back)
        }
        Err(err) => flash_error(err, "import the file", &back),
    }
}

#[get("/add/{kind}")]
pub async fn create_form(
    kind: web::Path<String>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    if let Some(url) = dedicated_form(kind) {
        return redirect(url);
    }
    match entities::form_page(repo.get_ref(), kind, None) {
        Ok(form) => {
            let mut context =
                base_context(&flash_messages, &user, kind.slug(), &server_config.auth_service_url);
            context.insert("form", &form);
            context.insert("verbose_name", kind.verbose_name());
            context.insert("is_billing", &kind.is_billing_document());
            render_template(&tera, "entities/form.html", &context)
        }
        Err(err) => page_error(err, "the creation form"),
    }
}

#[post("/add/{kind}")]
pub async fn create(
    kind: web::Path<String>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    if let Some(url) = dedicated_form(kind) {
        return redirect(url);
    }
    let result = (|| -> ServiceResult<_> {
        let form = EntityForm::from_bytes(&body)?;
        if kind.is_billing_document() {
            let parties = DocumentParties {
                source_id: form.get_id("source_id")?,
                target_id: form.get_id("target_id")?,
            };
            billing::create_document(repo.get_ref(), &user, kind, &form, parties)
        } else {
            entities::create_entity(repo.get_ref(), &user, kind, &form)
        }
    })();
    match result {
        Ok(entity) => {
            FlashMessage::success(format!("{} created.", kind.verbose_name())).send();
            redirect(&entity_url(entity.id()))
        }
        Err(err) => flash_error(err, "create the entity", &format!("/add/{}", kind.slug())),
    }
}

#[get("/entity/{id}")]
pub async fn detail(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = EntityId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    let repo = repo.get_ref();
    let data = match entities::detail_page(repo, &user, id) {
        Ok(data) => data,
        Err(err) => return page_error(err, "the detail view"),
    };
    let kind = data.entity.base.kind;
    let mut context = base_context(&flash_messages, &user, kind.slug(), &server_config.auth_service_url);

    // Kind specific blocks of the page.
    let extras = (|| -> ServiceResult<()> {
        context.insert("relation_types", &relations::list_relation_types(repo)?);
        context.insert("property_types", &relations::list_property_types(repo)?);
        match kind {
            EntityKind::Contact | EntityKind::Organisation => {
                context.insert("managed_organisations", &persons::list_managed_organisations(repo)?);
            }
            EntityKind::Activity => {
                context.insert("participants", &activities::list_participants(repo, id)?);
            }
            EntityKind::MailingList => {
                context.insert("mailing_list", &emails::mailing_list_page(repo, id)?);
            }
            EntityKind::EmailCampaign => {
                context.insert("campaign", &emails::campaign_page(repo, id)?);
            }
            EntityKind::Event => {
                context.insert("event", &events::event_page(repo, id)?);
            }
            EntityKind::RecurrentGenerator => {
                context.insert("template", &recurrents::generator_template(repo, &data.entity)?);
            }
            kind if kind.is_billing_document() => {
                context.insert("billing", &billing::document_extras(repo, id)?);
            }
            _ => {}
        }
        Ok(())
    })();
    if let Err(err) = extras {
        return page_error(err, "the detail view");
    }

    context.insert("verbose_name", kind.verbose_name());
    context.insert("detail", &data);
    render_template(&tera, "entities/detail.html", &context)
}

#[get("/entity/{id}/edit")]
pub async fn edit_form(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = EntityId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    let result = entities::get_entity(repo.get_ref(), id).and_then(|entity| {
        let form = entities::form_page(repo.get_ref(), entity.base.kind, Some(&entity))?;
        Ok((entity, form))
    });
    match result {
        Ok((entity, form)) => {
            let kind = entity.base.kind;
            if kind == EntityKind::Activity {
                return redirect(&format!("/activities/{id}/edit"));
            }
            let mut context =
                base_context(&flash_messages, &user, kind.slug(), &server_config.auth_service_url);
            context.insert("form", &form);
            context.insert("entity", &entity);
            context.insert("verbose_name", kind.verbose_name());
            context.insert("is_billing", &false);
            render_template(&tera, "entities/form.html", &context)
        }
        Err(err) => page_error(err, "the edition form"),
    }
}

#[post("/entity/{id}/edit")]
pub async fn edit(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = EntityId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    let result = (|| -> ServiceResult<_> {
        let form = EntityForm::from_bytes(&body)?;
        let entity = entities::get_entity(repo.get_ref(), id)?;
        if entity.base.kind.is_billing_document() {
            billing::update_document(repo.get_ref(), &user, id, &form)
        } else {
            entities::update_entity(repo.get_ref(), &user, id, &form)
        }
    })();
    match result {
        Ok(_) => {
            FlashMessage::success("Changes saved.").send();
            redirect(&entity_url(id))
        }
        Err(err) => flash_error(err, "save the entity", &format!("/entity/{id}/edit")),
    }
}

#[post("/entity/{id}/trash")]
pub async fn trash_entity(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = EntityId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    match entities::trash_entity(repo.get_ref(), &user, id) {
        Ok(entity) => {
            FlashMessage::success(format!("\"{}\" moved to the trash.", entity.label())).send();
            redirect(&list_url(entity.kind))
        }
        Err(err) => flash_error(err, "move the entity to the trash", &entity_url(id)),
    }
}

#[post("/entity/{id}/restore")]
pub async fn restore(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = EntityId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    match entities::restore_entity(repo.get_ref(), &user, id) {
        Ok(entity) => {
            FlashMessage::success(format!("\"{}\" restored.", entity.label())).send();
            redirect(&entity_url(id))
        }
        Err(err) => flash_error(err, "restore the entity", "/trash"),
    }
}

#[post("/entity/{id}/delete")]
pub async fn delete(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = EntityId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    match entities::delete_definitively(repo.get_ref(), &user, id) {
        Ok(()) => {
            FlashMessage::success("Entity deleted.").send();
            redirect("/trash")
        }
        Err(err) => flash_error(err, "delete the entity", "/trash"),
    }
}

#[derive(serde::Deserialize)]
struct TrashQueryParams {
    page: Option<usize>,
}

#[get("/trash")]
pub async fn trash_page(
    params: web::Query<TrashQueryParams>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    match entities::trash_page(repo.get_ref(), &user, params.page) {
        Ok(data) => {
            let mut context =
                base_context(&flash_messages, &user, "trash", &server_config.auth_service_url);
            context.insert("trash", &data);
            render_template(&tera, "entities/trash.html", &context)
        }
        Err(err) => page_error(err, "the trash"),
    }
}

#[post("/trash/empty")]
pub async fn empty_trash(
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    match entities::empty_trash(repo.get_ref(), &user) {
        Ok(outcome) => {
            FlashMessage::success(format!("{} entities deleted.", outcome.deleted)).send();
            for (label, error) in outcome.errors {
                FlashMessage::warning(format!("{label}: {error}")).send();
            }
            redirect("/trash")
        }
        Err(err) => flash_error(err, "empty the trash", "/trash"),
    }
}

fn address_result(
    repo: &DieselRepository,
    user: &User,
    owner_id: EntityId,
    address_id: Option<AddressId>,
    body: &[u8],
) -> ServiceResult<()> {
    let form: AddressForm = parse_urlencoded(body)?;
    entities::save_address(repo, user, owner_id, address_id, form)?;
    Ok(())
}

#[post("/entity/{id}/address")]
pub async fn add_address(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = EntityId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    match address_result(repo.get_ref(), &user, id, None, &body) {
        Ok(()) => {
            FlashMessage::success("Address added.").send();
            redirect(&entity_url(id))
        }
        Err(err) => flash_error(err, "save the address", &entity_url(id)),
    }
}

#[post("/entity/{id}/address/{address_id}")]
pub async fn edit_address(
    path: web::Path<(i32, i32)>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let (id, address_id) = path.into_inner();
    let (Ok(id), Ok(address_id)) = (EntityId::new(id), AddressId::new(address_id)) else {
        return HttpResponse::NotFound().finish();
    };
    match address_result(repo.get_ref(), &user, id, Some(address_id), &body) {
        Ok(()) => {
            FlashMessage::success("Address saved.").send();
            redirect(&entity_url(id))
        }
        Err(err) => flash_error(err, "save the address", &entity_url(id)),
    }
}

#[post("/entity/{id}/address/{address_id}/delete")]
pub async fn delete_address(
    path: web::Path<(i32, i32)>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let (id, address_id) = path.into_inner();
    let (Ok(id), Ok(address_id)) = (EntityId::new(id), AddressId::new(address_id)) else {
        return HttpResponse::NotFound().finish();
    };
    match entities::delete_address(repo.get_ref(), &user, id, address_id) {
        Ok(()) => {
            FlashMessage::success("Address deleted.").send();
            redirect(&entity_url(id))
        }
        Err(err) => flash_error(err, "delete the address", &entity_url(id)),
    }
}

#[post("/entity/{id}/relations")]
pub async fn add_relations(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = EntityId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    let result = (|| -> ServiceResult<_> {
        let form: AddRelationsForm = parse_urlencoded(&body)?;
        relations::add_relations(repo.get_ref(), &user, id, form.try_into()?)
    })();
    match result {
        Ok(created) => {
            FlashMessage::success(format!("{} relations added.", created.len())).send();
            redirect(&entity_url(id))
        }
        Err(err) => flash_error(err, "add the relations", &entity_url(id)),
    }
}

#[post("/relation/{id}/delete")]
pub async fn delete_relation(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = RelationId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    match relations::delete_relation(repo.get_ref(), &user, id) {
        Ok(relation) => {
            FlashMessage::success("Relation deleted.").send();
            redirect(&entity_url(relation.subject_id))
        }
        Err(err) => flash_error(err, "delete the relation", "/"),
    }
}

#[post("/entity/{id}/properties")]
pub async fn add_properties(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = EntityId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    let result = (|| -> ServiceResult<_> {
        let form: AddPropertiesForm = parse_urlencoded(&body)?;
        let type_ids: Vec<PropertyTypeId> = form.try_into()?;
        relations::add_properties(repo.get_ref(), &user, id, &type_ids)
    })();
    match result {
        Ok(added) => {
            FlashMessage::success(format!("{added} properties added.")).send();
            redirect(&entity_url(id))
        }
        Err(err) => flash_error(err, "add the properties", &entity_url(id)),
    }
}

#[post("/entity/{id}/properties/{type_id}/delete")]
pub async fn remove_property(
    path: web::Path<(i32, i32)>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let (id, type_id) = path.into_inner();
    let (Ok(id), Ok(type_id)) = (EntityId::new(id), PropertyTypeId::new(type_id)) else {
        return HttpResponse::NotFound().finish();
    };
    match relations::remove_property(repo.get_ref(), &user, id, type_id) {
        Ok(()) => {
            FlashMessage::success("Property removed.").send();
            redirect(&entity_url(id))
        }
        Err(err) => flash_error(err, "remove the property", &entity_url(id)),
    }
}
