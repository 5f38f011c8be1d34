//! Administration pages: relation and property types, custom fields,
//! filters, custom forms, jobs and the configuration transfer.

use actix_multipart::form::MultipartForm;
use actix_web::http::header;
use actix_web::{HttpResponse, Responder, get, post, web};
use actix_web_flash_messages::{FlashMessage, IncomingFlashMessages};
use serde::Deserialize;
use tera::{Context, Tera};

use crate::domain::auth::AuthenticatedUser;
use crate::domain::custom_field::NewCustomField;
use crate::domain::custom_form::{FormDescriptor, FormGroup};
use crate::domain::entity::EntityKind;
use crate::domain::property::NewPropertyType;
use crate::domain::types::{CustomFieldId, JobId, PropertyTypeId};
use crate::domain::user::User;
use crate::dto::config::{CustomFormRow, EntityFilterRow};
use crate::forms::custom_fields::{AddChoiceForm, CustomFieldForm};
use crate::forms::filters::{
    CustomFormForm, EntityFilterForm, EntityFilterPayload, HeaderFilterForm, HeaderFilterPayload,
};
use crate::forms::import::UploadConfigForm;
use crate::forms::parse_urlencoded;
use crate::forms::relations::{PropertyTypeForm, RelationTypeForm, RelationTypePayload};
use crate::models::config::ServerConfig;
use crate::repository::DieselRepository;
use crate::routes::{
    Swappable, base_context, flash_error, page_error, parse_kind, redirect, render_template,
    user_or_return,
};
use crate::services::emails::LogTransport;
use crate::services::users::ensure_admin;
use crate::services::{
    ServiceError, ServiceResult, config_transfer, custom_fields, filters, jobs, relations,
};

pub fn configure(swappable: &Swappable<'_>, cfg: &mut web::ServiceConfig) {
    swappable.register(cfg, "config__index", index);
    swappable.register(cfg, "config__relation_types", relation_types);
    swappable.register(cfg, "config__add_relation_type", add_relation_type);
    swappable.register(cfg, "config__delete_relation_type", delete_relation_type);
    swappable.register(cfg, "config__enable_relation_type", enable_relation_type);
    swappable.register(cfg, "config__add_property_type", add_property_type);
    swappable.register(cfg, "config__delete_property_type", delete_property_type);
    swappable.register(cfg, "config__custom_fields", custom_fields_page);
    swappable.register(cfg, "config__add_custom_field", add_custom_field);
    swappable.register(cfg, "config__custom_field", custom_field_page);
    swappable.register(cfg, "config__delete_custom_field", delete_custom_field);
    swappable.register(cfg, "config__restore_custom_field", restore_custom_field);
    swappable.register(cfg, "config__add_choice", add_choice);
    swappable.register(cfg, "config__filters", filters_page);
    swappable.register(cfg, "config__add_entity_filter", add_entity_filter);
    swappable.register(cfg, "config__edit_entity_filter", edit_entity_filter);
    swappable.register(cfg, "config__delete_entity_filter", delete_entity_filter);
    swappable.register(cfg, "config__add_header_filter", add_header_filter);
    swappable.register(cfg, "config__edit_header_filter", edit_header_filter);
    swappable.register(cfg, "config__delete_header_filter", delete_header_filter);
    swappable.register(cfg, "config__custom_forms", custom_forms_page);
    swappable.register(cfg, "config__custom_form", custom_form_page);
    swappable.register(cfg, "config__save_custom_form", save_custom_form);
    swappable.register(cfg, "config__reset_custom_form", reset_custom_form);
    swappable.register(cfg, "config__jobs", jobs_page);
    swappable.register(cfg, "config__enable_job", enable_job);
    swappable.register(cfg, "config__run_job", run_job);
    swappable.register(cfg, "config__export", export_config);
    swappable.register(cfg, "config__import", import_config);
}

#[derive(Debug, Deserialize)]
pub struct EnabledForm {
    #[serde(default)]
    pub enabled: bool,
}

/// `(slug, id, verbose name)` of every kind users work with.
fn kind_choices() -> Vec<(&'static str, &'static str, &'static str)> {
    EntityKind::ALL
        .into_iter()
        .filter(|kind| *kind != EntityKind::TemplateBase)
        .map(|kind| (kind.slug(), kind.as_str(), kind.verbose_name()))
        .collect()
}

/// Renders an admin page whose context is filled by `fill`.
fn admin_page<F>(
    user: &User,
    flash_messages: &IncomingFlashMessages,
    server_config: &ServerConfig,
    tera: &Tera,
    template: &str,
    fill: F,
) -> HttpResponse
where
    F: FnOnce(&mut Context) -> ServiceResult<()>,
{
    let mut context = base_context(flash_messages, user, "settings", &server_config.auth_service_url);
    let result = ensure_admin(user).and_then(|()| fill(&mut context));
    match result {
        Ok(()) => render_template(tera, template, &context),
        Err(err) => page_error(err, "the settings"),
    }
}

#[get("/settings")]
pub async fn index(
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    admin_page(&user, &flash_messages, &server_config, &tera, "config/index.html", |context| {
        context.insert("kinds", &kind_choices());
        Ok(())
    })
}

#[get("/settings/relation_types")]
pub async fn relation_types(
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let repo = repo.get_ref();
    admin_page(
        &user,
        &flash_messages,
        &server_config,
        &tera,
        "config/relation_types.html",
        |context| {
            context.insert("relation_types", &relations::list_relation_types(repo)?);
            context.insert("property_types", &relations::list_property_types(repo)?);
            context.insert("kinds", &kind_choices());
            Ok(())
        },
    )
}

#[post("/settings/relation_types/add")]
pub async fn add_relation_type(
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let result = (|| -> ServiceResult<_> {
        let form: RelationTypeForm = parse_urlencoded(&body)?;
        let payload = RelationTypePayload::try_from(form)?;
        relations::create_relation_type_pair(repo.get_ref(), &user, payload)
    })();
    match result {
        Ok((subject, object)) => {
            FlashMessage::success(format!(
                "Relation type \"{}\" / \"{}\" created.",
                subject.predicate, object.predicate
            ))
            .send();
            redirect("/settings/relation_types")
        }
        Err(err) => flash_error(err, "create the relation type", "/settings/relation_types"),
    }
}

#[post("/settings/relation_types/{id}/delete")]
pub async fn delete_relation_type(
    id: web::Path<String>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    match relations::delete_relation_type(repo.get_ref(), &user, &id) {
        Ok(()) => {
            FlashMessage::success("Relation type deleted.").send();
            redirect("/settings/relation_types")
        }
        Err(err) => flash_error(err, "delete the relation type", "/settings/relation_types"),
    }
}

#[post("/settings/relation_types/{id}/enabled")]
pub async fn enable_relation_type(
    id: web::Path<String>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    web::Form(form): web::Form<EnabledForm>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    match relations::set_relation_type_enabled(repo.get_ref(), &user, &id, form.enabled) {
        Ok(()) => {
            FlashMessage::success("Relation type updated.").send();
            redirect("/settings/relation_types")
        }
        Err(err) => flash_error(err, "update the relation type", "/settings/relation_types"),
    }
}

#[post("/settings/property_types/add")]
pub async fn add_property_type(
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let result = (|| -> ServiceResult<_> {
        let form: PropertyTypeForm = parse_urlencoded(&body)?;
        let property_type = NewPropertyType::try_from(form)?;
        relations::create_property_type(repo.get_ref(), &user, property_type)
    })();
    match result {
        Ok(ptype) => {
            FlashMessage::success(format!("Property type \"{}\" created.", ptype.text)).send();
            redirect("/settings/relation_types")
        }
        Err(err) => flash_error(err, "create the property type", "/settings/relation_types"),
    }
}

#[post("/settings/property_types/{id}/delete")]
pub async fn delete_property_type(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = PropertyTypeId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    match relations::delete_property_type(repo.get_ref(), &user, id) {
        Ok(()) => {
            FlashMessage::success("Property type deleted.").send();
            redirect("/settings/relation_types")
        }
        Err(err) => flash_error(err, "delete the property type", "/settings/relation_types"),
    }
}

#[get("/settings/custom_fields")]
pub async fn custom_fields_page(
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let repo = repo.get_ref();
    admin_page(
        &user,
        &flash_messages,
        &server_config,
        &tera,
        "config/custom_fields.html",
        |context| {
            context.insert("custom_fields", &custom_fields::list_custom_fields(repo, None)?);
            context.insert("kinds", &kind_choices());
            Ok(())
        },
    )
}

#[post("/settings/custom_fields/add")]
pub async fn add_custom_field(
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let result = (|| -> ServiceResult<_> {
        let form: CustomFieldForm = parse_urlencoded(&body)?;
        let field = NewCustomField::try_from(form)?;
        custom_fields::create_custom_field(repo.get_ref(), &user, field)
    })();
    match result {
        Ok(field) => {
            FlashMessage::success(format!("Custom field \"{}\" created.", field.name)).send();
            redirect("/settings/custom_fields")
        }
        Err(err) => flash_error(err, "create the custom field", "/settings/custom_fields"),
    }
}

#[get("/settings/custom_fields/{id}")]
pub async fn custom_field_page(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = CustomFieldId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    let repo = repo.get_ref();
    admin_page(
        &user,
        &flash_messages,
        &server_config,
        &tera,
        "config/custom_field.html",
        |context| {
            context.insert("custom_field", &custom_fields::get_custom_field(repo, id)?);
            context.insert("choices", &custom_fields::list_choices(repo, id)?);
            Ok(())
        },
    )
}

#[post("/settings/custom_fields/{id}/delete")]
pub async fn delete_custom_field(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = CustomFieldId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    match custom_fields::delete_custom_field(repo.get_ref(), &user, id) {
        Ok(true) => {
            FlashMessage::success("Custom field removed with its values.").send();
            redirect("/settings/custom_fields")
        }
        Ok(false) => {
            FlashMessage::success("Custom field marked as deleted.").send();
            redirect("/settings/custom_fields")
        }
        Err(err) => flash_error(err, "delete the custom field", "/settings/custom_fields"),
    }
}

#[post("/settings/custom_fields/{id}/restore")]
pub async fn restore_custom_field(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = CustomFieldId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    match custom_fields::restore_custom_field(repo.get_ref(), &user, id) {
        Ok(()) => {
            FlashMessage::success("Custom field restored.").send();
            redirect("/settings/custom_fields")
        }
        Err(err) => flash_error(err, "restore the custom field", "/settings/custom_fields"),
    }
}

#[post("/settings/custom_fields/{id}/choices")]
pub async fn add_choice(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    web::Form(form): web::Form<AddChoiceForm>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = CustomFieldId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    let back = format!("/settings/custom_fields/{id}");
    match custom_fields::add_choice(repo.get_ref(), &user, id, form.value.trim()) {
        Ok(choice) => {
            FlashMessage::success(format!("Choice \"{}\" added.", choice.value)).send();
            redirect(&back)
        }
        Err(err) => flash_error(err, "add the choice", &back),
    }
}

fn filters_url(kind: EntityKind) -> String {
    format!("/settings/filters/{}", kind.slug())
}

#[get("/settings/filters/{kind}")]
pub async fn filters_page(
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
    let repo = repo.get_ref();
    let user_ref = &user;
    admin_page(&user, &flash_messages, &server_config, &tera, "config/filters.html", |context| {
        let entity_filters = filters::list_entity_filters(repo, user_ref, kind)?
            .iter()
            .map(|filter| EntityFilterRow::new(filter, user_ref))
            .collect::<Result<Vec<_>, _>>()
            .map_err(ServiceError::from)?;
        context.insert("kind", kind.slug());
        context.insert("kind_id", kind.as_str());
        context.insert("verbose_name", kind.verbose_name());
        context.insert("entity_filters", &entity_filters);
        context.insert("header_filters", &filters::list_header_filters(repo, user_ref, kind)?);
        context.insert("custom_fields", &filters::live_custom_fields(repo, kind)?);
        Ok(())
    })
}

#[post("/settings/filters/{kind}/entity")]
pub async fn add_entity_filter(
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
    let result = (|| -> ServiceResult<_> {
        let form: EntityFilterForm = parse_urlencoded(&body)?;
        let payload = EntityFilterPayload::try_from(form)?;
        filters::create_entity_filter(repo.get_ref(), &user, payload)
    })();
    match result {
        Ok(filter) => {
            FlashMessage::success(format!("Filter \"{}\" created.", filter.name)).send();
            redirect(&filters_url(filter.entity_kind))
        }
        Err(err) => flash_error(err, "create the filter", &filters_url(kind)),
    }
}

#[post("/settings/filters/{kind}/entity/{id}")]
pub async fn edit_entity_filter(
    path: web::Path<(String, String)>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let (kind, id) = path.into_inner();
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    let result = (|| -> ServiceResult<_> {
        let form: EntityFilterForm = parse_urlencoded(&body)?;
        let payload = EntityFilterPayload::try_from(form)?;
        filters::update_entity_filter(repo.get_ref(), &user, &id, payload)
    })();
    match result {
        Ok(filter) => {
            FlashMessage::success(format!("Filter \"{}\" saved.", filter.name)).send();
            redirect(&filters_url(kind))
        }
        Err(err) => flash_error(err, "save the filter", &filters_url(kind)),
    }
}

#[post("/settings/filters/{kind}/entity/{id}/delete")]
pub async fn delete_entity_filter(
    path: web::Path<(String, String)>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let (kind, id) = path.into_inner();
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    match filters::delete_entity_filter(repo.get_ref(), &user, &id) {
        Ok(()) => {
            FlashMessage::success("Filter deleted.").send();
            redirect(&filters_url(kind))
        }
        Err(err) => flash_error(err, "delete the filter", &filters_url(kind)),
    }
}

#[post("/settings/filters/{kind}/header")]
pub async fn add_header_filter(
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
    let result = (|| -> ServiceResult<_> {
        let form: HeaderFilterForm = parse_urlencoded(&body)?;
        let payload = HeaderFilterPayload::try_from(form)?;
        filters::create_header_filter(repo.get_ref(), &user, payload)
    })();
    match result {
        Ok(view) => {
            FlashMessage::success(format!("View \"{}\" created.", view.name)).send();
            redirect(&filters_url(view.entity_kind))
        }
        Err(err) => flash_error(err, "create the view", &filters_url(kind)),
    }
}

#[post("/settings/filters/{kind}/header/{id}")]
pub async fn edit_header_filter(
    path: web::Path<(String, String)>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let (kind, id) = path.into_inner();
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    let result = (|| -> ServiceResult<_> {
        let form: HeaderFilterForm = parse_urlencoded(&body)?;
        let payload = HeaderFilterPayload::try_from(form)?;
        filters::update_header_filter(repo.get_ref(), &user, &id, payload)
    })();
    match result {
        Ok(view) => {
            FlashMessage::success(format!("View \"{}\" saved.", view.name)).send();
            redirect(&filters_url(kind))
        }
        Err(err) => flash_error(err, "save the view", &filters_url(kind)),
    }
}

#[post("/settings/filters/{kind}/header/{id}/delete")]
pub async fn delete_header_filter(
    path: web::Path<(String, String)>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let (kind, id) = path.into_inner();
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    match filters::delete_header_filter(repo.get_ref(), &user, &id) {
        Ok(()) => {
            FlashMessage::success("View deleted.").send();
            redirect(&filters_url(kind))
        }
        Err(err) => flash_error(err, "delete the view", &filters_url(kind)),
    }
}

#[get("/settings/custom_forms")]
pub async fn custom_forms_page(
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let repo = repo.get_ref();
    let user_ref = &user;
    admin_page(
        &user,
        &flash_messages,
        &server_config,
        &tera,
        "config/custom_forms.html",
        |context| {
            let configured = filters::configured_forms(repo, user_ref)?;
            let rows: Vec<CustomFormRow> = FormDescriptor::all()
                .filter(|descriptor| descriptor.kind != EntityKind::TemplateBase)
                .map(|descriptor| {
                    let descriptor_id = descriptor.id();
                    CustomFormRow {
                        is_configured: configured.contains(&descriptor_id),
                        descriptor_id,
                        kind: descriptor.kind.verbose_name(),
                        form_type: descriptor.form_type.as_str(),
                    }
                })
                .collect();
            context.insert("custom_forms", &rows);
            Ok(())
        },
    )
}

#[get("/settings/custom_forms/{descriptor_id}")]
pub async fn custom_form_page(
    descriptor_id: web::Path<String>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let repo = repo.get_ref();
    admin_page(
        &user,
        &flash_messages,
        &server_config,
        &tera,
        "config/custom_form.html",
        |context| {
            let descriptor = FormDescriptor::parse(&descriptor_id).map_err(ServiceError::from)?;
            let form = filters::load_custom_form(repo, descriptor)?;
            let groups: Vec<(String, String)> = form
                .groups
                .iter()
                .map(|group| {
                    let cells: Vec<String> = group.cells.iter().map(ToString::to_string).collect();
                    (group.name.clone(), cells.join(","))
                })
                .collect();
            context.insert("descriptor_id", &form.descriptor_id);
            context.insert("verbose_name", descriptor.kind.verbose_name());
            context.insert("groups", &groups);
            context.insert("custom_fields", &filters::live_custom_fields(repo, descriptor.kind)?);
            Ok(())
        },
    )
}

#[post("/settings/custom_forms/{descriptor_id}")]
pub async fn save_custom_form(
    descriptor_id: web::Path<String>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let back = format!("/settings/custom_forms/{descriptor_id}");
    let result = (|| -> ServiceResult<_> {
        let form: CustomFormForm = parse_urlencoded(&body)?;
        let groups: Vec<FormGroup> = form.try_into()?;
        filters::save_custom_form(repo.get_ref(), &user, &descriptor_id, groups)
    })();
    match result {
        Ok(_) => {
            FlashMessage::success("Form saved.").send();
            redirect(&back)
        }
        Err(err) => flash_error(err, "save the form", &back),
    }
}

#[post("/settings/custom_forms/{descriptor_id}/reset")]
pub async fn reset_custom_form(
    descriptor_id: web::Path<String>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    match filters::reset_custom_form(repo.get_ref(), &user, &descriptor_id) {
        Ok(()) => {
            FlashMessage::success("Form reset to its default layout.").send();
            redirect("/settings/custom_forms")
        }
        Err(err) => flash_error(err, "reset the form", "/settings/custom_forms"),
    }
}

#[get("/settings/jobs")]
pub async fn jobs_page(
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let repo = repo.get_ref();
    let user_ref = &user;
    admin_page(&user, &flash_messages, &server_config, &tera, "config/jobs.html", |context| {
        context.insert("jobs", &jobs::list_jobs(repo, user_ref)?);
        Ok(())
    })
}

#[post("/settings/jobs/{id}/enabled")]
pub async fn enable_job(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    web::Form(form): web::Form<EnabledForm>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = JobId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    match jobs::set_job_enabled(repo.get_ref(), &user, id, form.enabled) {
        Ok(()) => {
            FlashMessage::success("Job updated.").send();
            redirect("/settings/jobs")
        }
        Err(err) => flash_error(err, "update the job", "/settings/jobs"),
    }
}

#[post("/settings/jobs/{id}/run")]
pub async fn run_job(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = JobId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    let now = chrono::Utc::now().naive_utc();
    match jobs::run_job_now(repo.get_ref(), &LogTransport, &user, id, now) {
        Ok(result) => {
            match result.error {
                Some(error) => FlashMessage::warning(format!("Job failed: {error}")).send(),
                None => FlashMessage::success("Job done.").send(),
            }
            redirect("/settings/jobs")
        }
        Err(err) => flash_error(err, "run the job", "/settings/jobs"),
    }
}

#[get("/settings/transfer/export")]
pub async fn export_config(
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    match config_transfer::export_config(repo.get_ref(), &user) {
        Ok(document) => HttpResponse::Ok()
            .content_type("application/json")
            .insert_header((
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"config-transfer.json\"",
            ))
            .body(document),
        Err(err) => page_error(err, "the configuration export"),
    }
}

#[post("/settings/transfer/import")]
pub async fn import_config(
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    MultipartForm(mut form): MultipartForm<UploadConfigForm>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let result = form
        .read()
        .map_err(ServiceError::from)
        .and_then(|raw| config_transfer::import_config(repo.get_ref(), &user, &raw));
    match result {
        Ok(summary) => {
            FlashMessage::success(format!(
                "Configuration imported: {} property types, {} relation types, {} custom fields, \
                 {} views, {} filters, {} forms.",
                summary.property_types,
                summary.relation_types,
                summary.custom_fields,
                summary.header_filters,
                summary.entity_filters,
                summary.custom_forms
            ))
            .send();
            redirect("/settings")
        }
        Err(err) => flash_error(err, "import the configuration", "/settings"),
    }
}
