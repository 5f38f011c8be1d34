//! Creation of recurrent generators from a billing document.

use actix_web::{HttpResponse, Responder, get, post, web};
use actix_web_flash_messages::{FlashMessage, IncomingFlashMessages};
use serde::Deserialize;
use tera::Tera;

use crate::domain::auth::AuthenticatedUser;
use crate::domain::entity::EntityKind;
use crate::domain::period::PeriodUnit;
use crate::domain::types::EntityId;
use crate::forms::parse_urlencoded;
use crate::forms::recurrents::{GeneratorForm, GeneratorPayload};
use crate::models::config::ServerConfig;
use crate::repository::DieselRepository;
use crate::routes::{
    Swappable, base_context, flash_error, page_error, redirect, render_template, user_or_return,
};
use crate::services::{ServiceResult, billing, recurrents};

pub fn configure(swappable: &Swappable<'_>, cfg: &mut web::ServiceConfig) {
    swappable.register(cfg, "recurrents__create_form", create_form);
    swappable.register(cfg, "recurrents__create", create);
}

#[derive(Debug, Deserialize)]
pub struct SourceQuery {
    pub source_id: Option<i32>,
}

#[get("/recurrents/add")]
pub async fn create_form(
    query: web::Query<SourceQuery>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let mut context =
        base_context(&flash_messages, &user, "recurrents", &server_config.auth_service_url);
    let target_kinds: Vec<(&str, &str)> = EntityKind::ALL
        .into_iter()
        .filter(|kind| kind.is_billing_document() && *kind != EntityKind::TemplateBase)
        .map(|kind| (kind.as_str(), kind.verbose_name()))
        .collect();
    let units: Vec<&str> = PeriodUnit::ALL.into_iter().map(PeriodUnit::as_str).collect();
    context.insert("target_kinds", &target_kinds);
    context.insert("periodicity_units", &units);
    if let Some(source_id) = query.source_id {
        let Ok(source_id) = EntityId::new(source_id) else {
            return HttpResponse::NotFound().finish();
        };
        match billing::get_document(repo.get_ref(), source_id) {
            Ok(source) => context.insert("source", &source.base),
            Err(err) => return page_error(err, "the generator form"),
        }
    }
    render_template(&tera, "recurrents/form.html", &context)
}

#[post("/recurrents/add")]
pub async fn create(
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let result = (|| -> ServiceResult<_> {
        let form: GeneratorForm = parse_urlencoded(&body)?;
        let payload = GeneratorPayload::try_from(form)?;
        recurrents::create_generator(repo.get_ref(), &user, payload)
    })();
    match result {
        Ok(generator) => {
            FlashMessage::success(format!("Generator \"{}\" created.", generator.base.label()))
                .send();
            redirect(&format!("/entity/{}", generator.id()))
        }
        Err(err) => flash_error(err, "create the generator", "/recurrents/add"),
    }
}
