//! Lines, statuses, numbers and conversions of billing documents.

use actix_web::{HttpResponse, Responder, post, web};
use actix_web_flash_messages::FlashMessage;

use crate::domain::auth::AuthenticatedUser;
use crate::domain::billing::LineData;
use crate::domain::entity::EntityKind;
use crate::domain::types::{EntityId, LineId, StatusId};
use crate::forms::billing::{ConvertForm, LineForm, StatusForm};
use crate::forms::parse_urlencoded;
use crate::repository::DieselRepository;
use crate::routes::{Swappable, flash_error, redirect, user_or_return};
use crate::services::{ServiceError, ServiceResult, billing};

pub fn configure(swappable: &Swappable<'_>, cfg: &mut web::ServiceConfig) {
    swappable.register(cfg, "billing__add_line", add_line);
    swappable.register(cfg, "billing__update_line", update_line);
    swappable.register(cfg, "billing__delete_line", delete_line);
    swappable.register(cfg, "billing__set_status", set_status);
    swappable.register(cfg, "billing__generate_number", generate_number);
    swappable.register(cfg, "billing__convert", convert);
}

fn document_url(id: EntityId) -> String {
    format!("/entity/{id}")
}

#[post("/billing/{id}/lines")]
pub async fn add_line(
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
        let form: LineForm = parse_urlencoded(&body)?;
        let line = LineData::try_from(form)?;
        billing::add_line(repo.get_ref(), &user, id, line)
    })();
    match result {
        Ok(_) => {
            FlashMessage::success("Line added.").send();
            redirect(&document_url(id))
        }
        Err(err) => flash_error(err, "add the line", &document_url(id)),
    }
}

#[post("/billing/line/{line_id}")]
pub async fn update_line(
    line_id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(line_id) = LineId::new(line_id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    let result = (|| -> ServiceResult<_> {
        let form: LineForm = parse_urlencoded(&body)?;
        let line = LineData::try_from(form)?;
        billing::update_line(repo.get_ref(), &user, line_id, line)
    })();
    match result {
        Ok(line) => {
            FlashMessage::success("Line saved.").send();
            redirect(&document_url(line.document_id))
        }
        Err(err) => flash_error(err, "save the line", "/"),
    }
}

#[post("/billing/line/{line_id}/delete")]
pub async fn delete_line(
    line_id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(line_id) = LineId::new(line_id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    match billing::delete_line(repo.get_ref(), &user, line_id) {
        Ok(document_id) => {
            FlashMessage::success("Line deleted.").send();
            redirect(&document_url(document_id))
        }
        Err(err) => flash_error(err, "delete the line", "/"),
    }
}

#[post("/billing/{id}/status")]
pub async fn set_status(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    web::Form(form): web::Form<StatusForm>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = EntityId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    let result = StatusId::new(form.status_id)
        .map_err(|_| ServiceError::NotFound)
        .and_then(|status_id| billing::set_status(repo.get_ref(), &user, id, status_id));
    match result {
        Ok(_) => {
            FlashMessage::success("Status changed.").send();
            redirect(&document_url(id))
        }
        Err(err) => flash_error(err, "change the status", &document_url(id)),
    }
}

#[post("/billing/{id}/number")]
pub async fn generate_number(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = EntityId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    match billing::generate_number(repo.get_ref(), &user, id) {
        Ok(number) => {
            FlashMessage::success(format!("Number {number} assigned.")).send();
            redirect(&document_url(id))
        }
        Err(err) => flash_error(err, "generate the number", &document_url(id)),
    }
}

#[post("/billing/{id}/convert")]
pub async fn convert(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    web::Form(form): web::Form<ConvertForm>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = EntityId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    let result = EntityKind::try_from(form)
        .map_err(ServiceError::from)
        .and_then(|target_kind| billing::convert(repo.get_ref(), &user, id, target_kind));
    match result {
        Ok(created) => {
            FlashMessage::success(format!(
                "{} \"{}\" created.",
                created.base.kind.verbose_name(),
                created.base.label()
            ))
            .send();
            redirect(&document_url(created.base.id))
        }
        Err(err) => flash_error(err, "convert the document", &document_url(id)),
    }
}
