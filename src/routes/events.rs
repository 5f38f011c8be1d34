//! Invitation and presence of the contacts of an event.

use actix_web::{HttpResponse, Responder, post, web};
use actix_web_flash_messages::FlashMessage;

use crate::domain::auth::AuthenticatedUser;
use crate::domain::event::{InvitationStatus, PresenceStatus};
use crate::domain::types::EntityId;
use crate::forms::events::{InvitationForm, PresenceForm};
use crate::repository::DieselRepository;
use crate::routes::{Swappable, flash_error, redirect, user_or_return};
use crate::services::{ServiceError, events};

pub fn configure(swappable: &Swappable<'_>, cfg: &mut web::ServiceConfig) {
    swappable.register(cfg, "events__set_invitation", set_invitation);
    swappable.register(cfg, "events__set_presence", set_presence);
}

#[post("/events/{id}/invitation")]
pub async fn set_invitation(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    web::Form(form): web::Form<InvitationForm>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = EntityId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    let back = format!("/entity/{id}");
    let result = <(EntityId, InvitationStatus)>::try_from(form)
        .map_err(ServiceError::from)
        .and_then(|(contact_id, status)| {
            events::set_invitation_status(repo.get_ref(), &user, id, contact_id, status)
        });
    match result {
        Ok(()) => {
            FlashMessage::success("Invitation status saved.").send();
            redirect(&back)
        }
        Err(err) => flash_error(err, "change the invitation status", &back),
    }
}

#[post("/events/{id}/presence")]
pub async fn set_presence(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    web::Form(form): web::Form<PresenceForm>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = EntityId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    let back = format!("/entity/{id}");
    let result = <(EntityId, PresenceStatus)>::try_from(form)
        .map_err(ServiceError::from)
        .and_then(|(contact_id, status)| {
            events::set_presence(repo.get_ref(), &user, id, contact_id, status)
        });
    match result {
        Ok(()) => {
            FlashMessage::success("Presence saved.").send();
            redirect(&back)
        }
        Err(err) => flash_error(err, "change the presence", &back),
    }
}
