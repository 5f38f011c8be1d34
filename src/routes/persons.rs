//! Customer relations and managed organisations.

use actix_web::{HttpResponse, Responder, post, web};
use actix_web_flash_messages::FlashMessage;

use crate::domain::auth::AuthenticatedUser;
use crate::domain::types::EntityId;
use crate::forms::persons::{CustomerForm, CustomerPayload, ManagedForm};
use crate::repository::DieselRepository;
use crate::routes::{Swappable, flash_error, redirect, user_or_return};
use crate::services::{ServiceError, persons};

pub fn configure(swappable: &Swappable<'_>, cfg: &mut web::ServiceConfig) {
    swappable.register(cfg, "persons__set_customer", set_customer);
    swappable.register(cfg, "persons__set_managed", set_managed);
}

#[post("/persons/{id}/customer")]
pub async fn set_customer(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    web::Form(form): web::Form<CustomerForm>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = EntityId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    let back = format!("/entity/{id}");
    let result = CustomerPayload::try_from(form)
        .map_err(ServiceError::from)
        .and_then(|payload| persons::set_customer_status(repo.get_ref(), &user, id, payload));
    match result {
        Ok(_) => {
            FlashMessage::success("Relation with the organisation updated.").send();
            redirect(&back)
        }
        Err(err) => flash_error(err, "change the customer status", &back),
    }
}

#[post("/persons/organisation/{id}/managed")]
pub async fn set_managed(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    web::Form(form): web::Form<ManagedForm>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = EntityId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    let back = format!("/entity/{id}");
    match persons::set_managed(repo.get_ref(), &user, id, form.is_managed) {
        Ok(organisation) => {
            let message = if form.is_managed {
                format!("\"{}\" is now managed.", organisation.label())
            } else {
                format!("\"{}\" is no longer managed.", organisation.label())
            };
            FlashMessage::success(message).send();
            redirect(&back)
        }
        Err(err) => flash_error(err, "change the managed organisations", &back),
    }
}
