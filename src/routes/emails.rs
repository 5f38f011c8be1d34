//! Mailing list members, campaign lists and sendings.

use actix_web::{HttpResponse, Responder, get, post, web};
use actix_web_flash_messages::{FlashMessage, IncomingFlashMessages};
use tera::Tera;

use crate::domain::auth::AuthenticatedUser;
use crate::domain::emails::ListMemberKind;
use crate::domain::types::{EntityId, SendingId};
use crate::forms::emails::{
    MembersForm, RecipientsForm, RemoveRecipientForm, SendingForm, SendingPayload,
};
use crate::forms::parse_urlencoded;
use crate::models::config::ServerConfig;
use crate::repository::DieselRepository;
use crate::routes::{
    Swappable, base_context, flash_error, page_error, redirect, render_template, user_or_return,
};
use crate::services::{ServiceResult, emails};

pub fn configure(swappable: &Swappable<'_>, cfg: &mut web::ServiceConfig) {
    // Recipients first: the member routes match any segment.
    swappable.register(cfg, "emails__add_recipients", add_recipients);
    swappable.register(cfg, "emails__remove_recipient", remove_recipient);
    swappable.register(cfg, "emails__add_members", add_members);
    swappable.register(cfg, "emails__remove_member", remove_member);
    swappable.register(cfg, "emails__add_campaign_lists", add_campaign_lists);
    swappable.register(cfg, "emails__remove_campaign_list", remove_campaign_list);
    swappable.register(cfg, "emails__create_sending", create_sending);
    swappable.register(cfg, "emails__sending", sending);
    swappable.register(cfg, "emails__delete_sending", delete_sending);
}

/// Member kind from its URL segment.
fn member_kind(segment: &str) -> Option<ListMemberKind> {
    match segment {
        "contacts" => Some(ListMemberKind::Contact),
        "organisations" => Some(ListMemberKind::Organisation),
        "children" => Some(ListMemberKind::ChildList),
        _ => None,
    }
}

#[post("/mailing_list/{id}/{members}")]
pub async fn add_members(
    path: web::Path<(i32, String)>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let (id, segment) = path.into_inner();
    let (Ok(id), Some(kind)) = (EntityId::new(id), member_kind(&segment)) else {
        return HttpResponse::NotFound().finish();
    };
    let back = format!("/entity/{id}");
    let result = (|| -> ServiceResult<_> {
        let form: MembersForm = parse_urlencoded(&body)?;
        let member_ids: Vec<EntityId> = form.try_into()?;
        emails::add_members(repo.get_ref(), &user, id, kind, &member_ids)
    })();
    match result {
        Ok(added) => {
            FlashMessage::success(format!("{added} members added.")).send();
            redirect(&back)
        }
        Err(err) => flash_error(err, "add the members", &back),
    }
}

#[post("/mailing_list/{id}/{members}/{member_id}/delete")]
pub async fn remove_member(
    path: web::Path<(i32, String, i32)>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let (id, segment, member_id) = path.into_inner();
    let (Ok(id), Some(kind), Ok(member_id)) = (
        EntityId::new(id),
        member_kind(&segment),
        EntityId::new(member_id),
    ) else {
        return HttpResponse::NotFound().finish();
    };
    let back = format!("/entity/{id}");
    match emails::remove_member(repo.get_ref(), &user, id, kind, member_id) {
        Ok(()) => {
            FlashMessage::success("Member removed.").send();
            redirect(&back)
        }
        Err(err) => flash_error(err, "remove the member", &back),
    }
}

#[post("/mailing_list/{id}/recipients")]
pub async fn add_recipients(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    web::Form(form): web::Form<RecipientsForm>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = EntityId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    let back = format!("/entity/{id}");
    let result = (|| -> ServiceResult<_> {
        let addresses: Vec<String> = form.try_into()?;
        emails::add_recipients(repo.get_ref(), &user, id, &addresses)
    })();
    match result {
        Ok(added) => {
            FlashMessage::success(format!("{added} addresses added.")).send();
            redirect(&back)
        }
        Err(err) => flash_error(err, "add the addresses", &back),
    }
}

#[post("/mailing_list/{id}/recipients/delete")]
pub async fn remove_recipient(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    web::Form(form): web::Form<RemoveRecipientForm>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = EntityId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    let back = format!("/entity/{id}");
    match emails::remove_recipient(repo.get_ref(), &user, id, form.address.trim()) {
        Ok(()) => {
            FlashMessage::success("Address removed.").send();
            redirect(&back)
        }
        Err(err) => flash_error(err, "remove the address", &back),
    }
}

#[post("/campaign/{id}/mailing_lists")]
pub async fn add_campaign_lists(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = EntityId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    let back = format!("/entity/{id}");
    let result = (|| -> ServiceResult<_> {
        let form: MembersForm = parse_urlencoded(&body)?;
        let ml_ids: Vec<EntityId> = form.try_into()?;
        emails::add_campaign_lists(repo.get_ref(), &user, id, &ml_ids)
    })();
    match result {
        Ok(added) => {
            FlashMessage::success(format!("{added} mailing lists added.")).send();
            redirect(&back)
        }
        Err(err) => flash_error(err, "add the mailing lists", &back),
    }
}

#[post("/campaign/{id}/mailing_lists/{ml_id}/delete")]
pub async fn remove_campaign_list(
    path: web::Path<(i32, i32)>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let (id, ml_id) = path.into_inner();
    let (Ok(id), Ok(ml_id)) = (EntityId::new(id), EntityId::new(ml_id)) else {
        return HttpResponse::NotFound().finish();
    };
    let back = format!("/entity/{id}");
    match emails::remove_campaign_list(repo.get_ref(), &user, id, ml_id) {
        Ok(()) => {
            FlashMessage::success("Mailing list removed from the campaign.").send();
            redirect(&back)
        }
        Err(err) => flash_error(err, "remove the mailing list", &back),
    }
}

#[post("/campaign/{id}/sendings")]
pub async fn create_sending(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = EntityId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    let back = format!("/entity/{id}");
    let now = chrono::Utc::now().naive_utc();
    let result = (|| -> ServiceResult<_> {
        let form: SendingForm = parse_urlencoded(&body)?;
        let payload = SendingPayload::try_from(form)?;
        emails::create_sending(repo.get_ref(), &user, id, payload, now)
    })();
    match result {
        Ok(created) => {
            FlashMessage::success(format!(
                "Sending planned for {}.",
                created.sending_date.format("%Y-%m-%d %H:%M")
            ))
            .send();
            redirect(&format!("/sendings/{}", created.id))
        }
        Err(err) => flash_error(err, "create the sending", &back),
    }
}

#[get("/sendings/{id}")]
pub async fn sending(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = SendingId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    match emails::sending_detail(repo.get_ref(), id) {
        Ok(data) => {
            let mut context =
                base_context(&flash_messages, &user, "emails", &server_config.auth_service_url);
            context.insert("sending", &data);
            render_template(&tera, "emails/sending.html", &context)
        }
        Err(err) => page_error(err, "the sending"),
    }
}

#[post("/sendings/{id}/delete")]
pub async fn delete_sending(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = SendingId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    let campaign_id = match emails::sending_detail(repo.get_ref(), id) {
        Ok(data) => data.campaign.id,
        Err(err) => return flash_error(err, "delete the sending", "/"),
    };
    let back = format!("/entity/{campaign_id}");
    match emails::delete_sending(repo.get_ref(), &user, id) {
        Ok(()) => {
            FlashMessage::success("Sending deleted.").send();
            redirect(&back)
        }
        Err(err) => flash_error(err, "delete the sending", &back),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_segments_map_to_kinds() {
        assert_eq!(member_kind("contacts"), Some(ListMemberKind::Contact));
        assert_eq!(member_kind("children"), Some(ListMemberKind::ChildList));
        assert_eq!(member_kind("recipients"), None);
    }
}
