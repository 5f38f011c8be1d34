//! Activity forms, participants and the calendar.

use actix_web::{HttpResponse, Responder, get, post, web};
use actix_web_flash_messages::{FlashMessage, IncomingFlashMessages};
use tera::Tera;

use crate::domain::auth::AuthenticatedUser;
use crate::domain::types::{CalendarId, EntityId};
use crate::domain::user::User;
use crate::forms::activities::{
    ActivityCalendarsForm, ActivityDatesForm, ActivityDatesPayload, ActivityForm,
    CalendarFeedPayload, CalendarFeedQuery, CalendarForm, ParticipantsForm,
};
use crate::forms::{parse_ids, parse_urlencoded};
use crate::models::config::ServerConfig;
use crate::repository::DieselRepository;
use crate::routes::{
    Swappable, base_context, flash_error, json_error, page_error, redirect, render_template,
    user_or_return,
};
use crate::services::{ServiceError, ServiceResult, activities, entities};

pub fn configure(swappable: &Swappable<'_>, cfg: &mut web::ServiceConfig) {
    swappable.register(cfg, "activities__create_form", create_form);
    swappable.register(cfg, "activities__create", create);
    swappable.register(cfg, "activities__edit_form", edit_form);
    swappable.register(cfg, "activities__edit", edit);
    swappable.register(cfg, "activities__add_participants", add_participants);
    swappable.register(cfg, "activities__remove_participant", remove_participant);
    swappable.register(cfg, "activities__set_calendars", set_calendars);
    swappable.register(cfg, "activities__calendar", calendar);
    swappable.register(cfg, "activities__calendar_feed", calendar_feed);
    swappable.register(cfg, "activities__move", move_activity);
    swappable.register(cfg, "activities__add_calendar", add_calendar);
    swappable.register(cfg, "activities__delete_calendar", delete_calendar);
}

fn render_form(
    repo: &DieselRepository,
    user: &User,
    entity_id: Option<EntityId>,
    flash_messages: &IncomingFlashMessages,
    server_config: &ServerConfig,
    tera: &Tera,
) -> HttpResponse {
    let mut context = base_context(flash_messages, user, "activity", &server_config.auth_service_url);
    let result = (|| -> ServiceResult<()> {
        context.insert("activity_types", &activities::list_activity_types(repo)?);
        context.insert("calendars", &activities::calendar_page(repo, user)?);
        if let Some(id) = entity_id {
            let entity = entities::get_entity(repo, id)?;
            entities::ensure_live(&entity.base)?;
            context.insert("participants", &activities::list_participants(repo, id)?);
            context.insert("entity", &entity);
        }
        Ok(())
    })();
    match result {
        Ok(()) => render_template(tera, "activities/form.html", &context),
        Err(err) => page_error(err, "the activity form"),
    }
}

#[get("/activities/add")]
pub async fn create_form(
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    render_form(repo.get_ref(), &user, None, &flash_messages, &server_config, &tera)
}

#[post("/activities/add")]
pub async fn create(
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let result = (|| -> ServiceResult<_> {
        let form: ActivityForm = parse_urlencoded(&body)?;
        activities::create_activity(repo.get_ref(), &user, form.try_into()?)
    })();
    match result {
        Ok(activity) => {
            FlashMessage::success("Activity created.").send();
            redirect(&format!("/entity/{}", activity.id()))
        }
        Err(err) => flash_error(err, "create the activity", "/activities/add"),
    }
}

#[get("/activities/{id}/edit")]
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
    render_form(repo.get_ref(), &user, Some(id), &flash_messages, &server_config, &tera)
}

#[post("/activities/{id}/edit")]
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
        let form: ActivityForm = parse_urlencoded(&body)?;
        activities::update_activity(repo.get_ref(), &user, id, form.try_into()?)
    })();
    match result {
        Ok(_) => {
            FlashMessage::success("Activity saved.").send();
            redirect(&format!("/entity/{id}"))
        }
        Err(err) => flash_error(err, "save the activity", &format!("/activities/{id}/edit")),
    }
}

#[post("/activities/{id}/participants")]
pub async fn add_participants(
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
        let form: ParticipantsForm = parse_urlencoded(&body)?;
        let contact_ids: Vec<EntityId> = form.try_into()?;
        activities::add_participants(repo.get_ref(), &user, id, &contact_ids)
    })();
    match result {
        Ok(added) => {
            FlashMessage::success(format!("{added} participants added.")).send();
            redirect(&format!("/entity/{id}"))
        }
        Err(err) => flash_error(err, "add the participants", &format!("/entity/{id}")),
    }
}

#[post("/activities/{id}/participants/{contact_id}/delete")]
pub async fn remove_participant(
    path: web::Path<(i32, i32)>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let (id, contact_id) = path.into_inner();
    let (Ok(id), Ok(contact_id)) = (EntityId::new(id), EntityId::new(contact_id)) else {
        return HttpResponse::NotFound().finish();
    };
    match activities::remove_participant(repo.get_ref(), &user, id, contact_id) {
        Ok(()) => {
            FlashMessage::success("Participant removed.").send();
            redirect(&format!("/entity/{id}"))
        }
        Err(err) => flash_error(err, "remove the participant", &format!("/entity/{id}")),
    }
}

#[post("/activities/{id}/calendars")]
pub async fn set_calendars(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    body: web::Bytes,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = EntityId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    let result = (|| -> ServiceResult<()> {
        let form: ActivityCalendarsForm = parse_urlencoded(&body)?;
        let calendar_ids: Vec<CalendarId> = parse_ids(&form.calendar_ids)?;
        activities::set_calendars(repo.get_ref(), &user, id, &calendar_ids)
    })();
    match result {
        Ok(()) => {
            FlashMessage::success("Calendars updated.").send();
            redirect(&format!("/entity/{id}"))
        }
        Err(err) => flash_error(err, "change the calendars", &format!("/entity/{id}")),
    }
}

#[get("/calendar")]
pub async fn calendar(
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    match activities::calendar_page(repo.get_ref(), &user) {
        Ok(data) => {
            let mut context =
                base_context(&flash_messages, &user, "calendar", &server_config.auth_service_url);
            context.insert("calendars", &data);
            render_template(&tera, "activities/calendar.html", &context)
        }
        Err(err) => page_error(err, "the calendar"),
    }
}

#[get("/calendar/feed")]
pub async fn calendar_feed(
    query: web::Query<CalendarFeedQuery>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let result = CalendarFeedPayload::try_from(query.into_inner())
        .map_err(ServiceError::from)
        .and_then(|payload| activities::calendar_feed(repo.get_ref(), &user, payload));
    match result {
        Ok(events) => HttpResponse::Ok().json(events),
        Err(err) => json_error(err),
    }
}

#[post("/calendar/activity/dates")]
pub async fn move_activity(
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    web::Form(form): web::Form<ActivityDatesForm>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let result = ActivityDatesPayload::try_from(form)
        .map_err(ServiceError::from)
        .and_then(|payload| activities::move_activity(repo.get_ref(), &user, payload));
    match result {
        Ok(activity) => HttpResponse::Ok().json(activity.data),
        Err(err) => json_error(err),
    }
}

#[post("/calendar/add")]
pub async fn add_calendar(
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    web::Form(form): web::Form<CalendarForm>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    match activities::create_calendar(repo.get_ref(), &user, form) {
        Ok(created) => {
            FlashMessage::success(format!("Calendar \"{}\" created.", created.name)).send();
            redirect("/calendar")
        }
        Err(err) => flash_error(err, "create the calendar", "/calendar"),
    }
}

#[post("/calendar/{id}/delete")]
pub async fn delete_calendar(
    id: web::Path<i32>,
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let Ok(id) = CalendarId::new(id.into_inner()) else {
        return HttpResponse::NotFound().finish();
    };
    match activities::delete_calendar(repo.get_ref(), &user, id) {
        Ok(()) => {
            FlashMessage::success("Calendar deleted.").send();
            redirect("/calendar")
        }
        Err(err) => flash_error(err, "delete the calendar", "/calendar"),
    }
}
