//! HTTP handlers and the helpers they share.

use actix_identity::Identity;
use actix_web::dev::HttpServiceFactory;
use actix_web::http::header;
use actix_web::{HttpResponse, Responder, get, post, web};
use actix_web_flash_messages::{FlashMessage, IncomingFlashMessages, Level};
use serde::Serialize;
use tera::{Context, Tera};

use crate::domain::auth::AuthenticatedUser;
use crate::domain::entity::EntityKind;
use crate::domain::user::User;
use crate::models::config::ServerConfig;
use crate::repository::DieselRepository;
use crate::services::ServiceError;
use crate::services::users::current_user;

pub mod activities;
pub mod billing;
pub mod config;
pub mod emails;
pub mod entities;
pub mod events;
pub mod persons;
pub mod recurrents;

/// Bootstrap class of a flash message level.
pub fn alert_level_to_str(level: &Level) -> &'static str {
    match level {
        Level::Error => "danger",
        Level::Warning => "warning",
        Level::Success => "success",
        _ => "info",
    }
}

/// Context every page template expects.
pub fn base_context(
    flash_messages: &IncomingFlashMessages,
    user: &impl Serialize,
    current_page: &str,
    home_url: &str,
) -> Context {
    let alerts = flash_messages
        .iter()
        .map(|f| (f.content(), alert_level_to_str(&f.level())))
        .collect::<Vec<_>>();
    let mut context = Context::new();
    context.insert("alerts", &alerts);
    context.insert("current_user", user);
    context.insert("current_page", current_page);
    context.insert("home_url", home_url);
    context
}

pub fn render_template(tera: &Tera, template: &str, context: &Context) -> HttpResponse {
    match tera.render(template, context) {
        Ok(body) => HttpResponse::Ok().content_type("text/html").body(body),
        Err(err) => {
            log::error!("Failed to render template '{template}': {err}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .finish()
}

/// The CRM user behind the request, or the response sending them away.
pub fn resolve_user(repo: &DieselRepository, auth: &AuthenticatedUser) -> Result<User, HttpResponse> {
    match current_user(repo, auth) {
        Ok(user) => Ok(user),
        Err(ServiceError::Unauthorized) => Err(redirect("/na")),
        Err(err) => {
            log::error!("Failed to load the user {}: {err}", auth.email);
            Err(HttpResponse::InternalServerError().finish())
        }
    }
}

/// Resolves the user or returns the response sending them away.
macro_rules! user_or_return {
    ($repo:expr, $auth:expr) => {
        match $crate::routes::resolve_user($repo, $auth) {
            Ok(user) => user,
            Err(response) => return response,
        }
    };
}
pub(crate) use user_or_return;

/// Maps a failed action to a flash message and a redirect.
pub fn flash_error(err: ServiceError, action: &str, back: &str) -> HttpResponse {
    match err {
        ServiceError::Unauthorized => {
            FlashMessage::error("You are not allowed to do this.").send();
        }
        ServiceError::NotFound => {
            FlashMessage::error("This item does not exist.").send();
        }
        ServiceError::Form(message)
        | ServiceError::Conflict(message)
        | ServiceError::TypeConstraint(message) => {
            FlashMessage::error(message).send();
        }
        err => {
            log::error!("Failed to {action}: {err}");
            FlashMessage::error(format!("Failed to {action}.")).send();
        }
    }
    redirect(back)
}

/// Maps a failed page load to a response.
pub fn page_error(err: ServiceError, page: &str) -> HttpResponse {
    match err {
        ServiceError::Unauthorized => {
            FlashMessage::error("You are not allowed to see this page.").send();
            redirect("/")
        }
        ServiceError::NotFound => HttpResponse::NotFound().finish(),
        ServiceError::Conflict(message) | ServiceError::Form(message) => {
            FlashMessage::error(message).send();
            redirect("/")
        }
        err => {
            log::error!("Failed to load {page}: {err}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Maps a failed JSON call to a status code.
pub fn json_error(err: ServiceError) -> HttpResponse {
    match err {
        ServiceError::Unauthorized => HttpResponse::Forbidden().finish(),
        ServiceError::NotFound => HttpResponse::NotFound().finish(),
        ServiceError::Form(message)
        | ServiceError::Conflict(message)
        | ServiceError::TypeConstraint(message) => HttpResponse::BadRequest().json(message),
        err => {
            log::error!("JSON call failed: {err}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Kind from the slug of an URL, e.g. `contact`.
pub fn parse_kind(slug: &str) -> Result<EntityKind, HttpResponse> {
    EntityKind::from_slug(slug).ok_or_else(|| HttpResponse::NotFound().finish())
}

/// Registers default routes unless the deployment swapped them for its own.
pub struct Swappable<'a> {
    swapped_routes: &'a [String],
}

impl<'a> Swappable<'a> {
    pub fn new(config: &'a ServerConfig) -> Self {
        Self {
            swapped_routes: &config.swapped_routes,
        }
    }

    pub fn is_swapped(&self, name: &str) -> bool {
        self.swapped_routes.iter().any(|swapped| swapped == name)
    }

    pub fn register<F>(&self, cfg: &mut web::ServiceConfig, name: &str, factory: F)
    where
        F: HttpServiceFactory + 'static,
    {
        if self.is_swapped(name) {
            log::info!("Default route '{name}' swapped out");
        } else {
            cfg.service(factory);
        }
    }
}

/// Every default route of the application.
pub fn configure(swappable: &Swappable<'_>, cfg: &mut web::ServiceConfig) {
    cfg.service(index).service(logout);
    entities::configure(swappable, cfg);
    persons::configure(swappable, cfg);
    activities::configure(swappable, cfg);
    billing::configure(swappable, cfg);
    emails::configure(swappable, cfg);
    events::configure(swappable, cfg);
    recurrents::configure(swappable, cfg);
    config::configure(swappable, cfg);
}

#[get("/")]
pub async fn index(
    auth: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let user = user_or_return!(repo.get_ref(), &auth);
    let kinds: Vec<(&str, &str)> = EntityKind::ALL
        .into_iter()
        .filter(|kind| *kind != EntityKind::TemplateBase)
        .map(|kind| (kind.slug(), kind.verbose_name()))
        .collect();
    let mut context = base_context(&flash_messages, &user, "index", &server_config.auth_service_url);
    context.insert("kinds", &kinds);
    render_template(&tera, "main/index.html", &context)
}

#[post("/logout")]
pub async fn logout(user: Identity) -> impl Responder {
    user.logout();
    redirect("/")
}

#[get("/na")]
pub async fn not_assigned(
    auth: AuthenticatedUser,
    flash_messages: IncomingFlashMessages,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let context = base_context(&flash_messages, &auth, "index", &server_config.auth_service_url);
    render_template(&tera, "main/not_assigned.html", &context)
}
