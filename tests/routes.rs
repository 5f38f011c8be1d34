use actix_web::http::StatusCode;
use actix_web::{App, HttpResponse, Responder, get, test, web};
use actix_web_flash_messages::Level;

use creme_crm::routes::{Swappable, alert_level_to_str};

mod common;

#[get("/contacts/export")]
async fn export() -> impl Responder {
    HttpResponse::Ok().body("default")
}

#[::core::prelude::v1::test]
fn flash_levels_map_to_bootstrap_alerts() {
    assert_eq!(alert_level_to_str(&Level::Error), "danger");
    assert_eq!(alert_level_to_str(&Level::Warning), "warning");
    assert_eq!(alert_level_to_str(&Level::Success), "success");
    assert_eq!(alert_level_to_str(&Level::Info), "info");
}

#[actix_web::test]
async fn swapped_routes_are_left_to_the_deployment() {
    let config = common::server_config(&["entities__export"]);
    let app = test::init_service(App::new().configure(|cfg| {
        Swappable::new(&config).register(cfg, "entities__export", export);
        cfg.route(
            "/contacts/export",
            web::get().to(|| async { HttpResponse::Ok().body("custom") }),
        );
    }))
    .await;

    let req = test::TestRequest::get().uri("/contacts/export").to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body, "custom");
}

#[actix_web::test]
async fn default_routes_are_registered() {
    let config = common::server_config(&[]);
    let app = test::init_service(App::new().configure(|cfg| {
        Swappable::new(&config).register(cfg, "entities__export", export);
    }))
    .await;

    let req = test::TestRequest::get().uri("/contacts/export").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
