use actix_web::http::{StatusCode, header};
use actix_web::{App, HttpResponse, Responder, test, web};

use creme_crm::domain::auth::AuthenticatedUser;
use creme_crm::middleware::{RedirectUnauthorized, SIGNIN_PATH};

mod common;

async fn whoami(user: AuthenticatedUser) -> impl Responder {
    HttpResponse::Ok().body(user.email)
}

#[actix_web::test]
async fn anonymous_visitors_are_sent_to_signin() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(common::server_config(&[])))
            .wrap(RedirectUnauthorized)
            .route("/", web::get().to(whoami)),
    )
    .await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        resp.headers().get(header::LOCATION).map(|value| value.as_bytes()),
        Some(SIGNIN_PATH.as_bytes())
    );
}

#[actix_web::test]
async fn other_statuses_pass_through() {
    let app = test::init_service(
        App::new()
            .wrap(RedirectUnauthorized)
            .route("/gone", web::get().to(|| async { HttpResponse::NotFound().finish() }))
            .route("/ok", web::get().to(|| async { HttpResponse::Ok().finish() })),
    )
    .await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/gone").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = test::call_service(&app, test::TestRequest::get().uri("/ok").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
