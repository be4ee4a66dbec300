use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Context, Result};

use crate::{
    api::{attendance, course, me, report, student},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};

type Limit = GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-IP rate limits, built once at startup.
#[derive(Clone)]
pub struct RateLimits {
    login: Limit,
    register: Limit,
    protected: Limit,
}

fn build_limit(requests_per_min: u32) -> Result<Limit> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        60_000 / requests_per_min as u64
    };

    GovernorConfigBuilder::default()
        .per_millisecond(per_ms.max(1))
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .context("Invalid rate limit settings")
}

impl RateLimits {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            login: build_limit(config.rate_login_per_min)?,
            register: build_limit(config.rate_register_per_min)?,
            protected: build_limit(config.rate_protected_per_min)?,
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limits: &RateLimits) {
    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(Governor::new(&limits.login))
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(Governor::new(&limits.register))
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(Governor::new(&limits.login))
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(Governor::new(&limits.login))
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(Governor::new(&limits.protected)) // rate limiting
            .service(
                web::scope("/me")
                    .service(
                        web::resource("/attendance")
                            .route(web::post().to(me::log_attendance))
                            .route(web::get().to(me::attendance_history)),
                    )
                    .service(web::resource("/dashboard").route(web::get().to(me::dashboard)))
                    .service(web::resource("/password").route(web::put().to(me::change_password))),
            )
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(
                        web::resource("")
                            .route(web::get().to(attendance::list_attendance))
                            .route(web::post().to(attendance::create_attendance))
                            .route(web::put().to(attendance::mark_attendance)),
                    )
                    // /attendance/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(attendance::get_attendance))
                            .route(web::put().to(attendance::update_attendance))
                            .route(web::delete().to(attendance::delete_attendance)),
                    ),
            )
            .service(
                web::scope("/courses")
                    .service(
                        web::resource("")
                            .route(web::get().to(course::list_courses))
                            .route(web::post().to(course::create_course)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(course::get_course))
                            .route(web::put().to(course::update_course))
                            .route(web::delete().to(course::delete_course)),
                    )
                    .service(
                        web::resource("/{id}/year-levels")
                            .route(web::get().to(course::course_year_levels)),
                    )
                    .service(
                        web::resource("/{id}/students").route(web::get().to(course::course_students)),
                    ),
            )
            .service(
                web::scope("/students")
                    .service(
                        web::resource("")
                            .route(web::get().to(student::list_students))
                            .route(web::post().to(student::create_student)),
                    )
                    // fixed segments before /{id}
                    .service(web::resource("/next-id").route(web::get().to(student::next_student_id)))
                    .service(
                        web::resource("/without-accounts")
                            .route(web::get().to(student::students_without_accounts)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(student::get_student))
                            .route(web::put().to(student::update_student))
                            .route(web::delete().to(student::delete_student)),
                    )
                    .service(
                        web::resource("/{student_id}/account")
                            .route(web::post().to(student::create_student_account)),
                    ),
            )
            .service(
                web::resource("/reports/attendance").route(web::get().to(report::attendance_report)),
            )
            .service(web::resource("/dashboard").route(web::get().to(report::admin_dashboard))),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (8 h)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns a new token pair, old refresh token revoked

#[cfg(test)]
mod tests {
    use std::{net::SocketAddr, sync::Arc};

    use actix_web::{App, http::StatusCode, test, web::Data};
    use serde_json::{Value, json};

    use super::*;
    use crate::{
        auth::{
            jwt::{generate_access_token, generate_refresh_token},
            session::SessionContext,
        },
        model::role::Role,
        models::RegisterReq,
        service::{AccountService, AttendanceService, CourseService, ReportService, StudentService},
        store::memory::MemoryStore,
    };

    macro_rules! app {
        ($store:expr, $config:expr) => {{
            let store: Arc<MemoryStore> = $store.clone();
            let config: Config = $config.clone();
            let limits = RateLimits::from_config(&config).unwrap();
            test::init_service(
                App::new()
                    .app_data(Data::new(config.clone()))
                    .app_data(Data::new(AttendanceService::new(store.clone())))
                    .app_data(Data::new(CourseService::new(store.clone(), store.clone())))
                    .app_data(Data::new(StudentService::new(
                        store.clone(),
                        store.clone(),
                        store.clone(),
                    )))
                    .app_data(Data::new(AccountService::new(
                        store.clone(),
                        store.clone(),
                        store.clone(),
                    )))
                    .app_data(Data::new(ReportService::new(
                        store.clone(),
                        store.clone(),
                        store.clone(),
                        store.clone(),
                    )))
                    .configure(|cfg| configure(cfg, &config, &limits)),
            )
            .await
        }};
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn session(role: Role, student_id: Option<&str>) -> SessionContext {
        SessionContext {
            user_id: 1,
            username: "someone".into(),
            role,
            student_id: student_id.map(Into::into),
        }
    }

    fn bearer(token: &str) -> (&'static str, String) {
        ("Authorization", format!("Bearer {token}"))
    }

    #[actix_web::test]
    async fn protected_routes_require_a_token() {
        let store = Arc::new(MemoryStore::new());
        let app = app!(store, Config::for_tests());

        let req = test::TestRequest::get()
            .uri("/api/courses")
            .peer_addr(peer())
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn refresh_token_is_not_an_access_token() {
        let config = Config::for_tests();
        let store = Arc::new(MemoryStore::new());
        let app = app!(store, config);

        let (token, _) =
            generate_refresh_token(&session(Role::Admin, None), &config.jwt_secret, 60).unwrap();
        let req = test::TestRequest::get()
            .uri("/api/courses")
            .peer_addr(peer())
            .insert_header(bearer(&token))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn admin_logs_in_and_manages_courses() {
        let config = Config::for_tests();
        let store = Arc::new(MemoryStore::new());
        AccountService::new(store.clone(), store.clone(), store.clone())
            .register(&RegisterReq {
                username: "admin".into(),
                password: "secret123".into(),
                role: "admin".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let app = app!(store, config);

        let req = test::TestRequest::post()
            .uri("/auth/login")
            .peer_addr(peer())
            .set_json(json!({ "username": "admin", "password": "secret123" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["role"], "admin");
        let access = body["access_token"].as_str().unwrap().to_string();

        let req = test::TestRequest::get()
            .uri("/api/courses")
            .peer_addr(peer())
            .insert_header(bearer(&access))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri("/api/me/dashboard")
            .peer_addr(peer())
            .insert_header(bearer(&access))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::FORBIDDEN
        );
    }

    #[actix_web::test]
    async fn wrong_password_is_unauthorized() {
        let store = Arc::new(MemoryStore::new());
        let app = app!(store, Config::for_tests());

        let req = test::TestRequest::post()
            .uri("/auth/login")
            .peer_addr(peer())
            .set_json(json!({ "username": "nobody", "password": "secret123" }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn students_see_their_dashboard_but_not_admin_routes() {
        let config = Config::for_tests();
        let store = Arc::new(MemoryStore::new());
        store.seed_student("2026-001", "Ana", "Cruz", "Computer Science", 1);
        let app = app!(store, config);

        let token = generate_access_token(
            &session(Role::Student, Some("2026-001")),
            &config.jwt_secret,
            60,
        )
        .unwrap();

        let req = test::TestRequest::get()
            .uri("/api/me/dashboard")
            .peer_addr(peer())
            .insert_header(bearer(&token))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["student"]["student_id"], "2026-001");
        assert_eq!(body["summary"]["total"], 0);

        let req = test::TestRequest::get()
            .uri("/api/students")
            .peer_addr(peer())
            .insert_header(bearer(&token))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::FORBIDDEN
        );
    }

    #[actix_web::test]
    async fn admin_marking_attendance_twice_updates_the_record() {
        let config = Config::for_tests();
        let store = Arc::new(MemoryStore::new());
        store.seed_student("2024-001", "Ana", "Cruz", "Computer Science", 1);
        let app = app!(store, config);

        let token =
            generate_access_token(&session(Role::Admin, None), &config.jwt_secret, 60).unwrap();

        let mut outcomes = Vec::new();
        for status in ["Present", "Late"] {
            let req = test::TestRequest::put()
                .uri("/api/attendance")
                .peer_addr(peer())
                .insert_header(bearer(&token))
                .set_json(json!({
                    "student_id": "2024-001",
                    "date": "2024-01-05",
                    "status": status
                }))
                .to_request();
            let body: Value = test::call_and_read_body_json(&app, req).await;
            outcomes.push(body["outcome"].clone());
        }

        assert_eq!(outcomes, [json!("created"), json!("updated")]);
    }
}
