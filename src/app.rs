use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::jwt::JwtConfig;
use crate::models::resource::{GroupKind, MissionKind};
use crate::routes::{activity, groups, health, missions, users};
use crate::services::{GroupsService, MissionsService, UserDirectory};
use crate::store::SqliteResourceStore;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub missions: MissionsService,
    pub groups: GroupsService,
    pub users: UserDirectory,
    pub event_bus: EventBus,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, event_bus: EventBus) -> Self {
        let users = UserDirectory::new(pool.clone());
        let identities = Arc::new(users.clone());

        Self {
            missions: MissionsService::new(
                Arc::new(SqliteResourceStore::<MissionKind>::new(pool.clone())),
                identities.clone(),
            ),
            groups: GroupsService::new(Arc::new(SqliteResourceStore::<GroupKind>::new(pool.clone())), identities),
            users,
            pool,
            jwt: Arc::new(jwt),
            event_bus,
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;

    let (event_bus, rx) = init_event_bus();
    tokio::spawn(start_activity_listener(rx, pool.clone()));

    let state = AppState::new(pool, jwt_config, event_bus);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let mission_routes = Router::new()
        .route("/", get(missions::list_missions).post(missions::create_mission))
        .route("/names", get(missions::list_mission_names))
        .route("/mine", get(missions::list_my_missions))
        .route("/batch", post(missions::get_missions_by_ids))
        .route("/:id", get(missions::get_mission).put(missions::update_mission))
        .route("/:id/export", put(missions::set_export))
        .route("/:id/access", get(missions::my_access))
        .route("/:id/access/:user_id", get(missions::user_access))
        .route(
            "/:id/join-requests",
            post(missions::request_join).delete(missions::cancel_join_request),
        )
        .route(
            "/:id/join-requests/:user_id",
            post(missions::accept_join_request).delete(missions::reject_join_request),
        )
        .route("/:id/members", post(missions::add_member))
        .route(
            "/:id/members/:user_id",
            put(missions::change_member_permission).delete(missions::remove_member),
        );

    let group_routes = Router::new()
        .route("/", get(groups::list_groups).post(groups::create_group))
        .route("/names", get(groups::list_group_names))
        .route("/mine", get(groups::list_my_groups))
        .route("/batch", post(groups::get_groups_by_ids))
        .route("/:id", get(groups::get_group).put(groups::update_group))
        .route("/:id/access", get(groups::my_access))
        .route("/:id/access/:user_id", get(groups::user_access))
        .route(
            "/:id/join-requests",
            post(groups::request_join).delete(groups::cancel_join_request),
        )
        .route(
            "/:id/join-requests/:user_id",
            post(groups::accept_join_request).delete(groups::reject_join_request),
        )
        .route("/:id/members", post(groups::add_member))
        .route(
            "/:id/members/:user_id",
            put(groups::change_member_role).delete(groups::remove_member),
        );

    let user_routes = Router::new()
        .route("/", get(users::list_users))
        .route("/me", post(users::register_me))
        .route("/search", get(users::search_users))
        .route("/:id", get(users::get_user));

    let router = Router::new()
        .route("/api/health", get(health::health))
        .route("/activity", get(activity::list_activity))
        .nest("/missions", mission_routes)
        .nest("/groups", group_routes)
        .nest("/users", user_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
