// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::Method,
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, card_sets, cards, directories, files, modules, search, users},
    models::document::MAX_DOCUMENT_BYTES,
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, users, modules, card sets, cards,
///   directories, files, search).
/// * Applies global middleware (Trace, CORS, body limit).
/// * Injects global state (Database Pool + Config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let user_routes = Router::new()
        .route("/", get(users::list_users))
        .route("/last-quizzed", get(users::last_quizzed))
        .route("/last-quizzed/{card_set_id}", put(users::mark_quizzed))
        .route("/change-password", post(users::change_password))
        .route(
            "/{user_id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/{user_id}/modules", get(users::modules_of_user));

    let module_routes = Router::new()
        .route("/", get(modules::list_modules).post(modules::create_module))
        .route(
            "/{module_id}",
            get(modules::get_module)
                .put(modules::update_module)
                .delete(modules::delete_module),
        )
        .route("/{module_id}/card-sets", get(modules::card_sets_of_module));

    let card_set_routes = Router::new()
        .route(
            "/",
            get(card_sets::list_card_sets).post(card_sets::create_card_set),
        )
        .route(
            "/{card_set_id}",
            get(card_sets::get_card_set)
                .put(card_sets::update_card_set)
                .delete(card_sets::delete_card_set),
        )
        .route("/{card_set_id}/cards", get(card_sets::cards_of_card_set))
        .route(
            "/{card_set_id}/copy/{module_id}",
            post(card_sets::copy_card_set),
        );

    let card_routes = Router::new().route("/", post(cards::create_card)).route(
        "/{card_id}",
        get(cards::get_card)
            .put(cards::update_card)
            .delete(cards::delete_card),
    );

    let directory_routes = Router::new()
        .route(
            "/",
            get(directories::list_directories).post(directories::create_directory),
        )
        .route(
            "/{directory_id}",
            get(directories::get_directory)
                .put(directories::update_directory)
                .delete(directories::delete_directory),
        )
        .route(
            "/{directory_id}/directory-content",
            get(directories::directory_content),
        );

    let file_routes = Router::new()
        .route("/", get(files::list_files).post(files::create_file))
        .route(
            "/{file_id}",
            put(files::update_file).delete(files::delete_file),
        )
        .route("/documents/{document_id}", get(files::get_document));

    let search_routes = Router::new().route("/", get(search::search_items));

    // Everything except register/login requires a bearer token.
    let protected = Router::new()
        .nest("/api/users", user_routes)
        .nest("/api/modules", module_routes)
        .nest("/api/card-sets", card_set_routes)
        .nest("/api/cards", card_routes)
        .nest("/api/directories", directory_routes)
        .nest("/api/files", file_routes)
        .nest("/api/search", search_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .merge(protected)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Uploads carry up to a 10MB document plus the metadata part.
        .layer(DefaultBodyLimit::max(MAX_DOCUMENT_BYTES + 1024 * 1024))
        .with_state(state)
}
