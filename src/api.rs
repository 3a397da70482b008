use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::models::{Book, BookChanges, BookInput, ValidationErrors};
use crate::repo::{BookRepo, RepoError};

#[derive(Clone)]
struct AppState<R> {
    repo: R,
}

/// Which optional routes to mount
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiOptions {
    pub expose_delete: bool,
}

pub fn build_app<R>(repo: R, options: ApiOptions) -> Router
where
    R: BookRepo + Send + Sync + Clone + 'static,
{
    let mut book_routes = get(get_book::<R>).put(update_book::<R>);
    if options.expose_delete {
        book_routes = book_routes.delete(delete_book::<R>);
    }

    Router::new()
        .route("/books", get(list_books::<R>).post(insert_book::<R>))
        .route("/books/{id}", book_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { repo })
}

/// Everything a handler can fail with, and the response each one maps to
#[derive(Debug)]
pub enum ApiError {
    InvalidId(String),
    MalformedBody(String),
    Validation(ValidationErrors),
    NotFound(i32),
    Internal(String),
}

impl<E: std::error::Error> From<RepoError<E>> for ApiError {
    fn from(err: RepoError<E>) -> Self {
        match err {
            RepoError::NotFound(id) => ApiError::NotFound(id),
            RepoError::Store(e) => {
                error!("Store failure: {}", e);
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::InvalidId(id) => {
                (StatusCode::BAD_REQUEST, format!("Invalid book ID: {}", id)).into_response()
            }
            ApiError::MalformedBody(reason) => {
                (StatusCode::BAD_REQUEST, reason).into_response()
            }
            ApiError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, Json(errors)).into_response()
            }
            ApiError::NotFound(id) => (
                StatusCode::NOT_FOUND,
                format!("No book found with ID: {}", id),
            )
                .into_response(),
            ApiError::Internal(reason) => {
                (StatusCode::INTERNAL_SERVER_ERROR, reason).into_response()
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    search: Option<String>,
}

async fn list_books<R: BookRepo>(
    State(state): State<AppState<R>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Book>>, ApiError> {
    let results = match params.search.as_deref() {
        Some(term) if !term.is_empty() => {
            let found = state.repo.search(term).await?;
            info!("Found {} books matching {:?}", found.len(), term);
            found
        }
        _ => {
            let all = state.repo.get_all().await?;
            info!("Retrieved {} books from the DB", all.len());
            all
        }
    };

    Ok(Json(results))
}

async fn get_book<R: BookRepo>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> Result<Json<Book>, ApiError> {
    let id = parse_book_id(id)?;

    match state.repo.get_by_id(id).await {
        Ok(book) => {
            info!("Retrieved book from DB: {:?}", book);
            Ok(Json(book))
        }
        Err(RepoError::NotFound(id)) => {
            info!("No book found in DB with ID: {}", id);
            Err(ApiError::NotFound(id))
        }
        Err(e) => Err(e.into()),
    }
}

async fn insert_book<R: BookRepo>(
    State(state): State<AppState<R>>,
    body: Result<Json<BookInput>, JsonRejection>,
) -> Result<Response, ApiError> {
    let (id, changes) = validated(body)?;

    let inserted_book = state.repo.add(changes.into_new_book(id)).await?;

    info!("Inserted book into the DB: {:?}", inserted_book);

    let location = format!("/books/{}", inserted_book.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(inserted_book),
    )
        .into_response())
}

async fn update_book<R: BookRepo>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    body: Result<Json<BookInput>, JsonRejection>,
) -> Result<Json<Book>, ApiError> {
    let id = parse_book_id(id)?;
    let (_, changes) = validated(body)?;

    let mut book = match state.repo.get_by_id(id).await {
        Ok(book) => book,
        Err(RepoError::NotFound(id)) => {
            info!("Tried to update non-existent book with ID: {}", id);
            return Err(ApiError::NotFound(id));
        }
        Err(e) => return Err(e.into()),
    };
    changes.apply_to(&mut book);

    let updated_book = state.repo.update(&book).await?;

    info!("Updated book in DB: {:?}", updated_book);

    Ok(Json(updated_book))
}

async fn delete_book<R: BookRepo>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_book_id(id)?;

    match state.repo.delete(id).await {
        Ok(()) => {
            info!("Deleted book from DB with ID: {}", id);
            Ok(StatusCode::NO_CONTENT)
        }
        Err(RepoError::NotFound(id)) => {
            info!("Tried to delete non-existent book with ID: {}", id);
            Err(ApiError::NotFound(id))
        }
        Err(e) => Err(e.into()),
    }
}

fn validated(
    body: Result<Json<BookInput>, JsonRejection>,
) -> Result<(Option<i32>, BookChanges), ApiError> {
    let Json(input) = body.map_err(|rejection| ApiError::MalformedBody(rejection.body_text()))?;

    input.validate().map_err(|errors| {
        info!("Rejected book payload: {}", errors);
        ApiError::Validation(errors)
    })
}

fn parse_book_id(id: String) -> Result<i32, ApiError> {
    id.parse::<i32>().map_err(|_| ApiError::InvalidId(id))
}
