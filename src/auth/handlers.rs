use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::{HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        cookies::{read_cookie, REFRESH_COOKIE, SESSION_COOKIES},
        dto::{AuthResponse, LoginRequest, RefreshRequest, RegisterInput},
        extractors::AuthUser,
        repo_types::PublicUser,
    },
    error::AppError,
    media::UploadItem,
    response::ApiResponse,
    state::AppState,
};

pub fn user_routes(upload_limit: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/users/register",
            post(register).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/users/login", post(login))
        .route("/users/logout", post(logout))
        .route("/users/refresh-token", post(refresh_token))
        .route("/users/me", get(current_user))
}

#[instrument(skip(state, multipart))]
pub async fn register(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<PublicUser>, AppError> {
    let multipart = multipart.map_err(|e| AppError::Validation(e.body_text()))?;
    let input = read_register_form(multipart).await?;
    let user = state.issuer.register(input).await?;
    Ok(ApiResponse::new(
        StatusCode::CREATED,
        user,
        "user registered successfully",
    ))
}

/// Collects the text fields and the first non-empty `avatar` / `coverImage` file.
async fn read_register_form(mut multipart: Multipart) -> Result<RegisterInput, AppError> {
    let bad_form = |e: axum::extract::multipart::MultipartError| {
        AppError::Validation(format!("invalid multipart body: {e}"))
    };

    let mut input = RegisterInput::default();
    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "avatar" | "coverImage" => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let file_name = field.file_name().map(str::to_string);
                let body = field.bytes().await.map_err(bad_form)?;
                if body.is_empty() {
                    continue;
                }
                let slot = if name == "avatar" {
                    &mut input.avatar
                } else {
                    &mut input.cover_image
                };
                if slot.is_none() {
                    *slot = Some(UploadItem {
                        body,
                        content_type,
                        file_name,
                    });
                }
            }
            "username" | "email" | "fullName" | "password" => {
                let value = field.text().await.map_err(bad_form)?;
                let slot = match name.as_str() {
                    "username" => &mut input.username,
                    "email" => &mut input.email,
                    "fullName" => &mut input.full_name,
                    _ => &mut input.password,
                };
                *slot = Some(value);
            }
            _ => {}
        }
    }
    Ok(input)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let out = state.issuer.login(payload).await?;
    let cookies = SESSION_COOKIES.session(&out.tokens, &state.signer);
    Ok((
        AppendHeaders(cookies),
        ApiResponse::new(
            StatusCode::OK,
            AuthResponse::from(out),
            "user logged in successfully",
        ),
    ))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    state.issuer.logout(user.id).await?;
    Ok((
        AppendHeaders(SESSION_COOKIES.cleared()),
        ApiResponse::new(StatusCode::OK, serde_json::json!({}), "user logged out"),
    ))
}

/// Accepts the refresh token from the `refreshToken` cookie, falling back
/// to a JSON body `{"refreshToken": "..."}`.
#[instrument(skip(state, headers, body))]
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let presented = read_cookie(&headers, REFRESH_COOKIE).or_else(|| {
        serde_json::from_slice::<RefreshRequest>(&body)
            .ok()
            .and_then(|req| req.refresh_token)
    });

    let out = state.issuer.refresh(presented.as_deref()).await?;
    let cookies = SESSION_COOKIES.session(&out.tokens, &state.signer);
    Ok((
        AppendHeaders(cookies),
        ApiResponse::new(StatusCode::OK, AuthResponse::from(out), "access token refreshed"),
    ))
}

#[instrument(skip(user), fields(user_id = %user.id))]
pub async fn current_user(AuthUser(user): AuthUser) -> ApiResponse<PublicUser> {
    ApiResponse::new(StatusCode::OK, user, "current user fetched successfully")
}
