use axum::{
    extract::State,
    http::{
        header::{InvalidHeaderValue, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AuthResponse, GoogleLoginRequest, LoginRequest, MessageResponse, PublicUser,
            SendOtpRequest, SignupRequest, VerifyOtpRequest,
        },
        extractors::{CurrentUser, SESSION_COOKIE_NAME},
        services,
    },
    config::JwtConfig,
    error::AuthError,
    extract::Json,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/user/login", post(login))
        .route("/user/signup", post(signup))
        .route("/user/verifyotp", post(verify_otp))
        .route("/user/confirmotp", post(confirm_otp))
        .route("/user/sendotp", post(send_otp))
        .route("/user/google-login", post(google_login))
        .route("/user/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/user/me", get(get_me))
}

/// `HttpOnly` session cookie mirroring the token lifetime.
fn session_cookie(cfg: &JwtConfig, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let max_age = cfg.ttl_minutes * 60;
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}"
    );
    if cfg.cookie_secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(cfg: &JwtConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if cfg.cookie_secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn with_session_cookie(
    state: &AppState,
    session: AuthResponse,
) -> Result<(HeaderMap, Json<AuthResponse>), AuthError> {
    let mut headers = HeaderMap::new();
    let cookie = session_cookie(&state.config.jwt, &session.token)
        .map_err(|e| AuthError::Internal(e.into()))?;
    headers.insert(SET_COOKIE, cookie);
    Ok((headers, Json(session)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>), AuthError> {
    let session = services::login(&state, &payload.email, &payload.password).await?;
    with_session_cookie(&state, session)
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AuthError> {
    let email = services::signup(&state, payload.name, payload.email, payload.password).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "OTP sent to your email. Verify to complete signup.".into(),
            email: Some(email),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>), AuthError> {
    let session = services::complete_signup(&state, payload.email, payload.otp).await?;
    with_session_cookie(&state, session)
}

#[instrument(skip(state, payload))]
pub async fn confirm_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    services::confirm_code(&state, payload.email, payload.otp).await?;
    Ok(Json(MessageResponse::new("OTP verified successfully")))
}

#[instrument(skip(state, payload))]
pub async fn send_otp(
    State(state): State<AppState>,
    Json(payload): Json<SendOtpRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    services::send_otp(&state, payload.email).await?;
    Ok(Json(MessageResponse::new("OTP sent successfully")))
}

#[instrument(skip(state, payload))]
pub async fn google_login(
    State(state): State<AppState>,
    Json(payload): Json<GoogleLoginRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>), AuthError> {
    let session = services::google_login(&state, &payload.token).await?;
    with_session_cookie(&state, session)
}

/// Sessions are stateless; logging out only clears the cookie.
#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(&state.config.jwt) {
        headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, headers)
}

#[instrument(skip_all)]
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(PublicUser::from(user))
}
