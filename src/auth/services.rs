//! Signup, login and verification flows.
//!
//! Each flow is a short sequence of store, hasher, issuer and verifier calls. Errors
//! from infrastructure are mapped into `AuthError` here and nowhere else.
use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::{
    auth::{
        dto::{AuthResponse, PublicUser},
        google::VerifyError,
        jwt::JwtKeys,
        otp::OtpOutcome,
        repo_types::{normalize_email, AuthType, NewUser, Role, User},
    },
    error::AuthError,
    mailer::EmailMessage,
    state::AppState,
};

pub const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn required(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn required_email(value: Option<String>, message: &str) -> Result<String, AuthError> {
    let email = required(value)
        .map(|e| normalize_email(&e))
        .ok_or_else(|| AuthError::validation(message))?;
    if !is_valid_email(&email) {
        return Err(AuthError::validation("Invalid email format"));
    }
    Ok(email)
}

fn issue_session(state: &AppState, user: User) -> Result<AuthResponse, AuthError> {
    let token = JwtKeys::from_ref(state).sign(user.id)?;
    Ok(AuthResponse {
        token,
        user: PublicUser::from(user),
    })
}

async fn dispatch_code(state: &AppState, email: &str, code: &str) -> Result<(), AuthError> {
    let message = EmailMessage::otp(email, code, state.otp.ttl_minutes());
    state.mailer.send(&message).await.map_err(|e| {
        warn!(error = %e, %email, "otp dispatch failed");
        AuthError::Dispatch(e)
    })
}

/// Validate the code on record for `email`, returning the user and the accepted code.
///
/// This is a read; the caller consumes the code with a conditional write that
/// re-checks it, so a concurrent verify or reissue makes that write miss.
async fn check_code(
    state: &AppState,
    email: Option<String>,
    otp: Option<String>,
    now: OffsetDateTime,
) -> Result<(User, String), AuthError> {
    let (Some(email), Some(otp)) = (required(email), required(otp)) else {
        return Err(AuthError::validation("Email and OTP are required"));
    };
    let email = normalize_email(&email);
    let user = state
        .store
        .find_by_email(&email)
        .await?
        .ok_or(AuthError::UnknownAccount)?;

    match state.otp.validate(&user, &otp, now) {
        OtpOutcome::Valid => Ok((user, otp)),
        OtpOutcome::NotFound => Err(AuthError::CodeNotIssued),
        OtpOutcome::Mismatch => {
            warn!(user_id = %user.id, "otp mismatch");
            Err(AuthError::CodeMismatch)
        }
        OtpOutcome::Expired => {
            warn!(user_id = %user.id, "otp expired");
            Err(AuthError::CodeExpired)
        }
    }
}

pub async fn login(state: &AppState, email: &str, password: &str) -> Result<AuthResponse, AuthError> {
    let email = normalize_email(email);
    let user = state
        .store
        .find_by_email(&email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    let Some(hash) = user.password_hash.as_deref() else {
        warn!(user_id = %user.id, "login against account without password");
        return Err(AuthError::InvalidCredentials);
    };
    if !state.hasher.verify(password, hash) {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }
    if !user.is_active {
        warn!(user_id = %user.id, "login on deactivated account");
        return Err(AuthError::AccountDeactivated);
    }

    info!(user_id = %user.id, "user logged in");
    issue_session(state, user)
}

/// First phase of signup: persist an inactive account and mail it a code.
/// Returns the normalized email. No session is issued until `complete_signup`.
///
/// If dispatch fails the pending record stays; `send_otp` is the recovery path.
pub async fn signup(
    state: &AppState,
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
) -> Result<String, AuthError> {
    let (Some(name), Some(email), Some(password)) = (required(name), required(email), password)
    else {
        return Err(AuthError::validation("Name, email and password are required"));
    };
    let email = normalize_email(&email);
    if !is_valid_email(&email) {
        return Err(AuthError::validation("Invalid email format"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::validation(
            "Password must be at least 6 characters long",
        ));
    }

    if state.store.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AuthError::DuplicateIdentity);
    }

    let password_hash = state.hasher.hash(&password)?;
    let otp = state.otp.generate(OffsetDateTime::now_utc());
    let created = state
        .store
        .create_user(NewUser {
            name,
            email: email.clone(),
            password_hash: Some(password_hash),
            role: Role::User,
            auth_type: AuthType::Manual,
            is_active: false,
            otp: Some((otp.code.clone(), otp.expires_at)),
        })
        .await?;
    let Some(user) = created else {
        warn!(%email, "email registered concurrently");
        return Err(AuthError::DuplicateIdentity);
    };

    info!(user_id = %user.id, %email, "pending user created");
    dispatch_code(state, &email, &otp.code).await?;
    Ok(email)
}

/// Second phase of signup: consume the code, activate the account and open a session.
///
/// Only accounts still pending their first activation can be activated here. An account
/// that was deactivated after activation stays off and fails `AccountDeactivated`.
pub async fn complete_signup(
    state: &AppState,
    email: Option<String>,
    otp: Option<String>,
) -> Result<AuthResponse, AuthError> {
    let now = OffsetDateTime::now_utc();
    let (user, code) = check_code(state, email, otp, now).await?;
    if user.is_deactivated() {
        warn!(user_id = %user.id, "verification on deactivated account");
        return Err(AuthError::AccountDeactivated);
    }
    let Some(activated) = state.store.activate(user.id, &code, now).await? else {
        warn!(user_id = %user.id, "otp consumed concurrently");
        return Err(AuthError::CodeNotIssued);
    };
    info!(user_id = %activated.id, "signup verified");
    issue_session(state, activated)
}

/// Consume a code without touching activation state or issuing a session.
pub async fn confirm_code(
    state: &AppState,
    email: Option<String>,
    otp: Option<String>,
) -> Result<(), AuthError> {
    let now = OffsetDateTime::now_utc();
    let (user, code) = check_code(state, email, otp, now).await?;
    if !state.store.clear_otp(user.id, &code, now).await? {
        warn!(user_id = %user.id, "otp consumed concurrently");
        return Err(AuthError::CodeNotIssued);
    }
    info!(user_id = %user.id, "otp confirmed");
    Ok(())
}

/// (Re)issue a code for `email`. Creates an inactive placeholder when no record exists.
/// Safe to repeat: each call overwrites the previous code.
pub async fn send_otp(state: &AppState, email: Option<String>) -> Result<(), AuthError> {
    let email = required_email(email, "Email is required")?;
    let (user, otp) = state
        .otp
        .issue(state.store.as_ref(), &email, OffsetDateTime::now_utc())
        .await?;
    info!(user_id = %user.id, "otp issued");
    dispatch_code(state, &email, &otp.code).await
}

pub async fn google_login(state: &AppState, raw_token: &str) -> Result<AuthResponse, AuthError> {
    let claim = state.identity.verify(raw_token).await.map_err(|e| match e {
        VerifyError::Invalid(reason) => {
            warn!(%reason, "google assertion rejected");
            AuthError::InvalidAssertion
        }
        VerifyError::Transport(e) => AuthError::Internal(e),
    })?;
    let email = normalize_email(&claim.email);

    let user = match state.store.find_by_email(&email).await? {
        Some(user) => user,
        None => {
            let created = state
                .store
                .create_user(NewUser {
                    name: claim.name,
                    email: email.clone(),
                    password_hash: None,
                    role: Role::User,
                    auth_type: AuthType::Google,
                    is_active: true,
                    otp: None,
                })
                .await?;
            match created {
                Some(user) => {
                    info!(user_id = %user.id, "google user created");
                    user
                }
                // Lost a race with a concurrent first login.
                None => state
                    .store
                    .find_by_email(&email)
                    .await?
                    .ok_or(AuthError::NotFound)?,
            }
        }
    };

    if !user.is_active {
        warn!(user_id = %user.id, "google login on deactivated account");
        return Err(AuthError::AccountDeactivated);
    }
    info!(user_id = %user.id, "google login");
    issue_session(state, user)
}
