use std::env;
use std::future::Future;

use axum::{
    extract::{FromRequestParts, Json, OptionalFromRequestParts, State},
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::DateTime as BsonDateTime;
use pbkdf2::pbkdf2_hmac;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::db;
use crate::db::models::Address;
use crate::notify::EmailTemplate;
use crate::AppState;

const AUTH_COOKIE_NAME: &str = "auth_token";
const PBKDF2_ITERATIONS: u32 = 600_000;
const RESET_TOKEN_MINUTES: i64 = 15;

// Session claims double as the cached display fields; logout just clears
// the cookie.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
    email: String,
    name: String,
    staff: bool,
    superuser: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResetClaims {
    sub: String,
    exp: usize,
    purpose: String,
}

#[derive(Serialize, Clone)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

pub struct AuthenticatedUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = (StatusCode, String);

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let token = extract_token(parts)
                .ok_or((StatusCode::UNAUTHORIZED, "Missing auth token".to_string()))?;
            let claims = decode_session(&token)
                .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid token".to_string()))?;

            // Blocked or deleted accounts lose access immediately, not at
            // token expiry.
            let user = db::find_user_by_id(&state.db, &claims.sub)
                .await
                .map_err(|e| {
                    tracing::error!("auth lookup failed: {}", e);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Database Error".to_string(),
                    )
                })?
                .ok_or((StatusCode::UNAUTHORIZED, "User not found".to_string()))?;
            if !user.is_active {
                return Err((
                    StatusCode::FORBIDDEN,
                    "Your account has been blocked. Please contact support.".to_string(),
                ));
            }

            Ok(AuthenticatedUser {
                id: user.id,
                email: user.email,
                name: user.name,
                is_staff: user.is_staff,
                is_superuser: user.is_superuser,
            })
        }
    }
}

// Public listings render differently for signed-in users but must not
// reject anonymous ones, so a missing or stale token resolves to None.
impl OptionalFromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = (StatusCode, String);

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl Future<Output = Result<Option<Self>, Self::Rejection>> + Send {
        async move {
            match <AuthenticatedUser as FromRequestParts<AppState>>::from_request_parts(
                parts, state,
            )
            .await
            {
                Ok(user) => Ok(Some(user)),
                Err(_) => Ok(None),
            }
        }
    }
}

/// Staff/superuser gate for the admin surface.
pub struct AdminUser(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = (StatusCode, String);

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let user = <AuthenticatedUser as FromRequestParts<AppState>>::from_request_parts(
                parts, state,
            )
            .await?;
            if !(user.is_staff || user.is_superuser) {
                return Err((
                    StatusCode::FORBIDDEN,
                    "You do not have permission to access the admin panel.".to_string(),
                ));
            }
            Ok(AdminUser(user))
        }
    }
}

// -- Password hashing -------------------------------------------------------
//
// PBKDF2-HMAC-SHA256 with a random salt, encoded as
// `pbkdf2_sha256$<iterations>$<salt>$<hash>`.

pub fn hash_password(password: &str) -> String {
    let salt: [u8; 16] = rand::thread_rng().gen();
    encode_password(password, &salt, PBKDF2_ITERATIONS)
}

fn encode_password(password: &str, salt: &[u8], iterations: u32) -> String {
    let mut out = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    format!(
        "pbkdf2_sha256${}${}${}",
        iterations,
        hex::encode(salt),
        hex::encode(out)
    )
}

pub fn verify_password(password: &str, encoded: &str) -> bool {
    let mut parts = encoded.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(_hash)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if scheme != "pbkdf2_sha256" {
        return false;
    }
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    let Ok(salt) = hex::decode(salt) else {
        return false;
    };
    encode_password(password, &salt, iterations) == encoded
}

// -- Input validation -------------------------------------------------------

fn phone_valid(phone: &str) -> bool {
    phone.len() == 10 && phone.chars().all(|c| c.is_ascii_digit())
}

fn email_valid(email: &str) -> bool {
    let re = regex::Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
        .expect("email regex");
    email.matches('@').count() == 1 && re.is_match(email)
}

/// Password strength rules: minimum length, not entirely numeric, and not a
/// trivial echo of the user's own email or name.
fn password_errors(password: &str, email: &str, name: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if password.len() < 8 {
        errors.push("Password must contain at least 8 characters.".to_string());
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        errors.push("Password cannot be entirely numeric.".to_string());
    }
    let lowered = password.to_lowercase();
    let local_part = email.split('@').next().unwrap_or("").to_lowercase();
    if local_part.len() >= 4 && lowered.contains(&local_part) {
        errors.push("Password is too similar to the email address.".to_string());
    }
    let name = name.to_lowercase();
    if name.len() >= 4 && lowered.contains(&name) {
        errors.push("Password is too similar to the name.".to_string());
    }
    errors
}

fn generate_verification_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

// -- Tokens & cookies -------------------------------------------------------

fn jwt_secret() -> anyhow::Result<String> {
    env::var("JWT_SECRET").map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable not set"))
}

fn create_session_token(user: &SessionUser) -> anyhow::Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::days(1))
        .expect("valid timestamp")
        .timestamp();

    let claims = Claims {
        sub: user.id.clone(),
        exp: expiration as usize,
        email: user.email.clone(),
        name: user.name.clone(),
        staff: user.is_staff,
        superuser: user.is_superuser,
    };
    let secret = jwt_secret()?;
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?)
}

fn decode_session(token: &str) -> anyhow::Result<Claims> {
    let secret = jwt_secret()?;
    let mut validation = Validation::default();
    validation.validate_exp = true;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &validation,
    )?;
    Ok(data.claims)
}

fn create_reset_token(email: &str) -> anyhow::Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::minutes(RESET_TOKEN_MINUTES))
        .expect("valid timestamp")
        .timestamp();
    let claims = ResetClaims {
        sub: email.to_string(),
        exp: expiration as usize,
        purpose: "password-reset".to_string(),
    };
    let secret = jwt_secret()?;
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?)
}

fn validate_reset_token(token: &str) -> anyhow::Result<String> {
    let secret = jwt_secret()?;
    let mut validation = Validation::default();
    validation.validate_exp = true;
    let data = decode::<ResetClaims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &validation,
    )?;
    if data.claims.purpose != "password-reset" {
        return Err(anyhow::anyhow!("token purpose mismatch"));
    }
    Ok(data.claims.sub)
}

fn extract_token(parts: &Parts) -> Option<String> {
    if let Some(auth_header) = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    if let Some(cookie_header) = parts
        .headers
        .get(header::COOKIE)
        .and_then(|h| h.to_str().ok())
    {
        for cookie in cookie_header.split(';') {
            if let Some((k, v)) = cookie.trim().split_once('=') {
                if k == AUTH_COOKIE_NAME {
                    return Some(v.to_string());
                }
            }
        }
    }
    None
}

fn build_auth_cookie(token: &str) -> String {
    let secure = env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string()) == "production";
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age=86400",
        AUTH_COOKIE_NAME, token
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn clear_auth_cookie() -> String {
    let secure = env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string()) == "production";
    let mut cookie = format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
        AUTH_COOKIE_NAME
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

// -- Request/response types -------------------------------------------------

#[derive(Deserialize)]
pub struct AddressPayload {
    pub street: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub apartment: Option<String>,
    pub instructions: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl AddressPayload {
    fn into_address(self) -> Address {
        Address {
            street: self.street.unwrap_or_default(),
            city: self.city.unwrap_or_default(),
            postal_code: self.postal_code.unwrap_or_default(),
            country: self.country.unwrap_or_default(),
            apartment: self.apartment.unwrap_or_default(),
            instructions: self.instructions,
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: String,
    pub address: Option<AddressPayload>,
    #[serde(default)]
    pub is_donor: bool,
    #[serde(default)]
    pub is_recipient: bool,
    #[serde(default)]
    pub is_volunteer: bool,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub code: String,
}

#[derive(Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ResetVerifyRequest {
    pub email: String,
    pub code: String,
}

#[derive(Deserialize)]
pub struct ResetConfirmRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub user: SessionUser,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub address: Option<Address>,
    pub email_verified: bool,
    pub date_joined: chrono::DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<AddressPayload>,
}

// -- Handlers ---------------------------------------------------------------

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    let email = req.email.trim().to_lowercase();
    if !email_valid(&email) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            "Invalid email format. Please use a valid email like name@example.com",
        )
            .into_response();
    }
    if !phone_valid(&req.phone) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            "Invalid phone number. Please enter exactly 10 digits (no spaces or symbols).",
        )
            .into_response();
    }
    let errors = password_errors(&req.password, &email, &req.name);
    if !errors.is_empty() {
        return (StatusCode::UNPROCESSABLE_ENTITY, errors.join(" ")).into_response();
    }

    match db::find_user_by_email(&state.db, &email).await {
        Ok(Some(_)) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                "User with this email already exists.",
            )
                .into_response();
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!("register lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    }

    let now = BsonDateTime::now();
    let address = req.address.map(|a| a.into_address());
    let shipping_street = address
        .as_ref()
        .map(|a| a.street.clone())
        .unwrap_or_default();
    let password_hash = hash_password(&req.password);

    let user = match db::create_user(
        &state.db,
        &email,
        &req.name,
        &req.phone,
        address,
        &password_hash,
        now,
    )
    .await
    {
        Ok(user) => user,
        Err(e) => {
            tracing::error!("user create failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    // Role profiles per the registration checkboxes; a user who picked
    // nothing still gets a donor profile so they land somewhere useful.
    let roles: anyhow::Result<()> = async {
        if req.is_donor || (!req.is_recipient && !req.is_volunteer) {
            db::ensure_donor_profile(&state.db, &user.id, now).await?;
        }
        if req.is_recipient {
            db::ensure_recipient_profile(&state.db, &user.id, &shipping_street, now).await?;
        }
        if req.is_volunteer {
            db::ensure_volunteer_profile(&state.db, &user.id, now).await?;
        }
        Ok(())
    }
    .await;
    if let Err(e) = roles {
        tracing::error!("role profile create failed: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
    }

    let code = generate_verification_code();
    if let Err(e) = db::set_verification_code(&state.db, &user.id, &code, now).await {
        tracing::error!("verification code store failed: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
    }
    state
        .mailer
        .send(&user.email, EmailTemplate::VerificationCode { code })
        .await;

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": user.id,
            "message": "We sent a 6-digit verification code to your email. Please verify.",
        })),
    )
        .into_response()
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let email = req.email.trim().to_lowercase();
    let user = match db::find_user_by_email(&state.db, &email).await {
        Ok(user) => user,
        Err(e) => {
            tracing::error!("login lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let Some(user) = user.filter(|u| verify_password(&req.password, &u.password_hash)) else {
        return (StatusCode::UNAUTHORIZED, "Invalid email or password.").into_response();
    };
    if !user.is_active {
        return (
            StatusCode::FORBIDDEN,
            "Your account has been blocked. Please contact support.",
        )
            .into_response();
    }

    if let Err(e) = db::record_login(&state.db, &user.id, BsonDateTime::now()).await {
        tracing::warn!("last_login update failed: {}", e);
    }

    let session = SessionUser {
        id: user.id,
        email: user.email,
        name: user.name,
        is_staff: user.is_staff,
        is_superuser: user.is_superuser,
    };
    match create_session_token(&session) {
        Ok(token) => {
            let cookie = build_auth_cookie(&token);
            let mut response = Json(AuthResponse { user: session }).into_response();
            response.headers_mut().insert(
                header::SET_COOKIE,
                HeaderValue::from_str(&cookie).expect("valid cookie"),
            );
            response
        }
        Err(e) => {
            tracing::error!("session token creation failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Auth failed").into_response()
        }
    }
}

pub async fn logout() -> impl IntoResponse {
    let cookie = clear_auth_cookie();
    let mut response = (StatusCode::OK, "OK").into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).expect("valid cookie"),
    );
    response
}

pub async fn me(user: AuthenticatedUser) -> impl IntoResponse {
    Json(SessionUser {
        id: user.id,
        email: user.email,
        name: user.name,
        is_staff: user.is_staff,
        is_superuser: user.is_superuser,
    })
}

pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<VerifyEmailRequest>,
) -> impl IntoResponse {
    let email = req.email.trim().to_lowercase();
    let user = match db::find_user_by_email(&state.db, &email).await {
        Ok(Some(user)) => user,
        Ok(None) => return (StatusCode::NOT_FOUND, "User not found.").into_response(),
        Err(e) => {
            tracing::error!("verify lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    if !user.verification_code_valid(req.code.trim(), Utc::now()) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            "Invalid or expired code. Please try again.",
        )
            .into_response();
    }

    if let Err(e) = db::mark_email_verified(&state.db, &user.id).await {
        tracing::error!("verify update failed: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
    }
    (
        StatusCode::OK,
        "Email verified successfully! You can now log in.",
    )
        .into_response()
}

pub async fn resend_code(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> impl IntoResponse {
    let email = req.email.trim().to_lowercase();
    match db::find_user_by_email(&state.db, &email).await {
        Ok(Some(user)) => {
            let code = generate_verification_code();
            if let Err(e) =
                db::set_verification_code(&state.db, &user.id, &code, BsonDateTime::now()).await
            {
                tracing::error!("verification code store failed: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
            }
            state
                .mailer
                .send(&user.email, EmailTemplate::VerificationCode { code })
                .await;
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!("resend lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    }
    // Same reply either way; this endpoint is not an account-existence
    // oracle.
    (StatusCode::OK, "A new verification code was sent if the account exists.").into_response()
}

pub async fn password_reset_start(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> impl IntoResponse {
    let email = req.email.trim().to_lowercase();
    match db::find_user_by_email(&state.db, &email).await {
        Ok(Some(user)) => {
            let code = generate_verification_code();
            if let Err(e) =
                db::set_verification_code(&state.db, &user.id, &code, BsonDateTime::now()).await
            {
                tracing::error!("reset code store failed: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
            }
            state
                .mailer
                .send(&user.email, EmailTemplate::VerificationCode { code })
                .await;
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!("reset lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    }
    (
        StatusCode::OK,
        "We sent a 6-digit verification code to your email if the account exists.",
    )
        .into_response()
}

pub async fn password_reset_verify(
    State(state): State<AppState>,
    Json(req): Json<ResetVerifyRequest>,
) -> impl IntoResponse {
    let email = req.email.trim().to_lowercase();
    let user = match db::find_user_by_email(&state.db, &email).await {
        Ok(Some(user)) => user,
        Ok(None) => return (StatusCode::NOT_FOUND, "User not found.").into_response(),
        Err(e) => {
            tracing::error!("reset verify lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    if !user.verification_code_valid(req.code.trim(), Utc::now()) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            "Invalid or expired code. Please try again.",
        )
            .into_response();
    }
    if let Err(e) = db::clear_verification_code(&state.db, &user.id).await {
        tracing::error!("reset code clear failed: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
    }

    match create_reset_token(&user.email) {
        Ok(token) => Json(serde_json::json!({ "reset_token": token })).into_response(),
        Err(e) => {
            tracing::error!("reset token creation failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Auth failed").into_response()
        }
    }
}

pub async fn password_reset_confirm(
    State(state): State<AppState>,
    Json(req): Json<ResetConfirmRequest>,
) -> impl IntoResponse {
    let email = match validate_reset_token(&req.token) {
        Ok(email) => email,
        Err(_) => {
            return (
                StatusCode::UNAUTHORIZED,
                "The reset link is invalid or has expired. Please start again.",
            )
                .into_response();
        }
    };

    let user = match db::find_user_by_email(&state.db, &email).await {
        Ok(Some(user)) => user,
        Ok(None) => return (StatusCode::NOT_FOUND, "User not found.").into_response(),
        Err(e) => {
            tracing::error!("reset confirm lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let errors = password_errors(&req.new_password, &user.email, &user.name);
    if !errors.is_empty() {
        return (StatusCode::UNPROCESSABLE_ENTITY, errors.join(" ")).into_response();
    }

    let password_hash = hash_password(&req.new_password);
    if let Err(e) = db::update_password(&state.db, &user.id, &password_hash).await {
        tracing::error!("password update failed: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
    }
    (
        StatusCode::OK,
        "Password updated successfully. Please sign in.",
    )
        .into_response()
}

pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    match db::find_user_by_id(&state.db, &user.id).await {
        Ok(Some(user)) => Json(ProfileResponse {
            id: user.id,
            email: user.email,
            name: user.name,
            phone: user.phone,
            address: user.address,
            email_verified: user.email_verified,
            date_joined: user.date_joined.to_chrono(),
        })
        .into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "User not found.").into_response(),
        Err(e) => {
            tracing::error!("profile fetch failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<UpdateProfileRequest>,
) -> impl IntoResponse {
    let current = match db::find_user_by_id(&state.db, &user.id).await {
        Ok(Some(user)) => user,
        Ok(None) => return (StatusCode::NOT_FOUND, "User not found.").into_response(),
        Err(e) => {
            tracing::error!("profile fetch failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let name = req.name.unwrap_or(current.name);
    let phone = req.phone.unwrap_or(current.phone);
    if !phone_valid(&phone) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            "Invalid phone number. Please enter exactly 10 digits (no spaces or symbols).",
        )
            .into_response();
    }
    let address = req.address.map(|a| a.into_address()).or(current.address);

    match db::update_profile(&state.db, &user.id, &name, &phone, address).await {
        Ok(true) => (StatusCode::OK, "Profile updated successfully!").into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "User not found.").into_response(),
        Err(e) => {
            tracing::error!("profile update failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies_and_rejects() {
        let encoded = encode_password("correct horse", b"0123456789abcdef", 1_000);
        assert!(verify_password("correct horse", &encoded));
        assert!(!verify_password("wrong horse", &encoded));
        assert!(!verify_password("correct horse", "not-an-encoded-hash"));
    }

    #[test]
    fn phone_validation_requires_ten_digits() {
        assert!(phone_valid("0501234567"));
        assert!(!phone_valid("050123456"));
        assert!(!phone_valid("05012345678"));
        assert!(!phone_valid("05O1234567"));
        assert!(!phone_valid("050-123456"));
    }

    #[test]
    fn email_validation_rejects_malformed_addresses() {
        assert!(email_valid("name@example.com"));
        assert!(email_valid("first.last+tag@sub.domain.org"));
        assert!(!email_valid("no-at-sign.com"));
        assert!(!email_valid("two@@example.com"));
        assert!(!email_valid("a@b@example.com"));
        assert!(!email_valid("name@example"));
    }

    #[test]
    fn password_rules_catch_weak_choices() {
        assert!(password_errors("longenough1", "a@b.co", "Pat").is_empty());
        assert!(!password_errors("short", "a@b.co", "Pat").is_empty());
        assert!(!password_errors("12345678", "a@b.co", "Pat").is_empty());
        assert!(!password_errors("xdanielle1", "danielle@b.co", "Pat").is_empty());
        assert!(password_errors("pat-smith-99", "a@b.co", "Pat Smith").is_empty());
    }
}
