use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result as AnyResult;
use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, State},
    http::{StatusCode, header, request::Parts},
    routing::{delete, get, post, put},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use loanflow_core::{
    Action, Actor, LoanApplication, LoanError, LoanRequestForm, LoanStatistics, LoanStatus,
    LoanStore, Role, User, UserStore, WorkflowEngine, authorize,
};
use loanflow_platform::{ServiceConfig, connect_database};
use loanflow_store::{PgLoanStore, PgUserStore};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, info};
use uuid::Uuid;

const TOKEN_TTL_DAYS: i64 = 1;

type ApiError = (StatusCode, Json<Value>);

#[derive(Clone)]
struct AppState {
    engine: WorkflowEngine,
    users: Arc<dyn UserStore>,
    tokens: TokenKeys,
}

#[derive(Clone)]
struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    role: Role,
    iat: i64,
    exp: i64,
}

struct AuthUser(Actor);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));
        let Some(token) = token else {
            return Err(api_error(LoanError::Authentication(
                "No token, authorization denied".to_string(),
            )));
        };

        let data = decode::<Claims>(token, &state.tokens.decoding, &Validation::default())
            .map_err(|_| {
                api_error(LoanError::Authentication("Token is not valid".to_string()))
            })?;

        Ok(AuthUser(Actor {
            id: data.claims.sub,
            role: data.claims.role,
        }))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RegisterRequest {
    email: String,
    password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct CreateUserRequest {
    email: String,
    password: String,
}

#[derive(Debug, Clone, Serialize)]
struct SessionResponse {
    token: String,
    user: UserView,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserView {
    id: Uuid,
    email: String,
    role: Role,
    created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct UserTotals {
    users: i64,
}

#[derive(Debug, Clone, Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CreateLoanRequest {
    applicant_name: String,
    email: String,
    amount: Decimal,
    time: String,
    employment_status: String,
    employment_address: String,
    purpose: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RejectLoanRequest {
    rejection_reason: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoanView {
    id: Uuid,
    applicant_name: String,
    email: String,
    amount: Decimal,
    time: String,
    employment_status: String,
    employment_address: String,
    purpose: String,
    status: LoanStatus,
    verified_by: Option<Uuid>,
    approved_by: Option<Uuid>,
    rejected_by: Option<Uuid>,
    rejection_reason: Option<String>,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&LoanApplication> for LoanView {
    fn from(loan: &LoanApplication) -> Self {
        Self {
            id: loan.id,
            applicant_name: loan.applicant_name.clone(),
            email: loan.email.clone(),
            amount: loan.amount,
            time: loan.time.clone(),
            employment_status: loan.employment_status.clone(),
            employment_address: loan.employment_address.clone(),
            purpose: loan.purpose.clone(),
            status: loan.status(),
            verified_by: loan.state.verified_by(),
            approved_by: loan.state.approved_by(),
            rejected_by: loan.state.rejected_by(),
            rejection_reason: loan.state.rejection_reason().map(str::to_string),
            user_id: loan.owner_user_id,
            created_at: loan.created_at,
            updated_at: loan.updated_at,
        }
    }
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "loanflow_server=info".to_string()),
        )
        .init();

    let config = ServiceConfig::from_env("0.0.0.0:8080")?;
    let pool = connect_database(&config.database_url).await?;

    let loans: Arc<dyn LoanStore> = Arc::new(PgLoanStore::new(pool.clone()));
    let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool));
    let state = AppState {
        engine: WorkflowEngine::new(loans),
        users,
        tokens: TokenKeys::from_secret(config.jwt_secret.as_bytes()),
    };
    let router = app_router(state);

    let addr: SocketAddr = config.http_addr.parse()?;
    info!("loan service listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/user", get(list_users))
        .route("/api/user/total", get(total_users))
        .route("/api/user/admin", post(create_admin))
        .route("/api/user/verifier", post(create_verifier))
        .route("/api/user/{user_id}", delete(delete_user))
        .route("/api/loans", get(list_loans).post(create_loan))
        .route("/api/loans/user", get(list_own_loans))
        .route("/api/loans/statistics", get(loan_statistics))
        .route("/api/loans/{loan_id}", get(get_loan))
        .route("/api/loans/{loan_id}/verify", put(verify_loan))
        .route("/api/loans/{loan_id}/reject", put(reject_loan))
        .route("/api/loans/{loan_id}/approve", put(approve_loan))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let user = create_account(
        &state,
        &payload.email,
        &payload.password,
        Role::User,
        "User already exists with that email",
    )
    .await?;
    let token = issue_token(&state.tokens, &user).map_err(server_error)?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            token,
            user: UserView::from(&user),
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let user = state
        .users
        .find_by_email(payload.email.trim())
        .await
        .map_err(storage_error)?;
    let Some(user) = user else {
        return Err(api_error(LoanError::validation("Invalid credentials")));
    };

    let valid = bcrypt::verify(&payload.password, &user.password_hash).map_err(server_error)?;
    if !valid {
        return Err(api_error(LoanError::validation("Invalid credentials")));
    }

    let token = issue_token(&state.tokens, &user).map_err(server_error)?;
    Ok(Json(SessionResponse {
        token,
        user: UserView::from(&user),
    }))
}

async fn list_users(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> Result<Json<Vec<UserView>>, ApiError> {
    authorize(actor.role, Action::ManageUsers).map_err(api_error)?;
    let users = state.users.list().await.map_err(storage_error)?;
    Ok(Json(users.iter().map(UserView::from).collect()))
}

async fn total_users(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> Result<Json<UserTotals>, ApiError> {
    authorize(actor.role, Action::ManageUsers).map_err(api_error)?;
    let users = state
        .users
        .count_by_role(Role::User)
        .await
        .map_err(storage_error)?;
    Ok(Json(UserTotals { users }))
}

async fn create_admin(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    authorize(actor.role, Action::ManageUsers).map_err(api_error)?;
    let user = create_account(
        &state,
        &payload.email,
        &payload.password,
        Role::Admin,
        "User already exists",
    )
    .await?;
    Ok((StatusCode::CREATED, Json(UserView::from(&user))))
}

async fn create_verifier(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    authorize(actor.role, Action::ManageUsers).map_err(api_error)?;
    let user = create_account(
        &state,
        &payload.email,
        &payload.password,
        Role::Verifier,
        "User already exists",
    )
    .await?;
    Ok((StatusCode::CREATED, Json(UserView::from(&user))))
}

async fn delete_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    authorize(actor.role, Action::ManageUsers).map_err(api_error)?;
    let Some(user_id) = parse_id(&user_id) else {
        return Err(api_error(LoanError::NotFound("User")));
    };

    let user = state.users.get(user_id).await.map_err(storage_error)?;
    let Some(user) = user else {
        return Err(api_error(LoanError::NotFound("User")));
    };
    if user.id == actor.id {
        return Err(api_error(LoanError::validation(
            "Cannot delete your own account",
        )));
    }

    let deleted = state.users.delete(user.id).await.map_err(storage_error)?;
    if !deleted {
        return Err(api_error(LoanError::NotFound("User")));
    }

    Ok(Json(MessageResponse {
        message: "User deleted successfully".to_string(),
    }))
}

async fn create_loan(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Json(payload): Json<CreateLoanRequest>,
) -> Result<(StatusCode, Json<LoanView>), ApiError> {
    let form = LoanRequestForm {
        applicant_name: payload.applicant_name,
        email: payload.email,
        amount: payload.amount,
        time: payload.time,
        employment_status: payload.employment_status,
        employment_address: payload.employment_address,
        purpose: payload.purpose,
    };
    let loan = state.engine.submit(actor, form).await.map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(LoanView::from(&loan))))
}

async fn list_loans(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> Result<Json<Vec<LoanView>>, ApiError> {
    let loans = state.engine.all_loans(actor).await.map_err(api_error)?;
    Ok(Json(loans.iter().map(LoanView::from).collect()))
}

async fn list_own_loans(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> Result<Json<Vec<LoanView>>, ApiError> {
    let loans = state.engine.loans_for(actor).await.map_err(api_error)?;
    Ok(Json(loans.iter().map(LoanView::from).collect()))
}

async fn loan_statistics(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<LoanStatistics>, ApiError> {
    let stats = state.engine.statistics().await.map_err(api_error)?;
    Ok(Json(stats))
}

async fn get_loan(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(loan_id): Path<String>,
) -> Result<Json<LoanView>, ApiError> {
    let loan_id = parse_loan_id(&loan_id)?;
    let loan = state.engine.loan(loan_id).await.map_err(api_error)?;
    Ok(Json(LoanView::from(&loan)))
}

async fn verify_loan(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(loan_id): Path<String>,
) -> Result<Json<LoanView>, ApiError> {
    let loan_id = parse_loan_id(&loan_id)?;
    let loan = state
        .engine
        .verify(actor, loan_id)
        .await
        .map_err(api_error)?;
    info!("loan {} verified by {}", loan.id, actor.id);
    Ok(Json(LoanView::from(&loan)))
}

async fn reject_loan(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(loan_id): Path<String>,
    Json(payload): Json<RejectLoanRequest>,
) -> Result<Json<LoanView>, ApiError> {
    let loan_id = parse_loan_id(&loan_id)?;
    let loan = state
        .engine
        .reject(actor, loan_id, &payload.rejection_reason)
        .await
        .map_err(api_error)?;
    info!("loan {} rejected by {}", loan.id, actor.id);
    Ok(Json(LoanView::from(&loan)))
}

async fn approve_loan(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(loan_id): Path<String>,
) -> Result<Json<LoanView>, ApiError> {
    let loan_id = parse_loan_id(&loan_id)?;
    let loan = state
        .engine
        .approve(actor, loan_id)
        .await
        .map_err(api_error)?;
    info!("loan {} approved by {}", loan.id, actor.id);
    Ok(Json(LoanView::from(&loan)))
}

async fn create_account(
    state: &AppState,
    email: &str,
    password: &str,
    role: Role,
    duplicate_message: &'static str,
) -> Result<User, ApiError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(api_error(LoanError::validation("email is required")));
    }
    if password.is_empty() {
        return Err(api_error(LoanError::validation("password is required")));
    }

    let existing = state
        .users
        .find_by_email(email)
        .await
        .map_err(storage_error)?;
    if existing.is_some() {
        return Err(api_error(LoanError::validation(duplicate_message)));
    }

    let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(server_error)?;
    let user = User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash,
        role,
        created_at: Utc::now(),
    };
    state.users.insert(&user).await.map_err(storage_error)?;

    Ok(user)
}

fn issue_token(keys: &TokenKeys, user: &User) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id,
        role: user.role,
        iat: now.timestamp(),
        exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
    };
    encode(&Header::default(), &claims, &keys.encoding)
}

// A syntactically invalid id can never name a stored record, so it reports
// the same way an unknown id does.
fn parse_loan_id(raw: &str) -> Result<Uuid, ApiError> {
    parse_id(raw).ok_or_else(|| api_error(LoanError::NotFound("Loan application")))
}

fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

fn api_error(err: LoanError) -> ApiError {
    let status = match &err {
        LoanError::Validation(_) | LoanError::InvalidTransition(_) => StatusCode::BAD_REQUEST,
        LoanError::Authentication(_) => StatusCode::UNAUTHORIZED,
        LoanError::Authorization(_) => StatusCode::FORBIDDEN,
        LoanError::NotFound(_) => StatusCode::NOT_FOUND,
        LoanError::Storage(cause) => {
            error!("storage failure: {cause:#}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                message_body("Server error"),
            );
        }
    };
    (status, message_body(&err.to_string()))
}

fn storage_error(err: anyhow::Error) -> ApiError {
    api_error(LoanError::from(err))
}

fn server_error<E: std::fmt::Display>(err: E) -> ApiError {
    error!("internal error: {err}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        message_body("Server error"),
    )
}

fn message_body(message: &str) -> Json<Value> {
    Json(json!({ "message": message }))
}
