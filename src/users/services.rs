use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, error, info};

use crate::{
    error::AppError,
    users::{
        dto::{CreateUserRequest, ListQuery, ListUsersResponse, UpdateUserRequest, UserResponse},
        password::hash_password_off_thread,
        repo::{StoreError, UserStore},
        repo_types::{NewUser, UserChanges},
    },
};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PER_PAGE: i64 = 10;
pub const MAX_PER_PAGE: i64 = 100;
const MAX_FIELD_LEN: usize = 255;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Path ids must be positive integers; anything else is a bad request, not a miss.
pub fn parse_user_id(raw: &str) -> Result<i64, AppError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::InvalidId),
    }
}

/// Returns `(page, per_page)` with defaults applied and per_page clamped.
pub fn normalize_pagination(query: &ListQuery) -> (i64, i64) {
    let positive = |v: &Option<String>| {
        v.as_deref()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|n| *n > 0)
    };
    let page = positive(&query.page).unwrap_or(DEFAULT_PAGE);
    let per_page = positive(&query.per_page)
        .unwrap_or(DEFAULT_PER_PAGE)
        .min(MAX_PER_PAGE);
    (page, per_page)
}

fn clean_username(raw: &str) -> Result<String, AppError> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(AppError::Validation("username is required".into()));
    }
    if username.chars().count() > MAX_FIELD_LEN {
        return Err(AppError::Validation("username is too long".into()));
    }
    Ok(username.to_string())
}

fn clean_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::Validation("email is required".into()));
    }
    if email.chars().count() > MAX_FIELD_LEN || !is_valid_email(&email) {
        return Err(AppError::Validation("email is invalid".into()));
    }
    Ok(email)
}

fn check_password(raw: &str) -> Result<(), AppError> {
    if raw.is_empty() {
        return Err(AppError::Validation("password is required".into()));
    }
    Ok(())
}

async fn hash(plain: String) -> Result<String, AppError> {
    hash_password_off_thread(plain).await.map_err(|e| {
        error!(error = %e, "hash_password failed");
        AppError::Internal(format!("failed to process password: {e}"))
    })
}

fn write_error(action: &'static str, e: StoreError) -> AppError {
    match e {
        StoreError::Conflict(msg) => AppError::Conflict(msg),
        StoreError::Database(e) => {
            error!(error = %e, action, "storage write failed");
            AppError::Persistence {
                action,
                message: e.to_string(),
            }
        }
    }
}

fn lookup_error(e: StoreError) -> AppError {
    error!(error = %e, "storage lookup failed");
    AppError::Internal(e.to_string())
}

pub async fn create_user(
    store: &dyn UserStore,
    req: CreateUserRequest,
) -> Result<UserResponse, AppError> {
    let username = clean_username(&req.username)?;
    let email = clean_email(&req.email)?;
    check_password(&req.password)?;

    let password_hash = hash(req.password).await?;
    let user = store
        .create(NewUser {
            username,
            email,
            password_hash,
        })
        .await
        .map_err(|e| write_error("Failed to create user", e))?;

    info!(user_id = user.id, email = %user.email, "user created");
    Ok(user.into())
}

pub async fn list_users(
    store: &dyn UserStore,
    query: &ListQuery,
) -> Result<ListUsersResponse, AppError> {
    let (page, per_page) = normalize_pagination(query);
    let offset = (page - 1).saturating_mul(per_page);

    let fetch_failed = |e: StoreError| {
        error!(error = %e, "list users failed");
        AppError::Persistence {
            action: "Failed to fetch users",
            message: e.to_string(),
        }
    };
    let total_count = store.count().await.map_err(fetch_failed)?;
    let users = store
        .list(per_page, offset)
        .await
        .map_err(fetch_failed)?;

    debug!(page, per_page, total_count, returned = users.len(), "users listed");
    Ok(ListUsersResponse {
        users: users.into_iter().map(UserResponse::from).collect(),
        total_count,
        page,
        per_page,
    })
}

pub async fn get_user(store: &dyn UserStore, id: i64) -> Result<UserResponse, AppError> {
    store
        .find_by_id(id)
        .await
        .map_err(lookup_error)?
        .map(UserResponse::from)
        .ok_or(AppError::NotFound)
}

pub async fn update_user(
    store: &dyn UserStore,
    id: i64,
    req: UpdateUserRequest,
) -> Result<UserResponse, AppError> {
    let username = req.username.as_deref().map(clean_username).transpose()?;
    let email = req.email.as_deref().map(clean_email).transpose()?;
    if let Some(p) = req.password.as_deref() {
        check_password(p)?;
    }

    let existing = store
        .find_by_id(id)
        .await
        .map_err(lookup_error)?
        .ok_or(AppError::NotFound)?;

    let password_hash = match req.password {
        Some(p) => Some(hash(p).await?),
        None => None,
    };
    let changes = UserChanges {
        username,
        email,
        password_hash,
    };
    if changes.is_empty() {
        return Ok(existing.into());
    }

    let user = store
        .update(id, changes)
        .await
        .map_err(|e| write_error("Failed to update user", e))?
        // Deleted between the lookup and the write.
        .ok_or(AppError::NotFound)?;

    info!(user_id = user.id, "user updated");
    Ok(user.into())
}

pub async fn delete_user(store: &dyn UserStore, id: i64) -> Result<(), AppError> {
    if store.soft_delete(id).await.map_err(lookup_error)? {
        info!(user_id = id, "user deleted");
        Ok(())
    } else {
        Err(AppError::NotFound)
    }
}
