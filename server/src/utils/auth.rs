//! Request identity extractors.
//!
//! Authentication happens upstream; this service trusts the `X-User-Id` and
//! `X-User-Role` headers forwarded by the gateway in front of it.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::utils::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

const MIN_IDEMPOTENCY_KEY_LEN: usize = 16;
const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Customer,
    Seller,
}

impl Role {
    fn parse(value: &str) -> Result<Self, AppError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "seller" => Ok(Role::Seller),
            other => Err(AppError::AuthError(format!("Unknown role '{}'", other))),
        }
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

/// An authenticated caller with the seller role.
#[derive(Debug, Clone, Copy)]
pub struct Seller(pub Actor);

/// The caller, if identity headers were sent. Malformed headers still fail.
#[derive(Debug, Clone, Copy)]
pub struct MaybeActor(pub Option<Actor>);

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, AppError> {
    match parts.headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(Some)
            .map_err(|_| AppError::AuthError(format!("Invalid {} header", name))),
    }
}

fn actor_from_parts(parts: &Parts) -> Result<Option<Actor>, AppError> {
    let Some(raw_id) = header(parts, USER_ID_HEADER)? else {
        return Ok(None);
    };
    let user_id = Uuid::parse_str(raw_id.trim())
        .map_err(|_| AppError::AuthError("X-User-Id must be a UUID".to_string()))?;
    let role = match header(parts, USER_ROLE_HEADER)? {
        Some(raw) => Role::parse(raw)?,
        None => Role::Customer,
    };
    Ok(Some(Actor { user_id, role }))
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_parts(parts)?
            .ok_or_else(|| AppError::AuthError("Missing X-User-Id header".to_string()))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeActor(actor_from_parts(parts)?))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Seller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let actor = Actor::from_request_parts(parts, state).await?;
        if actor.role != Role::Seller {
            return Err(AppError::Forbidden(
                "This action requires the seller role".to_string(),
            ));
        }
        Ok(Seller(actor))
    }
}

/// The `Idempotency-Key` header of a settlement request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyKey(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for IdempotencyKey
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let key = header(parts, IDEMPOTENCY_KEY_HEADER)
            .map_err(|_| AppError::ValidationError("Invalid Idempotency-Key header".to_string()))?
            .map(str::trim)
            .ok_or_else(|| AppError::ValidationError("Missing Idempotency-Key header".to_string()))?;

        if !(MIN_IDEMPOTENCY_KEY_LEN..=MAX_IDEMPOTENCY_KEY_LEN).contains(&key.len()) {
            return Err(AppError::ValidationError(format!(
                "Idempotency-Key must be between {} and {} characters",
                MIN_IDEMPOTENCY_KEY_LEN, MAX_IDEMPOTENCY_KEY_LEN
            )));
        }

        Ok(IdempotencyKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_actor_defaults_to_customer() {
        let id = Uuid::new_v4();
        let mut parts = parts(&[("X-User-Id", &id.to_string())]);
        let actor = Actor::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(actor.user_id, id);
        assert_eq!(actor.role, Role::Customer);
    }

    #[tokio::test]
    async fn test_missing_identity_is_auth_error() {
        let mut parts = parts(&[]);
        let err = Actor::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert_eq!(err.code(), "AUTH_ERROR");

        let maybe = MaybeActor::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(maybe.0.is_none());
    }

    #[tokio::test]
    async fn test_customer_is_not_seller() {
        let id = Uuid::new_v4().to_string();
        let mut parts = parts(&[("X-User-Id", &id), ("X-User-Role", "customer")]);
        let err = Seller::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
    }

    #[tokio::test]
    async fn test_idempotency_key_length_bounds() {
        let mut short = parts(&[("Idempotency-Key", "abc")]);
        assert!(IdempotencyKey::from_request_parts(&mut short, &()).await.is_err());

        let mut ok = parts(&[("Idempotency-Key", "checkout-2025-0001")]);
        let key = IdempotencyKey::from_request_parts(&mut ok, &()).await.unwrap();
        assert_eq!(key.0, "checkout-2025-0001");
    }
}
