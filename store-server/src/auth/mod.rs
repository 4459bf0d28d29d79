//! Auth Module
//!
//! 请求身份提取。网关/BFF 已完成认证并注入身份头：
//! - `x-user-id`  - 顾客身份
//! - `x-admin-id` - 管理员身份
//!
//! 这里只做提取与缺失拒绝，不做令牌验证（那是网关的职责）。

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::utils::AppError;

const USER_HEADER: &str = "x-user-id";
const ADMIN_HEADER: &str = "x-admin-id";

/// Authenticated customer identity
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
}

/// Authenticated back-office identity
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub id: String,
}

fn header_identity(parts: &Parts, name: &str) -> Result<String, AppError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(AppError::Unauthorized)
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentUser {
            id: header_identity(parts, USER_HEADER)?,
        })
    }
}

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(AdminUser {
            id: header_identity(parts, ADMIN_HEADER)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(name: &str, value: &str) -> Parts {
        Request::builder()
            .header(name, value)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[tokio::test]
    async fn test_extracts_user_id() {
        let mut parts = parts_with("x-user-id", "u-42");
        let user = CurrentUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user.id, "u-42");
    }

    #[tokio::test]
    async fn test_missing_header_rejected() {
        let mut parts = Request::builder().body(()).unwrap().into_parts().0;
        assert!(CurrentUser::from_request_parts(&mut parts, &()).await.is_err());
        assert!(AdminUser::from_request_parts(&mut parts, &()).await.is_err());
    }

    #[tokio::test]
    async fn test_blank_header_rejected() {
        let mut parts = parts_with("x-admin-id", "   ");
        assert!(AdminUser::from_request_parts(&mut parts, &()).await.is_err());
    }
}
