use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};
use crate::model::UserContext;

/// Axum extractor for UserContext from request headers
///
/// - X-User-Id: user identifier
/// - X-User-Email / X-User-Name: optional details
/// - X-User-Permissions: comma separated codenames (`add_person,change_person`)
/// - X-User-Superuser: `true` grants every permission
///
/// Without an X-User-Id header the development superuser is returned.
#[async_trait]
impl<S> FromRequestParts<S> for UserContext
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;

        let Some(user_id) = extract_header_value(headers, "x-user-id") else {
            return Ok(UserContext::default_user());
        };

        let mut user = UserContext::with_details(
            user_id,
            extract_header_value(headers, "x-user-email"),
            extract_header_value(headers, "x-user-name"),
        );
        user.permissions = extract_header_value(headers, "x-user-permissions")
            .map(|raw| parse_permissions(&raw))
            .unwrap_or_default();
        user.is_superuser = extract_header_value(headers, "x-user-superuser")
            .is_some_and(|raw| raw.eq_ignore_ascii_case("true"));

        Ok(user)
    }
}

/// Extract header value as string
fn extract_header_value(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(|s| s.to_string())
}

fn parse_permissions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|codename| !codename.is_empty())
        .map(str::to_string)
        .collect()
}
