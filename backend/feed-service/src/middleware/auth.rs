/// Request identity.
///
/// Authentication happens at the gateway; this service trusts the identity
/// headers it forwards: `X-User-Id`, `X-Organization-Id`, and the optional
/// `X-User-Staff` marker.
use crate::error::AppError;
use actix_web::http::header::HeaderMap;
use actix_web::{dev::Payload, FromRequest, HttpRequest};
use std::future::{ready, Ready};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub is_staff: bool,
}

impl AuthenticatedUser {
    fn from_headers(headers: &HeaderMap) -> Result<Self, AppError> {
        let id = header_uuid(headers, "X-User-Id")?;
        let organization_id = header_uuid(headers, "X-Organization-Id")?;
        let is_staff = headers
            .get("X-User-Staff")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            id,
            organization_id,
            is_staff,
        })
    }
}

fn header_uuid(headers: &HeaderMap, name: &str) -> Result<Uuid, AppError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or_else(|| AppError::Unauthorized(format!("missing or invalid {} header", name)))
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, AppError>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Self::from_headers(req.headers()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn extracts_identity_from_headers() {
        let user_id = Uuid::new_v4();
        let org_id = Uuid::new_v4();
        let req = TestRequest::default()
            .insert_header(("X-User-Id", user_id.to_string()))
            .insert_header(("X-Organization-Id", org_id.to_string()))
            .insert_header(("X-User-Staff", "true"))
            .to_http_request();

        let user = AuthenticatedUser::from_headers(req.headers()).unwrap();
        assert_eq!(user.id, user_id);
        assert_eq!(user.organization_id, org_id);
        assert!(user.is_staff);
    }

    #[test]
    fn missing_headers_are_unauthorized() {
        let req = TestRequest::default().to_http_request();
        assert!(AuthenticatedUser::from_headers(req.headers()).is_err());
    }

    #[test]
    fn staff_defaults_to_false() {
        let req = TestRequest::default()
            .insert_header(("X-User-Id", Uuid::new_v4().to_string()))
            .insert_header(("X-Organization-Id", Uuid::new_v4().to_string()))
            .to_http_request();

        let user = AuthenticatedUser::from_headers(req.headers()).unwrap();
        assert!(!user.is_staff);
    }
}
