//! Endpoints spoken by BOINC clients.
//!
//! Both return XML. Protocol errors travel inside the reply document; the
//! HTTP status only distinguishes malformed requests and server failures.

use axum::{
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::{ApiError, AppState};
use crate::protocol::BoincErrorCode;
use crate::protocol::wire;

const XML_CONTENT_TYPE: &str = "application/xml";

const fn status_for(error: Option<BoincErrorCode>) -> StatusCode {
    match error {
        Some(BoincErrorCode::XmlParse) => StatusCode::BAD_REQUEST,
        Some(BoincErrorCode::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
        Some(BoincErrorCode::BadUserName | BoincErrorCode::BadPassword) | None => StatusCode::OK,
    }
}

fn xml(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, XML_CONTENT_TYPE)], body).into_response()
}

/// `POST /boinc/rpc.php`
pub async fn rpc(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response, ApiError> {
    let outcome = state.rpc_service().handle(&body).await;
    let document = wire::encode_reply(&outcome.reply)?;

    Ok(xml(status_for(outcome.error), document))
}

/// `GET /boinc/get_project_config.php`
pub async fn project_config(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let document = wire::encode_project_config(&state.rpc_service().project_config())?;

    Ok(xml(StatusCode::OK, document))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(None), StatusCode::OK);
        assert_eq!(status_for(Some(BoincErrorCode::BadUserName)), StatusCode::OK);
        assert_eq!(status_for(Some(BoincErrorCode::BadPassword)), StatusCode::OK);
        assert_eq!(
            status_for(Some(BoincErrorCode::XmlParse)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(Some(BoincErrorCode::Internal)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
