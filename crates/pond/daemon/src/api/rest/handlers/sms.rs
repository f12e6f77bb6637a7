//! SMS webhook handlers

use crate::api::rest::state::{AppState, Interpreter};
use crate::api::rest::twiml;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Form,
};
use pond_engine::PondResult;
use pond_types::PhoneHandle;
use serde::Deserialize;

/// Opt-out keyword the carrier reports for a member unsubscribing.
const OPT_OUT_STOP: &str = "STOP";

/// Fields of an inbound message webhook
#[derive(Debug, Clone, Deserialize)]
pub struct InboundSms {
    #[serde(rename = "Body", default)]
    pub body: String,

    #[serde(rename = "From")]
    pub from: String,

    #[serde(rename = "OptOutType", default)]
    pub opt_out_type: Option<String>,
}

/// Inbound message delivered as a form body
pub async fn receive_sms_form(
    State(state): State<AppState>,
    Form(sms): Form<InboundSms>,
) -> ApiResult<Response> {
    receive_sms(state, sms).await
}

/// Inbound message delivered as query parameters
pub async fn receive_sms_query(
    State(state): State<AppState>,
    Query(sms): Query<InboundSms>,
) -> ApiResult<Response> {
    receive_sms(state, sms).await
}

async fn receive_sms(state: AppState, sms: InboundSms) -> ApiResult<Response> {
    let from = sms.from.trim();
    if from.is_empty() {
        return Err(ApiError::BadRequest("missing From".into()));
    }
    let from = PhoneHandle::new(from);

    // The command runs to completion even when the webhook stops waiting.
    let interpreter = state.interpreter.clone();
    let work = tokio::spawn(async move { dispatch(&interpreter, &from, &sms).await });

    let reply = tokio::time::timeout(state.request_timeout, work)
        .await
        .map_err(|_| {
            tracing::warn!(timeout = ?state.request_timeout, "sms webhook timed out");
            ApiError::Timeout("request exceeded its time budget".into())
        })?
        .map_err(|err| ApiError::Internal(format!("sms handler failed: {err}")))??;

    Ok(xml(twiml::render(reply.as_deref())))
}

async fn dispatch(
    interpreter: &Interpreter,
    from: &PhoneHandle,
    sms: &InboundSms,
) -> PondResult<Option<String>> {
    match sms.opt_out_type.as_deref().filter(|kind| !kind.is_empty()) {
        Some(OPT_OUT_STOP) => {
            interpreter.opt_out(from).await?;
            Ok(None)
        }
        // Other opt-out keywords are handled by the carrier.
        Some(_) => Ok(None),
        None => Ok(interpreter.respond(from, &sms.body).await),
    }
}

fn xml(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/xml")], body).into_response()
}
