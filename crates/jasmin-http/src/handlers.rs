//! `/ping`, `/send`, `/rate`, `/balance` (§6 "HTTP API (subset,
//! bit-relevant)"). Every handler validates its input down into a
//! `SubmitRequest`/credential lookup and leaves authentication, routing
//! and charging entirely to the Router Core.

use std::collections::HashSet;
use std::sync::OnceLock;

use axum::extract::{FromRequest, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use jasmin_proto::{DlrLevel, DlrMethod, JasminError};
use jasmin_router::{DlrRequest, DlrRequestOriginator, SubmitRequest};
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;

use crate::error::HttpError;
use crate::state::AppState;

pub async fn ping() -> &'static str {
    "Jasmin/PONG"
}

#[derive(Debug, Deserialize)]
pub struct SendForm {
    pub username: String,
    pub password: String,
    pub to: String,
    pub from: Option<String>,
    pub content: Option<String>,
    #[serde(rename = "hex-content")]
    pub hex_content: Option<String>,
    #[serde(default)]
    pub coding: Option<u8>,
    pub priority: Option<u8>,
    pub sdt: Option<String>,
    #[serde(rename = "validity-period")]
    pub validity_period: Option<u64>,
    pub dlr: Option<String>,
    #[serde(rename = "dlr-url")]
    pub dlr_url: Option<String>,
    #[serde(rename = "dlr-level")]
    pub dlr_level: Option<u8>,
    #[serde(rename = "dlr-method")]
    pub dlr_method: Option<String>,
    pub tags: Option<String>,
    /// Accepted for form compatibility but not forwarded anywhere:
    /// `smpp-pdu` does not model arbitrary optional TLVs.
    pub custom_tlvs: Option<String>,
}

/// `/send` accepts either a form body or a JSON body with the same field
/// names (§6); the content-type decides which axum extractor parses it.
pub struct SendPayload(pub SendForm);

impl<S> FromRequest<S> for SendPayload
where
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));

        let invalid = |message: String| HttpError(JasminError::Validation { field: "body".to_string(), message });

        if is_json {
            let Json(form) = Json::<SendForm>::from_request(req, state)
                .await
                .map_err(|e| invalid(e.to_string()))?;
            Ok(SendPayload(form))
        } else {
            let Form(form) = Form::<SendForm>::from_request(req, state)
                .await
                .map_err(|e| invalid(e.to_string()))?;
            Ok(SendPayload(form))
        }
    }
}

fn sdt_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{16}[R+-]$").expect("constant sdt pattern is valid"))
}

fn invalid(field: &str, message: impl Into<String>) -> HttpError {
    HttpError(JasminError::Validation {
        field: field.to_string(),
        message: message.into(),
    })
}

fn build_submit_request(form: SendForm) -> Result<SubmitRequest, HttpError> {
    let priority = form.priority.unwrap_or(0);
    if priority > 3 {
        return Err(invalid("priority", "must be 0..=3"));
    }

    if let Some(sdt) = &form.sdt {
        if !sdt_pattern().is_match(sdt) {
            return Err(invalid("sdt", "must match ^\\d{16}[R+-]$"));
        }
    }

    let content = match (&form.content, &form.hex_content) {
        (Some(text), _) => text.clone().into_bytes(),
        (None, Some(hex_body)) => hex::decode(hex_body).map_err(|e| invalid("hex-content", e.to_string()))?,
        (None, None) => return Err(invalid("content", "either content or hex-content is required")),
    };

    let tags = match &form.tags {
        None => HashSet::new(),
        Some(raw) if raw.is_empty() => HashSet::new(),
        Some(raw) => raw
            .split(',')
            .map(|t| t.trim().parse::<i64>().map_err(|_| invalid("tags", format!("not an integer tag: {t}"))))
            .collect::<Result<HashSet<i64>, HttpError>>()?,
    };

    let dlr = match form.dlr.as_deref() {
        Some("yes") => {
            let url = form.dlr_url.clone().ok_or_else(|| invalid("dlr-url", "required when dlr=yes"))?;
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(invalid("dlr-url", "must be an http(s) URL"));
            }
            let level = match form.dlr_level.and_then(DlrLevel::from_u8) {
                Some(level) => level,
                None => return Err(invalid("dlr-level", "must be 1, 2 or 3")),
            };
            let method = match form.dlr_method.as_deref() {
                Some("GET") => DlrMethod::Get,
                Some("POST") => DlrMethod::Post,
                _ => return Err(invalid("dlr-method", "must be GET or POST")),
            };
            Some(DlrRequest {
                level,
                originator: DlrRequestOriginator::Http { url, method },
            })
        }
        Some("no") | None => None,
        Some(_) => return Err(invalid("dlr", "must be yes or no")),
    };

    Ok(SubmitRequest {
        username: form.username,
        password: form.password,
        source_addr: form.from,
        destination_addr: form.to,
        content,
        dlr,
        priority,
        validity_period_secs: form.validity_period,
        schedule_delivery_time: form.sdt,
        tags,
    })
}

pub async fn send(State(state): State<AppState>, SendPayload(form): SendPayload) -> Result<Response, HttpError> {
    let req = build_submit_request(form)?;
    let outcome = state.router.submit(req).await?;
    Ok((StatusCode::OK, format!("Success \"{}\"", outcome.message_id)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct RateQuery {
    pub username: String,
    pub password: String,
    pub to: String,
    pub content: Option<String>,
    pub tags: Option<String>,
}

pub async fn rate(State(state): State<AppState>, Query(q): Query<RateQuery>) -> Result<Response, HttpError> {
    let form = SendForm {
        username: q.username,
        password: q.password,
        to: q.to,
        from: None,
        content: Some(q.content.unwrap_or_default()),
        hex_content: None,
        coding: None,
        priority: None,
        sdt: None,
        validity_period: None,
        dlr: None,
        dlr_url: None,
        dlr_level: None,
        dlr_method: None,
        tags: q.tags,
        custom_tlvs: None,
    };
    let req = build_submit_request(form)?;
    let quote = state.router.rate(&req).await?;
    Ok(Json(serde_json::json!({
        "submit_sm_count": quote.submit_sm_count,
        "unit_rate": quote.unit_rate.to_f64().unwrap_or_default(),
    }))
    .into_response())
}

#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    pub username: String,
    pub password: String,
}

pub async fn balance(State(state): State<AppState>, Query(q): Query<BalanceQuery>) -> Result<Response, HttpError> {
    let credential = state.router.balance(&q.username, &q.password).await?;
    let balance = match credential.balance.0 {
        Some(value) => serde_json::json!(value.to_f64().unwrap_or_default()),
        None => serde_json::json!("ND"),
    };
    let sms_count = match credential.submit_sm_count.0 {
        Some(value) => serde_json::json!(value),
        None => serde_json::json!("ND"),
    };
    Ok(Json(serde_json::json!({ "balance": balance, "sms_count": sms_count })).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_form() -> SendForm {
        SendForm {
            username: "u1".to_string(),
            password: "secret".to_string(),
            to: "5678".to_string(),
            from: Some("1234".to_string()),
            content: Some("hello".to_string()),
            hex_content: None,
            coding: None,
            priority: None,
            sdt: None,
            validity_period: None,
            dlr: None,
            dlr_url: None,
            dlr_level: None,
            dlr_method: None,
            tags: None,
            custom_tlvs: None,
        }
    }

    #[test]
    fn plain_content_submit_request_builds() {
        let req = build_submit_request(base_form()).map_err(|_| ()).unwrap();
        assert_eq!(req.content.as_slice(), b"hello");
        assert!(req.dlr.is_none());
    }

    #[test]
    fn hex_content_is_decoded() {
        let mut form = base_form();
        form.content = None;
        form.hex_content = Some("68656c6c6f".to_string());
        let req = build_submit_request(form).map_err(|_| ()).unwrap();
        assert_eq!(req.content.as_slice(), b"hello");
    }

    #[test]
    fn missing_content_is_a_validation_error() {
        let mut form = base_form();
        form.content = None;
        assert!(build_submit_request(form).is_err());
    }

    #[test]
    fn priority_out_of_range_is_rejected() {
        let mut form = base_form();
        form.priority = Some(9);
        assert!(build_submit_request(form).is_err());
    }

    #[test]
    fn bad_sdt_is_rejected() {
        let mut form = base_form();
        form.sdt = Some("not-an-sdt".to_string());
        assert!(build_submit_request(form).is_err());
    }

    #[test]
    fn valid_sdt_is_accepted() {
        let mut form = base_form();
        form.sdt = Some("1234567890123456R".to_string());
        let req = build_submit_request(form).map_err(|_| ()).unwrap();
        assert_eq!(req.schedule_delivery_time.as_deref(), Some("1234567890123456R"));
    }

    #[test]
    fn dlr_yes_without_url_is_rejected() {
        let mut form = base_form();
        form.dlr = Some("yes".to_string());
        assert!(build_submit_request(form).is_err());
    }

    #[test]
    fn dlr_yes_with_full_fields_builds_a_dlr_request() {
        let mut form = base_form();
        form.dlr = Some("yes".to_string());
        form.dlr_url = Some("http://h/r".to_string());
        form.dlr_level = Some(1);
        form.dlr_method = Some("POST".to_string());
        let req = build_submit_request(form).map_err(|_| ()).unwrap();
        let dlr = req.dlr.expect("dlr requested");
        assert_eq!(dlr.level, DlrLevel::Both);
        match dlr.originator {
            DlrRequestOriginator::Http { method, .. } => assert_eq!(method, DlrMethod::Post),
            DlrRequestOriginator::Smpp { .. } => panic!("expected http originator"),
        }
    }

    #[test]
    fn tags_parse_into_i64_set() {
        let mut form = base_form();
        form.tags = Some("1, 2,3".to_string());
        let req = build_submit_request(form).map_err(|_| ()).unwrap();
        assert_eq!(req.tags, [1, 2, 3].into_iter().collect());
    }
}
