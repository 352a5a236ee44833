use serde::Serialize;

pub(crate) fn warning_hint(code: &'static str) -> Option<&'static str> {
    match code {
        "arxiv_xml_parse_failed_partial" => Some(
            "The arXiv Atom feed could not be parsed to the end; papers listed are the ones parsed before the error. Retry, or lower fetch_size.",
        ),
        "storage_insecure_tls_unsupported" => Some(
            "OPUS_MCP_INSECURE_SKIP_VERIFY only affects downloads; the S3 client still verifies certificates. Use a trusted certificate or http:// for local MinIO.",
        ),
        _ => None,
    }
}

pub(crate) fn warning_hints_from(codes: &[&'static str]) -> serde_json::Value {
    let mut m = serde_json::Map::new();
    for c in codes {
        if let Some(h) = warning_hint(c) {
            m.insert((*c).to_string(), serde_json::json!(h));
        }
    }
    serde_json::Value::Object(m)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    InvalidParams,
    NotConfigured,
    FetchFailed,
    ParseFailed,
    StorageFailed,
    UnexpectedError,
}

impl ErrorCode {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::InvalidParams => "invalid_params",
            Self::NotConfigured => "not_configured",
            Self::FetchFailed => "fetch_failed",
            Self::ParseFailed => "parse_failed",
            Self::StorageFailed => "storage_failed",
            Self::UnexpectedError => "unexpected_error",
        }
    }

    pub(crate) fn retryable(self) -> bool {
        match self {
            Self::FetchFailed => true,
            // Missing buckets, bad input and config need a change before a retry helps.
            Self::InvalidParams
            | Self::NotConfigured
            | Self::ParseFailed
            | Self::StorageFailed
            | Self::UnexpectedError => false,
        }
    }

    pub(crate) fn for_error(e: &opus_core::Error) -> Self {
        use opus_core::Error;
        match e {
            Error::InvalidInput(_) | Error::InvalidUrl(_) | Error::Expression(_) => {
                Self::InvalidParams
            }
            Error::NotConfigured(_) => Self::NotConfigured,
            Error::Fetch(_) => Self::FetchFailed,
            Error::Parse(_) => Self::ParseFailed,
            Error::Storage(_) => Self::StorageFailed,
        }
    }
}

pub(crate) fn add_envelope_fields(payload: &mut serde_json::Value, kind: &str, elapsed_ms: u128) {
    payload["schema_version"] = serde_json::json!(super::SCHEMA_VERSION);
    payload["kind"] = serde_json::json!(kind);
    payload["elapsed_ms"] = serde_json::json!(elapsed_ms);
    // `request` is always present (null or object) so clients need not branch on absence.
    if payload.get("request").is_none() {
        payload["request"] = serde_json::Value::Null;
    }
}

pub(crate) fn error_obj(
    code: ErrorCode,
    message: impl ToString,
    hint: impl ToString,
) -> serde_json::Value {
    #[derive(Serialize)]
    struct ErrorObject {
        code: &'static str,
        message: String,
        hint: String,
        retryable: bool,
    }

    let e = ErrorObject {
        code: code.as_str(),
        message: message.to_string(),
        hint: hint.to_string(),
        retryable: code.retryable(),
    };
    match serde_json::to_value(e) {
        Ok(v) => v,
        Err(_) => serde_json::json!({
            "code": code.as_str(),
            "message": message.to_string(),
            "hint": hint.to_string(),
            "retryable": code.retryable()
        }),
    }
}
