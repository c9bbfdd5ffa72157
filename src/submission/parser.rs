use axum::http::HeaderMap;
use bytes::Bytes;
use serde_json::{Map, Value};

/// Parse a posted form into its field map, based on the Content-Type header.
/// Bodies that do not decode to a flat object of fields are rejected.
pub async fn parse_form(headers: &HeaderMap, body: Bytes) -> Result<Map<String, Value>, String> {
    let content_type = headers.get("content-type").and_then(|v| v.to_str().ok());

    let value = match content_type {
        Some(ct) if ct.contains("multipart/form-data") => parse_multipart(ct, body).await?,
        Some(ct) if ct.contains("application/x-www-form-urlencoded") => parse_urlencoded(&body),
        Some(ct) if ct.contains("application/json") => {
            serde_json::from_slice(&body).map_err(|e| format!("Invalid JSON: {e}"))?
        }
        _ => serde_json::from_slice(&body).unwrap_or_else(|_| parse_urlencoded(&body)),
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Err("Form body must be an object of fields".to_string()),
    }
}

/// Repeated keys keep the last value, like a browser-posted form.
fn parse_urlencoded(body: &[u8]) -> Value {
    let map: Map<String, Value> = form_urlencoded::parse(body)
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect();
    Value::Object(map)
}

async fn parse_multipart(content_type: &str, body: Bytes) -> Result<Value, String> {
    let boundary =
        multer::parse_boundary(content_type).map_err(|_| "Missing multipart boundary".to_string())?;

    let stream = futures_util::stream::once(async { Ok::<_, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut map = Map::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("Multipart error: {e}"))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let value = field
            .text()
            .await
            .map_err(|e| format!("Field read error: {e}"))?;
        map.insert(name, Value::String(value));
    }

    Ok(Value::Object(map))
}
