//! Success envelope and JSON views of stored documents.
//!
//! ```json
//! { "statusCode": 200, "data": { "_id": "65f0a1b2c3d4e5f607182930", "createdAt": "2024-03-12T10:00:00Z" } }
//! ```
//!
//! Entities hold BSON identifiers and dates, which serde_json would print
//! as extended JSON (`{"$oid": ...}`). [`to_view`] flattens them into hex
//! strings and RFC 3339 timestamps.

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use mongodb::bson::{self, Bson};
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::core::errors::{AppResult, ErrorContext};

fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(id) => Value::String(id.to_hex()),
        Bson::DateTime(date) => match date.try_to_rfc3339_string() {
            Ok(text) => Value::String(text),
            Err(_) => Value::from(date.timestamp_millis()),
        },
        Bson::Document(document) => Value::Object(
            document
                .into_iter()
                .map(|(key, value)| (key, bson_to_json(value)))
                .collect::<Map<String, Value>>(),
        ),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        Bson::String(text) => Value::String(text),
        Bson::Boolean(flag) => Value::Bool(flag),
        Bson::Int32(n) => Value::from(n),
        Bson::Int64(n) => Value::from(n),
        Bson::Double(n) => Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null),
        Bson::Null | Bson::Undefined => Value::Null,
        other => other.into_relaxed_extjson(),
    }
}

/// Serializes `value` for the HTTP surface.
pub fn to_view<T: Serialize>(value: &T) -> AppResult<Value> {
    let bson = bson::to_bson(value).context("Failed to serialize response")?;
    Ok(bson_to_json(bson))
}

/// `{statusCode, data}` success envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status_code: u16,
    pub data: Value,
}

impl ApiResponse {
    pub fn new<T: Serialize>(status: StatusCode, data: &T) -> AppResult<Self> {
        Ok(Self {
            status_code: status.as_u16(),
            data: to_view(data)?,
        })
    }

    fn respond<T: Serialize>(status: StatusCode, data: &T) -> AppResult<HttpResponse> {
        Ok(HttpResponse::build(status).json(Self::new(status, data)?))
    }

    /// 200 with `data`.
    pub fn ok<T: Serialize>(data: &T) -> AppResult<HttpResponse> {
        Self::respond(StatusCode::OK, data)
    }

    /// 201 with `data`.
    pub fn created<T: Serialize>(data: &T) -> AppResult<HttpResponse> {
        Self::respond(StatusCode::CREATED, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, oid::ObjectId, DateTime};

    #[test]
    fn test_view_flattens_bson_types() {
        let id = ObjectId::parse_str("65f0a1b2c3d4e5f607182930").unwrap();
        let value = doc! {
            "_id": id,
            "createdAt": DateTime::from_millis(0),
            "rating": { "average": 4.5, "count": 2_i64 },
            "services": [id],
        };

        let view = to_view(&value).unwrap();
        assert_eq!(view["_id"], "65f0a1b2c3d4e5f607182930");
        assert_eq!(view["createdAt"], "1970-01-01T00:00:00Z");
        assert_eq!(view["rating"]["average"], 4.5);
        assert_eq!(view["rating"]["count"], 2);
        assert_eq!(view["services"][0], "65f0a1b2c3d4e5f607182930");
    }

    #[test]
    fn test_envelope_shape() {
        let response = ApiResponse::new(StatusCode::CREATED, &doc! { "name": "Acme" }).unwrap();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["statusCode"], 201);
        assert_eq!(json["data"]["name"], "Acme");
    }
}
