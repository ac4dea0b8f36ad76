use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// JSON envelope every catalog endpoint wraps its payload in.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductSummary {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductDetail {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategorySummary {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

/// Decode-or-fail-gracefully: a malformed body is a check failure at the
/// call site, never an abort.
pub fn decode<T: DeserializeOwned>(body: &Bytes) -> Option<Envelope<T>> {
    serde_json::from_slice(body).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_product_list_envelope() {
        let body = Bytes::from_static(
            br#"{"data":[{"id":1,"name":"Laptop","status":"ACTIVE"},{"id":2}]}"#,
        );
        let Some(envelope) = decode::<Vec<ProductSummary>>(&body) else {
            panic!("expected a decodable envelope");
        };
        assert_eq!(envelope.data.len(), 2);
        assert_eq!(envelope.data[0].id, 1);
        assert_eq!(envelope.data[0].name.as_deref(), Some("Laptop"));
        assert_eq!(envelope.data[1].name, None);
    }

    #[test]
    fn missing_data_field_fails_to_decode() {
        let body = Bytes::from_static(br#"{"items":[]}"#);
        assert!(decode::<Vec<ProductSummary>>(&body).is_none());
    }

    #[test]
    fn invalid_json_fails_to_decode() {
        let body = Bytes::from_static(b"<html>oops</html>");
        assert!(decode::<Vec<ProductSummary>>(&body).is_none());
        assert!(decode::<serde_json::Value>(&body).is_none());
    }
}
