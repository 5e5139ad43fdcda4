use std::fmt;

use futures::stream::{BoxStream, StreamExt};
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{Response, StatusCode};
use porter_collection::GatewayError;
use serde::Serialize;

/// Body of a gateway response: either fully buffered or produced lazily.
pub enum ResponseBody {
    Full(Vec<u8>),
    Stream(BoxStream<'static, Result<Vec<u8>, GatewayError>>),
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            ResponseBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl ResponseBody {
    /// Drain the body into memory. Stream errors are returned as-is.
    pub async fn collect(self) -> Result<Vec<u8>, GatewayError> {
        match self {
            ResponseBody::Full(bytes) => Ok(bytes),
            ResponseBody::Stream(mut stream) => {
                let mut out = Vec::new();
                while let Some(chunk) = stream.next().await {
                    out.extend_from_slice(&chunk?);
                }
                Ok(out)
            }
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ResponseBody::Full(bytes) => Some(bytes),
            ResponseBody::Stream(_) => None,
        }
    }
}

pub type GatewayResponse = Response<ResponseBody>;

pub fn json_response(status: StatusCode, body: impl Into<Vec<u8>>) -> GatewayResponse {
    let mut response = Response::new(ResponseBody::Full(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

pub fn error_response(status: StatusCode, message: &str) -> GatewayResponse {
    let body = serde_json::json!({ "error": message });
    json_response(status, body.to_string().into_bytes())
}

/// Serialize `value` as a JSON response, falling back to a 500 on failure.
pub fn json_ok<T: Serialize>(status: StatusCode, value: &T) -> GatewayResponse {
    match serde_json::to_vec(value) {
        Ok(body) => json_response(status, body),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// A streaming response with the given content type.
pub fn stream_response(
    content_type: &str,
    stream: BoxStream<'static, Result<Vec<u8>, GatewayError>>,
) -> Result<GatewayResponse, GatewayError> {
    let mut response = Response::new(ResponseBody::Stream(stream));
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_str(content_type).map_err(GatewayError::internal)?,
    );
    Ok(response)
}

/// `attachment; filename="..."`, keeping printable ASCII other than quotes
/// from the name.
pub fn attachment(filename: &str) -> Result<HeaderValue, GatewayError> {
    let safe: String = filename
        .chars()
        .filter(|c| (c.is_ascii_graphic() || *c == ' ') && *c != '"' && *c != '\\')
        .collect();
    HeaderValue::from_str(&format!("attachment; filename=\"{safe}\""))
        .map_err(GatewayError::internal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn error_body_shape() {
        let response = error_response(StatusCode::BAD_REQUEST, "Invalid sort: x");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value =
            serde_json::from_slice(response.body().as_bytes().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({ "error": "Invalid sort: x" }));
    }

    #[tokio::test]
    async fn collects_streamed_chunks() {
        let chunks = stream::iter(vec![Ok(b"a,".to_vec()), Ok(b"b".to_vec())]).boxed();
        let body = ResponseBody::Stream(chunks);
        assert_eq!(body.collect().await.unwrap(), b"a,b");
    }

    #[test]
    fn attachment_strips_quotes() {
        let value = attachment("my \"books\".csv").unwrap();
        assert_eq!(value.to_str().unwrap(), "attachment; filename=\"my books.csv\"");
    }
}
