use http::StatusCode;
use http::header::{ACCESS_CONTROL_EXPOSE_HEADERS, CONTENT_DISPOSITION, HeaderValue};
use porter_collection::{ActionResult, GatewayError, ResultFormat};
use porter_http::{GatewayResponse, attachment, json_ok, stream_response};
use serde_json::{Map, Value, json};

/// Turn an action result into its wire response.
pub fn dispatch(result: ActionResult) -> Result<GatewayResponse, GatewayError> {
    Ok(match result {
        ActionResult::Success(success) => {
            let mut body = Map::new();
            body.insert("success".into(), json!(success.message));
            if success.format == ResultFormat::Html {
                body.insert("html".into(), json!(success.message));
            }
            body.insert(
                "refresh".into(),
                json!({ "relationships": success.invalidated }),
            );
            json_ok(StatusCode::OK, &Value::Object(body))
        }
        ActionResult::Error(error) => {
            let mut body = Map::new();
            body.insert("error".into(), json!(error.message));
            if let Some(html) = error.html {
                body.insert("html".into(), json!(html));
            }
            json_ok(StatusCode::BAD_REQUEST, &Value::Object(body))
        }
        ActionResult::Webhook(webhook) => json_ok(
            StatusCode::OK,
            &json!({ "webhook": {
                "url": webhook.url,
                "method": webhook.method,
                "headers": webhook.headers,
                "body": webhook.body,
            } }),
        ),
        ActionResult::Redirect(redirect) => {
            json_ok(StatusCode::OK, &json!({ "redirectTo": redirect.path }))
        }
        ActionResult::File(file) => {
            let mut response = stream_response(&file.mime_type, file.stream)?;
            let headers = response.headers_mut();
            headers.insert(CONTENT_DISPOSITION, attachment(&file.name)?);
            headers.insert(
                ACCESS_CONTROL_EXPOSE_HEADERS,
                HeaderValue::from_static("content-disposition"),
            );
            response
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use futures::stream;
    use porter_collection::{ErrorResult, SuccessResult};
    use std::collections::BTreeSet;

    fn body(response: &GatewayResponse) -> Value {
        serde_json::from_slice(response.body().as_bytes().unwrap()).unwrap()
    }

    #[test]
    fn success_lists_invalidated_relations() {
        let response = dispatch(ActionResult::Success(SuccessResult {
            message: "<b>Restocked</b>".into(),
            format: ResultFormat::Html,
            invalidated: BTreeSet::from(["shelf_slots".to_string()]),
        }))
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body(&response),
            json!({
                "success": "<b>Restocked</b>",
                "html": "<b>Restocked</b>",
                "refresh": { "relationships": ["shelf_slots"] },
            })
        );
    }

    #[test]
    fn error_is_a_bad_request() {
        let response = dispatch(ActionResult::Error(ErrorResult {
            message: "Out of stock".into(),
            html: None,
        }))
        .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&response), json!({ "error": "Out of stock" }));
    }

    #[test]
    fn redirect() {
        let response = dispatch(ActionResult::redirect("/books/1")).unwrap();
        assert_eq!(body(&response), json!({ "redirectTo": "/books/1" }));
    }

    #[tokio::test]
    async fn file_streams_with_attachment_headers() {
        let chunks = stream::iter(vec![Ok(b"id\n".to_vec()), Ok(b"1\n".to_vec())]).boxed();
        let response = dispatch(ActionResult::file("x.csv", "text/csv", chunks)).unwrap();

        let headers = response.headers();
        assert_eq!(headers["content-disposition"], "attachment; filename=\"x.csv\"");
        assert_eq!(headers["content-type"], "text/csv");
        assert_eq!(headers["access-control-expose-headers"], "content-disposition");
        assert_eq!(response.into_body().collect().await.unwrap(), b"id\n1\n");
    }
}
