use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Redirect, Response};

use crate::error::AppError;
use crate::services::resolver::Resolved;
use crate::storage::BlobPayload;
use crate::AppState;

/// Fallback handler: any unmatched path is treated as a file locator and run
/// through the retrieval-resolution chain.
pub async fn serve_file(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return AppError::NotFound("not found".to_string()).into_response();
    }

    match state.resolver.resolve(uri.path()).await {
        Ok(Resolved::Bytes {
            payload,
            content_type,
            cache_control,
            inline,
            file_name,
        }) => {
            let mut builder = Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type);

            if let Some(cache) = cache_control {
                builder = builder.header(header::CACHE_CONTROL, cache);
            }

            let disposition = if inline {
                "inline".to_string()
            } else {
                format!(
                    "attachment; filename=\"{}\"",
                    sanitize_filename(file_name.as_deref().unwrap_or("download"))
                )
            };
            builder = builder.header(header::CONTENT_DISPOSITION, disposition);

            let body = match payload {
                BlobPayload::Buffered(bytes) => Body::from(bytes),
                BlobPayload::Stream(stream) => Body::from_stream(stream),
            };

            builder
                .body(body)
                .unwrap_or_else(|e| AppError::Internal(e.to_string()).into_response())
        }
        Ok(Resolved::Redirect(url)) => Redirect::temporary(&url).into_response(),
        Ok(Resolved::NotFound) => {
            AppError::NotFound(format!("no file at {}", uri.path())).into_response()
        }
        Err(e) => e.into_response(),
    }
}

fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_graphic() && !matches!(c, '"' | ';' | '\\'))
        .collect();
    if cleaned.is_empty() {
        "download".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_sanitizing_strips_header_breakers() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("a\"b;c\\d.txt"), "abcd.txt");
        assert_eq!(sanitize_filename("图片"), "download");
    }
}
