//! Static files under `/static/`.
//!
//! The binder mounts this handler on `/static/` and `/static/{*file}`; the
//! `/static` prefix is stripped and the remainder resolved inside the static
//! directory. Only plain relative segments are accepted.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use http::StatusCode;
use tracing::debug;

use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::request::Request;
use crate::response::{ContentType, Response};

pub(crate) const MOUNT: &str = "/static/";
pub(crate) const PARAM: &str = "file";

/// A handler serving files from `root`.
pub(crate) fn handler(root: PathBuf) -> BoxedHandler {
    let root: Arc<Path> = Arc::from(root);
    (move |req: Request| {
        let root = Arc::clone(&root);
        async move {
            let res = serve(&root, req.param(PARAM).unwrap_or("")).await;
            if req.method() == Method::Head { res.without_body() } else { res }
        }
    })
    .into_boxed_handler()
}

async fn serve(root: &Path, file: &str) -> Response {
    let Some(relative) = sanitize(file) else {
        return Response::status(StatusCode::BAD_REQUEST);
    };
    let mut target = root.join(relative);
    if file.is_empty() || file.ends_with('/') {
        target.push("index.html");
    }

    match tokio::fs::read(&target).await {
        Ok(bytes) => {
            let content_type = target
                .extension()
                .and_then(|e| e.to_str())
                .map_or(ContentType::OctetStream, ContentType::from_extension);
            Response::builder().bytes(content_type, bytes)
        }
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::IsADirectory) => {
            Response::status(StatusCode::NOT_FOUND)
        }
        Err(e) => {
            debug!(path = %target.display(), "static read failed: {e}");
            Response::status(StatusCode::NOT_FOUND)
        }
    }
}

/// `None` when `file` tries to leave the static directory.
fn sanitize(file: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in Path::new(file).components() {
        match component {
            Component::Normal(segment) => out.push(segment),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_is_rejected() {
        assert_eq!(sanitize("css/site.css"), Some(PathBuf::from("css/site.css")));
        assert_eq!(sanitize("./a.js"), Some(PathBuf::from("a.js")));
        assert_eq!(sanitize("../secret"), None);
        assert_eq!(sanitize("a/../../secret"), None);
        assert_eq!(sanitize("/etc/passwd"), None);
    }
}
