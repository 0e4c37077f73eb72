use arena_web::{
    content_type_boundary, limits::{ReqLimits, ServerLimits}, Context, Handler, HandlerFuture,
    MultipartForm, Pairs, Router, Server, Signal, StatusCode,
};
use std::fmt::Write;

/// Lists every field and file of a multipart upload.
///
/// Works both for plain requests and for clients sending
/// `Expect: 100-continue` (e.g. `curl -F file=@big.bin`).
struct Summary;

impl Handler for Summary {
    fn handle<'a>(&'a self, ctx: &'a mut Context<'_>) -> HandlerFuture<'a> {
        Box::pin(async move {
            let body = match ctx.continue_body().await {
                Ok(body) => body,
                Err(_) => return Signal::Sent,
            };

            let content_type = ctx.request_header(b"content-type").unwrap_or_default();
            let Some(boundary) = content_type_boundary(content_type) else {
                ctx.html(StatusCode::BadRequest, "expected multipart/form-data");
                return Signal::Respond;
            };

            let mut values = Pairs::new();
            let form = MultipartForm::parse(&body, boundary, &mut values);

            let mut summary = String::new();
            for (key, value) in values.iter() {
                let _ = writeln!(
                    summary,
                    "value {} = {}",
                    String::from_utf8_lossy(key),
                    String::from_utf8_lossy(value)
                );
            }
            for (field, files) in form.iter() {
                for (filename, content) in files.iter() {
                    let _ = writeln!(
                        summary,
                        "file {} / {} ({} bytes)",
                        String::from_utf8_lossy(field),
                        String::from_utf8_lossy(filename),
                        content.len()
                    );
                }
            }

            ctx.blob(StatusCode::Ok, "text/plain", summary);
            Signal::Respond
        })
    }
}

#[tokio::main]
async fn main() {
    let mut router = Router::new();
    router.register_route("POST:/upload", Summary);

    Server::builder()
        .listener(Server::bind("127.0.0.1:12345", &ServerLimits::default()).unwrap())
        .router(router)
        .request_limits(ReqLimits {
            max_request_size: 64 * 1024 * 1024,
            ..ReqLimits::default()
        })
        .build()
        .launch()
        .await;
}
