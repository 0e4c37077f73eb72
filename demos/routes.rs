use arena_web::{
    handler_fn, limits::ServerLimits, Context, Handler, HandlerFuture, Router, Server, Signal,
    StatusCode,
};
use std::{fs::File, time::Duration};

struct Sleep(Duration);

impl Handler for Sleep {
    fn handle<'a>(&'a self, ctx: &'a mut Context<'_>) -> HandlerFuture<'a> {
        Box::pin(async move {
            tokio::time::sleep(self.0).await;
            ctx.no_content(StatusCode::Ok);
            Signal::Respond
        })
    }
}

#[tokio::main]
async fn main() {
    let mut router = Router::new();
    router
        .register_route(
            "GET:/",
            handler_fn(|ctx| {
                let served = File::open("index.html")
                    .and_then(|file| ctx.stream(StatusCode::Ok, "text/html", file).map(drop));

                if served.is_err() {
                    ctx.html(StatusCode::NotFound, "index.html is missing");
                }
                Signal::Respond
            }),
        )
        .register_route(
            "GET:/hello",
            handler_fn(|ctx| {
                let name = ctx.query_param(b"name").unwrap_or_default();
                ctx.html_with(StatusCode::Ok, |w| {
                    w.append_text("Hello ");
                    w.write(name);
                });
                Signal::Respond
            }),
        )
        .register_route("GET:/sleep", Sleep(Duration::from_secs(10)))
        .register_route(
            "POST:/concat",
            handler_fn(|ctx| {
                let first = ctx.form_value(b"1").unwrap_or_default();
                let second = ctx.form_value(b"2").unwrap_or_default();
                ctx.html_with(StatusCode::Ok, |w| {
                    w.write(first);
                    w.write(second);
                });
                Signal::Respond
            }),
        )
        .register_route(
            "GET",
            handler_fn(|ctx| {
                ctx.html(StatusCode::NotFound, "Not found");
                Signal::Respond
            }),
        );

    println!("{router}");

    Server::builder()
        .listener(Server::bind("127.0.0.1:12345", &ServerLimits::default()).unwrap())
        .router(router)
        .build()
        .launch()
        .await;
}
