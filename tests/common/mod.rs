//! Shared helpers for integration tests: a loopback axum server serving
//! canned documentation pages.

#![allow(dead_code)]

use std::net::{SocketAddr, TcpListener};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use tokio::sync::oneshot;

/// What the stub answers for a path.
#[derive(Clone)]
pub enum Route {
    Html(String),
    Status(u16),
    /// Answer with the page after a pause.
    Slow(Duration, String),
}

async fn respond(route: Route) -> Response {
    match route {
        Route::Html(body) => Html(body).into_response(),
        Route::Status(code) => StatusCode::from_u16(code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
        Route::Slow(delay, body) => {
            tokio::time::sleep(delay).await;
            Html(body).into_response()
        }
    }
}

/// axum server on 127.0.0.1 with one route per page. Unknown paths get 404.
///
/// The server runs on its own thread and runtime so it serves both blocking
/// CLI tests and `#[tokio::test]`s. Dropping the handle shuts it down.
pub struct StubServer {
    addr: SocketAddr,
    _shutdown: oneshot::Sender<()>,
}

impl StubServer {
    pub fn start(routes: Vec<(&str, Route)>) -> Self {
        let app = routes
            .into_iter()
            .fold(Router::new(), |app, (path, route)| {
                app.route(path, get(move || respond(route.clone())))
            });

        let (addr_tx, addr_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("build stub runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind stub listener");
                addr_tx
                    .send(listener.local_addr().expect("stub listener addr"))
                    .expect("report stub address");
                axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = shutdown_rx.await;
                    })
                    .await
                    .expect("stub server run");
            });
        });

        Self {
            addr: addr_rx.recv().expect("stub server address"),
            _shutdown: shutdown_tx,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

/// A URL on a loopback port nothing listens on.
pub fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind free port");
    let addr = listener.local_addr().expect("free port address");
    drop(listener);
    format!("http://{addr}/gone")
}

/// A documentation page in the shape the test docsets select from.
pub fn page(title: &str, body: &str) -> String {
    format!(
        "<html><head><title>{title}</title></head><body>\
         <nav><a href=\"/\">Home</a> <a href=\"/docs\">Docs navigation menu</a></nav>\
         <main><h1>{title}</h1><p>{body}</p></main>\
         <footer>Copyright footer text that should never be indexed</footer>\
         </body></html>"
    )
}

/// Page A of the demo docset.
pub fn widget_page_a() -> String {
    page("Widget Basics", "The Widget API lets you create widgets.")
}

/// Page B of the demo docset.
pub fn widget_page_b() -> String {
    page(
        "Creating Widgets",
        "Widgets are created via the Widget API; see examples.",
    )
}

/// A `config.toml` with one user docset named `name` crawling `entry_points`.
pub fn docset_config(data_dir: &std::path::Path, docsets: &[(&str, Vec<String>)]) -> String {
    let mut config = format!(
        "data_dir = \"{}\"\n\n[crawl]\nconcurrency = 2\ntimeout_secs = 1\nproxy = false\n",
        data_dir.display()
    );
    for (name, entry_points) in docsets {
        let entries: Vec<String> = entry_points.iter().map(|u| format!("\"{u}\"")).collect();
        config.push_str(&format!(
            "\n[[docsets]]\nname = \"{name}\"\ndescription = \"{name} test docs\"\n\
             base_url = \"http://127.0.0.1\"\nentry_points = [{}]\n\n\
             [docsets.selectors]\ntitle = \"h1, h2\"\ncontent = \"main\"\nexclude = \"nav, footer\"\n",
            entries.join(", ")
        ));
    }
    config
}
