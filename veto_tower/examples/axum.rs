use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Router};
use http::StatusCode;
use veto::{voter, ActionName, Decision, RoleTester, Roles};
use veto_tower::Authorizer;

/// The per-request authorization context
///
/// A real application would populate this from a session or a verified
/// token; the example just reads `?role=...` from the query string.
#[derive(Clone, Debug, Default)]
struct Visitor {
    role: Option<String>,
}

async fn attach_visitor(mut request: Request, next: Next) -> Response {
    let role = request.uri().query().and_then(|query| {
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix("role=").map(str::to_owned))
    });

    request.extensions_mut().insert(Visitor { role });
    next.run(request).await
}

async fn home() -> &'static str {
    "page for every one can visit"
}

async fn admin() -> &'static str {
    "page only for admin can visit"
}

async fn any(tester: Option<Extension<RoleTester<Visitor>>>) -> Response {
    let Some(Extension(tester)) = tester else {
        return StatusCode::FORBIDDEN.into_response();
    };

    match tester.can(&"admin".parse::<ActionName>().unwrap()).await {
        Ok(true) => "hello admin".into_response(),
        Ok(false) => StatusCode::FORBIDDEN.into_response(),
        Err(error) => {
            eprintln!("voter failed: {error}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[tokio::main]
async fn main() {
    let roles = Roles::new();

    roles.register_for(
        "access home page".parse().unwrap(),
        voter::from_fn(|_: &Visitor, _| Decision::Allow),
    );

    roles.register_for(
        "access admin page".parse().unwrap(),
        voter::from_fn(|v: &Visitor, _| Decision::from(v.role.as_deref() == Some("admin"))),
    );

    // Catch-all: a visitor whose role matches the action name is allowed;
    // anyone else is left to later voters.
    roles.register(voter::from_fn(|v: &Visitor, action| {
        Decision::from((v.role.as_deref() == Some(action.as_str())).then_some(true))
    }));

    let authorizer = Authorizer::new(roles).with_default_error_handler::<axum::body::Body>();

    let app = Router::new()
        .route(
            "/",
            get(home).route_layer(authorizer.can("access home page".parse().unwrap())),
        )
        .route(
            "/admin",
            get(admin).route_layer(authorizer.can("access admin page".parse().unwrap())),
        )
        .route("/any", get(any))
        .layer(authorizer.context_layer())
        .layer(axum::middleware::from_fn(attach_visitor));

    println!("Try:  curl 'http://127.0.0.1:8080/admin?role=admin'");
    println!("Press Ctrl+C to exit");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:8080")
        .await
        .unwrap();
    axum::serve(listener, app).await.unwrap();
}
