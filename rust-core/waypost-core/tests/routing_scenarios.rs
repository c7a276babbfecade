//! End-to-end routing scenarios: registration, matching, context assembly,
//! dispatch and reverse building through the public API.

use http_body_util::Full;
use hyper::body::Bytes;
use serde_json::{Map, Value};
use std::collections::HashMap;
use waypost_core::{
    cleanup_uploads, ActionTable, BuildOptions, Dispatcher, Error, Filter, Method, Negotiator, Request,
    RouteContext, RouteDef, Router, RouterConfig, ViewLoader,
};

fn request(method: Method, uri: &str) -> Request {
    Request::new(method, uri, Vec::<(&str, &str)>::new(), None)
}

fn users_router() -> Router {
    let mut router = Router::default();
    router
        .add(RouteDef::new("/users/:id").name("user").controller("users"))
        .unwrap();
    router
}

#[test]
fn test_match_users_id() {
    let router = users_router();
    let ctx = router.matches(&request(Method::Get, "/users/42")).unwrap().unwrap();

    let params: Vec<_> = ctx.path_params().iter().collect();
    assert_eq!(params, vec![("id", "42")]);
    assert_eq!(ctx.path_segments(), ["users", "42"]);
}

#[test]
fn test_build_users_id() {
    let router = users_router();
    let params = HashMap::from([("id", "42")]);
    assert_eq!(
        router.build("user", &params, BuildOptions::default()).unwrap().as_deref(),
        Some("/users/42")
    );

    let empty: HashMap<&str, &str> = HashMap::new();
    let err = router.build("user", &empty, BuildOptions::default()).unwrap_err();
    assert!(matches!(err, Error::BuildMissingParameter { .. }));
    assert_eq!(err.to_string(), "Building /users/:id is missing: id");

    let slashed = HashMap::from([("id", "a/b")]);
    let err = router.build("user", &slashed, BuildOptions::default()).unwrap_err();
    assert!(matches!(err, Error::BuildInvalidParameter { .. }));
    assert_eq!(router.build("user", &slashed, BuildOptions::lenient()).unwrap(), None);
}

#[test]
fn test_post_only_route_falls_through() {
    let mut router = Router::default();
    router
        .add(RouteDef::new("/users/:id").name("save").methods([Method::Post]).controller("users"))
        .unwrap();
    router.set_default(RouteDef::new("/").name("home").view("home")).unwrap();

    let ctx = router.matches(&request(Method::Get, "/users/42")).unwrap().unwrap();
    assert_eq!(ctx.route().name(), Some("home"));
    assert!(ctx.path_params().is_empty());
}

#[test]
fn test_multipart_put() {
    let dir = std::env::temp_dir();
    let mut router = Router::new(RouterConfig::default().with_upload_dir(&dir));
    router
        .add(RouteDef::new("/profile").methods([Method::Put]).controller("profile"))
        .unwrap();

    let body = [
        "--X",
        "Content-Disposition: form-data; name=\"avatar\"; filename=\"me.png\"",
        "Content-Type: image/png",
        "",
        "PNGDATA",
        "--X",
        "Content-Disposition: form-data; name=\"caption\"",
        "",
        "hi",
        "--X--",
        "",
    ]
    .join("\r\n");
    let req = Request::new(
        Method::Put,
        "/profile",
        [("Content-Type", "multipart/form-data; boundary=X")],
        Some(Bytes::from(body)),
    );

    let ctx = router.matches(&req).unwrap().unwrap();
    assert_eq!(ctx.request_params().get("caption").map(String::as_str), Some("hi"));

    let avatar = ctx.file("avatar").unwrap();
    assert_eq!(avatar.name, "me.png");
    assert_eq!(avatar.mime_type, "image/png");
    assert_eq!(avatar.size, 7);
    assert!(avatar.is_ok());
    assert_eq!(std::fs::read(&avatar.tmp_path).unwrap(), b"PNGDATA");

    cleanup_uploads(ctx.files().values());
    assert!(!avatar.tmp_path.exists());
}

#[test]
fn test_accepts_xml_excluded_by_html() {
    let n = Negotiator::new(None, Some("application/json;q=0.5, text/html"));
    assert!(!n.accepts_xml_with(true));

    let list = Negotiator::new(None, Some("text/html;q=0.8, application/json"))
        .accept_list()
        .unwrap();
    assert_eq!(list[0].0, "application/json");
    assert_eq!(list[1], ("text/html".to_string(), 0.8));
}

#[test]
fn test_duplicate_named_route() {
    let mut router = Router::default();
    router.add(RouteDef::new("/").name("home").view("index")).unwrap();
    router.add(RouteDef::new("/home").name("home").view("home")).unwrap();

    let empty: [(&str, &str); 0] = [];
    for _ in 0..3 {
        assert_eq!(
            router.build("home", &empty, BuildOptions::default()).unwrap().as_deref(),
            Some("/")
        );
    }
    assert_eq!(router.get("home").map(|r| r.uri()), Some("/"));
}

#[test]
fn test_round_trip_through_router() {
    let mut router = Router::default();
    router
        .add(
            RouteDef::new("/archive/:year/:month/:slug")
                .name("post")
                .filter("year", Filter::named("int"))
                .filter("month", Filter::pattern(r"\d{2}"))
                .controller("posts"),
        )
        .unwrap();

    let params = [("year", "2024"), ("month", "03"), ("slug", "spring-notes")];
    let uri = router.build("post", &params, BuildOptions::default()).unwrap().unwrap();
    let ctx = router.matches(&request(Method::Get, &uri)).unwrap().unwrap();

    let matched: Vec<_> = ctx.path_params().iter().collect();
    assert_eq!(matched, params);
}

struct Pages;

impl ViewLoader<String> for Pages {
    fn load(&self, view: &str, data: Map<String, Value>, _status: Option<u16>) -> String {
        format!("{view}:{}", data.get("page").and_then(Value::as_str).unwrap_or("1"))
    }
}

#[test]
fn test_hyper_request_dispatch() {
    let mut router = Router::new(RouterConfig::default().with_base_uri("/app"));
    router.display("/docs", "docs", None, false).unwrap();
    router
        .add(RouteDef::new("/login").methods([Method::Post]).strict(true).controller("auth"))
        .unwrap();

    let dispatcher = Dispatcher::new(|uri: &str| format!("redirect:{uri}"))
        .loader("views", Pages)
        .controller(
            "auth",
            ActionTable::new().on("handle_default", |ctx: &RouteContext| {
                format!("login:{}", ctx.get("user").and_then(|v| v.as_str()).unwrap_or("?"))
            }),
        );

    let docs = hyper::Request::builder()
        .method("GET")
        .uri("/app/docs?page=4")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let docs = tokio_test::block_on(Request::from_hyper(docs, 1024)).unwrap();
    assert_eq!(router.route(&docs, &dispatcher).unwrap(), "docs:4");

    let login = hyper::Request::builder()
        .method("POST")
        .uri("/app/login")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Full::new(Bytes::from("user=ann")))
        .unwrap();
    let login = tokio_test::block_on(Request::from_hyper(login, 1024)).unwrap();
    assert_eq!(router.route(&login, &dispatcher).unwrap(), "login:ann");
}
