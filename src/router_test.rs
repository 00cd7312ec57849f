use super::*;
use crate::guard::routes::{
    DASHBOARD_ROUTE, LOGIN_ROUTE, NOT_FOUND_ROUTE, REDIRECT_QUERY_KEY, RouteMeta, RouteRecord, default_routes,
};
use crate::state::session::{AUTHENTICATED_KEY, SessionStore};
use crate::test_helpers::{Harness, MockAuthApi, member};
use crate::util::persistence::{KeyValueStore, MemoryStore};

fn router_for(h: &Harness, table: RouteTable) -> Router {
    Router::new(table, NavigationGuard::new(h.session.clone()), History::new())
}

/// Session wired to the router's own history, as the binary does.
fn wired(api: MockAuthApi) -> (Router, SessionStore) {
    let history = History::new();
    let session = SessionStore::builder(Arc::new(api))
        .navigator(Arc::new(history.clone()))
        .build();
    let router = Router::new(RouteTable::default(), NavigationGuard::new(session.clone()), history);
    (router, session)
}

#[tokio::test]
async fn guest_is_sent_to_login_with_return_path() {
    let h = Harness::new(MockAuthApi::new());
    let router = router_for(&h, RouteTable::default());

    let nav = router.navigate("/?tab=recent").await.unwrap();

    assert_eq!(nav.name.as_deref(), Some(LOGIN_ROUTE));
    assert_eq!(nav.location.path, "/login");
    assert_eq!(nav.location.query_value(REDIRECT_QUERY_KEY), Some("/?tab=recent"));
    assert_eq!(nav.title.as_deref(), Some("Login"));
    assert_eq!(nav.redirects.len(), 1);
    assert_eq!(router.history().current(), Some(nav.location));
}

#[tokio::test]
async fn signed_in_user_reaches_dashboard() {
    let h = Harness::new(MockAuthApi::with_user(member(&[])));
    let router = router_for(&h, RouteTable::default());

    let nav = router.navigate("/").await.unwrap();

    assert_eq!(nav.name.as_deref(), Some(DASHBOARD_ROUTE));
    assert!(nav.redirects.is_empty());
}

#[tokio::test]
async fn signed_in_user_is_bounced_off_login() {
    let h = Harness::new(MockAuthApi::with_user(member(&[])));
    h.session.init().await.unwrap();
    let router = router_for(&h, RouteTable::default());

    let nav = router.navigate("/login").await.unwrap();

    assert_eq!(nav.location.path, "/");
    assert_eq!(nav.redirects, vec![RouteTarget::named(DASHBOARD_ROUTE)]);
}

#[tokio::test]
async fn stale_flag_on_login_page_settles_back_on_login() {
    let durable = MemoryStore::new();
    durable.set(AUTHENTICATED_KEY, "true");
    let h = Harness::with_durable(MockAuthApi::new(), durable);
    let router = router_for(&h, RouteTable::default());

    let nav = router.navigate("/login").await.unwrap();

    // login -> dashboard (looks signed in) -> login (init found nobody)
    assert_eq!(nav.name.as_deref(), Some(LOGIN_ROUTE));
    assert_eq!(nav.redirects.len(), 2);
    assert_eq!(nav.location.query_value(REDIRECT_QUERY_KEY), Some("/"));
}

#[tokio::test]
async fn unknown_path_lands_on_not_found() {
    let h = Harness::new(MockAuthApi::new());
    let router = router_for(&h, RouteTable::default());

    let nav = router.navigate("/does/not/exist").await.unwrap();

    assert_eq!(nav.name.as_deref(), Some(NOT_FOUND_ROUTE));
    assert_eq!(nav.title.as_deref(), Some("404"));
}

#[tokio::test]
async fn table_without_catch_all_reports_no_match() {
    let h = Harness::new(MockAuthApi::new());
    let router = router_for(&h, RouteTable::new(vec![RouteRecord::new("/login").name(LOGIN_ROUTE)]));

    let err = router.navigate("/elsewhere").await.unwrap_err();

    assert_eq!(err, RouterError::NoMatch("/elsewhere".into()));
    assert!(router.history().entries().is_empty());
}

#[tokio::test]
async fn unsatisfiable_dashboard_is_a_redirect_loop() {
    let h = Harness::new(MockAuthApi::with_user(member(&[])));
    let table = RouteTable::new(vec![
        RouteRecord::new("/")
            .name(DASHBOARD_ROUTE)
            .meta(RouteMeta::new().requires_auth().perms_all(&["never.granted"])),
    ]);
    let router = router_for(&h, table);

    let err = router.navigate("/").await.unwrap_err();

    assert_eq!(err, RouterError::RedirectLoop { from: "/".into(), hops: MAX_REDIRECTS });
    assert!(router.history().entries().is_empty());
}

#[tokio::test]
async fn redirect_to_undeclared_route_is_an_error() {
    let h = Harness::new(MockAuthApi::new());
    let table = RouteTable::new(vec![
        RouteRecord::new("/private")
            .name("private")
            .meta(RouteMeta::new().requires_auth()),
    ]);
    let router = router_for(&h, table);

    let err = router.navigate("/private").await.unwrap_err();

    assert_eq!(err, RouterError::Route(RouteError::UnknownRoute(LOGIN_ROUTE.into())));
}

#[tokio::test]
async fn logout_push_is_followed_to_login() {
    let (router, session) = wired(MockAuthApi::with_user(member(&[])));
    router.navigate("/").await.unwrap();

    session.logout();
    let nav = router.follow_pending().await.unwrap().unwrap();

    assert_eq!(nav.location.path, "/login");
    assert!(nav.redirects.is_empty());
    assert_eq!(router.history().entries().len(), 2);
    assert!(router.history().take_pending().is_empty());
}

#[tokio::test]
async fn nothing_pending_is_a_no_op() {
    let (router, _session) = wired(MockAuthApi::new());
    assert_eq!(router.follow_pending().await.unwrap(), None);
}

#[test]
fn default_table_is_the_application_table() {
    assert_eq!(RouteTable::default().routes(), default_routes().as_slice());
}
