//! Route table and per-route access metadata.
//!
//! DESIGN
//! ======
//! Routes nest. A request path resolves to the chain of records from the root
//! to the matched leaf, and the guard reads the chain's *aggregated*
//! metadata: flags are OR-ed, permission lists are concatenated root-first.
//! A child never overrides what its ancestors require, it only adds.
//!
//! Matching is first-match in declaration order, so catch-all records belong
//! at the end of their list.

#[cfg(test)]
#[path = "routes_test.rs"]
mod routes_test;

use std::collections::BTreeMap;
use std::sync::LazyLock;

use reqwest::Url;

pub const DASHBOARD_ROUTE: &str = "dashboard";
pub const LOGIN_ROUTE: &str = "login";
pub const NOT_FOUND_ROUTE: &str = "NotFound";
/// Query key carrying the originally requested path through sign-in.
pub const REDIRECT_QUERY_KEY: &str = "redirect";

const URL_BASE: &str = "http://app.invalid/";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("no route named {0}")]
    UnknownRoute(String),
    #[error("route {0} has dynamic segments and cannot be linked by name alone")]
    DynamicRoute(String),
}

// =============================================================================
// METADATA
// =============================================================================

/// Access policy and display hints declared on one route record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMeta {
    pub title: Option<String>,
    pub requires_auth: bool,
    pub guest_only: bool,
    /// Reserved for email-confirmation gating. The guard ignores it.
    pub email_confirmed: bool,
    pub hide_navigation: bool,
    /// Allow if the user has ANY of these.
    pub perms_any: Vec<String>,
    /// Allow only if the user has ALL of these.
    pub perms_all: Vec<String>,
}

impl RouteMeta {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_owned());
        self
    }

    #[must_use]
    pub fn requires_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    #[must_use]
    pub fn guest_only(mut self) -> Self {
        self.guest_only = true;
        self
    }

    #[must_use]
    pub fn email_confirmed(mut self) -> Self {
        self.email_confirmed = true;
        self
    }

    #[must_use]
    pub fn hide_navigation(mut self) -> Self {
        self.hide_navigation = true;
        self
    }

    #[must_use]
    pub fn perms_any(mut self, perms: &[&str]) -> Self {
        self.perms_any.extend(perms.iter().map(|p| (*p).to_owned()));
        self
    }

    #[must_use]
    pub fn perms_all(mut self, perms: &[&str]) -> Self {
        self.perms_all.extend(perms.iter().map(|p| (*p).to_owned()));
        self
    }
}

/// Metadata folded over a matched chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveMeta {
    pub requires_auth: bool,
    pub guest_only: bool,
    pub email_confirmed: bool,
    pub hide_navigation: bool,
    pub perms_any: Vec<String>,
    pub perms_all: Vec<String>,
    /// Title of the deepest record that declares one.
    pub title: Option<String>,
}

impl EffectiveMeta {
    /// Fold metadata root-first.
    pub fn aggregate<'a>(chain: impl IntoIterator<Item = &'a RouteMeta>) -> Self {
        chain.into_iter().fold(Self::default(), |mut acc, meta| {
            acc.requires_auth |= meta.requires_auth;
            acc.guest_only |= meta.guest_only;
            acc.email_confirmed |= meta.email_confirmed;
            acc.hide_navigation |= meta.hide_navigation;
            acc.perms_any.extend(meta.perms_any.iter().cloned());
            acc.perms_all.extend(meta.perms_all.iter().cloned());
            if meta.title.is_some() {
                acc.title.clone_from(&meta.title);
            }
            acc
        })
    }
}

// =============================================================================
// LOCATION
// =============================================================================

/// A concrete path plus decoded query pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub query: Vec<(String, String)>,
    pub hash: Option<String>,
}

impl Location {
    /// Parse `"/a/b?x=1#frag"`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::InvalidPath`] when the string cannot be read as a
    /// relative URL.
    pub fn parse(full_path: &str) -> Result<Self, RouteError> {
        let url = base_url()?
            .join(full_path)
            .map_err(|e| RouteError::InvalidPath(format!("{full_path}: {e}")))?;
        Ok(Self {
            path: url.path().to_owned(),
            query: url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect(),
            hash: url.fragment().map(str::to_owned),
        })
    }

    /// Path with encoded query and fragment, e.g. `/login?redirect=%2Fadmin`.
    #[must_use]
    pub fn full_path(&self) -> String {
        let Ok(mut url) = base_url() else {
            return self.path.clone();
        };
        url.set_path(&self.path);
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }
        url.set_fragment(self.hash.as_deref());

        let mut out = url.path().to_owned();
        if let Some(q) = url.query() {
            out.push('?');
            out.push_str(q);
        }
        if let Some(h) = url.fragment() {
            out.push('#');
            out.push_str(h);
        }
        out
    }

    /// First value for `key` in the query.
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// A named route plus query, as produced by guard redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    pub name: String,
    pub query: Vec<(String, String)>,
}

impl RouteTarget {
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self { name: name.to_owned(), query: Vec::new() }
    }

    #[must_use]
    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_owned(), value.to_owned()));
        self
    }

    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// Sink for programmatic navigation requested outside a guard, such as the
/// sign-in redirect after logout.
pub trait Navigator: Send + Sync {
    fn push(&self, target: RouteTarget);
}

/// Throwaway origin that lets `Url` parse and encode bare paths.
fn base_url() -> Result<Url, RouteError> {
    static BASE: LazyLock<Result<Url, String>> = LazyLock::new(|| Url::parse(URL_BASE).map_err(|e| e.to_string()));
    BASE.clone()
        .map_err(|e| RouteError::InvalidPath(format!("{URL_BASE}: {e}")))
}

// =============================================================================
// ROUTE RECORDS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRecord {
    pub name: Option<String>,
    /// Pattern relative to the parent: static segments, `:param`, and a
    /// trailing catch-all `:param(.*)*`.
    pub path: String,
    pub meta: RouteMeta,
    pub children: Vec<RouteRecord>,
}

impl RouteRecord {
    #[must_use]
    pub fn new(path: &str) -> Self {
        Self { name: None, path: path.to_owned(), meta: RouteMeta::default(), children: Vec::new() }
    }

    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_owned());
        self
    }

    #[must_use]
    pub fn meta(mut self, meta: RouteMeta) -> Self {
        self.meta = meta;
        self
    }

    #[must_use]
    pub fn children(mut self, children: Vec<RouteRecord>) -> Self {
        self.children = children;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Static(&'a str),
    Param(&'a str),
    CatchAll(&'a str),
}

fn pattern_segments(pattern: &str) -> Vec<Segment<'_>> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| match s.strip_prefix(':') {
            Some(rest) => match rest.find('(') {
                Some(idx) => Segment::CatchAll(&rest[..idx]),
                None => Segment::Param(rest),
            },
            None => Segment::Static(s),
        })
        .collect()
}

/// Result of resolving a path against the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    /// Name of the leaf record, if it has one.
    pub name: Option<String>,
    pub location: Location,
    pub params: BTreeMap<String, String>,
    /// Metadata of every matched record, root first.
    pub chain: Vec<RouteMeta>,
    pub meta: EffectiveMeta,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    routes: Vec<RouteRecord>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(default_routes())
    }
}

impl RouteTable {
    #[must_use]
    pub fn new(routes: Vec<RouteRecord>) -> Self {
        Self { routes }
    }

    #[must_use]
    pub fn routes(&self) -> &[RouteRecord] {
        &self.routes
    }

    /// Resolve a full path (path, query, fragment) to its matched chain.
    ///
    /// Returns `Ok(None)` if nothing matches and the table has no catch-all.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::InvalidPath`] for unparseable input.
    pub fn resolve(&self, full_path: &str) -> Result<Option<ResolvedRoute>, RouteError> {
        let location = Location::parse(full_path)?;
        let segments: Vec<&str> = location.path.split('/').filter(|s| !s.is_empty()).collect();

        let Some(matched) = match_records(&self.routes, &segments) else {
            return Ok(None);
        };
        let chain: Vec<RouteMeta> = matched.records.iter().map(|r| r.meta.clone()).collect();
        let meta = EffectiveMeta::aggregate(&chain);
        let name = matched.records.last().and_then(|r| r.name.clone());
        Ok(Some(ResolvedRoute { name, location, params: matched.params, chain, meta }))
    }

    /// Build a location for a named, fully static route.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::UnknownRoute`] if no record has `name`, or
    /// [`RouteError::DynamicRoute`] if its pattern needs params.
    pub fn href(&self, name: &str, query: &[(String, String)]) -> Result<Location, RouteError> {
        let mut trail = Vec::new();
        if !find_named(&self.routes, name, &mut trail) {
            return Err(RouteError::UnknownRoute(name.to_owned()));
        }

        let mut parts = Vec::new();
        for record in trail {
            for seg in pattern_segments(&record.path) {
                match seg {
                    Segment::Static(s) => parts.push(s),
                    Segment::Param(_) | Segment::CatchAll(_) => {
                        return Err(RouteError::DynamicRoute(name.to_owned()));
                    }
                }
            }
        }

        Ok(Location { path: format!("/{}", parts.join("/")), query: query.to_vec(), hash: None })
    }
}

struct Matched<'r> {
    records: Vec<&'r RouteRecord>,
    params: BTreeMap<String, String>,
}

fn match_records<'r>(records: &'r [RouteRecord], segments: &[&str]) -> Option<Matched<'r>> {
    records.iter().find_map(|record| match_record(record, segments))
}

fn match_record<'r>(record: &'r RouteRecord, segments: &[&str]) -> Option<Matched<'r>> {
    let mut params = BTreeMap::new();
    let mut rest = segments;

    for seg in pattern_segments(&record.path) {
        match seg {
            Segment::Static(s) => {
                let (head, tail) = rest.split_first()?;
                if *head != s {
                    return None;
                }
                rest = tail;
            }
            Segment::Param(name) => {
                let (head, tail) = rest.split_first()?;
                params.insert(name.to_owned(), (*head).to_owned());
                rest = tail;
            }
            Segment::CatchAll(name) => {
                params.insert(name.to_owned(), rest.join("/"));
                rest = &[];
            }
        }
    }

    if let Some(mut child) = match_records(&record.children, rest) {
        child.records.insert(0, record);
        params.append(&mut child.params);
        return Some(Matched { records: child.records, params });
    }

    rest.is_empty().then(|| Matched { records: vec![record], params })
}

fn find_named<'r>(records: &'r [RouteRecord], name: &str, trail: &mut Vec<&'r RouteRecord>) -> bool {
    for record in records {
        trail.push(record);
        if record.name.as_deref() == Some(name) || find_named(&record.children, name, trail) {
            return true;
        }
        trail.pop();
    }
    false
}

/// The application's route table.
#[must_use]
pub fn default_routes() -> Vec<RouteRecord> {
    vec![
        RouteRecord::new("/")
            .name(DASHBOARD_ROUTE)
            .meta(RouteMeta::new().title("Dash").requires_auth()),
        RouteRecord::new("/login")
            .name(LOGIN_ROUTE)
            .meta(RouteMeta::new().title("Login").guest_only().hide_navigation()),
        RouteRecord::new("/:pathMatch(.*)*")
            .name(NOT_FOUND_ROUTE)
            .meta(RouteMeta::new().title("404")),
    ]
}
