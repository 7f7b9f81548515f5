//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Compile route configs into matchers and actions
//! - Look up the matching route for a request
//! - Rewrite the forwarded path (prefix stripping, query preserved)
//!
//! # Design Decisions
//! - Immutable after construction; reloads build a new table and swap it
//! - Routes checked in priority order (higher first), first match wins
//! - Explicit None rather than a silent default route

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, Uri};

use crate::config::RouteConfig;
use crate::routing::matcher::{
    AndMatcher, ExactPathMatcher, HostMatcher, Matcher, PathPrefixMatcher,
};

/// What a matched route does with the request.
#[derive(Debug, Clone)]
pub enum RouteAction {
    /// Answer immediately with a redirect.
    Redirect {
        status: StatusCode,
        location: String,
    },
    /// Forward to an upstream pool, optionally stripping the matched prefix.
    Forward {
        upstream: String,
        strip_prefix: Option<String>,
        max_body_bytes: Option<usize>,
    },
}

/// A compiled route: match conditions plus an action.
#[derive(Debug)]
pub struct Route {
    /// Route identifier for logging/metrics.
    pub name: String,
    pub action: RouteAction,
    matcher: AndMatcher,
    priority: u32,
}

impl Route {
    fn from_config(config: RouteConfig) -> Self {
        let mut matchers: Vec<Box<dyn Matcher>> = Vec::new();
        if let Some(host) = &config.host {
            matchers.push(Box::new(HostMatcher::new(host.clone())));
        }
        if let Some(path) = &config.path {
            matchers.push(Box::new(ExactPathMatcher::new(path.clone())));
        }
        if let Some(prefix) = &config.path_prefix {
            matchers.push(Box::new(PathPrefixMatcher::new(prefix.clone())));
        }

        let action = if let Some(location) = config.redirect_to {
            RouteAction::Redirect {
                status: StatusCode::from_u16(config.redirect_status)
                    .unwrap_or(StatusCode::FOUND),
                location,
            }
        } else {
            RouteAction::Forward {
                upstream: config.upstream.unwrap_or_default(),
                strip_prefix: if config.strip_prefix {
                    config.path_prefix
                } else {
                    None
                },
                max_body_bytes: config.max_body_bytes,
            }
        };

        Self {
            name: config.name,
            action,
            matcher: AndMatcher::new(matchers),
            priority: config.priority,
        }
    }
}

/// The compiled routing table.
#[derive(Debug)]
pub struct Router {
    /// Routes sorted by descending priority.
    routes: Vec<Arc<Route>>,
}

impl Router {
    /// Compile a routing table from configuration.
    pub fn from_config(configs: Vec<RouteConfig>) -> Self {
        let mut routes: Vec<Arc<Route>> = configs
            .into_iter()
            .map(|c| Arc::new(Route::from_config(c)))
            .collect();
        // Stable sort keeps config order for equal priorities.
        routes.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { routes }
    }

    /// Find the first route matching the request, in priority order.
    pub fn match_request(&self, req: &Request<Body>) -> Option<Arc<Route>> {
        self.routes
            .iter()
            .find(|route| route.matcher.matches(req))
            .cloned()
    }

    /// Number of compiled routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Build the path-and-query to forward upstream.
///
/// With `strip = Some("/api/v1/")`, `/api/v1/images/query?page=2` becomes
/// `/images/query?page=2` and `/api/v1/` becomes `/`. The query string is
/// always preserved unchanged.
pub fn forward_path_and_query(uri: &Uri, strip: Option<&str>) -> String {
    let path = uri.path();
    let stripped = match strip {
        Some(prefix) => {
            let rest = path.strip_prefix(prefix).unwrap_or(path);
            if rest.starts_with('/') {
                rest.to_string()
            } else {
                format!("/{}", rest)
            }
        }
        None => path.to_string(),
    };

    match uri.query() {
        Some(query) => format!("{}?{}", stripped, query),
        None => stripped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyConfig;

    fn request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::default()).unwrap()
    }

    #[test]
    fn test_default_table_precedence() {
        let router = Router::from_config(ProxyConfig::default().routes);

        // Exact /api/v1 hits the redirect, not the edge fallback.
        let route = router.match_request(&request("http://proxy/api/v1")).unwrap();
        assert_eq!(route.name, "api-index-redirect");
        match &route.action {
            RouteAction::Redirect { status, location } => {
                assert_eq!(*status, StatusCode::FOUND);
                assert_eq!(location, "/api/v1/");
            }
            other => panic!("expected redirect, got {:?}", other),
        }

        // Anything under /api/v1/ goes to the gateway with the prefix
        // stripped.
        let route = router
            .match_request(&request("http://proxy/api/v1/images/query"))
            .unwrap();
        assert_eq!(route.name, "api");
        match &route.action {
            RouteAction::Forward {
                upstream,
                strip_prefix,
                max_body_bytes,
            } => {
                assert_eq!(upstream, "gateway");
                assert_eq!(strip_prefix.as_deref(), Some("/api/v1/"));
                assert_eq!(*max_body_bytes, Some(1000 * 1024 * 1024));
            }
            other => panic!("expected forward, got {:?}", other),
        }

        // Everything else falls through to the edge.
        let route = router.match_request(&request("http://proxy/index.html")).unwrap();
        assert_eq!(route.name, "edge");

        let route = router.match_request(&request("http://proxy/")).unwrap();
        assert_eq!(route.name, "edge");
    }

    #[test]
    fn test_forward_path_rewrite() {
        let uri: Uri = "http://proxy/api/v1/images/query?results_per_page=50&page_num=2"
            .parse()
            .unwrap();
        assert_eq!(
            forward_path_and_query(&uri, Some("/api/v1/")),
            "/images/query?results_per_page=50&page_num=2"
        );

        let uri: Uri = "http://proxy/api/v1/".parse().unwrap();
        assert_eq!(forward_path_and_query(&uri, Some("/api/v1/")), "/");

        let uri: Uri = "http://proxy/static/app.js".parse().unwrap();
        assert_eq!(forward_path_and_query(&uri, None), "/static/app.js");
    }

    #[test]
    fn test_no_route_matches() {
        let router = Router::from_config(vec![]);
        assert!(router
            .match_request(&request("http://proxy/anything"))
            .is_none());
        assert!(router.is_empty());
    }
}
