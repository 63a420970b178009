//! Route tables: each entry is a method and path with an explicit, ordered
//! list of guards in front of a terminal handler.

pub mod context;
pub mod guard;
pub mod upload;

use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use axum::{
    extract::{DefaultBodyLimit, Path, Request, State},
    http::Method,
    response::Response,
    routing::{on, MethodFilter, MethodRouter},
    Router,
};
use tracing::{debug, warn};

use crate::{error::AppResult, state::AppState};

pub use context::{RequestContext, UploadedFile};
pub use guard::Guard;

/// Upper bound for request bodies, uploads included.
pub const BODY_LIMIT: usize = 20 * 1024 * 1024;

pub type HandlerFuture = Pin<Box<dyn Future<Output = AppResult<Response>> + Send>>;
type Handler = Arc<dyn Fn(AppState, RequestContext) -> HandlerFuture + Send + Sync>;

pub struct Route {
    pub method: Method,
    pub path: &'static str,
    guards: Vec<Arc<dyn Guard>>,
    handler: Handler,
}

impl Route {
    pub fn new<F, Fut>(method: Method, path: &'static str, handler: F) -> Self
    where
        F: Fn(AppState, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Response>> + Send + 'static,
    {
        Self {
            method,
            path,
            guards: Vec::new(),
            handler: Arc::new(move |state: AppState, ctx: RequestContext| -> HandlerFuture {
                Box::pin(handler(state, ctx))
            }),
        }
    }

    /// Appends a guard; guards run in the order they were added.
    pub fn guard(mut self, guard: impl Guard + 'static) -> Self {
        self.guards.push(Arc::new(guard));
        self
    }

    pub fn guard_names(&self) -> Vec<&'static str> {
        self.guards.iter().map(|g| g.name()).collect()
    }

    /// Runs the guards strictly in order and, if all pass, the handler.
    pub async fn dispatch(&self, state: AppState, mut ctx: RequestContext) -> AppResult<Response> {
        for guard in &self.guards {
            if let Err(e) = guard.check(&state, &mut ctx).await {
                debug!(guard = guard.name(), method = %self.method, path = self.path, error = %e, "guard rejected request");
                return Err(e);
            }
        }
        (self.handler)(state, ctx).await
    }
}

/// Routes mounted under a common prefix.
pub struct RouteTable {
    prefix: &'static str,
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            routes: Vec::new(),
        }
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Looks up an entry by method and path pattern, e.g. `(PUT, "/:id")`.
    pub fn find(&self, method: &Method, path: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|r| &r.method == method && r.path == path)
    }

    pub fn into_router(self) -> Router<AppState> {
        let prefix = self.prefix;
        let mut by_path: Vec<(String, MethodRouter<AppState>)> = Vec::new();
        for route in self.routes {
            let Some(filter) = method_filter(&route.method) else {
                warn!(method = %route.method, path = route.path, "unsupported method; route skipped");
                continue;
            };
            let path = full_path(prefix, route.path);
            let route = Arc::new(route);
            let handler = move |State(state): State<AppState>,
                                params: Option<Path<HashMap<String, String>>>,
                                req: Request| {
                let route = Arc::clone(&route);
                async move {
                    let params = params.map(|Path(p)| p).unwrap_or_default();
                    route.dispatch(state, RequestContext::new(req, params)).await
                }
            };

            match by_path.iter_mut().find(|(p, _)| *p == path) {
                Some((_, mr)) => {
                    let merged = std::mem::replace(mr, MethodRouter::new()).on(filter, handler);
                    *mr = merged;
                }
                None => by_path.push((path, on(filter, handler))),
            }
        }

        by_path
            .into_iter()
            .fold(Router::new(), |router, (path, mr)| router.route(&path, mr))
            .layer(DefaultBodyLimit::max(BODY_LIMIT))
    }
}

fn full_path(prefix: &str, path: &str) -> String {
    match path {
        "/" if !prefix.is_empty() => prefix.to_string(),
        _ => format!("{}{}", prefix, path),
    }
}

fn method_filter(method: &Method) -> Option<MethodFilter> {
    [
        (Method::GET, MethodFilter::GET),
        (Method::POST, MethodFilter::POST),
        (Method::PUT, MethodFilter::PUT),
        (Method::PATCH, MethodFilter::PATCH),
        (Method::DELETE, MethodFilter::DELETE),
    ]
    .into_iter()
    .find_map(|(m, f)| (m == *method).then_some(f))
}
