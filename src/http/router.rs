//! Request routing

/// What a request asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `OPTIONS` on any path
    Preflight,
    ListDisplays,
    GetConfig,
    UpdateConfig,
    /// `GET /v/<display id>`
    Stream(u32),
    /// Any other `GET`; the raw request path
    Static(String),
    NotFound,
}

impl Route {
    /// Map a method and path onto a route. First match wins.
    pub fn resolve(method: &str, path: &str) -> Self {
        if method == "OPTIONS" {
            return Route::Preflight;
        }

        match (method, path) {
            ("GET", "/api/displays") => Route::ListDisplays,
            ("GET", "/api/config") => Route::GetConfig,
            ("POST", "/api/config") => Route::UpdateConfig,
            ("GET", path) => match path.strip_prefix("/v/") {
                Some(id) => id.parse().map(Route::Stream).unwrap_or(Route::NotFound),
                None => Route::Static(path.to_string()),
            },
            _ => Route::NotFound,
        }
    }
}
