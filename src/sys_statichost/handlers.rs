//! HTTP glue: decode the request path, resolve it, and render the outcome.

use std::time::SystemTime;

use hyper::{
    Body, Request, Response, StatusCode,
    header::{CACHE_CONTROL, CONTENT_TYPE, HeaderValue, LOCATION},
};

use crate::{
    errors::ServeError,
    sys_config::core::{ListingMode, ServerConfig},
    sys_content::handlers::serve_content,
    sys_listing::{
        core::EntryInfo,
        sort::{SortState, sort_entries},
    },
    sys_path::core::{RequestPath, encode_path},
    sys_render::core::{
        render_client_listing, render_error_body, render_listing_json, render_listing_table,
        render_page,
    },
    sys_statichost::core::{Resolution, resolve, wants_json},
};

const NO_CACHE: &str = "no-cache, no-store, no-transform, must-revalidate, private, max-age=0";
const HTML: &str = "text/html; charset=utf-8";

/// Serve one request against the configured root. Never fails: every error
/// becomes an HTML error page with the matching status.
pub async fn handler_request(req: Request<Body>, config: &ServerConfig) -> Response<Body> {
    let path = match urlencoding::decode(req.uri().path()) {
        Ok(decoded) => RequestPath::normalize(&decoded),
        Err(e) => {
            let err = ServeError::BadRequest(format!("invalid path {:?}: {e}", req.uri().path()));
            return with_cache_control(error_page(&RequestPath::root(), err));
        }
    };
    if config.verbose {
        log::info!("{} {}", req.method(), path);
    }

    let resp = match respond(&req, config, &path).await {
        Ok(resp) => resp,
        Err(err) => error_page(&path, err),
    };
    with_cache_control(resp)
}

async fn respond(
    req: &Request<Body>,
    config: &ServerConfig,
    path: &RequestPath,
) -> Result<Response<Body>, ServeError> {
    match resolve(config.fs.as_ref(), &config.patterns, path).await? {
        Resolution::Redirect(target) => redirect(&target, req.uri().query()),
        Resolution::Listing { path, entries } => listing(config, &path, entries, req.uri().query()),
        Resolution::File {
            path,
            modified,
            content,
        } => {
            serve_content(
                req.method(),
                req.headers(),
                &path,
                modified,
                content,
                config.sendfile,
            )
            .await
        }
    }
}

fn redirect(target: &str, query: Option<&str>) -> Result<Response<Body>, ServeError> {
    let mut location = encode_path(target);
    if let Some(q) = query.filter(|q| !q.is_empty()) {
        location.push('?');
        location.push_str(q);
    }
    Response::builder()
        .status(StatusCode::MOVED_PERMANENTLY)
        .header(LOCATION, location)
        .body(Body::empty())
        .map_err(|e| ServeError::Internal(format!("building redirect: {e}")))
}

fn listing(
    config: &ServerConfig,
    path: &RequestPath,
    mut entries: Vec<EntryInfo>,
    query: Option<&str>,
) -> Result<Response<Body>, ServeError> {
    if wants_json(query) {
        let json = render_listing_json(&entries)
            .map_err(|e| ServeError::Internal(format!("encoding listing of {path}: {e}")))?;
        return Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(json))
            .map_err(|e| ServeError::Internal(format!("building listing: {e}")));
    }
    let body = match config.listing {
        ListingMode::Server => {
            let sort = SortState::from_query(query);
            sort_entries(&mut entries, sort);
            render_listing_table(&entries, sort, SystemTime::now())
        }
        ListingMode::Client => render_client_listing(&entries)
            .map_err(|e| ServeError::Internal(format!("encoding listing of {path}: {e}")))?,
    };
    html(StatusCode::OK, render_page(path, &body))
        .map_err(|e| ServeError::Internal(format!("building listing: {e}")))
}

fn error_page(path: &RequestPath, err: ServeError) -> Response<Body> {
    let status = err.status();
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        log::error!("{path}: {err}");
    }
    let reason = status.canonical_reason().unwrap_or("Error");
    let page = render_page(path, &render_error_body(reason, &err.to_string()));
    html(status, page).unwrap_or_else(|e| {
        log::error!("building error page: {e}");
        let mut resp = Response::new(Body::from("Internal Server Error"));
        *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        resp
    })
}

fn html(status: StatusCode, page: String) -> hyper::http::Result<Response<Body>> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, HTML)
        .body(Body::from(page))
}

fn with_cache_control(mut resp: Response<Body>) -> Response<Body> {
    resp.headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
    resp
}
