// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Renders the first line of an HTTP/1.1 request.

use crate::{connection::Route, message::Request};

/// The request line for `request` sent over `route`:
/// `<METHOD> <target> HTTP/1.1`.
///
/// Plaintext requests through an HTTP proxy use the absolute-form target
/// (the proxy needs the full URL to route); everything else uses
/// origin-form. HTTPS through a proxy rides a CONNECT tunnel, so by the time
/// this request line is written the proxy no longer sees it.
#[must_use]
pub fn request_line(request: &Request, route: &Route) -> String {
    let use_absolute_form = route.uses_http_proxy() && !request.url.is_https();
    let target = if use_absolute_form {
        request.url.to_absolute_form()
    } else {
        request.url.request_target()
    };
    format!("{} {} HTTP/1.1", request.method, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{HttpUrl, Method, Scheme};
    use pretty_assertions::assert_eq;

    fn request() -> Request {
        Request::new(
            Method::Get,
            HttpUrl::new(Scheme::Http, "example.com")
                .with_path("/index.html")
                .with_query("a=1"),
        )
    }

    #[test]
    fn direct_routes_use_origin_form() {
        let route = Route::direct(HttpUrl::new(Scheme::Http, "example.com"));
        assert_eq!(
            request_line(&request(), &route),
            "GET /index.html?a=1 HTTP/1.1"
        );
    }

    #[test]
    fn http_proxy_routes_use_absolute_form() {
        let route = Route {
            address_url: HttpUrl::new(Scheme::Http, "example.com"),
            proxy: crate::connection::Proxy::Http {
                host: "proxy.example".into(),
                port: 8080,
            },
        };
        assert_eq!(
            request_line(&request(), &route),
            "GET http://example.com/index.html?a=1 HTTP/1.1"
        );
    }

    #[test]
    fn https_through_a_proxy_stays_origin_form() {
        let mut tunneled = request();
        tunneled.url.scheme = Scheme::Https;
        tunneled.url.port = Scheme::Https.default_port();
        let route = Route {
            address_url: HttpUrl::new(Scheme::Https, "example.com"),
            proxy: crate::connection::Proxy::Http {
                host: "proxy.example".into(),
                port: 8080,
            },
        };
        assert_eq!(
            request_line(&tunneled, &route),
            "GET /index.html?a=1 HTTP/1.1"
        );
    }
}
