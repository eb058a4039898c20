//! Broker API request routing.
//!
//! Maps the method and path of an incoming request onto a [`Route`]. The
//! surface is the synchronous subset of the service broker API:
//!
//! ```text
//! GET    /v2/catalog
//! PUT    /v2/service_instances/{instance_id}
//! PATCH  /v2/service_instances/{instance_id}
//! DELETE /v2/service_instances/{instance_id}?service_id=..&plan_id=..
//! PUT    /v2/service_instances/{instance_id}/service_bindings/{binding_id}
//! DELETE /v2/service_instances/{instance_id}/service_bindings/{binding_id}?service_id=..&plan_id=..
//! ```
//!
//! Anything else, including the asynchronous `last_operation` polling
//! endpoint, is unrouted. Delete routes read `service_id` and `plan_id`
//! from the query string; a missing parameter resolves to an empty string
//! and fails plan lookup downstream.

use http::Method;
use percent_encoding::percent_decode_str;

/// A routed broker API request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// List the service catalog.
    Catalog,
    /// Create a service instance.
    Provision {
        /// Instance being created.
        instance_id: String,
    },
    /// Update a service instance.
    Update {
        /// Instance being updated.
        instance_id: String,
    },
    /// Delete a service instance.
    Deprovision {
        /// Instance being deleted.
        instance_id: String,
        /// Service identifier from the query string.
        service_id: String,
        /// Plan identifier from the query string.
        plan_id: String,
    },
    /// Create a binding against an instance.
    Bind {
        /// Instance being bound.
        instance_id: String,
        /// Binding being created.
        binding_id: String,
    },
    /// Delete a binding.
    Unbind {
        /// Instance the binding belongs to.
        instance_id: String,
        /// Binding being deleted.
        binding_id: String,
        /// Service identifier from the query string.
        service_id: String,
        /// Plan identifier from the query string.
        plan_id: String,
    },
}

/// Why a request could not be routed.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// The path does not name a broker resource.
    #[error("resource not found: {path}")]
    NotFound {
        /// The unrouted path.
        path: String,
    },

    /// The path names a resource but the method is not supported on it.
    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed {
        /// The offending method.
        method: String,
        /// The resource path.
        path: String,
    },
}

/// Resolve a request to a [`Route`].
///
/// # Errors
/// Returns [`RouteError::NotFound`] for unknown paths and
/// [`RouteError::MethodNotAllowed`] for known paths with the wrong method.
pub fn resolve<B>(req: &http::Request<B>) -> Result<Route, RouteError> {
    let method = req.method();
    let path = req.uri().path();
    let query = req.uri().query();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match segments.as_slice() {
        ["v2", "catalog"] if method == Method::GET => Ok(Route::Catalog),
        ["v2", "catalog"] => Err(method_not_allowed(method, path)),

        ["v2", "service_instances", instance_id] if method == Method::PUT => {
            Ok(Route::Provision {
                instance_id: decode_segment(instance_id),
            })
        }
        ["v2", "service_instances", instance_id] if method == Method::PATCH => {
            Ok(Route::Update {
                instance_id: decode_segment(instance_id),
            })
        }
        ["v2", "service_instances", instance_id] if method == Method::DELETE => {
            Ok(Route::Deprovision {
                instance_id: decode_segment(instance_id),
                service_id: query_param(query, "service_id"),
                plan_id: query_param(query, "plan_id"),
            })
        }
        ["v2", "service_instances", _] => Err(method_not_allowed(method, path)),

        ["v2", "service_instances", instance_id, "service_bindings", binding_id]
            if method == Method::PUT =>
        {
            Ok(Route::Bind {
                instance_id: decode_segment(instance_id),
                binding_id: decode_segment(binding_id),
            })
        }
        ["v2", "service_instances", instance_id, "service_bindings", binding_id]
            if method == Method::DELETE =>
        {
            Ok(Route::Unbind {
                instance_id: decode_segment(instance_id),
                binding_id: decode_segment(binding_id),
                service_id: query_param(query, "service_id"),
                plan_id: query_param(query, "plan_id"),
            })
        }
        ["v2", "service_instances", _, "service_bindings", _] => {
            Err(method_not_allowed(method, path))
        }

        _ => Err(RouteError::NotFound {
            path: path.to_owned(),
        }),
    }
}

fn method_not_allowed(method: &Method, path: &str) -> RouteError {
    RouteError::MethodNotAllowed {
        method: method.to_string(),
        path: path.to_owned(),
    }
}

fn decode_segment(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

/// Extract one query parameter, defaulting to the empty string.
fn query_param(query: Option<&str>, name: &str) -> String {
    query
        .unwrap_or("")
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| percent_decode_str(value).decode_utf8_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: Method, uri: &str) -> http::Request<()> {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .body(())
            .unwrap()
    }

    #[test]
    fn test_should_route_catalog() {
        let route = resolve(&request(Method::GET, "/v2/catalog")).unwrap();
        assert_eq!(route, Route::Catalog);
    }

    #[test]
    fn test_should_route_provision_update_and_deprovision() {
        let route = resolve(&request(Method::PUT, "/v2/service_instances/i1")).unwrap();
        assert_eq!(
            route,
            Route::Provision {
                instance_id: "i1".to_owned()
            }
        );

        let route = resolve(&request(Method::PATCH, "/v2/service_instances/i1")).unwrap();
        assert_eq!(
            route,
            Route::Update {
                instance_id: "i1".to_owned()
            }
        );

        let route = resolve(&request(
            Method::DELETE,
            "/v2/service_instances/i1?service_id=svc&plan_id=plan",
        ))
        .unwrap();
        assert_eq!(
            route,
            Route::Deprovision {
                instance_id: "i1".to_owned(),
                service_id: "svc".to_owned(),
                plan_id: "plan".to_owned(),
            }
        );
    }

    #[test]
    fn test_should_route_bind_and_unbind() {
        let route = resolve(&request(
            Method::PUT,
            "/v2/service_instances/i1/service_bindings/b1",
        ))
        .unwrap();
        assert_eq!(
            route,
            Route::Bind {
                instance_id: "i1".to_owned(),
                binding_id: "b1".to_owned(),
            }
        );

        let route = resolve(&request(
            Method::DELETE,
            "/v2/service_instances/i1/service_bindings/b1?service_id=svc&plan_id=plan",
        ))
        .unwrap();
        assert_eq!(
            route,
            Route::Unbind {
                instance_id: "i1".to_owned(),
                binding_id: "b1".to_owned(),
                service_id: "svc".to_owned(),
                plan_id: "plan".to_owned(),
            }
        );
    }

    #[test]
    fn test_should_default_missing_delete_query_to_empty() {
        let route = resolve(&request(Method::DELETE, "/v2/service_instances/i1")).unwrap();
        assert_eq!(
            route,
            Route::Deprovision {
                instance_id: "i1".to_owned(),
                service_id: String::new(),
                plan_id: String::new(),
            }
        );
    }

    #[test]
    fn test_should_decode_percent_encoded_segments() {
        let route = resolve(&request(Method::PUT, "/v2/service_instances/i%3A1")).unwrap();
        assert_eq!(
            route,
            Route::Provision {
                instance_id: "i:1".to_owned()
            }
        );
    }

    #[test]
    fn test_should_not_route_unknown_paths() {
        let err = resolve(&request(Method::GET, "/v2/other")).unwrap_err();
        assert!(matches!(err, RouteError::NotFound { .. }));

        let err = resolve(&request(Method::GET, "/")).unwrap_err();
        assert!(matches!(err, RouteError::NotFound { .. }));
    }

    #[test]
    fn test_should_not_route_last_operation_polling() {
        let err = resolve(&request(
            Method::GET,
            "/v2/service_instances/i1/last_operation",
        ))
        .unwrap_err();
        assert!(matches!(err, RouteError::NotFound { .. }));
    }

    #[test]
    fn test_should_reject_wrong_method_on_known_path() {
        let err = resolve(&request(Method::POST, "/v2/catalog")).unwrap_err();
        assert!(matches!(err, RouteError::MethodNotAllowed { .. }));

        let err = resolve(&request(Method::GET, "/v2/service_instances/i1")).unwrap_err();
        assert!(matches!(err, RouteError::MethodNotAllowed { .. }));

        let err = resolve(&request(
            Method::PATCH,
            "/v2/service_instances/i1/service_bindings/b1",
        ))
        .unwrap_err();
        assert!(matches!(err, RouteError::MethodNotAllowed { .. }));
    }
}
