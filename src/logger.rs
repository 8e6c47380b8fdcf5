use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::StatusCode,
    Error,
};
use futures::future::LocalBoxFuture;
use log::Level;
use std::rc::Rc;
use std::time::Instant;

/// Request logging middleware.
///
/// One line per request with method, path, status and latency. Query strings
/// and bodies are never logged since they may carry credentials.
pub struct LoggerMiddleware;

/// Failed requests were already logged by the handler at their own level;
/// their access line drops to debug.
fn access_log_level(status: StatusCode) -> Level {
    if status.is_client_error() || status.is_server_error() {
        Level::Debug
    } else {
        Level::Info
    }
}

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = LoggerMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(LoggerMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let method = req.method().to_string();
        let path = req.path().to_string();

        let service = self.service.clone();

        Box::pin(async move {
            let res = service.call(req).await?;

            let elapsed = start_time.elapsed().as_millis();
            let status = res.status();

            log::log!(
                access_log_level(status),
                "{} {} - Status: {} ({}ms)",
                method,
                path,
                status.as_u16(),
                elapsed
            );

            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_requests_log_at_info() {
        assert_eq!(access_log_level(StatusCode::OK), Level::Info);
        assert_eq!(access_log_level(StatusCode::NO_CONTENT), Level::Info);
    }

    #[test]
    fn failed_requests_do_not_repeat_the_handler_event() {
        for status in [
            StatusCode::BAD_REQUEST,
            StatusCode::FORBIDDEN,
            StatusCode::METHOD_NOT_ALLOWED,
            StatusCode::INTERNAL_SERVER_ERROR,
        ] {
            let level = access_log_level(status);
            assert_eq!(level, Level::Debug, "{}", status);
            assert!(level > Level::Info);
        }
    }
}
