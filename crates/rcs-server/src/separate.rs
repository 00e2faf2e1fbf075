//! Deferred completion of requests answered with a separate response.

use rcs_protocol::Method;
use tracing::debug;

use crate::dispatcher;
use crate::error::ResourceError;
use crate::request::Request;
use crate::response::RequestHandler;

/// Completes a request whose handler returned `separate()`.
///
/// May be finished from any thread, arbitrarily late. If the resource is
/// destroyed first, [`SeparateResponse::set`] fails instead of sending.
///
/// # Example
/// ```ignore
/// resource.set_get_request_handler(move |request, _| {
///     pending_tx.send(SeparateResponse::new(request).unwrap()).unwrap();
///     GetResponse::separate()
/// });
/// // later, on a worker thread
/// pending_rx.recv()?.set()?;
/// ```
#[derive(Debug)]
pub struct SeparateResponse {
    request: Request,
    done: bool,
}

impl SeparateResponse {
    /// Capture `request`; it must still be bound to a live resource.
    pub fn new(request: &Request) -> Result<Self, ResourceError> {
        if !request.is_complete() {
            return Err(ResourceError::bad_request("incomplete request"));
        }
        Ok(Self {
            request: request.clone(),
            done: false,
        })
    }

    /// Send the response now, built by the original request's interface.
    ///
    /// Fails with [`ResourceError::BadRequest`] if already sent or if the
    /// resource is gone.
    pub fn set(&mut self) -> Result<(), ResourceError> {
        if self.done {
            return Err(ResourceError::bad_request("already set"));
        }

        let object = self
            .request
            .resource_object()
            .ok_or_else(|| ResourceError::bad_request("incomplete request"))?;
        if self.request.platform_request().is_none() {
            return Err(ResourceError::bad_request("incomplete request"));
        }

        let interface = object.interface_handler(&self.request.interface())?;
        let method = match self.request.method() {
            Some(method) if method.is_update() => method,
            _ => Method::Get,
        };

        dispatcher::send_response(
            &object,
            &self.request,
            &RequestHandler::default(),
            interface,
            method,
        )?;

        self.done = true;
        debug!("Completed separate {} response for {}", method, object.uri());
        Ok(())
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn request(&self) -> &Request {
        &self.request
    }
}
