//! The boundary with the synchronous request dispatcher.
//!
//! Once the body is fully ingested the handler builds a [`DispatchRequest`] and a
//! fresh [`DispatchResponse`] and calls the [`Dispatcher`] inline. The dispatcher may
//! answer right away by writing into the response, or [`suspend`](DispatchResponse::suspend)
//! it and complete it later from any thread.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Method, Response, StatusCode, Uri, Version};
use pin_project_lite::pin_project;
use tokio::sync::oneshot;
use tracing::error;

use crate::body::ResponseBody;
use crate::protocol::{DispatchError, FileUpload, Params};

mod bridge;
pub(crate) use bridge::dispatch;
pub(crate) use bridge::status_response;

/// A synchronous request dispatcher.
#[cfg_attr(test, mockall::automock)]
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, request: &DispatchRequest, response: &mut DispatchResponse) -> Result<(), DispatchError>;
}

impl<F> Dispatcher for F
where
    F: Fn(&DispatchRequest, &mut DispatchResponse) -> Result<(), DispatchError> + Send + Sync,
{
    fn dispatch(&self, request: &DispatchRequest, response: &mut DispatchResponse) -> Result<(), DispatchError> {
        (self)(request, response)
    }
}

/// The fully ingested request handed to the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    params: Params,
    form_attributes: Params,
    body: Bytes,
    uploads: Vec<FileUpload>,
}

impl DispatchRequest {
    #[allow(clippy::too_many_arguments, reason = "one argument per request part")]
    pub(crate) fn new(
        method: Method,
        uri: Uri,
        version: Version,
        headers: HeaderMap,
        params: Params,
        form_attributes: Params,
        body: Bytes,
        uploads: Vec<FileUpload>,
    ) -> Self {
        Self { method, uri, version, headers, params, form_attributes, body, uploads }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Query parameters, plus the form attributes when they are merged
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn form_attributes(&self) -> &Params {
        &self.form_attributes
    }

    /// The buffered body, empty for multipart requests
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn uploads(&self) -> &[FileUpload] {
        &self.uploads
    }
}

/// The response the dispatcher writes into.
#[derive(Debug)]
pub struct DispatchResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
    suspension: Option<oneshot::Receiver<Response<ResponseBody>>>,
}

impl Default for DispatchResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchResponse {
    pub fn new() -> Self {
        Self { status: StatusCode::OK, headers: HeaderMap::new(), body: BytesMut::new(), suspension: None }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn write<B: AsRef<[u8]>>(&mut self, bytes: B) {
        self.body.extend_from_slice(bytes.as_ref());
    }

    /// Defers the response; whatever was written so far is discarded.
    pub fn suspend(&mut self) -> ResponseCompleter {
        let (sender, receiver) = oneshot::channel();
        self.suspension = Some(receiver);
        ResponseCompleter { sender }
    }

    #[inline]
    pub fn is_suspended(&self) -> bool {
        self.suspension.is_some()
    }

    pub(crate) fn finish(self) -> Finished {
        if let Some(receiver) = self.suspension {
            return Finished::Suspended(SuspendedResponse::new(receiver));
        }

        let mut response = Response::new(ResponseBody::from(self.body.freeze()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        Finished::Complete(response)
    }
}

pub(crate) enum Finished {
    Complete(Response<ResponseBody>),
    Suspended(SuspendedResponse),
}

/// Completes a suspended [`DispatchResponse`].
#[derive(Debug)]
pub struct ResponseCompleter {
    sender: oneshot::Sender<Response<ResponseBody>>,
}

impl ResponseCompleter {
    /// Returns `false` if the exchange is already gone.
    pub fn complete(self, response: Response<ResponseBody>) -> bool {
        self.sender.send(response).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

type EndHook = Box<dyn FnOnce() + Send>;

/// Runs the hook when dropped unless it was handed over to a response body.
struct EndGuard(Option<EndHook>);

impl EndGuard {
    fn disarm(mut self) -> Option<EndHook> {
        self.0.take()
    }
}

impl Drop for EndGuard {
    fn drop(&mut self) {
        if let Some(hook) = self.0.take() {
            hook();
        }
    }
}

pin_project! {
    /// Resolves to the response of a suspended dispatch.
    ///
    /// A completer dropped without completing resolves to `500 Internal Server Error`.
    /// An attached end hook moves to the response body, or runs if this future is
    /// dropped before resolving.
    pub struct SuspendedResponse {
        #[pin]
        receiver: oneshot::Receiver<Response<ResponseBody>>,
        on_end: Option<EndGuard>,
    }
}

impl SuspendedResponse {
    fn new(receiver: oneshot::Receiver<Response<ResponseBody>>) -> Self {
        Self { receiver, on_end: None }
    }

    /// Attaches `hook` to the body of the eventual response.
    pub(crate) fn set_on_end<F>(&mut self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_end = Some(EndGuard(Some(Box::new(hook))));
    }
}

impl std::fmt::Debug for SuspendedResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuspendedResponse").field("on_end", &self.on_end.is_some()).finish_non_exhaustive()
    }
}

impl Future for SuspendedResponse {
    type Output = Response<ResponseBody>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let mut response = match this.receiver.poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Ok(response)) => response,
            Poll::Ready(Err(_)) => {
                error!("suspended response dropped without completion");
                status_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
        };

        if let Some(hook) = this.on_end.take().and_then(EndGuard::disarm) {
            response.body_mut().set_on_end(hook);
        }
        Poll::Ready(response)
    }
}
