use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use http::{Response, StatusCode};
use tracing::{error, warn};

use crate::body::ResponseBody;
use crate::dispatch::{DispatchRequest, DispatchResponse, Dispatcher, Finished};
use crate::protocol::DispatchError;

/// Calls `dispatcher` and turns its outcome into a response.
///
/// A [`DispatchError::Failure`] keeps its status, unclassified errors and panics are
/// answered with `fallback_status`. The partially written response is discarded on
/// any failure.
pub(crate) fn dispatch<D>(dispatcher: &D, request: &DispatchRequest, fallback_status: StatusCode) -> Finished
where
    D: Dispatcher + ?Sized,
{
    let mut response = DispatchResponse::new();
    let result = panic::catch_unwind(AssertUnwindSafe(|| dispatcher.dispatch(request, &mut response)));

    match result {
        Ok(Ok(())) => response.finish(),
        Ok(Err(DispatchError::Failure { status, cause })) => {
            match cause {
                Some(cause) => warn!(%status, method = %request.method(), uri = %request.uri(), error = %cause, "dispatch failed"),
                None => warn!(%status, method = %request.method(), uri = %request.uri(), "dispatch failed"),
            }
            Finished::Complete(status_response(status))
        }
        Ok(Err(DispatchError::Unclassified { source })) => {
            error!(
                status = %fallback_status,
                method = %request.method(),
                uri = %request.uri(),
                error = ?source,
                "unclassified dispatch error"
            );
            Finished::Complete(status_response(fallback_status))
        }
        Err(payload) => {
            error!(
                status = %fallback_status,
                method = %request.method(),
                uri = %request.uri(),
                panic = panic_message(payload.as_ref()),
                "dispatcher panicked"
            );
            Finished::Complete(status_response(fallback_status))
        }
    }
}

/// An empty-bodied response carrying only `status`
pub(crate) fn status_response(status: StatusCode) -> Response<ResponseBody> {
    let mut response = Response::new(ResponseBody::empty());
    *response.status_mut() = status;
    response
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
