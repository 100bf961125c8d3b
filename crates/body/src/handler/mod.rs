//! The body handler: reads the request body once and hands the exchange to the dispatcher.
//!
//! [`BodyHandler::handle`] is invoked by the host for every pass of an [`Exchange`]:
//!
//! - upgrade requests pass through untouched
//! - a rerouted exchange passes through without reading anything again
//! - otherwise the body is read, multipart files are streamed to disk, and the
//!   exchange is either rejected with the failure status or dispatched

use std::pin::pin;
use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Response, StatusCode};
use http_body::Body;
use http_body_util::BodyExt;
use tracing::{debug, trace, warn};

use crate::body::{BodyAccumulator, FailureFlag, Ingest, ResponseBody, initial_capacity};
use crate::config::BodyHandlerConfig;
use crate::dispatch::{self, DispatchRequest, Dispatcher, Finished, SuspendedResponse, status_response};
use crate::protocol::{BodyError, BoxError, Params};
use crate::upload::{Cleanup, IngestContext};

mod exchange;
pub use exchange::Exchange;
pub use exchange::ExchangeState;

mod multipart;
use multipart::MultipartIngest;

/// What the host does next with the exchange
#[derive(Debug)]
pub enum Flow {
    /// continue with the next handler, the body handler did nothing
    Next,
    /// write this response
    Respond(Response<ResponseBody>),
    /// the dispatcher suspended the response, await it then write it
    Suspended(SuspendedResponse),
}

#[derive(Debug)]
pub struct BodyHandler<D> {
    config: BodyHandlerConfig,
    dispatcher: D,
}

impl<D: Dispatcher> BodyHandler<D> {
    pub fn new(config: BodyHandlerConfig, dispatcher: D) -> Self {
        Self { config, dispatcher }
    }

    pub fn config(&self) -> &BodyHandlerConfig {
        &self.config
    }

    pub async fn handle<B>(&self, exchange: &mut Exchange<B>) -> Flow
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        if exchange.is_upgrade() {
            trace!(uri = %exchange.uri(), "upgrade request, pass through");
            return Flow::Next;
        }

        if exchange.state() == ExchangeState::Handled {
            if self.config.merge_form_attributes() && exchange.kind().expects_form() {
                exchange.merge_form_attributes();
            }
            trace!(uri = %exchange.uri(), "rerouted exchange, body already handled");
            return Flow::Next;
        }

        exchange.mark_handled();

        let failure = Arc::new(FailureFlag::new());
        let cleanup = Cleanup::new(Arc::clone(exchange.registry()), self.config.handle_file_uploads());
        let ctx = Arc::new(IngestContext::new(Arc::clone(exchange.registry()), Arc::clone(&failure), cleanup.clone()));
        let mut guard = cleanup.guard();

        let body = self.read_body(exchange, &ctx).await;

        if failure.is_failed() {
            cleanup.schedule();
            let status = failure.take_cause().map_or(StatusCode::INTERNAL_SERVER_ERROR, |e| {
                warn!(uri = %exchange.uri(), error = %e, "request body rejected");
                e.status()
            });
            return Flow::Respond(status_response(status));
        }
        guard.disarm();

        if exchange.kind().is_url_encoded() {
            exchange.set_form_attributes(Params::from_urlencoded(&body));
        }
        if self.config.merge_form_attributes() && exchange.kind().expects_form() {
            exchange.merge_form_attributes();
        }

        let head = exchange.head();
        let request = DispatchRequest::new(
            head.method.clone(),
            head.uri.clone(),
            head.version,
            head.headers.clone(),
            exchange.params().clone(),
            exchange.form_attributes().clone(),
            body,
            exchange.uploads(),
        );
        trace!(uri = %request.uri(), body_size = request.body().len(), uploads = request.uploads().len(), "body handled, dispatching");

        let delete_on_end = self.config.delete_uploaded_files_on_end() && self.config.handle_file_uploads();
        match dispatch::dispatch(&self.dispatcher, &request, self.config.unclassified_failure_status()) {
            Finished::Complete(mut response) => {
                if delete_on_end {
                    response.body_mut().set_on_end(move || cleanup.schedule());
                }
                Flow::Respond(response)
            }
            Finished::Suspended(mut suspended) => {
                if delete_on_end {
                    suspended.set_on_end(move || cleanup.schedule());
                }
                Flow::Suspended(suspended)
            }
        }
    }

    /// Reads the whole body and waits for the uploads, failures end up in the failure flag.
    async fn read_body<B>(&self, exchange: &mut Exchange<B>, ctx: &Arc<IngestContext>) -> Bytes
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let kind = exchange.kind();
        let capacity = initial_capacity(exchange.headers(), &self.config);
        let mut accumulator = BodyAccumulator::new(kind, self.config.body_limit(), capacity, Arc::clone(&ctx.failure));

        let mut multipart = None;
        if kind.is_multipart() {
            let content_type = exchange.headers().get(CONTENT_TYPE).and_then(|value| value.to_str().ok());
            match MultipartIngest::prepare(content_type, &self.config, Arc::clone(ctx)).await {
                Ok(ingest) => multipart = Some(ingest),
                Err(e) => fail(ctx, e),
            }
        }

        if !ctx.failure.is_failed() {
            match exchange.take_body() {
                Some(body) => {
                    if let Err(e) = ingest(body, &mut accumulator, multipart.as_mut(), ctx).await {
                        fail(ctx, e);
                    }
                }
                None => debug!(uri = %exchange.uri(), "body already consumed, handle as empty"),
            }
        }

        if let Some(mut ingest) = multipart {
            if !ctx.failure.is_failed() {
                match ingest.finish().await {
                    Ok(form_attributes) => exchange.set_form_attributes(form_attributes),
                    Err(e) => fail(ctx, e),
                }
            }
            // dropping the ingest closes the file part still open
        }

        if !ctx.failure.is_failed() {
            ctx.tracker.stream_end_received();
            ctx.tracker.wait().await;
            trace!(size = accumulator.size(), uploads = ctx.registry.len(), "request body complete");
        }

        accumulator.into_body()
    }
}

async fn ingest<B>(
    body: B,
    accumulator: &mut BodyAccumulator,
    mut multipart: Option<&mut MultipartIngest>,
    ctx: &IngestContext,
) -> Result<(), BodyError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let mut body = pin!(body);
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(BodyError::upstream)?;
        let Ok(data) = frame.into_data() else {
            // trailers
            continue;
        };

        if accumulator.on_chunk(&data)? == Ingest::Forward {
            if let Some(multipart) = multipart.as_deref_mut() {
                multipart.feed(&data, accumulator.size()).await?;
            }
        }

        // an upload task may have failed meanwhile
        if ctx.failure.is_failed() {
            return Ok(());
        }
    }
    Ok(())
}

fn fail(ctx: &IngestContext, error: BodyError) {
    debug!(error = %error, "body ingestion failed");
    ctx.failure.fail(error);
    ctx.cleanup.schedule();
}
