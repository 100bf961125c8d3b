use std::sync::Arc;

use http::header::UPGRADE;
use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version};

use crate::protocol::{ContentKind, FileUpload, Params};
use crate::upload::UploadRegistry;

/// Whether the body handler already ran for an exchange
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExchangeState {
    Fresh,
    /// the body was read, later passes are reroutes
    Handled,
}

/// One request travelling through the handler, possibly more than once.
///
/// The exchange owns the request head and the not yet consumed body, the parameters
/// parsed from the query string, the form attributes decoded from the body and the
/// uploads written for it. It survives reroutes, so a second pass sees everything the
/// first pass collected.
#[derive(Debug)]
pub struct Exchange<B> {
    head: Parts,
    body: Option<B>,
    state: ExchangeState,
    kind: ContentKind,
    params: Params,
    form_attributes: Params,
    uploads: Arc<UploadRegistry>,
}

impl<B> Exchange<B> {
    pub fn new(request: Request<B>) -> Self {
        let (head, body) = request.into_parts();
        let kind = ContentKind::from_headers(&head.headers);
        let params = query_params(&head.uri);

        Self {
            head,
            body: Some(body),
            state: ExchangeState::Fresh,
            kind,
            params,
            form_attributes: Params::new(),
            uploads: Arc::new(UploadRegistry::new()),
        }
    }

    pub fn method(&self) -> &Method {
        &self.head.method
    }

    pub fn uri(&self) -> &Uri {
        &self.head.uri
    }

    pub fn version(&self) -> Version {
        self.head.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    pub fn form_attributes(&self) -> &Params {
        &self.form_attributes
    }

    /// The uploads recorded so far
    pub fn uploads(&self) -> Vec<FileUpload> {
        self.uploads.snapshot()
    }

    /// Takes the body, `None` once it was consumed.
    pub fn take_body(&mut self) -> Option<B> {
        self.body.take()
    }

    /// Sends the exchange to another target; the parameters are parsed again from the new query.
    pub fn reroute(&mut self, method: Method, uri: Uri) {
        self.head.method = method;
        self.params = query_params(&uri);
        self.head.uri = uri;
    }

    /// Requests whose `Upgrade` header lists `websocket` are never read by the handler.
    pub fn is_upgrade(&self) -> bool {
        self.head
            .headers
            .get(UPGRADE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.split(',').any(|protocol| protocol.trim().eq_ignore_ascii_case("websocket")))
    }

    pub(crate) fn mark_handled(&mut self) {
        self.state = ExchangeState::Handled;
    }

    pub(crate) fn set_form_attributes(&mut self, form_attributes: Params) {
        self.form_attributes = form_attributes;
    }

    pub(crate) fn merge_form_attributes(&mut self) {
        self.params.extend_from(&self.form_attributes);
    }

    pub(crate) fn registry(&self) -> &Arc<UploadRegistry> {
        &self.uploads
    }

    pub(crate) fn head(&self) -> &Parts {
        &self.head
    }
}

fn query_params(uri: &Uri) -> Params {
    uri.query().map_or_else(Params::new, Params::from_query)
}
