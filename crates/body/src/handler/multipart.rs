use std::mem;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::codec::{MultipartDecoder, MultipartItem, PartHeader};
use crate::config::BodyHandlerConfig;
use crate::protocol::{BodyError, FileUpload, MultipartError, Params};
use crate::upload::{IngestContext, UploadSink, spawn_upload};

/// Where the data of the current part goes
#[derive(Debug)]
enum Part {
    Idle,
    File(UploadSink),
    Field { name: String, value: BytesMut },
    /// file data while uploads are not handled, or after the writer stopped
    Discard,
}

/// Routes the decoded parts of a multipart body: fields become form attributes, files
/// are streamed to the uploads directory.
#[derive(Debug)]
pub(crate) struct MultipartIngest {
    decoder: MultipartDecoder,
    buffer: BytesMut,
    part: Part,
    ctx: Arc<IngestContext>,
    /// `None` when file uploads are not handled
    uploads_directory: Option<PathBuf>,
    limit: Option<u64>,
    /// body bytes received so far, fields and part headers included
    received: u64,
    form_attributes: Params,
}

impl MultipartIngest {
    pub(crate) async fn prepare(
        content_type: Option<&str>,
        config: &BodyHandlerConfig,
        ctx: Arc<IngestContext>,
    ) -> Result<Self, BodyError> {
        let content_type = content_type.ok_or(MultipartError::MissingBoundary)?;
        let decoder = MultipartDecoder::from_content_type(content_type)?;

        let uploads_directory = if config.handle_file_uploads() {
            let directory = config.uploads_directory().to_path_buf();
            tokio::fs::create_dir_all(&directory).await.map_err(|e| BodyError::upload_io(directory.clone(), e))?;
            Some(directory)
        } else {
            None
        };

        Ok(Self {
            decoder,
            buffer: BytesMut::new(),
            part: Part::Idle,
            ctx,
            uploads_directory,
            limit: config.body_limit(),
            received: 0,
            form_attributes: Params::new(),
        })
    }

    /// Decodes `chunk`, `received` is the body size including it.
    pub(crate) async fn feed(&mut self, chunk: &Bytes, received: u64) -> Result<(), BodyError> {
        self.received = received;
        self.buffer.extend_from_slice(chunk);
        while let Some(item) = self.decoder.decode(&mut self.buffer)? {
            self.on_item(item).await?;
        }
        Ok(())
    }

    /// Drains the decoder at the end of the body and closes the current part.
    pub(crate) async fn finish(&mut self) -> Result<Params, BodyError> {
        while let Some(item) = self.decoder.decode_eof(&mut self.buffer)? {
            self.on_item(item).await?;
        }
        self.part = Part::Idle;
        Ok(mem::take(&mut self.form_attributes))
    }

    async fn on_item(&mut self, item: MultipartItem) -> Result<(), BodyError> {
        match item {
            MultipartItem::PartStart(header) => self.start_part(&header)?,
            MultipartItem::Data(data) => self.on_data(data).await,
            MultipartItem::PartEnd => {
                if let Part::Field { name, value } = mem::replace(&mut self.part, Part::Idle) {
                    self.form_attributes.append(name, String::from_utf8_lossy(&value));
                }
            }
            MultipartItem::Eof => trace!(received = self.received, "multipart body finished"),
        }
        Ok(())
    }

    fn start_part(&mut self, header: &PartHeader) -> Result<(), BodyError> {
        if !header.is_file() {
            self.part = Part::Field { name: header.name().to_string(), value: BytesMut::new() };
            return Ok(());
        }

        let Some(directory) = &self.uploads_directory else {
            trace!(name = header.name(), "file uploads disabled, discard part");
            self.part = Part::Discard;
            return Ok(());
        };

        let path = directory.join(Uuid::new_v4().to_string());
        let index = self.ctx.registry.register(FileUpload::new(header, path.clone()));

        if let (Some(limit), Some(declared)) = (self.limit, header.content_length()) {
            let size = self.received.saturating_add(declared);
            if size > limit {
                self.ctx.registry.update(index, |upload| upload.fail(0));
                self.part = Part::Discard;
                return Err(BodyError::oversized(size, limit));
            }
        }

        self.ctx.tracker.upload_started();
        debug!(name = header.name(), file_name = header.file_name(), path = %path.display(), "upload started");

        self.part = Part::File(spawn_upload(Arc::clone(&self.ctx), index, path));
        Ok(())
    }

    async fn on_data(&mut self, data: Bytes) {
        match &mut self.part {
            Part::File(sink) => {
                let accepted = sink.send(data).await;
                if !accepted {
                    // the writer failed and already reported it
                    self.part = Part::Discard;
                }
            }
            Part::Field { value, .. } => value.extend_from_slice(&data),
            Part::Discard | Part::Idle => {}
        }
    }
}
