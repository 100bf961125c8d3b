//! Feeds an in-memory multipart request through the body handler.
//!
//! ```sh
//! cargo run -p micro-body --example upload_demo
//! ```

use std::convert::Infallible;

use bytes::Bytes;
use futures::stream;
use http::header::CONTENT_TYPE;
use http::{Request, StatusCode};
use http_body::Frame;
use http_body_util::{BodyExt, StreamBody};
use micro_body::{BodyHandler, BodyHandlerConfig, DispatchError, DispatchRequest, DispatchResponse, Exchange, Flow};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

const BOUNDARY: &str = "demo-boundary";

fn report(request: &DispatchRequest, response: &mut DispatchResponse) -> Result<(), DispatchError> {
    let title = request.params().get("title").ok_or_else(|| DispatchError::failure(StatusCode::BAD_REQUEST))?;

    response.write(format!("title: {title}\n"));
    for upload in request.uploads() {
        info!(
            name = upload.name(),
            file_name = upload.file_name(),
            size = upload.size(),
            path = %upload.uploaded_path().display(),
            "received upload"
        );
        response.write(format!("{} -> {} bytes\n", upload.file_name().unwrap_or("-"), upload.size()));
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let uploads_directory = std::env::temp_dir().join("micro-body-demo");
    let config = BodyHandlerConfig::default()
        .set_uploads_directory(&uploads_directory)
        .set_body_limit(Some(1024 * 1024))
        .set_delete_uploaded_files_on_end(true);
    let handler = BodyHandler::new(config, report);

    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"title\"\r\n\r\n\
         quarterly report\r\n\
         --{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"report\"; filename=\"report.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         region,total\r\nnorth,10\r\nsouth,12\r\n\
         --{BOUNDARY}--\r\n"
    );
    // deliver the payload in small pieces, like a slow client would
    let frames: Vec<Result<Frame<Bytes>, Infallible>> =
        body.as_bytes().chunks(16).map(|chunk| Ok(Frame::data(Bytes::copy_from_slice(chunk)))).collect();

    let request = Request::post("/reports")
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(StreamBody::new(stream::iter(frames)))
        .expect("demo request should be valid");
    let mut exchange = Exchange::new(request);

    let response = match handler.handle(&mut exchange).await {
        Flow::Respond(response) => response,
        Flow::Suspended(suspended) => suspended.await,
        Flow::Next => {
            error!("the handler passed the exchange through");
            return;
        }
    };

    let status = response.status();
    match response.into_body().collect().await {
        Ok(collected) => info!(%status, body = %String::from_utf8_lossy(&collected.to_bytes()), "response"),
        Err(e) => error!(cause = %e, "failed to read response body"),
    }
}
