use rama::{
    error::{BoxError, ErrorContext as _},
    http::{Body, HeaderMap, body::util::BodyDataStream, header::CONTENT_TYPE},
    telemetry::tracing,
};

use crate::chaos::Attachment;

/// Read the upload body and return the first file part found in it.
///
/// Uploads which are not multipart, or which cannot be parsed,
/// are treated as uploads without attachment.
pub async fn read_attachment(headers: &HeaderMap, body: Body) -> Option<Attachment> {
    let Some(boundary) = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|content_type| multer::parse_boundary(content_type).ok())
    else {
        tracing::debug!("upload body is not multipart/form-data: ignore body");
        return None;
    };

    match try_read_attachment(body, boundary).await {
        Ok(attachment) => attachment,
        Err(err) => {
            tracing::debug!("failed to parse multipart upload body; treat as no attachment: {err}");
            None
        }
    }
}

async fn try_read_attachment(body: Body, boundary: String) -> Result<Option<Attachment>, BoxError> {
    // streamed: only the size of each part is kept
    let mut multipart = multer::Multipart::new(BodyDataStream::new(body), boundary);
    let mut attachment = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .context("read next multipart field")?
    {
        let file_name = field.file_name().map(str::to_owned);

        let mut size = 0u64;
        while let Some(chunk) = field.chunk().await.context("read multipart field chunk")? {
            size += chunk.len() as u64;
        }

        if let (None, Some(file_name)) = (&attachment, file_name) {
            tracing::trace!(%file_name, size, "multipart file field found");
            attachment = Some(Attachment { file_name, size });
        }
    }

    Ok(attachment)
}
