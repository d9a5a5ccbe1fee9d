//! HTTP glue: turn an open file into a full, partial, or conditional response.

use std::{io::Cursor, io::SeekFrom, time::SystemTime};

use hyper::{
    Body, HeaderMap, Method, Response, StatusCode,
    header::{
        ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, HeaderName, IF_MODIFIED_SINCE,
        IF_RANGE, IF_UNMODIFIED_SINCE, LAST_MODIFIED, RANGE,
    },
};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, DuplexStream};
use tokio_util::io::ReaderStream;

use crate::{
    errors::ServeError,
    sys_content::core::{
        ByteRange, MultipartPlan, Precondition, RangeDecision, SNIFF_LEN, check_preconditions,
        content_type, format_http_date, if_range_allows, is_unknown, new_boundary, parse_range,
    },
    sys_fsx::core::{Content, SeekRead},
    sys_path::core::RequestPath,
};

const STREAM_CHUNK: usize = 64 * 1024;
const COPY_PIPE: usize = 16 * 1024;

/// Body of a successful response: one span, or several as multipart parts.
enum Transfer {
    Span(ByteRange),
    Multipart(MultipartPlan),
}

impl Transfer {
    fn len(&self) -> u64 {
        match self {
            Self::Span(r) => r.len,
            Self::Multipart(plan) => plan.content_length(),
        }
    }
}

/// Serve `content` with conditional-GET and byte-range support.
///
/// `path` is the logical path (used for the content type). Content that
/// cannot seek is buffered in memory first. With `sendfile` set the body is
/// streamed straight from the handle; otherwise the bytes are copied through
/// an intermediate pipe.
pub async fn serve_content(
    method: &Method,
    headers: &HeaderMap,
    path: &RequestPath,
    modified: SystemTime,
    content: Content,
    sendfile: bool,
) -> Result<Response<Body>, ServeError> {
    let io_err = |e: std::io::Error| ServeError::io("read", path.as_str(), e);

    let mut reader: Box<dyn SeekRead> = match content {
        Content::Seekable(r) => r,
        Content::Stream(mut r) => {
            let mut buf = Vec::new();
            r.read_to_end(&mut buf).await.map_err(io_err)?;
            Box::new(Cursor::new(buf))
        }
    };
    let size = reader.seek(SeekFrom::End(0)).await.map_err(io_err)?;
    reader.seek(SeekFrom::Start(0)).await.map_err(io_err)?;

    let is_get_or_head = method == Method::GET || method == Method::HEAD;
    match check_preconditions(
        is_get_or_head,
        header_str(headers, &IF_UNMODIFIED_SINCE),
        header_str(headers, &IF_MODIFIED_SINCE),
        modified,
    ) {
        Precondition::Proceed => {}
        Precondition::Failed => {
            let b = Response::builder().status(StatusCode::PRECONDITION_FAILED);
            return build(b, Body::empty());
        }
        Precondition::NotModified => {
            let mut b = Response::builder().status(StatusCode::NOT_MODIFIED);
            if !is_unknown(modified) {
                b = b.header(LAST_MODIFIED, format_http_date(modified));
            }
            return build(b, Body::empty());
        }
    }

    let mut head = Vec::with_capacity(SNIFF_LEN);
    (&mut reader)
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .await
        .map_err(io_err)?;
    let ctype = content_type(path.as_str(), &head);

    let mut builder = Response::builder().header(ACCEPT_RANGES, "bytes");
    if !is_unknown(modified) {
        builder = builder.header(LAST_MODIFIED, format_http_date(modified));
    }

    let range_header = if if_range_allows(header_str(headers, &IF_RANGE), modified) {
        header_str(headers, &RANGE)
    } else {
        None
    };
    let plan = match parse_range(range_header, size) {
        RangeDecision::Full => {
            builder = builder.status(StatusCode::OK).header(CONTENT_TYPE, ctype);
            Transfer::Span(ByteRange { start: 0, len: size })
        }
        RangeDecision::Partial(r) => {
            builder = builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(CONTENT_TYPE, ctype)
                .header(CONTENT_RANGE, r.content_range(size));
            Transfer::Span(r)
        }
        RangeDecision::Multipart(ranges) => {
            let plan = MultipartPlan::new(new_boundary(), &ranges, &ctype, size);
            builder = builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(CONTENT_TYPE, plan.content_type());
            Transfer::Multipart(plan)
        }
        RangeDecision::Unsatisfiable => {
            let b = Response::builder()
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(CONTENT_RANGE, format!("bytes */{size}"))
                .header(CONTENT_TYPE, "text/plain; charset=utf-8");
            return build(b, Body::from("invalid range: failed to overlap"));
        }
    };

    builder = builder.header(CONTENT_LENGTH, plan.len());
    if method == Method::HEAD {
        return build(builder, Body::empty());
    }
    let body = match plan {
        Transfer::Span(span) => transfer(reader, span, sendfile).await.map_err(io_err)?,
        Transfer::Multipart(plan) => transfer_parts(reader, plan),
    };
    build(builder, body)
}

async fn transfer(
    mut reader: Box<dyn SeekRead>,
    span: ByteRange,
    sendfile: bool,
) -> std::io::Result<Body> {
    reader.seek(SeekFrom::Start(span.start)).await?;
    let mut limited = reader.take(span.len);
    if sendfile {
        let stream = ReaderStream::with_capacity(limited, STREAM_CHUNK);
        return Ok(Body::wrap_stream(stream));
    }
    // With sendfile off the response never reads the file handle itself:
    // a separate task copies the span into a pipe and the body drains it.
    let (mut tx, rx) = tokio::io::duplex(COPY_PIPE);
    tokio::spawn(async move {
        if let Err(e) = tokio::io::copy(&mut limited, &mut tx).await {
            log::debug!("content copy aborted: {e}");
        }
    });
    Ok(Body::wrap_stream(ReaderStream::new(rx)))
}

/// Multipart bodies interleave generated headers with file spans, so they
/// always go through the pipe.
fn transfer_parts(reader: Box<dyn SeekRead>, plan: MultipartPlan) -> Body {
    let (tx, rx) = tokio::io::duplex(COPY_PIPE);
    tokio::spawn(async move {
        if let Err(e) = write_parts(reader, tx, &plan).await {
            log::debug!("multipart copy aborted: {e}");
        }
    });
    Body::wrap_stream(ReaderStream::new(rx))
}

async fn write_parts(
    mut reader: Box<dyn SeekRead>,
    mut out: DuplexStream,
    plan: &MultipartPlan,
) -> std::io::Result<()> {
    for (header, span) in &plan.parts {
        out.write_all(header.as_bytes()).await?;
        reader.seek(SeekFrom::Start(span.start)).await?;
        tokio::io::copy(&mut (&mut reader).take(span.len), &mut out).await?;
    }
    out.write_all(plan.trailer.as_bytes()).await?;
    out.shutdown().await
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn build(builder: hyper::http::response::Builder, body: Body) -> Result<Response<Body>, ServeError> {
    builder
        .body(body)
        .map_err(|e| ServeError::Internal(format!("building response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;
    use std::time::{Duration, UNIX_EPOCH};

    const DATA: &[u8] = b"0123456789";

    fn modified() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    fn seekable() -> Content {
        Content::Seekable(Box::new(Cursor::new(DATA.to_vec())))
    }

    async fn serve(headers: &[(HeaderName, String)], content: Content, sendfile: bool) -> Response<Body> {
        let mut map = HeaderMap::new();
        for (k, v) in headers {
            map.insert(k.clone(), HeaderValue::from_str(v).unwrap());
        }
        let path = RequestPath::normalize("/a.txt");
        serve_content(&Method::GET, &map, &path, modified(), content, sendfile)
            .await
            .unwrap()
    }

    async fn body(resp: Response<Body>) -> Vec<u8> {
        hyper::body::to_bytes(resp.into_body()).await.unwrap().to_vec()
    }

    #[tokio::test]
    async fn full_content_with_headers() {
        for sendfile in [true, false] {
            let resp = serve(&[], seekable(), sendfile).await;
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(resp.headers()[CONTENT_LENGTH], "10");
            assert_eq!(resp.headers()[ACCEPT_RANGES], "bytes");
            assert_eq!(resp.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
            assert_eq!(resp.headers()[LAST_MODIFIED], format_http_date(modified()));
            assert_eq!(body(resp).await, DATA);
        }
    }

    #[tokio::test]
    async fn single_range_is_partial() {
        for sendfile in [true, false] {
            let resp = serve(&[(RANGE, "bytes=2-4".into())], seekable(), sendfile).await;
            assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
            assert_eq!(resp.headers()[CONTENT_RANGE], "bytes 2-4/10");
            assert_eq!(body(resp).await, b"234");
        }
    }

    #[tokio::test]
    async fn several_ranges_are_multipart() {
        for sendfile in [true, false] {
            let resp = serve(&[(RANGE, "bytes=0-1,4-5".into())], seekable(), sendfile).await;
            assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
            let ctype = resp.headers()[CONTENT_TYPE].to_str().unwrap().to_string();
            let boundary = ctype
                .strip_prefix("multipart/byteranges; boundary=")
                .expect("multipart content type")
                .to_string();
            let length: usize = resp.headers()[CONTENT_LENGTH].to_str().unwrap().parse().unwrap();

            let body = String::from_utf8(body(resp).await).unwrap();
            assert_eq!(body.len(), length);
            let want = format!(
                "--{b}\r\nContent-Range: bytes 0-1/10\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n01\r\n\
                 --{b}\r\nContent-Range: bytes 4-5/10\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n45\r\n\
                 --{b}--\r\n",
                b = boundary
            );
            assert_eq!(body, want);
        }
    }

    #[tokio::test]
    async fn unsatisfiable_range() {
        let resp = serve(&[(RANGE, "bytes=20-".into())], seekable(), true).await;
        assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(resp.headers()[CONTENT_RANGE], "bytes */10");
    }

    #[tokio::test]
    async fn stale_if_range_serves_everything() {
        let headers = [
            (RANGE, "bytes=2-4".to_string()),
            (IF_RANGE, format_http_date(modified() - Duration::from_secs(5))),
        ];
        let resp = serve(&headers, seekable(), true).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body(resp).await, DATA);
    }

    #[tokio::test]
    async fn conditional_requests() {
        let resp = serve(&[(IF_MODIFIED_SINCE, format_http_date(modified()))], seekable(), true).await;
        assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
        assert!(body(resp).await.is_empty());

        let earlier = format_http_date(modified() - Duration::from_secs(1));
        let resp = serve(&[(IF_UNMODIFIED_SINCE, earlier)], seekable(), true).await;
        assert_eq!(resp.status(), StatusCode::PRECONDITION_FAILED);
    }

    #[tokio::test]
    async fn streams_are_buffered_and_still_support_ranges() {
        let stream = Content::Stream(Box::new(Cursor::new(DATA.to_vec())));
        let resp = serve(&[(RANGE, "bytes=-3".into())], stream, true).await;
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(body(resp).await, b"789");
    }

    #[tokio::test]
    async fn head_sends_no_body() {
        let path = RequestPath::normalize("/a.txt");
        let resp = serve_content(&Method::HEAD, &HeaderMap::new(), &path, modified(), seekable(), true)
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_LENGTH], "10");
        assert!(body(resp).await.is_empty());
    }
}
