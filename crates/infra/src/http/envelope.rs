//! Request and response envelopes
//!
//! A [`RequestEnvelope`] is owned by one `send` call. Its body is re-read
//! for every attempt: seekable streams are rewound to the position they had
//! when the call started, forward-only streams can be sent once.

use std::fmt;
use std::io::{Read, Seek, SeekFrom};

use boxsdk_domain::constants::GRANT_TYPE_JWT_BEARER;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::SessionError;

/// Readers that can be rewound for a retry.
pub trait SeekableRead: Read + Seek + Send {}

impl<T: Read + Seek + Send> SeekableRead for T {}

enum StreamReader {
    Seekable(Box<dyn SeekableRead>),
    ForwardOnly(Box<dyn Read + Send>),
}

/// Caller-provided byte stream used as a request body or file part
pub struct BodyStream {
    reader: StreamReader,
    start: Option<u64>,
    consumed: bool,
}

impl BodyStream {
    /// Stream that is rewound before every retry.
    pub fn seekable(reader: impl Read + Seek + Send + 'static) -> Self {
        Self { reader: StreamReader::Seekable(Box::new(reader)), start: None, consumed: false }
    }

    /// Stream that can be sent once; a retry fails with
    /// [`SessionError::NonSeekableStream`].
    pub fn forward_only(reader: impl Read + Send + 'static) -> Self {
        Self { reader: StreamReader::ForwardOnly(Box::new(reader)), start: None, consumed: false }
    }

    #[must_use]
    pub const fn is_seekable(&self) -> bool {
        matches!(self.reader, StreamReader::Seekable(_))
    }

    /// Remember the cursor position the first attempt starts from.
    fn mark(&mut self) -> std::io::Result<()> {
        if let StreamReader::Seekable(reader) = &mut self.reader {
            self.start = Some(reader.stream_position()?);
        }
        Ok(())
    }

    /// Read the remaining bytes, rewinding first if a previous attempt
    /// already consumed the stream.
    fn read_for_attempt(&mut self) -> Result<Vec<u8>, SessionError> {
        if self.consumed {
            match (&mut self.reader, self.start) {
                (StreamReader::Seekable(reader), Some(start)) => {
                    reader.seek(SeekFrom::Start(start))?;
                }
                _ => return Err(SessionError::NonSeekableStream),
            }
        }
        let mut content = Vec::new();
        match &mut self.reader {
            StreamReader::Seekable(reader) => reader.read_to_end(&mut content)?,
            StreamReader::ForwardOnly(reader) => reader.read_to_end(&mut content)?,
        };
        self.consumed = true;
        Ok(content)
    }
}

impl fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyStream")
            .field("seekable", &self.is_seekable())
            .field("start", &self.start)
            .finish()
    }
}

/// One part of a `multipart/form-data` body
#[derive(Debug)]
pub enum MultipartPart {
    Field { name: String, value: String },
    File { name: String, file_name: String, content_type: Option<String>, stream: BodyStream },
}

impl MultipartPart {
    pub fn field(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Field { name: name.into(), value: value.into() }
    }

    pub fn file(name: impl Into<String>, file_name: impl Into<String>, stream: BodyStream) -> Self {
        Self::File { name: name.into(), file_name: file_name.into(), content_type: None, stream }
    }
}

/// Request body
#[derive(Debug, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Bytes(Vec<u8>),
    Json(Value),
    /// `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
    /// Raw upload, `application/octet-stream` unless a content type is set
    Stream(BodyStream),
    Multipart(Vec<MultipartPart>),
}

impl RequestBody {
    pub fn form<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::Form(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    fn form_value(&self, key: &str) -> Option<&str> {
        match self {
            Self::Form(pairs) => pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    fn streams_mut(&mut self) -> Vec<&mut BodyStream> {
        match self {
            Self::Stream(stream) => vec![stream],
            Self::Multipart(parts) => parts
                .iter_mut()
                .filter_map(|part| match part {
                    MultipartPart::File { stream, .. } => Some(stream),
                    MultipartPart::Field { .. } => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Record the start position of every stream in the body.
    pub(crate) fn mark_streams(&mut self) -> std::io::Result<()> {
        for stream in self.streams_mut() {
            stream.mark()?;
        }
        Ok(())
    }

    /// Materialise the body for one transport attempt.
    pub(crate) fn prepare(&mut self) -> Result<TransportBody, SessionError> {
        Ok(match self {
            Self::Empty => TransportBody::Empty,
            Self::Bytes(bytes) => TransportBody::Bytes { content: bytes.clone(), content_type: None },
            Self::Json(value) => TransportBody::Bytes {
                content: serde_json::to_vec(value)
                    .map_err(|e| SessionError::InvalidRequest(format!("unserialisable JSON body: {e}")))?,
                content_type: Some("application/json".to_string()),
            },
            Self::Form(pairs) => {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(pairs.iter())
                    .finish();
                TransportBody::Bytes {
                    content: encoded.into_bytes(),
                    content_type: Some("application/x-www-form-urlencoded".to_string()),
                }
            }
            Self::Stream(stream) => TransportBody::Bytes {
                content: stream.read_for_attempt()?,
                content_type: Some("application/octet-stream".to_string()),
            },
            Self::Multipart(parts) => {
                let mut prepared = Vec::with_capacity(parts.len());
                for part in parts.iter_mut() {
                    prepared.push(match part {
                        MultipartPart::Field { name, value } => TransportPart {
                            name: name.clone(),
                            file_name: None,
                            content_type: None,
                            content: value.clone().into_bytes(),
                        },
                        MultipartPart::File { name, file_name, content_type, stream } => {
                            TransportPart {
                                name: name.clone(),
                                file_name: Some(file_name.clone()),
                                content_type: content_type.clone(),
                                content: stream.read_for_attempt()?,
                            }
                        }
                    });
                }
                TransportBody::Multipart(prepared)
            }
        })
    }
}

/// Everything needed to perform one authenticated Box API call
#[derive(Debug)]
pub struct RequestEnvelope {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
    /// Refresh the token and retry once on 401
    pub auto_renew: bool,
    /// Fail with `ApiError` if a successful response is not JSON
    pub expect_json: bool,
    /// Statuses that must not be retried even if transient
    pub skip_retry_codes: Vec<u16>,
}

impl RequestEnvelope {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            auto_renew: true,
            expect_json: true,
            skip_retry_codes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub const fn with_auto_renew(mut self, auto_renew: bool) -> Self {
        self.auto_renew = auto_renew;
        self
    }

    #[must_use]
    pub const fn with_expect_json(mut self, expect_json: bool) -> Self {
        self.expect_json = expect_json;
        self
    }

    #[must_use]
    pub fn with_skip_retry_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.skip_retry_codes = codes.into_iter().collect();
        self
    }

    /// A JWT-bearer token request sent through the session; the JWT grant
    /// has its own retry policy.
    #[must_use]
    pub fn is_jwt_grant(&self) -> bool {
        self.body.form_value("grant_type") == Some(GRANT_TYPE_JWT_BEARER)
    }
}

/// Body of one transport attempt, fully buffered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportBody {
    Empty,
    Bytes { content: Vec<u8>, content_type: Option<String> },
    Multipart(Vec<TransportPart>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub content: Vec<u8>,
}

/// Request handed to the transport for one attempt
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: TransportBody,
}

/// Raw response of one attempt
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// Status in `200..400`
    pub ok: bool,
}

impl ResponseEnvelope {
    #[must_use]
    pub fn new(status: u16, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self { status, headers, body, ok: (200..400).contains(&status) }
    }

    /// Header value as text, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    #[must_use]
    pub fn is_json(&self) -> bool {
        serde_json::from_slice::<Value>(&self.body).is_ok()
    }

    /// Deserialize the JSON body.
    ///
    /// # Errors
    /// Returns `serde_json::Error` if the body is not valid JSON for `T`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}
