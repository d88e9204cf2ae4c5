//! Checksummed blob downloads.

use crate::http::{BlobResponse, Transport};
use crate::GlareError;
use md5::{Digest, Md5};
use std::fmt::Write as _;
use std::io::{self, Read};
use tracing::{debug, warn};

/// Streaming reader over a downloaded blob.
///
/// The MD5 digest is updated inline as the consumer reads. When the stream
/// ends it is compared against the `Content-MD5` the service declared; a
/// mismatch surfaces as an `InvalidData` read error wrapping
/// [`GlareError::Integrity`], after every byte has been delivered.
///
/// Dropping the reader closes the underlying connection.
pub struct BlobReader {
    body: Box<dyn Read>,
    hasher: Md5,
    expected: Option<String>,
    content_length: Option<u64>,
    finished: bool,
}

impl BlobReader {
    /// Start downloading the blob at `path`.
    ///
    /// A 301/302 from the service is followed exactly once, through
    /// [`Transport::get_external`], so service credentials never reach the
    /// external store.
    pub fn open<T: Transport + ?Sized>(transport: &T, path: &str) -> Result<Self, GlareError> {
        let resp = transport.get_blob(path)?;
        if !resp.is_redirect() {
            return Ok(Self::new(resp));
        }
        let location = resp.location.clone().ok_or_else(|| {
            GlareError::InvalidEndpoint(format!("location not returned with {}", resp.status))
        })?;
        debug!("blob {path} redirected to external store");
        let declared = resp.content_md5.clone();
        drop(resp);
        let mut external = transport.get_external(&location)?;
        if declared.is_some() {
            external.content_md5 = declared;
        }
        Ok(Self::new(external))
    }

    pub fn new(resp: BlobResponse) -> Self {
        if resp.content_md5.is_none() {
            debug!("no Content-MD5 declared, blob checksum will not be verified");
        }
        Self {
            body: resp.body,
            hasher: Md5::new(),
            expected: resp.content_md5,
            content_length: resp.content_length,
            finished: false,
        }
    }

    /// Skip checksum verification for this download.
    #[must_use]
    pub fn without_verification(mut self) -> Self {
        self.expected = None;
        self
    }

    /// Length announced by the server, if any.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn expected_md5(&self) -> Option<&str> {
        self.expected.as_deref()
    }

    fn finish(&mut self) -> io::Result<usize> {
        self.finished = true;
        self.body = Box::new(io::empty());
        let Some(expected) = self.expected.take() else {
            return Ok(0);
        };
        let actual = hex(&std::mem::take(&mut self.hasher).finalize());
        if actual.eq_ignore_ascii_case(expected.trim()) {
            return Ok(0);
        }
        warn!("blob checksum mismatch: got {actual}, expected {expected}");
        Err(GlareError::Integrity { actual, expected }.into_io())
    }
}

impl Read for BlobReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.finished || buf.is_empty() {
            return Ok(0);
        }
        let n = self.body.read(buf)?;
        if n == 0 {
            return self.finish();
        }
        if self.expected.is_some() {
            self.hasher.update(&buf[..n]);
        }
        Ok(n)
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(32), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}
