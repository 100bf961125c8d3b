//! Payloads shared by the benchmarks.

use bytes::{BufMut, Bytes, BytesMut};

pub const BOUNDARY: &str = "----bench-boundary-7MA4YWxkTrZu0gW";

#[derive(Debug, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    payload: Bytes,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, payload: Bytes) -> Self {
        Self { name, group, payload }
    }

    /// A multipart body with `fields` text fields and one file of `file_size` bytes
    pub fn multipart(name: &'static str, group: TestGroup, fields: usize, file_size: usize) -> Self {
        Self::new(name, group, multipart_payload(fields, file_size))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// The payload cut in chunks of `chunk_size` bytes, the way a transport delivers it
    pub fn chunks(&self, chunk_size: usize) -> Vec<Bytes> {
        let mut chunks = Vec::with_capacity(self.payload.len() / chunk_size + 1);
        let mut offset = 0;
        while offset < self.payload.len() {
            let end = (offset + chunk_size).min(self.payload.len());
            chunks.push(self.payload.slice(offset..end));
            offset = end;
        }
        chunks
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}

pub fn content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

fn multipart_payload(fields: usize, file_size: usize) -> Bytes {
    let mut buf = BytesMut::with_capacity(file_size + fields * 128 + 256);

    for index in 0..fields {
        buf.put_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        buf.put_slice(format!("Content-Disposition: form-data; name=\"field{index}\"\r\n\r\n").as_bytes());
        buf.put_slice(format!("value of field {index}\r\n").as_bytes());
    }

    buf.put_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    buf.put_slice(b"Content-Disposition: form-data; name=\"file\"; filename=\"data.bin\"\r\n");
    buf.put_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    // dashes and CRLFs make the delimiter search work for its money
    for index in 0..file_size {
        buf.put_u8(match index % 64 {
            0 => b'\r',
            1 => b'\n',
            2 | 3 => b'-',
            n => b'a' + (n % 26) as u8,
        });
    }
    buf.put_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    buf.freeze()
}
