//! The frame pipeline between the socket and the codec.
//!
//! Wire layout per frame: `len: VarInt, body`. With compression enabled the
//! body becomes `data_length: VarInt, payload` where `data_length == 0`
//! means the payload is plain and `data_length > 0` means it is
//! zlib-deflated and inflates to exactly that many bytes. Encryption, once
//! enabled, covers every socket byte including the outer length prefix and
//! is applied after compression framing.
//!
//! Both transforms are one-shot: enabling twice (or trying to disable) is
//! an error.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lodestone_pool::{BufferPool, PooledBuf};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::trace;

use crate::buffer::{varint_bytes, ReadBuf};
use crate::crypto::{self, Aes128CfbDec, Aes128CfbEnc};
use crate::error::CodecError;
use crate::MAX_FRAME_LEN;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Read half of the pipeline. Wraps the socket in a [`BufReader`] so the
/// byte-at-a-time outer varint loop does not hit the socket per byte.
pub struct FrameReader<R> {
    inner:       BufReader<R>,
    decrypt:     Option<Aes128CfbDec>,
    compression: bool,
    pool:        BufferPool,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, pool: BufferPool) -> Self {
        Self {
            inner: BufReader::new(inner),
            decrypt: None,
            compression: false,
            pool,
        }
    }

    /// Switch on AES/CFB8 for every byte read from here on. One-shot.
    pub fn enable_encryption(&mut self, secret: &[u8; 16]) -> Result<(), CodecError> {
        if self.decrypt.is_some() {
            return Err(CodecError::Malformed("encryption already enabled"));
        }
        let (_, dec) = crypto::create_ciphers(secret);
        self.decrypt = Some(dec);
        Ok(())
    }

    /// Interpret subsequent frames as compressed. One-shot.
    pub fn enable_compression(&mut self) -> Result<(), CodecError> {
        if self.compression {
            return Err(CodecError::Malformed("compression already enabled"));
        }
        self.compression = true;
        Ok(())
    }

    pub fn compression_enabled(&self) -> bool {
        self.compression
    }

    async fn read_byte(&mut self) -> std::io::Result<u8> {
        let mut byte = [0u8; 1];
        self.inner.read_exact(&mut byte).await?;
        if let Some(cipher) = &mut self.decrypt {
            crypto::decrypt_in_place(cipher, &mut byte);
        }
        Ok(byte[0])
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        self.inner.read_exact(buf).await?;
        if let Some(cipher) = &mut self.decrypt {
            crypto::decrypt_in_place(cipher, buf);
        }
        Ok(())
    }

    /// Outer length prefix, decrypted byte by byte because the cipher state
    /// must advance in stream order.
    async fn read_outer_len(&mut self) -> Result<usize, FrameError> {
        let mut result: u32 = 0;
        for shift in 0..5 {
            let b = self.read_byte().await?;
            result |= ((b & 0x7F) as u32) << (7 * shift);
            if b & 0x80 == 0 {
                let len = result as i32;
                if len <= 0 || len as usize > MAX_FRAME_LEN {
                    return Err(CodecError::Malformed("frame length").into());
                }
                return Ok(len as usize);
            }
        }
        Err(CodecError::Malformed("frame length varint").into())
    }

    /// Read one frame and yield its plaintext body (packet id + fields).
    ///
    /// `Err(Io)` with `UnexpectedEof` on the first length byte means the
    /// peer closed between frames; the caller treats that as a clean close.
    pub async fn read_frame(&mut self) -> Result<PooledBuf, FrameError> {
        let len = self.read_outer_len().await?;
        trace!("[FRAME] inbound frame, {} bytes", len);

        let mut body = self.pool.take_with_capacity(len);
        body.resize(len, 0);
        self.read_exact(&mut body).await?;

        if !self.compression {
            return Ok(body);
        }

        // Compressed framing: data_length varint, then payload.
        let mut cursor = ReadBuf::new(&body);
        let data_length = cursor.read_varint()?;
        let payload_at = len - cursor.remaining();

        if data_length < 0 || data_length as usize > MAX_FRAME_LEN {
            return Err(CodecError::Malformed("data_length").into());
        }

        if data_length == 0 {
            // Uncompressed payload; drop the one-byte header in place.
            body.drain(..payload_at);
            return Ok(body);
        }

        let mut inflated = self.pool.take_with_capacity(data_length as usize);
        let mut decoder = ZlibDecoder::new(&body[payload_at..]);
        decoder
            .read_to_end(&mut inflated)
            .map_err(|_| CodecError::Malformed("zlib payload"))?;

        if inflated.len() != data_length as usize {
            return Err(CodecError::Malformed("data_length mismatch").into());
        }

        Ok(inflated)
    }
}

/// Write half of the pipeline.
pub struct FrameWriter<W> {
    inner:     W,
    encrypt:   Option<Aes128CfbEnc>,
    threshold: Option<i32>,
    pool:      BufferPool,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W, pool: BufferPool) -> Self {
        Self {
            inner,
            encrypt: None,
            threshold: None,
            pool,
        }
    }

    /// Switch on AES/CFB8 for every byte written from here on. One-shot.
    pub fn enable_encryption(&mut self, secret: &[u8; 16]) -> Result<(), CodecError> {
        if self.encrypt.is_some() {
            return Err(CodecError::Malformed("encryption already enabled"));
        }
        let (enc, _) = crypto::create_ciphers(secret);
        self.encrypt = Some(enc);
        Ok(())
    }

    /// Use compressed framing for subsequent frames. One-shot.
    pub fn enable_compression(&mut self, threshold: i32) -> Result<(), CodecError> {
        if self.threshold.is_some() {
            return Err(CodecError::Malformed("compression already enabled"));
        }
        if threshold < 0 {
            return Err(CodecError::OutOfRange("compression threshold"));
        }
        self.threshold = Some(threshold);
        Ok(())
    }

    pub fn compression_enabled(&self) -> bool {
        self.threshold.is_some()
    }

    /// Frame, transform and send one packet body (id + fields).
    pub async fn write_frame(&mut self, body: &[u8]) -> Result<(), FrameError> {
        let mut staged = self.pool.take_with_capacity(body.len() + 16);

        match self.threshold {
            None => {
                staged.extend_from_slice(&varint_bytes(body.len() as i32));
                staged.extend_from_slice(body);
            }
            Some(threshold) => {
                if body.len() >= threshold as usize {
                    let mut encoder =
                        ZlibEncoder::new(Vec::with_capacity(body.len() / 2), Compression::default());
                    encoder.write_all(body)?;
                    let deflated = encoder.finish()?;

                    let data_length = varint_bytes(body.len() as i32);
                    let total = data_length.len() + deflated.len();
                    staged.extend_from_slice(&varint_bytes(total as i32));
                    staged.extend_from_slice(&data_length);
                    staged.extend_from_slice(&deflated);
                } else {
                    staged.extend_from_slice(&varint_bytes(body.len() as i32 + 1));
                    staged.push(0x00);
                    staged.extend_from_slice(body);
                }
            }
        }

        if let Some(cipher) = &mut self.encrypt {
            crypto::encrypt_in_place(cipher, &mut staged);
        }

        trace!("[FRAME] outbound frame, {} bytes on the wire", staged.len());
        self.inner.write_all(&staged).await?;
        self.inner.flush().await?;
        Ok(())
    }
}
