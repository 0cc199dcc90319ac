use anyhow::{Error, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use chacha20poly1305::{
    aead::{Aead, NewAead},
    ChaCha20Poly1305, Key, Nonce,
};

use crate::{
    options::ServiceType,
    pipeline::{Context, Preset},
    presets::PRESET_ERP,
    utils::{
        buffer::{get_chunks, num_to_buf_be, num_to_buf_le},
        crypto::Crypto,
        fmt::ToHex,
    },
};

const MAX_CHUNK_SIZE: usize = 0x3FFF;
const SALT_SIZE: usize = 32;
const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;
const HKDF_INFO: &str = "bp-subkey";

/// # Protocol
///
/// Header
/// +--------+------------+-----+
/// |  Salt  | DataFrame  | ... |
/// +--------+------------+-----+
/// |   32   |  Variable  | ... |
/// +--------+------------+-----+
///
/// DataFrame
/// +------------+----------------+------------+-----------+---------------+------------+-----------+
/// | PaddingLen | PaddingLen Tag |  Padding   |  ChunkLen |  ChunkLen Tag |   Chunk    | Chunk Tag |
/// +------------+----------------+------------+-----------+---------------+------------+-----------+
/// |     1      |       16       |  Variable  |     2     |       16      |  Variable  |    16     |
/// +------------+----------------+------------+-----------+---------------+------------+-----------+
///
/// # Explain
///
/// * Salt is randomly generated by the client and only sent once, from client to server.
/// * HKDF-SHA256 with the salt and info = "bp-subkey" expands the key into two subkeys,
///   the first one for client to server and the second one for server to client.
/// * AEAD cipher ChaCha20Poly1305 (RFC 8439) is used to encrypt PaddingLen, ChunkLen and Chunk.
/// * Nonce is little-endian and counting from 0 per direction, each DataFrame increases it three times.
/// * The length of Chunk must <= 0x3FFF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Salt,
    PaddingLen,
    Padding(usize),
    ChunkLen,
    Chunk(usize),
}

pub struct Erp {
    service_type: ServiceType,
    raw_key: String,
    salt: Option<Bytes>,
    salt_sent: bool,
    encoder: Option<ChaCha20Poly1305>,
    decoder: Option<ChaCha20Poly1305>,
    encrypt_nonce: u128,
    decrypt_nonce: u128,
    state: DecodeState,
    buffer: BytesMut,
}

impl Erp {
    pub fn new(key: &str, service_type: ServiceType) -> Result<Self> {
        let mut erp = Self {
            service_type,
            raw_key: key.to_string(),
            salt: None,
            salt_sent: false,
            encoder: None,
            decoder: None,
            encrypt_nonce: 0,
            decrypt_nonce: 0,
            state: DecodeState::Salt,
            buffer: BytesMut::new(),
        };

        // only client side generates salt, server side learns it from the stream
        if service_type.is_client() {
            let salt = Crypto::random_bytes(SALT_SIZE);
            erp.derive_keys(&salt)?;
            erp.salt = Some(salt);
            erp.state = DecodeState::PaddingLen;
        }

        Ok(erp)
    }

    fn derive_keys(&mut self, salt: &[u8]) -> Result<()> {
        let okm = Crypto::hkdf_sha256(self.raw_key.as_bytes(), salt, HKDF_INFO.as_bytes(), KEY_SIZE * 2)?;
        let (upstream, downstream) = okm.split_at(KEY_SIZE);

        let upstream = ChaCha20Poly1305::new(Key::from_slice(upstream));
        let downstream = ChaCha20Poly1305::new(Key::from_slice(downstream));

        let (encoder, decoder) = match self.service_type {
            ServiceType::Client => (upstream, downstream),
            ServiceType::Server => (downstream, upstream),
        };

        self.encoder = Some(encoder);
        self.decoder = Some(decoder);

        Ok(())
    }

    fn encrypt(&mut self, plain_text: &[u8]) -> Result<Bytes> {
        let cipher = self.encoder.as_ref().ok_or_else(|| Error::msg("key is not derived yet"))?;

        let nonce = num_to_buf_le(self.encrypt_nonce, NONCE_SIZE);
        let cipher_text = cipher
            .encrypt(Nonce::from_slice(&nonce), plain_text)
            .map_err(|_| Error::msg("encrypt failed"))?;

        self.encrypt_nonce += 1;

        Ok(cipher_text.into())
    }

    fn decrypt(&mut self, cipher_text: &[u8]) -> Result<Bytes> {
        let cipher = self.decoder.as_ref().ok_or_else(|| Error::msg("key is not derived yet"))?;

        let nonce = num_to_buf_le(self.decrypt_nonce, NONCE_SIZE);
        let plain_text = cipher.decrypt(Nonce::from_slice(&nonce), cipher_text).map_err(|_| {
            Error::msg(format!(
                "decrypt failed, nonce = {} cipher_text = {}",
                ToHex(&nonce),
                ToHex(cipher_text)
            ))
        })?;

        self.decrypt_nonce += 1;

        Ok(plain_text.into())
    }

    fn get_random_bytes_len(chunk_len: usize) -> usize {
        if chunk_len > 1440 {
            return 0;
        }
        let rand = Crypto::random_u8() as usize;
        if chunk_len > 1300 {
            rand % 31
        } else if chunk_len > 900 {
            rand % 127
        } else if chunk_len > 400 {
            rand % 521
        } else {
            // PaddingLen is a single byte
            rand % 255
        }
    }

    fn encode(&mut self, buf: Bytes) -> Result<Bytes> {
        let mut frames = BytesMut::with_capacity(SALT_SIZE + buf.len() + 256);

        if !self.salt_sent {
            if let Some(salt) = self.salt.as_ref() {
                frames.put_slice(salt);
            }
            self.salt_sent = true;
        }

        for chunk in get_chunks(buf, MAX_CHUNK_SIZE) {
            let pad_len = Self::get_random_bytes_len(chunk.len());

            // PaddingLen + PaddingLen Tag
            let enc_pad_len = self.encrypt(&num_to_buf_be(pad_len as u64, 1))?;
            frames.put(enc_pad_len);

            // Padding
            frames.put(Crypto::random_bytes(pad_len));

            // ChunkLen + ChunkLen Tag
            let enc_chunk_len = self.encrypt(&num_to_buf_be(chunk.len() as u64, 2))?;
            frames.put(enc_chunk_len);

            // Chunk + Chunk Tag
            let enc_chunk = self.encrypt(&chunk)?;
            frames.put(enc_chunk);
        }

        Ok(frames.freeze())
    }

    /// Decode as many complete DataFrames as buffered, partial frames wait for more bytes.
    fn decode(&mut self, buf: Bytes) -> Result<Vec<Bytes>> {
        self.buffer.extend_from_slice(&buf);

        let mut chunks = vec![];

        loop {
            let need = match self.state {
                DecodeState::Salt => SALT_SIZE,
                DecodeState::PaddingLen => 1 + TAG_SIZE,
                DecodeState::Padding(n) => n,
                DecodeState::ChunkLen => 2 + TAG_SIZE,
                DecodeState::Chunk(n) => n + TAG_SIZE,
            };

            if self.buffer.len() < need {
                return Ok(chunks);
            }

            let frame = self.buffer.split_to(need).freeze();
            let state = self.state;

            self.state = match state {
                DecodeState::Salt => {
                    self.derive_keys(&frame)?;
                    DecodeState::PaddingLen
                }
                DecodeState::PaddingLen => {
                    let pad_len = self.decrypt(&frame)?;
                    DecodeState::Padding(pad_len[0] as usize)
                }
                DecodeState::Padding(_) => DecodeState::ChunkLen,
                DecodeState::ChunkLen => {
                    let mut chunk_len = self.decrypt(&frame)?;
                    let chunk_len = chunk_len.get_u16() as usize;

                    if chunk_len > MAX_CHUNK_SIZE {
                        return Err(Error::msg(format!(
                            "ChunkLen must <= {:#06x} but got {:#06x}",
                            MAX_CHUNK_SIZE, chunk_len
                        )));
                    }
                    DecodeState::Chunk(chunk_len)
                }
                DecodeState::Chunk(_) => {
                    chunks.push(self.decrypt(&frame)?);
                    DecodeState::PaddingLen
                }
            };
        }
    }

    fn on_encode(&mut self, buf: Bytes, ctx: &mut Context) {
        match self.encode(buf) {
            Ok(data) => ctx.next(data),
            Err(err) => ctx.fail(err.to_string()),
        }
    }

    fn on_decode(&mut self, buf: Bytes, ctx: &mut Context) {
        match self.decode(buf) {
            Ok(chunks) => chunks.into_iter().filter(|c| !c.is_empty()).for_each(|c| ctx.next(c)),
            Err(err) => ctx.fail(err.to_string()),
        }
    }
}

impl Preset for Erp {
    fn name(&self) -> &'static str {
        PRESET_ERP
    }

    fn client_out(&mut self, buf: Bytes, ctx: &mut Context) {
        self.on_encode(buf, ctx);
    }

    fn server_out(&mut self, buf: Bytes, ctx: &mut Context) {
        self.on_encode(buf, ctx);
    }

    fn server_in(&mut self, buf: Bytes, ctx: &mut Context) {
        self.on_decode(buf, ctx);
    }

    fn client_in(&mut self, buf: Bytes, ctx: &mut Context) {
        self.on_decode(buf, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Direction;

    fn encode(erp: &mut Erp, data: &'static [u8]) -> Bytes {
        let mut ctx = Context::new(0, Direction::Upward);
        erp.client_out(Bytes::from_static(data), &mut ctx);
        ctx.take_outputs().remove(0)
    }

    #[test]
    fn test_client_to_server_in_pieces() {
        let mut client = Erp::new("key", ServiceType::Client).unwrap();
        let mut server = Erp::new("key", ServiceType::Server).unwrap();

        let mut stream = encode(&mut client, b"hello").to_vec();
        stream.extend_from_slice(&encode(&mut client, b"world"));

        let mut ctx = Context::new(0, Direction::Downward);
        for piece in stream.chunks(7) {
            server.server_in(Bytes::copy_from_slice(piece), &mut ctx);
        }

        assert!(!ctx.is_failed());
        assert_eq!(
            ctx.take_outputs(),
            vec![Bytes::from_static(b"hello"), Bytes::from_static(b"world")]
        );
    }

    #[test]
    fn test_server_to_client() {
        let mut client = Erp::new("key", ServiceType::Client).unwrap();
        let mut server = Erp::new("key", ServiceType::Server).unwrap();

        let mut ctx = Context::new(0, Direction::Downward);
        server.server_in(encode(&mut client, b"ping"), &mut ctx);

        let mut ctx = Context::new(0, Direction::Upward);
        server.server_out(Bytes::from_static(b"pong"), &mut ctx);
        let frame = ctx.take_outputs().remove(0);

        let mut ctx = Context::new(0, Direction::Downward);
        client.client_in(frame, &mut ctx);
        assert_eq!(ctx.take_outputs(), vec![Bytes::from_static(b"pong")]);
    }

    #[test]
    fn test_wrong_key_fails() {
        let mut client = Erp::new("key", ServiceType::Client).unwrap();
        let mut server = Erp::new("another key", ServiceType::Server).unwrap();

        let mut ctx = Context::new(0, Direction::Downward);
        server.server_in(encode(&mut client, b"hello"), &mut ctx);

        assert!(ctx.is_failed());
        assert!(ctx.take_outputs().is_empty());
    }
}
