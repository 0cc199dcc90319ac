use anyhow::{Error, Result};
use bytes::Bytes;
use hkdf::Hkdf;
use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};
use sha2::Sha256;

pub struct Crypto;

impl Crypto {
    fn std_rng() -> StdRng {
        StdRng::from_entropy()
    }

    pub fn random_bytes(len: usize) -> Bytes {
        let mut rng = Self::std_rng();
        let mut pad_buf = vec![0u8; len];

        rng.fill_bytes(&mut pad_buf);
        pad_buf.into()
    }

    pub fn random_u8() -> u8 {
        Self::std_rng().gen()
    }

    /// A random integer in `[low, high]`.
    pub fn random_range(low: u64, high: u64) -> u64 {
        Self::std_rng().gen_range(low..=high)
    }

    pub fn hkdf_sha256(ikm: &[u8], salt: &[u8], info: &[u8], len: usize) -> Result<Bytes> {
        let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
        let mut okm = vec![0u8; len];

        hk.expand(info, &mut okm)
            .map_err(|_| Error::msg(format!("{} is not a valid length for hkdf-sha256 output", len)))?;

        Ok(okm.into())
    }
}
