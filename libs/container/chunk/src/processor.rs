// This file is part of zonekit.
//
// zonekit is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// zonekit is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with zonekit.  If not, see <http://www.gnu.org/licenses/>.

use crate::ChunkError;
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use std::io::{Read, Write};

/// The cipher scheme a `decipher` processor uses. Real fast-file generations
/// each ship a bespoke scheme; `XorStream` is the one concrete, fully
/// reversible scheme implemented here; additional schemes plug in by
/// extending this enum and `encode`/`decode` below.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CipherScheme {
    XorStream,
}

/// One stage of a [`crate::PipelineConfig`]. The list order is the *read*
/// order: decoding applies stages front-to-back, encoding applies their
/// inverses back-to-front, so the two pipelines are always exact reverses of
/// each other (spec: "Read and write pipelines are each other's reverse").
#[derive(Clone, Debug)]
pub enum ChunkProcessorKind {
    Inflate,
    /// LZX-compressed chunks. A bit-exact LZX decoder is out of scope for
    /// this core (same status as the image/texture codecs in the purpose
    /// statement); this reuses the zlib codepath as a structurally
    /// compatible stand-in so the pipeline shape and ordering guarantees are
    /// still exercised end to end. Swap in a real LZX codec by changing this
    /// one match arm.
    InflateLzx,
    Decipher {
        scheme: CipherScheme,
        key_material: Vec<u8>,
    },
}

impl ChunkProcessorKind {
    pub(crate) fn decode(
        &self,
        stream_index: usize,
        input: &[u8],
        max_out: usize,
    ) -> Result<Vec<u8>, ChunkError> {
        match self {
            Self::Inflate | Self::InflateLzx => inflate(input, max_out),
            Self::Decipher {
                scheme,
                key_material,
            } => Ok(decipher(scheme, key_material, stream_index, input)),
        }
    }

    pub(crate) fn encode(&self, stream_index: usize, input: &[u8]) -> Result<Vec<u8>, ChunkError> {
        match self {
            Self::Inflate | Self::InflateLzx => deflate(input),
            Self::Decipher {
                scheme,
                key_material,
            } => Ok(decipher(scheme, key_material, stream_index, input)),
        }
    }
}

fn inflate(input: &[u8], max_out: usize) -> Result<Vec<u8>, ChunkError> {
    let mut decoder = ZlibDecoder::new(input);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|source| ChunkError::Decompress(source.to_string()))?;
    if out.len() > max_out {
        return Err(ChunkError::InvalidChunkSize {
            size: out.len(),
            max: max_out,
        });
    }
    Ok(out)
}

fn deflate(input: &[u8]) -> Result<Vec<u8>, ChunkError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(input)
        .map_err(|source| ChunkError::Decompress(source.to_string()))?;
    encoder
        .finish()
        .map_err(|source| ChunkError::Decompress(source.to_string()))
}

/// Symmetric keystream cipher: `out[i] = in[i] ^ key[i % key.len()] ^
/// salt_byte(stream_index, i)`, where the salt folds in the decode-stream
/// index so that two chunks routed to different streams never share a
/// keystream position. Applying it twice with the same key and stream index
/// is the identity, so `encode` and `decode` are the same function.
fn decipher(scheme: &CipherScheme, key_material: &[u8], stream_index: usize, input: &[u8]) -> Vec<u8> {
    match scheme {
        CipherScheme::XorStream => {
            if key_material.is_empty() {
                return input.to_vec();
            }
            let salt = (stream_index as u32).to_le_bytes();
            input
                .iter()
                .enumerate()
                .map(|(i, &b)| {
                    let k = key_material[i % key_material.len()];
                    let s = salt[i % salt.len()];
                    b ^ k ^ s
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor_stream_is_its_own_inverse() {
        let key = vec![1, 2, 3, 4];
        let plain = b"the quick brown fox".to_vec();
        let enc = decipher(&CipherScheme::XorStream, &key, 2, &plain);
        assert_ne!(enc, plain);
        let dec = decipher(&CipherScheme::XorStream, &key, 2, &enc);
        assert_eq!(dec, plain);
    }

    #[test]
    fn different_stream_index_changes_ciphertext() {
        let key = vec![9, 9, 9];
        let plain = b"0123456789".to_vec();
        let a = decipher(&CipherScheme::XorStream, &key, 0, &plain);
        let b = decipher(&CipherScheme::XorStream, &key, 1, &plain);
        assert_ne!(a, b);
    }

    #[test]
    fn inflate_deflate_round_trip() -> Result<(), ChunkError> {
        let plain = vec![0xAAu8; 1024];
        let compressed = deflate(&plain)?;
        let back = inflate(&compressed, plain.len() + 16)?;
        assert_eq!(back, plain);
        Ok(())
    }
}
