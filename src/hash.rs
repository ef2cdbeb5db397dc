//! Hash primitives used by the crypto opcodes and the signature digests

use bitcoin_hashes::{sha1 as bh_sha1, sha256d, Hash as BitcoinHash, HashEngine};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::types::Hash;

pub fn sha1(data: &[u8]) -> Vec<u8> {
    bh_sha1::Hash::hash(data).into_inner().to_vec()
}

pub fn sha256(data: &[u8]) -> Vec<u8> {
    Sha256::digest(data).to_vec()
}

pub fn ripemd160(data: &[u8]) -> Vec<u8> {
    Ripemd160::digest(data).to_vec()
}

/// RIPEMD160(SHA256(data))
pub fn hash160(data: &[u8]) -> Vec<u8> {
    Ripemd160::digest(Sha256::digest(data)).to_vec()
}

/// SHA256(SHA256(data))
pub fn hash256(data: &[u8]) -> Vec<u8> {
    double_sha256(data).to_vec()
}

/// SHA256(SHA256(data)) as a fixed-size digest.
pub fn double_sha256(data: &[u8]) -> Hash {
    let mut engine = sha256d::Hash::engine();
    engine.input(data);
    sha256d::Hash::from_engine(engine).into_inner()
}
