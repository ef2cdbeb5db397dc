//! Script model: chunks, parsers, renderers and classification
//!
//! A [`Script`] is an ordered list of [`Chunk`]s. Binary parsing is total:
//! a push whose declared length runs past the end of the input becomes a
//! [`Chunk::Malformed`] tail, so every byte string survives a parse and
//! re-serialization unchanged. Evaluating a malformed tail fails.

use std::fmt;
use std::str::FromStr;

use secp256k1::PublicKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::{
    MAX_DATA_OUT_SCRIPT_SIZE, MAX_PUBKEYS_PER_MULTISIG, MAX_WITNESS_PROGRAM_SIZE,
    MIN_WITNESS_PROGRAM_SIZE,
};
use crate::error::{ConsensusError, ParseError};
use crate::hash;
use crate::opcode::Opcode;
use crate::script_num;
use crate::signature::is_valid_signature_encoding;

const OP_0: u8 = Opcode::OP_0 as u8;
const OP_PUSHDATA1: u8 = Opcode::OP_PUSHDATA1 as u8;
const OP_PUSHDATA2: u8 = Opcode::OP_PUSHDATA2 as u8;
const OP_PUSHDATA4: u8 = Opcode::OP_PUSHDATA4 as u8;
const OP_1NEGATE: u8 = Opcode::OP_1NEGATE as u8;
const OP_1: u8 = Opcode::OP_1 as u8;
const OP_16: u8 = Opcode::OP_16 as u8;

/// One element of a script.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Chunk {
    /// A single non-push opcode byte, including OP_1NEGATE and OP_1..OP_16.
    Op(u8),
    /// A data push. `opcode` is OP_0, a direct length byte 0x01-0x4b or one
    /// of OP_PUSHDATA1/2/4, and `data.len()` equals the declared length.
    Push { opcode: u8, data: Vec<u8> },
    /// Trailing bytes of a push whose length prefix or payload is truncated.
    Malformed(Vec<u8>),
}

impl Chunk {
    /// The shortest push of `data`, never substituting small integer opcodes.
    pub fn push(data: &[u8]) -> Chunk {
        let opcode = match data.len() {
            0 => OP_0,
            len @ 1..=0x4b => len as u8,
            0x4c..=0xff => OP_PUSHDATA1,
            0x100..=0xffff => OP_PUSHDATA2,
            _ => OP_PUSHDATA4,
        };
        Chunk::Push { opcode, data: data.to_vec() }
    }

    /// The leading opcode byte.
    pub fn opcode(&self) -> u8 {
        match self {
            Chunk::Op(op) => *op,
            Chunk::Push { opcode, .. } => *opcode,
            Chunk::Malformed(bytes) => bytes.first().copied().unwrap_or(OP_0),
        }
    }

    /// Pushed bytes, for push chunks.
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Chunk::Push { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Pushed bytes of a push other than OP_0.
    fn payload(&self) -> Option<&[u8]> {
        match self {
            Chunk::Push { opcode, data } if *opcode != OP_0 => Some(data),
            _ => None,
        }
    }

    /// Serialized length in bytes.
    pub fn len(&self) -> usize {
        match self {
            Chunk::Op(_) => 1,
            Chunk::Push { opcode, data } => {
                let prefix = match *opcode {
                    OP_PUSHDATA1 => 2,
                    OP_PUSHDATA2 => 3,
                    OP_PUSHDATA4 => 5,
                    _ => 1,
                };
                prefix + data.len()
            }
            Chunk::Malformed(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Chunk::Op(op) => out.push(*op),
            Chunk::Push { opcode, data } => {
                out.push(*opcode);
                match *opcode {
                    OP_PUSHDATA1 => out.push(data.len() as u8),
                    OP_PUSHDATA2 => out.extend_from_slice(&(data.len() as u16).to_le_bytes()),
                    OP_PUSHDATA4 => out.extend_from_slice(&(data.len() as u32).to_le_bytes()),
                    _ => {}
                }
                out.extend_from_slice(data);
            }
            Chunk::Malformed(bytes) => out.extend_from_slice(bytes),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        self.write_to(&mut out);
        out
    }

    /// True if a push uses the shortest encoding for its data. Non-push
    /// chunks are trivially minimal.
    pub fn is_minimal_push(&self) -> bool {
        let Chunk::Push { opcode, data } = self else {
            return true;
        };
        let opcode = *opcode;
        match data.len() {
            0 => opcode == OP_0,
            // OP_1..OP_16 and OP_1NEGATE should have been used
            1 if (1..=16).contains(&data[0]) || data[0] == 0x81 => false,
            len @ 1..=0x4b => opcode as usize == len,
            0x4c..=0xff => opcode == OP_PUSHDATA1,
            0x100..=0xffff => opcode == OP_PUSHDATA2,
            _ => true,
        }
    }
}

/// Decoded witness program of an output script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WitnessProgram {
    pub version: u8,
    pub program: Vec<u8>,
}

/// Recognized script templates.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptType {
    PubkeyOut,
    PubkeyHashOut,
    PubkeyHashIn,
    ScriptHashOut,
    ScriptHashIn,
    MultisigOut,
    MultisigIn,
    DataOut,
    Unknown,
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScriptType::PubkeyOut => "Pay to public key",
            ScriptType::PubkeyHashOut => "Pay to public key hash",
            ScriptType::PubkeyHashIn => "Spend from public key hash",
            ScriptType::ScriptHashOut => "Pay to script hash",
            ScriptType::ScriptHashIn => "Spend from script hash",
            ScriptType::MultisigOut => "Pay to multisig",
            ScriptType::MultisigIn => "Spend from multisig",
            ScriptType::DataOut => "Data push",
            ScriptType::Unknown => "Unknown",
        })
    }
}

/// A script as an ordered list of chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Script {
    chunks: Vec<Chunk>,
}

impl Script {
    pub fn new() -> Self {
        Script { chunks: Vec::new() }
    }

    pub fn from_chunks(chunks: Vec<Chunk>) -> Self {
        Script { chunks }
    }

    /// Splits raw script bytes into chunks.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut chunks = Vec::new();
        let mut pos = 0;

        while pos < bytes.len() {
            let opcode = bytes[pos];
            let (prefix, declared) = match opcode {
                0x01..=0x4b => (1, Some(opcode as usize)),
                OP_PUSHDATA1 => (2, bytes.get(pos + 1).map(|&len| len as usize)),
                OP_PUSHDATA2 => (
                    3,
                    bytes
                        .get(pos + 1..pos + 3)
                        .map(|len| u16::from_le_bytes([len[0], len[1]]) as usize),
                ),
                OP_PUSHDATA4 => (
                    5,
                    bytes
                        .get(pos + 1..pos + 5)
                        .map(|len| u32::from_le_bytes([len[0], len[1], len[2], len[3]]) as usize),
                ),
                OP_0 => {
                    chunks.push(Chunk::Push { opcode, data: Vec::new() });
                    pos += 1;
                    continue;
                }
                _ => {
                    chunks.push(Chunk::Op(opcode));
                    pos += 1;
                    continue;
                }
            };

            let start = pos + prefix;
            match declared {
                Some(len) if start.checked_add(len).map_or(false, |end| end <= bytes.len()) => {
                    chunks.push(Chunk::Push { opcode, data: bytes[start..start + len].to_vec() });
                    pos = start + len;
                }
                _ => {
                    chunks.push(Chunk::Malformed(bytes[pos..].to_vec()));
                    break;
                }
            }
        }

        Script { chunks }
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, ParseError> {
        let bytes = hex::decode(hex_str).map_err(|_| ParseError::InvalidHex(hex_str.to_string()))?;
        Ok(Script::from_bytes(&bytes))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        for chunk in &self.chunks {
            chunk.write_to(&mut out);
        }
        out
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Serialized length in bytes.
    pub fn len(&self) -> usize {
        self.chunks.iter().map(Chunk::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn push_chunk(mut self, chunk: Chunk) -> Self {
        self.chunks.push(chunk);
        self
    }

    pub fn push_opcode(mut self, opcode: Opcode) -> Self {
        self.chunks.push(match opcode {
            Opcode::OP_0 => Chunk::Push { opcode: OP_0, data: Vec::new() },
            op => Chunk::Op(op as u8),
        });
        self
    }

    /// Appends the shortest push of `data`.
    pub fn push_data(mut self, data: &[u8]) -> Self {
        self.chunks.push(Chunk::push(data));
        self
    }

    /// Appends `n` as a small integer opcode when one exists, else as a
    /// pushed script number.
    pub fn push_int(self, n: i64) -> Self {
        match Opcode::from_small_int(n) {
            Some(op) => self.push_opcode(op),
            None => self.push_data(&script_num::encode(n)),
        }
    }

    /// Chunks from `start` onwards.
    pub fn subscript(&self, start: usize) -> Script {
        Script { chunks: self.chunks.get(start..).unwrap_or_default().to_vec() }
    }

    /// Removes every chunk that serializes exactly like the push of `data`.
    pub fn find_and_delete(&self, data: &[u8]) -> Script {
        let pattern = Chunk::push(data);
        Script {
            chunks: self.chunks.iter().filter(|chunk| **chunk != pattern).cloned().collect(),
        }
    }

    pub fn remove_code_separators(&self) -> Script {
        let separator = Chunk::Op(Opcode::OP_CODESEPARATOR as u8);
        Script {
            chunks: self.chunks.iter().filter(|chunk| **chunk != separator).cloned().collect(),
        }
    }

    /// True if every chunk only pushes data. OP_RESERVED counts as a push.
    pub fn is_push_only(&self) -> bool {
        self.chunks.iter().all(is_push_chunk)
    }

    /// True if the push at `index` uses its shortest encoding.
    pub fn check_minimal_push(&self, index: usize) -> bool {
        self.chunks.get(index).map_or(true, Chunk::is_minimal_push)
    }

    /// A version opcode followed by one direct push of 2-40 bytes.
    pub fn witness_program(&self) -> Option<WitnessProgram> {
        let [version, program] = self.chunks.as_slice() else {
            return None;
        };
        let version = match version {
            Chunk::Push { opcode: OP_0, .. } => 0,
            Chunk::Op(op @ OP_1..=OP_16) => op - OP_1 + 1,
            _ => return None,
        };
        match program {
            Chunk::Push { opcode, data }
                if *opcode as usize == data.len()
                    && (MIN_WITNESS_PROGRAM_SIZE..=MAX_WITNESS_PROGRAM_SIZE)
                        .contains(&data.len()) =>
            {
                Some(WitnessProgram { version, program: data.clone() })
            }
            _ => None,
        }
    }

    pub fn is_witness_program(&self) -> bool {
        self.witness_program().is_some()
    }

    /// `HASH160 <20 bytes> EQUAL`
    pub fn is_script_hash_out(&self) -> bool {
        matches!(
            self.chunks.as_slice(),
            [Chunk::Op(0xa9), Chunk::Push { opcode: 0x14, .. }, Chunk::Op(0x87)]
        )
    }

    /// `DUP HASH160 <20 bytes> EQUALVERIFY CHECKSIG`
    pub fn is_pubkey_hash_out(&self) -> bool {
        match self.chunks.as_slice() {
            [Chunk::Op(0x76), Chunk::Op(0xa9), hash, Chunk::Op(0x88), Chunk::Op(0xac)] => {
                hash.payload().map_or(false, |data| data.len() == 20)
            }
            _ => false,
        }
    }

    /// `<pubkey> CHECKSIG` where the key lies on the curve.
    pub fn is_pubkey_out(&self) -> bool {
        match self.chunks.as_slice() {
            [key, Chunk::Op(0xac)] => key
                .payload()
                .map_or(false, |key| has_pubkey_shape(key) && PublicKey::from_slice(key).is_ok()),
            _ => false,
        }
    }

    /// `<sig> <pubkey>`
    pub fn is_pubkey_hash_in(&self) -> bool {
        match self.chunks.as_slice() {
            [sig, key] => {
                sig.payload().map_or(false, |sig| !sig.is_empty())
                    && key.payload().map_or(false, has_pubkey_shape)
            }
            _ => false,
        }
    }

    /// `<m> <pubkey>... <n> CHECKMULTISIG`
    pub fn is_multisig_out(&self) -> bool {
        let n = self.chunks.len();
        n > 3
            && is_small_int_chunk(&self.chunks[0])
            && self.chunks[1..n - 2].iter().all(|chunk| chunk.payload().is_some())
            && is_small_int_chunk(&self.chunks[n - 2])
            && self.chunks[n - 1] == Chunk::Op(Opcode::OP_CHECKMULTISIG as u8)
    }

    /// `OP_0 <sig>...`
    pub fn is_multisig_in(&self) -> bool {
        match self.chunks.split_first() {
            Some((Chunk::Push { opcode: OP_0, .. }, sigs)) if !sigs.is_empty() => sigs
                .iter()
                .all(|chunk| chunk.payload().map_or(false, is_valid_signature_encoding)),
            _ => false,
        }
    }

    /// `<push>... <redeem script>` where the redeem script is itself a known
    /// template.
    pub fn is_script_hash_in(&self) -> bool {
        if self.chunks.len() <= 1 {
            return false;
        }
        let Some(redeem) = self.chunks.last().and_then(Chunk::payload) else {
            return false;
        };
        let redeem = Script::from_bytes(redeem);
        if redeem.chunks.iter().any(|chunk| matches!(chunk, Chunk::Malformed(_))) {
            return false;
        }
        redeem.classify() != ScriptType::Unknown
    }

    /// `OP_RETURN` followed only by pushes, at most 223 bytes in total.
    pub fn is_data_out(&self) -> bool {
        match self.chunks.split_first() {
            Some((Chunk::Op(0x6a), rest)) => {
                self.len() <= MAX_DATA_OUT_SCRIPT_SIZE && rest.iter().all(is_push_chunk)
            }
            _ => false,
        }
    }

    /// Matches output templates first, then input templates.
    pub fn classify(&self) -> ScriptType {
        if self.is_pubkey_out() {
            ScriptType::PubkeyOut
        } else if self.is_pubkey_hash_out() {
            ScriptType::PubkeyHashOut
        } else if self.is_multisig_out() {
            ScriptType::MultisigOut
        } else if self.is_script_hash_out() {
            ScriptType::ScriptHashOut
        } else if self.is_data_out() {
            ScriptType::DataOut
        } else if self.is_pubkey_hash_in() {
            ScriptType::PubkeyHashIn
        } else if self.is_multisig_in() {
            ScriptType::MultisigIn
        } else if self.is_script_hash_in() {
            ScriptType::ScriptHashIn
        } else {
            ScriptType::Unknown
        }
    }

    /// Any template [`classify`](Script::classify) recognizes.
    pub fn is_standard(&self) -> bool {
        self.classify() != ScriptType::Unknown
    }

    /// Key of a pay-to-pubkey output.
    pub fn get_public_key(&self) -> Option<&[u8]> {
        if !self.is_pubkey_out() {
            return None;
        }
        self.chunks[0].data()
    }

    /// Hash of a pay-to-pubkey-hash output.
    pub fn get_public_key_hash(&self) -> Option<&[u8]> {
        if !self.is_pubkey_hash_out() {
            return None;
        }
        self.chunks[2].data()
    }

    /// Embedded payload: the data of a data output (empty for a bare
    /// OP_RETURN), or the hash of a script hash or pubkey hash output.
    pub fn get_data(&self) -> Option<&[u8]> {
        if self.is_data_out() || self.is_script_hash_out() {
            Some(self.chunks.get(1).and_then(Chunk::data).unwrap_or_default())
        } else if self.is_pubkey_hash_out() {
            self.chunks[2].data()
        } else {
            None
        }
    }

    /// Counts CHECKSIG-family operations. CHECKMULTISIG counts as its key
    /// count when `accurate` is set and a small integer precedes it, else as
    /// the maximum of 20.
    pub fn signature_operations_count(&self, accurate: bool) -> usize {
        let mut count = 0;
        // OP_INVALIDOPCODE
        let mut last_opcode = 0xff;
        for chunk in &self.chunks {
            let opcode = chunk.opcode();
            match Opcode::from_byte(opcode) {
                Some(Opcode::OP_CHECKSIG | Opcode::OP_CHECKSIGVERIFY) => count += 1,
                Some(Opcode::OP_CHECKMULTISIG | Opcode::OP_CHECKMULTISIGVERIFY) => {
                    count += match last_opcode {
                        op @ OP_1..=OP_16 if accurate => usize::from(op - OP_1 + 1),
                        _ => MAX_PUBKEYS_PER_MULTISIG as usize,
                    };
                }
                _ => {}
            }
            last_opcode = opcode;
        }
        count
    }

    /// `<m> <pubkey>... <n> CHECKMULTISIG`. Keys are ordered by their bytes
    /// unless `sort` is false.
    pub fn build_multisig_out<K: AsRef<[u8]>>(
        pubkeys: &[K],
        threshold: usize,
        sort: bool,
    ) -> Result<Script, ConsensusError> {
        if pubkeys.is_empty() || pubkeys.len() > 16 {
            return Err(ConsensusError::InvalidTemplate(format!(
                "multisig needs 1 to 16 keys, got {}",
                pubkeys.len()
            )));
        }
        if threshold > pubkeys.len() {
            return Err(ConsensusError::InvalidTemplate(format!(
                "threshold {} exceeds {} keys",
                threshold,
                pubkeys.len()
            )));
        }
        let mut keys = pubkeys.iter().map(AsRef::as_ref).collect::<Vec<&[u8]>>();
        for key in &keys {
            check_public_key(key)?;
        }
        if sort {
            keys.sort_unstable();
        }

        let mut chunks = Vec::with_capacity(keys.len() + 3);
        chunks.extend(Script::new().push_int(threshold as i64).chunks);
        chunks.extend(keys.into_iter().map(Chunk::push));
        chunks.extend(Script::new().push_int(pubkeys.len() as i64).chunks);
        chunks.push(Chunk::Op(Opcode::OP_CHECKMULTISIG as u8));
        Ok(Script::from_chunks(chunks))
    }

    /// `OP_0 <sig>...`, signatures already carrying their hash type byte.
    pub fn build_multisig_in<S: AsRef<[u8]>>(signatures: &[S]) -> Script {
        signatures
            .iter()
            .fold(Script::new().push_opcode(Opcode::OP_0), |script, sig| script.push_data(sig.as_ref()))
    }

    /// `OP_0 <sig>... <redeem script>` spending a P2SH-wrapped multisig.
    pub fn build_p2sh_multisig_in<K: AsRef<[u8]>, S: AsRef<[u8]>>(
        pubkeys: &[K],
        threshold: usize,
        signatures: &[S],
        sort: bool,
    ) -> Result<Script, ConsensusError> {
        let redeem = Script::build_multisig_out(pubkeys, threshold, sort)?;
        Ok(Script::build_multisig_in(signatures).push_data(&redeem.to_bytes()))
    }

    /// `DUP HASH160 <hash> EQUALVERIFY CHECKSIG`
    pub fn build_public_key_hash_out(pubkey_hash: &[u8; 20]) -> Script {
        pubkey_hash_out(pubkey_hash)
    }

    /// Pay-to-pubkey-hash output locked to `hash160(pubkey)`.
    pub fn build_public_key_hash_out_for_key(pubkey: &[u8]) -> Script {
        pubkey_hash_out(&hash::hash160(pubkey))
    }

    /// `<sig || hash type> <pubkey>`
    pub fn build_public_key_hash_in(pubkey: &[u8], signature: &[u8], sighash_type: u8) -> Script {
        Script::new().push_data(&with_hash_type(signature, sighash_type)).push_data(pubkey)
    }

    /// `<pubkey> CHECKSIG`
    pub fn build_public_key_out(pubkey: &[u8]) -> Result<Script, ConsensusError> {
        check_public_key(pubkey)?;
        Ok(Script::new().push_data(pubkey).push_opcode(Opcode::OP_CHECKSIG))
    }

    /// `<sig || hash type>`
    pub fn build_public_key_in(signature: &[u8], sighash_type: u8) -> Script {
        Script::new().push_data(&with_hash_type(signature, sighash_type))
    }

    /// `HASH160 <hash160(script)> EQUAL`
    pub fn build_script_hash_out(script: &Script) -> Script {
        Script::new()
            .push_opcode(Opcode::OP_HASH160)
            .push_data(&hash::hash160(&script.to_bytes()))
            .push_opcode(Opcode::OP_EQUAL)
    }

    /// `OP_RETURN`, followed by a push of `data` when given.
    pub fn build_data_out(data: Option<&[u8]>) -> Script {
        let script = Script::new().push_opcode(Opcode::OP_RETURN);
        match data {
            Some(data) => script.push_data(data),
            None => script,
        }
    }

    /// The P2SH output committing to this script.
    pub fn to_script_hash_out(&self) -> Script {
        Script::build_script_hash_out(self)
    }

    /// Parses the mnemonic notation.
    ///
    /// Tokens are separated by whitespace: decimal numbers are pushed as
    /// script numbers, `0x` literals are spliced in as raw bytes, `'text'`
    /// is pushed as its bytes and anything else must name an opcode.
    pub fn from_mnemonic(text: &str) -> Result<Self, ParseError> {
        let mut bytes = Vec::new();
        for token in text.split_whitespace() {
            if is_decimal(token) {
                let n: i64 = token
                    .parse()
                    .map_err(|_| ParseError::NumberOutOfRange(token.to_string()))?;
                if !(-0xffff_ffff..=0xffff_ffff).contains(&n) {
                    return Err(ParseError::NumberOutOfRange(token.to_string()));
                }
                bytes.extend(Script::new().push_int(n).to_bytes());
            } else if let Some(raw) = token.strip_prefix("0x") {
                if raw.is_empty() {
                    return Err(ParseError::InvalidHex(token.to_string()));
                }
                bytes.extend(hex::decode(raw).map_err(|_| ParseError::InvalidHex(token.to_string()))?);
            } else if let Some(quoted) = token.strip_prefix('\'') {
                let text = quoted
                    .strip_suffix('\'')
                    .ok_or_else(|| ParseError::UnterminatedString(token.to_string()))?;
                check_push_len(text.len())?;
                Chunk::push(text.as_bytes()).write_to(&mut bytes);
            } else {
                let op = Opcode::from_name(token)
                    .ok_or_else(|| ParseError::UnknownToken(token.to_string()))?;
                bytes.push(op as u8);
            }
        }
        Ok(Script::from_bytes(&bytes))
    }

    /// Renders the mnemonic notation. Parsing the result yields the same
    /// bytes.
    pub fn to_mnemonic(&self) -> String {
        let mut tokens = Vec::with_capacity(self.chunks.len());
        for chunk in &self.chunks {
            match chunk {
                Chunk::Op(op) => tokens.push(opcode_token(*op)),
                Chunk::Push { opcode: OP_0, .. } => tokens.push("OP_0".to_string()),
                Chunk::Push { opcode, data } => {
                    match *opcode {
                        OP_PUSHDATA1 | OP_PUSHDATA2 | OP_PUSHDATA4 => {
                            let prefix = chunk.to_bytes();
                            let len_bytes = &prefix[1..prefix.len() - data.len()];
                            tokens.push(opcode_token(*opcode));
                            tokens.push(format!("0x{}", hex::encode(len_bytes)));
                        }
                        _ => tokens.push(format!("0x{:02x}", opcode)),
                    }
                    if !data.is_empty() {
                        tokens.push(format!("0x{}", hex::encode(data)));
                    }
                }
                Chunk::Malformed(bytes) => tokens.push(format!("0x{}", hex::encode(bytes))),
            }
        }
        tokens.join(" ")
    }

    /// Parses the ASM notation: `0`, `-1`, `OP_` names, `0x` raw bytes and
    /// bare hex data pushed with the shortest prefix.
    pub fn from_asm(text: &str) -> Result<Self, ParseError> {
        let mut bytes = Vec::new();
        for token in text.split_whitespace() {
            match token {
                "0" => bytes.push(OP_0),
                "-1" => bytes.push(OP_1NEGATE),
                _ if token.starts_with("OP_") => {
                    let op = Opcode::from_name(token)
                        .ok_or_else(|| ParseError::UnknownToken(token.to_string()))?;
                    bytes.push(op as u8);
                }
                _ => {
                    if let Some(raw) = token.strip_prefix("0x") {
                        bytes.extend(
                            hex::decode(raw).map_err(|_| ParseError::InvalidHex(token.to_string()))?,
                        );
                    } else {
                        let data = hex::decode(token)
                            .map_err(|_| ParseError::UnknownToken(token.to_string()))?;
                        check_push_len(data.len())?;
                        Chunk::push(&data).write_to(&mut bytes);
                    }
                }
            }
        }
        Ok(Script::from_bytes(&bytes))
    }

    pub fn to_asm(&self) -> String {
        self.chunks
            .iter()
            .map(|chunk| match chunk {
                Chunk::Push { opcode: OP_0, .. } => "0".to_string(),
                Chunk::Push { data, .. } if data.is_empty() => "0".to_string(),
                Chunk::Push { data, .. } => hex::encode(data),
                Chunk::Op(OP_1NEGATE) => "-1".to_string(),
                Chunk::Op(op) => opcode_token(*op),
                Chunk::Malformed(bytes) => format!("0x{}", hex::encode(bytes)),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn opcode_token(op: u8) -> String {
    match Opcode::from_byte(op) {
        Some(opcode) => opcode.name().to_string(),
        None => format!("0x{:02x}", op),
    }
}

fn is_decimal(token: &str) -> bool {
    let digits = token.strip_prefix('-').unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn check_push_len(len: usize) -> Result<(), ParseError> {
    if len > u32::MAX as usize {
        return Err(ParseError::PushTooLarge(len));
    }
    Ok(())
}

fn is_push_chunk(chunk: &Chunk) -> bool {
    match chunk {
        Chunk::Push { .. } => true,
        Chunk::Op(op) => *op <= OP_16,
        Chunk::Malformed(_) => false,
    }
}

fn is_small_int_chunk(chunk: &Chunk) -> bool {
    match chunk {
        Chunk::Push { opcode: OP_0, .. } => true,
        Chunk::Op(op) => (OP_1..=OP_16).contains(op),
        _ => false,
    }
}

fn check_public_key(key: &[u8]) -> Result<(), ConsensusError> {
    if !has_pubkey_shape(key) || PublicKey::from_slice(key).is_err() {
        return Err(ConsensusError::InvalidTemplate(format!(
            "invalid public key {}",
            hex::encode(key)
        )));
    }
    Ok(())
}

fn pubkey_hash_out(pubkey_hash: &[u8]) -> Script {
    Script::new()
        .push_opcode(Opcode::OP_DUP)
        .push_opcode(Opcode::OP_HASH160)
        .push_data(pubkey_hash)
        .push_opcode(Opcode::OP_EQUALVERIFY)
        .push_opcode(Opcode::OP_CHECKSIG)
}

fn with_hash_type(signature: &[u8], sighash_type: u8) -> Vec<u8> {
    let mut sig = Vec::with_capacity(signature.len() + 1);
    sig.extend_from_slice(signature);
    sig.push(sighash_type);
    sig
}

/// 33 bytes with a 02/03 prefix, or 65 bytes with a 04/06/07 prefix.
fn has_pubkey_shape(key: &[u8]) -> bool {
    match key.first() {
        Some(0x02 | 0x03) => key.len() == 33,
        Some(0x04 | 0x06 | 0x07) => key.len() == 65,
        _ => false,
    }
}

impl From<Vec<u8>> for Script {
    fn from(bytes: Vec<u8>) -> Self {
        Script::from_bytes(&bytes)
    }
}

impl From<&[u8]> for Script {
    fn from(bytes: &[u8]) -> Self {
        Script::from_bytes(bytes)
    }
}

impl FromStr for Script {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, ParseError> {
        Script::from_mnemonic(s)
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_mnemonic())
    }
}

impl Serialize for Script {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Script {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex_str = String::deserialize(deserializer)?;
        Script::from_hex(&hex_str).map_err(serde::de::Error::custom)
    }
}
