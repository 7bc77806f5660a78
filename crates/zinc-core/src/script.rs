//! Pay-to-pubkey-hash script templates.

use crate::error::CryptoError;

pub const OP_DUP: u8 = 0x76;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_CHECKSIG: u8 = 0xac;

/// Largest push encodable with a single length opcode.
const MAX_DIRECT_PUSH: usize = 75;

/// `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`
pub fn p2pkh_script_pubkey(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.push(OP_DUP);
    script.push(OP_HASH160);
    script.push(20);
    script.extend_from_slice(pubkey_hash);
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}

/// Extract the pubkey hash from a P2PKH locking script.
pub fn parse_p2pkh(script: &[u8]) -> Option<[u8; 20]> {
    match script {
        [OP_DUP, OP_HASH160, 20, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG] if hash.len() == 20 => {
            let mut out = [0u8; 20];
            out.copy_from_slice(hash);
            Some(out)
        }
        _ => None,
    }
}

/// `<signature> <pubkey>`
pub fn p2pkh_script_sig(signature: &[u8], pubkey: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if signature.is_empty() || signature.len() > MAX_DIRECT_PUSH {
        return Err(CryptoError::InvalidSignature);
    }
    if pubkey.is_empty() || pubkey.len() > MAX_DIRECT_PUSH {
        return Err(CryptoError::InvalidPublicKey);
    }
    let mut script = Vec::with_capacity(2 + signature.len() + pubkey.len());
    script.push(signature.len() as u8);
    script.extend_from_slice(signature);
    script.push(pubkey.len() as u8);
    script.extend_from_slice(pubkey);
    Ok(script)
}

/// Split a P2PKH unlocking script into its signature and pubkey pushes.
pub fn parse_p2pkh_script_sig(script: &[u8]) -> Result<(&[u8], &[u8]), CryptoError> {
    let (sig, rest) = split_push(script).ok_or(CryptoError::UnsupportedScript)?;
    let (pubkey, rest) = split_push(rest).ok_or(CryptoError::UnsupportedScript)?;
    if !rest.is_empty() {
        return Err(CryptoError::UnsupportedScript);
    }
    Ok((sig, pubkey))
}

fn split_push(script: &[u8]) -> Option<(&[u8], &[u8])> {
    let (&len, rest) = script.split_first()?;
    let len = len as usize;
    if len == 0 || len > MAX_DIRECT_PUSH || rest.len() < len {
        return None;
    }
    Some(rest.split_at(len))
}
