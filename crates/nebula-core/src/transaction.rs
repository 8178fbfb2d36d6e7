//! Legacy transaction messages
//!
//! Compiles instructions into the ledger's legacy message layout, signs the
//! serialized message and produces the wire bytes submitted over RPC.

use crate::address::Pubkey;
use crate::instruction::Instruction;
use crate::keys::{Signature, TransactionSigner};
use crate::{Error, Result};
use base64::Engine;
use std::fmt;
use std::str::FromStr;

/// Recent blockhash a transaction is anchored to
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Hash([u8; 32]);

impl Hash {
    /// Wrap raw bytes
    pub const fn new_from_array(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Borrow raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self)
    }
}

impl FromStr for Hash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|e| Error::Other(format!("invalid blockhash {}: {}", s, e)))?;
        let array: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| Error::Other(format!("blockhash must be 32 bytes: {}", s)))?;
        Ok(Self(array))
    }
}

/// Signature and read-only counts prefixed to every message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageHeader {
    /// Signatures required (the first N account keys)
    pub num_required_signatures: u8,
    /// Trailing signers that are read-only
    pub num_readonly_signed_accounts: u8,
    /// Trailing non-signers that are read-only
    pub num_readonly_unsigned_accounts: u8,
}

/// Instruction with accounts replaced by indices into the key table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    /// Index of the program id in the key table
    pub program_id_index: u8,
    /// Indices of the instruction's accounts
    pub accounts: Vec<u8>,
    /// Instruction data
    pub data: Vec<u8>,
}

/// Legacy message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Header
    pub header: MessageHeader,
    /// Ordered account keys
    pub account_keys: Vec<Pubkey>,
    /// Recent blockhash
    pub recent_blockhash: Hash,
    /// Compiled instructions
    pub instructions: Vec<CompiledInstruction>,
}

#[derive(Clone, Copy)]
struct KeyFlags {
    is_signer: bool,
    is_writable: bool,
}

impl Message {
    /// Compile `instructions` with `payer` as the first, fee-paying signer.
    ///
    /// Keys are grouped as writable signers, read-only signers, writable
    /// non-signers and read-only non-signers, each in first-seen order.
    pub fn new(instructions: &[Instruction], payer: &Pubkey, recent_blockhash: Hash) -> Result<Self> {
        let mut keys: Vec<(Pubkey, KeyFlags)> = vec![(
            *payer,
            KeyFlags {
                is_signer: true,
                is_writable: true,
            },
        )];
        let mut upsert = |pubkey: Pubkey, is_signer: bool, is_writable: bool| {
            if let Some((_, flags)) = keys.iter_mut().find(|(k, _)| *k == pubkey) {
                flags.is_signer |= is_signer;
                flags.is_writable |= is_writable;
            } else {
                keys.push((
                    pubkey,
                    KeyFlags {
                        is_signer,
                        is_writable,
                    },
                ));
            }
        };
        for ix in instructions {
            for meta in &ix.accounts {
                upsert(meta.pubkey, meta.is_signer, meta.is_writable);
            }
            upsert(ix.program_id, false, false);
        }

        let group = |signer: bool, writable: bool| {
            keys.iter()
                .filter(move |(_, f)| f.is_signer == signer && f.is_writable == writable)
                .map(|(k, _)| *k)
        };
        let writable_signers: Vec<Pubkey> = group(true, true).collect();
        let readonly_signers: Vec<Pubkey> = group(true, false).collect();
        let writable_unsigned: Vec<Pubkey> = group(false, true).collect();
        let readonly_unsigned: Vec<Pubkey> = group(false, false).collect();

        let account_keys: Vec<Pubkey> = writable_signers
            .iter()
            .chain(&readonly_signers)
            .chain(&writable_unsigned)
            .chain(&readonly_unsigned)
            .copied()
            .collect();
        if account_keys.len() > usize::from(u8::MAX) + 1 {
            return Err(Error::TransactionFailed(format!(
                "too many accounts: {}",
                account_keys.len()
            )));
        }

        let index_of = |key: &Pubkey| -> Result<u8> {
            account_keys
                .iter()
                .position(|k| k == key)
                .and_then(|i| u8::try_from(i).ok())
                .ok_or_else(|| Error::Other(format!("account {} missing from key table", key)))
        };
        let compiled = instructions
            .iter()
            .map(|ix| {
                Ok(CompiledInstruction {
                    program_id_index: index_of(&ix.program_id)?,
                    accounts: ix
                        .accounts
                        .iter()
                        .map(|meta| index_of(&meta.pubkey))
                        .collect::<Result<Vec<_>>>()?,
                    data: ix.data.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let header = MessageHeader {
            num_required_signatures: count_u8(writable_signers.len() + readonly_signers.len())?,
            num_readonly_signed_accounts: count_u8(readonly_signers.len())?,
            num_readonly_unsigned_accounts: count_u8(readonly_unsigned.len())?,
        };

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions: compiled,
        })
    }

    /// Accounts whose signatures are required, in signature order
    pub fn signer_keys(&self) -> &[Pubkey] {
        &self.account_keys[..usize::from(self.header.num_required_signatures)]
    }

    /// Fee payer
    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.account_keys.first()
    }

    /// Wire encoding of the message (the bytes that get signed)
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(3 + 1 + self.account_keys.len() * 32 + 32 + 64);
        out.push(self.header.num_required_signatures);
        out.push(self.header.num_readonly_signed_accounts);
        out.push(self.header.num_readonly_unsigned_accounts);

        encode_length(&mut out, self.account_keys.len());
        for key in &self.account_keys {
            out.extend_from_slice(key.as_bytes());
        }
        out.extend_from_slice(self.recent_blockhash.as_bytes());

        encode_length(&mut out, self.instructions.len());
        for ix in &self.instructions {
            out.push(ix.program_id_index);
            encode_length(&mut out, ix.accounts.len());
            out.extend_from_slice(&ix.accounts);
            encode_length(&mut out, ix.data.len());
            out.extend_from_slice(&ix.data);
        }
        out
    }

    /// Base64 of the serialized message, as `getFeeForMessage` expects
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.serialize())
    }
}

fn count_u8(n: usize) -> Result<u8> {
    u8::try_from(n).map_err(|_| Error::TransactionFailed(format!("account count {} overflows", n)))
}

/// Append a compact-u16 length prefix
pub fn encode_length(out: &mut Vec<u8>, len: usize) {
    let mut rem = len;
    loop {
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            out.push(byte);
            break;
        }
        byte |= 0x80;
        out.push(byte);
    }
}

/// Signed (or partially signed) transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// One slot per required signer, default-filled until signed
    pub signatures: Vec<Signature>,
    /// Message being signed
    pub message: Message,
}

impl Transaction {
    /// Wrap a message with empty signature slots
    pub fn new_unsigned(message: Message) -> Self {
        let slots = usize::from(message.header.num_required_signatures);
        Self {
            signatures: vec![Signature::default(); slots],
            message,
        }
    }

    /// Sign with every required signer
    pub fn sign(&mut self, signers: &[&dyn TransactionSigner]) -> Result<()> {
        let message_bytes = self.message.serialize();
        for signer in signers {
            let pubkey = signer.public_key()?;
            let slot = self
                .message
                .signer_keys()
                .iter()
                .position(|k| *k == pubkey)
                .ok_or_else(|| {
                    Error::Other(format!("{} is not a required signer", pubkey))
                })?;
            self.signatures[slot] = signer.sign_message(&message_bytes)?;
        }
        if !self.is_signed() {
            return Err(Error::Other("transaction is missing signatures".to_string()));
        }
        Ok(())
    }

    /// Whether every signature slot is filled
    pub fn is_signed(&self) -> bool {
        self.signatures.iter().all(|s| *s != Signature::default())
    }

    /// Transaction id (the fee payer's signature)
    pub fn signature(&self) -> Option<Signature> {
        self.signatures.first().copied()
    }

    /// Wire bytes
    pub fn serialize(&self) -> Vec<u8> {
        let message = self.message.serialize();
        let mut out = Vec::with_capacity(1 + self.signatures.len() * 64 + message.len());
        encode_length(&mut out, self.signatures.len());
        for sig in &self.signatures {
            out.extend_from_slice(sig.as_bytes());
        }
        out.extend_from_slice(&message);
        out
    }

    /// Base64 wire encoding for `sendTransaction`
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.serialize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{COMPUTE_BUDGET_PROGRAM_ID, SYSTEM_PROGRAM_ID};
    use crate::instruction::{set_compute_unit_price, system_transfer};
    use crate::keys::{verify, SigningKeypair};

    fn key(byte: u8) -> Pubkey {
        Pubkey::new_from_array([byte; 32])
    }

    #[test]
    fn test_compact_length() {
        let cases: [(usize, &[u8]); 5] = [
            (0, &[0x00]),
            (0x7f, &[0x7f]),
            (0x80, &[0x80, 0x01]),
            (0x3fff, &[0xff, 0x7f]),
            (0x4000, &[0x80, 0x80, 0x01]),
        ];
        for (len, expected) in cases {
            let mut out = Vec::new();
            encode_length(&mut out, len);
            assert_eq!(out, expected, "length {}", len);
        }
    }

    #[test]
    fn test_transfer_message_layout() {
        let payer = key(1);
        let to = key(2);
        let msg = Message::new(&[system_transfer(&payer, &to, 10)], &payer, Hash::default()).unwrap();
        assert_eq!(msg.header.num_required_signatures, 1);
        assert_eq!(msg.header.num_readonly_signed_accounts, 0);
        assert_eq!(msg.header.num_readonly_unsigned_accounts, 1);
        assert_eq!(msg.account_keys, vec![payer, to, SYSTEM_PROGRAM_ID]);
        assert_eq!(msg.instructions[0].program_id_index, 2);
        assert_eq!(msg.instructions[0].accounts, vec![0, 1]);

        let bytes = msg.serialize();
        // header + len + 3 keys + blockhash + len + (1 + 1 + 2 + 1 + 12)
        assert_eq!(bytes.len(), 3 + 1 + 96 + 32 + 1 + 17);
        assert_eq!(&bytes[..4], &[1, 0, 1, 3]);
    }

    #[test]
    fn test_priority_fee_instruction_comes_first() {
        let payer = key(1);
        let ixs = [set_compute_unit_price(500), system_transfer(&payer, &key(2), 10)];
        let msg = Message::new(&ixs, &payer, Hash::default()).unwrap();
        let first_program = msg.account_keys[usize::from(msg.instructions[0].program_id_index)];
        assert_eq!(first_program, COMPUTE_BUDGET_PROGRAM_ID);
        assert_eq!(msg.header.num_readonly_unsigned_accounts, 2);
    }

    #[test]
    fn test_payer_deduplicated() {
        let payer = key(1);
        let msg = Message::new(&[system_transfer(&payer, &payer, 10)], &payer, Hash::default()).unwrap();
        assert_eq!(msg.account_keys.len(), 2);
        assert_eq!(msg.instructions[0].accounts, vec![0, 0]);
    }

    #[test]
    fn test_sign_and_serialize() {
        let keypair = SigningKeypair::from_secret_bytes(&[3u8; 32]);
        let payer = keypair.public_key();
        let msg = Message::new(
            &[system_transfer(&payer, &key(9), 1)],
            &payer,
            Hash::new_from_array([7u8; 32]),
        )
        .unwrap();
        let mut tx = Transaction::new_unsigned(msg.clone());
        assert!(!tx.is_signed());
        tx.sign(&[&keypair]).unwrap();
        assert!(tx.is_signed());

        let sig = tx.signature().unwrap();
        assert!(verify(&payer, &msg.serialize(), &sig));

        let wire = tx.serialize();
        assert_eq!(wire[0], 1);
        assert_eq!(&wire[1..65], sig.as_bytes());
        assert_eq!(&wire[65..], msg.serialize().as_slice());
    }

    #[test]
    fn test_sign_rejects_foreign_signer() {
        let keypair = SigningKeypair::from_secret_bytes(&[3u8; 32]);
        let stranger = SigningKeypair::from_secret_bytes(&[4u8; 32]);
        let payer = keypair.public_key();
        let msg = Message::new(&[system_transfer(&payer, &key(9), 1)], &payer, Hash::default()).unwrap();
        let mut tx = Transaction::new_unsigned(msg);
        assert!(tx.sign(&[&stranger]).is_err());
    }

    #[test]
    fn test_hash_text() {
        let hash = Hash::new_from_array([7u8; 32]);
        assert_eq!(hash.to_string().parse::<Hash>().unwrap(), hash);
        assert!("short".parse::<Hash>().is_err());
    }
}
