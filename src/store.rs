//! Persisted state layout.
//!
//! A [LedgerImage] is a complete, storage-agnostic picture of a ledger: per account a monotone
//! list of `(ordinal, balance)` pairs, per delegation book the `(ordinal, weight)` history of
//! every edge keyed by `(from, to)` plus the `(from, to, ordinal) -> amount` revocation records,
//! the governance targets, and the lifecycle pointers. Images serialize to JSON through `serde`
//! and to RLP; [LedgerImage::digest] is the Keccak-256 of the RLP form, so two ledgers that went
//! through the same calls have the same digest.

use num_traits::FromPrimitive;
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use serde::{Deserialize, Serialize};

use crate::common::{Addr, Hash, Ordinal, Wei};
use crate::delegation::DelegationMode;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerImage {
    pub ordinal: Ordinal,
    pub cleanup_boundary: Ordinal,
    pub balances: Vec<AccountHistory<Wei>>,
    pub total_supply: Vec<(Ordinal, Wei)>,
    pub governance: Vec<AccountHistory<Addr>>,
    pub books: Vec<BookImage>,
    pub write_book: u64,
    /// `(ordinal, book index)`: which book answered reads from that ordinal on.
    pub read_books: Vec<(Ordinal, u64)>,
    pub pending_switch: Option<Ordinal>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountHistory<T> {
    pub account: Addr,
    pub entries: Vec<(Ordinal, T)>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookImage {
    pub name: String,
    pub floor: Ordinal,
    pub edges: Vec<EdgeHistory>,
    pub revocations: Vec<RevocationRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeHistory {
    pub from: Addr,
    pub to: Addr,
    pub mode: DelegationMode,
    /// Basis points or raw amounts, depending on `mode`.
    pub entries: Vec<(Ordinal, Wei)>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationRecord {
    pub from: Addr,
    pub to: Addr,
    pub mode: DelegationMode,
    pub ordinal: Ordinal,
    pub amount: Wei,
}

impl LedgerImage {
    pub fn digest(&self) -> Hash {
        Hash::hash(&rlp::encode(self))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

fn append_entries<T: Encodable>(s: &mut RlpStream, entries: &[(Ordinal, T)]) {
    s.begin_list(entries.len());
    for (o, v) in entries.iter() {
        s.begin_list(2);
        s.append(o);
        s.append(v);
    }
}

fn decode_entries<T: Decodable>(
    rlp: &Rlp,
) -> Result<Vec<(Ordinal, T)>, DecoderError> {
    rlp.iter().map(|e| Ok((e.val_at(0)?, e.val_at(1)?))).collect()
}

fn append_items<T: Encodable>(s: &mut RlpStream, items: &[T]) {
    s.begin_list(items.len());
    for i in items.iter() {
        s.append(i);
    }
}

fn decode_items<T: Decodable>(rlp: &Rlp) -> Result<Vec<T>, DecoderError> {
    rlp.iter().map(|e| e.as_val()).collect()
}

fn decode_mode(rlp: &Rlp) -> Result<DelegationMode, DecoderError> {
    DelegationMode::from_u8(rlp.as_val()?)
        .ok_or(DecoderError::Custom("unknown delegation mode"))
}

impl Encodable for LedgerImage {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(9);
        s.append(&self.ordinal);
        s.append(&self.cleanup_boundary);
        append_items(s, &self.balances);
        append_entries(s, &self.total_supply);
        append_items(s, &self.governance);
        append_items(s, &self.books);
        s.append(&self.write_book);
        append_entries(s, &self.read_books);
        match self.pending_switch {
            Some(o) => {
                s.begin_list(1);
                s.append(&o);
            }
            None => {
                s.begin_list(0);
            }
        }
    }
}

impl Decodable for LedgerImage {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 9 {
            return Err(DecoderError::RlpIncorrectListLen)
        }
        let pending = rlp.at(8)?;
        Ok(Self {
            ordinal: rlp.val_at(0)?,
            cleanup_boundary: rlp.val_at(1)?,
            balances: decode_items(&rlp.at(2)?)?,
            total_supply: decode_entries(&rlp.at(3)?)?,
            governance: decode_items(&rlp.at(4)?)?,
            books: decode_items(&rlp.at(5)?)?,
            write_book: rlp.val_at(6)?,
            read_books: decode_entries(&rlp.at(7)?)?,
            pending_switch: match pending.item_count()? {
                0 => None,
                _ => Some(pending.val_at(0)?),
            },
        })
    }
}

impl<T: Encodable> Encodable for AccountHistory<T> {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.account);
        append_entries(s, &self.entries);
    }
}

impl<T: Decodable> Decodable for AccountHistory<T> {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Self {
            account: rlp.val_at(0)?,
            entries: decode_entries(&rlp.at(1)?)?,
        })
    }
}

impl Encodable for BookImage {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(4);
        s.append(&self.name);
        s.append(&self.floor);
        append_items(s, &self.edges);
        append_items(s, &self.revocations);
    }
}

impl Decodable for BookImage {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Self {
            name: rlp.val_at(0)?,
            floor: rlp.val_at(1)?,
            edges: decode_items(&rlp.at(2)?)?,
            revocations: decode_items(&rlp.at(3)?)?,
        })
    }
}

impl Encodable for EdgeHistory {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(4);
        s.append(&self.from);
        s.append(&self.to);
        s.append(&(self.mode as u8));
        append_entries(s, &self.entries);
    }
}

impl Decodable for EdgeHistory {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Self {
            from: rlp.val_at(0)?,
            to: rlp.val_at(1)?,
            mode: decode_mode(&rlp.at(2)?)?,
            entries: decode_entries(&rlp.at(3)?)?,
        })
    }
}

impl Encodable for RevocationRecord {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(5);
        s.append(&self.from);
        s.append(&self.to);
        s.append(&(self.mode as u8));
        s.append(&self.ordinal);
        s.append(&self.amount);
    }
}

impl Decodable for RevocationRecord {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Self {
            from: rlp.val_at(0)?,
            to: rlp.val_at(1)?,
            mode: decode_mode(&rlp.at(2)?)?,
            ordinal: rlp.val_at(3)?,
            amount: rlp.val_at(4)?,
        })
    }
}

#[test]
fn test_image_rlp_and_json() {
    let a: Addr = 1u64.into();
    let b: Addr = 2u64.into();
    let image = LedgerImage {
        ordinal: 20,
        cleanup_boundary: 5,
        balances: vec![AccountHistory {
            account: a,
            entries: vec![(5, 1000u64.into()), (12, 800u64.into())],
        }],
        total_supply: vec![(5, 1000u64.into()), (12, 800u64.into())],
        governance: vec![AccountHistory {
            account: a,
            entries: vec![(7, b)],
        }],
        books: vec![BookImage {
            name: "vp".into(),
            floor: 5,
            edges: vec![EdgeHistory {
                from: a,
                to: b,
                mode: DelegationMode::Percentage,
                entries: vec![(10, 5000u64.into())],
            }],
            revocations: vec![RevocationRecord {
                from: a,
                to: b,
                mode: DelegationMode::Percentage,
                ordinal: 15,
                amount: 400u64.into(),
            }],
        }],
        write_book: 0,
        read_books: vec![(0, 0)],
        pending_switch: Some(30),
    };
    let encoded = rlp::encode(&image);
    assert_eq!(rlp::decode::<LedgerImage>(&encoded).unwrap(), image);
    let json = image.to_json().unwrap();
    assert!(json.contains("\"mode\":\"percentage\""));
    assert_eq!(LedgerImage::from_json(&json).unwrap(), image);
    let mut other = image.clone();
    other.pending_switch = None;
    assert_ne!(other.digest(), image.digest());
}
