//! Transactions: inputs, outputs, control programs.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};

use ebb_types::{AssetId, PublicKey, Signature, TxId};

/// References one output of an earlier transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub tx: TxId,
    pub index: u32,
}

/// An opaque byte program that locks an output to its owner.
///
/// Programs are not interpreted by the chain; ownership resolution
/// happens in the wallet's program index.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ControlProgram(Vec<u8>);

/// Leading byte of the retirement program; value locked to it is burned.
const OP_FAIL: u8 = 0x6a;

impl ControlProgram {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The program that burns value permanently.
    pub fn retirement() -> Self {
        Self(vec![OP_FAIL])
    }

    /// The anchor program used by filler-block coinbases; no wallet
    /// account ever owns it.
    pub fn anchor() -> Self {
        Self(vec![0x00])
    }

    pub fn is_retirement(&self) -> bool {
        self.0.first() == Some(&OP_FAIL)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// A (pubkey, signature) pair authorizing one input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputWitness {
    pub pubkey: PublicKey,
    pub signature: Signature,
}

/// A transaction input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxInput {
    /// Consumes a previous output. Asset, amount, and program are
    /// carried redundantly so a detaching wallet can restore the
    /// spent output without a lookup.
    Spend {
        source: OutPoint,
        asset: AssetId,
        amount: u64,
        program: ControlProgram,
        witnesses: Vec<InputWitness>,
    },
    /// Mints new units of an asset under its issuance program.
    Issue {
        asset: AssetId,
        amount: u64,
        issuance_program: ControlProgram,
        witnesses: Vec<InputWitness>,
    },
    /// The single input of a coinbase transaction; `height` makes
    /// coinbase ids unique along the chain.
    Coinbase { height: u64 },
}

impl TxInput {
    pub fn asset(&self) -> AssetId {
        match self {
            TxInput::Spend { asset, .. } | TxInput::Issue { asset, .. } => *asset,
            TxInput::Coinbase { .. } => AssetId::NATIVE,
        }
    }

    pub fn amount(&self) -> u64 {
        match self {
            TxInput::Spend { amount, .. } | TxInput::Issue { amount, .. } => *amount,
            TxInput::Coinbase { .. } => 0,
        }
    }

    pub fn witnesses(&self) -> &[InputWitness] {
        match self {
            TxInput::Spend { witnesses, .. } | TxInput::Issue { witnesses, .. } => witnesses,
            TxInput::Coinbase { .. } => &[],
        }
    }

    pub fn witnesses_mut(&mut self) -> Option<&mut Vec<InputWitness>> {
        match self {
            TxInput::Spend { witnesses, .. } | TxInput::Issue { witnesses, .. } => Some(witnesses),
            TxInput::Coinbase { .. } => None,
        }
    }

    /// Feed the witness-free fields into a tx-id hasher.
    fn write_core(&self, hasher: &mut Blake2b<U32>) {
        match self {
            TxInput::Spend {
                source,
                asset,
                amount,
                program,
                ..
            } => {
                hasher.update([0u8]);
                hasher.update(source.tx.as_bytes());
                hasher.update(source.index.to_le_bytes());
                hasher.update(asset.as_bytes());
                hasher.update(amount.to_le_bytes());
                hasher.update(program.as_bytes());
            }
            TxInput::Issue {
                asset,
                amount,
                issuance_program,
                ..
            } => {
                hasher.update([1u8]);
                hasher.update(asset.as_bytes());
                hasher.update(amount.to_le_bytes());
                hasher.update(issuance_program.as_bytes());
            }
            TxInput::Coinbase { height } => {
                hasher.update([2u8]);
                hasher.update(height.to_le_bytes());
            }
        }
    }
}

/// A transaction output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub asset: AssetId,
    pub amount: u64,
    pub program: ControlProgram,
}

/// An ordered list of inputs and outputs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Tx {
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        Self { inputs, outputs }
    }

    /// Build the coinbase transaction for a block at `height`, paying
    /// the subsidy to `program` in the native asset.
    pub fn coinbase(program: ControlProgram, height: u64, subsidy: u64) -> Self {
        Self {
            inputs: vec![TxInput::Coinbase { height }],
            outputs: vec![TxOutput {
                asset: AssetId::NATIVE,
                amount: subsidy,
                program,
            }],
        }
    }

    /// The transaction id: Blake2b-256 over the witness-free body.
    ///
    /// Witnesses are excluded so the id is stable across signing and
    /// usable as the signing message.
    pub fn id(&self) -> TxId {
        let mut hasher = Blake2b::<U32>::new();
        hasher.update(b"ebb.tx.v1");
        hasher.update((self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            input.write_core(&mut hasher);
        }
        hasher.update((self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            hasher.update(output.asset.as_bytes());
            hasher.update(output.amount.to_le_bytes());
            hasher.update(output.program.as_bytes());
        }
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        TxId::new(out)
    }

    pub fn is_coinbase(&self) -> bool {
        matches!(self.inputs.as_slice(), [TxInput::Coinbase { .. }])
    }

    /// The outpoint of this transaction's `index`-th output.
    pub fn outpoint(&self, index: u32) -> OutPoint {
        OutPoint {
            tx: self.id(),
            index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spend(amount: u64, witnesses: Vec<InputWitness>) -> TxInput {
        TxInput::Spend {
            source: OutPoint {
                tx: TxId::new([1u8; 32]),
                index: 0,
            },
            asset: AssetId::new([2u8; 32]),
            amount,
            program: ControlProgram::new(vec![0x51]),
            witnesses,
        }
    }

    #[test]
    fn id_ignores_witnesses() {
        let unsigned = Tx::new(vec![spend(10, vec![])], vec![]);
        let signed = Tx::new(
            vec![spend(
                10,
                vec![InputWitness {
                    pubkey: PublicKey([3u8; 32]),
                    signature: Signature([4u8; 64]),
                }],
            )],
            vec![],
        );
        assert_eq!(unsigned.id(), signed.id());
    }

    #[test]
    fn id_depends_on_amounts() {
        let a = Tx::new(vec![spend(10, vec![])], vec![]);
        let b = Tx::new(vec![spend(11, vec![])], vec![]);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn coinbase_ids_differ_by_height() {
        let a = Tx::coinbase(ControlProgram::anchor(), 1, 50);
        let b = Tx::coinbase(ControlProgram::anchor(), 2, 50);
        assert!(a.is_coinbase() && b.is_coinbase());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn retirement_program_is_recognized() {
        assert!(ControlProgram::retirement().is_retirement());
        assert!(!ControlProgram::anchor().is_retirement());
    }
}
