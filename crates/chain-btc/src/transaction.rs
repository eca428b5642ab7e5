use bitcoin::absolute::LockTime;
use bitcoin::script::ScriptBuf;
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::address::decode_address;
use crate::error::BtcError;
use crate::params::ChainParams;
use crate::utxo::select_largest_first;

/// Sequence applied to inputs that do not carry one.
pub const DEFAULT_SEQUENCE: u32 = 0xffff_ffff;

/// Change at or below this value is given to the miner instead.
pub const DEFAULT_DUST_THRESHOLD_SAT: u64 = 546;

/// Signed scriptSig size of a P2PKH input: push(sig 73) + push(pubkey 33).
const P2PKH_SCRIPT_SIG_LEN: usize = 1 + 73 + 1 + 33;

/// Signed scriptSig size of a nested P2WPKH input: push(OP_0 <20 bytes>).
const NESTED_P2WPKH_SCRIPT_SIG_LEN: usize = 1 + 22;

/// Witness bytes of a P2WPKH spend: item count, push(sig 73), push(pubkey 33).
const P2WPKH_WITNESS_LEN: u64 = 1 + 1 + 73 + 1 + 33;

/// Segwit marker and flag.
const WITNESS_HEADER_LEN: u64 = 2;

/// An input to spend, identified by its previous outpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedInput {
    /// Previous transaction id, display (byte-reversed) hex.
    pub txid: String,
    pub vout: u32,
    /// Previous output script. Pre-filled into the scriptSig and used to
    /// classify the input for size estimation.
    pub script: Option<Vec<u8>>,
    /// Previous output value in satoshis.
    pub value: Option<u64>,
    pub sequence: Option<u32>,
}

/// A payment destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub address: String,
    pub value: u64,
}

/// Fee and change settings for [`create_transaction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeOptions {
    /// Fee rate in satoshis per 1000 virtual bytes.
    pub fee_rate_sat_per_kvb: u64,
    pub change_address: String,
    pub dust_threshold_sat: u64,
    /// Spend only as many inputs as needed, largest first.
    pub select_coins: bool,
}

/// Everything needed to assemble an unsigned transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRequest {
    pub inputs: Vec<UnsignedInput>,
    pub recipients: Vec<Recipient>,
    pub lock_time: u32,
    pub fee: Option<FeeOptions>,
}

/// A serialized transaction with its txid and wtxid (display hex).
///
/// `hash` and `witness_hash` are equal when no input carries witness data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub hex: String,
    pub hash: String,
    pub witness_hash: String,
}

impl RawTransaction {
    pub fn from_tx(tx: &Transaction) -> Self {
        Self {
            hex: hex::encode(bitcoin::consensus::serialize(tx)),
            hash: tx.compute_txid().to_string(),
            witness_hash: tx.compute_wtxid().to_string(),
        }
    }
}

/// Result of [`create_transaction`].
#[derive(Debug, Clone)]
pub struct TransactionBuild {
    pub tx: Transaction,
    pub raw: RawTransaction,
    /// Value of the change output, if one was added.
    pub change: Option<u64>,
    /// Total fee paid, when every spent value is known.
    pub fees: Option<u64>,
    pub selected_inputs: usize,
}

/// Spend type of an input, as far as size estimation is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    P2pkh,
    NestedP2wpkh,
    P2wpkh,
}

impl InputKind {
    /// Classifies an input from its previous output script. Inputs without a
    /// script are assumed to be native P2WPKH.
    pub fn classify(script: Option<&[u8]>) -> Self {
        match script {
            None => InputKind::P2wpkh,
            Some([0x00, 0x14, rest @ ..]) if rest.len() == 20 => InputKind::P2wpkh,
            Some([0xa9, 0x14, rest @ .., 0x87]) if rest.len() == 20 => InputKind::NestedP2wpkh,
            // Already a nested scriptSig: push(OP_0 <20 bytes>).
            Some([0x16, 0x00, 0x14, rest @ ..]) if rest.len() == 20 => InputKind::NestedP2wpkh,
            Some(_) => InputKind::P2pkh,
        }
    }

    fn script_sig_len(self) -> usize {
        match self {
            InputKind::P2pkh => P2PKH_SCRIPT_SIG_LEN,
            InputKind::NestedP2wpkh => NESTED_P2WPKH_SCRIPT_SIG_LEN,
            InputKind::P2wpkh => 0,
        }
    }

    fn is_segwit(self) -> bool {
        !matches!(self, InputKind::P2pkh)
    }
}

/// Virtual size of `tx` once signed, with each input's scriptSig and witness
/// estimated from `kinds`.
pub fn estimate_vsize(tx: &Transaction, kinds: &[InputKind]) -> u64 {
    let mut sized = tx.clone();
    for (txin, kind) in sized.input.iter_mut().zip(kinds) {
        txin.script_sig = ScriptBuf::from_bytes(vec![0u8; kind.script_sig_len()]);
        txin.witness = Witness::default();
    }
    let base = bitcoin::consensus::serialize(&sized).len() as u64;

    if !kinds.iter().any(|k| k.is_segwit()) {
        return base;
    }
    let witness: u64 = WITNESS_HEADER_LEN
        + kinds
            .iter()
            .map(|k| if k.is_segwit() { P2WPKH_WITNESS_LEN } else { 1 })
            .sum::<u64>();
    base + witness.div_ceil(4)
}

/// `ceil(rate * vsize / 1000)`.
pub fn fee_for_vsize(fee_rate_sat_per_kvb: u64, vsize: u64) -> Result<u64, BtcError> {
    fee_rate_sat_per_kvb
        .checked_mul(vsize)
        .map(|v| v.div_ceil(1000))
        .ok_or_else(|| BtcError::InvalidAmount("fee overflows".into()))
}

fn build_input(input: &UnsignedInput) -> Result<TxIn, BtcError> {
    let txid: Txid = input
        .txid
        .parse()
        .map_err(|e| BtcError::InvalidTransaction(format!("invalid txid {}: {e}", input.txid)))?;

    Ok(TxIn {
        previous_output: OutPoint::new(txid, input.vout),
        script_sig: ScriptBuf::from_bytes(input.script.clone().unwrap_or_default()),
        sequence: Sequence::from_consensus(input.sequence.unwrap_or(DEFAULT_SEQUENCE)),
        witness: Witness::default(),
    })
}

fn build_output(address: &str, value: u64, params: &ChainParams) -> Result<TxOut, BtcError> {
    let payload = decode_address(address, params)?;
    Ok(TxOut {
        value: Amount::from_sat(value),
        script_pubkey: payload.script_pubkey(),
    })
}

fn sum(values: impl IntoIterator<Item = u64>) -> Result<u64, BtcError> {
    values.into_iter().try_fold(0u64, |acc, v| {
        acc.checked_add(v)
            .ok_or_else(|| BtcError::InvalidAmount("amount total overflows".into()))
    })
}

fn assemble(inputs: Vec<TxIn>, outputs: Vec<TxOut>, lock_time: u32) -> Transaction {
    Transaction {
        version: Version::ONE,
        lock_time: LockTime::from_consensus(lock_time),
        input: inputs,
        output: outputs,
    }
}

/// Builds an unsigned transaction for `request` on `params`.
///
/// Without fee options the inputs and recipients are used as given. With fee
/// options a change output is sized from the estimated signed virtual size;
/// if the inputs cannot cover the recipients plus that fee the call fails
/// with the exact shortfall.
pub fn create_transaction(
    request: &TxRequest,
    params: &ChainParams,
) -> Result<TransactionBuild, BtcError> {
    let outputs = request
        .recipients
        .iter()
        .map(|r| build_output(&r.address, r.value, params))
        .collect::<Result<Vec<_>, _>>()?;
    let total_out = sum(request.recipients.iter().map(|r| r.value))?;
    let inputs = request
        .inputs
        .iter()
        .map(build_input)
        .collect::<Result<Vec<_>, _>>()?;

    let Some(fee) = &request.fee else {
        let fees = match request.inputs.iter().map(|i| i.value).collect::<Option<Vec<_>>>() {
            Some(values) => {
                let total_in = sum(values)?;
                if total_in < total_out {
                    return Err(BtcError::InsufficientFunds {
                        missing: total_out - total_in,
                    });
                }
                Some(total_in - total_out)
            }
            None => None,
        };
        let tx = assemble(inputs, outputs, request.lock_time);
        debug!(
            network = params.name,
            inputs = tx.input.len(),
            outputs = tx.output.len(),
            ?fees,
            "created transaction"
        );
        return Ok(TransactionBuild {
            raw: RawTransaction::from_tx(&tx),
            selected_inputs: tx.input.len(),
            tx,
            change: None,
            fees,
        });
    };

    let values = request
        .inputs
        .iter()
        .enumerate()
        .map(|(idx, i)| i.value.ok_or(BtcError::MissingInputValue(idx)))
        .collect::<Result<Vec<_>, _>>()?;
    let kinds: Vec<InputKind> = request
        .inputs
        .iter()
        .map(|i| InputKind::classify(i.script.as_deref()))
        .collect();
    let change_output = build_output(&fee.change_address, 0, params)?;

    // Fee of spending `selected`, always sized with the change output.
    let fee_for = |selected: &[usize]| -> Result<u64, BtcError> {
        let mut outs = outputs.clone();
        outs.push(change_output.clone());
        let ins = selected.iter().map(|i| inputs[*i].clone()).collect();
        let sel_kinds: Vec<InputKind> = selected.iter().map(|i| kinds[*i]).collect();
        let vsize = estimate_vsize(&assemble(ins, outs, request.lock_time), &sel_kinds);
        fee_for_vsize(fee.fee_rate_sat_per_kvb, vsize)
    };

    let selected: Vec<usize> = if fee.select_coins {
        select_largest_first(&values, total_out, &fee_for)?
    } else {
        (0..inputs.len()).collect()
    };

    let total_in = sum(selected.iter().map(|i| values[*i]))?;
    let fee_sat = fee_for(&selected)?;
    let needed = total_out
        .checked_add(fee_sat)
        .ok_or_else(|| BtcError::InvalidAmount("amount total overflows".into()))?;
    if total_in < needed {
        debug!(network = params.name, missing = needed - total_in, "not enough funds");
        return Err(BtcError::InsufficientFunds {
            missing: needed - total_in,
        });
    }

    let change = total_in - needed;
    let mut outputs = outputs;
    let (change, fees) = if change <= fee.dust_threshold_sat {
        (None, fee_sat + change)
    } else {
        outputs.push(TxOut {
            value: Amount::from_sat(change),
            script_pubkey: change_output.script_pubkey,
        });
        (Some(change), fee_sat)
    };

    let selected_inputs = selected.len();
    let tx = assemble(
        selected.iter().map(|i| inputs[*i].clone()).collect(),
        outputs,
        request.lock_time,
    );
    debug!(
        network = params.name,
        inputs = selected_inputs,
        outputs = tx.output.len(),
        fees,
        ?change,
        "created transaction"
    );

    Ok(TransactionBuild {
        raw: RawTransaction::from_tx(&tx),
        tx,
        change,
        fees: Some(fees),
        selected_inputs,
    })
}

/// Parses a hex transaction in either legacy or witness encoding.
pub fn deserialize_transaction(raw_hex: &str) -> Result<Transaction, BtcError> {
    let bytes = hex::decode(raw_hex)
        .map_err(|e| BtcError::InvalidTransaction(format!("invalid hex: {e}")))?;
    bitcoin::consensus::deserialize(&bytes)
        .map_err(|e| BtcError::InvalidTransaction(format!("failed to decode transaction: {e}")))
}
