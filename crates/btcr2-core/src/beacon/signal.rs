//! Beacon-signal transaction construction (SPEC_FULL §4.4).

use bitcoin::absolute::LockTime;
use bitcoin::key::TapTweak;
use bitcoin::script::PushBytesBuf;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{Keypair, Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, Prevouts, SighashCache, TapSighashType};
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};

use crate::beacon::manager::{BeaconManager, Utxo};
use crate::error::BeaconError;

/// Build an `OP_RETURN`-tagged beacon-signal transaction spending the
/// oldest UTXO owned by `manager`, signing it with the manager's key, and
/// pushing the change output back onto the manager's queue for optimistic
/// reuse (SPEC_FULL §4.4).
///
/// The `OP_RETURN` output is always last — the resolver relies on that
/// ordering to find the commitment.
pub fn build_beacon_signal(
    manager: &mut BeaconManager,
    commitment: [u8; 32],
    fee: u64,
) -> Result<Transaction, BeaconError> {
    let utxo = manager.pop_front().ok_or(BeaconError::InsufficientFunds)?;
    if utxo.value <= fee {
        let value = utxo.value;
        manager.push_front(utxo);
        return Err(BeaconError::AmountOutOfRange { value, fee });
    }

    let refund_value = utxo.value - fee;
    let op_return_script = op_return(&commitment)?;

    let unsigned_tx = Transaction {
        version: Version::ONE,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint {
                txid: utxo.txid,
                vout: utxo.vout,
            },
            script_sig: ScriptBuf::new(),
            sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
            witness: Witness::new(),
        }],
        output: vec![
            TxOut {
                value: Amount::from_sat(refund_value),
                script_pubkey: manager.script_pubkey.clone(),
            },
            TxOut {
                value: Amount::ZERO,
                script_pubkey: op_return_script,
            },
        ],
    };

    let prev_txout = TxOut {
        value: Amount::from_sat(utxo.value),
        script_pubkey: utxo.script_pubkey.clone(),
    };

    let (script_sig, witness) = sign_single_input(&manager.signing_key, &prev_txout, &unsigned_tx)?;

    let mut signed_tx = unsigned_tx;
    signed_tx.input[0].script_sig = script_sig;
    signed_tx.input[0].witness = witness;

    manager.push_back(Utxo {
        txid: signed_tx.compute_txid(),
        vout: 0,
        value: refund_value,
        script_pubkey: manager.script_pubkey.clone(),
    });

    Ok(signed_tx)
}

fn op_return(commitment: &[u8; 32]) -> Result<ScriptBuf, BeaconError> {
    let push = PushBytesBuf::try_from(commitment.to_vec())
        .map_err(|e| BeaconError::SigningFailed(format!("commitment does not fit OP_RETURN: {e}")))?;
    Ok(ScriptBuf::new_op_return(&push))
}

fn sign_single_input(
    signing_key: &bitcoin::PrivateKey,
    prev_txout: &TxOut,
    unsigned_tx: &Transaction,
) -> Result<(ScriptBuf, Witness), BeaconError> {
    let secp = Secp256k1::new();
    let script_pubkey = &prev_txout.script_pubkey;

    if script_pubkey.is_p2wpkh() {
        let mut cache = SighashCache::new(unsigned_tx);
        let sighash = cache
            .p2wpkh_signature_hash(0, script_pubkey, prev_txout.value, EcdsaSighashType::All)
            .map_err(|e| BeaconError::SigningFailed(e.to_string()))?;
        let msg = Message::from_digest(sighash.to_byte_array());
        let sig = secp.sign_ecdsa(&msg, &signing_key.inner);
        let pubkey = signing_key.public_key(&secp);

        let mut sig_bytes = sig.serialize_der().to_vec();
        sig_bytes.push(EcdsaSighashType::All.to_u32() as u8);

        let mut witness = Witness::new();
        witness.push(sig_bytes);
        witness.push(pubkey.to_bytes());
        Ok((ScriptBuf::new(), witness))
    } else if script_pubkey.is_p2pkh() {
        let mut cache = SighashCache::new(unsigned_tx);
        let sighash = cache
            .legacy_signature_hash(0, script_pubkey, EcdsaSighashType::All.to_u32())
            .map_err(|e| BeaconError::SigningFailed(e.to_string()))?;
        let msg = Message::from_digest(sighash.to_byte_array());
        let sig = secp.sign_ecdsa(&msg, &signing_key.inner);
        let pubkey = signing_key.public_key(&secp);

        let mut sig_bytes = sig.serialize_der().to_vec();
        sig_bytes.push(EcdsaSighashType::All.to_u32() as u8);

        let script_sig = bitcoin::blockdata::script::Builder::new()
            .push_slice(PushBytesBuf::try_from(sig_bytes).unwrap())
            .push_slice(PushBytesBuf::try_from(pubkey.to_bytes()).unwrap())
            .into_script();
        Ok((script_sig, Witness::new()))
    } else if script_pubkey.is_p2tr() {
        let mut cache = SighashCache::new(unsigned_tx);
        let prevouts = [prev_txout.clone()];
        let sighash = cache
            .taproot_key_spend_signature_hash(0, &Prevouts::All(&prevouts), TapSighashType::Default)
            .map_err(|e| BeaconError::SigningFailed(e.to_string()))?;
        let msg = Message::from_digest(sighash.to_byte_array());
        let keypair = Keypair::from_secret_key(&secp, &signing_key.inner);
        let tweaked = keypair.tap_tweak(&secp, None).to_inner();
        let sig = secp.sign_schnorr(&msg, &tweaked);

        let mut witness = Witness::new();
        witness.push(sig.as_ref());
        Ok((ScriptBuf::new(), witness))
    } else {
        Err(BeaconError::SigningFailed(
            "beacon script is neither P2PKH, P2WPKH, nor P2TR".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash;
    use bitcoin::key::CompressedPublicKey;
    use bitcoin::{Address, Network as BNetwork, PrivateKey, Txid};

    fn p2wpkh_manager(value: u64) -> BeaconManager {
        let key = PrivateKey::from_slice(&[7u8; 32], bitcoin::NetworkKind::Main).unwrap();
        let secp = Secp256k1::new();
        let pubkey = CompressedPublicKey::from_private_key(&secp, &key).unwrap();
        let address = Address::p2wpkh(&pubkey, BNetwork::Bitcoin);

        let mut manager = BeaconManager::new(address.script_pubkey(), key);
        manager.add_utxo(Utxo {
            txid: Txid::all_zeros(),
            vout: 0,
            value,
            script_pubkey: manager.script_pubkey.clone(),
        });
        manager
    }

    #[test]
    fn op_return_output_is_last_and_amount_zero() {
        let mut manager = p2wpkh_manager(10_000);
        let tx = build_beacon_signal(&mut manager, [0x42; 32], 4000).unwrap();

        assert_eq!(tx.output.len(), 2);
        let last = &tx.output[1];
        assert_eq!(last.value, Amount::ZERO);
        assert!(last.script_pubkey.is_op_return());
    }

    #[test]
    fn change_utxo_is_pushed_back_for_reuse() {
        let mut manager = p2wpkh_manager(10_000);
        build_beacon_signal(&mut manager, [0x01; 32], 4000).unwrap();

        assert_eq!(manager.utxo_count(), 1);
        assert_eq!(manager.total_value(), 6000);
    }

    #[test]
    fn amount_out_of_range_when_fee_exceeds_value() {
        let mut manager = p2wpkh_manager(1000);
        let err = build_beacon_signal(&mut manager, [0x01; 32], 4000).unwrap_err();
        assert!(matches!(err, BeaconError::AmountOutOfRange { .. }));
        // The UTXO is preserved, not lost, on a rejected build.
        assert_eq!(manager.utxo_count(), 1);
    }

    #[test]
    fn insufficient_funds_on_empty_queue() {
        let key = PrivateKey::from_slice(&[7u8; 32], bitcoin::NetworkKind::Main).unwrap();
        let mut manager = BeaconManager::new(ScriptBuf::new(), key);
        let err = build_beacon_signal(&mut manager, [0x01; 32], 4000).unwrap_err();
        assert!(matches!(err, BeaconError::InsufficientFunds));
    }

    #[test]
    fn fifo_signal_sequence_consumes_oldest_first() {
        let key = PrivateKey::from_slice(&[7u8; 32], bitcoin::NetworkKind::Main).unwrap();
        let secp = Secp256k1::new();
        let pubkey = CompressedPublicKey::from_private_key(&secp, &key).unwrap();
        let address = Address::p2wpkh(&pubkey, BNetwork::Bitcoin);
        let mut manager = BeaconManager::new(address.script_pubkey(), key);
        manager.add_utxo(Utxo {
            txid: Txid::all_zeros(),
            vout: 0,
            value: 10_000,
            script_pubkey: manager.script_pubkey.clone(),
        });
        manager.add_utxo(Utxo {
            txid: Txid::all_zeros(),
            vout: 1,
            value: 20_000,
            script_pubkey: manager.script_pubkey.clone(),
        });

        let first_tx = build_beacon_signal(&mut manager, [0x01; 32], 4000).unwrap();
        // First signal should have spent the 10_000 sat UTXO (vout 0).
        assert_eq!(first_tx.input[0].previous_output.vout, 0);

        let second_tx = build_beacon_signal(&mut manager, [0x02; 32], 4000).unwrap();
        // Second signal spends the original 20_000 sat UTXO before the
        // optimistic change from the first signal.
        assert_eq!(second_tx.input[0].previous_output.vout, 1);
    }
}
