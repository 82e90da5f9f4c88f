//! Integration tests for the complete mining flow

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use utxo_pow_miner::{
    config::Config,
    core::{Challenge, Difficulty, MiningMode, Nonce},
    store::{FileStore, ProgressStore},
    verify::{VerifyOutcome, verify_proof, verify_proof_with_spend_check},
    workers::{CpuMiner, CpuMinerConfig, Miner},
};

fn nibbles(n: u32) -> Difficulty {
    Difficulty::from_nibbles(n).unwrap()
}

#[tokio::test]
async fn test_cpu_mining_workflow() {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn ProgressStore> = Arc::new(FileStore::new(dir.path()).unwrap());
    let challenge = Challenge::from_canonical("abc123:0");

    let miner = CpuMiner::new(CpuMinerConfig::default(), store.clone());
    let outcome = miner
        .mine(&challenge, nibbles(2), false)
        .await
        .unwrap()
        .expect("difficulty 2 must be reachable for the fixed challenge");

    // deterministic regression vector for this challenge
    assert_eq!(outcome.nonce, Nonce::new(87));
    assert_eq!(outcome.leading_zero_bits, 10);

    // the proof round-trips through the verifier
    let verification = verify_proof(
        &challenge,
        outcome.nonce,
        &outcome.digest.to_hex(),
        nibbles(2),
    );
    assert!(verification.accepted);

    // result persisted, checkpoint cleared
    let result = store.load_result(&challenge).unwrap().unwrap();
    assert_eq!(result.nonce, 87);
    assert!(store.load_checkpoint(&challenge).unwrap().is_none());
}

#[tokio::test]
async fn test_checkpoint_resume_across_restart() {
    let dir = TempDir::new().unwrap();
    let challenge = Challenge::from_canonical("abc123:0");

    // first session: park a checkpoint short of the known solution at 87
    {
        let store: Arc<dyn ProgressStore> = Arc::new(FileStore::new(dir.path()).unwrap());
        let miner = Arc::new(CpuMiner::new(CpuMinerConfig::default(), store.clone()));
        let stopper = miner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            stopper.stop().await.unwrap();
        });
        // unreachable difficulty: this session only accumulates progress
        assert!(miner.mine(&challenge, nibbles(64), false).await.unwrap().is_none());
        let checkpoint = store.load_checkpoint(&challenge).unwrap().unwrap();
        assert!(checkpoint.nonce > 0);
    }

    // second session, fresh process state: resume and finish at a lower bar.
    // The stop above ran well past nonce 87, so the best-so-far restored from
    // the checkpoint must already dominate everything below the cursor.
    {
        let store: Arc<dyn ProgressStore> = Arc::new(FileStore::new(dir.path()).unwrap());
        let resumed_from = store.load_checkpoint(&challenge).unwrap().unwrap().nonce;
        let miner = CpuMiner::new(CpuMinerConfig::default(), store.clone());
        let outcome = miner
            .mine(&challenge, nibbles(1), true)
            .await
            .unwrap()
            .expect("difficulty 1 is reachable from any resume point");
        assert!(
            outcome.nonce.value() >= resumed_from,
            "resume must continue from the checkpoint, not restart"
        );
        assert!(outcome.digest.leading_zero_bits() >= 4);
    }
}

#[tokio::test]
async fn test_stale_checkpoint_from_other_challenge_ignored() {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn ProgressStore> = Arc::new(FileStore::new(dir.path()).unwrap());

    // leave a checkpoint behind for challenge X
    let x = Challenge::from_canonical("X:0");
    let miner = Arc::new(CpuMiner::new(CpuMinerConfig::default(), store.clone()));
    let stopper = miner.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        stopper.stop().await.unwrap();
    });
    miner.mine(&x, nibbles(64), false).await.unwrap();

    // mining Y with resume requested must start from nonce 0; for this
    // challenge the first difficulty-1 digest sits in the first few nonces,
    // far below X's cursor
    let y = Challenge::from_canonical("abc123:0");
    let miner = CpuMiner::new(CpuMinerConfig::default(), store.clone());
    let outcome = miner.mine(&y, nibbles(1), true).await.unwrap().unwrap();
    assert_eq!(outcome.nonce, Nonce::new(1));
}

#[tokio::test]
async fn test_miner_as_trait_object() {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn ProgressStore> = Arc::new(FileStore::new(dir.path()).unwrap());
    let miner: Arc<dyn Miner> = Arc::new(CpuMiner::new(CpuMinerConfig::default(), store));

    assert_eq!(miner.mode(), MiningMode::Sequential);

    let challenge = Challenge::from_canonical("abc123:0");
    let outcome = miner.mine(&challenge, nibbles(1), false).await.unwrap();
    assert_eq!(outcome.unwrap().nonce, Nonce::new(1));
}

#[tokio::test]
async fn test_spend_check_composes_with_mined_proof() {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn ProgressStore> = Arc::new(FileStore::new(dir.path()).unwrap());
    let txid = "a1b2c3d4e5f6789012345678901234567890123456789012345678901234abcd";
    let challenge = Challenge::new(txid, 0).unwrap();

    let miner = CpuMiner::new(CpuMinerConfig::default(), store);
    let outcome = miner.mine(&challenge, nibbles(1), false).await.unwrap().unwrap();
    let digest_hex = outcome.digest.to_hex();

    let unspent = verify_proof_with_spend_check(
        &challenge,
        outcome.nonce,
        &digest_hex,
        nibbles(1),
        |queried_txid, queried_vout| {
            assert_eq!(queried_txid, txid);
            assert_eq!(queried_vout, 0);
            false
        },
    );
    assert!(unspent.accepted);

    let spent = verify_proof_with_spend_check(
        &challenge,
        outcome.nonce,
        &digest_hex,
        nibbles(1),
        |_, _| true,
    );
    assert!(!spent.accepted);
    assert_eq!(spent.outcome, VerifyOutcome::OutputSpent);
}

#[test]
fn test_config_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("miner.toml");
    std::fs::write(
        &path,
        r#"
        [mining]
        difficulty = 3
        worker = "gpu"

        [store]
        dir = "/tmp/pow-store"

        [logging]
        level = "debug"
        "#,
    )
    .unwrap();

    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.mining.difficulty, 3);
    assert_eq!(config.mining.worker, "gpu");
    assert_eq!(config.difficulty().unwrap().bits(), 12);
}

#[test]
fn test_config_rejects_invalid_difficulty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("miner.toml");
    std::fs::write(
        &path,
        r#"
        [mining]
        difficulty = 99

        [store]

        [logging]
        "#,
    )
    .unwrap();
    assert!(Config::from_file(&path).is_err());
}
