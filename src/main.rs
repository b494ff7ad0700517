//! Private Graph Pool demo
//!
//! Runs one full round against the reference prover: registrations, votes,
//! verification and a reward claim. Pass a JSON config path to override the
//! pool parameters; set RUST_LOG=info to see the state transitions.

use anyhow::{Context, Result};

use private_graph_pool::{
    Ballot, ClaimRequest, PoolConfig, PrivateGraph, ReferenceProver,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => PoolConfig::from_json_file(&path).with_context(|| format!("loading {}", path))?,
        None => PoolConfig::default(),
    };
    let voters_needed = config.verification_threshold.div_ceil(config.registration_value);

    println!("Private Graph Pool demo");
    println!("{}", "=".repeat(60));

    let mut graph = PrivateGraph::new(config, ReferenceProver::new())?;
    let epoch = graph.epoch_for_block(120_000)?;

    let owner = graph.create_address()?;
    let candidate = graph.register_candidate("Jim", epoch)?;
    println!("Registered candidate {} in epoch {}", candidate, epoch);

    let mut recommendations = Vec::new();
    for _ in 0..voters_needed {
        let voter = graph.create_address()?;
        let registration = graph.register_world_id(voter.public)?;
        let weight = registration.coin.value;
        let receipt = graph
            .vote(Ballot {
                coin: &registration.coin,
                secret: voter.secret,
                change_public_key: voter.public,
                recommendation_public_key: owner.public,
                candidate,
                weight,
            })
            .await?;
        recommendations.push(receipt.recommendation_coin);
    }

    let state = graph.candidate(candidate)?;
    println!(
        "Candidate power {} from {} votes",
        state.accumulated_power(),
        state.vote_count()
    );

    let verification = graph.update_status_verified(candidate, epoch)?;
    println!("Verified, minted {} to a fresh address", verification.coin.value);

    let coin = recommendations.first().context("no recommendation coins")?;
    let claim = graph
        .claim(ClaimRequest {
            candidate,
            coin,
            secret: owner.secret,
            reclaim_public_key: owner.public,
            reward_public_key: owner.public,
            current_epoch: epoch,
        })
        .await?;
    println!(
        "Claimed: reclaimed {}, reward {}",
        claim.reclaimed_coin.value, claim.reward_coin.value
    );

    println!("{}", "=".repeat(60));
    for event in graph.drain_events() {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}
