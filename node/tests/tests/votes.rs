use lattice_core::{
    Account, Amount, Block, BlockHash, ConfirmationHeightInfo, TestAccountChain, Vote, VoteCode,
    VoteSource,
};
use lattice_ledger::Ledger;
use lattice_node::{
    consensus::{ActiveElectionsExt, ElectionBehavior},
    stats::{DetailType, Direction, StatType},
    Node,
};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use test_helpers::{assert_timely, System};

const REP_A: u64 = 1000;
const REP_B: u64 = 2000;

fn setup() -> (System, Arc<Node>, Arc<Block>) {
    let mut system = System::new();
    let mut genesis = TestAccountChain::genesis();
    genesis.add_state_send_to(Account::from(42u64), Amount::raw(10));
    let mut config = System::default_config();
    config.online_reps.online_weight_minimum = Amount::raw(60);
    let node = system
        .build_node()
        .config(config)
        .ledger(
            Ledger::new_null_builder()
                .blocks(genesis.blocks())
                .confirmation_height(
                    &genesis.account(),
                    &ConfirmationHeightInfo::new(1, genesis.open()),
                )
                .rep_weight(Account::from(REP_A), Amount::raw(70))
                .rep_weight(Account::from(REP_B), Amount::raw(30))
                .finish(),
        )
        .finish();
    let block = Arc::new(genesis.latest_block().clone().into());
    (system, node, block)
}

fn vote_code(node: &Node, vote: Vote, hash: &BlockHash) -> Option<VoteCode> {
    node.active
        .vote(&Arc::new(vote), VoteSource::Live)
        .get(hash)
        .copied()
}

#[test]
fn vote_for_unknown_block_is_indeterminate() {
    let (_system, node, _) = setup();
    let hash = BlockHash::from(999u64);

    let code = vote_code(&node, Vote::new(Account::from(REP_B), 1, vec![hash]), &hash);

    assert_eq!(code, Some(VoteCode::Indeterminate));
    assert_eq!(
        node.stats.count(
            StatType::ElectionVote,
            DetailType::Indeterminate,
            Direction::In
        ),
        1
    );
}

#[test]
fn repeated_vote_is_a_replay() {
    let (_system, node, block) = setup();
    node.active.insert(&block, ElectionBehavior::Normal);
    let hash = block.hash();

    let first = vote_code(&node, Vote::new(Account::from(REP_B), 1, vec![hash]), &hash);
    let second = vote_code(&node, Vote::new(Account::from(REP_B), 1, vec![hash]), &hash);

    assert_eq!(first, Some(VoteCode::Vote));
    assert_eq!(second, Some(VoteCode::Replay));
}

#[test]
fn newer_live_vote_within_cooldown_is_ignored() {
    let (_system, node, block) = setup();
    node.active.insert(&block, ElectionBehavior::Normal);
    let hash = block.hash();

    vote_code(&node, Vote::new(Account::from(REP_B), 1, vec![hash]), &hash);
    let code = vote_code(&node, Vote::new(Account::from(REP_B), 2, vec![hash]), &hash);

    assert_eq!(code, Some(VoteCode::Ignored));
}

#[test]
fn final_vote_bypasses_cooldown() {
    let (_system, node, block) = setup();
    let (_, election) = node.active.insert(&block, ElectionBehavior::Normal);
    let hash = block.hash();

    vote_code(&node, Vote::new(Account::from(REP_B), 1, vec![hash]), &hash);
    let code = vote_code(&node, Vote::new_final(Account::from(REP_B), vec![hash]), &hash);

    assert_eq!(code, Some(VoteCode::Vote));
    let votes = election.unwrap().votes();
    assert_eq!(votes[&Account::from(REP_B)].timestamp, u64::MAX);
}

#[test]
fn vote_for_recently_confirmed_block_is_a_replay() {
    let (_system, node, block) = setup();
    node.active.insert(&block, ElectionBehavior::Normal);
    let hash = block.hash();
    vote_code(&node, Vote::new(Account::from(REP_A), 1, vec![hash]), &hash);
    assert_timely(Duration::from_secs(5), || node.active.is_empty());

    let code = vote_code(&node, Vote::new(Account::from(REP_B), 5, vec![hash]), &hash);

    assert_eq!(code, Some(VoteCode::Replay));
}

#[test]
fn vote_processed_observers_see_every_vote() {
    let (_system, node, block) = setup();
    node.active.insert(&block, ElectionBehavior::Normal);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_l = Arc::clone(&seen);
    node.active
        .on_vote_processed(Box::new(move |vote, source, results| {
            seen_l
                .lock()
                .unwrap()
                .push((vote.voting_account, source, results.len()));
        }));

    let hash = block.hash();
    vote_code(&node, Vote::new(Account::from(REP_B), 1, vec![hash]), &hash);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![(Account::from(REP_B), VoteSource::Live, 1)]
    );
}
