use lattice_core::{
    Account, Amount, Block, ConfirmationHeightInfo, PublicKey, TestAccountChain, Vote, VoteCode,
    VoteSource,
};
use lattice_ledger::Ledger;
use lattice_node::{
    config::NodeConfig,
    consensus::{
        ActiveElectionsExt, ElectionBehavior, ElectionNetworkAction, ElectionStatusType,
        NullElectionNetwork, NullElectionScheduler,
    },
    stats::{DetailType, Direction, StatType},
    Node,
};
use std::{collections::HashMap, sync::Arc, time::Duration};
use test_helpers::{assert_always_eq, assert_timely, assert_timely_eq, System};

const TIMEOUT: Duration = Duration::from_secs(5);
const REP_A: u64 = 1000;
const REP_B: u64 = 2000;

/// Genesis plus one unconfirmed send. REP_A alone can reach quorum, REP_B can not.
fn setup_chain() -> TestAccountChain {
    let mut genesis = TestAccountChain::genesis();
    genesis.add_state_send_to(Account::from(42u64), Amount::raw(10));
    genesis
}

fn ledger_for(chain: &TestAccountChain) -> Ledger {
    Ledger::new_null_builder()
        .blocks(chain.blocks())
        .confirmation_height(
            &chain.account(),
            &ConfirmationHeightInfo::new(1, chain.open()),
        )
        .rep_weight(Account::from(REP_A), Amount::raw(70))
        .rep_weight(Account::from(REP_B), Amount::raw(30))
        .finish()
}

fn node_config() -> NodeConfig {
    let mut config = System::default_config();
    config.online_reps.online_weight_minimum = Amount::raw(60);
    config
}

fn make_node(system: &mut System, chain: &TestAccountChain) -> Arc<Node> {
    system
        .build_node()
        .config(node_config())
        .ledger(ledger_for(chain))
        .finish()
}

fn frontier_block(chain: &TestAccountChain) -> Arc<Block> {
    Arc::new(chain.latest_block().clone().into())
}

fn live_vote(rep: u64, timestamp: u64, block: &Block) -> Arc<Vote> {
    Arc::new(Vote::new(Account::from(rep), timestamp, vec![block.hash()]))
}

fn confirmation_height(node: &Node, account: &Account) -> u64 {
    let txn = node.ledger.read_txn();
    node.ledger
        .get_confirmation_height(&txn, account)
        .unwrap_or_default()
        .height
}

#[test]
fn vote_with_quorum_confirms_and_cements() {
    let mut system = System::new();
    let chain = setup_chain();
    let node = make_node(&mut system, &chain);
    let block = frontier_block(&chain);

    let (inserted, election) = node.active.insert(&block, ElectionBehavior::Normal);
    assert!(inserted);
    let election = election.unwrap();

    let result = node.active.vote(&live_vote(REP_A, 1, &block), VoteSource::Live);
    assert_eq!(result.get(&block.hash()), Some(&VoteCode::Vote));
    assert!(election.is_confirmed());

    assert_timely_eq(
        TIMEOUT,
        || confirmation_height(&node, &chain.account()),
        2,
    );
    assert_timely_eq(TIMEOUT, || node.active.len(), 0);
    assert_timely_eq(TIMEOUT, || node.active.election_winner_details_len(), 0);
    assert!(node
        .active
        .recently_confirmed
        .exists(&block.qualified_root()));

    assert_timely_eq(TIMEOUT, || node.active.recently_cemented.len(), 1);
    let status = node.active.recently_cemented.list().remove(0);
    assert_eq!(status.winner_hash(), block.hash());
    assert!(matches!(
        status.election_status_type,
        ElectionStatusType::ActiveConfirmedQuorum | ElectionStatusType::ActiveConfirmationHeight
    ));
    assert_eq!(status.tally, Amount::raw(70));
}

#[test]
fn vote_below_quorum_does_not_confirm() {
    let mut system = System::new();
    let chain = setup_chain();
    let node = make_node(&mut system, &chain);
    let block = frontier_block(&chain);
    let (_, election) = node.active.insert(&block, ElectionBehavior::Normal);
    let election = election.unwrap();

    node.active
        .vote(&live_vote(REP_B, 1, &block), VoteSource::Live);

    assert!(!election.is_confirmed());
    assert_always_eq(
        Duration::from_millis(200),
        || confirmation_height(&node, &chain.account()),
        1,
    );
    assert!(node.active.active(&block.hash()));
}

#[test]
fn cached_vote_confirms_election_when_it_starts() {
    let mut system = System::new();
    let chain = setup_chain();
    let node = make_node(&mut system, &chain);
    let block = frontier_block(&chain);

    let result = node.active.vote(&live_vote(REP_A, 1, &block), VoteSource::Live);
    assert_eq!(result.get(&block.hash()), Some(&VoteCode::Indeterminate));

    let (inserted, election) = node.active.insert(&block, ElectionBehavior::Normal);

    assert!(inserted);
    assert!(election.unwrap().is_confirmed());
    assert_timely_eq(
        TIMEOUT,
        || confirmation_height(&node, &chain.account()),
        2,
    );
    assert_eq!(
        node.stats
            .count(StatType::Election, DetailType::VoteCached, Direction::In),
        1
    );
}

#[test]
fn force_confirm_cements_without_votes() {
    let mut system = System::new();
    let chain = setup_chain();
    let node = make_node(&mut system, &chain);
    let block = frontier_block(&chain);
    let (_, election) = node.active.insert(&block, ElectionBehavior::Normal);

    node.active.force_confirm(&election.unwrap());

    assert_timely_eq(
        TIMEOUT,
        || confirmation_height(&node, &chain.account()),
        2,
    );
}

#[test]
fn confirmed_block_that_arrives_late_is_cemented() {
    let mut system = System::new();
    let chain = setup_chain();
    let node = system
        .build_node()
        .config(node_config())
        .ledger(
            Ledger::new_null_builder()
                .block(chain.block(1))
                .confirmation_height(
                    &chain.account(),
                    &ConfirmationHeightInfo::new(1, chain.open()),
                )
                .rep_weight(Account::from(REP_A), Amount::raw(70))
                .finish(),
        )
        .finish();
    let block = frontier_block(&chain);
    node.active.insert(&block, ElectionBehavior::Normal);

    node.active
        .vote(&live_vote(REP_A, 1, &block), VoteSource::Live);
    {
        let mut txn = node.ledger.rw_txn();
        node.ledger
            .insert_block(&mut txn, chain.latest_block())
            .unwrap();
        txn.commit();
    }

    assert_timely_eq(
        TIMEOUT,
        || confirmation_height(&node, &chain.account()),
        2,
    );
}

#[test]
fn successors_are_activated_after_cementing() {
    let mut system = System::new();
    let destination = Account::from(42u64);
    let chain = setup_chain();
    let scheduler = Arc::new(NullElectionScheduler::new());
    let activations = scheduler.track();
    let node = system
        .build_node()
        .config(node_config())
        .ledger(ledger_for(&chain))
        .scheduler(scheduler)
        .finish();
    let block = frontier_block(&chain);
    node.active.insert(&block, ElectionBehavior::Normal);

    node.active
        .vote(&live_vote(REP_A, 1, &block), VoteSource::Live);

    assert_timely_eq(
        TIMEOUT,
        || activations.output(),
        vec![chain.account(), destination],
    );
}

#[test]
fn no_successor_activation_before_bootstrap_weight_is_reached() {
    let mut system = System::new();
    let chain = setup_chain();
    let scheduler = Arc::new(NullElectionScheduler::new());
    let activations = scheduler.track();
    let weights = HashMap::from([
        (PublicKey::from(REP_A), Amount::raw(70)),
        (PublicKey::from(REP_B), Amount::raw(30)),
    ]);
    let node = system
        .build_node()
        .config(node_config())
        .ledger(
            Ledger::new_null_builder()
                .blocks(chain.blocks())
                .confirmation_height(
                    &chain.account(),
                    &ConfirmationHeightInfo::new(1, chain.open()),
                )
                .bootstrap_weights(weights, 1000)
                .finish(),
        )
        .scheduler(scheduler)
        .finish();
    let block = frontier_block(&chain);
    node.active.insert(&block, ElectionBehavior::Normal);

    node.active
        .vote(&live_vote(REP_A, 1, &block), VoteSource::Live);

    assert_timely_eq(
        TIMEOUT,
        || confirmation_height(&node, &chain.account()),
        2,
    );
    assert_always_eq(
        Duration::from_millis(200),
        || activations.output().len(),
        0,
    );
}

#[test]
fn active_election_floods_its_winner() {
    let mut system = System::new();
    let chain = setup_chain();
    let network = Arc::new(NullElectionNetwork::new());
    let sent = network.track();
    let node = system
        .build_node()
        .config(node_config())
        .ledger(ledger_for(&chain))
        .election_network(network)
        .finish();
    let block = frontier_block(&chain);

    node.active.insert(&block, ElectionBehavior::Normal);

    assert_timely(TIMEOUT, || {
        sent.output()
            .contains(&ElectionNetworkAction::FloodBlock(block.hash()))
    });
}

#[test]
fn online_representative_is_asked_for_confirmation() {
    let mut system = System::new();
    let mut chain = setup_chain();
    chain.add_state_send_to(Account::from(43u64), Amount::raw(10));
    let network = Arc::new(NullElectionNetwork::new());
    let sent = network.track();
    let node = system
        .build_node()
        .config(node_config())
        .ledger(ledger_for(&chain))
        .election_network(network)
        .finish();
    let first: Arc<Block> = Arc::new(chain.block(2).clone().into());
    let second = frontier_block(&chain);
    node.active.insert(&first, ElectionBehavior::Normal);
    node.active.insert(&second, ElectionBehavior::Normal);

    // REP_B goes online by voting in the first election only
    node.active
        .vote(&live_vote(REP_B, 1, &first), VoteSource::Live);

    assert_timely(TIMEOUT, || {
        sent.output().iter().any(|action| match action {
            ElectionNetworkAction::ConfirmReq(rep, hashes) => {
                *rep == Account::from(REP_B)
                    && hashes.iter().any(|(hash, _)| *hash == second.hash())
            }
            _ => false,
        })
    });
}

#[test]
fn container_info_lists_elections() {
    let mut system = System::new();
    let chain = setup_chain();
    let node = make_node(&mut system, &chain);
    node.active
        .insert(&frontier_block(&chain), ElectionBehavior::Normal);

    let info = node.container_info();

    assert!(info.child("active").is_some());
    assert!(info.child("confirmation_height").is_some());
}
