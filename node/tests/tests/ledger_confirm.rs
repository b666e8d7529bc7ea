use lattice_core::{Account, Amount, ConfirmationHeightInfo, TestAccountChain};
use lattice_ledger::Ledger;
use lattice_node::{
    consensus::ElectionStatusType,
    stats::{DetailType, Direction, StatType},
    Node,
};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use test_helpers::{assert_always_eq, assert_timely_eq, System};

const TIMEOUT: Duration = Duration::from_secs(5);

fn confirmation_height(node: &Node, account: &Account) -> u64 {
    let txn = node.ledger.read_txn();
    node.ledger
        .get_confirmation_height(&txn, account)
        .unwrap_or_default()
        .height
}

#[test]
fn single() {
    let mut system = System::new();
    let mut genesis = TestAccountChain::genesis();
    genesis.add_state_send_to(Account::from(42u64), Amount::raw(100));
    let node = system
        .build_node()
        .ledger(
            Ledger::new_null_builder()
                .blocks(genesis.blocks())
                .confirmation_height(
                    &genesis.account(),
                    &ConfirmationHeightInfo::new(1, genesis.open()),
                )
                .finish(),
        )
        .finish();

    node.confirmation_height_processor.add(genesis.frontier());

    assert_timely_eq(
        TIMEOUT,
        || confirmation_height(&node, &genesis.account()),
        2,
    );
    assert_eq!(node.ledger.cemented_count(), 2);
    assert_eq!(
        node.stats.count(
            StatType::ConfirmationHeight,
            DetailType::BlocksConfirmed,
            Direction::In
        ),
        1
    );
}

#[test]
fn whole_chain_is_cemented_up_to_the_frontier() {
    let mut system = System::new();
    let mut genesis = TestAccountChain::genesis();
    for i in 0..4u64 {
        genesis.add_state_send_to(Account::from(100 + i), Amount::raw(1));
    }
    let node = system
        .build_node()
        .ledger(Ledger::new_null_builder().blocks(genesis.blocks()).finish())
        .finish();

    node.confirmation_height_processor.add(genesis.frontier());

    assert_timely_eq(TIMEOUT, || node.ledger.cemented_count(), 5);
    let txn = node.ledger.read_txn();
    let info = node
        .ledger
        .get_confirmation_height(&txn, &genesis.account())
        .unwrap();
    assert_eq!(info.height, 5);
    assert_eq!(info.frontier, genesis.frontier());
}

#[test]
fn send_receive_between_two_accounts() {
    let mut system = System::new();
    let mut genesis = TestAccountChain::genesis();
    let mut dest = TestAccountChain::new();
    genesis.add_state_send_to(dest.account(), Amount::raw(10));
    dest.add_state_receive_from(&genesis, 2);
    dest.add_state_send_to(genesis.account(), Amount::raw(5));
    genesis.add_state_receive_from(&dest, 2);
    let node = system
        .build_node()
        .ledger(
            Ledger::new_null_builder()
                .blocks(genesis.blocks())
                .blocks(dest.blocks())
                .finish(),
        )
        .finish();

    node.confirmation_height_processor.add(genesis.frontier());

    assert_timely_eq(TIMEOUT, || node.ledger.cemented_count(), 5);
    assert_eq!(confirmation_height(&node, &genesis.account()), 3);
    assert_eq!(confirmation_height(&node, &dest.account()), 2);
}

#[test]
fn source_is_cemented_before_receiver() {
    let mut system = System::new();
    let mut genesis = TestAccountChain::genesis();
    genesis.add_legacy_send();
    let mut dest = TestAccountChain::new();
    genesis.add_legacy_send_to(dest.account(), Amount::raw(1));
    dest.add_legacy_open_from_account(&genesis);
    let node = system
        .build_node()
        .ledger(
            Ledger::new_null_builder()
                .blocks(genesis.blocks())
                .blocks(dest.blocks())
                .confirmation_height(
                    &genesis.account(),
                    &ConfirmationHeightInfo::new(2, genesis.block(2).hash()),
                )
                .finish(),
        )
        .finish();
    let cemented = Arc::new(Mutex::new(Vec::new()));
    let cemented_l = Arc::clone(&cemented);
    node.active
        .on_block_cemented(Box::new(move |status, _votes, _account, _amount, _, _| {
            cemented_l.lock().unwrap().push(status.winner_hash());
        }));

    node.confirmation_height_processor.add(dest.open());

    assert_timely_eq(TIMEOUT, || cemented.lock().unwrap().len(), 2);
    assert_eq!(
        *cemented.lock().unwrap(),
        vec![genesis.frontier(), dest.open()]
    );
    assert_eq!(confirmation_height(&node, &genesis.account()), 3);
    assert_eq!(confirmation_height(&node, &dest.account()), 1);
}

#[test]
fn blocks_cemented_without_election_are_inactive() {
    let mut system = System::new();
    let mut genesis = TestAccountChain::genesis();
    genesis.add_state_send_to(Account::from(42u64), Amount::raw(100));
    let node = system
        .build_node()
        .ledger(
            Ledger::new_null_builder()
                .blocks(genesis.blocks())
                .confirmation_height(
                    &genesis.account(),
                    &ConfirmationHeightInfo::new(1, genesis.open()),
                )
                .finish(),
        )
        .finish();

    let cemented = Arc::new(Mutex::new(Vec::new()));
    let cemented_l = Arc::clone(&cemented);
    node.active
        .on_block_cemented(Box::new(move |status, _votes, _account, _amount, _, _| {
            cemented_l
                .lock()
                .unwrap()
                .push((status.winner_hash(), status.election_status_type));
        }));

    node.confirmation_height_processor.add(genesis.frontier());

    assert_timely_eq(TIMEOUT, || cemented.lock().unwrap().len(), 1);
    assert_eq!(
        *cemented.lock().unwrap(),
        vec![(
            genesis.frontier(),
            ElectionStatusType::InactiveConfirmationHeight
        )]
    );
    assert_eq!(
        node.stats.count(
            StatType::ConfirmationObserver,
            DetailType::InactiveConfirmationHeight,
            Direction::In
        ),
        1
    );
    // without an election there is nothing to add to the confirmation history
    assert!(node.active.recently_cemented.is_empty());
}

#[test]
fn already_cemented_block_is_not_cemented_again() {
    let mut system = System::new();
    let mut genesis = TestAccountChain::genesis();
    genesis.add_state_send_to(Account::from(42u64), Amount::raw(100));
    let node = system
        .build_node()
        .ledger(
            Ledger::new_null_builder()
                .blocks(genesis.blocks())
                .confirmation_height(
                    &genesis.account(),
                    &ConfirmationHeightInfo::new(2, genesis.frontier()),
                )
                .finish(),
        )
        .finish();

    node.confirmation_height_processor.add(genesis.frontier());

    assert_timely_eq(
        TIMEOUT,
        || {
            node.stats.count(
                StatType::ConfirmationHeight,
                DetailType::AlreadyCemented,
                Direction::In,
            )
        },
        1,
    );
    assert_always_eq(
        Duration::from_millis(200),
        || node.ledger.cemented_count(),
        2,
    );
    assert!(node.active.recently_cemented.is_empty());
}

#[test]
fn cement_chain_in_two_steps() {
    let mut system = System::new();
    let mut genesis = TestAccountChain::genesis();
    genesis.add_state_send_to(Account::from(42u64), Amount::raw(1));
    genesis.add_state_send_to(Account::from(43u64), Amount::raw(1));
    let node = system
        .build_node()
        .ledger(Ledger::new_null_builder().blocks(genesis.blocks()).finish())
        .finish();

    node.confirmation_height_processor.add(genesis.block(2).hash());
    assert_timely_eq(TIMEOUT, || node.ledger.cemented_count(), 2);

    node.confirmation_height_processor.add(genesis.frontier());
    assert_timely_eq(TIMEOUT, || node.ledger.cemented_count(), 3);
    assert_eq!(confirmation_height(&node, &genesis.account()), 3);
}
