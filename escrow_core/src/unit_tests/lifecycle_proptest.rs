// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use super::*;
use crate::test_utils::TestEscrow;
use escrow_types::base_types::dbg_addr;
use proptest::prelude::*;
use std::collections::BTreeMap;

const FUNDING: u64 = 1_000_000;

#[derive(Debug, Clone)]
enum Op {
    Create {
        sender: u8,
        receiver: u8,
        period: u64,
        amount: u64,
    },
    Unlock {
        sender: u8,
        receiver: u8,
        index: u64,
    },
    Withdraw {
        sender: u8,
        receiver: u8,
        index: u64,
    },
    Advance(u64),
}

fn sender_addr(n: u8) -> EscrowAddress {
    dbg_addr(1 + n)
}

fn receiver_addr(n: u8) -> EscrowAddress {
    dbg_addr(10 + n)
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..2u8, 0..2u8, 1..4u64, 0..50u64).prop_map(|(sender, receiver, period, amount)| {
            Op::Create {
                sender,
                receiver,
                period,
                amount,
            }
        }),
        (0..2u8, 0..2u8, 0..4u64).prop_map(|(sender, receiver, index)| Op::Unlock {
            sender,
            receiver,
            index
        }),
        (0..2u8, 0..2u8, 0..4u64).prop_map(|(sender, receiver, index)| Op::Withdraw {
            sender,
            receiver,
            index
        }),
        (0..3u64).prop_map(Op::Advance),
    ]
}

fn all_locks(escrow: &TestEscrow) -> Vec<Lock> {
    let mut locks = Vec::new();
    for sender in 0..2 {
        for receiver in 0..2 {
            locks.extend(
                escrow
                    .engine
                    .locks_for_pair(sender_addr(sender), receiver_addr(receiver))
                    .unwrap(),
            );
        }
    }
    locks
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn lock_status_only_moves_forward(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let escrow = TestEscrow::at_height(0);
        for sender in 0..2 {
            escrow.fund(escrow.token, sender_addr(sender), FUNDING);
        }
        let mut statuses: BTreeMap<LockKey, LockStatus> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Create { sender, receiver, period, amount } => {
                    let _ = escrow.engine.create_lock(
                        sender_addr(sender),
                        period,
                        receiver_addr(receiver),
                        escrow.token,
                        amount,
                    );
                }
                Op::Unlock { sender, receiver, index } => {
                    let _ = escrow
                        .engine
                        .unlock(sender_addr(sender), receiver_addr(receiver), index);
                }
                Op::Withdraw { sender, receiver, index } => {
                    let _ = escrow.engine.withdraw(
                        receiver_addr(receiver),
                        sender_addr(sender),
                        receiver_addr(receiver),
                        index,
                    );
                }
                Op::Advance(blocks) => {
                    escrow.clock.advance(blocks);
                }
            }

            let locks = all_locks(&escrow);
            for lock in &locks {
                let status = lock.status();
                let seen = statuses.entry(lock.key()).or_insert(status);
                prop_assert!(status >= *seen, "status of {} moved backwards", lock.key());
                *seen = status;
                if lock.status() != LockStatus::Locked {
                    prop_assert!(escrow.engine.current_height() >= lock.unlock_height());
                }
            }
            // Every lock ever observed is still there.
            prop_assert_eq!(locks.len(), statuses.len());

            let held: u64 = locks
                .iter()
                .filter(|lock| lock.status() != LockStatus::Withdrawn)
                .map(Lock::amount)
                .sum();
            prop_assert_eq!(escrow.balance(escrow.token, escrow.custody()), held);
        }

        let mut withdrawals: BTreeMap<LockKey, usize> = BTreeMap::new();
        for (_, event) in escrow.engine.events_since(0).unwrap() {
            if let EscrowEvent::WithdrawToken { .. } = event {
                *withdrawals.entry(event.lock_key()).or_default() += 1;
            }
        }
        prop_assert!(withdrawals.values().all(|count| *count == 1));
    }
}
