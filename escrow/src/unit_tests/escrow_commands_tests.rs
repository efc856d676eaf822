// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use super::*;
use escrow_types::lock::LockStatus;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn new_context() -> (TempDir, EscrowContext) {
    let dir = tempfile::tempdir().unwrap();
    let config = EscrowConfig::read_or_create(&dir.path().join("escrow.conf")).unwrap();
    let context = EscrowContext::new(config).unwrap();
    (dir, context)
}

fn run(context: &mut EscrowContext, command: EscrowCommands) -> EscrowCommandResult {
    command.execute(context).unwrap()
}

fn new_address(context: &mut EscrowContext) -> EscrowAddress {
    match run(context, EscrowCommands::NewAddress) {
        EscrowCommandResult::NewAddress(address) => address,
        _ => panic!("expected an address"),
    }
}

fn lock_status(result: EscrowCommandResult) -> LockStatus {
    match result {
        EscrowCommandResult::Lock(lock) => lock.status(),
        _ => panic!("expected a lock"),
    }
}

#[test]
fn test_config_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("escrow.conf");

    let mut config = EscrowConfig::read_or_create(&path).unwrap();
    assert!(path.exists());
    assert_eq!(config.db_folder_path, dir.path().join("escrow_db"));
    config.height = 42;
    config.tokens.push(TokenId::random());
    config.save().unwrap();

    let reread = EscrowConfig::read_or_create(&path).unwrap();
    assert_eq!(reread.height, 42);
    assert_eq!(reread.tokens, config.tokens);
    assert_eq!(reread.custody, config.custody);
    assert_eq!(reread.config_path(), path.as_path());
}

#[test]
fn test_parse_create_command() {
    let (sender, receiver, token) = (
        EscrowAddress::random(),
        EscrowAddress::random(),
        TokenId::random(),
    );
    let opts = EscrowOpts::try_parse_from([
        "escrow".to_string(),
        "--json".to_string(),
        "create".to_string(),
        format!("--sender={}", sender),
        format!("--receiver={}", receiver),
        format!("--token={}", token),
        "--amount=5".to_string(),
        "--lock-period=3".to_string(),
    ])
    .unwrap();
    assert!(opts.json);
    match opts.command {
        EscrowCommands::Create {
            sender: s,
            receiver: r,
            token: t,
            amount,
            lock_period,
        } => {
            assert_eq!((s, r, t, amount, lock_period), (sender, receiver, token, 5, 3));
        }
        _ => panic!("expected create"),
    }

    assert!(EscrowOpts::try_parse_from(["escrow", "lock", "--sender", "0xzz"]).is_err());
}

#[test]
fn test_cli_lifecycle() {
    let (_dir, mut context) = new_context();
    let sender = new_address(&mut context);
    let receiver = new_address(&mut context);
    let token = match run(&mut context, EscrowCommands::NewToken) {
        EscrowCommandResult::NewToken(token) => token,
        _ => panic!("expected a token"),
    };

    run(
        &mut context,
        EscrowCommands::Mint {
            token,
            to: sender,
            amount: 10,
        },
    );
    run(
        &mut context,
        EscrowCommands::Approve {
            token,
            owner: sender,
            amount: 10,
        },
    );
    let created = run(
        &mut context,
        EscrowCommands::Create {
            sender,
            receiver,
            token,
            amount: 10,
            lock_period: 2,
        },
    );
    assert_eq!(lock_status(created), LockStatus::Locked);

    let unlock = EscrowCommands::Unlock {
        sender,
        receiver,
        index: 0,
    };
    assert!(unlock.execute(&mut context).is_err());

    match run(&mut context, EscrowCommands::Advance { blocks: 2 }) {
        EscrowCommandResult::Height(height) => assert_eq!(height, 2),
        _ => panic!("expected a height"),
    }
    let unlocked = run(
        &mut context,
        EscrowCommands::Unlock {
            sender,
            receiver,
            index: 0,
        },
    );
    assert_eq!(lock_status(unlocked), LockStatus::Unlocked);
    let withdrawn = run(
        &mut context,
        EscrowCommands::Withdraw {
            caller: None,
            sender,
            receiver,
            index: 0,
        },
    );
    assert_eq!(lock_status(withdrawn), LockStatus::Withdrawn);

    match run(
        &mut context,
        EscrowCommands::Balance {
            token,
            owner: receiver,
        },
    ) {
        EscrowCommandResult::Balance(output) => assert_eq!(output.balance, 10),
        _ => panic!("expected a balance"),
    }
    match run(&mut context, EscrowCommands::CurrentIndex { sender, receiver }) {
        EscrowCommandResult::CurrentIndex(output) => assert_eq!(output.index, 1),
        _ => panic!("expected an index"),
    }
    match run(&mut context, EscrowCommands::Events { since: 0 }) {
        EscrowCommandResult::Events(events) => {
            let names: Vec<_> = events.iter().map(|(_, event)| event.name()).collect();
            assert_eq!(names, vec!["LockedToken", "UnlockedToken", "WithdrawToken"]);
        }
        _ => panic!("expected events"),
    }
    match run(&mut context, EscrowCommands::Locks { sender, receiver }) {
        EscrowCommandResult::Locks(locks) => assert_eq!(locks.len(), 1),
        _ => panic!("expected locks"),
    }
}

#[test]
fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("escrow.conf");
    let (sender, receiver);
    {
        let mut context =
            EscrowContext::new(EscrowConfig::read_or_create(&path).unwrap()).unwrap();
        sender = new_address(&mut context);
        receiver = new_address(&mut context);
        let token = match run(&mut context, EscrowCommands::NewToken) {
            EscrowCommandResult::NewToken(token) => token,
            _ => panic!("expected a token"),
        };
        run(
            &mut context,
            EscrowCommands::Mint {
                token,
                to: sender,
                amount: 3,
            },
        );
        run(
            &mut context,
            EscrowCommands::Approve {
                token,
                owner: sender,
                amount: 3,
            },
        );
        run(
            &mut context,
            EscrowCommands::Create {
                sender,
                receiver,
                token,
                amount: 3,
                lock_period: 1,
            },
        );
        run(&mut context, EscrowCommands::Advance { blocks: 5 });
    }

    let mut context = EscrowContext::new(EscrowConfig::read_or_create(&path).unwrap()).unwrap();
    assert_eq!(context.engine.current_height(), 5);
    assert_eq!(context.config.accounts, vec![sender, receiver]);
    let unlocked = run(
        &mut context,
        EscrowCommands::Unlock {
            sender,
            receiver,
            index: 0,
        },
    );
    assert_eq!(lock_status(unlocked), LockStatus::Unlocked);
}

#[test]
fn test_unknown_token_is_rejected() {
    let (_dir, mut context) = new_context();
    let owner = new_address(&mut context);
    let result = EscrowCommands::Mint {
        token: TokenId::random(),
        to: owner,
        amount: 1,
    }
    .execute(&mut context);
    assert!(result.is_err());
}

#[test]
fn test_result_display() {
    let address = EscrowAddress::new([0xab; EscrowAddress::LENGTH]);
    assert_eq!(
        EscrowCommandResult::NewAddress(address).to_string(),
        format!("Created new address: {}", address)
    );
    assert_eq!(
        EscrowCommandResult::Height(7).to_string(),
        "Current height: 7"
    );
    assert_eq!(
        serde_json::to_string(&EscrowCommandResult::Height(7)).unwrap(),
        "7"
    );
}
