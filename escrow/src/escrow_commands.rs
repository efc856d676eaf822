// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0
use std::fmt::{Display, Formatter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use escrow_core::{EscrowEngine, ManualClock, TokenRegistry};
use escrow_storage::{LockStore, TokenLedger};
use escrow_types::base_types::{
    BlockHeight, EscrowAddress, EventSequence, LockIndex, TokenId,
};
use escrow_types::event::EscrowEvent;
use escrow_types::lock::Lock;

use crate::config::{Config, EscrowConfig};

#[cfg(test)]
#[path = "unit_tests/escrow_commands_tests.rs"]
mod escrow_commands_tests;

const ESCROW_DB_NAME: &str = "escrow";
const LEDGER_DB_NAME: &str = "ledger";

#[derive(Parser)]
#[clap(
    name = "escrow",
    about = "Time-locked token escrow ledger",
    rename_all = "kebab-case"
)]
pub struct EscrowOpts {
    /// Sets the file storing the escrow configuration (an empty one will be created if missing)
    #[clap(long, default_value = "./escrow.conf")]
    pub config: PathBuf,
    /// Return command outputs in json format.
    #[clap(long, global = true)]
    pub json: bool,
    #[clap(subcommand)]
    pub command: EscrowCommands,
}

#[derive(Subcommand)]
#[clap(rename_all = "kebab-case")]
pub enum EscrowCommands {
    /// Generate a new account address.
    NewAddress,

    /// Generate a new token in the ledger and register it with the escrow.
    NewToken,

    /// Mint tokens to an address.
    Mint {
        #[clap(long)]
        token: TokenId,
        #[clap(long)]
        to: EscrowAddress,
        #[clap(long)]
        amount: u64,
    },

    /// Allow the escrow to pull up to `amount` tokens from `owner`.
    Approve {
        #[clap(long)]
        token: TokenId,
        #[clap(long)]
        owner: EscrowAddress,
        #[clap(long)]
        amount: u64,
    },

    /// Token balance of an address.
    Balance {
        #[clap(long)]
        token: TokenId,
        #[clap(long)]
        owner: EscrowAddress,
    },

    /// Lock tokens of `sender` in favour of `receiver`.
    Create {
        #[clap(long)]
        sender: EscrowAddress,
        #[clap(long)]
        receiver: EscrowAddress,
        #[clap(long)]
        token: TokenId,
        #[clap(long)]
        amount: u64,
        /// Number of blocks before the lock can be unlocked
        #[clap(long)]
        lock_period: BlockHeight,
    },

    /// Unlock a lock. Only its sender can do this.
    Unlock {
        #[clap(long)]
        sender: EscrowAddress,
        #[clap(long)]
        receiver: EscrowAddress,
        #[clap(long)]
        index: LockIndex,
    },

    /// Release an unlocked lock to its receiver.
    Withdraw {
        /// Address submitting the withdraw, defaults to the receiver
        #[clap(long)]
        caller: Option<EscrowAddress>,
        #[clap(long)]
        sender: EscrowAddress,
        #[clap(long)]
        receiver: EscrowAddress,
        #[clap(long)]
        index: LockIndex,
    },

    /// Show one lock.
    Lock {
        #[clap(long)]
        sender: EscrowAddress,
        #[clap(long)]
        receiver: EscrowAddress,
        #[clap(long)]
        index: LockIndex,
    },

    /// Show all locks between a sender and a receiver.
    Locks {
        #[clap(long)]
        sender: EscrowAddress,
        #[clap(long)]
        receiver: EscrowAddress,
    },

    /// Index the next lock between a sender and a receiver will get.
    CurrentIndex {
        #[clap(long)]
        sender: EscrowAddress,
        #[clap(long)]
        receiver: EscrowAddress,
    },

    /// Move the clock forward.
    Advance {
        #[clap(long, default_value = "1")]
        blocks: BlockHeight,
    },

    /// Show the event log.
    Events {
        #[clap(long, default_value = "0")]
        since: EventSequence,
    },
}

impl EscrowCommands {
    pub fn execute(
        self,
        context: &mut EscrowContext,
    ) -> Result<EscrowCommandResult, anyhow::Error> {
        let ret = match self {
            EscrowCommands::NewAddress => {
                let address = EscrowAddress::random();
                context.config.accounts.push(address);
                context.config.save()?;
                EscrowCommandResult::NewAddress(address)
            }
            EscrowCommands::NewToken => {
                let token = TokenId::random();
                context.register_token(token);
                context.config.tokens.push(token);
                context.config.save()?;
                EscrowCommandResult::NewToken(token)
            }
            EscrowCommands::Mint { token, to, amount } => {
                context.ensure_known_token(&token)?;
                let balance = context.ledger.mint(token, to, amount)?;
                EscrowCommandResult::Balance(BalanceOutput {
                    token,
                    owner: to,
                    balance,
                })
            }
            EscrowCommands::Approve {
                token,
                owner,
                amount,
            } => {
                context.ensure_known_token(&token)?;
                let spender = context.engine.custody();
                context.ledger.approve(token, owner, spender, amount)?;
                EscrowCommandResult::Allowance(AllowanceOutput {
                    token,
                    owner,
                    spender,
                    allowance: amount,
                })
            }
            EscrowCommands::Balance { token, owner } => {
                EscrowCommandResult::Balance(BalanceOutput {
                    token,
                    owner,
                    balance: context.ledger.balance_of(&token, &owner)?,
                })
            }
            EscrowCommands::Create {
                sender,
                receiver,
                token,
                amount,
                lock_period,
            } => {
                let index = context
                    .engine
                    .create_lock(sender, lock_period, receiver, token, amount)?;
                EscrowCommandResult::Lock(context.engine.get_lock(sender, receiver, index)?)
            }
            EscrowCommands::Unlock {
                sender,
                receiver,
                index,
            } => {
                context.engine.unlock(sender, receiver, index)?;
                EscrowCommandResult::Lock(context.engine.get_lock(sender, receiver, index)?)
            }
            EscrowCommands::Withdraw {
                caller,
                sender,
                receiver,
                index,
            } => {
                let caller = caller.unwrap_or(receiver);
                context.engine.withdraw(caller, sender, receiver, index)?;
                EscrowCommandResult::Lock(context.engine.get_lock(sender, receiver, index)?)
            }
            EscrowCommands::Lock {
                sender,
                receiver,
                index,
            } => EscrowCommandResult::Lock(context.engine.get_lock(sender, receiver, index)?),
            EscrowCommands::Locks { sender, receiver } => {
                EscrowCommandResult::Locks(context.engine.locks_for_pair(sender, receiver)?)
            }
            EscrowCommands::CurrentIndex { sender, receiver } => {
                EscrowCommandResult::CurrentIndex(IndexOutput {
                    sender,
                    receiver,
                    index: context.engine.current_index(sender, receiver)?,
                })
            }
            EscrowCommands::Advance { blocks } => {
                let height = context.clock.advance(blocks);
                context.config.height = height;
                context.config.save()?;
                info!(height, "Advanced clock");
                EscrowCommandResult::Height(height)
            }
            EscrowCommands::Events { since } => {
                EscrowCommandResult::Events(context.engine.events_since(since)?)
            }
        };
        Ok(ret)
    }
}

pub struct EscrowContext {
    pub config: EscrowConfig,
    pub engine: Arc<EscrowEngine>,
    pub ledger: Arc<TokenLedger>,
    clock: Arc<ManualClock>,
}

impl EscrowContext {
    pub fn new(config: EscrowConfig) -> Result<Self, anyhow::Error> {
        std::fs::create_dir_all(&config.db_folder_path)?;
        let store = Arc::new(LockStore::open(
            config.db_folder_path.join(ESCROW_DB_NAME),
            None,
        )?);
        let ledger = Arc::new(TokenLedger::open(
            config.db_folder_path.join(LEDGER_DB_NAME),
            None,
        )?);
        let clock = Arc::new(ManualClock::new(config.height));
        let engine = Arc::new(EscrowEngine::new(
            config.custody,
            store,
            Arc::new(TokenRegistry::new()),
            clock.clone(),
        ));
        let context = Self {
            config,
            engine,
            ledger,
            clock,
        };
        for token in &context.config.tokens {
            context.register_token(*token);
        }
        Ok(context)
    }

    fn register_token(&self, token: TokenId) {
        self.engine
            .tokens()
            .register(token, Arc::new(self.ledger.token(token)));
    }

    fn ensure_known_token(&self, token: &TokenId) -> Result<(), anyhow::Error> {
        if self.engine.tokens().contains(token) {
            Ok(())
        } else {
            Err(anyhow!("Token {} is not managed by this escrow", token))
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceOutput {
    pub token: TokenId,
    pub owner: EscrowAddress,
    pub balance: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowanceOutput {
    pub token: TokenId,
    pub owner: EscrowAddress,
    pub spender: EscrowAddress,
    pub allowance: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexOutput {
    pub sender: EscrowAddress,
    pub receiver: EscrowAddress,
    pub index: LockIndex,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum EscrowCommandResult {
    NewAddress(EscrowAddress),
    NewToken(TokenId),
    Balance(BalanceOutput),
    Allowance(AllowanceOutput),
    Lock(Lock),
    Locks(Vec<Lock>),
    CurrentIndex(IndexOutput),
    Height(BlockHeight),
    Events(Vec<(EventSequence, EscrowEvent)>),
}

impl Display for EscrowCommandResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut writer = String::new();
        match self {
            EscrowCommandResult::NewAddress(address) => {
                writeln!(writer, "Created new address: {}", address)?;
            }
            EscrowCommandResult::NewToken(token) => {
                writeln!(writer, "Created new token: {}", token)?;
            }
            EscrowCommandResult::Balance(output) => {
                writeln!(
                    writer,
                    "Balance of {} in token {}: {}",
                    output.owner, output.token, output.balance
                )?;
            }
            EscrowCommandResult::Allowance(output) => {
                writeln!(
                    writer,
                    "{} may pull {} of token {} from {}",
                    output.spender, output.allowance, output.token, output.owner
                )?;
            }
            EscrowCommandResult::Lock(lock) => {
                writeln!(writer, "{}", lock)?;
            }
            EscrowCommandResult::Locks(locks) => {
                writeln!(writer, "Showing {} results.", locks.len())?;
                for lock in locks {
                    writeln!(writer, "{}", lock)?;
                }
            }
            EscrowCommandResult::CurrentIndex(output) => {
                writeln!(
                    writer,
                    "Next lock index from {} to {}: {}",
                    output.sender, output.receiver, output.index
                )?;
            }
            EscrowCommandResult::Height(height) => {
                writeln!(writer, "Current height: {}", height)?;
            }
            EscrowCommandResult::Events(events) => {
                for (seq, event) in events {
                    writeln!(writer, "{:>6} {}", seq, event)?;
                }
            }
        }
        write!(f, "{}", writer.trim_end_matches('\n'))
    }
}

impl EscrowCommandResult {
    pub fn print(&self, pretty: bool) {
        let line = if pretty {
            format!("{}", self)
        } else {
            serde_json::to_string_pretty(self).unwrap_or_else(|err| err.to_string())
        };
        for line in line.lines() {
            println!("{}", line);
        }
    }
}
