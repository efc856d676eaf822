// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::trace;

use escrow_types::base_types::{BlockHeight, EscrowAddress, TokenId};

const DB_FOLDER_NAME: &str = "escrow_db";

pub trait Config
where
    Self: DeserializeOwned + Serialize,
{
    fn read_or_create(path: &Path) -> Result<Self, anyhow::Error> {
        let path_buf = PathBuf::from(path);
        Ok(if path_buf.exists() {
            trace!("Reading config from '{:?}'", path);
            let reader = BufReader::new(File::open(path_buf)?);
            let mut config: Self = serde_json::from_reader(reader)?;
            config.set_config_path(path);
            config
        } else {
            trace!("Config file not found, creating new config '{:?}'", path);
            let new_config = Self::create(path)?;
            new_config.write(path)?;
            new_config
        })
    }

    fn write(&self, path: &Path) -> Result<(), anyhow::Error> {
        trace!("Writing config to '{:?}'", path);
        let config = serde_json::to_string_pretty(self)?;
        fs::write(path, config)?;
        Ok(())
    }

    fn save(&self) -> Result<(), anyhow::Error> {
        self.write(self.config_path())
    }

    fn create(path: &Path) -> Result<Self, anyhow::Error>;

    fn set_config_path(&mut self, path: &Path);
    fn config_path(&self) -> &Path;
}

#[derive(Serialize, Deserialize)]
pub struct EscrowConfig {
    pub db_folder_path: PathBuf,
    /// Address holding escrowed funds.
    pub custody: EscrowAddress,
    pub accounts: Vec<EscrowAddress>,
    pub tokens: Vec<TokenId>,
    /// Height of the manual clock the escrow reads.
    pub height: BlockHeight,

    #[serde(skip)]
    config_path: PathBuf,
}

impl Config for EscrowConfig {
    fn create(path: &Path) -> Result<Self, anyhow::Error> {
        let db_folder_path = path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(DB_FOLDER_NAME);
        Ok(EscrowConfig {
            db_folder_path,
            custody: EscrowAddress::random(),
            accounts: Vec::new(),
            tokens: Vec::new(),
            height: 0,
            config_path: path.to_path_buf(),
        })
    }

    fn set_config_path(&mut self, path: &Path) {
        self.config_path = path.to_path_buf();
    }

    fn config_path(&self) -> &Path {
        &self.config_path
    }
}

impl Display for EscrowConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Config path : {:?}\nEscrow DB folder path : {:?}\nCustody address : {}\nManaged addresses : {}\nKnown tokens : {}\nHeight : {}",
            self.config_path,
            self.db_folder_path,
            self.custody,
            self.accounts.len(),
            self.tokens.len(),
            self.height,
        )
    }
}
