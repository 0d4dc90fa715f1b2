//! Supported chains and their per-chain parameters.

use std::fmt;
use std::str::FromStr;

use bitcoin::bech32::{Hrp, hrp};
use bitcoin::{Network, NetworkKind};
use elements::AddressParams;
use serde::{Deserialize, Serialize};

use crate::error::SsmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chain {
    #[serde(rename = "bitcoin-main")]
    BitcoinMain,
    #[serde(rename = "bitcoin-test")]
    BitcoinTest,
    #[serde(rename = "bitcoin-regtest")]
    BitcoinRegtest,
    #[serde(rename = "liquidv1")]
    LiquidV1,
    #[serde(rename = "elements-regtest")]
    ElementsRegtest,
}

/// How addresses and transactions are encoded on a chain.
#[derive(Debug, Clone, Copy)]
pub enum ChainFamily {
    Bitcoin(Network),
    /// Confidential transactions, blech32 confidential addresses.
    Elements(&'static AddressParams),
}

#[derive(Debug)]
pub struct ChainParams {
    pub name: &'static str,
    /// Selects the xprv/xpub or tprv/tpub version bytes.
    pub network_kind: NetworkKind,
    pub family: ChainFamily,
}

impl ChainParams {
    /// Prefix of native segwit addresses (unconfidential ones on Elements chains).
    pub fn segwit_hrp(&self) -> Hrp {
        match self.family {
            ChainFamily::Bitcoin(Network::Bitcoin) => hrp::BC,
            ChainFamily::Bitcoin(Network::Regtest) => hrp::BCRT,
            ChainFamily::Bitcoin(_) => hrp::TB,
            ChainFamily::Elements(params) => params.bech_hrp,
        }
    }

    pub fn confidential_hrp(&self) -> Option<Hrp> {
        match self.family {
            ChainFamily::Bitcoin(_) => None,
            ChainFamily::Elements(params) => Some(params.blech_hrp),
        }
    }

    pub fn is_confidential(&self) -> bool {
        matches!(self.family, ChainFamily::Elements(_))
    }
}

static BITCOIN_MAIN: ChainParams = ChainParams {
    name: "bitcoin-main",
    network_kind: NetworkKind::Main,
    family: ChainFamily::Bitcoin(Network::Bitcoin),
};

static BITCOIN_TEST: ChainParams = ChainParams {
    name: "bitcoin-test",
    network_kind: NetworkKind::Test,
    family: ChainFamily::Bitcoin(Network::Testnet),
};

static BITCOIN_REGTEST: ChainParams = ChainParams {
    name: "bitcoin-regtest",
    network_kind: NetworkKind::Test,
    family: ChainFamily::Bitcoin(Network::Regtest),
};

static LIQUID_V1: ChainParams = ChainParams {
    name: "liquidv1",
    network_kind: NetworkKind::Main,
    family: ChainFamily::Elements(&AddressParams::LIQUID),
};

static ELEMENTS_REGTEST: ChainParams = ChainParams {
    name: "elements-regtest",
    network_kind: NetworkKind::Test,
    family: ChainFamily::Elements(&AddressParams::ELEMENTS),
};

impl Chain {
    pub const ALL: [Chain; 5] = [
        Chain::BitcoinMain,
        Chain::BitcoinTest,
        Chain::BitcoinRegtest,
        Chain::LiquidV1,
        Chain::ElementsRegtest,
    ];

    pub fn params(self) -> &'static ChainParams {
        match self {
            Chain::BitcoinMain => &BITCOIN_MAIN,
            Chain::BitcoinTest => &BITCOIN_TEST,
            Chain::BitcoinRegtest => &BITCOIN_REGTEST,
            Chain::LiquidV1 => &LIQUID_V1,
            Chain::ElementsRegtest => &ELEMENTS_REGTEST,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.params().name
    }

    pub fn is_confidential(self) -> bool {
        self.params().is_confidential()
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = SsmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Chain::ALL
            .into_iter()
            .find(|chain| chain.as_str() == s)
            .ok_or_else(|| SsmError::UnknownChain(s.to_string()))
    }
}
