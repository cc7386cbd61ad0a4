//! Known Exchange Addresses
//!
//! Static directory mapping hot-wallet addresses to exchange, country and
//! city, keyed by `(address, chain)`. Used by the classifier for
//! geographic attribution and the cross-border flag. Addresses are
//! stored lowercase; lookups normalize their input.

use super::chain::Chain;
use super::event::Attribution;

/// One directory row: chain, address, exchange, country, city
type ExchangeEntry = (Chain, &'static str, &'static str, &'static str, &'static str);

/// Known exchange hot wallets
pub const KNOWN_EXCHANGES: &[ExchangeEntry] = &[
    // Binance
    (
        Chain::Ethereum,
        "0x3f5ce5fbfe3e9af3971dd833d26ba9b5c936f0be",
        "Binance",
        "Malta",
        "Valletta",
    ),
    (
        Chain::Ethereum,
        "0xd551234ae421e3bcba99a0da6d736074f22192ff",
        "Binance",
        "Malta",
        "Valletta",
    ),
    (
        Chain::Ethereum,
        "0x28c6c06298d514db089934071355e5743bf21d60",
        "Binance",
        "Malta",
        "Valletta",
    ),
    (
        Chain::Bsc,
        "0x8894e0a0c962cb723c1976a4421c95949be2d4e3",
        "Binance",
        "Malta",
        "Valletta",
    ),
    (
        Chain::Bsc,
        "0xe2fc31f816a9b94326492132018c3aecc4a93ae1",
        "Binance",
        "Malta",
        "Valletta",
    ),
    // Coinbase
    (
        Chain::Ethereum,
        "0x71660c4005ba85c37ccec55d0c4493e66fe775d3",
        "Coinbase",
        "USA",
        "San Francisco",
    ),
    (
        Chain::Ethereum,
        "0x503828976d22510aad0201ac7ec88293211d23da",
        "Coinbase",
        "USA",
        "San Francisco",
    ),
    (
        Chain::Ethereum,
        "0xa9d1e08c7793af67e9d92fe308d5697fb81d3e43",
        "Coinbase",
        "USA",
        "San Francisco",
    ),
    (
        Chain::Polygon,
        "0x0d0707963952f2fba59dd06f2b425ace40b492fe",
        "Coinbase",
        "USA",
        "San Francisco",
    ),
    // Kraken
    (
        Chain::Ethereum,
        "0x2910543af39aba0cd09dbb2d50200b3e800a63d2",
        "Kraken",
        "USA",
        "San Francisco",
    ),
    (
        Chain::Ethereum,
        "0x0a869d79a7052c7f1b55a8ebabbea3420f0d1e13",
        "Kraken",
        "USA",
        "San Francisco",
    ),
    // OKX
    (
        Chain::Ethereum,
        "0x6cc5f688a315f3dc28a7781717a9a798a59fda7b",
        "OKX",
        "Seychelles",
        "Victoria",
    ),
    (
        Chain::Bsc,
        "0x5041ed759dd4afc3a72b8192c143f72f4724081a",
        "OKX",
        "Seychelles",
        "Victoria",
    ),
    // Bitfinex
    (
        Chain::Ethereum,
        "0x876eabf441b2ee5b5b0554fd502a8e0600950cfa",
        "Bitfinex",
        "BVI",
        "Road Town",
    ),
    // Huobi / HTX
    (
        Chain::Ethereum,
        "0xdc76cd25977e0a5ae17155770273ad58648900d3",
        "HTX",
        "Seychelles",
        "Victoria",
    ),
    // Bybit
    (
        Chain::Ethereum,
        "0xf89d7b9c864f589bbf53a82105107622b35eaa40",
        "Bybit",
        "UAE",
        "Dubai",
    ),
    // Upbit
    (
        Chain::Ethereum,
        "0x390de26d772d2e2005c6d1d24afc902bae37a4bb",
        "Upbit",
        "South Korea",
        "Seoul",
    ),
];

/// Resolve the attribution for an address on a chain. Unmapped addresses
/// get `Attribution::unknown()` (empty exchange, Unknown country/city).
pub fn attribute(address: &str, chain: Chain) -> Attribution {
    let needle = address.to_ascii_lowercase();
    KNOWN_EXCHANGES
        .iter()
        .find(|(c, addr, _, _, _)| *c == chain && *addr == needle)
        .map(|(_, _, exchange, country, city)| Attribution {
            exchange: exchange.to_string(),
            country: country.to_string(),
            city: city.to_string(),
        })
        .unwrap_or_else(Attribution::unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_address() {
        let attr = attribute("0x3f5ce5fbfe3e9af3971dd833d26ba9b5c936f0be", Chain::Ethereum);
        assert_eq!(attr.exchange, "Binance");
        assert_eq!(attr.country, "Malta");
        assert_eq!(attr.city, "Valletta");
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let attr = attribute("0x3F5CE5FBFE3E9AF3971DD833D26BA9B5C936F0BE", Chain::Ethereum);
        assert_eq!(attr.exchange, "Binance");
    }

    #[test]
    fn test_lookup_is_chain_scoped() {
        // A Binance Ethereum wallet is not attributed on BSC
        let attr = attribute("0x3f5ce5fbfe3e9af3971dd833d26ba9b5c936f0be", Chain::Bsc);
        assert_eq!(attr, Attribution::unknown());
    }

    #[test]
    fn test_unmapped_address() {
        let attr = attribute("0xdeadbeef", Chain::Ethereum);
        assert_eq!(attr.exchange, "");
        assert_eq!(attr.country, "Unknown");
        assert_eq!(attr.city, "Unknown");
    }

    #[test]
    fn test_directory_addresses_are_lowercase() {
        for (_, addr, _, _, _) in KNOWN_EXCHANGES {
            assert_eq!(*addr, addr.to_ascii_lowercase());
        }
    }
}
