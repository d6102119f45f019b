//! Stream-list grammar for subscription requests.
//!
//! ```text
//! streams   := item ("," item)*
//! item      := net_sta (":" selectors)?
//! net_sta   := NET "_" STA | STA        (bare STA implies NET = "*")
//! selectors := SEL (" " SEL)*          (default list applies when absent)
//! ```

/// One `(network, station, selector)` subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSpec {
    pub network: String,
    pub station: String,
    pub selector: String,
}

/// Expand a stream list against a default selector list. An item carries
/// one entry per selector; with no selectors anywhere the catch-all
/// `"?????"` applies.
pub fn parse_streams(streams: &str, selectors: &str) -> Vec<StreamSpec> {
    let mut list = Vec::new();

    for item in streams.split(',') {
        let (net_sta, own_selectors) = match item.split_once(':') {
            Some((head, tail)) => (head, Some(tail)),
            None => (item, None),
        };

        let picks: Vec<&str> = match own_selectors {
            Some(tail) => tail.split_whitespace().collect(),
            None if !selectors.is_empty() => selectors.split(' ').collect(),
            None => vec!["?????"],
        };

        let parts: Vec<&str> = net_sta.split('_').collect();
        let (network, station) = match parts.as_slice() {
            [station] => ("*", *station),
            [network, station, ..] => (*network, *station),
            [] => continue,
        };

        for selector in picks {
            list.push(StreamSpec {
                network: network.to_owned(),
                station: station.to_owned(),
                selector: selector.to_owned(),
            });
        }
    }

    list
}
