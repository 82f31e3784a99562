// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host lists: host names separated by whitespace, `#` comments out the
//! rest of a line.

use fabric::{Lid, Topology};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostListError {
    #[error("unknown host {0}")]
    Unknown(String),

    #[error("{0} is a switch, not a host")]
    NotAHost(String),

    #[error("reading host list: {0}")]
    Io(#[from] std::io::Error),
}

pub fn parse_host_list(
    text: &str,
    topology: &Topology,
) -> Result<BTreeSet<Lid>, HostListError> {
    let mut hosts = BTreeSet::new();
    for line in text.lines() {
        let line = line.split('#').next().unwrap_or("");
        for name in line.split_whitespace() {
            let lid = topology
                .lid_by_name(name)
                .ok_or_else(|| HostListError::Unknown(name.to_string()))?;
            if !topology.is_host(lid) {
                return Err(HostListError::NotAHost(name.to_string()));
            }
            hosts.insert(lid);
        }
    }
    Ok(hosts)
}

pub fn read_host_list(
    path: Option<&Path>,
    topology: &Topology,
) -> Result<BTreeSet<Lid>, HostListError> {
    match path {
        Some(p) => parse_host_list(&std::fs::read_to_string(p)?, topology),
        None => Ok(BTreeSet::new()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    const TOPOLOGY: &str = r#"{
        "switches": [
            {
                "lid": 1,
                "name": "leaf0",
                "num_ports": 4,
                "links": [
                    {"port": 1, "peer": 3, "peer_port": 1,
                     "peer_kind": "host"},
                    {"port": 2, "peer": 4, "peer_port": 1,
                     "peer_kind": "host"},
                    {"port": 3, "peer": 2, "peer_port": 1,
                     "peer_kind": "switch"}
                ]
            },
            {
                "lid": 2,
                "name": "spine0",
                "num_ports": 4,
                "links": [
                    {"port": 1, "peer": 1, "peer_port": 3,
                     "peer_kind": "switch"}
                ]
            }
        ],
        "hosts": [
            {"lid": 3, "name": "ru-a"},
            {"lid": 4, "name": "ru-b"}
        ]
    }"#;

    fn topology() -> Topology {
        Topology::from_json(TOPOLOGY).expect("topology")
    }

    #[test]
    fn names_and_comments() {
        let t = topology();
        let text = "# readout units\nru-b ru-a   # both of them\n\n  ru-a\n";
        let hosts = parse_host_list(text, &t).expect("parse");
        assert_eq!(hosts.into_iter().collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn unknown_and_switch_names() {
        let t = topology();
        assert!(matches!(
            parse_host_list("ru-a ru-c", &t),
            Err(HostListError::Unknown(n)) if n == "ru-c"
        ));
        assert!(matches!(
            parse_host_list("spine0", &t),
            Err(HostListError::NotAHost(_))
        ));
        assert!(read_host_list(None, &t).expect("empty").is_empty());
    }
}
