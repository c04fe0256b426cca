// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Ephemeral port allocation.
//!
//! Ports are obtained by binding a listener to port 0 on the loopback interface, reading back
//! the port the operating system assigned and releasing the listener again. Nothing stops another
//! process from claiming the same port between the release and the moment `gfsh` binds it.

use std::net::{Ipv4Addr, TcpListener};

use crate::{Error, Result};

/// Returns a loopback TCP port that was free at the time of the call.
///
/// # Errors
///
/// Returns [`Error::PortAllocation`] if the operating system refuses to bind a listener.
pub fn free_tcp_port() -> Result<u16> {
    let [port] = free_tcp_ports::<1>()?;
    Ok(port)
}

/// Returns `N` distinct loopback TCP ports that were free at the time of the call.
///
/// All listeners are held open until every port has been read back, so the operating system
/// cannot hand out the same port twice within one call.
///
/// # Errors
///
/// Returns [`Error::PortAllocation`] if the operating system refuses to bind a listener.
pub fn free_tcp_ports<const N: usize>() -> Result<[u16; N]> {
    let listeners = (0..N)
        .map(|_| TcpListener::bind((Ipv4Addr::LOCALHOST, 0)))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(Error::PortAllocation)?;

    let mut ports = [0; N];
    for (slot, listener) in ports.iter_mut().zip(&listeners) {
        *slot = listener.local_addr().map_err(Error::PortAllocation)?.port();
    }

    Ok(ports)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn port_is_bindable_after_release() {
        let port = free_tcp_port().unwrap();

        assert_ne!(port, 0);
        TcpListener::bind((Ipv4Addr::LOCALHOST, port)).unwrap();
    }

    #[test]
    fn ports_within_one_call_are_distinct() {
        let ports = free_tcp_ports::<8>().unwrap();

        let unique: HashSet<_> = ports.iter().collect();
        assert_eq!(unique.len(), ports.len(), "{ports:?}");
        assert!(ports.iter().all(|p| *p != 0));
    }

    #[test]
    fn zero_ports_is_empty() {
        let ports = free_tcp_ports::<0>().unwrap();
        assert!(ports.is_empty());
    }
}
