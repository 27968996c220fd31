use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use log::info;
use socket2::{Domain, Protocol, Socket, Type};

/// Creates and configures a UDP socket for program stream reception
/// Handles both unicast and multicast addresses
pub fn create_udp_socket(addr: SocketAddr) -> anyhow::Result<Socket> {
    let ip = match addr.ip() {
        IpAddr::V4(v4) => v4,
        _ => anyhow::bail!("only IPv4 is supported"),
    };

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    // pack-sized datagrams arrive in bursts
    socket.set_recv_buffer_size(4 * 1024 * 1024)?;
    socket.bind(&addr.into())?;

    if ip.is_multicast() {
        let iface = Ipv4Addr::UNSPECIFIED;
        socket.join_multicast_v4(&ip, &iface)?;
        info!("joined multicast group {ip}");
    }

    socket.set_nonblocking(true)?;
    info!("listening on udp://{addr}");
    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv6_is_rejected() {
        let addr: SocketAddr = "[::1]:0".parse().unwrap();
        assert!(create_udp_socket(addr).is_err());
    }

    #[test]
    fn binds_unicast_loopback() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let sock = create_udp_socket(addr).unwrap();
        assert!(sock.local_addr().unwrap().as_socket().is_some());
    }
}
