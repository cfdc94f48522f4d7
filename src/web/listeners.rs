use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::TcpListener;

const LISTEN_BACKLOG: i32 = 1024;

/// Binds the HTTP listener. `*` means every interface, IPv6 dual-stack when
/// the host allows it and plain IPv4 otherwise.
pub async fn create_listener(host: &str, port: u16) -> std::io::Result<(SocketAddr, TcpListener)> {
    if host == "*" {
        return bind_wildcard(port);
    }

    let addr = format!("{}:{}", host, port);
    tracing::info!("Attempting to bind server to {}...", addr);

    let listener = TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    Ok((local_addr, listener))
}

fn bind_wildcard(port: u16) -> std::io::Result<(SocketAddr, TcpListener)> {
    let v6 = SocketAddr::from((Ipv6Addr::UNSPECIFIED, port));
    match bind_socket(Domain::IPV6, v6) {
        Ok(listener) => return Ok((v6, listener)),
        Err(e) => tracing::warn!("Failed to bind IPv6 listener ({}). Attempting IPv4 only.", e),
    }

    let v4 = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    Ok((v4, bind_socket(Domain::IPV4, v4)?))
}

fn bind_socket(domain: Domain, addr: SocketAddr) -> std::io::Result<TcpListener> {
    tracing::info!("Attempting to bind server to {}...", addr);

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    if domain == Domain::IPV6 {
        // Dual-stack is best effort; some systems refuse it.
        if let Err(e) = socket.set_only_v6(false) {
            tracing::warn!("Failed to enable dual-stack mode for IPv6 socket: {}", e);
        }
    }

    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    socket.set_nonblocking(true)?;

    TcpListener::from_std(socket.into())
}
