//! SSDP advertisement.
//!
//! Two cooperative tasks share the multicast socket: a listener answering
//! M-SEARCH probes with unicast responses, and an announcer multicasting
//! `ssdp:alive` on start and every `max-age / 2`, with `ssdp:byebye` on
//! stop. The device UDN is generated once and stays stable for the
//! process lifetime.

use parking_lot::Mutex;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{DlnaError, Result};

pub const SSDP_MULTICAST_IP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
pub const SSDP_PORT: u16 = 1900;
pub const SSDP_MAX_AGE_SECS: u64 = 1800;

const SERVER_HEADER: &str = "Bobine/1.0 UPnP/1.0 DLNADOC/1.50";

/// Read deadline on the listener so the stop signal is observed promptly.
const LISTEN_DEADLINE: Duration = Duration::from_secs(2);
/// Spacing between the NOTIFY packets of one announcement burst.
const NOTIFY_SPACING: Duration = Duration::from_millis(50);

/// Search targets this device answers for and announces.
pub const SEARCH_TARGETS: [&str; 5] = [
    "ssdp:all",
    "upnp:rootdevice",
    "urn:schemas-upnp-org:device:MediaServer:1",
    "urn:schemas-upnp-org:service:ContentDirectory:1",
    "urn:schemas-upnp-org:service:ConnectionManager:1",
];

/// Process-wide SSDP identity and advertisement loops.
pub struct SsdpDevice {
    udn: String,
    location: String,
    running: Mutex<bool>,
    stop_tx: Mutex<Option<watch::Sender<bool>>>,
    tasks: tokio::sync::Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl SsdpDevice {
    /// `advertise_addr` is the host:port LAN clients reach the HTTP server
    /// on; the device description lives at `/dlna/device.xml` under it.
    #[must_use]
    pub fn new(advertise_addr: &str) -> Self {
        Self {
            udn: format!("uuid:{}", uuid::Uuid::new_v4()),
            location: format!("http://{advertise_addr}/dlna/device.xml"),
            running: Mutex::new(false),
            stop_tx: Mutex::new(None),
            tasks: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// Stable Unique Device Name, `uuid:`-prefixed.
    #[must_use]
    pub fn udn(&self) -> &str {
        &self.udn
    }

    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Bind the multicast socket and launch the listener and announcer.
    /// A bind failure is returned to the caller and no loop starts.
    pub async fn start(self: Arc<Self>) -> Result<()> {
        {
            let mut running = self.running.lock();
            if *running {
                return Ok(());
            }
            *running = true;
        }

        let socket = match bind_multicast_socket() {
            Ok(socket) => Arc::new(socket),
            Err(e) => {
                *self.running.lock() = false;
                return Err(DlnaError::BindFailed(e));
            }
        };

        let (stop_tx, stop_rx) = watch::channel(false);
        *self.stop_tx.lock() = Some(stop_tx);

        let listener = tokio::spawn(listen_loop(self.clone(), socket.clone(), stop_rx.clone()));
        let announcer = tokio::spawn(announce_loop(self.clone(), socket, stop_rx));

        let mut tasks = self.tasks.lock().await;
        tasks.push(listener);
        tasks.push(announcer);

        info!(udn = %self.udn, location = %self.location, "SSDP advertisement started");
        Ok(())
    }

    /// Stop both loops and multicast `ssdp:byebye`. Idempotent.
    pub async fn stop(&self) {
        {
            let mut running = self.running.lock();
            if !*running {
                return;
            }
            *running = false;
        }

        if let Some(tx) = self.stop_tx.lock().take() {
            let _ = tx.send(true);
        }

        let handles: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }

        if let Err(e) = self.send_byebye().await {
            warn!("ssdp:byebye failed: {}", e);
        }
        info!("SSDP advertisement stopped");
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        *self.running.lock()
    }

    /// Response to one M-SEARCH for `st`.
    #[must_use]
    pub fn build_msearch_response(&self, st: &str) -> String {
        // ssdp:all probes get the root device; specific targets are echoed.
        let st = if st == "ssdp:all" { "upnp:rootdevice" } else { st };
        format!(
            "HTTP/1.1 200 OK\r\n\
             CACHE-CONTROL: max-age={SSDP_MAX_AGE_SECS}\r\n\
             EXT:\r\n\
             LOCATION: {}\r\n\
             SERVER: {SERVER_HEADER}\r\n\
             ST: {st}\r\n\
             USN: {}\r\n\
             \r\n",
            self.location,
            self.usn_for(st),
        )
    }

    /// NOTIFY packet for one target.
    #[must_use]
    pub fn build_notify(&self, target: &str, alive: bool) -> String {
        let nts = if alive { "ssdp:alive" } else { "ssdp:byebye" };
        format!(
            "NOTIFY * HTTP/1.1\r\n\
             HOST: {SSDP_MULTICAST_IP}:{SSDP_PORT}\r\n\
             CACHE-CONTROL: max-age={SSDP_MAX_AGE_SECS}\r\n\
             LOCATION: {}\r\n\
             NT: {target}\r\n\
             NTS: {nts}\r\n\
             SERVER: {SERVER_HEADER}\r\n\
             USN: {}\r\n\
             \r\n",
            self.location,
            self.usn_for(target),
        )
    }

    fn usn_for(&self, target: &str) -> String {
        if target == "ssdp:all" || target == self.udn {
            self.udn.clone()
        } else {
            format!("{}::{target}", self.udn)
        }
    }

    async fn send_byebye(&self) -> std::io::Result<()> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let group = SocketAddrV4::new(SSDP_MULTICAST_IP, SSDP_PORT);
        for target in SEARCH_TARGETS {
            socket
                .send_to(self.build_notify(target, false).as_bytes(), group)
                .await?;
            tokio::time::sleep(NOTIFY_SPACING).await;
        }
        Ok(())
    }
}

/// Parsed M-SEARCH probe.
#[derive(Debug, PartialEq, Eq)]
pub struct MSearch {
    pub st: String,
}

/// Parse a datagram as an M-SEARCH discovery probe.
#[must_use]
pub fn parse_msearch(datagram: &str) -> Option<MSearch> {
    let mut lines = datagram.lines();
    if !lines.next()?.trim().starts_with("M-SEARCH") {
        return None;
    }

    let mut headers: HashMap<String, String> = HashMap::new();
    for line in lines {
        if let Some(colon) = line.find(':') {
            let key = line[..colon].trim().to_lowercase();
            let value = line[colon + 1..].trim().to_string();
            headers.insert(key, value);
        }
    }

    if !headers
        .get("man")
        .is_some_and(|man| man.contains("ssdp:discover"))
    {
        return None;
    }

    Some(MSearch {
        st: headers.remove("st")?,
    })
}

fn bind_multicast_socket() -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;

    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, SSDP_PORT);
    socket.bind(&SockAddr::from(bind_addr))?;
    socket.join_multicast_v4(&SSDP_MULTICAST_IP, &Ipv4Addr::UNSPECIFIED)?;
    socket.set_nonblocking(true)?;

    UdpSocket::from_std(socket.into())
}

async fn listen_loop(
    device: Arc<SsdpDevice>,
    socket: Arc<UdpSocket>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut buf = [0u8; 2048];
    loop {
        if *stop_rx.borrow() {
            return;
        }

        let received = tokio::select! {
            r = tokio::time::timeout(LISTEN_DEADLINE, socket.recv_from(&mut buf)) => r,
            _ = stop_rx.changed() => return,
        };

        let (len, src) = match received {
            Ok(Ok(pair)) => pair,
            // Deadline expired with nothing to read; go observe the flag.
            Err(_) => continue,
            Ok(Err(e)) => {
                debug!("ssdp recv error: {}", e);
                continue;
            }
        };

        let Ok(datagram) = std::str::from_utf8(&buf[..len]) else {
            continue;
        };
        let Some(msearch) = parse_msearch(datagram) else {
            continue;
        };
        if !SEARCH_TARGETS.contains(&msearch.st.as_str()) {
            continue;
        }

        debug!(st = %msearch.st, from = %src, "answering M-SEARCH");
        let response = device.build_msearch_response(&msearch.st);
        if let Err(e) = respond_unicast(&socket, response.as_bytes(), src).await {
            debug!(to = %src, "msearch response failed: {}", e);
        }
    }
}

async fn respond_unicast(socket: &UdpSocket, payload: &[u8], to: SocketAddr) -> std::io::Result<()> {
    socket.send_to(payload, to).await.map(|_| ())
}

async fn announce_loop(
    device: Arc<SsdpDevice>,
    socket: Arc<UdpSocket>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let group = SocketAddrV4::new(SSDP_MULTICAST_IP, SSDP_PORT);
    let reannounce = Duration::from_secs(SSDP_MAX_AGE_SECS / 2);

    loop {
        for target in SEARCH_TARGETS {
            let packet = device.build_notify(target, true);
            if let Err(e) = socket.send_to(packet.as_bytes(), group).await {
                warn!("ssdp:alive send failed: {}", e);
            }
            tokio::time::sleep(NOTIFY_SPACING).await;
        }

        tokio::select! {
            () = tokio::time::sleep(reannounce) => {}
            _ = stop_rx.changed() => return,
        }
    }
}
