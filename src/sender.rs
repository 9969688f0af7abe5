use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use nfq_mutator::packet::ipv6;
use nfq_mutator::{Layer, Packet};

/// Re-injects rewritten packets through raw sockets, headers included.
///
/// Every socket carries `SO_MARK`, so the rule feeding the queue can skip
/// what we send ourselves (`-m mark ! --mark <mark>`).
pub struct RawSender {
    v4: OwnedFd,
    v6: OwnedFd,
}

impl RawSender {
    pub fn open(mark: u32) -> io::Result<Self> {
        Ok(Self {
            v4: raw_socket(libc::AF_INET, mark)?,
            v6: raw_socket(libc::AF_INET6, mark)?,
        })
    }

    pub fn send(&self, packet: &Packet) -> io::Result<()> {
        let data = packet.as_bytes();

        let sent = if packet.has_layer(Layer::Ipv4) {
            let dst: [u8; 4] = [data[16], data[17], data[18], data[19]];
            // SAFETY: sockaddr_in is plain old data, all zeroes is a valid value.
            let mut addr: libc::sockaddr_in = unsafe { mem::zeroed() };
            addr.sin_family = libc::AF_INET as libc::sa_family_t;
            addr.sin_addr.s_addr = u32::from_ne_bytes(dst);
            send_to(&self.v4, data, &addr)
        } else if packet.is_ipv6() {
            let dst = ipv6::destination(data).ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "truncated IPv6 header")
            })?;
            // SAFETY: see above.
            let mut addr: libc::sockaddr_in6 = unsafe { mem::zeroed() };
            addr.sin6_family = libc::AF_INET6 as libc::sa_family_t;
            addr.sin6_addr.s6_addr = dst.octets();
            send_to(&self.v6, data, &addr)
        } else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "not an IP packet"));
        };

        if sent < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

fn send_to<A>(fd: &OwnedFd, data: &[u8], addr: &A) -> isize {
    // SAFETY: `data` and `addr` outlive the call and the lengths match them.
    unsafe {
        libc::sendto(
            fd.as_raw_fd(),
            data.as_ptr().cast(),
            data.len(),
            0,
            (addr as *const A).cast(),
            mem::size_of::<A>() as libc::socklen_t,
        )
    }
}

fn raw_socket(domain: libc::c_int, mark: u32) -> io::Result<OwnedFd> {
    // IPPROTO_RAW implies the IP header is supplied by us.
    // SAFETY: socket() takes no pointers, a failure is reported as -1.
    let fd = unsafe { libc::socket(domain, libc::SOCK_RAW, libc::IPPROTO_RAW) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: fd was just returned by socket() and is owned by nobody else.
    let fd = unsafe { OwnedFd::from_raw_fd(fd) };

    // SAFETY: `fd` is open and `mark` outlives the call, its size is passed along.
    let ret = unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_MARK,
            (&mark as *const u32).cast(),
            mem::size_of::<u32>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(fd)
}
